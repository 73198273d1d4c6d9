pub mod server;
pub mod handler;
pub mod pull_manager;
pub mod segment_manager;
pub mod hls_remuxer;
pub mod rtmp;
pub mod httpflv;
pub mod hls;

pub use server::StreamingServer;
pub use handler::SyncTvStreamHandler;
pub use pull_manager::PullStreamManager;
pub use segment_manager::{SegmentManager, CleanupConfig};
pub use hls_remuxer::{CustomHlsRemuxer, StreamRegistry, StreamProcessorState};
