// Re-export from xiu-hls crate
pub use synctv_xiu::hls::remuxer;

pub use synctv_xiu::hls::{CustomHlsRemuxer, StreamRegistry, StreamProcessorState, SegmentInfo, HlsRemuxerError};
pub use synctv_xiu::hls::segment_manager::{SegmentManager, CleanupConfig};
