pub mod remuxer;
pub mod segment_manager;

pub use remuxer::{CustomHlsRemuxer, StreamRegistry, StreamProcessorState, SegmentInfo, HlsRemuxerError};
pub use segment_manager::{SegmentManager, CleanupConfig};
