pub mod rtmp;
pub mod httpflv;
pub mod hls;

pub use self::rtmp::RtmpAuthCallbackImpl;
pub use httpflv::HttpFlvSession;
pub use hls::{CustomHlsRemuxer, StreamRegistry, StreamProcessorState, SegmentInfo};
