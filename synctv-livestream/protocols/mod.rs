// Protocols - Streaming protocol implementations
//
// Provides implementations for various streaming protocols:
// - RTMP server and session handling
// - HTTP-FLV streaming sessions
// - HLS remuxer and HTTP server

pub mod rtmp;
pub mod httpflv;
pub mod hls;

pub use rtmp::RtmpStreamingServer;
pub use httpflv::HttpFlvSession;
pub use hls::{HlsServer, CustomHlsRemuxer, StreamRegistry, StreamProcessorState, SegmentInfo};
