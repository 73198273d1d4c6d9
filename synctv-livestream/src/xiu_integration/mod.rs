// Xiu RTMP server integration
mod rtmp_server;
mod stream_handler;

pub use rtmp_server::{RtmpServer, RtmpConfig};
pub use stream_handler::StreamHandler;
