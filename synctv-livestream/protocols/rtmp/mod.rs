pub mod server;
pub mod session;
pub mod handler;
pub mod auth;
pub mod auth_impl;

pub use server::RtmpStreamingServer;
pub use auth::{RtmpAuthCallback, Channel, NoAuthCallback};
pub use auth_impl::RtmpAuthCallbackImpl;
