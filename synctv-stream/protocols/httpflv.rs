// HTTP-FLV protocol implementation
//
// Provides HTTP-FLV streaming sessions.
// Uses xiu's HTTP-FLV library with room_id:media_id stream identifiers.

pub mod httpflv_session;

pub use httpflv_session::HttpFlvSession;
