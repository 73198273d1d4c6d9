// SyncTV stream handler for GOP cache integration
//
// This module provides a placeholder for xiu StreamHandler integration
// Full implementation requires xiu's TStreamHandler trait

use crate::cache::gop_cache::{GopCache, GopFrame, FrameType};
use bytes::BytesMut;
use std::sync::Arc;

pub struct SyncTvStreamHandler {
    room_id: String,
    gop_cache: Arc<GopCache>,
}

impl SyncTvStreamHandler {
    pub fn new(room_id: String, gop_cache: Arc<GopCache>) -> Self {
        Self { room_id, gop_cache }
    }

    /// Save frame data to GOP cache
    ///
    /// Detects keyframes from H.264 video data and manages GOP boundaries
    pub fn save_frame(&self, timestamp: u32, data: BytesMut, is_video: bool) {
        let is_keyframe = if is_video && !data.is_empty() {
            // H.264 keyframe detection
            let frame_type = (data[0] >> 4) & 0x0F;
            frame_type == 1
        } else {
            false
        };

        let gop_frame = GopFrame {
            timestamp,
            is_keyframe,
            data: data.freeze(),
            frame_type: if is_video { FrameType::Video } else { FrameType::Audio },
        };

        self.gop_cache.add_frame(&self.room_id, gop_frame);
    }

    /// Get cached GOP frames for instant playback
    pub fn get_cached_frames(&self) -> Vec<GopFrame> {
        self.gop_cache.get_frames(&self.room_id)
    }
}

// TODO: Implement xiu's TStreamHandler trait when integrating with StreamHub
// #[async_trait]
// impl TStreamHandler for SyncTvStreamHandler {
//     async fn send_prior_data(...) -> Result<(), StreamHubError> {
//         // Send cached GOP frames to new subscribers
//     }
//     ...
// }
