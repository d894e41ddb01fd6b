use opencv::{
    core::Mat,
};

use chrono::{
    DateTime,
    Utc,
};

pub struct ThreadedFrame {
    pub frame: Mat,
    pub captured_at: DateTime<Utc>,
    pub frame_index: u64,
}
