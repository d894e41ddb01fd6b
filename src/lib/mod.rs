pub mod color_detection;
pub mod detection;
pub mod draw;
pub mod mjpeg_streaming;
pub mod perf_stats;
pub mod rest_api;
pub mod snapshots;
