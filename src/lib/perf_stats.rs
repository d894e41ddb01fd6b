use std::time::{Duration, Instant};

use tracing::info;

/// Performance statistics for the frame pipeline.
/// Accumulates timing data and logs averages every N frames.
pub struct PerfStats {
    /// Number of frames between stats output. 0 = disabled
    interval: u32,
    frame_count: u32,
    detection_total: Duration,
    encode_total: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerfSummary {
    pub frames: u32,
    pub avg_detection_ms: f64,
    pub avg_encode_ms: f64,
    pub estimated_fps: f64,
}

impl PerfStats {
    pub fn new(interval: u32) -> Self {
        PerfStats {
            interval,
            frame_count: 0,
            detection_total: Duration::ZERO,
            encode_total: Duration::ZERO,
        }
    }

    /// Record timings for a single frame. Returns the summary (and logs it)
    /// once the interval is reached.
    ///
    /// # Arguments
    /// * `detection` - Colour detection plus neural network inference
    /// * `encode` - JPEG encoding of the annotated frame
    pub fn record(&mut self, detection: Duration, encode: Duration) -> Option<PerfSummary> {
        if self.interval == 0 {
            return None;
        }
        self.detection_total += detection;
        self.encode_total += encode;
        self.frame_count += 1;

        if self.frame_count >= self.interval {
            let summary = self.summary();
            info!(
                "[PerfStats] Last {} frames avg: detection={:.2}ms, encode={:.2}ms (~{:.1} FPS)",
                summary.frames,
                summary.avg_detection_ms,
                summary.avg_encode_ms,
                summary.estimated_fps
            );
            self.reset();
            return Some(summary);
        }
        None
    }

    fn summary(&self) -> PerfSummary {
        let n = self.frame_count as f64;
        let avg_detection_ms = self.detection_total.as_secs_f64() * 1000.0 / n;
        let avg_encode_ms = self.encode_total.as_secs_f64() * 1000.0 / n;
        let avg_total = avg_detection_ms + avg_encode_ms;
        // Processing time only, capture is not included
        let estimated_fps = if avg_total > 0.0 { 1000.0 / avg_total } else { 0.0 };
        PerfSummary {
            frames: self.frame_count,
            avg_detection_ms,
            avg_encode_ms,
            estimated_fps,
        }
    }

    fn reset(&mut self) {
        self.frame_count = 0;
        self.detection_total = Duration::ZERO;
        self.encode_total = Duration::ZERO;
    }
}

/// Simple timer measuring a single pipeline stage.
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn start() -> Self {
        Timer { start: Instant::now() }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
