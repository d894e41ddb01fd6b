use std::collections::HashSet;

use opencv::{
    core::Rect as RectCV,
};
use tracing::warn;

/// YOLOv10 end-to-end head: [x1, y1, x2, y2, score, class_id] per row
pub const YOLOV10_ROW_SIZE: usize = 6;

#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub class_name: String,
    pub confidence: f32,
    pub bbox: RectCV,
}

pub fn parse_yolov10_output(raw: &[f32], conf_threshold: f32, scale_x: f32, scale_y: f32, net_classes: &[String], target_classes: &HashSet<String>) -> Vec<Detection> {
    if raw.len() % YOLOV10_ROW_SIZE != 0 {
        warn!("YOLOv10 output has {} values, which is not a multiple of {}", raw.len(), YOLOV10_ROW_SIZE);
    }
    let mut detections = vec![];
    for row in raw.chunks_exact(YOLOV10_ROW_SIZE) {
        let confidence = row[4];
        if !(confidence >= conf_threshold) {
            continue;
        }
        let class_id = row[5];
        if class_id.is_nan() || class_id < 0.0 || class_id as usize >= net_classes.len() {
            continue;
        }
        let class_name = &net_classes[class_id as usize];
        if !target_classes.is_empty() && !target_classes.contains(class_name) {
            continue;
        }
        let x1 = (row[0] * scale_x).max(0.0);
        let y1 = (row[1] * scale_y).max(0.0);
        let x2 = (row[2] * scale_x).max(x1);
        let y2 = (row[3] * scale_y).max(y1);
        detections.push(Detection {
            class_name: class_name.clone(),
            confidence: confidence,
            bbox: RectCV::new(x1.round() as i32, y1.round() as i32, (x2 - x1).round() as i32, (y2 - y1).round() as i32),
        });
    }
    detections
}
