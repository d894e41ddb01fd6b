use opencv::{
    core::Mat,
    core::Point,
    core::Scalar,
    imgproc::LINE_8,
    imgproc::FONT_HERSHEY_SIMPLEX,
    imgproc::put_text,
    imgproc::rectangle,
};
use tracing::warn;

use crate::lib::detection::Detection;

pub fn detection_label(detection: &Detection) -> String {
    format!("{} {:.2}", detection.class_name, detection.confidence)
}

pub fn draw_detections(img: &mut Mat, detections: &[Detection], color: Scalar) -> Result<(), opencv::Error> {
    for detection in detections.iter() {
        rectangle(img, detection.bbox, color, 2, LINE_8, 0)?;
        let anchor = Point::new(detection.bbox.x + 2, (detection.bbox.y - 4).max(12));
        match put_text(img, &detection_label(detection), anchor, FONT_HERSHEY_SIMPLEX, 0.5, color, 1, LINE_8, false) {
            Ok(_) => {},
            Err(err) => {
                warn!("Can't display label of detection due the error {:?}", err);
            }
        };
    }
    Ok(())
}
