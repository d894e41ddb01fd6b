//! HSV colour-object detection.
//!
//! Every configured range produces a binary mask, which is cleaned with an
//! erode/dilate pass; outer and inner contours of the mask whose area exceeds
//! the noise threshold are reported as detections.

use opencv::{
    prelude::*,
    core::Mat,
    core::Point,
    core::Rect,
    core::Scalar,
    core::Size,
    core::Vector,
    core::BORDER_CONSTANT,
    core::in_range,
    imgproc::COLOR_BGR2HSV,
    imgproc::CHAIN_APPROX_SIMPLE,
    imgproc::LINE_8,
    imgproc::MORPH_RECT,
    imgproc::RETR_TREE,
    imgproc::bounding_rect,
    imgproc::contour_area_def,
    imgproc::cvt_color_def,
    imgproc::dilate,
    imgproc::draw_contours,
    imgproc::erode,
    imgproc::find_contours_def,
    imgproc::get_structuring_element_def,
    imgproc::morphology_default_border_value,
};
use tracing::info;

use crate::settings::{ColorDetectionSettings, HsvRangeSettings};

const CONTOUR_THICKNESS: i32 = 3;

#[derive(Debug, Clone)]
pub struct HsvRange {
    pub name: String,
    pub lower: Scalar,
    pub upper: Scalar,
    /// BGR, ready for OpenCV drawing
    pub color: Scalar,
}

impl From<&HsvRangeSettings> for HsvRange {
    fn from(setting: &HsvRangeSettings) -> Self {
        HsvRange {
            name: setting.name.clone(),
            lower: Scalar::new(setting.lower[0] as f64, setting.lower[1] as f64, setting.lower[2] as f64, 0.0),
            upper: Scalar::new(setting.upper[0] as f64, setting.upper[1] as f64, setting.upper[2] as f64, 0.0),
            color: Scalar::from((setting.color_rgb[2] as f64, setting.color_rgb[1] as f64, setting.color_rgb[0] as f64)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ColorDetection {
    pub color_name: String,
    pub area: f64,
    pub bbox: Rect,
    pub contour: Vector<Point>,
    pub color: Scalar,
}

pub struct ColorDetector {
    ranges: Vec<HsvRange>,
    kernel: Mat,
    min_area: f64,
    erode_iterations: i32,
    dilate_iterations: i32,
}

impl ColorDetector {
    pub fn new(settings: &ColorDetectionSettings) -> Result<Self, opencv::Error> {
        let kernel = get_structuring_element_def(MORPH_RECT, Size::new(settings.kernel_size, settings.kernel_size))?;
        Ok(ColorDetector {
            ranges: settings.ranges.iter().map(HsvRange::from).collect(),
            kernel,
            min_area: settings.min_area,
            erode_iterations: settings.erode_iterations,
            dilate_iterations: settings.dilate_iterations,
        })
    }
    /// Binary mask of the pixels of `hsv` that fall into `range`, after noise removal
    fn mask(&self, hsv: &Mat, range: &HsvRange) -> Result<Mat, opencv::Error> {
        let border_value = morphology_default_border_value()?;
        let mut raw = Mat::default();
        in_range(hsv, &range.lower, &range.upper, &mut raw)?;
        let mut eroded = Mat::default();
        erode(&raw, &mut eroded, &self.kernel, Point::new(-1, -1), self.erode_iterations, BORDER_CONSTANT, border_value)?;
        let mut dilated = Mat::default();
        dilate(&eroded, &mut dilated, &self.kernel, Point::new(-1, -1), self.dilate_iterations, BORDER_CONSTANT, border_value)?;
        Ok(dilated)
    }
    pub fn detect(&self, frame: &Mat) -> Result<Vec<ColorDetection>, opencv::Error> {
        let mut hsv = Mat::default();
        cvt_color_def(frame, &mut hsv, COLOR_BGR2HSV)?;
        let mut detections = vec![];
        for range in self.ranges.iter() {
            let mask = self.mask(&hsv, range)?;
            let mut contours = Vector::<Vector<Point>>::new();
            find_contours_def(&mask, &mut contours, RETR_TREE, CHAIN_APPROX_SIMPLE)?;
            for contour in contours.iter() {
                let area = contour_area_def(&contour)?;
                if area <= self.min_area {
                    continue;
                }
                info!("{} object detected (area: {:.0})", range.name, area);
                detections.push(ColorDetection {
                    color_name: range.name.clone(),
                    area: area,
                    bbox: bounding_rect(&contour)?,
                    contour: contour,
                    color: range.color,
                });
            }
        }
        Ok(detections)
    }
}

pub fn draw_color_detections(img: &mut Mat, detections: &[ColorDetection]) -> Result<(), opencv::Error> {
    for detection in detections.iter() {
        let mut contours = Vector::<Vector<Point>>::new();
        contours.push(detection.contour.clone());
        draw_contours(img, &contours, -1, detection.color, CONTOUR_THICKNESS, LINE_8, &Mat::default(), i32::MAX, Point::new(0, 0))?;
    }
    Ok(())
}
