use opencv::{
    prelude::*,
    core::Mat,
    core::Scalar,
    core::Vector,
    imgcodecs::imencode,
    imgcodecs::IMWRITE_JPEG_QUALITY,
};
use tracing::{debug, warn};

use crate::AppError;
use crate::lib::color_detection::{ColorDetection, ColorDetector, draw_color_detections};
use crate::lib::detection::{Detection, YoloDetector};
use crate::lib::draw::draw_detections;
use crate::lib::perf_stats::{PerfStats, Timer};
use crate::lib::snapshots::ThreadedSnapshots;
use crate::settings::AppSettings;

#[derive(Debug, Default)]
pub struct FrameDetections {
    pub colors: Vec<ColorDetection>,
    pub objects: Vec<Detection>,
}

impl FrameDetections {
    /// Sorted, deduplicated names of everything found in the frame
    pub fn class_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.colors.iter().map(|d| d.color_name.clone())
            .chain(self.objects.iter().map(|d| d.class_name.clone()))
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

/// Turns a captured frame into an annotated JPEG.
pub struct FramePipeline {
    color_detector: Option<ColorDetector>,
    yolo_detector: Option<YoloDetector>,
    snapshots: Option<ThreadedSnapshots>,
    detection_color: Scalar,
    encode_params: Vector<i32>,
    perf_stats: PerfStats,
}

impl FramePipeline {
    pub fn new(settings: &AppSettings, snapshots: ThreadedSnapshots) -> Result<Self, AppError> {
        let color_detector = if settings.color_detection.enable {
            Some(ColorDetector::new(&settings.color_detection)?)
        } else {
            None
        };
        let yolo_detector = if settings.detection.enable {
            Some(YoloDetector::new(&settings.detection)?)
        } else {
            None
        };
        Ok(FramePipeline::with_detectors(settings, color_detector, yolo_detector, snapshots))
    }
    pub fn with_detectors(settings: &AppSettings, color_detector: Option<ColorDetector>, yolo_detector: Option<YoloDetector>, snapshots: ThreadedSnapshots) -> Self {
        let mut encode_params = Vector::<i32>::new();
        encode_params.push(IMWRITE_JPEG_QUALITY);
        encode_params.push(settings.mjpeg.quality);
        FramePipeline {
            color_detector,
            yolo_detector,
            snapshots: if settings.snapshots.enable { Some(snapshots) } else { None },
            detection_color: Scalar::from((0.0, 255.0, 0.0)),
            encode_params,
            perf_stats: PerfStats::new(settings.detection.perf_stats_interval),
        }
    }
    fn has_detectors(&self) -> bool {
        self.color_detector.is_some() || self.yolo_detector.is_some()
    }
    /// Runs every enabled detector on the frame as captured
    pub fn detect_all(&mut self, frame: &Mat) -> Result<FrameDetections, AppError> {
        let colors = match self.color_detector.as_ref() {
            Some(detector) => detector.detect(frame)?,
            None => vec![],
        };
        let objects = match self.yolo_detector.as_mut() {
            Some(detector) => detector.detect(frame)?,
            None => vec![],
        };
        Ok(FrameDetections { colors, objects })
    }
    pub fn annotate(&self, frame: &mut Mat, detections: &FrameDetections) -> Result<(), AppError> {
        draw_color_detections(frame, &detections.colors)?;
        draw_detections(frame, &detections.objects, self.detection_color)?;
        Ok(())
    }
    /// Annotates `frame` in place and returns the JPEG to broadcast
    pub fn process(&mut self, frame: &mut Mat) -> Result<Vec<u8>, AppError> {
        let detection_timer = Timer::start();
        let detections = if self.has_detectors() {
            self.detect_all(frame)?
        } else {
            FrameDetections::default()
        };
        // Snapshots keep the picture without overlays, so they go before drawing
        if let Some(snapshots) = self.snapshots.as_ref() {
            let seen_classes = detections.class_names();
            if !seen_classes.is_empty() {
                let mut registry = snapshots.write().map_err(|_| AppError::Snapshot("Snapshots are poisoned [RWLock]".to_string()))?;
                for class_name in seen_classes.iter() {
                    if let Err(err) = registry.try_save(class_name, frame) {
                        warn!("Can't save snapshot for '{}': {}", class_name, err);
                    }
                }
            }
        }
        self.annotate(frame, &detections)?;
        let detection_elapsed = detection_timer.elapsed();

        let encode_timer = Timer::start();
        let jpeg = self.encode(frame)?;
        self.perf_stats.record(detection_elapsed, encode_timer.elapsed());
        debug!("Frame encoded: {} bytes", jpeg.len());
        Ok(jpeg)
    }
    fn encode(&self, frame: &Mat) -> Result<Vec<u8>, AppError> {
        let mut buffer = Vector::<u8>::new();
        let encoded = imencode(".jpg", frame, &mut buffer, &self.encode_params)?;
        if !encoded {
            return Err(AppError::Video("Frame has not been encoded".to_string()));
        }
        Ok(buffer.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{Rect, CV_8UC3};
    use crate::lib::snapshots::SnapshotRegistry;

    fn settings(snapshots_dir: &str) -> AppSettings {
        let toml = format!(r#"
            [input]
            video_src = "0"
            [color_detection]
            enable = true
            [snapshots]
            enable = true
            output_dir = "{}"
        "#, snapshots_dir.replace('\\', "/"));
        AppSettings::from_toml_str(&toml).unwrap()
    }

    #[test]
    fn test_process_blue_frame() {
        let dir = tempfile::tempdir().unwrap();
        let dir_str = dir.path().to_string_lossy().to_string();
        let settings = settings(&dir_str);
        let snapshots = SnapshotRegistry::new_threaded(&dir_str);
        let detector = ColorDetector::new(&settings.color_detection).unwrap();
        let mut pipeline = FramePipeline::with_detectors(&settings, Some(detector), None, snapshots.clone());

        let mut frame = Mat::new_rows_cols_with_default(120, 160, CV_8UC3, Scalar::all(0.0)).unwrap();
        {
            let mut roi = Mat::roi_mut(&mut frame, Rect::new(40, 30, 60, 60)).unwrap();
            roi.set_to_def(&Scalar::new(255.0, 0.0, 0.0, 0.0)).unwrap();
        }

        let jpeg = pipeline.process(&mut frame).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

        let registry = snapshots.read().unwrap();
        assert!(registry.is_seen("blue"));
        assert!(!registry.is_seen("brown"));
        assert_eq!(registry.records().len(), 1);
        assert!(std::path::Path::new(&registry.records()[0].path).exists());
    }

    #[test]
    fn test_detection_sees_raw_frame() {
        let dir = tempfile::tempdir().unwrap();
        let dir_str = dir.path().to_string_lossy().to_string();
        let settings = settings(&dir_str);
        let snapshots = SnapshotRegistry::new_threaded(&dir_str);
        let detector = ColorDetector::new(&settings.color_detection).unwrap();
        let mut pipeline = FramePipeline::with_detectors(&settings, Some(detector), None, snapshots);

        let mut frame = Mat::new_rows_cols_with_default(120, 160, CV_8UC3, Scalar::all(0.0)).unwrap();
        {
            let mut roi = Mat::roi_mut(&mut frame, Rect::new(40, 30, 60, 60)).unwrap();
            roi.set_to_def(&Scalar::new(255.0, 0.0, 0.0, 0.0)).unwrap();
        }
        let captured = frame.try_clone().unwrap();

        let detections = pipeline.detect_all(&frame).unwrap();
        // Detectors never draw into their input
        assert_eq!(frame.data_bytes().unwrap(), captured.data_bytes().unwrap());
        assert_eq!(detections.class_names(), vec!["blue".to_string()]);

        pipeline.annotate(&mut frame, &detections).unwrap();
        assert_ne!(frame.data_bytes().unwrap(), captured.data_bytes().unwrap());
        // The overlay is not what a later detection pass would be fed
        let again = pipeline.detect_all(&captured).unwrap();
        assert_eq!(again.colors.len(), detections.colors.len());
    }

    #[test]
    fn test_snapshot_has_no_overlay() {
        let dir = tempfile::tempdir().unwrap();
        let dir_str = dir.path().to_string_lossy().to_string();
        // Blue objects outlined in red, so the overlay is visible on black
        let toml = format!(r#"
            [input]
            video_src = "0"
            [color_detection]
            enable = true
            [[color_detection.ranges]]
            name = "blue"
            lower = [100, 150, 50]
            upper = [140, 255, 255]
            color_rgb = [255, 0, 0]
            [snapshots]
            enable = true
            output_dir = "{}"
        "#, dir_str.replace('\\', "/"));
        let settings = AppSettings::from_toml_str(&toml).unwrap();
        let snapshots = SnapshotRegistry::new_threaded(&dir_str);
        let detector = ColorDetector::new(&settings.color_detection).unwrap();
        let mut pipeline = FramePipeline::with_detectors(&settings, Some(detector), None, snapshots.clone());

        let mut frame = Mat::new_rows_cols_with_default(120, 160, CV_8UC3, Scalar::all(0.0)).unwrap();
        {
            let mut roi = Mat::roi_mut(&mut frame, Rect::new(40, 30, 60, 60)).unwrap();
            roi.set_to_def(&Scalar::new(255.0, 0.0, 0.0, 0.0)).unwrap();
        }
        pipeline.process(&mut frame).unwrap();

        // The streamed frame carries the red outline just above the square
        let streamed = frame.at_2d::<opencv::core::Vec3b>(28, 70).unwrap();
        assert_eq!(streamed[2], 255);

        let path = snapshots.read().unwrap().records()[0].path.clone();
        let saved = opencv::imgcodecs::imread(&path, opencv::imgcodecs::IMREAD_COLOR).unwrap();
        let pixel = saved.at_2d::<opencv::core::Vec3b>(28, 70).unwrap();
        assert!(pixel[2] < 60, "snapshot contains contour overlay: {:?}", pixel);
    }

    #[test]
    fn test_process_without_detectors() {
        let dir = tempfile::tempdir().unwrap();
        let dir_str = dir.path().to_string_lossy().to_string();
        let settings = settings(&dir_str);
        let snapshots = SnapshotRegistry::new_threaded(&dir_str);
        let mut pipeline = FramePipeline::with_detectors(&settings, None, None, snapshots.clone());

        let mut frame = Mat::new_rows_cols_with_default(48, 64, CV_8UC3, Scalar::all(90.0)).unwrap();
        let jpeg = pipeline.process(&mut frame).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        assert!(snapshots.read().unwrap().records().is_empty());
    }
}
