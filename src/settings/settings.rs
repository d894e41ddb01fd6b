use std::fs;
use std::fmt;

use serde::{ Deserialize, Serialize };
use thiserror::Error;
use toml;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Can't read configuration file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Can't parse TOML configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid value for '{field}': {reason}")]
    Invalid {
        field: String,
        reason: String,
    },
}

fn invalid(field: &str, reason: impl Into<String>) -> SettingsError {
    SettingsError::Invalid { field: field.to_string(), reason: reason.into() }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AppSettings {
    pub input: InputSettings,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub mjpeg: MJPEGStreamingSettings,
    #[serde(default)]
    pub output: OutputSettings,
    #[serde(default)]
    pub color_detection: ColorDetectionSettings,
    #[serde(default)]
    pub detection: DetectionSettings,
    #[serde(default)]
    pub snapshots: SnapshotSettings,
    pub debug: Option<DebugSettings>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct InputSettings {
    /// Camera index for `device`, or file/RTSP/HTTP address for `url`
    pub video_src: String,
    /// Either "device" or "url". Default is "device"
    #[serde(default = "default_input_type")]
    pub typ: String,
}

fn default_input_type() -> String { "device".to_string() }

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings { host: default_host(), port: default_port() }
    }
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MJPEGStreamingSettings {
    /// JPEG quality for streaming (0-100). Lower = smaller files, faster streaming.
    /// Default is 80
    #[serde(default = "default_mjpeg_quality")]
    pub quality: i32,
}

impl Default for MJPEGStreamingSettings {
    fn default() -> Self {
        MJPEGStreamingSettings { quality: default_mjpeg_quality() }
    }
}

fn default_mjpeg_quality() -> i32 { 80 }

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OutputSettings {
    #[serde(default)]
    pub enable: bool,
    #[serde(default = "default_output_width")]
    pub width: i32,
    #[serde(default = "default_output_height")]
    pub height: i32,
    #[serde(default = "default_window_name")]
    pub window_name: String,
}

impl Default for OutputSettings {
    fn default() -> Self {
        OutputSettings {
            enable: false,
            width: default_output_width(),
            height: default_output_height(),
            window_name: default_window_name(),
        }
    }
}

fn default_output_width() -> i32 { 640 }
fn default_output_height() -> i32 { 480 }
fn default_window_name() -> String { "ESP32-CAM".to_string() }

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HsvRangeSettings {
    pub name: String,
    /// Inclusive lower bound [H, S, V]. OpenCV hue is 0..=179
    pub lower: [u8; 3],
    /// Inclusive upper bound [H, S, V]
    pub upper: [u8; 3],
    /// Contour color used for drawing
    pub color_rgb: [u8; 3],
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ColorDetectionSettings {
    #[serde(default)]
    pub enable: bool,
    /// Contours with area less or equal to this value are treated as noise
    #[serde(default = "default_min_area")]
    pub min_area: f64,
    #[serde(default = "default_kernel_size")]
    pub kernel_size: i32,
    #[serde(default = "default_erode_iterations")]
    pub erode_iterations: i32,
    #[serde(default = "default_dilate_iterations")]
    pub dilate_iterations: i32,
    #[serde(default = "default_hsv_ranges")]
    pub ranges: Vec<HsvRangeSettings>,
}

impl Default for ColorDetectionSettings {
    fn default() -> Self {
        ColorDetectionSettings {
            enable: false,
            min_area: default_min_area(),
            kernel_size: default_kernel_size(),
            erode_iterations: default_erode_iterations(),
            dilate_iterations: default_dilate_iterations(),
            ranges: default_hsv_ranges(),
        }
    }
}

fn default_min_area() -> f64 { 500.0 }
fn default_kernel_size() -> i32 { 5 }
fn default_erode_iterations() -> i32 { 1 }
fn default_dilate_iterations() -> i32 { 2 }

pub fn default_hsv_ranges() -> Vec<HsvRangeSettings> {
    vec![
        HsvRangeSettings {
            name: "blue".to_string(),
            lower: [100, 150, 50],
            upper: [140, 255, 255],
            color_rgb: [0, 0, 255],
        },
        HsvRangeSettings {
            name: "brown".to_string(),
            lower: [10, 100, 20],
            upper: [20, 255, 200],
            color_rgb: [255, 0, 0],
        },
    ]
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DetectionSettings {
    #[serde(default)]
    pub enable: bool,
    /// Path to YOLOv10 model exported to ONNX
    #[serde(default)]
    pub network_weights: String,
    /// Square network input size. Default is 640
    #[serde(default = "default_image_size")]
    pub image_size: i32,
    #[serde(default = "default_conf_threshold")]
    pub conf_threshold: f32,
    #[serde(default)]
    pub net_classes: Vec<String>,
    pub target_classes: Option<Vec<String>>,
    /// Print performance stats every N frames. 0 = disabled.
    #[serde(default)]
    pub perf_stats_interval: u32,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        DetectionSettings {
            enable: false,
            network_weights: String::new(),
            image_size: default_image_size(),
            conf_threshold: default_conf_threshold(),
            net_classes: Vec::new(),
            target_classes: None,
            perf_stats_interval: 0,
        }
    }
}

fn default_image_size() -> i32 { 640 }
fn default_conf_threshold() -> f32 { 0.25 }

pub const MIN_IMAGE_SIZE: i32 = 320;
pub const MAX_IMAGE_SIZE: i32 = 1280;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SnapshotSettings {
    #[serde(default)]
    pub enable: bool,
    #[serde(default = "default_snapshots_dir")]
    pub output_dir: String,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        SnapshotSettings { enable: false, output_dir: default_snapshots_dir() }
    }
}

fn default_snapshots_dir() -> String { "./snapshots".to_string() }

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DebugSettings {
    pub enable: bool
}

impl AppSettings {
    pub fn new(filename: &str) -> Result<Self, SettingsError> {
        let toml_contents = fs::read_to_string(filename).map_err(|source| SettingsError::Read {
            path: filename.to_string(),
            source,
        })?;
        Self::from_toml_str(&toml_contents)
    }
    pub fn from_toml_str(toml_contents: &str) -> Result<Self, SettingsError> {
        let mut app_settings = toml::from_str::<AppSettings>(toml_contents)?;
        if app_settings.debug.is_none() {
            app_settings.debug = Some(DebugSettings {
                enable: false,
            });
        }
        app_settings.validate()?;
        Ok(app_settings)
    }
    pub fn validate(&self) -> Result<(), SettingsError> {
        match self.input.typ.as_str() {
            "device" => {
                if self.input.video_src.parse::<i32>().is_err() {
                    return Err(invalid("input.video_src", format!("'{}' is not a device index", self.input.video_src)));
                }
            },
            "url" => {
                if self.input.video_src.trim().is_empty() {
                    return Err(invalid("input.video_src", "must not be empty"));
                }
            },
            other => {
                return Err(invalid("input.typ", format!("'{}' is not supported. Supported types are 'device' and 'url'", other)));
            }
        }
        if self.server.port == 0 {
            return Err(invalid("server.port", "must be greater than zero"));
        }
        if !(0..=100).contains(&self.mjpeg.quality) {
            return Err(invalid("mjpeg.quality", format!("{} is out of range 0..=100", self.mjpeg.quality)));
        }
        if self.output.enable && (self.output.width <= 0 || self.output.height <= 0) {
            return Err(invalid("output", "width and height must be positive"));
        }
        self.validate_color_detection()?;
        self.validate_detection()?;
        if self.snapshots.enable && self.snapshots.output_dir.trim().is_empty() {
            return Err(invalid("snapshots.output_dir", "must not be empty"));
        }
        Ok(())
    }
    fn validate_color_detection(&self) -> Result<(), SettingsError> {
        let cd = &self.color_detection;
        if cd.min_area < 0.0 {
            return Err(invalid("color_detection.min_area", "must not be negative"));
        }
        if cd.kernel_size <= 0 {
            return Err(invalid("color_detection.kernel_size", "must be positive"));
        }
        if cd.erode_iterations < 0 || cd.dilate_iterations < 0 {
            return Err(invalid("color_detection", "iterations must not be negative"));
        }
        if cd.enable && cd.ranges.is_empty() {
            return Err(invalid("color_detection.ranges", "at least one range is required"));
        }
        for range in cd.ranges.iter() {
            if range.lower[0] > 179 || range.upper[0] > 179 {
                return Err(invalid("color_detection.ranges", format!("hue of '{}' must be in 0..=179", range.name)));
            }
            if range.lower.iter().zip(range.upper.iter()).any(|(lo, hi)| lo > hi) {
                return Err(invalid("color_detection.ranges", format!("lower bound of '{}' exceeds upper bound", range.name)));
            }
        }
        Ok(())
    }
    fn validate_detection(&self) -> Result<(), SettingsError> {
        let det = &self.detection;
        if !(MIN_IMAGE_SIZE..=MAX_IMAGE_SIZE).contains(&det.image_size) {
            return Err(invalid("detection.image_size", format!("{} is out of range {}..={}", det.image_size, MIN_IMAGE_SIZE, MAX_IMAGE_SIZE)));
        }
        if !(0.0..=1.0).contains(&det.conf_threshold) {
            return Err(invalid("detection.conf_threshold", format!("{} is out of range 0..=1", det.conf_threshold)));
        }
        if det.enable {
            if det.network_weights.trim().is_empty() {
                return Err(invalid("detection.network_weights", "must be set when detection is enabled"));
            }
            if det.net_classes.is_empty() {
                return Err(invalid("detection.net_classes", "must be set when detection is enabled"));
            }
        }
        Ok(())
    }
    pub fn verbose(&self) -> bool {
        self.debug.as_ref().map(|d| d.enable).unwrap_or(false)
    }
}

impl fmt::Display for AppSettings {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Video input: {} ({})\n\tServer: {}:{}\n\tMJPEG quality: {}\n\tColor detection: {}\n\tObject detection: {} (weights: '{}', size: {})\n\tSnapshots: {} ('{}')",
            self.input.video_src,
            self.input.typ,
            self.server.host,
            self.server.port,
            self.mjpeg.quality,
            self.color_detection.enable,
            self.detection.enable,
            self.detection.network_weights,
            self.detection.image_size,
            self.snapshots.enable,
            self.snapshots.output_dir,
        )
    }
}
