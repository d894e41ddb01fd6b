use std::collections::HashSet;

use opencv::{
    prelude::*,
    core::Mat,
    core::Scalar,
    core::Size,
    core::Vector,
    core::CV_32F,
    core::get_cuda_enabled_device_count,
    dnn::DNN_BACKEND_CUDA,
    dnn::DNN_TARGET_CUDA,
    dnn::Net,
    dnn::blob_from_image,
    dnn::read_net_from_onnx,
};
use tracing::{info, warn};

use crate::AppError;
use crate::settings::DetectionSettings;
use crate::lib::detection::{Detection, parse_yolov10_output};

const BLOB_SCALE: f64 = 1.0 / 255.0;
const BLOB_NAME: &'static str = "";

pub struct YoloDetector {
    net: Net,
    out_layers: Vector<String>,
    image_size: i32,
    conf_threshold: f32,
    net_classes: Vec<String>,
    target_classes: HashSet<String>,
}

impl YoloDetector {
    pub fn new(settings: &DetectionSettings) -> Result<Self, AppError> {
        let mut net = read_net_from_onnx(&settings.network_weights)
            .map_err(|err| AppError::Detection(format!("Can't read network '{}' due the error: {}", settings.network_weights, err)))?;
        let out_layers = net.get_unconnected_out_layers_names()?;

        /* Check if CUDA is an option at all */
        let cuda_available = get_cuda_enabled_device_count()? > 0;
        info!("CUDA is {}", if cuda_available { "'available'" } else { "'not available'" });
        if cuda_available {
            net.set_preferable_backend(DNN_BACKEND_CUDA)?;
            net.set_preferable_target(DNN_TARGET_CUDA)?;
        }

        Ok(YoloDetector {
            net: net,
            out_layers: out_layers,
            image_size: settings.image_size,
            conf_threshold: settings.conf_threshold,
            net_classes: settings.net_classes.clone(),
            target_classes: settings.target_classes.clone().unwrap_or_default().into_iter().collect(),
        })
    }
    pub fn detect(&mut self, frame: &Mat) -> Result<Vec<Detection>, AppError> {
        let net_size = Size::new(self.image_size, self.image_size);
        let blob_mean = Scalar::new(0.0, 0.0, 0.0, 0.0);
        let blob = blob_from_image(frame, BLOB_SCALE, net_size, blob_mean, true, false, CV_32F)?;
        self.net.set_input(&blob, BLOB_NAME, 1.0, blob_mean)?;

        let mut outputs = Vector::<Mat>::new();
        self.net.forward(&mut outputs, &self.out_layers)?;
        let output = match outputs.iter().next() {
            Some(output) => output,
            None => {
                warn!("Neural network produced no outputs");
                return Ok(vec![]);
            }
        };
        let output = if output.is_continuous() { output } else { output.try_clone()? };
        let raw = output.data_typed::<f32>()?;

        let scale_x = frame.cols() as f32 / self.image_size as f32;
        let scale_y = frame.rows() as f32 / self.image_size as f32;
        Ok(parse_yolov10_output(raw, self.conf_threshold, scale_x, scale_y, &self.net_classes, &self.target_classes))
    }
}
