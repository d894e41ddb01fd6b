mod index_page;
mod mjpeg_client;
mod capture;
mod detections_list;
mod status;
mod rest_api;
mod services;

pub use self::rest_api::*;
