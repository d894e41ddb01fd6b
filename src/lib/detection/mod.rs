mod postprocess;
mod yolo;

pub use self::{postprocess::*, yolo::*};
