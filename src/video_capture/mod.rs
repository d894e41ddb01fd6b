mod frame;
mod video_capture;

pub use self::{frame::*, video_capture::*};
