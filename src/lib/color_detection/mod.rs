mod color_detection;

pub use self::color_detection::*;
