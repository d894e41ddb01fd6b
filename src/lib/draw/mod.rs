mod draw;

pub use self::draw::*;
