mod broadcaster;

pub use self::broadcaster::*;
