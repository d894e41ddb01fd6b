mod snapshots;

pub use self::snapshots::*;
