pub mod format;
pub mod video;
