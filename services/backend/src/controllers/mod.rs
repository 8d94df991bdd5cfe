pub mod download;
pub mod parser;
pub mod root;
pub mod video;
pub use download::{Delivery, DownloadController};
pub use root::RootController;
pub use video::VideoController;
