use std::sync::Arc;

use crate::{
    controllers::{Delivery, DownloadController, VideoController},
    models::format::FormatMap,
    tool::MediaTool,
};

/// Router state. Everything in here is immutable after startup.
#[derive(Clone)]
pub struct AppState {
    pub formats: Arc<FormatMap>,
    pub videos: Arc<VideoController>,
    pub downloads: Arc<DownloadController>,
}

impl AppState {
    pub fn new(tool: Arc<dyn MediaTool>, formats: FormatMap, delivery: Delivery) -> Self {
        let formats = Arc::new(formats);
        let videos = Arc::new(VideoController::new(tool.clone()));
        let downloads = Arc::new(DownloadController::new(
            tool,
            formats.clone(),
            videos.clone(),
            delivery,
        ));
        Self {
            formats,
            videos,
            downloads,
        }
    }
}
