use std::sync::Arc;

use axum::{
    Json,
    response::{IntoResponse, Response},
};
use tracing::{error, info};

use crate::{
    controllers::parser::{thumbnail_url, video_id},
    error::ApiError,
    models::video::{InfoQuery, VideoInfo, VideoInfoRequest, VideoSummary, non_empty},
    tool::MediaTool,
};

/// Metadata fetcher: one `--dump-single-json` invocation per request.
pub struct VideoController {
    tool: Arc<dyn MediaTool>,
}

impl VideoController {
    pub fn new(tool: Arc<dyn MediaTool>) -> Self {
        VideoController { tool }
    }

    pub async fn get_video_info(
        &self,
        request: VideoInfoRequest,
        query: InfoQuery,
    ) -> Result<Response, ApiError> {
        let url = non_empty(&request.url)
            .ok_or_else(|| ApiError::Validation("URL is required".to_string()))?;
        let info = self.fetch_video_info(url).await?;
        if query.full {
            return Ok(Json(info.into_inner()).into_response());
        }
        Ok(Json(summarize(&info, url)).into_response())
    }

    pub async fn fetch_video_info(&self, url: &str) -> Result<VideoInfo, ApiError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(ApiError::Validation("URL is required".to_string()));
        }
        info!("Fetching video info for: {}", url);

        let output = self.tool.run(metadata_args(url)).await.map_err(|err| {
            error!("yt-dlp metadata failed for {}: {} ({})", url, err, err.details());
            ApiError::FetchFailed {
                details: err.details(),
            }
        })?;

        let value: serde_json::Value = serde_json::from_slice(&output.stdout).map_err(|err| {
            error!("yt-dlp printed invalid JSON for {}: {}", url, err);
            ApiError::ParseFailed {
                details: err.to_string(),
            }
        })?;

        info!("Successfully fetched video info for: {}", url);
        Ok(VideoInfo(value))
    }
}

/// `--` keeps a URL that starts with `-` from being read as an option.
fn metadata_args(url: &str) -> Vec<String> {
    ["--dump-single-json", "--no-playlist", "--no-warnings", "--", url]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Projects the payload onto the fields the client uses. Thumbnail falls back
/// to the static YouTube image for the payload id or the id in the URL.
pub fn summarize(info: &VideoInfo, url: &str) -> VideoSummary {
    let id = info
        .str_field("id")
        .map(str::to_string)
        .or_else(|| video_id(url));
    let thumbnail = info
        .str_field("thumbnail")
        .map(str::to_string)
        .or_else(|| id.as_deref().map(thumbnail_url));

    VideoSummary {
        title: info.title().map(str::to_string),
        thumbnail,
        duration: info.f64_field("duration"),
        uploader: info.str_field("uploader").map(str::to_string),
        webpage_url: info.str_field("webpage_url").map(str::to_string),
        id,
    }
}
