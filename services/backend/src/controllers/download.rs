use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use axum::{
    Json,
    body::Body,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use futures_util::StreamExt;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    controllers::{
        parser::{output_filename, video_id},
        video::VideoController,
    },
    error::ApiError,
    models::{
        format::{CONTAINER_EXTENSION, FormatEntry, FormatMap},
        video::{DownloadRequest, non_empty},
    },
    tool::{MediaTool, ToolStream},
};

const VIDEO_CONTENT_TYPE: &str = "video/mp4";

/// Where finished bytes go. Chosen once at startup.
#[derive(Clone, Debug, PartialEq)]
pub enum Delivery {
    /// Pipe the tool's stdout straight into the response body.
    Stream,
    /// Let the tool write into this directory and answer with the file name.
    Directory(PathBuf),
}

pub struct DownloadController {
    tool: Arc<dyn MediaTool>,
    formats: Arc<FormatMap>,
    videos: Arc<VideoController>,
    delivery: Delivery,
}

impl DownloadController {
    pub fn new(
        tool: Arc<dyn MediaTool>,
        formats: Arc<FormatMap>,
        videos: Arc<VideoController>,
        delivery: Delivery,
    ) -> Self {
        DownloadController {
            tool,
            formats,
            videos,
            delivery,
        }
    }

    pub async fn download_video(&self, request: DownloadRequest) -> Result<Response, ApiError> {
        let (Some(url), Some(resolution)) = (non_empty(&request.url), non_empty(&request.resolution))
        else {
            return Err(ApiError::Validation(
                "URL and resolution are required".to_string(),
            ));
        };
        let entry = self
            .formats
            .resolve(resolution)
            .ok_or_else(|| ApiError::Validation(format!("Invalid resolution: {}", resolution)))?;

        let request_id = Uuid::new_v4();
        let title = self.resolve_title(url, non_empty(&request.title)).await;
        let filename = output_filename(&title, &entry.label);
        info!(
            "[{}] Starting download for: {} at resolution: {} as {}",
            request_id, url, entry.label, filename
        );

        match &self.delivery {
            Delivery::Stream => self.stream_to_client(request_id, url, entry, filename).await,
            Delivery::Directory(dir) => {
                self.save_to_directory(request_id, dir, url, entry, filename)
                    .await
            }
        }
    }

    /// Request title, then a metadata lookup, then the URL's video id. A failed
    /// lookup only costs a nicer filename.
    async fn resolve_title(&self, url: &str, provided: Option<&str>) -> String {
        if let Some(title) = provided {
            return title.to_string();
        }
        match self.videos.fetch_video_info(url).await {
            Ok(info) => {
                if let Some(title) = info.title() {
                    return title.to_string();
                }
            }
            Err(err) => warn!("Title lookup failed for {}, using fallback name: {}", url, err),
        }
        video_id(url).unwrap_or_default()
    }

    async fn stream_to_client(
        &self,
        request_id: Uuid,
        url: &str,
        entry: &FormatEntry,
        filename: String,
    ) -> Result<Response, ApiError> {
        let ToolStream { pid, mut chunks } =
            self.tool.stream(stream_args(&entry.expression, url)).map_err(|err| {
                error!("[{}] Failed to start yt-dlp for {}: {}", request_id, url, err);
                ApiError::StreamFailure
            })?;
        info!("[{}] yt-dlp spawned (pid {:?})", request_id, pid);

        // Headers are only committed once the tool proved it can produce bytes.
        let first = match chunks.next().await {
            Some(Ok(chunk)) => chunk,
            Some(Err(err)) => {
                error!("[{}] yt-dlp failed before streaming {}: {}", request_id, url, err);
                return Err(ApiError::StreamFailure);
            }
            None => {
                error!("[{}] yt-dlp produced no output for {}", request_id, url);
                return Err(ApiError::StreamFailure);
            }
        };

        let url = url.to_string();
        let body = async_stream::stream! {
            let mut sent = first.len() as u64;
            yield Ok::<_, io::Error>(first);
            while let Some(item) = chunks.next().await {
                match item {
                    Ok(chunk) => {
                        sent += chunk.len() as u64;
                        yield Ok(chunk);
                    }
                    Err(err) => {
                        error!(
                            "[{}] yt-dlp failed mid-stream for {} after {} bytes: {}",
                            request_id, url, sent, err
                        );
                        yield Err(err);
                        return;
                    }
                }
            }
            info!("[{}] Download completed ({} bytes)", request_id, sent);
        };

        Ok((
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, VIDEO_CONTENT_TYPE.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", filename),
                ),
            ],
            Body::from_stream(body),
        )
            .into_response())
    }

    async fn save_to_directory(
        &self,
        request_id: Uuid,
        dir: &Path,
        url: &str,
        entry: &FormatEntry,
        filename: String,
    ) -> Result<Response, ApiError> {
        let target = dir.join(&filename);
        let output = self
            .tool
            .run(directory_args(&entry.expression, &target, url))
            .await
            .map_err(|err| {
                error!(
                    "[{}] yt-dlp download failed for {}: {} ({})",
                    request_id,
                    url,
                    err,
                    err.details()
                );
                ApiError::StreamFailure
            })?;

        if !output.stderr.trim().is_empty() {
            debug!("[{}] yt-dlp: {}", request_id, output.stderr.trim());
        }
        info!("[{}] Download saved to {}", request_id, target.display());
        Ok(Json(serde_json::json!({
            "message": "Download completed",
            "file": filename,
        }))
        .into_response())
    }
}

/// Shared options. Builders append `-o`, then `--` and the URL so a URL
/// starting with `-` is never read as an option.
fn recode_args(expression: &str) -> Vec<String> {
    [
        "-f",
        expression,
        "--recode-video",
        CONTAINER_EXTENSION,
        "--no-playlist",
        "--no-part",
        "--quiet",
        "--no-warnings",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn stream_args(expression: &str, url: &str) -> Vec<String> {
    let mut args = recode_args(expression);
    args.extend([
        "-o".to_string(),
        "-".to_string(),
        "--".to_string(),
        url.to_string(),
    ]);
    args
}

fn directory_args(expression: &str, target: &Path, url: &str) -> Vec<String> {
    let mut args = recode_args(expression);
    args.extend([
        "-o".to_string(),
        target.to_string_lossy().into_owned(),
        "--".to_string(),
        url.to_string(),
    ]);
    args
}
