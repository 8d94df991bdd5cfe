use axum::{
    Json, Router,
    extract::{Query, State, rejection::JsonRejection},
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::{
    error::ApiError,
    models::video::{DownloadRequest, InfoQuery, VideoInfoRequest},
    state::AppState,
};

pub async fn get_video_info_route(
    State(state): State<AppState>,
    Query(query): Query<InfoQuery>,
    payload: Result<Json<VideoInfoRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    state.videos.get_video_info(request, query).await
}

pub async fn download_route(
    State(state): State<AppState>,
    payload: Result<Json<DownloadRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    state.downloads.download_video(request).await
}

pub async fn resolutions_route(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({ "resolutions": state.formats.labels() }))
}

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/getVideoInfo", post(get_video_info_route))
        .route("/download", post(download_route))
        .route("/resolutions", get(resolutions_route))
}
