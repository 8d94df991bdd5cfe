pub mod root;
pub mod video;

use axum::{Router, http::header, routing::get};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use root::{health_check_route, root_route};
pub use video::api_routes;

use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    // The browser reads the attachment name from Content-Disposition, which
    // is not a CORS-safelisted response header.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([header::CONTENT_DISPOSITION]);

    Router::new()
        .route("/", get(root_route))
        .route("/health", get(health_check_route))
        .nest("/api", api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
        response::Response,
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::{
        controllers::Delivery, models::format::FormatMap, tool::testing::ScriptedTool,
    };

    fn router(tool: &Arc<ScriptedTool>) -> Router {
        app(AppState::new(
            tool.clone(),
            FormatMap::standard(),
            Delivery::Stream,
        ))
    }

    async fn post_json(router: Router, uri: &str, body: Value) -> Response {
        router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    async fn get_request(router: Router, uri: &str) -> Response {
        router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn video_info_requires_url() {
        let tool = Arc::new(ScriptedTool::new());
        for body in [json!({}), json!({ "url": "" }), json!({ "url": null })] {
            let response = post_json(router(&tool), "/api/getVideoInfo", body).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(json_body(response).await["error"], "URL is required");
        }
        assert!(tool.calls().is_empty());
    }

    #[tokio::test]
    async fn video_info_returns_title() {
        let tool = Arc::new(ScriptedTool::new().with_stdout(
            r#"{"id":"abc","title":"Example Video","thumbnail":"https://i.ytimg.com/vi/abc/hq.jpg","formats":[{"format_id":"18"}]}"#,
        ));
        let response = post_json(
            router(&tool),
            "/api/getVideoInfo",
            json!({ "url": "https://youtu.be/abc" }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["title"], "Example Video");
        assert_eq!(body["thumbnail"], "https://i.ytimg.com/vi/abc/hq.jpg");
        assert!(body.get("formats").is_none());
        assert_eq!(tool.calls().len(), 1);
    }

    #[tokio::test]
    async fn video_info_full_payload_on_request() {
        let tool = Arc::new(
            ScriptedTool::new().with_stdout(r#"{"title":"Example Video","formats":[{"format_id":"18"}]}"#),
        );
        let response = post_json(
            router(&tool),
            "/api/getVideoInfo?full=true",
            json!({ "url": "https://youtu.be/abc" }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["title"], "Example Video");
        assert_eq!(body["formats"][0]["format_id"], "18");
    }

    #[tokio::test]
    async fn video_info_tool_failure_is_server_error() {
        let tool = Arc::new(ScriptedTool::new().with_failure("ERROR: [youtube] abc: Video unavailable"));
        let response = post_json(
            router(&tool),
            "/api/getVideoInfo",
            json!({ "url": "https://youtu.be/abc" }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert_eq!(body["error"], "Failed to fetch video info");
        assert!(body["details"].as_str().unwrap().contains("Video unavailable"));
    }

    #[tokio::test]
    async fn video_info_invalid_json_output_is_server_error() {
        let tool = Arc::new(ScriptedTool::new().with_stdout("{\"title\": "));
        let response = post_json(
            router(&tool),
            "/api/getVideoInfo",
            json!({ "url": "https://youtu.be/abc" }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await["error"], "Failed to parse video info");
    }

    #[tokio::test]
    async fn malformed_body_is_client_error() {
        let tool = Arc::new(ScriptedTool::new());
        let response = router(&tool)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/getVideoInfo")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("url=https://youtu.be/abc"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["error"].is_string());
        assert!(tool.calls().is_empty());
    }

    #[tokio::test]
    async fn download_requires_url_and_resolution() {
        let tool = Arc::new(ScriptedTool::new());
        for body in [
            json!({ "url": "https://youtu.be/abc" }),
            json!({ "resolution": "720p" }),
            json!({ "url": " ", "resolution": "720p" }),
        ] {
            let response = post_json(router(&tool), "/api/download", body).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(
                json_body(response).await["error"],
                "URL and resolution are required"
            );
        }
        assert!(tool.calls().is_empty());
    }

    #[tokio::test]
    async fn download_rejects_unknown_resolution() {
        let tool = Arc::new(ScriptedTool::new());
        let response = post_json(
            router(&tool),
            "/api/download",
            json!({ "url": "https://youtu.be/abc", "resolution": "4320p" }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "Invalid resolution: 4320p");
        assert!(tool.calls().is_empty());
    }

    #[tokio::test]
    async fn download_streams_tool_output_verbatim() {
        let tool = Arc::new(ScriptedTool::new().with_chunks(vec![
            Ok(&b"\x00\x00\x00\x18ftypmp42"[..]),
            Ok(&b"\xff\xfe"[..]),
            Ok(&b"moov"[..]),
        ]));
        let response = post_json(
            router(&tool),
            "/api/download",
            json!({
                "url": "https://youtu.be/abc",
                "resolution": "720p",
                "title": "My Video! (2024)",
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "video/mp4");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"my_video_2024_720p.mp4\""
        );
        assert!(headers.get(header::CONTENT_LENGTH).is_none());

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"\x00\x00\x00\x18ftypmp42\xff\xfemoov");

        let calls = tool.calls();
        assert_eq!(calls.len(), 1);
        let expression = FormatMap::standard().resolve("720p").unwrap().expression.clone();
        assert!(calls[0].contains(&expression));
        assert_eq!(calls[0].last().unwrap(), "https://youtu.be/abc");
    }

    #[tokio::test]
    async fn download_failure_before_first_byte_is_server_error() {
        let tool = Arc::new(ScriptedTool::new().with_chunks(vec![Err("yt-dlp exited with exit status: 1")]));
        let response = post_json(
            router(&tool),
            "/api/download",
            json!({ "url": "https://youtu.be/abc", "resolution": "1080p", "title": "t" }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await, json!({ "error": "Download failed" }));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn dropped_download_body_kills_the_tool() {
        use futures_util::StreamExt;

        use crate::tool::{YtDlp, testing::wait_for_exit};

        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("pid");
        let script = format!("echo $$ > '{}'; exec yes", pid_file.display());
        let tool = YtDlp::new("sh", vec!["-c".to_string(), script]);
        let router = app(AppState::new(
            Arc::new(tool),
            FormatMap::standard(),
            Delivery::Stream,
        ));

        let response = post_json(
            router,
            "/api/download",
            json!({ "url": "https://youtu.be/abc", "resolution": "720p", "title": "t" }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let mut body = response.into_body().into_data_stream();
        let first = body.next().await.unwrap().unwrap();
        assert!(first.starts_with(b"y\n"));
        let pid: u32 = std::fs::read_to_string(&pid_file)
            .unwrap()
            .trim()
            .parse()
            .unwrap();

        drop(body);

        assert!(
            wait_for_exit(pid).await,
            "yt-dlp {pid} outlived the client connection"
        );
    }

    #[tokio::test]
    async fn resolutions_are_listed_in_order() {
        let tool = Arc::new(ScriptedTool::new());
        let body = json_body(get_request(router(&tool), "/api/resolutions").await).await;
        assert_eq!(
            body["resolutions"],
            json!(["360p", "480p", "720p", "1080p", "1440p", "2160p", "best"])
        );
    }

    #[tokio::test]
    async fn root_and_health_respond() {
        let tool = Arc::new(ScriptedTool::new());
        let health = get_request(router(&tool), "/health").await;
        assert_eq!(health.status(), StatusCode::OK);
        assert_eq!(json_body(health).await["status"], "ok");

        let root = get_request(router(&tool), "/").await;
        assert_eq!(root.status(), StatusCode::OK);
        assert_eq!(json_body(root).await["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn cors_exposes_content_disposition() {
        let tool = Arc::new(ScriptedTool::new());
        let response = router(&tool)
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header(header::ORIGIN, "http://localhost:5173")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(
            headers[header::ACCESS_CONTROL_EXPOSE_HEADERS]
                .to_str()
                .unwrap()
                .contains("content-disposition")
        );
    }
}
