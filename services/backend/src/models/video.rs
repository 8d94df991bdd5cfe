use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fields are optional so a missing value becomes a 400 from our own
/// validation instead of an extractor rejection.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct VideoInfoRequest {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct DownloadRequest {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub resolution: Option<String>,
    /// Title the client already got from `/api/getVideoInfo`, used for the
    /// attachment filename.
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct InfoQuery {
    #[serde(default)]
    pub full: bool,
}

/// Raw payload printed by the media tool. Its shape belongs to the tool and
/// changes between releases, so nothing here assumes a schema.
#[derive(Clone, Debug)]
pub struct VideoInfo(pub Value);

impl VideoInfo {
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn f64_field(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(Value::as_f64)
    }

    pub fn title(&self) -> Option<&str> {
        self.str_field("title")
    }

    pub fn into_inner(self) -> Value {
        self.0
    }
}

/// The subset of [`VideoInfo`] the client actually renders.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct VideoSummary {
    pub id: Option<String>,
    pub title: Option<String>,
    pub thumbnail: Option<String>,
    pub duration: Option<f64>,
    pub uploader: Option<String>,
    pub webpage_url: Option<String>,
}

/// Returns the trimmed value when present and non-blank.
pub fn non_empty(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
