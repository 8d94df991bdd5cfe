//! Resolution label → yt-dlp format-selection expression.

pub const CONTAINER_EXTENSION: &str = "mp4";
pub const BEST_LABEL: &str = "best";

const HEIGHTS: [u32; 6] = [360, 480, 720, 1080, 1440, 2160];
const BEST_EXPRESSION: &str = "bestvideo+bestaudio/best";

#[derive(Clone, Debug, PartialEq)]
pub struct FormatEntry {
    pub label: String,
    pub expression: String,
}

/// Built once at startup and shared read-only behind an `Arc`.
#[derive(Clone, Debug)]
pub struct FormatMap {
    entries: Vec<FormatEntry>,
}

impl FormatMap {
    pub fn standard() -> Self {
        let mut entries: Vec<FormatEntry> = HEIGHTS
            .iter()
            .map(|height| FormatEntry {
                label: format!("{height}p"),
                expression: height_chain(*height),
            })
            .collect();
        entries.push(FormatEntry {
            label: BEST_LABEL.to_string(),
            expression: BEST_EXPRESSION.to_string(),
        });
        Self { entries }
    }

    /// Case-insensitive lookup; unknown labels are not substituted.
    pub fn resolve(&self, label: &str) -> Option<&FormatEntry> {
        let label = label.trim();
        self.entries
            .iter()
            .find(|entry| entry.label.eq_ignore_ascii_case(label))
    }

    pub fn labels(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.label.as_str()).collect()
    }
}

/// Exact height with the mp4-friendly codec pair first, then the webm pair,
/// then any codec at that height, then the closest lower height, then anything.
fn height_chain(height: u32) -> String {
    [
        format!("bestvideo[height={height}][vcodec^=avc1]+bestaudio[acodec^=mp4a]"),
        format!("bestvideo[height={height}][vcodec^=vp9]+bestaudio[acodec^=opus]"),
        format!("bestvideo[height={height}]+bestaudio"),
        format!("bestvideo[height<={height}]+bestaudio"),
        "best".to_string(),
    ]
    .join("/")
}
