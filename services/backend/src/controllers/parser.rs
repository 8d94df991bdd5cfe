use tracing::debug;

use crate::models::format::CONTAINER_EXTENSION;

/// Hosts whose URLs carry a video id we know how to read.
const YOUTUBE_DOMAINS: &[&str] = &["youtube.com", "youtube-nocookie.com"];
const SHORT_LINK_DOMAINS: &[&str] = &["youtu.be"];

const FALLBACK_STEM: &str = "video";

fn host_matches(host: &str, domains: &[&str]) -> bool {
    domains
        .iter()
        .any(|&allowed| host == allowed || host.ends_with(&format!(".{}", allowed)))
}

/// Extracts the video id from the usual YouTube URL shapes. Returns `None`
/// for anything else; the media tool stays the authority on what is valid.
pub fn video_id(link: &str) -> Option<String> {
    let link = link.trim();
    let parsed = url::Url::parse(link)
        .or_else(|_| url::Url::parse(&format!("https://{}", link)))
        .ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();

    let id = if host_matches(&host, SHORT_LINK_DOMAINS) {
        parsed.path_segments()?.next().map(str::to_string)
    } else if host_matches(&host, YOUTUBE_DOMAINS) {
        let from_query = parsed
            .query_pairs()
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.into_owned());
        from_query.or_else(|| {
            let mut segments = parsed.path_segments()?;
            match segments.next()? {
                "shorts" | "embed" | "live" | "v" => segments.next().map(str::to_string),
                _ => None,
            }
        })
    } else {
        None
    };

    let id = id.filter(|id| {
        !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    });
    debug!("video_id({}) = {:?}", link, id);
    id
}

pub fn thumbnail_url(video_id: &str) -> String {
    format!("https://img.youtube.com/vi/{}/hqdefault.jpg", video_id)
}

/// Lowercases and collapses every run of characters outside `[a-z0-9]` into a
/// single `_`, without leading or trailing separators. Applying it twice gives
/// the same result as applying it once.
pub fn sanitize_title(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut pending_separator = false;
    for c in title.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_separator && !out.is_empty() {
                out.push('_');
            }
            pending_separator = false;
            out.push(c);
        } else {
            pending_separator = true;
        }
    }
    if out.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        out
    }
}

/// `<sanitized title>_<label>.mp4`
pub fn output_filename(title: &str, label: &str) -> String {
    format!(
        "{}_{}.{}",
        sanitize_title(title),
        sanitize_title(label),
        CONTAINER_EXTENSION
    )
}
