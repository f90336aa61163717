use std::sync::OnceLock;

use regex::Regex;
use url::Url;

fn video_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("valid video id regex"))
}

/// Format seconds as `MM:SS` using whole seconds, zero-padded.
///
/// Minutes are not wrapped into hours, so an 80 minute mark renders as `80:00`.
pub fn format_timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Format duration in human-readable format
pub fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds.max(0.0) as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Round to two decimal places, the precision used for durations and rates in responses
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Check whether a string already looks like a bare video id
pub fn is_video_id(input: &str) -> bool {
    video_id_regex().is_match(input)
}

/// Normalize user input into a video id.
///
/// Accepts a bare id or the usual YouTube URL shapes (`watch?v=`, `youtu.be/`,
/// `embed/`, `shorts/`, `live/`, `v/`). Anything unrecognized is returned
/// trimmed but otherwise untouched and left for the upstream to reject.
pub fn normalize_video_id(input: &str) -> String {
    let input = input.trim();
    if is_video_id(input) {
        return input.to_string();
    }

    let candidate = if input.starts_with("http://") || input.starts_with("https://") {
        input.to_string()
    } else {
        format!("https://{}", input)
    };

    match Url::parse(&candidate) {
        Ok(url) => extract_from_url(&url).unwrap_or_else(|| input.to_string()),
        Err(_) => input.to_string(),
    }
}

fn extract_from_url(url: &Url) -> Option<String> {
    let host = extract_domain(url.as_str())?;

    let id = if host == "youtu.be" {
        url.path_segments()?.next().map(str::to_string)
    } else if host.ends_with("youtube.com") || host.ends_with("youtube-nocookie.com") {
        if let Some((_, v)) = url.query_pairs().find(|(key, _)| key == "v") {
            Some(v.into_owned())
        } else {
            let mut segments = url.path_segments()?;
            match segments.next() {
                Some("embed" | "shorts" | "live" | "v") => segments.next().map(str::to_string),
                _ => None,
            }
        }
    } else {
        None
    }?;

    is_video_id(&id).then_some(id)
}

/// Extract domain from URL for display purposes
pub fn extract_domain(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()?
        .host_str()
        .map(|host| {
            // Remove 'www.' / mobile 'm.' prefixes
            let host = host.strip_prefix("www.").unwrap_or(host);
            host.strip_prefix("m.").unwrap_or(host).to_string()
        })
}
