use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::COOKIE;
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

use super::timedtext::parse_timedtext;
use super::{CaptionError, CaptionFetcher, CaptionSegment, DEFAULT_LANGUAGE};
use crate::net::Transport;

const WATCH_URL: &str = "https://www.youtube.com/watch";
const PLAYER_API_URL: &str = "https://www.youtube.com/youtubei/v1/player";
const CONSENT_FORM_MARKER: &str = "action=\"https://consent.youtube.com/s\"";
const RECAPTCHA_MARKER: &str = "class=\"g-recaptcha\"";

/// Client identity sent to the innertube player endpoint
const INNERTUBE_CLIENT_NAME: &str = "ANDROID";
const INNERTUBE_CLIENT_VERSION: &str = "20.10.38";

fn api_key_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#""INNERTUBE_API_KEY":\s*"([a-zA-Z0-9_-]+)""#).expect("valid api key regex")
    })
}

fn consent_value_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"name="v" value="(.*?)""#).expect("valid consent regex"))
}

/// Caption track entry from the player response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionTrack {
    pub base_url: String,
    pub language_code: String,
    #[serde(default)]
    pub kind: Option<String>,
}

impl CaptionTrack {
    /// Auto-generated speech recognition track
    pub fn is_generated(&self) -> bool {
        self.kind.as_deref() == Some("asr")
    }
}

/// Fetches captions from YouTube's watch page, innertube player API and timed-text endpoint
pub struct YoutubeCaptionFetcher {
    language: String,
}

impl YoutubeCaptionFetcher {
    pub fn new() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }

    async fn fetch_video_html(&self, video_id: &str, transport: &Transport) -> Result<String, CaptionError> {
        let html = self.get_watch_page(video_id, transport, None).await?;
        if !html.contains(CONSENT_FORM_MARKER) {
            return Ok(html);
        }

        tracing::debug!(video_id = %video_id, "accepting consent interstitial");
        let consent = consent_value_regex()
            .captures(&html)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| CaptionError::Parse("consent form without a value".to_string()))?;

        let cookie = format!("CONSENT=YES+{}", consent);
        let html = self.get_watch_page(video_id, transport, Some(&cookie)).await?;
        if html.contains(CONSENT_FORM_MARKER) {
            return Err(CaptionError::Parse("consent interstitial could not be accepted".to_string()));
        }
        Ok(html)
    }

    async fn get_watch_page(
        &self,
        video_id: &str,
        transport: &Transport,
        cookie: Option<&str>,
    ) -> Result<String, CaptionError> {
        let url = format!("{}?v={}", WATCH_URL, urlencoding::encode(video_id));
        let mut request = transport.get(&url);
        if let Some(cookie) = cookie {
            request = request.header(COOKIE, cookie);
        }

        let response = check_status(request.send().await?, video_id, "watch page")?;
        Ok(response.text().await?)
    }

    async fn fetch_player_response(
        &self,
        video_id: &str,
        api_key: &str,
        transport: &Transport,
    ) -> Result<Value, CaptionError> {
        let url = format!("{}?key={}", PLAYER_API_URL, urlencoding::encode(api_key));
        let body = json!({
            "context": {
                "client": {
                    "clientName": INNERTUBE_CLIENT_NAME,
                    "clientVersion": INNERTUBE_CLIENT_VERSION,
                }
            },
            "videoId": video_id,
        });

        let response = check_status(transport.post(&url).json(&body).send().await?, video_id, "player API")?;
        Ok(response.json::<Value>().await?)
    }

    async fn fetch_timedtext(
        &self,
        video_id: &str,
        track: &CaptionTrack,
        transport: &Transport,
    ) -> Result<String, CaptionError> {
        let url = track.base_url.replace("&fmt=srv3", "");
        let response = check_status(transport.get(&url).send().await?, video_id, "timed text")?;
        Ok(response.text().await?)
    }
}

impl Default for YoutubeCaptionFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaptionFetcher for YoutubeCaptionFetcher {
    async fn fetch(
        &self,
        video_id: &str,
        transport: &Transport,
    ) -> Result<Vec<CaptionSegment>, CaptionError> {
        tracing::debug!(video_id = %video_id, via = %transport.describe(), "fetching captions");

        let html = self.fetch_video_html(video_id, transport).await?;
        let api_key = extract_api_key(video_id, &html)?;
        let player = self.fetch_player_response(video_id, &api_key, transport).await?;

        check_playability(video_id, &player)?;
        let tracks = caption_tracks(video_id, &player)?;
        let track = select_track(video_id, &self.language, &tracks)?;

        let xml = self.fetch_timedtext(video_id, track, transport).await?;
        let segments = parse_timedtext(&xml)?;

        tracing::debug!(
            video_id = %video_id,
            language = %track.language_code,
            generated = track.is_generated(),
            segments = segments.len(),
            "captions fetched"
        );

        Ok(segments)
    }
}

fn check_status(response: Response, video_id: &str, endpoint: &'static str) -> Result<Response, CaptionError> {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(CaptionError::TooManyRequests {
            video_id: video_id.to_string(),
        });
    }
    if !status.is_success() {
        return Err(CaptionError::HttpStatus {
            endpoint,
            status: status.as_u16(),
        });
    }
    Ok(response)
}

/// Pull the innertube API key out of the watch page
pub fn extract_api_key(video_id: &str, html: &str) -> Result<String, CaptionError> {
    if let Some(key) = api_key_regex().captures(html).and_then(|caps| caps.get(1)) {
        return Ok(key.as_str().to_string());
    }

    if html.contains(RECAPTCHA_MARKER) {
        return Err(CaptionError::TooManyRequests {
            video_id: video_id.to_string(),
        });
    }
    Err(CaptionError::Parse("watch page has no INNERTUBE_API_KEY".to_string()))
}

/// Map a non-playable status to the matching failure
pub fn check_playability(video_id: &str, player: &Value) -> Result<(), CaptionError> {
    let playability = &player["playabilityStatus"];
    let status = playability["status"].as_str().unwrap_or("OK");
    if status == "OK" {
        return Ok(());
    }

    let reason = playability["reason"].as_str().unwrap_or(status).to_string();
    if status == "LOGIN_REQUIRED" && reason.to_lowercase().contains("not a bot") {
        return Err(CaptionError::RequestBlocked {
            video_id: video_id.to_string(),
            reason,
        });
    }

    Err(CaptionError::VideoUnavailable {
        video_id: video_id.to_string(),
        reason,
    })
}

/// Caption tracks listed in the player response
pub fn caption_tracks(video_id: &str, player: &Value) -> Result<Vec<CaptionTrack>, CaptionError> {
    let tracks = &player["captions"]["playerCaptionsTracklistRenderer"]["captionTracks"];
    if !tracks.is_array() {
        return Err(CaptionError::TranscriptsDisabled {
            video_id: video_id.to_string(),
        });
    }

    let tracks: Vec<CaptionTrack> = serde_json::from_value(tracks.clone())
        .map_err(|e| CaptionError::Parse(format!("caption track list: {}", e)))?;

    if tracks.is_empty() {
        return Err(CaptionError::TranscriptsDisabled {
            video_id: video_id.to_string(),
        });
    }
    Ok(tracks)
}

/// Choose the best track for `language`.
///
/// Manually created tracks win over generated ones, exact language codes over
/// regional variants (`en` before `en-GB`).
pub fn select_track<'a>(
    video_id: &str,
    language: &str,
    tracks: &'a [CaptionTrack],
) -> Result<&'a CaptionTrack, CaptionError> {
    let regional = format!("{}-", language);
    let exact = |t: &&CaptionTrack| t.language_code == language;
    let variant = |t: &&CaptionTrack| t.language_code.starts_with(&regional);

    let manual = || tracks.iter().filter(|t| !t.is_generated());
    let generated = || tracks.iter().filter(|t| t.is_generated());

    manual()
        .find(exact)
        .or_else(|| manual().find(variant))
        .or_else(|| generated().find(exact))
        .or_else(|| generated().find(variant))
        .ok_or_else(|| {
            let available = tracks
                .iter()
                .map(|t| t.language_code.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            CaptionError::NoTranscriptFound {
                video_id: video_id.to_string(),
                language: language.to_string(),
                available,
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(lang: &str, kind: Option<&str>) -> CaptionTrack {
        CaptionTrack {
            base_url: format!("https://www.youtube.com/api/timedtext?lang={}", lang),
            language_code: lang.to_string(),
            kind: kind.map(str::to_string),
        }
    }

    #[test]
    fn extracts_api_key() {
        let html = r#"<script>ytcfg.set({"INNERTUBE_API_KEY": "AIzaSyTest_key-1"});</script>"#;
        assert_eq!(extract_api_key("vid", html).unwrap(), "AIzaSyTest_key-1");
    }

    #[test]
    fn recaptcha_page_means_too_many_requests() {
        let html = r#"<form><div class="g-recaptcha"></div></form>"#;
        assert!(matches!(
            extract_api_key("vid", html),
            Err(CaptionError::TooManyRequests { .. })
        ));
        assert!(matches!(extract_api_key("vid", "<html></html>"), Err(CaptionError::Parse(_))));
    }

    #[test]
    fn playability_maps_bot_check_to_blocked() {
        let player = json!({
            "playabilityStatus": {"status": "LOGIN_REQUIRED", "reason": "Sign in to confirm you're not a bot"}
        });
        assert!(matches!(
            check_playability("vid", &player),
            Err(CaptionError::RequestBlocked { .. })
        ));

        let player = json!({"playabilityStatus": {"status": "ERROR", "reason": "This video is unavailable"}});
        assert!(matches!(
            check_playability("vid", &player),
            Err(CaptionError::VideoUnavailable { .. })
        ));

        let player = json!({"playabilityStatus": {"status": "OK"}});
        assert!(check_playability("vid", &player).is_ok());
    }

    #[test]
    fn missing_track_list_means_disabled() {
        let player = json!({"playabilityStatus": {"status": "OK"}});
        assert!(matches!(
            caption_tracks("vid", &player),
            Err(CaptionError::TranscriptsDisabled { .. })
        ));

        let player = json!({
            "captions": {"playerCaptionsTracklistRenderer": {"captionTracks": [
                {"baseUrl": "https://example/tt", "languageCode": "en", "kind": "asr"}
            ]}}
        });
        let tracks = caption_tracks("vid", &player).unwrap();
        assert_eq!(tracks.len(), 1);
        assert!(tracks[0].is_generated());
    }

    #[test]
    fn selects_manual_before_generated() {
        let tracks = vec![track("en", Some("asr")), track("de", None), track("en", None)];
        let chosen = select_track("vid", "en", &tracks).unwrap();
        assert_eq!(chosen.language_code, "en");
        assert!(!chosen.is_generated());
    }

    #[test]
    fn falls_back_to_regional_and_generated_tracks() {
        let tracks = vec![track("en-GB", None), track("fr", None)];
        assert_eq!(select_track("vid", "en", &tracks).unwrap().language_code, "en-GB");

        let tracks = vec![track("en", Some("asr")), track("fr", None)];
        assert!(select_track("vid", "en", &tracks).unwrap().is_generated());
    }

    #[test]
    fn reports_available_languages_when_missing() {
        let tracks = vec![track("de", None), track("fr", Some("asr"))];
        let err = select_track("vid", "en", &tracks).unwrap_err();

        assert!(matches!(err, CaptionError::NoTranscriptFound { .. }));
        assert!(err.to_string().contains("available: de, fr"));
    }
}
