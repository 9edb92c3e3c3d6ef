//! Video transcripts (YouTube).
//!
//! The watch page embeds a `captionTracks` list; the first track matching
//! the preferred languages (manual captions before auto-generated ones) is
//! fetched as timed-text XML and flattened into one paragraph per cue.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::{GascError, Result};

use super::{wrong_kind, DocumentKind, DocumentSource, SourceLoader};

static CAPTION_TRACKS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""captionTracks"\s*:\s*"#).expect("caption tracks pattern"));

/// Loads the transcript of a YouTube video.
pub struct VideoLoader {
    client: Client,
    languages: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptionTrack {
    base_url: String,
    language_code: String,
    /// "asr" for auto-generated captions
    #[serde(default)]
    kind: Option<String>,
}

impl CaptionTrack {
    fn is_generated(&self) -> bool {
        self.kind.as_deref() == Some("asr")
    }
}

impl VideoLoader {
    pub fn new(client: Client, languages: Vec<String>) -> Self {
        Self { client, languages }
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .header("Accept-Language", "en-US,en;q=0.8")
            .send()
            .await
            .map_err(|e| GascError::load(DocumentKind::Video, format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(GascError::load(
                DocumentKind::Video,
                format!("{} returned {}", url, response.status()),
            ));
        }

        response
            .text()
            .await
            .map_err(|e| GascError::load(DocumentKind::Video, format!("unreadable body: {}", e)))
    }

    async fn transcript(&self, url: &str) -> Result<String> {
        let video_id = video_id(url)?;
        let page = self
            .get_text(&format!("https://www.youtube.com/watch?v={}", video_id))
            .await?;

        let tracks = caption_tracks(&page)?;
        let track = pick_track(&tracks, &self.languages).ok_or_else(|| {
            GascError::load(
                DocumentKind::Video,
                format!("no captions available for video {}", video_id),
            )
        })?;
        debug!(video_id, language = %track.language_code, generated = track.is_generated(), "Fetching captions");

        let xml = self.get_text(&track.base_url).await?;
        parse_timed_text(&xml)
    }
}

#[async_trait]
impl SourceLoader for VideoLoader {
    async fn load(&self, source: &DocumentSource) -> Result<String> {
        match source {
            DocumentSource::Video(url) => self.transcript(url).await,
            other => Err(wrong_kind(DocumentKind::Video, other)),
        }
    }
}

/// Extracts the video id from the usual YouTube URL shapes.
pub(crate) fn video_id(raw: &str) -> Result<String> {
    let invalid = || GascError::load(DocumentKind::Video, format!("not a YouTube video URL: {}", raw));
    let url = Url::parse(raw.trim()).map_err(|_| invalid())?;
    let host = url.host_str().unwrap_or_default().trim_start_matches("www.").trim_start_matches("m.");

    let id = match host {
        "youtu.be" => url.path_segments().and_then(|mut s| s.next()).map(str::to_string),
        "youtube.com" | "music.youtube.com" | "youtube-nocookie.com" => {
            let segments: Vec<&str> = url.path_segments().map(|s| s.collect()).unwrap_or_default();
            match segments.as_slice() {
                ["watch", ..] => url
                    .query_pairs()
                    .find(|(k, _)| k == "v")
                    .map(|(_, v)| v.into_owned()),
                ["shorts", id, ..] | ["embed", id, ..] | ["live", id, ..] | ["v", id, ..] => {
                    Some(id.to_string())
                }
                _ => None,
            }
        }
        _ => None,
    };

    id.filter(|id| {
        !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    })
    .ok_or_else(invalid)
}

fn caption_tracks(page: &str) -> Result<Vec<CaptionTrack>> {
    let start = CAPTION_TRACKS
        .find(page)
        .ok_or_else(|| GascError::load(DocumentKind::Video, "video has no caption tracks"))?
        .end();

    // The list is followed by the rest of the player JSON; read one value only
    serde_json::Deserializer::from_str(&page[start..])
        .into_iter::<Vec<CaptionTrack>>()
        .next()
        .unwrap_or_else(|| Err(serde::de::Error::custom("unexpected end of page")))
        .map_err(|e| GascError::load(DocumentKind::Video, format!("malformed caption list: {}", e)))
}

/// Preferred language first; manual captions before generated ones.
fn pick_track<'a>(tracks: &'a [CaptionTrack], languages: &[String]) -> Option<&'a CaptionTrack> {
    let matches = |track: &CaptionTrack, lang: &str| {
        track.language_code == lang || track.language_code.starts_with(&format!("{}-", lang))
    };

    for lang in languages {
        for generated in [false, true] {
            if let Some(track) = tracks
                .iter()
                .find(|t| t.is_generated() == generated && matches(t, lang))
            {
                return Some(track);
            }
        }
    }

    tracks.first()
}

/// Flattens `<transcript><text ...>cue</text>...</transcript>` into lines.
pub(crate) fn parse_timed_text(xml: &str) -> Result<String> {
    let xml_error = |e: String| GascError::load(DocumentKind::Video, format!("malformed captions: {}", e));
    let mut reader = Reader::from_str(xml);
    let mut cues: Vec<String> = Vec::new();
    let mut current: Option<String> = None;

    loop {
        match reader.read_event().map_err(|e| xml_error(e.to_string()))? {
            Event::Start(e) if e.name().as_ref() == b"text" => current = Some(String::new()),
            Event::Text(t) => {
                if let Some(cue) = current.as_mut() {
                    cue.push_str(&t.decode().map_err(|e| xml_error(e.to_string()))?);
                }
            }
            Event::CData(t) => {
                if let Some(cue) = current.as_mut() {
                    cue.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Event::GeneralRef(r) => {
                if let Some(cue) = current.as_mut() {
                    if let Some(ch) = r.resolve_char_ref().map_err(|e| xml_error(e.to_string()))? {
                        cue.push(ch);
                    } else {
                        let name = r.decode().map_err(|e| xml_error(e.to_string()))?;
                        match quick_xml::escape::resolve_predefined_entity(&name) {
                            Some(value) => cue.push_str(value),
                            None => {
                                cue.push('&');
                                cue.push_str(&name);
                                cue.push(';');
                            }
                        }
                    }
                }
            }
            Event::End(e) if e.name().as_ref() == b"text" => {
                if let Some(cue) = current.take() {
                    // Captions are often escaped twice
                    let cue = quick_xml::escape::unescape(&cue)
                        .map(|c| c.into_owned())
                        .unwrap_or(cue);
                    let cue = cue.split_whitespace().collect::<Vec<_>>().join(" ");
                    if !cue.is_empty() {
                        cues.push(cue);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(cues.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_id_shapes() {
        for url in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtube.com/watch?feature=share&v=dQw4w9WgXcQ",
            "https://m.youtube.com/watch?v=dQw4w9WgXcQ&t=42s",
            "https://youtu.be/dQw4w9WgXcQ?si=abc",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
        ] {
            assert_eq!(video_id(url).unwrap(), "dQw4w9WgXcQ", "{}", url);
        }
    }

    #[test]
    fn test_video_id_rejects() {
        assert!(video_id("https://vimeo.com/12345").is_err());
        assert!(video_id("https://www.youtube.com/feed/trending").is_err());
        assert!(video_id("https://www.youtube.com/watch?v=").is_err());
        assert!(video_id("not a url").is_err());
    }

    #[test]
    fn test_caption_tracks_from_page() {
        let page = r#"var ytInitialPlayerResponse = {"captions":{"playerCaptionsTracklistRenderer":{"captionTracks":[{"baseUrl":"https://www.youtube.com/api/timedtext?v=x&lang=en","languageCode":"en","kind":"asr"},{"baseUrl":"https://www.youtube.com/api/timedtext?v=x&lang=pt-BR","languageCode":"pt-BR"}],"audioTracks":[]}}};"#;
        let tracks = caption_tracks(page).unwrap();
        assert_eq!(tracks.len(), 2);
        assert!(tracks[0].is_generated());
        assert_eq!(tracks[1].language_code, "pt-BR");
    }

    #[test]
    fn test_caption_tracks_with_nested_names() {
        let page = r#"{"captionTracks":[{"baseUrl":"https://www.youtube.com/api/timedtext?v=x&lang=en","name":{"runs":[{"text":"English"}]},"vssId":".en","languageCode":"en","isTranslatable":true},{"baseUrl":"https://www.youtube.com/api/timedtext?v=x&lang=pt","name":{"runs":[{"text":"Portuguese (auto-generated)"}]},"languageCode":"pt","kind":"asr"}],"translationLanguages":[{"languageCode":"de"}]}"#;
        let tracks = caption_tracks(page).unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].language_code, "en");
        assert!(tracks[0].base_url.ends_with("lang=en"));
        assert!(tracks[1].is_generated());
    }

    #[test]
    fn test_caption_tracks_truncated() {
        let err = caption_tracks(r#"{"captionTracks":[{"baseUrl":"x","#).unwrap_err();
        assert!(err.to_string().contains("malformed caption list"));
    }

    #[test]
    fn test_caption_tracks_missing() {
        let err = caption_tracks("<html>no player here</html>").unwrap_err();
        assert!(err.to_string().contains("no caption tracks"));
    }

    fn track(lang: &str, kind: Option<&str>) -> CaptionTrack {
        CaptionTrack {
            base_url: format!("https://example.com/{}", lang),
            language_code: lang.to_string(),
            kind: kind.map(str::to_string),
        }
    }

    #[test]
    fn test_pick_track_preferences() {
        let languages = vec!["pt".to_string(), "en".to_string()];
        let tracks = vec![
            track("en", None),
            track("pt", Some("asr")),
            track("pt-BR", None),
        ];
        assert_eq!(pick_track(&tracks, &languages).unwrap().language_code, "pt-BR");

        let tracks = vec![track("de", None), track("en", Some("asr"))];
        assert_eq!(pick_track(&tracks, &languages).unwrap().language_code, "en");

        let tracks = vec![track("de", None)];
        assert_eq!(pick_track(&tracks, &languages).unwrap().language_code, "de");

        assert!(pick_track(&[], &languages).is_none());
    }

    #[test]
    fn test_parse_timed_text() {
        let xml = r#"<?xml version="1.0" encoding="utf-8" ?><transcript><text start="0.5" dur="2.1">Welcome to the   release</text><text start="2.6" dur="1.9">It&amp;#39;s version 2.0</text><text start="4.5" dur="1"> </text></transcript>"#;
        let text = parse_timed_text(xml).unwrap();
        assert_eq!(text, "Welcome to the release\nIt's version 2.0");
    }

    #[test]
    fn test_parse_timed_text_bare_ampersand() {
        let xml = r#"<transcript><text start="0" dur="1">Q&amp;A &amp; more</text></transcript>"#;
        assert_eq!(parse_timed_text(xml).unwrap(), "Q&A & more");
    }

    #[test]
    fn test_parse_timed_text_empty() {
        assert_eq!(parse_timed_text("<transcript></transcript>").unwrap(), "");
    }
}
