use crate::error::{Error, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use yt_transcript_rs::api::YouTubeTranscriptApi;

const MIN_TRANSCRIPT_CHARS: usize = 10;
const MAX_VIDEO_ID_LEN: usize = 128;
const HOST_MARKERS: &[&str] = &["youtube.com", "youtu.be"];

static VIDEO_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:youtube\.com/watch\?(?:[^#]*&)?v=|youtu\.be/|youtube\.com/(?:embed|shorts)/)([A-Za-z0-9_-]{11})")
        .expect("valid video id regex")
});
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoContent {
    pub video_id: String,
    pub title: String,
    pub transcript: String,
    /// Non-fatal problems met while fetching, e.g. a missing title.
    pub warnings: Vec<String>,
}

/// Turns a video reference into a title and plain-text transcript.
#[async_trait]
pub trait VideoSource: Send + Sync {
    async fn fetch(&self, video_reference: &str) -> Result<VideoContent>;
}

#[derive(Clone)]
pub struct YoutubeSource {
    api: YouTubeTranscriptApi,
    languages: Vec<String>,
}

impl YoutubeSource {
    pub fn new(languages: Vec<String>) -> Result<Self> {
        let api = YouTubeTranscriptApi::new(None, None, None)
            .map_err(|e| Error::retrieval(format!("Could not initialise YouTube client: {e}")))?;
        Ok(Self { api, languages })
    }

    async fn fetch_transcript(&self, video_id: &str) -> Result<String> {
        let languages: Vec<&str> = self.languages.iter().map(String::as_str).collect();

        let fetched = self
            .api
            .fetch_transcript(video_id, &languages, false)
            .await
            .map_err(|e| {
                Error::retrieval(format!(
                    "Could not retrieve transcript: {e}. The video might not have captions available or may be private/restricted."
                ))
            })?;

        let joined = fetched
            .snippets
            .iter()
            .map(|snippet| snippet.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        Ok(clean_transcript(&joined))
    }

    async fn fetch_title(&self, video_id: &str) -> Result<String> {
        let details = self
            .api
            .fetch_video_details(video_id)
            .await
            .map_err(|e| Error::retrieval(format!("Could not retrieve video title: {e}")))?;

        let title = details.title.trim().to_string();
        if title.is_empty() {
            return Err(Error::retrieval("Could not retrieve video title: empty title"));
        }
        Ok(title)
    }
}

#[async_trait]
impl VideoSource for YoutubeSource {
    async fn fetch(&self, video_reference: &str) -> Result<VideoContent> {
        let video_id = extract_video_id(video_reference)?;
        log::info!("Fetching transcript for video {video_id}");

        let transcript = self.fetch_transcript(&video_id).await?;
        if transcript.chars().count() < MIN_TRANSCRIPT_CHARS {
            return Err(Error::retrieval(
                "Retrieved transcript is too short or empty",
            ));
        }

        let mut warnings = Vec::new();
        let title = match self.fetch_title(&video_id).await {
            Ok(title) => title,
            Err(e) => {
                log::warn!("{e}");
                warnings.push(e.to_string());
                fallback_title(&video_id)
            }
        };

        Ok(VideoContent {
            video_id,
            title,
            transcript,
            warnings,
        })
    }
}

pub fn fallback_title(video_id: &str) -> String {
    format!("YouTube Video ({video_id})")
}

/// Collapses runs of whitespace (including caption line breaks) into single spaces.
pub fn clean_transcript(raw: &str) -> String {
    WHITESPACE.replace_all(raw, " ").trim().to_string()
}

pub fn is_video_platform_url(reference: &str) -> bool {
    let lower = reference.to_lowercase();
    HOST_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Rejects anything that is not a YouTube link before any network call is made.
pub fn extract_video_id(url: &str) -> Result<String> {
    let url = url.trim();
    if url.is_empty() {
        return Err(Error::retrieval("Please provide a valid YouTube URL"));
    }
    if !is_video_platform_url(url) {
        return Err(Error::retrieval(
            "Please provide a valid YouTube URL (youtube.com or youtu.be)",
        ));
    }

    if let Some(caps) = VIDEO_ID.captures(url) {
        return sanitize_video_id(&caps[1]);
    }

    // Looser forms, e.g. ids of unusual length.
    let raw_id = if let Some(v_param) = url.split("v=").nth(1) {
        v_param.split(['&', '#']).next().unwrap_or(v_param)
    } else if let Some(youtu_be) = url.split("youtu.be/").nth(1) {
        youtu_be.split(['?', '&']).next().unwrap_or(youtu_be)
    } else {
        return Err(Error::retrieval("Could not extract video ID from URL"));
    };

    sanitize_video_id(raw_id)
}

/// Only ASCII alphanumeric characters plus `_` and `-` are allowed.
pub fn sanitize_video_id(raw: &str) -> Result<String> {
    let trimmed = raw.trim();

    if trimmed.is_empty() {
        return Err(Error::retrieval("Video ID cannot be empty"));
    }

    if trimmed.len() > MAX_VIDEO_ID_LEN {
        return Err(Error::retrieval("Video ID is unexpectedly long"));
    }

    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
    {
        return Err(Error::retrieval(
            "Video ID contains unsupported characters; expected only letters, numbers, '-' or '_'",
        ));
    }

    Ok(trimmed.to_string())
}
