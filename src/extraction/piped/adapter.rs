//! Convert Piped DTOs to domain types.

use super::dto;
use crate::extraction::domain::{
    AudioFormat, ProviderResult, ResolutionError, ResolvedStream, StreamOption, StreamPreferences,
    select_stream,
};
use crate::extraction::ids::youtube_video_id;
use crate::model::{ProviderKind, SourceDescriptor};

/// Pick a stream from a `/streams` response.
pub fn to_stream(
    response: dto::StreamsResponse,
    video_id: &str,
    preferences: StreamPreferences,
) -> Result<ResolvedStream, ResolutionError> {
    if let Some(error) = response.error {
        let detail = response.message.unwrap_or(error);
        return Err(classify_upstream_error(&detail, video_id));
    }

    let mut options: Vec<StreamOption> = response
        .audio_streams
        .into_iter()
        .filter(|s| !s.video_only && !s.url.is_empty())
        .map(|s| {
            let format = s
                .mime_type
                .as_deref()
                .map(AudioFormat::from_mime)
                .filter(|f| *f != AudioFormat::Unknown)
                .unwrap_or_else(|| AudioFormat::from_url(&s.url));
            StreamOption {
                progressive: format != AudioFormat::Hls,
                bitrate_kbps: s.bitrate.map(|b| (b / 1000) as u32),
                url: s.url,
                format,
            }
        })
        .collect();

    if let Some(hls) = response.hls.filter(|h| !h.is_empty()) {
        options.push(StreamOption {
            url: hls,
            format: AudioFormat::Hls,
            bitrate_kbps: None,
            progressive: false,
        });
    }

    select_stream(options, preferences)
        .map(|o| ResolvedStream::from_option(o, "piped"))
        .ok_or_else(|| ResolutionError::ContentNotFound(format!("piped: no usable audio stream for {video_id}")))
}

/// Map a search response to provider results, skipping channels/playlists.
pub fn to_results(response: dto::SearchResponse) -> Vec<ProviderResult> {
    response
        .items
        .into_iter()
        .filter(|item| item.item_type.as_deref().is_none_or(|t| t == "stream"))
        .filter_map(|item| {
            let id = youtube_video_id(&item.url)?;
            Some(ProviderResult {
                descriptor: SourceDescriptor::new(ProviderKind::YouTube, id.clone())
                    .with_origin(format!("https://www.youtube.com/watch?v={id}")),
                title: item.title.unwrap_or_default(),
                artist: item.uploader_name.unwrap_or_default(),
                duration_secs: item.duration.filter(|d| *d > 0).map(|d| d as u32),
                thumbnail_url: item.thumbnail,
                relevance: 0.0,
            })
        })
        .collect()
}

/// Piped reports upstream extraction failures as text.
fn classify_upstream_error(detail: &str, video_id: &str) -> ResolutionError {
    let lower = detail.to_ascii_lowercase();
    if lower.contains("unavailable") || lower.contains("private") || lower.contains("removed") {
        ResolutionError::ContentNotFound(format!("piped: {video_id}: {detail}"))
    } else if lower.contains("sign in") || lower.contains("age-restricted") || lower.contains("age restricted") {
        ResolutionError::Unauthorized(format!("piped: {video_id}: {detail}"))
    } else {
        ResolutionError::ProviderUnavailable(format!("piped: {detail}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::domain::{StreamIntent, StreamQuality};

    fn streams_json() -> &'static str {
        r#"{
            "title": "Yesterday (Remastered 2009)",
            "uploader": "The Beatles - Topic",
            "duration": 125,
            "hls": "https://pipedproxy.example/api/manifest/hls_playlist/x.m3u8",
            "audioStreams": [
                {"url": "https://rr1.googlevideo.com/videoplayback?expire=1767225600&itag=140",
                 "format": "M4A", "mimeType": "audio/mp4", "bitrate": 130000, "videoOnly": false},
                {"url": "https://rr1.googlevideo.com/videoplayback?expire=1767225600&itag=251",
                 "format": "WEBMA_OPUS", "mimeType": "audio/webm", "bitrate": 160000, "videoOnly": false}
            ]
        }"#
    }

    fn prefs(quality: StreamQuality, intent: StreamIntent) -> StreamPreferences {
        StreamPreferences { quality, intent }
    }

    #[test]
    fn test_stream_selection() {
        let response: dto::StreamsResponse = serde_json::from_str(streams_json()).unwrap();
        let stream = to_stream(response, "abc", prefs(StreamQuality::Best, StreamIntent::Download)).unwrap();
        assert_eq!(stream.format, AudioFormat::Webm);
        assert_eq!(stream.bitrate_kbps, Some(160));
        assert!(stream.expires_at.is_some());
    }

    #[test]
    fn test_download_with_only_hls_is_not_found() {
        let response: dto::StreamsResponse = serde_json::from_str(
            r#"{"hls": "https://x/master.m3u8", "audioStreams": []}"#,
        )
        .unwrap();
        let err = to_stream(response, "abc", prefs(StreamQuality::High, StreamIntent::Download)).unwrap_err();
        assert!(matches!(err, ResolutionError::ContentNotFound(_)));
    }

    #[test]
    fn test_upstream_error_classification() {
        let response: dto::StreamsResponse = serde_json::from_str(
            r#"{"error": "ExtractionException", "message": "This video is unavailable"}"#,
        )
        .unwrap();
        let err = to_stream(response, "abc", StreamPreferences::default()).unwrap_err();
        assert!(matches!(err, ResolutionError::ContentNotFound(_)));
    }

    #[test]
    fn test_age_gate_and_transient_errors() {
        assert!(matches!(
            classify_upstream_error("Sign in to confirm your age. This video may be age-restricted", "abc"),
            ResolutionError::Unauthorized(_)
        ));
        assert!(matches!(
            classify_upstream_error("The page needs to be reloaded", "abc"),
            ResolutionError::ProviderUnavailable(_)
        ));
        assert!(matches!(
            classify_upstream_error("Could not parse message from image server", "abc"),
            ResolutionError::ProviderUnavailable(_)
        ));
    }

    #[test]
    fn test_search_results() {
        let response: dto::SearchResponse = serde_json::from_str(
            r#"{"items": [
                {"url": "/watch?v=dQw4w9WgXcQ", "type": "stream", "title": "Song", "uploaderName": "Artist", "duration": 212},
                {"url": "/channel/UC123", "type": "channel", "title": "Artist"}
            ]}"#,
        )
        .unwrap();
        let results = to_results(response);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].descriptor.track_id, "dQw4w9WgXcQ");
        assert_eq!(results[0].duration_secs, Some(212));
    }
}
