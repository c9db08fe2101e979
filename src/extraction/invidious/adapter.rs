//! Convert Invidious DTOs to domain types.

use super::dto;
use crate::extraction::domain::{
    AudioFormat, ProviderResult, ResolutionError, ResolvedStream, StreamOption, StreamPreferences,
    select_stream,
};
use crate::model::{ProviderKind, SourceDescriptor};

pub fn to_stream(
    response: dto::VideoResponse,
    video_id: &str,
    preferences: StreamPreferences,
) -> Result<ResolvedStream, ResolutionError> {
    if let Some(error) = response.error {
        return Err(ResolutionError::ContentNotFound(format!("invidious: {video_id}: {error}")));
    }

    let mut options: Vec<StreamOption> = response
        .adaptive_formats
        .into_iter()
        .filter(|f| f.mime_type.starts_with("audio/") && !f.url.is_empty())
        .map(|f| StreamOption {
            format: AudioFormat::from_mime(&f.mime_type),
            bitrate_kbps: f.bitrate.as_ref().and_then(parse_bitrate).map(|b| (b / 1000) as u32),
            progressive: true,
            url: f.url,
        })
        .collect();

    if let Some(hls) = response.hls_url.filter(|h| !h.is_empty()) {
        options.push(StreamOption {
            url: hls,
            format: AudioFormat::Hls,
            bitrate_kbps: None,
            progressive: false,
        });
    }

    select_stream(options, preferences)
        .map(|o| ResolvedStream::from_option(o, "invidious"))
        .ok_or_else(|| ResolutionError::ContentNotFound(format!("invidious: no usable audio stream for {video_id}")))
}

pub fn to_results(items: Vec<dto::SearchItem>) -> Vec<ProviderResult> {
    items
        .into_iter()
        .filter(|item| item.item_type == "video")
        .filter_map(|item| {
            let id = item.video_id?;
            let thumbnail = item
                .video_thumbnails
                .iter()
                .find(|t| t.quality.as_deref() == Some("medium"))
                .or_else(|| item.video_thumbnails.first())
                .map(|t| t.url.clone());
            Some(ProviderResult {
                descriptor: SourceDescriptor::new(ProviderKind::YouTube, id.clone())
                    .with_origin(format!("https://www.youtube.com/watch?v={id}")),
                title: item.title.unwrap_or_default(),
                artist: item.author.unwrap_or_default(),
                duration_secs: item.length_seconds.filter(|d| *d > 0).map(|d| d as u32),
                thumbnail_url: thumbnail,
                relevance: 0.0,
            })
        })
        .collect()
}

fn parse_bitrate(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
