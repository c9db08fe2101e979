//! Convert SoundCloud DTOs to domain types.

use super::dto;
use crate::extraction::domain::{
    AudioFormat, ProviderResult, ResolutionError, StreamOption, StreamPreferences, select_stream,
};
use crate::model::{ProviderKind, SourceDescriptor};

/// Choose a transcoding. The returned option's `url` is the transcoding
/// endpoint, not yet the media URL.
pub fn pick_transcoding(
    track: &dto::Track,
    preferences: StreamPreferences,
) -> Result<StreamOption, ResolutionError> {
    match track.policy.as_deref() {
        Some("BLOCK") => {
            return Err(ResolutionError::ContentNotFound(format!(
                "soundcloud: track {} is blocked in this region",
                track.id
            )));
        }
        Some("SNIP") => {
            return Err(ResolutionError::Unauthorized(format!(
                "soundcloud: track {} is preview-only",
                track.id
            )));
        }
        _ => {}
    }

    let options: Vec<StreamOption> = track
        .media
        .iter()
        .flat_map(|m| m.transcodings.iter())
        .map(|t| {
            let progressive = t.format.protocol == "progressive";
            StreamOption {
                url: t.url.clone(),
                format: if progressive {
                    AudioFormat::from_mime(&t.format.mime_type)
                } else {
                    AudioFormat::Hls
                },
                bitrate_kbps: t.preset.as_deref().and_then(preset_bitrate),
                progressive,
            }
        })
        .collect();

    select_stream(options, preferences).ok_or_else(|| {
        ResolutionError::ContentNotFound(format!("soundcloud: no usable transcoding for {}", track.id))
    })
}

pub fn to_result(track: dto::Track) -> ProviderResult {
    let descriptor = SourceDescriptor::new(ProviderKind::SoundCloud, track.id.to_string());
    let descriptor = match track.permalink_url {
        Some(url) => descriptor.with_origin(url),
        None => descriptor,
    };
    ProviderResult {
        descriptor,
        title: track.title.unwrap_or_default(),
        artist: track.user.map(|u| u.username).unwrap_or_default(),
        duration_secs: track.duration.map(|ms| (ms / 1000) as u32),
        thumbnail_url: track.artwork_url,
        relevance: 0.0,
    }
}

fn preset_bitrate(preset: &str) -> Option<u32> {
    if preset.contains("160") {
        Some(160)
    } else if preset.starts_with("mp3") {
        Some(128)
    } else if preset.starts_with("opus") {
        Some(64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::domain::{StreamIntent, StreamQuality};

    fn track(policy: &str) -> dto::Track {
        serde_json::from_str(&format!(
            r#"{{"id": 42, "title": "Song", "duration": 185000, "policy": "{policy}",
                "user": {{"username": "artist"}},
                "media": {{"transcodings": [
                    {{"url": "https://api-v2.soundcloud.com/media/1/hls", "preset": "aac_160k",
                      "format": {{"protocol": "hls", "mime_type": "audio/mp4; codecs=\"mp4a.40.2\""}}}},
                    {{"url": "https://api-v2.soundcloud.com/media/1/progressive", "preset": "mp3_0_1",
                      "format": {{"protocol": "progressive", "mime_type": "audio/mpeg"}}}}
                ]}}}}"#
        ))
        .unwrap()
    }

    #[test]
    fn test_download_uses_progressive_mp3() {
        let prefs = StreamPreferences {
            quality: StreamQuality::Best,
            intent: StreamIntent::Download,
        };
        let option = pick_transcoding(&track("ALLOW"), prefs).unwrap();
        assert!(option.url.ends_with("/progressive"));
        assert_eq!(option.format, AudioFormat::Mp3);
    }

    #[test]
    fn test_playback_may_use_hls() {
        let prefs = StreamPreferences {
            quality: StreamQuality::Best,
            intent: StreamIntent::Playback,
        };
        let option = pick_transcoding(&track("ALLOW"), prefs).unwrap();
        assert_eq!(option.format, AudioFormat::Hls);
    }

    #[test]
    fn test_policy_mapping() {
        assert!(matches!(
            pick_transcoding(&track("BLOCK"), StreamPreferences::default()),
            Err(ResolutionError::ContentNotFound(_))
        ));
        assert!(matches!(
            pick_transcoding(&track("SNIP"), StreamPreferences::default()),
            Err(ResolutionError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_result_duration_in_seconds() {
        let result = to_result(track("ALLOW"));
        assert_eq!(result.duration_secs, Some(185));
        assert_eq!(result.descriptor.track_id, "42");
    }
}
