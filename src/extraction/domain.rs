//! Internal domain models for stream resolution.
//!
//! These types are OUR types - they don't change when provider APIs change.
//! Every provider response is converted into these types by its adapter.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::model::{ProviderKind, SourceDescriptor, Track};

/// Streams are treated as expired this long before their stated expiry.
const EXPIRY_MARGIN_SECS: i64 = 30;

// ============================================================================
// Routing
// ============================================================================

/// A named network route (HTTP/SOCKS proxy) requests can be sent through.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteConfig {
    pub name: String,
    /// Proxy URL, e.g. `socks5://127.0.0.1:9050`
    pub url: String,
}

/// User-controlled routing preference, read at each resolution call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingPolicy {
    pub use_proxy: bool,
    pub proxy_routes: Vec<RouteConfig>,
}

impl RoutingPolicy {
    /// Direct connections only.
    pub fn direct() -> Self {
        Self::default()
    }

    /// Ordered routes to try for one instance: direct first, then each
    /// configured proxy when proxying is enabled.
    pub fn routes(&self) -> Vec<Route> {
        let mut routes = vec![Route::Direct];
        if self.use_proxy {
            routes.extend(self.proxy_routes.iter().cloned().map(Route::Proxy));
        }
        routes
    }
}

/// Shared, live-updatable routing policy.
///
/// Callers snapshot it per resolution, so a change applies to the next call
/// without affecting attempts already in flight.
#[derive(Debug, Clone, Default)]
pub struct RoutingHandle(Arc<RwLock<RoutingPolicy>>);

impl RoutingHandle {
    pub fn new(policy: RoutingPolicy) -> Self {
        Self(Arc::new(RwLock::new(policy)))
    }

    pub fn current(&self) -> RoutingPolicy {
        self.0.read().clone()
    }

    pub fn set(&self, policy: RoutingPolicy) {
        *self.0.write() = policy;
    }
}

/// One concrete way to reach an instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    Direct,
    Proxy(RouteConfig),
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Direct => f.write_str("direct"),
            Route::Proxy(cfg) => write!(f, "proxy:{}", cfg.name),
        }
    }
}

/// A concrete host serving a provider's API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub base_url: String,
}

impl Instance {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Host part for logs.
    pub fn host(&self) -> &str {
        self.base_url
            .split("://")
            .nth(1)
            .unwrap_or(self.base_url.as_str())
    }
}

// ============================================================================
// Requests
// ============================================================================

/// Preferred audio quality, chosen by bitrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamQuality {
    Low,
    Medium,
    #[default]
    High,
    Best,
}

impl std::str::FromStr for StreamQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "best" => Ok(Self::Best),
            other => Err(format!("unknown quality: {other}")),
        }
    }
}

/// What the stream will be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamIntent {
    #[default]
    Playback,
    /// Must be a single progressive file, never a segmented playlist
    Download,
}

/// Quality and intent passed through to provider clients.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamPreferences {
    pub quality: StreamQuality,
    pub intent: StreamIntent,
}

/// A single resolution call.
#[derive(Debug, Clone)]
pub struct ResolutionRequest {
    pub descriptor: SourceDescriptor,
    pub routing: RoutingPolicy,
    pub preferences: StreamPreferences,
}

impl ResolutionRequest {
    pub fn playback(descriptor: SourceDescriptor, routing: RoutingPolicy, quality: StreamQuality) -> Self {
        Self {
            descriptor,
            routing,
            preferences: StreamPreferences {
                quality,
                intent: StreamIntent::Playback,
            },
        }
    }

    pub fn download(descriptor: SourceDescriptor, routing: RoutingPolicy, quality: StreamQuality) -> Self {
        Self {
            descriptor,
            routing,
            preferences: StreamPreferences {
                quality,
                intent: StreamIntent::Download,
            },
        }
    }
}

// ============================================================================
// Results
// ============================================================================

/// Container/codec of a resolved stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    M4a,
    Webm,
    Mp3,
    Ogg,
    /// Segmented playlist, playback only
    Hls,
    Unknown,
}

impl AudioFormat {
    /// Guess from a MIME type such as `audio/mp4; codecs="mp4a.40.2"`.
    pub fn from_mime(mime: &str) -> Self {
        let mime = mime.to_ascii_lowercase();
        if mime.contains("mpegurl") {
            AudioFormat::Hls
        } else if mime.contains("mp4") || mime.contains("m4a") || mime.contains("aac") {
            AudioFormat::M4a
        } else if mime.contains("webm") {
            AudioFormat::Webm
        } else if mime.contains("mpeg") || mime.contains("mp3") {
            AudioFormat::Mp3
        } else if mime.contains("ogg") || mime.contains("opus") {
            AudioFormat::Ogg
        } else {
            AudioFormat::Unknown
        }
    }

    /// Guess from the path of a URL.
    pub fn from_url(url: &str) -> Self {
        let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
        if path.ends_with(".m3u8") {
            AudioFormat::Hls
        } else if path.ends_with(".m4a") || path.ends_with(".mp4") {
            AudioFormat::M4a
        } else if path.ends_with(".webm") {
            AudioFormat::Webm
        } else if path.ends_with(".mp3") {
            AudioFormat::Mp3
        } else if path.ends_with(".ogg") || path.ends_with(".opus") {
            AudioFormat::Ogg
        } else {
            AudioFormat::Unknown
        }
    }

    /// File extension for a downloaded copy.
    pub fn extension(self) -> &'static str {
        match self {
            AudioFormat::M4a => "m4a",
            AudioFormat::Webm => "webm",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Ogg => "ogg",
            AudioFormat::Hls => "m3u8",
            AudioFormat::Unknown => "audio",
        }
    }
}

/// A candidate stream offered by a provider, before selection.
#[derive(Debug, Clone)]
pub struct StreamOption {
    pub url: String,
    pub format: AudioFormat,
    pub bitrate_kbps: Option<u32>,
    /// Single file served over plain HTTP
    pub progressive: bool,
}

/// Pick the option matching quality and intent.
///
/// Options are ordered by bitrate, highest first. Downloads drop segmented
/// options entirely and prefer progressive ones.
pub fn select_stream(mut options: Vec<StreamOption>, preferences: StreamPreferences) -> Option<StreamOption> {
    if preferences.intent == StreamIntent::Download {
        options.retain(|o| o.format != AudioFormat::Hls);
        if options.iter().any(|o| o.progressive) {
            options.retain(|o| o.progressive);
        }
    }
    if options.is_empty() {
        return None;
    }

    options.sort_by(|a, b| b.bitrate_kbps.unwrap_or(0).cmp(&a.bitrate_kbps.unwrap_or(0)));

    let at_most = |cap: u32| {
        options
            .iter()
            .position(|o| o.bitrate_kbps.is_some_and(|b| b <= cap))
    };
    let index = match preferences.quality {
        StreamQuality::Best => 0,
        StreamQuality::High => at_most(256).unwrap_or(0),
        StreamQuality::Medium => at_most(128).unwrap_or(options.len() - 1),
        StreamQuality::Low => options.len() - 1,
    };
    Some(options.swap_remove(index))
}

/// A fetchable audio stream with an optional validity window.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStream {
    pub url: String,
    pub format: AudioFormat,
    pub bitrate_kbps: Option<u32>,
    /// `None` means short-lived: re-resolve when it fails
    pub expires_at: Option<DateTime<Utc>>,
    /// Provider backend that produced it
    pub provider: String,
}

impl ResolvedStream {
    /// Build from a selected option, reading the expiry embedded in the URL.
    pub fn from_option(option: StreamOption, provider: impl Into<String>) -> Self {
        let expires_at = expiry_from_url(&option.url);
        Self {
            url: option.url,
            format: option.format,
            bitrate_kbps: option.bitrate_kbps,
            expires_at,
            provider: provider.into(),
        }
    }

    /// Whether the validity window has elapsed at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_some_and(|at| now + TimeDelta::seconds(EXPIRY_MARGIN_SECS) >= at)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Read an `expire=` / `Expires=` unix timestamp from a signed stream URL.
pub fn expiry_from_url(url: &str) -> Option<DateTime<Utc>> {
    let parsed = reqwest::Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(k, _)| k.eq_ignore_ascii_case("expire") || k.eq_ignore_ascii_case("expires"))
        .and_then(|(_, v)| v.parse::<i64>().ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

/// A provider search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResult {
    pub descriptor: SourceDescriptor,
    pub title: String,
    pub artist: String,
    pub duration_secs: Option<u32>,
    pub thumbnail_url: Option<String>,
    /// Provider's own ranking normalized to [0,1], 1.0 for the top hit
    pub relevance: f32,
}

impl ProviderResult {
    /// A fresh catalog track for this hit.
    pub fn to_track(&self) -> Track {
        let mut track = Track::new(
            self.title.clone(),
            self.artist.clone(),
            self.duration_secs.unwrap_or(0),
            self.descriptor.clone(),
        );
        track.thumbnail_url = self.thumbnail_url.clone();
        track
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Errors that can occur while resolving a stream.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResolutionError {
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Content not found: {0}")]
    ContentNotFound(String),

    #[error("Rate limited by {0}")]
    RateLimited(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("No provider registered for {0}")]
    UnsupportedProvider(ProviderKind),
}

/// Discriminant of [`ResolutionError`], for aggregation and persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResolutionErrorKind {
    ProviderUnavailable,
    RateLimited,
    Unauthorized,
    ContentNotFound,
    UnsupportedProvider,
}

impl ResolutionError {
    pub fn kind(&self) -> ResolutionErrorKind {
        match self {
            ResolutionError::ProviderUnavailable(_) => ResolutionErrorKind::ProviderUnavailable,
            ResolutionError::ContentNotFound(_) => ResolutionErrorKind::ContentNotFound,
            ResolutionError::RateLimited(_) => ResolutionErrorKind::RateLimited,
            ResolutionError::Unauthorized(_) => ResolutionErrorKind::Unauthorized,
            ResolutionError::UnsupportedProvider(_) => ResolutionErrorKind::UnsupportedProvider,
        }
    }

    /// Whether retrying later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ResolutionError::ProviderUnavailable(_) | ResolutionError::RateLimited(_)
        )
    }

    /// Higher means more informative when several attempts failed.
    pub(crate) fn specificity(&self) -> u8 {
        match self {
            ResolutionError::ContentNotFound(_) => 4,
            ResolutionError::Unauthorized(_) => 3,
            ResolutionError::RateLimited(_) => 2,
            ResolutionError::ProviderUnavailable(_) => 1,
            ResolutionError::UnsupportedProvider(_) => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(bitrate: u32, format: AudioFormat, progressive: bool) -> StreamOption {
        StreamOption {
            url: format!("https://cdn.example/{bitrate}"),
            format,
            bitrate_kbps: Some(bitrate),
            progressive,
        }
    }

    fn prefs(quality: StreamQuality, intent: StreamIntent) -> StreamPreferences {
        StreamPreferences { quality, intent }
    }

    #[test]
    fn test_routes_direct_first() {
        let policy = RoutingPolicy {
            use_proxy: true,
            proxy_routes: vec![RouteConfig {
                name: "tor".into(),
                url: "socks5://127.0.0.1:9050".into(),
            }],
        };
        let routes = policy.routes();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0], Route::Direct);
        assert_eq!(routes[1].to_string(), "proxy:tor");
    }

    #[test]
    fn test_routes_ignore_proxies_when_disabled() {
        let policy = RoutingPolicy {
            use_proxy: false,
            proxy_routes: vec![RouteConfig {
                name: "tor".into(),
                url: "socks5://127.0.0.1:9050".into(),
            }],
        };
        assert_eq!(policy.routes(), vec![Route::Direct]);
    }

    #[test]
    fn test_quality_selection_by_bitrate() {
        let options = || {
            vec![
                option(48, AudioFormat::Webm, true),
                option(320, AudioFormat::M4a, true),
                option(160, AudioFormat::Webm, true),
                option(128, AudioFormat::M4a, true),
            ]
        };
        let pick = |q| {
            select_stream(options(), prefs(q, StreamIntent::Playback))
                .and_then(|o| o.bitrate_kbps)
        };
        assert_eq!(pick(StreamQuality::Best), Some(320));
        assert_eq!(pick(StreamQuality::High), Some(160));
        assert_eq!(pick(StreamQuality::Medium), Some(128));
        assert_eq!(pick(StreamQuality::Low), Some(48));
    }

    #[test]
    fn test_download_rejects_hls() {
        let options = vec![option(256, AudioFormat::Hls, false)];
        assert!(select_stream(options.clone(), prefs(StreamQuality::Best, StreamIntent::Download)).is_none());
        assert!(select_stream(options, prefs(StreamQuality::Best, StreamIntent::Playback)).is_some());
    }

    #[test]
    fn test_download_prefers_progressive() {
        let options = vec![
            option(256, AudioFormat::Webm, false),
            option(128, AudioFormat::M4a, true),
        ];
        let chosen = select_stream(options, prefs(StreamQuality::Best, StreamIntent::Download)).unwrap();
        assert!(chosen.progressive);
    }

    #[test]
    fn test_expiry_parsed_from_url() {
        let url = "https://rr1.googlevideo.com/videoplayback?expire=1767225600&itag=140";
        let expires = expiry_from_url(url).unwrap();
        assert_eq!(expires.timestamp(), 1_767_225_600);

        let stream = ResolvedStream::from_option(
            StreamOption {
                url: url.to_string(),
                format: AudioFormat::M4a,
                bitrate_kbps: Some(128),
                progressive: true,
            },
            "piped",
        );
        assert!(stream.is_expired_at(DateTime::from_timestamp(1_767_225_590, 0).unwrap()));
        assert!(!stream.is_expired_at(DateTime::from_timestamp(1_767_220_000, 0).unwrap()));
    }

    #[test]
    fn test_no_window_never_expires() {
        assert!(expiry_from_url("https://cdn.example/a.mp3").is_none());
    }

    #[test]
    fn test_format_guessing() {
        assert_eq!(AudioFormat::from_mime("audio/mp4; codecs=\"mp4a.40.2\""), AudioFormat::M4a);
        assert_eq!(AudioFormat::from_mime("audio/webm; codecs=\"opus\""), AudioFormat::Webm);
        assert_eq!(AudioFormat::from_url("https://x/playlist.m3u8?a=1"), AudioFormat::Hls);
        assert_eq!(AudioFormat::from_url("https://x/a.mp3"), AudioFormat::Mp3);
    }

    #[test]
    fn test_specificity_order() {
        let nf = ResolutionError::ContentNotFound("x".into());
        let un = ResolutionError::Unauthorized("x".into());
        let rl = ResolutionError::RateLimited("x".into());
        let pu = ResolutionError::ProviderUnavailable("x".into());
        assert!(nf.specificity() > un.specificity());
        assert!(un.specificity() > rl.specificity());
        assert!(rl.specificity() > pu.specificity());
    }
}
