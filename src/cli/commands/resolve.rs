//! Stream resolution and provider search commands.

use tokio::runtime::Runtime;

use crate::app::Services;
use crate::config::Config;
use crate::extraction::{ProviderSearch, ResolutionRequest, StreamQuality};
use crate::model::{ProviderKind, SourceDescriptor};
use crate::player::format_duration;

/// Resolve one provider id and print the stream
pub fn cmd_resolve(
    rt: &Runtime,
    config: Config,
    kind: ProviderKind,
    id: &str,
    quality: StreamQuality,
    download: bool,
) -> anyhow::Result<()> {
    rt.block_on(async {
        let services = Services::open(config).await?;
        let descriptor = SourceDescriptor::new(kind, id);
        let routing = services.routing.current();
        let request = if download {
            ResolutionRequest::download(descriptor, routing, quality)
        } else {
            ResolutionRequest::playback(descriptor, routing, quality)
        };

        println!("Resolving {}...", request.descriptor);
        let result = services.resolver.resolve(&request).await;
        services.shutdown().await;

        let stream = result?;
        println!();
        println!("  Provider: {}", stream.provider);
        println!("  Format:   {}", stream.format.extension());
        if let Some(kbps) = stream.bitrate_kbps {
            println!("  Bitrate:  {} kbps", kbps);
        }
        match stream.expires_at {
            Some(at) => println!("  Expires:  {}", at.to_rfc3339()),
            None => println!("  Expires:  unknown (re-resolve on failure)"),
        }
        println!();
        println!("{}", stream.url);
        Ok(())
    })
}

/// Search YouTube and SoundCloud, optionally adding hits to the catalog
pub fn cmd_search(rt: &Runtime, config: Config, query: &str, limit: usize, add: bool) -> anyhow::Result<()> {
    rt.block_on(async {
        let services = Services::open(config).await?;
        let kinds = [ProviderKind::YouTube, ProviderKind::SoundCloud];
        let results = match services.resolver.search(query, &kinds, limit).await {
            Ok(results) => results,
            Err(e) => {
                services.shutdown().await;
                return Err(e.into());
            }
        };

        if results.is_empty() {
            println!("No results for {:?}", query);
        }

        for hit in &results {
            let duration = hit
                .duration_secs
                .map(|s| format_duration(std::time::Duration::from_secs(s.into())))
                .unwrap_or_else(|| "--:--".to_string());
            let mut line = format!(
                "{:>5.2}  {:<8} {:>7}  {} - {}  [{}]",
                hit.relevance,
                hit.descriptor.kind,
                duration,
                hit.artist,
                hit.title,
                hit.descriptor.track_id
            );
            if add {
                let id = services.catalog.insert(hit.to_track()).await?;
                line.push_str(&format!("  -> {}", id));
            }
            println!("{}", line);
        }

        services.shutdown().await;
        Ok(())
    })
}
