//! Catalog, playlist import and recommendation commands.

use std::path::Path;

use serde::Deserialize;
use tokio::runtime::Runtime;

use crate::app::Services;
use crate::config::Config;
use crate::matcher::ImportRow;
use crate::model::TrackId;

/// List catalog tracks
pub fn cmd_list(rt: &Runtime, config: Config, limit: usize) -> anyhow::Result<()> {
    rt.block_on(async {
        let services = Services::open(config).await?;
        let tracks = services.catalog.list(limit).await?;
        for track in &tracks {
            let marker = match (track.favorite, track.is_downloaded()) {
                (true, true) => "★↓",
                (true, false) => "★ ",
                (false, true) => " ↓",
                (false, false) => "  ",
            };
            println!("{} {}  {}  ({})", marker, track.id, track.display_name(), track.source);
        }
        println!("{} tracks", tracks.len());
        services.shutdown().await;
        Ok(())
    })
}

/// Playlist exports come as a bare array or wrapped in `{"tracks": [...]}`
#[derive(Deserialize)]
#[serde(untagged)]
enum RowFile {
    Rows(Vec<ImportRow>),
    Wrapped { tracks: Vec<ImportRow> },
}

fn read_rows(path: &Path) -> anyhow::Result<Vec<ImportRow>> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
    let rows = match serde_json::from_str::<RowFile>(&contents)? {
        RowFile::Rows(rows) | RowFile::Wrapped { tracks: rows } => rows,
    };
    Ok(rows)
}

/// Rows from a playlist URL, or from a JSON export on disk
async fn load_rows(services: &Services, source: &str) -> anyhow::Result<Vec<ImportRow>> {
    if !services.playlists.supports(source) {
        return read_rows(Path::new(source));
    }
    let playlist = services.playlists.fetch(source).await?;
    match &playlist.owner {
        Some(owner) => println!("Playlist: {} by {}", playlist.name, owner),
        None => println!("Playlist: {}", playlist.name),
    }
    Ok(playlist.rows)
}

/// Match every row of a shared playlist or a playlist export
pub fn cmd_import(rt: &Runtime, config: Config, source: &str) -> anyhow::Result<()> {
    rt.block_on(async {
        let services = Services::open(config).await?;
        let rows = match load_rows(&services, source).await {
            Ok(rows) => rows,
            Err(e) => {
                services.shutdown().await;
                return Err(e);
            }
        };
        println!("Importing {} rows from {}", rows.len(), source);
        println!();

        let outcomes = services.importer.import(&rows).await;

        let mut matched = 0;
        let mut added = 0;
        let mut failed = 0;
        for outcome in &outcomes {
            match &outcome.result {
                Ok(candidate) if candidate.provisional => {
                    added += 1;
                    println!(
                        "  + {:.2}  {} -> {} [{}]",
                        candidate.score,
                        outcome.query.title,
                        candidate.track.display_name(),
                        candidate.track.id
                    );
                }
                Ok(candidate) => {
                    matched += 1;
                    println!(
                        "  ✓ {:.2}  {} -> {} [{}]",
                        candidate.score,
                        outcome.query.title,
                        candidate.track.display_name(),
                        candidate.track.id
                    );
                }
                Err(e) => {
                    failed += 1;
                    println!("  ✗       {} - {}: {}", outcome.query.artist, outcome.query.title, e);
                }
            }
        }

        println!();
        println!("=== Import Summary ===");
        println!("Matched in catalog: {}", matched);
        println!("Added from search:  {}", added);
        println!("Failed:             {}", failed);

        services.shutdown().await;
        Ok(())
    })
}

/// Set or clear the favorite mark
pub fn cmd_favorite(rt: &Runtime, config: Config, track_id: &str, favorite: bool) -> anyhow::Result<()> {
    rt.block_on(async {
        let services = Services::open(config).await?;
        let id = TrackId::from(track_id);
        let result = services.catalog.set_favorite(&id, favorite).await;
        services.shutdown().await;
        result?;

        if favorite {
            println!("★ {}", id);
        } else {
            println!("☆ {}", id);
        }
        Ok(())
    })
}

/// Recommend tracks by similar artists
pub fn cmd_similar(rt: &Runtime, config: Config, artist: &str) -> anyhow::Result<()> {
    rt.block_on(async {
        let services = Services::open(config).await?;
        let result = services.recommender.for_artist(artist).await;
        services.shutdown().await;

        let recommendations = result?;
        if recommendations.is_empty() {
            println!("No recommendations for {:?}", artist);
            return Ok(());
        }

        let mut current: Option<&str> = None;
        for rec in &recommendations {
            if current != Some(rec.via_artist.as_str()) {
                println!();
                println!("{}:", rec.via_artist);
                current = Some(rec.via_artist.as_str());
            }
            println!(
                "  {} - {}  [{} {}]",
                rec.result.artist, rec.result.title, rec.result.descriptor.kind, rec.result.descriptor.track_id
            );
        }
        Ok(())
    })
}
