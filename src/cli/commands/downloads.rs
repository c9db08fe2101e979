//! Download commands.
//!
//! The orchestrator only runs while the process does: Ctrl-C (or exit)
//! leaves unfinished tasks `Retrying` in the task table, and
//! `downloads --resume` picks them up again.

use tokio::runtime::Runtime;

use crate::app::Services;
use crate::config::Config;
use crate::download::{DownloadStatus, DownloadTask};
use crate::model::TrackId;

/// Download one track and wait for the outcome
pub fn cmd_download(rt: &Runtime, config: Config, track_id: &str) -> anyhow::Result<()> {
    rt.block_on(async {
        let services = Services::open(config).await?;
        let id = TrackId::from(track_id);

        match services.downloads.enqueue(&id).await {
            Ok(_) => println!("Downloading {}...", id),
            Err(e) if e.is_already_in_progress() => {
                // Left over from an earlier run
                services.downloads.resume(&id).await?;
                println!("Resuming {}...", id);
            }
            Err(e) => {
                services.shutdown().await;
                return Err(e.into());
            }
        }

        let outcome = tokio::select! {
            task = services.downloads.wait(&id) => Some(task?),
            _ = tokio::signal::ctrl_c() => None,
        };

        match outcome {
            Some(Some(task)) => {
                print_outcome(&services, &task).await?;
            }
            Some(None) => println!("No task recorded for {}", id),
            None => {
                services.downloads.cancel(&id).await;
                println!();
                println!("Cancelled. Resume with: quezic downloads --resume");
            }
        }

        services.shutdown().await;
        Ok(())
    })
}

async fn print_outcome(services: &Services, task: &DownloadTask) -> anyhow::Result<()> {
    match task.status {
        DownloadStatus::Succeeded => {
            let path = services
                .catalog
                .find_by_id(&task.track_id)
                .await?
                .and_then(|t| t.local_content);
            match path {
                Some(path) => println!("✓ Saved to {}", path.display()),
                None => println!("✓ Downloaded"),
            }
        }
        DownloadStatus::Failed => {
            let reason = task.last_error.map(|k| k.as_str()).unwrap_or("unknown");
            println!("✗ Failed after {} attempts: {}", task.attempts, reason);
        }
        status => println!("Stopped while {}", status),
    }
    Ok(())
}

/// Print the task table, optionally resuming unfinished tasks first
pub fn cmd_downloads(rt: &Runtime, config: Config, resume: bool) -> anyhow::Result<()> {
    rt.block_on(async {
        let services = Services::open(config).await?;

        if resume {
            let resumed = services.downloads.recover().await?;
            println!("Resumed {} downloads", resumed);
            for task in services.downloads.tasks().await? {
                if services.downloads.is_active(&task.track_id) {
                    tokio::select! {
                        done = services.downloads.wait(&task.track_id) => { done?; }
                        _ = tokio::signal::ctrl_c() => {
                            println!("Interrupted");
                            break;
                        }
                    }
                }
            }
        }

        let tasks = services.downloads.tasks().await?;
        if tasks.is_empty() {
            println!("No downloads");
        }
        for task in &tasks {
            let name = services
                .catalog
                .find_by_id(&task.track_id)
                .await?
                .map(|t| t.display_name())
                .unwrap_or_else(|| "(not in catalog)".to_string());
            let error = task.last_error.map(|k| k.as_str()).unwrap_or("");
            println!(
                "{:<10} {:>2}  {:<20} {}  {}  {}",
                task.status,
                task.attempts,
                error,
                task.updated_at.format("%Y-%m-%d %H:%M"),
                task.track_id,
                name
            );
        }

        services.shutdown().await;
        Ok(())
    })
}
