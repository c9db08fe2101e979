use clap::Parser;
use quezic::cli;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Log targets shown at info level by default.
const LOG_TARGETS: &[&str] = &[
    "quezic",
    "app",
    "download",
    "events",
    "extraction",
    "matcher",
    "player",
    "playlist",
    "recommend",
];

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Initialize logging (stderr keeps command output clean)
    let filter = log_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref())?;
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = match &args.config {
        Some(path) => quezic::config::load_from(path),
        None => quezic::config::load(),
    };

    cli::run_command(&args, config)
}

/// `RUST_LOG` when set, otherwise info for our own targets.
fn log_filter(rust_log: Option<&str>) -> anyhow::Result<EnvFilter> {
    if let Some(directives) = rust_log.filter(|s| !s.trim().is_empty()) {
        return Ok(EnvFilter::try_new(directives)?);
    }
    let mut filter = EnvFilter::default();
    for target in LOG_TARGETS {
        filter = filter.add_directive(format!("{target}=info").parse()?);
    }
    Ok(filter)
}
