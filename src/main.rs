// src/main.rs

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use ttd::logging::{init_logging, DEFAULT_FILTER, VERBOSE_FILTER};
use ttd::prelude::*;

#[derive(Debug, Parser)]
#[command(name = "ttd", version, about = "Torrent downloads supervised through aria2c, transmission-cli or rtorrent")]
struct Cli {
    /// Config file (TOML). Missing file means defaults.
    #[arg(long, global = true, default_value = "ttd.toml")]
    config: PathBuf,
    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    json: bool,
    /// Debug logging for this crate.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Report which transfer tools are installed.
    Check,
    /// Download a magnet link.
    Add {
        magnet: String,
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Download from a .torrent file.
    AddFile {
        path: PathBuf,
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(if cli.verbose { VERBOSE_FILTER } else { DEFAULT_FILTER });

    let config = SupervisorConfig::load(&cli.config)?;
    let supervisor = Supervisor::new(&config);

    let (source, dir) = match cli.command {
        Command::Check => {
            let report = supervisor.environment_check();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("aria2c:           {}", report.aria2c);
                println!("transmission-cli: {}", report.transmission);
                println!("rtorrent:         {}", report.rtorrent);
                println!("wget:             {}", report.wget);
                println!("curl:             {}", report.curl);
                match report.recommended_tool {
                    Some(tool) => println!("recommended:      {}", tool),
                    None => println!("no torrent downloader found; install aria2 (e.g. `apt install aria2`)"),
                }
            }
            return Ok(());
        }
        Command::Add { magnet, dir } => (Source::Magnet(magnet), dir),
        Command::AddFile { path, dir } => (Source::TorrentFile(path), dir),
    };

    let dir = dir.unwrap_or_else(|| config.download_dir.clone());
    let job_id = match supervisor.submit_to(source, dir).await {
        Ok(id) => id,
        Err(e) => bail!("{}", e),
    };
    println!("Download started: {}", job_id);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                let outcome = supervisor.control(&job_id, ControlAction::Delete).await;
                println!("{}", outcome.message);
                return Ok(());
            }
            _ = tokio::time::sleep(Duration::from_secs(1)) => {}
        }

        let Some(info) = supervisor.info(&job_id).await else {
            bail!("Job disappeared from supervisor.");
        };
        if cli.json {
            println!("{}", serde_json::to_string(&info)?);
        } else {
            println!(
                "[{}] {:>5.1}%  down {:>8} B/s  up {:>7} B/s  seeders {} leechers {}  eta {}s",
                info.status,
                info.progress,
                info.download_speed,
                info.upload_speed,
                info.seeders,
                info.leechers,
                info.eta
            );
        }

        if info.status == JobStatus::Error {
            bail!("Download failed: {}", info.error_message);
        }
        if info.status.is_terminal() {
            return Ok(());
        }
    }
}
