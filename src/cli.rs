use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use ugoira_tea::config::AppConfig;
use ugoira_tea::ugoira::{EncodeProfile, FfmpegEncoder, Fidelity, PayloadKind, Pipeline, PixivClient, Settings};

/// Downloads pixiv ugoira and turns them into videos
#[derive(Debug, Parser)]
#[command(name = "ugoira-tea")]
#[command(about = "Download pixiv ugoira as zip + timing sidecar and convert them to video", long_about = None)]
pub struct Cli {
    /// Config file, `config.json` in the working directory is used when present
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Fetch the frames of one or more ugoira into `<name>.zip` and `<name>.json`
    Download {
        /// Artwork links or illust ids
        #[arg(required = true)]
        urls: Vec<String>,

        /// Directory the archives are written to
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// `standard` uses the prebuilt archive, `maximum` the original frames
        #[arg(long)]
        fidelity: Option<Fidelity>,

        /// Size token for the prebuilt archive, e.g. 1920x1080
        #[arg(long, value_name = "WxH")]
        size: Option<String>,

        /// Read metadata from the `page` or the `api`
        #[arg(long)]
        payload: Option<PayloadKind>,

        /// Fail instead of falling back to the prebuilt archive
        #[arg(long)]
        no_fallback: bool,
    },

    /// Encode downloaded archives with ffmpeg
    Convert {
        /// Zip files with a sidecar next to them
        #[arg(required = true)]
        archives: Vec<PathBuf>,

        /// copy, vp9_lossless or h264
        #[arg(short, long)]
        profile: Option<EncodeProfile>,

        /// Directory the videos are written to
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,
    },
}

impl Cli {
    /// Runs the command and returns whether every item succeeded
    pub async fn run(self) -> Result<bool> {
        let config = AppConfig::load(self.config.as_deref())
            .context("failed to load config")?;
        log::debug!("Loaded config: {:?}", config);

        let mut settings = Settings::from_config(&config);
        let fetcher = PixivClient::from_config(&config.pixiv)
            .context("failed to build http client")?;
        let encoder = FfmpegEncoder::new(config.convert.ffmpeg.clone());

        match self.command {
            CliCommand::Download { urls, output, fidelity, size, payload, no_fallback } => {
                if let Some(output) = output {
                    settings.out_dir = output;
                }
                if let Some(fidelity) = fidelity {
                    settings.fidelity = fidelity;
                }
                if size.is_some() {
                    settings.archive_size = size;
                }
                if let Some(payload) = payload {
                    settings.payload_kind = payload;
                }
                if no_fallback {
                    settings.fallback_to_archive = false;
                }

                let pipeline = Pipeline::new(fetcher, encoder, settings);
                let results = pipeline.download_batch(&urls).await;
                let mut all_ok = true;
                for (url, result) in results {
                    match result {
                        Ok(report) => println!("{}\t{}", url, report.summary()),
                        Err(e) => {
                            all_ok = false;
                            eprintln!("{}\t{:?}: {}", url, e.category(), e);
                        }
                    }
                }
                Ok(all_ok)
            }
            CliCommand::Convert { archives, profile, output } => {
                if let Some(output) = output {
                    settings.convert.out_dir = output;
                }
                if let Some(profile) = profile {
                    settings.convert.profile = profile;
                }

                let pipeline = Pipeline::new(fetcher, encoder, settings);
                let results = pipeline.convert_batch(&archives).await;
                let mut all_ok = true;
                for (archive, result) in results {
                    match result {
                        Ok(video) => println!("{}\t{}", archive.to_string_lossy(), video.to_string_lossy()),
                        Err(e) => {
                            all_ok = false;
                            eprintln!("{}\t{:?}: {}", archive.to_string_lossy(), e.category(), e);
                        }
                    }
                }
                Ok(all_ok)
            }
        }
    }
}
