use std::collections::VecDeque;
use std::fmt::Display;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

use crate::helper::log::LogUgoira;
use crate::ugoira::fetch::Fetch;
use crate::ugoira::types::{Fidelity, FrameBytes, FrameSpec, UgoiraDescriptor, FRAME_INDEX_PLACEHOLDER};

static SIZE_TOKEN_REGEX: LazyLock<Regex> = LazyLock::new(||
    Regex::new(r"[0-9]+x[0-9]+").expect("Size token regex construct failed.")
);

pub const DEFAULT_WORKER_COUNT: usize = 4;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchStrategy {
    /// One request per frame against the original image urls
    OriginalFrames,
    /// The prebuilt zip, optionally resized by swapping its size token
    PrebuiltArchive { size: Option<String> },
}

impl FetchStrategy {
    pub fn select(descriptor: &UgoiraDescriptor, fidelity: Fidelity, archive_size: Option<&str>) -> FetchStrategy {
        if fidelity == Fidelity::Maximum && descriptor.original_frame_url_pattern.is_some() {
            FetchStrategy::OriginalFrames
        } else {
            FetchStrategy::PrebuiltArchive { size: archive_size.map(|size| size.to_string()) }
        }
    }
}

impl Display for FetchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchStrategy::OriginalFrames => write!(f, "original frames"),
            FetchStrategy::PrebuiltArchive { size: Some(size) } => write!(f, "prebuilt archive ({})", size),
            FetchStrategy::PrebuiltArchive { size: None } => write!(f, "prebuilt archive"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SourceOptions {
    pub workers: usize,
}

impl Default for SourceOptions {
    fn default() -> Self {
        SourceOptions { workers: DEFAULT_WORKER_COUNT }
    }
}

#[derive(Debug)]
pub enum Acquired {
    Frames(Vec<FrameBytes>),
    Archive(Vec<u8>),
}

/* Acquire Error */

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireError {
    FrameFetchFailed { index: u32, status: u16 },
    ArchiveFetchFailed { status: u16 },
    Network { url: String, message: String },
    StrategyUnavailable(FetchStrategy),
    InvalidSize(String),
    Worker(String),
}

impl Display for AcquireError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AcquireError::FrameFetchFailed { index, status } =>
                write!(f, "Frame {} fetch failed with status {}", index, status),
            AcquireError::ArchiveFetchFailed { status } =>
                write!(f, "Archive fetch failed with status {}", status),
            AcquireError::Network { url, message } => write!(f, "Network error on {}: {}", url, message),
            AcquireError::StrategyUnavailable(strategy) =>
                write!(f, "Descriptor has no url for {}", strategy),
            AcquireError::InvalidSize(size) => write!(f, "Invalid archive size {}, expected <width>x<height>", size),
            AcquireError::Worker(message) => write!(f, "Download worker failed: {}", message),
        }
    }
}

impl std::error::Error for AcquireError {}

/// Replaces the last `<w>x<h>` token in `url` with `size`
pub fn substitute_size_token(url: &str, size: &str) -> Option<String> {
    let token = SIZE_TOKEN_REGEX.find_iter(url).last()?;
    let mut substituted = String::with_capacity(url.len() + size.len());
    substituted.push_str(&url[..token.start()]);
    substituted.push_str(size);
    substituted.push_str(&url[token.end()..]);
    Some(substituted)
}

pub async fn acquire<F: Fetch + 'static>(
    fetcher: Arc<F>,
    descriptor: &UgoiraDescriptor,
    strategy: &FetchStrategy,
    options: &SourceOptions,
) -> Result<Acquired, AcquireError> {
    match strategy {
        FetchStrategy::OriginalFrames => {
            let frames = fetch_original_frames(fetcher, descriptor, options).await?;
            Ok(Acquired::Frames(frames))
        }
        FetchStrategy::PrebuiltArchive { size } => {
            let data = fetch_prebuilt_archive(fetcher.as_ref(), descriptor, size.as_deref()).await?;
            Ok(Acquired::Archive(data))
        }
    }
}

async fn fetch_prebuilt_archive<F: Fetch>(
    fetcher: &F,
    descriptor: &UgoiraDescriptor,
    size: Option<&str>,
) -> Result<Vec<u8>, AcquireError> {
    let id = descriptor.id.as_str();
    let Some(archive_url) = descriptor.archive_url.as_ref() else {
        return Err(AcquireError::StrategyUnavailable(
            FetchStrategy::PrebuiltArchive { size: size.map(|s| s.to_string()) }
        ));
    };

    let url = match size {
        Some(size) => {
            if !SIZE_TOKEN_REGEX.find(size).is_some_and(|m| m.as_str() == size) {
                return Err(AcquireError::InvalidSize(size.to_string()));
            }
            match substitute_size_token(archive_url, size) {
                Some(url) => url,
                None => {
                    log::warn!(
                        target: "ugoira_source",
                        "{} No size token in {archive_url}, fetching it unchanged", LogUgoira(id)
                    );
                    archive_url.clone()
                }
            }
        }
        None => archive_url.clone(),
    };

    log::info!(
        target: "ugoira_source",
        "{} Downloading animation zip file from {url}", LogUgoira(id)
    );

    let response = fetcher.fetch(&url).await
        .map_err(|e| AcquireError::Network { url: url.clone(), message: e.to_string() })?;
    if !response.is_success() {
        return Err(AcquireError::ArchiveFetchFailed { status: response.status });
    }
    Ok(response.body)
}

async fn fetch_original_frames<F: Fetch + 'static>(
    fetcher: Arc<F>,
    descriptor: &UgoiraDescriptor,
    options: &SourceOptions,
) -> Result<Vec<FrameBytes>, AcquireError> {
    let id = descriptor.id.clone();
    let Some(pattern) = descriptor.original_frame_url_pattern.clone() else {
        return Err(AcquireError::StrategyUnavailable(FetchStrategy::OriginalFrames));
    };
    let frame_count = descriptor.frame_count();

    log::info!(
        target: "ugoira_source",
        "{} Downloading {} original frames", LogUgoira(&id), frame_count
    );

    let task_queue: VecDeque<FrameSpec> = descriptor.frames.iter().cloned().collect();
    let task_queue: Arc<Mutex<VecDeque<FrameSpec>>> = Arc::new(Mutex::new(task_queue));

    let mut workers = JoinSet::new();
    let worker_count = options.workers.clamp(1, frame_count.max(1));
    for worker_id in 0..worker_count {
        workers.spawn(frame_download_worker(
            worker_id,
            fetcher.clone(),
            id.clone(),
            pattern.clone(),
            task_queue.clone(),
        ));
    }

    let mut completed: Vec<FrameBytes> = Vec::with_capacity(frame_count);
    while let Some(joined) = workers.join_next().await {
        let result = match joined {
            Ok(result) => result,
            Err(e) => Err(AcquireError::Worker(e.to_string())),
        };
        match result {
            Ok(frames) => completed.extend(frames),
            Err(e) => {
                // Outstanding requests are dropped with their workers
                workers.abort_all();
                log::warn!(
                    target: "ugoira_source",
                    "{} Aborting frame download: {e}", LogUgoira(&id)
                );
                return Err(e);
            }
        }
    }

    completed.sort_by_key(|frame| frame.spec.index);
    if completed.len() != frame_count {
        return Err(AcquireError::Worker(format!(
            "{} of {} frames downloaded", completed.len(), frame_count
        )));
    }
    Ok(completed)
}

async fn frame_download_worker<F: Fetch + 'static>(
    worker_id: usize,
    fetcher: Arc<F>,
    id: String,
    pattern: String,
    queue: Arc<Mutex<VecDeque<FrameSpec>>>,
) -> Result<Vec<FrameBytes>, AcquireError> {
    let mut downloaded = Vec::new();
    loop {
        let task = {
            let mut guard = queue.lock().await;
            guard.pop_front()
        };

        let Some(spec) = task else {
            return Ok(downloaded);
        };

        let url = pattern.replacen(FRAME_INDEX_PLACEHOLDER, &spec.index.to_string(), 1);
        log::debug!(
            target: "ugoira_source",
            "{} Worker {worker_id} downloading frame {} from {url}", LogUgoira(&id), spec.index
        );

        let response = fetcher.fetch(&url).await
            .map_err(|e| AcquireError::Network { url: url.clone(), message: e.to_string() })?;
        if !response.is_success() {
            return Err(AcquireError::FrameFetchFailed { index: spec.index, status: response.status });
        }
        downloaded.push(FrameBytes { spec, data: response.body });
    }
}
