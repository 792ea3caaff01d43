use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt;

use crate::config::AppConfig;
use crate::helper::log::{LogArchive, LogUgoira};
use crate::ugoira::archive::{ArchiveError, ArchiveFiles, archive_base_name, build_archive};
use crate::ugoira::encoder::Encoder;
use crate::ugoira::fetch::Fetch;
use crate::ugoira::muxer::{ConvertError, ConvertOptions, convert};
use crate::ugoira::parser::{IllustLinkParseResult, api_meta_url, legacy_page_url, parse_illust_link};
use crate::ugoira::resolver::{ResolveError, resolve_payload};
use crate::ugoira::source::{AcquireError, FetchStrategy, SourceOptions, acquire};
use crate::ugoira::types::{AuthMode, Fidelity, PayloadKind, UgoiraDescriptor};

/// Per-call configuration for both stages
#[derive(Clone, Debug)]
pub struct Settings {
    pub payload_kind: PayloadKind,
    pub fidelity: Fidelity,
    pub archive_size: Option<String>,
    pub frame_workers: usize,
    pub fallback_to_archive: bool,
    pub out_dir: PathBuf,
    pub convert: ConvertOptions,
    pub batch_concurrency: usize,
}

impl Settings {
    pub fn from_config(config: &AppConfig) -> Settings {
        let out_dir = config.output_dir.clone().unwrap_or_else(|| PathBuf::from("."));
        Settings {
            payload_kind: config.pixiv.payload_kind,
            fidelity: config.pixiv.fidelity,
            archive_size: config.pixiv.archive_size.clone(),
            frame_workers: config.pixiv.frame_workers,
            fallback_to_archive: config.pixiv.fallback_to_archive,
            convert: ConvertOptions {
                profile: config.convert.profile,
                out_dir: out_dir.clone(),
                temp_root: config.convert.temp_root.clone(),
            },
            out_dir,
            batch_concurrency: config.batch_concurrency,
        }
    }
}

/* Pipeline Error */

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    /// No usable descriptor could be read from upstream
    UpstreamShape,
    Network,
    /// A frame among many failed, nothing was persisted
    PartialFetch,
    Encoding,
    Io,
    /// Bad input from the caller
    Usage,
}

#[derive(Debug)]
pub enum PipelineError {
    InvalidInput(String),
    MetadataFetch { url: String, message: String },
    MetadataStatus { url: String, status: u16 },
    Resolve(ResolveError),
    Acquire(AcquireError),
    FallbackFailed { original: AcquireError, fallback: AcquireError },
    Archive(ArchiveError),
    Convert(ConvertError),
}

impl PipelineError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            PipelineError::InvalidInput(_) => ErrorCategory::Usage,
            PipelineError::MetadataFetch { .. } |
            PipelineError::MetadataStatus { .. } => ErrorCategory::Network,
            PipelineError::Resolve(_) => ErrorCategory::UpstreamShape,
            PipelineError::Acquire(e) => match e {
                AcquireError::FrameFetchFailed { .. } |
                AcquireError::Worker(_) => ErrorCategory::PartialFetch,
                AcquireError::ArchiveFetchFailed { .. } |
                AcquireError::Network { .. } => ErrorCategory::Network,
                AcquireError::StrategyUnavailable(_) => ErrorCategory::UpstreamShape,
                AcquireError::InvalidSize(_) => ErrorCategory::Usage,
            },
            PipelineError::FallbackFailed { .. } => ErrorCategory::PartialFetch,
            PipelineError::Archive(e) => match e {
                ArchiveError::FrameMismatch { .. } |
                ArchiveError::FrameOrder { .. } => ErrorCategory::UpstreamShape,
                _ => ErrorCategory::Io,
            },
            PipelineError::Convert(e) => match e {
                ConvertError::EncodeFailed { .. } |
                ConvertError::OutputMissing(_) => ErrorCategory::Encoding,
                _ => ErrorCategory::Io,
            },
        }
    }
}

impl Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::InvalidInput(input) => write!(f, "Not a pixiv illust link or id: {}", input),
            PipelineError::MetadataFetch { url, message } => write!(f, "Failed to request {}: {}", url, message),
            PipelineError::MetadataStatus { url, status } => write!(f, "Request to {} returned status {}", url, status),
            PipelineError::Resolve(e) => write!(f, "{}", e),
            PipelineError::Acquire(e) => write!(f, "{}", e),
            PipelineError::FallbackFailed { original, fallback } =>
                write!(f, "{}; fallback to prebuilt archive also failed: {}", original, fallback),
            PipelineError::Archive(e) => write!(f, "{}", e),
            PipelineError::Convert(e) => write!(f, "{}", e),
        }
    }
}

impl From<ResolveError> for PipelineError {
    fn from(value: ResolveError) -> Self {
        PipelineError::Resolve(value)
    }
}

impl From<AcquireError> for PipelineError {
    fn from(value: AcquireError) -> Self {
        PipelineError::Acquire(value)
    }
}

impl From<ArchiveError> for PipelineError {
    fn from(value: ArchiveError) -> Self {
        PipelineError::Archive(value)
    }
}

impl From<ConvertError> for PipelineError {
    fn from(value: ConvertError) -> Self {
        PipelineError::Convert(value)
    }
}

impl std::error::Error for PipelineError {}

#[derive(Debug)]
pub struct DownloadReport {
    pub id: String,
    pub strategy: FetchStrategy,
    pub files: ArchiveFiles,
    /// Set when the original frames failed and the prebuilt archive was used instead
    pub fallback_from: Option<AcquireError>,
}

impl DownloadReport {
    /// Archive path, followed by the error that forced the prebuilt archive
    pub fn summary(&self) -> String {
        let archive = self.files.archive.to_string_lossy();
        match self.fallback_from.as_ref() {
            Some(e) => format!("{} (original frames failed: {})", archive, e),
            None => archive.to_string(),
        }
    }
}

pub struct Pipeline<F: Fetch, E: Encoder> {
    fetcher: Arc<F>,
    encoder: E,
    settings: Settings,
}

impl<F: Fetch + 'static, E: Encoder> Pipeline<F, E> {
    pub fn new(fetcher: F, encoder: E, settings: Settings) -> Pipeline<F, E> {
        Pipeline { fetcher: Arc::new(fetcher), encoder, settings }
    }

    fn metadata_url(&self, input: &str) -> Result<String, PipelineError> {
        let IllustLinkParseResult::Success(id) = parse_illust_link(input) else {
            return Err(PipelineError::InvalidInput(input.to_string()));
        };
        let url = match self.settings.payload_kind {
            PayloadKind::Api => api_meta_url(id),
            PayloadKind::Page => legacy_page_url(id),
        };
        Ok(url)
    }

    /// Fetches the metadata for `input` and resolves it
    pub async fn describe(&self, input: &str) -> Result<UgoiraDescriptor, PipelineError> {
        let url = self.metadata_url(input)?;
        let auth = AuthMode::from_session(self.fetcher.has_session());

        log::info!(
            target: "ugoira_pipeline",
            "Requesting pixiv metadata ({:?}, {:?}): {url}", self.settings.payload_kind, auth
        );

        let response = self.fetcher.fetch(&url).await
            .map_err(|e| PipelineError::MetadataFetch { url: url.clone(), message: e.to_string() })?;
        if !response.is_success() {
            return Err(PipelineError::MetadataStatus { url, status: response.status });
        }

        let descriptor = resolve_payload(
            &response.body, &url, self.settings.payload_kind, auth, self.settings.fidelity
        )?;
        log::info!(
            target: "ugoira_pipeline",
            "{} Resolved {} frames, {} ms in total",
            LogUgoira(&descriptor.id), descriptor.frame_count(), descriptor.total_duration_ms()
        );
        Ok(descriptor)
    }

    /// Stage A: metadata, frames, archive and sidecar
    pub async fn download(&self, input: &str) -> Result<DownloadReport, PipelineError> {
        let descriptor = self.describe(input).await?;
        self.download_descriptor(&descriptor).await
    }

    pub async fn download_descriptor(&self, descriptor: &UgoiraDescriptor) -> Result<DownloadReport, PipelineError> {
        let id = descriptor.id.as_str();
        let options = SourceOptions { workers: self.settings.frame_workers };
        let strategy = FetchStrategy::select(
            descriptor, self.settings.fidelity, self.settings.archive_size.as_deref()
        );

        log::info!(
            target: "ugoira_pipeline",
            "{} Fetching {strategy}", LogUgoira(id)
        );

        let (strategy, acquired, fallback_from) =
            match acquire(self.fetcher.clone(), descriptor, &strategy, &options).await {
                Ok(acquired) => (strategy, acquired, None),
                Err(original) if strategy == FetchStrategy::OriginalFrames
                    && self.settings.fallback_to_archive
                    && descriptor.archive_url.is_some() =>
                {
                    log::warn!(
                        target: "ugoira_pipeline",
                        "{} Original frames failed ({original}), retrying with the prebuilt archive", LogUgoira(id)
                    );
                    let fallback = FetchStrategy::PrebuiltArchive { size: self.settings.archive_size.clone() };
                    match acquire(self.fetcher.clone(), descriptor, &fallback, &options).await {
                        Ok(acquired) => (fallback, acquired, Some(original)),
                        Err(second) => return Err(PipelineError::FallbackFailed { original, fallback: second }),
                    }
                }
                Err(e) => return Err(e.into()),
            };

        let base_name = archive_base_name(descriptor, &strategy);
        let files = build_archive(&self.settings.out_dir, &base_name, descriptor, acquired).await?;

        Ok(DownloadReport { id: descriptor.id.clone(), strategy, files, fallback_from })
    }

    /// Stage B: archive and sidecar to video
    pub async fn convert(&self, archive_path: &Path) -> Result<PathBuf, PipelineError> {
        Ok(convert(&self.encoder, archive_path, &self.settings.convert).await?)
    }

    /// Every item gets its own result, in input order
    pub async fn download_batch(&self, inputs: &[String]) -> Vec<(String, Result<DownloadReport, PipelineError>)> {
        futures::stream::iter(inputs.iter())
            .map(|input| async move {
                let result = self.download(input).await;
                if let Err(e) = result.as_ref() {
                    log::error!(
                        target: "ugoira_pipeline",
                        "Download of {input} failed ({:?}): {e}", e.category()
                    );
                }
                (input.clone(), result)
            })
            .buffered(self.settings.batch_concurrency.max(1))
            .collect()
            .await
    }

    pub async fn convert_batch(&self, archives: &[PathBuf]) -> Vec<(PathBuf, Result<PathBuf, PipelineError>)> {
        futures::stream::iter(archives.iter())
            .map(|archive| async move {
                let result = self.convert(archive).await;
                if let Err(e) = result.as_ref() {
                    log::error!(
                        target: "ugoira_pipeline",
                        "{} Conversion failed ({:?}): {e}", LogArchive(archive), e.category()
                    );
                }
                (archive.clone(), result)
            })
            .buffered(self.settings.batch_concurrency.max(1))
            .collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ugoira::encoder::EncodeProfile;

    #[test]
    fn settings_take_output_dir_for_both_stages() {
        let mut config = AppConfig::default();
        config.output_dir = Some(PathBuf::from("out"));
        config.convert.profile = EncodeProfile::H264;
        let settings = Settings::from_config(&config);
        assert_eq!(settings.out_dir, PathBuf::from("out"));
        assert_eq!(settings.convert.out_dir, PathBuf::from("out"));
        assert_eq!(settings.convert.profile, EncodeProfile::H264);
        assert_eq!(settings.frame_workers, 4);
    }

    #[test]
    fn summary_names_the_fallback_cause() {
        let mut report = DownloadReport {
            id: "7".into(),
            strategy: FetchStrategy::PrebuiltArchive { size: None },
            files: ArchiveFiles {
                archive: PathBuf::from("out/7_ugoira600x600.zip"),
                sidecar: PathBuf::from("out/7_ugoira600x600.json"),
                frame_count: 2,
            },
            fallback_from: None,
        };
        assert_eq!(report.summary(), "out/7_ugoira600x600.zip");

        report.fallback_from = Some(AcquireError::FrameFetchFailed { index: 1, status: 403 });
        assert_eq!(
            report.summary(),
            "out/7_ugoira600x600.zip (original frames failed: Frame 1 fetch failed with status 403)"
        );
    }

    #[test]
    fn errors_map_to_categories() {
        let partial = PipelineError::Acquire(AcquireError::FrameFetchFailed { index: 3, status: 404 });
        assert_eq!(partial.category(), ErrorCategory::PartialFetch);

        let network = PipelineError::Acquire(AcquireError::ArchiveFetchFailed { status: 500 });
        assert_eq!(network.category(), ErrorCategory::Network);

        let encoding = PipelineError::Convert(ConvertError::EncodeFailed { code: Some(1), diagnostic: String::new() });
        assert_eq!(encoding.category(), ErrorCategory::Encoding);

        let io = PipelineError::Archive(ArchiveError::IoError(std::io::Error::other("disk full")));
        assert_eq!(io.category(), ErrorCategory::Io);

        let shape = PipelineError::Archive(ArchiveError::FrameMismatch { expected: 2, found: 1 });
        assert_eq!(shape.category(), ErrorCategory::UpstreamShape);
    }
}
