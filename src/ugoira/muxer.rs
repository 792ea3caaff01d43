use std::fmt::{Display, Write as _};
use std::path::{Path, PathBuf};

use crate::helper::file_name::FileName;
use crate::helper::log::{LogArchive, LogTail};
use crate::helper::tempfile::{create_tempfile, create_workspace};
use crate::ugoira::archive::{ArchiveError, load_timing};
use crate::ugoira::encoder::{EncodeProfile, EncodeRequest, Encoder};
use crate::ugoira::types::SidecarFrame;

pub const DIRECTIVE_HEADER: &str = "ffconcat version 1.0\n";
pub const DIRECTIVE_FILE_NAME: &str = "i.ffconcat";

const WORKSPACE_PREFIX: &str = "ugoira";

/* Convert Error */

#[derive(Debug)]
pub enum ConvertError {
    ArchiveError(ArchiveError),
    IoError(std::io::Error),
    EmptyTiming,
    InvalidFrameName(String),
    MissingFrame(String),
    EncodeFailed { code: Option<i32>, diagnostic: String },
    OutputMissing(String),
    JoinError(String),
}

impl Display for ConvertError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConvertError::ArchiveError(e) => write!(f, "{}", e),
            ConvertError::IoError(e) => write!(f, "IO Error: {}", e),
            ConvertError::EmptyTiming => write!(f, "Sidecar lists no frames"),
            ConvertError::InvalidFrameName(name) => write!(f, "Frame name {:?} cannot be used in a directive", name),
            ConvertError::MissingFrame(name) => write!(f, "Frame {} is not in the archive", name),
            ConvertError::EncodeFailed { code: Some(code), diagnostic } =>
                write!(f, "Encoder exited with status {}: {}", code, diagnostic.trim_end()),
            ConvertError::EncodeFailed { code: None, diagnostic } =>
                write!(f, "Encoder was terminated by a signal: {}", diagnostic.trim_end()),
            ConvertError::OutputMissing(name) => write!(f, "Encoder reported success but produced no {}", name),
            ConvertError::JoinError(e) => write!(f, "Extract task failed: {}", e),
        }
    }
}

impl From<ArchiveError> for ConvertError {
    fn from(value: ArchiveError) -> Self {
        ConvertError::ArchiveError(value)
    }
}

impl From<std::io::Error> for ConvertError {
    fn from(value: std::io::Error) -> Self {
        ConvertError::IoError(value)
    }
}

impl From<tempfile::PersistError> for ConvertError {
    fn from(value: tempfile::PersistError) -> Self {
        ConvertError::IoError(value.error)
    }
}

impl From<zip::result::ZipError> for ConvertError {
    fn from(value: zip::result::ZipError) -> Self {
        ConvertError::ArchiveError(ArchiveError::ZipError(value))
    }
}

impl std::error::Error for ConvertError {}

#[derive(Clone, Debug)]
pub struct ConvertOptions {
    pub profile: EncodeProfile,
    /// Where the finished video is published
    pub out_dir: PathBuf,
    /// Parent of the scoped workspace, system temp dir when absent
    pub temp_root: Option<PathBuf>,
}

/// Seconds with millisecond precision: 33 -> `0.033`, 100 -> `0.1`, 1000 -> `1.0`
pub fn format_duration(delay_ms: u64) -> String {
    let seconds = delay_ms / 1000;
    let millis = delay_ms % 1000;
    if millis == 0 {
        return format!("{}.0", seconds);
    }
    let fraction = format!("{:03}", millis);
    format!("{}.{}", seconds, fraction.trim_end_matches('0'))
}

pub fn build_directive(frames: &[SidecarFrame]) -> String {
    let mut directive = String::from(DIRECTIVE_HEADER);
    for frame in frames {
        // Writing into a String cannot fail
        let _ = write!(directive, "file {}\nduration {}\n", frame.file, format_duration(frame.delay));
    }
    directive
}

/// Plain names only, the directive format has no quoting here
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.chars().any(|c| c == '/' || c == '\\' || c == '\'' || c == '"' || c.is_whitespace() || c.is_control())
}

/// Path the video for `archive_path` ends up at
pub fn output_path(archive_path: &Path, options: &ConvertOptions) -> PathBuf {
    let name = FileName::from_path(archive_path)
        .unwrap_or_else(|| FileName::from("ugoira"))
        .with_extension(options.profile.extension());
    options.out_dir.join(name.to_string())
}

pub async fn convert<E: Encoder>(
    encoder: &E,
    archive_path: &Path,
    options: &ConvertOptions,
) -> Result<PathBuf, ConvertError> {
    let timing = load_timing(archive_path)?;
    if timing.frames.is_empty() {
        return Err(ConvertError::EmptyTiming);
    }
    if let Some(frame) = timing.frames.iter().find(|frame| !is_plain_file_name(&frame.file)) {
        return Err(ConvertError::InvalidFrameName(frame.file.clone()));
    }

    let final_path = output_path(archive_path, options);
    let output_name = final_path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| format!("ugoira.{}", options.profile.extension()));

    // Removed on drop, whichever way this function returns
    let workspace = create_workspace(WORKSPACE_PREFIX, options.temp_root.as_deref())?;

    log::info!(
        target: "ugoira_muxer",
        "{} Extracting {} frames to {}",
        LogArchive(archive_path), timing.frames.len(), workspace.path().to_string_lossy()
    );

    let zip_path = archive_path.to_path_buf();
    let extract_dir = workspace.path().to_path_buf();
    let unzip_task = tokio::task::spawn_blocking(move || -> Result<(), ConvertError> {
        let zip_file = std::fs::File::open(zip_path)?;
        let mut archive = zip::ZipArchive::new(zip_file)?;
        archive.extract(extract_dir)?;
        Ok(())
    });
    unzip_task.await.map_err(|e| ConvertError::JoinError(e.to_string()))??;

    for frame in timing.frames.iter() {
        if !workspace.path().join(&frame.file).is_file() {
            return Err(ConvertError::MissingFrame(frame.file.clone()));
        }
    }

    let directive = build_directive(&timing.frames);
    tokio::fs::write(workspace.path().join(DIRECTIVE_FILE_NAME), directive.as_bytes()).await?;

    let length_ms: u64 = timing.frames.iter().map(|frame| frame.delay).sum();
    log::info!(
        target: "ugoira_muxer",
        "{} Encoding {} ({} frames, {} ms) with profile {}",
        LogArchive(archive_path), output_name, timing.frames.len(), length_ms, options.profile
    );

    let request = EncodeRequest {
        workspace: workspace.path().to_path_buf(),
        directive: DIRECTIVE_FILE_NAME.to_string(),
        profile: options.profile,
        output: output_name.clone(),
    };
    let outcome = encoder.encode(&request).await?;
    if !outcome.success() {
        log::warn!(
            target: "ugoira_muxer",
            "{} Encoder exited with {:?}\n{}",
            LogArchive(archive_path), outcome.code, LogTail(&outcome.diagnostic, 8)
        );
        return Err(ConvertError::EncodeFailed { code: outcome.code, diagnostic: outcome.diagnostic });
    }

    let produced = workspace.path().join(&output_name);
    if !produced.is_file() {
        return Err(ConvertError::OutputMissing(output_name));
    }

    publish_output(&produced, &final_path).await?;

    log::info!(
        target: "ugoira_muxer",
        "{} Saved video to {}", LogArchive(archive_path), final_path.to_string_lossy()
    );

    Ok(final_path)
}

/// Moves `produced` onto `destination` without exposing a partial file
async fn publish_output(produced: &Path, destination: &Path) -> Result<(), ConvertError> {
    if tokio::fs::rename(produced, destination).await.is_ok() {
        return Ok(());
    }

    // Workspace and destination may sit on different filesystems
    let dir = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let suffix = destination.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    let temp = create_tempfile(&suffix, &dir, 8)?;
    tokio::fs::copy(produced, temp.path()).await?;
    temp.as_file().sync_all()?;
    temp.persist(destination)?;
    Ok(())
}
