use std::fmt::Display;
use std::fs::File;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

use zip::CompressionMethod;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;

use crate::helper::file_name::FileName;
use crate::helper::log::LogArchive;
use crate::helper::tempfile::{create_tempfile, save_to_tempfile};
use crate::ugoira::source::{Acquired, FetchStrategy, substitute_size_token};
use crate::ugoira::types::{FrameBytes, Sidecar, UgoiraDescriptor};

/// Timing entry some archives carry inside the zip itself
pub const EMBEDDED_TIMING_NAME: &str = "animation.json";

const TEMP_RANDOM_LEN: usize = 8;

/* Archive Error */

#[derive(Debug)]
pub enum ArchiveError {
    IoError(std::io::Error),
    ZipError(ZipError),
    SidecarError(serde_json::Error),
    FrameMismatch { expected: usize, found: usize },
    FrameOrder { position: usize, file: String },
    SidecarMissing(PathBuf),
    JoinError(String),
}

impl Display for ArchiveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArchiveError::IoError(e) => write!(f, "IO Error: {}", e),
            ArchiveError::ZipError(e) => write!(f, "Zip Error: {}", e),
            ArchiveError::SidecarError(e) => write!(f, "Sidecar Error: {}", e),
            ArchiveError::FrameMismatch { expected, found } =>
                write!(f, "Expected {} frames but got {}", expected, found),
            ArchiveError::FrameOrder { position, file } =>
                write!(f, "Frame {} at position {} does not match the descriptor", file, position),
            ArchiveError::SidecarMissing(path) =>
                write!(f, "No timing sidecar for {}", path.to_string_lossy()),
            ArchiveError::JoinError(e) => write!(f, "Archive task failed: {}", e),
        }
    }
}

impl From<std::io::Error> for ArchiveError {
    fn from(value: std::io::Error) -> Self {
        ArchiveError::IoError(value)
    }
}

impl From<ZipError> for ArchiveError {
    fn from(value: ZipError) -> Self {
        ArchiveError::ZipError(value)
    }
}

impl From<serde_json::Error> for ArchiveError {
    fn from(value: serde_json::Error) -> Self {
        ArchiveError::SidecarError(value)
    }
}

impl From<tempfile::PersistError> for ArchiveError {
    fn from(value: tempfile::PersistError) -> Self {
        ArchiveError::IoError(value.error)
    }
}

impl std::error::Error for ArchiveError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFiles {
    pub archive: PathBuf,
    pub sidecar: PathBuf,
    pub frame_count: usize,
}

/// `<name>.zip` pairs with `<name>.json`
pub fn sidecar_path<P: AsRef<Path>>(archive: P) -> PathBuf {
    archive.as_ref().with_extension("json")
}

/// File stem the archive and sidecar are saved under
pub fn archive_base_name(descriptor: &UgoiraDescriptor, strategy: &FetchStrategy) -> String {
    let stem = match strategy {
        FetchStrategy::OriginalFrames => None,
        FetchStrategy::PrebuiltArchive { size } => descriptor.archive_url.as_ref().map(|url| {
            let url = size.as_deref()
                .and_then(|size| substitute_size_token(url, size))
                .unwrap_or(url.clone());
            let name = url.rsplit('/').next().unwrap_or(url.as_str());
            let name = name.split(['?', '#']).next().unwrap_or(name);
            FileName::from(name).basename
        }),
    };
    stem.filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| format!("{}_ugoira_original", descriptor.id))
}

pub async fn build_archive(
    out_dir: &Path,
    base_name: &str,
    descriptor: &UgoiraDescriptor,
    acquired: Acquired,
) -> Result<ArchiveFiles, ArchiveError> {
    let out_dir = out_dir.to_path_buf();
    let base_name = base_name.to_string();
    let descriptor = descriptor.clone();

    // Blocking zip and write operation
    let archiving_task = tokio::task::spawn_blocking(move || {
        write_archive(&out_dir, &base_name, &descriptor, acquired)
    });
    archiving_task.await.map_err(|e| ArchiveError::JoinError(e.to_string()))?
}

pub fn write_archive(
    out_dir: &Path,
    base_name: &str,
    descriptor: &UgoiraDescriptor,
    acquired: Acquired,
) -> Result<ArchiveFiles, ArchiveError> {
    let archive_path = out_dir.join(format!("{}.zip", base_name));
    let sidecar_file_path = sidecar_path(&archive_path);

    let archive_temp = match acquired {
        Acquired::Frames(frames) => {
            check_frame_order(descriptor, &frames)?;
            let temp = create_tempfile(".zip", out_dir, TEMP_RANDOM_LEN)?;
            let mut archive = zip::ZipWriter::new(temp);
            let options = SimpleFileOptions::default()
                .compression_method(CompressionMethod::Stored)
                .unix_permissions(0o644);
            for frame in frames.iter() {
                archive.start_file(frame.spec.filename.as_str(), options)?;
                archive.write_all(&frame.data)?;
            }
            let temp = archive.finish()?;
            temp.as_file().sync_all()?;
            temp
        }
        Acquired::Archive(data) => {
            check_archive_entries(descriptor, &data)?;
            save_to_tempfile(".zip", out_dir, TEMP_RANDOM_LEN, &data)?
        }
    };

    let sidecar_data = serde_json::to_vec_pretty(&descriptor.to_sidecar())?;
    let sidecar_temp = save_to_tempfile(".json", out_dir, TEMP_RANDOM_LEN, &sidecar_data)?;

    archive_temp.persist(&archive_path)?;
    if let Err(e) = sidecar_temp.persist(&sidecar_file_path) {
        // A zip without its timing is not usable
        let _ = std::fs::remove_file(&archive_path);
        return Err(e.into());
    }

    log::info!(
        target: "ugoira_archive",
        "{} Saved {} frames with sidecar {}",
        LogArchive(&archive_path), descriptor.frame_count(), sidecar_file_path.to_string_lossy()
    );

    Ok(ArchiveFiles {
        archive: archive_path,
        sidecar: sidecar_file_path,
        frame_count: descriptor.frame_count(),
    })
}

fn check_frame_order(descriptor: &UgoiraDescriptor, frames: &[FrameBytes]) -> Result<(), ArchiveError> {
    if frames.len() != descriptor.frame_count() {
        return Err(ArchiveError::FrameMismatch { expected: descriptor.frame_count(), found: frames.len() });
    }
    for (position, (frame, spec)) in frames.iter().zip(descriptor.frames.iter()).enumerate() {
        if frame.spec != *spec {
            return Err(ArchiveError::FrameOrder { position, file: frame.spec.filename.clone() });
        }
    }
    Ok(())
}

/// Frame entries of a prebuilt zip must be the descriptor's files, in its order
fn check_archive_entries(descriptor: &UgoiraDescriptor, data: &[u8]) -> Result<(), ArchiveError> {
    let archive = zip::ZipArchive::new(Cursor::new(data))?;
    let entries: Vec<&str> = archive.file_names()
        .filter(|name| *name != EMBEDDED_TIMING_NAME && !name.ends_with('/'))
        .collect();
    if entries.len() != descriptor.frame_count() {
        return Err(ArchiveError::FrameMismatch { expected: descriptor.frame_count(), found: entries.len() });
    }
    for (position, (entry, spec)) in entries.iter().zip(descriptor.frames.iter()).enumerate() {
        if *entry != spec.filename {
            return Err(ArchiveError::FrameOrder { position, file: entry.to_string() });
        }
    }
    Ok(())
}

pub fn read_sidecar<P: AsRef<Path>>(path: P) -> Result<Sidecar, ArchiveError> {
    let file = File::open(path)?;
    let sidecar: Sidecar = serde_json::from_reader(std::io::BufReader::new(file))?;
    Ok(sidecar)
}

/// Timing from an `animation.json` entry inside the zip, if it has one
pub fn read_embedded_timing<P: AsRef<Path>>(archive_path: P) -> Result<Option<Sidecar>, ArchiveError> {
    let file = File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    let mut entry = match archive.by_name(EMBEDDED_TIMING_NAME) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut data = Vec::new();
    entry.read_to_end(&mut data)?;
    Ok(Some(serde_json::from_slice(&data)?))
}

/// Sidecar next to the archive, falling back to the embedded timing entry
pub fn load_timing<P: AsRef<Path>>(archive_path: P) -> Result<Sidecar, ArchiveError> {
    let archive_path = archive_path.as_ref();
    let sidecar_file_path = sidecar_path(archive_path);
    if sidecar_file_path.is_file() {
        return read_sidecar(&sidecar_file_path);
    }

    log::debug!(
        target: "ugoira_archive",
        "{} No sidecar at {}, looking for {EMBEDDED_TIMING_NAME}",
        LogArchive(archive_path), sidecar_file_path.to_string_lossy()
    );
    read_embedded_timing(archive_path)?
        .ok_or_else(|| ArchiveError::SidecarMissing(archive_path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ugoira::types::FrameSpec;

    fn descriptor(delays: &[u64]) -> UgoiraDescriptor {
        let frames = delays.iter().enumerate()
            .map(|(i, delay)| FrameSpec::new(i as u32, *delay, "jpg"))
            .collect();
        UgoiraDescriptor::new(
            "77".into(), "https://www.pixiv.net/artworks/77".into(), frames,
            Some("https://i.pximg.net/img-zip-ugoira/img/2020/01/01/00/00/00/77_ugoira600x600.zip".into()),
            Some("https://i.pximg.net/img-original/img/2020/01/01/00/00/00/77_ugoira{index}.jpg".into()),
            None,
        ).unwrap()
    }

    fn frame_bytes(descriptor: &UgoiraDescriptor) -> Vec<FrameBytes> {
        descriptor.frames.iter()
            .map(|spec| FrameBytes { spec: spec.clone(), data: format!("frame{}", spec.index).into_bytes() })
            .collect()
    }

    fn zip_of(names: &[&str]) -> Vec<u8> {
        let mut data = Vec::new();
        let mut archive = zip::ZipWriter::new(Cursor::new(&mut data));
        for name in names {
            archive.start_file(*name, SimpleFileOptions::default()).unwrap();
            archive.write_all(name.as_bytes()).unwrap();
        }
        archive.finish().unwrap();
        data
    }

    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir).unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn frames_round_trip_through_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let d = descriptor(&[33, 120, 0, 33]);
        let files = write_archive(dir.path(), "77_ugoira_original", &d, Acquired::Frames(frame_bytes(&d))).unwrap();

        assert_eq!(files.archive, dir.path().join("77_ugoira_original.zip"));
        assert_eq!(files.sidecar, dir.path().join("77_ugoira_original.json"));
        assert_eq!(read_sidecar(&files.sidecar).unwrap(), d.to_sidecar());

        let mut archive = zip::ZipArchive::new(File::open(&files.archive).unwrap()).unwrap();
        assert_eq!(archive.len(), 4);
        for (i, spec) in d.frames.iter().enumerate() {
            let mut entry = archive.by_index(i).unwrap();
            assert_eq!(entry.name(), spec.filename);
            let mut content = String::new();
            entry.read_to_string(&mut content).unwrap();
            assert_eq!(content, format!("frame{}", i));
        }
        assert_eq!(dir_entries(dir.path()), vec!["77_ugoira_original.json", "77_ugoira_original.zip"]);
    }

    #[test]
    fn passthrough_archive_is_kept_byte_for_byte() {
        let dir = tempfile::tempdir().unwrap();
        let d = descriptor(&[40, 40]);
        let data = zip_of(&["000000.jpg", "000001.jpg", EMBEDDED_TIMING_NAME]);
        let files = write_archive(dir.path(), "77_ugoira600x600", &d, Acquired::Archive(data.clone())).unwrap();
        assert_eq!(std::fs::read(&files.archive).unwrap(), data);
        assert_eq!(files.frame_count, 2);
    }

    #[test]
    fn passthrough_with_wrong_frame_count_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let d = descriptor(&[40, 40, 40]);
        let err = write_archive(dir.path(), "x", &d, Acquired::Archive(zip_of(&["000000.jpg"]))).unwrap_err();
        assert!(matches!(err, ArchiveError::FrameMismatch { expected: 3, found: 1 }));
        assert!(dir_entries(dir.path()).is_empty());
    }

    #[test]
    fn passthrough_that_is_not_a_zip_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let d = descriptor(&[40]);
        let err = write_archive(dir.path(), "x", &d, Acquired::Archive(b"<html>".to_vec())).unwrap_err();
        assert!(matches!(err, ArchiveError::ZipError(_)));
        assert!(dir_entries(dir.path()).is_empty());
    }

    #[test]
    fn passthrough_entries_must_match_sidecar_names() {
        let dir = tempfile::tempdir().unwrap();
        let d = descriptor(&[40, 40]);
        let err = write_archive(
            dir.path(), "x", &d, Acquired::Archive(zip_of(&["000000.jpg", "000001.png"]))
        ).unwrap_err();
        assert!(matches!(err, ArchiveError::FrameOrder { position: 1, file } if file == "000001.png"));

        let err = write_archive(
            dir.path(), "x", &d, Acquired::Archive(zip_of(&["000001.jpg", "000000.jpg"]))
        ).unwrap_err();
        assert!(matches!(err, ArchiveError::FrameOrder { position: 0, .. }));
        assert!(dir_entries(dir.path()).is_empty());
    }

    #[test]
    fn reordered_frames_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let d = descriptor(&[10, 20]);
        let mut frames = frame_bytes(&d);
        frames.swap(0, 1);
        let err = write_archive(dir.path(), "x", &d, Acquired::Frames(frames)).unwrap_err();
        assert!(matches!(err, ArchiveError::FrameOrder { position: 0, .. }));
        assert!(dir_entries(dir.path()).is_empty());
    }

    #[test]
    fn missing_output_dir_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let d = descriptor(&[10]);
        let missing = dir.path().join("missing");
        let err = write_archive(&missing, "x", &d, Acquired::Frames(frame_bytes(&d))).unwrap_err();
        assert!(matches!(err, ArchiveError::IoError(_)));
        assert!(!missing.exists());
    }

    #[test]
    fn base_names_follow_strategy() {
        let d = descriptor(&[10]);
        assert_eq!(archive_base_name(&d, &FetchStrategy::OriginalFrames), "77_ugoira_original");
        assert_eq!(
            archive_base_name(&d, &FetchStrategy::PrebuiltArchive { size: Some("1920x1080".into()) }),
            "77_ugoira1920x1080"
        );
        assert_eq!(archive_base_name(&d, &FetchStrategy::PrebuiltArchive { size: None }), "77_ugoira600x600");
    }

    #[test]
    fn timing_falls_back_to_embedded_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.zip");
        let mut archive = zip::ZipWriter::new(File::create(&path).unwrap());
        archive.start_file("000000.png", SimpleFileOptions::default()).unwrap();
        archive.write_all(b"png").unwrap();
        archive.start_file(EMBEDDED_TIMING_NAME, SimpleFileOptions::default()).unwrap();
        archive.write_all(br#"{"src":"x","frames":[{"file":"000000.png","delay":90}]}"#).unwrap();
        archive.finish().unwrap();

        let timing = load_timing(&path).unwrap();
        assert_eq!(timing.frames.len(), 1);
        assert_eq!(timing.frames[0].delay, 90);

        std::fs::write(sidecar_path(&path), r#"{"frames":[{"delay":10,"file":"000000.png"}]}"#).unwrap();
        assert_eq!(load_timing(&path).unwrap().frames[0].delay, 10);
    }

    #[test]
    fn timing_missing_everywhere() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bare.zip");
        std::fs::write(&path, zip_of(&["000000.jpg"])).unwrap();
        assert!(matches!(load_timing(&path).unwrap_err(), ArchiveError::SidecarMissing(_)));
    }
}
