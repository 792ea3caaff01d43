use std::str::FromStr;

use serde::{Deserialize, Serialize};

/* Request options */

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    /// Artwork page with the metadata embedded in an inline script
    Page,
    /// `ajax/illust/<id>/ugoira_meta` JSON
    Api,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthMode {
    Anonymous,
    Session,
}

impl AuthMode {
    pub fn from_session(has_session: bool) -> AuthMode {
        if has_session { AuthMode::Session } else { AuthMode::Anonymous }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fidelity {
    Standard,
    Maximum,
}

impl FromStr for PayloadKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "page" => Ok(PayloadKind::Page),
            "api" => Ok(PayloadKind::Api),
            other => Err(format!("unknown payload kind {other}, expected page or api")),
        }
    }
}

impl FromStr for Fidelity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "standard" => Ok(Fidelity::Standard),
            "maximum" | "max" => Ok(Fidelity::Maximum),
            other => Err(format!("unknown fidelity {other}, expected standard or maximum")),
        }
    }
}

/* Descriptor */

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameSpec {
    pub index: u32,
    pub delay_ms: u64,
    pub filename: String,
}

impl FrameSpec {
    pub fn new(index: u32, delay_ms: u64, extension: &str) -> FrameSpec {
        FrameSpec { index, delay_ms, filename: frame_file_name(index, extension) }
    }
}

/// Archive entry name for a frame: zero-padded six digit index plus extension
pub fn frame_file_name(index: u32, extension: &str) -> String {
    format!("{:06}.{}", index, extension)
}

pub const FRAME_INDEX_PLACEHOLDER: &str = "{index}";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DescriptorError {
    NoFrames,
    NoSource,
    IndexOutOfOrder { position: usize, index: u32 },
    DuplicateFile(String),
    BadPattern(String),
}

impl std::fmt::Display for DescriptorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DescriptorError::NoFrames => write!(f, "descriptor has no frames"),
            DescriptorError::NoSource => write!(f, "neither archive url nor original frame pattern is present"),
            DescriptorError::IndexOutOfOrder { position, index } =>
                write!(f, "frame at position {} has index {}", position, index),
            DescriptorError::DuplicateFile(name) => write!(f, "duplicate frame file name {}", name),
            DescriptorError::BadPattern(pattern) =>
                write!(f, "frame url pattern {} must contain exactly one {}", pattern, FRAME_INDEX_PLACEHOLDER),
        }
    }
}

impl std::error::Error for DescriptorError {}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UgoiraDescriptor {
    pub id: String,
    pub source_url: String,
    pub frames: Vec<FrameSpec>,
    pub archive_url: Option<String>,
    pub original_frame_url_pattern: Option<String>,
    pub mime_type: Option<String>,
}

impl UgoiraDescriptor {
    pub fn new(
        id: String,
        source_url: String,
        frames: Vec<FrameSpec>,
        archive_url: Option<String>,
        original_frame_url_pattern: Option<String>,
        mime_type: Option<String>,
    ) -> Result<UgoiraDescriptor, DescriptorError> {
        if frames.is_empty() {
            return Err(DescriptorError::NoFrames);
        }
        if archive_url.is_none() && original_frame_url_pattern.is_none() {
            return Err(DescriptorError::NoSource);
        }
        for (position, frame) in frames.iter().enumerate() {
            if frame.index as usize != position {
                return Err(DescriptorError::IndexOutOfOrder { position, index: frame.index });
            }
            if frames[..position].iter().any(|prev| prev.filename == frame.filename) {
                return Err(DescriptorError::DuplicateFile(frame.filename.clone()));
            }
        }
        if let Some(pattern) = original_frame_url_pattern.as_ref() {
            if pattern.matches(FRAME_INDEX_PLACEHOLDER).count() != 1 {
                return Err(DescriptorError::BadPattern(pattern.clone()));
            }
        }

        Ok(UgoiraDescriptor { id, source_url, frames, archive_url, original_frame_url_pattern, mime_type })
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.frames.iter().map(|frame| frame.delay_ms).sum()
    }

    /// URL of the original image for `index`, if per-frame originals are known
    pub fn original_frame_url(&self, index: u32) -> Option<String> {
        self.original_frame_url_pattern.as_ref()
            .map(|pattern| pattern.replacen(FRAME_INDEX_PLACEHOLDER, &index.to_string(), 1))
    }

    pub fn to_sidecar(&self) -> Sidecar {
        Sidecar {
            frames: self.frames.iter()
                .map(|frame| SidecarFrame { delay: frame.delay_ms, file: frame.filename.clone() })
                .collect()
        }
    }
}

/* Frame data */

#[derive(Clone, Debug)]
pub struct FrameBytes {
    pub spec: FrameSpec,
    pub data: Vec<u8>,
}

/* Sidecar */

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidecarFrame {
    pub delay: u64,
    pub file: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sidecar {
    pub frames: Vec<SidecarFrame>,
}
