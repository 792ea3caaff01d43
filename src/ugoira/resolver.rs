use std::fmt::Display;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::helper::file_name::FileName;
use crate::ugoira::types::{AuthMode, Fidelity, FrameSpec, PayloadKind, UgoiraDescriptor, FRAME_INDEX_PLACEHOLDER};

/* Inline script markers */

static SMALL_ANONYMOUS_REGEX: LazyLock<Regex> = LazyLock::new(||
    Regex::new(r"pixiv\.context\.ugokuIllustData {12}= (\{.*?\});pixiv")
    .expect("Anonymous ugoira data regex construct failed.")
);

static SMALL_AUTHENTICATED_REGEX: LazyLock<Regex> = LazyLock::new(||
    Regex::new(r"pixiv\.context\.ugokuIllustData\s*=\s*(\{.*?\}\]\});")
    .expect("Authenticated ugoira data regex construct failed.")
);

static FULLSCREEN_REGEX: LazyLock<Regex> = LazyLock::new(||
    Regex::new(r"pixiv\.context\.ugokuIllustFullscreenData\s*=\s*(\{.*?\}\]\});")
    .expect("Fullscreen ugoira data regex construct failed.")
);

static ZIP_URL_REGEX: LazyLock<Regex> = LazyLock::new(||
    Regex::new(r"^(https?://[^/]+)/img-zip-ugoira/img/((?:[0-9]+/)+)([0-9]+)_ugoira[0-9]+x[0-9]+\.zip$")
    .expect("Ugoira zip url regex construct failed.")
);

static ARCHIVE_ID_REGEX: LazyLock<Regex> = LazyLock::new(||
    Regex::new(r"([0-9]+)_ugoira").expect("Ugoira id regex construct failed.")
);

static TRAILING_ID_REGEX: LazyLock<Regex> = LazyLock::new(||
    Regex::new(r"([0-9]+)[^0-9]*$").expect("Trailing id regex construct failed.")
);

/// Upstream metadata layouts, one parser each
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetadataShape {
    LegacySmallAnonymous,
    LegacySmallAuthenticated,
    LegacyFullscreen,
    RestApi,
}

impl MetadataShape {
    pub fn select(kind: PayloadKind, auth: AuthMode, fidelity: Fidelity) -> MetadataShape {
        match (kind, auth, fidelity) {
            (PayloadKind::Api, _, _) => MetadataShape::RestApi,
            (PayloadKind::Page, AuthMode::Anonymous, _) => MetadataShape::LegacySmallAnonymous,
            (PayloadKind::Page, AuthMode::Session, Fidelity::Standard) => MetadataShape::LegacySmallAuthenticated,
            (PayloadKind::Page, AuthMode::Session, Fidelity::Maximum) => MetadataShape::LegacyFullscreen,
        }
    }

    fn inline_regex(&self) -> Option<&'static Regex> {
        match self {
            MetadataShape::LegacySmallAnonymous => Some(&*SMALL_ANONYMOUS_REGEX),
            MetadataShape::LegacySmallAuthenticated => Some(&*SMALL_AUTHENTICATED_REGEX),
            MetadataShape::LegacyFullscreen => Some(&*FULLSCREEN_REGEX),
            MetadataShape::RestApi => None,
        }
    }
}

impl Display for MetadataShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataShape::LegacySmallAnonymous => write!(f, "ugokuIllustData (anonymous)"),
            MetadataShape::LegacySmallAuthenticated => write!(f, "ugokuIllustData (session)"),
            MetadataShape::LegacyFullscreen => write!(f, "ugokuIllustFullscreenData"),
            MetadataShape::RestApi => write!(f, "ugoira_meta API"),
        }
    }
}

/* Resolve Error */

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    MetadataNotFound { shape: MetadataShape, reason: String },
    SchemaMismatch { shape: MetadataShape, reason: String },
}

impl Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolveError::MetadataNotFound { shape, reason } =>
                write!(f, "Metadata not found ({}): {}", shape, reason),
            ResolveError::SchemaMismatch { shape, reason } =>
                write!(f, "Schema mismatch ({}): {}", shape, reason),
        }
    }
}

impl std::error::Error for ResolveError {}

/* Upstream payloads */

#[derive(Clone, Debug, Deserialize)]
struct RawFrame {
    file: String,
    delay: u64,
}

#[derive(Clone, Debug, Deserialize)]
struct InlineMeta {
    src: String,
    mime_type: Option<String>,
    frames: Vec<RawFrame>,
}

#[derive(Clone, Debug, Deserialize)]
struct ApiEnvelope {
    error: bool,
    #[serde(default)]
    message: String,
    body: Value,
}

#[derive(Clone, Debug, Deserialize)]
struct ApiMeta {
    src: String,
    #[serde(rename = "originalSrc")]
    original_src: Option<String>,
    mime_type: Option<String>,
    frames: Vec<RawFrame>,
}

/// Picks the parser for the payload and builds a descriptor from it
pub fn resolve_payload(
    bytes: &[u8],
    source_url: &str,
    kind: PayloadKind,
    auth: AuthMode,
    fidelity: Fidelity,
) -> Result<UgoiraDescriptor, ResolveError> {
    resolve(bytes, source_url, MetadataShape::select(kind, auth, fidelity))
}

pub fn resolve(bytes: &[u8], source_url: &str, shape: MetadataShape) -> Result<UgoiraDescriptor, ResolveError> {
    let not_found = |reason: String| ResolveError::MetadataNotFound { shape, reason };
    let mismatch = |reason: String| ResolveError::SchemaMismatch { shape, reason };

    let text = std::str::from_utf8(bytes)
        .map_err(|e| not_found(format!("payload is not UTF-8: {}", e)))?;

    let (archive_url, mime_type, frames) = match shape.inline_regex() {
        Some(regex) => {
            let Some((_, [json])) = regex.captures(text).map(|c| c.extract()) else {
                return Err(not_found("marker is absent from the page".to_string()));
            };
            let meta: InlineMeta = serde_json::from_str(json)
                .map_err(|e| mismatch(e.to_string()))?;
            (meta.src, meta.mime_type, meta.frames)
        }
        None => {
            let envelope: ApiEnvelope = serde_json::from_str(text)
                .map_err(|e| not_found(format!("not an API response: {}", e)))?;
            if envelope.error {
                return Err(not_found(format!("pixiv returned error: {}", envelope.message)));
            }
            if !envelope.body.is_object() {
                return Err(not_found("response body is not an object".to_string()));
            }
            let meta = ApiMeta::deserialize(envelope.body)
                .map_err(|e| mismatch(e.to_string()))?;
            (meta.original_src.unwrap_or(meta.src), meta.mime_type, meta.frames)
        }
    };

    if frames.is_empty() {
        return Err(mismatch("frame list is empty".to_string()));
    }

    let mut specs: Vec<FrameSpec> = Vec::with_capacity(frames.len());
    for (i, frame) in frames.iter().enumerate() {
        let Some(extension) = frame_extension(&frame.file, mime_type.as_deref()) else {
            return Err(mismatch(format!("cannot tell the image type of {}", frame.file)));
        };
        specs.push(FrameSpec::new(i as u32, frame.delay, &extension));
    }

    let Some(id) = ugoira_id(&archive_url, source_url) else {
        return Err(mismatch(format!("cannot find an illust id in {} or {}", archive_url, source_url)));
    };

    // One url template per descriptor, so originals need a single image type
    let pattern = match shared_extension(&specs) {
        Some(extension) => original_frame_pattern(&archive_url, extension),
        None => None,
    };

    UgoiraDescriptor::new(id, source_url.to_string(), specs, Some(archive_url), pattern, mime_type)
        .map_err(|e| mismatch(e.to_string()))
}

fn frame_extension(file: &str, mime_type: Option<&str>) -> Option<String> {
    let name = FileName::from(file);
    if let Some(ext) = name.extension.filter(|ext| !ext.is_empty()) {
        return Some(ext);
    }
    match mime_type? {
        "image/jpeg" => Some("jpg".to_string()),
        "image/png" => Some("png".to_string()),
        "image/gif" => Some("gif".to_string()),
        "image/webp" => Some("webp".to_string()),
        _ => None
    }
}

fn shared_extension(specs: &[FrameSpec]) -> Option<&str> {
    let first = specs.first()?.filename.rsplit_once('.')?.1;
    specs.iter()
        .all(|spec| spec.filename.rsplit_once('.').is_some_and(|(_, ext)| ext == first))
        .then_some(first)
}

fn ugoira_id(archive_url: &str, source_url: &str) -> Option<String> {
    let file_name = archive_url.rsplit('/').next().unwrap_or(archive_url);
    if let Some((_, [id])) = ARCHIVE_ID_REGEX.captures(file_name).map(|c| c.extract()) {
        return Some(id.to_string());
    }
    TRAILING_ID_REGEX.captures(source_url)
        .map(|c| c.extract())
        .map(|(_, [id])| id.to_string())
}

/// `.../img-zip-ugoira/img/<date>/<id>_ugoira600x600.zip` becomes
/// `.../img-original/img/<date>/<id>_ugoira{index}.<ext>`
pub fn original_frame_pattern(archive_url: &str, extension: &str) -> Option<String> {
    let (_, [host, date_path, id]) = ZIP_URL_REGEX.captures(archive_url).map(|c| c.extract())?;
    Some(format!("{host}/img-original/img/{date_path}{id}_ugoira{FRAME_INDEX_PLACEHOLDER}.{extension}"))
}
