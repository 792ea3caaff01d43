use std::fmt::Display;
use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::str::FromStr;

use serde::Deserialize;

/// Codec and container choices handed to the encoder
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodeProfile {
    /// Frames copied untouched into Matroska
    Copy,
    /// Lossless VP9 in WebM
    Vp9Lossless,
    /// H.264 MP4 that plays on phones
    H264,
}

impl EncodeProfile {
    pub fn extension(&self) -> &'static str {
        match self {
            EncodeProfile::Copy => "mkv",
            EncodeProfile::Vp9Lossless => "webm",
            EncodeProfile::H264 => "mp4",
        }
    }

    pub fn codec_args(&self) -> &'static [&'static str] {
        match self {
            EncodeProfile::Copy => &["-codec", "copy"],
            EncodeProfile::Vp9Lossless => &["-c:v", "libvpx-vp9", "-lossless", "1"],
            EncodeProfile::H264 => &[
                "-vf", "crop=trunc(iw/2)*2:trunc(ih/2)*2",                                      // yuv420p needs even width and height
                "-c:v", "libx264", "-preset", "medium", "-crf", "23", "-pix_fmt", "yuv420p",
            ],
        }
    }
}

impl Display for EncodeProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncodeProfile::Copy => write!(f, "copy"),
            EncodeProfile::Vp9Lossless => write!(f, "vp9_lossless"),
            EncodeProfile::H264 => write!(f, "h264"),
        }
    }
}

impl FromStr for EncodeProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "copy" | "mkv" => Ok(EncodeProfile::Copy),
            "vp9_lossless" | "vp9-lossless" | "vp9" | "webm" => Ok(EncodeProfile::Vp9Lossless),
            "h264" | "mp4" => Ok(EncodeProfile::H264),
            other => Err(format!("unknown profile {other}, expected copy, vp9_lossless or h264")),
        }
    }
}

#[derive(Clone, Debug)]
pub struct EncodeRequest {
    /// Directory holding the frames and the directive; the encoder runs inside it
    pub workspace: PathBuf,
    pub directive: String,
    pub profile: EncodeProfile,
    pub output: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodeOutcome {
    pub code: Option<i32>,
    pub diagnostic: String,
}

impl EncodeOutcome {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

pub trait Encoder: Send + Sync {
    /// Runs to completion; a failed encode is an outcome, not an `Err`
    fn encode(&self, request: &EncodeRequest) -> impl Future<Output = Result<EncodeOutcome, std::io::Error>> + Send;
}

#[derive(Clone, Debug)]
pub struct FfmpegEncoder {
    pub program: String,
}

impl FfmpegEncoder {
    pub fn new(program: impl Into<String>) -> FfmpegEncoder {
        FfmpegEncoder { program: program.into() }
    }
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        FfmpegEncoder::new("ffmpeg")
    }
}

impl Encoder for FfmpegEncoder {
    async fn encode(&self, request: &EncodeRequest) -> Result<EncodeOutcome, std::io::Error> {
        let mut ffmpeg_args: Vec<&str> = vec![
            "-hide_banner", "-nostdin", "-y",
            "-f", "concat", "-i", &request.directive,
        ];
        ffmpeg_args.extend_from_slice(request.profile.codec_args());
        ffmpeg_args.push(&request.output);

        log::debug!(
            target: "ugoira_encoder",
            "Running {} {}", self.program, ffmpeg_args.join(" ")
        );

        let output = tokio::process::Command::new(&self.program)
            .current_dir(&request.workspace)
            .args(&ffmpeg_args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output().await?;

        Ok(EncodeOutcome {
            code: output.status.code(),
            diagnostic: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}
