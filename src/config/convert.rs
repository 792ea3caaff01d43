use std::path::PathBuf;

use serde::Deserialize;

use crate::ugoira::encoder::EncodeProfile;

#[derive(Debug, Clone, Deserialize)]
pub struct ConvertConfig {
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,
    #[serde(default = "default_profile")]
    pub profile: EncodeProfile,
    pub temp_root: Option<PathBuf>,
}

fn default_ffmpeg() -> String { "ffmpeg".to_string() }
fn default_profile() -> EncodeProfile { EncodeProfile::Copy }

impl Default for ConvertConfig {
    fn default() -> Self {
        ConvertConfig {
            ffmpeg: default_ffmpeg(),
            profile: default_profile(),
            temp_root: None,
        }
    }
}
