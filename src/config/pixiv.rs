use serde::Deserialize;

use crate::ugoira::types::{Fidelity, PayloadKind};

#[derive(Debug, Clone, Deserialize)]
pub struct PixivConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    pub php_sessid: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_payload_kind")]
    pub payload_kind: PayloadKind,
    #[serde(default = "default_fidelity")]
    pub fidelity: Fidelity,
    /// Size token swapped into prebuilt archive urls, e.g. `1920x1080`
    pub archive_size: Option<String>,
    #[serde(default = "default_frame_workers")]
    pub frame_workers: usize,
    #[serde(default = "default_fallback_to_archive")]
    pub fallback_to_archive: bool,
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64; rv:146.0) Gecko/20100101 Firefox/146.0".to_string()
}
fn default_timeout_secs() -> u64 { 10 }
fn default_payload_kind() -> PayloadKind { PayloadKind::Api }
fn default_fidelity() -> Fidelity { Fidelity::Standard }
fn default_frame_workers() -> usize { 4 }
fn default_fallback_to_archive() -> bool { true }

impl Default for PixivConfig {
    fn default() -> Self {
        PixivConfig {
            user_agent: default_user_agent(),
            php_sessid: None,
            timeout_secs: default_timeout_secs(),
            payload_kind: default_payload_kind(),
            fidelity: default_fidelity(),
            archive_size: None,
            frame_workers: default_frame_workers(),
            fallback_to_archive: default_fallback_to_archive(),
        }
    }
}
