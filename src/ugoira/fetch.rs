use std::error::Error;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use reqwest::Client;

use crate::config::pixiv::PixivConfig;

pub const PIXIV_REFERER: &str = "https://www.pixiv.net/";

#[derive(Debug)]
pub enum FetchError {
    ReqwestError(reqwest::Error),
    Transport(String),
}

impl Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::ReqwestError(error) => write!(f, "ReqwestError: {}", error),
            FetchError::Transport(message) => write!(f, "Transport error: {}", message),
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(value: reqwest::Error) -> Self {
        Self::ReqwestError(value)
    }
}

impl Error for FetchError {}

/// A fully read HTTP response; unsuccessful statuses are not errors here
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn new(status: u16, body: Vec<u8>) -> FetchResponse {
        FetchResponse { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP GET capability used for metadata, frames and archives
pub trait Fetch: Send + Sync {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<FetchResponse, FetchError>> + Send;

    /// Whether requests carry a logged-in session
    fn has_session(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone)]
pub struct PixivClient {
    client: Client,
    php_sessid: Option<String>,
}

impl PixivClient {
    pub fn from_config(config: &PixivConfig) -> Result<PixivClient, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(PixivClient {
            client,
            php_sessid: config.php_sessid.clone(),
        })
    }
}

impl Fetch for PixivClient {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError> {
        let request = self.client.get(url).header("Referer", PIXIV_REFERER);
        // Add cookie
        let request = if let Some(php_sessid) = self.php_sessid.as_ref() {
            request.header("Cookie", format!("PHPSESSID={}", php_sessid))
        } else {
            request
        };

        let mut resp = request.send().await?;
        let status = resp.status();

        let mut body = Vec::new();
        if status.is_success() {
            while let Some(chunk) = resp.chunk().await? {
                body.extend_from_slice(&chunk);
            }
        }
        log::debug!(
            target: "fetch",
            "GET {url} -> {} ({} bytes)", status.as_u16(), body.len()
        );
        Ok(FetchResponse::new(status.as_u16(), body))
    }

    fn has_session(&self) -> bool {
        self.php_sessid.is_some()
    }
}
