#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use zip::write::SimpleFileOptions;

use ugoira_tea::ugoira::muxer::DIRECTIVE_FILE_NAME;
use ugoira_tea::ugoira::{
    ConvertOptions, EncodeOutcome, EncodeProfile, EncodeRequest, Encoder, Fetch, FetchError, FetchResponse,
    Fidelity, PayloadKind, Settings,
};

pub const ID: &str = "7";
pub const ARCHIVE_600: &str = "https://i.pximg.net/img-zip-ugoira/img/2020/01/01/00/00/00/7_ugoira600x600.zip";
pub const ARCHIVE_1920: &str = "https://i.pximg.net/img-zip-ugoira/img/2020/01/01/00/00/00/7_ugoira1920x1080.zip";

pub fn meta_url(id: &str) -> String {
    format!("https://www.pixiv.net/ajax/illust/{}/ugoira_meta", id)
}

pub fn frame_url(index: u32) -> String {
    format!("https://i.pximg.net/img-original/img/2020/01/01/00/00/00/7_ugoira{}.jpg", index)
}

/// `ugoira_meta` response for illust 7 with the given delays
pub fn api_meta(delays: &[u64]) -> Vec<u8> {
    let frames: Vec<String> = delays.iter().enumerate()
        .map(|(i, delay)| format!(r#"{{"file":"{:06}.jpg","delay":{}}}"#, i, delay))
        .collect();
    format!(
        r#"{{"error":false,"message":"","body":{{"src":"{}","mime_type":"image/jpeg","frames":[{}]}}}}"#,
        ARCHIVE_600, frames.join(",")
    ).into_bytes()
}

pub fn zip_of(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut data = Vec::new();
    let mut archive = zip::ZipWriter::new(std::io::Cursor::new(&mut data));
    for (name, content) in entries {
        archive.start_file(*name, SimpleFileOptions::default()).unwrap();
        archive.write_all(content.as_bytes()).unwrap();
    }
    archive.finish().unwrap();
    data
}

/// Serves fixed responses by url and records what was asked for
#[derive(Default)]
pub struct FakeFetch {
    routes: HashMap<String, (u16, Vec<u8>)>,
    pub requested: Mutex<Vec<String>>,
}

impl FakeFetch {
    pub fn route(mut self, url: &str, status: u16, body: &[u8]) -> Self {
        self.routes.insert(url.to_string(), (status, body.to_vec()));
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

impl Fetch for FakeFetch {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError> {
        self.requested.lock().unwrap().push(url.to_string());
        tokio::task::yield_now().await;
        match self.routes.get(url) {
            Some((status, body)) => Ok(FetchResponse::new(*status, body.clone())),
            None => Ok(FetchResponse::new(404, Vec::new())),
        }
    }
}

/// Writes the directive it was handed as the "video"
#[derive(Default)]
pub struct DirectiveEncoder {
    pub requests: Mutex<Vec<EncodeRequest>>,
}

impl Encoder for DirectiveEncoder {
    async fn encode(&self, request: &EncodeRequest) -> Result<EncodeOutcome, std::io::Error> {
        self.requests.lock().unwrap().push(request.clone());
        let directive = tokio::fs::read(request.workspace.join(&request.directive)).await?;
        tokio::fs::write(request.workspace.join(&request.output), directive).await?;
        Ok(EncodeOutcome { code: Some(0), diagnostic: String::new() })
    }
}

/// Exits 1 without producing anything
pub struct FailingEncoder;

impl Encoder for FailingEncoder {
    async fn encode(&self, _request: &EncodeRequest) -> Result<EncodeOutcome, std::io::Error> {
        Ok(EncodeOutcome {
            code: Some(1),
            diagnostic: format!("{}: Invalid data found when processing input\n", DIRECTIVE_FILE_NAME),
        })
    }
}

/// Reports success but leaves no output behind
pub struct SilentEncoder;

impl Encoder for SilentEncoder {
    async fn encode(&self, _request: &EncodeRequest) -> Result<EncodeOutcome, std::io::Error> {
        Ok(EncodeOutcome { code: Some(0), diagnostic: String::new() })
    }
}

pub fn settings(out_dir: &Path, temp_root: Option<&Path>) -> Settings {
    Settings {
        payload_kind: PayloadKind::Api,
        fidelity: Fidelity::Standard,
        archive_size: None,
        frame_workers: 3,
        fallback_to_archive: true,
        out_dir: out_dir.to_path_buf(),
        convert: ConvertOptions {
            profile: EncodeProfile::Copy,
            out_dir: out_dir.to_path_buf(),
            temp_root: temp_root.map(|p| p.to_path_buf()),
        },
        batch_concurrency: 2,
    }
}

pub fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir).unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

/// Archive plus sidecar, laid out the way `download` leaves them
pub fn write_download(dir: &Path, name: &str, frames: &[(&str, u64)]) -> PathBuf {
    let entries: Vec<(&str, &str)> = frames.iter().map(|(file, _)| (*file, *file)).collect();
    let archive = dir.join(format!("{}.zip", name));
    std::fs::write(&archive, zip_of(&entries)).unwrap();

    let sidecar: Vec<String> = frames.iter()
        .map(|(file, delay)| format!(r#"{{"delay":{},"file":"{}"}}"#, delay, file))
        .collect();
    std::fs::write(dir.join(format!("{}.json", name)), format!(r#"{{"frames":[{}]}}"#, sidecar.join(","))).unwrap();
    archive
}
