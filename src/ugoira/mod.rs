pub mod archive;
pub mod encoder;
pub mod fetch;
pub mod muxer;
pub mod parser;
pub mod pipeline;
pub mod resolver;
pub mod source;
pub mod types;

pub use archive::{ArchiveError, ArchiveFiles, build_archive, load_timing};
pub use encoder::{EncodeOutcome, EncodeProfile, EncodeRequest, Encoder, FfmpegEncoder};
pub use fetch::{Fetch, FetchError, FetchResponse, PixivClient};
pub use muxer::{ConvertError, ConvertOptions, convert};
pub use pipeline::{DownloadReport, ErrorCategory, Pipeline, PipelineError, Settings};
pub use resolver::{MetadataShape, ResolveError, resolve, resolve_payload};
pub use source::{AcquireError, Acquired, FetchStrategy, SourceOptions, acquire};
pub use types::{AuthMode, Fidelity, FrameSpec, PayloadKind, Sidecar, SidecarFrame, UgoiraDescriptor};
