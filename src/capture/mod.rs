//! 捕获引擎
//!
//! - `document`: 文档模型需要提供的能力
//! - `registry`: 输出文件名的分配
//! - `store`: 按内容去重的暂存区
//! - `manifest`: 输出文件清单
//! - `orchestrator`: 单个文档内资源引用的处理
//! - `crawl`: 多文档的深度抓取

pub mod crawl;
pub mod document;
pub mod manifest;
pub mod orchestrator;
pub mod registry;
pub mod store;

pub use crawl::{CaptureKind, CaptureState, CrawlController, CrawlSummary, DocumentCapture, UrlFilter};
pub use document::{DocumentModel, DocumentParser, ReferenceLocation, ResourceReference, Rewrite};
pub use manifest::{Manifest, ManifestEntry, MANIFEST_VERSION};
pub use orchestrator::{ChainEntry, ResourceOrchestrator};
pub use registry::{path_to_locator, sanitize_filename, FilenameRegistry, RESERVED_FILENAMES};
pub use store::{content_token, ContentStore};
