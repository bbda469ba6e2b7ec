use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::capture::crawl::CrawlController;
use crate::capture::document::DocumentParser;
use crate::capture::manifest::Manifest;
use crate::capture::registry::FilenameRegistry;
use crate::capture::store::ContentStore;
use crate::network::referrer::ReferrerPolicy;
use crate::network::transport::{FetchResponse, Transport, TransportError};

/// Represents errors that can occur during a capture run
///
/// Per-reference problems never surface as errors: they are degraded into
/// sentinel locators or remote links. Only the root document being
/// unavailable, invalid configuration and internal invariant violations
/// abort a capture.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("transport failure: {0}")]
    TransportFailure(String),

    #[error("resource {url} is {size} bytes, above the {limit} byte limit")]
    SizeLimitExceeded { url: String, size: u64, limit: u64 },

    #[error("circular reference to {0}")]
    CircularReference(String),

    #[error("filename collision on {0}")]
    FilenameCollision(String),

    #[error("unsupported container operation: {0}")]
    UnsupportedContainerOperation(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("archive error: {0}")]
    Archive(String),
}

pub type CaptureResult<T> = Result<T, CaptureError>;

/// Kind of resource a reference points at, used to pick a policy
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceCategory {
    Image,
    ImageBackground,
    Font,
    Script,
    Style,
    Frame,
    Embed,
    Object,
    Applet,
    Audio,
    Video,
    Favicon,
    /// Hyperlinks to other documents, handled by the crawl controller
    Link,
}

impl ResourceCategory {
    /// Declared role of the file produced for a reference of this category
    pub fn role(self) -> ResourceRole {
        match self {
            ResourceCategory::Image | ResourceCategory::ImageBackground | ResourceCategory::Favicon => {
                ResourceRole::Image
            }
            ResourceCategory::Font => ResourceRole::Font,
            ResourceCategory::Style => ResourceRole::Stylesheet,
            ResourceCategory::Frame => ResourceRole::Frame,
            ResourceCategory::Audio | ResourceCategory::Video => ResourceRole::Media,
            ResourceCategory::Link => ResourceRole::Document,
            ResourceCategory::Script
            | ResourceCategory::Embed
            | ResourceCategory::Object
            | ResourceCategory::Applet => ResourceRole::Binary,
        }
    }
}

/// Role of a captured file, recorded in the manifest
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceRole {
    Document,
    Stylesheet,
    Font,
    Image,
    Media,
    Frame,
    Binary,
}

/// What to do with the resources of one category
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Policy {
    /// Fetch and rewrite to a local copy
    Save,
    /// Fetch and rewrite only when the document actually uses the resource
    SaveUsed,
    /// Fetch and always embed as a data URI
    Inline,
    /// Rewrite to the absolute remote URL without fetching
    Link,
    /// Rewrite to an inert placeholder
    Blank,
    /// Remove the referring construct
    Remove,
}

impl Policy {
    pub fn fetches(self) -> bool {
        matches!(self, Policy::Save | Policy::SaveUsed | Policy::Inline)
    }
}

/// One policy per resource category
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyTable {
    pub image: Policy,
    pub image_background: Policy,
    pub font: Policy,
    pub script: Policy,
    pub style: Policy,
    pub frame: Policy,
    pub embed: Policy,
    pub object: Policy,
    pub applet: Policy,
    pub audio: Policy,
    pub video: Policy,
    pub favicon: Policy,
}

impl Default for PolicyTable {
    fn default() -> Self {
        PolicyTable {
            image: Policy::Save,
            image_background: Policy::Save,
            font: Policy::Save,
            script: Policy::Blank,
            style: Policy::Save,
            frame: Policy::Save,
            embed: Policy::Save,
            object: Policy::Save,
            applet: Policy::Save,
            audio: Policy::Save,
            video: Policy::Save,
            favicon: Policy::Save,
        }
    }
}

impl PolicyTable {
    pub fn get(&self, category: ResourceCategory) -> Policy {
        match category {
            ResourceCategory::Image => self.image,
            ResourceCategory::ImageBackground => self.image_background,
            ResourceCategory::Font => self.font,
            ResourceCategory::Script => self.script,
            ResourceCategory::Style => self.style,
            ResourceCategory::Frame => self.frame,
            ResourceCategory::Embed => self.embed,
            ResourceCategory::Object => self.object,
            ResourceCategory::Applet => self.applet,
            ResourceCategory::Audio => self.audio,
            ResourceCategory::Video => self.video,
            ResourceCategory::Favicon => self.favicon,
            ResourceCategory::Link => Policy::Link,
        }
    }

    pub fn set(&mut self, category: ResourceCategory, policy: Policy) {
        let slot = match category {
            ResourceCategory::Image => &mut self.image,
            ResourceCategory::ImageBackground => &mut self.image_background,
            ResourceCategory::Font => &mut self.font,
            ResourceCategory::Script => &mut self.script,
            ResourceCategory::Style => &mut self.style,
            ResourceCategory::Frame => &mut self.frame,
            ResourceCategory::Embed => &mut self.embed,
            ResourceCategory::Object => &mut self.object,
            ResourceCategory::Applet => &mut self.applet,
            ResourceCategory::Audio => &mut self.audio,
            ResourceCategory::Video => &mut self.video,
            ResourceCategory::Favicon => &mut self.favicon,
            ResourceCategory::Link => return,
        };
        *slot = policy;
    }
}

/// Fidelity mode of the stylesheet rewriter
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CssMode {
    #[default]
    RawUrl,
    Tidy,
    Match,
    None,
}

/// Output container form
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContainerKind {
    Folder,
    #[default]
    Zip,
    Maff,
    SingleHtml,
}

impl ContainerKind {
    /// Whether every relocated resource has to be embedded in the document itself
    pub fn is_self_contained(self) -> bool {
        self == ContainerKind::SingleHtml
    }

    pub fn extension(self) -> &'static str {
        match self {
            ContainerKind::Folder => "",
            ContainerKind::Zip => "htz",
            ContainerKind::Maff => "maff",
            ContainerKind::SingleHtml => "html",
        }
    }
}

/// Filters deciding which links become crawl candidates
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlOptions {
    /// Allow filter for links captured as documents (substring, or `/regex/`)
    pub document_filter: Option<String>,
    /// Allow filter for links downloaded as plain files
    pub file_filter: Option<String>,
    /// Deny filter applied to both kinds of candidates
    pub exclude_filter: Option<String>,
    /// Extensions of linked files that are downloaded as plain files
    pub file_extensions: Vec<String>,
    /// Additional documents captured at depth 1 regardless of filters
    pub extra_urls: Vec<String>,
}

/// Configuration options for a capture run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureOptions {
    pub policies: PolicyTable,
    pub css_mode: CssMode,
    pub container: ContainerKind,
    pub ascii_filenames: bool,
    pub sequential: bool,
    pub max_concurrency: usize,
    pub max_resource_size: Option<u64>,
    pub referrer_policy: ReferrerPolicy,
    pub record_rewrites: bool,
    pub link_unsaved: bool,
    pub save_data_uri_as_file: bool,
    pub max_depth: Option<u32>,
    pub crawl: CrawlOptions,
    pub timeout_secs: u64,
    pub user_agent: Option<String>,
    pub insecure: bool,
    pub save_manifest: bool,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        CaptureOptions {
            policies: PolicyTable::default(),
            css_mode: CssMode::default(),
            container: ContainerKind::default(),
            ascii_filenames: false,
            sequential: false,
            max_concurrency: 8,
            max_resource_size: None,
            referrer_policy: ReferrerPolicy::default(),
            record_rewrites: false,
            link_unsaved: false,
            save_data_uri_as_file: false,
            max_depth: None,
            crawl: CrawlOptions::default(),
            timeout_secs: 60,
            user_agent: None,
            insecure: false,
            save_manifest: false,
        }
    }
}

/// How a resolved reference is addressed, part of the access-map key
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AccessMethod {
    Relocate,
    Inline,
}

pub type FetchOutcome = Result<Arc<FetchResponse>, TransportError>;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One capture run
///
/// Holds the options, the session time id and every piece of state shared
/// between the documents of the run: the filename registry, the content store
/// with its staging area, the manifest and the fetch cache.
pub struct CaptureSession {
    pub options: CaptureOptions,
    time_id: String,
    registry: Mutex<FilenameRegistry>,
    store: Mutex<ContentStore>,
    manifest: Mutex<Manifest>,
    fetch_cache: Mutex<HashMap<String, FetchOutcome>>,
    access_map: Mutex<HashMap<(String, AccessMethod), String>>,
    cancelled: AtomicBool,
    pool: Option<rayon::ThreadPool>,
}

impl CaptureSession {
    pub fn new(options: CaptureOptions) -> CaptureResult<CaptureSession> {
        let time_id = Utc::now().format("%Y%m%d%H%M%S%3f").to_string();
        CaptureSession::with_time_id(options, time_id)
    }

    /// Creates a session with a fixed time id, for reproducible runs
    pub fn with_time_id(
        options: CaptureOptions,
        time_id: impl Into<String>,
    ) -> CaptureResult<CaptureSession> {
        let pool = if options.sequential {
            None
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(options.max_concurrency.max(1))
                .thread_name(|i| format!("webscrap-fetch-{i}"))
                .build()
                .map_err(|e| CaptureError::Internal(format!("cannot start fetch pool: {e}")))?;
            Some(pool)
        };

        Ok(CaptureSession {
            registry: Mutex::new(FilenameRegistry::new(options.ascii_filenames)),
            store: Mutex::new(ContentStore::default()),
            manifest: Mutex::new(Manifest::new()),
            fetch_cache: Mutex::new(HashMap::new()),
            access_map: Mutex::new(HashMap::new()),
            cancelled: AtomicBool::new(false),
            time_id: time_id.into(),
            options,
            pool,
        })
    }

    pub fn time_id(&self) -> &str {
        &self.time_id
    }

    /// Requests the crawl to stop before the next document
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub(crate) fn registry(&self) -> MutexGuard<'_, FilenameRegistry> {
        lock(&self.registry)
    }

    pub(crate) fn store(&self) -> MutexGuard<'_, ContentStore> {
        lock(&self.store)
    }

    pub(crate) fn manifest(&self) -> MutexGuard<'_, Manifest> {
        lock(&self.manifest)
    }

    pub(crate) fn pool(&self) -> Option<&rayon::ThreadPool> {
        self.pool.as_ref()
    }

    pub(crate) fn cached_fetch(&self, identity: &str) -> Option<FetchOutcome> {
        lock(&self.fetch_cache).get(identity).cloned()
    }

    pub(crate) fn cache_fetch(&self, identity: String, outcome: FetchOutcome) {
        lock(&self.fetch_cache).insert(identity, outcome);
    }

    pub(crate) fn accessed(&self, identity: &str, method: AccessMethod) -> Option<String> {
        lock(&self.access_map)
            .get(&(identity.to_string(), method))
            .cloned()
    }

    pub(crate) fn record_access(&self, identity: String, method: AccessMethod, locator: String) {
        lock(&self.access_map).insert((identity, method), locator);
    }

    /// Access method used for relocated resources in this session's container
    pub(crate) fn default_access(&self) -> AccessMethod {
        if self.options.container.is_self_contained() {
            AccessMethod::Inline
        } else {
            AccessMethod::Relocate
        }
    }

    fn into_parts(self) -> (Manifest, BTreeMap<String, Vec<u8>>) {
        let manifest = self
            .manifest
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        let files = self
            .store
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .into_files();
        (manifest, files)
    }
}

/// Everything a capture produced, ready for assembly
#[derive(Debug)]
pub struct CaptureOutput {
    pub options: CaptureOptions,
    pub time_id: String,
    pub source_url: Url,
    pub title: Option<String>,
    pub index_path: String,
    pub manifest: Manifest,
    pub files: BTreeMap<String, Vec<u8>>,
}

/// Captures `target` and everything it references
pub fn capture(
    target: &Url,
    options: CaptureOptions,
    transport: &dyn Transport,
    parser: &dyn DocumentParser,
) -> CaptureResult<CaptureOutput> {
    let session = CaptureSession::new(options)?;
    capture_with_session(session, target, transport, parser)
}

/// Runs a capture within an already configured session
pub fn capture_with_session(
    session: CaptureSession,
    target: &Url,
    transport: &dyn Transport,
    parser: &dyn DocumentParser,
) -> CaptureResult<CaptureOutput> {
    let summary = CrawlController::new(&session, transport, parser).run(target)?;

    let options = session.options.clone();
    let time_id = session.time_id.clone();
    let (manifest, files) = session.into_parts();

    Ok(CaptureOutput {
        options,
        time_id,
        source_url: summary.source_url,
        title: summary.title,
        index_path: summary.index_path,
        manifest,
        files,
    })
}

/// Formats output path with title and timestamp substitution
pub fn format_output_path(
    path: &str,
    document_title: Option<&str>,
    container: ContainerKind,
) -> String {
    let datetime: &str = &Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    let title = document_title.unwrap_or("");

    let sanitized_title = title
        .replace(['/', '\\'], "_")
        .replace('<', "[")
        .replace('>', "]")
        .replace(':', " - ")
        .replace('\"', "")
        .replace('|', "-")
        .replace('?', "");

    let extension = container.extension();
    let short_extension = match container {
        ContainerKind::SingleHtml => "htm",
        _ => extension,
    };

    path.replace("%timestamp%", &datetime.replace(':', "_"))
        .replace("%title%", sanitized_title.trim_start_matches('.'))
        .replace("%extension%", extension)
        .replace("%ext%", short_extension)
}
