//! 抓取控制器
//!
//! 从根文档开始按深度广度优先地捕获链接到的文档。同一文档（忽略片段）只捕获一次，
//! 且以最先发现时的深度为准。所有文档捕获完成之后再统一改写超链接，
//! 这样经过重定向的目标也能指向最终的本地路径，并保留原链接的片段。

use std::collections::{HashMap, VecDeque};

use regex::Regex;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::capture::document::{DocumentModel, DocumentParser, Rewrite};
use crate::capture::manifest::ManifestEntry;
use crate::capture::orchestrator::{
    desired_filename, effective_media_type, or_index, ChainEntry, ResourceOrchestrator,
};
use crate::capture::registry::{path_to_locator, sanitize_filename, split_filename};
use crate::capture::store::content_token;
use crate::core::{CaptureError, CaptureResult, CaptureSession, ResourceCategory, ResourceRole};
use crate::network::transport::{FetchResponse, Transport};
use crate::utils::mime::is_html_media_type;
use crate::utils::url::{
    append_fragment, create_data_url, is_fetchable, normalize, points_into_current_document,
    url_to_filename, NormalizedUrl,
};

const ROOT: usize = 0;

/// 根文档的固定文件名
pub const INDEX_HTML: &str = "index.html";
pub const INDEX_XHTML: &str = "index.xhtml";

/// 按文档处理的链接扩展名（没有扩展名的链接同样按文档处理）
const DOCUMENT_EXTENSIONS: &[&str] = &[
    "html", "htm", "xhtml", "xht", "shtml", "php", "asp", "aspx", "jsp",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureState {
    Pending,
    Fetching,
    Captured,
    Skipped,
    Failed,
}

/// 链接目标被当作文档还是普通文件下载
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureKind {
    Document,
    File,
}

#[derive(Clone, Debug)]
pub struct DocumentCapture {
    pub id: usize,
    pub url: NormalizedUrl,
    pub depth: u32,
    pub parent: Option<usize>,
    pub state: CaptureState,
    pub kind: CaptureKind,
    pub path: Option<String>,
    pub final_url: Option<Url>,
    /// 重定向后与另一个捕获指向同一文档
    pub alias_of: Option<usize>,
}

/// 抓取结果摘要
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CrawlSummary {
    pub source_url: Url,
    pub title: Option<String>,
    pub index_path: String,
}

/// URL 过滤器：普通子串，或写成 `/pattern/` 的正则表达式
#[derive(Clone, Debug)]
pub enum UrlFilter {
    Substring(String),
    Pattern(Regex),
}

impl UrlFilter {
    pub fn parse(filter: &str) -> CaptureResult<UrlFilter> {
        match filter
            .strip_prefix('/')
            .and_then(|rest| rest.strip_suffix('/'))
            .filter(|pattern| !pattern.is_empty())
        {
            Some(pattern) => Regex::new(pattern)
                .map(UrlFilter::Pattern)
                .map_err(|e| CaptureError::Config(format!("invalid URL filter {filter}: {e}"))),
            None => Ok(UrlFilter::Substring(filter.to_string())),
        }
    }

    pub fn matches(&self, url: &str) -> bool {
        match self {
            UrlFilter::Substring(needle) => url.contains(needle.as_str()),
            UrlFilter::Pattern(regex) => regex.is_match(url),
        }
    }
}

#[derive(Debug, Default)]
struct Filters {
    document: Option<UrlFilter>,
    file: Option<UrlFilter>,
    exclude: Option<UrlFilter>,
    file_extensions: Vec<String>,
}

impl Filters {
    fn from_session(session: &CaptureSession) -> CaptureResult<Filters> {
        let crawl = &session.options.crawl;
        let parse = |filter: &Option<String>| {
            filter
                .as_deref()
                .filter(|filter| !filter.is_empty())
                .map(UrlFilter::parse)
                .transpose()
        };

        Ok(Filters {
            document: parse(&crawl.document_filter)?,
            file: parse(&crawl.file_filter)?,
            exclude: parse(&crawl.exclude_filter)?,
            file_extensions: crawl
                .file_extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        })
    }

    /// 判断链接是否成为抓取候选，以及按哪种方式下载
    fn classify(&self, url: &Url) -> Option<CaptureKind> {
        let name = url_to_filename(url);
        let (_, extension) = split_filename(&name);
        let extension = extension.to_ascii_lowercase();
        let href = url.as_str();

        if self.exclude.as_ref().is_some_and(|filter| filter.matches(href)) {
            return None;
        }

        if extension.is_empty() || DOCUMENT_EXTENSIONS.contains(&extension.as_str()) {
            let allowed = self.document.as_ref().map_or(true, |filter| filter.matches(href));
            allowed.then_some(CaptureKind::Document)
        } else if self.file_extensions.contains(&extension) {
            let allowed = self.file.as_ref().map_or(true, |filter| filter.matches(href));
            allowed.then_some(CaptureKind::File)
        } else {
            None
        }
    }
}

fn without_fragment(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.to_string()
}

/// 指向另一个文件的跳转页
pub fn redirect_page(locator: &str) -> Vec<u8> {
    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"UTF-8\">\
         <meta http-equiv=\"refresh\" content=\"0; url={locator}\"></head><body></body></html>\n"
    )
    .into_bytes()
}

pub struct CrawlController<'a> {
    session: &'a CaptureSession,
    parser: &'a dyn DocumentParser,
    orchestrator: ResourceOrchestrator<'a>,
    captures: Vec<DocumentCapture>,
    visited: HashMap<String, usize>,
    documents: Vec<(usize, Box<dyn DocumentModel>)>,
    queue: VecDeque<usize>,
    title: Option<String>,
    index_path: String,
}

impl<'a> CrawlController<'a> {
    pub fn new(
        session: &'a CaptureSession,
        transport: &'a dyn Transport,
        parser: &'a dyn DocumentParser,
    ) -> CrawlController<'a> {
        CrawlController {
            session,
            parser,
            orchestrator: ResourceOrchestrator::new(session, transport, parser),
            captures: Vec::new(),
            visited: HashMap::new(),
            documents: Vec::new(),
            queue: VecDeque::new(),
            title: None,
            index_path: INDEX_HTML.to_string(),
        }
    }

    /// 已发现的全部文档捕获，按发现顺序排列
    pub fn captures(&self) -> &[DocumentCapture] {
        &self.captures
    }

    fn effective_max_depth(&self) -> u32 {
        let options = &self.session.options;
        let mut max_depth = options.max_depth.unwrap_or(0);
        if !options.crawl.extra_urls.is_empty() {
            max_depth = max_depth.max(1);
        }

        if max_depth > 0 && options.container.is_self_contained() {
            let error = CaptureError::UnsupportedContainerOperation(format!(
                "a single HTML file cannot hold documents beyond the root (depth {max_depth} requested)"
            ));
            warn!(%error, "capturing the root document only");
            return 0;
        }

        max_depth
    }

    fn enqueue(&mut self, url: NormalizedUrl, depth: u32, parent: Option<usize>, kind: CaptureKind) {
        let identity = url.identity();
        if self.visited.contains_key(&identity) {
            return;
        }

        let id = self.captures.len();
        debug!(url = %identity, depth, ?kind, "queued");
        self.captures.push(DocumentCapture {
            id,
            url: url.without_fragment(),
            depth,
            parent,
            state: CaptureState::Pending,
            kind,
            path: None,
            final_url: None,
            alias_of: None,
        });
        self.visited.insert(identity, id);
        self.queue.push_back(id);
    }

    /// 运行整个抓取
    pub fn run(&mut self, target: &Url) -> CaptureResult<CrawlSummary> {
        let filters = Filters::from_session(self.session)?;
        let max_depth = self.effective_max_depth();

        let root = normalize(target.as_str(), target)?;
        self.enqueue(root.clone(), 0, None, CaptureKind::Document);

        let session = self.session;
        if max_depth > 0 {
            for extra in &session.options.crawl.extra_urls {
                match normalize(extra, root.as_url()) {
                    Ok(url) => self.enqueue(url, 1, Some(ROOT), CaptureKind::Document),
                    Err(error) => warn!(url = %extra, %error, "ignoring extra URL"),
                }
            }
        }

        while let Some(id) = self.queue.pop_front() {
            if id != ROOT && self.session.is_cancelled() {
                info!("capture cancelled");
                self.captures[id].state = CaptureState::Skipped;
                for rest in self.queue.drain(..) {
                    self.captures[rest].state = CaptureState::Skipped;
                }
                break;
            }

            self.capture_one(id, max_depth, &filters)?;
        }

        self.rewrite_links()?;

        Ok(CrawlSummary {
            source_url: root.into_url(),
            title: self.title.take(),
            index_path: self.index_path.clone(),
        })
    }

    fn capture_one(&mut self, id: usize, max_depth: u32, filters: &Filters) -> CaptureResult<()> {
        let url = self.captures[id].url.clone();
        let referrer = self.captures[id]
            .parent
            .and_then(|parent| self.captures[parent].final_url.clone());
        self.captures[id].state = CaptureState::Fetching;

        let response = match self.orchestrator.fetch(&url, referrer.as_ref()) {
            Ok(response) => response,
            Err(e) if id == ROOT => {
                error!(url = %url, error = %e, "cannot fetch the root document");
                return Err(CaptureError::TransportFailure(format!("{url}: {e}")));
            }
            Err(e) => {
                warn!(url = %url, error = %e, "cannot fetch linked document");
                self.captures[id].state = CaptureState::Failed;
                return Ok(());
            }
        };

        let final_identity = without_fragment(&response.final_url);
        if final_identity != url.identity() {
            if let Some(&other) = self.visited.get(&final_identity) {
                debug!(url = %url, target = %final_identity, "redirected to a known document");
                self.captures[id].alias_of = Some(other);
                self.captures[id].state = CaptureState::Skipped;
                return Ok(());
            }
            self.visited.insert(final_identity, id);
        }
        self.captures[id].final_url = Some(response.final_url.clone());

        let media_type = effective_media_type(&response);
        let is_html = is_html_media_type(&media_type);

        if self.captures[id].kind == CaptureKind::Document && is_html {
            self.capture_html(id, &response, &media_type, max_depth, filters)
        } else if id == ROOT {
            self.capture_root_file(&response, &media_type)
        } else {
            self.capture_file(id, &response, &media_type)
        }
    }

    fn capture_html(
        &mut self,
        id: usize,
        response: &FetchResponse,
        media_type: &str,
        max_depth: u32,
        filters: &Filters,
    ) -> CaptureResult<()> {
        let path = if id == ROOT {
            let name = if media_type == "application/xhtml+xml" {
                INDEX_XHTML
            } else {
                INDEX_HTML
            };
            let mut registry = self.session.registry();
            if name == INDEX_XHTML && !self.session.options.container.is_self_contained() {
                registry.reserve_exact(INDEX_HTML);
            }
            if registry.reserve_exact(name) {
                name.to_string()
            } else {
                registry.reserve(name, Some("html"), Some(media_type))
            }
        } else {
            self.session.registry().reserve(
                &or_index(desired_filename(response)),
                Some("html"),
                Some(media_type),
            )
        };
        self.captures[id].path = Some(path.clone());

        let mut document = self
            .parser
            .parse(&response.bytes, &response.charset, &response.final_url);
        let charset = if response.charset.is_empty() {
            "utf-8"
        } else {
            response.charset.as_str()
        };

        let requested = self.captures[id].url.identity();
        let mut chain = vec![ChainEntry {
            identity: requested.clone(),
            path: Some(path.clone()),
        }];
        let final_identity = without_fragment(&response.final_url);
        if final_identity != requested {
            chain.push(ChainEntry {
                identity: final_identity,
                path: Some(path.clone()),
            });
        }

        info!(url = %response.final_url, path = %path, depth = self.captures[id].depth, "capturing document");
        self.orchestrator
            .capture_document(document.as_mut(), charset, &chain)?;

        {
            let mut manifest = self.session.manifest();
            manifest.append(ManifestEntry {
                path: path.clone(),
                url: Some(requested),
                role: Some(ResourceRole::Document),
                token: None,
            })?;
            if id == ROOT {
                manifest.add_index_page(&path);
            }
        }

        if id == ROOT {
            self.title = document.title();
            self.index_path = path;
        }

        let depth = self.captures[id].depth;
        if depth < max_depth {
            self.discover_links(id, document.as_ref(), filters);
        }

        self.captures[id].state = CaptureState::Captured;
        self.documents.push((id, document));
        Ok(())
    }

    fn discover_links(&mut self, id: usize, document: &dyn DocumentModel, filters: &Filters) {
        let base = document.base_url();
        let depth = self.captures[id].depth + 1;

        for reference in document.references() {
            if reference.category != ResourceCategory::Link
                || points_into_current_document(&reference.value)
            {
                continue;
            }
            let Ok(url) = normalize(&reference.value, &base) else {
                continue;
            };
            if !is_fetchable(url.as_url()) || self.visited.contains_key(&url.identity()) {
                continue;
            }
            if let Some(kind) = filters.classify(url.as_url()) {
                self.enqueue(url, depth, Some(id), kind);
            }
        }
    }

    /// 根地址不是 HTML：保存为普通文件并生成跳转到它的索引页
    ///
    /// 单文件输出没有同级文件，跳转目标改为 data URL。
    fn capture_root_file(&mut self, response: &FetchResponse, media_type: &str) -> CaptureResult<()> {
        let index_reserved = self.session.registry().reserve_exact(INDEX_HTML);
        let desired = or_index(desired_filename(response));
        let target = if self.session.options.container.is_self_contained() {
            let filename = sanitize_filename(&desired, self.session.options.ascii_filenames);
            create_data_url(media_type, &response.bytes, Some(&filename))
        } else {
            let path = self.orchestrator.store_file(
                response.bytes.clone(),
                media_type,
                &desired,
                Some(self.captures[ROOT].url.identity()),
                ResourceRole::Binary,
            )?;
            let locator = path_to_locator(&path);
            self.captures[ROOT].path = Some(path);
            locator
        };

        let index = if index_reserved {
            INDEX_HTML.to_string()
        } else {
            self.session.registry().reserve(INDEX_HTML, Some("html"), Some("text/html"))
        };
        let page = redirect_page(&target);
        let token = content_token(&page);
        self.session.store().stage(&index, page);
        {
            let mut manifest = self.session.manifest();
            manifest.append(ManifestEntry {
                path: index.clone(),
                url: None,
                role: Some(ResourceRole::Document),
                token: Some(token),
            })?;
            manifest.add_index_page(&index);
        }

        self.captures[ROOT].state = CaptureState::Captured;
        self.index_path = index;
        Ok(())
    }

    fn capture_file(&mut self, id: usize, response: &FetchResponse, media_type: &str) -> CaptureResult<()> {
        if let Some(limit) = self.session.options.max_resource_size {
            if response.bytes.len() as u64 > limit {
                warn!(url = %self.captures[id].url, limit, "linked file exceeds the size limit");
                self.captures[id].state = CaptureState::Skipped;
                return Ok(());
            }
        }

        let path = self.orchestrator.store_file(
            response.bytes.clone(),
            media_type,
            &or_index(desired_filename(response)),
            Some(self.captures[id].url.identity()),
            ResourceRole::Binary,
        )?;
        debug!(url = %self.captures[id].url, path = %path, "saved linked file");
        self.captures[id].path = Some(path);
        self.captures[id].state = CaptureState::Captured;
        Ok(())
    }

    /// 链接目标的本地路径（跟随重定向别名）
    fn captured_path(&self, identity: &str) -> Option<&str> {
        let mut id = *self.visited.get(identity)?;
        while let Some(target) = self.captures[id].alias_of {
            id = target;
        }
        let capture = &self.captures[id];
        match capture.state {
            CaptureState::Captured => capture.path.as_deref(),
            _ => None,
        }
    }

    /// 把超链接改写为本地路径或绝对地址，然后序列化并暂存每份文档
    fn rewrite_links(&mut self) -> CaptureResult<()> {
        let audit_id = self
            .session
            .options
            .record_rewrites
            .then(|| self.session.time_id().to_string());
        let documents = std::mem::take(&mut self.documents);

        for (id, mut document) in documents {
            let base = document.base_url();
            let mut rewrites = Vec::new();

            for reference in document.references() {
                if reference.category != ResourceCategory::Link
                    || points_into_current_document(&reference.value)
                {
                    continue;
                }
                let Ok(url) = normalize(&reference.value, &base) else {
                    continue;
                };

                let value = match self.captured_path(&url.identity()) {
                    Some(path) => append_fragment(&path_to_locator(path), url.fragment()),
                    None => url.to_string(),
                };
                if value != reference.value {
                    rewrites.push((reference, value));
                }
            }

            for (reference, value) in rewrites {
                document.apply(&reference, Rewrite::SetValue(value), audit_id.as_deref());
            }

            document.prepare_for_archive();
            let bytes = document.serialize();
            let token = content_token(&bytes);

            let Some(path) = self.captures[id].path.clone() else {
                return Err(CaptureError::Internal(format!(
                    "document {} has no reserved path",
                    self.captures[id].url
                )));
            };
            self.session.store().stage(&path, bytes);
            self.session.manifest().set_token(&path, token);
        }

        Ok(())
    }
}
