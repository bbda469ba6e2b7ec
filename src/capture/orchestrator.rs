//! 资源编排
//!
//! 对文档中发现的每一个资源引用按类别策略做出决定：下载并改写为本地路径、
//! 内嵌为 data URL、保留远程地址、置空或删除。下载失败、超出大小限制和循环引用
//! 都只影响单个引用，不会中断整个文档的捕获。

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use rayon::prelude::*;
use tracing::{debug, warn};
use url::Url;

use crate::capture::document::{
    DocumentModel, DocumentParser, ReferenceLocation, ResourceReference, Rewrite,
};
use crate::capture::manifest::ManifestEntry;
use crate::capture::registry::{path_to_locator, sanitize_filename};
use crate::capture::store::content_token;
use crate::core::{
    lock, AccessMethod, CaptureError, CaptureResult, CaptureSession, CssMode, FetchOutcome, Policy,
    ResourceCategory, ResourceRole,
};
use crate::network::transport::{FetchResponse, Transport};
use crate::parsers::css::{
    decode_stylesheet, rewrite_css, rewrite_style_attribute, strip_charset_rule, CssRefKind,
    CssReference,
};
use crate::parsers::html::parser::{parse_srcset, serialize_srcset};
use crate::utils::mime::{detect_media_type, extension_for, is_html_media_type};
use crate::utils::url::{
    append_fragment, circular_sentinel, create_data_url, error_sentinel, is_fetchable, normalize,
    oversized_sentinel, parse_data_url, points_into_current_document, same_document,
    url_to_filename, NormalizedUrl, SchemeClass, BLANK_URL, EMPTY_IMAGE_DATA_URL,
    INVALID_URL_PLACEHOLDER,
};

/// 当前解析链上的一个祖先（文档、框架或样式表）
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainEntry {
    /// 去掉片段的规范化地址
    pub identity: String,
    /// 已预留的输出路径；内嵌时为空
    pub path: Option<String>,
}

/// 解析一个引用时需要的上下文
struct Context<'c> {
    document: &'c dyn DocumentModel,
    /// 发起请求的地址（文档或样式表）
    referrer: &'c Url,
    /// 引用方的字符集，作为样式表解码的后备
    charset: &'c str,
    chain: &'c [ChainEntry],
}

/// 对单个引用的决定
#[derive(Debug, PartialEq)]
enum Resolved {
    Keep,
    Value(String),
    Blank,
    Remove,
    /// 自包含输出中的框架：整份文档内嵌
    Document(String),
}

/// 被置空的引用使用的占位值
pub fn blank_placeholder(category: ResourceCategory) -> &'static str {
    match category {
        ResourceCategory::Image | ResourceCategory::ImageBackground | ResourceCategory::Favicon => {
            EMPTY_IMAGE_DATA_URL
        }
        _ => BLANK_URL,
    }
}

pub(crate) fn effective_media_type(response: &FetchResponse) -> String {
    if response.media_type.is_empty() {
        detect_media_type(&response.bytes, &response.final_url)
    } else {
        response.media_type.clone()
    }
}

pub(crate) fn desired_filename(response: &FetchResponse) -> String {
    response
        .filename()
        .unwrap_or_else(|| url_to_filename(&response.final_url))
        .trim()
        .to_string()
}

pub(crate) fn or_index(name: String) -> String {
    if name.is_empty() {
        "index".to_string()
    } else {
        name
    }
}

pub struct ResourceOrchestrator<'a> {
    session: &'a CaptureSession,
    transport: &'a dyn Transport,
    parser: &'a dyn DocumentParser,
    /// 被后代以循环引用方式指向过的预留路径，这些路径不能再让给相同内容
    back_referenced: Mutex<HashSet<String>>,
}

impl<'a> ResourceOrchestrator<'a> {
    pub fn new(
        session: &'a CaptureSession,
        transport: &'a dyn Transport,
        parser: &'a dyn DocumentParser,
    ) -> ResourceOrchestrator<'a> {
        ResourceOrchestrator {
            session,
            transport,
            parser,
            back_referenced: Mutex::new(HashSet::new()),
        }
    }

    fn audit_id(&self) -> Option<&str> {
        self.session
            .options
            .record_rewrites
            .then(|| self.session.time_id())
    }

    fn policy(&self, category: ResourceCategory) -> Policy {
        if category == ResourceCategory::Style && self.session.options.css_mode == CssMode::None {
            return Policy::Link;
        }
        self.session.options.policies.get(category)
    }

    /// 获取资源，同一会话内每个地址只请求一次
    pub fn fetch(&self, url: &NormalizedUrl, referrer: Option<&Url>) -> FetchOutcome {
        let identity = url.identity();
        if let Some(outcome) = self.session.cached_fetch(&identity) {
            return outcome;
        }

        debug!(url = %identity, "fetching");
        let target = url.without_fragment().into_url();
        let outcome = self
            .transport
            .fetch(&target, referrer, self.session.options.referrer_policy)
            .map(Arc::new);

        self.session.cache_fetch(identity, outcome.clone());
        outcome
    }

    /// 在线程池中预先获取文档直接引用的资源
    ///
    /// 只填充获取缓存；命名和清单写入仍在捕获线程上按发现顺序进行。
    fn prefetch(&self, document: &dyn DocumentModel) {
        let Some(pool) = self.session.pool() else {
            return;
        };

        let base = document.base_url();
        let mut seen = HashSet::new();
        let mut targets: Vec<NormalizedUrl> = Vec::new();

        for reference in document.references() {
            if reference.category == ResourceCategory::Link || !self.policy(reference.category).fetches() {
                continue;
            }
            let values: Vec<String> = match &reference.location {
                ReferenceLocation::Attribute(_) => vec![reference.value.clone()],
                ReferenceLocation::Srcset(_) => parse_srcset(&reference.value)
                    .iter()
                    .map(|item| item.path.to_string())
                    .collect(),
                _ => continue,
            };
            for value in values {
                if points_into_current_document(&value) {
                    continue;
                }
                if let Ok(url) = normalize(&value, &base) {
                    if is_fetchable(url.as_url()) && seen.insert(url.identity()) {
                        targets.push(url);
                    }
                }
            }
        }

        if targets.len() < 2 {
            return;
        }

        let referrer = document.url().clone();
        pool.install(|| {
            targets.par_iter().for_each(|url| {
                let _ = self.fetch(url, Some(&referrer));
            });
        });
    }

    /// 捕获一份文档引用的全部资源并就地改写
    ///
    /// `chain` 以当前文档结尾。超链接（`Link` 类别）留给抓取控制器处理。
    pub fn capture_document(
        &self,
        document: &mut dyn DocumentModel,
        charset: &str,
        chain: &[ChainEntry],
    ) -> CaptureResult<()> {
        self.prefetch(&*document);

        let references = document.references();
        let mut rewrites: Vec<(ResourceReference, Rewrite)> = Vec::new();

        {
            let referrer = document.url().clone();
            let context = Context {
                document: &*document,
                referrer: &referrer,
                charset,
                chain,
            };

            for reference in references {
                if reference.category == ResourceCategory::Link {
                    continue;
                }
                if let Some(rewrite) = self.process(&reference, &context)? {
                    rewrites.push((reference, rewrite));
                }
            }
        }

        let audit_id = self.audit_id();
        for (reference, rewrite) in rewrites {
            document.apply(&reference, rewrite, audit_id);
        }

        Ok(())
    }

    /// 处理一个引用，返回需要施加的改写
    fn process(
        &self,
        reference: &ResourceReference,
        context: &Context,
    ) -> CaptureResult<Option<Rewrite>> {
        let document = context.document;
        let base = document.base_url();
        let category = reference.category;

        let rewrite = match &reference.location {
            ReferenceLocation::StyleElement | ReferenceLocation::StyleAttribute => {
                match self.session.options.policies.get(ResourceCategory::Style) {
                    Policy::Remove => Some(Rewrite::Remove),
                    Policy::Blank => Some(Rewrite::SetValue(String::new())),
                    _ => {
                        let inline_attribute =
                            reference.location == ReferenceLocation::StyleAttribute;
                        let text = self.rewrite_stylesheet_text(
                            &reference.value,
                            &base,
                            &[document.url()],
                            inline_attribute,
                            context,
                        )?;
                        (text != reference.value).then_some(Rewrite::SetValue(text))
                    }
                }
            }
            ReferenceLocation::ScriptContent => match self.policy(ResourceCategory::Script) {
                Policy::Remove => Some(Rewrite::Remove),
                Policy::Blank => Some(Rewrite::SetValue(String::new())),
                _ => None,
            },
            ReferenceLocation::Srcdoc => match self.policy(ResourceCategory::Frame) {
                Policy::Remove | Policy::Blank => Some(Rewrite::Remove),
                Policy::Link => None,
                _ => {
                    let html = self.capture_srcdoc(&reference.value, &base, context)?;
                    Some(Rewrite::SetValue(html))
                }
            },
            ReferenceLocation::Srcset(_) => {
                let mut kept: Vec<(String, String)> = Vec::new();
                for item in parse_srcset(&reference.value) {
                    let used = document.is_used(reference, Some(item.path));
                    match self.resolve(item.path, &base, category, used, context)? {
                        Resolved::Keep => kept.push((item.path.to_string(), item.descriptor.to_string())),
                        Resolved::Value(value) => kept.push((value, item.descriptor.to_string())),
                        Resolved::Blank | Resolved::Remove | Resolved::Document(_) => {}
                    }
                }

                if kept.is_empty() {
                    Some(Rewrite::Remove)
                } else {
                    let value = serialize_srcset(&kept);
                    (value != reference.value).then_some(Rewrite::SetValue(value))
                }
            }
            ReferenceLocation::Attribute(_) => {
                let used = document.is_used(reference, None);
                match self.resolve(&reference.value, &base, category, used, context)? {
                    Resolved::Keep => None,
                    Resolved::Value(value) => (value != reference.value).then_some(Rewrite::SetValue(value)),
                    Resolved::Blank => Some(Rewrite::SetValue(blank_placeholder(category).to_string())),
                    Resolved::Remove => Some(Rewrite::Remove),
                    Resolved::Document(html) => Some(Rewrite::InlineDocument(html)),
                }
            }
        };

        Ok(rewrite)
    }

    /// 对一个引用做出决定
    fn resolve(
        &self,
        raw: &str,
        base: &Url,
        category: ResourceCategory,
        used: bool,
        context: &Context,
    ) -> CaptureResult<Resolved> {
        if points_into_current_document(raw) {
            return Ok(Resolved::Keep);
        }

        let url = match normalize(raw, base) {
            Ok(url) => url,
            Err(error) => {
                debug!(%error, "leaving unresolvable reference as is");
                return Ok(Resolved::Keep);
            }
        };

        let policy = self.policy(category);
        match policy {
            Policy::Blank => return Ok(Resolved::Blank),
            Policy::Remove => return Ok(Resolved::Remove),
            Policy::SaveUsed if !used => {
                debug!(url = %url, "resource not in use");
                return Ok(Resolved::Blank);
            }
            _ => {}
        }

        match url.scheme_class() {
            SchemeClass::Data => self.resolve_data_url(&url, category, context),
            SchemeClass::Blob => self.resolve_blob(&url, category, context),
            _ if !is_fetchable(url.as_url()) => Ok(Resolved::Keep),
            _ if policy == Policy::Link => Ok(Resolved::Value(url.to_string())),
            _ => self.resolve_remote(&url, category, policy, context),
        }
    }

    fn access_method(&self, policy: Policy) -> AccessMethod {
        if policy == Policy::Inline {
            AccessMethod::Inline
        } else {
            self.session.default_access()
        }
    }

    /// 下载失败或超出大小限制时的替代值
    fn degraded(&self, url: &NormalizedUrl, sentinel: String) -> Resolved {
        if self.session.options.link_unsaved {
            Resolved::Value(url.to_string())
        } else {
            Resolved::Value(sentinel)
        }
    }

    fn resolve_remote(
        &self,
        url: &NormalizedUrl,
        category: ResourceCategory,
        policy: Policy,
        context: &Context,
    ) -> CaptureResult<Resolved> {
        let identity = url.identity();
        let method = self.access_method(policy);
        let role = category.role();

        if matches!(role, ResourceRole::Stylesheet | ResourceRole::Frame) {
            if let Some(ancestor) = context.chain.iter().find(|entry| entry.identity == identity) {
                return Ok(match (&ancestor.path, method) {
                    (Some(path), AccessMethod::Relocate) => {
                        lock(&self.back_referenced).insert(path.clone());
                        Resolved::Value(append_fragment(&path_to_locator(path), url.fragment()))
                    }
                    _ => {
                        let error = CaptureError::CircularReference(identity.clone());
                        warn!(%error, "no local path to point back at");
                        Resolved::Value(circular_sentinel(&identity))
                    }
                });
            }
        }

        if let Some(locator) = self.session.accessed(&identity, method) {
            return Ok(Resolved::Value(append_fragment(&locator, url.fragment())));
        }

        let response = match self.fetch(url, Some(context.referrer)) {
            Ok(response) => response,
            Err(error) => {
                warn!(url = %identity, %error, "failed to fetch resource");
                return Ok(self.degraded(url, error_sentinel(url.as_str())));
            }
        };

        if let Some(limit) = self.session.options.max_resource_size {
            let size = response.bytes.len() as u64;
            if size > limit {
                let error = CaptureError::SizeLimitExceeded {
                    url: identity.clone(),
                    size,
                    limit,
                };
                warn!(%error, "resource not saved");
                return Ok(self.degraded(url, oversized_sentinel(url.as_str())));
            }
        }

        let media_type = effective_media_type(&response);
        let resolved = match role {
            ResourceRole::Stylesheet => {
                self.capture_stylesheet(&identity, &response, method, context)?
            }
            ResourceRole::Frame if is_html_media_type(&media_type) => {
                self.capture_frame(&identity, &response, method, context)?
            }
            _ => {
                let locator = self.store_resource(
                    response.bytes.clone(),
                    &media_type,
                    &or_index(desired_filename(&response)),
                    Some(identity.clone()),
                    role,
                    method,
                )?;
                Resolved::Value(locator)
            }
        };

        Ok(match resolved {
            Resolved::Value(locator) => {
                self.session
                    .record_access(identity, method, locator.clone());
                Resolved::Value(append_fragment(&locator, url.fragment()))
            }
            other => other,
        })
    }

    /// 保存普通文件或生成 data URL，返回定位符
    ///
    /// 相同内容只保存一次。
    fn store_resource(
        &self,
        bytes: Vec<u8>,
        media_type: &str,
        desired: &str,
        source: Option<String>,
        role: ResourceRole,
        method: AccessMethod,
    ) -> CaptureResult<String> {
        if method == AccessMethod::Inline {
            let filename = sanitize_filename(desired, self.session.options.ascii_filenames);
            return Ok(create_data_url(media_type, &bytes, Some(&filename)));
        }

        let path = self.store_file(bytes, media_type, desired, source, role)?;
        Ok(path_to_locator(&path))
    }

    /// 把字节放进暂存区并登记到清单，返回输出路径
    ///
    /// 内容相同的文件只保存一次，之后返回第一次保存时的路径。
    pub(crate) fn store_file(
        &self,
        bytes: Vec<u8>,
        media_type: &str,
        desired: &str,
        source: Option<String>,
        role: ResourceRole,
    ) -> CaptureResult<String> {
        let token = content_token(&bytes);
        let existing = self.session.store().lookup(&token).map(str::to_string);
        if let Some(path) = existing {
            debug!(path = %path, "reusing identical content");
            return Ok(path);
        }

        let path = self
            .session
            .registry()
            .reserve(desired, None, Some(media_type).filter(|m| !m.is_empty()));
        {
            let mut store = self.session.store();
            store.stage(&path, bytes);
            store.remember(token.clone(), path.clone());
        }
        self.session.manifest().append(ManifestEntry {
            path: path.clone(),
            url: source,
            role: Some(role),
            token: Some(token),
        })?;

        Ok(path)
    }

    /// 保存改写完成的样式表或框架
    ///
    /// 路径在改写前就已预留。若已有相同内容的文件且没有后代指回这个路径，
    /// 释放预留并返回已有文件的路径。
    fn commit_reserved(
        &self,
        path: String,
        bytes: Vec<u8>,
        identity: &str,
        role: ResourceRole,
    ) -> CaptureResult<String> {
        let token = content_token(&bytes);
        let existing = self.session.store().lookup(&token).map(str::to_string);
        if let Some(existing) = existing {
            if !lock(&self.back_referenced).contains(&path) {
                debug!(path = %existing, released = %path, "reusing identical content");
                self.session.registry().release(&path);
                return Ok(existing);
            }
        }

        {
            let mut store = self.session.store();
            store.stage(&path, bytes);
            store.remember(token.clone(), path.clone());
        }
        self.session.manifest().append(ManifestEntry {
            path: path.clone(),
            url: Some(identity.to_string()),
            role: Some(role),
            token: Some(token),
        })?;

        Ok(path)
    }

    /// 捕获外部样式表，返回其定位符
    fn capture_stylesheet(
        &self,
        identity: &str,
        response: &FetchResponse,
        method: AccessMethod,
        context: &Context,
    ) -> CaptureResult<Resolved> {
        let text = decode_stylesheet(&response.bytes, &response.charset, context.charset);
        let requested = Url::parse(identity).ok();
        let mut self_urls: Vec<&Url> = vec![&response.final_url];
        self_urls.extend(requested.as_ref());

        let desired = or_index(desired_filename(response));

        match method {
            AccessMethod::Relocate => {
                let path = self
                    .session
                    .registry()
                    .reserve(&desired, Some("css"), Some("text/css"));

                let mut chain = context.chain.to_vec();
                chain.push(ChainEntry {
                    identity: identity.to_string(),
                    path: Some(path.clone()),
                });
                let nested = Context {
                    document: context.document,
                    referrer: &response.final_url,
                    charset: context.charset,
                    chain: &chain,
                };

                let css = self.rewrite_stylesheet_text(&text, &response.final_url, &self_urls, false, &nested)?;
                let path = self.commit_reserved(path, css.into_bytes(), identity, ResourceRole::Stylesheet)?;

                Ok(Resolved::Value(path_to_locator(&path)))
            }
            AccessMethod::Inline => {
                let mut chain = context.chain.to_vec();
                chain.push(ChainEntry {
                    identity: identity.to_string(),
                    path: None,
                });
                let nested = Context {
                    document: context.document,
                    referrer: &response.final_url,
                    charset: context.charset,
                    chain: &chain,
                };

                let css = self.rewrite_stylesheet_text(&text, &response.final_url, &self_urls, false, &nested)?;
                let filename = sanitize_filename(&desired, self.session.options.ascii_filenames);
                Ok(Resolved::Value(create_data_url(
                    "text/css",
                    css.as_bytes(),
                    Some(&filename),
                )))
            }
        }
    }

    /// 捕获框架文档
    fn capture_frame(
        &self,
        identity: &str,
        response: &FetchResponse,
        method: AccessMethod,
        context: &Context,
    ) -> CaptureResult<Resolved> {
        let mut frame = self
            .parser
            .parse(&response.bytes, &response.charset, &response.final_url);
        let charset = if response.charset.is_empty() {
            "utf-8"
        } else {
            response.charset.as_str()
        };

        let path = match method {
            AccessMethod::Relocate => Some(self.session.registry().reserve(
                &or_index(desired_filename(response)),
                Some("html"),
                Some("text/html"),
            )),
            AccessMethod::Inline => None,
        };

        let mut chain = context.chain.to_vec();
        chain.push(ChainEntry {
            identity: identity.to_string(),
            path: path.clone(),
        });

        self.capture_document(frame.as_mut(), charset, &chain)?;
        absolutize_links(frame.as_mut(), self.audit_id());
        frame.prepare_for_archive();
        let html = frame.serialize();

        match path {
            Some(path) => {
                let path = self.commit_reserved(path, html, identity, ResourceRole::Frame)?;
                Ok(Resolved::Value(path_to_locator(&path)))
            }
            None if self.session.options.container.is_self_contained() => {
                Ok(Resolved::Document(String::from_utf8_lossy(&html).into_owned()))
            }
            None => Ok(Resolved::Value(create_data_url("text/html", &html, None))),
        }
    }

    fn capture_srcdoc(&self, markup: &str, base: &Url, context: &Context) -> CaptureResult<String> {
        let mut frame = self.parser.parse(markup.as_bytes(), "utf-8", base);
        self.capture_document(frame.as_mut(), "utf-8", context.chain)?;
        absolutize_links(frame.as_mut(), self.audit_id());
        frame.prepare_for_archive();
        Ok(String::from_utf8_lossy(&frame.serialize()).into_owned())
    }

    fn resolve_data_url(
        &self,
        url: &NormalizedUrl,
        category: ResourceCategory,
        context: &Context,
    ) -> CaptureResult<Resolved> {
        let options = &self.session.options;
        let role = category.role();
        let as_file = options.save_data_uri_as_file
            && !options.container.is_self_contained()
            && self.policy(category) != Policy::Inline;

        let (media_type, charset, bytes) = parse_data_url(url.as_url());

        let bytes = match role {
            ResourceRole::Stylesheet => {
                let text = decode_stylesheet(&bytes, &charset, context.charset);
                let base = context.document.base_url();
                let css = self.rewrite_stylesheet_text(&text, &base, &[context.document.url()], false, context)?;
                css.into_bytes()
            }
            ResourceRole::Frame if is_html_media_type(&media_type) => {
                let mut frame = self.parser.parse(&bytes, &charset, url.as_url());
                self.capture_document(frame.as_mut(), "utf-8", context.chain)?;
                absolutize_links(frame.as_mut(), self.audit_id());
                frame.prepare_for_archive();
                frame.serialize()
            }
            _ if as_file => bytes,
            _ => return Ok(Resolved::Keep),
        };

        let media_type = if role == ResourceRole::Stylesheet {
            "text/css".to_string()
        } else {
            media_type
        };

        if as_file {
            let desired = format!("data.{}", extension_for(&media_type).unwrap_or("bin"));
            let locator = self.store_resource(bytes, &media_type, &desired, None, role, AccessMethod::Relocate)?;
            Ok(Resolved::Value(locator))
        } else {
            Ok(Resolved::Value(create_data_url(&media_type, &bytes, None)))
        }
    }

    fn resolve_blob(
        &self,
        url: &NormalizedUrl,
        category: ResourceCategory,
        context: &Context,
    ) -> CaptureResult<Resolved> {
        let Some((bytes, media_type)) = context.document.ephemeral_content(url.as_str()) else {
            warn!(url = %url, "no content available for in-memory resource");
            return Ok(self.degraded(url, error_sentinel(url.as_str())));
        };

        let method = self.access_method(self.policy(category));
        let identity = url.identity();
        if let Some(locator) = self.session.accessed(&identity, method) {
            return Ok(Resolved::Value(locator));
        }

        let desired = format!("blob.{}", extension_for(&media_type).unwrap_or("bin"));
        let locator = self.store_resource(bytes, &media_type, &desired, None, category.role(), method)?;
        self.session.record_access(identity, method, locator.clone());
        Ok(Resolved::Value(locator))
    }

    /// 改写内联或外部样式表文本
    fn rewrite_stylesheet_text(
        &self,
        text: &str,
        base: &Url,
        self_urls: &[&Url],
        inline_attribute: bool,
        context: &Context,
    ) -> CaptureResult<String> {
        let mode = self.session.options.css_mode;
        let (body, had_charset) = strip_charset_rule(text);

        if mode == CssMode::None {
            let absolutize: &mut dyn FnMut(&CssReference) -> String =
                &mut |reference| match normalize(reference.url, base) {
                    Ok(url) if !points_into_current_document(reference.url) => url.to_string(),
                    _ => reference.url.to_string(),
                };
            let css = if inline_attribute {
                rewrite_style_attribute(text, CssMode::RawUrl, absolutize)
            } else {
                rewrite_css(text, CssMode::RawUrl, None, absolutize)
            };
            return Ok(css);
        }

        let mut failure = None;
        let css = {
            let resolver: &mut dyn FnMut(&CssReference) -> String = &mut |reference| {
                match self.resolve_css_reference(reference, base, self_urls, context) {
                    Ok(value) => value,
                    Err(error) => {
                        failure.get_or_insert(error);
                        reference.url.to_string()
                    }
                }
            };

            if inline_attribute {
                rewrite_style_attribute(body, mode, resolver)
            } else {
                rewrite_css(body, mode, Some(context.document), resolver)
            }
        };

        if let Some(error) = failure {
            return Err(error);
        }

        Ok(if had_charset {
            format!("@charset \"UTF-8\";\n{css}")
        } else {
            css
        })
    }

    fn resolve_css_reference(
        &self,
        reference: &CssReference,
        base: &Url,
        self_urls: &[&Url],
        context: &Context,
    ) -> CaptureResult<String> {
        if points_into_current_document(reference.url) {
            return Ok(reference.url.to_string());
        }

        let category = match reference.kind {
            CssRefKind::Import => ResourceCategory::Style,
            CssRefKind::FontFace => ResourceCategory::Font,
            CssRefKind::Image => ResourceCategory::ImageBackground,
        };

        if reference.kind != CssRefKind::Import {
            if let Ok(url) = normalize(reference.url, base) {
                if self_urls.iter().any(|own| same_document(url.as_url(), own)) {
                    return Ok(match url.fragment() {
                        Some(fragment) if !fragment.is_empty() => format!("#{fragment}"),
                        _ => INVALID_URL_PLACEHOLDER.to_string(),
                    });
                }
            }
        }

        let value = match self.resolve(reference.url, base, category, reference.used, context)? {
            Resolved::Keep => reference.url.to_string(),
            Resolved::Value(value) => value,
            Resolved::Blank | Resolved::Remove | Resolved::Document(_) => {
                blank_placeholder(category).to_string()
            }
        };
        Ok(value)
    }
}

/// 把文档中的超链接改为绝对地址（纯片段链接除外）
pub fn absolutize_links(document: &mut dyn DocumentModel, audit_id: Option<&str>) {
    let base = document.base_url();
    let links: Vec<(ResourceReference, String)> = document
        .references()
        .into_iter()
        .filter(|reference| reference.category == ResourceCategory::Link)
        .filter(|reference| !points_into_current_document(&reference.value))
        .filter_map(|reference| {
            let absolute = normalize(&reference.value, &base).ok()?.to_string();
            (absolute != reference.value).then_some((reference, absolute))
        })
        .collect();

    for (reference, absolute) in links {
        document.apply(&reference, Rewrite::SetValue(absolute), audit_id);
    }
}
