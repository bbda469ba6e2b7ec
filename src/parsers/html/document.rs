//! 基于 html5ever 的文档模型
//!
//! 解析后按文档顺序为每个元素分配编号，引用通过编号定位元素。
//! 被删除的元素保留编号，之后的改写对它们不再生效。

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use encoding_rs::{Encoding, UTF_8};
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use tracing::debug;
use url::Url;

use crate::capture::document::{
    DocumentModel, DocumentParser, NodeId, ReferenceLocation, ResourceReference, Rewrite,
};
use crate::core::ResourceCategory;
use crate::utils::url::create_data_url;

use super::dom::{
    create_comment, detach_node, get_node_attr, get_node_name, get_node_text, get_parent_node,
    html_to_dom, insert_child, is_attached, set_node_attr, set_node_text,
};
use super::metadata::{
    get_base_url, get_charset, get_title, remove_base_elements, remove_csp_meta, set_charset,
};
use super::parser::{parse_link_type, parse_srcset, LinkType};
use super::selector::SelectorIndex;
use super::serializer::{serialize_document, serialize_node};
use super::utils::{
    audit_attribute_name, audit_comment_prefix, ATTRIBUTE_LEVEL_REFERENCES, BASE_RELATIVE_ATTRIBUTES,
};

/// 内存中的 blob 内容：地址 -> (字节, 媒体类型)
pub type BlobMap = HashMap<String, (Vec<u8>, String)>;

pub struct HtmlDocument {
    dom: RcDom,
    url: Url,
    nodes: Vec<Handle>,
    blobs: Arc<BlobMap>,
    selectors: RefCell<Option<SelectorIndex>>,
}

fn collect_nodes(node: &Handle, nodes: &mut Vec<Handle>) {
    for child in node.children.borrow().iter() {
        if let NodeData::Element { .. } = child.data {
            nodes.push(child.clone());
        }
        collect_nodes(child, nodes);
    }
}

/// 确定解码 HTML 所用的编码
///
/// 依次考虑字节顺序标记、传输层声明的字符集和文档内的 `<meta>` 声明。
/// 文档内声明为 UTF-16 时按 UTF-8 处理。
fn sniff_encoding(bytes: &[u8], declared: &str) -> &'static Encoding {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return encoding;
    }
    if let Some(encoding) = Encoding::for_label(declared.trim().as_bytes()) {
        return encoding;
    }

    let head = &bytes[..bytes.len().min(4096)];
    let head_dom = html_to_dom(head, "utf-8");
    match get_charset(&head_dom.document).and_then(|label| Encoding::for_label(label.as_bytes())) {
        Some(encoding) if encoding.name().starts_with("UTF-16") => UTF_8,
        Some(encoding) => encoding,
        None => UTF_8,
    }
}

impl HtmlDocument {
    pub fn parse(bytes: &[u8], charset: &str, url: &Url, blobs: Arc<BlobMap>) -> HtmlDocument {
        let encoding = sniff_encoding(bytes, charset);
        debug!("parsing {} as {}", url, encoding.name());
        let dom = html_to_dom(bytes, encoding.name());

        let mut nodes = Vec::new();
        collect_nodes(&dom.document, &mut nodes);

        HtmlDocument {
            dom,
            url: url.clone(),
            nodes,
            blobs,
            selectors: RefCell::new(None),
        }
    }

    pub fn dom(&self) -> &RcDom {
        &self.dom
    }

    fn node(&self, id: NodeId) -> Option<&Handle> {
        self.nodes.get(id).filter(|node| is_attached(node, &self.dom.document))
    }

    fn element_references(&self, id: NodeId, node: &Handle, references: &mut Vec<ResourceReference>) {
        let Some(name) = get_node_name(node).map(str::to_ascii_lowercase) else {
            return;
        };

        let other = |category: ResourceCategory, location: ReferenceLocation, value: String| ResourceReference {
            node: id,
            category,
            location,
            value,
        };
        let attribute = |category: ResourceCategory, attr_name: &str| {
            get_node_attr(node, attr_name).map(|value| ResourceReference {
                node: id,
                category,
                location: ReferenceLocation::Attribute(attr_name.to_string()),
                value,
            })
        };
        let srcset = || {
            get_node_attr(node, "srcset").map(|value| {
                other(ResourceCategory::Image, ReferenceLocation::Srcset("srcset".to_string()), value)
            })
        };

        match name.as_str() {
            "link" => {
                let link_types = parse_link_type(&get_node_attr(node, "rel").unwrap_or_default());
                if link_types.contains(&LinkType::Stylesheet) {
                    references.extend(attribute(ResourceCategory::Style, "href"));
                } else if link_types.contains(&LinkType::Favicon)
                    || link_types.contains(&LinkType::AppleTouchIcon)
                {
                    references.extend(attribute(ResourceCategory::Favicon, "href"));
                }
            }
            "script" => {
                if get_node_attr(node, "src").is_some() {
                    references.extend(attribute(ResourceCategory::Script, "src"));
                } else {
                    let text = get_node_text(node);
                    if !text.trim().is_empty() {
                        references.push(other(ResourceCategory::Script, ReferenceLocation::ScriptContent, text));
                    }
                }
            }
            "img" => {
                references.extend(attribute(ResourceCategory::Image, "src"));
                references.extend(srcset());
            }
            "input" => {
                if get_node_attr(node, "type").is_some_and(|t| t.eq_ignore_ascii_case("image")) {
                    references.extend(attribute(ResourceCategory::Image, "src"));
                }
            }
            "image" => references.extend(attribute(ResourceCategory::Image, "href")),
            "iframe" => {
                if let Some(srcdoc) = get_node_attr(node, "srcdoc") {
                    references.push(other(ResourceCategory::Frame, ReferenceLocation::Srcdoc, srcdoc));
                } else {
                    references.extend(attribute(ResourceCategory::Frame, "src"));
                }
            }
            "frame" => references.extend(attribute(ResourceCategory::Frame, "src")),
            "embed" => references.extend(attribute(ResourceCategory::Embed, "src")),
            "object" => references.extend(attribute(ResourceCategory::Object, "data")),
            "applet" => references.extend(attribute(ResourceCategory::Applet, "code")),
            "audio" => references.extend(attribute(ResourceCategory::Audio, "src")),
            "video" => {
                references.extend(attribute(ResourceCategory::Video, "src"));
                references.extend(attribute(ResourceCategory::Image, "poster"));
            }
            "source" | "track" => {
                let parent_name = get_parent_node(node)
                    .and_then(|parent| get_node_name(&parent).map(str::to_ascii_lowercase))
                    .unwrap_or_default();
                match parent_name.as_str() {
                    "picture" => references.extend(srcset()),
                    "audio" => references.extend(attribute(ResourceCategory::Audio, "src")),
                    _ => references.extend(attribute(ResourceCategory::Video, "src")),
                }
            }
            "a" | "area" => references.extend(attribute(ResourceCategory::Link, "href")),
            "style" => {
                references.push(other(ResourceCategory::Style, ReferenceLocation::StyleElement, get_node_text(node)));
            }
            _ => {}
        }

        if name != "source" && name != "track" {
            references.extend(attribute(ResourceCategory::ImageBackground, "background"));
        }
        if let Some(style) = get_node_attr(node, "style") {
            references.push(other(ResourceCategory::Style, ReferenceLocation::StyleAttribute, style));
        }
    }

    /// `<picture>` 中第一个带 `srcset` 的 `<source>` 才会被选中
    fn is_selected_source(&self, node: &Handle) -> bool {
        let Some(parent) = get_parent_node(node) else {
            return true;
        };
        let children = parent.children.borrow();
        let first = children.iter().find(|child| {
            get_node_name(child).is_some_and(|name| name.eq_ignore_ascii_case("source"))
                && get_node_attr(child, "srcset").is_some()
        });
        first.map_or(true, |first| Rc::ptr_eq(first, node))
    }

    fn record_audit(&self, node: &Handle, attr_name: &str, audit_id: Option<&str>) {
        let Some(audit_id) = audit_id else {
            return;
        };
        let audit_name = audit_attribute_name(audit_id, attr_name);
        if get_node_attr(node, &audit_name).is_some() {
            return;
        }
        if let Some(original) = get_node_attr(node, attr_name) {
            set_node_attr(node, &audit_name, Some(original));
        }
    }

    fn set_attribute(&self, node: &Handle, attr_name: &str, value: String, audit_id: Option<&str>) {
        if get_node_attr(node, attr_name).as_deref() == Some(value.as_str()) {
            return;
        }
        self.record_audit(node, attr_name, audit_id);
        set_node_attr(node, attr_name, Some(value));
        // 内容已变化，原来的完整性校验值不再成立
        set_node_attr(node, "integrity", None);
    }

    fn remove_element(&self, node: &Handle, audit_id: Option<&str>) {
        let markup = audit_id.map(|audit_id| {
            let markup = serialize_node(node).replace("--", "- -");
            format!("{} {}", audit_comment_prefix(audit_id), markup)
        });
        if let Some((parent, index)) = detach_node(node) {
            if let Some(markup) = markup {
                insert_child(&parent, index, create_comment(&markup));
            }
        }
    }
}

impl DocumentModel for HtmlDocument {
    fn url(&self) -> &Url {
        &self.url
    }

    fn base_url(&self) -> Url {
        get_base_url(&self.dom.document)
            .and_then(|href| self.url.join(href.trim()).ok())
            .unwrap_or_else(|| self.url.clone())
    }

    fn title(&self) -> Option<String> {
        get_title(&self.dom.document)
    }

    fn references(&self) -> Vec<ResourceReference> {
        let mut references = Vec::new();
        for (id, node) in self.nodes.iter().enumerate() {
            if is_attached(node, &self.dom.document) {
                self.element_references(id, node, &mut references);
            }
        }
        references
    }

    fn is_used(&self, reference: &ResourceReference, candidate: Option<&str>) -> bool {
        let Some(node) = self.node(reference.node) else {
            return false;
        };
        let name = get_node_name(node).map(str::to_ascii_lowercase).unwrap_or_default();

        if let (ReferenceLocation::Srcset(_), Some(candidate)) = (&reference.location, candidate) {
            if name == "source" && !self.is_selected_source(node) {
                return false;
            }
            let candidates = parse_srcset(&reference.value);
            let src = get_node_attr(node, "src");
            let selected = candidates
                .iter()
                .find(|item| Some(item.path) == src.as_deref())
                .or(candidates.first());
            return selected.is_some_and(|item| item.path == candidate);
        }

        if name == "link" && reference.category == ResourceCategory::Style {
            let link_types = parse_link_type(&get_node_attr(node, "rel").unwrap_or_default());
            return !link_types.contains(&LinkType::Alternate) && get_node_attr(node, "disabled").is_none();
        }

        true
    }

    fn matches_selector(&self, selector: &str) -> bool {
        let mut selectors = self.selectors.borrow_mut();
        let index = selectors.get_or_insert_with(|| {
            SelectorIndex::new(&String::from_utf8_lossy(&serialize_document(&self.dom)))
        });
        index.matches_any(selector)
    }

    fn ephemeral_content(&self, url: &str) -> Option<(Vec<u8>, String)> {
        self.blobs.get(url).cloned()
    }

    fn apply(&mut self, reference: &ResourceReference, rewrite: Rewrite, audit_id: Option<&str>) {
        let Some(node) = self.node(reference.node).cloned() else {
            return;
        };
        self.selectors.replace(None);

        match rewrite {
            Rewrite::SetValue(value) => match reference.attribute() {
                Some(attr_name) => self.set_attribute(&node, attr_name, value, audit_id),
                None => set_node_text(&node, &value),
            },
            Rewrite::Remove => match reference.attribute() {
                Some(attr_name) if ATTRIBUTE_LEVEL_REFERENCES.contains(&attr_name) => {
                    self.record_audit(&node, attr_name, audit_id);
                    set_node_attr(&node, attr_name, None);
                }
                _ => self.remove_element(&node, audit_id),
            },
            Rewrite::InlineDocument(html) => {
                let is_iframe = get_node_name(&node).is_some_and(|name| name.eq_ignore_ascii_case("iframe"));
                if is_iframe {
                    self.record_audit(&node, "src", audit_id);
                    set_node_attr(&node, "src", None);
                    set_node_attr(&node, "srcdoc", Some(html));
                } else if let Some(attr_name) = reference.attribute() {
                    let data_url = create_data_url("text/html", html.as_bytes(), None);
                    self.set_attribute(&node, attr_name, data_url, audit_id);
                }
            }
        }
    }

    fn prepare_for_archive(&mut self) {
        // 删除 <base> 之前先按它解析剩余的相对地址
        let base = self.base_url();
        for node in self.nodes.iter().filter(|node| is_attached(node, &self.dom.document)) {
            let Some(name) = get_node_name(node) else {
                continue;
            };
            for (element, attr_name) in BASE_RELATIVE_ATTRIBUTES {
                if !name.eq_ignore_ascii_case(element) {
                    continue;
                }
                let Some(value) = get_node_attr(node, attr_name) else {
                    continue;
                };
                let value = value.trim();
                if value.is_empty() || value.starts_with('#') {
                    continue;
                }
                if let Ok(absolute) = base.join(value) {
                    set_node_attr(node, attr_name, Some(absolute.to_string()));
                }
            }
        }

        remove_base_elements(&self.dom);
        remove_csp_meta(&self.dom);
        set_charset(&self.dom, "UTF-8");
        self.selectors.replace(None);
    }

    fn serialize(&self) -> Vec<u8> {
        serialize_document(&self.dom)
    }
}

/// 生成 [`HtmlDocument`] 的解析器
#[derive(Clone, Debug, Default)]
pub struct HtmlParser {
    blobs: Arc<BlobMap>,
}

impl HtmlParser {
    pub fn new() -> HtmlParser {
        HtmlParser::default()
    }

    /// 登记一个只存在于内存中的 blob
    pub fn register_blob(&mut self, url: &str, bytes: Vec<u8>, media_type: &str) {
        Arc::make_mut(&mut self.blobs).insert(url.to_string(), (bytes, media_type.to_string()));
    }
}

impl DocumentParser for HtmlParser {
    fn parse(&self, bytes: &[u8], charset: &str, url: &Url) -> Box<dyn DocumentModel> {
        Box::new(HtmlDocument::parse(bytes, charset, url, self.blobs.clone()))
    }
}
