//! 文档元数据：base URL、字符编码声明与标题

use html5ever::interface::{Attribute, QualName};
use html5ever::tendril::format_tendril;
use html5ever::tree_builder::create_element;
use html5ever::{namespace_url, ns, LocalName};
use markup5ever_rcdom::{Handle, RcDom};

use crate::utils::mime::parse_content_type;

use super::dom::{
    detach_node, find_nodes, get_child_node_by_name, get_node_attr, get_node_text, insert_child,
    set_node_attr,
};
use super::utils::WHITESPACES;

/// 获取文档的 base URL，只有第一个 `<base href>` 生效
pub fn get_base_url(handle: &Handle) -> Option<String> {
    find_nodes(handle, &["html", "head", "base"])
        .iter()
        .find_map(|base_node| get_node_attr(base_node, "href"))
}

/// 获取文档声明的字符编码
///
/// 支持 `<meta charset>` 与 `<meta http-equiv="content-type">` 两种写法。
pub fn get_charset(node: &Handle) -> Option<String> {
    for meta_node in find_nodes(node, &["html", "head", "meta"]).iter() {
        if let Some(charset) = get_node_attr(meta_node, "charset") {
            return Some(charset.trim_matches(WHITESPACES).to_string());
        }

        if get_node_attr(meta_node, "http-equiv")
            .unwrap_or_default()
            .eq_ignore_ascii_case("content-type")
        {
            if let Some(content) = get_node_attr(meta_node, "content") {
                let (_media_type, charset, _is_base64) = parse_content_type(&content);
                if !charset.is_empty() {
                    return Some(charset);
                }
            }
        }
    }

    None
}

/// 获取文档标题，空白会被折叠
pub fn get_title(node: &Handle) -> Option<String> {
    let title_node = find_nodes(node, &["html", "head", "title"]).into_iter().next()?;
    let title = get_node_text(&title_node)
        .split(WHITESPACES)
        .filter(|word| !word.is_empty())
        .collect::<Vec<&str>>()
        .join(" ");
    (!title.is_empty()).then_some(title)
}

/// 删除全部 `<base>` 元素
pub fn remove_base_elements(dom: &RcDom) {
    for base_node in find_nodes(&dom.document, &["base"]) {
        detach_node(&base_node);
    }
}

/// 删除 `<meta http-equiv="content-security-policy">`
pub fn remove_csp_meta(dom: &RcDom) {
    for meta_node in find_nodes(&dom.document, &["meta"]) {
        if get_node_attr(&meta_node, "http-equiv")
            .unwrap_or_default()
            .trim()
            .eq_ignore_ascii_case("content-security-policy")
        {
            detach_node(&meta_node);
        }
    }
}

/// 将文档的字符编码声明统一为给定值
///
/// 已有的 `<meta charset>` 被改写，`http-equiv` 形式的声明被删除，
/// 没有声明时在 `<head>` 开头插入一个。
pub fn set_charset(dom: &RcDom, charset: &str) {
    let mut declared = false;

    for meta_node in find_nodes(&dom.document, &["html", "head", "meta"]) {
        if get_node_attr(&meta_node, "charset").is_some() {
            if declared {
                detach_node(&meta_node);
            } else {
                set_node_attr(&meta_node, "charset", Some(charset.to_string()));
                declared = true;
            }
        } else if get_node_attr(&meta_node, "http-equiv")
            .unwrap_or_default()
            .eq_ignore_ascii_case("content-type")
        {
            detach_node(&meta_node);
        }
    }

    if declared {
        return;
    }

    let Some(head) =
        get_child_node_by_name(&dom.document, "html").and_then(|html| get_child_node_by_name(&html, "head"))
    else {
        return;
    };

    let meta = create_element(
        dom,
        QualName::new(None, ns!(), LocalName::from("meta")),
        vec![Attribute {
            name: QualName::new(None, ns!(), LocalName::from("charset")),
            value: format_tendril!("{}", charset),
        }],
    );
    insert_child(&head, 0, meta);
}
