//! `<link rel>` 与 `srcset` 属性的解析
//!
//! ```rust
//! use webscrap::parsers::html::parser::{parse_link_type, parse_srcset, LinkType};
//!
//! let link_types = parse_link_type("stylesheet preload");
//! assert_eq!(link_types, vec![LinkType::Stylesheet, LinkType::Preload]);
//!
//! let srcset_items = parse_srcset("small.jpg 480w, large.jpg 800w");
//! assert_eq!(srcset_items.len(), 2);
//! ```

use super::utils::{is_favicon, WHITESPACES};

/// `<link>` 元素 `rel` 属性中关心的链接类型
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkType {
    /// 备用版本（`rel="alternate stylesheet"` 中的 alternate）
    Alternate,
    /// Apple 设备触摸图标
    AppleTouchIcon,
    DnsPrefetch,
    /// 网站图标
    Favicon,
    Preload,
    /// CSS 样式表
    Stylesheet,
}

/// `srcset` 中的一个候选项
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SrcSetItem<'a> {
    /// 图片地址
    pub path: &'a str,
    /// 宽度（`480w`）或像素密度（`2x`）描述符，可能为空
    pub descriptor: &'a str,
}

/// 解析 `rel` 属性值，不区分大小写，忽略不认识的值
pub fn parse_link_type(link_attr_rel_value: &str) -> Vec<LinkType> {
    let mut types: Vec<LinkType> = vec![];

    for link_attr_rel_type in link_attr_rel_value.split(WHITESPACES) {
        let link_attr_rel_type = link_attr_rel_type.to_ascii_lowercase();
        match link_attr_rel_type.as_str() {
            "" => continue,
            "alternate" => types.push(LinkType::Alternate),
            "dns-prefetch" => types.push(LinkType::DnsPrefetch),
            "preload" => types.push(LinkType::Preload),
            "stylesheet" => types.push(LinkType::Stylesheet),
            "apple-touch-icon" | "apple-touch-icon-precomposed" => {
                types.push(LinkType::AppleTouchIcon)
            }
            value if is_favicon(value) => types.push(LinkType::Favicon),
            _ => {}
        }
    }

    types
}

/// 解析 `srcset` 属性
///
/// 候选项以逗号分隔；地址本身可以包含逗号（例如 data URL），
/// 因此地址按空白切分，描述符再按括号外的逗号切分。
pub fn parse_srcset(srcset: &str) -> Vec<SrcSetItem<'_>> {
    let mut items = Vec::new();
    let mut position = 0;
    let length = srcset.len();

    while position < length {
        // 跳过分隔用的空白和逗号
        let rest = &srcset[position..];
        let skipped = rest.len() - rest.trim_start_matches(|c: char| c == ',' || WHITESPACES.contains(&c)).len();
        position += skipped;
        if position >= length {
            break;
        }

        let rest = &srcset[position..];
        let url_end = rest.find(WHITESPACES).unwrap_or(rest.len());
        let mut path = &rest[..url_end];
        position += url_end;

        if path.ends_with(',') {
            path = path.trim_end_matches(',');
            if !path.is_empty() {
                items.push(SrcSetItem { path, descriptor: "" });
            }
            continue;
        }

        let rest = &srcset[position..];
        let mut depth = 0usize;
        let mut descriptor_end = rest.len();
        for (index, c) in rest.char_indices() {
            match c {
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                ',' if depth == 0 => {
                    descriptor_end = index;
                    break;
                }
                _ => {}
            }
        }
        let descriptor = rest[..descriptor_end].trim_matches(WHITESPACES);
        position += descriptor_end;

        items.push(SrcSetItem { path, descriptor });
    }

    items
}

/// 将（地址，描述符）列表写回 `srcset` 属性值
pub fn serialize_srcset(items: &[(String, String)]) -> String {
    items
        .iter()
        .map(|(path, descriptor)| {
            if descriptor.is_empty() {
                path.clone()
            } else {
                format!("{path} {descriptor}")
            }
        })
        .collect::<Vec<String>>()
        .join(", ")
}
