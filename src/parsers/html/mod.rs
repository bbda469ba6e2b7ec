//! HTML 文档模型
//!
//! - `utils`: 基础常量
//! - `parser`: `rel` 与 `srcset` 解析
//! - `dom`: 基础 DOM 操作
//! - `metadata`: base URL、字符编码与标题
//! - `selector`: 判断样式规则是否命中文档的选择器匹配
//! - `serializer`: 序列化
//! - `document`: 供抓取引擎使用的 [`HtmlDocument`] 与 [`HtmlParser`]

pub mod document;
pub mod dom;
pub mod metadata;
pub mod parser;
pub mod selector;
pub mod serializer;
pub mod utils;

pub use document::{BlobMap, HtmlDocument, HtmlParser};
pub use dom::{find_nodes, get_node_attr, get_node_name, html_to_dom, set_node_attr};
pub use metadata::{get_base_url, get_charset, get_title, set_charset};
pub use parser::{parse_link_type, parse_srcset, serialize_srcset, LinkType, SrcSetItem};
pub use serializer::serialize_document;
