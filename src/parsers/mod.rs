//! # 解析器模块
//!
//! - `html` - HTML 文档解析、DOM 操作与文档模型实现
//! - `css` - 样式表的四种改写模式与编码识别

pub mod css;
pub mod html;

pub use css::{decode_stylesheet, rewrite_css, rewrite_style_attribute, CssRefKind, CssReference};
pub use html::{HtmlDocument, HtmlParser};
