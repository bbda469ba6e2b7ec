//! 选择器匹配
//!
//! 把当前文档交给 scraper 重新解析，用来判断样式规则是否作用于至少一个元素。
//! 无法解析的选择器视为匹配，保留对应的规则。

use scraper::{Html, Selector};
use tracing::debug;

/// 文档的一份只读快照，供选择器查询
pub struct SelectorIndex {
    html: Html,
}

impl SelectorIndex {
    pub fn new(markup: &str) -> SelectorIndex {
        SelectorIndex {
            html: Html::parse_document(markup),
        }
    }

    /// 是否至少有一个元素匹配选择器（可以是逗号分隔的列表）
    pub fn matches_any(&self, selector: &str) -> bool {
        match Selector::parse(selector) {
            Ok(selector) => self.html.select(&selector).next().is_some(),
            Err(_) => {
                debug!(selector, "cannot parse selector, keeping the rule");
                true
            }
        }
    }
}
