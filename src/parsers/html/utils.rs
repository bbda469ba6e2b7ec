/// Favicon 相关的值
pub const FAVICON_VALUES: &[&str] = &["icon", "shortcut icon"];

/// ASCII 空白字符
pub const WHITESPACES: &[char] = &[' ', '\t', '\n', '\x0c', '\r'];

/// 删除引用时只去掉属性、保留元素本身的属性名
pub const ATTRIBUTE_LEVEL_REFERENCES: &[&str] = &["background", "poster", "srcset", "style", "srcdoc"];

/// 不作为资源处理、但依赖文档基址的属性（元素，属性）
pub const BASE_RELATIVE_ATTRIBUTES: &[(&str, &str)] = &[
    ("form", "action"),
    ("button", "formaction"),
    ("input", "formaction"),
    ("q", "cite"),
    ("blockquote", "cite"),
    ("del", "cite"),
    ("ins", "cite"),
];

/// 检查是否为 favicon
pub fn is_favicon(attr_value: &str) -> bool {
    FAVICON_VALUES.contains(&attr_value.to_lowercase().as_str())
}

/// 记录原始属性值的审计属性名
pub fn audit_attribute_name(audit_id: &str, attr_name: &str) -> String {
    format!("data-sb{audit_id}-{attr_name}")
}

/// 记录被删除元素的注释前缀
pub fn audit_comment_prefix(audit_id: &str) -> String {
    format!("sb{audit_id}-orig-node")
}
