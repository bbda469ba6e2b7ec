//! CSS 重写器
//!
//! 解析样式表文本并替换其中的资源引用（`url(...)`、`@import`、`@font-face src`）。
//! 支持四种模式：
//!
//! - **raw-url**: 逐个 token 保留原文，只替换 URL
//! - **tidy**: 经结构化解析后重新序列化，丢弃无法理解的规则与声明
//! - **match**: 在 tidy 的基础上，删除在文档中没有匹配元素的规则
//! - **none**: 原样返回
//!
//! 解析基于 cssparser 的 token 流，允许注释和任意空白出现在 `url(...)` 与 `@import` 中，
//! 关键字不区分大小写。

use std::collections::HashSet;

use cssparser::{serialize_identifier, serialize_string, ParseError, Parser, ParserInput, Token};
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};

use crate::capture::document::DocumentModel;
use crate::core::CssMode;

/// 资源引用在样式表中的语法位置
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CssRefKind {
    /// `@import` 的目标样式表
    Import,
    /// `@font-face` 中的字体文件
    FontFace,
    /// 其它 `url(...)`，通常是图片
    Image,
}

/// 交给解析回调的一个引用
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CssReference<'a> {
    pub url: &'a str,
    pub kind: CssRefKind,
    /// 所在规则是否作用于文档
    pub used: bool,
}

/// 格式化CSS标识符
pub fn format_ident(ident: &str) -> String {
    let mut res: String = "".to_string();
    let _ = serialize_identifier(ident, &mut res);
    res.trim_end().to_string()
}

/// 格式化带引号的CSS字符串
pub fn format_quoted_string(string: &str) -> String {
    let mut res: String = "".to_string();
    let _ = serialize_string(string, &mut res);
    res
}

fn format_url(url: &str) -> String {
    format!("url({})", format_quoted_string(url))
}

#[derive(Clone, Debug, PartialEq)]
enum BlockKind {
    Curly,
    Paren,
    Square,
    Function,
}

impl BlockKind {
    fn close(&self) -> char {
        match self {
            BlockKind::Curly => '}',
            BlockKind::Square => ']',
            BlockKind::Paren | BlockKind::Function => ')',
        }
    }
}

/// 保留原文的 token 树
#[derive(Clone, Debug, PartialEq)]
enum Component {
    Whitespace,
    Comment,
    Ident { raw: String, value: String },
    AtKeyword { raw: String, name: String },
    QuotedString { raw: String, value: String },
    Url { raw: String, value: String },
    Colon,
    Comma,
    Semicolon,
    Other(String),
    Block {
        kind: BlockKind,
        open: String,
        children: Vec<Component>,
    },
}

impl Component {
    fn is_blank(&self) -> bool {
        matches!(self, Component::Whitespace | Component::Comment)
    }
}

fn tokenize(css: &str) -> Vec<(Component, String)> {
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);
    parse_components(&mut parser)
}

/// 逐个读取 token，返回 (组件, 原文) 列表
fn parse_components<'i, 't>(parser: &mut Parser<'i, 't>) -> Vec<(Component, String)> {
    let mut result = Vec::new();

    loop {
        let token_offset = parser.position();
        let token = match parser.next_including_whitespace_and_comments() {
            Ok(token) => token.clone(),
            Err(_) => break,
        };
        let raw = parser.slice_from(token_offset).to_string();

        let component = match token {
            Token::WhiteSpace(_) => Component::Whitespace,
            Token::Comment(_) => Component::Comment,
            Token::Ident(ref value) => Component::Ident {
                raw: raw.clone(),
                value: value.to_string(),
            },
            Token::AtKeyword(ref name) => Component::AtKeyword {
                raw: raw.clone(),
                name: name.to_ascii_lowercase(),
            },
            Token::QuotedString(ref value) => Component::QuotedString {
                raw: raw.clone(),
                value: value.to_string(),
            },
            Token::UnquotedUrl(ref value) => Component::Url {
                raw: raw.clone(),
                value: value.to_string(),
            },
            Token::Colon => Component::Colon,
            Token::Comma => Component::Comma,
            Token::Semicolon => Component::Semicolon,
            Token::Function(ref name) if name.eq_ignore_ascii_case("url") => {
                let children = parse_nested(parser);
                let value = children.iter().find_map(|(child, _)| match child {
                    Component::QuotedString { value, .. } => Some(value.clone()),
                    _ => None,
                });
                let full_raw = parser.slice_from(token_offset).to_string();

                match value {
                    Some(value) => Component::Url {
                        raw: full_raw.clone(),
                        value,
                    },
                    None => Component::Block {
                        kind: BlockKind::Function,
                        open: raw.clone(),
                        children: strip_raw(children),
                    },
                }
            }
            Token::Function(_) => Component::Block {
                kind: BlockKind::Function,
                open: raw.clone(),
                children: strip_raw(parse_nested(parser)),
            },
            Token::ParenthesisBlock => Component::Block {
                kind: BlockKind::Paren,
                open: raw.clone(),
                children: strip_raw(parse_nested(parser)),
            },
            Token::SquareBracketBlock => Component::Block {
                kind: BlockKind::Square,
                open: raw.clone(),
                children: strip_raw(parse_nested(parser)),
            },
            Token::CurlyBracketBlock => Component::Block {
                kind: BlockKind::Curly,
                open: raw.clone(),
                children: strip_raw(parse_nested(parser)),
            },
            _ => Component::Other(raw.clone()),
        };

        let raw = match &component {
            Component::Url { raw, .. } => raw.clone(),
            _ => raw,
        };
        result.push((component, raw));
    }

    result
}

fn parse_nested<'i, 't>(parser: &mut Parser<'i, 't>) -> Vec<(Component, String)> {
    parser
        .parse_nested_block(|nested| Ok::<_, ParseError<'i, ()>>(parse_components(nested)))
        .unwrap_or_default()
}

/// 块内的空白与注释原文需要保留，因此把原文折叠进组件本身
fn strip_raw(components: Vec<(Component, String)>) -> Vec<Component> {
    components
        .into_iter()
        .map(|(component, raw)| match component {
            Component::Whitespace | Component::Comment => Component::Other(raw),
            other => other,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// raw-url 模式
// ---------------------------------------------------------------------------

#[derive(Default)]
struct RawState {
    at_rule: Option<String>,
    import_resolved: bool,
    in_font_face: bool,
}

fn write_raw(
    components: &[(Component, String)],
    state: &mut RawState,
    out: &mut String,
    resolve: &mut dyn FnMut(&CssReference) -> String,
) {
    for (component, raw) in components {
        write_raw_component(component, raw, state, out, resolve);
    }
}

fn write_raw_component(
    component: &Component,
    raw: &str,
    state: &mut RawState,
    out: &mut String,
    resolve: &mut dyn FnMut(&CssReference) -> String,
) {
    match component {
        Component::AtKeyword { name, .. } => {
            state.at_rule = Some(name.clone());
            state.import_resolved = false;
            out.push_str(raw);
        }
        Component::Semicolon => {
            state.at_rule = None;
            out.push(';');
        }
        Component::QuotedString { value, .. }
            if state.at_rule.as_deref() == Some("import") && !state.import_resolved =>
        {
            state.import_resolved = true;
            let new_value = resolve(&CssReference {
                url: value,
                kind: CssRefKind::Import,
                used: true,
            });
            if &new_value == value {
                out.push_str(raw);
            } else {
                out.push_str(&format_quoted_string(&new_value));
            }
        }
        Component::Url { value, .. } => {
            let kind = if state.at_rule.as_deref() == Some("import") && !state.import_resolved {
                state.import_resolved = true;
                CssRefKind::Import
            } else if state.in_font_face {
                CssRefKind::FontFace
            } else {
                CssRefKind::Image
            };
            let new_value = resolve(&CssReference {
                url: value,
                kind,
                used: true,
            });
            if &new_value == value {
                out.push_str(raw);
            } else {
                out.push_str(&format_url(&new_value));
            }
        }
        Component::Block {
            kind: BlockKind::Curly,
            open,
            children,
        } => {
            let mut inner = RawState {
                in_font_face: state.at_rule.as_deref() == Some("font-face"),
                ..RawState::default()
            };
            out.push_str(open);
            for child in children {
                write_raw_component(child, &raw_of(child), &mut inner, out, resolve);
            }
            out.push('}');
            state.at_rule = None;
        }
        Component::Block {
            kind,
            open,
            children,
        } => {
            out.push_str(open);
            for child in children {
                write_raw_component(child, &raw_of(child), state, out, resolve);
            }
            out.push(kind.close());
        }
        _ => out.push_str(raw),
    }
}

/// 嵌套组件的原文
fn raw_of(component: &Component) -> String {
    match component {
        Component::Whitespace => " ".to_string(),
        Component::Comment => String::new(),
        Component::Ident { raw, .. }
        | Component::AtKeyword { raw, .. }
        | Component::QuotedString { raw, .. }
        | Component::Url { raw, .. } => raw.clone(),
        Component::Colon => ":".to_string(),
        Component::Comma => ",".to_string(),
        Component::Semicolon => ";".to_string(),
        Component::Other(raw) => raw.clone(),
        Component::Block {
            kind,
            open,
            children,
        } => {
            let mut text = open.clone();
            for child in children {
                text.push_str(&raw_of(child));
            }
            text.push(kind.close());
            text
        }
    }
}

// ---------------------------------------------------------------------------
// 结构化解析（tidy / match 模式）
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct Declaration {
    name: String,
    value: Vec<Component>,
    important: bool,
}

#[derive(Clone, Debug)]
enum BodyItem {
    Declaration(Declaration),
    Rule(CssRule),
}

#[derive(Clone, Debug)]
enum CssRule {
    Style {
        selector: String,
        body: Vec<BodyItem>,
        used: bool,
    },
    Statement {
        name: String,
        prelude: Vec<Component>,
    },
    Group {
        name: String,
        prelude: Vec<Component>,
        rules: Vec<CssRule>,
    },
    Descriptors {
        name: String,
        prelude: Vec<Component>,
        body: Vec<BodyItem>,
        used: bool,
    },
    Keyframes {
        name: String,
        prelude: Vec<Component>,
        frames: Vec<(String, Vec<BodyItem>)>,
        used: bool,
    },
}

const GROUPING_AT_RULES: &[&str] = &[
    "media",
    "supports",
    "layer",
    "container",
    "scope",
    "starting-style",
    "document",
];

const DESCRIPTOR_AT_RULES: &[&str] = &[
    "font-face",
    "page",
    "counter-style",
    "property",
    "font-palette-values",
    "viewport",
];

const STATEMENT_AT_RULES: &[&str] = &["import", "namespace", "layer"];

fn is_vendor_prefixed(name: &str) -> bool {
    name.starts_with('-') && !name.starts_with("--")
}

fn parse_rules(components: &[Component]) -> Vec<CssRule> {
    let mut rules = Vec::new();
    let mut prelude: Vec<Component> = Vec::new();
    let mut at_rule: Option<String> = None;

    for component in components {
        match component {
            c if (c.is_blank() || is_blank_other(c)) && prelude.is_empty() && at_rule.is_none() => {}
            Component::Other(raw)
                if (raw == "<!--" || raw == "-->") && prelude.is_empty() && at_rule.is_none() => {}
            Component::AtKeyword { name, .. } if prelude.is_empty() && at_rule.is_none() => {
                at_rule = Some(name.clone());
            }
            Component::Semicolon => {
                if let Some(name) = at_rule.take() {
                    if let Some(rule) = statement_rule(name, trim_blank(&prelude)) {
                        rules.push(rule);
                    }
                }
                prelude.clear();
            }
            Component::Block {
                kind: BlockKind::Curly,
                children,
                ..
            } => {
                let rule = match at_rule.take() {
                    Some(name) => block_at_rule(name, trim_blank(&prelude), children),
                    None => style_rule(&prelude, children),
                };
                rules.extend(rule);
                prelude.clear();
            }
            other => prelude.push(other.clone()),
        }
    }

    if let Some(name) = at_rule {
        rules.extend(statement_rule(name, trim_blank(&prelude)));
    }

    rules
}

fn trim_blank(components: &[Component]) -> Vec<Component> {
    let is_blank = |c: &Component| match c {
        Component::Other(raw) => raw.trim().is_empty() || raw.starts_with("/*"),
        c => c.is_blank(),
    };
    let start = components.iter().position(|c| !is_blank(c));
    let end = components.iter().rposition(|c| !is_blank(c));
    match (start, end) {
        (Some(start), Some(end)) => components[start..=end].to_vec(),
        _ => Vec::new(),
    }
}

fn statement_rule(name: String, prelude: Vec<Component>) -> Option<CssRule> {
    if is_vendor_prefixed(&name) || !STATEMENT_AT_RULES.contains(&name.as_str()) {
        return None;
    }
    Some(CssRule::Statement { name, prelude })
}

fn block_at_rule(name: String, prelude: Vec<Component>, children: &[Component]) -> Option<CssRule> {
    if is_vendor_prefixed(&name) {
        return None;
    }

    if GROUPING_AT_RULES.contains(&name.as_str()) {
        Some(CssRule::Group {
            name,
            prelude,
            rules: parse_rules(children),
        })
    } else if DESCRIPTOR_AT_RULES.contains(&name.as_str()) {
        Some(CssRule::Descriptors {
            name,
            prelude,
            body: parse_body(children),
            used: true,
        })
    } else if name == "keyframes" {
        let frames = parse_rules(children)
            .into_iter()
            .filter_map(|rule| match rule {
                CssRule::Style { selector, body, .. } => Some((
                    normalize_keyframe_selector(&selector),
                    body.into_iter()
                        .filter(|item| matches!(item, BodyItem::Declaration(_)))
                        .collect(),
                )),
                _ => None,
            })
            .collect();
        Some(CssRule::Keyframes {
            name,
            prelude,
            frames,
            used: true,
        })
    } else {
        None
    }
}

fn style_rule(prelude: &[Component], children: &[Component]) -> Option<CssRule> {
    let selector = serialize_plain(prelude);
    if selector.is_empty() {
        return None;
    }
    Some(CssRule::Style {
        selector,
        body: parse_body(children),
        used: true,
    })
}

fn normalize_keyframe_selector(selector: &str) -> String {
    selector
        .split(',')
        .map(|part| match part.trim().to_ascii_lowercase().as_str() {
            "from" => "0%".to_string(),
            "to" => "100%".to_string(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn starts_custom_property(segment: &[Component]) -> bool {
    matches!(
        trim_blank(segment).first(),
        Some(Component::Ident { value, .. }) if value.starts_with("--")
    )
}

fn parse_body(components: &[Component]) -> Vec<BodyItem> {
    let mut items = Vec::new();
    let mut segment: Vec<Component> = Vec::new();

    for component in components {
        match component {
            Component::Semicolon => {
                items.extend(parse_declaration(&segment).map(BodyItem::Declaration));
                segment.clear();
            }
            Component::Block {
                kind: BlockKind::Curly,
                children,
                ..
            } if !starts_custom_property(&segment) => {
                let prelude = trim_blank(&segment);
                let rule = match prelude.first() {
                    Some(Component::AtKeyword { name, .. }) => {
                        block_at_rule(name.clone(), trim_blank(&prelude[1..]), children)
                    }
                    _ => style_rule(&prelude, children),
                };
                items.extend(rule.map(BodyItem::Rule));
                segment.clear();
            }
            other => segment.push(other.clone()),
        }
    }

    items.extend(parse_declaration(&segment).map(BodyItem::Declaration));
    items
}

fn parse_declaration(segment: &[Component]) -> Option<Declaration> {
    let segment = trim_blank(segment);
    let mut iter = segment.iter().enumerate();

    let name = match iter.next() {
        Some((_, Component::Ident { value, .. })) => value.clone(),
        _ => return None,
    };

    let colon = iter.find(|(_, c)| !c.is_blank() && !is_blank_other(c))?;
    if !matches!(colon.1, Component::Colon) {
        return None;
    }

    let mut value = trim_blank(&segment[colon.0 + 1..]);
    let mut important = false;

    if let Some(Component::Ident { value: last, .. }) = value.last() {
        if last.eq_ignore_ascii_case("important") {
            let before = trim_blank(&value[..value.len() - 1]);
            if matches!(before.last(), Some(Component::Other(raw)) if raw == "!") {
                value = trim_blank(&before[..before.len() - 1]);
                important = true;
            }
        }
    }

    let custom = name.starts_with("--");
    let name = if custom { name } else { name.to_ascii_lowercase() };

    if is_vendor_prefixed(&name) || (value.is_empty() && !custom) {
        return None;
    }

    Some(Declaration {
        name,
        value,
        important,
    })
}

fn is_blank_other(component: &Component) -> bool {
    matches!(component, Component::Other(raw) if raw.trim().is_empty() || raw.starts_with("/*"))
}

// ---------------------------------------------------------------------------
// 使用情况分析
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Usage {
    families: HashSet<String>,
    animations: HashSet<String>,
}

fn top_level_split(text: &str, separator: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in text.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' => {
                escaped = true;
                current.push(c);
            }
            '"' | '\'' if quote.is_none() => {
                quote = Some(c);
                current.push(c);
            }
            c if Some(c) == quote => {
                quote = None;
                current.push(c);
            }
            '(' | '[' if quote.is_none() => {
                depth += 1;
                current.push(c);
            }
            ')' | ']' if quote.is_none() => {
                depth -= 1;
                current.push(c);
            }
            c if c == separator && depth == 0 && quote.is_none() => {
                parts.push(current.trim().to_string());
                current.clear();
            }
            c => current.push(c),
        }
    }
    parts.push(current.trim().to_string());
    parts.retain(|part| !part.is_empty());
    parts
}

/// 去掉伪类与伪元素，留下可在静态文档上匹配的部分
pub fn strip_pseudo_selectors(selector: &str) -> String {
    let chars: Vec<char> = selector.chars().collect();
    let mut out = String::new();
    let mut i = 0;
    let mut bracket_depth = 0;
    let mut quote: Option<char> = None;

    while i < chars.len() {
        let c = chars[i];

        if let Some(q) = quote {
            out.push(c);
            if c == '\\' && i + 1 < chars.len() {
                out.push(chars[i + 1]);
                i += 1;
            } else if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }

        match c {
            '\\' if i + 1 < chars.len() => {
                out.push(c);
                out.push(chars[i + 1]);
                i += 2;
                continue;
            }
            '"' | '\'' => quote = Some(c),
            '[' => bracket_depth += 1,
            ']' => bracket_depth -= 1,
            ':' if bracket_depth == 0 => {
                while i < chars.len() && chars[i] == ':' {
                    i += 1;
                }
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || chars[i] == '-' || chars[i] == '_')
                {
                    i += 1;
                }
                if i < chars.len() && chars[i] == '(' {
                    let mut depth = 0;
                    while i < chars.len() {
                        match chars[i] {
                            '(' => depth += 1,
                            ')' => {
                                depth -= 1;
                                if depth == 0 {
                                    i += 1;
                                    break;
                                }
                            }
                            _ => {}
                        }
                        i += 1;
                    }
                }
                continue;
            }
            _ => {}
        }

        out.push(c);
        i += 1;
    }

    let mut stripped = out.trim().to_string();
    if stripped.is_empty() {
        return "*".to_string();
    }
    if stripped.starts_with(['>', '+', '~']) {
        stripped.insert_str(0, "* ");
    }
    if stripped.ends_with(['>', '+', '~']) {
        stripped.push_str(" *");
    }
    stripped
}

fn selector_is_used(selector: &str, document: &dyn DocumentModel) -> bool {
    top_level_split(selector, ',').iter().any(|part| {
        let lowered = part.to_ascii_lowercase();
        lowered.contains(":host") || lowered.contains("::slotted") || lowered.contains("::part")
            || document.matches_selector(&strip_pseudo_selectors(part))
    })
}

fn font_families(value: &[Component]) -> Vec<String> {
    let mut families = Vec::new();
    for group in value.split(|c| matches!(c, Component::Comma)) {
        let group = trim_blank(group);
        match group.last() {
            Some(Component::QuotedString { value, .. }) => families.push(value.to_lowercase()),
            Some(Component::Ident { .. }) => {
                let mut words: Vec<&str> = Vec::new();
                for component in group.iter().rev() {
                    match component {
                        Component::Ident { value, .. } => words.push(value),
                        c if c.is_blank() || is_blank_other(c) => {}
                        _ => break,
                    }
                }
                words.reverse();
                families.push(words.join(" ").to_lowercase());
            }
            _ => {}
        }
    }
    families
}

fn collect_usage(items: &[BodyItem], usage: &mut Usage) {
    for item in items {
        match item {
            BodyItem::Declaration(declaration) => match declaration.name.as_str() {
                "font" | "font-family" => usage.families.extend(font_families(&declaration.value)),
                "animation" | "animation-name" => {
                    for component in &declaration.value {
                        match component {
                            Component::Ident { value, .. } | Component::QuotedString { value, .. } => {
                                usage.animations.insert(value.to_lowercase());
                            }
                            _ => {}
                        }
                    }
                }
                _ => {}
            },
            BodyItem::Rule(rule) => collect_rule_usage(rule, usage),
        }
    }
}

fn collect_rule_usage(rule: &CssRule, usage: &mut Usage) {
    match rule {
        CssRule::Style {
            body, used: true, ..
        } => collect_usage(body, usage),
        CssRule::Group { rules, .. } => rules.iter().for_each(|r| collect_rule_usage(r, usage)),
        _ => {}
    }
}

fn mark_selectors(rules: &mut [CssRule], document: &dyn DocumentModel, parent_used: Option<bool>) {
    for rule in rules.iter_mut() {
        match rule {
            CssRule::Style {
                selector,
                body,
                used,
            } => {
                *used = parent_used.unwrap_or_else(|| selector_is_used(selector, document));
                let nested_used = Some(*used);
                for item in body.iter_mut() {
                    if let BodyItem::Rule(nested) = item {
                        mark_selectors(std::slice::from_mut(nested), document, nested_used);
                    }
                }
            }
            CssRule::Group { rules, .. } => mark_selectors(rules, document, parent_used),
            _ => {}
        }
    }
}

fn declared_font_family(body: &[BodyItem]) -> Option<String> {
    body.iter().find_map(|item| match item {
        BodyItem::Declaration(declaration) if declaration.name == "font-family" => {
            font_families(&declaration.value).into_iter().next()
        }
        _ => None,
    })
}

fn keyframes_name(prelude: &[Component]) -> Option<String> {
    prelude.iter().find_map(|component| match component {
        Component::Ident { value, .. } | Component::QuotedString { value, .. } => {
            Some(value.to_lowercase())
        }
        _ => None,
    })
}

fn mark_dependents(rules: &mut [CssRule], usage: &Usage) {
    for rule in rules.iter_mut() {
        match rule {
            CssRule::Descriptors {
                name, body, used, ..
            } if name.as_str() == "font-face" => {
                *used = declared_font_family(body)
                    .map(|family| usage.families.contains(&family))
                    .unwrap_or(false);
            }
            CssRule::Keyframes { prelude, used, .. } => {
                *used = keyframes_name(prelude)
                    .map(|name| usage.animations.contains(&name))
                    .unwrap_or(false);
            }
            CssRule::Group { rules, .. } => mark_dependents(rules, usage),
            _ => {}
        }
    }
}

fn prune(rules: Vec<CssRule>) -> Vec<CssRule> {
    rules
        .into_iter()
        .filter_map(|rule| match rule {
            CssRule::Style { used: false, .. }
            | CssRule::Descriptors { used: false, .. }
            | CssRule::Keyframes { used: false, .. } => None,
            CssRule::Group {
                name,
                prelude,
                rules,
            } => {
                let rules = prune(rules);
                if rules.is_empty() {
                    None
                } else {
                    Some(CssRule::Group {
                        name,
                        prelude,
                        rules,
                    })
                }
            }
            other => Some(other),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// 结构化序列化
// ---------------------------------------------------------------------------

struct Writer<'r> {
    resolve: &'r mut dyn FnMut(&CssReference) -> String,
}

/// 不含 URL 的组件序列化（选择器、前导部分），空白折叠，注释去除
fn serialize_plain(components: &[Component]) -> String {
    let mut writer = Writer {
        resolve: &mut |reference: &CssReference| reference.url.to_string(),
    };
    writer.value(components, CssRefKind::Image, true)
}

impl Writer<'_> {
    fn url(&mut self, url: &str, kind: CssRefKind, used: bool) -> String {
        let reference = CssReference { url, kind, used };
        format_url(&(self.resolve)(&reference))
    }

    fn value(&mut self, components: &[Component], kind: CssRefKind, used: bool) -> String {
        let mut out = String::new();
        let mut pending_space = false;

        for component in components {
            let text = match component {
                Component::Whitespace | Component::Comment => {
                    pending_space = true;
                    continue;
                }
                Component::Other(raw) if raw.trim().is_empty() || raw.starts_with("/*") => {
                    pending_space = true;
                    continue;
                }
                Component::Url { value, .. } => self.url(value, kind, used),
                Component::Block {
                    kind: block_kind,
                    open,
                    children,
                } => {
                    let inner = self.value(children, kind, used);
                    format!("{open}{inner}{}", block_kind.close())
                }
                other => raw_of(other),
            };

            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push_str(&text);
        }

        out
    }

    fn declarations(&mut self, body: &[BodyItem], kind: CssRefKind, used: bool, indent: &str) -> String {
        let mut parts = Vec::new();
        for item in body {
            match item {
                BodyItem::Declaration(declaration) => {
                    let value = self.value(&declaration.value, kind, used);
                    let important = if declaration.important { " !important" } else { "" };
                    parts.push(format!("{}: {}{};", declaration.name, value, important));
                }
                BodyItem::Rule(rule) => parts.push(self.rule(rule, indent).trim().to_string()),
            }
        }
        parts.join(" ")
    }

    fn rule(&mut self, rule: &CssRule, indent: &str) -> String {
        match rule {
            CssRule::Style {
                selector,
                body,
                used,
            } => {
                let body = self.declarations(body, CssRefKind::Image, *used, indent);
                if body.is_empty() {
                    format!("{indent}{selector} {{ }}")
                } else {
                    format!("{indent}{selector} {{ {body} }}")
                }
            }
            CssRule::Statement { name, prelude } => {
                let prelude = if name == "import" {
                    self.import_prelude(prelude)
                } else {
                    self.value(prelude, CssRefKind::Image, true)
                };
                format!("{indent}@{name} {prelude};")
            }
            CssRule::Group {
                name,
                prelude,
                rules,
            } => {
                let prelude = self.value(prelude, CssRefKind::Image, true);
                let inner_indent = format!("{indent}  ");
                let inner: Vec<String> = rules.iter().map(|r| self.rule(r, &inner_indent)).collect();
                let head = if prelude.is_empty() {
                    format!("@{name}")
                } else {
                    format!("@{name} {prelude}")
                };
                format!("{indent}{head} {{\n{}\n{indent}}}", inner.join("\n"))
            }
            CssRule::Descriptors {
                name,
                prelude,
                body,
                used,
            } => {
                let kind = if name == "font-face" {
                    CssRefKind::FontFace
                } else {
                    CssRefKind::Image
                };
                let prelude = self.value(prelude, CssRefKind::Image, true);
                let body = self.declarations(body, kind, *used, indent);
                let head = if prelude.is_empty() {
                    format!("@{name}")
                } else {
                    format!("@{name} {prelude}")
                };
                format!("{indent}{head} {{ {body} }}")
            }
            CssRule::Keyframes {
                name,
                prelude,
                frames,
                used,
            } => {
                let prelude = self.value(prelude, CssRefKind::Image, true);
                let inner_indent = format!("{indent}  ");
                let inner: Vec<String> = frames
                    .iter()
                    .map(|(selector, body)| {
                        let body = self.declarations(body, CssRefKind::Image, *used, &inner_indent);
                        format!("{inner_indent}{selector} {{ {body} }}")
                    })
                    .collect();
                format!("{indent}@{name} {prelude} {{\n{}\n{indent}}}", inner.join("\n"))
            }
        }
    }

    fn import_prelude(&mut self, prelude: &[Component]) -> String {
        let mut resolved = false;
        let mut parts: Vec<String> = Vec::new();

        for component in prelude {
            match component {
                Component::Url { value, .. } | Component::QuotedString { value, .. } if !resolved => {
                    resolved = true;
                    parts.push(self.url(value, CssRefKind::Import, true));
                }
                other => parts.push(self.value(std::slice::from_ref(other), CssRefKind::Image, true)),
            }
        }

        parts
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn structural_rewrite(
    components: &[Component],
    mode: CssMode,
    document: Option<&dyn DocumentModel>,
    resolve: &mut dyn FnMut(&CssReference) -> String,
) -> String {
    let mut rules = parse_rules(components);

    if let Some(document) = document {
        mark_selectors(&mut rules, document, None);
        let mut usage = Usage::default();
        for rule in &rules {
            collect_rule_usage(rule, &mut usage);
        }
        mark_dependents(&mut rules, &usage);

        if mode == CssMode::Match {
            rules = prune(rules);
        }
    }

    let mut writer = Writer { resolve };
    rules
        .iter()
        .map(|rule| writer.rule(rule, ""))
        .collect::<Vec<_>>()
        .join("\n")
}

/// 重写样式表文本
///
/// `resolve` 对每个资源引用调用一次，返回替换后的 URL。`document` 用于判断规则是否
/// 作用于文档，仅在 tidy 与 match 模式下使用；缺省时所有规则都视为在用。
pub fn rewrite_css(
    css: &str,
    mode: CssMode,
    document: Option<&dyn DocumentModel>,
    resolve: &mut dyn FnMut(&CssReference) -> String,
) -> String {
    match mode {
        CssMode::None => css.to_string(),
        CssMode::RawUrl => {
            let components = tokenize(css);
            let mut out = String::with_capacity(css.len());
            write_raw(&components, &mut RawState::default(), &mut out, resolve);
            out
        }
        CssMode::Tidy | CssMode::Match => {
            let components = strip_raw(tokenize(css));
            structural_rewrite(&components, mode, document, resolve)
        }
    }
}

/// 重写 `style` 属性中的声明列表
pub fn rewrite_style_attribute(
    text: &str,
    mode: CssMode,
    resolve: &mut dyn FnMut(&CssReference) -> String,
) -> String {
    match mode {
        CssMode::None => text.to_string(),
        CssMode::RawUrl => rewrite_css(text, CssMode::RawUrl, None, resolve),
        CssMode::Tidy | CssMode::Match => {
            let components = strip_raw(tokenize(text));
            let body: Vec<BodyItem> = parse_body(&components)
                .into_iter()
                .filter(|item| matches!(item, BodyItem::Declaration(_)))
                .collect();
            let mut writer = Writer { resolve };
            writer.declarations(&body, CssRefKind::Image, true, "")
        }
    }
}

/// 样式表的 `@charset` 规则（若位于开头）
fn charset_rule_label(bytes: &[u8]) -> Option<(&[u8], usize)> {
    const PREFIX: &[u8] = b"@charset \"";
    if !bytes.starts_with(PREFIX) {
        return None;
    }
    let rest = &bytes[PREFIX.len()..bytes.len().min(PREFIX.len() + 64)];
    let end = rest.windows(2).position(|w| w == b"\";")?;
    Some((&rest[..end], PREFIX.len() + end + 2))
}

/// 把样式表字节解码为文本
///
/// 编码依次取自 BOM、开头的 `@charset` 规则、响应声明的字符集、引用它的文档的字符集，
/// 最后退回 UTF-8。
pub fn decode_stylesheet(bytes: &[u8], declared_charset: &str, fallback_charset: &str) -> String {
    if let Some((encoding, bom_length)) = Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_length..]);
        return text.into_owned();
    }

    let from_rule = charset_rule_label(bytes)
        .and_then(|(label, _)| Encoding::for_label(label))
        .map(|encoding| {
            if encoding == UTF_16LE || encoding == UTF_16BE {
                UTF_8
            } else {
                encoding
            }
        });

    let encoding = from_rule
        .or_else(|| Encoding::for_label(declared_charset.trim().as_bytes()))
        .or_else(|| Encoding::for_label(fallback_charset.trim().as_bytes()))
        .unwrap_or(UTF_8);

    let (text, _) = encoding.decode_without_bom_handling(bytes);
    text.into_owned()
}

/// 去掉开头的 `@charset` 规则，返回剩余文本以及是否存在该规则
pub fn strip_charset_rule(css: &str) -> (&str, bool) {
    match charset_rule_label(css.as_bytes()) {
        Some((_, length)) => (css[length..].trim_start_matches(['\r', '\n']), true),
        None => (css, false),
    }
}
