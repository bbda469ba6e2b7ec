//! URL 模型
//!
//! 负责资源定位符的解析、规范化与比较：
//!
//! - 相对/绝对 URL 的解析（`normalize`）
//! - 百分号编码的统一（十六进制大写、非保留字符解码）
//! - 片段（fragment）的拆分与保留
//! - "同一文档"与"同源"判定
//! - data URL 的创建与解析
//! - 哨兵定位符（下载失败、超出大小限制、循环引用）

use std::fmt;

use base64::{prelude::BASE64_STANDARD, Engine};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
pub use url::Url;

use crate::core::{CaptureError, CaptureResult};
use crate::utils::mime::is_plaintext_media_type;

/// 透明的 13x13 PNG，用作被置空图片的占位
pub const EMPTY_IMAGE_DATA_URL: &str = "data:image/png;base64,\
iVBORw0KGgoAAAANSUhEUgAAAA0AAAANCAQAAAD8fJRsAAAAEUlEQVR42mNkwAkYR6UolgIACvgADsuK6xYAAAAASUVORK5CYII=";

/// 指向空白文档的占位
pub const BLANK_URL: &str = "about:blank";

/// 替代"指向文档自身"的 CSS URL
pub const INVALID_URL_PLACEHOLDER: &str = "about:invalid";

pub const ERROR_URL_PREFIX: &str = "urn:webscrap:error:";
pub const OVERSIZED_URL_PREFIX: &str = "urn:webscrap:oversized:";
pub const CIRCULAR_URL_PREFIX: &str = "urn:webscrap:circular:";

/// data URL 文本内容的编码集合
///
/// 保证结果可以安全地放进 HTML 属性以及 CSS 的 `url("...")` 中。
const DATA_URL_TEXT_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'\'')
    .add(b'<')
    .add(b'>')
    .add(b'\\')
    .add(b'`')
    .add(b'(')
    .add(b')');

/// data URL 参数值（如 filename）的编码集合
const DATA_URL_PARAM_SET: &AsciiSet = &DATA_URL_TEXT_SET.add(b';').add(b',').add(b'=');

/// URL 的协议类别
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SchemeClass {
    Http,
    Data,
    Blob,
    About,
    Other,
}

/// 规范化后的绝对 URL
///
/// 同一资源无论以何种百分号编码形式被引用，规范化后都得到相同的值。
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NormalizedUrl(Url);

impl NormalizedUrl {
    pub fn as_url(&self) -> &Url {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn into_url(self) -> Url {
        self.0
    }

    pub fn fragment(&self) -> Option<&str> {
        self.0.fragment()
    }

    pub fn scheme_class(&self) -> SchemeClass {
        scheme_class(&self.0)
    }

    /// 去掉片段后的字符串形式，用作资源身份
    pub fn identity(&self) -> String {
        let mut url = self.0.clone();
        url.set_fragment(None);
        url.to_string()
    }

    pub fn without_fragment(&self) -> NormalizedUrl {
        let mut url = self.0.clone();
        url.set_fragment(None);
        NormalizedUrl(url)
    }
}

impl fmt::Display for NormalizedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// 判断引用是否只指向当前文档（空字符串或纯片段）
///
/// 这类引用不会触发下载，也不会被替换为哨兵定位符。
pub fn points_into_current_document(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty() || trimmed.starts_with('#')
}

/// 以 `base` 为基准解析并规范化 URL
///
/// 对 http(s) 与 file 协议的路径、查询和片段统一百分号编码：十六进制数字转为大写，
/// 非保留字符（字母、数字、`-._~`）被解码。该函数是幂等的。
pub fn normalize(raw: &str, base: &Url) -> CaptureResult<NormalizedUrl> {
    let trimmed = raw.trim_matches(|c: char| c.is_ascii_whitespace());

    let mut url = base
        .join(trimmed)
        .map_err(|e| CaptureError::InvalidUrl(format!("{trimmed}: {e}")))?;

    if matches!(url.scheme(), "http" | "https" | "file") {
        let path = normalize_percent_encoding(url.path());
        url.set_path(&path);

        if let Some(query) = url.query().map(normalize_percent_encoding) {
            url.set_query(Some(&query));
        }

        if let Some(fragment) = url.fragment().map(normalize_percent_encoding) {
            url.set_fragment(Some(&fragment));
        }
    }

    Ok(NormalizedUrl(url))
}

/// 统一百分号编码的写法
pub fn normalize_percent_encoding(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hi = (bytes[i + 1] as char).to_digit(16);
            let lo = (bytes[i + 2] as char).to_digit(16);

            if let (Some(hi), Some(lo)) = (hi, lo) {
                let value = (hi * 16 + lo) as u8;
                if value.is_ascii_alphanumeric() || matches!(value, b'-' | b'.' | b'_' | b'~') {
                    out.push(value);
                } else {
                    out.push(b'%');
                    out.extend(format!("{value:02X}").bytes());
                }
                i += 3;
                continue;
            }
        }

        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8(out).unwrap_or_else(|_| input.to_string())
}

/// 两个 URL 在忽略片段时是否相同
pub fn same_document(a: &Url, b: &Url) -> bool {
    let mut a = a.clone();
    let mut b = b.clone();
    a.set_fragment(None);
    b.set_fragment(None);
    a == b
}

/// 两个 URL 是否同源（不透明源永不同源）
pub fn same_origin(a: &Url, b: &Url) -> bool {
    let (a, b) = (a.origin(), b.origin());
    a.is_tuple() && a == b
}

pub fn scheme_class(url: &Url) -> SchemeClass {
    match url.scheme() {
        "http" | "https" => SchemeClass::Http,
        "data" => SchemeClass::Data,
        "blob" => SchemeClass::Blob,
        "about" => SchemeClass::About,
        _ => SchemeClass::Other,
    }
}

/// 传输层能够获取的 URL（http、https 与本地文件）
pub fn is_fetchable(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https" | "file")
}

/// 拆分出片段部分（包含 `#`）
pub fn split_fragment(url: &str) -> (&str, &str) {
    match url.find('#') {
        Some(pos) => (&url[..pos], &url[pos..]),
        None => (url, ""),
    }
}

/// 在定位符之后附加原始引用的片段
pub fn append_fragment(locator: &str, fragment: Option<&str>) -> String {
    match fragment {
        Some(fragment) => format!("{locator}#{fragment}"),
        None => locator.to_string(),
    }
}

/// 从 URL 推导出期望的文件名（最后一个路径段，尽量解码）
pub fn url_to_filename(url: &Url) -> String {
    let last_segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();

    match percent_decode_str(last_segment).decode_utf8() {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => last_segment.to_string(),
    }
}

/// 创建 data URL
///
/// 文本内容使用百分号编码以保留可读性，二进制内容使用 base64。
/// 文本内容一律声明为 UTF-8。
pub fn create_data_url(media_type: &str, data: &[u8], filename: Option<&str>) -> String {
    let media_type = if media_type.is_empty() {
        "application/octet-stream"
    } else {
        media_type
    };

    let filename_param = filename
        .filter(|f| !f.is_empty())
        .map(|f| format!(";filename={}", utf8_percent_encode(f, DATA_URL_PARAM_SET)))
        .unwrap_or_default();

    if is_plaintext_media_type(media_type) {
        if let Ok(text) = std::str::from_utf8(data) {
            return format!(
                "data:{media_type};charset=utf-8{filename_param},{}",
                utf8_percent_encode(text, DATA_URL_TEXT_SET)
            );
        }
    }

    format!(
        "data:{media_type}{filename_param};base64,{}",
        BASE64_STANDARD.encode(data)
    )
}

/// 解析 data URL，返回 (媒体类型, 字符集, 数据)
pub fn parse_data_url(url: &Url) -> (String, String, Vec<u8>) {
    let path = url.path();
    let (header, body) = match path.find(',') {
        Some(pos) => (&path[..pos], &path[pos + 1..]),
        None => (path, ""),
    };

    let mut media_type = String::new();
    let mut charset = String::new();
    let mut is_base64 = false;

    for (i, part) in header.split(';').enumerate() {
        let part = part.trim();
        if i == 0 {
            media_type = part.to_lowercase();
        } else if part.eq_ignore_ascii_case("base64") {
            is_base64 = true;
        } else if let Some(value) = part.strip_prefix("charset=") {
            charset = value.to_string();
        }
    }

    if media_type.is_empty() {
        media_type = "text/plain".to_string();
    }

    let raw: Vec<u8> = percent_decode_str(body).collect();
    let data = if is_base64 {
        let cleaned: Vec<u8> = raw.into_iter().filter(|b| !b.is_ascii_whitespace()).collect();
        BASE64_STANDARD.decode(cleaned).unwrap_or_default()
    } else {
        raw
    };

    (media_type, charset, data)
}

pub fn error_sentinel(url: &str) -> String {
    if url.starts_with(ERROR_URL_PREFIX) {
        url.to_string()
    } else {
        format!("{ERROR_URL_PREFIX}{url}")
    }
}

pub fn oversized_sentinel(url: &str) -> String {
    format!("{OVERSIZED_URL_PREFIX}{url}")
}

pub fn circular_sentinel(url: &str) -> String {
    format!("{CIRCULAR_URL_PREFIX}{url}")
}

pub fn is_sentinel(value: &str) -> bool {
    value.starts_with(ERROR_URL_PREFIX)
        || value.starts_with(OVERSIZED_URL_PREFIX)
        || value.starts_with(CIRCULAR_URL_PREFIX)
}
