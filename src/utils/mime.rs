//! 媒体类型与扩展名
//!
//! MIME ↔ 扩展名查询（mime_guess 加一张首选扩展名覆盖表），以及基于文件头签名的类型嗅探。

use url::Url;

/// 首选扩展名覆盖表，第一个为首选扩展名
///
/// 只列出首选扩展名需要固定的类型以及 mime_guess 不认识的别名，
/// 其余类型交给 mime_guess 查询。
const PREFERRED_EXTENSIONS: &[(&str, &[&str])] = &[
    ("text/html", &["html", "htm", "shtml"]),
    ("application/xhtml+xml", &["xhtml", "xht"]),
    ("application/xml", &["xml"]),
    ("text/xml", &["xml"]),
    ("text/css", &["css"]),
    ("text/javascript", &["js", "mjs"]),
    ("application/javascript", &["js", "mjs"]),
    ("application/x-javascript", &["js"]),
    ("application/json", &["json", "map"]),
    ("text/plain", &["txt"]),
    ("image/jpeg", &["jpg", "jpeg"]),
    ("image/svg+xml", &["svg"]),
    ("image/avif", &["avif"]),
    ("image/x-icon", &["ico"]),
    ("image/vnd.microsoft.icon", &["ico"]),
    ("audio/mpeg", &["mp3"]),
    ("audio/mp3", &["mp3"]),
    ("audio/ogg", &["oga", "ogg", "opus"]),
    ("audio/wav", &["wav"]),
    ("audio/x-wav", &["wav"]),
    ("audio/flac", &["flac"]),
    ("audio/x-flac", &["flac"]),
    ("video/mp4", &["mp4"]),
    ("video/mpeg", &["mpeg", "mpg"]),
    ("video/avi", &["avi"]),
    ("font/woff", &["woff"]),
    ("font/woff2", &["woff2"]),
    ("font/ttf", &["ttf"]),
    ("font/otf", &["otf"]),
    ("application/font-woff", &["woff"]),
    ("application/x-font-ttf", &["ttf"]),
];

/// 扩展名必须与声明类型一致的媒体类型
///
/// 浏览器会按扩展名而不是声明类型来解释本地文件，这些类型若扩展名不符会被错误打开。
const STRICT_EXTENSION_TYPES: &[&str] = &[
    "text/html",
    "application/xhtml+xml",
    "text/xml",
    "application/xml",
    "text/css",
    "text/javascript",
    "application/javascript",
    "application/x-javascript",
    "application/ecmascript",
    "text/ecmascript",
    "image/bmp",
    "image/jpeg",
    "image/gif",
    "image/png",
    "image/svg+xml",
    "audio/wav",
    "audio/x-wav",
    "audio/mp3",
    "audio/ogg",
    "audio/mpeg",
    "video/mp4",
    "video/webm",
    "video/ogg",
];

/// 通用类型，不要求文件带扩展名
const UNIVERSAL_TYPES: &[&str] = &["", "application/octet-stream", "application/unknown"];

/// 除 `text/*` 之外已知的纯文本媒体类型
const PLAINTEXT_MEDIA_TYPES: &[&str] = &[
    "application/javascript",
    "application/x-javascript",
    "application/ecmascript",
    "application/json",
    "application/ld+json",
    "application/x-sh",
    "application/xhtml+xml",
    "application/xml",
    "application/rdf+xml",
    "application/vnd.mozilla.xul+xml",
    "image/svg+xml",
];

/// 文件头签名，`.` 可匹配任意字节
const FILE_SIGNATURES: &[(&[u8], &str)] = &[
    // Image
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"\xFF\xD8\xFF", "image/jpeg"),
    (b"\x89PNG\x0D\x0A\x1A\x0A", "image/png"),
    (b"<svg ", "image/svg+xml"),
    (b"RIFF....WEBPVP8", "image/webp"),
    (b"\x00\x00\x01\x00", "image/x-icon"),
    // Audio
    (b"ID3", "audio/mpeg"),
    (b"\xFF\xFB", "audio/mpeg"),
    (b"OggS", "audio/ogg"),
    (b"RIFF....WAVEfmt ", "audio/wav"),
    (b"fLaC", "audio/x-flac"),
    // Video
    (b"RIFF....AVI LIST", "video/avi"),
    (b"....ftyp", "video/mp4"),
    (b"\x00\x00\x01\xBA", "video/mpeg"),
    (b"....moov", "video/quicktime"),
    (b"\x1A\x45\xDF\xA3", "video/webm"),
    // Font
    (b"wOFF", "font/woff"),
    (b"wOF2", "font/woff2"),
    // Document
    (b"%PDF-", "application/pdf"),
];

fn preferred(media_type: &str) -> Option<&'static [&'static str]> {
    PREFERRED_EXTENSIONS
        .iter()
        .find(|(mime, _)| *mime == media_type)
        .map(|(_, extensions)| *extensions)
}

/// 媒体类型的全部已知扩展名，首选扩展名在前
pub fn extensions_for(media_type: &str) -> Vec<&'static str> {
    let media_type = media_type.trim().to_ascii_lowercase();
    if is_universal_media_type(&media_type) {
        return Vec::new();
    }
    let mut extensions: Vec<&'static str> = preferred(&media_type).unwrap_or(&[]).to_vec();
    for &extension in mime_guess::get_mime_extensions_str(&media_type).unwrap_or(&[]) {
        if !extensions.contains(&extension) {
            extensions.push(extension);
        }
    }
    extensions
}

/// 媒体类型的首选扩展名
pub fn extension_for(media_type: &str) -> Option<&'static str> {
    extensions_for(media_type).first().copied()
}

/// 扩展名对应的媒体类型
pub fn media_type_for_extension(extension: &str) -> Option<&'static str> {
    let extension = extension.trim_start_matches('.').to_ascii_lowercase();
    if extension.is_empty() {
        return None;
    }
    PREFERRED_EXTENSIONS
        .iter()
        .find(|(_, extensions)| extensions.contains(&extension.as_str()))
        .map(|(mime, _)| *mime)
        .or_else(|| mime_guess::from_ext(&extension).first_raw())
}

pub fn is_universal_media_type(media_type: &str) -> bool {
    UNIVERSAL_TYPES.contains(&media_type.trim().to_ascii_lowercase().as_str())
}

pub fn requires_matching_extension(media_type: &str) -> bool {
    STRICT_EXTENSION_TYPES.contains(&media_type.trim().to_ascii_lowercase().as_str())
}

/// 检查媒体类型是否为纯文本
pub fn is_plaintext_media_type(media_type: &str) -> bool {
    let media_type = media_type.trim().to_ascii_lowercase();
    media_type.starts_with("text/") || PLAINTEXT_MEDIA_TYPES.contains(&media_type.as_str())
}

pub fn is_html_media_type(media_type: &str) -> bool {
    matches!(
        media_type.trim().to_ascii_lowercase().as_str(),
        "text/html" | "application/xhtml+xml"
    )
}

fn signature_matches(data: &[u8], signature: &[u8]) -> bool {
    data.len() >= signature.len()
        && signature
            .iter()
            .zip(data)
            .all(|(expected, actual)| *expected == b'.' || expected == actual)
}

/// 根据文件内容的签名判断媒体类型，无法识别时退回到按扩展名判断
pub fn detect_media_type(data: &[u8], url: &Url) -> String {
    for (signature, media_type) in FILE_SIGNATURES {
        if signature_matches(data, signature) {
            return media_type.to_string();
        }
    }

    detect_media_type_by_file_name(url.path())
}

/// 根据文件扩展名判断媒体类型
pub fn detect_media_type_by_file_name(filename: &str) -> String {
    filename
        .rsplit_once('.')
        .and_then(|(_, extension)| media_type_for_extension(extension))
        .unwrap_or("application/octet-stream")
        .to_string()
}

/// 解析 Content-Type 值，返回 (媒体类型, 字符集, 是否 base64)
pub fn parse_content_type(content_type: &str) -> (String, String, bool) {
    let mut parts = content_type.split(';');
    let media_type = parts
        .next()
        .map(|part| part.trim().to_lowercase())
        .unwrap_or_default();
    let mut charset = String::new();
    let mut is_base64 = false;

    for part in parts {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            if key.trim().eq_ignore_ascii_case("charset") {
                charset = value.trim().trim_matches('"').to_string();
            }
        } else if part.eq_ignore_ascii_case("base64") {
            is_base64 = true;
        }
    }

    (media_type, charset, is_base64)
}
