//! 传输层接口
//!
//! 核心只依赖 `Transport` 特性：给定 URL 与来源文档，返回字节、声明的媒体类型、
//! 重定向后的最终地址和响应头，或者一个失败信号。

use percent_encoding::percent_decode_str;
use thiserror::Error;
use url::Url;

use crate::network::referrer::ReferrerPolicy;
use crate::utils::mime::parse_content_type;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("{url} responded with HTTP status {status}")]
    Status { url: String, status: u16 },

    #[error("timed out fetching {0}")]
    Timeout(String),

    #[error("unsupported scheme for {0}")]
    UnsupportedScheme(String),

    #[error("cannot fetch {url}: {message}")]
    Request { url: String, message: String },
}

/// 一次成功获取的结果
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchResponse {
    pub bytes: Vec<u8>,
    /// 声明的媒体类型（小写，不含参数），未声明时为空
    pub media_type: String,
    /// 声明的字符集，未声明时为空
    pub charset: String,
    /// 重定向之后的地址
    pub final_url: Url,
    pub headers: Vec<(String, String)>,
}

impl FetchResponse {
    pub fn new(bytes: Vec<u8>, content_type: &str, final_url: Url) -> FetchResponse {
        let (media_type, charset, _) = parse_content_type(content_type);
        FetchResponse {
            bytes,
            media_type,
            charset,
            final_url,
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> FetchResponse {
        self.headers.push((name.to_ascii_lowercase(), value.to_string()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Content-Disposition 中声明的文件名
    pub fn filename(&self) -> Option<String> {
        self.header("content-disposition")
            .and_then(parse_content_disposition)
    }
}

/// 获取资源字节的能力
pub trait Transport: Send + Sync {
    /// `referrer` 为发起请求的文档地址，实际发送的 Referer 由 `policy` 决定
    fn fetch(
        &self,
        url: &Url,
        referrer: Option<&Url>,
        policy: ReferrerPolicy,
    ) -> Result<FetchResponse, TransportError>;
}

/// 从 Content-Disposition 头中提取文件名，`filename*` 优先
pub fn parse_content_disposition(value: &str) -> Option<String> {
    let mut plain: Option<String> = None;
    let mut extended: Option<String> = None;

    for part in value.split(';').skip(1) {
        let Some((key, raw)) = part.split_once('=') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let raw = raw.trim();

        if key == "filename*" {
            // charset'language'percent-encoded-value
            let encoded = raw.splitn(3, '\'').nth(2).unwrap_or(raw);
            if let Ok(decoded) = percent_decode_str(encoded).decode_utf8() {
                extended = Some(decoded.into_owned());
            }
        } else if key == "filename" {
            plain = Some(raw.trim_matches('"').to_string());
        }
    }

    extended.or(plain).filter(|name| !name.is_empty())
}
