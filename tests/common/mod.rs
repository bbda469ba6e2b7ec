//! 集成测试的公共工具
//!
//! `MockTransport` 按 URL 返回预先登记的响应，并记录每个地址被请求的次数。

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::sync::Mutex;

use url::Url;

use webscrap::capture::manifest::ManifestEntry;
use webscrap::network::{FetchResponse, ReferrerPolicy, Transport, TransportError};
use webscrap::{
    capture_with_session, CaptureOptions, CaptureOutput, CaptureResult, CaptureSession,
    HtmlParser,
};

pub const BASE: &str = "https://example.com/";

/// 固定的会话时间标识
pub const TIME_ID: &str = "20240102030405006";

/// 最小的合法 PNG 头
pub const PNG: &[u8] = b"\x89PNG\x0D\x0A\x1A\x0A\x00\x00\x00\x0DIHDR";

enum Route {
    Ok {
        bytes: Vec<u8>,
        content_type: String,
        final_url: Option<String>,
        headers: Vec<(String, String)>,
    },
    Status(u16),
}

#[derive(Default)]
pub struct MockTransport {
    routes: HashMap<String, Route>,
    requests: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn new() -> MockTransport {
        MockTransport::default()
    }

    pub fn page(self, path: &str, html: &str) -> MockTransport {
        self.serve(path, html.as_bytes(), "text/html; charset=utf-8")
    }

    pub fn css(self, path: &str, css: &str) -> MockTransport {
        self.serve(path, css.as_bytes(), "text/css")
    }

    pub fn png(self, path: &str) -> MockTransport {
        self.serve(path, PNG, "image/png")
    }

    pub fn serve(mut self, path: &str, bytes: &[u8], content_type: &str) -> MockTransport {
        self.routes.insert(
            absolute(path),
            Route::Ok {
                bytes: bytes.to_vec(),
                content_type: content_type.to_string(),
                final_url: None,
                headers: Vec::new(),
            },
        );
        self
    }

    /// 请求 `from` 时返回 `to` 的内容，最终地址为 `to`
    pub fn redirect(mut self, from: &str, to: &str) -> MockTransport {
        let target = absolute(to);
        let route = match self.routes.get(&target) {
            Some(Route::Ok {
                bytes,
                content_type,
                headers,
                ..
            }) => Route::Ok {
                bytes: bytes.clone(),
                content_type: content_type.clone(),
                final_url: Some(target),
                headers: headers.clone(),
            },
            _ => Route::Status(404),
        };
        self.routes.insert(absolute(from), route);
        self
    }

    pub fn header(mut self, path: &str, name: &str, value: &str) -> MockTransport {
        if let Some(Route::Ok { headers, .. }) = self.routes.get_mut(&absolute(path)) {
            headers.push((name.to_string(), value.to_string()));
        }
        self
    }

    pub fn fail(mut self, path: &str, status: u16) -> MockTransport {
        self.routes.insert(absolute(path), Route::Status(status));
        self
    }

    /// `path` 被请求的次数
    pub fn requests_for(&self, path: &str) -> usize {
        let target = absolute(path);
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|url| **url == target)
            .count()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Transport for MockTransport {
    fn fetch(
        &self,
        url: &Url,
        _referrer: Option<&Url>,
        _policy: ReferrerPolicy,
    ) -> Result<FetchResponse, TransportError> {
        self.requests.lock().unwrap().push(url.to_string());

        match self.routes.get(url.as_str()) {
            Some(Route::Ok {
                bytes,
                content_type,
                final_url,
                headers,
            }) => {
                let final_url = match final_url {
                    Some(final_url) => Url::parse(final_url).unwrap(),
                    None => url.clone(),
                };
                let mut response = FetchResponse::new(bytes.clone(), content_type, final_url);
                for (name, value) in headers {
                    response = response.with_header(name, value);
                }
                Ok(response)
            }
            Some(Route::Status(status)) => Err(TransportError::Status {
                url: url.to_string(),
                status: *status,
            }),
            None => Err(TransportError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

pub fn absolute(path: &str) -> String {
    Url::parse(BASE).unwrap().join(path).unwrap().to_string()
}

pub fn root() -> Url {
    Url::parse(&absolute("index.html")).unwrap()
}

/// 顺序模式、固定时间标识的选项
pub fn options() -> CaptureOptions {
    CaptureOptions {
        sequential: true,
        ..CaptureOptions::default()
    }
}

pub fn run(transport: &MockTransport, options: CaptureOptions) -> CaptureResult<CaptureOutput> {
    let session = CaptureSession::with_time_id(options, TIME_ID)?;
    capture_with_session(session, &root(), transport, &HtmlParser::new())
}

pub fn text(output: &CaptureOutput, path: &str) -> String {
    let bytes = output
        .files
        .get(path)
        .unwrap_or_else(|| panic!("{path} missing from {:?}", output.files.keys()));
    String::from_utf8(bytes.clone()).unwrap()
}

pub fn index(output: &CaptureOutput) -> String {
    text(output, &output.index_path)
}

/// 来源为 `path` 的清单条目
pub fn entry_for<'a>(output: &'a CaptureOutput, path: &str) -> &'a ManifestEntry {
    let url = absolute(path);
    output
        .manifest
        .files
        .iter()
        .find(|entry| entry.url.as_deref() == Some(url.as_str()))
        .unwrap_or_else(|| panic!("no manifest entry for {url}"))
}

/// 解压 zip，返回 (条目名, 内容)
pub fn unzip(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut entries = Vec::new();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).unwrap();
        let mut content = Vec::new();
        file.read_to_end(&mut content).unwrap();
        entries.push((file.name().to_string(), content));
    }
    entries
}
