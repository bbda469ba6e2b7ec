use std::fs;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, REFERER, USER_AGENT};
use tracing::debug;
use url::Url;

use crate::core::{CaptureError, CaptureOptions, CaptureResult};
use crate::network::referrer::{compute_referrer, ReferrerPolicy};
use crate::network::transport::{FetchResponse, Transport, TransportError};
use crate::utils::mime::detect_media_type;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// Transport over `reqwest`'s blocking client, plus `file:` URLs read from disk
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(options: &CaptureOptions) -> CaptureResult<HttpTransport> {
        let user_agent = options
            .user_agent
            .as_deref()
            .unwrap_or(DEFAULT_USER_AGENT);

        let mut header_map = HeaderMap::new();
        header_map.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent)
                .map_err(|e| CaptureError::Config(format!("invalid user agent: {e}")))?,
        );

        let mut builder = Client::builder()
            .default_headers(header_map)
            .danger_accept_invalid_certs(options.insecure);

        if options.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(options.timeout_secs));
        }

        let client = builder
            .build()
            .map_err(|e| CaptureError::Config(format!("cannot initialize HTTP client: {e}")))?;

        Ok(HttpTransport { client })
    }

    fn fetch_http(
        &self,
        url: &Url,
        referrer: Option<&Url>,
        policy: ReferrerPolicy,
    ) -> Result<FetchResponse, TransportError> {
        let mut request = self.client.get(url.as_str());

        if let Some(referer) = referrer.and_then(|source| compute_referrer(source, url, policy)) {
            request = request.header(REFERER, referer);
        }

        let response = request.send().map_err(|e| request_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();

        let bytes = response.bytes().map_err(|e| request_error(url, e))?;

        let mut fetched = FetchResponse::new(bytes.to_vec(), &content_type, final_url);
        fetched.headers = headers;
        Ok(fetched)
    }

    fn fetch_file(&self, url: &Url) -> Result<FetchResponse, TransportError> {
        let path = url
            .to_file_path()
            .map_err(|_| TransportError::Request {
                url: url.to_string(),
                message: "not a local path".to_string(),
            })?;

        if path.is_dir() {
            return Err(TransportError::Request {
                url: url.to_string(),
                message: "is a directory".to_string(),
            });
        }

        let bytes = fs::read(&path).map_err(|e| TransportError::Request {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        let media_type = detect_media_type(&bytes, url);

        Ok(FetchResponse::new(bytes, &media_type, url.clone()))
    }
}

fn request_error(url: &Url, error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(url.to_string())
    } else {
        TransportError::Request {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

impl Transport for HttpTransport {
    fn fetch(
        &self,
        url: &Url,
        referrer: Option<&Url>,
        policy: ReferrerPolicy,
    ) -> Result<FetchResponse, TransportError> {
        debug!(url = %url, "fetching");

        match url.scheme() {
            "http" | "https" => self.fetch_http(url, referrer, policy),
            "file" => self.fetch_file(url),
            _ => Err(TransportError::UnsupportedScheme(url.to_string())),
        }
    }
}
