//! # 网络模块
//!
//! 资源获取相关的功能：
//!
//! - `transport` - 传输层接口与响应结构
//! - `http` - 基于 reqwest 的 HTTP 与本地文件传输实现
//! - `referrer` - Referer 策略计算

pub mod http;
pub mod referrer;
pub mod transport;

pub use http::HttpTransport;
pub use referrer::{compute_referrer, ReferrerPolicy};
pub use transport::{FetchResponse, Transport, TransportError};
