//! # webscrap
//!
//! 把网页及其引用的全部资源保存为可离线浏览的归档：
//! 目录、htz 压缩包、MAFF 或单个自包含的 HTML 文件。
//!
//! ## 模块组织
//!
//! - `core` - 选项、错误类型、捕获会话与入口函数
//! - `capture` - 文件名登记、内容去重、清单、资源编排与链接抓取
//! - `parsers` - HTML 文档模型与 CSS 改写
//! - `network` - 传输层与 Referer 策略
//! - `builders` - 各种输出容器
//! - `config` / `env` - 配置文件与环境变量
//! - `utils` - URL 与媒体类型工具

pub mod builders;
pub mod capture;
pub mod config;
pub mod core;
pub mod env;
pub mod network;
pub mod parsers;
pub mod utils;

pub use crate::core::{
    capture, capture_with_session, format_output_path, CaptureError, CaptureOptions,
    CaptureOutput, CaptureResult, CaptureSession, ContainerKind, CssMode, Policy,
    ResourceCategory, ResourceRole,
};
pub use network::{HttpTransport, Transport};
pub use parsers::HtmlParser;
