//! # 工具模块
//!
//! - `url` - 地址规范化、data URL 与各类占位地址
//! - `mime` - 媒体类型与扩展名的对应关系

pub mod mime;
pub mod url;

pub use url::{create_data_url, normalize, parse_data_url, NormalizedUrl, SchemeClass, EMPTY_IMAGE_DATA_URL};
