//! 统一的环境变量管理
//!
//! 每个变量是一个实现了 [`EnvVar`] 的零大小类型，负责名称、默认值和解析。

use std::env;
use std::fmt;

use crate::core::ContainerKind;

/// 环境变量解析错误
#[derive(Debug, Clone)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment variable '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DEFAULT: Option<T>;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    fn get() -> EnvResult<T> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value),
            Err(_) => Self::DEFAULT.ok_or_else(|| EnvError {
                variable: Self::NAME.to_string(),
                message: "Required environment variable not set".to_string(),
            }),
        }
    }

    /// 未设置时返回 `None`，设置了但无法解析时报错
    fn get_optional() -> EnvResult<Option<T>> {
        match env::var(Self::NAME) {
            Ok(value) if !value.trim().is_empty() => Self::parse(&value).map(Some),
            _ => Ok(None),
        }
    }

    fn get_or_default(default: T) -> T {
        Self::get().unwrap_or(default)
    }
}

fn invalid(variable: &str, message: String) -> EnvError {
    EnvError {
        variable: variable.to_string(),
        message,
    }
}

fn parse_bool(value: &str, var_name: &str) -> EnvResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(invalid(
            var_name,
            format!("Invalid boolean '{}'. Use: true/false, 1/0, yes/no, on/off", value),
        )),
    }
}

fn parse_in_range<T>(value: &str, var_name: &str, min: T, max: T) -> EnvResult<T>
where
    T: std::str::FromStr + PartialOrd + fmt::Display + Copy,
{
    let parsed: T = value
        .trim()
        .parse()
        .map_err(|_| invalid(var_name, format!("Invalid number '{}'", value)))?;
    if parsed < min || parsed > max {
        return Err(invalid(
            var_name,
            format!("Value {} out of range [{}, {}]", parsed, min, max),
        ));
    }
    Ok(parsed)
}

/// 日志与输出相关的变量
pub mod core {
    use super::*;

    /// 日志级别
    pub struct LogLevel;
    impl EnvVar<String> for LogLevel {
        const NAME: &'static str = "WEBSCRAP_LOG_LEVEL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Log level: trace, debug, info, warn, error";

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("info".to_string()),
            }
        }

        fn parse(value: &str) -> EnvResult<String> {
            match value.trim().to_lowercase().as_str() {
                level @ ("trace" | "debug" | "info" | "warn" | "error") => Ok(level.to_string()),
                _ => Err(invalid(
                    Self::NAME,
                    format!("Invalid log level '{}'. Use: trace, debug, info, warn, error", value),
                )),
            }
        }
    }

    /// 关闭彩色输出
    pub struct NoColor;
    impl EnvVar<bool> for NoColor {
        const NAME: &'static str = "NO_COLOR";
        const DEFAULT: Option<bool> = Some(false);
        const DESCRIPTION: &'static str = "Disable colored output when set to any value";

        fn parse(value: &str) -> EnvResult<bool> {
            // 任何非空值都表示禁用颜色
            Ok(!value.is_empty())
        }
    }
}

/// 覆盖捕获选项的变量
pub mod capture {
    use super::*;

    /// 配置文件路径
    pub struct ConfigPath;
    impl EnvVar<String> for ConfigPath {
        const NAME: &'static str = "WEBSCRAP_CONFIG";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Path of the TOML options file";

        fn parse(value: &str) -> EnvResult<String> {
            Ok(value.trim().to_string())
        }
    }

    pub struct UserAgent;
    impl EnvVar<String> for UserAgent {
        const NAME: &'static str = "WEBSCRAP_USER_AGENT";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "User-Agent header sent with every request";

        fn parse(value: &str) -> EnvResult<String> {
            Ok(value.to_string())
        }
    }

    /// 单次请求超时（秒）
    pub struct Timeout;
    impl EnvVar<u64> for Timeout {
        const NAME: &'static str = "WEBSCRAP_TIMEOUT";
        const DEFAULT: Option<u64> = Some(60);
        const DESCRIPTION: &'static str = "Request timeout in seconds (0 disables it)";

        fn parse(value: &str) -> EnvResult<u64> {
            parse_in_range(value, Self::NAME, 0, 3600)
        }
    }

    /// 链接抓取深度
    pub struct MaxDepth;
    impl EnvVar<u32> for MaxDepth {
        const NAME: &'static str = "WEBSCRAP_MAX_DEPTH";
        const DEFAULT: Option<u32> = None;
        const DESCRIPTION: &'static str = "Maximum depth of followed links (0 captures the page only)";

        fn parse(value: &str) -> EnvResult<u32> {
            parse_in_range(value, Self::NAME, 0, 100)
        }
    }

    /// 输出容器
    pub struct Container;
    impl EnvVar<ContainerKind> for Container {
        const NAME: &'static str = "WEBSCRAP_CONTAINER";
        const DEFAULT: Option<ContainerKind> = None;
        const DESCRIPTION: &'static str = "Output container: folder, zip, maff, single-html";

        fn parse(value: &str) -> EnvResult<ContainerKind> {
            match value.trim().to_lowercase().as_str() {
                "folder" | "dir" => Ok(ContainerKind::Folder),
                "zip" | "htz" => Ok(ContainerKind::Zip),
                "maff" => Ok(ContainerKind::Maff),
                "single-html" | "singlehtml" | "html" => Ok(ContainerKind::SingleHtml),
                _ => Err(invalid(
                    Self::NAME,
                    format!("Invalid container '{}'. Use: folder, zip, maff, single-html", value),
                )),
            }
        }
    }

    /// 顺序抓取
    pub struct Sequential;
    impl EnvVar<bool> for Sequential {
        const NAME: &'static str = "WEBSCRAP_SEQUENTIAL";
        const DEFAULT: Option<bool> = Some(false);
        const DESCRIPTION: &'static str = "Fetch resources one at a time in discovery order";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }
}

/// 从环境变量读取的全部设置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvConfig {
    pub log_level: String,
    pub no_color: bool,
    pub config_path: Option<String>,
    pub user_agent: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_depth: Option<u32>,
    pub container: Option<ContainerKind>,
    pub sequential: Option<bool>,
}

impl EnvConfig {
    pub fn from_env() -> EnvResult<Self> {
        Ok(Self {
            log_level: core::LogLevel::get()?,
            no_color: core::NoColor::get()?,
            config_path: capture::ConfigPath::get_optional()?,
            user_agent: capture::UserAgent::get_optional()?,
            timeout_secs: capture::Timeout::get_optional()?,
            max_depth: capture::MaxDepth::get_optional()?,
            container: capture::Container::get_optional()?,
            sequential: capture::Sequential::get_optional()?,
        })
    }
}

/// 生成环境变量说明，附在命令行帮助末尾
pub fn generate_env_docs() -> String {
    let mut docs = String::new();
    docs.push_str("Environment variables:\n");

    let entries: [(&str, &str); 8] = [
        (core::LogLevel::NAME, core::LogLevel::DESCRIPTION),
        (core::NoColor::NAME, core::NoColor::DESCRIPTION),
        (capture::ConfigPath::NAME, capture::ConfigPath::DESCRIPTION),
        (capture::UserAgent::NAME, capture::UserAgent::DESCRIPTION),
        (capture::Timeout::NAME, capture::Timeout::DESCRIPTION),
        (capture::MaxDepth::NAME, capture::MaxDepth::DESCRIPTION),
        (capture::Container::NAME, capture::Container::DESCRIPTION),
        (capture::Sequential::NAME, capture::Sequential::DESCRIPTION),
    ];
    for (name, description) in entries {
        docs.push_str(&format!("  {:<22} {}\n", name, description));
    }

    docs
}
