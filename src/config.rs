//! 捕获选项的配置文件
//!
//! 选项文件为 TOML，字段与 [`CaptureOptions`] 一一对应，缺省字段取默认值。
//! 加载顺序：显式路径（或 `WEBSCRAP_CONFIG`），否则 `CONFIG_PATHS` 中第一个存在的文件，
//! 最后应用环境变量覆盖。

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::core::{CaptureError, CaptureOptions, CaptureResult};
use crate::env::{capture, EnvConfig, EnvVar};

pub const CONFIG_PATHS: &[&str] = &[
    "webscrap.toml",
    ".webscrap.toml",
    "~/.config/webscrap/config.toml",
    "/etc/webscrap/config.toml",
];

/// 解析 TOML 文本
pub fn parse_options(content: &str) -> CaptureResult<CaptureOptions> {
    toml::from_str(content).map_err(|e| CaptureError::Config(format!("invalid options file: {e}")))
}

/// 读取一个选项文件，路径中的 `~` 会被展开
pub fn read_options_file(path: &str) -> CaptureResult<CaptureOptions> {
    let expanded_path = shellexpand::tilde(path);
    let content = fs::read_to_string(expanded_path.as_ref())
        .map_err(|e| CaptureError::Config(format!("cannot read {expanded_path}: {e}")))?;
    debug!("loaded options from {}", expanded_path);
    parse_options(&content)
}

fn find_config_file() -> Option<String> {
    CONFIG_PATHS.iter().find_map(|path| {
        let expanded_path = shellexpand::tilde(path);
        Path::new(expanded_path.as_ref())
            .is_file()
            .then(|| expanded_path.to_string())
    })
}

/// 用环境变量覆盖选项
pub fn apply_env_overrides(options: &mut CaptureOptions, env: &EnvConfig) {
    if let Some(user_agent) = &env.user_agent {
        options.user_agent = Some(user_agent.clone());
    }
    if let Some(timeout_secs) = env.timeout_secs {
        options.timeout_secs = timeout_secs;
    }
    if let Some(max_depth) = env.max_depth {
        options.max_depth = Some(max_depth);
    }
    if let Some(container) = env.container {
        options.container = container;
    }
    if let Some(sequential) = env.sequential {
        options.sequential = sequential;
    }
}

/// 加载捕获选项
///
/// `path` 为空时依次尝试 `WEBSCRAP_CONFIG` 与 `CONFIG_PATHS`；都不存在时使用默认值。
pub fn load_options(path: Option<&str>) -> CaptureResult<CaptureOptions> {
    let env = EnvConfig::from_env().map_err(|e| CaptureError::Config(e.to_string()))?;

    let explicit = path.map(str::to_string).or_else(|| env.config_path.clone());
    let mut options = match explicit.or_else(find_config_file) {
        Some(path) => {
            info!("using options file {}", path);
            read_options_file(&path)?
        }
        None => CaptureOptions::default(),
    };

    apply_env_overrides(&mut options, &env);
    Ok(options)
}

/// 配置文件是否存在（显式指定的或默认位置之一）
pub fn config_file_exists() -> bool {
    matches!(capture::ConfigPath::get_optional(), Ok(Some(_))) || find_config_file().is_some()
}
