//! # 构建器模块
//!
//! 把一次捕获的结果写成最终的容器：
//!
//! - `bundle` - 多文件形式：目录或 htz 压缩包
//! - `maff` - 带 `index.rdf` 元数据的 MAFF 压缩包
//! - `single_html` - 所有资源都已内联的单个 HTML 文件

pub mod bundle;
pub mod maff;
pub mod single_html;

use std::fs;
use std::path::Path;

use tracing::info;

use crate::core::{CaptureError, CaptureOutput, CaptureResult, ContainerKind};

pub use bundle::{build_zip, bundle_entries, write_folder};
pub use maff::{build_maff, index_rdf};
pub use single_html::build_single_html;

/// 把容器内容生成为一段字节；目录形式没有单一字节表示
pub fn assemble_bytes(output: &CaptureOutput) -> CaptureResult<Vec<u8>> {
    match output.options.container {
        ContainerKind::Folder => Err(CaptureError::UnsupportedContainerOperation(
            "a folder bundle cannot be written as a single stream".to_string(),
        )),
        ContainerKind::Zip => build_zip(output),
        ContainerKind::Maff => build_maff(output),
        ContainerKind::SingleHtml => build_single_html(output),
    }
}

/// 把容器写到 `destination`（目录形式时为目录，否则为文件）
pub fn assemble(output: &CaptureOutput, destination: &Path) -> CaptureResult<()> {
    if output.options.container == ContainerKind::Folder {
        write_folder(output, destination)?;
    } else {
        let bytes = assemble_bytes(output)?;
        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(destination, bytes)?;
    }

    info!(
        "wrote {} files as {:?} to {}",
        output.manifest.files.len(),
        output.options.container,
        destination.display()
    );
    Ok(())
}
