//! 多文件容器
//!
//! 文件按清单顺序写出。根文档为 `index.xhtml` 时额外写一个跳转用的
//! `index.html`；开启 `save_manifest` 时附带 `manifest.json`。

use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::capture::crawl::{redirect_page, INDEX_HTML, INDEX_XHTML};
use crate::core::{CaptureError, CaptureOutput, CaptureResult};

pub const MANIFEST_FILENAME: &str = "manifest.json";

/// 容器中的全部条目（相对路径，内容）
pub fn bundle_entries(output: &CaptureOutput) -> CaptureResult<Vec<(String, Vec<u8>)>> {
    let mut entries = Vec::with_capacity(output.manifest.files.len() + 2);

    for entry in &output.manifest.files {
        let bytes = output.files.get(&entry.path).ok_or_else(|| {
            CaptureError::Internal(format!("no staged bytes for {}", entry.path))
        })?;
        entries.push((entry.path.clone(), bytes.clone()));
    }

    if output.index_path == INDEX_XHTML && !output.files.contains_key(INDEX_HTML) {
        entries.push((INDEX_HTML.to_string(), redirect_page(INDEX_XHTML)));
    }

    if output.options.save_manifest {
        entries.push((MANIFEST_FILENAME.to_string(), output.manifest.to_json()?.into_bytes()));
    }

    Ok(entries)
}

/// 写成一个目录
pub fn write_folder(output: &CaptureOutput, directory: &Path) -> CaptureResult<()> {
    fs::create_dir_all(directory)?;
    for (path, bytes) in bundle_entries(output)? {
        let target = directory.join(&path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(target, bytes)?;
    }
    Ok(())
}

fn zip_error(error: zip::result::ZipError) -> CaptureError {
    CaptureError::Archive(error.to_string())
}

/// 把条目写入 zip，每个条目名加上 `prefix`
pub(crate) fn write_zip(entries: Vec<(String, Vec<u8>)>, prefix: &str) -> CaptureResult<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    // 固定时间戳，相同输入得到相同的压缩包
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());

    for (path, bytes) in entries {
        writer
            .start_file(format!("{prefix}{path}"), options)
            .map_err(zip_error)?;
        writer.write_all(&bytes)?;
    }

    Ok(writer.finish().map_err(zip_error)?.into_inner())
}

/// 生成 htz 压缩包
pub fn build_zip(output: &CaptureOutput) -> CaptureResult<Vec<u8>> {
    write_zip(bundle_entries(output)?, "")
}
