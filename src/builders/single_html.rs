use crate::core::{CaptureError, CaptureOutput, CaptureResult};

/// 单文件形式只输出根文档，其余资源已内联
pub fn build_single_html(output: &CaptureOutput) -> CaptureResult<Vec<u8>> {
    output
        .files
        .get(&output.index_path)
        .cloned()
        .ok_or_else(|| CaptureError::Internal(format!("no staged bytes for {}", output.index_path)))
}
