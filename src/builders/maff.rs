use chrono::NaiveDateTime;

use crate::core::{CaptureOutput, CaptureResult};

use super::bundle::{bundle_entries, write_zip};

pub const INDEX_RDF: &str = "index.rdf";

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// 把会话时间编号（`%Y%m%d%H%M%S%3f`，UTC）转为 RFC 1123 日期
fn archive_time(time_id: &str) -> String {
    time_id
        .get(..14)
        .and_then(|digits| NaiveDateTime::parse_from_str(digits, "%Y%m%d%H%M%S").ok())
        .map(|time| time.format("%a, %d %b %Y %H:%M:%S GMT").to_string())
        .unwrap_or_else(|| time_id.to_string())
}

/// MAFF 的元数据记录
pub fn index_rdf(output: &CaptureOutput) -> String {
    format!(
        r#"<?xml version="1.0"?>
<RDF:RDF xmlns:MAF="http://maf.mozdev.org/metadata/rdf#"
         xmlns:NC="http://home.netscape.com/NC-rdf#"
         xmlns:RDF="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
  <RDF:Description RDF:about="urn:root">
    <MAF:originalurl RDF:resource="{}"/>
    <MAF:title RDF:resource="{}"/>
    <MAF:archivetime RDF:resource="{}"/>
    <MAF:indexfilename RDF:resource="{}"/>
    <MAF:charset RDF:resource="UTF-8"/>
  </RDF:Description>
</RDF:RDF>
"#,
        escape_xml(output.source_url.as_str()),
        escape_xml(output.title.as_deref().unwrap_or_default()),
        escape_xml(&archive_time(&output.time_id)),
        escape_xml(&output.index_path),
    )
}

/// 生成 MAFF 压缩包：所有条目位于以会话时间编号命名的目录下
pub fn build_maff(output: &CaptureOutput) -> CaptureResult<Vec<u8>> {
    let mut entries = bundle_entries(output)?;
    entries.push((INDEX_RDF.to_string(), index_rdf(output).into_bytes()));
    write_zip(entries, &format!("{}/", output.time_id))
}
