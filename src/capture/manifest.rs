//! Manifest of produced files
//!
//! Append-only while capturing, serialized once at the end. Entries keep
//! creation order so two sequential runs over the same input serialize to
//! the same bytes.

use serde::{Deserialize, Serialize};

use crate::core::{CaptureError, CaptureResult, ResourceRole};

pub const MANIFEST_VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<ResourceRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub version: u32,
    pub index_pages: Vec<String>,
    pub files: Vec<ManifestEntry>,
}

impl Default for Manifest {
    fn default() -> Self {
        Manifest::new()
    }
}

impl Manifest {
    pub fn new() -> Manifest {
        Manifest {
            version: MANIFEST_VERSION,
            index_pages: Vec::new(),
            files: Vec::new(),
        }
    }

    /// Appends an entry
    ///
    /// The registry hands out unique paths, so a duplicate here is a logic
    /// error rather than a recoverable condition.
    pub fn append(&mut self, entry: ManifestEntry) -> CaptureResult<()> {
        if self.contains(&entry.path) {
            return Err(CaptureError::Internal(format!(
                "manifest already has an entry for {}",
                entry.path
            )));
        }
        self.files.push(entry);
        Ok(())
    }

    pub fn add_index_page(&mut self, path: &str) {
        if !self.index_pages.iter().any(|page| page == path) {
            self.index_pages.push(path.to_string());
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.iter().any(|entry| entry.path == path)
    }

    pub fn entry(&self, path: &str) -> Option<&ManifestEntry> {
        self.files.iter().find(|entry| entry.path == path)
    }

    /// Fills in the token of an entry whose bytes were produced later
    pub fn set_token(&mut self, path: &str, token: String) {
        if let Some(entry) = self.files.iter_mut().find(|entry| entry.path == path) {
            entry.token = Some(token);
        }
    }

    pub fn to_json(&self) -> CaptureResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| CaptureError::Internal(format!("cannot serialize manifest: {e}")))
    }

    pub fn from_json(json: &str) -> CaptureResult<Manifest> {
        serde_json::from_str(json)
            .map_err(|e| CaptureError::Internal(format!("cannot parse manifest: {e}")))
    }
}
