//! Content-addressed store and staging area
//!
//! Identical bytes are written once: the store maps content tokens to the
//! path that already holds them. Captured files stay in memory until an
//! assembler packages them.

use std::collections::{BTreeMap, HashMap};

use sha2::{Digest, Sha256};

/// Hex SHA-256 of `bytes`
pub fn content_token(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

#[derive(Debug, Default)]
pub struct ContentStore {
    by_token: HashMap<String, String>,
    files: BTreeMap<String, Vec<u8>>,
}

impl ContentStore {
    /// Path already holding content with this token
    pub fn lookup(&self, token: &str) -> Option<&str> {
        self.by_token.get(token).map(String::as_str)
    }

    pub fn remember(&mut self, token: String, path: String) {
        self.by_token.entry(token).or_insert(path);
    }

    /// Puts file bytes into the staging area
    pub fn stage(&mut self, path: &str, bytes: Vec<u8>) {
        self.files.insert(path.to_string(), bytes);
    }

    pub fn staged(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn into_files(self) -> BTreeMap<String, Vec<u8>> {
        self.files
    }
}
