//! Filename registry
//!
//! Maps the desired name of every captured file to a unique, filesystem-safe
//! path. This is the only place where name collisions are resolved.

use std::collections::HashSet;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use tracing::debug;

use crate::core::CaptureError;
use crate::utils::mime::{extensions_for, is_universal_media_type, requires_matching_extension};

/// Names every archive keeps for its own metadata
pub const RESERVED_FILENAMES: &[&str] = &["index.dat", "index.rdf", "manifest.json", "^metadata^"];

/// Device names Windows refuses as file names, whatever the extension
const DEVICE_NAMES: &[&str] = &[
    "con", "prn", "aux", "nul", "com1", "com2", "com3", "com4", "com5", "com6", "com7", "com8",
    "com9", "lpt1", "lpt2", "lpt3", "lpt4", "lpt5", "lpt6", "lpt7", "lpt8", "lpt9",
];

const DEVICE_NAME_SUFFIX: &str = "_";

const MAX_BASE_CHARS: usize = 128;
const MAX_BASE_BYTES: usize = 240;

/// Characters escaped when a stored path is used as a relative URL
const LOCATOR_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'\'')
    .add(b'(')
    .add(b')')
    .add(b',')
    .add(b'?')
    .add(b'[')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Makes `name` safe to use as a file name on common filesystems
///
/// Control characters are dropped, characters illegal on Windows are replaced,
/// a leading dot is escaped and trailing dots and spaces are trimmed. With
/// `ascii_only`, non-ASCII characters are percent-encoded.
pub fn sanitize_filename(name: &str, ascii_only: bool) -> String {
    let mut sanitized: String = name.chars().filter(|c| !c.is_control()).collect();

    sanitized = sanitized.trim_start_matches(' ').to_string();
    if sanitized.starts_with('.') {
        sanitized.insert(0, '_');
    }
    sanitized = sanitized.trim_end_matches(['.', ' ']).to_string();

    sanitized = sanitized
        .chars()
        .map(|c| match c {
            ':' | '"' | '?' | '*' | '\\' | '/' | '|' => '_',
            '~' => '-',
            '<' => '(',
            '>' => ')',
            c => c,
        })
        .collect();

    if ascii_only {
        sanitized = utf8_percent_encode(&sanitized, CONTROLS).to_string();
    }

    if sanitized.is_empty() {
        sanitized.push('_');
    }

    escape_device_name(sanitized)
}

fn escape_device_name(name: String) -> String {
    let stem_len = name.find('.').unwrap_or(name.len());
    let stem = name[..stem_len].to_ascii_lowercase();

    if DEVICE_NAMES.contains(&stem.as_str()) {
        format!("{}{}{}", &name[..stem_len], DEVICE_NAME_SUFFIX, &name[stem_len..])
    } else {
        name
    }
}

/// Splits a file name into base and extension (without the dot)
pub fn split_filename(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(pos) if pos > 0 => (&name[..pos], &name[pos + 1..]),
        _ => (name, ""),
    }
}

fn crop(base: &str) -> String {
    let mut cropped = String::new();
    for c in base.chars().take(MAX_BASE_CHARS) {
        if cropped.len() + c.len_utf8() > MAX_BASE_BYTES {
            break;
        }
        cropped.push(c);
    }
    cropped
}

/// Relative URL under which a stored path is addressed from sibling files
pub fn path_to_locator(path: &str) -> String {
    utf8_percent_encode(path, LOCATOR_SET).to_string()
}

#[derive(Debug, Default)]
pub struct FilenameRegistry {
    ascii_only: bool,
    used: HashSet<String>,
}

impl FilenameRegistry {
    pub fn new(ascii_only: bool) -> FilenameRegistry {
        FilenameRegistry {
            ascii_only,
            used: RESERVED_FILENAMES.iter().map(|name| name.to_string()).collect(),
        }
    }

    /// Whether `name` (compared case-insensitively) is taken
    pub fn is_reserved(&self, name: &str) -> bool {
        self.used.contains(&name.to_lowercase())
    }

    /// Claims an exact name, returns false when it is already taken
    pub fn reserve_exact(&mut self, name: &str) -> bool {
        self.used.insert(name.to_lowercase())
    }

    /// Gives back a reserved name that ended up unused
    pub fn release(&mut self, name: &str) {
        self.used.remove(&name.to_lowercase());
    }

    /// Reserves a unique path for a file
    ///
    /// `extension_hint` is used when the file has no extension and no media
    /// type is known. A declared media type never renames an extension:
    /// a missing or mismatching one gets a corrective extension appended.
    pub fn reserve(
        &mut self,
        desired_name: &str,
        extension_hint: Option<&str>,
        media_type: Option<&str>,
    ) -> String {
        let sanitized = sanitize_filename(desired_name, self.ascii_only);
        let (base, extension) = split_filename(&sanitized);
        let (mut base, mut extension) = (base.to_string(), extension.to_string());

        if let Some(corrective) = corrective_extension(&extension, extension_hint, media_type) {
            if !extension.is_empty() {
                base = format!("{base}.{extension}");
            }
            extension = corrective;
        }

        let base = crop(&base);
        let extension = if extension.is_empty() {
            String::new()
        } else {
            format!(".{extension}")
        };

        let mut name = format!("{base}{extension}");
        let mut count = 0;
        while self.used.contains(&name.to_lowercase()) {
            count += 1;
            name = format!("{base}-{count}{extension}");
        }

        if count > 0 {
            let collision = CaptureError::FilenameCollision(format!("{base}{extension}"));
            debug!(%collision, assigned = %name, "renamed");
        }

        self.used.insert(name.to_lowercase());
        name
    }
}

fn corrective_extension(
    extension: &str,
    extension_hint: Option<&str>,
    media_type: Option<&str>,
) -> Option<String> {
    let hint = extension_hint.map(|hint| hint.trim_start_matches('.').to_string());

    match media_type.filter(|media_type| !media_type.trim().is_empty()) {
        Some(media_type) if is_universal_media_type(media_type) => None,
        Some(media_type) => {
            let known = extensions_for(media_type);
            let preferred = known.first().map(|ext| ext.to_string());

            if extension.is_empty() {
                preferred.or(hint)
            } else if requires_matching_extension(media_type)
                && !known.contains(&extension.to_ascii_lowercase().as_str())
            {
                preferred
            } else {
                None
            }
        }
        None if extension.is_empty() => hint,
        None => None,
    }
}
