//! Storage keys for uploaded objects.

use std::{fmt, path::Path};
use uuid::Uuid;

/// Key under which an upload is stored: `<destination path>/<uuid><ext>`,
/// lower-cased, `/`-separated, percent-escapes decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Build a fresh key. Caller-supplied file names never survive; only
    /// their extension does.
    pub fn generate(destination_path: &str, extension: &str) -> Self {
        Self::with_id(destination_path, Uuid::new_v4(), extension)
    }

    fn with_id(destination_path: &str, id: Uuid, extension: &str) -> Self {
        let extension = extension.trim();
        let file_name = match extension {
            "" => id.to_string(),
            ext if ext.starts_with('.') => format!("{id}{ext}"),
            ext => format!("{id}.{ext}"),
        };

        let path = destination_path.replace('\\', "/");
        let path = path.trim_matches('/');
        let combined = if path.is_empty() {
            file_name
        } else {
            format!("{path}/{file_name}")
        };

        let decoded = urlencoding::decode(&combined)
            .map(|cow| cow.into_owned())
            .unwrap_or(combined);
        Self(decoded.to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extension of `file_name` with its leading dot, or empty.
pub fn extension_of(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default()
}

/// Decode a percent-escaped key as received from a client.
///
/// Falls back to the raw input when the escapes do not form valid UTF-8.
pub fn decode_key(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|cow| cow.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed() -> Uuid {
        Uuid::parse_str("6F9619FF-8B86-D011-B42D-00CF4FC964FF").unwrap()
    }

    #[test]
    fn path_is_lowercased_and_slash_normalized() {
        let key = ObjectKey::with_id("A/B", fixed(), ".PNG");
        assert_eq!(key.as_str(), "a/b/6f9619ff-8b86-d011-b42d-00cf4fc964ff.png");

        let key = ObjectKey::with_id("Docs\\2025\\", fixed(), ".pdf");
        assert!(key.as_str().starts_with("docs/2025/6f9619ff"));
    }

    #[test]
    fn empty_path_yields_bare_file_name() {
        let key = ObjectKey::with_id("", fixed(), "txt");
        assert_eq!(key.as_str(), "6f9619ff-8b86-d011-b42d-00cf4fc964ff.txt");

        let key = ObjectKey::with_id("/", fixed(), "");
        assert_eq!(key.as_str(), "6f9619ff-8b86-d011-b42d-00cf4fc964ff");
    }

    #[test]
    fn escapes_are_decoded() {
        let key = ObjectKey::with_id("my%20folder", fixed(), ".bin");
        assert!(key.as_str().starts_with("my folder/"));
    }

    #[test]
    fn escaped_uppercase_is_lowercased_after_decoding() {
        let key = ObjectKey::with_id("Dir%41", fixed(), ".%41BC");
        assert_eq!(key.as_str(), "dira/6f9619ff-8b86-d011-b42d-00cf4fc964ff.abc");
    }

    #[test]
    fn generated_keys_are_unique() {
        let a = ObjectKey::generate("x", ".bin");
        let b = ObjectKey::generate("x", ".bin");
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("x/"));
        assert!(a.as_str().ends_with(".bin"));
    }

    #[test]
    fn extension_comes_from_original_name() {
        assert_eq!(extension_of("Holiday Photo.JPG"), ".JPG");
        assert_eq!(extension_of("archive.tar.gz"), ".gz");
        assert_eq!(extension_of("README"), "");
    }

    #[test]
    fn decode_key_tolerates_bad_escapes() {
        assert_eq!(decode_key("a%2Fb.png"), "a/b.png");
        assert_eq!(decode_key("bad%FFkey"), "bad%FFkey");
    }
}
