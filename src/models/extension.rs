//! File extensions a base64 upload may declare.

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "ExtensionRepr")]
pub enum FileExtension {
    #[default]
    Bin,
    Jpg,
    Png,
    Pdf,
    Txt,
    Zip,
    Mp3,
    Wav,
    Mp4,
    Avi,
    Mov,
    Mkv,
}

const ALL: [FileExtension; 12] = [
    FileExtension::Bin,
    FileExtension::Jpg,
    FileExtension::Png,
    FileExtension::Pdf,
    FileExtension::Txt,
    FileExtension::Zip,
    FileExtension::Mp3,
    FileExtension::Wav,
    FileExtension::Mp4,
    FileExtension::Avi,
    FileExtension::Mov,
    FileExtension::Mkv,
];

impl FileExtension {
    /// Extension with its leading dot, e.g. `.png`.
    pub fn as_extension(&self) -> &'static str {
        match self {
            Self::Bin => ".bin",
            Self::Jpg => ".jpg",
            Self::Png => ".png",
            Self::Pdf => ".pdf",
            Self::Txt => ".txt",
            Self::Zip => ".zip",
            Self::Mp3 => ".mp3",
            Self::Wav => ".wav",
            Self::Mp4 => ".mp4",
            Self::Avi => ".avi",
            Self::Mov => ".mov",
            Self::Mkv => ".mkv",
        }
    }

    /// Case-insensitive lookup, with or without the leading dot. Unknown
    /// names fall back to `bin`.
    pub fn from_name(name: &str) -> Self {
        let wanted = name.trim().trim_start_matches('.');
        ALL.into_iter()
            .find(|ext| ext.as_extension()[1..].eq_ignore_ascii_case(wanted))
            .unwrap_or_default()
    }

    /// Lookup by declaration order (`0` = bin). Out-of-range falls back to `bin`.
    pub fn from_index(index: u64) -> Self {
        usize::try_from(index)
            .ok()
            .and_then(|i| ALL.get(i).copied())
            .unwrap_or_default()
    }
}

/// Wire forms accepted for an extension: its name or its ordinal.
#[derive(Deserialize)]
#[serde(untagged)]
enum ExtensionRepr {
    Name(String),
    Index(u64),
}

impl From<ExtensionRepr> for FileExtension {
    fn from(repr: ExtensionRepr) -> Self {
        match repr {
            ExtensionRepr::Name(name) => Self::from_name(&name),
            ExtensionRepr::Index(index) => Self::from_index(index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_and_ordinals_both_parse() {
        let ext: FileExtension = serde_json::from_str("\"PNG\"").unwrap();
        assert_eq!(ext, FileExtension::Png);
        let ext: FileExtension = serde_json::from_str("\".mkv\"").unwrap();
        assert_eq!(ext, FileExtension::Mkv);
        let ext: FileExtension = serde_json::from_str("3").unwrap();
        assert_eq!(ext, FileExtension::Pdf);
    }

    #[test]
    fn unknown_values_fall_back_to_bin() {
        let ext: FileExtension = serde_json::from_str("\"exe\"").unwrap();
        assert_eq!(ext, FileExtension::Bin);
        let ext: FileExtension = serde_json::from_str("99").unwrap();
        assert_eq!(ext, FileExtension::Bin);
        assert_eq!(FileExtension::default().as_extension(), ".bin");
    }
}
