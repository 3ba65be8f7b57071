//! File formats understood by the conversion service.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A source or target format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Csv,
    Json,
    Xml,
    Txt,
}

impl FileFormat {
    /// All formats, in the order they are offered to users.
    pub const ALL: [FileFormat; 4] = [
        FileFormat::Csv,
        FileFormat::Json,
        FileFormat::Xml,
        FileFormat::Txt,
    ];

    /// Wire name sent as `sourceFormat` / `targetFormat`.
    pub fn as_str(&self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Json => "json",
            FileFormat::Xml => "xml",
            FileFormat::Txt => "txt",
        }
    }

    /// Map a file extension (without the dot, any case) to a format.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(FileFormat::Csv),
            "json" => Some(FileFormat::Json),
            "xml" => Some(FileFormat::Xml),
            "txt" => Some(FileFormat::Txt),
            _ => None,
        }
    }

    /// Detect the format from a file name's extension.
    pub fn detect(file_name: &str) -> Option<Self> {
        let (_, ext) = file_name.rsplit_once('.')?;
        Self::from_extension(ext)
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileFormat {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s.trim()).ok_or_else(|| ValidationError::UnknownFormat(s.to_string()))
    }
}

/// Pick the source format for an upload.
///
/// A manual selection always wins; otherwise the extension decides.
pub fn resolve_source_format(
    file_name: &str,
    manual: Option<FileFormat>,
) -> Result<FileFormat, ValidationError> {
    if let Some(format) = manual {
        return Ok(format);
    }
    FileFormat::detect(file_name).ok_or_else(|| ValidationError::UnrecognizedExtension {
        file_name: file_name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_known_extensions() {
        assert_eq!(FileFormat::detect("people.csv"), Some(FileFormat::Csv));
        assert_eq!(FileFormat::detect("people.json"), Some(FileFormat::Json));
        assert_eq!(FileFormat::detect("feed.xml"), Some(FileFormat::Xml));
        assert_eq!(FileFormat::detect("notes.txt"), Some(FileFormat::Txt));
    }

    #[test]
    fn test_detect_is_case_insensitive() {
        assert_eq!(FileFormat::detect("data.JSON"), Some(FileFormat::Json));
        assert_eq!(FileFormat::detect("Report.Csv"), Some(FileFormat::Csv));
    }

    #[test]
    fn test_detect_uses_last_extension() {
        assert_eq!(FileFormat::detect("archive.csv.xml"), Some(FileFormat::Xml));
        assert_eq!(FileFormat::detect("export.json.bak"), None);
    }

    #[test]
    fn test_detect_without_extension() {
        assert_eq!(FileFormat::detect("README"), None);
        assert_eq!(FileFormat::detect("data."), None);
    }

    #[test]
    fn test_resolve_prefers_manual_selection() {
        let format = resolve_source_format("table.dat", Some(FileFormat::Csv)).unwrap();
        assert_eq!(format, FileFormat::Csv);

        let format = resolve_source_format("data.json", Some(FileFormat::Txt)).unwrap();
        assert_eq!(format, FileFormat::Txt);
    }

    #[test]
    fn test_resolve_auto_detects() {
        assert_eq!(
            resolve_source_format("data.JSON", None).unwrap(),
            FileFormat::Json
        );
    }

    #[test]
    fn test_resolve_rejects_unknown_extension() {
        let err = resolve_source_format("image.png", None).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::UnrecognizedExtension { ref file_name } if file_name == "image.png"
        ));
    }

    #[test]
    fn test_from_str() {
        assert_eq!("XML".parse::<FileFormat>().unwrap(), FileFormat::Xml);
        assert!(matches!(
            "yaml".parse::<FileFormat>(),
            Err(ValidationError::UnknownFormat(_))
        ));
    }

    #[test]
    fn test_serialization() {
        assert_eq!(serde_json::to_string(&FileFormat::Csv).unwrap(), "\"csv\"");
        let parsed: FileFormat = serde_json::from_str("\"txt\"").unwrap();
        assert_eq!(parsed, FileFormat::Txt);
    }
}
