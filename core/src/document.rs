//! Documents and media attached to the tree (photos, certificates, letters)

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::OnceLock;

use crate::{clean_text, CoreError, PersonId, Result};

/// Upload extensions accepted for photos and documents
pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "pdf", "doc", "docx"];

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

/// Coarse media class of an upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Image,
    Document,
}

impl FileType {
    pub fn from_filename(filename: &str) -> Self {
        match extension(filename) {
            Some(ext) if IMAGE_EXTENSIONS.contains(&ext.as_str()) => FileType::Image,
            _ => FileType::Document,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Image => "image",
            FileType::Document => "document",
        }
    }
}

impl FromStr for FileType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "image" => Ok(FileType::Image),
            "document" => Ok(FileType::Document),
            other => Err(CoreError::UnknownValue {
                field: "file_type".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// A stored document record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub person_id: Option<PersonId>,
    /// photo, certificate, letter, other
    pub document_type: String,
    pub title: String,
    pub description: Option<String>,
    /// Public path under `/static/uploads`
    pub file_path: String,
    pub file_type: FileType,
    pub upload_date: DateTime<Utc>,
}

/// Form fields accompanying an uploaded document
#[derive(Debug, Clone, Default)]
pub struct DocumentInput {
    pub person_id: Option<PersonId>,
    pub document_type: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
}

impl DocumentInput {
    pub fn build(self, stored_filename: &str, file_path: String, now: DateTime<Utc>) -> Document {
        Document {
            id: 0,
            person_id: self.person_id,
            document_type: clean_text(self.document_type).unwrap_or_else(|| "other".to_string()),
            title: clean_text(self.title).unwrap_or_else(|| stored_filename.to_string()),
            description: clean_text(self.description),
            file_path,
            file_type: FileType::from_filename(stored_filename),
            upload_date: now,
        }
    }
}

/// Lower-cased extension after the last dot
pub fn extension(filename: &str) -> Option<String> {
    let (stem, ext) = filename.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

pub fn is_allowed_file(filename: &str) -> bool {
    extension(filename).is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
}

fn unsafe_chars() -> &'static Regex {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    UNSAFE.get_or_init(|| Regex::new(r"[^A-Za-z0-9_.\-]").expect("static pattern"))
}

/// Reduce a client-supplied filename to a safe ASCII name with no directory
/// part. May return an empty string.
pub fn secure_filename(filename: &str) -> String {
    let base = filename
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();
    let joined = base.split_whitespace().collect::<Vec<_>>().join("_");
    let cleaned = unsafe_chars().replace_all(&joined, "");
    cleaned.trim_matches(|c| c == '.' || c == '_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_extensions() {
        assert!(is_allowed_file("scan.PDF"));
        assert!(is_allowed_file("portrait.jpeg"));
        assert!(!is_allowed_file("script.sh"));
        assert!(!is_allowed_file("noextension"));
        assert!(!is_allowed_file(".png"));
    }

    #[test]
    fn test_file_type_classification() {
        assert_eq!(FileType::from_filename("a.gif"), FileType::Image);
        assert_eq!(FileType::from_filename("a.docx"), FileType::Document);
    }

    #[test]
    fn test_secure_filename() {
        assert_eq!(secure_filename("../../etc/passwd"), "passwd");
        assert_eq!(secure_filename("C:\\photos\\my photo.jpg"), "my_photo.jpg");
        assert_eq!(secure_filename("nagyapa_1920.png"), "nagyapa_1920.png");
        assert_eq!(secure_filename("..hidden.png"), "hidden.png");
        assert_eq!(secure_filename("árvíztűrő.pdf"), "rvztr.pdf");
    }

    #[test]
    fn test_document_defaults() {
        let doc = DocumentInput::default().build(
            "doc_20240101120000_scan.pdf",
            "/static/uploads/doc_20240101120000_scan.pdf".to_string(),
            Utc::now(),
        );
        assert_eq!(doc.document_type, "other");
        assert_eq!(doc.title, "doc_20240101120000_scan.pdf");
        assert_eq!(doc.file_type, FileType::Document);
    }
}
