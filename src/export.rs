//! Word-compatible export of generated lesson plans.
//!
//! The HTML fragment is wrapped in an Office HTML envelope and saved with a
//! `.doc` extension; Word and Google Docs open it with tables intact.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;

/// Base name used when nothing usable survives sanitization
pub const DEFAULT_FILE_BASE: &str = "PlanSmith_Lesson_Plan";

/// Stand-in for a missing topic
const DEFAULT_TOPIC: &str = "Lesson_Plan";

pub const DOC_MEDIA_TYPE: &str = "application/msword";

const DOC_HEADER: &str = "<html xmlns:o='urn:schemas-microsoft-com:office:office' \
xmlns:w='urn:schemas-microsoft-com:office:word' \
xmlns='http://www.w3.org/TR/REC-html40'>\
<head><meta charset='utf-8'><title>Lesson Plan</title></head><body>";

const DOC_FOOTER: &str = "</body></html>";

/// A ready-to-save document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedDocument {
    pub file_name: String,
    pub media_type: &'static str,
    pub bytes: Vec<u8>,
}

impl ExportedDocument {
    /// Write into `dir`, returning the full path
    pub async fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;

        let path = dir.join(&self.file_name);
        fs::write(&path, &self.bytes)
            .await
            .with_context(|| format!("Failed to write document: {}", path.display()))?;

        Ok(path)
    }
}

/// Strip everything outside `[A-Za-z0-9 -_]` and collapse runs of spaces
pub fn sanitize_file_base(raw: &str) -> String {
    let kept: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();

    let collapsed = kept.split(' ').filter(|w| !w.is_empty()).collect::<Vec<_>>().join(" ");

    if collapsed.is_empty() {
        DEFAULT_FILE_BASE.to_string()
    } else {
        collapsed
    }
}

/// File name (without extension) from subject, unit and topic
pub fn export_filename(subject: Option<&str>, unit: Option<&str>, topic: Option<&str>) -> String {
    let subject = subject.unwrap_or_default().trim();
    let unit = unit.unwrap_or_default().trim();
    let topic = match topic.unwrap_or_default() {
        "" => DEFAULT_TOPIC,
        t => t.trim(),
    };

    sanitize_file_base(&format!("{} {} {}", subject, unit, topic))
}

/// Wrap an HTML fragment in the Office HTML envelope
pub fn render_document(html: &str) -> String {
    format!("{}{}{}", DOC_HEADER, html, DOC_FOOTER)
}

/// Build the downloadable document for a generated plan
pub fn export_document(
    html: &str,
    subject: Option<&str>,
    unit: Option<&str>,
    topic: Option<&str>,
) -> ExportedDocument {
    ExportedDocument {
        file_name: format!("{}.doc", export_filename(subject, unit, topic)),
        media_type: DOC_MEDIA_TYPE,
        bytes: render_document(html).into_bytes(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_and_collapses() {
        assert_eq!(
            export_filename(Some("Bio/Chem!"), Some("Unit 1"), Some("Cells & You")),
            "BioChem Unit 1 Cells You"
        );
    }

    #[test]
    fn test_keeps_dash_and_underscore() {
        assert_eq!(sanitize_file_base("Grade-7 lab_notes"), "Grade-7 lab_notes");
    }

    #[test]
    fn test_missing_parts() {
        assert_eq!(export_filename(None, None, Some("Volcanoes")), "Volcanoes");
        assert_eq!(export_filename(None, None, None), "Lesson_Plan");
        assert_eq!(export_filename(Some("Math"), None, Some("")), "Math Lesson_Plan");
    }

    #[test]
    fn test_fallback_when_nothing_survives() {
        assert_eq!(export_filename(Some("!!!"), None, Some("???")), DEFAULT_FILE_BASE);
        assert_eq!(export_filename(None, None, Some("   ")), DEFAULT_FILE_BASE);
    }

    #[test]
    fn test_non_ascii_removed() {
        assert_eq!(sanitize_file_base("Español  Ünit"), "Espaol nit");
    }

    #[test]
    fn test_document_envelope() {
        let doc = export_document("<h2>Plan</h2>", Some("Science"), None, Some("Cells"));

        assert_eq!(doc.file_name, "Science Cells.doc");
        assert_eq!(doc.media_type, "application/msword");

        let text = String::from_utf8(doc.bytes).unwrap();
        assert!(text.starts_with("<html xmlns:o='urn:schemas-microsoft-com:office:office'"));
        assert!(text.contains("<meta charset='utf-8'>"));
        assert!(text.ends_with("<h2>Plan</h2></body></html>"));
    }

    #[tokio::test]
    async fn test_write_to_directory() {
        let temp = tempfile::TempDir::new().unwrap();
        let doc = export_document("<p>x</p>", None, None, Some("Test"));

        let path = doc.write_to(&temp.path().join("out")).await.unwrap();
        assert_eq!(path.file_name().unwrap(), "Test.doc");
        assert!(path.exists());
    }
}
