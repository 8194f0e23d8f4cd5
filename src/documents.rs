//! Binary documents served per appointment (filled forms, medical
//! certificates). The bytes are opaque; the client only presents or saves
//! them.

use std::path::{Path, PathBuf};

use crate::error::PortalResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    ViewFormData,
    DownloadFormData,
    ViewMedicalCertificate,
    DownloadMedicalCertificate,
}

impl DocumentKind {
    /// Path segment under `/appointments/{id}/`.
    pub fn endpoint(&self) -> &'static str {
        match self {
            DocumentKind::ViewFormData => "view_form_data",
            DocumentKind::DownloadFormData => "download_form_data",
            DocumentKind::ViewMedicalCertificate => "view_medical_certificate",
            DocumentKind::DownloadMedicalCertificate => "download_medical_certificate",
        }
    }

    pub fn is_download(&self) -> bool {
        matches!(
            self,
            DocumentKind::DownloadFormData | DocumentKind::DownloadMedicalCertificate
        )
    }

    pub fn is_certificate(&self) -> bool {
        matches!(
            self,
            DocumentKind::ViewMedicalCertificate | DocumentKind::DownloadMedicalCertificate
        )
    }

    pub fn from_endpoint(value: &str) -> Option<Self> {
        match value.trim().trim_matches('/') {
            "view_form_data" => Some(DocumentKind::ViewFormData),
            "download_form_data" => Some(DocumentKind::DownloadFormData),
            "view_medical_certificate" => Some(DocumentKind::ViewMedicalCertificate),
            "download_medical_certificate" => Some(DocumentKind::DownloadMedicalCertificate),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub kind: DocumentKind,
    pub appointment_id: i64,
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

impl Document {
    pub fn suggested_file_name(&self) -> String {
        let stem = if self.kind.is_certificate() {
            "medical-certificate"
        } else {
            "form-data"
        };
        format!("{}-{}.pdf", stem, self.appointment_id)
    }

    pub fn looks_like_pdf(&self) -> bool {
        self.bytes.starts_with(b"%PDF")
    }

    /// Write the document into `dir` under its suggested name.
    pub fn save_to(&self, dir: &Path) -> PortalResult<PathBuf> {
        let path = dir.join(self.suggested_file_name());
        std::fs::write(&path, &self.bytes)?;
        tracing::info!(
            appointment_id = self.appointment_id,
            path = %path.display(),
            bytes = self.bytes.len(),
            "Document saved"
        );
        Ok(path)
    }
}
