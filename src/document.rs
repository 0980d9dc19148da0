//! Binary documents (bills, discharge summaries, query attachments) travel
//! inside JSON bodies as `data:` URLs rather than multipart uploads.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::error::{ClaimError, Result};

pub const PDF_MIME: &str = "application/pdf";
const PDF_MAGIC: &[u8] = b"%PDF-";

/// A `data:<mime>[;filename=<name>];base64,<payload>` string as stored by the backend.
/// The file name is form-urlencoded so `,` and `;` cannot end the header early.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataUrl(String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedDocument {
    pub mime: String,
    pub file_name: Option<String>,
    pub bytes: Vec<u8>,
}

impl DataUrl {
    pub fn encode(mime: &str, file_name: Option<&str>, bytes: &[u8]) -> Self {
        let name = file_name
            .map(|n| format!(";filename={}", form_urlencoded::byte_serialize(n.as_bytes()).collect::<String>()))
            .unwrap_or_default();
        DataUrl(format!("data:{}{};base64,{}", mime, name, STANDARD.encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decodes the payload. A bare base64 string without a `data:` header is
    /// accepted and assumed to be a PDF, which is how older records were stored.
    pub fn decode(&self) -> Result<DecodedDocument> {
        let raw = self.0.trim();
        let Some(rest) = raw.strip_prefix("data:") else {
            let bytes = STANDARD
                .decode(raw)
                .map_err(|e| ClaimError::Document(format!("invalid base64 payload: {}", e)))?;
            return Ok(DecodedDocument { mime: PDF_MIME.to_string(), file_name: None, bytes });
        };

        // Base64 never contains a comma, so the last one starts the payload.
        let (header, payload) = rest
            .rsplit_once(',')
            .ok_or_else(|| ClaimError::Document("data URL has no payload".into()))?;

        let mut params = header.split(';');
        let mime = params.next().filter(|m| !m.is_empty()).unwrap_or("text/plain").to_string();
        let mut file_name = None;
        let mut is_base64 = false;
        for param in params {
            if param == "base64" {
                is_base64 = true;
            } else if param.starts_with("filename=") {
                file_name = form_urlencoded::parse(param.as_bytes()).next().map(|(_, name)| name.into_owned());
            }
        }
        if !is_base64 {
            return Err(ClaimError::Document("only base64 data URLs are supported".into()));
        }

        let bytes = STANDARD
            .decode(payload)
            .map_err(|e| ClaimError::Document(format!("invalid base64 payload: {}", e)))?;
        Ok(DecodedDocument { mime, file_name, bytes })
    }
}

impl From<String> for DataUrl {
    fn from(s: String) -> Self {
        DataUrl(s)
    }
}

/// A file picked by the user, not yet sent anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { file_name: file_name.into(), mime: mime.into(), bytes }
    }

    pub fn is_pdf(&self) -> bool {
        self.mime.eq_ignore_ascii_case(PDF_MIME) && self.bytes.starts_with(PDF_MAGIC)
    }

    /// Rejects anything that is not a PDF, naming the field in the error.
    pub fn require_pdf(&self, field: &str) -> Result<()> {
        if self.is_pdf() {
            Ok(())
        } else {
            Err(ClaimError::validation(format!("{} must be a PDF file.", field)))
        }
    }

    pub fn to_data_url(&self) -> DataUrl {
        DataUrl::encode(&self.mime, Some(&self.file_name), &self.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_pdf_with_filename_parameter() {
        let url = DataUrl::from("data:application/pdf;filename=bill.pdf;base64,JVBERi0xLjQ=".to_string());
        let doc = url.decode().unwrap();
        assert_eq!(doc.mime, PDF_MIME);
        assert_eq!(doc.file_name.as_deref(), Some("bill.pdf"));
        assert_eq!(doc.bytes, b"%PDF-1.4");
    }

    #[test]
    fn bare_base64_is_treated_as_pdf() {
        let doc = DataUrl::from("JVBERi0xLjQ=".to_string()).decode().unwrap();
        assert_eq!(doc.mime, PDF_MIME);
        assert_eq!(doc.bytes, b"%PDF-1.4");
    }

    #[test]
    fn corrupt_payload_is_a_document_error() {
        let err = DataUrl::from("data:application/pdf;base64,@@@".to_string()).decode().unwrap_err();
        assert!(matches!(err, ClaimError::Document(_)));
    }

    #[test]
    fn upload_needs_pdf_mime_and_signature() {
        let good = Upload::new("summary.pdf", PDF_MIME, b"%PDF-1.7 body".to_vec());
        assert!(good.require_pdf("Discharge summary").is_ok());

        let renamed_image = Upload::new("scan.pdf", PDF_MIME, vec![0x89, b'P', b'N', b'G']);
        assert!(renamed_image.require_pdf("Discharge summary").is_err());

        let word = Upload::new("bill.docx", "application/msword", b"%PDF-".to_vec());
        assert!(matches!(word.require_pdf("Final bill"), Err(ClaimError::Validation(_))));
    }

    #[test]
    fn filenames_with_separators_survive_decoding() {
        for name in ["Final bill, March.pdf", "labs;base64.pdf", "50% off & more.pdf"] {
            let doc = Upload::new(name, PDF_MIME, b"%PDF-1.4".to_vec()).to_data_url().decode().unwrap();
            assert_eq!(doc.file_name.as_deref(), Some(name));
            assert_eq!(doc.mime, PDF_MIME);
            assert_eq!(doc.bytes, b"%PDF-1.4");
        }
    }

    #[test]
    fn filename_is_escaped_in_header() {
        let url = Upload::new("Final bill, March.pdf", PDF_MIME, b"%PDF-1.4".to_vec()).to_data_url();
        assert_eq!(url.as_str(), "data:application/pdf;filename=Final+bill%2C+March.pdf;base64,JVBERi0xLjQ=");
    }

    #[test]
    fn upload_encodes_with_filename() {
        let upload = Upload::new("a.pdf", PDF_MIME, b"%PDF-1.4".to_vec());
        assert_eq!(upload.to_data_url().as_str(), "data:application/pdf;filename=a.pdf;base64,JVBERi0xLjQ=");
    }
}
