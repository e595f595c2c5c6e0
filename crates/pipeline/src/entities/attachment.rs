use std::path::Path;

use base64::{engine::general_purpose, Engine as _};
use bytes::Bytes;
use nooverfit_inference::InlineAttachment;
use serde::{Deserialize, Serialize};

use crate::types::{PipelineError, PipelineResult};

pub const PDF_MIME_TYPE: &str = "application/pdf";

/// Extensions whose registered MIME type is not the one uploads are checked against.
const SOURCE_MIME_TYPES: &[(&str, &str)] = &[
    ("ts", "text/typescript"),
    ("tsx", "text/typescript"),
    ("mts", "text/typescript"),
    ("cts", "text/typescript"),
    ("py", "text/x-python"),
    ("md", "text/markdown"),
    ("markdown", "text/markdown"),
];

/// MIME type for a file name, preferring the source-code overrides above.
pub fn mime_type_for(path: &Path) -> String {
    let extension = path
        .extension()
        .and_then(|extension| extension.to_str())
        .map(str::to_ascii_lowercase);

    if let Some(extension) = extension.as_deref() {
        if let Some((_, mime_type)) = SOURCE_MIME_TYPES.iter().find(|(ext, _)| *ext == extension) {
            return (*mime_type).to_string();
        }
    }

    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// A file offered for upload, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

impl CandidateFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Reads a file from disk, inferring its MIME type from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|err| {
            PipelineError::ingestion(format!("failed to read {}: {}", path.display(), err))
        })?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, mime_type_for(path), bytes))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_pdf(&self) -> bool {
        self.mime_type == PDF_MIME_TYPE
    }
}

/// An accepted file staged for the next turn.
///
/// `base64` holds the `data:<mime>;base64,<payload>` form that travels on the
/// wire. Raw bytes are kept in memory only and never persisted. An empty
/// `base64` marks a metadata-only copy restored from stored history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    pub name: String,
    pub size: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub base64: String,
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    #[serde(skip)]
    pub bytes: Bytes,
}

impl Attachment {
    /// Encodes a candidate into its wire representation.
    pub fn encode(id: impl Into<String>, file: CandidateFile) -> Self {
        let payload = general_purpose::STANDARD.encode(&file.bytes);
        let base64 = format!("data:{};base64,{}", file.mime_type, payload);
        let preview_url = file
            .mime_type
            .starts_with("image/")
            .then(|| base64.clone());

        Self {
            id: id.into(),
            size: file.size(),
            name: file.name,
            base64,
            mime_type: file.mime_type,
            preview_url,
            bytes: file.bytes,
        }
    }

    /// Reverses [`Attachment::encode`], returning the MIME type and raw bytes.
    pub fn decode(&self) -> PipelineResult<(String, Vec<u8>)> {
        let (mime_type, payload) = match self.base64.split_once(',') {
            Some((header, payload)) => {
                let mime_type = header
                    .strip_prefix("data:")
                    .and_then(|rest| rest.strip_suffix(";base64"))
                    .ok_or_else(|| {
                        PipelineError::validation(format!("{}: malformed data URI", self.name))
                    })?;
                (mime_type.to_string(), payload)
            }
            None => (self.mime_type.clone(), self.base64.as_str()),
        };

        let bytes = general_purpose::STANDARD.decode(payload).map_err(|err| {
            PipelineError::validation(format!("{}: invalid base64 payload: {}", self.name, err))
        })?;
        Ok((mime_type, bytes))
    }

    /// Copy without the encoded payload or preview.
    pub fn metadata_only(&self) -> Self {
        Self {
            id: self.id.clone(),
            name: self.name.clone(),
            size: self.size,
            base64: String::new(),
            mime_type: self.mime_type.clone(),
            preview_url: None,
            bytes: Bytes::new(),
        }
    }

    pub fn to_inline(&self) -> InlineAttachment {
        InlineAttachment::new(self.mime_type.clone(), self.base64.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_files_map_to_allowed_types() {
        assert_eq!(mime_type_for(Path::new("src/app.ts")), "text/typescript");
        assert_eq!(mime_type_for(Path::new("View.TSX")), "text/typescript");
        assert_eq!(mime_type_for(Path::new("train.py")), "text/x-python");
        assert_eq!(mime_type_for(Path::new("README.md")), "text/markdown");
        assert_eq!(mime_type_for(Path::new("manual.pdf")), PDF_MIME_TYPE);
        assert_eq!(mime_type_for(Path::new("photo.png")), "image/png");
        assert_eq!(mime_type_for(Path::new("blob")), "application/octet-stream");
    }

    #[tokio::test]
    async fn typescript_file_from_disk_is_tagged_as_typescript() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.ts");
        tokio::fs::write(&path, b"export const x = 1;\n").await.unwrap();

        let file = CandidateFile::from_path(&path).await.unwrap();

        assert_eq!(file.name, "index.ts");
        assert_eq!(file.mime_type, "text/typescript");
    }

    #[test]
    fn encode_then_decode_preserves_length_and_type() {
        let file = CandidateFile::new("notes.csv", "text/csv", b"a,b\n1,2\n".to_vec());
        let attachment = Attachment::encode("att-1", file);

        assert!(attachment.base64.starts_with("data:text/csv;base64,"));
        assert_eq!(attachment.size, 8);

        let (mime_type, bytes) = attachment.decode().expect("decodes");
        assert_eq!(mime_type, "text/csv");
        assert_eq!(bytes.len() as u64, attachment.size);
    }

    #[test]
    fn only_images_get_a_preview() {
        let image = Attachment::encode("a", CandidateFile::new("x.png", "image/png", vec![1, 2]));
        let text = Attachment::encode("b", CandidateFile::new("x.txt", "text/plain", vec![1, 2]));

        assert_eq!(image.preview_url.as_deref(), Some(image.base64.as_str()));
        assert!(text.preview_url.is_none());
    }

    #[test]
    fn decode_accepts_bare_payloads() {
        let mut attachment =
            Attachment::encode("a", CandidateFile::new("x.txt", "text/plain", b"hi".to_vec()));
        attachment.base64 = "aGk=".to_string();

        let (mime_type, bytes) = attachment.decode().unwrap();
        assert_eq!(mime_type, "text/plain");
        assert_eq!(bytes, b"hi");
    }

    #[test]
    fn serialized_form_omits_raw_bytes() {
        let attachment =
            Attachment::encode("a", CandidateFile::new("x.txt", "text/plain", b"hi".to_vec()));
        let json = serde_json::to_value(&attachment).unwrap();

        assert_eq!(json["mimeType"], "text/plain");
        assert!(json.get("bytes").is_none());
    }

    #[test]
    fn metadata_only_copy_drops_payload_and_preview() {
        let image = Attachment::encode("a", CandidateFile::new("x.png", "image/png", vec![7; 4096]));

        let slim = image.metadata_only();
        let json = serde_json::to_value(&slim).unwrap();

        assert_eq!(json["name"], "x.png");
        assert_eq!(json["size"], 4096);
        assert_eq!(json["mimeType"], "image/png");
        assert!(json.get("base64").is_none());
        assert!(json.get("previewUrl").is_none());

        let restored: Attachment = serde_json::from_value(json).unwrap();
        assert_eq!(restored, slim);
    }
}
