//! Proof-of-purchase upload payload

use crate::{ClientError, ClientResult};
use reqwest::multipart::{Form, Part};
use std::path::Path;

/// Multipart field the backend reads the file from
pub const PROOF_FIELD: &str = "proof";

/// A proof file ready to upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ProofFile {
    /// Wrap in-memory content; the MIME type is guessed from the file name.
    ///
    /// Rejects an empty name or empty content so no empty upload is ever sent.
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> ClientResult<Self> {
        let file_name = file_name.into();
        if file_name.trim().is_empty() {
            return Err(ClientError::Validation(
                "proof: a file name is required".into(),
            ));
        }
        if bytes.is_empty() {
            return Err(ClientError::Validation(format!(
                "proof: {file_name} is empty"
            )));
        }
        let content_type = mime_guess::from_path(&file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        Ok(Self {
            file_name,
            content_type,
            bytes,
        })
    }

    /// Read a proof file from disk
    pub async fn from_path(path: impl AsRef<Path>) -> ClientResult<Self> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bytes = tokio::fs::read(path).await?;
        Self::new(file_name, bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Multipart body with the file under [`PROOF_FIELD`]
    pub fn to_form(&self) -> ClientResult<Form> {
        let part = Part::bytes(self.bytes.clone())
            .file_name(self.file_name.clone())
            .mime_str(&self.content_type)?;
        Ok(Form::new().part(PROOF_FIELD, part))
    }
}
