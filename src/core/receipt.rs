// Payment-proof blob validation and encoding

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::core::errors::AppError;

/// Hard ceiling on an uploaded receipt (5 MiB).
pub const MAX_RECEIPT_BYTES: usize = 5 * 1024 * 1024;

/// Content types accepted for a payment proof.
pub const ALLOWED_RECEIPT_TYPES: [&str; 5] = [
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/webp",
    "application/pdf",
];

/// A payment-proof blob with its content type.
///
/// The storage medium is behind the `ReceiptStore` seam; this type is the
/// exchange format so the backing store (key-value, object storage,
/// filesystem) can change without touching the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptBlob {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ReceiptBlob {
    /// Validate an upload against the allow-list and size ceiling.
    ///
    /// Rejections carry the user-facing reason; nothing is persisted on
    /// failure.
    pub fn validate(content_type: &str, size: usize) -> Result<(), AppError> {
        if !ALLOWED_RECEIPT_TYPES.contains(&content_type) {
            return Err(AppError::Validation(
                "Tipo de arquivo não permitido".to_string(),
            ));
        }
        if size > MAX_RECEIPT_BYTES {
            return Err(AppError::Validation(
                "Arquivo muito grande (máx. 5MB)".to_string(),
            ));
        }
        Ok(())
    }

    /// Encode as a self-describing data URL (`data:{type};base64,{payload}`),
    /// the embeddable reference the client renders directly.
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.content_type,
            BASE64.encode(&self.bytes)
        )
    }

    /// Decode a stored data URL back into the raw blob.
    pub fn from_data_url(data_url: &str) -> Option<Self> {
        let rest = data_url.strip_prefix("data:")?;
        let (content_type, payload) = rest.split_once(";base64,")?;
        let bytes = BASE64.decode(payload).ok()?;
        Some(ReceiptBlob {
            content_type: content_type.to_string(),
            bytes,
        })
    }
}
