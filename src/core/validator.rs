use crate::core::model::FileDescriptor;

/// Acceptance policy applied to every file before it is queued.
/// Configuration, not hard-coded: callers decide prefixes and size cap.
#[derive(Debug, Clone)]
pub struct ValidationPolicy {
    pub accepted_mime_prefixes: Vec<String>,
    pub max_bytes: u64,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            accepted_mime_prefixes: vec!["image/".to_string()],
            max_bytes: 25 * 1024 * 1024,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("file too large: {size} bytes (limit {limit})")]
    TooLarge { size: u64, limit: u64 },
}

impl ValidationPolicy {
    /// Checks run in order: MIME family first, then size. The first failing
    /// check is the rejection reason.
    pub fn validate(&self, file: &FileDescriptor) -> Result<(), RejectReason> {
        if !self
            .accepted_mime_prefixes
            .iter()
            .any(|p| file.mime.starts_with(p.as_str()))
        {
            return Err(RejectReason::UnsupportedType(file.mime.clone()));
        }
        if file.size > self.max_bytes {
            return Err(RejectReason::TooLarge { size: file.size, limit: self.max_bytes });
        }
        Ok(())
    }
}
