//! The budget-checked output of a compression job.

use std::fmt;

use crate::error::{CoreResult, size_exceeded};
use crate::utils::{format_budget, format_bytes};

/// Transfer encoding applied on top of the payload's own format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncoding {
    Gzip,
}

impl ContentEncoding {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
        }
    }
}

impl fmt::Display for ContentEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An output payload that is known to fit its byte budget.
///
/// The only constructor checks the budget, so every `CompressionResult` in
/// circulation satisfies `payload.len() <= budget`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionResult {
    payload: Vec<u8>,
    filename: String,
    mime_type: String,
    content_encoding: Option<ContentEncoding>,
}

impl CompressionResult {
    pub fn new(
        payload: Vec<u8>,
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        content_encoding: Option<ContentEncoding>,
        budget: u64,
    ) -> CoreResult<Self> {
        if payload.len() as u64 > budget {
            return Err(size_exceeded(format!(
                "Output of {} exceeds the {} budget.",
                format_bytes(payload.len() as u64),
                format_budget(budget)
            )));
        }
        Ok(Self {
            payload,
            filename: filename.into(),
            mime_type: mime_type.into(),
            content_encoding,
        })
    }

    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[must_use]
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    #[must_use]
    pub fn content_encoding(&self) -> Option<ContentEncoding> {
        self.content_encoding
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_budget_checked_constructor() {
        let ok = CompressionResult::new(vec![0; 10], "a.bin", "application/octet-stream", None, 10);
        assert_eq!(ok.unwrap().len(), 10);

        let err = CompressionResult::new(vec![0; 11], "a.bin", "application/octet-stream", None, 10)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SizeExceeded);
    }

    #[test]
    fn test_encoding_label() {
        assert_eq!(ContentEncoding::Gzip.to_string(), "gzip");
    }
}
