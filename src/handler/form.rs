//! Multipart form parsing
//!
//! Reads the `file`, `dot_size`, `threshold` and `inverse` parts into a `RawUpload`.
//! Unknown parts are skipped. Values are not validated here.

use hyper::body::Bytes;
use multer::{Constraints, Multipart, SizeLimit};

use crate::relay::{GenerateError, RawUpload};

/// Upper bound for each text field
const TEXT_FIELD_LIMIT: u64 = 64;

pub async fn parse_upload(
    content_type: Option<&str>,
    body: Bytes,
) -> Result<RawUpload, GenerateError> {
    let content_type = content_type.ok_or_else(|| {
        GenerateError::ClientInput("Content-Type must be multipart/form-data".to_string())
    })?;
    let boundary = multer::parse_boundary(content_type)
        .map_err(|e| GenerateError::ClientInput(format!("Invalid multipart request: {e}")))?;

    let constraints = Constraints::new().size_limit(
        SizeLimit::new()
            .for_field("dot_size", TEXT_FIELD_LIMIT)
            .for_field("threshold", TEXT_FIELD_LIMIT)
            .for_field("inverse", TEXT_FIELD_LIMIT),
    );
    let mut multipart =
        Multipart::with_reader_with_constraints(body.as_ref(), boundary, constraints);

    let mut raw = RawUpload::default();
    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            // first file part wins
            "file" if raw.filename.is_none() => {
                let filename = field
                    .file_name()
                    .filter(|f| !f.is_empty())
                    .map(ToString::to_string);
                let data = field.bytes().await.map_err(malformed)?;
                if filename.is_some() {
                    raw.filename = filename;
                    raw.data = data;
                }
            }
            "dot_size" => raw.dot_size = Some(field.text().await.map_err(malformed)?),
            "threshold" => raw.threshold = Some(field.text().await.map_err(malformed)?),
            "inverse" => raw.inverse = Some(field.text().await.map_err(malformed)?),
            _ => {
                field.bytes().await.map_err(malformed)?;
            }
        }
    }

    Ok(raw)
}

fn malformed(e: multer::Error) -> GenerateError {
    GenerateError::ClientInput(format!("Error parsing multipart request: {e}"))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub const BOUNDARY: &str = "relay-test-boundary";

    pub fn content_type() -> String {
        format!("multipart/form-data; boundary={BOUNDARY}")
    }

    /// Encode `(name, Some(filename) | None, value)` parts as a multipart body
    pub fn multipart_body(parts: &[(&str, Option<&str>, &str)]) -> Bytes {
        let mut body = Vec::new();
        for (name, filename, value) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match filename {
                Some(f) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{f}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                ),
            }
            body.extend_from_slice(value.as_bytes());
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        Bytes::from(body)
    }

    #[tokio::test]
    async fn test_reads_all_fields() {
        let body = multipart_body(&[
            ("file", Some("clip.mp4"), "video bytes"),
            ("dot_size", None, "7"),
            ("threshold", None, "200"),
            ("inverse", None, "true"),
            ("comment", None, "ignored"),
        ]);

        let raw = parse_upload(Some(content_type().as_str()), body).await.unwrap();
        assert_eq!(raw.filename.as_deref(), Some("clip.mp4"));
        assert_eq!(raw.data, Bytes::from_static(b"video bytes"));
        assert_eq!(raw.dot_size.as_deref(), Some("7"));
        assert_eq!(raw.threshold.as_deref(), Some("200"));
        assert_eq!(raw.inverse.as_deref(), Some("true"));
    }

    #[tokio::test]
    async fn test_file_without_filename_is_missing() {
        let body = multipart_body(&[("file", None, "not a file"), ("dot_size", None, "3")]);
        let raw = parse_upload(Some(content_type().as_str()), body).await.unwrap();
        assert!(raw.filename.is_none());
        assert_eq!(raw.dot_size.as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn test_first_file_wins() {
        let body = multipart_body(&[
            ("file", Some("a.mp4"), "first"),
            ("file", Some("b.mov"), "second"),
        ]);
        let raw = parse_upload(Some(content_type().as_str()), body).await.unwrap();
        assert_eq!(raw.filename.as_deref(), Some("a.mp4"));
        assert_eq!(raw.data, Bytes::from_static(b"first"));
    }

    #[tokio::test]
    async fn test_rejects_non_multipart() {
        let err = parse_upload(Some("application/json"), Bytes::from_static(b"{}"))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Invalid multipart request"));

        let err = parse_upload(None, Bytes::new()).await.unwrap_err();
        assert!(matches!(err, GenerateError::ClientInput(_)));
    }

    #[tokio::test]
    async fn test_oversized_text_field() {
        let long = "9".repeat(200);
        let body = multipart_body(&[("dot_size", None, long.as_str())]);
        let err = parse_upload(Some(content_type().as_str()), body).await.unwrap_err();
        assert!(err.to_string().starts_with("Error parsing multipart request"));
    }
}
