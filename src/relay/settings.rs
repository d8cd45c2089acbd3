//! Upload validation
//!
//! Turns the raw multipart fields into a validated `Upload`. Every check here runs
//! before anything touches the filesystem.

use hyper::body::Bytes;
use serde::Serialize;

use super::error::GenerateError;

pub const DEFAULT_DOT_SIZE: u8 = 4;
pub const DEFAULT_THRESHOLD: u8 = 128;
pub const DOT_SIZE_RANGE: std::ops::RangeInclusive<i64> = 1..=10;
pub const THRESHOLD_RANGE: std::ops::RangeInclusive<i64> = 0..=255;

/// Sent to the model on every call; not exposed to clients.
pub const INVERSE_THRESHOLD: bool = false;

const ALLOWED_EXTENSIONS: [&str; 3] = [".mp4", ".mov", ".avi"];

/// Display parameters of the dotted effect, echoed back on success
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EffectSettings {
    pub dot_size: u8,
    pub threshold: u8,
    pub inverse: bool,
}

impl Default for EffectSettings {
    fn default() -> Self {
        Self {
            dot_size: DEFAULT_DOT_SIZE,
            threshold: DEFAULT_THRESHOLD,
            inverse: false,
        }
    }
}

/// Multipart fields as the client sent them
#[derive(Debug, Default)]
pub struct RawUpload {
    pub filename: Option<String>,
    pub data: Bytes,
    pub dot_size: Option<String>,
    pub threshold: Option<String>,
    pub inverse: Option<String>,
}

/// An upload that passed validation
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub data: Bytes,
    pub settings: EffectSettings,
}

impl TryFrom<RawUpload> for Upload {
    type Error = GenerateError;

    fn try_from(raw: RawUpload) -> Result<Self, Self::Error> {
        let filename = raw
            .filename
            .ok_or_else(|| GenerateError::ClientInput("file is required".to_string()))?;
        check_extension(&filename)?;

        let dot_size = parse_int("dot_size", raw.dot_size.as_deref(), DEFAULT_DOT_SIZE)?;
        let dot_size = in_range(dot_size, &DOT_SIZE_RANGE).ok_or_else(|| {
            GenerateError::ClientInput("dot_size must be between 1-10".to_string())
        })?;

        let threshold = parse_int("threshold", raw.threshold.as_deref(), DEFAULT_THRESHOLD)?;
        let threshold = in_range(threshold, &THRESHOLD_RANGE).ok_or_else(|| {
            GenerateError::ClientInput("threshold must be between 0-255".to_string())
        })?;

        let inverse = parse_bool("inverse", raw.inverse.as_deref())?;

        Ok(Self {
            filename,
            data: raw.data,
            settings: EffectSettings {
                dot_size,
                threshold,
                inverse,
            },
        })
    }
}

/// Accepts `.mp4`, `.mov` and `.avi`, ignoring case
pub fn check_extension(filename: &str) -> Result<(), GenerateError> {
    let lower = filename.to_ascii_lowercase();
    if ALLOWED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
        Ok(())
    } else {
        Err(GenerateError::ClientInput(
            "Only MP4/MOV/AVI files are allowed.".to_string(),
        ))
    }
}

fn parse_int(field: &str, raw: Option<&str>, default: u8) -> Result<i64, GenerateError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(i64::from(default)),
        Some(value) => value
            .parse()
            .map_err(|_| GenerateError::ClientInput(format!("{field} must be an integer"))),
    }
}

fn in_range(value: i64, range: &std::ops::RangeInclusive<i64>) -> Option<u8> {
    if range.contains(&value) {
        u8::try_from(value).ok()
    } else {
        None
    }
}

/// Form booleans in the spellings HTML clients commonly send
fn parse_bool(field: &str, raw: Option<&str>) -> Result<bool, GenerateError> {
    let Some(value) = raw.map(str::trim) else {
        return Ok(false);
    };

    match value.to_ascii_lowercase().as_str() {
        "" | "false" | "0" | "no" | "off" | "f" | "n" => Ok(false),
        "true" | "1" | "yes" | "on" | "t" | "y" => Ok(true),
        _ => Err(GenerateError::ClientInput(format!(
            "{field} must be a boolean"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(filename: &str) -> RawUpload {
        RawUpload {
            filename: Some(filename.to_string()),
            data: Bytes::from_static(b"video"),
            ..RawUpload::default()
        }
    }

    fn client_message(result: Result<Upload, GenerateError>) -> String {
        match result {
            Err(GenerateError::ClientInput(message)) => message,
            other => panic!("Expected client input error, got {other:?}"),
        }
    }

    #[test]
    fn test_defaults() {
        let upload = Upload::try_from(raw("clip.mp4")).unwrap();
        assert_eq!(upload.settings, EffectSettings::default());
        assert_eq!(
            upload.settings,
            EffectSettings {
                dot_size: 4,
                threshold: 128,
                inverse: false
            }
        );

        let mut blank = raw("clip.mp4");
        blank.dot_size = Some(String::new());
        blank.threshold = Some(" ".to_string());
        let upload = Upload::try_from(blank).unwrap();
        assert_eq!(upload.settings.dot_size, DEFAULT_DOT_SIZE);
        assert_eq!(upload.settings.threshold, DEFAULT_THRESHOLD);
    }

    #[test]
    fn test_supplied_settings() {
        let mut form = raw("clip.MOV");
        form.dot_size = Some("7".to_string());
        form.threshold = Some("200".to_string());
        form.inverse = Some("true".to_string());

        let upload = Upload::try_from(form).unwrap();
        assert_eq!(
            upload.settings,
            EffectSettings {
                dot_size: 7,
                threshold: 200,
                inverse: true
            }
        );
    }

    #[test]
    fn test_extensions() {
        for ok in ["clip.mp4", "CLIP.MP4", "a.b.mov", "x.Avi"] {
            assert!(check_extension(ok).is_ok(), "{ok} should be accepted");
        }
        for bad in ["clip.txt", "clip.mp4.exe", "clip", "mp4", "clip.mkv"] {
            assert!(check_extension(bad).is_err(), "{bad} should be rejected");
        }
        assert_eq!(
            client_message(Upload::try_from(raw("clip.txt"))),
            "Only MP4/MOV/AVI files are allowed."
        );
    }

    #[test]
    fn test_missing_file() {
        let form = RawUpload::default();
        assert_eq!(client_message(Upload::try_from(form)), "file is required");
    }

    #[test]
    fn test_dot_size_bounds() {
        for value in ["0", "11", "15", "-1"] {
            let mut form = raw("clip.avi");
            form.dot_size = Some(value.to_string());
            assert_eq!(
                client_message(Upload::try_from(form)),
                "dot_size must be between 1-10"
            );
        }
        for value in ["1", "10"] {
            let mut form = raw("clip.avi");
            form.dot_size = Some(value.to_string());
            assert!(Upload::try_from(form).is_ok());
        }
    }

    #[test]
    fn test_threshold_bounds() {
        for value in ["-1", "256", "1000"] {
            let mut form = raw("clip.mp4");
            form.threshold = Some(value.to_string());
            assert_eq!(
                client_message(Upload::try_from(form)),
                "threshold must be between 0-255"
            );
        }
        for value in ["0", "255"] {
            let mut form = raw("clip.mp4");
            form.threshold = Some(value.to_string());
            assert!(Upload::try_from(form).is_ok());
        }
    }

    #[test]
    fn test_extension_checked_before_parameters() {
        let mut form = raw("clip.txt");
        form.dot_size = Some("15".to_string());
        assert_eq!(
            client_message(Upload::try_from(form)),
            "Only MP4/MOV/AVI files are allowed."
        );
    }

    #[test]
    fn test_non_numeric_parameters() {
        let mut form = raw("clip.mp4");
        form.dot_size = Some("big".to_string());
        assert_eq!(
            client_message(Upload::try_from(form)),
            "dot_size must be an integer"
        );

        let mut form = raw("clip.mp4");
        form.threshold = Some("1.5".to_string());
        assert_eq!(
            client_message(Upload::try_from(form)),
            "threshold must be an integer"
        );
    }

    #[test]
    fn test_inverse_spellings() {
        for (value, expected) in [
            ("true", true),
            ("True", true),
            ("1", true),
            ("on", true),
            ("false", false),
            ("0", false),
            ("off", false),
            ("", false),
        ] {
            let mut form = raw("clip.mp4");
            form.inverse = Some(value.to_string());
            assert_eq!(Upload::try_from(form).unwrap().settings.inverse, expected);
        }

        let mut form = raw("clip.mp4");
        form.inverse = Some("maybe".to_string());
        assert_eq!(
            client_message(Upload::try_from(form)),
            "inverse must be a boolean"
        );
    }
}
