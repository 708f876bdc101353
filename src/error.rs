//! Crate-wide error type.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("GPX parse error: {0}")]
    Gpx(#[from] gpx::errors::GpxError),
    #[error("I/O error")]
    Io(#[from] std::io::Error),
    #[error("invalid options: {0}")]
    Options(#[from] serde_json::Error),
    #[error("cannot encode {message} message: {reason}")]
    Encode {
        message: &'static str,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_error_names_message() {
        let err = Error::Encode {
            message: "course_point",
            reason: "string field of 300 bytes".into(),
        };
        let text = err.to_string();
        assert!(text.contains("course_point"));
        assert!(text.contains("300 bytes"));
    }

    #[test]
    fn options_error_wraps_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: Error = json_err.into();
        assert!(err.to_string().starts_with("invalid options"));
    }
}
