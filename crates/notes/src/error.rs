// ABOUTME: Error types for marginalia including the ErrorCode enum and EnhanceError struct.
// ABOUTME: Errors only arise while compiling configuration or touching files; enhancement itself never fails.

use std::fmt;

/// Error codes representing different categories of failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidSelector,
    InvalidPattern,
    Config,
    Io,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::InvalidSelector => "invalid selector",
            ErrorCode::InvalidPattern => "invalid pattern",
            ErrorCode::Config => "configuration error",
            ErrorCode::Io => "I/O error",
        };
        write!(f, "{}", s)
    }
}

/// The main error type for marginalia.
///
/// `target` names the thing that was rejected: a selector, a regex, a config
/// key or a file path.
#[derive(Debug, thiserror::Error)]
pub struct EnhanceError {
    pub code: ErrorCode,
    pub target: String,
    pub op: String,
    #[source]
    pub source: Option<anyhow::Error>,
}

impl fmt::Display for EnhanceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "marginalia: {} {:?}: {}", self.op, self.target, self.code)?;
        if let Some(ref src) = self.source {
            write!(f, ": {}", src)?;
        }
        Ok(())
    }
}

impl EnhanceError {
    /// Create an InvalidSelector error.
    pub fn invalid_selector(
        target: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self {
            code: ErrorCode::InvalidSelector,
            target: target.into(),
            op: op.into(),
            source,
        }
    }

    /// Create an InvalidPattern error.
    pub fn invalid_pattern(
        target: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self {
            code: ErrorCode::InvalidPattern,
            target: target.into(),
            op: op.into(),
            source,
        }
    }

    /// Create a Config error.
    pub fn config(
        target: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self {
            code: ErrorCode::Config,
            target: target.into(),
            op: op.into(),
            source,
        }
    }

    /// Create an Io error.
    pub fn io(
        target: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self {
            code: ErrorCode::Io,
            target: target.into(),
            op: op.into(),
            source,
        }
    }

    /// Returns true if this is an InvalidSelector error.
    pub fn is_invalid_selector(&self) -> bool {
        self.code == ErrorCode::InvalidSelector
    }

    /// Returns true if this is an InvalidPattern error.
    pub fn is_invalid_pattern(&self) -> bool {
        self.code == ErrorCode::InvalidPattern
    }

    /// Returns true if this is a Config error.
    pub fn is_config(&self) -> bool {
        self.code == ErrorCode::Config
    }

    /// Returns true if this is an Io error.
    pub fn is_io(&self) -> bool {
        self.code == ErrorCode::Io
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_op_target_and_code() {
        let err = EnhanceError::invalid_selector("[[[", "compile references", None);
        assert_eq!(
            err.to_string(),
            "marginalia: compile references \"[[[\": invalid selector"
        );
        assert!(err.is_invalid_selector());
        assert!(!err.is_config());
    }

    #[test]
    fn display_appends_source() {
        let err = EnhanceError::io(
            "notes.html",
            "read input",
            Some(anyhow::anyhow!("permission denied")),
        );
        assert!(err.to_string().ends_with(": I/O error: permission denied"));
        assert!(err.is_io());
    }
}
