//! Measurement type and the result interpreter.
//!
//! [`interpret`] is a pure function over the three things a finished
//! sandbox tells us: whether the watchdog killed it, its exit code and its
//! captured output.

use std::fmt;
use std::time::Duration;

/// Maximum diagnostic size returned to contributors (64 KiB).
pub const MAX_DIAGNOSTIC_BYTES: usize = 64 * 1024;

/// Outcome of one sandbox run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Measurement {
    /// The build and check passed; the binary has this many bytes.
    Success {
        /// Measured binary size.
        size_bytes: u64,
    },
    /// The build or check failed, or produced unusable output.
    BuildFailure {
        /// Captured output, trimmed. Empty when the build printed nothing.
        diagnostic: String,
    },
    /// The watchdog killed the sandbox.
    Timeout {
        /// The wall-clock budget that was exceeded.
        deadline: Duration,
    },
}

impl Measurement {
    /// Check if this run produced a size.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success { size_bytes } => write!(f, "binary size {size_bytes} bytes"),
            Self::BuildFailure { .. } => write!(f, "building the source code failed"),
            Self::Timeout { deadline } => {
                write!(f, "the code ran too long (limit {:.1}s)", deadline.as_secs_f64())
            }
        }
    }
}

/// Map a finished run to a [`Measurement`].
///
/// The check step inside the sandbox is the source of truth for
/// correctness; this only validates the shape of its output.
pub fn interpret(timed_out: bool, exit_code: i64, output: &str, deadline: Duration) -> Measurement {
    if timed_out {
        return Measurement::Timeout { deadline };
    }

    let trimmed = output.trim();
    if exit_code != 0 {
        return Measurement::BuildFailure {
            diagnostic: truncate_diagnostic(trimmed),
        };
    }

    match trimmed.parse::<u64>() {
        Ok(size_bytes) => Measurement::Success { size_bytes },
        Err(_) => Measurement::BuildFailure {
            diagnostic: truncate_diagnostic(trimmed),
        },
    }
}

/// Truncate to [`MAX_DIAGNOSTIC_BYTES`], preserving UTF-8 boundaries.
fn truncate_diagnostic(s: &str) -> String {
    if s.len() <= MAX_DIAGNOSTIC_BYTES {
        return s.to_string();
    }
    let mut end = MAX_DIAGNOSTIC_BYTES;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    let mut truncated = s[..end].to_string();
    truncated.push_str("\n... [output truncated]");
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEADLINE: Duration = Duration::from_secs(10);

    #[test]
    fn test_timeout_wins_over_output() {
        assert_eq!(
            interpret(true, 0, "42", DEADLINE),
            Measurement::Timeout { deadline: DEADLINE }
        );
        assert_eq!(
            interpret(true, 137, "", DEADLINE),
            Measurement::Timeout { deadline: DEADLINE }
        );
    }

    #[test]
    fn test_success_parses_size() {
        assert_eq!(
            interpret(false, 0, "137", DEADLINE),
            Measurement::Success { size_bytes: 137 }
        );
        assert_eq!(
            interpret(false, 0, "  92\n", DEADLINE),
            Measurement::Success { size_bytes: 92 }
        );
    }

    #[test]
    fn test_nonzero_exit_is_build_failure() {
        assert_eq!(
            interpret(false, 1, "link error", DEADLINE),
            Measurement::BuildFailure {
                diagnostic: "link error".into()
            }
        );
        assert_eq!(
            interpret(false, 2, "\nmain.s:4: error: invalid combination\n\n", DEADLINE),
            Measurement::BuildFailure {
                diagnostic: "main.s:4: error: invalid combination".into()
            }
        );
    }

    #[test]
    fn test_nonzero_exit_with_numeric_output_is_still_failure() {
        assert!(!interpret(false, 1, "42", DEADLINE).is_success());
    }

    #[test]
    fn test_unparsable_output_is_build_failure() {
        assert_eq!(
            interpret(false, 0, "not-a-number", DEADLINE),
            Measurement::BuildFailure {
                diagnostic: "not-a-number".into()
            }
        );
        assert!(!interpret(false, 0, "-5", DEADLINE).is_success());
        assert!(!interpret(false, 0, "12 bytes", DEADLINE).is_success());
        assert!(!interpret(false, 0, "99999999999999999999999", DEADLINE).is_success());
    }

    #[test]
    fn test_empty_output_is_empty_diagnostic() {
        let empty = Measurement::BuildFailure {
            diagnostic: String::new(),
        };
        assert_eq!(interpret(false, 0, "  \n", DEADLINE), empty);
        assert_eq!(interpret(false, 2, "", DEADLINE), empty);
    }

    #[test]
    fn test_diagnostic_truncation() {
        let long = "é".repeat(MAX_DIAGNOSTIC_BYTES);
        match interpret(false, 1, &long, DEADLINE) {
            Measurement::BuildFailure { diagnostic } => {
                assert!(diagnostic.len() <= MAX_DIAGNOSTIC_BYTES + 32);
                assert!(diagnostic.ends_with("[output truncated]"));
            }
            other => panic!("expected build failure, got {other:?}"),
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Measurement::Success { size_bytes: 64 }.to_string(),
            "binary size 64 bytes"
        );
        assert_eq!(
            Measurement::Timeout { deadline: DEADLINE }.to_string(),
            "the code ran too long (limit 10.0s)"
        );
    }
}
