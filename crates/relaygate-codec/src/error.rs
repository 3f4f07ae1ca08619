use thiserror::Error;

/// Errors produced while encoding or decoding a command buffer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Truncated input at offset {offset}: need {needed} bytes, {remaining} remaining")]
    TruncatedInput {
        offset: usize,
        needed: usize,
        remaining: usize,
    },

    #[error("Trailing bytes: {remaining} unconsumed at offset {offset}")]
    TrailingBytes { offset: usize, remaining: usize },

    #[error("Field overflow in instruction {index}: {field} does not fit {bits} bits")]
    FieldOverflow {
        index: usize,
        field: &'static str,
        bits: u32,
    },

    #[error("Batch must contain at least one instruction")]
    EmptyBatch,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CodecError::TruncatedInput {
            offset: 36,
            needed: 36,
            remaining: 3,
        };
        let text = err.to_string();
        assert!(text.contains("offset 36"));
        assert!(text.contains("3 remaining"));
    }

    #[test]
    fn test_overflow_display() {
        let err = CodecError::FieldOverflow {
            index: 2,
            field: "value",
            bits: 96,
        };
        assert!(err.to_string().contains("96 bits"));
    }
}
