use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("block shape mismatch: {left_w}x{left_h} vs {right_w}x{right_h}")]
    ShapeMismatch {
        left_w: u32,
        left_h: u32,
        right_w: u32,
        right_h: u32,
    },

    #[error("invalid dimensions {width}x{height}: {reason}")]
    InvalidDimensions {
        width: u32,
        height: u32,
        reason: &'static str,
    },

    #[error("frame {width}x{height} is smaller than one {block_size}x{block_size} macroblock")]
    FrameTooSmall {
        width: u32,
        height: u32,
        block_size: u32,
    },

    #[error("frame dimension mismatch: expected {expected_w}x{expected_h}, got {got_w}x{got_h}")]
    DimensionMismatch {
        expected_w: u32,
        expected_h: u32,
        got_w: u32,
        got_h: u32,
    },

    #[error("symbol {symbol} has no entry in the codebook")]
    UnknownSymbol { symbol: String },

    #[error("corrupt stream: {reason}")]
    CorruptStream { reason: String },

    #[error("invalid search configuration: {reason}")]
    InvalidConfig { reason: &'static str },

    #[error("cannot encode an empty frame sequence")]
    EmptySequence,
}

impl CodecError {
    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        CodecError::CorruptStream {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;
