use crate::tag::TagKind;

/// Errors raised while decoding or encoding a tag tree.
#[derive(Debug, thiserror::Error)]
pub enum NbtError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unknown tag id {0}")]
    UnknownTag(u8),
    #[error("unexpected end tag where a value was required")]
    UnexpectedEnd,
    #[error("negative length {length} for {kind:?}")]
    NegativeLength { kind: TagKind, length: i32 },
    #[error("truncated {kind:?}: expected {expected} bytes, got {actual}")]
    Truncated {
        kind: TagKind,
        expected: usize,
        actual: usize,
    },
    #[error("invalid modified UTF-8 string")]
    InvalidString,
    #[error("string of {0} bytes exceeds the 65535 byte limit")]
    StringTooLong(usize),
    #[error("{0} elements exceed the i32 length limit")]
    TooManyElements(usize),
    #[error("list of {expected:?} cannot hold {found:?}")]
    MixedList { expected: TagKind, found: TagKind },
    #[error("nesting exceeds depth limit of {0}")]
    DepthLimit(usize),
}
