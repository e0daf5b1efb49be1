//! Tagged binary (NBT) codec: a schema-free tag tree with a big-endian
//! decoder and encoder.
//!
//! # Invariants
//! - Compound entries keep their on-disk order, so decode then encode is
//!   byte-identical for well-formed input.
//! - Every list carries its element kind, including empty lists.
//! - Nesting is bounded by a depth limit; exceeding it is an error, never a
//!   stack overflow.

mod error;
mod mutf8;
mod reader;
mod tag;
mod writer;

pub use error::NbtError;
pub use reader::{DEFAULT_MAX_DEPTH, Decoder, from_bytes};
pub use tag::{Compound, List, NamedTag, Tag, TagKind};
pub use writer::{Encoder, to_bytes};

pub type Result<T> = std::result::Result<T, NbtError>;

pub fn crate_info() -> &'static str {
    "regionkit-nbt v0.1.0"
}
