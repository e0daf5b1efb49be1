use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;

use crate::NbtError;

/// On-disk tag identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[repr(u8)]
pub enum TagKind {
    End = 0,
    Byte = 1,
    Short = 2,
    Int = 3,
    Long = 4,
    Float = 5,
    Double = 6,
    ByteArray = 7,
    String = 8,
    List = 9,
    Compound = 10,
    IntArray = 11,
    LongArray = 12,
}

impl TryFrom<u8> for TagKind {
    type Error = NbtError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => TagKind::End,
            1 => TagKind::Byte,
            2 => TagKind::Short,
            3 => TagKind::Int,
            4 => TagKind::Long,
            5 => TagKind::Float,
            6 => TagKind::Double,
            7 => TagKind::ByteArray,
            8 => TagKind::String,
            9 => TagKind::List,
            10 => TagKind::Compound,
            11 => TagKind::IntArray,
            12 => TagKind::LongArray,
            other => return Err(NbtError::UnknownTag(other)),
        })
    }
}

/// A single value in the tag tree.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub enum Tag {
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    ByteArray(Vec<i8>),
    String(String),
    List(List),
    Compound(Compound),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
}

impl Tag {
    pub fn kind(&self) -> TagKind {
        match self {
            Tag::Byte(_) => TagKind::Byte,
            Tag::Short(_) => TagKind::Short,
            Tag::Int(_) => TagKind::Int,
            Tag::Long(_) => TagKind::Long,
            Tag::Float(_) => TagKind::Float,
            Tag::Double(_) => TagKind::Double,
            Tag::ByteArray(_) => TagKind::ByteArray,
            Tag::String(_) => TagKind::String,
            Tag::List(_) => TagKind::List,
            Tag::Compound(_) => TagKind::Compound,
            Tag::IntArray(_) => TagKind::IntArray,
            Tag::LongArray(_) => TagKind::LongArray,
        }
    }

    pub fn as_compound(&self) -> Option<&Compound> {
        match self {
            Tag::Compound(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_compound_mut(&mut self) -> Option<&mut Compound> {
        match self {
            Tag::Compound(c) => Some(c),
            _ => None,
        }
    }

    /// Integral value widened to `i64`, for any of the integer scalar kinds.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Tag::Byte(v) => Some(v as i64),
            Tag::Short(v) => Some(v as i64),
            Tag::Int(v) => Some(v as i64),
            Tag::Long(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Tag::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<Compound> for Tag {
    fn from(value: Compound) -> Self {
        Tag::Compound(value)
    }
}

impl From<List> for Tag {
    fn from(value: List) -> Self {
        Tag::List(value)
    }
}

impl From<String> for Tag {
    fn from(value: String) -> Self {
        Tag::String(value)
    }
}

impl From<&str> for Tag {
    fn from(value: &str) -> Self {
        Tag::String(value.to_owned())
    }
}

impl From<i32> for Tag {
    fn from(value: i32) -> Self {
        Tag::Int(value)
    }
}

impl From<i64> for Tag {
    fn from(value: i64) -> Self {
        Tag::Long(value)
    }
}

/// Homogeneous list. The element kind is kept even when the list is empty.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct List {
    kind: TagKind,
    items: Vec<Tag>,
}

impl List {
    pub fn new(kind: TagKind) -> Self {
        Self {
            kind,
            items: Vec::new(),
        }
    }

    /// Build a list from items that must all share `kind`.
    pub fn from_items(kind: TagKind, items: Vec<Tag>) -> Result<Self, NbtError> {
        if let Some(bad) = items.iter().find(|t| t.kind() != kind) {
            return Err(NbtError::MixedList {
                expected: kind,
                found: bad.kind(),
            });
        }
        Ok(Self { kind, items })
    }

    pub fn kind(&self) -> TagKind {
        self.kind
    }

    pub fn push(&mut self, tag: Tag) -> Result<(), NbtError> {
        // An End-typed list is the canonical empty list and adopts the first element.
        if self.kind == TagKind::End && self.items.is_empty() {
            self.kind = tag.kind();
        }
        if tag.kind() != self.kind {
            return Err(NbtError::MixedList {
                expected: self.kind,
                found: tag.kind(),
            });
        }
        self.items.push(tag);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Tag> {
        self.items.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.items.iter()
    }
}

/// Named entries in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Compound {
    entries: Vec<(String, Tag)>,
}

impl Compound {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Tag> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Tag> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    /// Insert or replace an entry. Replacing keeps the original position.
    pub fn insert(&mut self, name: impl Into<String>, tag: impl Into<Tag>) -> Option<Tag> {
        let name = name.into();
        let tag = tag.into();
        match self.get_mut(&name) {
            Some(slot) => Some(std::mem::replace(slot, tag)),
            None => {
                self.entries.push((name, tag));
                None
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Tag> {
        let pos = self.entries.iter().position(|(k, _)| k == name)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tag)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Append without checking for an existing key; used by the decoder so
    /// duplicate keys in the input survive a round trip.
    pub(crate) fn push_raw(&mut self, name: String, tag: Tag) {
        self.entries.push((name, tag));
    }
}

impl Serialize for Compound {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, tag) in &self.entries {
            map.serialize_entry(name, tag)?;
        }
        map.end()
    }
}

/// A root tag with its name, as stored at the top of a payload.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct NamedTag {
    pub name: String,
    pub tag: Tag,
}

impl NamedTag {
    pub fn new(name: impl Into<String>, tag: impl Into<Tag>) -> Self {
        Self {
            name: name.into(),
            tag: tag.into(),
        }
    }

    /// Root compound, if the root is a compound.
    pub fn compound(&self) -> Option<&Compound> {
        self.tag.as_compound()
    }

    pub fn compound_mut(&mut self) -> Option<&mut Compound> {
        self.tag.as_compound_mut()
    }
}

impl Default for NamedTag {
    fn default() -> Self {
        Self::new("", Compound::new())
    }
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
