// error.rs — map load errors

use std::fmt;

use crate::qfiles::LumpKind;

/// Errors that can occur while loading a BSP map.
///
/// Every variant aborts the load in progress; a `Map` is only handed out once all lumps
/// decoded and the tree validated.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadError {
    /// The file could not be read.
    Io { path: String },
    /// The buffer is shorter than the lump directory.
    TruncatedHeader { len: usize },
    /// The version tag is not the one BSP29 loader understands.
    FormatVersionMismatch { found: i32, expected: i32 },
    /// A lump descriptor points outside the buffer.
    LumpOutOfBounds { kind: LumpKind, fileofs: i32, filelen: i32, buffer_len: usize },
    /// A lump's size is not a whole number of records.
    MalformedChunk { kind: LumpKind, size: usize, record_size: usize },
    /// A lump holds more records than the format allows.
    TooManyRecords { kind: LumpKind, count: usize, max: usize },
    /// A lump's contents are internally inconsistent.
    BadLumpData { kind: LumpKind, reason: String },
    /// A record refers to an element that does not exist.
    BadIndex { kind: LumpKind, record: usize, index: i64, count: usize },
    /// A leaf carries a contents code outside the known set.
    BadLeafContents { leaf: usize, contents: i32 },
    /// A texture is not a multiple of 16 texels in each direction.
    IllegalTextureDimensions { name: String, width: u32, height: u32 },
    /// The node graph has a cycle or a node with two parents.
    NonAcyclicTree { kind: LumpKind, node: usize },
}

impl LoadError {
    /// Errors in this class mean the map can never be used safely. The engine treats them
    /// as fatal rather than dropping back to the console.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LoadError::IllegalTextureDimensions { .. } | LoadError::NonAcyclicTree { .. }
        )
    }

    pub(crate) fn bad_data<S: Into<String>>(kind: LumpKind, reason: S) -> Self {
        LoadError::BadLumpData { kind, reason: reason.into() }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Io { path } => write!(f, "couldn't load {}", path),
            LoadError::TruncatedHeader { len } => {
                write!(f, "file too short for a BSP header ({} bytes)", len)
            }
            LoadError::FormatVersionMismatch { found, expected } => write!(
                f,
                "wrong version number ({} should be {})",
                found, expected
            ),
            LoadError::LumpOutOfBounds { kind, fileofs, filelen, buffer_len } => write!(
                f,
                "{} lump ({} bytes at {}) lies outside the {} byte file",
                kind, filelen, fileofs, buffer_len
            ),
            LoadError::MalformedChunk { kind, size, record_size } => write!(
                f,
                "funny lump size ({}: {} bytes is not a multiple of {})",
                kind, size, record_size
            ),
            LoadError::TooManyRecords { kind, count, max } => {
                write!(f, "map has too many {} ({} > {})", kind, count, max)
            }
            LoadError::BadLumpData { kind, reason } => write!(f, "bad {} lump: {}", kind, reason),
            LoadError::BadIndex { kind, record, index, count } => write!(
                f,
                "{} record {} references index {} (only {} available)",
                kind, record, index, count
            ),
            LoadError::BadLeafContents { leaf, contents } => {
                write!(f, "leaf {} has unknown contents {}", leaf, contents)
            }
            LoadError::IllegalTextureDimensions { name, width, height } => write!(
                f,
                "texture {} is not 16 aligned ({}x{})",
                name, width, height
            ),
            LoadError::NonAcyclicTree { kind, node } => {
                write!(f, "{} {} is reached twice; tree is not acyclic", kind, node)
            }
        }
    }
}

impl std::error::Error for LoadError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_class() {
        let cycle = LoadError::NonAcyclicTree { kind: LumpKind::Nodes, node: 1 };
        let tex = LoadError::IllegalTextureDimensions { name: "sky1".into(), width: 20, height: 16 };
        let version = LoadError::FormatVersionMismatch { found: 30, expected: 29 };
        assert!(cycle.is_fatal());
        assert!(tex.is_fatal());
        assert!(!version.is_fatal());
    }

    #[test]
    fn display_mentions_lump() {
        let err = LoadError::MalformedChunk { kind: LumpKind::Planes, size: 41, record_size: 20 };
        let msg = err.to_string();
        assert!(msg.contains("planes"));
        assert!(msg.contains("41"));
    }
}
