use std::{fmt, io, path::PathBuf};

use thiserror::Error;

/// Which attribute pool a face index points into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttributeKind {
    Position,
    TexCoord,
    Normal,
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AttributeKind::Position => "position",
            AttributeKind::TexCoord => "texcoord",
            AttributeKind::Normal => "normal",
        })
    }
}

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to open {kind} file '{}': {source}", path.display())]
    Open {
        kind: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{file}:{line}: failed to read line: {source}")]
    Read {
        file: String,
        line: usize,
        #[source]
        source: io::Error,
    },

    #[error("{file}:{line}: malformed face '{text}' (expected exactly three v/vt/vn triples)")]
    MalformedFace {
        file: String,
        line: usize,
        text: String,
    },

    #[error("{file}:{line}: malformed '{directive}' line '{text}'")]
    MalformedAttribute {
        file: String,
        line: usize,
        directive: &'static str,
        text: String,
    },

    #[error("{file}:{line}: {attribute} index {index} out of range ({available} declared so far)")]
    IndexOutOfRange {
        file: String,
        line: usize,
        attribute: AttributeKind,
        index: i64,
        available: usize,
    },

    #[error("failed to decode texture '{}': {source}", path.display())]
    TextureDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

pub type AssetResult<T> = Result<T, AssetError>;
