//! Output file naming and base-name validation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SdsioError};

/// File extension of every stream file.
pub const SDS_EXTENSION: &str = "sds";

/// How the file index is combined with the base name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FileNaming {
    /// `<name>.<index>.sds`
    #[default]
    Indexed,
    /// `<name><index>.sds`
    Legacy,
}

impl FileNaming {
    /// File name for `base_name` at file index `index`.
    pub fn file_name(self, base_name: &str, index: u32) -> String {
        match self {
            FileNaming::Indexed => format!("{base_name}.{index}.{SDS_EXTENSION}"),
            FileNaming::Legacy => format!("{base_name}{index}.{SDS_EXTENSION}"),
        }
    }

    /// Full path under `root`.
    pub fn path(self, root: &Path, base_name: &str, index: u32) -> PathBuf {
        root.join(self.file_name(base_name, index))
    }
}

/// Decode the base name carried in an Open payload.
///
/// Only the bytes before the first NUL are used. The result must be valid
/// UTF-8, non-empty, and a single path component.
pub fn decode_base_name(payload: &[u8]) -> Result<String> {
    let raw = payload.split(|&b| b == 0).next().unwrap_or_default();
    let name = std::str::from_utf8(raw)
        .map_err(|_| SdsioError::InvalidName(String::from_utf8_lossy(raw).into_owned()))?;

    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.chars().any(char::is_control);
    if invalid {
        return Err(SdsioError::InvalidName(name.to_string()));
    }

    Ok(name.to_string())
}
