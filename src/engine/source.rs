//! Data sources handed to a playback backend.
//!
//! Raw platform descriptors are reached only through [`PlatformDescriptor`],
//! keeping descriptor extraction out of the state machine and the adapters.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::PlaybackError;

/// Narrow view of an open platform file.
pub trait PlatformDescriptor {
    /// Raw descriptor number, if the platform exposes one.
    fn raw_descriptor(&self) -> Option<i32>;

    /// Total size in bytes, if known.
    fn size(&self) -> Option<u64>;
}

#[cfg(unix)]
impl PlatformDescriptor for std::fs::File {
    fn raw_descriptor(&self) -> Option<i32> {
        use std::os::fd::AsRawFd;
        Some(self.as_raw_fd())
    }

    fn size(&self) -> Option<u64> {
        self.metadata().ok().map(|meta| meta.len())
    }
}

/// Content a session plays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataSource {
    Path { path: PathBuf },
    Uri { uri: String },
    Descriptor { raw: i32, offset: u64, length: u64 },
}

impl DataSource {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        DataSource::Path { path: path.into() }
    }

    pub fn uri(uri: impl Into<String>) -> Self {
        DataSource::Uri { uri: uri.into() }
    }

    /// Whole-file descriptor source.
    pub fn from_descriptor_whole(
        descriptor: &dyn PlatformDescriptor,
    ) -> Result<Self, PlaybackError> {
        let size = descriptor.size().ok_or_else(|| PlaybackError::InvalidArgument {
            reason: "descriptor size unavailable".to_string(),
        })?;
        Self::from_descriptor(descriptor, 0, size)
    }

    /// Descriptor source covering `length` bytes from `offset`.
    ///
    /// The range must lie within the file; a length running past the end is
    /// rejected rather than truncated.
    pub fn from_descriptor(
        descriptor: &dyn PlatformDescriptor,
        offset: u64,
        length: u64,
    ) -> Result<Self, PlaybackError> {
        let raw = descriptor
            .raw_descriptor()
            .filter(|raw| *raw >= 0)
            .ok_or_else(|| PlaybackError::InvalidArgument {
                reason: "descriptor is not valid".to_string(),
            })?;

        if let Some(size) = descriptor.size() {
            if offset > size {
                return Err(PlaybackError::InvalidArgument {
                    reason: format!("offset {} beyond file size {}", offset, size),
                });
            }
            if length > size - offset {
                return Err(PlaybackError::InvalidArgument {
                    reason: format!(
                        "length {} from offset {} exceeds file size {}",
                        length, offset, size
                    ),
                });
            }
        }

        Ok(DataSource::Descriptor {
            raw,
            offset,
            length,
        })
    }
}
