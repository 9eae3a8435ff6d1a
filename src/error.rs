use std::{io, path::PathBuf};

use thiserror::Error;

use crate::machine::LifecycleState;

/// Reasons an action on the alarm machine was refused.
/// A refused action never changes state and never writes to the store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AlarmError {
    #[error("`{0}` is not a valid 24h time, expected HH:MM")]
    InvalidTime(String),

    #[error("add at least one photo before arming the alarm")]
    NoPhotos,

    #[error("the alarm is already armed, disarm it first")]
    AlreadyArmed,

    #[error("cannot arm while the alarm is {0}")]
    NotIdle(LifecycleState),

    #[error("there is no stored alarm to resume")]
    NothingToResume,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage is unavailable")]
    Unavailable,

    #[error("storage io error on `{key}`: {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },

    #[error("stored record `{key}` is malformed: {source}")]
    Malformed {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("couldn't encode record `{key}`: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    /// Whether the failure means the backend itself can't be reached,
    /// as opposed to a bad record sitting in an otherwise working store.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable | Self::Io { .. })
    }
}

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("couldn't read photo {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} is not a supported image", path.display())]
    NotAnImage { path: PathBuf },
}
