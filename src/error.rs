//! Error kinds shared across the storage engine, query layer and HTTP surface.
//!
//! One `thiserror` enum, one crate-local `Result` alias.

use std::io;
use std::path::PathBuf;
use std::time::SystemTimeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LsmError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("system time error: {0}")]
    Time(#[from] SystemTimeError),

    #[error("lock poisoned: {0}")]
    LockPoisoned(&'static str),

    #[error("malformed line: {0}")]
    MalformedLine(String),

    #[error("malformed query: {0}")]
    MalformedQuery(String),

    #[error("invalid sstable at {0}")]
    InvalidSstable(PathBuf),
}

pub type Result<T> = std::result::Result<T, LsmError>;
