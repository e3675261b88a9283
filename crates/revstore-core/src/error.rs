/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This software may be used and distributed according to the terms of the
 * GNU General Public License version 2.
 */

use thiserror::Error as ThisError;

/// Error taxonomy shared by every layer of the revision store (store, backend,
/// router, indexer, protecting middleware). These are error *kinds*, not a
/// single catch-all: callers match on the variant to decide retry/propagate.
#[derive(Debug, ThisError)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("mismatch: {0}")]
    Mismatch(String),

    #[error("corrupt: {0}")]
    Corrupt(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("conflict: {0}")]
    Conflict(String),
}

pub type Result<T> = std::result::Result<T, Error>;
