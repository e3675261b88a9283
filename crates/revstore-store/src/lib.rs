/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This software may be used and distributed according to the terms of the
 * GNU General Public License version 2.
 */

//! The store layer: byte- or stream-valued key/value maps with an explicit
//! `create -> open -> {get/put/del/iter}* -> close -> [destroy]` lifecycle.

mod adaptors;
pub mod fs;
pub mod kv;
pub mod memcache_store;
pub mod memory;
pub mod sqlite;

pub use adaptors::BytesAsStreamStore;
pub use adaptors::StreamAsBytesStore;

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use revstore_core::Result;
use tokio::io::AsyncRead;

/// A key/value store whose values are read and written as whole in-memory
/// byte buffers.
#[async_trait]
pub trait BytesStore: Send + Sync {
    /// Make the store ready to use. Idempotent only w.r.t. "does not already
    /// exist"; calling `create` on a store that already has on-disk state is
    /// an error.
    async fn create(&self) -> Result<()>;

    /// Open a store previously `create`d. Fails with `NotFound` if there is
    /// no on-disk/in-memory state to open.
    async fn open(&self) -> Result<()>;

    /// Release whatever handle `open` acquired.
    async fn close(&self) -> Result<()>;

    /// Remove the store's on-disk/in-memory state entirely.
    async fn destroy(&self) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Bytes>;

    async fn put(&self, key: &str, value: Bytes) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Enumerate all keys currently present. Order is store-specific.
    async fn iter_keys(&self) -> Result<BoxStream<'static, Result<String>>>;

    /// Number of keys currently present. Not meaningful for every store (see
    /// `memcache_store`, which returns `Error::Config`).
    async fn len(&self) -> Result<usize>;
}

/// A key/value store whose values are read and written as streams, so large
/// payloads need not be buffered in memory by the caller.
#[async_trait]
pub trait StreamStore: Send + Sync {
    async fn create(&self) -> Result<()>;

    async fn open(&self) -> Result<()>;

    async fn close(&self) -> Result<()>;

    async fn destroy(&self) -> Result<()>;

    /// Returns a stream positioned at the start of the value. The caller is
    /// responsible for reading it to completion (or dropping it) promptly;
    /// stores may hold a handle open until then.
    async fn get(&self, key: &str) -> Result<Pin<Box<dyn AsyncRead + Send>>>;

    /// Reads `data` to EOF and stores it under `key`.
    async fn put(&self, key: &str, data: Pin<Box<dyn AsyncRead + Send>>) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    async fn iter_keys(&self) -> Result<BoxStream<'static, Result<String>>>;

    async fn len(&self) -> Result<usize>;
}
