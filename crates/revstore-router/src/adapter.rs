/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This software may be used and distributed according to the terms of the
 * GNU General Public License version 2.
 */

use std::pin::Pin;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use revstore_backend::Backend;
use revstore_core::Metadata;
use revstore_core::Result;
use revstore_core::RevId;
use revstore_store::BytesStore;
use revstore_store::StreamStore;
use tokio::io::AsyncRead;

use crate::RevisionBackend;

/// Adapts a concrete `Backend<M, D>` (whose revids are typed `RevId`) to the
/// hex-string-revid `RevisionBackend` trait the router multiplexes over.
pub struct BackendAdapter<M, D> {
    backend: Backend<M, D>,
}

impl<M, D> BackendAdapter<M, D> {
    pub fn new(backend: Backend<M, D>) -> Self {
        BackendAdapter { backend }
    }
}

#[async_trait]
impl<M: BytesStore, D: StreamStore> RevisionBackend for BackendAdapter<M, D> {
    async fn create(&self) -> Result<()> {
        self.backend.create().await
    }

    async fn open(&self) -> Result<()> {
        self.backend.open().await
    }

    async fn close(&self) -> Result<()> {
        self.backend.close().await
    }

    async fn destroy(&self) -> Result<()> {
        self.backend.destroy().await
    }

    async fn store(&self, meta: Metadata, data: Pin<Box<dyn AsyncRead + Send>>) -> Result<String> {
        let revid = self.backend.store(meta, data).await?;
        Ok(revid.to_string())
    }

    async fn retrieve(&self, revid: &str) -> Result<(Metadata, Pin<Box<dyn AsyncRead + Send>>)> {
        let revid: RevId = revid.parse()?;
        self.backend.retrieve(revid).await
    }

    async fn remove(&self, revid: &str) -> Result<()> {
        let revid: RevId = revid.parse()?;
        self.backend.remove(revid).await
    }

    async fn iter(&self) -> Result<BoxStream<'static, Result<String>>> {
        let ids = self.backend.iter().await?;
        Ok(ids.map(|r| r.map(|id| id.to_string())).boxed())
    }
}
