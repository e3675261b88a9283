/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This software may be used and distributed according to the terms of the
 * GNU General Public License version 2.
 */

//! The two-store revision backend: composes a metadata `BytesStore` and a
//! data `StreamStore` into an immutable revision store with content hashing
//! and UUID identity. Grounded on `backend/storages.py`'s `Backend` /
//! `MutableBackend`.

use std::pin::Pin;

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use revstore_core::Config;
use revstore_core::DataId;
use revstore_core::Error;
use revstore_core::ItemId;
use revstore_core::Metadata;
use revstore_core::Result;
use revstore_core::RevId;
use revstore_core::TrackingReader;
use revstore_store::BytesStore;
use revstore_store::StreamStore;
use sha1::Sha1;
use tokio::io::AsyncRead;
use tracing::instrument;

/// Composes a metadata store and a data store into a content-addressed
/// revision backend. Generic over the concrete store implementations, so any
/// pair from `revstore-store` (or a mix of two) can back it.
pub struct Backend<M, D> {
    meta_store: M,
    data_store: D,
    config: Config,
}

impl<M: BytesStore, D: StreamStore> Backend<M, D> {
    pub fn new(meta_store: M, data_store: D) -> Self {
        Backend {
            meta_store,
            data_store,
            config: Config::new(),
        }
    }

    pub fn with_config(meta_store: M, data_store: D, config: Config) -> Self {
        Backend {
            meta_store,
            data_store,
            config,
        }
    }

    pub async fn create(&self) -> Result<()> {
        self.meta_store.create().await?;
        self.data_store.create().await?;
        Ok(())
    }

    pub async fn open(&self) -> Result<()> {
        self.meta_store.open().await?;
        self.data_store.open().await?;
        Ok(())
    }

    pub async fn close(&self) -> Result<()> {
        self.meta_store.close().await?;
        self.data_store.close().await?;
        Ok(())
    }

    pub async fn destroy(&self) -> Result<()> {
        self.meta_store.destroy().await?;
        self.data_store.destroy().await?;
        Ok(())
    }

    /// Writes `(meta, data)`, assigning a fresh `revid`/`dataid` where absent,
    /// and returns the assigned `revid`. Implements the five-step algorithm
    /// from the backend design: hash-and-measure unless `dataid` is already
    /// present (caller-supplied, trusted and deduplicated), then commit
    /// metadata last.
    #[instrument(skip(self, meta, data))]
    pub async fn store(
        &self,
        mut meta: Metadata,
        data: Pin<Box<dyn AsyncRead + Send>>,
    ) -> Result<RevId> {
        if meta.dataid().is_none() {
            let dataid = DataId::new();
            let (tracked, handle) = TrackingReader::new(data, Sha1::new());
            self.data_store
                .put(&dataid.as_hex(), Box::pin(tracked))
                .await?;

            let measured_size = handle.bytes_read();
            let measured_hash = handle.hash_hex();

            if let Some(claimed_size) = meta.size() {
                if claimed_size != measured_size {
                    return Err(Error::Mismatch(format!(
                        "claimed size {} != measured size {}",
                        claimed_size, measured_size
                    )));
                }
            }
            if let Some(claimed_hash) = meta.hash(self.config.hash_algorithm()) {
                if claimed_hash != measured_hash {
                    return Err(Error::Mismatch(format!(
                        "claimed {} {} != measured {}",
                        self.config.hash_algorithm(),
                        claimed_hash,
                        measured_hash
                    )));
                }
            }

            meta.set_dataid(dataid);
            meta.set_size(measured_size);
            meta.set_hash(self.config.hash_algorithm(), measured_hash);
        } else {
            // Caller-supplied dataid: trust it, and only write the payload if
            // it is not already present (idempotent re-store, e.g. `clear`
            // reusing the same empty-payload dataid across revisions).
            let dataid = meta.dataid().expect("checked above");
            if self.data_store.get(&dataid.as_hex()).await.is_err() {
                self.data_store.put(&dataid.as_hex(), data).await?;
            }
        }

        let revid = meta.revid().unwrap_or_else(RevId::new);
        meta.set_revid(revid);
        let itemid = meta.itemid().unwrap_or_else(ItemId::new);
        meta.set_itemid(itemid);

        let json = serde_json::to_vec(&meta)
            .map_err(|e| Error::Corrupt(format!("failed to serialize metadata: {}", e)))?;
        self.meta_store
            .put(&revid.as_hex(), Bytes::from(json))
            .await?;

        Ok(revid)
    }

    /// Reads and JSON-decodes the metadata for `revid`, then opens the
    /// referenced payload stream.
    #[instrument(skip(self))]
    pub async fn retrieve(
        &self,
        revid: RevId,
    ) -> Result<(Metadata, Pin<Box<dyn AsyncRead + Send>>)> {
        let raw = self.meta_store.get(&revid.as_hex()).await?;
        let meta: Metadata = serde_json::from_slice(&raw)
            .map_err(|e| Error::Corrupt(format!("malformed metadata for {}: {}", revid, e)))?;
        let dataid = meta
            .dataid()
            .ok_or_else(|| Error::Corrupt(format!("metadata for {} has no dataid", revid)))?;
        let data = self.data_store.get(&dataid.as_hex()).await?;
        Ok((meta, data))
    }

    /// Deletes metadata then data. Not atomic: a crash between the two steps
    /// leaves an orphan payload, reclaimed by a later GC pass.
    #[instrument(skip(self))]
    pub async fn remove(&self, revid: RevId) -> Result<()> {
        let raw = self.meta_store.get(&revid.as_hex()).await?;
        let meta: Metadata = serde_json::from_slice(&raw)
            .map_err(|e| Error::Corrupt(format!("malformed metadata for {}: {}", revid, e)))?;
        self.meta_store.delete(&revid.as_hex()).await?;
        if let Some(dataid) = meta.dataid() {
            // Payload may already be gone (race with another remove sharing
            // the same dataid); that is not an error here.
            let _ = self.data_store.delete(&dataid.as_hex()).await;
        }
        Ok(())
    }

    /// Enumerates every `revid` present in the metadata store.
    pub async fn iter(&self) -> Result<BoxStream<'static, Result<RevId>>> {
        let keys = self.meta_store.iter_keys().await?;
        Ok(keys
            .map(|key| {
                let key = key?;
                key.parse::<RevId>()
            })
            .boxed())
    }

    /// Garbage-collects payloads in the data store that no live revision's
    /// metadata references any more (spec.md §5 `optimize_storage`: reclaims
    /// space left behind by `remove`'s non-atomic delete-meta-then-data, and
    /// by any dataid that lost its last referencing revision). Does not
    /// deduplicate on write -- `store` already does that via the
    /// caller-supplied-dataid idempotent path -- only GC of the orphaned
    /// remainder.
    #[instrument(skip(self))]
    pub async fn optimize_storage(&self) -> Result<u64> {
        use std::collections::HashSet;

        let mut referenced = HashSet::new();
        let mut revids = self.meta_store.iter_keys().await?;
        while let Some(key) = revids.next().await {
            let key = key?;
            let raw = self.meta_store.get(&key).await?;
            let meta: Metadata = serde_json::from_slice(&raw)
                .map_err(|e| Error::Corrupt(format!("malformed metadata for {}: {}", key, e)))?;
            if let Some(dataid) = meta.dataid() {
                referenced.insert(dataid.as_hex());
            }
        }

        let mut removed = 0u64;
        let mut data_keys = self.data_store.iter_keys().await?;
        while let Some(key) = data_keys.next().await {
            let key = key?;
            if !referenced.contains(&key) {
                self.data_store.delete(&key).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
