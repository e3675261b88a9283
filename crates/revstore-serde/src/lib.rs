/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This software may be used and distributed according to the terms of the
 * GNU General Public License version 2.
 */

//! Length-prefixed framed dump/restore of a revision backend (spec.md §4.6).
//! Grounded on `original_source/middleware/serializer.py` and
//! `storage/middleware/serialization.py` (two variants of the same wire
//! format; both agree, so there is no ambiguity to resolve).
//!
//! Frame: `i32` big-endian length `L` of UTF-8 JSON metadata, `L` JSON bytes,
//! then `meta["size"]` raw payload bytes. A zero-length frame ends the
//! stream.

use std::convert::TryFrom;
use std::pin::Pin;

use futures::StreamExt;
use revstore_core::Error;
use revstore_core::Metadata;
use revstore_core::Result;
use revstore_router::RevisionBackend;
use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;
use tracing::instrument;

/// Writes every revision in `backend` to `writer` as a sequence of framed
/// `(metadata, payload)` pairs, terminated by a zero-length frame.
#[instrument(skip(backend, writer))]
pub async fn serialize<W: AsyncWrite + Unpin>(backend: &dyn RevisionBackend, writer: &mut W) -> Result<()> {
    let mut revids = backend.iter().await?;
    while let Some(revid) = revids.next().await {
        let revid = revid?;
        let (meta, mut data) = backend.retrieve(&revid).await?;
        let expected_size = meta.size().ok_or_else(|| {
            Error::Corrupt(format!("revision {} has no size in its metadata", revid))
        })?;

        let json = serde_json::to_vec(&meta)
            .map_err(|e| Error::Corrupt(format!("failed to serialize metadata: {}", e)))?;
        let len = i32::try_from(json.len())
            .map_err(|_| Error::Corrupt("metadata frame too large to serialize".to_owned()))?;
        writer.write_i32(len).await?;
        writer.write_all(&json).await?;

        let copied = tokio::io::copy(&mut data, writer).await?;
        if copied != expected_size {
            return Err(Error::Corrupt(format!(
                "revision {} wrote {} payload bytes, metadata claims {}",
                revid, copied, expected_size
            )));
        }
    }
    writer.write_i32(0).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads frames written by [`serialize`] from `reader` and replays each
/// `(metadata, payload)` pair into `backend` via `store`, until a
/// zero-length frame is reached.
#[instrument(skip(backend, reader))]
pub async fn deserialize<R: AsyncRead + Unpin>(reader: &mut R, backend: &dyn RevisionBackend) -> Result<u64> {
    let mut restored = 0u64;
    loop {
        let len = reader.read_i32().await?;
        if len == 0 {
            break;
        }
        if len < 0 {
            return Err(Error::Corrupt(format!("negative metadata frame length: {}", len)));
        }

        let mut json = vec![0u8; len as usize];
        reader.read_exact(&mut json).await?;
        let meta: Metadata = serde_json::from_slice(&json)
            .map_err(|e| Error::Corrupt(format!("malformed metadata frame: {}", e)))?;
        let size = meta
            .size()
            .ok_or_else(|| Error::Corrupt("metadata frame has no size".to_owned()))?;

        // Always fully drain the limited reader ourselves, regardless of
        // whether `backend.store` reads the payload through (it may skip
        // the read entirely when the dataid is already present) -- the wire
        // format requires the reader to be exhausted before the next frame
        // either way.
        let mut limited = reader.take(size);
        let mut payload = Vec::with_capacity(size as usize);
        limited.read_to_end(&mut payload).await?;
        if payload.len() as u64 != size {
            return Err(Error::Corrupt(format!(
                "payload frame truncated: expected {} bytes, got {}",
                size,
                payload.len()
            )));
        }

        let cursor: Pin<Box<dyn AsyncRead + Send>> = Box::pin(std::io::Cursor::new(payload));
        backend.store(meta, cursor).await?;
        restored += 1;
    }
    Ok(restored)
}
