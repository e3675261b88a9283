/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This software may be used and distributed according to the terms of the
 * GNU General Public License version 2.
 */

//! Adaptors promoting a `BytesStore` to look like a `StreamStore` and vice
//! versa, buffering into memory at the `get`/`put` boundary (Design Note on
//! value polymorphism).

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use bytes::BytesMut;
use futures::stream::BoxStream;
use revstore_core::Result;
use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;

use crate::BytesStore;
use crate::StreamStore;

/// Makes a `BytesStore` usable where a `StreamStore` is expected.
pub struct BytesAsStreamStore<S> {
    inner: S,
}

impl<S> BytesAsStreamStore<S> {
    pub fn new(inner: S) -> Self {
        BytesAsStreamStore { inner }
    }
}

#[async_trait]
impl<S: BytesStore> StreamStore for BytesAsStreamStore<S> {
    async fn create(&self) -> Result<()> {
        self.inner.create().await
    }

    async fn open(&self) -> Result<()> {
        self.inner.open().await
    }

    async fn close(&self) -> Result<()> {
        self.inner.close().await
    }

    async fn destroy(&self) -> Result<()> {
        self.inner.destroy().await
    }

    async fn get(&self, key: &str) -> Result<Pin<Box<dyn AsyncRead + Send>>> {
        let bytes = self.inner.get(key).await?;
        let cursor = std::io::Cursor::new(bytes);
        Ok(Box::pin(cursor))
    }

    async fn put(&self, key: &str, mut data: Pin<Box<dyn AsyncRead + Send>>) -> Result<()> {
        let mut buf = BytesMut::new();
        loop {
            let n = data.read_buf(&mut buf).await?;
            if n == 0 {
                break;
            }
        }
        self.inner.put(key, buf.freeze()).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.delete(key).await
    }

    async fn iter_keys(&self) -> Result<BoxStream<'static, Result<String>>> {
        self.inner.iter_keys().await
    }

    async fn len(&self) -> Result<usize> {
        self.inner.len().await
    }
}

/// Makes a `StreamStore` usable where a `BytesStore` is expected.
pub struct StreamAsBytesStore<S> {
    inner: S,
}

impl<S> StreamAsBytesStore<S> {
    pub fn new(inner: S) -> Self {
        StreamAsBytesStore { inner }
    }
}

#[async_trait]
impl<S: StreamStore> BytesStore for StreamAsBytesStore<S> {
    async fn create(&self) -> Result<()> {
        self.inner.create().await
    }

    async fn open(&self) -> Result<()> {
        self.inner.open().await
    }

    async fn close(&self) -> Result<()> {
        self.inner.close().await
    }

    async fn destroy(&self) -> Result<()> {
        self.inner.destroy().await
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        let mut stream = self.inner.get(key).await?;
        let mut buf = BytesMut::new();
        loop {
            let n = stream.read_buf(&mut buf).await?;
            if n == 0 {
                break;
            }
        }
        Ok(buf.freeze())
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<()> {
        let cursor = std::io::Cursor::new(value);
        self.inner.put(key, Box::pin(cursor)).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.delete(key).await
    }

    async fn iter_keys(&self) -> Result<BoxStream<'static, Result<String>>> {
        self.inner.iter_keys().await
    }

    async fn len(&self) -> Result<usize> {
        self.inner.len().await
    }
}
