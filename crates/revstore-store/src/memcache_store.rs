/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This software may be used and distributed according to the terms of the
 * GNU General Public License version 2.
 */

//! Best-effort remote cache backed by the `memcache` crate. Non-iterable;
//! `len` is not meaningful for a shared remote cache. Grounded on
//! `storage/memcached.py`.

use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use futures::stream::BoxStream;
use revstore_core::Error;
use revstore_core::Result;

use crate::BytesStore;

pub struct MemcacheStore {
    url: String,
    client: Mutex<Option<memcache::Client>>,
}

impl MemcacheStore {
    pub fn new(url: impl Into<String>) -> Self {
        MemcacheStore {
            url: url.into(),
            client: Mutex::new(None),
        }
    }

    fn with_open<T>(&self, f: impl FnOnce(&memcache::Client) -> Result<T>) -> Result<T> {
        let guard = self.client.lock().unwrap();
        match guard.as_ref() {
            Some(client) => f(client),
            None => Err(Error::NotFound("memcache store is not open".to_owned())),
        }
    }
}

#[async_trait]
impl BytesStore for MemcacheStore {
    /// There is no server-side notion of "create" for a shared cache; this
    /// just establishes the client connection, same as `open`.
    async fn create(&self) -> Result<()> {
        self.open().await
    }

    async fn open(&self) -> Result<()> {
        let client = memcache::Client::connect(self.url.as_str())
            .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
        *self.client.lock().unwrap() = Some(client);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        *self.client.lock().unwrap() = None;
        Ok(())
    }

    /// Flushing the shared cache on `destroy` would affect every other
    /// process using it; best-effort here means dropping our own handle.
    async fn destroy(&self) -> Result<()> {
        self.close().await
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        self.with_open(|client| {
            let value: Option<Vec<u8>> = client
                .get(key)
                .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
            value
                .map(Bytes::from)
                .ok_or_else(|| Error::NotFound(key.to_owned()))
        })
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<()> {
        self.with_open(|client| {
            client
                .set(key, &value[..], 0)
                .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))
        })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.with_open(|client| {
            let existed = client
                .delete(key)
                .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
            if existed {
                Ok(())
            } else {
                Err(Error::NotFound(key.to_owned()))
            }
        })
    }

    async fn iter_keys(&self) -> Result<BoxStream<'static, Result<String>>> {
        Ok(Box::pin(stream::empty()))
    }

    async fn len(&self) -> Result<usize> {
        Err(Error::Config(
            "len() is not meaningful for a remote cache store".to_owned(),
        ))
    }
}
