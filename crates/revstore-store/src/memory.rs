/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This software may be used and distributed according to the terms of the
 * GNU General Public License version 2.
 */

//! Non-persistent `BytesStore` backed by a mutex-guarded hash map. Grounded
//! on `storage/memory.py`.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use futures::stream::BoxStream;
use futures::StreamExt;
use revstore_core::Error;
use revstore_core::Result;

use crate::BytesStore;

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<Option<HashMap<String, Bytes>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            state: Mutex::new(None),
        }
    }

    fn with_open<T>(&self, f: impl FnOnce(&mut HashMap<String, Bytes>) -> Result<T>) -> Result<T> {
        let mut guard = self.state.lock().unwrap();
        match guard.as_mut() {
            Some(map) => f(map),
            None => Err(Error::NotFound("store is not open".to_owned())),
        }
    }
}

#[async_trait]
impl BytesStore for MemoryStore {
    async fn create(&self) -> Result<()> {
        let mut guard = self.state.lock().unwrap();
        *guard = Some(HashMap::new());
        Ok(())
    }

    async fn open(&self) -> Result<()> {
        let guard = self.state.lock().unwrap();
        if guard.is_some() {
            Ok(())
        } else {
            Err(Error::NotFound("store was never created".to_owned()))
        }
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    async fn destroy(&self) -> Result<()> {
        let mut guard = self.state.lock().unwrap();
        *guard = None;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        self.with_open(|map| {
            map.get(key)
                .cloned()
                .ok_or_else(|| Error::NotFound(key.to_owned()))
        })
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<()> {
        self.with_open(|map| {
            map.insert(key.to_owned(), value);
            Ok(())
        })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.with_open(|map| {
            map.remove(key)
                .map(|_| ())
                .ok_or_else(|| Error::NotFound(key.to_owned()))
        })
    }

    async fn iter_keys(&self) -> Result<BoxStream<'static, Result<String>>> {
        let keys: Vec<String> = self.with_open(|map| Ok(map.keys().cloned().collect()))?;
        Ok(stream::iter(keys.into_iter().map(Ok)).boxed())
    }

    async fn len(&self) -> Result<usize> {
        self.with_open(|map| Ok(map.len()))
    }
}
