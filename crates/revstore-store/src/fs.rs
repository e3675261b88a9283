/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This software may be used and distributed according to the terms of the
 * GNU General Public License version 2.
 */

//! One file per key under a root directory. Grounded on `storage/fs.py`,
//! with the `walkdir`-style iteration `fileblob` uses.

use std::path::Path;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use futures::stream::BoxStream;
use futures::StreamExt;
use revstore_core::Error;
use revstore_core::Result;

use crate::BytesStore;

/// Keys are used verbatim as filenames; reject anything that could escape
/// the store root or address a nested path.
fn validate_key(key: &str) -> Result<()> {
    if key.is_empty()
        || key.contains('/')
        || key.contains('\\')
        || key == "."
        || key == ".."
        || key.contains('\0')
    {
        return Err(Error::Corrupt(format!("unsafe store key: {:?}", key)));
    }
    Ok(())
}

pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsStore { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl BytesStore for FsStore {
    async fn create(&self) -> Result<()> {
        if self.root.exists() {
            return Err(Error::AlreadyExists(format!(
                "{} already exists",
                self.root.display()
            )));
        }
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    async fn open(&self) -> Result<()> {
        if !self.root.is_dir() {
            return Err(Error::NotFound(format!(
                "{} does not exist",
                self.root.display()
            )));
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    async fn destroy(&self) -> Result<()> {
        if self.root.exists() {
            tokio::fs::remove_dir_all(&self.root).await?;
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(key.to_owned()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<()> {
        let path = self.path_for(key)?;
        tokio::fs::write(&path, &value[..]).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(key.to_owned()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn iter_keys(&self) -> Result<BoxStream<'static, Result<String>>> {
        let root = self.root.clone();
        let keys = tokio::task::spawn_blocking(move || collect_keys(&root))
            .await
            .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))??;
        Ok(stream::iter(keys.into_iter().map(Ok)).boxed())
    }

    async fn len(&self) -> Result<usize> {
        let root = self.root.clone();
        let keys = tokio::task::spawn_blocking(move || collect_keys(&root))
            .await
            .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))??;
        Ok(keys.len())
    }
}

fn collect_keys(root: &Path) -> Result<Vec<String>> {
    let mut keys = Vec::new();
    for entry in walkdir::WalkDir::new(root).min_depth(1).max_depth(1) {
        let entry =
            entry.map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
        if entry.file_type().is_file() {
            keys.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    Ok(keys)
}
