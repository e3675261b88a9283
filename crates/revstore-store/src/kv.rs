/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This software may be used and distributed according to the terms of the
 * GNU General Public License version 2.
 */

//! Single-file embedded KV store, the idiomatic-Rust analog of the source's
//! `kyotocabinet` binding. Writer-with-auto-transaction by default, single
//! writer. Grounded on `storage/kc.py`.

use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use chacha20poly1305::aead::Aead;
use chacha20poly1305::aead::NewAead;
use chacha20poly1305::ChaCha20Poly1305;
use chacha20poly1305::Key;
use chacha20poly1305::Nonce;
use futures::stream;
use futures::stream::BoxStream;
use futures::StreamExt;
use rand::RngCore;
use revstore_core::Error;
use revstore_core::Result;

use crate::BytesStore;

const NONCE_LEN: usize = 12;

/// Optional payload compression, applied uniformly to the whole store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Compression {
    None,
    Zstd { level: i32 },
}

/// Optional transparent encryption, applied after compression. The key is
/// fixed at construction; each value gets its own random nonce, stored
/// alongside the ciphertext.
#[derive(Clone)]
pub enum Encryption {
    None,
    ChaCha20Poly1305 { key: [u8; 32] },
}

pub struct KvStore {
    path: PathBuf,
    compression: Compression,
    encryption: Encryption,
    db: Mutex<Option<sled::Db>>,
}

impl KvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        KvStore {
            path: path.into(),
            compression: Compression::None,
            encryption: Encryption::None,
            db: Mutex::new(None),
        }
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_encryption(mut self, encryption: Encryption) -> Self {
        self.encryption = encryption;
        self
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self.compression {
            Compression::None => Ok(data.to_vec()),
            Compression::Zstd { level } => zstd::encode_all(data, level).map_err(Error::Io),
        }
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self.compression {
            Compression::None => Ok(data.to_vec()),
            Compression::Zstd { .. } => zstd::decode_all(data).map_err(Error::Io),
        }
    }

    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        match &self.encryption {
            Encryption::None => Ok(data.to_vec()),
            Encryption::ChaCha20Poly1305 { key } => {
                let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
                let mut nonce_bytes = [0u8; NONCE_LEN];
                rand::thread_rng().fill_bytes(&mut nonce_bytes);
                let nonce = Nonce::from_slice(&nonce_bytes);
                let ciphertext = cipher
                    .encrypt(nonce, data)
                    .map_err(|_| Error::Corrupt("failed to encrypt value".to_owned()))?;
                let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
                out.extend_from_slice(&nonce_bytes);
                out.extend_from_slice(&ciphertext);
                Ok(out)
            }
        }
    }

    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        match &self.encryption {
            Encryption::None => Ok(data.to_vec()),
            Encryption::ChaCha20Poly1305 { key } => {
                if data.len() < NONCE_LEN {
                    return Err(Error::Corrupt("encrypted value shorter than a nonce".to_owned()));
                }
                let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
                let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
                let nonce = Nonce::from_slice(nonce_bytes);
                cipher
                    .decrypt(nonce, ciphertext)
                    .map_err(|_| Error::Corrupt("failed to decrypt value".to_owned()))
            }
        }
    }

    fn with_open<T>(&self, f: impl FnOnce(&sled::Db) -> Result<T>) -> Result<T> {
        let guard = self.db.lock().unwrap();
        match guard.as_ref() {
            Some(db) => f(db),
            None => Err(Error::NotFound("kv store is not open".to_owned())),
        }
    }
}

fn open_db(path: &std::path::Path) -> Result<sled::Db> {
    sled::open(path).map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))
}

#[async_trait]
impl BytesStore for KvStore {
    async fn create(&self) -> Result<()> {
        if self.path.exists() {
            return Err(Error::AlreadyExists(format!(
                "{} already exists",
                self.path.display()
            )));
        }
        let db = open_db(&self.path)?;
        *self.db.lock().unwrap() = Some(db);
        Ok(())
    }

    async fn open(&self) -> Result<()> {
        if !self.path.exists() {
            return Err(Error::NotFound(format!(
                "{} does not exist",
                self.path.display()
            )));
        }
        let db = open_db(&self.path)?;
        *self.db.lock().unwrap() = Some(db);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        *self.db.lock().unwrap() = None;
        Ok(())
    }

    async fn destroy(&self) -> Result<()> {
        *self.db.lock().unwrap() = None;
        if self.path.exists() {
            std::fs::remove_dir_all(&self.path).or_else(|_| std::fs::remove_file(&self.path))?;
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        let raw = self.with_open(|db| {
            let ivec = db
                .get(key.as_bytes())
                .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
                .ok_or_else(|| Error::NotFound(key.to_owned()))?;
            Ok(ivec.to_vec())
        })?;
        let decrypted = self.decrypt(&raw)?;
        Ok(Bytes::from(self.decompress(&decrypted)?))
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<()> {
        let compressed = self.compress(&value)?;
        let encrypted = self.encrypt(&compressed)?;
        self.with_open(|db| {
            db.insert(key.as_bytes(), encrypted)
                .map(|_| ())
                .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))
        })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.with_open(|db| {
            let existed = db
                .remove(key.as_bytes())
                .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
            existed
                .map(|_| ())
                .ok_or_else(|| Error::NotFound(key.to_owned()))
        })
    }

    async fn iter_keys(&self) -> Result<BoxStream<'static, Result<String>>> {
        let keys: Vec<String> = self.with_open(|db| {
            db.iter()
                .keys()
                .map(|r| {
                    r.map(|ivec| String::from_utf8_lossy(&ivec).into_owned())
                        .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))
                })
                .collect()
        })?;
        Ok(stream::iter(keys.into_iter().map(Ok)).boxed())
    }

    async fn len(&self) -> Result<usize> {
        self.with_open(|db| Ok(db.len()))
    }
}
