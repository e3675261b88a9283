/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This software may be used and distributed according to the terms of the
 * GNU General Public License version 2.
 */

//! `BytesStore` over a single SQLite table `(key TEXT PRIMARY KEY, value
//! BLOB)`, with writes and deletes each a single-statement transaction.
//! Grounded on `storage/sqlite.py`.

use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use futures::stream::BoxStream;
use futures::StreamExt;
use revstore_core::Error;
use revstore_core::Result;
use rusqlite::params;
use rusqlite::Connection;
use rusqlite::OptionalExtension;

use crate::BytesStore;

/// Optional payload compression, applied uniformly to the whole table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Compression {
    None,
    Zstd { level: i32 },
}

pub struct SqliteStore {
    path: PathBuf,
    table: String,
    compression: Compression,
    conn: Mutex<Option<Connection>>,
}

impl SqliteStore {
    pub fn new(path: impl Into<PathBuf>, table: impl Into<String>) -> Self {
        SqliteStore {
            path: path.into(),
            table: table.into(),
            compression: Compression::None,
            conn: Mutex::new(None),
        }
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self.compression {
            Compression::None => Ok(data.to_vec()),
            Compression::Zstd { level } => {
                zstd::encode_all(data, level).map_err(|e| Error::Io(e))
            }
        }
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self.compression {
            Compression::None => Ok(data.to_vec()),
            Compression::Zstd { .. } => zstd::decode_all(data).map_err(|e| Error::Io(e)),
        }
    }

    fn with_conn<T: Send + 'static>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    ) -> Result<T>
    where
        T: 'static,
    {
        let guard = self.conn.lock().unwrap();
        let conn = guard
            .as_ref()
            .ok_or_else(|| Error::NotFound("sqlite store is not open".to_owned()))?;
        f(conn).map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))
    }
}

#[async_trait]
impl BytesStore for SqliteStore {
    async fn create(&self) -> Result<()> {
        if self.path.exists() {
            return Err(Error::AlreadyExists(format!(
                "{} already exists",
                self.path.display()
            )));
        }
        let conn = Connection::open(&self.path)
            .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
        conn.execute(
            &format!(
                "CREATE TABLE {} (key TEXT PRIMARY KEY, value BLOB NOT NULL)",
                self.table
            ),
            params![],
        )
        .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
        *self.conn.lock().unwrap() = Some(conn);
        Ok(())
    }

    async fn open(&self) -> Result<()> {
        if !self.path.exists() {
            return Err(Error::NotFound(format!(
                "{} does not exist",
                self.path.display()
            )));
        }
        let conn = Connection::open(&self.path)
            .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
        *self.conn.lock().unwrap() = Some(conn);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        *self.conn.lock().unwrap() = None;
        Ok(())
    }

    async fn destroy(&self) -> Result<()> {
        *self.conn.lock().unwrap() = None;
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        let table = self.table.clone();
        let key = key.to_owned();
        let raw: Option<Vec<u8>> = self.with_conn(move |conn| {
            conn.query_row(
                &format!("SELECT value FROM {} WHERE key = ?1", table),
                params![key],
                |row| row.get(0),
            )
            .optional()
        })?;
        let raw = raw.ok_or_else(|| Error::NotFound(key.clone()))?;
        Ok(Bytes::from(self.decompress(&raw)?))
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<()> {
        let table = self.table.clone();
        let key = key.to_owned();
        let compressed = self.compress(&value)?;
        self.with_conn(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO {} (key, value) VALUES (?1, ?2) \
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                    table
                ),
                params![key, compressed],
            )
            .map(|_| ())
        })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let table = self.table.clone();
        let key_owned = key.to_owned();
        let deleted = self.with_conn(move |conn| {
            conn.execute(
                &format!("DELETE FROM {} WHERE key = ?1", table),
                params![key_owned],
            )
        })?;
        if deleted == 0 {
            return Err(Error::NotFound(key.to_owned()));
        }
        Ok(())
    }

    async fn iter_keys(&self) -> Result<BoxStream<'static, Result<String>>> {
        let table = self.table.clone();
        let keys: Vec<String> = self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!("SELECT key FROM {}", table))?;
            let rows = stmt.query_map(params![], |row| row.get(0))?;
            rows.collect()
        })?;
        Ok(stream::iter(keys.into_iter().map(Ok)).boxed())
    }

    async fn len(&self) -> Result<usize> {
        let table = self.table.clone();
        let count: i64 = self.with_conn(move |conn| {
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), params![], |row| {
                row.get(0)
            })
        })?;
        Ok(count as usize)
    }
}
