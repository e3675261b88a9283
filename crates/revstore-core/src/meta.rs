/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This software may be used and distributed according to the terms of the
 * GNU General Public License version 2.
 */

use std::convert::TryFrom;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::config;
use crate::DataId;
use crate::ItemId;
use crate::RevId;

/// Revision metadata: an unordered mapping from short ASCII keys to
/// JSON-compatible values (spec.md "Data model"). Backed by a
/// `serde_json::Map` so it serializes bit-for-bit as the UTF-8 JSON the
/// backend persists, while offering typed accessors for the well-known keys.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Metadata(Map<String, Value>);

impl Metadata {
    pub fn new() -> Self {
        Metadata(Map::new())
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Metadata(map)
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    fn get_id<T: FromStr>(&self, key: &str) -> Option<T> {
        self.get_str(key).and_then(|s| T::from_str(s).ok())
    }

    pub fn revid(&self) -> Option<RevId> {
        self.get_id(config::REVID)
    }

    pub fn set_revid(&mut self, id: RevId) {
        self.set(config::REVID, id.to_string());
    }

    pub fn dataid(&self) -> Option<DataId> {
        self.get_id(config::DATAID)
    }

    pub fn set_dataid(&mut self, id: DataId) {
        self.set(config::DATAID, id.to_string());
    }

    pub fn itemid(&self) -> Option<ItemId> {
        self.get_id(config::ITEMID)
    }

    pub fn set_itemid(&mut self, id: ItemId) {
        self.set(config::ITEMID, id.to_string());
    }

    pub fn size(&self) -> Option<u64> {
        self.get_i64(config::SIZE).and_then(|n| u64::try_from(n).ok())
    }

    pub fn set_size(&mut self, size: u64) {
        self.set(config::SIZE, size);
    }

    pub fn name(&self) -> Option<&str> {
        self.get_str(config::NAME)
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.set(config::NAME, name.into());
    }

    /// UNIX UTC seconds; `None` if the caller never set one (e.g. untouched
    /// test fixtures) -- the indexer treats a missing mtime as zero when
    /// sorting for "latest revision".
    pub fn mtime(&self) -> Option<i64> {
        self.get_i64(config::MTIME)
    }

    pub fn set_mtime(&mut self, mtime: i64) {
        self.set(config::MTIME, mtime);
    }

    pub fn acl(&self) -> Option<&str> {
        self.get_str(config::ACL)
    }

    pub fn set_acl(&mut self, acl: impl Into<String>) {
        self.set(config::ACL, acl.into());
    }

    pub fn comment(&self) -> Option<&str> {
        self.get_str(config::COMMENT)
    }

    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.set(config::COMMENT, comment.into());
    }

    /// The content digest stored under the process-wide hash algorithm's own
    /// name (e.g. `meta["sha1"]`).
    pub fn hash(&self, hash_algorithm: &str) -> Option<&str> {
        self.get_str(hash_algorithm)
    }

    pub fn set_hash(&mut self, hash_algorithm: &str, digest_hex: impl Into<String>) {
        self.set(hash_algorithm.to_owned(), digest_hex.into());
    }
}
