/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This software may be used and distributed according to the terms of the
 * GNU General Public License version 2.
 */

//! Global constants, grouped into an immutable value created at startup
//! instead of process-wide mutable globals (see the Design Notes on global
//! constants in the originating specification).

/// Metadata key: the revision id.
pub const REVID: &str = "revid";
/// Metadata key: the data (payload) id.
pub const DATAID: &str = "dataid";
/// Metadata key: the item id.
pub const ITEMID: &str = "itemid";
/// Metadata key: payload size in bytes.
pub const SIZE: &str = "size";
/// Metadata key: the item's display name.
pub const NAME: &str = "name";
/// Metadata key: content type / mimetype.
pub const CONTENTTYPE: &str = "contenttype";
/// Metadata key: UNIX UTC timestamp, seconds.
pub const MTIME: &str = "mtime";
/// Metadata key: free-form tag list.
pub const TAGS: &str = "tags";
/// Metadata key: access-control list string (`"user:cap user2:cap2 ..."`).
pub const ACL: &str = "acl";
/// Metadata key: free-form comment, also used to mark cleared revisions.
pub const COMMENT: &str = "comment";
/// Metadata key: the action that produced this revision (save, revert, ...).
pub const ACTION: &str = "action";
/// Metadata key: client network address of the writer.
pub const ADDRESS: &str = "address";
/// Metadata key: client hostname of the writer.
pub const HOSTNAME: &str = "hostname";
/// Metadata key: id of the user who wrote this revision.
pub const USERID: &str = "userid";
/// Metadata key: content language tag.
pub const LANGUAGE: &str = "language";
/// Metadata key: item names this revision links to.
pub const ITEMLINKS: &str = "itemlinks";
/// Metadata key: item names this revision transcludes.
pub const ITEMTRANSCLUSIONS: &str = "itemtransclusions";
/// Metadata key: user-profile email (only meaningful on profile items).
pub const EMAIL: &str = "email";
/// Metadata key: user-profile openid (only meaningful on profile items).
pub const OPENID: &str = "openid";

/// Sentinel comment written by `clear_revision` when the caller supplies none.
pub const CLEARED_COMMENT: &str = "destroyed";

/// Process-wide configuration: which hash algorithm backs the content digest
/// stored alongside every revision, and its metadata key name. Both must
/// agree (the key literally is the algorithm name), so they are bundled here
/// rather than left as two independent constants a caller could desync.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    hash_algorithm: &'static str,
}

impl Config {
    /// The default install: SHA-1, matching `HASH_ALGORITHM = 'sha1'` in the
    /// original configuration module.
    pub fn new() -> Self {
        Config {
            hash_algorithm: "sha1",
        }
    }

    /// The metadata key (and algorithm name) used for the content digest.
    pub fn hash_algorithm(&self) -> &'static str {
        self.hash_algorithm
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
