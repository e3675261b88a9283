/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This software may be used and distributed according to the terms of the
 * GNU General Public License version 2.
 */

use std::path::PathBuf;
use std::sync::Arc;

use revstore_router::RevisionBackend;

use crate::extractor::ContentExtractor;
use crate::extractor::PlainTextExtractor;

/// Configuration for the indexing middleware (spec.md §6): where the index
/// lives on disk, the backend it mirrors, the interwiki tag, the calling
/// user (consumed by the protecting layer), and whether ACL enforcement is
/// active at all.
pub struct IndexConfig {
    pub index_dir: PathBuf,
    pub backend: Arc<dyn RevisionBackend>,
    pub wikiname: String,
    pub user_name: Option<String>,
    pub acl_support: bool,
    pub extractor: Arc<dyn ContentExtractor>,
}

impl IndexConfig {
    pub fn new(index_dir: impl Into<PathBuf>, backend: Arc<dyn RevisionBackend>) -> Self {
        IndexConfig {
            index_dir: index_dir.into(),
            backend,
            wikiname: String::new(),
            user_name: None,
            acl_support: false,
            extractor: Arc::new(PlainTextExtractor),
        }
    }

    pub fn with_wikiname(mut self, wikiname: impl Into<String>) -> Self {
        self.wikiname = wikiname.into();
        self
    }

    pub fn with_user_name(mut self, user_name: impl Into<String>) -> Self {
        self.user_name = Some(user_name.into());
        self
    }

    pub fn with_acl_support(mut self, acl_support: bool) -> Self {
        self.acl_support = acl_support;
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn ContentExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// A sibling directory used as the build location for `rebuild`, swapped
    /// into place by `move_index`.
    pub fn temp_dir(&self) -> PathBuf {
        let mut name = self
            .index_dir
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".temp");
        self.index_dir.with_file_name(name)
    }
}
