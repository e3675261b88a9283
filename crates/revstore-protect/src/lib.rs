/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This software may be used and distributed according to the terms of the
 * GNU General Public License version 2.
 */

//! Per-item ACL capability checks wrapping the indexing middleware. Grounded
//! on `original_source/storage/middleware/protecting.py`.

mod capability;

pub use capability::Capability;

use std::sync::Arc;

use revstore_core::Error;
use revstore_core::Metadata;
use revstore_core::Result;
use revstore_index::Hit;
use revstore_index::IndexingMiddleware;
use revstore_index::View;
use tracing::instrument;

/// Wraps [`IndexingMiddleware`] with the same store/retrieve/remove/query
/// surface, denying any operation whose capability isn't granted by the
/// item's effective ACL (spec.md §4.5).
///
/// Unlike a design where the ACL lookup re-enters the gated surface of
/// `self` (requiring an explicit re-entrancy bypass flag), ACL lookups here
/// call straight through to the wrapped `IndexingMiddleware`, which has no
/// capability checks of its own -- so there is no recursion to guard
/// against. The flag survives in spirit as "look up through `self.index`,
/// never through `self`"; see DESIGN.md.
pub struct ProtectingMiddleware {
    index: Arc<IndexingMiddleware>,
    user_name: Option<String>,
    acl_support: bool,
}

impl ProtectingMiddleware {
    /// `user_name` identifies the caller of *this* middleware instance for
    /// ACL checks; a real application builds one `ProtectingMiddleware` per
    /// request, sharing the same `IndexingMiddleware`. Falls back to
    /// `index`'s own configured `user_name` when `None` is passed, matching
    /// a single-user/CLI-style deployment.
    pub fn new(index: Arc<IndexingMiddleware>, user_name: Option<String>) -> Self {
        let acl_support = index.config().acl_support;
        let user_name = user_name.or_else(|| index.config().user_name.clone());
        ProtectingMiddleware {
            index,
            user_name,
            acl_support,
        }
    }

    async fn acl_for_item(&self, itemid: &str) -> Result<Option<String>> {
        let hit = self.index.document(View::Latest, "itemid", itemid).await?;
        Ok(hit.and_then(|h| h.get("acl").and_then(acl_string)))
    }

    /// The grant rule of spec.md §4.5: capability `cap` is granted iff ACL
    /// support is off, or the item has no stored ACL and no user is set
    /// (open mode), or `"<user>:<cap>"` occurs in the stored ACL string.
    async fn check(&self, itemid: &str, cap: Capability) -> Result<()> {
        if !self.acl_support {
            return Ok(());
        }
        let acl = self.acl_for_item(itemid).await?;
        match (&acl, &self.user_name) {
            (None, None) => Ok(()),
            _ => {
                let granted = acl
                    .as_deref()
                    .map(|acl| match &self.user_name {
                        Some(user) => acl.contains(&format!("{}:{}", user, cap)),
                        None => false,
                    })
                    .unwrap_or(false);
                if granted {
                    Ok(())
                } else {
                    Err(Error::AccessDenied(format!(
                        "{} denied on item {}",
                        cap, itemid
                    )))
                }
            }
        }
    }

    /// Stores a revision, requiring `Create` if the item has no prior
    /// revisions, `Overwrite` if the caller supplied a `revid` that already
    /// exists, else `Write`.
    #[instrument(skip(self, meta, payload))]
    pub async fn store(&self, meta: Metadata, payload: &[u8]) -> Result<String> {
        // No `itemid` means a brand-new item: nothing to check it against
        // yet, `create` is implicitly granted the way the first write to an
        // empty store always is. An explicit `itemid` means a revision is
        // being added to (or an existing revid overwritten in) an item that
        // may already carry an ACL.
        if let Some(itemid) = meta.itemid() {
            let itemid = itemid.to_string();
            let cap = if let Some(revid) = meta.revid() {
                let revid = revid.to_string();
                if self.index.document(View::All, "revid", &revid).await?.is_some() {
                    Capability::Overwrite
                } else {
                    Capability::Write
                }
            } else {
                Capability::Write
            };
            self.check(&itemid, cap).await?;
        }

        let backend = self.index.config().backend.clone();
        let data: std::pin::Pin<Box<dyn tokio::io::AsyncRead + Send>> =
            Box::pin(std::io::Cursor::new(payload.to_vec()));
        let revid = backend.store(meta, data).await?;
        let (stored_meta, _) = backend.retrieve(&revid).await?;
        self.index.index_revision(&stored_meta, payload, false).await?;
        Ok(revid)
    }

    #[instrument(skip(self))]
    pub async fn retrieve(&self, revid: &str) -> Result<(Metadata, Vec<u8>)> {
        let backend = self.index.config().backend.clone();
        let (meta, mut data) = backend.retrieve(revid).await?;
        let itemid = meta.itemid().map(|i| i.to_string()).unwrap_or_default();
        self.check(&itemid, Capability::Read).await?;

        use tokio::io::AsyncReadExt;
        let mut payload = Vec::new();
        data.read_to_end(&mut payload).await?;
        Ok((meta, payload))
    }

    #[instrument(skip(self))]
    pub async fn remove(&self, revid: &str) -> Result<()> {
        let itemid = self
            .index
            .document(View::All, "revid", revid)
            .await?
            .and_then(|h| h.get("itemid").and_then(|v| v.as_str()).map(|s| s.to_owned()))
            .ok_or_else(|| Error::NotFound(format!("no such revision: {}", revid)))?;
        self.check(&itemid, Capability::Destroy).await?;

        let backend = self.index.config().backend.clone();
        backend.remove(revid).await?;
        self.index.remove_revision(revid).await
    }

    /// A single exact-match lookup, with the result dropped (not an error)
    /// if `Read` is denied for its item.
    pub async fn document(&self, view: View, field: &str, value: &str) -> Result<Option<Hit>> {
        Ok(self.filter_by_read(self.index.documents(view, field, value).await?).await?.into_iter().next())
    }

    pub async fn documents(&self, view: View, field: &str, value: &str) -> Result<Vec<Hit>> {
        self.filter_by_read(self.index.documents(view, field, value).await?).await
    }

    pub async fn search(&self, view: View, query: &str, fields: &[&str], limit: usize) -> Result<Vec<Hit>> {
        self.filter_by_read(self.index.search(view, query, fields, limit).await?).await
    }

    pub async fn search_page(
        &self,
        view: View,
        query: &str,
        fields: &[&str],
        pagenum: usize,
        pagelen: usize,
    ) -> Result<Vec<Hit>> {
        self.filter_by_read(self.index.search_page(view, query, fields, pagenum, pagelen).await?)
            .await
    }

    /// Testable Property 10: queries never surface a document for an item
    /// the caller cannot read.
    async fn filter_by_read(&self, hits: Vec<Hit>) -> Result<Vec<Hit>> {
        if !self.acl_support {
            return Ok(hits);
        }
        let mut kept = Vec::with_capacity(hits.len());
        for hit in hits {
            let itemid = hit.get("itemid").and_then(|v| v.as_str()).unwrap_or("").to_owned();
            if self.check(&itemid, Capability::Read).await.is_ok() {
                kept.push(hit);
            }
        }
        Ok(kept)
    }
}

fn acl_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Array(values) => {
            let strings: Vec<String> = values
                .iter()
                .filter_map(|v| v.as_str().map(|s| s.to_owned()))
                .collect();
            if strings.is_empty() {
                None
            } else {
                Some(strings.join(" "))
            }
        }
        _ => None,
    }
}
