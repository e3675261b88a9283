/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This software may be used and distributed according to the terms of the
 * GNU General Public License version 2.
 */

//! `IndexingMiddleware`: mirrors every backend revision into two tantivy
//! views and serves lookups/search/rebuild/update on top of them. Grounded
//! on `middleware/indexing.py`.

use std::collections::HashSet;
use std::sync::Mutex;

use revstore_core::Error;
use revstore_core::Metadata;
use revstore_core::Result;
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::query::TermQuery;
use tantivy::schema::IndexRecordOption;
use tantivy::Document;
use tantivy::Index;
use tantivy::IndexWriter;
use tantivy::Term;
use tracing::instrument;

use crate::assemble::assemble_all_revs;
use crate::assemble::assemble_latest_revs;
use crate::config::IndexConfig;
use crate::grouping::latest_per_item;
use crate::grouping::Candidate;
use crate::schema::build_all_revs_schema;
use crate::schema::build_latest_revs_schema;
use crate::schema::AllRevsSchema;
use crate::schema::LatestRevsSchema;

/// Which of the two logical views a query targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum View {
    All,
    Latest,
}

/// A result row, as its stored fields. Query methods collect these eagerly
/// into a `Vec<Hit>`; the backing `tantivy::Searcher` is held only for the
/// duration of one query call.
pub type Hit = serde_json::Map<String, serde_json::Value>;

struct OpenIndexes {
    all_revs: Index,
    latest_revs: Index,
    all_writer: Option<IndexWriter>,
    latest_writer: Option<IndexWriter>,
}

const WRITER_HEAP_BYTES: usize = 50_000_000;

pub struct IndexingMiddleware {
    config: IndexConfig,
    all_schema: AllRevsSchema,
    latest_schema: LatestRevsSchema,
    open: Mutex<Option<OpenIndexes>>,
}

impl IndexingMiddleware {
    pub fn new(config: IndexConfig) -> Self {
        IndexingMiddleware {
            config,
            all_schema: build_all_revs_schema(),
            latest_schema: build_latest_revs_schema(),
            open: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    #[instrument(skip(self))]
    pub async fn create(&self) -> Result<()> {
        std::fs::create_dir_all(&self.config.index_dir)?;
        let all_dir = self.config.index_dir.join("all_revs");
        let latest_dir = self.config.index_dir.join("latest_revs");
        std::fs::create_dir_all(&all_dir)?;
        std::fs::create_dir_all(&latest_dir)?;
        let all_revs = Index::create_in_dir(&all_dir, self.all_schema.schema.clone())
            .map_err(index_err)?;
        let latest_revs = Index::create_in_dir(&latest_dir, self.latest_schema.schema.clone())
            .map_err(index_err)?;
        *self.open.lock().unwrap() = Some(OpenIndexes {
            all_revs,
            latest_revs,
            all_writer: None,
            latest_writer: None,
        });
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn open(&self) -> Result<()> {
        let all_dir = self.config.index_dir.join("all_revs");
        let latest_dir = self.config.index_dir.join("latest_revs");
        if !all_dir.is_dir() || !latest_dir.is_dir() {
            return Err(Error::NotFound(format!(
                "{} has no index to open",
                self.config.index_dir.display()
            )));
        }
        let all_revs = Index::open_in_dir(&all_dir).map_err(index_err)?;
        let latest_revs = Index::open_in_dir(&latest_dir).map_err(index_err)?;
        *self.open.lock().unwrap() = Some(OpenIndexes {
            all_revs,
            latest_revs,
            all_writer: None,
            latest_writer: None,
        });
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn close(&self) -> Result<()> {
        let mut guard = self.open.lock().unwrap();
        if let Some(mut open) = guard.take() {
            if let Some(mut w) = open.all_writer.take() {
                w.commit().map_err(index_err)?;
            }
            if let Some(mut w) = open.latest_writer.take() {
                w.commit().map_err(index_err)?;
            }
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn destroy(&self) -> Result<()> {
        *self.open.lock().unwrap() = None;
        if self.config.index_dir.exists() {
            std::fs::remove_dir_all(&self.config.index_dir)?;
        }
        Ok(())
    }

    fn with_open<T>(&self, f: impl FnOnce(&mut OpenIndexes) -> Result<T>) -> Result<T> {
        let mut guard = self.open.lock().unwrap();
        match guard.as_mut() {
            Some(open) => f(open),
            None => Err(Error::NotFound("index is not open".to_owned())),
        }
    }

    fn all_writer<'a>(open: &'a mut OpenIndexes) -> Result<&'a mut IndexWriter> {
        if open.all_writer.is_none() {
            open.all_writer = Some(open.all_revs.writer(WRITER_HEAP_BYTES).map_err(index_err)?);
        }
        Ok(open.all_writer.as_mut().unwrap())
    }

    fn latest_writer<'a>(open: &'a mut OpenIndexes) -> Result<&'a mut IndexWriter> {
        if open.latest_writer.is_none() {
            open.latest_writer =
                Some(open.latest_revs.writer(WRITER_HEAP_BYTES).map_err(index_err)?);
        }
        Ok(open.latest_writer.as_mut().unwrap())
    }

    /// Indexes one revision into both views: `update_document` semantics
    /// (delete-by-revid-term then add), because `clear_revision` re-indexes
    /// an existing revid. When `buffered` is false the writer commits
    /// immediately (synchronous); when true, the caller must eventually call
    /// [`Self::flush`] (asynchronous/batched writer).
    #[instrument(skip(self, meta, payload))]
    pub async fn index_revision(&self, meta: &Metadata, payload: &[u8], buffered: bool) -> Result<()> {
        let revid = meta
            .revid()
            .ok_or_else(|| Error::Corrupt("revision metadata has no revid".to_owned()))?
            .to_string();
        let content = self.config.extractor.extract(meta.get("contenttype").and_then(|v| v.as_str()), payload);
        let all_doc = assemble_all_revs(&self.all_schema, &self.config.wikiname, meta, &content);
        let latest_doc = assemble_latest_revs(&self.latest_schema, &self.config.wikiname, meta, &content);

        self.with_open(|open| {
            let revid_field = self.all_schema.common.revid;
            let term = Term::from_field_text(revid_field, &revid);
            let writer = Self::all_writer(open)?;
            writer.delete_term(term);
            writer.add_document(all_doc).map_err(index_err)?;

            let latest_revid_field = self.latest_schema.common.revid;
            let term = Term::from_field_text(latest_revid_field, &revid);
            let writer = Self::latest_writer(open)?;
            writer.delete_term(term);
            writer.add_document(latest_doc).map_err(index_err)?;
            Ok(())
        })?;

        if !buffered {
            self.flush().await?;
        }
        Ok(())
    }

    /// Commits any writers opened by buffered `index_revision`/`remove_revision`
    /// calls.
    #[instrument(skip(self))]
    pub async fn flush(&self) -> Result<()> {
        self.with_open(|open| {
            if let Some(w) = open.all_writer.as_mut() {
                w.commit().map_err(index_err)?;
            }
            if let Some(w) = open.latest_writer.as_mut() {
                w.commit().map_err(index_err)?;
            }
            Ok(())
        })
    }

    /// Removes `revid` from `all_revs`; if it was the stored latest for its
    /// item, recomputes (or deletes) the `latest_revs` row.
    #[instrument(skip(self))]
    pub async fn remove_revision(&self, revid: &str) -> Result<()> {
        let itemid = self.itemid_for_revid(revid).await?;

        self.with_open(|open| {
            let term = Term::from_field_text(self.all_schema.common.revid, revid);
            Self::all_writer(open)?.delete_term(term);
            Ok(())
        })?;
        self.flush().await?;

        if let Some(itemid) = itemid {
            self.recompute_latest_for_item(&itemid).await?;
        }
        Ok(())
    }

    async fn itemid_for_revid(&self, revid: &str) -> Result<Option<String>> {
        let hits = self.document(View::All, "revid", revid).await?;
        Ok(hits.and_then(|h| h.get("itemid").and_then(|v| v.as_str()).map(|s| s.to_owned())))
    }

    async fn recompute_latest_for_item(&self, itemid: &str) -> Result<()> {
        let field = self.all_schema.common.itemid;
        let candidates = self.with_open(|open| {
            let reader = open.all_revs.reader().map_err(index_err)?;
            let searcher = reader.searcher();
            let term = Term::from_field_text(field, itemid);
            let query = TermQuery::new(term, IndexRecordOption::Basic);
            let hits = searcher
                .search(&query, &TopDocs::with_limit(10_000))
                .map_err(index_err)?;
            let mut candidates = Vec::new();
            for (_score, address) in hits {
                let doc = searcher.doc(address).map_err(index_err)?;
                candidates.push(candidate_from_doc(&self.all_schema, &doc));
            }
            Ok(candidates)
        })?;

        let latest_field = self.latest_schema.common.itemid;
        self.with_open(|open| {
            let term = Term::from_field_text(latest_field, itemid);
            Self::latest_writer(open)?.delete_term(term);
            Ok(())
        })?;

        if let Some(winner_revid) = latest_per_item(candidates).into_iter().next() {
            let (meta, content) = self.load_meta_and_content(&winner_revid).await?;
            let doc = assemble_latest_revs(&self.latest_schema, &self.config.wikiname, &meta, &content);
            self.with_open(|open| Self::latest_writer(open)?.add_document(doc).map_err(index_err))?;
        }
        self.flush().await
    }

    async fn load_meta_and_content(&self, revid: &str) -> Result<(Metadata, String)> {
        let (meta, mut data) = self.config.backend.retrieve(revid).await?;
        let mut payload = Vec::new();
        use tokio::io::AsyncReadExt;
        data.read_to_end(&mut payload).await?;
        let content = self
            .config
            .extractor
            .extract(meta.get("contenttype").and_then(|v| v.as_str()), &payload);
        Ok((meta, content))
    }

    /// Rebuilds `all_revs` (optionally at a side-by-side temp directory) by
    /// iterating the backend, then recomputes `latest_revs` from scratch.
    /// `move_index` must be called afterwards to swap a temp build into
    /// place.
    #[instrument(skip(self))]
    pub async fn rebuild(&self, at_temp: bool) -> Result<()> {
        let dir = if at_temp {
            self.config.temp_dir()
        } else {
            self.config.index_dir.clone()
        };
        std::fs::create_dir_all(dir.join("all_revs"))?;
        std::fs::create_dir_all(dir.join("latest_revs"))?;
        let all_revs = Index::create_in_dir(dir.join("all_revs"), self.all_schema.schema.clone())
            .map_err(index_err)?;
        let latest_revs =
            Index::create_in_dir(dir.join("latest_revs"), self.latest_schema.schema.clone())
                .map_err(index_err)?;

        let mut writer = all_revs.writer(WRITER_HEAP_BYTES).map_err(index_err)?;
        let mut revids = {
            use futures::TryStreamExt;
            self.config.backend.iter().await?.try_collect::<Vec<_>>().await?
        };
        revids.sort();
        let mut candidates = Vec::with_capacity(revids.len());
        for revid in &revids {
            let (meta, content) = self.load_meta_and_content(revid).await?;
            candidates.push(candidate_from_meta(&meta));
            let doc = assemble_all_revs(&self.all_schema, &self.config.wikiname, &meta, &content);
            writer.add_document(doc).map_err(index_err)?;
        }
        writer.commit().map_err(index_err)?;

        let mut latest_writer = latest_revs.writer(WRITER_HEAP_BYTES).map_err(index_err)?;
        for winner_revid in latest_per_item(candidates) {
            let (meta, content) = self.load_meta_and_content(&winner_revid).await?;
            let doc = assemble_latest_revs(&self.latest_schema, &self.config.wikiname, &meta, &content);
            latest_writer.add_document(doc).map_err(index_err)?;
        }
        latest_writer.commit().map_err(index_err)?;

        if !at_temp {
            *self.open.lock().unwrap() = Some(OpenIndexes {
                all_revs,
                latest_revs,
                all_writer: None,
                latest_writer: None,
            });
        }
        Ok(())
    }

    /// Closes the live index, destroys it, and renames the temp build built
    /// by `rebuild(true)` into its place, then reopens it.
    #[instrument(skip(self))]
    pub async fn move_index(&self) -> Result<()> {
        self.close().await?;
        if self.config.index_dir.exists() {
            std::fs::remove_dir_all(&self.config.index_dir)?;
        }
        std::fs::rename(self.config.temp_dir(), &self.config.index_dir)?;
        self.open().await
    }

    /// Reconciles `all_revs` (and then `latest_revs`) against the backend's
    /// current revid set: adds what the backend has and the index doesn't,
    /// deletes what the index has and the backend doesn't, then recomputes
    /// latest revids and applies the set-difference to `latest_revs`.
    #[instrument(skip(self))]
    pub async fn update(&self) -> Result<()> {
        use futures::TryStreamExt;
        let backend_revids: HashSet<String> =
            self.config.backend.iter().await?.try_collect::<Vec<_>>().await?.into_iter().collect();
        let index_revids: HashSet<String> = self
            .documents(View::All, "wikiname", &self.config.wikiname)
            .await?
            .into_iter()
            .filter_map(|h| h.get("revid").and_then(|v| v.as_str()).map(|s| s.to_owned()))
            .collect();

        for revid in backend_revids.difference(&index_revids) {
            let (meta, content) = self.load_meta_and_content(revid).await?;
            let doc = assemble_all_revs(&self.all_schema, &self.config.wikiname, &meta, &content);
            self.with_open(|open| Self::all_writer(open)?.add_document(doc).map_err(index_err))?;
        }
        for revid in index_revids.difference(&backend_revids) {
            self.with_open(|open| {
                let term = Term::from_field_text(self.all_schema.common.revid, revid);
                Self::all_writer(open)?.delete_term(term);
                Ok(())
            })?;
        }
        self.flush().await?;

        let all_candidates = self.all_candidates().await?;
        let new_latest: HashSet<String> = latest_per_item(all_candidates).into_iter().collect();
        let old_latest: HashSet<String> = self
            .documents(View::Latest, "wikiname", &self.config.wikiname)
            .await?
            .into_iter()
            .filter_map(|h| h.get("revid").and_then(|v| v.as_str()).map(|s| s.to_owned()))
            .collect();

        for revid in old_latest.difference(&new_latest) {
            self.with_open(|open| {
                let term = Term::from_field_text(self.latest_schema.common.revid, revid);
                Self::latest_writer(open)?.delete_term(term);
                Ok(())
            })?;
        }
        for revid in new_latest.difference(&old_latest) {
            let (meta, content) = self.load_meta_and_content(revid).await?;
            let doc = assemble_latest_revs(&self.latest_schema, &self.config.wikiname, &meta, &content);
            self.with_open(|open| Self::latest_writer(open)?.add_document(doc).map_err(index_err))?;
        }
        self.flush().await
    }

    async fn all_candidates(&self) -> Result<Vec<Candidate>> {
        let hits = self.documents(View::All, "wikiname", &self.config.wikiname).await?;
        Ok(hits.iter().filter_map(candidate_from_hit).collect())
    }

    /// Library-specific compaction (segment merge). A no-op when the index
    /// has a single segment already.
    #[instrument(skip(self))]
    pub async fn optimize_index(&self) -> Result<()> {
        self.with_open(|open| {
            let writer = Self::all_writer(open)?;
            let ids: Vec<_> = writer.index().searchable_segment_ids().map_err(index_err)?;
            if ids.len() > 1 {
                futures::executor::block_on(writer.merge(&ids)).map_err(index_err)?;
            }
            let writer = Self::latest_writer(open)?;
            let ids: Vec<_> = writer.index().searchable_segment_ids().map_err(index_err)?;
            if ids.len() > 1 {
                futures::executor::block_on(writer.merge(&ids)).map_err(index_err)?;
            }
            Ok(())
        })
    }

    fn index_for(&self, open: &OpenIndexes, view: View) -> Index {
        match view {
            View::All => open.all_revs.clone(),
            View::Latest => open.latest_revs.clone(),
        }
    }

    fn schema_for(&self, view: View) -> &tantivy::schema::Schema {
        match view {
            View::All => &self.all_schema.schema,
            View::Latest => &self.latest_schema.schema,
        }
    }

    /// Exact-match lookup: the first document whose `field` equals `value`,
    /// or `None`.
    pub async fn document(&self, view: View, field: &str, value: &str) -> Result<Option<Hit>> {
        Ok(self.documents(view, field, value).await?.into_iter().next())
    }

    /// Exact-match lookup of every document whose `field` equals `value`.
    #[instrument(skip(self))]
    pub async fn documents(&self, view: View, field: &str, value: &str) -> Result<Vec<Hit>> {
        let schema = self.schema_for(view).clone();
        let field_handle = schema
            .get_field(field)
            .ok_or_else(|| Error::Config(format!("no such field: {}", field)))?;
        self.with_open(|open| {
            let index = self.index_for(open, view);
            let reader = index.reader().map_err(index_err)?;
            let searcher = reader.searcher();
            let term = Term::from_field_text(field_handle, value);
            let query = TermQuery::new(term, IndexRecordOption::Basic);
            let hits = searcher
                .search(&query, &TopDocs::with_limit(10_000))
                .map_err(index_err)?;
            let mut out = Vec::with_capacity(hits.len());
            for (_score, address) in hits {
                let doc = searcher.doc(address).map_err(index_err)?;
                out.push(doc_to_hit(&schema, &doc));
            }
            Ok(out)
        })
    }

    /// Full-text search across `fields` (a multi-field parser with >1
    /// entries, a single-field one with exactly 1; 0 is a configuration
    /// error).
    pub async fn search(&self, view: View, query: &str, fields: &[&str], limit: usize) -> Result<Vec<Hit>> {
        self.search_page(view, query, fields, 1, limit).await
    }

    #[instrument(skip(self))]
    pub async fn search_page(
        &self,
        view: View,
        query: &str,
        fields: &[&str],
        pagenum: usize,
        pagelen: usize,
    ) -> Result<Vec<Hit>> {
        if fields.is_empty() {
            return Err(Error::Config(
                "search requires at least one default field".to_owned(),
            ));
        }
        let schema = self.schema_for(view).clone();
        let field_handles = fields
            .iter()
            .map(|f| {
                schema
                    .get_field(f)
                    .ok_or_else(|| Error::Config(format!("no such field: {}", f)))
            })
            .collect::<Result<Vec<_>>>()?;

        self.with_open(|open| {
            let index = self.index_for(open, view);
            let parser = QueryParser::for_index(&index, field_handles);
            let parsed = parser
                .parse_query(query)
                .map_err(|e| Error::Config(format!("invalid query {:?}: {}", query, e)))?;
            let reader = index.reader().map_err(index_err)?;
            let searcher = reader.searcher();
            let offset = pagenum.saturating_sub(1) * pagelen;
            let hits = searcher
                .search(&*parsed, &TopDocs::with_limit(offset + pagelen))
                .map_err(index_err)?;
            let mut out = Vec::new();
            for (_score, address) in hits.into_iter().skip(offset) {
                let doc = searcher.doc(address).map_err(index_err)?;
                out.push(doc_to_hit(&schema, &doc));
            }
            Ok(out)
        })
    }
}

fn index_err(e: tantivy::TantivyError) -> Error {
    Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e))
}

fn doc_to_hit(schema: &tantivy::schema::Schema, doc: &Document) -> Hit {
    let json = schema.to_named_doc(doc);
    serde_json::to_value(json)
        .ok()
        .and_then(|v| v.as_object().cloned())
        .unwrap_or_default()
}

fn candidate_from_doc(schema: &AllRevsSchema, doc: &Document) -> Candidate {
    let itemid = doc
        .get_first(schema.common.itemid)
        .and_then(|v| v.as_text())
        .unwrap_or("")
        .to_owned();
    let revid = doc
        .get_first(schema.common.revid)
        .and_then(|v| v.as_text())
        .unwrap_or("")
        .to_owned();
    let mtime = doc.get_first(schema.common.mtime).and_then(|v| v.as_i64()).unwrap_or(0);
    Candidate { itemid, revid, mtime }
}

fn candidate_from_meta(meta: &Metadata) -> Candidate {
    Candidate {
        itemid: meta.itemid().map(|i| i.to_string()).unwrap_or_default(),
        revid: meta.revid().map(|r| r.to_string()).unwrap_or_default(),
        mtime: meta.mtime().unwrap_or(0),
    }
}

fn candidate_from_hit(hit: &Hit) -> Option<Candidate> {
    Some(Candidate {
        itemid: hit.get("itemid")?.as_str()?.to_owned(),
        revid: hit.get("revid")?.as_str()?.to_owned(),
        mtime: hit.get("mtime").and_then(|v| v.as_i64()).unwrap_or(0),
    })
}
