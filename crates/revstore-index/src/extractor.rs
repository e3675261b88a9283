/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This software may be used and distributed according to the terms of the
 * GNU General Public License version 2.
 */

//! The pluggable `convert_to_indexable` collaborator (spec.md §1: "the
//! actual full-text tokenizers/analyzers" are out of scope). This crate
//! ships one concrete extractor; a wiki application would supply richer
//! ones (markup-aware, PDF text extraction, ...).

/// Converts a revision's raw payload into the text blob indexed as
/// `content`.
pub trait ContentExtractor: Send + Sync {
    fn extract(&self, contenttype: Option<&str>, payload: &[u8]) -> String;
}

/// Decodes the payload as UTF-8 (lossily), ignoring `contenttype`. Matches
/// `original_source/middleware/indexing.py`'s present-day behaviour: content
/// is indexed 1:1 from the payload, with no markup stripping.
pub struct PlainTextExtractor;

impl ContentExtractor for PlainTextExtractor {
    fn extract(&self, _contenttype: Option<&str>, payload: &[u8]) -> String {
        String::from_utf8_lossy(payload).into_owned()
    }
}
