/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This software may be used and distributed according to the terms of the
 * GNU General Public License version 2.
 */

//! The latest-revision grouping algorithm (spec.md §4.4), shared by
//! `rebuild`, `update`, and `remove_revision`'s latest recompute.

use std::collections::HashMap;

/// One `all_revs` row's identity for grouping purposes.
#[derive(Clone, Debug)]
pub struct Candidate {
    pub itemid: String,
    pub revid: String,
    pub mtime: i64,
}

/// Groups `candidates` by `itemid`; within each group picks the entry with
/// the largest `mtime`, tie-broken by the lexicographically greatest
/// `revid`. Returns the winning `revid` for every item present.
pub fn latest_per_item(candidates: impl IntoIterator<Item = Candidate>) -> Vec<String> {
    let mut best: HashMap<String, Candidate> = HashMap::new();
    for candidate in candidates {
        best.entry(candidate.itemid.clone())
            .and_modify(|current| {
                if is_later(&candidate, current) {
                    *current = candidate.clone();
                }
            })
            .or_insert(candidate);
    }
    best.into_values().map(|c| c.revid).collect()
}

fn is_later(a: &Candidate, b: &Candidate) -> bool {
    (a.mtime, &a.revid) > (b.mtime, &b.revid)
}
