/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This software may be used and distributed according to the terms of the
 * GNU General Public License version 2.
 */

//! The `all_revs` and `latest_revs` tantivy schemas (spec.md §4.4). Dynamic
//! per-suffix typed fields (`*_id`, `*_text`, `*_keyword`, `*_numeric`,
//! `*_datetime`, `*_boolean`) are routed into a single `dynamic` JSON field
//! at document-assembly time, since tantivy schemas are fixed at index
//! creation and cannot grow per-document field names.

use tantivy::schema::Schema;
use tantivy::schema::SchemaBuilder;
use tantivy::schema::FAST;
use tantivy::schema::STORED;
use tantivy::schema::STRING;
use tantivy::schema::TEXT;

/// Field names shared by both views.
pub struct CommonFields {
    pub wikiname: tantivy::schema::Field,
    pub name: tantivy::schema::Field,
    pub name_exact: tantivy::schema::Field,
    pub revid: tantivy::schema::Field,
    pub itemid: tantivy::schema::Field,
    pub mtime: tantivy::schema::Field,
    pub contenttype: tantivy::schema::Field,
    pub tags: tantivy::schema::Field,
    pub language: tantivy::schema::Field,
    pub userid: tantivy::schema::Field,
    pub address: tantivy::schema::Field,
    pub hostname: tantivy::schema::Field,
    pub size: tantivy::schema::Field,
    pub action: tantivy::schema::Field,
    pub comment: tantivy::schema::Field,
    pub content: tantivy::schema::Field,
    pub dynamic: tantivy::schema::Field,
}

fn add_common_fields(builder: &mut SchemaBuilder) -> CommonFields {
    CommonFields {
        wikiname: builder.add_text_field("wikiname", TEXT | STORED),
        name: builder.add_text_field("name", TEXT | STORED),
        name_exact: builder.add_text_field("name_exact", STRING | STORED),
        revid: builder.add_text_field("revid", STRING | STORED),
        itemid: builder.add_text_field("itemid", STRING | STORED),
        mtime: builder.add_i64_field("mtime", FAST | STORED),
        contenttype: builder.add_text_field("contenttype", STRING | STORED),
        tags: builder.add_text_field("tags", TEXT | STORED),
        language: builder.add_text_field("language", STRING | STORED),
        userid: builder.add_text_field("userid", STRING | STORED),
        address: builder.add_text_field("address", STRING | STORED),
        hostname: builder.add_text_field("hostname", STRING | STORED),
        size: builder.add_u64_field("size", FAST | STORED),
        action: builder.add_text_field("action", STRING | STORED),
        comment: builder.add_text_field("comment", TEXT | STORED),
        content: builder.add_text_field("content", TEXT),
        dynamic: builder.add_json_field("dynamic", STORED),
    }
}

/// Fields present only in `latest_revs`: ACL and the other fields that are
/// only meaningful for an item's current revision.
pub struct LatestOnlyFields {
    pub itemlinks: tantivy::schema::Field,
    pub itemtransclusions: tantivy::schema::Field,
    pub acl: tantivy::schema::Field,
    pub email: tantivy::schema::Field,
    pub openid: tantivy::schema::Field,
}

pub struct AllRevsSchema {
    pub schema: Schema,
    pub common: CommonFields,
}

pub struct LatestRevsSchema {
    pub schema: Schema,
    pub common: CommonFields,
    pub latest: LatestOnlyFields,
}

pub fn build_all_revs_schema() -> AllRevsSchema {
    let mut builder = Schema::builder();
    let common = add_common_fields(&mut builder);
    AllRevsSchema {
        schema: builder.build(),
        common,
    }
}

pub fn build_latest_revs_schema() -> LatestRevsSchema {
    let mut builder = Schema::builder();
    let common = add_common_fields(&mut builder);
    let latest = LatestOnlyFields {
        itemlinks: builder.add_text_field("itemlinks", TEXT | STORED),
        itemtransclusions: builder.add_text_field("itemtransclusions", TEXT | STORED),
        acl: builder.add_text_field("acl", STRING | STORED),
        email: builder.add_text_field("email", STRING | STORED),
        openid: builder.add_text_field("openid", STRING | STORED),
    };
    LatestRevsSchema {
        schema: builder.build(),
        common,
        latest,
    }
}
