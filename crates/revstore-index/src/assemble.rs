/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This software may be used and distributed according to the terms of the
 * GNU General Public License version 2.
 */

//! Document assembly: projects `Metadata` keys present in a target schema
//! into a tantivy `Document`, per spec.md §4.4 step (a)-(e).

use revstore_core::config;
use revstore_core::Metadata;
use tantivy::Document;

use crate::schema::AllRevsSchema;
use crate::schema::CommonFields;
use crate::schema::LatestRevsSchema;

fn set_common_fields(doc: &mut Document, fields: &CommonFields, wikiname: &str, meta: &Metadata, content: &str) {
    doc.add_text(fields.wikiname, wikiname);
    if let Some(name) = meta.name() {
        doc.add_text(fields.name, name);
        doc.add_text(fields.name_exact, name);
    }
    if let Some(revid) = meta.revid() {
        doc.add_text(fields.revid, revid.to_string());
    }
    if let Some(itemid) = meta.itemid() {
        doc.add_text(fields.itemid, itemid.to_string());
    }
    doc.add_i64(fields.mtime, meta.mtime().unwrap_or(0));
    if let Some(v) = meta.get(config::CONTENTTYPE).and_then(|v| v.as_str()) {
        doc.add_text(fields.contenttype, v);
    }
    if let Some(tags) = meta.get(config::TAGS).and_then(|v| v.as_array()) {
        for tag in tags {
            if let Some(s) = tag.as_str() {
                doc.add_text(fields.tags, s);
            }
        }
    }
    if let Some(v) = meta.get(config::LANGUAGE).and_then(|v| v.as_str()) {
        doc.add_text(fields.language, v);
    }
    if let Some(v) = meta.get(config::USERID).and_then(|v| v.as_str()) {
        doc.add_text(fields.userid, v);
    }
    if let Some(v) = meta.get(config::ADDRESS).and_then(|v| v.as_str()) {
        doc.add_text(fields.address, v);
    }
    if let Some(v) = meta.get(config::HOSTNAME).and_then(|v| v.as_str()) {
        doc.add_text(fields.hostname, v);
    }
    if let Some(size) = meta.size() {
        doc.add_u64(fields.size, size);
    }
    if let Some(v) = meta.get(config::ACTION).and_then(|v| v.as_str()) {
        doc.add_text(fields.action, v);
    }
    doc.add_text(fields.comment, meta.comment().unwrap_or(""));
    doc.add_text(fields.content, content);

    for (key, value) in meta.as_map() {
        let is_dynamic = key.ends_with("_id")
            || key.ends_with("_text")
            || key.ends_with("_keyword")
            || key.ends_with("_numeric")
            || key.ends_with("_datetime")
            || key.ends_with("_boolean");
        if is_dynamic {
            let mut obj = serde_json::Map::new();
            obj.insert(key.clone(), value.clone());
            doc.add_json_object(fields.dynamic, obj);
        }
    }
}

/// Builds the `all_revs` document for one revision.
pub fn assemble_all_revs(schema: &AllRevsSchema, wikiname: &str, meta: &Metadata, content: &str) -> Document {
    let mut doc = Document::new();
    set_common_fields(&mut doc, &schema.common, wikiname, meta, content);
    doc
}

/// Builds the `latest_revs` document for one revision (the item's current
/// latest). Carries the fields that are only meaningful for a latest
/// revision: ACL, links, transclusions, user-profile fields.
pub fn assemble_latest_revs(
    schema: &LatestRevsSchema,
    wikiname: &str,
    meta: &Metadata,
    content: &str,
) -> Document {
    let mut doc = Document::new();
    set_common_fields(&mut doc, &schema.common, wikiname, meta, content);

    if let Some(links) = meta.get(config::ITEMLINKS).and_then(|v| v.as_array()) {
        for link in links {
            if let Some(s) = link.as_str() {
                doc.add_text(schema.latest.itemlinks, s);
            }
        }
    }
    if let Some(transclusions) = meta
        .get(config::ITEMTRANSCLUSIONS)
        .and_then(|v| v.as_array())
    {
        for t in transclusions {
            if let Some(s) = t.as_str() {
                doc.add_text(schema.latest.itemtransclusions, s);
            }
        }
    }
    if let Some(acl) = meta.acl() {
        doc.add_text(schema.latest.acl, acl);
    }
    if let Some(email) = meta.get(config::EMAIL).and_then(|v| v.as_str()) {
        doc.add_text(schema.latest.email, email);
    }
    if let Some(openid) = meta.get(config::OPENID).and_then(|v| v.as_str()) {
        doc.add_text(schema.latest.openid, openid);
    }
    doc
}
