/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This software may be used and distributed according to the terms of the
 * GNU General Public License version 2.
 */

//! Routing middleware multiplexing backends by item-name prefix. Grounded on
//! `middleware/router.py`.

mod adapter;

pub use adapter::BackendAdapter;

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream;
use futures::stream::BoxStream;
use futures::StreamExt;
use revstore_core::Error;
use revstore_core::Metadata;
use revstore_core::Result;
use tokio::io::AsyncRead;

/// Object-safe revision backend contract, implemented by both a plain
/// `Backend` (via [`BackendAdapter`]) and `RouterBackend` itself, so routers
/// can nest. Revids cross this boundary as hex strings rather than `RevId`
/// so that a router's own composite `"<mountpoint>/<child-revid>"` ids can
/// flow through the same interface as a leaf backend's plain hex ids.
#[async_trait]
pub trait RevisionBackend: Send + Sync {
    async fn create(&self) -> Result<()>;
    async fn open(&self) -> Result<()>;
    async fn close(&self) -> Result<()>;
    async fn destroy(&self) -> Result<()>;
    async fn store(&self, meta: Metadata, data: Pin<Box<dyn AsyncRead + Send>>) -> Result<String>;
    async fn retrieve(&self, revid: &str) -> Result<(Metadata, Pin<Box<dyn AsyncRead + Send>>)>;
    async fn remove(&self, revid: &str) -> Result<()>;
    async fn iter(&self) -> Result<BoxStream<'static, Result<String>>>;
}

/// A single `(mountpoint, backend)` entry. Mountpoints are item-name
/// prefixes with any trailing `/` stripped at construction.
struct Mount {
    prefix: String,
    backend: Arc<dyn RevisionBackend>,
}

/// Dispatches to a child backend by longest configured mountpoint prefix.
/// The final mount must be the catch-all `""`; this is checked at
/// construction (spec.md §4.3 / §7 `ConfigError`).
pub struct RouterBackend {
    mounts: Vec<Mount>,
}

impl RouterBackend {
    /// `mounts` must be given in priority order; the last entry's
    /// mountpoint must be `""`.
    pub fn new(mounts: Vec<(String, Arc<dyn RevisionBackend>)>) -> Result<Self> {
        if mounts.is_empty() || !mounts.last().unwrap().0.trim_end_matches('/').is_empty() {
            return Err(Error::Config(
                "router requires a catch-all (\"\") mountpoint as the last entry".to_owned(),
            ));
        }
        let mounts = mounts
            .into_iter()
            .map(|(prefix, backend)| Mount {
                prefix: prefix.trim_end_matches('/').to_owned(),
                backend,
            })
            .collect();
        Ok(RouterBackend { mounts })
    }

    /// Returns `(mountpoint, child backend, local name)` for a given
    /// absolute item name.
    fn dispatch<'a>(&'a self, name: &str) -> Result<(&'a str, &'a Arc<dyn RevisionBackend>, &'a str)> {
        for mount in &self.mounts {
            if mount.prefix.is_empty() {
                return Ok((&mount.prefix, &mount.backend, name));
            }
            if name == mount.prefix {
                return Ok((&mount.prefix, &mount.backend, ""));
            }
            if let Some(local) = name.strip_prefix(&format!("{}/", mount.prefix)) {
                return Ok((&mount.prefix, &mount.backend, local));
            }
        }
        Err(Error::Config(format!(
            "no mountpoint (not even a catch-all) matches {:?}",
            name
        )))
    }

    fn mount_for<'a>(&'a self, mountpoint: &str) -> Result<&'a Arc<dyn RevisionBackend>> {
        self.mounts
            .iter()
            .find(|m| m.prefix == mountpoint)
            .map(|m| &m.backend)
            .ok_or_else(|| Error::NotFound(format!("no mountpoint named {:?}", mountpoint)))
    }
}

/// Child revids must not contain `/`: that is the only character the
/// composite `"<mountpoint>/<child-revid>"` syntax depends on to split
/// unambiguously (Design Notes, Open Question 3). Revids are hex UUIDs in
/// practice, so this is enforced rather than merely assumed.
fn validate_child_revid(revid: &str) -> Result<()> {
    if revid.contains('/') {
        return Err(Error::Corrupt(format!(
            "child revid {:?} contains a path separator and cannot be embedded in a composite revid",
            revid
        )));
    }
    Ok(())
}

fn compose(mountpoint: &str, child_revid: &str) -> String {
    format!("{}/{}", mountpoint, child_revid)
}

/// Splits a composite revid on its *last* `/`, yielding `(mountpoint,
/// child-revid)`. An empty mountpoint therefore produces a leading `/`.
fn split_composite(revid: &str) -> Result<(&str, &str)> {
    match revid.rfind('/') {
        Some(idx) => Ok((&revid[..idx], &revid[idx + 1..])),
        None => Err(Error::Corrupt(format!(
            "not a router composite revid (no '/'): {:?}",
            revid
        ))),
    }
}

#[async_trait]
impl RevisionBackend for RouterBackend {
    async fn create(&self) -> Result<()> {
        for mount in &self.mounts {
            mount.backend.create().await?;
        }
        Ok(())
    }

    async fn open(&self) -> Result<()> {
        for mount in &self.mounts {
            mount.backend.open().await?;
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        for mount in &self.mounts {
            mount.backend.close().await?;
        }
        Ok(())
    }

    async fn destroy(&self) -> Result<()> {
        for mount in &self.mounts {
            mount.backend.destroy().await?;
        }
        Ok(())
    }

    async fn store(&self, mut meta: Metadata, data: Pin<Box<dyn AsyncRead + Send>>) -> Result<String> {
        let name = meta
            .name()
            .ok_or_else(|| Error::Config("router dispatch requires meta.name".to_owned()))?
            .to_owned();
        let (mountpoint, child, local_name) = self.dispatch(&name)?;
        let mountpoint = mountpoint.to_owned();
        meta.set_name(local_name);
        let child_revid = child.store(meta, data).await?;
        validate_child_revid(&child_revid)?;
        Ok(compose(&mountpoint, &child_revid))
    }

    async fn retrieve(&self, revid: &str) -> Result<(Metadata, Pin<Box<dyn AsyncRead + Send>>)> {
        let (mountpoint, child_revid) = split_composite(revid)?;
        let child = self.mount_for(mountpoint)?;
        let (mut meta, data) = child.retrieve(child_revid).await?;
        if let Some(name) = meta.name() {
            let absolute = if mountpoint.is_empty() {
                name.to_owned()
            } else {
                format!("{}/{}", mountpoint, name)
            };
            meta.set_name(absolute);
        }
        Ok((meta, data))
    }

    async fn remove(&self, revid: &str) -> Result<()> {
        let (mountpoint, child_revid) = split_composite(revid)?;
        let child = self.mount_for(mountpoint)?;
        child.remove(child_revid).await
    }

    async fn iter(&self) -> Result<BoxStream<'static, Result<String>>> {
        let mut combined: BoxStream<'static, Result<String>> = stream::empty().boxed();
        for mount in &self.mounts {
            let mountpoint = mount.prefix.clone();
            let child_stream = mount.backend.iter().await?;
            let rewritten = child_stream
                .map(move |revid| revid.and_then(|r| {
                    validate_child_revid(&r)?;
                    Ok(compose(&mountpoint, &r))
                }))
                .boxed();
            combined = combined.chain(rewritten).boxed();
        }
        Ok(combined)
    }
}
