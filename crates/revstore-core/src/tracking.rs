/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This software may be used and distributed according to the terms of the
 * GNU General Public License version 2.
 */

use std::pin::Pin;
use std::sync::Arc;
use std::sync::Mutex;
use std::task::Context;
use std::task::Poll;

use digest::Digest;
use tokio::io::AsyncRead;

struct State<D> {
    digest: D,
    bytes_read: u64,
}

/// Wraps a reader and updates a running hash and byte count as data flows
/// through it. Mirrors `TrackingFileWrapper` from the backend this stack was
/// translated from, but as a typed reader adapter instead of a duck-typed
/// wrapper (see the Design Notes on the tracking reader).
///
/// `new` returns the reader paired with a cheap [`TrackingHandle`] so the
/// running totals remain readable after the reader itself has been moved
/// into something that consumes it (e.g. a store's `put`).
pub struct TrackingReader<R, D> {
    inner: R,
    state: Arc<Mutex<State<D>>>,
}

/// A handle to the totals accumulated by a [`TrackingReader`]. Only
/// meaningful once the paired reader has been driven to EOF.
#[derive(Clone)]
pub struct TrackingHandle<D> {
    state: Arc<Mutex<State<D>>>,
}

impl<D: Digest> TrackingHandle<D> {
    pub fn bytes_read(&self) -> u64 {
        self.state.lock().unwrap().bytes_read
    }

    pub fn hash_hex(&self) -> String {
        let guard = self.state.lock().unwrap();
        hex_encode(&guard.digest.clone().result())
    }
}

impl<R, D: Digest> TrackingReader<R, D> {
    pub fn new(inner: R, digest: D) -> (Self, TrackingHandle<D>) {
        let state = Arc::new(Mutex::new(State {
            digest,
            bytes_read: 0,
        }));
        let reader = TrackingReader {
            inner,
            state: state.clone(),
        };
        (reader, TrackingHandle { state })
    }
}

impl<R: AsyncRead + Unpin, D: Digest + Unpin> AsyncRead for TrackingReader<R, D> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<std::io::Result<usize>> {
        let this = self.get_mut();
        let poll = Pin::new(&mut this.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(n)) = &poll {
            if *n > 0 {
                let mut state = this.state.lock().unwrap();
                state.digest.input(&buf[..*n]);
                state.bytes_read += *n as u64;
            }
        }
        poll
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{:02x}", b));
    }
    s
}
