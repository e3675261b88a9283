/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This software may be used and distributed according to the terms of the
 * GNU General Public License version 2.
 */

use std::fmt;

/// The five operations the protecting middleware gates (spec.md §4.5).
/// `Display` renders the lowercase token used in `"<user>:<cap>"` ACL
/// entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capability {
    Read,
    Write,
    Create,
    Overwrite,
    Destroy,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Capability::Read => "read",
            Capability::Write => "write",
            Capability::Create => "create",
            Capability::Overwrite => "overwrite",
            Capability::Destroy => "destroy",
        };
        f.write_str(s)
    }
}
