/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This software may be used and distributed according to the terms of the
 * GNU General Public License version 2.
 */

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::error::Error;

macro_rules! uuid_id {
    ($name:ident) => {
        /// A 128-bit random identifier, hex-encoded when it leaves the process.
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh random identifier.
            pub fn new() -> Self {
                $name(Uuid::new_v4())
            }

            /// The hex-encoded (no dashes) form used as a store key / JSON value.
            pub fn as_hex(&self) -> String {
                self.0.to_simple().to_string()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.as_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.as_hex())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Error> {
                // Revision ids are hex UUIDs in practice; reject anything that
                // could smuggle a path separator into a store key or a router
                // composite revid (see router mountpoint/revid split).
                if s.len() != 32 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
                    return Err(Error::Corrupt(format!(
                        "{} is not a 32-char hex id: {:?}",
                        stringify!($name),
                        s
                    )));
                }
                Uuid::parse_str(s)
                    .map($name)
                    .map_err(|e| Error::Corrupt(format!("invalid {}: {}", stringify!($name), e)))
            }
        }
    };
}

uuid_id!(RevId);
uuid_id!(ItemId);
uuid_id!(DataId);
