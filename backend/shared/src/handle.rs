//! # Handles
//!
//! A handle is the participant id on the leaderboard, in the shape of an X
//! username: 1 to 15 ASCII letters, digits or underscores. Users tend to
//! type the `@`, so one leading `@` is dropped before matching.
use std::{fmt, sync::LazyLock};

use regex::Regex;
use serde::Serialize;
use thiserror::Error;

pub const MAX_HANDLE_LEN: usize = 15;

static HANDLE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]{1,15}$").unwrap());

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid handle")]
pub struct InvalidHandle;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Handle(String);

impl Handle {
    pub fn parse(raw: &str) -> Result<Self, InvalidHandle> {
        let stripped = raw.strip_prefix('@').unwrap_or(raw);

        if !HANDLE_RE.is_match(stripped) {
            return Err(InvalidHandle);
        }

        Ok(Self(stripped.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Handle {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
