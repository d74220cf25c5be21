// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Image tag parsing and comparison module
//!
//! Tags are compared as plain numeric segment lists (`1.22` < `1.23` < `2.0`)
//! once their naming scheme is stripped. The scheme is a leading run of
//! letters (`v1.2`) and a trailing `-variant` marker (`1.2-alpine`); two tags
//! are only comparable when both parts are identical.

use crate::error::{Result, UpdaterError};
use std::cmp::Ordering;

/// A tag split into its scheme markers and its numeric body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagScheme<'a> {
    pub prefix: &'a str,
    pub body: &'a str,
    pub suffix: &'a str,
}

impl<'a> TagScheme<'a> {
    pub fn parse(tag: &'a str) -> Self {
        let prefix_len = tag.bytes().take_while(u8::is_ascii_alphabetic).count();
        let (prefix, rest) = tag.split_at(prefix_len);
        let (body, suffix) = match rest.find('-') {
            Some(idx) => rest.split_at(idx),
            None => (rest, ""),
        };
        Self {
            prefix,
            body,
            suffix,
        }
    }

    /// Whether `other` carries the same prefix and suffix
    pub fn same_scheme(&self, other: &TagScheme<'_>) -> bool {
        self.prefix == other.prefix && self.suffix == other.suffix
    }

    pub fn segments(&self) -> Result<Vec<u64>> {
        parse_segments(self.body)
    }
}

/// Parse a dot-separated numeric version body (e.g. "1.22.3")
pub fn parse_segments(body: &str) -> Result<Vec<u64>> {
    body.split('.')
        .map(|part| {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(UpdaterError::VersionParse(format!(
                    "integer conversion failed for '{body}'"
                )));
            }
            part.parse::<u64>().map_err(|e| {
                UpdaterError::VersionParse(format!("integer conversion failed for '{body}': {e}"))
            })
        })
        .collect()
}

/// Compare segment lists left to right, treating missing trailing segments as zero
pub fn compare_segments(a: &[u64], b: &[u64]) -> Ordering {
    let len = a.len().max(b.len());
    for i in 0..len {
        let left = a.get(i).copied().unwrap_or(0);
        let right = b.get(i).copied().unwrap_or(0);
        match left.cmp(&right) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

/// Returns true if `candidate` is newer than `current`.
///
/// Fails with [`UpdaterError::SchemeMismatch`] when prefix or suffix differ and
/// with [`UpdaterError::VersionParse`] when either body is not numeric.
pub fn is_newer(current: &str, candidate: &str) -> Result<bool> {
    let current_scheme = TagScheme::parse(current);
    let candidate_scheme = TagScheme::parse(candidate);

    if !current_scheme.same_scheme(&candidate_scheme) {
        return Err(UpdaterError::SchemeMismatch {
            current: current.to_owned(),
            candidate: candidate.to_owned(),
        });
    }

    let current_segments = current_scheme.segments()?;
    let candidate_segments = candidate_scheme.segments()?;

    Ok(compare_segments(&current_segments, &candidate_segments) == Ordering::Less)
}
