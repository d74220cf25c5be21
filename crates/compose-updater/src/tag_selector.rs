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

//! Picks the newest registry tag that follows the same naming scheme as the
//! tag a service currently runs.

use crate::error::Result;
use crate::version::{TagScheme, compare_segments};
use std::cmp::Ordering;

/// Select the newest candidate tag compatible with `current`.
///
/// Candidates are only considered when they share the prefix, the suffix and
/// the number of numeric segments of `current`; everything else is skipped
/// silently. Returns `Ok(None)` when no candidate is newer.
pub fn select_latest<S: AsRef<str>>(current: &str, candidates: &[S]) -> Result<Option<String>> {
    let current_scheme = TagScheme::parse(current);
    let current_segments = current_scheme.segments()?;

    let mut best: Option<(&str, Vec<u64>)> = None;
    for candidate in candidates.iter().map(AsRef::as_ref) {
        let scheme = TagScheme::parse(candidate);
        if !current_scheme.same_scheme(&scheme) {
            continue;
        }
        let Ok(segments) = scheme.segments() else {
            continue;
        };
        if segments.len() != current_segments.len() {
            continue;
        }
        if compare_segments(&segments, &current_segments) != Ordering::Greater {
            continue;
        }
        let is_better = best
            .as_ref()
            .is_none_or(|(_, best_segments)| {
                compare_segments(&segments, best_segments) == Ordering::Greater
            });
        if is_better {
            best = Some((candidate, segments));
        }
    }

    Ok(best.map(|(tag, _)| tag.to_owned()))
}
