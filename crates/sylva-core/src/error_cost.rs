// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! The error-cost model.
//!
//! Every recovery decision is priced: skipping a token, skipping a
//! character or line inside an error span, inserting a missing token, and
//! opening a recovery at all each contribute a fixed cost. The parser uses
//! the accumulated cost of a stack version both to prune dominated
//! versions and to pick a winner when several parses finish.

/// Cost of opening any recovery (discontinuity, error node, missing token).
pub const ERROR_COST_PER_RECOVERY: u32 = 500;

/// Additional cost of a synthesized missing token.
pub const ERROR_COST_PER_MISSING_TREE: u32 = 110;

/// Cost of each whole tree skipped during recovery.
pub const ERROR_COST_PER_SKIPPED_TREE: u32 = 100;

/// Cost of each line covered by skipped text.
pub const ERROR_COST_PER_SKIPPED_LINE: u32 = 30;

/// Cost of each byte covered by skipped text.
pub const ERROR_COST_PER_SKIPPED_CHAR: u32 = 1;

/// Cost gap beyond which a cheaper version outright replaces a more
/// expensive one instead of merely being preferred.
pub const MAX_COST_DIFFERENCE: u32 = 16 * ERROR_COST_PER_SKIPPED_TREE;

/// A snapshot of one stack version's standing in the cost model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorStatus {
    /// Accumulated error cost, including the paused surcharge.
    pub cost: u32,
    /// Nodes pushed since the most recent error on the version's path.
    pub node_count: u32,
    /// Accumulated dynamic precedence.
    pub dynamic_precedence: i32,
    /// Whether the version is paused or sitting in the error state.
    pub is_in_error: bool,
}

/// The outcome of comparing two versions.
///
/// `Take*` removes the loser immediately; `Prefer*` only reorders (and
/// invites a merge attempt); `None` means the versions are equally good.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorComparison {
    /// The left version dominates; drop the right.
    TakeLeft,
    /// The left version is better, but not decisively.
    PreferLeft,
    /// Neither is better.
    None,
    /// The right version is better, but not decisively.
    PreferRight,
    /// The right version dominates; drop the left.
    TakeRight,
}

/// Ranks two version statuses.
///
/// A version that is not in error always beats one that is. Otherwise the
/// cheaper version wins, decisively when the cost gap (scaled by how much
/// the cheaper version has already parsed) exceeds [`MAX_COST_DIFFERENCE`].
/// Equal costs fall back to dynamic precedence.
#[must_use]
pub fn compare_error_status(a: ErrorStatus, b: ErrorStatus) -> ErrorComparison {
    if !a.is_in_error && b.is_in_error {
        return if a.cost < b.cost {
            ErrorComparison::TakeLeft
        } else {
            ErrorComparison::PreferLeft
        };
    }

    if a.is_in_error && !b.is_in_error {
        return if b.cost < a.cost {
            ErrorComparison::TakeRight
        } else {
            ErrorComparison::PreferRight
        };
    }

    if a.cost < b.cost {
        return if (b.cost - a.cost) * (1 + a.node_count) > MAX_COST_DIFFERENCE {
            ErrorComparison::TakeLeft
        } else {
            ErrorComparison::PreferLeft
        };
    }

    if b.cost < a.cost {
        return if (a.cost - b.cost) * (1 + b.node_count) > MAX_COST_DIFFERENCE {
            ErrorComparison::TakeRight
        } else {
            ErrorComparison::PreferRight
        };
    }

    if a.dynamic_precedence > b.dynamic_precedence {
        return ErrorComparison::PreferLeft;
    }
    if b.dynamic_precedence > a.dynamic_precedence {
        return ErrorComparison::PreferRight;
    }
    ErrorComparison::None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(cost: u32, node_count: u32, precedence: i32, in_error: bool) -> ErrorStatus {
        ErrorStatus {
            cost,
            node_count,
            dynamic_precedence: precedence,
            is_in_error: in_error,
        }
    }

    #[test]
    fn non_error_version_beats_error_version() {
        let healthy = status(100, 5, 0, false);
        let erroring = status(600, 2, 0, true);
        assert_eq!(
            compare_error_status(healthy, erroring),
            ErrorComparison::TakeLeft
        );
        assert_eq!(
            compare_error_status(erroring, healthy),
            ErrorComparison::TakeRight
        );
    }

    #[test]
    fn expensive_non_error_version_is_only_preferred() {
        let healthy = status(900, 5, 0, false);
        let erroring = status(600, 2, 0, true);
        assert_eq!(
            compare_error_status(healthy, erroring),
            ErrorComparison::PreferLeft
        );
    }

    #[test]
    fn large_cost_gap_is_decisive() {
        let cheap = status(0, 30, 0, false);
        let costly = status(200, 30, 0, false);
        // (200 - 0) * 31 > 1600
        assert_eq!(
            compare_error_status(cheap, costly),
            ErrorComparison::TakeLeft
        );
    }

    #[test]
    fn small_cost_gap_is_a_preference() {
        let cheap = status(0, 2, 0, false);
        let costly = status(200, 2, 0, false);
        // (200 - 0) * 3 < 1600
        assert_eq!(
            compare_error_status(cheap, costly),
            ErrorComparison::PreferLeft
        );
    }

    #[test]
    fn ties_fall_back_to_dynamic_precedence() {
        let low = status(50, 1, 0, false);
        let high = status(50, 1, 7, false);
        assert_eq!(compare_error_status(low, high), ErrorComparison::PreferRight);
        assert_eq!(compare_error_status(high, low), ErrorComparison::PreferLeft);
        assert_eq!(compare_error_status(low, low), ErrorComparison::None);
    }

    #[test]
    fn comparison_is_antisymmetric() {
        let statuses = [
            status(0, 0, 0, false),
            status(100, 3, 0, false),
            status(100, 3, 5, false),
            status(700, 1, 0, true),
        ];
        for a in statuses {
            for b in statuses {
                let forward = compare_error_status(a, b);
                let backward = compare_error_status(b, a);
                let mirrored = match forward {
                    ErrorComparison::TakeLeft => ErrorComparison::TakeRight,
                    ErrorComparison::PreferLeft => ErrorComparison::PreferRight,
                    ErrorComparison::None => ErrorComparison::None,
                    ErrorComparison::PreferRight => ErrorComparison::PreferLeft,
                    ErrorComparison::TakeRight => ErrorComparison::TakeLeft,
                };
                assert_eq!(backward, mirrored);
            }
        }
    }
}
