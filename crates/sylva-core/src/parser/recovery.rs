// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Error recovery.
//!
//! When the action table is exhausted for a version, the driver pauses it
//! and this module takes over on the next condensation pass:
//!
//! 1. [`handle_error`](super::Parser::handle_error) collapses the version
//!    to every state reachable by reductions, tries to unblock the parse
//!    by inserting a single zero-width *missing* token, then pushes a
//!    discontinuity and re-enters the error state.
//! 2. Once in the error state, [`recover`](super::Parser::recover) either
//!    jumps back to a recorded summary state (wrapping the skipped trees
//!    in an `ERROR` node) or skips the lookahead into an `ERROR_REPEAT`
//!    chain, whichever the cost model favors.
//!
//! Every choice is priced; versions whose projected cost is dominated are
//! halted rather than explored.

use crate::error_cost::{
    ERROR_COST_PER_SKIPPED_CHAR, ERROR_COST_PER_SKIPPED_LINE, ERROR_COST_PER_SKIPPED_TREE,
};
use crate::language::{ERROR_STATE, Language, ParseAction, START_STATE, StateId, Symbol};
use crate::stack::StackVersion;
use crate::tree::{Tree, TreeData};

use super::{MAX_SUMMARY_DEPTH, MAX_VERSION_COUNT, Parser};

impl Parser {
    /// Re-exposes the children of pending internal nodes at the top of
    /// the stack so their tokens can be re-parsed individually. Returns
    /// false when nothing was broken down.
    pub(super) fn breakdown_top_of_stack(
        &mut self,
        language: &Language,
        version: StackVersion,
    ) -> bool {
        let mut did_break_down = false;
        let mut pending = false;

        loop {
            let slices = self.stack.pop_pending(version);
            if slices.is_empty() {
                break;
            }

            did_break_down = true;
            pending = false;
            for slice in slices {
                let mut state = self.stack.state(slice.version);
                let Some(parent) = slice.trees.first().cloned() else {
                    continue;
                };

                for child in parent.children() {
                    pending = !child.children().is_empty();
                    if child.is_error() {
                        state = ERROR_STATE;
                    } else if !child.is_extra() {
                        state = language.next_state(state, child.symbol());
                    }
                    self.stack
                        .push(slice.version, Some(child.clone()), pending, state);
                }

                for tree in slice.trees.into_iter().skip(1) {
                    self.stack.push(slice.version, Some(tree), false, state);
                }

                self.log_parse(|| {
                    format!(
                        "breakdown_top_of_stack tree:{}",
                        language.symbol_name(parent.symbol())
                    )
                });
            }

            if !pending {
                break;
            }
        }

        did_break_down
    }

    /// Performs every reduction the table allows from this version's
    /// state (forking versions as needed), regardless of the lookahead.
    /// With a concrete `lookahead_symbol`, restricts to that symbol's
    /// entries and removes versions that end up unable to shift it.
    /// Returns whether any reached state can shift the lookahead.
    pub(super) fn do_all_potential_reductions(
        &mut self,
        language: &Language,
        starting_version: StackVersion,
        lookahead_symbol: Option<Symbol>,
    ) -> bool {
        let initial_version_count = self.stack.version_count();
        let mut can_shift_lookahead_symbol = false;
        let mut version = starting_version;
        let mut pass = 0usize;

        loop {
            let version_count = self.stack.version_count();
            if version >= version_count {
                break;
            }

            let mut merged = false;
            for j in initial_version_count..version {
                if self.stack.merge(j, version) {
                    merged = true;
                    break;
                }
            }
            if merged {
                pass += 1;
                continue;
            }

            let state = self.stack.state(version);
            let mut has_shift_action = false;
            let mut reduce_actions: Vec<(Symbol, u16, i32, u16)> = Vec::new();

            let (first_symbol, end_symbol) = match lookahead_symbol {
                Some(symbol) => (symbol, symbol.saturating_add(1)),
                None => (1, language.token_count()),
            };

            for symbol in first_symbol..end_symbol {
                let entry = language.table_entry(state, symbol);
                for action in entry.actions {
                    match *action {
                        ParseAction::Shift {
                            is_extra,
                            is_repetition,
                            ..
                        } => {
                            if !is_extra && !is_repetition {
                                has_shift_action = true;
                            }
                        }
                        // A recover entry can also consume the lookahead.
                        ParseAction::Recover => has_shift_action = true,
                        ParseAction::Reduce {
                            symbol,
                            child_count,
                            dynamic_precedence,
                            alias_sequence_id,
                        } => {
                            if child_count > 0
                                && !reduce_actions
                                    .iter()
                                    .any(|(s, c, _, _)| *s == symbol && *c == child_count)
                            {
                                reduce_actions.push((
                                    symbol,
                                    child_count,
                                    dynamic_precedence,
                                    alias_sequence_id,
                                ));
                            }
                        }
                        ParseAction::Accept => {}
                    }
                }
            }

            // Larger reductions first, so the deepest collapse is explored
            // before its prefixes.
            reduce_actions.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

            let reduce_count = reduce_actions.len();
            for (symbol, child_count, dynamic_precedence, alias_sequence_id) in reduce_actions {
                self.reduce(
                    language,
                    version,
                    symbol,
                    child_count,
                    dynamic_precedence,
                    alias_sequence_id,
                    true,
                );
            }

            if has_shift_action {
                can_shift_lookahead_symbol = true;
            } else if reduce_count > 0 && pass < MAX_VERSION_COUNT {
                self.stack.renumber_version(version_count, version);
                pass += 1;
                continue;
            } else if lookahead_symbol.is_some() {
                self.stack.remove_version(version);
            }

            version = if version == starting_version {
                version_count
            } else {
                version + 1
            };
            pass += 1;
        }

        can_shift_lookahead_symbol
    }

    /// First response to a dead end: collapse via reductions, try one
    /// missing-token insertion, then push a discontinuity and record a
    /// summary of the spine for later recovery jumps.
    pub(super) fn handle_error(
        &mut self,
        language: &Language,
        version: StackVersion,
        lookahead_symbol: Symbol,
    ) {
        let previous_version_count = self.stack.version_count();
        self.do_all_potential_reductions(language, version, None);
        let version_count = self.stack.version_count();

        let mut did_insert_missing_token = false;
        let mut v = version;
        while v < version_count {
            if !did_insert_missing_token {
                let state = self.stack.state(v);
                for missing_symbol in 1..language.token_count() {
                    let state_after_missing = language.next_state(state, missing_symbol);
                    if state_after_missing == 0 {
                        continue;
                    }

                    // Only insert a token that lets the real lookahead
                    // trigger a reduction afterwards.
                    if language.has_reduce_action(state_after_missing, lookahead_symbol) {
                        let version_with_missing = self.stack.copy_version(v);
                        let missing_tree =
                            Tree::seal(TreeData::missing_leaf(missing_symbol, language));
                        self.stack.push(
                            version_with_missing,
                            Some(missing_tree),
                            false,
                            state_after_missing,
                        );

                        if self.do_all_potential_reductions(
                            language,
                            version_with_missing,
                            Some(lookahead_symbol),
                        ) {
                            self.log_parse(|| {
                                format!(
                                    "recover_with_missing symbol:{}",
                                    language.symbol_name(missing_symbol)
                                )
                            });
                            did_insert_missing_token = true;
                            break;
                        }
                    }
                }
            }

            self.stack.push(v, None, false, ERROR_STATE);
            v = if v == version {
                previous_version_count
            } else {
                v + 1
            };
        }

        for _ in previous_version_count..version_count {
            self.stack.force_merge(version, previous_version_count);
        }

        self.stack.record_summary(version, MAX_SUMMARY_DEPTH);
    }

    /// In the error state with a lookahead in hand: jump back to a
    /// summarized state if the cost model allows, finish on end of input,
    /// or skip the lookahead into the error chain.
    pub(super) fn recover(&mut self, language: &Language, version: StackVersion, lookahead: Tree) {
        let mut did_recover = false;
        let previous_version_count = self.stack.version_count();
        let position = self.stack.position(version);
        let summary = self.stack.summary(version);
        let node_count_since_error = self.stack.node_count_since_error(version);
        let current_error_cost = self.stack.error_cost(version);

        if let Some(summary) = summary {
            if !lookahead.is_error() {
                for entry in summary {
                    if entry.state == ERROR_STATE {
                        continue;
                    }
                    if entry.position.bytes == position.bytes {
                        continue;
                    }
                    let mut depth = entry.depth;
                    if node_count_since_error > 0 {
                        depth += 1;
                    }

                    let mut would_merge = false;
                    for j in 0..previous_version_count {
                        if self.stack.state(j) == entry.state
                            && self.stack.position(j).bytes == position.bytes
                        {
                            would_merge = true;
                            break;
                        }
                    }
                    if would_merge {
                        continue;
                    }

                    let new_cost = current_error_cost
                        + entry.depth * ERROR_COST_PER_SKIPPED_TREE
                        + (position.bytes - entry.position.bytes) * ERROR_COST_PER_SKIPPED_CHAR
                        + (position.extent.row - entry.position.extent.row)
                            * ERROR_COST_PER_SKIPPED_LINE;
                    if self.better_version_exists(version, false, new_cost) {
                        break;
                    }

                    if language.has_actions(entry.state, lookahead.symbol()) {
                        if self.recover_to_state(language, version, depth, entry.state) {
                            did_recover = true;
                            self.log_parse(|| {
                                format!(
                                    "recover_to_previous state:{}, depth:{depth}",
                                    entry.state
                                )
                            });
                            break;
                        }
                    }
                }
            }
        }

        let mut i = previous_version_count;
        while i < self.stack.version_count() {
            if !self.stack.is_active(i) {
                self.stack.remove_version(i);
            } else {
                i += 1;
            }
        }

        if did_recover && self.stack.version_count() > MAX_VERSION_COUNT {
            self.stack.halt(version);
            return;
        }

        if lookahead.is_eof() {
            self.log_parse(|| String::from("recover_eof"));
            let root = Tree::seal(TreeData::error_node(Vec::new(), false, language));
            self.stack.push(version, Some(root), false, START_STATE);
            self.accept(language, version, &lookahead);
            return;
        }

        let new_cost = current_error_cost
            + ERROR_COST_PER_SKIPPED_TREE
            + lookahead.total_bytes() * ERROR_COST_PER_SKIPPED_CHAR
            + lookahead.total_size().extent.row * ERROR_COST_PER_SKIPPED_LINE;
        if self.better_version_exists(version, false, new_cost) {
            self.stack.halt(version);
            return;
        }

        // Tokens the grammar treats as extras stay extras inside the
        // error chain.
        let start_entry = language.table_entry(START_STATE, lookahead.symbol());
        let lookahead = if matches!(
            start_entry.actions.last(),
            Some(ParseAction::Shift { is_extra: true, .. })
        ) {
            lookahead.with_extra(true)
        } else {
            lookahead
        };

        self.log_parse(|| {
            format!("skip_token symbol:{}", language.symbol_name(lookahead.symbol()))
        });
        let has_external = lookahead.has_external_tokens();
        let external = has_external.then(|| lookahead.last_external_token());
        let mut error_repeat = TreeData::node(
            crate::language::SYM_ERROR_REPEAT,
            vec![lookahead],
            0,
            language,
        );

        if node_count_since_error > 0 {
            // Fold the newly skipped token into the error chain already on
            // top of the stack.
            let slices = self.stack.pop_count(version, 1);
            if let Some(mut slice) = slices.into_iter().next() {
                self.stack.renumber_version(slice.version, version);
                slice.trees.push(Tree::seal(error_repeat));
                error_repeat = TreeData::node(
                    crate::language::SYM_ERROR_REPEAT,
                    slice.trees,
                    0,
                    language,
                );
            }
        }

        self.stack
            .push(version, Some(Tree::seal(error_repeat)), false, ERROR_STATE);

        if let Some(token) = external {
            self.stack.set_last_external_token(version, token);
        }
    }

    /// Pops `depth` trees and, on every path whose bottom state is
    /// `goal_state`, wraps the popped content (together with any error
    /// node just below it) into an extra `ERROR` node.
    pub(super) fn recover_to_state(
        &mut self,
        language: &Language,
        version: StackVersion,
        depth: u32,
        goal_state: StateId,
    ) -> bool {
        let mut slices = self.stack.pop_count(version, depth);
        let mut previous_version: Option<StackVersion> = None;

        let mut i = 0;
        while i < slices.len() {
            let slice_version = slices[i].version;

            if Some(slice_version) == previous_version {
                slices.remove(i);
                continue;
            }

            if self.stack.state(slice_version) != goal_state {
                self.stack.halt(slice_version);
                slices.remove(i);
                continue;
            }

            let mut trees = std::mem::take(&mut slices[i].trees);

            let error_trees = self.stack.pop_error(slice_version);
            if !error_trees.is_empty() {
                debug_assert_eq!(error_trees.len(), 1);
                let error_children: Vec<Tree> = error_trees[0].children().to_vec();
                trees.splice(0..0, error_children);
            }

            let (children, trailing_extras) = super::split_trailing_extras(trees);

            if !children.is_empty() {
                let error = Tree::seal(TreeData::error_node(children, true, language));
                self.stack.push(slice_version, Some(error), false, goal_state);
            }

            for extra in trailing_extras {
                self.stack.push(slice_version, Some(extra), false, goal_state);
            }

            previous_version = Some(slice_version);
            i += 1;
        }

        previous_version.is_some()
    }
}
