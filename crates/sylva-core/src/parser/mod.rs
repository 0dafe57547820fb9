// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! The GLR parser driver.
//!
//! [`Parser::parse`] runs the LR automaton over the input, one stack
//! version at a time. Unambiguous regions cost exactly one version; at a
//! conflict the version forks, the alternatives advance independently
//! (sharing their tails through the graph-structured stack), and
//! [`condense`](Parser::condense_stack) merges or prunes them back down
//! after every pass. There is no failure path: when no action fits, the
//! driver pauses the version and the recovery machinery (see the
//! `recovery` submodule) re-enters with discontinuities, missing-token
//! insertions, or token skipping, all priced by the error-cost model.
//!
//! Incremental parsing threads a [`ReusableNode`] cursor over the previous
//! tree; whole subtrees whose bytes were not invalidated are shifted back
//! onto the stack without re-lexing.

mod recovery;

#[cfg(test)]
mod property_tests;

use std::sync::Arc;

use crate::error_cost::{ERROR_COST_PER_SKIPPED_TREE, ErrorStatus, compare_error_status};
use crate::error_cost::ErrorComparison;
use crate::input::Input;
use crate::language::{
    ERROR_STATE, Language, LanguageError, ParseAction, SERIALIZATION_BUFFER_SIZE, START_STATE,
    STATE_NONE, StateId, SYM_END, Symbol, TableEntry,
};
use crate::length::Length;
use crate::lexer::{LexContext, Lexer, TokenCache, lex_token};
use crate::logging::{LogKind, LogSink, Logger};
use crate::reuse::ReusableNode;
use crate::stack::{Stack, StackVersion};
use crate::tree::{self, Tree, TreeData};

pub(crate) const MAX_VERSION_COUNT: usize = 6;
pub(crate) const MAX_SUMMARY_DEPTH: u32 = 16;

/// Per-call parse options.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    /// Stop at the first sign of an error: instead of recovering, wrap
    /// the rest of the input in a single error node and finish.
    pub halt_on_error: bool,
}

/// An incremental, error-tolerant GLR parser.
///
/// A parser is configured once with [`set_language`](Parser::set_language)
/// and then reused across any number of [`parse`](Parser::parse) calls.
/// It is strictly single-threaded: one parse runs to completion in the
/// calling context. Distinct parsers are independent and may run in
/// parallel, each with its own external-scanner instance.
pub struct Parser {
    language: Option<Arc<Language>>,
    stack: Stack,
    scanner: Option<Box<dyn crate::language::ExternalScanner>>,
    token_cache: TokenCache,
    reusable_node: ReusableNode,
    finished_tree: Option<Tree>,
    accept_count: usize,
    in_ambiguity: bool,
    logger: LogSink,
    serialization_buffer: Box<[u8; SERIALIZATION_BUFFER_SIZE]>,
    /// Most versions alive at any point mid-pass during the last parse.
    #[cfg(test)]
    peak_version_count: usize,
    /// Most versions surviving a condensation during the last parse.
    #[cfg(test)]
    peak_condensed_version_count: usize,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    /// Creates a parser with no language installed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            language: None,
            stack: Stack::new(),
            scanner: None,
            token_cache: TokenCache::default(),
            reusable_node: ReusableNode::default(),
            finished_tree: None,
            accept_count: 0,
            in_ambiguity: false,
            logger: LogSink::default(),
            serialization_buffer: Box::new([0; SERIALIZATION_BUFFER_SIZE]),
            #[cfg(test)]
            peak_version_count: 0,
            #[cfg(test)]
            peak_condensed_version_count: 0,
        }
    }

    /// Most versions alive at any point mid-pass during the last parse.
    #[cfg(test)]
    pub(crate) fn peak_version_count(&self) -> usize {
        self.peak_version_count
    }

    /// Most versions surviving a condensation during the last parse.
    /// This is the point where the version bound is enforced.
    #[cfg(test)]
    pub(crate) fn peak_condensed_version_count(&self) -> usize {
        self.peak_condensed_version_count
    }

    /// Installs a language table, replacing any previous one. Creates the
    /// language's external scanner instance; the previous scanner (if
    /// any) is dropped.
    ///
    /// # Errors
    ///
    /// Returns a [`LanguageError`] when the table fails validation; the
    /// parser keeps its previous language in that case.
    pub fn set_language(&mut self, language: Arc<Language>) -> Result<(), LanguageError> {
        language.validate()?;
        self.scanner = language.external_tokens().map(|ext| (ext.factory)());
        self.language = Some(language);
        self.reset();
        Ok(())
    }

    /// The installed language, if any.
    #[must_use]
    pub fn language(&self) -> Option<&Arc<Language>> {
        self.language.as_ref()
    }

    /// Installs (or removes) a log sink for parse and lex events.
    pub fn set_logger(&mut self, logger: Option<Box<dyn Logger>>) {
        self.logger.set(logger);
    }

    /// Discards all per-parse state.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.token_cache.clear();
        self.reusable_node = ReusableNode::default();
        self.finished_tree = None;
        self.accept_count = 0;
        self.in_ambiguity = false;
    }

    /// Parses `input`, producing a concrete syntax tree. Returns `None`
    /// only when no language is installed.
    ///
    /// Pass the previous tree (with edits applied via
    /// [`Tree::edit`]) to reparse incrementally: subtrees whose
    /// byte ranges were not invalidated are reused by handle.
    pub fn parse(
        &mut self,
        input: &mut dyn Input,
        old_tree: Option<&Tree>,
        options: ParseOptions,
    ) -> Option<Tree> {
        let language = self.language.clone()?;
        let language: &Language = &language;
        let mut lexer = Lexer::new(input);
        self.start(language, old_tree);

        let mut last_position = 0u32;
        loop {
            if self.stack.version_count() == 0 {
                break;
            }

            let mut final_cursor = self.reusable_node.clone();
            let mut version = 0;
            while version < self.stack.version_count() {
                let mut cursor = self.reusable_node.clone();
                while self.stack.is_active(version) {
                    let version_count = self.stack.version_count();
                    let state = self.stack.state(version);
                    let position = self.stack.position(version);
                    self.logger.log(LogKind::Parse, || {
                        format!(
                            "process version:{version}, version_count:{version_count}, \
                             state:{state}, row:{}, col:{}",
                            position.extent.row, position.extent.column
                        )
                    });

                    self.advance(&mut lexer, language, version, &mut cursor);

                    #[cfg(test)]
                    {
                        self.peak_version_count =
                            self.peak_version_count.max(self.stack.version_count());
                    }

                    let position = self.stack.position(version).bytes;
                    if position > last_position || (version > 0 && position == last_position) {
                        last_position = position;
                        break;
                    }
                }
                final_cursor = cursor;
                version += 1;
            }
            self.reusable_node = final_cursor;

            let min_error_cost = self.condense_stack(language);
            debug_assert!(self.stack.version_count() <= MAX_VERSION_COUNT);
            #[cfg(test)]
            {
                self.peak_condensed_version_count = self
                    .peak_condensed_version_count
                    .max(self.stack.version_count());
            }

            if let Some(finished) = &self.finished_tree {
                if finished.error_cost() < min_error_cost {
                    break;
                }
            }
            if options.halt_on_error && min_error_cost > 0 {
                self.halt_parse(&mut lexer, language);
                break;
            }

            self.in_ambiguity = version > 1;
        }

        if self.finished_tree.is_none() {
            // Every input must produce a tree, whatever the table did.
            self.stack.clear();
            self.halt_parse(&mut lexer, language);
        }

        self.stack.clear();
        self.token_cache.clear();
        self.reusable_node = ReusableNode::default();
        self.logger.log(LogKind::Parse, || String::from("done"));
        self.finished_tree.take()
    }

    // ========================================================================
    // Setup and teardown
    // ========================================================================

    fn start(&mut self, _language: &Language, old_tree: Option<&Tree>) {
        self.logger.log(LogKind::Parse, || {
            if old_tree.is_some() {
                String::from("parse_after_edit")
            } else {
                String::from("new_parse")
            }
        });
        if let Some(scanner) = self.scanner.as_mut() {
            scanner.deserialize(&[]);
        }
        self.stack.clear();
        self.reusable_node = ReusableNode::new(old_tree.cloned());
        self.finished_tree = None;
        self.accept_count = 0;
        self.in_ambiguity = false;
        #[cfg(test)]
        {
            self.peak_version_count = self.stack.version_count();
            self.peak_condensed_version_count = self.stack.version_count();
        }
    }

    /// Gives up on recovery: consumes the rest of the input under a
    /// single error root and accepts.
    fn halt_parse(&mut self, lexer: &mut Lexer<'_>, language: &Language) {
        self.logger
            .log(LogKind::Parse, || String::from("halting_parse"));

        lexer.advance_to_end();
        let remaining = lexer.current_position() - self.stack.position(0);

        let mut filler = TreeData::error_leaf(Length::ZERO, remaining, None);
        filler.visible = false;
        self.stack.push(0, Some(Tree::seal(filler)), false, 0);

        let root_error = Tree::seal(TreeData::error_node(Vec::new(), false, language));
        self.stack.push(0, Some(root_error), false, 0);

        let eof = Tree::seal(TreeData::leaf(SYM_END, Length::ZERO, Length::ZERO, language));
        self.accept(language, 0, &eof);
    }

    // ========================================================================
    // The per-version step
    // ========================================================================

    /// Advances one version by one lookahead: dispatches the table's
    /// actions, falling back to stack breakdown and then to pausing for
    /// recovery when the table is exhausted.
    fn advance(
        &mut self,
        lexer: &mut Lexer<'_>,
        language: &Language,
        version: StackVersion,
        cursor: &mut ReusableNode,
    ) {
        let mut state = self.stack.state(version);
        let mut lookahead = self.get_lookahead(lexer, language, version, &mut state, cursor);
        let mut actions: Vec<ParseAction> = language
            .table_entry(state, lookahead.first_leaf().symbol)
            .actions
            .to_vec();

        loop {
            let mut last_reduction_version: Option<StackVersion> = None;

            let action_count = actions.len();
            for action in actions.iter().copied() {
                match action {
                    ParseAction::Shift {
                        state: shift_state,
                        is_extra,
                        is_repetition,
                    } => {
                        if is_repetition {
                            continue;
                        }
                        let mut next_state;
                        if is_extra {
                            // Extra shifts are suppressed while recovering.
                            if state == ERROR_STATE {
                                continue;
                            }
                            next_state = state;
                            self.logger
                                .log(LogKind::Parse, || String::from("shift_extra"));
                        } else {
                            next_state = shift_state;
                            self.logger
                                .log(LogKind::Parse, || format!("shift state:{next_state}"));
                        }

                        if !lookahead.children().is_empty() {
                            self.breakdown_lookahead(&mut lookahead, state, cursor);
                            next_state = language.next_state(state, lookahead.symbol());
                        }

                        self.shift(version, next_state, lookahead.clone(), is_extra);
                        if cursor.tree().is_some_and(|t| Tree::same_node(t, &lookahead)) {
                            cursor.advance();
                        }
                        return;
                    }

                    ParseAction::Reduce {
                        symbol,
                        child_count,
                        dynamic_precedence,
                        alias_sequence_id,
                    } => {
                        let is_fragile = action_count > 1;
                        self.logger.log(LogKind::Parse, || {
                            format!(
                                "reduce sym:{}, child_count:{child_count}",
                                language.symbol_name(symbol)
                            )
                        });
                        if let Some(reduced) = self.reduce(
                            language,
                            version,
                            symbol,
                            child_count,
                            dynamic_precedence,
                            alias_sequence_id,
                            is_fragile,
                        ) {
                            last_reduction_version = Some(reduced);
                        }
                    }

                    ParseAction::Accept => {
                        self.logger.log(LogKind::Parse, || String::from("accept"));
                        self.accept(language, version, &lookahead);
                        return;
                    }

                    ParseAction::Recover => {
                        while !lookahead.children().is_empty() {
                            self.breakdown_lookahead(&mut lookahead, state, cursor);
                        }
                        self.recover(language, version, lookahead.clone());
                        if cursor.tree().is_some_and(|t| Tree::same_node(t, &lookahead)) {
                            cursor.advance();
                        }
                        return;
                    }
                }
            }

            if let Some(reduced) = last_reduction_version {
                self.stack.renumber_version(reduced, version);
            } else if state == ERROR_STATE {
                self.recover(language, version, lookahead);
                return;
            } else if !self.breakdown_top_of_stack(language, version) {
                self.logger
                    .log(LogKind::Parse, || String::from("detect_error"));
                self.stack.pause(version, lookahead.first_leaf().symbol);
                return;
            }

            state = self.stack.state(version);
            actions = language
                .table_entry(state, lookahead.first_leaf().symbol)
                .actions
                .to_vec();
        }
    }

    /// Picks the next lookahead for a version: a reusable subtree from
    /// the previous parse if one fits, else the cached token, else a
    /// freshly lexed one.
    fn get_lookahead(
        &mut self,
        lexer: &mut Lexer<'_>,
        language: &Language,
        version: StackVersion,
        state: &mut StateId,
        cursor: &mut ReusableNode,
    ) -> Tree {
        let position = self.stack.position(version);
        let last_external_token = self.stack.last_external_token(version);

        while let Some(result) = cursor.tree().cloned() {
            if cursor.byte_index() > position.bytes {
                self.logger.log(LogKind::Parse, || {
                    format!("before_reusable_node symbol:{}", language.symbol_name(result.symbol()))
                });
                break;
            }

            if cursor.byte_index() < position.bytes {
                self.logger.log(LogKind::Parse, || {
                    format!("past_reusable_node symbol:{}", language.symbol_name(result.symbol()))
                });
                cursor.advance();
                continue;
            }

            if !tree::external_state_eq(cursor.last_external_token(), last_external_token.as_ref())
            {
                self.logger.log(LogKind::Parse, || {
                    format!(
                        "reusable_node_has_different_external_scanner_state symbol:{}",
                        language.symbol_name(result.symbol())
                    )
                });
                cursor.advance();
                continue;
            }

            let reason = if result.has_changes() {
                Some("has_changes")
            } else if result.is_error() {
                Some("is_error")
            } else if result.is_missing() {
                Some("is_missing")
            } else if result.is_fragile() {
                Some("is_fragile")
            } else if self.in_ambiguity && !result.children().is_empty() {
                Some("in_ambiguity")
            } else {
                None
            };

            if let Some(reason) = reason {
                self.logger.log(LogKind::Parse, || {
                    format!(
                        "cant_reuse_node_{reason} tree:{}",
                        language.symbol_name(result.symbol())
                    )
                });
                if !cursor.descend() {
                    cursor.advance();
                    self.breakdown_top_of_stack(language, version);
                    *state = self.stack.state(version);
                }
                continue;
            }

            let entry = language.table_entry(*state, result.first_leaf().symbol);
            if !can_reuse_first_leaf(language, *state, &result, &entry) {
                self.logger.log(LogKind::Parse, || {
                    format!(
                        "cant_reuse_node symbol:{}, first_leaf_symbol:{}",
                        language.symbol_name(result.symbol()),
                        language.symbol_name(result.first_leaf().symbol)
                    )
                });
                *cursor = cursor.after_leaf();
                break;
            }

            self.logger.log(LogKind::Parse, || {
                format!("reuse_node symbol:{}", language.symbol_name(result.symbol()))
            });
            return result;
        }

        if let Some(token) = self.token_cache.get(position.bytes, last_external_token.as_ref()) {
            let entry = language.table_entry(*state, token.first_leaf().symbol);
            if can_reuse_first_leaf(language, *state, &token, &entry) {
                return token;
            }
        }

        let token = lex_token(
            lexer,
            LexContext {
                language,
                scanner: self.scanner.as_deref_mut(),
                last_external_token: last_external_token.as_ref(),
                logger: &mut self.logger,
                serialization_buffer: &mut self.serialization_buffer,
            },
            position,
            *state,
        );
        self.token_cache
            .set(position.bytes, last_external_token, token.clone());
        token
    }

    /// While the reused lookahead is an internal node produced under a
    /// different state, descend into it so re-parsing can proceed at a
    /// finer granularity.
    fn breakdown_lookahead(
        &mut self,
        lookahead: &mut Tree,
        state: StateId,
        cursor: &mut ReusableNode,
    ) {
        let mut did_break_down = false;
        while cursor
            .tree()
            .is_some_and(|t| !t.children().is_empty() && t.parse_state() != state)
        {
            self.logger.log(LogKind::Parse, || String::from("state_mismatch"));
            cursor.descend();
            did_break_down = true;
        }
        if did_break_down {
            if let Some(tree) = cursor.tree() {
                *lookahead = tree.clone();
            }
        }
    }

    fn shift(&mut self, version: StackVersion, state: StateId, lookahead: Tree, extra: bool) {
        let lookahead = if extra != lookahead.is_extra() {
            lookahead.with_extra(extra)
        } else {
            lookahead
        };
        let is_pending = !lookahead.children().is_empty();
        let external = lookahead.has_external_tokens().then(|| lookahead.last_external_token());
        self.stack.push(version, Some(lookahead), is_pending, state);
        if let Some(token) = external {
            self.stack.set_last_external_token(version, token);
        }
    }

    /// Pops `count` trees from a version and pushes the reduced parent,
    /// on every distinct stack path. Returns the first resulting version.
    #[allow(clippy::too_many_arguments)]
    pub(super) fn reduce(
        &mut self,
        language: &Language,
        version: StackVersion,
        symbol: Symbol,
        count: u16,
        dynamic_precedence: i32,
        alias_sequence_id: u16,
        fragile: bool,
    ) -> Option<StackVersion> {
        let initial_version_count = self.stack.version_count();
        let mut slices = self.stack.pop_count(version, u32::from(count));
        let first_slice_version = slices.first().map(|slice| slice.version);

        let mut i = 0;
        while i < slices.len() {
            let slice_version = slices[i].version;
            let trees = std::mem::take(&mut slices[i].trees);

            // Extras on top of the stack stay out of the new parent; they
            // are re-pushed above it afterwards.
            let (children, mut extras) = split_trailing_extras(trees);
            let mut parent = TreeData::node(symbol, children, alias_sequence_id, language);

            // A pop can collapse several previously distinct versions into
            // one; keep the best of their child arrays.
            while i + 1 < slices.len() && slices[i + 1].version == slice_version {
                i += 1;
                let next_trees = std::mem::take(&mut slices[i].trees);
                let (next_children, next_extras) = split_trailing_extras(next_trees);
                let candidate = TreeData::node(symbol, next_children, alias_sequence_id, language);
                if self.select_tree(language, &parent, &candidate) {
                    parent = candidate;
                    extras = next_extras;
                }
            }

            parent.dynamic_precedence += dynamic_precedence;

            let state = self.stack.state(slice_version);
            let next_state = language.next_state(state, symbol);
            if fragile || self.in_ambiguity || slices.len() > 1 || initial_version_count > 1 {
                parent.fragile_left = true;
                parent.fragile_right = true;
                parent.parse_state = STATE_NONE;
            } else {
                parent.parse_state = state;
            }

            self.stack
                .push(slice_version, Some(Tree::seal(parent)), false, next_state);
            for extra in extras {
                self.stack.push(slice_version, Some(extra), false, next_state);
            }

            if self.stack.version_count() > MAX_VERSION_COUNT {
                for halted in slices.iter().skip(i + 1) {
                    self.stack.halt(halted.version);
                }
                while self.stack.version_count() > slice_version + 1 {
                    self.stack.remove_version(slice_version + 1);
                }
                break;
            }
            i += 1;
        }

        // Versions created by this reduction often converge immediately.
        let mut i = initial_version_count;
        while i < self.stack.version_count() {
            let mut merged = false;
            for j in initial_version_count..i {
                if self.stack.merge(j, i) {
                    merged = true;
                    break;
                }
            }
            if !merged {
                i += 1;
            }
        }

        first_slice_version
    }

    /// Finishes one version: wraps the whole stack content into the root
    /// node and enters it in the winner selection.
    fn accept(&mut self, language: &Language, version: StackVersion, lookahead: &Tree) {
        debug_assert!(lookahead.is_eof());
        let lookahead = lookahead.with_extra(true);
        self.stack
            .push(version, Some(lookahead), false, START_STATE);

        let mut slices = self.stack.pop_all(version);
        let first_version = slices.first().map(|slice| slice.version);

        for slice in &mut slices {
            let mut trees = std::mem::take(&mut slice.trees);

            let mut root = None;
            let mut j = trees.len();
            while j > 0 {
                j -= 1;
                if !trees[j].is_extra() {
                    let child = trees.remove(j);
                    let grandchildren: Vec<Tree> = child.children().to_vec();
                    trees.splice(j..j, grandchildren);
                    root = Some(TreeData::node(
                        child.symbol(),
                        trees,
                        child.alias_sequence_id,
                        language,
                    ));
                    break;
                }
            }
            let Some(root) = root else {
                debug_assert!(false, "accepted a stack with no non-extra trees");
                continue;
            };
            let root = Tree::seal(root);
            self.accept_count += 1;

            match self.finished_tree.clone() {
                Some(current) => {
                    if self.select_tree(language, &current, &root) {
                        self.finished_tree = Some(root);
                    }
                }
                None => self.finished_tree = Some(root),
            }
        }

        if let Some(first_version) = first_version {
            self.stack.remove_version(first_version);
        }
        self.stack.halt(version);
    }

    // ========================================================================
    // Version scoring and condensation
    // ========================================================================

    pub(super) fn version_status(&mut self, version: StackVersion) -> ErrorStatus {
        let is_paused = self.stack.is_paused(version);
        let mut cost = self.stack.error_cost(version);
        if is_paused {
            cost += ERROR_COST_PER_SKIPPED_TREE;
        }
        ErrorStatus {
            cost,
            node_count: self.stack.node_count_since_error(version),
            dynamic_precedence: self.stack.dynamic_precedence(version),
            is_in_error: is_paused || self.stack.state(version) == ERROR_STATE,
        }
    }

    /// Whether some other version (or the finished tree) makes a
    /// prospective recovery with the given cost pointless.
    pub(super) fn better_version_exists(
        &mut self,
        version: StackVersion,
        is_in_error: bool,
        cost: u32,
    ) -> bool {
        if let Some(finished) = &self.finished_tree {
            if finished.error_cost() <= cost {
                return true;
            }
        }

        let position = self.stack.position(version);
        let status = ErrorStatus {
            cost,
            is_in_error,
            dynamic_precedence: self.stack.dynamic_precedence(version),
            node_count: self.stack.node_count_since_error(version),
        };

        for i in 0..self.stack.version_count() {
            if i == version
                || !self.stack.is_active(i)
                || self.stack.position(i).bytes < position.bytes
            {
                continue;
            }
            let status_i = self.version_status(i);
            // A healthy version that is already at least as cheap makes
            // the prospective recovery pointless.
            if !status_i.is_in_error && status_i.cost <= cost {
                return true;
            }
            match compare_error_status(status, status_i) {
                ErrorComparison::TakeRight => return true,
                ErrorComparison::PreferRight => {
                    if self.stack.can_merge(i, version) {
                        return true;
                    }
                }
                _ => {}
            }
        }
        false
    }

    /// Merges and prunes versions after a pass, resumes at most one
    /// paused version into error handling, and returns the minimum error
    /// cost across healthy versions.
    fn condense_stack(&mut self, language: &Language) -> u32 {
        let mut made_changes = false;
        let mut min_error_cost = u32::MAX;

        let mut i = 0;
        while i < self.stack.version_count() {
            if self.stack.is_halted(i) {
                self.stack.remove_version(i);
                continue;
            }

            let status_i = self.version_status(i);
            if !status_i.is_in_error && status_i.cost < min_error_cost {
                min_error_cost = status_i.cost;
            }

            let mut removed_i = false;
            let mut j = 0;
            while j < i {
                let status_j = self.version_status(j);
                match compare_error_status(status_j, status_i) {
                    ErrorComparison::TakeLeft => {
                        made_changes = true;
                        self.stack.remove_version(i);
                        removed_i = true;
                        break;
                    }
                    ErrorComparison::PreferLeft | ErrorComparison::None => {
                        if self.stack.merge(j, i) {
                            made_changes = true;
                            removed_i = true;
                            break;
                        }
                        j += 1;
                    }
                    ErrorComparison::PreferRight => {
                        made_changes = true;
                        if self.stack.merge(j, i) {
                            removed_i = true;
                            break;
                        }
                        self.stack.swap_versions(i, j);
                        j += 1;
                    }
                    ErrorComparison::TakeRight => {
                        made_changes = true;
                        self.stack.remove_version(j);
                        i -= 1;
                    }
                }
            }
            if !removed_i {
                i += 1;
            }
        }

        while self.stack.version_count() > MAX_VERSION_COUNT {
            self.stack.remove_version(MAX_VERSION_COUNT);
            made_changes = true;
        }

        if self.stack.version_count() > 0 {
            let mut has_unpaused_version = false;
            let mut i = 0;
            while i < self.stack.version_count() {
                if self.stack.is_paused(i) {
                    if !has_unpaused_version && self.accept_count < MAX_VERSION_COUNT {
                        self.logger
                            .log(LogKind::Parse, || format!("resume version:{i}"));
                        min_error_cost = self.stack.error_cost(i);
                        let lookahead_symbol = self.stack.resume(i);
                        self.handle_error(language, i, lookahead_symbol);
                        has_unpaused_version = true;
                        i += 1;
                    } else {
                        self.stack.remove_version(i);
                    }
                } else {
                    has_unpaused_version = true;
                    i += 1;
                }
            }
        }

        if made_changes {
            self.logger.log(LogKind::Parse, || String::from("condense"));
        }

        min_error_cost
    }

    /// Ranks two candidate trees for the same span; true means the right
    /// one wins.
    pub(super) fn select_tree(
        &mut self,
        language: &Language,
        left: &TreeData,
        right: &TreeData,
    ) -> bool {
        if right.error_cost() < left.error_cost() {
            self.logger.log(LogKind::Parse, || {
                format!(
                    "select_smaller_error symbol:{}, over_symbol:{}",
                    language.symbol_name(right.symbol()),
                    language.symbol_name(left.symbol())
                )
            });
            return true;
        }
        if left.error_cost() < right.error_cost() {
            self.logger.log(LogKind::Parse, || {
                format!(
                    "select_smaller_error symbol:{}, over_symbol:{}",
                    language.symbol_name(left.symbol()),
                    language.symbol_name(right.symbol())
                )
            });
            return false;
        }

        if right.dynamic_precedence() > left.dynamic_precedence() {
            self.logger.log(LogKind::Parse, || {
                format!(
                    "select_higher_precedence symbol:{}, prec:{}, over_symbol:{}, other_prec:{}",
                    language.symbol_name(right.symbol()),
                    right.dynamic_precedence(),
                    language.symbol_name(left.symbol()),
                    left.dynamic_precedence()
                )
            });
            return true;
        }
        if left.dynamic_precedence() > right.dynamic_precedence() {
            self.logger.log(LogKind::Parse, || {
                format!(
                    "select_higher_precedence symbol:{}, prec:{}, over_symbol:{}, other_prec:{}",
                    language.symbol_name(left.symbol()),
                    left.dynamic_precedence(),
                    language.symbol_name(right.symbol()),
                    right.dynamic_precedence()
                )
            });
            return false;
        }

        // With equal nonzero costs there is nothing to choose on merit;
        // keep the incumbent.
        if left.error_cost() > 0 {
            return false;
        }

        match tree::compare(left, right) {
            std::cmp::Ordering::Less => {
                self.logger.log(LogKind::Parse, || {
                    format!(
                        "select_earlier symbol:{}, over_symbol:{}",
                        language.symbol_name(left.symbol()),
                        language.symbol_name(right.symbol())
                    )
                });
                false
            }
            std::cmp::Ordering::Greater => {
                self.logger.log(LogKind::Parse, || {
                    format!(
                        "select_earlier symbol:{}, over_symbol:{}",
                        language.symbol_name(right.symbol()),
                        language.symbol_name(left.symbol())
                    )
                });
                true
            }
            std::cmp::Ordering::Equal => {
                self.logger.log(LogKind::Parse, || {
                    format!(
                        "select_existing symbol:{}, over_symbol:{}",
                        language.symbol_name(left.symbol()),
                        language.symbol_name(right.symbol())
                    )
                });
                false
            }
        }
    }

    pub(super) fn log_parse(&mut self, message: impl FnOnce() -> String) {
        self.logger.log(LogKind::Parse, message);
    }
}

/// Splits trailing extra trees off a popped tree array.
fn split_trailing_extras(mut trees: Vec<Tree>) -> (Vec<Tree>, Vec<Tree>) {
    let split = trees
        .iter()
        .rposition(|tree| !tree.is_extra())
        .map_or(0, |position| position + 1);
    let extras = trees.split_off(split);
    (trees, extras)
}

/// Whether a previous-parse token can stand in for a fresh lex at the
/// given state.
fn can_reuse_first_leaf(
    language: &Language,
    state: StateId,
    tree: &Tree,
    entry: &TableEntry<'_>,
) -> bool {
    let current_lex_mode = language.lex_mode(state);
    let first_leaf = tree.first_leaf();

    // Produced under the same lookahead set (and not a keyword candidate
    // from a different state): always reusable.
    if first_leaf.lex_mode == current_lex_mode
        && (Some(first_leaf.symbol) != language.keyword_capture_token()
            || tree.parse_state() == state)
    {
        return true;
    }

    // Zero-width tokens are tied to their lookahead set.
    if tree.size().bytes == 0 && tree.symbol() != SYM_END {
        return false;
    }

    current_lex_mode.external_lex_state == 0 && entry.is_reusable
}
