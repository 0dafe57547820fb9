// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Reference-counted concrete syntax trees.
//!
//! A [`Tree`] is a cheap handle (one atomic refcount bump to clone) on an
//! immutable node. Nodes own their children, so an entire syntax tree is a
//! DAG of shared, immutable values: incremental reparsing grafts unchanged
//! subtrees from the previous tree into the new one by handle, never by
//! copy.
//!
//! Every node records two extents — `padding` (the whitespace before its
//! content) and `size` (the content itself) — plus the bookkeeping the
//! parser needs to decide reuse later: the parse state it was produced
//! under, how far the lexer looked ahead while producing it
//! (`bytes_scanned`), fragility flags for nodes built under ambiguity, and
//! the serialized external-scanner state for tokens an external scanner
//! produced.
//!
//! Errors are materialized as ordinary nodes: `ERROR` leaves for
//! unrecognizable bytes, zero-width `MISSING` leaves for tokens synthesized
//! during recovery, and `ERROR` internal nodes grouping skipped tokens.

use std::cmp::Ordering;
use std::ops::Deref;
use std::sync::Arc;

use crate::error_cost::{
    ERROR_COST_PER_MISSING_TREE, ERROR_COST_PER_RECOVERY, ERROR_COST_PER_SKIPPED_CHAR,
    ERROR_COST_PER_SKIPPED_LINE,
};
use crate::input::InputEdit;
use crate::language::{
    Language, LexMode, STATE_NONE, StateId, SYM_END, SYM_ERROR, SYM_ERROR_REPEAT, Symbol,
};
use crate::length::Length;

/// The token that begins a subtree, with the lex mode it was produced
/// under. Drives token-reuse decisions during incremental parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirstLeaf {
    /// Symbol of the first token in the subtree.
    pub symbol: Symbol,
    /// Lex mode active when that token was scanned.
    pub lex_mode: LexMode,
}

/// The payload of a tree node. Reached through [`Tree`]'s `Deref`.
#[derive(Debug, Clone)]
pub struct TreeData {
    pub(crate) symbol: Symbol,
    pub(crate) parse_state: StateId,
    pub(crate) alias_sequence_id: u16,
    pub(crate) padding: Length,
    pub(crate) size: Length,
    /// Bytes consulted while producing this subtree, measured from the
    /// start of its padding. Always at least the subtree's own extent.
    pub(crate) bytes_scanned: u32,
    pub(crate) error_cost: u32,
    pub(crate) dynamic_precedence: i32,
    pub(crate) visible_descendant_count: u32,
    pub(crate) visible: bool,
    pub(crate) named: bool,
    pub(crate) extra: bool,
    pub(crate) fragile_left: bool,
    pub(crate) fragile_right: bool,
    pub(crate) has_changes: bool,
    pub(crate) is_missing: bool,
    pub(crate) has_external_tokens: bool,
    pub(crate) first_leaf: FirstLeaf,
    pub(crate) children: Vec<Tree>,
    /// External scanner state serialized after this token was produced.
    pub(crate) external_state: Option<Box<[u8]>>,
    /// First unrecognized character, recorded on error leaves.
    pub(crate) first_error_char: Option<char>,
}

/// A shared handle on an immutable syntax tree node.
#[derive(Debug, Clone)]
pub struct Tree(Arc<TreeData>);

impl Deref for Tree {
    type Target = TreeData;

    fn deref(&self) -> &TreeData {
        &self.0
    }
}

impl TreeData {
    fn empty(symbol: Symbol) -> Self {
        Self {
            symbol,
            parse_state: 0,
            alias_sequence_id: 0,
            padding: Length::ZERO,
            size: Length::ZERO,
            bytes_scanned: 0,
            error_cost: 0,
            dynamic_precedence: 0,
            visible_descendant_count: 0,
            visible: false,
            named: false,
            extra: false,
            fragile_left: false,
            fragile_right: false,
            has_changes: false,
            is_missing: false,
            has_external_tokens: false,
            first_leaf: FirstLeaf {
                symbol,
                lex_mode: LexMode::default(),
            },
            children: Vec::new(),
            external_state: None,
            first_error_char: None,
        }
    }

    /// A token node. The lexer fills in `parse_state`, `bytes_scanned`,
    /// and the first-leaf lex mode before sealing.
    pub(crate) fn leaf(symbol: Symbol, padding: Length, size: Length, language: &Language) -> Self {
        let metadata = language.symbol_metadata(symbol);
        let mut data = Self::empty(symbol);
        data.padding = padding;
        data.size = size;
        data.visible = metadata.visible;
        data.named = metadata.named;
        data
    }

    /// An error leaf covering bytes no recognizer accepted.
    pub(crate) fn error_leaf(padding: Length, size: Length, first_char: Option<char>) -> Self {
        let mut data = Self::empty(SYM_ERROR);
        data.padding = padding;
        data.size = size;
        data.visible = true;
        data.named = true;
        data.fragile_left = true;
        data.fragile_right = true;
        data.parse_state = STATE_NONE;
        data.first_error_char = first_char;
        data.error_cost = ERROR_COST_PER_RECOVERY
            + ERROR_COST_PER_SKIPPED_CHAR * size.bytes
            + ERROR_COST_PER_SKIPPED_LINE * size.extent.row;
        data
    }

    /// A zero-width token synthesized during recovery.
    pub(crate) fn missing_leaf(symbol: Symbol, language: &Language) -> Self {
        let mut data = Self::leaf(symbol, Length::ZERO, Length::ZERO, language);
        data.is_missing = true;
        data.error_cost = ERROR_COST_PER_MISSING_TREE + ERROR_COST_PER_RECOVERY;
        data
    }

    /// An internal node over `children`. All derived fields are computed
    /// here; the caller may still adjust precedence and fragility before
    /// sealing.
    pub(crate) fn node(
        symbol: Symbol,
        children: Vec<Tree>,
        alias_sequence_id: u16,
        language: &Language,
    ) -> Self {
        let metadata = language.symbol_metadata(symbol);
        let mut data = Self::empty(symbol);
        data.alias_sequence_id = alias_sequence_id;
        data.visible = metadata.visible;
        data.named = metadata.named;
        data.assign_children(children, language);
        data
    }

    /// An `ERROR` internal node grouping recovered children.
    pub(crate) fn error_node(children: Vec<Tree>, extra: bool, language: &Language) -> Self {
        let mut data = Self::node(SYM_ERROR, children, 0, language);
        data.visible = true;
        data.named = true;
        data.extra = extra;
        data.fragile_left = true;
        data.fragile_right = true;
        data.parse_state = STATE_NONE;
        data
    }

    /// Recomputes every child-derived field. The only mutation trees
    /// undergo, and only during construction.
    pub(crate) fn assign_children(&mut self, children: Vec<Tree>, _language: &Language) {
        self.children = children;
        self.padding = Length::ZERO;
        self.size = Length::ZERO;
        self.error_cost = 0;
        self.dynamic_precedence = 0;
        self.visible_descendant_count = 0;
        self.has_external_tokens = false;
        self.bytes_scanned = 0;

        let mut offset = Length::ZERO;
        for (i, child) in self.children.iter().enumerate() {
            if i == 0 {
                self.padding = child.padding;
                self.size = child.size;
            } else {
                self.size = self.size + child.total_size();
            }
            self.error_cost += child.error_cost;
            self.dynamic_precedence += child.dynamic_precedence;
            self.visible_descendant_count +=
                child.visible_descendant_count + u32::from(child.visible);
            self.has_external_tokens |= child.has_external_tokens;

            let scan_end = offset.bytes + child.bytes_scanned;
            self.bytes_scanned = self.bytes_scanned.max(scan_end);
            offset = offset + child.total_size();

            if child.symbol == SYM_ERROR {
                self.fragile_left = true;
                self.fragile_right = true;
                self.parse_state = STATE_NONE;
            }
        }
        self.bytes_scanned = self.bytes_scanned.max(self.total_size().bytes);

        if self.symbol == SYM_ERROR || self.symbol == SYM_ERROR_REPEAT {
            self.error_cost += ERROR_COST_PER_RECOVERY
                + ERROR_COST_PER_SKIPPED_CHAR * self.size.bytes
                + ERROR_COST_PER_SKIPPED_LINE * self.size.extent.row;
        }

        if let Some(first) = self.children.first() {
            self.fragile_left |= first.fragile_left;
            self.first_leaf = first.first_leaf;
        }
        if let Some(last) = self.children.last() {
            self.fragile_right |= last.fragile_right;
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// The node's symbol.
    #[must_use]
    pub fn symbol(&self) -> Symbol {
        self.symbol
    }

    /// The parse state this node was produced under, or [`STATE_NONE`].
    #[must_use]
    pub fn parse_state(&self) -> StateId {
        self.parse_state
    }

    /// Whitespace extent before the node's content.
    #[must_use]
    pub fn padding(&self) -> Length {
        self.padding
    }

    /// Extent of the node's content.
    #[must_use]
    pub fn size(&self) -> Length {
        self.size
    }

    /// Padding plus content.
    #[must_use]
    pub fn total_size(&self) -> Length {
        self.padding + self.size
    }

    /// Total bytes covered, including padding.
    #[must_use]
    pub fn total_bytes(&self) -> u32 {
        self.total_size().bytes
    }

    /// The node's children, in document order.
    #[must_use]
    pub fn children(&self) -> &[Tree] {
        &self.children
    }

    /// Accumulated error cost of this subtree.
    #[must_use]
    pub fn error_cost(&self) -> u32 {
        self.error_cost
    }

    /// Accumulated dynamic precedence of this subtree.
    #[must_use]
    pub fn dynamic_precedence(&self) -> i32 {
        self.dynamic_precedence
    }

    /// Bytes the lexer consulted while producing this subtree, measured
    /// from the start of its padding.
    #[must_use]
    pub fn bytes_scanned(&self) -> u32 {
        self.bytes_scanned
    }

    /// Whether this is an `ERROR` node.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.symbol == SYM_ERROR
    }

    /// Whether this is the end-of-input token.
    #[must_use]
    pub fn is_eof(&self) -> bool {
        self.symbol == SYM_END
    }

    /// Whether this token was synthesized during recovery.
    #[must_use]
    pub fn is_missing(&self) -> bool {
        self.is_missing
    }

    /// Whether the node is an extra (trivia) node.
    #[must_use]
    pub fn is_extra(&self) -> bool {
        self.extra
    }

    /// Whether the node appears in the visible tree.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Whether the node is named.
    #[must_use]
    pub fn is_named(&self) -> bool {
        self.named
    }

    /// Whether an edit intersected this subtree since it was produced.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.has_changes
    }

    /// Whether the subtree contains tokens produced by the external
    /// scanner.
    #[must_use]
    pub fn has_external_tokens(&self) -> bool {
        self.has_external_tokens
    }

    /// Whether either edge of the node was produced under ambiguity.
    #[must_use]
    pub fn is_fragile(&self) -> bool {
        self.fragile_left || self.fragile_right
    }

    /// The first token of the subtree.
    #[must_use]
    pub fn first_leaf(&self) -> FirstLeaf {
        self.first_leaf
    }

    /// The serialized external-scanner state stored on this token.
    #[must_use]
    pub fn external_state(&self) -> &[u8] {
        self.external_state.as_deref().unwrap_or(&[])
    }
}

impl Tree {
    pub(crate) fn seal(data: TreeData) -> Tree {
        Tree(Arc::new(data))
    }

    /// Whether two handles refer to the same node object.
    #[must_use]
    pub fn same_node(a: &Tree, b: &Tree) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    /// A shallow copy: fresh scalars, shared children.
    #[must_use]
    pub fn make_copy(&self) -> TreeData {
        (*self.0).clone()
    }

    /// This handle, or a copy, with the extra flag set as given.
    pub(crate) fn with_extra(&self, extra: bool) -> Tree {
        if self.extra == extra {
            self.clone()
        } else {
            let mut data = self.make_copy();
            data.extra = extra;
            Tree::seal(data)
        }
    }

    /// The last external token inside this subtree, if any.
    pub(crate) fn last_external_token(&self) -> Option<Tree> {
        if !self.has_external_tokens {
            return None;
        }
        let mut current = self.clone();
        loop {
            if current.children.is_empty() {
                return Some(current);
            }
            let next = current
                .children
                .iter()
                .rev()
                .find(|child| child.has_external_tokens)?
                .clone();
            current = next;
        }
    }

    /// Applies a text edit, returning the adjusted tree.
    ///
    /// Nodes whose extent or lookahead window intersects the replaced
    /// range are marked changed (so a reparse rebuilds them) and resized;
    /// nodes entirely outside keep their object identity, which is what
    /// lets the next parse reuse them wholesale.
    #[must_use]
    pub fn edit(&self, edit: &InputEdit) -> Tree {
        edit_tree(
            self,
            RelativeEdit {
                start: edit.start(),
                old_end: edit.old_end(),
                new_end: edit.new_end(),
            },
        )
    }
}

/// An edit translated into a node's local coordinate space.
#[derive(Clone, Copy)]
struct RelativeEdit {
    start: Length,
    old_end: Length,
    new_end: Length,
}

fn edit_tree(tree: &Tree, edit: RelativeEdit) -> Tree {
    let end = tree.padding + tree.size;
    let is_noop = edit.old_end.bytes == edit.start.bytes && edit.new_end.bytes == edit.start.bytes;
    let is_pure_insertion = edit.old_end.bytes == edit.start.bytes;

    if is_noop && edit.start.bytes >= end.bytes {
        return tree.clone();
    }
    if edit.start.bytes > end.bytes && edit.start.bytes >= tree.bytes_scanned {
        return tree.clone();
    }

    let mut data = tree.make_copy();
    data.has_changes = true;

    let padding = data.padding;
    let size = data.size;
    if edit.old_end.bytes <= padding.bytes {
        // Edit is entirely in the space before this node: shift it over.
        data.padding = edit.new_end + (padding - edit.old_end);
    } else if edit.start.bytes < padding.bytes {
        // Edit starts in the padding and eats into the content.
        data.size = size.saturating_sub(edit.old_end - padding);
        data.padding = edit.new_end;
    } else if edit.start.bytes == padding.bytes && is_pure_insertion {
        data.padding = edit.new_end;
    } else if edit.start.bytes < end.bytes
        || (edit.start.bytes == end.bytes && is_pure_insertion)
    {
        data.size = (edit.new_end - padding) + (padding + size).saturating_sub(edit.old_end);
    }

    let mut child_left;
    let mut child_right = Length::ZERO;
    let mut found_first_child = false;
    for i in 0..data.children.len() {
        let child = data.children[i].clone();
        let child_size = child.total_size();
        child_left = child_right;
        child_right = child_left + child_size;

        // Children that end before the edit (lookahead window included)
        // are unaffected.
        if child_right.bytes < edit.start.bytes
            && child_left.bytes + child.bytes_scanned <= edit.start.bytes
        {
            continue;
        }

        // Children that start after the edit are unaffected.
        if child_left.bytes > edit.old_end.bytes
            || (child_left.bytes == edit.old_end.bytes && child_size.bytes > 0 && i > 0)
        {
            break;
        }

        let mut child_edit = RelativeEdit {
            start: edit.start - child_left,
            old_end: edit.old_end - child_left,
            new_end: edit.new_end - child_left,
        };
        if edit.start.bytes < child_left.bytes {
            child_edit.start = Length::ZERO;
        }
        if edit.old_end.bytes < child_left.bytes {
            child_edit.old_end = Length::ZERO;
        }
        if edit.old_end.bytes > child_right.bytes {
            child_edit.old_end = child_size;
        }

        // All inserted text belongs to the first affected child; later
        // children only shrink by the removed overlap.
        if found_first_child {
            child_edit.new_end = child_edit.old_end;
        } else {
            found_first_child = true;
        }

        data.children[i] = edit_tree(&child, child_edit);
    }

    Tree::seal(data)
}

/// Total order on trees used to break ties between equally scored parses.
pub(crate) fn compare(a: &TreeData, b: &TreeData) -> Ordering {
    if a.is_missing != b.is_missing {
        return if a.is_missing {
            Ordering::Less
        } else {
            Ordering::Greater
        };
    }
    a.symbol
        .cmp(&b.symbol)
        .then_with(|| a.children.len().cmp(&b.children.len()))
        .then_with(|| {
            for (left, right) in a.children.iter().zip(&b.children) {
                let ordering = compare(left, right);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        })
}

/// Whether two optional external tokens carry the same serialized scanner
/// state. A missing token counts as the empty state.
pub(crate) fn external_state_eq(a: Option<&Tree>, b: Option<&Tree>) -> bool {
    let left = a.map(|t| t.external_state()).unwrap_or(&[]);
    let right = b.map(|t| t.external_state()).unwrap_or(&[]);
    left == right
}
