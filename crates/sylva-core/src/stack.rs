// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! The graph-structured stack (GSS).
//!
//! A GLR parser explores several parses at once. Rather than duplicating
//! whole LR stacks, the stack is a DAG: each node records a parse state
//! and position, and links (each carrying the tree that was pushed) point
//! at predecessor nodes. A *version* is a head of this DAG; forking a
//! version shares its entire tail, and versions that converge on the same
//! state merge back into one head with multiple links.
//!
//! Nodes live in an arena indexed by integer id and are reference-counted
//! manually: heads own their node, links own their predecessors. Edges
//! only point downward (head toward base), so counts cannot cycle.
//!
//! Popping walks the DAG. Because a head can have several links, popping
//! `n` trees can yield several distinct paths; each comes back as a
//! [`StackSlice`] with the trees in bottom-to-top order, and slices that
//! land on different nodes get fresh versions.

use crate::error_cost::ERROR_COST_PER_RECOVERY;
use crate::language::{ERROR_STATE, START_STATE, StateId, Symbol};
use crate::length::Length;
use crate::tree::{self, Tree};

pub(crate) type StackVersion = usize;

const MAX_LINK_COUNT: usize = 8;
const MAX_ITERATOR_COUNT: usize = 64;

type NodeId = u32;

#[derive(Clone)]
struct StackLink {
    node: NodeId,
    tree: Option<Tree>,
    is_pending: bool,
}

struct StackNode {
    state: StateId,
    position: Length,
    error_cost: u32,
    node_count: u32,
    dynamic_precedence: i32,
    ref_count: u32,
    links: Vec<StackLink>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StackStatus {
    Active,
    Paused(Symbol),
    Halted,
}

struct StackHead {
    node: NodeId,
    status: StackStatus,
    last_external_token: Option<Tree>,
    node_count_at_last_error: u32,
    summary: Option<Vec<StackSummaryEntry>>,
}

/// One recorded `(state, position, depth)` triple along a version's spine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StackSummaryEntry {
    pub position: Length,
    pub depth: u32,
    pub state: StateId,
}

/// One path produced by a pop: the trees along it (bottom-to-top) and the
/// version now standing at the path's bottom node.
#[derive(Debug)]
pub(crate) struct StackSlice {
    pub version: StackVersion,
    pub trees: Vec<Tree>,
}

#[derive(Clone)]
struct StackIter {
    node: NodeId,
    trees: Vec<Tree>,
    tree_count: u32,
    is_pending: bool,
}

struct IterInfo<'a> {
    state: StateId,
    position: Length,
    trees: &'a [Tree],
    tree_count: u32,
    is_pending: bool,
    is_root: bool,
}

#[derive(Clone, Copy)]
struct IterAction {
    pop: bool,
    stop: bool,
}

impl IterAction {
    const NONE: IterAction = IterAction {
        pop: false,
        stop: false,
    };
    const STOP: IterAction = IterAction {
        pop: false,
        stop: true,
    };
    const POP_AND_STOP: IterAction = IterAction {
        pop: true,
        stop: true,
    };
    const POP: IterAction = IterAction {
        pop: true,
        stop: false,
    };
}

/// The graph-structured stack.
pub(crate) struct Stack {
    nodes: Vec<StackNode>,
    free_nodes: Vec<NodeId>,
    heads: Vec<StackHead>,
    base_node: NodeId,
}

fn subtree_node_count(tree: &Tree) -> u32 {
    let mut count = tree.visible_descendant_count + u32::from(tree.is_visible());
    if tree.symbol() == crate::language::SYM_ERROR_REPEAT {
        count += 1;
    }
    count
}

impl Stack {
    pub(crate) fn new() -> Self {
        let mut stack = Self {
            nodes: Vec::new(),
            free_nodes: Vec::new(),
            heads: Vec::new(),
            base_node: 0,
        };
        stack.base_node = stack.node_new(None, None, false, START_STATE);
        stack.clear();
        stack
    }

    /// Drops every version and starts over with a single active version
    /// at the base node.
    pub(crate) fn clear(&mut self) {
        self.retain_node(self.base_node);
        while let Some(head) = self.heads.pop() {
            self.delete_head(head);
        }
        self.heads.push(StackHead {
            node: self.base_node,
            status: StackStatus::Active,
            last_external_token: None,
            node_count_at_last_error: 0,
            summary: None,
        });
    }

    // ========================================================================
    // Node arena
    // ========================================================================

    fn node_new(
        &mut self,
        previous: Option<NodeId>,
        tree: Option<Tree>,
        is_pending: bool,
        state: StateId,
    ) -> NodeId {
        let mut node = StackNode {
            state,
            position: Length::ZERO,
            error_cost: 0,
            node_count: 0,
            dynamic_precedence: 0,
            ref_count: 1,
            links: Vec::new(),
        };

        // Ownership of the caller's reference to `previous` transfers to
        // the new link.
        if let Some(previous) = previous {
            let prev = &self.nodes[previous as usize];
            node.position = prev.position;
            node.error_cost = prev.error_cost;
            node.node_count = prev.node_count;
            node.dynamic_precedence = prev.dynamic_precedence;
            if let Some(tree) = &tree {
                node.error_cost += tree.error_cost();
                node.position = node.position + tree.total_size();
                node.node_count += subtree_node_count(tree);
                node.dynamic_precedence += tree.dynamic_precedence();
            }
            node.links.push(StackLink {
                node: previous,
                tree,
                is_pending,
            });
        }

        if let Some(id) = self.free_nodes.pop() {
            self.nodes[id as usize] = node;
            id
        } else {
            self.nodes.push(node);
            NodeId::try_from(self.nodes.len() - 1).unwrap_or(0)
        }
    }

    fn retain_node(&mut self, id: NodeId) {
        let node = &mut self.nodes[id as usize];
        debug_assert!(node.ref_count > 0);
        node.ref_count += 1;
    }

    fn release_node(&mut self, mut id: NodeId) {
        loop {
            let node = &mut self.nodes[id as usize];
            debug_assert!(node.ref_count > 0);
            node.ref_count -= 1;
            if node.ref_count > 0 {
                return;
            }

            let links = std::mem::take(&mut node.links);
            self.free_nodes.push(id);

            let mut first_predecessor = None;
            for (i, link) in links.into_iter().enumerate() {
                drop(link.tree);
                if i == 0 {
                    first_predecessor = Some(link.node);
                } else {
                    self.release_node(link.node);
                }
            }
            match first_predecessor {
                Some(next) => id = next,
                None => return,
            }
        }
    }

    fn delete_head(&mut self, head: StackHead) {
        self.release_node(head.node);
        drop(head.last_external_token);
        drop(head.summary);
    }

    fn node_add_link(&mut self, target: NodeId, link: StackLink) {
        if link.node == target {
            return;
        }

        for i in 0..self.nodes[target as usize].links.len() {
            let existing = self.nodes[target as usize].links[i].clone();
            if !subtree_is_equivalent(existing.tree.as_ref(), link.tree.as_ref()) {
                continue;
            }

            if existing.node == link.node {
                // Same edge: keep whichever tree carries the higher
                // dynamic precedence.
                let new_precedence = link.tree.as_ref().map_or(0, |t| t.dynamic_precedence());
                let old_precedence = existing.tree.as_ref().map_or(0, |t| t.dynamic_precedence());
                if new_precedence > old_precedence {
                    self.nodes[target as usize].links[i].tree = link.tree;
                    self.nodes[target as usize].dynamic_precedence =
                        self.nodes[link.node as usize].dynamic_precedence + new_precedence;
                }
                return;
            }

            let (existing_state, existing_position, existing_cost) = {
                let node = &self.nodes[existing.node as usize];
                (node.state, node.position.bytes, node.error_cost)
            };
            let (link_state, link_position, link_cost) = {
                let node = &self.nodes[link.node as usize];
                (node.state, node.position.bytes, node.error_cost)
            };
            if existing_state == link_state
                && existing_position == link_position
                && existing_cost == link_cost
            {
                // Equivalent predecessors: fold the new node's links into
                // the existing one instead of adding a parallel edge.
                let sublinks: Vec<StackLink> = self.nodes[link.node as usize].links.clone();
                for sublink in sublinks {
                    self.node_add_link(existing.node, sublink);
                }
                let mut dynamic_precedence = self.nodes[link.node as usize].dynamic_precedence;
                if let Some(tree) = &link.tree {
                    dynamic_precedence += tree.dynamic_precedence();
                }
                if dynamic_precedence > self.nodes[target as usize].dynamic_precedence {
                    self.nodes[target as usize].dynamic_precedence = dynamic_precedence;
                }
                return;
            }
        }

        if self.nodes[target as usize].links.len() == MAX_LINK_COUNT {
            return;
        }

        self.retain_node(link.node);
        let mut node_count = self.nodes[link.node as usize].node_count;
        let mut dynamic_precedence = self.nodes[link.node as usize].dynamic_precedence;
        if let Some(tree) = &link.tree {
            node_count += subtree_node_count(tree);
            dynamic_precedence += tree.dynamic_precedence();
        }
        self.nodes[target as usize].links.push(link);

        let target_node = &mut self.nodes[target as usize];
        if node_count > target_node.node_count {
            target_node.node_count = node_count;
        }
        if dynamic_precedence > target_node.dynamic_precedence {
            target_node.dynamic_precedence = dynamic_precedence;
        }
    }

    // ========================================================================
    // Version queries
    // ========================================================================

    pub(crate) fn version_count(&self) -> usize {
        self.heads.len()
    }

    pub(crate) fn state(&self, version: StackVersion) -> StateId {
        self.nodes[self.heads[version].node as usize].state
    }

    pub(crate) fn position(&self, version: StackVersion) -> Length {
        self.nodes[self.heads[version].node as usize].position
    }

    pub(crate) fn last_external_token(&self, version: StackVersion) -> Option<Tree> {
        self.heads[version].last_external_token.clone()
    }

    pub(crate) fn set_last_external_token(&mut self, version: StackVersion, token: Option<Tree>) {
        self.heads[version].last_external_token = token;
    }

    /// Error cost of a version, including the surcharge for an open
    /// recovery (paused, or sitting on a discontinuity in the error
    /// state).
    pub(crate) fn error_cost(&self, version: StackVersion) -> u32 {
        let head = &self.heads[version];
        let node = &self.nodes[head.node as usize];
        let mut result = node.error_cost;
        let open_discontinuity =
            node.state == ERROR_STATE && node.links.first().is_some_and(|l| l.tree.is_none());
        if matches!(head.status, StackStatus::Paused(_)) || open_discontinuity {
            result += ERROR_COST_PER_RECOVERY;
        }
        result
    }

    pub(crate) fn node_count_since_error(&mut self, version: StackVersion) -> u32 {
        let node_count = self.nodes[self.heads[version].node as usize].node_count;
        let head = &mut self.heads[version];
        if node_count < head.node_count_at_last_error {
            head.node_count_at_last_error = node_count;
        }
        node_count - head.node_count_at_last_error
    }

    pub(crate) fn dynamic_precedence(&self, version: StackVersion) -> i32 {
        self.nodes[self.heads[version].node as usize].dynamic_precedence
    }

    pub(crate) fn is_active(&self, version: StackVersion) -> bool {
        self.heads[version].status == StackStatus::Active
    }

    pub(crate) fn is_paused(&self, version: StackVersion) -> bool {
        matches!(self.heads[version].status, StackStatus::Paused(_))
    }

    pub(crate) fn is_halted(&self, version: StackVersion) -> bool {
        self.heads[version].status == StackStatus::Halted
    }

    // ========================================================================
    // Pushing and popping
    // ========================================================================

    /// Pushes a tree (or a bare discontinuity, with `None`) onto a
    /// version, moving its head to `state`.
    pub(crate) fn push(
        &mut self,
        version: StackVersion,
        tree: Option<Tree>,
        is_pending: bool,
        state: StateId,
    ) {
        let previous = self.heads[version].node;
        let is_discontinuity = tree.is_none();
        let node = self.node_new(Some(previous), tree, is_pending, state);
        self.heads[version].node = node;
        if is_discontinuity {
            self.heads[version].node_count_at_last_error = self.nodes[node as usize].node_count;
        }
    }

    /// Pops every path of `count` non-extra trees from a version.
    pub(crate) fn pop_count(&mut self, version: StackVersion, count: u32) -> Vec<StackSlice> {
        self.iterate(version, true, |info| {
            if info.tree_count == count {
                IterAction::POP_AND_STOP
            } else {
                IterAction::NONE
            }
        })
    }

    /// Pops the top tree if its link is pending (a reused internal node
    /// whose children have not been re-exposed yet).
    pub(crate) fn pop_pending(&mut self, version: StackVersion) -> Vec<StackSlice> {
        let mut slices = self.iterate(version, true, |info| {
            if info.tree_count >= 1 {
                if info.is_pending {
                    IterAction::POP_AND_STOP
                } else {
                    IterAction::STOP
                }
            } else {
                IterAction::NONE
            }
        });
        if !slices.is_empty() {
            let removed = slices[0].version;
            self.renumber_version(removed, version);
            slices[0].version = version;
            for slice in slices.iter_mut().skip(1) {
                if slice.version > removed {
                    slice.version -= 1;
                }
            }
        }
        slices
    }

    /// Pops the `ERROR` tree from the top of a version, if one is there.
    pub(crate) fn pop_error(&mut self, version: StackVersion) -> Vec<Tree> {
        let node = self.heads[version].node;
        let has_error = self.nodes[node as usize]
            .links
            .iter()
            .any(|link| link.tree.as_ref().is_some_and(|tree| tree.is_error()));
        if !has_error {
            return Vec::new();
        }

        let mut found_error = false;
        let mut slices = self.iterate(version, true, |info| {
            if info.trees.is_empty() {
                IterAction::NONE
            } else if !found_error && info.trees[0].is_error() {
                found_error = true;
                IterAction::POP_AND_STOP
            } else {
                IterAction::STOP
            }
        });

        if slices.is_empty() {
            return Vec::new();
        }
        debug_assert_eq!(slices.len(), 1);
        let slice = slices.swap_remove(0);
        self.renumber_version(slice.version, version);
        slice.trees
    }

    /// Pops everything down to the base, one slice per distinct path.
    pub(crate) fn pop_all(&mut self, version: StackVersion) -> Vec<StackSlice> {
        self.iterate(version, true, |info| {
            if info.is_root {
                IterAction::POP
            } else {
                IterAction::NONE
            }
        })
    }

    /// Records the `(state, position, depth)` spine of a version, up to
    /// `max_depth`, for later recovery jumps.
    pub(crate) fn record_summary(&mut self, version: StackVersion, max_depth: u32) {
        let mut summary: Vec<StackSummaryEntry> = Vec::new();
        self.iterate(version, false, |info| {
            let depth = info.tree_count;
            if depth > max_depth {
                return IterAction::STOP;
            }
            for entry in summary.iter().rev() {
                if entry.depth < depth {
                    break;
                }
                if entry.depth == depth && entry.state == info.state {
                    return IterAction::NONE;
                }
            }
            summary.push(StackSummaryEntry {
                position: info.position,
                depth,
                state: info.state,
            });
            IterAction::NONE
        });
        self.heads[version].summary = Some(summary);
    }

    pub(crate) fn summary(&self, version: StackVersion) -> Option<Vec<StackSummaryEntry>> {
        self.heads[version].summary.clone()
    }

    // ========================================================================
    // Version management
    // ========================================================================

    pub(crate) fn copy_version(&mut self, version: StackVersion) -> StackVersion {
        let head = &self.heads[version];
        let new_head = StackHead {
            node: head.node,
            status: StackStatus::Active,
            last_external_token: head.last_external_token.clone(),
            node_count_at_last_error: head.node_count_at_last_error,
            summary: None,
        };
        self.retain_node(new_head.node);
        self.heads.push(new_head);
        self.heads.len() - 1
    }

    pub(crate) fn remove_version(&mut self, version: StackVersion) {
        let head = self.heads.remove(version);
        self.delete_head(head);
    }

    /// Moves version `source` into slot `target` (removing `target`),
    /// keeping `target`'s summary when `source` has none.
    pub(crate) fn renumber_version(&mut self, source: StackVersion, target: StackVersion) {
        if source == target {
            return;
        }
        debug_assert!(target < source);
        debug_assert!(source < self.heads.len());
        let mut source_head = self.heads.remove(source);
        if source_head.summary.is_none() {
            source_head.summary = self.heads[target].summary.take();
        }
        let target_head = std::mem::replace(&mut self.heads[target], source_head);
        self.delete_head(target_head);
    }

    pub(crate) fn swap_versions(&mut self, a: StackVersion, b: StackVersion) {
        self.heads.swap(a, b);
    }

    pub(crate) fn can_merge(&self, a: StackVersion, b: StackVersion) -> bool {
        let head_a = &self.heads[a];
        let head_b = &self.heads[b];
        let node_a = &self.nodes[head_a.node as usize];
        let node_b = &self.nodes[head_b.node as usize];
        head_a.status == StackStatus::Active
            && head_b.status == StackStatus::Active
            && node_a.state == node_b.state
            && node_a.position.bytes == node_b.position.bytes
            && node_a.error_cost == node_b.error_cost
            && tree::external_state_eq(
                head_a.last_external_token.as_ref(),
                head_b.last_external_token.as_ref(),
            )
    }

    /// Merges `b` into `a` when their keys match.
    pub(crate) fn merge(&mut self, a: StackVersion, b: StackVersion) -> bool {
        if !self.can_merge(a, b) {
            return false;
        }
        self.force_merge(a, b);
        true
    }

    /// Merges `b` into `a` unconditionally: `b`'s links are folded into
    /// `a`'s head node and `b` is removed.
    pub(crate) fn force_merge(&mut self, a: StackVersion, b: StackVersion) {
        let node_a = self.heads[a].node;
        let node_b = self.heads[b].node;
        let links: Vec<StackLink> = self.nodes[node_b as usize].links.clone();
        for link in links {
            self.node_add_link(node_a, link);
        }
        if self.nodes[node_a as usize].state == ERROR_STATE {
            self.heads[a].node_count_at_last_error = self.nodes[node_a as usize].node_count;
        }
        self.remove_version(b);
    }

    pub(crate) fn halt(&mut self, version: StackVersion) {
        self.heads[version].status = StackStatus::Halted;
    }

    pub(crate) fn pause(&mut self, version: StackVersion, lookahead: Symbol) {
        let node_count = self.nodes[self.heads[version].node as usize].node_count;
        let head = &mut self.heads[version];
        head.status = StackStatus::Paused(lookahead);
        head.node_count_at_last_error = node_count;
    }

    pub(crate) fn resume(&mut self, version: StackVersion) -> Symbol {
        let head = &mut self.heads[version];
        let StackStatus::Paused(lookahead) = head.status else {
            debug_assert!(false, "resumed a version that was not paused");
            return 0;
        };
        head.status = StackStatus::Active;
        lookahead
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    fn iterate(
        &mut self,
        version: StackVersion,
        collect_trees: bool,
        mut callback: impl FnMut(IterInfo<'_>) -> IterAction,
    ) -> Vec<StackSlice> {
        let mut slices: Vec<StackSlice> = Vec::new();
        let mut iterators = vec![StackIter {
            node: self.heads[version].node,
            trees: Vec::new(),
            tree_count: 0,
            is_pending: true,
        }];

        while !iterators.is_empty() {
            // Iterators forked during this sweep join the next one.
            let mut i = 0;
            let mut sweep_len = iterators.len();
            while i < sweep_len {
                let node_id = iterators[i].node;
                let (state, position, link_count) = {
                    let node = &self.nodes[node_id as usize];
                    (node.state, node.position, node.links.len())
                };

                let action = callback(IterInfo {
                    state,
                    position,
                    trees: &iterators[i].trees,
                    tree_count: iterators[i].tree_count,
                    is_pending: iterators[i].is_pending,
                    is_root: link_count == 0,
                });
                let should_pop = action.pop;
                let should_stop = action.stop || link_count == 0;

                if should_pop {
                    let mut trees = if should_stop {
                        std::mem::take(&mut iterators[i].trees)
                    } else {
                        iterators[i].trees.clone()
                    };
                    trees.reverse();
                    self.add_slice(version, node_id, trees, &mut slices);
                }

                if should_stop {
                    iterators.remove(i);
                    sweep_len -= 1;
                    continue;
                }

                let links: Vec<StackLink> = self.nodes[node_id as usize].links.clone();
                for link in links.iter().skip(1) {
                    if iterators.len() >= MAX_ITERATOR_COUNT {
                        continue;
                    }
                    let mut next = iterators[i].clone();
                    apply_link(&mut next, link, collect_trees);
                    iterators.push(next);
                }
                apply_link(&mut iterators[i], &links[0], collect_trees);
                i += 1;
            }
        }

        slices
    }

    fn add_slice(
        &mut self,
        original_version: StackVersion,
        node: NodeId,
        trees: Vec<Tree>,
        slices: &mut Vec<StackSlice>,
    ) {
        for i in (0..slices.len()).rev() {
            let version = slices[i].version;
            if self.heads[version].node == node {
                slices.insert(i + 1, StackSlice { version, trees });
                return;
            }
        }

        self.retain_node(node);
        let original_head = &self.heads[original_version];
        let head = StackHead {
            node,
            status: StackStatus::Active,
            last_external_token: original_head.last_external_token.clone(),
            node_count_at_last_error: original_head.node_count_at_last_error,
            summary: None,
        };
        self.heads.push(head);
        slices.push(StackSlice {
            version: self.heads.len() - 1,
            trees,
        });
    }
}

fn apply_link(iter: &mut StackIter, link: &StackLink, collect_trees: bool) {
    iter.node = link.node;
    match &link.tree {
        Some(tree) => {
            if collect_trees {
                iter.trees.push(tree.clone());
            }
            if !tree.is_extra() {
                iter.tree_count += 1;
                if !link.is_pending {
                    iter.is_pending = false;
                }
            }
        }
        None => {
            iter.tree_count += 1;
            iter.is_pending = false;
        }
    }
}

fn subtree_is_equivalent(left: Option<&Tree>, right: Option<&Tree>) -> bool {
    match (left, right) {
        (None, None) => true,
        (Some(left), Some(right)) => {
            if Tree::same_node(left, right) {
                return true;
            }
            if left.symbol() != right.symbol() {
                return false;
            }
            if left.error_cost() > 0 && right.error_cost() > 0 {
                return true;
            }
            left.padding().bytes == right.padding().bytes
                && left.size().bytes == right.size().bytes
                && left.children().len() == right.children().len()
                && left.is_extra() == right.is_extra()
                && tree::external_state_eq(
                    left.last_external_token().as_ref(),
                    right.last_external_token().as_ref(),
                )
        }
        _ => false,
    }
}
