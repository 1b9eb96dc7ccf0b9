//! Dependency graph between cells.
//!
//! Edge direction:
//!
//! ```text
//! A → B  means  "A references B"  (B is a precedent of A)
//! ```
//!
//! The graph keeps a forward and a backward adjacency index in lock-step:
//! every forward edge `(a, b)` has a mirrored backward edge `(b, a)`.
//! Walking backward from a cell therefore yields everything that
//! transitively *depends on* it: the set whose caches must be dropped when
//! the cell changes.
//!
//! # Invariants
//!
//! 1. **Mirror consistency:** forward and backward edge counts are equal,
//!    and `(a, b)` is forward iff `(b, a)` is backward.
//! 2. **No dangling entries:** empty adjacency sets are removed, not stored.
//! 3. **No duplicate edges:** set semantics per vertex.
//!
//! Positions are stored by value in both indexes; nothing here borrows from
//! the cell store, so cells can be swapped freely without touching the graph.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::position::Position;

/// A directed edge between two cell positions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Edge {
    pub from: Position,
    pub to: Position,
}

impl Edge {
    pub fn new(from: Position, to: Position) -> Self {
        Self { from, to }
    }
}

/// Which of the two mirrored graphs a traversal walks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// One adjacency index: vertex → set of edge targets.
#[derive(Clone, Debug, Default)]
struct Adjacency {
    targets: FxHashMap<Position, FxHashSet<Position>>,
    edge_count: usize,
}

impl Adjacency {
    fn insert(&mut self, from: Position, to: Position) -> bool {
        let inserted = self.targets.entry(from).or_default().insert(to);
        if inserted {
            self.edge_count += 1;
        }
        inserted
    }

    fn remove(&mut self, from: Position, to: Position) -> bool {
        let Some(set) = self.targets.get_mut(&from) else {
            return false;
        };
        if !set.remove(&to) {
            return false;
        }
        if set.is_empty() {
            self.targets.remove(&from);
        }
        self.edge_count -= 1;
        true
    }

    fn remove_vertex(&mut self, vertex: Position) -> Option<FxHashSet<Position>> {
        let set = self.targets.remove(&vertex)?;
        self.edge_count -= set.len();
        Some(set)
    }

    fn contains(&self, from: Position, to: Position) -> bool {
        self.targets.get(&from).is_some_and(|set| set.contains(&to))
    }
}

/// Bidirectional dependency graph over cell positions.
#[derive(Clone, Debug, Default)]
pub struct DepGraph {
    forward: Adjacency,
    backward: Adjacency,
}

impl DepGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a forward edge and its backward mirror. Returns `false` (and
    /// changes nothing) if the edge is already present.
    pub fn add_edge(&mut self, edge: Edge) -> bool {
        if !self.forward.insert(edge.from, edge.to) {
            return false;
        }
        self.backward.insert(edge.to, edge.from);
        true
    }

    /// Batch insert; returns how many edges were actually new.
    pub fn add_edges(&mut self, edges: impl IntoIterator<Item = Edge>) -> usize {
        edges
            .into_iter()
            .filter(|&edge| self.add_edge(edge))
            .count()
    }

    /// Remove an edge and its mirror. Returns whether the forward graph
    /// contained it.
    pub fn erase_edge(&mut self, edge: Edge) -> bool {
        if !self.forward.remove(edge.from, edge.to) {
            return false;
        }
        self.backward.remove(edge.to, edge.from);
        true
    }

    /// Remove every edge *leaving* `vertex` (with mirrors). Inbound edges
    /// are untouched and remain the caller's responsibility. Returns
    /// whether the vertex had any outgoing edges.
    pub fn erase_vertex(&mut self, vertex: Position) -> bool {
        let Some(targets) = self.forward.remove_vertex(vertex) else {
            return false;
        };
        for target in &targets {
            self.backward.remove(*target, vertex);
        }
        true
    }

    /// True if either direction contains the edge.
    pub fn has_edge(&self, edge: Edge) -> bool {
        self.forward.contains(edge.from, edge.to) || self.backward.contains(edge.from, edge.to)
    }

    /// Edges leaving `vertex` in the forward graph.
    pub fn incident_edges(&self, vertex: Position) -> impl Iterator<Item = Edge> + '_ {
        self.forward
            .targets
            .get(&vertex)
            .into_iter()
            .flat_map(move |set| set.iter().map(move |&to| Edge::new(vertex, to)))
    }

    /// Number of vertices with outgoing forward edges.
    pub fn vertex_count(&self) -> usize {
        self.forward.targets.len()
    }

    /// Number of forward edges.
    pub fn edge_count(&self) -> usize {
        debug_assert_eq!(self.forward.edge_count, self.backward.edge_count);
        self.forward.edge_count
    }

    /// True if some cell currently references `vertex`.
    pub fn has_dependents(&self, vertex: Position) -> bool {
        self.backward.targets.contains_key(&vertex)
    }

    /// Depth-first walk from `from` in the given direction, visiting every
    /// edge of every reachable vertex once. `action` is invoked per edge;
    /// returning `true` aborts the walk.
    ///
    /// The stack is explicit, so deep dependency chains cannot overflow the
    /// call stack. Visit order within a vertex's adjacency is unspecified.
    pub fn traverse(
        &self,
        from: Position,
        direction: Direction,
        mut action: impl FnMut(Edge) -> bool,
    ) {
        let adjacency = match direction {
            Direction::Forward => &self.forward,
            Direction::Backward => &self.backward,
        };

        let mut visited: FxHashSet<Position> = FxHashSet::default();
        let mut stack = vec![from];
        visited.insert(from);

        while let Some(vertex) = stack.pop() {
            let Some(targets) = adjacency.targets.get(&vertex) else {
                continue;
            };
            for &target in targets {
                if action(Edge::new(vertex, target)) {
                    return;
                }
                if visited.insert(target) {
                    stack.push(target);
                }
            }
        }
    }

    /// Would pointing `from` at every position in `refs` create a cycle?
    ///
    /// Runs against the current (pre-update) graph: a ref equal to `from`
    /// is an immediate cycle; otherwise a forward walk from each ref looks
    /// for a path back to `from`. The walk stops at `from` without
    /// descending through it, so edges still rooted at `from` from a
    /// previous formula cannot mask the probe.
    pub fn creates_cycle(&self, from: Position, refs: &[Position]) -> bool {
        refs.iter().any(|&start| {
            if start == from {
                return true;
            }

            let mut visited: FxHashSet<Position> = FxHashSet::default();
            let mut stack = vec![start];
            visited.insert(start);

            while let Some(vertex) = stack.pop() {
                let Some(targets) = self.forward.targets.get(&vertex) else {
                    continue;
                };
                for &target in targets {
                    if target == from {
                        return true;
                    }
                    if visited.insert(target) {
                        stack.push(target);
                    }
                }
            }
            false
        })
    }
}
