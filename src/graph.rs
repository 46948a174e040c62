//! Dependency-graph bookkeeping and cycle detection.
//!
//! The donor threaded adjacency through a hand-rolled, pooled linked list (`list.rs`'s
//! `ListMemPool`/`Node`/`push_front`/`erase_list`) reached via a `modify_graph<F>` callback, and
//! the original C source (`original_source/src/simple_operations.c`) used an AVL tree of raw
//! cell pointers (`avl_insert`/`avl_delete`) for the same purpose. Both are replaced here by
//! plain `BTreeSet<CellHandle>` operations on `Cell::dependencies`/`Cell::dependents` — §4.2's
//! `O(log k)` requirement falls out of `BTreeSet` directly, and the ordering is "by cell
//! identity" for free since `CellHandle` is just the row-major index.

use std::collections::HashSet;

use crate::cell::{CellHandle, Formula, Operand, Rect};
use crate::sheet::Grid;

/// Adds the edge `u -> v` ("u depends on v"): `v` becomes a dependency of `u`, and `u` becomes a
/// dependent of `v`.
pub fn add_edge(grid: &mut Grid, u: CellHandle, v: CellHandle) {
    grid.cell_mut(u).dependencies.insert(v);
    grid.cell_mut(v).dependents.insert(u);
}

/// Removes the edge `u -> v`, symmetrically.
pub fn remove_edge(grid: &mut Grid, u: CellHandle, v: CellHandle) {
    grid.cell_mut(u).dependencies.remove(&v);
    grid.cell_mut(v).dependents.remove(&u);
}

/// Detaches `u` from every cell it currently depends on, leaving `u.dependencies` empty.
pub fn clear_edges_of(grid: &mut Grid, u: CellHandle) {
    let deps: Vec<CellHandle> = grid.cell(u).dependencies.iter().copied().collect();
    for v in deps {
        remove_edge(grid, u, v);
    }
}

/// Installs the edges for `u`'s new formula: `u -> v` for every `v` in `referenced`.
pub fn install_edges(grid: &mut Grid, u: CellHandle, referenced: &HashSet<CellHandle>) {
    for &v in referenced {
        add_edge(grid, u, v);
    }
}

/// Returns the distinct set of cells a candidate formula reads from (§3's "minimality of
/// edges": duplicate references collapse to one edge).
pub fn referenced_cells(grid: &Grid, formula: &Formula) -> HashSet<CellHandle> {
    let mut set = HashSet::new();
    match formula {
        Formula::Constant(_) => {}
        Formula::Reference(src) => {
            set.insert(*src);
        }
        Formula::Binary { lhs, rhs, .. } => {
            for operand in [lhs, rhs] {
                if let Operand::Ref(h) = operand {
                    set.insert(*h);
                }
            }
        }
        Formula::Range { rect, .. } => {
            for r in rect.r0..=rect.r1 {
                for c in rect.c0..=rect.c1 {
                    set.insert(grid.handle(r, c));
                }
            }
        }
        Formula::Sleep(operand) => {
            if let Operand::Ref(h) = operand {
                set.insert(*h);
            }
        }
    }
    set
}

/// `true` if `rect` contains `target`'s own cell — a direct self-reference, rejected before the
/// general cycle check even runs (§4.3).
pub fn rect_contains_cell(grid: &Grid, rect: &Rect, target: CellHandle) -> bool {
    let (row, col) = grid.row_col(target);
    rect.contains(row, col)
}

/// Decides whether installing a formula referencing `referenced` on `target` would create a
/// cycle, *without mutating the graph*.
///
/// A cycle arises iff some cell in `referenced` is reachable from `target` by following the
/// existing `dependents` relation — i.e. `target` is already (transitively) a dependency of that
/// cell, so making `target` depend on it would close a loop. This mirrors
/// `original_source/src/simple_operations.c`'s `hasCycle`/`hasCycleUtil`, generalized from a
/// single `target` cell to an arbitrary referenced set (needed for `Range` formulas).
pub fn would_create_cycle(grid: &Grid, target: CellHandle, referenced: &HashSet<CellHandle>) -> bool {
    if referenced.contains(&target) {
        return true;
    }

    let mut visited = HashSet::new();
    let mut stack = vec![target];
    visited.insert(target);

    while let Some(u) = stack.pop() {
        for &v in grid.cell(u).dependents.iter() {
            if referenced.contains(&v) {
                return true;
            }
            if visited.insert(v) {
                stack.push(v);
            }
        }
    }

    false
}
