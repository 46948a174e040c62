//! Formula evaluation and topological recalculation.
//!
//! Grounded on the donor's `graph.rs` (`Graph::update_values`, which drained its `order_ptr`
//! buffer built by `iterative_dfs`) and `formulas.rs` (`add`/`resolve_args`/`info_invalid`), and
//! on `original_source/src/simple_operations.c`'s `recalcUsingTopoOrder`/`topoDFS_recursive`
//! ("push dependents during DFS, then process the stack in reverse"). This rewrite uses an
//! explicit in-degree queue (Kahn's algorithm) restricted to the affected set instead of a DFS
//! finish-order stack, per §4.5's requirement that ties break by ascending cell identity rather
//! than by DFS visitation order.

use std::collections::{HashMap, HashSet, VecDeque};
use std::thread;
use std::time::Duration;

use crate::cell::{BinaryOp, CellHandle, Formula, Operand, RangeOp};
use crate::sheet::Grid;

/// `compute` failed to converge because the affected-set queue didn't drain — an internal
/// invariant violation, not a user-facing command error (cycles are rejected before this point).
#[derive(Debug, PartialEq, Eq)]
pub struct InternalInvariantViolation;

fn operand_value(grid: &Grid, operand: Operand) -> (i32, bool) {
    match operand {
        Operand::Literal(k) => (k, false),
        Operand::Ref(h) => (grid.cell(h).value, grid.cell(h).error),
    }
}

/// Computes a cell's `(value, error)` pair from its current formula and the current values of
/// its dependencies (§4.4). Never mutates the cell itself; callers write the result back.
pub fn compute(grid: &Grid, handle: CellHandle) -> (i32, bool) {
    let formula = grid.cell(handle).formula.clone();
    match formula {
        Formula::Constant(k) => (k, false),
        Formula::Reference(src) => (grid.cell(src).value, grid.cell(src).error),
        Formula::Binary { op, lhs, rhs } => {
            let (a, a_err) = operand_value(grid, lhs);
            let (b, b_err) = operand_value(grid, rhs);
            if a_err || b_err {
                return (0, true);
            }
            match op {
                BinaryOp::Add => (a.wrapping_add(b), false),
                BinaryOp::Sub => (a.wrapping_sub(b), false),
                BinaryOp::Mul => (a.wrapping_mul(b), false),
                BinaryOp::Div => {
                    if b == 0 {
                        (0, true)
                    } else {
                        (a.wrapping_div(b), false)
                    }
                }
            }
        }
        Formula::Range { op, rect } => {
            let mut values = Vec::with_capacity(rect.cell_count());
            let mut any_error = false;
            for r in rect.r0..=rect.r1 {
                for c in rect.c0..=rect.c1 {
                    let cell = grid.cell(grid.handle(r, c));
                    any_error |= cell.error;
                    values.push(cell.value);
                }
            }
            if any_error {
                return (0, true);
            }
            (range_aggregate(op, &values), false)
        }
        Formula::Sleep(operand) => {
            let (n, _) = operand_value(grid, operand);
            thread::sleep(Duration::from_secs(n.max(0) as u64));
            (n, false)
        }
    }
}

fn range_aggregate(op: RangeOp, values: &[i32]) -> i32 {
    let n = values.len() as i64;
    match op {
        RangeOp::Sum => values.iter().fold(0i32, |acc, &v| acc.wrapping_add(v)),
        RangeOp::Min => *values.iter().min().expect("rect is never empty"),
        RangeOp::Max => *values.iter().max().expect("rect is never empty"),
        RangeOp::Avg => {
            let sum: i64 = values.iter().map(|&v| v as i64).sum();
            (sum / n) as i32
        }
        RangeOp::Stdev => {
            if n <= 1 {
                return 0;
            }
            let sum: i64 = values.iter().map(|&v| v as i64).sum();
            let mean = sum / n;
            let variance: f64 = values
                .iter()
                .map(|&v| {
                    let d = v as f64 - mean as f64;
                    d * d
                })
                .sum::<f64>()
                / n as f64;
            variance.sqrt().round() as i32
        }
    }
}

/// Computes `target`, then recomputes every cell transitively affected by the change, in
/// topological order (§4.5). Returns `Err` only if the affected-set queue fails to drain, which
/// indicates a cycle slipped past installation — an engine bug, not a user error.
pub fn recalc_from(grid: &mut Grid, target: CellHandle) -> Result<(), InternalInvariantViolation> {
    let (value, error) = compute(grid, target);
    grid.cell_mut(target).value = value;
    grid.cell_mut(target).error = error;

    let affected = transitive_dependents(grid, target);
    if affected.is_empty() {
        return Ok(());
    }

    let order = topological_order(grid, &affected)?;
    for handle in order {
        let (value, error) = compute(grid, handle);
        grid.cell_mut(handle).value = value;
        grid.cell_mut(handle).error = error;
    }
    Ok(())
}

/// The transitive closure of `target.dependents`, not including `target` itself.
fn transitive_dependents(grid: &Grid, target: CellHandle) -> HashSet<CellHandle> {
    let mut affected = HashSet::new();
    let mut queue = VecDeque::from_iter(grid.cell(target).dependents.iter().copied());
    while let Some(h) = queue.pop_front() {
        if affected.insert(h) {
            for &next in grid.cell(h).dependents.iter() {
                if !affected.contains(&next) {
                    queue.push_back(next);
                }
            }
        }
    }
    affected
}

/// Kahn's algorithm restricted to `affected`: in-degree for a node counts only `dependents`
/// edges whose source is also inside `affected`. Ties among zero-in-degree nodes break by
/// ascending `CellHandle`, which `BTreeSet` iteration already yields in order, giving a
/// deterministic recalculation order for any fixed grid layout (§4.5).
fn topological_order(
    grid: &Grid,
    affected: &HashSet<CellHandle>,
) -> Result<Vec<CellHandle>, InternalInvariantViolation> {
    let mut in_degree: HashMap<CellHandle, usize> = affected.iter().map(|&h| (h, 0)).collect();
    for &h in affected {
        for &dep in grid.cell(h).dependents.iter() {
            if let Some(count) = in_degree.get_mut(&dep) {
                *count += 1;
            }
        }
    }

    // Deterministic: process in ascending handle order regardless of HashSet iteration order.
    let mut ready: Vec<CellHandle> = affected
        .iter()
        .copied()
        .filter(|h| in_degree[h] == 0)
        .collect();
    ready.sort_unstable();
    let mut queue: VecDeque<CellHandle> = ready.into();

    let mut order = Vec::with_capacity(affected.len());
    while let Some(u) = queue.pop_front() {
        order.push(u);
        let mut newly_ready: Vec<CellHandle> = Vec::new();
        for &v in grid.cell(u).dependents.iter() {
            if let Some(count) = in_degree.get_mut(&v) {
                *count -= 1;
                if *count == 0 {
                    newly_ready.push(v);
                }
            }
        }
        newly_ready.sort_unstable();
        for v in newly_ready {
            queue.push_back(v);
        }
    }

    if order.len() != affected.len() {
        return Err(InternalInvariantViolation);
    }
    Ok(order)
}

/// Recomputes every cell in `registry` (the live Range formulas) in their own mutual topological
/// order: `Y` depends on `X` if `X`'s own cell lies inside `Y`'s rectangle (§4.5's "Range-formula
/// refresh"). A cycle among aggregators is itself an engine-level cycle, surfaced the same way
/// as a failed affected-set drain.
pub fn refresh_range_formulas(
    grid: &mut Grid,
    registry: &[CellHandle],
) -> Result<(), InternalInvariantViolation> {
    if registry.is_empty() {
        return Ok(());
    }

    let set: HashSet<CellHandle> = registry.iter().copied().collect();
    let mut in_degree: HashMap<CellHandle, usize> = set.iter().map(|&h| (h, 0)).collect();
    // Y depends on X (an edge X -> Y) if X's cell is inside Y's rectangle.
    let mut successors: HashMap<CellHandle, Vec<CellHandle>> = HashMap::new();
    for &y in &set {
        if let Formula::Range { rect, .. } = &grid.cell(y).formula {
            for &x in &set {
                if x != y && crate::graph::rect_contains_cell(grid, rect, x) {
                    successors.entry(x).or_default().push(y);
                    *in_degree.get_mut(&y).expect("y is in set") += 1;
                }
            }
        }
    }

    let mut ready: Vec<CellHandle> = set
        .iter()
        .copied()
        .filter(|h| in_degree[h] == 0)
        .collect();
    ready.sort_unstable();
    let mut queue: VecDeque<CellHandle> = ready.into();

    let mut order = Vec::with_capacity(set.len());
    while let Some(u) = queue.pop_front() {
        order.push(u);
        if let Some(succs) = successors.get(&u) {
            let mut newly_ready = Vec::new();
            for &v in succs {
                let count = in_degree.get_mut(&v).expect("v is in set");
                *count -= 1;
                if *count == 0 {
                    newly_ready.push(v);
                }
            }
            newly_ready.sort_unstable();
            for v in newly_ready {
                queue.push_back(v);
            }
        }
    }

    if order.len() != set.len() {
        return Err(InternalInvariantViolation);
    }

    for handle in order {
        let (value, error) = compute(grid, handle);
        grid.cell_mut(handle).value = value;
        grid.cell_mut(handle).error = error;
    }
    Ok(())
}
