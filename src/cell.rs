//! The per-cell data model: identity, formula shape, and adjacency.
//!
//! This replaces the donor's `Info { arg_mask: u8, function_id: usize, arg: [i32; 2], .. }`
//! encoding (see `graph.rs`'s `is_cell_arg1`/`is_cell_arg2` bit tests in the donor project) with
//! a plain tagged `Formula` enum, so a `Range` formula can no longer be read as if it carried a
//! `Binary` operator's operands.

use std::collections::BTreeSet;

/// A cell's identity: its linear row-major index into the grid's cell vector.
pub type CellHandle = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOp {
    Sum,
    Min,
    Max,
    Avg,
    Stdev,
}

/// An operand to a `Binary` or `Sleep` formula: either a literal integer or a cell reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Literal(i32),
    Ref(CellHandle),
}

/// A rectangular cell range, inclusive on both corners, with `top_left <= bottom_right` in both
/// row and column (enforced by the parser and the command pipeline, not by this type itself).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub r0: usize,
    pub c0: usize,
    pub r1: usize,
    pub c1: usize,
}

impl Rect {
    pub fn contains(&self, row: usize, col: usize) -> bool {
        row >= self.r0 && row <= self.r1 && col >= self.c0 && col <= self.c1
    }

    pub fn cell_count(&self) -> usize {
        (self.r1 - self.r0 + 1) * (self.c1 - self.c0 + 1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Formula {
    Constant(i32),
    Reference(CellHandle),
    Binary {
        op: BinaryOp,
        lhs: Operand,
        rhs: Operand,
    },
    Range {
        op: RangeOp,
        rect: Rect,
    },
    Sleep(Operand),
}

impl Default for Formula {
    fn default() -> Self {
        Formula::Constant(0)
    }
}

impl Formula {
    pub fn is_range(&self) -> bool {
        matches!(self, Formula::Range { .. })
    }
}

/// A single grid location: its current value, propagating-error flag, formula, and adjacency.
#[derive(Debug, Clone, Default)]
pub struct Cell {
    pub value: i32,
    pub error: bool,
    pub formula: Formula,
    /// Cells this cell's formula reads from.
    pub dependencies: BTreeSet<CellHandle>,
    /// Cells whose formulas read from this cell.
    pub dependents: BTreeSet<CellHandle>,
    pub row: usize,
    pub col: usize,
}

impl Cell {
    pub fn new(row: usize, col: usize) -> Self {
        Self {
            row,
            col,
            ..Default::default()
        }
    }
}
