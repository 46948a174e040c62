//! The command pipeline: turning a validated formula assignment into a consistent grid (§4.6).
//!
//! Grounded on the donor's `status.rs` (`StatusCode`/`process_command`, which drove the same
//! validate-then-mutate sequence through a single global `Sheet`) and
//! `original_source/src/simple_operations.c`'s `processCommand` (bounds check, build the new
//! dependency list, `hasCycle`, detach old edges, install new edges, recalc). `Engine` replaces
//! the donor's free functions closing over a global `Sheet`/`Graph` pair with an explicit owner
//! of both the grid and the range-formula registry.

use crate::cell::{CellHandle, Formula};
use crate::graph::{self, clear_edges_of, install_edges, referenced_cells, would_create_cycle};
use crate::recalc::{self, InternalInvariantViolation};
use crate::sheet::Grid;

/// Why a command was rejected outright, before the grid was touched (§7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// A cell reference named a row/column outside the grid's dimensions.
    BadRef,
    /// The command text didn't match any recognized grammar.
    BadSyntax,
    /// A range's top-left corner wasn't above-and-left of its bottom-right corner.
    BadRange,
    /// A Range formula's rectangle contains its own target cell.
    SelfReference,
    /// Installing the formula would create a circular dependency.
    Cycle,
    /// A range aggregate named a function this engine doesn't implement.
    UnknownFunc,
    /// A literal operand couldn't be parsed as a 32-bit integer.
    BadLiteral,
    /// The recalculation engine's topological sort failed to drain — a bug, not a user error.
    InternalInvariant,
}

impl From<InternalInvariantViolation> for CommandError {
    fn from(_: InternalInvariantViolation) -> Self {
        CommandError::InternalInvariant
    }
}

/// A validated assignment, ready to install. Parsing and bounds-checking happen upstream in
/// `parser.rs`; by the time an `Assign` command reaches `Engine::apply`, every `CellHandle` and
/// `Rect` inside it is already known to be in bounds.
pub struct Assign {
    pub target: CellHandle,
    pub formula: Formula,
}

/// Owns the grid plus the set of cells currently holding a live `Range` formula, which must be
/// refreshed in their own mutual topological order after any edit (§4.5).
pub struct Engine {
    pub grid: Grid,
    range_registry: Vec<CellHandle>,
}

impl Engine {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            grid: Grid::new(rows, cols),
            range_registry: Vec::new(),
        }
    }

    /// Applies a validated assignment: cycle-checks, rewires the dependency graph, recalculates
    /// every transitively affected cell, then refreshes the range-formula registry (§4.6).
    pub fn apply(&mut self, command: Assign) -> Result<(), CommandError> {
        let Assign { target, formula } = command;

        if let Formula::Range { rect, .. } = &formula {
            if graph::rect_contains_cell(&self.grid, rect, target) {
                return Err(CommandError::SelfReference);
            }
        }

        let referenced = referenced_cells(&self.grid, &formula);
        if would_create_cycle(&self.grid, target, &referenced) {
            return Err(CommandError::Cycle);
        }

        clear_edges_of(&mut self.grid, target);
        install_edges(&mut self.grid, target, &referenced);
        let is_range = formula.is_range();
        self.grid.cell_mut(target).formula = formula;

        if is_range {
            if !self.range_registry.contains(&target) {
                self.range_registry.push(target);
            }
        } else {
            self.range_registry.retain(|&h| h != target);
        }

        recalc::recalc_from(&mut self.grid, target)?;
        recalc::refresh_range_formulas(&mut self.grid, &self.range_registry.clone())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{BinaryOp, Operand, RangeOp, Rect};

    fn assign_constant(engine: &mut Engine, target: CellHandle, value: i32) {
        engine
            .apply(Assign {
                target,
                formula: Formula::Constant(value),
            })
            .unwrap();
    }

    // §8 scenario: simple propagation. A1=10, B1=A1+5; changing A1 updates B1.
    #[test]
    fn scenario_simple_propagation() {
        let mut engine = Engine::new(2, 2);
        let a1 = engine.grid.handle(0, 0);
        let b1 = engine.grid.handle(0, 1);
        assign_constant(&mut engine, a1, 10);
        engine
            .apply(Assign {
                target: b1,
                formula: Formula::Binary {
                    op: BinaryOp::Add,
                    lhs: Operand::Ref(a1),
                    rhs: Operand::Literal(5),
                },
            })
            .unwrap();
        assert_eq!(engine.grid.cell(b1).value, 15);

        assign_constant(&mut engine, a1, 20);
        assert_eq!(engine.grid.cell(b1).value, 25);
    }

    // §8 scenario: range aggregate. C1 = SUM(A1:B1), recomputed as inputs change.
    #[test]
    fn scenario_range_aggregate() {
        let mut engine = Engine::new(1, 3);
        let a1 = engine.grid.handle(0, 0);
        let b1 = engine.grid.handle(0, 1);
        let c1 = engine.grid.handle(0, 2);
        assign_constant(&mut engine, a1, 3);
        assign_constant(&mut engine, b1, 4);
        engine
            .apply(Assign {
                target: c1,
                formula: Formula::Range {
                    op: RangeOp::Sum,
                    rect: Rect {
                        r0: 0,
                        c0: 0,
                        r1: 0,
                        c1: 1,
                    },
                },
            })
            .unwrap();
        assert_eq!(engine.grid.cell(c1).value, 7);

        assign_constant(&mut engine, a1, 100);
        assert_eq!(engine.grid.cell(c1).value, 104);
    }

    // §8 scenario: cycle rejection. A1=B1+1 then B1=A1+1 must be refused, leaving A1 untouched.
    #[test]
    fn scenario_cycle_rejection() {
        let mut engine = Engine::new(1, 2);
        let a1 = engine.grid.handle(0, 0);
        let b1 = engine.grid.handle(0, 1);
        engine
            .apply(Assign {
                target: a1,
                formula: Formula::Binary {
                    op: BinaryOp::Add,
                    lhs: Operand::Ref(b1),
                    rhs: Operand::Literal(1),
                },
            })
            .unwrap();

        let result = engine.apply(Assign {
            target: b1,
            formula: Formula::Binary {
                op: BinaryOp::Add,
                lhs: Operand::Ref(a1),
                rhs: Operand::Literal(1),
            },
        });
        assert_eq!(result, Err(CommandError::Cycle));
        // Rejected command must not have mutated B1's formula or A1's dependent value.
        assert_eq!(engine.grid.cell(b1).formula, Formula::Constant(0));
    }

    // §8 scenario: error propagation and recovery through a division-by-zero chain.
    #[test]
    fn scenario_error_propagation_and_recovery() {
        let mut engine = Engine::new(1, 3);
        let a1 = engine.grid.handle(0, 0);
        let b1 = engine.grid.handle(0, 1);
        let c1 = engine.grid.handle(0, 2);
        assign_constant(&mut engine, a1, 10);
        assign_constant(&mut engine, b1, 0);
        engine
            .apply(Assign {
                target: c1,
                formula: Formula::Binary {
                    op: BinaryOp::Div,
                    lhs: Operand::Ref(a1),
                    rhs: Operand::Ref(b1),
                },
            })
            .unwrap();
        assert!(engine.grid.cell(c1).error);

        assign_constant(&mut engine, b1, 2);
        assert!(!engine.grid.cell(c1).error);
        assert_eq!(engine.grid.cell(c1).value, 5);
    }

    // §8 scenario: chained aggregate. D1 = SUM(A1:C1) where C1 itself is a Range over A1:B1.
    #[test]
    fn scenario_chained_aggregate() {
        let mut engine = Engine::new(1, 4);
        let a1 = engine.grid.handle(0, 0);
        let b1 = engine.grid.handle(0, 1);
        let c1 = engine.grid.handle(0, 2);
        let d1 = engine.grid.handle(0, 3);
        assign_constant(&mut engine, a1, 1);
        assign_constant(&mut engine, b1, 2);
        engine
            .apply(Assign {
                target: c1,
                formula: Formula::Range {
                    op: RangeOp::Sum,
                    rect: Rect {
                        r0: 0,
                        c0: 0,
                        r1: 0,
                        c1: 1,
                    },
                },
            })
            .unwrap();
        engine
            .apply(Assign {
                target: d1,
                formula: Formula::Range {
                    op: RangeOp::Sum,
                    rect: Rect {
                        r0: 0,
                        c0: 0,
                        r1: 0,
                        c1: 2,
                    },
                },
            })
            .unwrap();
        assert_eq!(engine.grid.cell(c1).value, 3);
        assert_eq!(engine.grid.cell(d1).value, 6);

        assign_constant(&mut engine, a1, 10);
        assert_eq!(engine.grid.cell(c1).value, 12);
        assert_eq!(engine.grid.cell(d1).value, 24);
    }

    // §8 scenario: range self-reference is rejected.
    #[test]
    fn scenario_range_self_reference_is_rejected() {
        let mut engine = Engine::new(2, 2);
        let a1 = engine.grid.handle(0, 0);
        let result = engine.apply(Assign {
            target: a1,
            formula: Formula::Range {
                op: RangeOp::Sum,
                rect: Rect {
                    r0: 0,
                    c0: 0,
                    r1: 1,
                    c1: 1,
                },
            },
        });
        assert_eq!(result, Err(CommandError::SelfReference));
    }

    // A direct `A1=A1` reference isn't a Range rectangle, so it falls under the generic
    // cycle-detector contract (§4.3): trivially reachable from itself, reported as `Cycle`
    // rather than the Range-scoped `SelfReference`.
    #[test]
    fn direct_self_reference_is_reported_as_a_cycle() {
        let mut engine = Engine::new(1, 1);
        let a1 = engine.grid.handle(0, 0);
        let result = engine.apply(Assign {
            target: a1,
            formula: Formula::Reference(a1),
        });
        assert_eq!(result, Err(CommandError::Cycle));
    }

    #[test]
    fn reassigning_a_cell_detaches_its_old_edges() {
        let mut engine = Engine::new(1, 3);
        let a1 = engine.grid.handle(0, 0);
        let b1 = engine.grid.handle(0, 1);
        let c1 = engine.grid.handle(0, 2);
        assign_constant(&mut engine, a1, 1);
        engine
            .apply(Assign {
                target: c1,
                formula: Formula::Reference(a1),
            })
            .unwrap();
        assert!(engine.grid.cell(a1).dependents.contains(&c1));

        assign_constant(&mut engine, c1, 99);
        assert!(!engine.grid.cell(a1).dependents.contains(&c1));
        assign_constant(&mut engine, a1, 5);
        assert_eq!(engine.grid.cell(c1).value, 99);
    }
}
