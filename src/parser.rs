//! Parses REPL input lines into `command::Assign`/control commands.
//!
//! The donor's `parser.rs` (kept here nearly verbatim: the `PATTERNS` regex table, the
//! `handle_assignment`/`handle_arithmetic`/`handle_range`/`handle_expression`/`handle_integer`
//! decomposition, `value_parser`, `cell_parser`, `control_parser`) filled in a mutable `Info`
//! struct as it matched. That struct is gone along with the bitmask it encoded; every `handle_*`
//! function here returns a `Formula` value instead, built against `grid` for bounds-checking.

use lazy_static::lazy_static;
use regex::Regex;
use std::str::FromStr;

use crate::cell::{BinaryOp, Formula, Operand, RangeOp, Rect};
use crate::command::{Assign, CommandError};
use crate::convert;
use crate::sheet::Grid;

lazy_static! {
    static ref PATTERNS: [Regex; 7] = [
        Regex::new(r"^([A-Z]{1,3}[1-9][0-9]{0,2}|[+-]?[0-9]+)$").unwrap(), // ASSIGNMENT
        Regex::new(r"^SLEEP\(([A-Z]{1,3}[1-9][0-9]{0,2}|[+-]?[0-9]+)\)$").unwrap(), // SLEEP
        Regex::new(r"^([A-Z]{1,3}[1-9][0-9]{0,2}|[+-]?[0-9]+)([-+*/])([A-Z]{1,3}[1-9][0-9]{0,2}|[+-]?[0-9]+)$").unwrap(), // ARITHMETIC
        Regex::new(r"^(MAX|MIN|SUM|AVG|STDEV)\(([A-Z]{1,3}[1-9][0-9]{0,2}):([A-Z]{1,3}[1-9][0-9]{0,2})\)$").unwrap(), // RANGE
        Regex::new(r"^([A-Z]{1,3}[1-9][0-9]{0,2})=(.+)$").unwrap(), // EXPRESSION
        Regex::new(r"^scroll_to ([A-Z]{1,3}[1-9][0-9]{0,2})$").unwrap(), // SCROLL_TO
        Regex::new(r"^[+-]?[0-9]+$").unwrap(), // INTEGER
    ];
}

/// Offset into `Formula::Binary`'s operator space for the four arithmetic operators, matched in
/// the same `+-*/` order the ARITHMETIC pattern's capture group does.
const OPERATORS: [char; 4] = ['+', '-', '*', '/'];

#[derive(Debug, PartialEq, Eq)]
pub enum ParseError {
    InvalidCommand,
    InvalidCell,
    InvalidRange,
    InvalidValue,
}

impl From<ParseError> for CommandError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::InvalidCommand => CommandError::BadSyntax,
            ParseError::InvalidCell => CommandError::BadRef,
            ParseError::InvalidRange => CommandError::BadRange,
            ParseError::InvalidValue => CommandError::BadLiteral,
        }
    }
}

/// A single-character viewport move, queued by the REPL rather than applied here — the parser
/// has no mutable access to the grid it's validating against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scroll {
    Up,
    Down,
    Left,
    Right,
}

#[derive(Debug)]
pub enum ParsedLine {
    Assign(Assign),
    ScrollTo(usize, usize),
    Scroll(Scroll),
    SetOutput(bool),
    Quit,
}

/// Parses one line of REPL input against `grid`'s current dimensions.
pub fn parse(input: &str, grid: &Grid) -> Result<ParsedLine, ParseError> {
    if input.is_empty() {
        return Err(ParseError::InvalidCommand);
    }

    if input.len() == 1 {
        return control_parser(input);
    }

    if input == "disable_output" {
        return Ok(ParsedLine::SetOutput(false));
    }
    if input == "enable_output" {
        return Ok(ParsedLine::SetOutput(true));
    }
    if let Some(caps) = PATTERNS[5].captures(input) {
        let (row, col) = cell_parser(caps.get(1).unwrap().as_str(), grid)?;
        return Ok(ParsedLine::ScrollTo(row, col));
    }

    if let Some(caps) = PATTERNS[4].captures(input) {
        let (row, col) = cell_parser(caps.get(1).unwrap().as_str(), grid)?;
        let target = grid.handle(row, col);
        let formula = expression_parser(caps.get(2).unwrap().as_str(), grid)?;
        return Ok(ParsedLine::Assign(Assign { target, formula }));
    }

    Err(ParseError::InvalidCommand)
}

fn control_parser(input: &str) -> Result<ParsedLine, ParseError> {
    match input {
        "q" => Ok(ParsedLine::Quit),
        "w" => Ok(ParsedLine::Scroll(Scroll::Up)),
        "s" => Ok(ParsedLine::Scroll(Scroll::Down)),
        "a" => Ok(ParsedLine::Scroll(Scroll::Left)),
        "d" => Ok(ParsedLine::Scroll(Scroll::Right)),
        _ => Err(ParseError::InvalidCommand),
    }
}

/// Parses the right-hand side of an `A1=...` assignment into a `Formula`, recursing once for
/// the `EXPRESSION` pattern's own right-hand side (match type 4 is intentionally absent from the
/// dispatch below — `parse` already consumed it on the way in, and `handle_expression` is the
/// only caller that re-enters this function).
fn expression_parser(expr: &str, grid: &Grid) -> Result<Formula, ParseError> {
    for (match_type, re) in PATTERNS.iter().enumerate() {
        if match_type == 5 {
            continue;
        }
        if let Some(caps) = re.captures(expr) {
            return match match_type {
                0 | 1 => handle_assignment(&caps, grid, match_type),
                2 => handle_arithmetic(&caps, grid),
                3 => handle_range(&caps, grid),
                4 => handle_expression(&caps, grid),
                6 => handle_integer(&caps),
                _ => Err(ParseError::InvalidCommand),
            };
        }
    }
    Err(ParseError::InvalidCommand)
}

/// Match type 0: a bare literal or cell reference. Match type 1: `SLEEP(...)` around the same.
fn handle_assignment(
    caps: &regex::Captures,
    grid: &Grid,
    match_type: usize,
) -> Result<Formula, ParseError> {
    let operand = value_to_operand(caps.get(1).unwrap().as_str(), grid)?;
    Ok(match match_type {
        0 => match operand {
            Operand::Literal(k) => Formula::Constant(k),
            Operand::Ref(h) => Formula::Reference(h),
        },
        1 => Formula::Sleep(operand),
        _ => unreachable!("handle_assignment only dispatches for match types 0 and 1"),
    })
}

/// Match type 2: `<value><op><value>` arithmetic, e.g. `A1+10` or `20/B3`.
fn handle_arithmetic(caps: &regex::Captures, grid: &Grid) -> Result<Formula, ParseError> {
    let op_str = caps.get(2).unwrap().as_str();
    let op_char = op_str.chars().next().ok_or(ParseError::InvalidCommand)?;
    let op = match OPERATORS
        .iter()
        .position(|&c| c == op_char)
        .ok_or(ParseError::InvalidCommand)?
    {
        0 => BinaryOp::Add,
        1 => BinaryOp::Sub,
        2 => BinaryOp::Mul,
        3 => BinaryOp::Div,
        _ => unreachable!(),
    };

    let lhs = value_to_operand(caps.get(1).unwrap().as_str(), grid)?;
    let rhs = value_to_operand(caps.get(3).unwrap().as_str(), grid)?;
    Ok(Formula::Binary { op, lhs, rhs })
}

/// Match type 3: `FUNC(A1:B2)` range aggregates.
fn handle_range(caps: &regex::Captures, grid: &Grid) -> Result<Formula, ParseError> {
    let func_name = caps.get(1).unwrap().as_str();
    let op = match func_name {
        "MAX" => RangeOp::Max,
        "MIN" => RangeOp::Min,
        "SUM" => RangeOp::Sum,
        "AVG" => RangeOp::Avg,
        "STDEV" => RangeOp::Stdev,
        _ => return Err(ParseError::InvalidCommand),
    };

    let (r0, c0) = cell_parser(caps.get(2).unwrap().as_str(), grid)?;
    let (r1, c1) = cell_parser(caps.get(3).unwrap().as_str(), grid)?;
    if r0 > r1 || c0 > c1 {
        return Err(ParseError::InvalidRange);
    }
    Ok(Formula::Range {
        op,
        rect: Rect { r0, c0, r1, c1 },
    })
}

/// Match type 4: `A1=<expr>` nested inside another expression, e.g. as SLEEP's argument never
/// reaches here (SLEEP only takes a bare value) but a doubly-assigned command line would.
fn handle_expression(caps: &regex::Captures, grid: &Grid) -> Result<Formula, ParseError> {
    expression_parser(caps.get(2).unwrap().as_str(), grid)
}

/// Match type 6: a bare integer literal with no cell reference anywhere in the expression.
fn handle_integer(caps: &regex::Captures) -> Result<Formula, ParseError> {
    let value = i32::from_str(caps.get(0).unwrap().as_str()).map_err(|_| ParseError::InvalidValue)?;
    Ok(Formula::Constant(value))
}

/// Parses a single value token as either a cell reference or an integer literal.
fn value_to_operand(value_str: &str, grid: &Grid) -> Result<Operand, ParseError> {
    let first = value_str.chars().next().ok_or(ParseError::InvalidCommand)?;
    if first.is_ascii_uppercase() {
        let (row, col) = cell_parser(value_str, grid)?;
        Ok(Operand::Ref(grid.handle(row, col)))
    } else {
        let value = i32::from_str(value_str).map_err(|_| ParseError::InvalidValue)?;
        Ok(Operand::Literal(value))
    }
}

/// Parses a spreadsheet-style cell reference like `B2` into 0-based `(row, col)`, validated
/// against `grid`'s dimensions.
fn cell_parser(cell_str: &str, grid: &Grid) -> Result<(usize, usize), ParseError> {
    let split_pos = cell_str
        .find(|c: char| c.is_ascii_digit())
        .ok_or(ParseError::InvalidCell)?;
    let (col_str, row_str) = cell_str.split_at(split_pos);

    let col = convert::alpha_to_num(col_str).ok_or(ParseError::InvalidCell)?;
    let row: usize = row_str.parse().map_err(|_| ParseError::InvalidCell)?;
    if row == 0 || col == 0 {
        return Err(ParseError::InvalidCell);
    }
    let (row, col) = (row - 1, col - 1);

    if !grid.in_bounds(row, col) {
        Err(ParseError::InvalidCell)
    } else {
        Ok((row, col))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_plain_constant_assignment() {
        let grid = Grid::new(5, 5);
        match parse("A1=42", &grid).unwrap() {
            ParsedLine::Assign(Assign { target, formula }) => {
                assert_eq!(target, grid.handle(0, 0));
                assert_eq!(formula, Formula::Constant(42));
            }
            other => panic!("expected Assign, got {other:?}"),
        }
    }

    #[test]
    fn parses_a_cell_reference_assignment() {
        let grid = Grid::new(5, 5);
        match parse("B1=A1", &grid).unwrap() {
            ParsedLine::Assign(Assign { target, formula }) => {
                assert_eq!(target, grid.handle(0, 1));
                assert_eq!(formula, Formula::Reference(grid.handle(0, 0)));
            }
            other => panic!("expected Assign, got {other:?}"),
        }
    }

    #[test]
    fn parses_arithmetic_with_mixed_operands() {
        let grid = Grid::new(5, 5);
        match parse("C1=A1+10", &grid).unwrap() {
            ParsedLine::Assign(Assign { formula, .. }) => {
                assert_eq!(
                    formula,
                    Formula::Binary {
                        op: BinaryOp::Add,
                        lhs: Operand::Ref(grid.handle(0, 0)),
                        rhs: Operand::Literal(10),
                    }
                );
            }
            other => panic!("expected Assign, got {other:?}"),
        }
    }

    #[test]
    fn parses_a_range_function() {
        let grid = Grid::new(5, 5);
        match parse("D1=SUM(A1:B2)", &grid).unwrap() {
            ParsedLine::Assign(Assign { formula, .. }) => {
                assert_eq!(
                    formula,
                    Formula::Range {
                        op: RangeOp::Sum,
                        rect: Rect {
                            r0: 0,
                            c0: 0,
                            r1: 1,
                            c1: 1
                        },
                    }
                );
            }
            other => panic!("expected Assign, got {other:?}"),
        }
    }

    #[test]
    fn rejects_an_inverted_range() {
        let grid = Grid::new(5, 5);
        assert_eq!(parse("D1=SUM(B2:A1)", &grid), Err(ParseError::InvalidRange));
    }

    #[test]
    fn rejects_an_out_of_bounds_cell() {
        let grid = Grid::new(5, 5);
        assert_eq!(parse("Z1=1", &grid), Err(ParseError::InvalidCell));
    }

    #[test]
    fn parses_sleep_of_a_literal() {
        let grid = Grid::new(5, 5);
        match parse("A1=SLEEP(3)", &grid).unwrap() {
            ParsedLine::Assign(Assign { formula, .. }) => {
                assert_eq!(formula, Formula::Sleep(Operand::Literal(3)));
            }
            other => panic!("expected Assign, got {other:?}"),
        }
    }

    #[test]
    fn parses_scroll_to_and_control_keys() {
        let grid = Grid::new(20, 20);
        assert!(matches!(
            parse("scroll_to B2", &grid).unwrap(),
            ParsedLine::ScrollTo(1, 1)
        ));
        assert!(matches!(parse("w", &grid).unwrap(), ParsedLine::Scroll(Scroll::Up)));
        assert!(matches!(parse("q", &grid).unwrap(), ParsedLine::Quit));
    }

    #[test]
    fn parses_output_toggles() {
        let grid = Grid::new(5, 5);
        assert!(matches!(
            parse("disable_output", &grid).unwrap(),
            ParsedLine::SetOutput(false)
        ));
        assert!(matches!(
            parse("enable_output", &grid).unwrap(),
            ParsedLine::SetOutput(true)
        ));
    }

    #[test]
    fn rejects_garbage_input() {
        let grid = Grid::new(5, 5);
        assert_eq!(parse("not a command", &grid), Err(ParseError::InvalidCommand));
        assert_eq!(parse("", &grid), Err(ParseError::InvalidCommand));
    }
}
