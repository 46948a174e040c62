//! The grid: a dense, fixed-size array of cells addressed by `(row, col)`.
//!
//! The donor's `Sheet` kept its dimensions in `static mut M_INTERNAL`/`N_INTERNAL` behind an
//! `unsafe fn init_dimensions`, enforced "only once" with a runtime panic. Here the dimensions
//! are plain fields set once at `Grid::new` and never touched again — no `unsafe`, no process
//! globals, same one-time-initialization guarantee via ordinary ownership.

use std::cmp::min;

use crate::cell::{Cell, CellHandle};

/// Maximum allowed row count (1-based row numbers run 1..=ROW_LIMIT).
pub const ROW_LIMIT: usize = 999;

/// Maximum allowed column count (1-based column letters run up to "ZZZ").
pub const COL_LIMIT: usize = 18278;

/// Width/height of the presenter's scrolling window.
pub const VIEWPORT: usize = 10;

/// A fixed R×C array of cells, allocated once as a single contiguous block.
pub struct Grid {
    cells: Vec<Cell>,
    pub rows: usize,
    pub cols: usize,
    /// Row of the top-left corner of the display viewport.
    pub top_row: usize,
    /// Column of the top-left corner of the display viewport.
    pub top_col: usize,
}

impl Grid {
    pub fn new(rows: usize, cols: usize) -> Self {
        let mut cells = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                cells.push(Cell::new(r, c));
            }
        }
        Self {
            cells,
            rows,
            cols,
            top_row: 0,
            top_col: 0,
        }
    }

    pub fn in_bounds(&self, row: usize, col: usize) -> bool {
        row < self.rows && col < self.cols
    }

    pub fn handle(&self, row: usize, col: usize) -> CellHandle {
        row * self.cols + col
    }

    pub fn row_col(&self, handle: CellHandle) -> (usize, usize) {
        (handle / self.cols, handle % self.cols)
    }

    pub fn cell(&self, handle: CellHandle) -> &Cell {
        &self.cells[handle]
    }

    pub fn cell_mut(&mut self, handle: CellHandle) -> &mut Cell {
        &mut self.cells[handle]
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Moves the viewport to be anchored at `(row, col)`, clamped to stay in bounds.
    pub fn scroll_to(&mut self, row: usize, col: usize) {
        self.top_row = row.min(self.rows.saturating_sub(1));
        self.top_col = col.min(self.cols.saturating_sub(1));
    }

    /// Scrolls the viewport by one page (`VIEWPORT` rows/cols) in the given signed direction.
    pub fn scroll_by_page(&mut self, d_rows: isize, d_cols: isize) {
        let max_top_row = self.rows.saturating_sub(VIEWPORT);
        let max_top_col = self.cols.saturating_sub(VIEWPORT);
        self.top_row = self
            .top_row
            .saturating_add_signed(d_rows * VIEWPORT as isize)
            .min(max_top_row);
        self.top_col = self
            .top_col
            .saturating_add_signed(d_cols * VIEWPORT as isize)
            .min(max_top_col);
    }

    /// Prints the 10x10 window anchored at the current viewport position.
    pub fn display(&self) {
        print!("{:4} ", "");
        for c in self.top_col..min(self.top_col + VIEWPORT, self.cols) {
            let label = crate::convert::num_to_alpha((c + 1) as u32);
            print!("{:>12}", label);
        }
        println!();

        for r in self.top_row..min(self.top_row + VIEWPORT, self.rows) {
            print!("{:<4} ", r + 1);
            for c in self.top_col..min(self.top_col + VIEWPORT, self.cols) {
                let cell = self.cell(self.handle(r, c));
                if cell.error {
                    print!("{:>12}", "ERR");
                } else {
                    print!("{:>12}", cell.value);
                }
            }
            println!();
        }
    }
}

/// Validates a `(rows, cols)` pair parsed from the command line against §3's bounds.
pub fn parse_dimensions(rows_str: &str, cols_str: &str) -> Result<(usize, usize), &'static str> {
    let rows: usize = match rows_str.parse() {
        Ok(r) if r > 0 && r <= ROW_LIMIT => r,
        _ => return Err("invalid number of rows"),
    };
    let cols: usize = match cols_str.parse() {
        Ok(c) if c > 0 && c <= COL_LIMIT => c,
        _ => return Err("invalid number of columns"),
    };
    Ok((rows, cols))
}
