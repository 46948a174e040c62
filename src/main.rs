//! REPL front-end: read a dimension pair from argv, then loop reading commands.
//!
//! Structurally this is the donor's `main.rs` loop (`read_command`, the dimension-argument
//! check, the render-then-prompt-then-read cycle) with its global-state smells removed per
//! `sheet.rs`'s doc comment: `ReplState` now owns what `status.rs`'s `STATUS_CODE` mutex and
//! `sheet.rs`'s `unsafe fn init_dimensions` used to hold as process globals.

mod cell;
mod command;
mod convert;
mod graph;
mod parser;
mod recalc;
mod sheet;

use std::env;
use std::io::{self, Write};
use std::time::Instant;

use command::{Assign, CommandError, Engine};
use parser::{ParsedLine, Scroll};
use sheet::parse_dimensions;

/// Session state owned by the REPL loop: the last command's outcome and a monotonic clock for
/// the `[<elapsed>]` timing tag (§6's output contract). Replaces the donor's global
/// `STATUS_CODE`/`start_time`/`print_status` trio.
struct ReplState {
    status: StatusTag,
    output_enabled: bool,
    started_at: Instant,
}

/// Mirrors the donor's `status.rs` message table (§7's "Ambient error/status reporting"), but as
/// a plain value threaded through the loop instead of read back out of a global.
#[derive(Clone, Copy)]
enum StatusTag {
    Ok,
    UnrecognizedCmd,
    BadRef,
    BadRange,
    SelfReference,
    Cycle,
    UnknownFunc,
    BadLiteral,
    Internal,
}

impl StatusTag {
    fn label(self) -> &'static str {
        match self {
            StatusTag::Ok => "ok",
            StatusTag::UnrecognizedCmd => "unrecognized cmd",
            StatusTag::BadRef => "invalid cell",
            StatusTag::BadRange => "invalid range",
            StatusTag::SelfReference => "self reference",
            StatusTag::Cycle => "cyclic dependency found",
            StatusTag::UnknownFunc => "unknown function",
            StatusTag::BadLiteral => "invalid literal",
            StatusTag::Internal => "internal error",
        }
    }
}

impl From<CommandError> for StatusTag {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::BadRef => StatusTag::BadRef,
            CommandError::BadSyntax => StatusTag::UnrecognizedCmd,
            CommandError::BadRange => StatusTag::BadRange,
            CommandError::SelfReference => StatusTag::SelfReference,
            CommandError::Cycle => StatusTag::Cycle,
            CommandError::UnknownFunc => StatusTag::UnknownFunc,
            CommandError::BadLiteral => StatusTag::BadLiteral,
            CommandError::InternalInvariant => StatusTag::Internal,
        }
    }
}

impl From<parser::ParseError> for StatusTag {
    fn from(err: parser::ParseError) -> Self {
        StatusTag::from(CommandError::from(err))
    }
}

fn main() -> io::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        eprintln!("Invalid arguments\nUsage: {} <rows> <columns>", args[0]);
        return Ok(());
    }

    let (rows, cols) = match parse_dimensions(&args[1], &args[2]) {
        Ok(dims) => dims,
        Err(msg) => {
            eprintln!("{msg}");
            return Ok(());
        }
    };

    let mut engine = Engine::new(rows, cols);
    let mut state = ReplState {
        status: StatusTag::Ok,
        output_enabled: true,
        started_at: Instant::now(),
    };
    let mut stdout = io::stdout();

    loop {
        if state.output_enabled {
            engine.grid.display();
        }

        print!("[{:.1}] ({}) > ", state.started_at.elapsed().as_secs_f64(), state.status.label());
        stdout.flush()?;

        let input = read_command()?;
        state.started_at = Instant::now();

        let parsed = match parser::parse(&input, &engine.grid) {
            Ok(parsed) => parsed,
            Err(err) => {
                state.status = err.into();
                continue;
            }
        };

        match parsed {
            ParsedLine::Quit => return Ok(()),
            ParsedLine::SetOutput(enabled) => {
                state.output_enabled = enabled;
                state.status = StatusTag::Ok;
            }
            ParsedLine::ScrollTo(row, col) => {
                engine.grid.scroll_to(row, col);
                state.status = StatusTag::Ok;
            }
            ParsedLine::Scroll(direction) => {
                let (d_rows, d_cols) = match direction {
                    Scroll::Up => (-1, 0),
                    Scroll::Down => (1, 0),
                    Scroll::Left => (0, -1),
                    Scroll::Right => (0, 1),
                };
                engine.grid.scroll_by_page(d_rows, d_cols);
                state.status = StatusTag::Ok;
            }
            ParsedLine::Assign(Assign { target, formula }) => {
                match engine.apply(Assign { target, formula }) {
                    Ok(()) => state.status = StatusTag::Ok,
                    Err(err) => state.status = err.into(),
                }
            }
        }
    }
}

fn read_command() -> io::Result<String> {
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}
