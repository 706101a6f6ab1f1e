//! Interactive question loop

use std::io::{BufRead, Write};

use crate::error::Result;
use crate::query::QueryEngine;

pub const BANNER: &str = "REPL mode: Type your query below. Type 'exit' to quit.";
pub const PROMPT: &str = "Query: ";
pub const GOODBYE: &str = "Exiting REPL. Goodbye!";

/// Counters for one REPL session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplSummary {
    pub queries: usize,
    pub failures: usize,
}

/// `exit` or `quit`, any case, surrounding whitespace ignored
pub fn is_exit_command(line: &str) -> bool {
    let line = line.trim();
    line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit")
}

/// Read queries from `input` until an exit command or end of input
///
/// A failed query is reported on `output` and the loop goes on. Only I/O
/// errors on `input` or `output` end the session early.
pub async fn run_repl<R, W>(engine: &QueryEngine, mut input: R, mut output: W) -> Result<ReplSummary>
where
    R: BufRead,
    W: Write,
{
    let mut summary = ReplSummary::default();
    writeln!(output, "{}", BANNER)?;

    loop {
        write!(output, "{}", PROMPT)?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            writeln!(output)?;
            writeln!(output, "{}", GOODBYE)?;
            break;
        }

        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if is_exit_command(query) {
            writeln!(output, "{}", GOODBYE)?;
            break;
        }

        writeln!(output, "Completing...")?;
        output.flush()?;
        summary.queries += 1;

        match engine.query(query).await {
            Ok(response) => writeln!(output, "Result: {}", response)?,
            Err(e) => {
                summary.failures += 1;
                tracing::error!("Query failed: {}", e);
                writeln!(output, "Error: {}", e)?;
            }
        }
    }

    Ok(summary)
}
