//! Progress reporting on stderr.
//!
//! Labels are bold and coloured when stderr is a terminal and plain otherwise,
//! so build logs captured by the orchestrator stay readable. Progress labels
//! are right-aligned in a 12-column gutter; the final error line is not.

use console::{Color, Term, style};
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};

const GUTTER: usize = 12;

static VERBOSE: AtomicBool = AtomicBool::new(false);

#[derive(Clone, Copy)]
enum Line<'a> {
    /// Step in progress, cyan label.
    Action(&'a str),
    /// Step finished, green label.
    Success(&'a str),
    /// Dimmed continuation under the gutter.
    Detail,
    /// `error: <chain>`, printed once before exiting.
    Error,
}

fn stderr_is_tty() -> bool {
    Term::stderr().is_term()
}

fn render_line(line: Line<'_>, msg: &str, is_tty: bool) -> String {
    let (head, color) = match line {
        Line::Action(label) => (format!("{label:>GUTTER$}"), Some(Color::Cyan)),
        Line::Success(label) => (format!("{label:>GUTTER$}"), Some(Color::Green)),
        Line::Error => ("error:".to_string(), Some(Color::Red)),
        Line::Detail => {
            let text = format!("{:>GUTTER$} {msg}", "");
            return if is_tty { style(text).dim().to_string() } else { text };
        }
    };

    let head = match color {
        Some(color) if is_tty => style(head).bold().fg(color).to_string(),
        _ => head,
    };
    if msg.is_empty() {
        head
    } else {
        format!("{head} {msg}")
    }
}

fn emit(w: &mut dyn Write, line: Line<'_>, msg: &str, is_tty: bool) {
    let _ = writeln!(w, "{}", render_line(line, msg, is_tty));
}

fn emit_stderr(line: Line<'_>, msg: &str) {
    emit(&mut io::stderr(), line, msg, stderr_is_tty());
}

/// `Downloading https://...`
pub fn action(label: &str, msg: &str) {
    emit_stderr(Line::Action(label), msg);
}

pub fn success(label: &str, msg: &str) {
    emit_stderr(Line::Success(label), msg);
}

/// Indented, dimmed line under the previous label.
pub fn detail(msg: &str) {
    emit_stderr(Line::Detail, msg);
}

/// Prints `error: <msg>`. Pass the full anyhow chain (`{e:#}`).
pub fn error(msg: &str) {
    emit_stderr(Line::Error, msg);
}

pub fn set_verbose(enabled: bool) {
    VERBOSE.store(enabled, Ordering::Relaxed);
}

pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::Relaxed)
}
