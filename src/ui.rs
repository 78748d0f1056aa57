use colored::Colorize;
use std::io::Write;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message to stderr
pub fn dim_err(msg: &str) {
    eprintln!("  {}", msg.dimmed());
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Write usage text, preceded by an optional reason, to `out`.
///
/// The binary passes standard output.
pub fn usage(out: &mut dyn Write, reason: Option<&str>, text: &str) {
    let written = match reason {
        Some(reason) => writeln!(out, "{reason}").and_then(|()| writeln!(out, "{text}")),
        None => writeln!(out, "{text}"),
    };
    if let Err(e) = written {
        log::debug!("could not write usage: {e}");
    }
}
