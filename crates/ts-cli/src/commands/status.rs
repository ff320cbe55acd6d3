//! Status command for showing what is currently running.

use std::io::Write;

use anyhow::Result;

use super::Shell;
use super::day::write_summary;
use super::util::describe;

pub fn run<W: Write>(writer: &mut W, shell: &Shell<'_>) -> Result<()> {
    let status = shell.lifecycle().status(&shell.owner)?;
    shell.emit(writer, &status, |w| {
        writeln!(w, "Owner: {}", shell.owner)?;
        match &status.timer {
            Some(timer) => writeln!(w, "Timer: {}", describe(timer))?,
            None => writeln!(w, "Timer: not running")?,
        }
        match &status.day {
            Some(summary) => {
                write!(w, "Day: ")?;
                write_summary(w, summary)
            }
            None => writeln!(w, "Day: not started"),
        }
    })
}
