use serde_json::Value;
use std::io::{self, Write};

/// Write the computation envelope (result, methodology, assumptions,
/// warnings, metadata) to stdout as pretty JSON.
pub fn print_json(value: &Value) -> Result<(), Box<dyn std::error::Error>> {
    let stdout = io::stdout();
    write_json(&mut stdout.lock(), value)?;
    Ok(())
}

fn write_json<W: Write>(out: &mut W, value: &Value) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    out.flush()
}
