use serde_json::Value;
use std::io::{self, Write};

/// Pretty-print JSON to stdout. Object keys come out sorted,
/// so identical inputs print byte-identical output.
pub fn print_json(value: &Value) {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let written = serde_json::to_writer_pretty(&mut out, value)
        .map_err(io::Error::from)
        .and_then(|_| writeln!(out));
    if let Err(e) = written {
        eprintln!("JSON serialization error: {}", e);
    }
}
