//! Generated source fragment carrying an embedded byte array.

use std::fs;
use std::io;
use std::path::Path;

/// Render the archive bytes as a compilable fragment defining
/// `<id>Data[]` and `<id>Size`.
pub fn render_fragment(id: &str, bytes: &[u8]) -> String {
    let body = bytes
        .iter()
        .map(u8::to_string)
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "unsigned char {id}Data[] = {{{body}}};\nunsigned int {id}Size = {};\n",
        bytes.len()
    )
}

/// Write `contents` to `path` only when it differs from what is on disk,
/// so an unchanged bundle does not dirty the dependent compiled artifact.
/// Returns whether a write happened.
pub fn write_if_changed(path: &Path, contents: &str) -> io::Result<bool> {
    if let Ok(existing) = fs::read_to_string(path) {
        if existing == contents {
            return Ok(false);
        }
    }
    fs::write(path, contents)?;
    Ok(true)
}
