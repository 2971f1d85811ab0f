use std::cmp;
use std::fmt::Write;

/// Renders up to `max` head bytes as a single-line hex preview, e.g.
/// `"b7 33 00 01 e2"`. Truncated input is marked with a trailing `".."`.
///
/// Decode diagnostics embed this instead of a full canonical dump; the full
/// blob is still available to the caller if deeper troubleshooting is needed.
pub fn hex_preview(data: &[u8], max: usize) -> String {
    let end = cmp::min(max, data.len());
    let mut out = String::with_capacity(end * 3 + 2);

    for (i, byte) in data[..end].iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        // Writing to a String cannot fail.
        let _ = write!(out, "{byte:02x}");
    }

    if data.len() > end {
        out.push_str(" ..");
    }

    out
}
