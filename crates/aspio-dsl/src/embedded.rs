//! Extraction of mapping specifications embedded in ASP comments.
//!
//! The mapping language rides inside the host ASP program in special
//! `%!` comments:
//!
//! ```text
//! colored(N, C) v other(N, C) :- node(N), color(C).   %! INPUT (nodes) {
//! :- arc(N, M), colored(N, C), colored(M, C).         %!     node(n.label) for n in nodes;
//!                                                     %! }
//! ```
//!
//! Extraction and grammar parsing stay two separate phases: a
//! line-oriented scanner with quote-aware state here, then the
//! context-free parse of the concatenated fragments in
//! [`crate::parser`]. Combining both into one grammar would force the
//! whitespace-insensitive spec grammar to become line-boundary aware.

use crate::parser::{parse_spec, MappingSpec, ParseError};

/// Pull the specification text out of an ASP program.
///
/// Per line: everything before the first unquoted `%` is host-program
/// text and is discarded. The line contributes a fragment only when that
/// `%` is immediately followed by `!`; the fragment runs to the end of
/// the line, truncated at a following `%` (an ordinary comment inside
/// the specification). `"`-quoted, backslash-escaped strings in the host
/// text are opaque, so a `%` inside one never starts a comment.
/// Fragments are joined with newlines in source order.
pub fn extract_spec(source: &str) -> String {
    let fragments: Vec<&str> = source.lines().filter_map(extract_line).collect();
    fragments.join("\n")
}

/// Extract the embedded specification and parse it.
pub fn parse_embedded_spec(source: &str) -> Result<MappingSpec, ParseError> {
    // Error positions refer to the extracted spec text, whose line
    // numbers differ from the host program's once non-contributing lines
    // are dropped.
    parse_spec(&extract_spec(source))
}

fn extract_line(line: &str) -> Option<&str> {
    let mut in_string = false;
    let mut escaped = false;
    for (idx, ch) in line.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
        } else if ch == '"' {
            in_string = true;
        } else if ch == '%' {
            // An ordinary comment swallows the rest of the line, marker
            // included; only a direct `%!` contributes a fragment.
            let fragment = line[idx + 1..].strip_prefix('!')?;
            return Some(match fragment.find('%') {
                Some(end) => &fragment[..end],
                None => fragment,
            });
        }
    }
    None
}
