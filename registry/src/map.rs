//! Opcode tables and the `protocol.<version>.map` parser.
//!
//! Each non-blank line holds `NAME CODE` or `NAME = CODE`; `#` starts a
//! comment. Malformed lines are logged and skipped.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use tracing::{trace, warn};

/// A bidirectional name to opcode table for one protocol version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpcodeMap {
    by_name: HashMap<String, u16>,
    by_code: HashMap<u16, String>,
}

impl OpcodeMap {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `name` to `opcode`, replacing any previous mapping of either.
    pub fn insert(&mut self, name: impl Into<String>, opcode: u16) {
        let name = name.into();
        if let Some(previous) = self.by_name.insert(name.clone(), opcode) {
            if previous != opcode {
                self.by_code.remove(&previous);
            }
        }
        if let Some(previous) = self.by_code.insert(opcode, name.clone()) {
            if previous != name {
                self.by_name.remove(&previous);
            }
        }
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, opcode: u16) -> Self {
        self.insert(name, opcode);
        self
    }

    /// Applies every mapping of `other` on top of this table.
    pub fn overlay(&mut self, other: Self) {
        for (name, opcode) in other.by_name {
            self.insert(name, opcode);
        }
    }

    pub fn opcode(&self, name: &str) -> Option<u16> {
        self.by_name.get(name).copied()
    }

    pub fn name(&self, opcode: u16) -> Option<&str> {
        self.by_code.get(&opcode).map(String::as_str)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Iterates `(name, opcode)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u16)> {
        self.by_name.iter().map(|(name, &opcode)| (name.as_str(), opcode))
    }
}

impl<S: Into<String>> FromIterator<(S, u16)> for OpcodeMap {
    fn from_iter<I: IntoIterator<Item = (S, u16)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (name, opcode) in iter {
            map.insert(name, opcode);
        }
        map
    }
}

/// Parses an opcode table. `origin` names the source in warnings.
pub fn parse_map(source: &str, origin: &str) -> OpcodeMap {
    let mut map = OpcodeMap::new();
    for (index, raw) in source.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }
        let Some((name, code)) = split_line(line) else {
            warn!(origin, line = index + 1, "map parse error: malformed line");
            continue;
        };
        match code.parse::<u16>() {
            Ok(opcode) => map.insert(name, opcode),
            Err(_) => warn!(origin, line = index + 1, code, "map parse error: non-numeric opcode"),
        }
    }
    map
}

/// Reads and parses an opcode table file.
pub fn parse_map_file(path: &Path) -> io::Result<OpcodeMap> {
    trace!(path = %path.display(), "reading map");
    let source = fs::read_to_string(path)?;
    Ok(parse_map(&source, &path.display().to_string()))
}

fn split_line(line: &str) -> Option<(&str, &str)> {
    let (name, rest) = line.split_once(|c: char| c.is_whitespace() || c == '=')?;
    let rest = rest.trim_start();
    let code = rest.strip_prefix('=').map_or(rest, str::trim_start);
    if name.is_empty() || code.is_empty() || code.contains(char::is_whitespace) {
        return None;
    }
    // `NAME CODE` and `NAME = CODE` only; a second `=` is malformed.
    if code.contains('=') {
        return None;
    }
    Some((name, code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_line_forms() {
        let map = parse_map("S_LOGIN 1234\nC_CHAT = 22\nS_CHAT=7\n", "test");
        assert_eq!(map.opcode("S_LOGIN"), Some(1234));
        assert_eq!(map.opcode("C_CHAT"), Some(22));
        assert_eq!(map.opcode("S_CHAT"), Some(7));
        assert_eq!(map.name(22), Some("C_CHAT"));
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn comments_and_blank_lines_ignored() {
        let map = parse_map("# header\n\n  S_LOGIN 1 # trailing\n   \n", "test");
        assert_eq!(map.len(), 1);
        assert_eq!(map.opcode("S_LOGIN"), Some(1));
    }

    #[test]
    fn malformed_lines_skipped() {
        let map = parse_map("S_ONLY\nS_A 1 2\nS_B abc\nS_C 70000\nS_D 5\n", "test");
        assert_eq!(map.len(), 1);
        assert_eq!(map.opcode("S_D"), Some(5));
    }

    #[test]
    fn reinsert_drops_stale_reverse_entry() {
        let mut map = OpcodeMap::new().with("S_A", 1);
        map.insert("S_A", 2);
        assert_eq!(map.name(1), None);
        assert_eq!(map.name(2), Some("S_A"));

        map.insert("S_B", 2);
        assert_eq!(map.opcode("S_A"), None);
        assert_eq!(map.opcode("S_B"), Some(2));
    }

    #[test]
    fn overlay_replaces_and_extends() {
        let mut base = OpcodeMap::new().with("S_A", 1).with("S_B", 2);
        base.overlay(OpcodeMap::new().with("S_B", 3).with("S_C", 4));
        assert_eq!(base.opcode("S_A"), Some(1));
        assert_eq!(base.opcode("S_B"), Some(3));
        assert_eq!(base.name(2), None);
        assert_eq!(base.opcode("S_C"), Some(4));
    }

    #[test]
    fn collect_from_pairs() {
        let map: OpcodeMap = [("S_A", 1), ("S_B", 2)].into_iter().collect();
        assert!(map.contains_name("S_B"));
        assert_eq!(map.iter().count(), 2);
    }
}
