//! Insertion-ordered, case-insensitive header storage.
//!
//! Lookup is case-insensitive while the display name of the first write
//! under a key is preserved for rendering. Each name can hold multiple
//! values.

/// One named header with its ordered values.
#[derive(Debug, Clone, PartialEq, Eq)]
struct HeaderEntry {
    /// Original-case name from the first write under this key.
    name: String,
    values: Vec<String>,
}

/// A header map that preserves insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: Vec<HeaderEntry>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Number of distinct header names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has(&self, name: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.name.eq_ignore_ascii_case(name))
    }

    /// All values stored under a name, in insertion order. Empty when the
    /// header is absent.
    pub fn get(&self, name: &str) -> &[String] {
        self.entries
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
            .map(|e| e.values.as_slice())
            .unwrap_or(&[])
    }

    /// All values joined with `", "`, or an empty string when absent.
    pub fn line(&self, name: &str) -> String {
        self.get(name).join(", ")
    }

    /// Replace all values under a name. The display name of an existing
    /// entry is kept; a new entry takes the given spelling.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.set_all(name, vec![value.into()]);
    }

    pub fn set_all(&mut self, name: &str, values: Vec<String>) {
        if let Some(e) = self
            .entries
            .iter_mut()
            .find(|e| e.name.eq_ignore_ascii_case(name))
        {
            e.values = values;
        } else {
            self.entries.push(HeaderEntry {
                name: name.to_string(),
                values,
            });
        }
    }

    /// Append a value under a name, keeping any existing values.
    pub fn add(&mut self, name: &str, value: impl Into<String>) {
        if let Some(e) = self
            .entries
            .iter_mut()
            .find(|e| e.name.eq_ignore_ascii_case(name))
        {
            e.values.push(value.into());
        } else {
            self.entries.push(HeaderEntry {
                name: name.to_string(),
                values: vec![value.into()],
            });
        }
    }

    /// Remove a name and all of its values.
    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|e| !e.name.eq_ignore_ascii_case(name));
    }

    /// Iterate `(display-name, values)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|e| (e.name.as_str(), e.values.as_slice()))
    }

    /// Render one `Name: value` line per value, in insertion order.
    pub fn to_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for e in &self.entries {
            for v in &e.values {
                lines.push(format!("{}: {}", e.name, v));
            }
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let mut headers = HeaderMap::new();
        headers.set("Content-Type", "application/json");
        assert_eq!(headers.get("Content-Type"), ["application/json"]);
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let mut headers = HeaderMap::new();
        headers.set("Content-Type", "text/html");
        assert_eq!(headers.line("content-type"), headers.line("Content-Type"));
        assert!(headers.has("CONTENT-TYPE"));
    }

    #[test]
    fn test_set_replaces_all_values() {
        let mut headers = HeaderMap::new();
        headers.add("Accept", "text/html");
        headers.add("Accept", "application/xml");
        headers.set("accept", "*/*");
        assert_eq!(headers.get("Accept"), ["*/*"]);
    }

    #[test]
    fn test_add_appends() {
        let mut headers = HeaderMap::new();
        headers.set("Set-Cookie", "a=1");
        headers.add("set-cookie", "b=2");
        assert_eq!(headers.get("Set-Cookie"), ["a=1", "b=2"]);
        assert_eq!(headers.line("Set-Cookie"), "a=1, b=2");
    }

    #[test]
    fn test_remove() {
        let mut headers = HeaderMap::new();
        headers.set("X-Custom", "value");
        headers.remove("x-custom");
        assert!(!headers.has("X-Custom"));
        assert_eq!(headers.line("X-Custom"), "");
    }

    #[test]
    fn test_display_name_preserved_from_first_write() {
        let mut headers = HeaderMap::new();
        headers.set("x-token", "1");
        headers.set("X-Token", "2");
        let lines = headers.to_lines();
        assert_eq!(lines, ["x-token: 2"]);
    }

    #[test]
    fn test_final_state_independent_of_call_order() {
        let mut a = HeaderMap::new();
        a.set("A", "1");
        a.add("B", "x");
        a.add("B", "y");
        a.remove("A");

        let mut b = HeaderMap::new();
        b.add("B", "x");
        b.set("A", "1");
        b.remove("A");
        b.add("B", "y");

        assert_eq!(a.get("B"), b.get("B"));
        assert_eq!(a.has("A"), b.has("A"));
    }
}
