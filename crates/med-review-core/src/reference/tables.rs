//! Flat key → value lookup tables loaded from tab-separated files.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use super::{ReferenceError, ReferenceResult};

/// Normalize a lookup key: trimmed and lowercased.
pub fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

/// Key → value table with stable row order.
///
/// Keys are normalized on insert. A repeated key overwrites the value but keeps
/// the position of its first row, so fuzzy ties always go to the earliest row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LookupTable {
    entries: Vec<(String, String)>,
    index: HashMap<String, usize>,
}

impl LookupTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from key/value pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut table = Self::new();
        for (key, value) in pairs {
            table.insert(key.as_ref(), value);
        }
        table
    }

    /// Load a TSV file. The first column is the key; `value_column` names the value.
    pub fn from_tsv_path<P: AsRef<Path>>(path: P, value_column: &str) -> ReferenceResult<Self> {
        let path = path.as_ref();
        let reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;
        Self::from_csv_reader(reader, &path.display().to_string(), value_column)
    }

    /// Load TSV content from any reader.
    pub fn from_tsv_reader<R: Read>(rdr: R, value_column: &str) -> ReferenceResult<Self> {
        let reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(true)
            .from_reader(rdr);
        Self::from_csv_reader(reader, "<reader>", value_column)
    }

    fn from_csv_reader<R: Read>(
        mut reader: csv::Reader<R>,
        table: &str,
        value_column: &str,
    ) -> ReferenceResult<Self> {
        let value_idx = reader
            .headers()?
            .iter()
            .position(|h| h.trim() == value_column)
            .ok_or_else(|| ReferenceError::MissingColumn {
                table: table.to_string(),
                column: value_column.to_string(),
            })?;

        let mut result = Self::new();
        let mut skipped = 0usize;
        for record in reader.records() {
            let record = record?;
            let key = record.get(0).unwrap_or("");
            let value = record.get(value_idx).unwrap_or("").trim();
            if key.trim().is_empty() || value.is_empty() {
                skipped += 1;
                continue;
            }
            result.insert(key, value);
        }

        if skipped > 0 {
            tracing::debug!(table, skipped, "Skipped rows with empty key or value");
        }

        Ok(result)
    }

    /// Insert or overwrite a row.
    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        let key = normalize_key(key);
        let value = value.into();
        match self.index.get(&key) {
            Some(&idx) => self.entries[idx].1 = value,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
            }
        }
    }

    /// Exact lookup. The key must already be normalized.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.index.get(key).map(|&idx| self.entries[idx].1.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Keys in row order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Rows in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_tsv_reader() {
        let tsv = "name\tbnf_name\nPanadol\tparacetamol\nco-codamol\tcodeine phosphate, paracetamol\n";
        let table = LookupTable::from_tsv_reader(tsv.as_bytes(), "bnf_name").unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.get("panadol"), Some("paracetamol"));
        assert_eq!(table.get("co-codamol"), Some("codeine phosphate, paracetamol"));
    }

    #[test]
    fn test_value_column_found_by_name() {
        let tsv = "name\tnotes\tslug\naspirin\tNSAID\taspirin-slug\n";
        let table = LookupTable::from_tsv_reader(tsv.as_bytes(), "slug").unwrap();
        assert_eq!(table.get("aspirin"), Some("aspirin-slug"));
    }

    #[test]
    fn test_missing_column() {
        let tsv = "name\tvalue\naspirin\taspirin\n";
        let result = LookupTable::from_tsv_reader(tsv.as_bytes(), "slug");
        assert!(matches!(result, Err(ReferenceError::MissingColumn { .. })));
    }

    #[test]
    fn test_empty_values_skipped() {
        let tsv = "name\tslug\naspirin\t\nwarfarin\twarfarin\n";
        let table = LookupTable::from_tsv_reader(tsv.as_bytes(), "slug").unwrap();
        assert_eq!(table.len(), 1);
        assert!(!table.contains_key("aspirin"));
    }

    #[test]
    fn test_duplicate_key_last_wins_first_position() {
        let table = LookupTable::from_pairs([("b", "1"), ("a", "2"), ("B", "3")]);
        assert_eq!(table.get("b"), Some("3"));
        assert_eq!(table.keys().collect::<Vec<_>>(), vec!["b", "a"]);
    }

    #[test]
    fn test_keys_normalized() {
        let table = LookupTable::from_pairs([("  Warfarin Sodium ", "warfarin")]);
        assert_eq!(table.get("warfarin sodium"), Some("warfarin"));
        assert_eq!(table.get("Warfarin Sodium"), None);
    }
}
