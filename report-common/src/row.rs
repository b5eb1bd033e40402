//! Row-oriented report records.

use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};

/// A single scalar value in a report row.
///
/// `Empty` is the "not applicable" sentinel: rows of different shapes share
/// one sheet and leave the columns they do not use empty.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Int(i64),
    Text(String),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Cell::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Text or integer cells as an owned string; `Empty` becomes `""`.
    pub fn to_text(&self) -> String {
        self.to_string()
    }

    /// Numeric id when the text is a plain integer, otherwise text.
    ///
    /// Pre-stage ids arrive as strings ("3") but are written as numbers so
    /// they sort and filter like the classic-API ids next to them.
    pub fn id_like(raw: &str) -> Self {
        match raw.trim().parse::<i64>() {
            Ok(v) => Cell::Int(v),
            Err(_) if raw.is_empty() => Cell::Empty,
            Err(_) => Cell::Text(raw.to_string()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Int(v) => write!(f, "{v}"),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Int(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<&String> for Cell {
    fn from(value: &String) -> Self {
        Cell::Text(value.clone())
    }
}

/// Booleans are written the way the console shows them: "True" / "False".
impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Cell::Text(if value { "True" } else { "False" }.to_string())
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Cell::Empty)
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Cell::Empty => serializer.serialize_str(""),
            Cell::Int(v) => serializer.serialize_i64(*v),
            Cell::Text(s) => serializer.serialize_str(s),
        }
    }
}

/// An ordered mapping of column name to cell.
///
/// Column order is insertion order. Setting an existing column replaces the
/// value in place and keeps its position.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReportRow {
    cells: Vec<(String, Cell)>,
}

impl ReportRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Cell>) -> Self {
        self.set(column, value);
        self
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Cell>) {
        let column = column.into();
        let value = value.into();
        match self.cells.iter_mut().find(|(name, _)| *name == column) {
            Some((_, existing)) => *existing = value,
            None => self.cells.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, cell)| cell)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.cells.iter().map(|(name, cell)| (name.as_str(), cell))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl Serialize for ReportRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (name, cell) in &self.cells {
            map.serialize_entry(name, cell)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_replaces_in_place() {
        let mut row = ReportRow::new().with("Type", "Policy").with("Policy ID", 7);
        row.set("Type", "Policy Scripts");
        let columns: Vec<&str> = row.columns().collect();
        assert_eq!(columns, vec!["Type", "Policy ID"]);
        assert_eq!(row.get("Type"), Some(&Cell::from("Policy Scripts")));
    }

    #[test]
    fn id_like_prefers_integers() {
        assert_eq!(Cell::id_like("42"), Cell::Int(42));
        assert_eq!(Cell::id_like("PS-1"), Cell::Text("PS-1".to_string()));
        assert_eq!(Cell::id_like(""), Cell::Empty);
    }

    #[test]
    fn bool_and_option_conversions() {
        assert_eq!(Cell::from(true).to_text(), "True");
        assert_eq!(Cell::from(None::<i64>), Cell::Empty);
        assert_eq!(Cell::from(Some("x")).to_text(), "x");
    }

    #[test]
    fn row_serializes_as_ordered_map() {
        let row = ReportRow::new()
            .with("Type", "Package Not Used")
            .with("Package ID", 2)
            .with("Policy ID", Cell::Empty);
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(
            json,
            r#"{"Type":"Package Not Used","Package ID":2,"Policy ID":""}"#
        );
    }
}
