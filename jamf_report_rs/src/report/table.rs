use std::collections::HashSet;

use report_common::{Cell, ReportRow};

/// Fill rule: rows whose `column` renders as `value` get the `rgb` fill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Highlight {
    pub column: String,
    pub value: String,
    pub rgb: u32,
}

/// Alternating fill: every other distinct value of `column` (first, third,
/// ...) gets the `rgb` fill, so the rows of one record read as a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Band {
    pub column: String,
    pub rgb: u32,
}

/// One named sheet of heterogeneous rows.
#[derive(Debug, Clone, Default)]
pub struct Table {
    name: String,
    rows: Vec<ReportRow>,
    highlights: Vec<Highlight>,
    band: Option<Band>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_rows(mut self, rows: impl IntoIterator<Item = ReportRow>) -> Self {
        self.rows.extend(rows);
        self
    }

    pub fn highlight(mut self, column: impl Into<String>, value: impl Into<String>, rgb: u32) -> Self {
        self.highlights.push(Highlight {
            column: column.into(),
            value: value.into(),
            rgb,
        });
        self
    }

    pub fn band_by(mut self, column: impl Into<String>, rgb: u32) -> Self {
        self.band = Some(Band {
            column: column.into(),
            rgb,
        });
        self
    }

    pub fn push(&mut self, row: ReportRow) {
        self.rows.push(row);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    pub fn highlights(&self) -> &[Highlight] {
        &self.highlights
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Union of all row columns, in first-seen order.
    pub fn columns(&self) -> Vec<&str> {
        let mut columns: Vec<&str> = Vec::new();
        for row in &self.rows {
            for column in row.columns() {
                if !columns.contains(&column) {
                    columns.push(column);
                }
            }
        }
        columns
    }

    /// Stable sort on an integer id column. Rows without an integer in that
    /// column keep their relative order after every numbered row.
    pub fn sort_by_id(&mut self, column: &str) {
        self.rows.sort_by_key(|row| match row.get(column).and_then(Cell::as_int) {
            Some(id) => (0u8, id),
            None => (1u8, 0),
        });
    }

    /// Every colour the rules of this table can produce.
    pub fn palette(&self) -> Vec<u32> {
        let mut colours: Vec<u32> = self.highlights.iter().map(|rule| rule.rgb).collect();
        colours.extend(self.band.as_ref().map(|band| band.rgb));
        colours.dedup();
        colours
    }

    /// Fill of each row, in row order. Value highlights win over banding.
    pub fn row_fills(&self) -> Vec<Option<u32>> {
        let mut seen: HashSet<String> = HashSet::new();
        self.rows
            .iter()
            .map(|row| {
                let banded = self.band.as_ref().and_then(|band| {
                    let key = row.get(&band.column).map(Cell::to_text).unwrap_or_default();
                    seen.insert(key);
                    (seen.len() % 2 == 1).then_some(band.rgb)
                });
                self.fill_for(row).or(banded)
            })
            .collect()
    }

    /// First matching highlight colour for a row.
    pub fn fill_for(&self, row: &ReportRow) -> Option<u32> {
        self.highlights
            .iter()
            .find(|rule| {
                row.get(&rule.column)
                    .map(|cell| cell.to_text() == rule.value)
                    .unwrap_or(false)
            })
            .map(|rule| rule.rgb)
    }
}
