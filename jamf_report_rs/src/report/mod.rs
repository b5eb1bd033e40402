//! Report assembly: named tables handed to a row sink.
//!
//! Every sheet is independent. The only merging is the column union done by
//! [`Table::columns`].

mod sink;
mod table;

use anyhow::Result;

pub use sink::{HEADER_FILL, JsonSink, JsonTarget, RowSink, XlsxSink};
pub use table::{Band, Highlight, Table};

pub const COMPUTERS_SHEET: &str = "Jamf Computers Info";
pub const POLICIES_SHEET: &str = "Jamf Policy Info";
pub const PROFILES_SHEET: &str = "Jamf Configuration Profile Info";
pub const PACKAGES_SHEET: &str = "Jamf Packages To Policy Info";
pub const SCRIPTS_SHEET: &str = "Jamf Scripts To Policy Info";

/// Fill for "not used" artifact rows and for alternating record bands.
pub const NOT_USED_FILL: u32 = 0x82E0AA;

/// Computer sub-row fills, keyed by the row's `Type`.
pub const COMPUTER_ROW_FILLS: [(&str, u32); 5] = [
    ("Computer Configuration Profile Membership Info", HEADER_FILL),
    ("Computer Group Membership Info", 0xA3E4D7),
    ("Computer Hardware Local Account Info", 0xAED6F1),
    ("Computer Hardware FileVault2 Info", 0xF5B7B1),
    ("Computer Hardware Info", 0xF9E79F),
];

/// Write every non-empty table, then finish the sink.
///
/// Returns the names of the sheets that were written.
pub fn assemble<S: RowSink>(tables: &[Table], mut sink: S) -> Result<Vec<String>> {
    let mut written = Vec::new();
    for table in tables {
        if table.is_empty() {
            tracing::info!("sheet '{}' has no rows, leaving it out", table.name());
            continue;
        }
        sink.write_table(table)?;
        written.push(table.name().to_string());
    }
    sink.finish()?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use report_common::ReportRow;

    #[derive(Default)]
    struct RecordingSink {
        names: Vec<String>,
    }

    impl RowSink for &mut RecordingSink {
        fn write_table(&mut self, table: &Table) -> Result<()> {
            self.names.push(table.name().to_string());
            Ok(())
        }

        fn finish(self) -> Result<()> {
            self.names.push("<finished>".to_string());
            Ok(())
        }
    }

    #[test]
    fn assemble_skips_empty_tables() {
        let tables = vec![
            Table::new(COMPUTERS_SHEET),
            Table::new(POLICIES_SHEET).with_rows([ReportRow::new().with("Type", "Policy")]),
        ];
        let mut recorder = RecordingSink::default();

        let written = assemble(&tables, &mut recorder).unwrap();

        assert_eq!(written, vec![POLICIES_SHEET.to_string()]);
        assert_eq!(
            recorder.names,
            vec![POLICIES_SHEET.to_string(), "<finished>".to_string()]
        );
    }
}
