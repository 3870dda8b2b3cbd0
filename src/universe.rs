use std::io;
use std::path::Path;

use error_stack::{Report, ResultExt};
use tracing::warn;

use crate::error::UniverseError;
use crate::model::SymbolRecord;

/// Load the symbol universe from a CSV file with `Symbol,Name` headers.
///
/// Malformed or empty entries are skipped with a warning so one bad line
/// cannot take down the whole run; an unreadable file is a hard error.
/// Record order is preserved.
pub fn load(path: &Path) -> Result<Vec<SymbolRecord>, Report<UniverseError>> {
    let reader = csv::Reader::from_path(path)
        .change_context(UniverseError::ReadFile)
        .attach_with(|| format!("path: {}", path.display()))?;
    Ok(read_records(reader))
}

fn read_records<R: io::Read>(mut reader: csv::Reader<R>) -> Vec<SymbolRecord> {
    let mut records = Vec::new();
    for (line, result) in reader.deserialize::<SymbolRecord>().enumerate() {
        match result {
            Ok(record) if record.symbol.trim().is_empty() => {
                warn!(line = line + 2, "universe entry has empty symbol, skipping");
            }
            Ok(record) => records.push(record),
            Err(e) => {
                warn!(line = line + 2, error = %e, "malformed universe entry, skipping");
            }
        }
    }
    records
}
