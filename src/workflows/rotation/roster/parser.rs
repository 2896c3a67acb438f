use std::io::Read;

use super::RosterImportError;
use crate::workflows::rotation::domain::RankTier;

/// A CSV line that passed validation.
#[derive(Debug)]
pub(crate) struct RosterRow {
    pub(crate) name: String,
    pub(crate) rank: RankTier,
}

#[derive(Debug, Default)]
pub(crate) struct ParsedRoster {
    pub(crate) rows: Vec<RosterRow>,
    pub(crate) errors: Vec<String>,
    pub(crate) total_rows: usize,
}

const HEADER_CELLS: [&str; 3] = ["username", "name", "member"];

/// Reads `Username,Rank,...` exports. Columns past the rank are ignored and
/// malformed lines are reported instead of aborting the import.
pub(crate) fn parse_roster<R: Read>(reader: R) -> Result<ParsedRoster, RosterImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let records = csv_reader
        .records()
        .collect::<Result<Vec<csv::StringRecord>, csv::Error>>()?;
    if records.is_empty() {
        return Err(RosterImportError::Empty);
    }

    let skip_header = records[0]
        .get(0)
        .map(|cell| HEADER_CELLS.contains(&cell.trim().to_ascii_lowercase().as_str()))
        .unwrap_or(false);
    let start = usize::from(skip_header);

    let mut parsed = ParsedRoster {
        total_rows: records.len() - start,
        ..ParsedRoster::default()
    };

    for (index, record) in records.iter().enumerate().skip(start) {
        let line = index + 1;
        if record.len() < 2 {
            parsed.errors.push(format!(
                "line {line}: insufficient columns (need at least username and rank)"
            ));
            continue;
        }

        let name = record.get(0).unwrap_or_default().trim();
        if name.is_empty() {
            parsed.errors.push(format!("line {line}: empty username"));
            continue;
        }

        match record.get(1).unwrap_or_default().parse::<RankTier>() {
            Ok(rank) => parsed.rows.push(RosterRow {
                name: name.to_string(),
                rank,
            }),
            Err(err) => parsed.errors.push(format!("line {line}: {err}")),
        }
    }

    Ok(parsed)
}
