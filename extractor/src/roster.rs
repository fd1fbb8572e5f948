//! Taxpayer roster: loading, writing and converting the legacy listing.

use crate::errors::ExtractorError;
use csv::{ReaderBuilder, Writer};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

pub const ROSTER_HEADER: [&str; 3] = ["name", "tax_id", "credential"];

const NAME_ALIASES: &[&str] = &["name", "nombre", "contribuyente"];
const TAX_ID_ALIASES: &[&str] = &["tax_id", "cuit"];
const CREDENTIAL_ALIASES: &[&str] = &["credential", "clave_fiscal", "clave"];

/// Lines of the legacy listing that are instructions, not data
const LEGACY_INSTRUCTION_MARKERS: &[&str] =
    &["ES IMPORTANTE DEJAR ESPACIO", "sin guiones", "creara carpeta"];

/// One taxpayer to process. Identity is the tax id.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxpayerRecord {
    pub name: String,
    pub tax_id: String,
    pub credential: String,
}

impl TaxpayerRecord {
    pub fn new(
        name: impl Into<String>,
        tax_id: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            tax_id: tax_id.into(),
            credential: credential.into(),
        }
    }
}

// credentials never reach the logs
impl fmt::Debug for TaxpayerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaxpayerRecord")
            .field("name", &self.name)
            .field("tax_id", &self.tax_id)
            .field("credential", &"***")
            .finish()
    }
}

/// A loaded roster plus how many rows were rejected
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    pub records: Vec<TaxpayerRecord>,
    pub skipped: usize,
}

impl Roster {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn find(&self, tax_id: &str) -> Option<&TaxpayerRecord> {
        self.records.iter().find(|r| r.tax_id == tax_id)
    }
}

/// Read a roster file. See [`parse_roster`] for the format.
pub fn load_roster(path: impl AsRef<Path>) -> Result<Roster, ExtractorError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let roster = parse_roster(&decode(&bytes))?;
    info!(
        "Loaded {} taxpayers from {} ({} rows skipped)",
        roster.len(),
        path.display(),
        roster.skipped
    );
    Ok(roster)
}

/// Parse CSV roster text. The header row is mandatory and must name the
/// three required columns (aliases accepted, case-insensitive). Rows with an
/// empty required field are skipped with a warning.
pub fn parse_roster(text: &str) -> Result<Roster, ExtractorError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let column = |aliases: &[&str], label: &str| -> Result<usize, ExtractorError> {
        headers
            .iter()
            .position(|h| {
                let h = h.trim_start_matches('\u{feff}').trim().to_lowercase();
                aliases.contains(&h.as_str())
            })
            .ok_or_else(|| {
                ExtractorError::RosterFormat(format!(
                    "missing required column '{label}' (found: {})",
                    headers.iter().collect::<Vec<_>>().join(", ")
                ))
            })
    };
    let name_col = column(NAME_ALIASES, "name")?;
    let tax_id_col = column(TAX_ID_ALIASES, "tax_id")?;
    let credential_col = column(CREDENTIAL_ALIASES, "credential")?;

    let mut roster = Roster::default();
    for (index, row) in reader.records().enumerate() {
        let line = index + 2;
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                warn!("Roster line {} is unreadable, skipping: {}", line, e);
                roster.skipped += 1;
                continue;
            }
        };
        if row.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        let field = |i: usize| row.get(i).map(str::trim).unwrap_or_default();
        let (name, tax_id, credential) = (field(name_col), field(tax_id_col), field(credential_col));
        if name.is_empty() || tax_id.is_empty() || credential.is_empty() {
            warn!("Roster line {} is missing a required field, skipping", line);
            roster.skipped += 1;
            continue;
        }
        roster
            .records
            .push(TaxpayerRecord::new(name, tax_id, credential));
    }
    Ok(roster)
}

/// UTF-8 (BOM stripped) when valid, Latin-1 otherwise.
fn decode(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.trim_start_matches('\u{feff}').to_string(),
        Err(_) => {
            debug!("Roster is not UTF-8; decoding as Latin-1");
            bytes.iter().map(|&b| b as char).collect()
        }
    }
}

/// Write records in roster format.
pub fn write_roster<'r>(
    path: impl AsRef<Path>,
    records: impl IntoIterator<Item = &'r TaxpayerRecord>,
) -> Result<usize, ExtractorError> {
    let path = path.as_ref();
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let mut writer = Writer::from_path(path)?;
    writer.write_record(ROSTER_HEADER)?;
    let mut count = 0;
    for record in records {
        writer.write_record([
            record.name.as_str(),
            record.tax_id.as_str(),
            record.credential.as_str(),
        ])?;
        count += 1;
    }
    writer.flush()?;
    Ok(count)
}

/// Write a two-row example roster showing the expected format.
pub fn write_sample_roster(path: impl AsRef<Path>) -> Result<(), ExtractorError> {
    let sample = [
        TaxpayerRecord::new("Contribuyente Ejemplo", "20123456789", "contraseña123"),
        TaxpayerRecord::new("Empresa Ejemplo", "30987654321", "clave456"),
    ];
    write_roster(path.as_ref(), &sample)?;
    info!("Sample roster written to {}", path.as_ref().display());
    Ok(())
}

/// Parse the legacy plain-text listing: blocks of three non-empty lines
/// (name, tax id, credential). `#` comments and instruction lines are ignored;
/// a trailing incomplete block is dropped.
pub fn parse_legacy_listing(text: &str) -> Vec<TaxpayerRecord> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter(|l| !LEGACY_INSTRUCTION_MARKERS.iter().any(|m| l.contains(m)))
        .collect();

    let mut records = Vec::with_capacity(lines.len() / 3);
    for block in lines.chunks(3) {
        match block {
            [name, tax_id, credential] => {
                debug!("Legacy listing entry: {}", name);
                records.push(TaxpayerRecord::new(*name, *tax_id, *credential));
            }
            partial => warn!(
                "Ignoring incomplete entry at the end of the listing: {:?}",
                partial.first()
            ),
        }
    }
    records
}

/// Convert a legacy listing file into a roster file. Returns how many
/// taxpayers were written.
pub fn convert_legacy_listing(
    txt: impl AsRef<Path>,
    csv: impl AsRef<Path>,
) -> Result<usize, ExtractorError> {
    let bytes = std::fs::read(txt.as_ref())?;
    let records = parse_legacy_listing(&decode(&bytes));
    let count = write_roster(csv.as_ref(), &records)?;
    info!(
        "Converted {} taxpayers from {} to {}",
        count,
        txt.as_ref().display(),
        csv.as_ref().display()
    );
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_rows_are_skipped_and_counted() {
        let roster = parse_roster(
            "name,tax_id,credential\n\
             Acme,20111111112,secret\n\
             NoKey,20222222223,\n\
             ,20333333334,pw\n\
             Beta SA , 30444444445 , pw2 \n",
        )
        .unwrap();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster.skipped, 2);
        assert_eq!(
            roster.records[1],
            TaxpayerRecord::new("Beta SA", "30444444445", "pw2")
        );
    }

    #[test]
    fn legacy_headers_and_bom_are_accepted() {
        let roster = parse_roster("\u{feff}Nombre,CUIT,Clave\nAcme,20111111112,x\n").unwrap();
        assert_eq!(roster.records[0].tax_id, "20111111112");
    }

    #[test]
    fn missing_column_is_a_format_error() {
        let err = parse_roster("name,tax_id\nAcme,1\n").unwrap_err();
        assert!(matches!(err, ExtractorError::RosterFormat(msg) if msg.contains("credential")));
    }

    #[test]
    fn latin1_bytes_are_decoded() {
        let bytes = b"name,tax_id,credential\nPe\xf1a,20111111112,x\n";
        let roster = parse_roster(&decode(bytes)).unwrap();
        assert_eq!(roster.records[0].name, "Peña");
    }

    #[test]
    fn legacy_listing_is_read_in_blocks_of_three() {
        let listing = "# comentario\n\
                       CUIT sin guiones\n\
                       Juan Perez\n20111111112\nclave1\n\n\
                       Empresa SA\n30222222223\nclave2\n\
                       Sobrante\n";
        let records = parse_legacy_listing(listing);
        assert_eq!(
            records,
            vec![
                TaxpayerRecord::new("Juan Perez", "20111111112", "clave1"),
                TaxpayerRecord::new("Empresa SA", "30222222223", "clave2"),
            ]
        );
    }

    #[test]
    fn debug_output_hides_the_credential() {
        let record = TaxpayerRecord::new("Acme", "20111111112", "hunter2");
        assert!(!format!("{record:?}").contains("hunter2"));
    }
}
