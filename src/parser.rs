use std::collections::HashSet;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};

use crate::error::{ReconError, Result};
use crate::models::{MetricField, Metrics, ReportRow};

pub const NAME_HEADER: &str = "recruiter name";
const EMAIL_HEADER: &str = "email";

const FIELD_HEADERS: [(MetricField, &str); 4] = [
    (MetricField::InterviewsScheduled, "interviews scheduled"),
    (MetricField::OffersSent, "offers sent"),
    (MetricField::HiresMade, "hires made"),
    (MetricField::CandidatesContacted, "candidates contacted"),
];

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl From<&Data> for Cell {
    fn from(value: &Data) -> Self {
        match value {
            Data::Empty | Data::Error(_) => Cell::Empty,
            Data::String(s) => Cell::Text(s.clone()),
            Data::Float(f) => Cell::Number(*f),
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Bool(b) => Cell::Bool(*b),
            Data::DateTime(dt) => Cell::Number(dt.as_f64()),
            // ISO dates and durations are never names or counts.
            Data::DateTimeIso(_) | Data::DurationIso(_) => Cell::Empty,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    Xlsx,
    Xls,
    Pdf,
}

impl SheetFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "xlsx" => Ok(SheetFormat::Xlsx),
            "xls" => Ok(SheetFormat::Xls),
            "pdf" => Ok(SheetFormat::Pdf),
            other => Err(ReconError::UnsupportedFormat(format!(
                "'.{other}' files are not accepted; upload .xlsx, .xls or .pdf"
            ))),
        }
    }
}

/// Reads the first worksheet of an Excel workbook into a cell grid.
pub fn load_rows(path: &Path) -> Result<Vec<Vec<Cell>>> {
    match SheetFormat::from_path(path)? {
        SheetFormat::Pdf => {
            return Err(ReconError::UnsupportedFormat(
                "PDF production reports are not supported yet; export the report as .xlsx or .xls"
                    .to_string(),
            ))
        }
        SheetFormat::Xlsx | SheetFormat::Xls => {}
    }

    let mut workbook = open_workbook_auto(path)?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| ReconError::Parse("workbook contains no worksheets".to_string()))?;
    let range = workbook.worksheet_range(&sheet_name)?;

    Ok(range
        .rows()
        .map(|row| row.iter().map(Cell::from).collect())
        .collect())
}

#[derive(Debug, Default)]
struct ColumnMap {
    name: usize,
    email: Option<usize>,
    fields: [Option<usize>; 4],
}

fn cell_text(cell: &Cell) -> Option<&str> {
    match cell {
        Cell::Text(text) => Some(text.as_str()),
        _ => None,
    }
}

fn header_matches(cell: &Cell, phrase: &str) -> bool {
    cell_text(cell)
        .map(|text| text.to_lowercase().contains(phrase))
        .unwrap_or(false)
}

fn locate_header(rows: &[Vec<Cell>]) -> Option<(usize, ColumnMap)> {
    rows.iter().enumerate().find_map(|(row_index, row)| {
        let name = row.iter().position(|cell| header_matches(cell, NAME_HEADER))?;
        let mut columns = ColumnMap {
            name,
            email: row.iter().position(|cell| header_matches(cell, EMAIL_HEADER)),
            ..ColumnMap::default()
        };
        for (slot, (_, phrase)) in FIELD_HEADERS.iter().enumerate() {
            columns.fields[slot] = row.iter().position(|cell| header_matches(cell, phrase));
        }
        Some((row_index, columns))
    })
}

/// Coerces a cell to a non-negative count. Anything unreadable is zero.
pub fn coerce_count(cell: Option<&Cell>) -> i32 {
    let value = match cell {
        Some(Cell::Number(n)) => *n,
        Some(Cell::Text(text)) => text.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };

    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    value.trunc().min(i32::MAX as f64) as i32
}

/// `Jane  Q. Doe` becomes `jane.q.doe@domain`.
pub fn derive_email(name: &str, domain: &str) -> String {
    let local: Vec<String> = name
        .split_whitespace()
        .map(|part| {
            part.chars()
                .filter(|c| c.is_alphanumeric() || *c == '-')
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|part| !part.is_empty())
        .collect();
    format!("{}@{}", local.join("."), domain)
}

pub fn parse_rows(rows: &[Vec<Cell>], email_domain: &str) -> Result<Vec<ReportRow>> {
    let (header_index, columns) = locate_header(rows).ok_or_else(|| {
        ReconError::Parse(format!(
            "no header row with a '{NAME_HEADER}' column was found"
        ))
    })?;

    let mut seen = HashSet::new();
    let mut parsed = Vec::new();

    for row in &rows[header_index + 1..] {
        let name = match row.get(columns.name).and_then(cell_text).map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => continue,
        };

        if !seen.insert(name.to_lowercase()) {
            tracing::debug!(employee = %name, "skipping duplicate spreadsheet row");
            continue;
        }

        let email = columns
            .email
            .and_then(|index| row.get(index))
            .and_then(cell_text)
            .map(|text| text.trim().to_lowercase())
            .filter(|text| text.contains('@'))
            .unwrap_or_else(|| derive_email(&name, email_domain));

        let mut metrics = Metrics::default();
        for (slot, (field, _)) in FIELD_HEADERS.iter().enumerate() {
            let value = columns.fields[slot].map_or(0, |index| coerce_count(row.get(index)));
            metrics.set(*field, value);
        }

        parsed.push(ReportRow {
            employee_name: name,
            employee_email: email,
            metrics,
        });
    }

    if parsed.is_empty() {
        return Err(ReconError::Parse(
            "no valid employee rows were found below the header".to_string(),
        ));
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(value: &str) -> Cell {
        Cell::Text(value.to_string())
    }

    fn num(value: f64) -> Cell {
        Cell::Number(value)
    }

    fn header() -> Vec<Cell> {
        vec![
            text("Recruiter Name"),
            text("Interviews Scheduled"),
            text("Offers Sent"),
            text("Hires Made"),
            text("Candidates Contacted"),
        ]
    }

    #[test]
    fn finds_header_below_title_rows() {
        let rows = vec![
            vec![text("Weekly production")],
            vec![Cell::Empty],
            header(),
            vec![text("Jane Doe"), num(5.0), num(2.0), num(1.0), num(40.0)],
        ];

        let parsed = parse_rows(&rows, "company.com").unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].employee_name, "Jane Doe");
        assert_eq!(parsed[0].employee_email, "jane.doe@company.com");
        assert_eq!(parsed[0].metrics.interviews_scheduled, 5);
        assert_eq!(parsed[0].metrics.offers_sent, 2);
        assert_eq!(parsed[0].metrics.hires_made, 1);
        assert_eq!(parsed[0].metrics.candidates_contacted, 40);
    }

    #[test]
    fn missing_name_header_is_a_parse_error() {
        let rows = vec![
            vec![text("Name"), text("Interviews Scheduled")],
            vec![text("Jane Doe"), num(5.0)],
        ];

        let err = parse_rows(&rows, "company.com").unwrap_err();
        assert!(matches!(err, ReconError::Parse(_)));
    }

    #[test]
    fn header_without_data_rows_is_a_parse_error() {
        let rows = vec![header(), vec![Cell::Empty, num(3.0)], vec![num(7.0)]];
        let err = parse_rows(&rows, "company.com").unwrap_err();
        assert!(matches!(err, ReconError::Parse(_)));
    }

    #[test]
    fn unresolved_columns_fill_zero() {
        let rows = vec![
            vec![text("RECRUITER NAME"), text("Hires Made")],
            vec![text("Sam Park"), num(3.0)],
        ];

        let parsed = parse_rows(&rows, "company.com").unwrap();
        assert_eq!(parsed[0].metrics.hires_made, 3);
        assert_eq!(parsed[0].metrics.interviews_scheduled, 0);
        assert_eq!(parsed[0].metrics.offers_sent, 0);
        assert_eq!(parsed[0].metrics.candidates_contacted, 0);
    }

    #[test]
    fn skips_blank_and_non_text_names() {
        let rows = vec![
            header(),
            vec![text("   "), num(1.0)],
            vec![num(42.0), num(1.0)],
            vec![text("Ana Ruiz"), num(1.0)],
        ];

        let parsed = parse_rows(&rows, "company.com").unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].employee_name, "Ana Ruiz");
    }

    #[test]
    fn date_cells_in_the_name_column_are_skipped() {
        let rows: Vec<Vec<Cell>> = vec![
            vec![Data::String("Recruiter Name".to_string()), Data::String("Hires Made".to_string())],
            vec![Data::DateTimeIso("2026-03-02T00:00:00".to_string()), Data::Int(4)],
            vec![Data::DurationIso("PT8H".to_string()), Data::Int(2)],
            vec![Data::String("Jane Doe".to_string()), Data::Float(1.0)],
        ]
        .iter()
        .map(|row| row.iter().map(Cell::from).collect())
        .collect();

        let parsed = parse_rows(&rows, "company.com").unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].employee_name, "Jane Doe");
        assert_eq!(parsed[0].metrics.hires_made, 1);
    }

    #[test]
    fn keeps_first_of_duplicate_names() {
        let rows = vec![
            header(),
            vec![text("Jane Doe"), num(5.0)],
            vec![text("jane doe"), num(9.0)],
        ];

        let parsed = parse_rows(&rows, "company.com").unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].metrics.interviews_scheduled, 5);
    }

    #[test]
    fn uses_email_column_when_present() {
        let rows = vec![
            vec![text("Recruiter Name"), text("Work Email"), text("Offers Sent")],
            vec![text("Jane Doe"), text(" Jane.D@Agency.io "), num(2.0)],
            vec![text("Lee Kim"), text("n/a"), num(1.0)],
        ];

        let parsed = parse_rows(&rows, "company.com").unwrap();
        assert_eq!(parsed[0].employee_email, "jane.d@agency.io");
        assert_eq!(parsed[1].employee_email, "lee.kim@company.com");
    }

    #[test]
    fn coerces_numbers_leniently() {
        assert_eq!(coerce_count(Some(&num(4.9))), 4);
        assert_eq!(coerce_count(Some(&text(" 12 "))), 12);
        assert_eq!(coerce_count(Some(&text("twelve"))), 0);
        assert_eq!(coerce_count(Some(&num(-3.0))), 0);
        assert_eq!(coerce_count(Some(&Cell::Bool(true))), 0);
        assert_eq!(coerce_count(Some(&num(f64::NAN))), 0);
        assert_eq!(coerce_count(None), 0);
    }

    #[test]
    fn derives_email_from_name() {
        assert_eq!(derive_email("Jane  Q. Doe", "company.com"), "jane.q.doe@company.com");
        assert_eq!(derive_email("Mary-Kate O'Neil", "x.io"), "mary-kate.oneil@x.io");
    }

    #[test]
    fn detects_format_from_extension() {
        assert_eq!(SheetFormat::from_path(Path::new("a.XLSX")).unwrap(), SheetFormat::Xlsx);
        assert_eq!(SheetFormat::from_path(Path::new("a.xls")).unwrap(), SheetFormat::Xls);
        assert_eq!(SheetFormat::from_path(Path::new("a.pdf")).unwrap(), SheetFormat::Pdf);
        assert!(SheetFormat::from_path(Path::new("a.csv")).is_err());
        assert!(SheetFormat::from_path(Path::new("noext")).is_err());
    }

    #[test]
    fn pdf_is_rejected_with_a_descriptive_error() {
        let err = load_rows(Path::new("report.pdf")).unwrap_err();
        match err {
            ReconError::UnsupportedFormat(message) => assert!(message.contains("PDF")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
