// CSV import - headerless rows of `date, amount, description, category`
// Parsing only; validation and the transactional insert live in ExpenseService

use crate::error::{Error, Result};
use crate::expense::ExpenseInput;
use csv::{ReaderBuilder, StringRecord, Trim};
use std::fs::File;
use std::io::Read;
use std::path::Path;

fn is_header(record: &StringRecord) -> bool {
    record
        .get(0)
        .map(|field| field.eq_ignore_ascii_case("date"))
        .unwrap_or(false)
}

/// Parse CSV rows into raw inputs. A leading `date,amount,...` header row is skipped.
pub fn read_rows<R: Read>(reader: R) -> Result<Vec<ExpenseInput>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .trim(Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();

    for (index, result) in rdr.records().enumerate() {
        let row = index + 1;
        let record = result.map_err(|e| Error::Import {
            row,
            source: Box::new(Error::Csv(e)),
        })?;

        if index == 0 && is_header(&record) {
            continue;
        }

        let (date, amount, description, category): (String, String, String, String) = record
            .deserialize(None)
            .map_err(|e| Error::Import {
                row,
                source: Box::new(Error::Csv(e)),
            })?;

        rows.push(ExpenseInput {
            date,
            amount,
            description,
            category,
        });
    }

    Ok(rows)
}

pub fn read_file(path: &Path) -> Result<Vec<ExpenseInput>> {
    let file = File::open(path).map_err(|e| Error::Csv(csv::Error::from(e)))?;
    read_rows(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_rows_in_column_order() {
        let data = "2024-01-05,12.50,Lunch,Food\n2024-01-06, 3 , Bus ,Transport\n";
        let rows = read_rows(data.as_bytes()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, "2024-01-05");
        assert_eq!(rows[0].amount, "12.50");
        assert_eq!(rows[0].description, "Lunch");
        assert_eq!(rows[0].category, "Food");
        assert_eq!(rows[1].amount, "3");
        assert_eq!(rows[1].description, "Bus");
    }

    #[test]
    fn test_header_row_is_skipped() {
        let data = "date,amount,description,category\n2024-01-05,1,Tea,Food\n";
        let rows = read_rows(data.as_bytes()).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].description, "Tea");
    }

    #[test]
    fn test_quoted_description_with_comma() {
        let data = "2024-01-05,20,\"Pizza, drinks\",Food\n";
        let rows = read_rows(data.as_bytes()).unwrap();

        assert_eq!(rows[0].description, "Pizza, drinks");
    }

    #[test]
    fn test_short_row_reports_row_number() {
        let data = "2024-01-05,1,Tea,Food\n2024-01-06,2,Coffee,Food\n2024-01-07,3\n";
        let err = read_rows(data.as_bytes()).unwrap_err();

        assert!(matches!(err, Error::Import { row: 3, .. }), "{:?}", err);
    }

    #[test]
    fn test_read_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "2024-02-01,9.99,Book,Education").unwrap();
        writeln!(file, "2024-02-02,4.50,Snack,Food").unwrap();

        let rows = read_file(file.path()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].amount, "4.50");
    }
}
