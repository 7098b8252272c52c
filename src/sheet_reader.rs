use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};

use crate::error::{PreviewError, Result};
use crate::reader::{CellValue, DocumentReader, PreviewResult};

/// Rows kept for a spreadsheet thumbnail.
pub const THUMBNAIL_ROWS: usize = 5;

/// First sheet of a workbook as a table.
#[derive(Debug, Default)]
pub struct SheetReader;

impl DocumentReader for SheetReader {
    fn read(&self, bytes: &[u8]) -> Result<PreviewResult> {
        read_first_sheet(bytes).map(PreviewResult::Table)
    }
}

/// Parse `bytes` as a workbook (xlsx, xls, xlsb or ods) and return its first
/// sheet as a row-major grid. A workbook without sheets yields no rows.
pub fn read_first_sheet(bytes: &[u8]) -> Result<Vec<Vec<CellValue>>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| PreviewError::InvalidContainer(e.to_string()))?;

    let Some(first) = workbook.sheet_names().first().cloned() else {
        tracing::debug!("workbook has no sheets");
        return Ok(Vec::new());
    };

    let range = workbook
        .worksheet_range(&first)
        .map_err(|e| PreviewError::InvalidContainer(format!("sheet {}: {}", first, e)))?;

    let rows: Vec<Vec<CellValue>> = range
        .rows()
        .map(|row| row.iter().map(CellValue::from).collect())
        .collect();
    tracing::debug!("sheet {} has {} rows", first, rows.len());
    Ok(rows)
}

impl From<&Data> for CellValue {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => CellValue::Empty,
            Data::String(s) => CellValue::Text(s.clone()),
            Data::Int(i) => CellValue::Int(*i),
            Data::Float(f) => CellValue::Float(*f),
            Data::Bool(b) => CellValue::Bool(*b),
            Data::Error(e) => CellValue::Error(e.to_string()),
            other => CellValue::Text(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use pretty_assertions::assert_eq;

    fn sample() -> Vec<u8> {
        fixtures::xlsx(&[
            &["Name", "Qty"],
            &["Apples", "3"],
            &["Pears", "12"],
        ])
    }

    #[test]
    fn first_sheet_as_grid() {
        let rows = read_first_sheet(&sample()).unwrap();
        assert_eq!(
            rows,
            vec![
                vec![CellValue::Text("Name".into()), CellValue::Text("Qty".into())],
                vec![CellValue::Text("Apples".into()), CellValue::Float(3.0)],
                vec![CellValue::Text("Pears".into()), CellValue::Float(12.0)],
            ]
        );
    }

    #[test]
    fn rereading_identical_bytes_is_identical() {
        let bytes = sample();
        let first = SheetReader.read(&bytes).unwrap();
        let second = SheetReader.read(&bytes).unwrap();

        let (PreviewResult::Table(a), PreviewResult::Table(b)) = (&first, &second) else {
            panic!("expected tables, got {:?} and {:?}", first, second);
        };
        assert_eq!(a.len(), b.len());
        assert_eq!(
            a.iter().map(Vec::len).collect::<Vec<_>>(),
            b.iter().map(Vec::len).collect::<Vec<_>>()
        );
        assert_eq!(first, second);
    }

    #[test]
    fn garbage_is_invalid_container() {
        assert!(matches!(
            read_first_sheet(b"not a workbook"),
            Err(PreviewError::InvalidContainer(_))
        ));
    }

    #[test]
    fn cell_conversion() {
        assert_eq!(CellValue::from(&Data::Empty), CellValue::Empty);
        assert_eq!(CellValue::from(&Data::Int(7)), CellValue::Int(7));
        assert_eq!(CellValue::from(&Data::Bool(false)), CellValue::Bool(false));
        assert_eq!(
            CellValue::from(&Data::String("x".into())),
            CellValue::Text("x".into())
        );
    }
}
