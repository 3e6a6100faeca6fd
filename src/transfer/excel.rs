//! Excel workbook backend (first worksheet only).

use super::{TabularRow, COLUMNS};
use crate::error::{ImportError, Result};
use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::{Format, Workbook};
use std::path::Path;

const SHEET_NAME: &str = "Artists";

/// Write the header (bold) and one row per record
pub fn write_rows(path: &Path, rows: &[TabularRow]) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    let bold = Format::new().set_bold();
    for (col, name) in COLUMNS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *name, &bold)?;
    }

    for (index, row) in rows.iter().enumerate() {
        let r = (index + 1) as u32;
        worksheet.write_string(r, 0, &row.artist_id)?;
        worksheet.write_string(r, 1, &row.display_name)?;
        worksheet.write_string(r, 2, &row.biography)?;
        worksheet.write_string(r, 3, &row.notes)?;
        worksheet.write_number(r, 4, if row.marked { 1.0 } else { 0.0 })?;
    }

    worksheet.set_column_width(2, 40)?;
    worksheet.set_column_width(3, 30)?;

    workbook.save(path)?;
    Ok(())
}

/// Read the first worksheet as raw cells, tagged with 1-based row numbers
pub fn read_table(path: &Path) -> Result<Vec<(usize, Vec<String>)>> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(ImportError::EmptyWorkbook)??;

    // The used range may not start at A1
    let first_row = range.start().map_or(0, |(row, _)| row as usize);

    Ok(range
        .rows()
        .enumerate()
        .map(|(offset, cells)| (first_row + offset + 1, cells.iter().map(cell_text).collect()))
        .collect())
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Bool(b) => if *b { "1".into() } else { "0".into() },
        Data::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_workbook_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("artists.xlsx");
        let rows = vec![
            TabularRow {
                artist_id: "A1".into(),
                display_name: "Alpha".into(),
                biography: "bio".into(),
                notes: String::new(),
                marked: true,
            },
            TabularRow {
                artist_id: "B2".into(),
                display_name: "Beta".into(),
                biography: String::new(),
                notes: "n".into(),
                marked: false,
            },
        ];

        write_rows(&path, &rows).unwrap();
        let table = read_table(&path).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table[0].1, COLUMNS.iter().map(|c| c.to_string()).collect::<Vec<_>>());
        assert_eq!(table[1].0, 2);
        assert_eq!(table[1].1, vec!["A1", "Alpha", "bio", "", "1"]);
        assert_eq!(table[2].1, vec!["B2", "Beta", "", "n", "0"]);
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(&Data::Float(3.0)), "3");
        assert_eq!(cell_text(&Data::Float(2.5)), "2.5");
        assert_eq!(cell_text(&Data::Int(7)), "7");
        assert_eq!(cell_text(&Data::Bool(true)), "1");
        assert_eq!(cell_text(&Data::Empty), "");
    }
}
