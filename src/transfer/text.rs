//! Tab-separated text backend.

use super::{TabularRow, COLUMNS};
use csv::{Reader, ReaderBuilder, Writer};

/// Reader settings for tab-separated files of uneven width
pub fn reader_builder() -> ReaderBuilder {
    let mut builder = ReaderBuilder::new();
    builder.delimiter(b'\t').has_headers(false).flexible(true);
    builder
}

/// Write the header and one line per row with the given `csv::Writer`
pub fn write_rows<W: std::io::Write>(mut writer: Writer<W>, rows: &[TabularRow]) -> csv::Result<()> {
    writer.write_record(COLUMNS)?;
    for row in rows {
        writer.write_record(row.cells())?;
    }
    writer.flush()?;
    Ok(())
}

/// Read every record as raw cells, tagged with its 1-based line number
pub fn read_table<R: std::io::Read>(mut reader: Reader<R>) -> csv::Result<Vec<(usize, Vec<String>)>> {
    let mut table = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let record = result?;
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(index + 1);
        let cells = record
            .iter()
            .map(|c| c.trim_end_matches('\r').to_string())
            .collect();
        table.push((line, cells));
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read_keeps_tabs_and_newlines() {
        let rows = vec![TabularRow {
            artist_id: "A1".into(),
            display_name: "Alpha".into(),
            biography: "line one\nline\ttwo".into(),
            notes: "".into(),
            marked: true,
        }];

        let mut buffer = Vec::new();
        let writer = csv::WriterBuilder::new().delimiter(b'\t').from_writer(&mut buffer);
        write_rows(writer, &rows).unwrap();

        let text = String::from_utf8(buffer.clone()).unwrap();
        assert!(text.starts_with("artist_id\tdisplay_name\tbiography\tnotes\tmarked\n"));

        let table = read_table(reader_builder().from_reader(buffer.as_slice())).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table[1].1[2], "line one\nline\ttwo");
        assert_eq!(table[1].1[4], "1");
    }

    #[test]
    fn test_uneven_rows_are_read() {
        let data = "artist_id\tdisplay_name\tbiography\tnotes\nA1\tAlpha\tb\tn\nA2\tBeta\n";
        let table = read_table(reader_builder().from_reader(data.as_bytes())).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table[2].0, 3);
        assert_eq!(table[2].1.len(), 2);
    }
}
