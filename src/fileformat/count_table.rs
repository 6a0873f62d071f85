use std::fs::File;
use std::path::Path;

use anyhow::Context;
use anyhow::Result;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;

use crate::count::{FinalCountRecord, RawCountRecord};
use crate::library::{AssignedCountRow, MergedCountRow};

pub type GzTsvWriter = csv::Writer<GzEncoder<File>>;

///////////////////////////////
/// Open a gzip-compressed TSV for writing. The header line is written right away so that
/// empty tables still carry their columns
pub fn create_gz_tsv(path: &Path, header: &[&str]) -> Result<GzTsvWriter> {
    let file =
        File::create(path).with_context(|| format!("Could not create {}", path.display()))?;
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_writer(GzEncoder::new(file, Compression::default()));
    writer.write_record(header)?;
    Ok(writer)
}

///////////////////////////////
/// Flush the csv buffer and write the gzip trailer
pub fn finish_gz_tsv(writer: GzTsvWriter) -> Result<()> {
    let encoder = writer.into_inner().map_err(|e| e.into_error())?;
    encoder.finish()?;
    Ok(())
}

pub fn write_gz_tsv<'a, S, I>(path: &Path, header: &[&str], rows: I) -> Result<()>
where
    S: Serialize + 'a,
    I: IntoIterator<Item = &'a S>,
{
    let mut writer = create_gz_tsv(path, header)?;
    for row in rows {
        writer.serialize(row)?;
    }
    finish_gz_tsv(writer)
}

///////////////////////////////
/// barcode, [umi,] count
pub fn write_raw_counts(path: &Path, records: &[RawCountRecord], use_umi: bool) -> Result<()> {
    let header: &[&str] = if use_umi {
        &["barcode", "umi", "count"]
    } else {
        &["barcode", "count"]
    };
    write_gz_tsv(path, header, records)
}

///////////////////////////////
/// Same layout as the raw counts, restricted to barcodes that passed the length filter
pub fn write_filtered_counts(path: &Path, records: &[RawCountRecord], use_umi: bool) -> Result<()> {
    write_raw_counts(path, records, use_umi)
}

pub fn write_final_counts(path: &Path, records: &[FinalCountRecord]) -> Result<()> {
    write_gz_tsv(path, &["barcode", "count"], records)
}

pub fn write_merged_counts(path: &Path, rows: &[MergedCountRow]) -> Result<()> {
    write_gz_tsv(path, &["barcode", "dna_count", "rna_count"], rows)
}

pub fn write_assigned_counts(path: &Path, rows: &[AssignedCountRow]) -> Result<()> {
    write_gz_tsv(
        path,
        &["barcode", "insert", "label", "dna_count", "rna_count"],
        rows,
    )
}

///////////////////////////////
/// Read back a final count table, as written by `write_final_counts`
pub fn read_final_counts(path: &Path) -> Result<Vec<FinalCountRecord>> {
    #[derive(serde::Deserialize)]
    struct Row {
        barcode: String,
        count: u64,
    }

    let reader = super::open_maybe_compressed(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_reader(reader);
    let mut out = Vec::new();
    for result in reader.deserialize() {
        let row: Row = result?;
        out.push(FinalCountRecord {
            barcode: row.barcode,
            count: row.count,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_final_counts_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("final.tsv.gz");
        let records = vec![
            FinalCountRecord {
                barcode: "AAAA".to_string(),
                count: 3,
            },
            FinalCountRecord {
                barcode: "CCCC".to_string(),
                count: 1,
            },
        ];
        write_final_counts(&path, &records).unwrap();
        assert_eq!(read_final_counts(&path).unwrap(), records);

        write_final_counts(&path, &[]).unwrap();
        assert!(read_final_counts(&path).unwrap().is_empty());
    }

    #[test]
    fn test_raw_counts_columns() {
        use std::io::Read;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.tsv.gz");
        let records = vec![RawCountRecord {
            barcode: "AAAA".to_string(),
            umi: Some("GGG".to_string()),
            count: 2,
        }];
        write_raw_counts(&path, &records, true).unwrap();

        let mut text = String::new();
        super::super::open_maybe_compressed(&path)
            .unwrap()
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "barcode\tumi\tcount\nAAAA\tGGG\t2\n");
    }
}
