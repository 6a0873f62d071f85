use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::Context;
use anyhow::Result;
use log::debug;
use seq_io::fasta::Reader as FastaReader;
use seq_io::fastq::Reader as FastqReader;

///////////////////////////////
/// Open a possibly compressed file; gz, bz2 etc are detected from the content
pub fn open_maybe_compressed(p: &Path) -> Result<Box<dyn Read + Send>> {
    let file = File::open(p).with_context(|| format!("Could not open file {}", p.display()))?;
    let (reader, compression) = niffler::send::get_reader(Box::new(file))
        .with_context(|| format!("Could not read file {}", p.display()))?;
    debug!(
        "Opened file {} with compression {:?}",
        p.display(),
        compression
    );
    Ok(reader)
}

pub fn open_fastq(p: &Path) -> Result<FastqReader<Box<dyn Read + Send>>> {
    Ok(FastqReader::new(open_maybe_compressed(p)?))
}

pub fn open_fasta(p: &Path) -> Result<FastaReader<Box<dyn Read + Send>>> {
    Ok(FastaReader::new(open_maybe_compressed(p)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use flate2::write::GzEncoder;
    use flate2::Compression;
    use seq_io::fastq::Record;

    #[test]
    fn test_open_gzipped_fastq() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("r1.fastq.gz");
        let mut enc = GzEncoder::new(File::create(&p).unwrap(), Compression::default());
        enc.write_all(b"@r1\nACGT\n+\nIIII\n").unwrap();
        enc.finish().unwrap();

        let mut reader = open_fastq(&p).unwrap();
        let rec = reader.next().unwrap().unwrap();
        assert_eq!(rec.seq(), b"ACGT");
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_open_missing_file() {
        assert!(open_fastq(Path::new("/nonexistent/r1.fastq")).is_err());
    }
}
