use anyhow::{bail, Context, Result};
use std::io::BufRead;

use super::fasta::split_header;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastqRecord {
    pub id: String,
    pub desc: Option<String>,
    pub seq: Vec<u8>,
    pub qual: Vec<u8>,
}

/// 四行格式的 FASTQ；不支持折行的序列
pub struct FastqReader<R: BufRead> {
    reader: R,
    line: Vec<u8>,
    records: usize,
}

fn trim_newline(line: &[u8]) -> &[u8] {
    let end = line.iter().rposition(|&b| b != b'\n' && b != b'\r').map_or(0, |i| i + 1);
    &line[..end]
}

impl<R: BufRead> FastqReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, line: Vec::new(), records: 0 }
    }

    fn read_line(&mut self) -> Result<bool> {
        self.line.clear();
        Ok(self.reader.read_until(b'\n', &mut self.line)? > 0)
    }

    pub fn next_record(&mut self) -> Result<Option<FastqRecord>> {
        let rec = self.records + 1;
        // 跳过记录之间的空行
        loop {
            if !self.read_line()? {
                return Ok(None);
            }
            if !trim_newline(&self.line).is_empty() {
                break;
            }
        }
        let Some(header) = self.line.strip_prefix(b"@") else {
            bail!("FASTQ record {}: header does not start with '@'", rec);
        };
        let (id, desc) = split_header(header);

        if !self.read_line()? {
            bail!("FASTQ record {} ({}): unexpected EOF after header", rec, id);
        }
        let seq = trim_newline(&self.line).to_vec();

        if !self.read_line()? || !self.line.starts_with(b"+") {
            bail!("FASTQ record {} ({}): missing '+' separator", rec, id);
        }

        let has_qual = self.read_line().with_context(|| format!("FASTQ record {} ({})", rec, id))?;
        if !has_qual {
            bail!("FASTQ record {} ({}): missing quality line", rec, id);
        }
        let qual = trim_newline(&self.line).to_vec();
        if qual.len() != seq.len() {
            bail!(
                "FASTQ record {} ({}): sequence length {} but quality length {}",
                rec,
                id,
                seq.len(),
                qual.len()
            );
        }

        self.records = rec;
        Ok(Some(FastqRecord { id, desc, seq, qual }))
    }
}

impl<R: BufRead> Iterator for FastqReader<R> {
    type Item = Result<FastqRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}
