use anyhow::{bail, Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::fasta::FastaReader;
use super::fastq::FastqReader;
use crate::index::PackedSequence;

/// 待比对的 read：名称 + 打包序列（字母表外的符号按 N 处理）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Read {
    pub name: String,
    pub seq: PackedSequence,
}

impl Read {
    pub fn new(name: impl Into<String>, seq: &[u8]) -> Self {
        Self { name: name.into(), seq: PackedSequence::from_ascii_lossy(seq) }
    }

    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }
}

type DynReader = Box<dyn BufRead + Send>;

/// read 来源：FASTA / FASTQ 文件（按首字符自动识别）或命令行给出的单条查询
pub enum ReadSource {
    Fasta(FastaReader<DynReader>),
    Fastq(FastqReader<DynReader>),
    Single(Option<Read>),
}

impl ReadSource {
    pub fn single(query: &str) -> Self {
        ReadSource::Single(Some(Read::new("query", query.as_bytes())))
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("opening reads file {}", path.display()))?;
        Self::from_reader(Box::new(BufReader::new(file)))
            .with_context(|| format!("detecting format of {}", path.display()))
    }

    pub fn from_reader(mut reader: DynReader) -> Result<Self> {
        let first = loop {
            let buf = reader.fill_buf()?;
            if buf.is_empty() {
                // 空输入按 FASTA 处理，迭代立即结束
                break b'>';
            }
            match buf.iter().position(|b| !b.is_ascii_whitespace()) {
                Some(i) => break buf[i],
                None => {
                    let n = buf.len();
                    reader.consume(n);
                }
            }
        };
        match first {
            b'>' => Ok(ReadSource::Fasta(FastaReader::new(reader))),
            b'@' => Ok(ReadSource::Fastq(FastqReader::new(reader))),
            other => bail!("unrecognized reads format: first symbol '{}'", other as char),
        }
    }

    /// 取下一批（最多 `size` 条）；返回空 Vec 表示读完
    pub fn next_batch(&mut self, size: usize) -> Result<Vec<Read>> {
        let mut batch = Vec::with_capacity(size.min(1 << 16));
        for read in self.by_ref().take(size) {
            batch.push(read?);
        }
        Ok(batch)
    }
}

impl Iterator for ReadSource {
    type Item = Result<Read>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            ReadSource::Fasta(r) => r.next().map(|rec| rec.map(|rec| Read::new(rec.id, &rec.seq))),
            ReadSource::Fastq(r) => r.next().map(|rec| rec.map(|rec| Read::new(rec.id, &rec.seq))),
            ReadSource::Single(q) => q.take().map(Ok),
        }
    }
}
