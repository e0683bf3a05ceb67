use anyhow::{Context, Result};
use std::io::BufRead;

/// 一条 FASTA 记录；序列已去掉空白并转成大写
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastaRecord {
    pub id: String,
    pub desc: Option<String>,
    pub seq: Vec<u8>,
}

/// 逐条读取 FASTA，支持多行序列、CRLF 以及文件开头的空行
pub struct FastaReader<R: BufRead> {
    reader: R,
    line: Vec<u8>,
    pending: Option<Vec<u8>>,
    line_no: usize,
}

/// ">id desc..." -> (id, desc)
pub(crate) fn split_header(raw: &[u8]) -> (String, Option<String>) {
    let text = String::from_utf8_lossy(raw);
    let text = text.trim();
    match text.split_once(char::is_whitespace) {
        Some((id, rest)) => {
            let rest = rest.trim();
            (id.to_string(), (!rest.is_empty()).then(|| rest.to_string()))
        }
        None => (text.to_string(), None),
    }
}

impl<R: BufRead> FastaReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, line: Vec::new(), pending: None, line_no: 0 }
    }

    fn read_line(&mut self) -> Result<bool> {
        self.line.clear();
        let n = self
            .reader
            .read_until(b'\n', &mut self.line)
            .with_context(|| format!("reading FASTA line {}", self.line_no + 1))?;
        self.line_no += 1;
        Ok(n > 0)
    }

    pub fn next_record(&mut self) -> Result<Option<FastaRecord>> {
        let header = match self.pending.take() {
            Some(h) => h,
            None => loop {
                if !self.read_line()? {
                    return Ok(None);
                }
                if let Some(rest) = self.line.strip_prefix(b">") {
                    break rest.to_vec();
                }
            },
        };
        let (id, desc) = split_header(&header);

        let mut seq = Vec::new();
        while self.read_line()? {
            if let Some(rest) = self.line.strip_prefix(b">") {
                self.pending = Some(rest.to_vec());
                break;
            }
            seq.extend(
                self.line
                    .iter()
                    .filter(|b| !b.is_ascii_whitespace())
                    .map(u8::to_ascii_uppercase),
            );
        }
        Ok(Some(FastaRecord { id, desc, seq }))
    }
}

impl<R: BufRead> Iterator for FastaReader<R> {
    type Item = Result<FastaRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}
