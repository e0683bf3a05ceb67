//! 比对层：bit-parallel 编辑距离、前缀匹配自动机与双向搜索，
//! 以及把它们组装起来的索引包和 read 比对入口。

pub mod filter;
pub mod myers;
pub mod strategy;

pub use filter::{QueryMask, SearchState, StaircaseFilter, SuffixFilter};
pub use myers::{BlockAligner, MyersHit, WordAligner};
pub use strategy::{BiInterval, BidirectionalSearch, Candidate, Direction, Strand};

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use bincode::Options;
use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};
use crate::index::{Contig, FmIndex, PackedSequence, SequenceBoundary, SparseSuffixArray, WaveletFmIndex};
use crate::io::reads::Read;
use crate::util::dna::{self, Base};

/// 比对参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignConfig {
    /// 允许的编辑距离：在 (0, 1) 内表示 read 长度的比例，否则为绝对个数
    pub max_edit: f64,
    /// 每条 read 最多验证的候选区间数
    pub max_candidates: usize,
    /// 每个候选区间最多展开的文本位置数
    pub max_positions: usize,
    pub threads: usize,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self { max_edit: 0.04, max_candidates: 64, max_positions: 32, threads: 1 }
    }
}

impl AlignConfig {
    pub fn max_edit_distance(&self, read_len: usize) -> usize {
        if self.max_edit > 0.0 && self.max_edit < 1.0 {
            (read_len as f64 * self.max_edit).floor() as usize
        } else {
            self.max_edit as usize
        }
    }
}

/// 索引元数据（构建参数、时间戳）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub reference_file: Option<String>,
    pub build_args: Option<String>,
    pub build_timestamp: Option<String>,
    pub sa_step: usize,
}

/// 一条 read 在参考上的比对结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignmentHit {
    pub contig: usize,
    pub contig_name: String,
    /// contig 内 0-based 起点
    pub position: usize,
    pub ref_len: usize,
    pub strand: Strand,
    pub edits: usize,
}

impl AlignmentHit {
    /// 最简 SAM 行；CIGAR 只给出 read 长度
    pub fn to_sam_line(&self, read: &Read, secondary: bool) -> String {
        let seq = match self.strand {
            Strand::Forward => read.seq.to_string(),
            Strand::Reverse => read.seq.reverse_complement().to_string(),
        };
        let flag = self.strand.sam_flag() | if secondary { 256 } else { 0 };
        format!(
            "{}\t{}\t{}\t{}\t255\t{}M\t*\t0\t0\t{}\t*\tNM:i:{}",
            read.name,
            flag,
            self.contig_name,
            self.position + 1,
            read.seq.len(),
            seq,
            self.edits
        )
    }
}

pub fn unmapped_sam_line(read: &Read) -> String {
    format!("{}\t4\t*\t0\t0\t*\t*\t0\t0\t{}\t*", read.name, read.seq)
}

/// 在参考窗口内确定一次比对的起点、长度和 diff：
/// 正向求最优结束位置，再把查询和窗口同时反转求起点
struct Verifier {
    forward: BlockAligner,
    backward: BlockAligner,
}

impl Verifier {
    fn new(query: &PackedSequence, k: usize) -> Self {
        Self {
            forward: BlockAligner::new(&QueryMask::new(query), k),
            backward: BlockAligner::new(&QueryMask::new(&query.reverse()), k),
        }
    }

    fn verify(&self, window: &PackedSequence) -> Option<(usize, usize, usize)> {
        let end = self.forward.align(window)?;
        let head = window.sub_sequence(0, end.end + 1).reverse();
        let back = self.backward.align(&head)?;
        Some((end.end - back.end, back.end + 1, back.diff))
    }
}

/// 比对所需的全部索引：正向 / 反向文本的 FM 索引、各自的稀疏后缀数组、
/// 拼接后的参考文本以及 contig 边界表
#[derive(Debug, Serialize, Deserialize)]
pub struct AlignerIndex {
    pub meta: IndexMeta,
    text: PackedSequence,
    forward: WaveletFmIndex,
    reverse: WaveletFmIndex,
    forward_ssa: SparseSuffixArray,
    reverse_ssa: SparseSuffixArray,
    boundary: SequenceBoundary,
}

impl AlignerIndex {
    /// 拼接 contig（以 N 分隔）并构建双向索引。IUPAC 简并碱基按 N 处理，
    /// 其余字母表外的符号直接报错。
    pub fn build<I>(contigs: I, sa_step: usize) -> Result<Self>
    where
        I: IntoIterator<Item = (String, Vec<u8>)>,
    {
        let started = Instant::now();
        let mut text = PackedSequence::new();
        let mut boundary = SequenceBoundary::new();
        for (name, seq) in contigs {
            if !boundary.is_empty() {
                text.append(Base::N);
            }
            let offset = text.len();
            for (i, &b) in seq.iter().enumerate() {
                let base = match Base::try_from_ascii(b) {
                    Some(base) => base,
                    None if dna::is_ambiguity_code(b) => Base::N,
                    None => return Err(IndexError::InvalidSymbol { symbol: b, position: offset + i }),
                };
                text.append(base);
            }
            boundary.push(name, offset, seq.len())?;
        }
        if boundary.is_empty() {
            return Err(IndexError::Construction("reference contains no sequences".into()));
        }
        info!("packed {} contigs, {} bases", boundary.len(), text.len());

        let forward = WaveletFmIndex::from_text(&text);
        let reverse = WaveletFmIndex::from_text(&text.reverse());
        info!("forward and reverse FM-index built in {:.2}s", started.elapsed().as_secs_f64());

        let forward_ssa = SparseSuffixArray::from_index(&forward, sa_step)?;
        let reverse_ssa = SparseSuffixArray::from_index(&reverse, sa_step)?;
        info!(
            "sparse suffix arrays: {} + {} samples (step {})",
            forward_ssa.sample_count(),
            reverse_ssa.sample_count(),
            sa_step
        );

        Ok(Self {
            meta: IndexMeta { sa_step, ..IndexMeta::default() },
            text,
            forward,
            reverse,
            forward_ssa,
            reverse_ssa,
            boundary,
        })
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        bincode::serialize_into(&mut out, self)?;
        out.flush()?;
        Ok(())
    }

    /// 读取索引文件。读取量以文件大小为上限，损坏的长度前缀不会引发巨量分配；
    /// 各组件在反序列化时自检，整体一致性再由 `check_consistency` 校验。
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let limit = file.metadata()?.len();
        let idx: Self = bincode::DefaultOptions::new()
            .with_fixint_encoding()
            .allow_trailing_bytes()
            .with_limit(limit)
            .deserialize_from(BufReader::new(file))?;
        idx.check_consistency()?;
        Ok(idx)
    }

    fn check_consistency(&self) -> Result<()> {
        let n = self.text.len() + 1;
        if self.forward.text_size() != n || self.reverse.text_size() != n {
            return Err(IndexError::Construction(format!(
                "index sizes {} / {} do not match reference length {}",
                self.forward.text_size(),
                self.reverse.text_size(),
                self.text.len()
            )));
        }
        if self.forward_ssa.len() != n || self.reverse_ssa.len() != n {
            return Err(IndexError::Construction("sampled suffix arrays do not match reference length".into()));
        }
        if self.boundary.contigs().last().map_or(true, |c| c.end() as usize > self.text.len()) {
            return Err(IndexError::Construction("contig table exceeds reference length".into()));
        }
        Ok(())
    }

    pub fn set_meta(&mut self, meta: IndexMeta) {
        self.meta = meta;
    }

    pub fn contigs(&self) -> &[Contig] {
        self.boundary.contigs()
    }

    pub fn text(&self) -> &PackedSequence {
        &self.text
    }

    pub fn forward(&self) -> &WaveletFmIndex {
        &self.forward
    }

    pub fn reverse(&self) -> &WaveletFmIndex {
        &self.reverse
    }

    /// 候选区间 -> 正向文本起点
    pub fn locate(&self, cand: &Candidate) -> Vec<usize> {
        cand.text_positions(&self.forward, &self.forward_ssa, &self.reverse, &self.reverse_ssa)
    }

    /// 搜索、定位、验证一条 read；结果按 (edits, contig, position) 排序
    pub fn align_read(&self, read: &Read, config: &AlignConfig) -> Vec<AlignmentHit> {
        let m = read.seq.len();
        if m == 0 {
            return Vec::new();
        }
        let k = config.max_edit_distance(m);
        let search = BidirectionalSearch::new(&self.forward, &self.reverse, k);
        let mut candidates = Vec::new();
        search.search(&read.seq, &mut |c| candidates.push(c));
        candidates.sort_by_key(|c| c.k);
        candidates.truncate(config.max_candidates);
        debug!("read {}: {} candidates within {} errors", read.name, candidates.len(), k);
        if candidates.is_empty() {
            return Vec::new();
        }

        let fwd = Verifier::new(&read.seq, k);
        let rev = Verifier::new(&read.seq.reverse_complement(), k);
        let mut hits: HashMap<(usize, usize, Strand), AlignmentHit> = HashMap::new();
        for cand in &candidates {
            let verifier = match cand.strand {
                Strand::Forward => &fwd,
                Strand::Reverse => &rev,
            };
            for start in self.locate(cand).into_iter().take(config.max_positions) {
                let Some((ci, _)) = self.boundary.resolve(start, cand.ref_len) else {
                    continue;
                };
                let contig = &self.contigs()[ci];
                let (c_begin, c_end) = (contig.offset as usize, contig.end() as usize);
                let lo = start.saturating_sub(k).max(c_begin);
                let hi = (start + cand.ref_len + k).min(c_end);
                let Some((s, len, edits)) = verifier.verify(&self.text.sub_sequence(lo, hi)) else {
                    continue;
                };
                let hit = AlignmentHit {
                    contig: ci,
                    contig_name: contig.name.clone(),
                    position: lo + s - c_begin,
                    ref_len: len,
                    strand: cand.strand,
                    edits,
                };
                hits.entry((ci, hit.position, hit.strand))
                    .and_modify(|prev| {
                        if hit.edits < prev.edits {
                            *prev = hit.clone();
                        }
                    })
                    .or_insert_with(|| hit.clone());
            }
        }

        let mut out: Vec<AlignmentHit> = hits.into_values().collect();
        out.sort_by(|a, b| {
            (a.edits, a.contig, a.position, a.strand).cmp(&(b.edits, b.contig, b.position, b.strand))
        });
        out
    }

    /// 在当前 rayon 线程池中并行比对一批 read
    pub fn align_batch(&self, reads: &[Read], config: &AlignConfig) -> Vec<Vec<AlignmentHit>> {
        reads.par_iter().map(|r| self.align_read(r, config)).collect()
    }

    pub fn write_sam_header<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        writeln!(out, "@HD\tVN:1.6\tSO:unsorted")?;
        for c in self.contigs() {
            writeln!(out, "@SQ\tSN:{}\tLN:{}", c.name, c.len)?;
        }
        writeln!(out, "@PG\tID:bdalign\tPN:bdalign\tVN:{}", env!("CARGO_PKG_VERSION"))
    }
}
