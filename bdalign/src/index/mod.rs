//! 索引层：2-bit 打包序列、rank/select 位向量、wavelet array 与 FM 索引。
//!
//! 所有结构在构建阶段一次生成，之后只读，可在多线程间共享。

pub mod bitvec;
pub mod boundary;
pub mod bwt;
pub mod count;
pub mod fm;
pub mod packed;
pub mod sa;
pub mod ssa;
pub mod wavelet;

pub use bitvec::{BitVector, RankSelectBitVector};
pub use boundary::{Contig, SequenceBoundary};
pub use count::CharacterCount;
pub use fm::{FmIndex, SuffixInterval, WaveletFmIndex};
pub use packed::PackedSequence;
pub use ssa::SparseSuffixArray;
pub use wavelet::WaveletArray;

/// 可按下标取符号编码的序列，wavelet array 与 C 表都基于它构建
pub trait SymbolSequence {
    fn text_size(&self) -> usize;
    fn symbol(&self, i: usize) -> u8;
}

impl SymbolSequence for [u8] {
    #[inline]
    fn text_size(&self) -> usize {
        self.len()
    }

    #[inline]
    fn symbol(&self, i: usize) -> u8 {
        self[i]
    }
}
