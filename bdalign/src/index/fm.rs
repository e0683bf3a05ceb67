use std::fmt;

use serde::{Deserialize, Serialize};

use super::bwt::{build_bwt, Bwt};
use super::count::CharacterCount;
use super::packed::PackedSequence;
use super::sa::build_sa;
use super::wavelet::WaveletArray;
use crate::util::dna::{Base, SIGMA};

/// 后缀数组上的闭区间 [lower, upper]。lower > upper 表示空（无匹配），不是错误。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SuffixInterval {
    pub lower: usize,
    pub upper: usize,
}

impl SuffixInterval {
    pub fn new(lower: usize, upper: usize) -> Self {
        Self { lower, upper }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lower > self.upper
    }

    #[inline]
    pub fn size(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            self.upper - self.lower + 1
        }
    }

    pub fn indices(&self) -> std::ops::Range<usize> {
        if self.is_empty() {
            self.lower..self.lower
        } else {
            self.lower..self.upper + 1
        }
    }
}

impl fmt::Display for SuffixInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.lower, self.upper)
    }
}

/// FM 索引的查询能力。生产实现只有 [`WaveletFmIndex`]。
pub trait FmIndex {
    /// 在区间前扩展字符 c：cP 的后缀区间
    fn backward_search(&self, c: Base, si: SuffixInterval) -> SuffixInterval;

    /// 返回 j，使 SA[j] = SA[i] - 1（LF 映射）
    fn suffix_link(&self, i: usize) -> usize;

    /// BWT 长度（含 `$`）
    fn text_size(&self) -> usize;

    /// BWT[si] 中严格小于 c 的符号数，`$` 计为最小
    fn count_less_than(&self, c: Base, si: SuffixInterval) -> usize;

    fn full_interval(&self) -> SuffixInterval {
        SuffixInterval::new(0, self.text_size() - 1)
    }

    /// 精确匹配整个 pattern；不匹配时返回空区间
    fn search(&self, pattern: &PackedSequence) -> SuffixInterval {
        let mut si = self.full_interval();
        for i in (0..pattern.len()).rev() {
            si = self.backward_search(pattern.lookup(i), si);
            if si.is_empty() {
                break;
            }
        }
        si
    }
}

/// 以 wavelet array 存储 BWT 的 FM 索引
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaveletFmIndex {
    bwt: WaveletArray,
    c: CharacterCount,
    /// `$` 在 BWT 中的位置，wavelet 中该位置存的是占位 A
    dollar: usize,
}

impl WaveletFmIndex {
    pub fn new(bwt: &Bwt) -> Self {
        Self {
            bwt: WaveletArray::new(&bwt.symbols, SIGMA),
            c: CharacterCount::new(&bwt.symbols, SIGMA, Some(bwt.dollar)),
            dollar: bwt.dollar,
        }
    }

    /// 从文本直接构建（内部做后缀排序）
    pub fn from_text(text: &PackedSequence) -> Self {
        let sa = build_sa(text);
        Self::new(&build_bwt(text, &sa))
    }

    #[inline]
    pub fn dollar(&self) -> usize {
        self.dollar
    }

    pub fn character_count(&self) -> &CharacterCount {
        &self.c
    }

    /// BWT[0..pos) 中 c 的个数（扣除 `$` 占位）
    #[inline]
    pub fn occ(&self, c: Base, pos: usize) -> usize {
        let r = self.bwt.rank(c.code() as usize, pos);
        if c == Base::A && self.dollar < pos {
            r - 1
        } else {
            r
        }
    }

    /// BWT 第 i 个符号，`$` 返回 None
    pub fn bwt_symbol(&self, i: usize) -> Option<Base> {
        if i == self.dollar {
            None
        } else {
            Base::from_code(self.bwt.lookup(i) as u8)
        }
    }

    /// BWT[0..pos) 中严格小于 c 的符号数（含 `$`）
    fn less_than(&self, c: Base, pos: usize) -> usize {
        let less = self.bwt.rank_all(c.code() as usize, pos).less_than;
        // 占位 A 只有在 c == A 时没被算作"更小"，而 `$` 总是更小
        if c == Base::A && self.dollar < pos {
            less + 1
        } else {
            less
        }
    }
}

impl FmIndex for WaveletFmIndex {
    #[inline]
    fn backward_search(&self, c: Base, si: SuffixInterval) -> SuffixInterval {
        debug_assert!(si.upper < self.text_size() && si.lower <= si.upper + 1);
        let base = self.c.count_smaller_than(c.code());
        let lower = base + self.occ(c, si.lower);
        let upper = base + self.occ(c, si.upper + 1) - 1;
        SuffixInterval { lower, upper }
    }

    fn suffix_link(&self, i: usize) -> usize {
        assert!(i < self.text_size(), "suffix index {} out of range {}", i, self.text_size());
        match self.bwt_symbol(i) {
            // SA[i] = 0，前一个后缀是 `$` 本身，位于 SA[0]
            None => 0,
            Some(c) => self.c.count_smaller_than(c.code()) + self.occ(c, i),
        }
    }

    #[inline]
    fn text_size(&self) -> usize {
        self.bwt.len()
    }

    fn count_less_than(&self, c: Base, si: SuffixInterval) -> usize {
        if si.is_empty() {
            return 0;
        }
        self.less_than(c, si.upper + 1) - self.less_than(c, si.lower)
    }
}
