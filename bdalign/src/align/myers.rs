//! Myers bit-parallel 编辑距离。
//!
//! 单字版本要求查询长度不超过 64；分块版本把查询切成若干个 w 位的块，
//! 只计算可能落在 k 个错误以内的那一段（活动块带），块之间传递水平差值。
//!
//! 参考：Myers (1999), Hyyrö & Navarro (2002)。

use log::trace;
use serde::{Deserialize, Serialize};

use super::filter::QueryMask;
use crate::index::PackedSequence;
use crate::util::dna::{Base, SIGMA};

pub const WORD_BITS: usize = 64;

/// 参考串上的命中：`end` 为最后一个对齐的参考字符下标，`diff` 为编辑距离
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MyersHit {
    pub end: usize,
    pub diff: usize,
}

/// DP 矩阵首列 / 首行的边界条件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    /// 查询两端都锚定，参考从头对齐到尾
    Global,
    /// 查询完整对齐，参考起点任意
    QueryAnchored,
    /// 查询前缀与参考起点都可跳过
    Suffix,
}

/// 单个机器字的 Myers 自动机
#[derive(Debug, Clone)]
pub struct WordAligner {
    peq: [u64; SIGMA],
    m: usize,
}

impl WordAligner {
    pub fn new(query: &PackedSequence) -> Self {
        Self::from_mask(&QueryMask::new(query))
    }

    pub fn from_mask(mask: &QueryMask) -> Self {
        let m = mask.len();
        assert!(
            (1..=WORD_BITS).contains(&m),
            "single-word aligner needs 1..={} query bases, got {}",
            WORD_BITS,
            m
        );
        let peq = std::array::from_fn(|c| mask.word(Base::ALL[c], 0, WORD_BITS));
        Self { peq, m }
    }

    #[inline]
    pub fn query_len(&self) -> usize {
        self.m
    }

    /// 逐列推进，`visit(j, score)` 收到第 j 列最后一行的值；返回最终得分
    fn run<F: FnMut(usize, usize)>(&self, reference: &PackedSequence, boundary: Boundary, mut visit: F) -> usize {
        let top = 1u64 << (self.m - 1);
        let (mut score, mut vp, mut vn) = match boundary {
            Boundary::Global | Boundary::QueryAnchored => (self.m as isize, !0u64, 0u64),
            Boundary::Suffix => (0isize, 0u64, 0u64),
        };
        // 全局模式下第 0 行每列加一
        let hin = u64::from(boundary == Boundary::Global);

        for (j, c) in reference.iter().enumerate() {
            let x = self.peq[c.code() as usize];
            let d0 = ((vp.wrapping_add(x & vp)) ^ vp) | x | vn;
            let hp = vn | !(vp | d0);
            let hn = vp & d0;
            if hp & top != 0 {
                score += 1;
            }
            if hn & top != 0 {
                score -= 1;
            }
            let hp2 = (hp << 1) | hin;
            vn = hp2 & d0;
            vp = (hn << 1) | !(hp2 | d0);
            visit(j, score as usize);
        }
        score as usize
    }

    /// 整条查询对整条参考的编辑距离
    pub fn global_distance(&self, reference: &PackedSequence) -> usize {
        self.run(reference, Boundary::Global, |_, _| {})
    }

    /// 查询完整出现在参考某处的最小编辑距离及其结束位置；并列时取最早的
    pub fn semi_global(&self, reference: &PackedSequence) -> Option<MyersHit> {
        let mut best = None;
        self.run(reference, Boundary::QueryAnchored, |end, diff| keep_first_best(&mut best, end, diff));
        best
    }

    /// `semi_global` 并要求 diff <= k
    pub fn search(&self, reference: &PackedSequence, k: usize) -> Option<MyersHit> {
        self.semi_global(reference).filter(|h| h.diff <= k)
    }

    /// 局部模式：查询的某个后缀匹配参考中以 `end` 结尾的一段
    pub fn suffix_search(&self, reference: &PackedSequence, k: usize) -> Option<MyersHit> {
        let mut best = None;
        self.run(reference, Boundary::Suffix, |end, diff| keep_first_best(&mut best, end, diff));
        best.filter(|h| h.diff <= k)
    }
}

/// 只有严格更优时才替换，保留最早的最优列
#[inline]
fn keep_first_best(best: &mut Option<MyersHit>, end: usize, diff: usize) {
    if best.map_or(true, |b| diff < b.diff) {
        *best = Some(MyersHit { end, diff });
    }
}

/// 活动块带在一列结束后的调整
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BandStep {
    /// 下一块可能出现 <= k 的值，激活一块
    Grow,
    /// 末尾若干块的值都 > k，收缩到给定块数
    Shrink(usize),
    Hold,
}

/// 分块 Myers：查询长度不受字长限制，只报告 diff <= k 的命中
#[derive(Debug, Clone)]
pub struct BlockAligner {
    w: usize,
    m: usize,
    k: usize,
    /// peq[c][r]：第 r 块的 Peq 字
    peq: [Vec<u64>; SIGMA],
    /// 每块的行数，只有最后一块可能不足 w
    heights: Vec<usize>,
}

impl BlockAligner {
    pub fn new(mask: &QueryMask, k: usize) -> Self {
        Self::with_word_size(mask, k, WORD_BITS)
    }

    pub fn with_word_size(mask: &QueryMask, k: usize, w: usize) -> Self {
        let m = mask.len();
        assert!((1..=WORD_BITS).contains(&w), "block width must be in 1..={}", WORD_BITS);
        assert!(m > 0, "block aligner needs a non-empty query");
        let b_max = (m + w - 1) / w;
        let heights = (0..b_max).map(|r| w.min(m - r * w)).collect();
        let peq = std::array::from_fn(|c| (0..b_max).map(|r| mask.word(Base::ALL[c], r, w)).collect());
        Self { w, m, k, peq, heights }
    }

    #[inline]
    pub fn query_len(&self) -> usize {
        self.m
    }

    #[inline]
    pub fn block_count(&self) -> usize {
        self.heights.len()
    }

    #[inline]
    pub fn max_diff(&self) -> usize {
        self.k
    }

    /// 查询完整对齐到参考某一段，返回最早出现的最小 diff（<= k）
    pub fn align(&self, reference: &PackedSequence) -> Option<MyersHit> {
        let b_max = self.block_count();
        let k = self.k as isize;

        let mut vp = vec![!0u64; b_max];
        let mut vn = vec![0u64; b_max];
        // 每块最后一行的值，初始列为行号本身
        let mut score: Vec<isize> = (0..b_max).map(|r| (r * self.w + self.heights[r]) as isize).collect();
        let mut b = ((self.k + self.w - 1) / self.w).clamp(1, b_max);
        let mut best: Option<MyersHit> = None;

        for (j, c) in reference.iter().enumerate() {
            let mut carry = 0i32;
            for r in 0..b {
                carry = self.advance_block(r, c, carry, &mut vp[r], &mut vn[r]);
                score[r] += carry as isize;
            }

            match self.band_step(b, c, carry, &score) {
                BandStep::Grow => {
                    vp[b] = !0;
                    vn[b] = 0;
                    let hout = self.advance_block(b, c, carry, &mut vp[b], &mut vn[b]);
                    score[b] = score[b - 1] - carry as isize + self.heights[b] as isize + hout as isize;
                    b += 1;
                    trace!("myers: column {} grows band to {} blocks", j, b);
                }
                BandStep::Shrink(nb) => {
                    trace!("myers: column {} shrinks band to {} blocks", j, nb);
                    b = nb;
                }
                BandStep::Hold => {}
            }

            if b == b_max && score[b_max - 1] <= k {
                keep_first_best(&mut best, j, score[b_max - 1] as usize);
            }
        }
        best
    }

    fn band_step(&self, b: usize, c: Base, carry: i32, score: &[isize]) -> BandStep {
        let k = self.k as isize;
        // 下一块首行只能由对角匹配或上方减一的水平差值降到 k 以内
        if b < self.block_count()
            && score[b - 1] - carry as isize <= k
            && (self.peq[c.code() as usize][b] & 1 != 0 || carry < 0)
        {
            return BandStep::Grow;
        }
        let mut nb = b;
        while nb > 1 && score[nb - 1] >= k + self.w as isize {
            nb -= 1;
        }
        if nb < b {
            BandStep::Shrink(nb)
        } else {
            BandStep::Hold
        }
    }

    /// 推进第 r 块一列，返回该块最后一行的水平差值
    fn advance_block(&self, r: usize, c: Base, hin: i32, vp: &mut u64, vn: &mut u64) -> i32 {
        let high = 1u64 << (self.heights[r] - 1);
        let mut eq = self.peq[c.code() as usize][r];
        if hin < 0 {
            eq |= 1;
        }
        let (pv, mv) = (*vp, *vn);
        let d0 = ((pv.wrapping_add(eq & pv)) ^ pv) | eq | mv;
        let hp = mv | !(pv | d0);
        let hn = pv & d0;

        let hout = if hp & high != 0 {
            1
        } else if hn & high != 0 {
            -1
        } else {
            0
        };

        let mut hp2 = hp << 1;
        let mut hn2 = hn << 1;
        if hin < 0 {
            hn2 |= 1;
        } else if hin > 0 {
            hp2 |= 1;
        }
        *vp = hn2 | !(hp2 | d0);
        *vn = hp2 & d0;
        hout
    }
}
