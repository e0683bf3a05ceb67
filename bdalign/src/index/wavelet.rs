use serde::{Deserialize, Serialize};

use super::bitvec::{BitVector, RankSelectBitVector};
use super::SymbolSequence;

/// ceil(log2(k))，k <= 1 时为 0
pub fn log2_ceil(k: usize) -> usize {
    if k <= 1 {
        return 0;
    }
    (usize::BITS - (k - 1).leading_zeros()) as usize
}

/// 一次 rank 查询的完整结果：等于 / 小于 / 大于 c 的符号数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rank {
    pub rank: usize,
    pub less_than: usize,
    pub greater_than: usize,
}

/// Wavelet array：按层存储的 wavelet tree。
///
/// 第 j 层记录每个符号编码的第 j 个最高位；同一层内，位置按编码前 j 位
/// 稳定排序，因此前缀 p 的结点在该层上占据一段连续区间。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaveletArray {
    levels: Vec<RankSelectBitVector>,
    /// 每个符号的出现次数以 `1 0^count` 的形式依次记录，末尾再补一个 1
    occ: RankSelectBitVector,
    alphabet_size: usize,
    size: usize,
}

impl WaveletArray {
    pub fn new<S: SymbolSequence + ?Sized>(input: &S, alphabet_size: usize) -> Self {
        let bit_size = log2_ceil(alphabet_size);
        let size = input.text_size();

        // beg_pos[j][p]：第 j 层中前缀 p 结点的下一个写入位置
        let mut beg_pos: Vec<Vec<usize>> = (0..bit_size).map(|j| vec![0usize; 1 << j]).collect();
        let mut counts = vec![0usize; alphabet_size];
        for i in 0..size {
            let c = input.symbol(i) as usize;
            assert!(c < alphabet_size, "symbol {} at {} exceeds alphabet size {}", c, i, alphabet_size);
            counts[c] += 1;
            for (j, level) in beg_pos.iter_mut().enumerate() {
                level[c >> (bit_size - j)] += 1;
            }
        }
        for level in beg_pos.iter_mut() {
            let mut sum = 0;
            for v in level.iter_mut() {
                let n = *v;
                *v = sum;
                sum += n;
            }
        }

        let mut bits: Vec<BitVector> = (0..bit_size).map(|_| BitVector::new(size)).collect();
        for i in 0..size {
            let c = input.symbol(i) as usize;
            for j in 0..bit_size {
                let slot = &mut beg_pos[j][c >> (bit_size - j)];
                if (c >> (bit_size - j - 1)) & 1 == 1 {
                    bits[j].set(*slot);
                }
                *slot += 1;
            }
        }

        let mut occ = BitVector::new(size + alphabet_size + 1);
        let mut sum = 0;
        for &n in &counts {
            occ.set(sum);
            sum += n + 1;
        }
        occ.set(sum);

        Self {
            levels: bits.into_iter().map(RankSelectBitVector::from).collect(),
            occ: occ.into(),
            alphabet_size,
            size,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    #[inline]
    pub fn alphabet_size(&self) -> usize {
        self.alphabet_size
    }

    /// 符号 c 在整个序列中的出现次数（由 occ 分隔向量的两次 select 得到）
    pub fn total(&self, c: usize) -> usize {
        if c >= self.alphabet_size {
            return 0;
        }
        // 分隔位的数量固定为 alphabet_size + 1，select 不会下溢
        let begin = self.occ.select(true, c + 1).unwrap_or(0);
        let end = self.occ.select(true, c + 2).unwrap_or(begin + 1);
        end - begin - 1
    }

    /// [0, pos) 中 c 的个数
    #[inline]
    pub fn rank(&self, c: usize, pos: usize) -> usize {
        self.rank_all(c, pos).rank
    }

    /// 沿 c 的基数路径逐层下降，顺带统计小于 / 大于 c 的符号数
    pub fn rank_all(&self, c: usize, pos: usize) -> Rank {
        assert!(pos <= self.size, "rank position {} out of range {}", pos, self.size);
        if c >= self.alphabet_size {
            return Rank { rank: 0, less_than: pos, greater_than: 0 };
        }
        let depth = self.levels.len();
        let mut pos = pos;
        let mut beg = 0usize;
        let mut end = self.size;
        let mut less_than = 0usize;
        let mut greater_than = 0usize;

        for (i, level) in self.levels.iter().enumerate() {
            if beg >= end {
                break;
            }
            let beg_zero = level.rank(false, beg);
            let beg_one = beg - beg_zero;
            let end_zero = level.rank(false, end);
            let boundary = beg + end_zero - beg_zero;
            if (c >> (depth - i - 1)) & 1 == 0 {
                greater_than += level.rank(true, pos) - beg_one;
                pos = beg + level.rank(false, pos) - beg_zero;
                end = boundary;
            } else {
                less_than += level.rank(false, pos) - beg_zero;
                pos = boundary + level.rank(true, pos) - beg_one;
                beg = boundary;
            }
        }
        Rank { rank: pos.saturating_sub(beg), less_than, greater_than }
    }

    /// 还原第 i 个符号
    pub fn lookup(&self, i: usize) -> usize {
        assert!(i < self.size, "index {} out of range {}", i, self.size);
        let mut pos = i;
        let mut beg = 0usize;
        let mut end = self.size;
        let mut c = 0usize;
        for level in &self.levels {
            let beg_zero = level.rank(false, beg);
            let end_zero = level.rank(false, end);
            let boundary = beg + end_zero - beg_zero;
            if level.get(pos) {
                pos = boundary + level.rank(true, pos) - (beg - beg_zero);
                beg = boundary;
                c = (c << 1) | 1;
            } else {
                pos = beg + level.rank(false, pos) - beg_zero;
                end = boundary;
                c <<= 1;
            }
        }
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn log2_rounds_up() {
        assert_eq!(log2_ceil(0), 0);
        assert_eq!(log2_ceil(1), 0);
        assert_eq!(log2_ceil(2), 1);
        assert_eq!(log2_ceil(4), 2);
        assert_eq!(log2_ceil(5), 3);
        assert_eq!(log2_ceil(8), 3);
        assert_eq!(log2_ceil(9), 4);
    }

    #[test]
    fn rank_matches_naive_for_various_alphabets() {
        let mut rng = StdRng::seed_from_u64(7);
        for k in [1usize, 2, 3, 5, 8, 11] {
            let text: Vec<u8> = (0..300).map(|_| rng.gen_range(0..k) as u8).collect();
            let wv = WaveletArray::new(&text[..], k);
            for c in 0..k {
                let mut naive = 0;
                let mut less = 0;
                let mut greater = 0;
                for pos in 0..=text.len() {
                    let r = wv.rank_all(c, pos);
                    assert_eq!(r.rank, naive, "k={} c={} pos={}", k, c, pos);
                    assert_eq!(r.less_than, less, "k={} c={} pos={}", k, c, pos);
                    assert_eq!(r.greater_than, greater, "k={} c={} pos={}", k, c, pos);
                    if pos < text.len() {
                        let s = text[pos] as usize;
                        if s == c {
                            naive += 1;
                        } else if s < c {
                            less += 1;
                        } else {
                            greater += 1;
                        }
                    }
                }
                assert_eq!(wv.total(c), naive);
            }
            for (i, &s) in text.iter().enumerate() {
                assert_eq!(wv.lookup(i), s as usize);
            }
        }
    }

    #[test]
    fn symbols_outside_alphabet_have_zero_rank() {
        let text = [0u8, 1, 2, 1, 0];
        let wv = WaveletArray::new(&text[..], 3);
        assert_eq!(wv.rank(3, 5), 0);
        assert_eq!(wv.total(7), 0);
        assert_eq!(wv.rank(1, 5), 2);
    }

    #[test]
    fn empty_input() {
        let wv = WaveletArray::new(&[0u8; 0][..], 5);
        assert!(wv.is_empty());
        assert_eq!(wv.rank(2, 0), 0);
        assert_eq!(wv.total(2), 0);
    }
}
