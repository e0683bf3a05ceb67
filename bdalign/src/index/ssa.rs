use log::debug;
use serde::{Deserialize, Serialize};

use super::bitvec::{BitVector, RankSelectBitVector};
use super::fm::FmIndex;
use crate::error::{IndexError, Result};

/// 稀疏后缀数组：只保存文本位置为 `step` 倍数（以及 `$` 本身）的 SA 项。
///
/// 未采样的下标通过 suffix link 逐步回退到采样点，再加上回退步数。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SparseSuffixArray {
    /// 第 i 位为 1 表示 SA[i] 被采样
    sampled: RankSelectBitVector,
    /// 按 SA 下标顺序排列的采样值
    samples: Vec<u32>,
    step: usize,
}

impl SparseSuffixArray {
    /// 沿 LF 映射遍历整条 BWT 构建，不需要完整 SA
    pub fn from_index<F: FmIndex + ?Sized>(fm: &F, step: usize) -> Result<Self> {
        if step == 0 {
            return Err(IndexError::Construction("sparse suffix array step must be positive".into()));
        }
        let size = fm.text_size();
        let n = size - 1;
        let mut marks = BitVector::new(size);
        let mut picked: Vec<(usize, u32)> = Vec::with_capacity(size / step + 2);

        // SA[0] = n（`$` 后缀），每走一步文本位置减一
        let mut i = 0usize;
        let mut pos = n;
        loop {
            if pos % step == 0 || pos == n {
                marks.set(i);
                picked.push((i, pos as u32));
            }
            if pos == 0 {
                break;
            }
            i = fm.suffix_link(i);
            pos -= 1;
        }
        picked.sort_unstable_by_key(|&(i, _)| i);
        debug!("sparse suffix array: {} of {} entries sampled (step {})", picked.len(), size, step);

        Ok(Self {
            sampled: marks.into(),
            samples: picked.into_iter().map(|(_, p)| p).collect(),
            step,
        })
    }

    /// 由完整后缀数组直接抽样
    pub fn from_suffix_array(sa: &[u32], step: usize) -> Result<Self> {
        if step == 0 {
            return Err(IndexError::Construction("sparse suffix array step must be positive".into()));
        }
        let n = sa.len().saturating_sub(1);
        let mut marks = BitVector::new(sa.len());
        let mut samples = Vec::with_capacity(sa.len() / step + 2);
        for (i, &p) in sa.iter().enumerate() {
            let p = p as usize;
            if p % step == 0 || p == n {
                marks.set(i);
                samples.push(p as u32);
            }
        }
        Ok(Self { sampled: marks.into(), samples, step })
    }

    #[inline]
    pub fn step(&self) -> usize {
        self.step
    }

    pub fn len(&self) -> usize {
        self.sampled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sampled.is_empty()
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// SA[i]：最多 `step - 1` 次 suffix link
    pub fn locate<F: FmIndex + ?Sized>(&self, fm: &F, i: usize) -> usize {
        assert_eq!(fm.text_size(), self.len(), "sparse suffix array built for another index");
        let mut i = i;
        let mut hops = 0usize;
        while !self.sampled.get(i) {
            i = fm.suffix_link(i);
            hops += 1;
        }
        self.samples[self.sampled.rank(true, i)] as usize + hops
    }
}
