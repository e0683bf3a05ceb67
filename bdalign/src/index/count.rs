use serde::{Deserialize, Serialize};

use super::SymbolSequence;

/// FM 索引的 C 表：C(c) = 比 c 小的符号总数。
///
/// 若序列中含有哨兵 `$`（BWT 中的一个位置），它被视为最小的符号，
/// 不计入任何 c 的次数，但使每个 C(c) 加一。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterCount {
    /// smaller[c] = C(c)，长度为字母表大小 + 1，最后一项为总长度
    smaller: Vec<usize>,
}

impl CharacterCount {
    pub fn new<S: SymbolSequence + ?Sized>(seq: &S, alphabet_size: usize, sentinel: Option<usize>) -> Self {
        let mut freq = vec![0usize; alphabet_size];
        for i in 0..seq.text_size() {
            if Some(i) == sentinel {
                continue;
            }
            freq[seq.symbol(i) as usize] += 1;
        }
        let mut smaller = Vec::with_capacity(alphabet_size + 1);
        let mut acc = usize::from(sentinel.is_some());
        for n in freq {
            smaller.push(acc);
            acc += n;
        }
        smaller.push(acc);
        Self { smaller }
    }

    #[inline]
    pub fn count_smaller_than(&self, c: u8) -> usize {
        self.smaller[c as usize]
    }

    #[inline]
    pub fn count(&self, c: u8) -> usize {
        self.smaller[c as usize + 1] - self.smaller[c as usize]
    }

    pub fn alphabet_size(&self) -> usize {
        self.smaller.len() - 1
    }

    pub fn total(&self) -> usize {
        self.smaller[self.smaller.len() - 1]
    }
}
