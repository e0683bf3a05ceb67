use super::packed::PackedSequence;
use crate::util::dna::Base;

/// BWT 串。`$` 所在位置单独记录，打包序列中该位置以 A 占位。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bwt {
    pub symbols: PackedSequence,
    pub dollar: usize,
}

impl Bwt {
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// 根据后缀数组构建 BWT：BWT[i] = T[SA[i] - 1]，SA[i] = 0 时为 `$`。
pub fn build_bwt(text: &PackedSequence, sa: &[u32]) -> Bwt {
    debug_assert_eq!(sa.len(), text.len() + 1);
    let mut symbols = PackedSequence::with_capacity(sa.len());
    let mut dollar = 0;
    for (i, &p) in sa.iter().enumerate() {
        if p == 0 {
            dollar = i;
            symbols.append(Base::A);
        } else {
            symbols.append(text.lookup(p as usize - 1));
        }
    }
    Bwt { symbols, dollar }
}
