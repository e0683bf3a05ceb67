//! 带阶梯掩码的 bit-parallel 近似前缀匹配自动机。
//!
//! 状态按错误层组织：第 i 层位向量的第 j 位表示查询前缀 q[..j]
//! 能以不超过 i 个编辑操作匹配当前已读入的参考串。位向量长度为 m + 1，
//! 第 m 位置位即整条查询匹配成功。

use log::trace;

use crate::index::{BitVector, PackedSequence};
use crate::util::dna::{Base, SIGMA};

/// 查询序列中每种碱基出现位置的位图。
///
/// 查询中的 N 是通配符，在四种碱基的位图中都置位；
/// 参考中的 N 对应空位图，不与任何查询位置匹配。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryMask {
    patterns: [BitVector; SIGMA],
    m: usize,
}

impl QueryMask {
    pub fn new(query: &PackedSequence) -> Self {
        Self::with_offset(query, 0)
    }

    /// 以 `offset` 为起点的虚拟查询：q[offset..] 后接 q[..offset] 的逆序。
    /// 双向搜索按切分点把它分成向右与向左两段。
    pub fn with_offset(query: &PackedSequence, offset: usize) -> Self {
        let m = query.len();
        assert!(offset <= m, "mask offset {} beyond query length {}", offset, m);
        let mut patterns: [BitVector; SIGMA] = std::array::from_fn(|_| BitVector::new(m));
        for i in 0..m {
            let mut index = offset + i;
            if index >= m {
                index = m - i - 1;
            }
            match query.lookup(index) {
                Base::N => {
                    for b in Base::ACGT {
                        patterns[b.code() as usize].set(i);
                    }
                }
                b => patterns[b.code() as usize].set(i),
            }
        }
        Self { patterns, m }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.m
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.m == 0
    }

    #[inline]
    pub fn pattern(&self, c: Base) -> &BitVector {
        &self.patterns[c.code() as usize]
    }

    /// 第 `block` 个宽度为 `w` 的块的 Peq 字，最后一块只取剩余位
    #[inline]
    pub fn word(&self, c: Base, block: usize, w: usize) -> u64 {
        let start = block * w;
        if start >= self.m {
            return 0;
        }
        self.pattern(c).extract(start, w.min(self.m - start))
    }

    /// 在虚拟查询的 `mid` 处切开，得到 [0, mid) 与 [mid, m) 两段掩码
    pub fn split_at(&self, mid: usize) -> (QueryMask, QueryMask) {
        assert!(mid <= self.m, "split point {} beyond query length {}", mid, self.m);
        let head = std::array::from_fn(|c| self.patterns[c].slice(0, mid));
        let tail = std::array::from_fn(|c| self.patterns[c].slice(mid, self.m));
        (
            QueryMask { patterns: head, m: mid },
            QueryMask { patterns: tail, m: self.m - mid },
        )
    }
}

/// 每个错误层的对角带掩码。
///
/// 读入 r 个参考字符后，第 i 层只可能在 |j - r| <= i 的前缀长度 j 上有状态，
/// 即位区间 [r - i, r + i] 与 [0, m] 的交集。
#[derive(Debug, Clone)]
pub struct StaircaseFilter {
    m: usize,
    k: usize,
}

impl StaircaseFilter {
    pub fn new(m: usize, k: usize) -> Self {
        Self { m, k }
    }

    pub fn query_len(&self) -> usize {
        self.m
    }

    pub fn max_level(&self) -> usize {
        self.k
    }

    /// 第 `level` 层在读入 `consumed` 个字符之后的掩码
    pub fn mask(&self, level: usize, consumed: usize) -> BitVector {
        let lo = consumed.saturating_sub(level);
        let hi = consumed.saturating_add(level).min(self.m);
        if lo > hi {
            return BitVector::new(self.m + 1);
        }
        let mut w = BitVector::ones(hi - lo + 1).resized(self.m + 1);
        w.lshift(lo);
        w
    }
}

/// 自动机的一个状态。转移总是生成新状态，旧状态可以被多个分支复用。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchState {
    levels: Vec<BitVector>,
    consumed: usize,
    /// 最低的非空层
    min_level: usize,
    /// 整条查询已匹配的最低层
    matched: Option<usize>,
}

impl SearchState {
    pub fn levels(&self) -> &[BitVector] {
        &self.levels
    }

    pub fn level(&self, i: usize) -> &BitVector {
        &self.levels[i]
    }

    /// 已读入的参考字符数
    #[inline]
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    #[inline]
    pub fn min_level(&self) -> usize {
        self.min_level
    }

    #[inline]
    pub fn matched(&self) -> Option<usize> {
        self.matched
    }

    #[inline]
    pub fn is_match(&self) -> bool {
        self.matched.is_some()
    }

    fn from_levels(levels: Vec<BitVector>, consumed: usize, m: usize) -> Self {
        let min_level = levels.iter().position(BitVector::any).unwrap_or(levels.len());
        let matched = levels.iter().position(|v| v.get(m));
        Self { levels, consumed, min_level, matched }
    }
}

/// 至多 k 个错误的前缀匹配自动机
#[derive(Debug, Clone)]
pub struct SuffixFilter {
    k: usize,
    m: usize,
    mask: QueryMask,
    staircase: StaircaseFilter,
    /// 扩展到 m + 1 位的 Peq，第 m 位恒为 0
    peq: [BitVector; SIGMA],
}

impl SuffixFilter {
    pub fn new(query: &PackedSequence, k: usize) -> Self {
        Self::from_mask(QueryMask::new(query), k)
    }

    pub fn from_mask(mask: QueryMask, k: usize) -> Self {
        let m = mask.len();
        let peq = std::array::from_fn(|c| mask.patterns[c].resized(m + 1));
        Self { k, m, staircase: StaircaseFilter::new(m, k), mask, peq }
    }

    #[inline]
    pub fn query_len(&self) -> usize {
        self.m
    }

    #[inline]
    pub fn max_errors(&self) -> usize {
        self.k
    }

    pub fn mask(&self) -> &QueryMask {
        &self.mask
    }

    /// 未读入任何字符：前缀 q[..j] 需要 j 次删除，因此第 i 层置位 0..=i
    pub fn initial_state(&self) -> SearchState {
        let levels = (0..=self.k)
            .map(|i| BitVector::ones((i + 1).min(self.m + 1)).resized(self.m + 1))
            .collect();
        SearchState::from_levels(levels, 0, self.m)
    }

    /// 读入参考字符 c。所有层都失活时返回 None（该分支无解），
    /// 否则返回新状态，`matched()` 给出整条查询匹配的最低错误层。
    pub fn next_state(&self, state: &SearchState, c: Base) -> Option<SearchState> {
        debug_assert_eq!(state.levels.len(), self.k + 1);
        let consumed = state.consumed + 1;
        let eq = &self.peq[c.code() as usize];

        let mut next: Vec<BitVector> = Vec::with_capacity(self.k + 1);
        for i in 0..=self.k {
            // 匹配：q[j] == c 时 j -> j + 1
            let mut v = state.levels[i].clone();
            v &= eq;
            v.lshift(1);
            if i > 0 {
                let below = &state.levels[i - 1];
                // 参考多出一个字符（插入）
                v |= below;
                // 替换
                let mut sub = below.clone();
                sub.lshift(1);
                v |= &sub;
                // 查询多出一个字符（删除）
                let mut del = next[i - 1].clone();
                del.lshift(1);
                v |= &del;
            }
            v &= &self.staircase.mask(i, consumed);
            next.push(v);
        }

        // 各层嵌套，最高层为空即全部为空
        if !next[self.k].any() {
            trace!("suffix filter: dead after {} characters", consumed);
            return None;
        }
        Some(SearchState::from_levels(next, consumed, self.m))
    }
}
