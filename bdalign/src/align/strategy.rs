//! 双向搜索：同时维护正向索引与反向文本索引上的区间，
//! 从查询中点出发，先扩展精确区间较窄的一半，再扩展另一半，
//! 每一步由前缀匹配自动机判断分支是否还有希望。

use std::collections::HashMap;
use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use super::filter::{QueryMask, SearchState, SuffixFilter};
use crate::index::{FmIndex, PackedSequence, SparseSuffixArray, SuffixInterval};
use crate::util::dna::Base;

/// read 的比对方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    /// SAM FLAG 中的反向互补位
    pub fn sam_flag(self) -> u16 {
        match self {
            Strand::Forward => 0,
            Strand::Reverse => 16,
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strand::Forward => "F",
            Strand::Reverse => "R",
        })
    }
}

/// 最近一次扩展的方向，决定用哪个索引把区间换算成文本位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }
}

/// 同一个模式串 P 在正向索引（文本 T）与反向索引（文本 rev(T)）上的区间
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BiInterval {
    pub forward: SuffixInterval,
    pub reverse: SuffixInterval,
}

impl BiInterval {
    /// 空模式串对应两个索引的全区间
    pub fn full<F: FmIndex + ?Sized>(forward: &F, reverse: &F) -> Self {
        Self { forward: forward.full_interval(), reverse: reverse.full_interval() }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.forward.size()
    }

    /// P -> cP：正向索引做一步后向搜索，反向区间按 BWT 中小于 c 的符号数平移
    pub fn extend_left<F: FmIndex + ?Sized>(&self, c: Base, forward: &F) -> Option<Self> {
        let f = forward.backward_search(c, self.forward);
        if f.is_empty() {
            return None;
        }
        let lower = self.reverse.lower + forward.count_less_than(c, self.forward);
        Some(Self { forward: f, reverse: SuffixInterval::new(lower, lower + f.size() - 1) })
    }

    /// P -> Pc：对称地在反向索引上搜索
    pub fn extend_right<F: FmIndex + ?Sized>(&self, c: Base, reverse: &F) -> Option<Self> {
        let r = reverse.backward_search(c, self.reverse);
        if r.is_empty() {
            return None;
        }
        let lower = self.forward.lower + reverse.count_less_than(c, self.reverse);
        Some(Self { forward: SuffixInterval::new(lower, lower + r.size() - 1), reverse: r })
    }
}

/// 一个搜索分支的终点：参考上长度为 `ref_len` 的一段，与查询相差至多 `k`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub strand: Strand,
    pub interval: BiInterval,
    /// 累计错误数
    pub k: usize,
    /// 查询的切分点
    pub offset: usize,
    pub ref_len: usize,
    pub last: Direction,
}

impl Candidate {
    /// 最后一次扩展所在索引上的区间
    pub fn si(&self) -> SuffixInterval {
        match self.last {
            Direction::Left => self.interval.forward,
            Direction::Right => self.interval.reverse,
        }
    }

    /// 候选在正向文本上的起始位置
    pub fn text_positions<F: FmIndex + ?Sized>(
        &self,
        forward: &F,
        forward_ssa: &SparseSuffixArray,
        reverse: &F,
        reverse_ssa: &SparseSuffixArray,
    ) -> Vec<usize> {
        let si = self.si();
        match self.last {
            Direction::Left => si.indices().map(|i| forward_ssa.locate(forward, i)).collect(),
            Direction::Right => {
                // rev(P) 在 rev(T) 的 p' 处出现，即 P 在 T 的 n - p' - |P| 处
                let n = reverse.text_size() - 1;
                si.indices()
                    .map(|i| n - reverse_ssa.locate(reverse, i) - self.ref_len)
                    .collect()
            }
        }
    }
}

struct Frame {
    bi: BiInterval,
    state: SearchState,
    ref_len: usize,
    last: Direction,
}

/// 在正向 / 反向两个 FM 索引上做至多 k 个错误的双向搜索
pub struct BidirectionalSearch<'a, F: FmIndex + ?Sized> {
    forward: &'a F,
    reverse: &'a F,
    k: usize,
}

impl<'a, F: FmIndex + ?Sized> BidirectionalSearch<'a, F> {
    pub fn new(forward: &'a F, reverse: &'a F, k: usize) -> Self {
        assert_eq!(forward.text_size(), reverse.text_size(), "forward and reverse indexes differ in size");
        Self { forward, reverse, k }
    }

    #[inline]
    pub fn max_errors(&self) -> usize {
        self.k
    }

    /// 搜索 read 及其反向互补序列
    pub fn search<S: FnMut(Candidate)>(&self, read: &PackedSequence, sink: &mut S) {
        self.search_strand(read, Strand::Forward, sink);
        self.search_strand(&read.reverse_complement(), Strand::Reverse, sink);
    }

    /// 以 m / 2 为切分点，先搜索精确区间较窄的一半（相同时先向右），
    /// 命中后以剩余错误额度向另一侧扩展。同一区间只报告错误数最少的一次。
    pub fn search_strand<S: FnMut(Candidate)>(&self, query: &PackedSequence, strand: Strand, sink: &mut S) {
        let m = query.len();
        if m == 0 {
            return;
        }
        let s = m / 2;
        let (right_mask, left_mask) = QueryMask::with_offset(query, s).split_at(m - s);
        let first_dir = self.start_direction(query);
        let (first_mask, second_mask) = match first_dir {
            Direction::Right => (right_mask, left_mask),
            Direction::Left => (left_mask, right_mask),
        };
        let first = SuffixFilter::from_mask(first_mask, self.k);
        let second: Vec<SuffixFilter> = (0..=self.k)
            .map(|budget| SuffixFilter::from_mask(second_mask.clone(), budget))
            .collect();

        let mut found: HashMap<SuffixInterval, Candidate> = HashMap::new();
        let mut stack = vec![Frame {
            bi: BiInterval::full(self.forward, self.reverse),
            state: first.initial_state(),
            ref_len: 0,
            last: first_dir,
        }];
        while let Some(frame) = stack.pop() {
            if let Some(level) = frame.state.matched() {
                let phase = Phase {
                    filter: &second[self.k - level],
                    dir: first_dir.opposite(),
                    used: level,
                    strand,
                    offset: s,
                };
                self.extend_second_part(&phase, &frame, &mut found);
                // 更低的层已经不可能出现，继续扩展只会得到更差的匹配
                if frame.state.min_level() >= level {
                    continue;
                }
            }
            for c in Base::ACGT {
                let Some(bi) = self.extend(&frame.bi, c, first_dir) else {
                    continue;
                };
                if let Some(state) = first.next_state(&frame.state, c) {
                    stack.push(Frame { bi, state, ref_len: frame.ref_len + 1, last: first_dir });
                }
            }
        }

        debug!(
            "{} strand: {} candidate intervals within {} errors, {:?} half first",
            strand,
            found.len(),
            self.k,
            first_dir
        );
        let mut candidates: Vec<Candidate> = found.into_values().collect();
        candidates.sort_unstable_by_key(|c| (c.k, c.interval.forward.lower));
        for c in candidates {
            sink(c);
        }
    }

    /// 比较两半在索引中的精确匹配区间，返回区间更窄一侧的扩展方向。
    /// 每一半从切分点向外读，遇到 N 即停止。
    pub fn start_direction(&self, query: &PackedSequence) -> Direction {
        let m = query.len();
        let s = m / 2;
        let left = exact_width(self.forward, (0..s).rev().map(|i| query.lookup(i)));
        let right = exact_width(self.reverse, (s..m).map(|i| query.lookup(i)));
        if left < right {
            Direction::Left
        } else {
            Direction::Right
        }
    }

    #[inline]
    fn extend(&self, bi: &BiInterval, c: Base, dir: Direction) -> Option<BiInterval> {
        match dir {
            Direction::Left => bi.extend_left(c, self.forward),
            Direction::Right => bi.extend_right(c, self.reverse),
        }
    }

    fn extend_second_part(&self, phase: &Phase<'_>, start: &Frame, found: &mut HashMap<SuffixInterval, Candidate>) {
        let mut stack = vec![Frame {
            bi: start.bi,
            state: phase.filter.initial_state(),
            ref_len: start.ref_len,
            last: start.last,
        }];
        while let Some(frame) = stack.pop() {
            if let Some(level) = frame.state.matched() {
                if frame.ref_len > 0 {
                    let cand = Candidate {
                        strand: phase.strand,
                        interval: frame.bi,
                        k: phase.used + level,
                        offset: phase.offset,
                        ref_len: frame.ref_len,
                        last: frame.last,
                    };
                    found
                        .entry(cand.interval.forward)
                        .and_modify(|prev| {
                            if cand.k < prev.k {
                                *prev = cand;
                            }
                        })
                        .or_insert(cand);
                }
                if frame.state.min_level() >= level {
                    continue;
                }
            }
            for c in Base::ACGT {
                let Some(bi) = self.extend(&frame.bi, c, phase.dir) else {
                    continue;
                };
                if let Some(state) = phase.filter.next_state(&frame.state, c) {
                    stack.push(Frame { bi, state, ref_len: frame.ref_len + 1, last: phase.dir });
                }
            }
        }
    }
}

/// 第二阶段的参数：剩余额度的自动机、扩展方向与第一阶段已用的错误数
struct Phase<'f> {
    filter: &'f SuffixFilter,
    dir: Direction,
    used: usize,
    strand: Strand,
    offset: usize,
}

/// 依次做后向搜索，返回停止时的区间大小；区间为空时返回 0
fn exact_width<F: FmIndex + ?Sized>(index: &F, bases: impl Iterator<Item = Base>) -> usize {
    let mut si = index.full_interval();
    for c in bases {
        if c == Base::N {
            break;
        }
        si = index.backward_search(c, si);
        if si.is_empty() {
            return 0;
        }
    }
    si.size()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::WaveletFmIndex;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    struct Fixture {
        text: PackedSequence,
        fwd: WaveletFmIndex,
        rev: WaveletFmIndex,
        fwd_ssa: SparseSuffixArray,
        rev_ssa: SparseSuffixArray,
    }

    fn fixture(text: PackedSequence) -> Fixture {
        let fwd = WaveletFmIndex::from_text(&text);
        let rev = WaveletFmIndex::from_text(&text.reverse());
        let fwd_ssa = SparseSuffixArray::from_index(&fwd, 4).unwrap();
        let rev_ssa = SparseSuffixArray::from_index(&rev, 4).unwrap();
        Fixture { text, fwd, rev, fwd_ssa, rev_ssa }
    }

    fn random_text(rng: &mut StdRng, n: usize) -> PackedSequence {
        (0..n).map(|_| Base::ACGT[rng.gen_range(0..4)]).collect()
    }

    fn edit(a: &PackedSequence, b: &PackedSequence) -> usize {
        let a: Vec<Base> = a.iter().collect();
        let b: Vec<Base> = b.iter().collect();
        let mut prev: Vec<usize> = (0..=a.len()).collect();
        for (j, &rc) in b.iter().enumerate() {
            let mut cur = vec![j + 1; a.len() + 1];
            for i in 1..=a.len() {
                let same = rc != Base::N && (a[i - 1] == Base::N || a[i - 1] == rc);
                cur[i] = (prev[i - 1] + usize::from(!same)).min(prev[i] + 1).min(cur[i - 1] + 1);
            }
            prev = cur;
        }
        prev[a.len()]
    }

    fn collect(fx: &Fixture, read: &PackedSequence, k: usize) -> Vec<Candidate> {
        let search = BidirectionalSearch::new(&fx.fwd, &fx.rev, k);
        let mut out = Vec::new();
        search.search(read, &mut |c| out.push(c));
        out
    }

    #[test]
    fn bi_interval_tracks_both_indexes() {
        let mut rng = StdRng::seed_from_u64(5);
        let fx = fixture(random_text(&mut rng, 300));
        for _ in 0..50 {
            let mut bi = BiInterval::full(&fx.fwd, &fx.rev);
            let mut pattern: Vec<Base> = Vec::new();
            for _ in 0..8 {
                let c = Base::ACGT[rng.gen_range(0..4)];
                let next = if rng.gen_bool(0.5) {
                    bi.extend_left(c, &fx.fwd).map(|b| (b, true))
                } else {
                    bi.extend_right(c, &fx.rev).map(|b| (b, false))
                };
                let Some((b, left)) = next else { break };
                if left {
                    pattern.insert(0, c);
                } else {
                    pattern.push(c);
                }
                bi = b;
                let p: PackedSequence = pattern.iter().copied().collect();
                assert_eq!(bi.forward, fx.fwd.search(&p));
                assert_eq!(bi.reverse, fx.rev.search(&p.reverse()));
            }
        }
    }

    #[test]
    fn finds_planted_reads_on_both_strands() {
        let mut rng = StdRng::seed_from_u64(42);
        let fx = fixture(random_text(&mut rng, 600));
        for (pos, strand) in [(37usize, Strand::Forward), (250, Strand::Reverse), (500, Strand::Forward)] {
            let piece = fx.text.sub_sequence(pos, pos + 30);
            let mut bases: Vec<Base> = piece.iter().collect();
            bases[7] = Base::from_code((bases[7].code() + 1) % 4).unwrap();
            let mut read: PackedSequence = bases.into_iter().collect();
            if strand == Strand::Reverse {
                read = read.reverse_complement();
            }

            let cands = collect(&fx, &read, 2);
            let hit = cands.iter().any(|c| {
                c.strand == strand
                    && c.text_positions(&fx.fwd, &fx.fwd_ssa, &fx.rev, &fx.rev_ssa)
                        .into_iter()
                        .any(|p| p.abs_diff(pos) <= 2)
            });
            assert!(hit, "planted read at {} ({}) not found", pos, strand);
        }
    }

    #[test]
    fn candidates_respect_error_bound() {
        let mut rng = StdRng::seed_from_u64(77);
        let fx = fixture(random_text(&mut rng, 400));
        for _ in 0..10 {
            let pos = rng.gen_range(0..380);
            let mut bases: Vec<Base> = fx.text.sub_sequence(pos, pos + 16).iter().collect();
            let p = rng.gen_range(0..16);
            bases[p] = Base::ACGT[rng.gen_range(0..4)];
            let read: PackedSequence = bases.into_iter().collect();

            for c in collect(&fx, &read, 2) {
                assert!(c.k <= 2);
                let query = match c.strand {
                    Strand::Forward => read.clone(),
                    Strand::Reverse => read.reverse_complement(),
                };
                for start in c.text_positions(&fx.fwd, &fx.fwd_ssa, &fx.rev, &fx.rev_ssa) {
                    let piece = fx.text.sub_sequence(start, start + c.ref_len);
                    assert!(edit(&query, &piece) <= c.k, "candidate at {} claims {} errors", start, c.k);
                }
            }
        }
    }

    #[test]
    fn exact_search_with_zero_errors() {
        let fx = fixture(PackedSequence::from_ascii(b"GATTACAGATTA").unwrap());
        let read = PackedSequence::from_ascii(b"GATTA").unwrap();
        let cands: Vec<Candidate> = collect(&fx, &read, 0)
            .into_iter()
            .filter(|c| c.strand == Strand::Forward)
            .collect();
        assert_eq!(cands.len(), 1);
        assert_eq!(cands[0].interval.forward, SuffixInterval::new(7, 8));
        let mut pos = cands[0].text_positions(&fx.fwd, &fx.fwd_ssa, &fx.rev, &fx.rev_ssa);
        pos.sort_unstable();
        assert_eq!(pos, vec![0, 7]);
    }

    fn forward_hits(fx: &Fixture, read: &PackedSequence, k: usize) -> Vec<(usize, Candidate)> {
        let search = BidirectionalSearch::new(&fx.fwd, &fx.rev, k);
        let mut out = Vec::new();
        search.search_strand(read, Strand::Forward, &mut |c| {
            for p in c.text_positions(&fx.fwd, &fx.fwd_ssa, &fx.rev, &fx.rev_ssa) {
                out.push((p, c));
            }
        });
        for (start, c) in &out {
            let piece = fx.text.sub_sequence(*start, start + c.ref_len);
            assert!(edit(read, &piece) <= c.k, "candidate at {} claims {} errors", start, c.k);
        }
        out
    }

    #[test]
    fn starts_from_the_rarer_half() {
        // 八个碱基的重复单元出现十几次，另一半是唯一序列
        let mut rng = StdRng::seed_from_u64(314);
        let motif = PackedSequence::from_ascii(b"GATTACAG").unwrap();
        let mut bases: Vec<Base> = Vec::new();
        for _ in 0..12 {
            bases.extend(random_text(&mut rng, 20).iter());
            bases.extend(motif.iter());
        }
        let repeat_left = bases.len();
        bases.extend(motif.iter());
        bases.extend(random_text(&mut rng, 8).iter());
        bases.extend(random_text(&mut rng, 30).iter());
        let repeat_right = bases.len();
        bases.extend(random_text(&mut rng, 8).iter());
        bases.extend(motif.iter());
        bases.extend(random_text(&mut rng, 30).iter());
        let fx = fixture(bases.into_iter().collect());
        let search = BidirectionalSearch::new(&fx.fwd, &fx.rev, 1);

        for (pos, dir) in [(repeat_left, Direction::Right), (repeat_right, Direction::Left)] {
            let read = fx.text.sub_sequence(pos, pos + 16);
            assert_eq!(search.start_direction(&read), dir, "read at {}", pos);

            let exact = forward_hits(&fx, &read, 1);
            assert!(exact.iter().any(|&(p, c)| p == pos && c.k == 0), "exact read at {} lost", pos);

            // 在唯一的一半里做一次替换，该半的精确区间变空，起始方向不变
            let mut mutated: Vec<Base> = read.iter().collect();
            let at = if dir == Direction::Right { 12 } else { 3 };
            mutated[at] = Base::from_code((mutated[at].code() + 1) % 4).unwrap();
            let mutated: PackedSequence = mutated.into_iter().collect();
            assert_eq!(search.start_direction(&mutated), dir);
            let hits = forward_hits(&fx, &mutated, 1);
            assert!(hits.iter().any(|&(p, c)| p == pos && c.k == 1), "mutated read at {} lost", pos);
        }
    }

    #[test]
    fn halves_no_longer_than_the_budget() {
        let mut rng = StdRng::seed_from_u64(11);
        let fx = fixture(random_text(&mut rng, 200));

        // m = 4，k = 2：两半都只有两个碱基
        let read = fx.text.sub_sequence(60, 64);
        let hits = forward_hits(&fx, &read, 2);
        assert!(hits.iter().any(|&(p, c)| p == 60 && c.k == 0));
        assert!(hits.iter().all(|&(_, c)| c.k <= 2 && c.ref_len > 0));

        // m = 5，k = 3，带一个替换
        let mut bases: Vec<Base> = fx.text.sub_sequence(120, 125).iter().collect();
        bases[1] = Base::from_code((bases[1].code() + 2) % 4).unwrap();
        let read: PackedSequence = bases.into_iter().collect();
        let hits = forward_hits(&fx, &read, 3);
        assert!(hits.iter().any(|&(p, c)| p.abs_diff(120) <= 1 && c.k <= 1));

        // 单个碱基，k 大于查询长度
        let read = fx.text.sub_sequence(10, 11);
        let hits = forward_hits(&fx, &read, 2);
        assert!(hits.iter().any(|&(p, c)| p == 10 && c.k == 0));
        assert!(hits.iter().all(|&(_, c)| c.ref_len <= 3));
    }
}
