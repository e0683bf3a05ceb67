use bdalign::align::{BlockAligner, QueryMask, SuffixFilter, WordAligner};
use bdalign::index::{BitVector, FmIndex, PackedSequence, RankSelectBitVector, SparseSuffixArray, WaveletFmIndex};
use bdalign::util::dna::Base;
use proptest::prelude::*;

fn packed(s: &str) -> PackedSequence {
    PackedSequence::from_ascii_lossy(s.as_bytes())
}

/// 查询里的 N 匹配任意碱基，参考里的 N 不匹配任何碱基
fn same(q: Base, r: Base) -> bool {
    r != Base::N && (q == Base::N || q == r)
}

/// 查询完整对齐、参考起点任意：返回最早的最小 (end, diff)
fn naive_semi_global(q: &[Base], r: &[Base]) -> Option<(usize, usize)> {
    let mut prev: Vec<usize> = (0..=q.len()).collect();
    let mut best: Option<(usize, usize)> = None;
    for (j, &rc) in r.iter().enumerate() {
        let mut cur = vec![0; q.len() + 1];
        for i in 1..=q.len() {
            let sub = prev[i - 1] + usize::from(!same(q[i - 1], rc));
            cur[i] = sub.min(prev[i] + 1).min(cur[i - 1] + 1);
        }
        if best.map_or(true, |(_, d)| cur[q.len()] < d) {
            best = Some((j, cur[q.len()]));
        }
        prev = cur;
    }
    best
}

fn naive_edit(q: &[Base], r: &[Base]) -> usize {
    let mut prev: Vec<usize> = (0..=q.len()).collect();
    for (j, &rc) in r.iter().enumerate() {
        let mut cur = vec![j + 1; q.len() + 1];
        for i in 1..=q.len() {
            let sub = prev[i - 1] + usize::from(!same(q[i - 1], rc));
            cur[i] = sub.min(prev[i] + 1).min(cur[i - 1] + 1);
        }
        prev = cur;
    }
    prev[q.len()]
}

fn occurrences(text: &str, pattern: &str) -> Vec<usize> {
    (0..=text.len().saturating_sub(pattern.len()))
        .filter(|&i| text[i..].starts_with(pattern))
        .collect()
}

proptest! {
    #[test]
    fn fast_count_matches_naive(seq in "[ACGTN]{1,300}", a in 0usize..400, b in 0usize..400) {
        let p = packed(&seq);
        let (x, y) = {
            let (x, y) = (a % (seq.len() + 1), b % (seq.len() + 1));
            (x.min(y), x.max(y))
        };
        let all = p.fast_count_all(x, y);
        for base in Base::ALL {
            let expected = seq[x..y].bytes().filter(|&c| c == base.to_ascii()).count();
            prop_assert_eq!(p.count(base, x, y), expected);
            prop_assert_eq!(p.fast_count(base, x, y), expected);
            prop_assert_eq!(all[base.code() as usize], expected);
        }
    }

    #[test]
    fn reverse_complement_is_involution(seq in "[ACGTN]{0,200}") {
        let p = packed(&seq);
        prop_assert_eq!(p.reverse_complement().reverse_complement(), p.clone());
        prop_assert_eq!(p.reverse().reverse(), p);
    }

    #[test]
    fn sub_sequence_matches_slice(seq in "[ACGTN]{0,200}", a in 0usize..300, b in 0usize..300) {
        let p = packed(&seq);
        let (x, y) = {
            let (x, y) = (a % (seq.len() + 1), b % (seq.len() + 1));
            (x.min(y), x.max(y))
        };
        prop_assert_eq!(p.sub_sequence(x, y).to_string(), seq[x..y].to_string());
    }

    #[test]
    fn rank_and_select_agree(bits in prop::collection::vec(any::<bool>(), 0..500)) {
        let mut bv = BitVector::new(bits.len());
        for (i, &b) in bits.iter().enumerate() {
            bv.set_bit(b, i);
        }
        let rs = RankSelectBitVector::from(bv);
        let mut ones = 0;
        for (i, &b) in bits.iter().enumerate() {
            prop_assert_eq!(rs.rank(true, i), ones);
            prop_assert_eq!(rs.rank(false, i), i - ones);
            let nth = if b { ones + 1 } else { i - ones + 1 };
            prop_assert_eq!(rs.select(b, nth).unwrap(), i);
            if b {
                ones += 1;
            }
        }
        prop_assert_eq!(rs.count(true), ones);
        prop_assert!(rs.select(true, ones + 1).is_err());
        prop_assert!(rs.select(false, 0).is_err());
    }

    #[test]
    fn backward_search_finds_every_occurrence(text in "[ACGT]{1,200}", pattern in "[ACGT]{1,6}", step in 1usize..9) {
        let fm = WaveletFmIndex::from_text(&packed(&text));
        let ssa = SparseSuffixArray::from_index(&fm, step).unwrap();
        let si = fm.search(&packed(&pattern));
        let expected = occurrences(&text, &pattern);
        prop_assert_eq!(si.size(), expected.len());

        let mut located: Vec<usize> = si.indices().map(|i| ssa.locate(&fm, i)).collect();
        located.sort_unstable();
        prop_assert_eq!(located, expected);
    }

    #[test]
    fn block_myers_matches_dynamic_programming(
        query in "[ACGTN]{1,120}",
        reference in "[ACGT]{0,250}",
        k in 0usize..8,
        w in prop::sample::select(vec![3usize, 8, 64]),
    ) {
        let q = packed(&query);
        let r = packed(&reference);
        let qb: Vec<Base> = q.iter().collect();
        let rb: Vec<Base> = r.iter().collect();
        let expected = naive_semi_global(&qb, &rb).filter(|&(_, d)| d <= k);

        let hit = BlockAligner::with_word_size(&QueryMask::new(&q), k, w).align(&r);
        prop_assert_eq!(hit.map(|h| (h.end, h.diff)), expected);
        if query.len() <= 64 {
            let word = WordAligner::new(&q).search(&r, k);
            prop_assert_eq!(word.map(|h| (h.end, h.diff)), expected);
        }
    }

    #[test]
    fn planted_query_is_found_within_its_errors(
        reference in "[ACGT]{80,200}",
        start in 0usize..60,
        edits in prop::collection::vec((0usize..20, 0usize..4), 0..3),
    ) {
        // 从参考中截取一段并做若干替换，距离不会超过替换次数
        let mut query: Vec<u8> = reference.as_bytes()[start..start + 20].to_vec();
        for &(pos, base) in &edits {
            query[pos] = b"ACGT"[base];
        }
        let hit = BlockAligner::with_word_size(&QueryMask::new(&PackedSequence::from_ascii_lossy(&query)), edits.len(), 4)
            .align(&packed(&reference));
        prop_assert!(hit.is_some());
        prop_assert!(hit.map_or(false, |h| h.diff <= edits.len()));
    }

    #[test]
    fn suffix_filter_tracks_edit_distance(query in "[ACGN]{1,10}", text in "[ACGT]{0,14}", k in 0usize..4) {
        let q = packed(&query);
        let qb: Vec<Base> = q.iter().collect();
        let tb: Vec<Base> = packed(&text).iter().collect();
        let f = SuffixFilter::new(&q, k);

        let mut state = Some(f.initial_state());
        for t in 0..=tb.len() {
            let d = naive_edit(&qb, &tb[..t]);
            match &state {
                Some(s) => prop_assert_eq!(s.matched(), (d <= k).then_some(d)),
                None => prop_assert!(d > k),
            }
            if t < tb.len() {
                state = state.and_then(|s| f.next_state(&s, tb[t]));
            }
        }
    }
}
