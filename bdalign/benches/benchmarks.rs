use criterion::{black_box, criterion_group, criterion_main, Criterion};

use bdalign::align::{AlignConfig, AlignerIndex, BlockAligner, QueryMask, SuffixFilter, WordAligner};
use bdalign::index::{FmIndex, PackedSequence, WaveletArray, WaveletFmIndex};
use bdalign::io::Read;
use bdalign::util::dna::{Base, SIGMA};

fn make_reference(len: usize) -> Vec<u8> {
    let bases = [b'A', b'C', b'G', b'T'];
    let mut seq = Vec::with_capacity(len);
    let mut x: u32 = 42;
    for _ in 0..len {
        x = x.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        seq.push(bases[(x >> 16) as usize % 4]);
    }
    seq
}

fn bench_fast_count(c: &mut Criterion) {
    let text = PackedSequence::from_ascii_lossy(&make_reference(100_000));
    c.bench_function("fast_count_10kb", |b| {
        b.iter(|| black_box(text.fast_count(Base::G, black_box(1_234), black_box(11_234))));
    });
    c.bench_function("count_10kb", |b| {
        b.iter(|| black_box(text.count(Base::G, black_box(1_234), black_box(11_234))));
    });
}

fn bench_wavelet_rank(c: &mut Criterion) {
    let symbols: Vec<u8> = make_reference(100_000)
        .iter()
        .map(|&b| Base::from_ascii(b).code())
        .collect();
    let wa = WaveletArray::new(&symbols[..], SIGMA);
    c.bench_function("wavelet_rank", |b| {
        b.iter(|| black_box(wa.rank(black_box(2), black_box(73_421))));
    });
}

fn bench_backward_search(c: &mut Criterion) {
    let reference = make_reference(10_000);
    let fm = WaveletFmIndex::from_text(&PackedSequence::from_ascii_lossy(&reference));
    let pattern = PackedSequence::from_ascii_lossy(&reference[100..120]);

    c.bench_function("backward_search_20bp", |b| {
        b.iter(|| black_box(fm.search(black_box(&pattern))));
    });
}

fn bench_myers(c: &mut Criterion) {
    let reference = PackedSequence::from_ascii_lossy(&make_reference(1_000));
    let query = reference.sub_sequence(400, 460);
    let word = WordAligner::new(&query);
    c.bench_function("myers_word_60bp_1kb", |b| {
        b.iter(|| black_box(word.search(black_box(&reference), 3)));
    });

    let long_query = reference.sub_sequence(300, 550);
    let block = BlockAligner::new(&QueryMask::new(&long_query), 8);
    c.bench_function("myers_block_250bp_1kb", |b| {
        b.iter(|| black_box(block.align(black_box(&reference))));
    });
}

fn bench_suffix_filter(c: &mut Criterion) {
    let reference = PackedSequence::from_ascii_lossy(&make_reference(200));
    let query = reference.sub_sequence(50, 150);
    let filter = SuffixFilter::new(&query, 4);

    c.bench_function("suffix_filter_100bp_k4", |b| {
        b.iter(|| {
            let mut state = filter.initial_state();
            for base in reference.sub_sequence(50, 150).iter() {
                match filter.next_state(&state, base) {
                    Some(next) => state = next,
                    None => break,
                }
            }
            black_box(state.matched())
        });
    });
}

fn bench_align_read(c: &mut Criterion) {
    let reference = make_reference(50_000);
    let index = AlignerIndex::build(vec![("bench".to_string(), reference.clone())], 16).unwrap();
    let mut seq = reference[20_000..20_100].to_vec();
    seq[40] = if seq[40] == b'A' { b'C' } else { b'A' };
    let read = Read::new("r", &seq);
    let config = AlignConfig { max_edit: 2.0, ..AlignConfig::default() };

    c.bench_function("align_read_100bp_k2", |b| {
        b.iter(|| black_box(index.align_read(black_box(&read), &config)));
    });
}

fn bench_build_index(c: &mut Criterion) {
    let text = PackedSequence::from_ascii_lossy(&make_reference(10_000));
    c.bench_function("build_fm_10kb", |b| {
        b.iter(|| black_box(WaveletFmIndex::from_text(black_box(&text))));
    });
}

criterion_group!(
    benches,
    bench_fast_count,
    bench_wavelet_rank,
    bench_backward_search,
    bench_myers,
    bench_suffix_filter,
    bench_align_read,
    bench_build_index
);
criterion_main!(benches);
