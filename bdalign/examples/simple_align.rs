//! 演示如何在 library 模式下使用 bdalign 进行近似比对。
//!
//! 运行方式：
//! ```bash
//! cargo run --example simple_align
//! ```

use bdalign::align::{AlignConfig, AlignerIndex, BidirectionalSearch};
use bdalign::io::Read;

fn main() -> anyhow::Result<()> {
    // 1. 参考序列（两条 contig）
    let chr1 = b"ACGTACGTAGCTGATCGTAGCTAGCTAGCTGATCGTAGCTAGCTAGCTGAT".to_vec();
    let chr2 = b"TTGACCGATGCATGCCATAGGACTTACGGATCAGTCCATGAACTGGTACA".to_vec();
    println!("参考: chr1 {} bp, chr2 {} bp", chr1.len(), chr2.len());

    // 2. 构建正向 / 反向 FM 索引
    let index = AlignerIndex::build(vec![("chr1".to_string(), chr1), ("chr2".to_string(), chr2)], 4)?;

    // 3. 一条带一个替换的 read
    let read = Read::new("read1", b"GCATGCCATTGGACTTACGG");
    println!("read: {} ({} bp)", read.seq, read.len());

    // 4. 直接枚举候选区间
    let search = BidirectionalSearch::new(index.forward(), index.reverse(), 2);
    let mut n = 0;
    search.search(&read.seq, &mut |cand| {
        n += 1;
        println!("  候选 {} strand={} k={} positions={:?}", cand.si(), cand.strand, cand.k, index.locate(&cand));
    });
    println!("共 {} 个候选区间", n);

    // 5. 完整比对并输出 SAM
    let config = AlignConfig { max_edit: 2.0, ..AlignConfig::default() };
    let hits = index.align_read(&read, &config);
    for (i, hit) in hits.iter().enumerate() {
        println!("{}", hit.to_sam_line(&read, i > 0));
    }
    Ok(())
}
