//! 后缀数组构建（倍增法，O(n log^2 n)）。
//!
//! 真正的流水线中后缀排序由外部工具完成，这里只需要给出 BWT 与
//! 稀疏 SA 的来源，供测试和小规模参考序列使用。

use super::packed::PackedSequence;

/// 对打包序列 `T` 构建 `T$` 的后缀数组，长度为 `len + 1`，SA[0] = len。
/// `$` 比任何碱基都小。
pub fn build_sa(text: &PackedSequence) -> Vec<u32> {
    // 编码整体 +1，0 留给 $
    let mut codes: Vec<u8> = text.iter().map(|b| b.code() + 1).collect();
    codes.push(0);
    sort_suffixes(&codes)
}

/// 对任意以唯一最小符号结尾的整数文本做倍增排序
pub fn sort_suffixes(text: &[u8]) -> Vec<u32> {
    let n = text.len();
    if n == 0 {
        return Vec::new();
    }
    let mut sa: Vec<usize> = (0..n).collect();
    let mut rank: Vec<i64> = text.iter().map(|&b| i64::from(b)).collect();
    let mut next = vec![0i64; n];

    let mut k = 1usize;
    loop {
        let key = |i: usize, rank: &[i64]| (rank[i], if i + k < n { rank[i + k] } else { -1 });
        sa.sort_unstable_by_key(|&i| key(i, &rank));

        next[sa[0]] = 0;
        for w in 1..n {
            let bump = key(sa[w - 1], &rank) != key(sa[w], &rank);
            next[sa[w]] = next[sa[w - 1]] + i64::from(bump);
        }
        std::mem::swap(&mut rank, &mut next);
        if rank[sa[n - 1]] as usize == n - 1 || k >= n {
            break;
        }
        k <<= 1;
    }
    sa.into_iter().map(|x| x as u32).collect()
}
