use std::fmt;
use std::io::{Read, Write};

use byteorder::{LittleEndian, WriteBytesExt};
use serde::{Deserialize, Serialize};

use super::bitvec::{checked_words, read_len, read_words};
use super::SymbolSequence;
use crate::error::{check_range, checked_range, IndexError, Result};
use crate::util::dna::Base;

/// 每个 u64 存 32 个碱基
const BASES_PER_WORD: usize = 32;
/// 偶数位（每个碱基的低位）
const LOW_BITS: u64 = 0x5555_5555_5555_5555;

#[inline]
fn low_mask(n: usize) -> u64 {
    if n >= 64 {
        !0u64
    } else {
        (1u64 << n) - 1
    }
}

/// 将 32 位整数的各位插到偶数位上：b31..b0 -> 0b31..0b0
#[inline]
pub(crate) fn interleave32_with_0(v: u64) -> u64 {
    let mut x = v & 0xFFFF_FFFF;
    x = (x | (x << 16)) & 0x0000_FFFF_0000_FFFF;
    x = (x | (x << 8)) & 0x00FF_00FF_00FF_00FF;
    x = (x | (x << 4)) & 0x0F0F_0F0F_0F0F_0F0F;
    x = (x | (x << 2)) & 0x3333_3333_3333_3333;
    (x | (x << 1)) & LOW_BITS
}

/// 2-bit 打包的 DNA 序列。
///
/// A/C/G/T 以 2 bit 存储；N 在打包字中存为 00，另由 `n_mask` 例外位图标记。
/// 不变量：N 位置与超出 `len` 的尾部在 `words` 中均为 0。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "RawPackedSequence")]
pub struct PackedSequence {
    words: Vec<u64>,
    n_mask: Vec<u64>,
    len: usize,
}

#[derive(Deserialize)]
struct RawPackedSequence {
    words: Vec<u64>,
    n_mask: Vec<u64>,
    len: usize,
}

impl TryFrom<RawPackedSequence> for PackedSequence {
    type Error = IndexError;

    fn try_from(raw: RawPackedSequence) -> Result<Self> {
        PackedSequence::from_parts(raw.words, raw.n_mask, raw.len)
    }
}

impl PackedSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(len: usize) -> Self {
        Self {
            words: Vec::with_capacity((len + BASES_PER_WORD - 1) / BASES_PER_WORD),
            n_mask: Vec::with_capacity((len + 63) / 64),
            len: 0,
        }
    }

    /// 严格打包：ACGTN 以外的符号返回 `InvalidSymbol`
    pub fn from_ascii(seq: &[u8]) -> Result<Self> {
        let mut s = Self::with_capacity(seq.len());
        for &b in seq {
            s.append_ascii(b)?;
        }
        Ok(s)
    }

    /// 宽松打包：不支持的符号视为 N
    pub fn from_ascii_lossy(seq: &[u8]) -> Self {
        seq.iter().map(|&b| Base::from_ascii(b)).collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn append(&mut self, base: Base) {
        let i = self.len;
        if i % BASES_PER_WORD == 0 {
            self.words.push(0);
        }
        if i % 64 == 0 {
            self.n_mask.push(0);
        }
        if base == Base::N {
            self.n_mask[i / 64] |= 1u64 << (i % 64);
        } else {
            self.words[i / BASES_PER_WORD] |= (base.code() as u64) << (2 * (i % BASES_PER_WORD));
        }
        self.len += 1;
    }

    pub fn append_ascii(&mut self, b: u8) -> Result<()> {
        let base = Base::try_from_ascii(b).ok_or(IndexError::InvalidSymbol { symbol: b, position: self.len })?;
        self.append(base);
        Ok(())
    }

    #[inline]
    pub fn lookup(&self, i: usize) -> Base {
        assert!(i < self.len, "index {} out of range {}", i, self.len);
        if (self.n_mask[i / 64] >> (i % 64)) & 1 == 1 {
            return Base::N;
        }
        let code = (self.words[i / BASES_PER_WORD] >> (2 * (i % BASES_PER_WORD))) & 3;
        match code {
            0 => Base::A,
            1 => Base::C,
            2 => Base::G,
            _ => Base::T,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Base> + '_ {
        (0..self.len).map(move |i| self.lookup(i))
    }

    /// 朴素计数：逐个比较 [x, y)
    pub fn count(&self, base: Base, x: usize, y: usize) -> usize {
        check_range(x, y, self.len);
        (x..y).filter(|&i| self.lookup(i) == base).count()
    }

    fn count_n(&self, x: usize, y: usize) -> usize {
        if x == y {
            return 0;
        }
        let (sw, ew) = (x / 64, (y - 1) / 64);
        let head = !low_mask(x % 64);
        let tail = low_mask(y - ew * 64);
        if sw == ew {
            return (self.n_mask[sw] & head & tail).count_ones() as usize;
        }
        let mut n = (self.n_mask[sw] & head).count_ones() as usize;
        for w in &self.n_mask[sw + 1..ew] {
            n += w.count_ones() as usize;
        }
        n + (self.n_mask[ew] & tail).count_ones() as usize
    }

    /// 对覆盖 [x, y) 的每个字调用 f(word, 范围内碱基的低位掩码)
    #[inline]
    fn for_each_word<F: FnMut(u64, u64)>(&self, x: usize, y: usize, mut f: F) {
        if x == y {
            return;
        }
        let (sw, ew) = (x / BASES_PER_WORD, (y - 1) / BASES_PER_WORD);
        for wi in sw..=ew {
            let start = if wi == sw { x % BASES_PER_WORD } else { 0 };
            let end = if wi == ew { y - ew * BASES_PER_WORD } else { BASES_PER_WORD };
            let range = low_mask(2 * end) & !low_mask(2 * start) & LOW_BITS;
            f(self.words[wi], range);
        }
    }

    /// 按位平面计数：lo/hi 两个位平面做 AND 后 popcount，每个字一次处理 32 个碱基。
    /// 结果与 `count` 完全一致。
    pub fn fast_count(&self, base: Base, x: usize, y: usize) -> usize {
        check_range(x, y, self.len);
        if base == Base::N {
            return self.count_n(x, y);
        }
        let code = base.code() as u64;
        let mut total = 0usize;
        self.for_each_word(x, y, |w, range| {
            let lo = w & LOW_BITS;
            let hi = (w >> 1) & LOW_BITS;
            let lo_plane = if code & 1 == 1 { lo } else { !lo };
            let hi_plane = if code & 2 == 2 { hi } else { !hi };
            total += (lo_plane & hi_plane & range).count_ones() as usize;
        });
        if base == Base::A {
            // N 在打包字中是 00，被算成了 A
            total -= self.count_n(x, y);
        }
        total
    }

    /// 一次遍历求出 [x, y) 中 A/C/G/T/N 的数量（按编码下标）
    pub fn fast_count_all(&self, x: usize, y: usize) -> [usize; 5] {
        check_range(x, y, self.len);
        let mut counts = [0usize; 5];
        self.for_each_word(x, y, |w, range| {
            let lo = w & LOW_BITS;
            let hi = (w >> 1) & LOW_BITS;
            counts[0] += (!hi & !lo & range).count_ones() as usize;
            counts[1] += (!hi & lo & range).count_ones() as usize;
            counts[2] += (hi & !lo & range).count_ones() as usize;
            counts[3] += (hi & lo & range).count_ones() as usize;
        });
        counts[4] = self.count_n(x, y);
        counts[0] -= counts[4];
        counts
    }

    pub fn reverse(&self) -> PackedSequence {
        (0..self.len).rev().map(|i| self.lookup(i)).collect()
    }

    /// A<->T, C<->G, N 不变。整字取反后清掉 N 位置与尾部
    pub fn complement(&self) -> PackedSequence {
        let mut words = Vec::with_capacity(self.words.len());
        for (wi, &w) in self.words.iter().enumerate() {
            let n_bits = (self.n_mask[wi / 2] >> (32 * (wi % 2))) & 0xFFFF_FFFF;
            let spread = interleave32_with_0(n_bits);
            words.push(!w & !(spread | (spread << 1)));
        }
        let rem = self.len % BASES_PER_WORD;
        if rem != 0 {
            if let Some(last) = words.last_mut() {
                *last &= low_mask(2 * rem);
            }
        }
        PackedSequence { words, n_mask: self.n_mask.clone(), len: self.len }
    }

    pub fn reverse_complement(&self) -> PackedSequence {
        self.reverse().complement()
    }

    /// [s, e) 的拷贝；区间非法时 panic
    pub fn sub_sequence(&self, s: usize, e: usize) -> PackedSequence {
        check_range(s, e, self.len);
        (s..e).map(|i| self.lookup(i)).collect()
    }

    /// `fast_count` 的可恢复版本
    pub fn try_count(&self, base: Base, x: usize, y: usize) -> Result<usize> {
        checked_range(x, y, self.len)?;
        Ok(self.fast_count(base, x, y))
    }

    pub fn try_sub_sequence(&self, s: usize, e: usize) -> Result<PackedSequence> {
        checked_range(s, e, self.len)?;
        Ok(self.sub_sequence(s, e))
    }

    /// 二进制布局：u64 长度，随后打包字，最后是 N 例外位图
    pub fn save_to<W: Write>(&self, out: &mut W) -> Result<()> {
        out.write_u64::<LittleEndian>(self.len as u64)?;
        for &w in &self.words {
            out.write_u64::<LittleEndian>(w)?;
        }
        for &w in &self.n_mask {
            out.write_u64::<LittleEndian>(w)?;
        }
        Ok(())
    }

    pub fn load_from<R: Read>(input: &mut R) -> Result<Self> {
        let len = read_len(input)?;
        let words = read_words(input, checked_words(len, BASES_PER_WORD)?)?;
        let n_mask = read_words(input, checked_words(len, 64)?)?;
        Self::from_parts(words, n_mask, len)
    }

    /// 校验字数、N 位置与尾部不变量
    fn from_parts(words: Vec<u64>, n_mask: Vec<u64>, len: usize) -> Result<Self> {
        let (nw, nm) = (checked_words(len, BASES_PER_WORD)?, checked_words(len, 64)?);
        if words.len() != nw || n_mask.len() != nm {
            return Err(IndexError::Construction(format!(
                "packed sequence of length {} needs {} + {} words, found {} + {}",
                len,
                nw,
                nm,
                words.len(),
                n_mask.len()
            )));
        }
        let seq = Self { words, n_mask, len };
        for (wi, &w) in seq.words.iter().enumerate() {
            let n_bits = (seq.n_mask[wi / 2] >> (32 * (wi % 2))) & 0xFFFF_FFFF;
            let spread = interleave32_with_0(n_bits);
            if w & (spread | (spread << 1)) != 0 {
                return Err(IndexError::Construction(format!("packed word {} has non-zero codes at N positions", wi)));
            }
        }
        let rem = len % BASES_PER_WORD;
        let rem_n = len % 64;
        if (rem != 0 && seq.words.last().map_or(false, |&w| w & !low_mask(2 * rem) != 0))
            || (rem_n != 0 && seq.n_mask.last().map_or(false, |&w| w & !low_mask(rem_n) != 0))
        {
            return Err(IndexError::Construction("packed sequence has data beyond its length".into()));
        }
        Ok(seq)
    }
}

impl FromIterator<Base> for PackedSequence {
    fn from_iter<I: IntoIterator<Item = Base>>(iter: I) -> Self {
        let mut s = PackedSequence::new();
        for b in iter {
            s.append(b);
        }
        s
    }
}

impl SymbolSequence for PackedSequence {
    #[inline]
    fn text_size(&self) -> usize {
        self.len
    }

    #[inline]
    fn symbol(&self, i: usize) -> u8 {
        self.lookup(i).code()
    }
}

impl fmt::Display for PackedSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s: String = self.iter().map(|b| b.to_ascii() as char).collect();
        f.write_str(&s)
    }
}
