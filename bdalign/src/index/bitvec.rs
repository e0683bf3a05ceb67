use std::fmt;
use std::io::{Read, Write};
use std::ops::{BitAndAssign, BitOrAssign, Not};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use crate::error::{check_range, IndexError, Result};

const WORD: usize = 64;

#[inline]
fn words_for(len: usize) -> usize {
    (len + WORD - 1) / WORD
}

/// 覆盖 `len` 个元素所需的字数，每字 `per_word` 个；溢出说明长度头已损坏
pub(crate) fn checked_words(len: usize, per_word: usize) -> Result<usize> {
    len.checked_add(per_word - 1)
        .map(|n| n / per_word)
        .ok_or_else(|| IndexError::Construction(format!("length header {} overflows", len)))
}

/// 读取 u64 长度头
pub(crate) fn read_len<R: Read>(input: &mut R) -> Result<usize> {
    let raw = input.read_u64::<LittleEndian>()?;
    usize::try_from(raw)
        .map_err(|_| IndexError::Construction(format!("length header {} does not fit in memory", raw)))
}

/// 分块读取 `count` 个字。缓冲区随实际读到的数据增长，
/// 损坏的长度头只会得到 `Construction` 错误，不会触发巨量分配。
pub(crate) fn read_words<R: Read>(input: &mut R, count: usize) -> Result<Vec<u64>> {
    const CHUNK: usize = 1 << 16;
    let mut words = Vec::with_capacity(count.min(CHUNK));
    while words.len() < count {
        let start = words.len();
        words.resize(start + (count - start).min(CHUNK), 0);
        input
            .read_u64_into::<LittleEndian>(&mut words[start..])
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::UnexpectedEof => {
                    IndexError::Construction(format!("payload truncated: expected {} words", count))
                }
                _ => IndexError::Io(e),
            })?;
    }
    Ok(words)
}

/// 低 `n` 位全 1（n <= 64）
#[inline]
fn low_mask(n: usize) -> u64 {
    if n >= WORD {
        !0u64
    } else {
        (1u64 << n) - 1
    }
}

/// 定长位向量。第 i 位存放在 `words[i / 64]` 的第 `i % 64` 位，
/// 因此 `lshift` / `add` 与 u64 的数值移位、加法方向一致，
/// 可以直接作为 bit-parallel DP 的算术操作数。
///
/// 不变量：超出 `len` 的尾部位始终为 0。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "RawBitVector")]
pub struct BitVector {
    words: Vec<u64>,
    len: usize,
}

/// 反序列化的原始字段，经 `TryFrom` 校验后才成为 `BitVector`
#[derive(Deserialize)]
struct RawBitVector {
    words: Vec<u64>,
    len: usize,
}

impl TryFrom<RawBitVector> for BitVector {
    type Error = IndexError;

    fn try_from(raw: RawBitVector) -> Result<Self> {
        BitVector::from_words(raw.words, raw.len)
    }
}

impl BitVector {
    pub fn new(len: usize) -> Self {
        Self { words: vec![0; words_for(len)], len }
    }

    pub fn ones(len: usize) -> Self {
        let mut v = Self { words: vec![!0u64; words_for(len)], len };
        v.clear_tail();
        v
    }

    /// 解析 '0' / '1' 字符串，首字符为第 0 位
    pub fn parse(s: &str) -> Result<Self> {
        let mut v = Self::new(s.len());
        for (i, ch) in s.bytes().enumerate() {
            match ch {
                b'0' => {}
                b'1' => v.set(i),
                other => return Err(IndexError::InvalidSymbol { symbol: other, position: i }),
            }
        }
        Ok(v)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    #[inline]
    pub fn set(&mut self, pos: usize) {
        assert!(pos < self.len, "bit {} out of range {}", pos, self.len);
        self.words[pos / WORD] |= 1u64 << (pos % WORD);
    }

    #[inline]
    pub fn reset(&mut self, pos: usize) {
        assert!(pos < self.len, "bit {} out of range {}", pos, self.len);
        self.words[pos / WORD] &= !(1u64 << (pos % WORD));
    }

    #[inline]
    pub fn set_bit(&mut self, bit: bool, pos: usize) {
        if bit {
            self.set(pos);
        } else {
            self.reset(pos);
        }
    }

    #[inline]
    pub fn get(&self, pos: usize) -> bool {
        assert!(pos < self.len, "bit {} out of range {}", pos, self.len);
        (self.words[pos / WORD] >> (pos % WORD)) & 1 == 1
    }

    /// 是否存在任何置位
    pub fn any(&self) -> bool {
        self.words.iter().any(|&w| w != 0)
    }

    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// [start, end) 范围内 1 的个数
    pub fn count_one_bits(&self, start: usize, end: usize) -> usize {
        check_range(start, end, self.len);
        if start == end {
            return 0;
        }
        let sw = start / WORD;
        let ew = (end - 1) / WORD;
        let head = !low_mask(start % WORD);
        let tail = low_mask(end - ew * WORD);
        if sw == ew {
            return (self.words[sw] & head & tail).count_ones() as usize;
        }
        let mut count = (self.words[sw] & head).count_ones() as usize;
        for w in &self.words[sw + 1..ew] {
            count += w.count_ones() as usize;
        }
        count + (self.words[ew] & tail).count_ones() as usize
    }

    /// 逻辑左移（低位向高位移动 n 位，低位补 0），原地修改
    pub fn lshift(&mut self, n: usize) -> &mut Self {
        if n >= self.len {
            self.words.iter_mut().for_each(|w| *w = 0);
            return self;
        }
        let word_shift = n / WORD;
        let bit_shift = n % WORD;
        for i in (0..self.words.len()).rev() {
            self.words[i] = if i >= word_shift {
                let src = i - word_shift;
                let hi = self.words[src] << bit_shift;
                let lo = if bit_shift > 0 && src > 0 {
                    self.words[src - 1] >> (WORD - bit_shift)
                } else {
                    0
                };
                hi | lo
            } else {
                0
            };
        }
        self.clear_tail();
        self
    }

    /// 逻辑右移（高位向低位移动 n 位，高位补 0），原地修改
    pub fn rshift(&mut self, n: usize) -> &mut Self {
        if n >= self.len {
            self.words.iter_mut().for_each(|w| *w = 0);
            return self;
        }
        let word_shift = n / WORD;
        let bit_shift = n % WORD;
        let nw = self.words.len();
        for i in 0..nw {
            let src = i + word_shift;
            self.words[i] = if src < nw {
                let lo = self.words[src] >> bit_shift;
                let hi = if bit_shift > 0 && src + 1 < nw {
                    self.words[src + 1] << (WORD - bit_shift)
                } else {
                    0
                };
                lo | hi
            } else {
                0
            };
        }
        self
    }

    /// 二进制加法，进位跨字传播；溢出 `len` 的部分被截断
    pub fn add(&mut self, other: &BitVector) -> &mut Self {
        assert_eq!(self.len, other.len, "bit vector length mismatch");
        let mut carry = false;
        for (a, &b) in self.words.iter_mut().zip(&other.words) {
            let (s1, c1) = a.overflowing_add(b);
            let (s2, c2) = s1.overflowing_add(carry as u64);
            *a = s2;
            carry = c1 || c2;
        }
        self.clear_tail();
        self
    }

    /// 取 [start, start + width) 位作为 u64 的低位（width <= 64），越界部分为 0
    pub fn extract(&self, start: usize, width: usize) -> u64 {
        debug_assert!(width <= WORD);
        if start >= self.len || width == 0 {
            return 0;
        }
        let wi = start / WORD;
        let bi = start % WORD;
        let mut v = self.words[wi] >> bi;
        if bi > 0 && wi + 1 < self.words.len() {
            v |= self.words[wi + 1] << (WORD - bi);
        }
        v & low_mask(width)
    }

    /// 复制 [start, end) 为新的位向量
    pub fn slice(&self, start: usize, end: usize) -> BitVector {
        check_range(start, end, self.len);
        let mut out = BitVector::new(end - start);
        for (i, w) in out.words.iter_mut().enumerate() {
            let from = start + i * WORD;
            *w = self.extract(from, (end - from).min(WORD));
        }
        out
    }

    /// 改变长度：变长时补 0，变短时截断
    pub fn resized(&self, len: usize) -> BitVector {
        let mut words = self.words.clone();
        words.resize(words_for(len), 0);
        let mut out = BitVector { words, len };
        out.clear_tail();
        out
    }

    pub fn save_to<W: Write>(&self, out: &mut W) -> Result<()> {
        out.write_u64::<LittleEndian>(self.len as u64)?;
        for &w in &self.words {
            out.write_u64::<LittleEndian>(w)?;
        }
        Ok(())
    }

    pub fn load_from<R: Read>(input: &mut R) -> Result<Self> {
        let len = read_len(input)?;
        let words = read_words(input, checked_words(len, WORD)?)?;
        Self::from_words(words, len)
    }

    /// 校验字数与尾部不变量
    fn from_words(words: Vec<u64>, len: usize) -> Result<Self> {
        let expected = checked_words(len, WORD)?;
        if words.len() != expected {
            return Err(IndexError::Construction(format!(
                "bit vector of length {} needs {} words, found {}",
                len,
                expected,
                words.len()
            )));
        }
        let v = Self { words, len };
        if v.tail_is_dirty() {
            return Err(IndexError::Construction("bit vector has bits set beyond its length".into()));
        }
        Ok(v)
    }

    fn tail_is_dirty(&self) -> bool {
        let rem = self.len % WORD;
        rem != 0 && self.words.last().map_or(false, |&w| w & !low_mask(rem) != 0)
    }

    fn clear_tail(&mut self) {
        let rem = self.len % WORD;
        if rem != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= low_mask(rem);
            }
        }
    }
}

impl Not for &BitVector {
    type Output = BitVector;

    fn not(self) -> BitVector {
        let mut out = BitVector {
            words: self.words.iter().map(|w| !w).collect(),
            len: self.len,
        };
        out.clear_tail();
        out
    }
}

impl Not for BitVector {
    type Output = BitVector;

    fn not(self) -> BitVector {
        !&self
    }
}

impl BitAndAssign<&BitVector> for BitVector {
    fn bitand_assign(&mut self, rhs: &BitVector) {
        assert_eq!(self.len, rhs.len, "bit vector length mismatch");
        for (a, b) in self.words.iter_mut().zip(&rhs.words) {
            *a &= b;
        }
    }
}

impl BitOrAssign<&BitVector> for BitVector {
    fn bitor_assign(&mut self, rhs: &BitVector) {
        assert_eq!(self.len, rhs.len, "bit vector length mismatch");
        for (a, b) in self.words.iter_mut().zip(&rhs.words) {
            *a |= b;
        }
    }
}

impl fmt::Display for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.len {
            f.write_str(if self.get(i) { "1" } else { "0" })?;
        }
        Ok(())
    }
}

/// 带 rank/select 目录的只读位向量。
///
/// 目录为每个 64 位字之前的累计 1 数量，rank 为 O(1)，
/// select 在目录上二分后在字内定位。
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawRankSelect")]
pub struct RankSelectBitVector {
    bits: BitVector,
    /// ranks[i] = words[0..i) 中 1 的个数，长度为字数 + 1
    ranks: Vec<u64>,
}

#[derive(Deserialize)]
struct RawRankSelect {
    bits: BitVector,
    ranks: Vec<u64>,
}

impl TryFrom<RawRankSelect> for RankSelectBitVector {
    type Error = IndexError;

    fn try_from(raw: RawRankSelect) -> Result<Self> {
        let rebuilt = RankSelectBitVector::from(raw.bits);
        if rebuilt.ranks != raw.ranks {
            return Err(IndexError::Construction("rank directory does not match its bit vector".into()));
        }
        Ok(rebuilt)
    }
}

impl From<BitVector> for RankSelectBitVector {
    fn from(bits: BitVector) -> Self {
        let mut ranks = Vec::with_capacity(bits.words.len() + 1);
        let mut acc = 0u64;
        ranks.push(0);
        for w in &bits.words {
            acc += w.count_ones() as u64;
            ranks.push(acc);
        }
        Self { bits, ranks }
    }
}

impl RankSelectBitVector {
    #[inline]
    pub fn len(&self) -> usize {
        self.bits.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bits.len == 0
    }

    #[inline]
    pub fn get(&self, pos: usize) -> bool {
        self.bits.get(pos)
    }

    #[inline]
    pub fn bits(&self) -> &BitVector {
        &self.bits
    }

    /// [0, pos) 中 `bit` 的个数
    #[inline]
    pub fn rank(&self, bit: bool, pos: usize) -> usize {
        check_range(0, pos, self.bits.len);
        let wi = pos / WORD;
        let rem = pos % WORD;
        let mut ones = self.ranks[wi] as usize;
        if rem != 0 {
            ones += (self.bits.words[wi] & low_mask(rem)).count_ones() as usize;
        }
        if bit {
            ones
        } else {
            pos - ones
        }
    }

    pub fn count(&self, bit: bool) -> usize {
        self.rank(bit, self.bits.len)
    }

    /// words[0..wi) 中 `bit` 的个数
    #[inline]
    fn word_rank(&self, bit: bool, wi: usize) -> usize {
        let ones = self.ranks[wi] as usize;
        if bit {
            ones
        } else {
            (wi * WORD).min(self.bits.len) - ones
        }
    }

    /// 第 `count` 个（从 1 开始计）`bit` 所在的位置
    pub fn select(&self, bit: bool, count: usize) -> Result<usize> {
        let available = self.count(bit);
        if count == 0 {
            return Err(IndexError::InvalidRange { start: 0, end: 0, len: available });
        }
        if count > available {
            return Err(IndexError::SelectUnderflow { bit, count, available });
        }

        // 找到第一个满足 word_rank(wi + 1) >= count 的字
        let (mut lo, mut hi) = (0usize, self.bits.words.len());
        while lo < hi {
            let mid = (lo + hi) / 2;
            if self.word_rank(bit, mid + 1) < count {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        let wi = lo;
        let mut remaining = count - self.word_rank(bit, wi);
        let mut v = if bit { self.bits.words[wi] } else { !self.bits.words[wi] };
        let valid = (self.bits.len - wi * WORD).min(WORD);
        v &= low_mask(valid);
        while remaining > 1 {
            v &= v - 1;
            remaining -= 1;
        }
        Ok(wi * WORD + v.trailing_zeros() as usize)
    }

    pub fn save_to<W: Write>(&self, out: &mut W) -> Result<()> {
        self.bits.save_to(out)
    }

    pub fn load_from<R: Read>(input: &mut R) -> Result<Self> {
        Ok(BitVector::load_from(input)?.into())
    }
}
