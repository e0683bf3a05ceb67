use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};

/// 参考序列中的一条 contig：名称、长度与在拼接文本中的起始偏移
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contig {
    pub name: String,
    pub len: u32,
    pub offset: u32,
}

impl Contig {
    #[inline]
    pub fn end(&self) -> u32 {
        self.offset + self.len
    }
}

/// 多条 contig 拼接成一个文本后的边界表。
///
/// contig 之间以单个 N 分隔，N 不与任何 read 碱基匹配，
/// 因此跨越边界的命中只可能来自索引的盲区，这里统一拒绝。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceBoundary {
    contigs: Vec<Contig>,
}

impl SequenceBoundary {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条 contig；偏移必须不早于上一条的结尾
    pub fn push(&mut self, name: impl Into<String>, offset: usize, len: usize) -> Result<()> {
        let prev_end = self.contigs.last().map_or(0, |c| c.end() as usize);
        if offset < prev_end {
            return Err(IndexError::Construction(format!(
                "contig at offset {} overlaps previous contig ending at {}",
                offset, prev_end
            )));
        }
        if offset + len > u32::MAX as usize {
            return Err(IndexError::Construction("reference longer than 4 Gbp is not supported".into()));
        }
        self.contigs.push(Contig { name: name.into(), len: len as u32, offset: offset as u32 });
        Ok(())
    }

    pub fn contigs(&self) -> &[Contig] {
        &self.contigs
    }

    pub fn len(&self) -> usize {
        self.contigs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contigs.is_empty()
    }

    /// 文本位置 -> (contig 下标, contig 内偏移)；落在分隔符上返回 None
    pub fn map_text_pos(&self, pos: usize) -> Option<(usize, usize)> {
        let idx = self.contigs.partition_point(|c| (c.end() as usize) <= pos);
        let c = self.contigs.get(idx)?;
        if pos < c.offset as usize {
            return None;
        }
        Some((idx, pos - c.offset as usize))
    }

    /// 与 `map_text_pos` 相同，但要求 [pos, pos + len) 整体落在同一条 contig 内
    pub fn resolve(&self, pos: usize, len: usize) -> Option<(usize, usize)> {
        let (idx, off) = self.map_text_pos(pos)?;
        if off + len > self.contigs[idx].len as usize {
            return None;
        }
        Some((idx, off))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_contigs() -> SequenceBoundary {
        // chr1 = [0, 10)，分隔符 10，chr2 = [11, 16)
        let mut b = SequenceBoundary::new();
        b.push("chr1", 0, 10).unwrap();
        b.push("chr2", 11, 5).unwrap();
        b
    }

    #[test]
    fn maps_positions_into_contigs() {
        let b = two_contigs();
        assert_eq!(b.map_text_pos(0), Some((0, 0)));
        assert_eq!(b.map_text_pos(9), Some((0, 9)));
        assert_eq!(b.map_text_pos(10), None);
        assert_eq!(b.map_text_pos(11), Some((1, 0)));
        assert_eq!(b.map_text_pos(15), Some((1, 4)));
        assert_eq!(b.map_text_pos(16), None);
    }

    #[test]
    fn rejects_hits_spanning_contigs() {
        let b = two_contigs();
        assert_eq!(b.resolve(6, 4), Some((0, 6)));
        assert_eq!(b.resolve(6, 5), None);
        assert_eq!(b.resolve(12, 4), Some((1, 1)));
        assert_eq!(b.resolve(12, 5), None);
    }

    #[test]
    fn overlapping_contigs_are_rejected() {
        let mut b = two_contigs();
        assert!(b.push("chr3", 14, 3).is_err());
        assert_eq!(b.len(), 2);
    }

    #[test]
    fn empty_table_maps_nothing() {
        let b = SequenceBoundary::new();
        assert!(b.is_empty());
        assert_eq!(b.map_text_pos(0), None);
    }
}
