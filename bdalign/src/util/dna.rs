use serde::{Deserialize, Serialize};

/// 字母表大小 {A, C, G, T, N}
pub const SIGMA: usize = 5;

/// 碱基编码。A=0, C=1, G=2, T=3, N=4 是固定的：
/// 2-bit 打包、互补（code ^ 3）和 popcount 计数都依赖这组数值。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Base {
    A = 0,
    C = 1,
    G = 2,
    T = 3,
    N = 4,
}

impl Base {
    pub const ALL: [Base; SIGMA] = [Base::A, Base::C, Base::G, Base::T, Base::N];
    /// 不含 N 的四种碱基，搜索时只沿这四个方向扩展
    pub const ACGT: [Base; 4] = [Base::A, Base::C, Base::G, Base::T];

    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    #[inline]
    pub fn from_code(code: u8) -> Option<Base> {
        match code {
            0 => Some(Base::A),
            1 => Some(Base::C),
            2 => Some(Base::G),
            3 => Some(Base::T),
            4 => Some(Base::N),
            _ => None,
        }
    }

    /// 严格解析：只接受 ACGTN（大小写均可）以及 U。
    #[inline]
    pub fn try_from_ascii(b: u8) -> Option<Base> {
        match b.to_ascii_uppercase() {
            b'A' => Some(Base::A),
            b'C' => Some(Base::C),
            b'G' => Some(Base::G),
            b'T' | b'U' => Some(Base::T),
            b'N' => Some(Base::N),
            _ => None,
        }
    }

    /// 宽松解析：其余符号一律视为 N（读取 reads 时使用）
    #[inline]
    pub fn from_ascii(b: u8) -> Base {
        Base::try_from_ascii(b).unwrap_or(Base::N)
    }

    #[inline]
    pub fn to_ascii(self) -> u8 {
        b"ACGTN"[self as usize]
    }

    #[inline]
    pub fn complement(self) -> Base {
        match self {
            Base::A => Base::T,
            Base::C => Base::G,
            Base::G => Base::C,
            Base::T => Base::A,
            Base::N => Base::N,
        }
    }
}

impl std::fmt::Display for Base {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_ascii() as char)
    }
}

/// IUPAC 简并碱基（R Y S W K M B D H V）
pub fn is_ambiguity_code(b: u8) -> bool {
    matches!(
        b.to_ascii_uppercase(),
        b'R' | b'Y' | b'S' | b'W' | b'K' | b'M' | b'B' | b'D' | b'H' | b'V'
    )
}

pub fn revcomp(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .rev()
        .map(|&b| Base::from_ascii(b).complement().to_ascii())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_fixed() {
        let codes: Vec<u8> = Base::ALL.iter().map(|b| b.code()).collect();
        assert_eq!(codes, vec![0, 1, 2, 3, 4]);
        for b in Base::ALL {
            assert_eq!(Base::from_code(b.code()), Some(b));
        }
        assert_eq!(Base::from_code(5), None);
    }

    #[test]
    fn complement_is_xor3_for_acgt() {
        for b in Base::ACGT {
            assert_eq!(b.complement().code(), b.code() ^ 3);
        }
        assert_eq!(Base::N.complement(), Base::N);
    }

    #[test]
    fn lossy_parsing_maps_unknown_to_n() {
        assert_eq!(Base::from_ascii(b'r'), Base::N);
        assert_eq!(Base::from_ascii(b'u'), Base::T);
        assert_eq!(Base::try_from_ascii(b'-'), None);
        assert!(is_ambiguity_code(b'r') && is_ambiguity_code(b'V'));
        assert!(!is_ambiguity_code(b'N') && !is_ambiguity_code(b'*'));
        assert_eq!(revcomp(b"AACGN"), b"NCGTT");
    }
}
