use thiserror::Error;

/// 索引构建与查询阶段的错误。
///
/// 查询失败（k 个错误内无候选）不在此列：它以 `None` 表示，属于正常终止。
#[derive(Debug, Error)]
pub enum IndexError {
    /// 持久化文件损坏或参数不合法，索引构建必须中止
    #[error("index construction failed: {0}")]
    Construction(String),

    /// 打包参考序列时遇到字母表之外的符号
    #[error("unsupported symbol '{}' at position {position}", *symbol as char)]
    InvalidSymbol { symbol: u8, position: usize },

    /// rank / select / count 的区间颠倒或越界
    #[error("invalid range [{start}, {end}) for length {len}")]
    InvalidRange { start: usize, end: usize, len: usize },

    /// select 请求的出现次数超过实际数量
    #[error("select({bit}, {count}) underflow: only {available} occurrences")]
    SelectUnderflow { bit: bool, count: usize, available: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

pub type Result<T> = std::result::Result<T, IndexError>;

/// 区间前置条件检查：失败说明内部簿记有误，直接 panic。
#[inline]
#[track_caller]
pub(crate) fn check_range(start: usize, end: usize, len: usize) {
    assert!(
        start <= end && end <= len,
        "{}",
        IndexError::InvalidRange { start, end, len }
    );
}

/// 可恢复版本，供公开的 `try_*` 接口使用
#[inline]
pub(crate) fn checked_range(start: usize, end: usize, len: usize) -> Result<()> {
    if start <= end && end <= len {
        Ok(())
    } else {
        Err(IndexError::InvalidRange { start, end, len })
    }
}
