//! # bdalign
//!
//! 基于双向 FM 索引的近似 read 比对器。
//!
//! 本 crate 提供：
//!
//! - **紧凑索引**：2-bit 打包序列、常数时间 rank/select 位向量、wavelet array
//!   支撑的 FM 索引，以及采样后缀数组
//! - **近似搜索**：前缀匹配自动机（suffix filter）驱动的双向回溯，
//!   在 k 个编辑错误内枚举候选区间
//! - **验证**：Myers bit-parallel 编辑距离（单字与分块两种版本）
//!
//! ## 快速示例
//!
//! ```rust,no_run
//! use bdalign::align::{AlignConfig, AlignerIndex};
//! use bdalign::io::Read;
//!
//! let reference = b"ACGTACGTAGCTGATCGTAGGCTAGCTAGCATCGATCGGATC".to_vec();
//! let index = AlignerIndex::build(vec![("chr1".to_string(), reference)], 4)?;
//!
//! let read = Read::new("r1", b"GCTGATCGTAGG");
//! for hit in index.align_read(&read, &AlignConfig::default()) {
//!     println!("{}", hit.to_sam_line(&read, false));
//! }
//! # Ok::<(), bdalign::error::IndexError>(())
//! ```
//!
//! ## 模块说明
//!
//! - [`index`]：打包序列、位向量、wavelet array、FM 索引与采样后缀数组
//! - [`align`]：Myers 编辑距离、suffix filter、双向搜索与比对入口
//! - [`io`]：FASTA / FASTQ 解析与 read 来源
//! - [`util`]：碱基编码、互补等工具函数
//! - [`error`]：索引构建与查询的错误类型

pub mod align;
pub mod error;
pub mod index;
pub mod io;
pub mod util;
