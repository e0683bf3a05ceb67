//! 参考序列与 reads 的读取

pub mod fasta;
pub mod fastq;
pub mod reads;

pub use fasta::{FastaReader, FastaRecord};
pub use fastq::{FastqReader, FastqRecord};
pub use reads::{Read, ReadSource};
