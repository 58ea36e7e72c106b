#![doc = include_str!("../README.md")]

pub mod fs;
pub mod memory;

// --- 주요 타입 re-export ---

pub use fs::{FilePackageScanStorage, FileProvenanceScanStorage};
pub use memory::{MemoryPackageScanStorage, MemoryProvenanceScanStorage};
