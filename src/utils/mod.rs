//! Utility functions and data structures.
//!
//! ## Modules
//!
//! - [`encoding`] - VarNum integers, delta lists, fixed-width big-endian fields
//! - [`tokenizer`] - Full-text lexer feeding the builders
//! - [`memory`] - Memory pressure probes for bounded-memory builds
//! - [`progress`] - Optional progress bars (`progress` feature)
//!
//! ```
//! use xmlidx::utils::{decode_varnum, encode_varnum};
//!
//! let mut buf = Vec::new();
//! encode_varnum(300, &mut buf);
//! assert_eq!(decode_varnum(&buf).unwrap(), (300, 2));
//! ```

pub mod encoding;
pub mod memory;
pub mod progress;
pub mod tokenizer;

pub use encoding::*;
pub use memory::{BudgetProbe, MemoryPressureProbe, ProcessMemoryProbe};
pub use tokenizer::{LexToken, Lexer};
