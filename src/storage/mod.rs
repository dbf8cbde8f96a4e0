//! File access primitives used by the index layer.
//!
//! - [`RandomAccessStore`] - seekable read/write file with a cursor, used for
//!   header patches and the id map file
//! - [`MappedFile`] - read-only memory map used by query paths

pub mod mapped;
pub mod random_access;

pub use mapped::MappedFile;
pub use random_access::RandomAccessStore;
