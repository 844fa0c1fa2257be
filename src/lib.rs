//! A single-user, single-threaded, block-based file system persisted inside a fixed-size
//! backing file (the "virtual disk").
//!
//! The crate's whole reason for existing is the on-disk layout and indirection machinery: a
//! superblock, a flat directory table, an inode bitmap, a used-block bitmap, and an inode table
//! whose records reach their data through 12 direct pointers, one single-indirect pointer, and
//! one double-indirect pointer — in the manner of a minimal ext2-style inode, but flattened to a
//! single namespace with no directories, permissions, or links.
//!
//! [`FileSystem`] is the owned entry point: [`FileSystem::make_fs`] initializes a disk,
//! [`FileSystem::mount_fs`] loads one into memory, and its methods (`create`, `open`, `read`,
//! `write`, `truncate`, `delete`, …) are the rest of the public surface. The [`compat`] module
//! offers the same operations as free functions returning `0`/`-1`, for callers that want the
//! original C-shaped call convention.

pub mod bitmap;
pub mod block;
pub mod compat;
pub mod descriptor;
pub mod diagnostics;
pub mod directory;
pub mod error;
pub mod indirection;
pub mod inode;
pub mod superblock;
pub mod volume;

pub use block::{BlockDevice, FileBlockDevice, MemoryBlockDevice, BLOCK_SIZE, DISK_BLOCKS};
pub use descriptor::{FileDescriptor, MAX_FD};
pub use diagnostics::Diagnostics;
pub use directory::{MAX_FILES, MAX_FILE_NAME_CHAR};
pub use error::FsError;
pub use inode::{DIRECT_OFFSETS_PER_INODE, MAX_FILE_SIZE, POINTERS_PER_BLOCK};
pub use volume::FileSystem;
