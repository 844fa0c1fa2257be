//! The block I/O shim: fixed-size reads and writes against the virtual disk.
//!
//! `BlockDevice` plays the role the reference implementation gives to `make_disk`/`open_disk`/
//! `read_block`/`write_block`: a trait boundary rather than a concrete type lets the rest of the
//! crate stay oblivious to whether blocks land on the host filesystem or in memory.

use crate::error::FsError;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Bytes per disk block.
pub const BLOCK_SIZE: usize = 4096;
/// Total number of blocks on the disk.
pub const DISK_BLOCKS: usize = 8192;

/// A single disk block's worth of bytes.
pub type Block = [u8; BLOCK_SIZE];

/// A fixed-geometry block device: `DISK_BLOCKS` blocks of `BLOCK_SIZE` bytes each.
///
/// Implementors only need to move bytes; every precondition (mounted, in-range block number,
/// …) is enforced by the volume layer above this trait.
pub trait BlockDevice: Send {
	/// Reads block `n` into `buf`.
	fn read_block(&mut self, n: u16, buf: &mut Block) -> io::Result<()>;
	/// Writes `buf` to block `n`.
	fn write_block(&mut self, n: u16, buf: &Block) -> io::Result<()>;
}

/// A block device backed by a regular file on the host filesystem.
///
/// Block `n` lives at byte offset `n * BLOCK_SIZE`, exactly as in the reference `mkfs`-style
/// tools that seek into a device file and issue `read_exact`/`write_all`.
pub struct FileBlockDevice {
	file: File,
}

impl FileBlockDevice {
	/// Creates (or truncates) the backing file at `path` to exactly `DISK_BLOCKS * BLOCK_SIZE`
	/// zeroed bytes and returns a device open on it. Mirrors `make_disk`.
	pub fn create(path: impl AsRef<Path>) -> Result<Self, FsError> {
		let file = OpenOptions::new()
			.read(true)
			.write(true)
			.create(true)
			.truncate(true)
			.open(path)?;
		file.set_len((DISK_BLOCKS * BLOCK_SIZE) as u64)?;
		Ok(Self { file })
	}

	/// Opens an existing backing file at `path`. Mirrors `open_disk`.
	pub fn open(path: impl AsRef<Path>) -> Result<Self, FsError> {
		let file = OpenOptions::new().read(true).write(true).open(path)?;
		Ok(Self { file })
	}

	fn offset_of(n: u16) -> u64 {
		n as u64 * BLOCK_SIZE as u64
	}
}

impl BlockDevice for FileBlockDevice {
	fn read_block(&mut self, n: u16, buf: &mut Block) -> io::Result<()> {
		self.file.seek(SeekFrom::Start(Self::offset_of(n)))?;
		self.file.read_exact(buf)
	}

	fn write_block(&mut self, n: u16, buf: &Block) -> io::Result<()> {
		self.file.seek(SeekFrom::Start(Self::offset_of(n)))?;
		self.file.write_all(buf)
	}
}

/// An in-memory block device, used by the crate's own test suite so it never touches the host
/// filesystem.
pub struct MemoryBlockDevice {
	blocks: Vec<Block>,
}

impl MemoryBlockDevice {
	/// Builds a zero-filled device of `DISK_BLOCKS` blocks.
	pub fn new() -> Self {
		Self {
			blocks: vec![[0u8; BLOCK_SIZE]; DISK_BLOCKS],
		}
	}
}

impl Default for MemoryBlockDevice {
	fn default() -> Self {
		Self::new()
	}
}

impl BlockDevice for MemoryBlockDevice {
	fn read_block(&mut self, n: u16, buf: &mut Block) -> io::Result<()> {
		buf.copy_from_slice(&self.blocks[n as usize]);
		Ok(())
	}

	fn write_block(&mut self, n: u16, buf: &Block) -> io::Result<()> {
		self.blocks[n as usize].copy_from_slice(buf);
		Ok(())
	}
}
