//! The mounted volume: ties the superblock, directory table, bitmaps, inode table and
//! descriptor table together into one owned value, and implements every public operation in
//! §4.6–§4.8 on top of it.
//!
//! Per the redesign note in §9, the reference implementation's process-wide globals (superblock,
//! bitmaps, tables, a `bool is_mounted`) collapse here into a single `FileSystem<D>` value.
//! "Not mounted" is simply the absence of one — there is no `is_mounted` flag to drift out of
//! sync with reality.

use std::path::Path;

use crate::bitmap;
use crate::block::{Block, BlockDevice, FileBlockDevice, BLOCK_SIZE, DISK_BLOCKS};
use crate::descriptor::DescriptorTable;
use crate::diagnostics::Diagnostics;
use crate::directory::{DirectoryTable, MAX_FILES, MAX_FILE_NAME_CHAR};
use crate::error::FsError;
use crate::indirection;
use crate::inode::{Inode, InodeTable, MAX_FILE_SIZE};
use crate::superblock::{
	Superblock, DIR_TABLE_BLOCK, INODE_BITMAP_BLOCK, INODE_TABLE_BLOCK, SUPERBLOCK_BLOCK,
	USED_BLOCK_BITMAP_BLOCK,
};

/// Bytes needed to hold one bit per inode.
const INODE_BITMAP_BYTES: usize = (MAX_FILES + 7) / 8;
/// Bytes needed to hold one bit per disk block.
const USED_BLOCK_BITMAP_BYTES: usize = (DISK_BLOCKS + 7) / 8;

fn bitmap_to_block(bytes: &[u8]) -> Block {
	let mut block = [0u8; BLOCK_SIZE];
	block[..bytes.len()].copy_from_slice(bytes);
	block
}

fn bitmap_from_block(block: &Block, out: &mut [u8]) {
	out.copy_from_slice(&block[..out.len()]);
}

fn block_count(size: i32) -> usize {
	if size <= 0 {
		0
	} else {
		((size - 1) / BLOCK_SIZE as i32 + 1) as usize
	}
}

fn validate_name(name: &str) -> Result<(), FsError> {
	if name.is_empty() || name.len() > MAX_FILE_NAME_CHAR {
		return Err(FsError::InvalidName);
	}
	Ok(())
}

/// A mounted volume: in-memory mirrors of the five metadata blocks, the descriptor table, and
/// the block device they are backed by.
pub struct FileSystem<D: BlockDevice> {
	device: D,
	superblock: Superblock,
	directory: DirectoryTable,
	inode_bitmap: [u8; INODE_BITMAP_BYTES],
	used_block_bitmap: [u8; USED_BLOCK_BITMAP_BYTES],
	inodes: InodeTable,
	descriptors: DescriptorTable,
	diagnostics: Diagnostics,
}

impl<D: BlockDevice> FileSystem<D> {
	/// Initializes `device` as a freshly made, empty volume: writes the superblock and marks
	/// blocks `0..METADATA_BLOCKS` used in the block bitmap. Every other metadata block is left
	/// implicitly zero, matching `make_fs`. Returns the device so the caller can either mount it
	/// immediately (as the in-memory test device does) or drop it and reopen the backing path
	/// later (as the real `make_fs`/`mount_fs` split does for [`FileBlockDevice`]).
	pub fn make(mut device: D) -> Result<D, FsError> {
		let superblock = Superblock::initialized();
		device.write_block(SUPERBLOCK_BLOCK, &superblock.to_block())?;

		let mut used_block_bitmap = [0u8; USED_BLOCK_BITMAP_BYTES];
		for b in 0..superblock.data_offset as usize {
			bitmap::set(&mut used_block_bitmap, b, true);
		}
		device.write_block(USED_BLOCK_BITMAP_BLOCK, &bitmap_to_block(&used_block_bitmap))?;

		Ok(device)
	}

	/// Loads the five metadata blocks off `device` into memory. Rejects with
	/// [`FsError::NotInitialized`] if the superblock looks like it was never written by `make`.
	pub fn mount(mut device: D) -> Result<Self, FsError> {
		let mut raw: Block = [0u8; BLOCK_SIZE];

		device.read_block(SUPERBLOCK_BLOCK, &mut raw)?;
		let superblock = Superblock::from_block(&raw);
		if !superblock.is_initialized() {
			return Err(FsError::NotInitialized);
		}

		device.read_block(DIR_TABLE_BLOCK, &mut raw)?;
		let directory = DirectoryTable::from_block(&raw);

		device.read_block(INODE_BITMAP_BLOCK, &mut raw)?;
		let mut inode_bitmap = [0u8; INODE_BITMAP_BYTES];
		bitmap_from_block(&raw, &mut inode_bitmap);

		device.read_block(USED_BLOCK_BITMAP_BLOCK, &mut raw)?;
		let mut used_block_bitmap = [0u8; USED_BLOCK_BITMAP_BYTES];
		bitmap_from_block(&raw, &mut used_block_bitmap);

		device.read_block(INODE_TABLE_BLOCK, &mut raw)?;
		let inodes = InodeTable::from_block(&raw);

		Ok(Self {
			device,
			superblock,
			directory,
			inode_bitmap,
			used_block_bitmap,
			inodes,
			descriptors: DescriptorTable::empty(),
			diagnostics: Diagnostics::default(),
		})
	}

	/// Replaces this volume's diagnostics sink, e.g. to capture rejection messages in a test.
	pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
		self.diagnostics = diagnostics;
		self
	}

	/// Writes the five metadata blocks back to their fixed block numbers, in order, and
	/// consumes the volume, returning the underlying device (dropping it closes the backing
	/// disk). On I/O failure the volume is handed back unchanged, along with the error, since
	/// the reference's partial-failure behavior leaves in-memory state and mount status
	/// untouched.
	pub fn unmount(mut self) -> Result<D, (Self, FsError)> {
		match self.flush_metadata() {
			Ok(()) => {
				self.descriptors.clear_all();
				Ok(self.device)
			}
			Err(e) => Err((self, e)),
		}
	}

	fn flush_metadata(&mut self) -> Result<(), FsError> {
		self.device.write_block(SUPERBLOCK_BLOCK, &self.superblock.to_block())?;
		self.device.write_block(DIR_TABLE_BLOCK, &self.directory.to_block())?;
		self.device
			.write_block(INODE_BITMAP_BLOCK, &bitmap_to_block(&self.inode_bitmap))?;
		self.device
			.write_block(USED_BLOCK_BITMAP_BLOCK, &bitmap_to_block(&self.used_block_bitmap))?;
		self.device.write_block(INODE_TABLE_BLOCK, &self.inodes.to_block())?;
		Ok(())
	}

	fn reject(&self, op: &str, err: FsError) -> FsError {
		self.diagnostics.log(op, &err);
		err
	}

	/// Creates a new, empty regular file named `name`.
	pub fn create(&mut self, name: &str) -> Result<(), FsError> {
		if let Err(e) = validate_name(name) {
			return Err(self.reject("fs_create", e));
		}
		if self.directory.lookup(name).is_some() {
			return Err(self.reject("fs_create", FsError::AlreadyExists));
		}
		let inode_number = match bitmap::first_unset(&self.inode_bitmap, MAX_FILES) {
			Some(i) => i,
			None => return Err(self.reject("fs_create", FsError::DirectoryFull)),
		};
		let data_block = match indirection::claim_unused_data_block(&mut self.used_block_bitmap) {
			Some(b) => b,
			None => return Err(self.reject("fs_create", FsError::DiskFull)),
		};

		bitmap::set(&mut self.inode_bitmap, inode_number, true);
		let mut inode = Inode::empty();
		inode.direct[0] = data_block;
		*self.inodes.get_mut(inode_number) = inode;

		// MAX_FILES bounds both tables identically, so a free inode bit always implies a free
		// directory slot; this is an invariant of the data model, not a runtime race.
		self.directory
			.claim(inode_number as u16, name)
			.expect("directory table and inode bitmap share the same capacity");
		Ok(())
	}

	/// Removes `name`, releasing every block it reaches. Fails if any descriptor still has the
	/// file open.
	pub fn delete(&mut self, name: &str) -> Result<(), FsError> {
		let dir_index = match self.directory.lookup(name) {
			Some(i) => i,
			None => return Err(self.reject("fs_delete", FsError::NotFound)),
		};
		let inode_number = self.directory.get(dir_index).inode_number;
		if self.descriptors.any_open_for_inode(inode_number) {
			return Err(self.reject("fs_delete", FsError::FileOpen));
		}

		let inode = *self.inodes.get(inode_number as usize);
		for &ptr in inode.direct.iter() {
			if ptr != 0 {
				indirection::zero_block(&mut self.device, ptr)?;
				indirection::release_data_block(&mut self.used_block_bitmap, ptr);
			}
		}
		if inode.single_indirect != 0 {
			indirection::release_single_indirect_tree(&mut self.device, &mut self.used_block_bitmap, inode.single_indirect)?;
		}
		if inode.double_indirect != 0 {
			indirection::release_double_indirect_tree(&mut self.device, &mut self.used_block_bitmap, inode.double_indirect)?;
		}

		bitmap::set(&mut self.inode_bitmap, inode_number as usize, false);
		self.directory.clear(dir_index);
		*self.inodes.get_mut(inode_number as usize) = Inode::empty();
		Ok(())
	}

	/// Opens `name` for reading and writing, returning a new file descriptor index.
	pub fn open(&mut self, name: &str) -> Result<usize, FsError> {
		let dir_index = match self.directory.lookup(name) {
			Some(i) => i,
			None => return Err(self.reject("fs_open", FsError::NotFound)),
		};
		let inode_number = self.directory.get(dir_index).inode_number;
		self.descriptors
			.open(inode_number)
			.ok_or_else(|| self.reject("fs_open", FsError::TooManyOpenFiles))
	}

	/// Releases descriptor `fd`.
	pub fn close(&mut self, fd: usize) -> Result<(), FsError> {
		if self.descriptors.close(fd) {
			Ok(())
		} else {
			Err(self.reject("fs_close", FsError::BadDescriptor))
		}
	}

	/// The current size, in bytes, of the file open on `fd`.
	pub fn get_filesize(&mut self, fd: usize) -> Result<i32, FsError> {
		let inode_number = match self.descriptors.get(fd) {
			Some(d) => d.inode_number,
			None => return Err(self.reject("fs_get_filesize", FsError::BadDescriptor)),
		};
		Ok(self.inodes.get(inode_number as usize).file_size)
	}

	/// Moves `fd`'s seek offset to `offset`, which must land within `[0, file_size]`.
	pub fn lseek(&mut self, fd: usize, offset: i32) -> Result<(), FsError> {
		let inode_number = match self.descriptors.get(fd) {
			Some(d) => d.inode_number,
			None => return Err(self.reject("fs_lseek", FsError::BadDescriptor)),
		};
		let file_size = self.inodes.get(inode_number as usize).file_size;
		if offset < 0 || offset > file_size {
			return Err(self.reject("fs_lseek", FsError::InvalidOffset));
		}
		self.descriptors.get_mut(fd).expect("checked above").offset = offset;
		Ok(())
	}

	/// The name of every file currently present, in directory-entry order.
	pub fn list_files(&self) -> Vec<String> {
		self.directory.used_names()
	}

	/// Reads up to `buf.len()` bytes starting at `fd`'s current offset, advancing it by the
	/// number of bytes actually copied.
	pub fn read(&mut self, fd: usize, buf: &mut [u8]) -> Result<usize, FsError> {
		let descriptor = match self.descriptors.get(fd) {
			Some(d) => *d,
			None => return Err(self.reject("fs_read", FsError::BadDescriptor)),
		};
		let inode = *self.inodes.get(descriptor.inode_number as usize);

		let remaining = (inode.file_size - descriptor.offset).max(0) as usize;
		let effective_len = buf.len().min(remaining);

		let mut copied = 0usize;
		let mut cur_offset = descriptor.offset;
		while copied < effective_len {
			let block_number = indirection::data_block_of(&mut self.device, &inode, cur_offset)?;
			debug_assert_ne!(block_number, 0, "dense prefix invariant violated within file_size");

			let mut block: Block = [0u8; BLOCK_SIZE];
			self.device.read_block(block_number, &mut block)?;

			let within = cur_offset as usize % BLOCK_SIZE;
			let n = (BLOCK_SIZE - within).min(effective_len - copied);
			buf[copied..copied + n].copy_from_slice(&block[within..within + n]);

			copied += n;
			cur_offset += n as i32;
		}

		self.descriptors.get_mut(fd).expect("checked above").offset = cur_offset;
		Ok(copied)
	}

	/// Writes up to `buf.len()` bytes at `fd`'s current offset, allocating new data blocks (and
	/// indirect tables) as needed, clamped to `MAX_FILE_SIZE`. Advances the offset and grows
	/// `file_size` by the number of bytes actually copied.
	pub fn write(&mut self, fd: usize, buf: &[u8]) -> Result<usize, FsError> {
		let descriptor = match self.descriptors.get(fd) {
			Some(d) => *d,
			None => return Err(self.reject("fs_write", FsError::BadDescriptor)),
		};
		let mut inode = *self.inodes.get(descriptor.inode_number as usize);

		let room = (MAX_FILE_SIZE - descriptor.offset).max(0) as usize;
		let effective_len = buf.len().min(room);

		let mut copied = 0usize;
		let mut cur_offset = descriptor.offset;
		while copied < effective_len {
			let mut block_number = indirection::data_block_of(&mut self.device, &inode, cur_offset)?;
			if block_number == 0 {
				let claimed = match indirection::claim_unused_data_block(&mut self.used_block_bitmap) {
					Some(b) => b,
					None => break,
				};
				if let Err(e) = indirection::attach_block(&mut self.device, &mut self.used_block_bitmap, &mut inode, claimed) {
					indirection::release_data_block(&mut self.used_block_bitmap, claimed);
					if matches!(e, FsError::DiskFull) {
						break;
					}
					return Err(e);
				}
				block_number = claimed;
			}

			let mut block: Block = [0u8; BLOCK_SIZE];
			self.device.read_block(block_number, &mut block)?;

			let within = cur_offset as usize % BLOCK_SIZE;
			let n = (BLOCK_SIZE - within).min(effective_len - copied);
			block[within..within + n].copy_from_slice(&buf[copied..copied + n]);
			self.device.write_block(block_number, &block)?;

			copied += n;
			cur_offset += n as i32;
		}

		inode.file_size = inode.file_size.max(cur_offset);
		*self.inodes.get_mut(descriptor.inode_number as usize) = inode;
		self.descriptors.get_mut(fd).expect("checked above").offset = cur_offset;
		Ok(copied)
	}

	/// Shrinks the file open on `fd` to `length` bytes, releasing every block that falls
	/// entirely beyond it and zeroing the unused tail of the block straddling the new boundary.
	/// Releases a single- or double-indirect table only once every block it reaches has been
	/// freed (see the redesign note in §9 — the reference eagerly released whole trees).
	pub fn truncate(&mut self, fd: usize, length: i32) -> Result<(), FsError> {
		let descriptor = match self.descriptors.get(fd) {
			Some(d) => *d,
			None => return Err(self.reject("fs_truncate", FsError::BadDescriptor)),
		};
		let inode_number = descriptor.inode_number as usize;
		let old_size = self.inodes.get(inode_number).file_size;
		if length < 0 || length > old_size {
			return Err(self.reject("fs_truncate", FsError::InvalidOffset));
		}

		let old_blocks = block_count(old_size);
		let keep_blocks = block_count(length);

		let mut inode = *self.inodes.get(inode_number);
		if keep_blocks < old_blocks {
			indirection::release_range(&mut self.device, &mut self.used_block_bitmap, &mut inode, keep_blocks, old_blocks)?;
		}

		let remainder = length % BLOCK_SIZE as i32;
		if remainder != 0 {
			let block_number = indirection::data_block_of(&mut self.device, &inode, length)?;
			if block_number != 0 {
				let mut block: Block = [0u8; BLOCK_SIZE];
				self.device.read_block(block_number, &mut block)?;
				for byte in block[remainder as usize..].iter_mut() {
					*byte = 0;
				}
				self.device.write_block(block_number, &block)?;
			}
		}

		inode.file_size = length;
		*self.inodes.get_mut(inode_number) = inode;
		let descriptor = self.descriptors.get_mut(fd).expect("checked above");
		descriptor.offset = descriptor.offset.min(length);
		Ok(())
	}
}

impl FileSystem<FileBlockDevice> {
	/// Creates (or replaces) the backing disk at `path` and initializes it as an empty volume.
	/// Mirrors `make_fs(disk_name)`.
	pub fn make_fs(path: impl AsRef<Path>) -> Result<(), FsError> {
		let device = FileBlockDevice::create(path)?;
		Self::make(device)?;
		Ok(())
	}

	/// Opens the disk at `path` and mounts it. Mirrors `mount_fs(disk_name)`.
	pub fn mount_fs(path: impl AsRef<Path>) -> Result<Self, FsError> {
		let device = FileBlockDevice::open(path)?;
		Self::mount(device)
	}

	/// Flushes metadata and closes the backing disk. Mirrors `umount_fs(disk_name)`.
	pub fn umount_fs(self) -> Result<(), (Self, FsError)> {
		self.unmount().map(|_device| ())
	}
}


#[cfg(test)]
mod test {
	use super::testing::fresh_volume;
	use super::*;
	use crate::block::MemoryBlockDevice;

	#[test]
	fn create_then_lookup_via_open() {
		let mut fs = fresh_volume();
		fs.create("a").unwrap();
		let fd = fs.open("a").unwrap();
		assert_eq!(fs.get_filesize(fd).unwrap(), 0);
	}

	#[test]
	fn create_rejects_duplicate_and_bad_names() {
		let mut fs = fresh_volume();
		fs.create("a").unwrap();
		assert!(matches!(fs.create("a"), Err(FsError::AlreadyExists)));
		assert!(matches!(fs.create(""), Err(FsError::InvalidName)));
		assert!(matches!(fs.create(&"x".repeat(17)), Err(FsError::InvalidName)));
	}

	#[test]
	fn round_trip_write_then_read() {
		let mut fs = fresh_volume();
		fs.create("f").unwrap();
		let fd = fs.open("f").unwrap();

		let data = vec![b'a'; 10_000];
		assert_eq!(fs.write(fd, &data).unwrap(), data.len());
		assert_eq!(fs.get_filesize(fd).unwrap() as usize, data.len());

		fs.lseek(fd, 0).unwrap();
		let mut out = vec![0u8; data.len()];
		assert_eq!(fs.read(fd, &mut out).unwrap(), data.len());
		assert_eq!(out, data);
	}

	#[test]
	fn overwrite_window_matches_spec_s2() {
		let mut fs = fresh_volume();
		fs.create("f").unwrap();
		let fd = fs.open("f").unwrap();

		let mut expected = vec![b'a'; 1_000_000];
		fs.write(fd, &expected).unwrap();

		fs.lseek(fd, 500).unwrap();
		let patch = vec![b'b'; 100];
		fs.write(fd, &patch).unwrap();
		expected[500..600].copy_from_slice(&patch);

		fs.lseek(fd, 0).unwrap();
		let mut out = vec![0u8; expected.len()];
		fs.read(fd, &mut out).unwrap();
		assert_eq!(out, expected);
	}

	#[test]
	fn delete_is_gated_by_open_descriptors() {
		let mut fs = fresh_volume();
		fs.create("f").unwrap();
		let fd = fs.open("f").unwrap();

		assert!(matches!(fs.delete("f"), Err(FsError::FileOpen)));
		fs.close(fd).unwrap();
		fs.delete("f").unwrap();
		assert!(matches!(fs.delete("f"), Err(FsError::NotFound)));
	}

	#[test]
	fn delete_returns_bitmaps_to_their_pristine_state() {
		let mut fs = fresh_volume();
		let inode_bitmap_before = fs.inode_bitmap;
		let used_block_bitmap_before = fs.used_block_bitmap;

		fs.create("f").unwrap();
		let fd = fs.open("f").unwrap();
		fs.write(fd, &vec![b'x'; 100_000]).unwrap();
		fs.close(fd).unwrap();
		fs.delete("f").unwrap();

		assert_eq!(fs.inode_bitmap, inode_bitmap_before);
		assert_eq!(fs.used_block_bitmap, used_block_bitmap_before);
	}

	#[test]
	fn descriptor_exhaustion_s1() {
		let mut fs = fresh_volume();
		fs.create("f").unwrap();

		let mut fds = Vec::new();
		for _ in 0..32 {
			fds.push(fs.open("f").unwrap());
		}
		assert!(matches!(fs.open("f"), Err(FsError::TooManyOpenFiles)));

		for fd in fds {
			fs.close(fd).unwrap();
		}
		assert!(fs.open("f").is_ok());
	}

	#[test]
	fn descriptors_to_the_same_file_are_independent() {
		let mut fs = fresh_volume();
		fs.create("f").unwrap();
		fs.open("f").unwrap();
		let fd_a = fs.open("f").unwrap();
		let fd_b = fs.open("f").unwrap();

		fs.write(fd_a, b"hello world").unwrap();
		fs.lseek(fd_a, 0).unwrap();

		assert_eq!(fs.get_filesize(fd_b).unwrap(), 11);
		let mut buf = [0u8; 5];
		fs.lseek(fd_b, 6).unwrap();
		assert_eq!(fs.read(fd_b, &mut buf).unwrap(), 5);
		assert_eq!(&buf, b"world");
	}

	#[test]
	fn truncate_shrinks_size_and_clamps_offset() {
		let mut fs = fresh_volume();
		fs.create("t").unwrap();
		let fd = fs.open("t").unwrap();
		fs.write(fd, b"hello world\0").unwrap();

		fs.truncate(fd, 5).unwrap();
		assert_eq!(fs.get_filesize(fd).unwrap(), 5);

		fs.lseek(fd, 5).unwrap();
		let mut buf = [0u8; 10];
		assert_eq!(fs.read(fd, &mut buf).unwrap(), 0);
	}

	#[test]
	fn truncate_is_idempotent() {
		let mut fs = fresh_volume();
		fs.create("t").unwrap();
		let fd = fs.open("t").unwrap();
		fs.write(fd, &vec![b'z'; 50_000]).unwrap();

		fs.truncate(fd, 12_345).unwrap();
		let inodes_after_first = fs.inodes.clone();
		let bitmap_after_first = fs.used_block_bitmap;

		fs.truncate(fd, 12_345).unwrap();
		assert_eq!(fs.get_filesize(fd).unwrap(), 12_345);
		assert_eq!(fs.used_block_bitmap, bitmap_after_first);
		assert_eq!(fs.inodes.get(0).file_size, inodes_after_first.get(0).file_size);
	}

	#[test]
	fn truncate_keeps_indirect_tables_with_live_entries() {
		let mut fs = fresh_volume();
		fs.create("big").unwrap();
		let fd = fs.open("big").unwrap();
		// Two full single-indirect blocks' worth, so there is a table with both live and
		// soon-to-be-released entries.
		let size = (12 + 100) * BLOCK_SIZE;
		fs.write(fd, &vec![b'd'; size]).unwrap();

		let inode_number = fs.descriptors.get(fd).unwrap().inode_number;
		let table_block = fs.inodes.get(inode_number as usize).single_indirect;
        assert_ne!(table_block, 0);

		// Truncate to keep only 20 blocks past the direct range: the single-indirect table
		// still reaches live data and must survive.
		fs.truncate(fd, ((12 + 20) * BLOCK_SIZE) as i32).unwrap();
		assert_eq!(fs.inodes.get(inode_number as usize).single_indirect, table_block);

		// Truncate down into the direct range entirely: the table no longer reaches anything
		// live and must be released.
		fs.truncate(fd, (5 * BLOCK_SIZE) as i32).unwrap();
		assert_eq!(fs.inodes.get(inode_number as usize).single_indirect, 0);
		assert!(!bitmap::test(&fs.used_block_bitmap, table_block as usize));
	}

	#[test]
	fn double_indirect_write_and_read_back_s3() {
		let mut fs = fresh_volume();
		fs.create("big").unwrap();
		let fd = fs.open("big").unwrap();

		let size = MAX_FILE_SIZE as usize;
		let data = vec![b'd'; size];
		assert_eq!(fs.write(fd, &data).unwrap(), size);
		assert_eq!(fs.get_filesize(fd).unwrap() as usize, size);

		fs.lseek(fd, 0).unwrap();
		let mut out = vec![0u8; size];
		assert_eq!(fs.read(fd, &mut out).unwrap(), size);
		assert_eq!(out, data);
	}

	#[test]
	fn write_past_max_file_size_is_clamped() {
		let mut fs = fresh_volume();
		fs.create("f").unwrap();
		let fd = fs.open("f").unwrap();

		let data = vec![b'z'; MAX_FILE_SIZE as usize + 4096];
		let written = fs.write(fd, &data).unwrap();
		assert_eq!(written, MAX_FILE_SIZE as usize);
		assert_eq!(fs.get_filesize(fd).unwrap(), MAX_FILE_SIZE);
	}

	#[test]
	fn lseek_rejects_out_of_range_offsets() {
		let mut fs = fresh_volume();
		fs.create("f").unwrap();
		let fd = fs.open("f").unwrap();
		fs.write(fd, b"hello").unwrap();

		assert!(matches!(fs.lseek(fd, -1), Err(FsError::InvalidOffset)));
		assert!(matches!(fs.lseek(fd, 6), Err(FsError::InvalidOffset)));
		assert!(fs.lseek(fd, 5).is_ok());
	}

	#[test]
	fn list_files_reports_every_used_entry() {
		let mut fs = fresh_volume();
		fs.create("a").unwrap();
		fs.create("b").unwrap();
		let mut names = fs.list_files();
		names.sort();
		assert_eq!(names, vec!["a".to_owned(), "b".to_owned()]);
	}

	#[test]
	fn persistence_across_unmount_and_remount() {
		let device = FileSystem::make(MemoryBlockDevice::new()).unwrap();
		let mut fs = FileSystem::mount(device).unwrap();
		fs.create("p").unwrap();
		let fd = fs.open("p").unwrap();
		fs.write(fd, b"hello world\0").unwrap();
		fs.close(fd).unwrap();
		let device = fs.unmount().unwrap();

		let mut fs = FileSystem::mount(device).unwrap();
		let fd = fs.open("p").unwrap();
		let mut buf = [0u8; 12];
		assert_eq!(fs.read(fd, &mut buf).unwrap(), 12);
		assert_eq!(&buf, b"hello world\0");
	}

	#[test]
	fn bad_descriptor_is_rejected_uniformly() {
		let mut fs = fresh_volume();
		assert!(matches!(fs.close(0), Err(FsError::BadDescriptor)));
		assert!(matches!(fs.get_filesize(0), Err(FsError::BadDescriptor)));
		assert!(matches!(fs.lseek(0, 0), Err(FsError::BadDescriptor)));
		assert!(matches!(fs.truncate(0, 0), Err(FsError::BadDescriptor)));
	}

	#[test]
	fn directory_full_once_every_inode_is_claimed() {
		let mut fs = fresh_volume();
		for i in 0..MAX_FILES {
			fs.create(&format!("f{i}")).unwrap();
		}
		assert!(matches!(fs.create("overflow"), Err(FsError::DirectoryFull)));

		fs.delete("f0").unwrap();
		assert!(fs.create("overflow").is_ok());
	}

	#[test]
	fn write_reports_bytes_written_when_disk_fills_mid_transfer() {
		let mut fs = fresh_volume();
		fs.create("hog").unwrap();
		let hog_fd = fs.open("hog").unwrap();
		// Drive the used-block bitmap to near-exhaustion through ordinary writes, leaving only a
		// handful of blocks free for the file under test.
		let free_before = (0..DISK_BLOCKS).filter(|&b| !bitmap::test(&fs.used_block_bitmap, b)).count();
		let spare_blocks = 3;
		let filler_len = (free_before - spare_blocks) * BLOCK_SIZE;
		fs.write(hog_fd, &vec![b'h'; filler_len]).unwrap();

		fs.create("f").unwrap();
		let fd = fs.open("f").unwrap();
		let attempted = 10 * BLOCK_SIZE;
		let written = fs.write(fd, &vec![b'z'; attempted]).unwrap();

		assert!(written < attempted);
		assert_eq!(written % BLOCK_SIZE, 0, "only whole flushed blocks are counted");
		assert_eq!(fs.get_filesize(fd).unwrap() as usize, written);
		assert!(bitmap::is_all_ones(&fs.used_block_bitmap, DISK_BLOCKS));
	}
}
