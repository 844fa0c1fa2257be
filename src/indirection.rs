//! The inode ⇄ data-block mapping: turning a byte offset into a block number, and growing an
//! inode's address list one block at a time.
//!
//! Pointer blocks (single- and double-indirect tables) are plain arrays of `u16` entries read
//! and written wholesale, exactly as the reference implementation treats an indirect block as
//! `uint16_t ptrs[POINTERS_PER_BLOCK]`. There is no persistent in-memory pointer graph — every
//! traversal re-reads the block it needs and nothing is cached across calls, per the
//! one-scratch-buffer discipline of §5.

use crate::bitmap;
use crate::block::{Block, BlockDevice, BLOCK_SIZE, DISK_BLOCKS};
use crate::error::FsError;
use crate::inode::{Inode, DIRECT_OFFSETS_PER_INODE, POINTERS_PER_BLOCK};

/// One indirect block's worth of 16-bit pointers.
type Pointers = [u16; POINTERS_PER_BLOCK];

fn read_pointers(device: &mut dyn BlockDevice, block_number: u16) -> Result<Pointers, FsError> {
	let mut raw: Block = [0u8; BLOCK_SIZE];
	device.read_block(block_number, &mut raw)?;
	let mut ptrs = [0u16; POINTERS_PER_BLOCK];
	for (i, p) in ptrs.iter_mut().enumerate() {
		*p = u16::from_le_bytes([raw[i * 2], raw[i * 2 + 1]]);
	}
	Ok(ptrs)
}

fn write_pointers(device: &mut dyn BlockDevice, block_number: u16, ptrs: &Pointers) -> Result<(), FsError> {
	let mut raw: Block = [0u8; BLOCK_SIZE];
	for (i, p) in ptrs.iter().enumerate() {
		raw[i * 2..i * 2 + 2].copy_from_slice(&p.to_le_bytes());
	}
	device.write_block(block_number, &raw)?;
	Ok(())
}

/// Overwrites block `n` with zero bytes, as `delete`/`truncate` do to a released block.
pub fn zero_block(device: &mut dyn BlockDevice, block_number: u16) -> Result<(), FsError> {
	device.write_block(block_number, &[0u8; BLOCK_SIZE])?;
	Ok(())
}

/// Scans the used-block bitmap for the lowest-indexed free block and claims it.
///
/// Blocks `0..METADATA_BLOCKS` are permanently set (Invariant 7 of the data model), so scanning
/// from the start of the bitmap and scanning from `data_offset` are equivalent; this mirrors the
/// reference's `claim_unused_data_block` without needing the offset as a parameter.
pub fn claim_unused_data_block(used_bitmap: &mut [u8]) -> Option<u16> {
	let idx = bitmap::first_unset(used_bitmap, DISK_BLOCKS)?;
	bitmap::set(used_bitmap, idx, true);
	Some(idx as u16)
}

/// Releases block `n` back to the free pool. Does not touch its contents; callers that must
/// zero the block's on-disk data call [`zero_block`] first.
pub fn release_data_block(used_bitmap: &mut [u8], block_number: u16) {
	bitmap::set(used_bitmap, block_number as usize, false);
}

/// Maps a byte offset within `inode`'s file to the data block that holds it.
///
/// Returns `Ok(0)` when the logical block has not been allocated yet (a hole beyond the current
/// dense prefix, or — during `write` — the very next block about to be attached).
pub fn data_block_of(device: &mut dyn BlockDevice, inode: &Inode, file_offset: i32) -> Result<u16, FsError> {
	let b = (file_offset / BLOCK_SIZE as i32) as usize;

	if b < DIRECT_OFFSETS_PER_INODE {
		return Ok(inode.direct[b]);
	}
	let b1 = b - DIRECT_OFFSETS_PER_INODE;

	if b1 < POINTERS_PER_BLOCK {
		if inode.single_indirect == 0 {
			return Ok(0);
		}
		let ptrs = read_pointers(device, inode.single_indirect)?;
		return Ok(ptrs[b1]);
	}
	let b2 = b1 - POINTERS_PER_BLOCK;

	if inode.double_indirect == 0 {
		return Ok(0);
	}
	let top = read_pointers(device, inode.double_indirect)?;
	let sub_idx = b2 / POINTERS_PER_BLOCK;
	debug_assert!(sub_idx < POINTERS_PER_BLOCK, "offset exceeds MAX_FILE_SIZE reach");
	let sub_block = top[sub_idx];
	if sub_block == 0 {
		return Ok(0);
	}
	let sub = read_pointers(device, sub_block)?;
	Ok(sub[b2 % POINTERS_PER_BLOCK])
}

/// Appends `block_number` — already claimed by the caller — to `inode`'s address list in dense
/// order, allocating single- and double-indirect tables on demand.
///
/// Mirrors §4.5 of the design: try the twelve direct slots, then the single-indirect table
/// (creating it if absent), then the double-indirect tree (creating the top table and/or a
/// subtable as needed). Returns [`FsError::DiskFull`] once every level is exhausted.
pub fn attach_block(
	device: &mut dyn BlockDevice,
	used_bitmap: &mut [u8],
	inode: &mut Inode,
	block_number: u16,
) -> Result<(), FsError> {
	for slot in inode.direct.iter_mut() {
		if *slot == 0 {
			*slot = block_number;
			return Ok(());
		}
	}

	if inode.single_indirect == 0 {
		let table_block = claim_unused_data_block(used_bitmap).ok_or(FsError::DiskFull)?;
		let mut ptrs = [0u16; POINTERS_PER_BLOCK];
		ptrs[0] = block_number;
		write_pointers(device, table_block, &ptrs)?;
		inode.single_indirect = table_block;
		return Ok(());
	}
	let mut single = read_pointers(device, inode.single_indirect)?;
	if let Some(slot) = single.iter().position(|&p| p == 0) {
		single[slot] = block_number;
		write_pointers(device, inode.single_indirect, &single)?;
		return Ok(());
	}

	if inode.double_indirect == 0 {
		let top_block = claim_unused_data_block(used_bitmap).ok_or(FsError::DiskFull)?;
		let sub_block = match claim_unused_data_block(used_bitmap) {
			Some(b) => b,
			None => {
				release_data_block(used_bitmap, top_block);
				return Err(FsError::DiskFull);
			}
		};
		let mut top = [0u16; POINTERS_PER_BLOCK];
		let mut sub = [0u16; POINTERS_PER_BLOCK];
		top[0] = sub_block;
		sub[0] = block_number;
		write_pointers(device, sub_block, &sub)?;
		write_pointers(device, top_block, &top)?;
		inode.double_indirect = top_block;
		return Ok(());
	}

	let mut top = read_pointers(device, inode.double_indirect)?;
	for i in 0..POINTERS_PER_BLOCK {
		if top[i] == 0 {
			let sub_block = claim_unused_data_block(used_bitmap).ok_or(FsError::DiskFull)?;
			let mut sub = [0u16; POINTERS_PER_BLOCK];
			sub[0] = block_number;
			write_pointers(device, sub_block, &sub)?;
			top[i] = sub_block;
			write_pointers(device, inode.double_indirect, &top)?;
			return Ok(());
		}
		let mut sub = read_pointers(device, top[i])?;
		if let Some(slot) = sub.iter().position(|&p| p == 0) {
			sub[slot] = block_number;
			write_pointers(device, top[i], &sub)?;
			return Ok(());
		}
	}

	Err(FsError::DiskFull)
}

/// Releases every data block reachable through `inode`'s single-indirect table, then the table
/// block itself. Used by `delete`, which always releases the whole tree.
pub fn release_single_indirect_tree(
	device: &mut dyn BlockDevice,
	used_bitmap: &mut [u8],
	table_block: u16,
) -> Result<(), FsError> {
	let ptrs = read_pointers(device, table_block)?;
	for &p in ptrs.iter() {
		if p != 0 {
			zero_block(device, p)?;
			release_data_block(used_bitmap, p);
		}
	}
	zero_block(device, table_block)?;
	release_data_block(used_bitmap, table_block);
	Ok(())
}

/// Releases every subtable (and the data blocks each reaches) under `inode`'s double-indirect
/// table, then the top table itself. Used by `delete`, which always releases the whole tree.
pub fn release_double_indirect_tree(
	device: &mut dyn BlockDevice,
	used_bitmap: &mut [u8],
	top_block: u16,
) -> Result<(), FsError> {
	let top = read_pointers(device, top_block)?;
	for &sub in top.iter() {
		if sub != 0 {
			release_single_indirect_tree(device, used_bitmap, sub)?;
		}
	}
	zero_block(device, top_block)?;
	release_data_block(used_bitmap, top_block);
	Ok(())
}

/// Releases every block an inode reaches over logical-block-index range `[from, to)`, clearing
/// the pointers that reached them, and releases a single- or double-indirect table once none of
/// its surviving entries point anywhere — never eagerly, unlike the reference implementation
/// (see the redesign note in §9 of the design: truncate must not discard a table that still
/// reaches live data under the new length).
pub fn release_range(
	device: &mut dyn BlockDevice,
	used_bitmap: &mut [u8],
	inode: &mut Inode,
	from: usize,
	to: usize,
) -> Result<(), FsError> {
	let direct_to = to.min(DIRECT_OFFSETS_PER_INODE);
	for b in from.min(direct_to)..direct_to {
		let ptr = inode.direct[b];
		if ptr != 0 {
			zero_block(device, ptr)?;
			release_data_block(used_bitmap, ptr);
			inode.direct[b] = 0;
		}
	}
	if to <= DIRECT_OFFSETS_PER_INODE {
		return Ok(());
	}

	let single_to = (to - DIRECT_OFFSETS_PER_INODE).min(POINTERS_PER_BLOCK);
	if single_to > 0 && inode.single_indirect != 0 {
		let single_from = from.saturating_sub(DIRECT_OFFSETS_PER_INODE).min(single_to);
		let mut table = read_pointers(device, inode.single_indirect)?;
		for p in table.iter_mut().take(single_to).skip(single_from) {
			if *p != 0 {
				zero_block(device, *p)?;
				release_data_block(used_bitmap, *p);
				*p = 0;
			}
		}
		if table.iter().all(|&p| p == 0) {
			zero_block(device, inode.single_indirect)?;
			release_data_block(used_bitmap, inode.single_indirect);
			inode.single_indirect = 0;
		} else {
			write_pointers(device, inode.single_indirect, &table)?;
		}
	}
	if to <= DIRECT_OFFSETS_PER_INODE + POINTERS_PER_BLOCK {
		return Ok(());
	}

	let base = DIRECT_OFFSETS_PER_INODE + POINTERS_PER_BLOCK;
	let double_to = to - base;
	if double_to > 0 && inode.double_indirect != 0 {
		let double_from = from.saturating_sub(base);
		let mut top = read_pointers(device, inode.double_indirect)?;
		let mut top_dirty = false;

		let sub_from_idx = double_from / POINTERS_PER_BLOCK;
		let sub_to_idx = (double_to - 1) / POINTERS_PER_BLOCK;
		for sub_idx in sub_from_idx..=sub_to_idx {
			let sub_block = top[sub_idx];
			if sub_block == 0 {
				continue;
			}
			let lo = if sub_idx == sub_from_idx {
				double_from % POINTERS_PER_BLOCK
			} else {
				0
			};
			let hi = if sub_idx == sub_to_idx {
				(double_to - 1) % POINTERS_PER_BLOCK + 1
			} else {
				POINTERS_PER_BLOCK
			};

			let mut sub = read_pointers(device, sub_block)?;
			for p in sub.iter_mut().take(hi).skip(lo) {
				if *p != 0 {
					zero_block(device, *p)?;
					release_data_block(used_bitmap, *p);
					*p = 0;
				}
			}
			if sub.iter().all(|&p| p == 0) {
				zero_block(device, sub_block)?;
				release_data_block(used_bitmap, sub_block);
				top[sub_idx] = 0;
				top_dirty = true;
			} else {
				write_pointers(device, sub_block, &sub)?;
			}
		}

		if top.iter().all(|&p| p == 0) {
			zero_block(device, inode.double_indirect)?;
			release_data_block(used_bitmap, inode.double_indirect);
			inode.double_indirect = 0;
		} else if top_dirty {
			write_pointers(device, inode.double_indirect, &top)?;
		}
	}

	Ok(())
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::block::MemoryBlockDevice;

	fn claim_n(bitmap: &mut [u8], n: usize) -> Vec<u16> {
		(0..n).map(|_| claim_unused_data_block(bitmap).unwrap()).collect()
	}

	#[test]
	fn direct_blocks_fill_before_indirect() {
		let mut dev = MemoryBlockDevice::new();
		let mut bitmap = [0u8; DISK_BLOCKS / 8];
		for b in 0..5 {
			bitmap::set(&mut bitmap, b, true);
		}
		let mut inode = Inode::empty();

		let blocks = claim_n(&mut bitmap, DIRECT_OFFSETS_PER_INODE);
		for &b in &blocks {
			attach_block(&mut dev, &mut bitmap, &mut inode, b).unwrap();
		}
		assert_eq!(inode.direct, blocks.as_slice());
		assert_eq!(inode.single_indirect, 0);
	}

	#[test]
	fn thirteenth_block_creates_single_indirect() {
		let mut dev = MemoryBlockDevice::new();
		let mut bitmap = [0u8; DISK_BLOCKS / 8];
		for b in 0..5 {
			bitmap::set(&mut bitmap, b, true);
		}
		let mut inode = Inode::empty();
		for _ in 0..DIRECT_OFFSETS_PER_INODE {
			let b = claim_unused_data_block(&mut bitmap).unwrap();
			attach_block(&mut dev, &mut bitmap, &mut inode, b).unwrap();
		}

		let extra = claim_unused_data_block(&mut bitmap).unwrap();
		attach_block(&mut dev, &mut bitmap, &mut inode, extra).unwrap();
		assert_ne!(inode.single_indirect, 0);

		let offset = (DIRECT_OFFSETS_PER_INODE as i32) * BLOCK_SIZE as i32;
		assert_eq!(data_block_of(&mut dev, &inode, offset).unwrap(), extra);
	}

	#[test]
	fn data_block_of_reports_holes_as_zero() {
		let mut dev = MemoryBlockDevice::new();
		let inode = Inode::empty();
		assert_eq!(data_block_of(&mut dev, &inode, 0).unwrap(), 0);
		assert_eq!(
			data_block_of(&mut dev, &inode, (DIRECT_OFFSETS_PER_INODE as i32) * BLOCK_SIZE as i32).unwrap(),
			0
		);
	}

	#[test]
	fn double_indirect_round_trip() {
		let mut dev = MemoryBlockDevice::new();
		let mut bitmap = [0u8; DISK_BLOCKS / 8];
		for b in 0..5 {
			bitmap::set(&mut bitmap, b, true);
		}
		let mut inode = Inode::empty();
		let total = DIRECT_OFFSETS_PER_INODE + POINTERS_PER_BLOCK + 3;
		let mut claimed = Vec::new();
		for _ in 0..total {
			let b = claim_unused_data_block(&mut bitmap).unwrap();
			attach_block(&mut dev, &mut bitmap, &mut inode, b).unwrap();
			claimed.push(b);
		}
		assert_ne!(inode.double_indirect, 0);

		let last_offset = ((total - 1) as i32) * BLOCK_SIZE as i32;
		assert_eq!(data_block_of(&mut dev, &inode, last_offset).unwrap(), claimed[total - 1]);
	}

	#[test]
	fn release_single_indirect_tree_frees_everything() {
		let mut dev = MemoryBlockDevice::new();
		let mut bitmap = [0u8; DISK_BLOCKS / 8];
		for b in 0..5 {
			bitmap::set(&mut bitmap, b, true);
		}
		let mut inode = Inode::empty();
		for _ in 0..DIRECT_OFFSETS_PER_INODE + 3 {
			let b = claim_unused_data_block(&mut bitmap).unwrap();
			attach_block(&mut dev, &mut bitmap, &mut inode, b).unwrap();
		}
		let table = inode.single_indirect;
		assert_ne!(table, 0);

		release_single_indirect_tree(&mut dev, &mut bitmap, table).unwrap();
		assert!(!bitmap::test(&bitmap, table as usize));
	}
}
