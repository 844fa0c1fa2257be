//! The C-shaped free-function surface of §6.2: `make_fs`/`mount_fs`/`fs_open`/… returning `0` on
//! success and `-1` on failure, exactly the call shape the reference implementation exposes.
//!
//! New code should prefer [`crate::FileSystem`] directly — an owned value with `Result`-typed
//! methods composes far better than one process-wide volume behind a mutex. This module exists
//! only so a caller that wants the original signatures can have them; it keeps a single
//! [`FileSystem`] behind a `Mutex<Option<_>>`, which is the only "mounted or not" global state
//! this crate carries.

use std::sync::Mutex;

use crate::block::FileBlockDevice;
use crate::diagnostics::Diagnostics;
use crate::error::FsError;
use crate::volume::FileSystem;

static VOLUME: Mutex<Option<FileSystem<FileBlockDevice>>> = Mutex::new(None);

/// Runs `f` against the mounted volume, or logs [`FsError::NotMounted`] through a default
/// stderr sink and returns `None` if nothing is mounted. There is no live [`FileSystem`] to log
/// through in that branch, so this is the one diagnostic this module produces itself rather than
/// forwarding to a volume's own sink.
fn with_volume<T>(op: &str, f: impl FnOnce(&mut FileSystem<FileBlockDevice>) -> Result<T, FsError>) -> Option<T> {
	let mut guard = VOLUME.lock().unwrap();
	match guard.as_mut() {
		Some(fs) => f(fs).ok(),
		None => {
			Diagnostics::stderr().log(op, FsError::NotMounted);
			None
		}
	}
}

/// Creates (or replaces) the backing disk at `disk_name` and initializes it as an empty volume.
pub fn make_fs(disk_name: &str) -> i32 {
	match FileSystem::make_fs(disk_name) {
		Ok(()) => 0,
		Err(_) => -1,
	}
}

/// Mounts the disk at `disk_name`, replacing whatever volume (if any) was previously mounted.
pub fn mount_fs(disk_name: &str) -> i32 {
	match FileSystem::mount_fs(disk_name) {
		Ok(fs) => {
			*VOLUME.lock().unwrap() = Some(fs);
			0
		}
		Err(_) => -1,
	}
}

/// Flushes metadata and closes the currently mounted disk.
pub fn umount_fs() -> i32 {
	let mut guard = VOLUME.lock().unwrap();
	match guard.take() {
		Some(fs) => match fs.umount_fs() {
			Ok(()) => 0,
			Err((fs, _)) => {
				*guard = Some(fs);
				-1
			}
		},
		None => {
			Diagnostics::stderr().log("umount_fs", FsError::NotMounted);
			-1
		}
	}
}

/// Creates an empty regular file named `name`.
pub fn fs_create(name: &str) -> i32 {
	with_volume("fs_create", |fs| fs.create(name)).map(|()| 0).unwrap_or(-1)
}

/// Removes `name`.
pub fn fs_delete(name: &str) -> i32 {
	with_volume("fs_delete", |fs| fs.delete(name)).map(|()| 0).unwrap_or(-1)
}

/// Opens `name`, returning a file descriptor `>= 0`, or `-1` on failure.
pub fn fs_open(name: &str) -> i32 {
	with_volume("fs_open", |fs| fs.open(name)).map(|fd| fd as i32).unwrap_or(-1)
}

/// Releases descriptor `fd`.
pub fn fs_close(fd: i32) -> i32 {
	if fd < 0 {
		return -1;
	}
	with_volume("fs_close", |fs| fs.close(fd as usize)).map(|()| 0).unwrap_or(-1)
}

/// Reads up to `nbyte` bytes (and up to `buf.len()`) into `buf`, returning the count actually
/// read, or `-1` on failure.
pub fn fs_read(fd: i32, buf: &mut [u8], nbyte: usize) -> i32 {
	if fd < 0 {
		return -1;
	}
	let n = nbyte.min(buf.len());
	with_volume("fs_read", |fs| fs.read(fd as usize, &mut buf[..n])).map(|r| r as i32).unwrap_or(-1)
}

/// Writes up to `nbyte` bytes (and up to `buf.len()`) from `buf`, returning the count actually
/// written, or `-1` on failure.
pub fn fs_write(fd: i32, buf: &[u8], nbyte: usize) -> i32 {
	if fd < 0 {
		return -1;
	}
	let n = nbyte.min(buf.len());
	with_volume("fs_write", |fs| fs.write(fd as usize, &buf[..n])).map(|w| w as i32).unwrap_or(-1)
}

/// Returns the size, in bytes, of the file open on `fd`, or `-1` on failure.
pub fn fs_get_filesize(fd: i32) -> i32 {
	if fd < 0 {
		return -1;
	}
	with_volume("fs_get_filesize", |fs| fs.get_filesize(fd as usize)).unwrap_or(-1)
}

/// Sets `fd`'s seek offset.
pub fn fs_lseek(fd: i32, offset: i32) -> i32 {
	if fd < 0 {
		return -1;
	}
	with_volume("fs_lseek", |fs| fs.lseek(fd as usize, offset)).map(|()| 0).unwrap_or(-1)
}

/// Shrinks the file open on `fd` to `length` bytes.
pub fn fs_truncate(fd: i32, length: i32) -> i32 {
	if fd < 0 {
		return -1;
	}
	with_volume("fs_truncate", |fs| fs.truncate(fd as usize, length)).map(|()| 0).unwrap_or(-1)
}

/// Fills `out` with the name of every file present, terminated by an empty-string sentinel, per
/// the contract decided in §9 for the reference's ambiguous pointer-to-pointer-to-string
/// interface.
pub fn fs_listfiles(out: &mut Vec<String>) -> i32 {
	match with_volume("fs_listfiles", |fs| Ok::<_, FsError>(fs.list_files())) {
		Some(names) => {
			out.clear();
			out.extend(names);
			out.push(String::new());
			0
		}
		None => -1,
	}
}
