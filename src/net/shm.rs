// Copyright (c) Rushnet Contributors
// SPDX-License-Identifier: Apache-2.0

//! Named shared-memory regions.
//!
//! A [`SharedRegion`] owns one `mmap` of a POSIX shared-memory object and
//! unmaps it on drop. Creating and opening are separate entry points: the
//! founder wins the exclusive-create race and gets a fresh zero-filled
//! region, everyone else opens the existing object. Unlinking is explicit;
//! only the last departing peer removes the name.

use std::marker::PhantomData;
use std::num::NonZeroUsize;
use std::ptr::NonNull;

use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::mman::{MapFlags, ProtFlags, mmap, munmap, shm_open, shm_unlink};
use nix::sys::stat::Mode;
use nix::unistd::ftruncate;

/// One mapped shared-memory object holding a single `T`.
///
/// `T` must be `#[repr(C)]` plain old data that is valid when zero-filled,
/// which is what a freshly truncated object contains.
pub struct SharedRegion<T> {
    ptr: NonNull<libc::c_void>,
    _marker: PhantomData<*mut T>,
}

// The mapping is valid for the whole process, so the handle may move
// between threads whenever the pointee itself may.
unsafe impl<T: Send> Send for SharedRegion<T> {}

impl<T> SharedRegion<T> {
    /// Creates the named object, fails with `EEXIST` if it already exists.
    ///
    /// The exclusive create is what decides the founder/joiner race: whoever
    /// gets `Ok` here founds the net.
    pub fn create(name: &str) -> nix::Result<Self> {
        let fd = shm_open(
            name,
            OFlag::O_CREAT | OFlag::O_EXCL | OFlag::O_RDWR,
            Mode::S_IRUSR | Mode::S_IWUSR,
        )?;
        if let Err(errno) = ftruncate(&fd, size_of::<T>() as libc::off_t) {
            let _ = shm_unlink(name);
            return Err(errno);
        }
        match Self::map(&fd) {
            Ok(region) => Ok(region),
            Err(errno) => {
                let _ = shm_unlink(name);
                Err(errno)
            }
        }
    }

    /// Opens an existing named object read-write.
    pub fn open(name: &str) -> nix::Result<Self> {
        let fd = shm_open(name, OFlag::O_RDWR, Mode::empty())?;
        Self::map(&fd)
    }

    /// Removes the name from the system. Existing mappings stay valid.
    pub fn unlink(name: &str) -> nix::Result<()> {
        shm_unlink(name)
    }

    fn map<F: std::os::fd::AsFd>(fd: &F) -> nix::Result<Self> {
        let len = NonZeroUsize::new(size_of::<T>()).ok_or(Errno::EINVAL)?;
        let ptr = unsafe {
            mmap(
                None,
                len,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                fd,
                0,
            )
        }?;
        Ok(Self {
            ptr,
            _marker: PhantomData,
        })
    }

    /// Raw pointer to the mapped `T`.
    ///
    /// All field access goes through this; which semaphore must be held for
    /// which field is the caller's contract.
    pub fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr().cast()
    }
}

impl<T> Drop for SharedRegion<T> {
    fn drop(&mut self) {
        // The mapping dies with the handle; the name may outlive it.
        let _ = unsafe { munmap(self.ptr, size_of::<T>()) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(C)]
    struct Payload {
        counter: u64,
        tag: [u8; 16],
    }

    fn unique_name(suffix: &str) -> String {
        format!("/rushnet-test-{}-{suffix}", std::process::id())
    }

    #[test]
    fn create_open_share_and_unlink() {
        let name = unique_name("share");
        let founder: SharedRegion<Payload> = SharedRegion::create(&name).unwrap();
        unsafe {
            (*founder.as_ptr()).counter = 41;
            (*founder.as_ptr()).tag[0] = b'r';
        }

        let joiner: SharedRegion<Payload> = SharedRegion::open(&name).unwrap();
        unsafe {
            (*joiner.as_ptr()).counter += 1;
        }
        assert_eq!(unsafe { (*founder.as_ptr()).counter }, 42);
        assert_eq!(unsafe { (*founder.as_ptr()).tag[0] }, b'r');

        SharedRegion::<Payload>::unlink(&name).unwrap();
        // Unlinked name is gone, mappings still usable until drop.
        assert!(matches!(
            SharedRegion::<Payload>::open(&name),
            Err(Errno::ENOENT)
        ));
        assert_eq!(unsafe { (*joiner.as_ptr()).counter }, 42);
    }

    #[test]
    fn exclusive_create_detects_existing() {
        let name = unique_name("race");
        let _founder: SharedRegion<Payload> = SharedRegion::create(&name).unwrap();
        assert!(matches!(
            SharedRegion::<Payload>::create(&name),
            Err(Errno::EEXIST)
        ));
        SharedRegion::<Payload>::unlink(&name).unwrap();
    }

    #[test]
    fn fresh_region_is_zeroed() {
        let name = unique_name("zeroed");
        let region: SharedRegion<Payload> = SharedRegion::create(&name).unwrap();
        assert_eq!(unsafe { (*region.as_ptr()).counter }, 0);
        assert_eq!(unsafe { (*region.as_ptr()).tag }, [0; 16]);
        SharedRegion::<Payload>::unlink(&name).unwrap();
    }
}
