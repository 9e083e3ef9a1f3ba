//! Hot-plug watcher for the input device directory.

use std::cell::RefCell;
use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::grab::{self, Shared};
use crate::poll::{Poll, Registration, Subscriber};

const BUFFER_SIZE: usize = 4096;

/// Watches `/dev/input` for device nodes appearing or disappearing and
/// re-runs the grab manager's match-and-grab pass on every change.
pub struct DirectoryWatcher {
    registration: Registration,
    fd: OwnedFd,
    watch: libc::c_int,
    shared: Rc<RefCell<Shared>>,
}

impl DirectoryWatcher {
    pub fn new(shared: Rc<RefCell<Shared>>) -> Result<Rc<RefCell<Self>>> {
        let fd = unsafe { libc::inotify_init1(libc::IN_CLOEXEC) };
        if fd < 0 {
            return Err(Error::Init {
                what: "inotify",
                source: io::Error::last_os_error(),
            });
        }
        let fd = unsafe { OwnedFd::from_raw_fd(fd) };

        let watch = unsafe {
            libc::inotify_add_watch(
                fd.as_raw_fd(),
                c"/dev/input".as_ptr(),
                libc::IN_CREATE | libc::IN_DELETE,
            )
        };
        if watch < 0 {
            return Err(Error::Init {
                what: "/dev/input watch",
                source: io::Error::last_os_error(),
            });
        }

        let registration = Registration::new(
            "device-watcher",
            fd.as_raw_fd(),
            libc::POLLIN | libc::POLLERR | libc::POLLHUP,
        );
        Ok(Rc::new(RefCell::new(Self {
            registration,
            fd,
            watch,
            shared,
        })))
    }
}

impl Subscriber for DirectoryWatcher {
    fn registration(&self) -> &Registration {
        &self.registration
    }

    fn registration_mut(&mut self) -> &mut Registration {
        &mut self.registration
    }

    fn on_input(&mut self, poll: &mut Poll) -> Result<()> {
        let mut buffer = [0u8; BUFFER_SIZE];
        let len = unsafe {
            libc::read(
                self.fd.as_raw_fd(),
                buffer.as_mut_ptr().cast(),
                BUFFER_SIZE,
            )
        };
        if len < 0 {
            return Err(Error::Internal(format!(
                "inotify read failed: {}",
                io::Error::last_os_error()
            )));
        }
        let len = len as usize;

        // Variable-length records: a header followed by `len` name bytes.
        const HEADER: usize = mem::size_of::<libc::inotify_event>();
        let mut changed = false;
        let mut offset = 0;
        while offset + HEADER <= len {
            let event = unsafe {
                buffer
                    .as_ptr()
                    .add(offset)
                    .cast::<libc::inotify_event>()
                    .read_unaligned()
            };
            if event.len > 0 {
                changed = true;
            }
            offset += HEADER + event.len as usize;
        }

        if changed {
            trace!("input device directory changed");
            grab::update_grabbed_keyboards(&self.shared, poll)?;
        }
        Ok(())
    }
}

impl Drop for DirectoryWatcher {
    fn drop(&mut self) {
        unsafe {
            libc::inotify_rm_watch(self.fd.as_raw_fd(), self.watch);
        }
    }
}
