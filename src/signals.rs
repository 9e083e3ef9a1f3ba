//! Termination signal handling.
//!
//! `SIGINT` and `SIGTERM` are blocked and converted to a readable signalfd,
//! so shutdown runs through the regular dispatch path instead of an
//! async-signal-safe handler.

use std::cell::RefCell;
use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::ptr;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::poll::{Poll, Registration, Subscriber};

pub struct SignalReceiver {
    registration: Registration,
    fd: OwnedFd,
}

impl SignalReceiver {
    pub fn new() -> Result<Rc<RefCell<Self>>> {
        let fd = unsafe {
            let mut mask: libc::sigset_t = mem::zeroed();
            libc::sigemptyset(&mut mask);
            libc::sigaddset(&mut mask, libc::SIGINT);
            libc::sigaddset(&mut mask, libc::SIGTERM);

            if libc::sigprocmask(libc::SIG_BLOCK, &mask, ptr::null_mut()) < 0 {
                return Err(Error::Init {
                    what: "signal mask",
                    source: io::Error::last_os_error(),
                });
            }

            libc::signalfd(-1, &mask, libc::SFD_CLOEXEC)
        };
        if fd < 0 {
            return Err(Error::Init {
                what: "signalfd",
                source: io::Error::last_os_error(),
            });
        }
        let fd = unsafe { OwnedFd::from_raw_fd(fd) };

        let registration = Registration::new(
            "signal-receiver",
            fd.as_raw_fd(),
            libc::POLLIN | libc::POLLERR | libc::POLLHUP,
        );
        Ok(Rc::new(RefCell::new(Self { registration, fd })))
    }
}

impl Subscriber for SignalReceiver {
    fn registration(&self) -> &Registration {
        &self.registration
    }

    fn registration_mut(&mut self) -> &mut Registration {
        &mut self.registration
    }

    fn on_input(&mut self, poll: &mut Poll) -> Result<()> {
        let mut siginfo: libc::signalfd_siginfo = unsafe { mem::zeroed() };
        let rd = unsafe {
            libc::read(
                self.fd.as_raw_fd(),
                (&mut siginfo as *mut libc::signalfd_siginfo).cast(),
                mem::size_of::<libc::signalfd_siginfo>(),
            )
        };
        if rd as usize != mem::size_of::<libc::signalfd_siginfo>() {
            return Err(Error::Internal("truncated signalfd read".to_owned()));
        }

        info!("received signal {}, shutting down", siginfo.ssi_signo);
        poll.shutdown();
        Ok(())
    }
}
