//! Synthetic output device on `/dev/uinput`.
//!
//! The sink is a byte-stream consumer: translated packets arrive as opaque
//! `input_event` bytes and are written out verbatim in a single best-effort
//! write.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::mem;
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::slice;

use crate::error::{Error, Result};
use crate::event::{EV_KEY, EV_REL, EV_SYN};
use crate::remap::EventSink;

const UINPUT_PATH: &str = "/dev/uinput";
const DEVICE_NAME: &[u8] = b"laykey virtual keyboard";

const BUS_USB: u16 = 0x03;

const REL_X: libc::c_ulong = 0x00;
const REL_Y: libc::c_ulong = 0x01;
const REL_WHEEL: libc::c_ulong = 0x08;

const BTN_LEFT: libc::c_ulong = 0x110;
const BTN_RIGHT: libc::c_ulong = 0x111;
const BTN_MIDDLE: libc::c_ulong = 0x112;
const BTN_FORWARD: libc::c_ulong = 0x115;
const BTN_BACK: libc::c_ulong = 0x116;
const BTN_TOOL_DOUBLETAP: libc::c_ulong = 0x145;
const BTN_TOUCH: libc::c_ulong = 0x14a;
const BTN_WHEEL: libc::c_ulong = 0x150;

const UINPUT_IOCTL_BASE: u8 = b'U';
nix::ioctl_write_int!(ui_set_evbit, UINPUT_IOCTL_BASE, 100);
nix::ioctl_write_int!(ui_set_keybit, UINPUT_IOCTL_BASE, 101);
nix::ioctl_write_int!(ui_set_relbit, UINPUT_IOCTL_BASE, 102);
nix::ioctl_none!(ui_dev_create, UINPUT_IOCTL_BASE, 1);

pub struct UInput {
    file: File,
}

impl UInput {
    /// Opens the uinput endpoint, enables the key, synchronization and
    /// relative-motion event classes plus every keycode the remapper can
    /// produce, and creates the virtual device.
    pub fn new() -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(UINPUT_PATH)
            .map_err(|source| Error::Init {
                what: "/dev/uinput",
                source,
            })?;
        let fd = file.as_raw_fd();

        let capability = |result: nix::Result<libc::c_int>| {
            result.map(drop).map_err(|errno| Error::Init {
                what: "uinput capability bit",
                source: io::Error::from_raw_os_error(errno as i32),
            })
        };

        unsafe {
            capability(ui_set_evbit(fd, libc::c_ulong::from(EV_KEY)))?;
            capability(ui_set_evbit(fd, libc::c_ulong::from(EV_SYN)))?;
            capability(ui_set_evbit(fd, libc::c_ulong::from(EV_REL)))?;

            for code in 0..256 {
                capability(ui_set_keybit(fd, code))?;
            }
            for button in [
                BTN_LEFT,
                BTN_RIGHT,
                BTN_MIDDLE,
                BTN_FORWARD,
                BTN_BACK,
                BTN_TOOL_DOUBLETAP,
                BTN_TOUCH,
                BTN_WHEEL,
            ] {
                capability(ui_set_keybit(fd, button))?;
            }
            for axis in [REL_X, REL_Y, REL_WHEEL] {
                capability(ui_set_relbit(fd, axis))?;
            }
        }

        let mut descriptor: libc::uinput_user_dev = unsafe { mem::zeroed() };
        for (dst, src) in descriptor.name.iter_mut().zip(DEVICE_NAME) {
            *dst = *src as libc::c_char;
        }
        descriptor.id.bustype = BUS_USB;
        descriptor.id.vendor = 0x1;
        descriptor.id.product = 0x1;
        descriptor.id.version = 1;

        let bytes = unsafe {
            slice::from_raw_parts(
                (&descriptor as *const libc::uinput_user_dev).cast::<u8>(),
                mem::size_of::<libc::uinput_user_dev>(),
            )
        };
        let written = (&file).write(bytes).map_err(|source| Error::Init {
            what: "uinput device descriptor",
            source,
        })?;
        if written != bytes.len() {
            return Err(Error::Init {
                what: "uinput device descriptor",
                source: io::Error::new(io::ErrorKind::WriteZero, "short descriptor write"),
            });
        }

        unsafe { ui_dev_create(fd) }.map_err(|errno| Error::Init {
            what: "uinput device creation",
            source: io::Error::from_raw_os_error(errno as i32),
        })?;

        debug!("created virtual device at {UINPUT_PATH}");
        Ok(Self { file })
    }
}

impl EventSink for UInput {
    fn consume(&mut self, bytes: &[u8]) {
        // Best effort; a short or failed write is dropped on the floor.
        let _ = self.file.write(bytes);
    }
}
