//! Input device enumeration and grabbed keyboard subscribers.

use std::cell::RefCell;
use std::fmt;
use std::fs::{self, File};
use std::io;
use std::mem;
use std::os::fd::AsRawFd;
use std::os::unix::fs::FileTypeExt;
use std::path::PathBuf;
use std::rc::Rc;

use evdev::Key;

use crate::error::{Error, Result};
use crate::event::{self, EVENT_SIZE};
use crate::grab::Shared;
use crate::poll::{Poll, Registration, Subscriber};

const INPUT_DIR: &str = "/dev/input";

/// Events read per readiness callback.
const READ_BATCH: usize = 64;

nix::ioctl_write_int!(eviocgrab, b'E', 0x90);

pub struct DeviceDescriptor {
    pub path: PathBuf,
    pub name: String,
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Device( name='{}' driver='{}')",
            self.name,
            self.path.display()
        )
    }
}

/// Walks `/dev/input` and probes every character device for keyboard-ness.
/// Devices that cannot be opened are logged and skipped.
pub fn enumerate_keyboards() -> Result<Vec<DeviceDescriptor>> {
    let entries = fs::read_dir(INPUT_DIR).map_err(|source| Error::Init {
        what: "/dev/input",
        source,
    })?;

    let mut devices = Vec::new();
    for entry in entries {
        let Ok(entry) = entry else { continue };
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if !file_type.is_char_device() {
            continue;
        }

        let path = entry.path();
        let device = match evdev::Device::open(&path) {
            Ok(device) => device,
            Err(err) => {
                warn!("could not open {}: {err}", path.display());
                continue;
            }
        };

        // A numpad reports key capability too; requiring KEY_1 keeps only
        // full keyboards.
        if !device
            .supported_keys()
            .is_some_and(|keys| keys.contains(Key::KEY_1))
        {
            continue;
        }

        let name = device.name().unwrap_or("").to_owned();
        devices.push(DeviceDescriptor { path, name });
    }

    Ok(devices)
}

/// An exclusively grabbed keyboard. Raw events are read in batches and fed
/// through the remap engine; the kernel grab is held for the subscriber's
/// whole lifetime and released on drop.
pub struct KeyboardDevice {
    registration: Registration,
    file: File,
    path: PathBuf,
    shared: Rc<RefCell<Shared>>,
}

impl KeyboardDevice {
    pub fn open(path: PathBuf, shared: Rc<RefCell<Shared>>) -> Result<Rc<RefCell<Self>>> {
        info!("initializing keyboard listener for {}", path.display());

        let file = File::open(&path).map_err(|source| {
            if source.kind() == io::ErrorKind::PermissionDenied {
                Error::PermissionDenied {
                    path: path.clone(),
                    source,
                }
            } else {
                Error::Init {
                    what: "keyboard device",
                    source,
                }
            }
        })?;

        let fd = file.as_raw_fd();
        if unsafe { eviocgrab(fd, 1) }.is_err() {
            return Err(Error::GrabContended { path });
        }

        let name = path.display().to_string();
        Ok(Rc::new(RefCell::new(Self {
            registration: Registration::new(name, fd, libc::POLLIN | libc::POLLERR),
            file,
            path,
            shared,
        })))
    }

    /// Removes this device from the multiplexer and from the grab
    /// manager's device map.
    fn detach(&self, poll: &mut Poll) {
        poll.unsubscribe(self.registration.fd());
        self.shared.borrow_mut().forget(&self.path);
    }
}

impl Subscriber for KeyboardDevice {
    fn registration(&self) -> &Registration {
        &self.registration
    }

    fn registration_mut(&mut self) -> &mut Registration {
        &mut self.registration
    }

    fn on_input(&mut self, poll: &mut Poll) -> Result<()> {
        let mut events = [event::zeroed(); READ_BATCH];
        let rd = unsafe {
            libc::read(
                self.file.as_raw_fd(),
                events.as_mut_ptr().cast(),
                mem::size_of_val(&events),
            )
        };

        if rd == -1 {
            info!("device {} is disconnected", self.path.display());
            self.detach(poll);
            return Ok(());
        }

        let rd = rd as usize;
        if rd < EVENT_SIZE {
            self.detach(poll);
            return Err(Error::InvalidRead {
                path: self.path.clone(),
            });
        }

        let count = rd / EVENT_SIZE;
        let shared = &mut *self.shared.borrow_mut();
        shared
            .remapper
            .on_keystroke(&mut events[..count], &mut shared.uinput);
        Ok(())
    }
}

impl Drop for KeyboardDevice {
    fn drop(&mut self) {
        info!("ungrabbing device {}", self.path.display());
        // The device node may already be gone; releasing is best effort.
        let _ = unsafe { eviocgrab(self.file.as_raw_fd(), 0) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_display_format() {
        let descriptor = DeviceDescriptor {
            path: PathBuf::from("/dev/input/event3"),
            name: "AT Translated Set 2 keyboard".to_owned(),
        };
        assert_eq!(
            descriptor.to_string(),
            "Device( name='AT Translated Set 2 keyboard' driver='/dev/input/event3')"
        );
    }
}
