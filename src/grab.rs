//! Device-grab lifecycle management.
//!
//! The grab manager owns the multiplexer and shares the remap engine, the
//! output sink and the device map with its subscribers. Keyboards matching
//! the configured names are grabbed when they appear and forgotten when
//! they disappear; the multiplexer keeps the owning reference to every
//! subscriber while the device map holds a weak lookup handle.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

use crate::config::Config;
use crate::device::{self, KeyboardDevice};
use crate::error::{Error, Result};
use crate::poll::Poll;
use crate::remap::Remapper;
use crate::signals::SignalReceiver;
use crate::uinput::UInput;
use crate::watcher::DirectoryWatcher;

/// State shared between the grab manager and its subscribers.
pub struct Shared {
    pub(crate) uinput: UInput,
    pub(crate) remapper: Remapper,
    /// Grabbed devices by path; non-owning, the poll registry keeps the
    /// subscribers alive.
    listeners: HashMap<PathBuf, Weak<RefCell<KeyboardDevice>>>,
    keyboard_names: Vec<String>,
}

impl Shared {
    fn is_grabbed(&self, path: &Path) -> bool {
        self.listeners.contains_key(path)
    }

    /// Drops the device-map entry for a disconnected device.
    pub(crate) fn forget(&mut self, path: &Path) {
        if self.listeners.remove(path).is_some() {
            info!("ungrabbed device {}", path.display());
        }
    }
}

pub struct GrabManager {
    poll: Poll,
    shared: Rc<RefCell<Shared>>,
}

impl GrabManager {
    /// Builds the sink and the engine and grabs every already-present
    /// matching keyboard. Failures here are initialization failures and
    /// terminate the process.
    pub fn new(config: Config) -> Result<Self> {
        let uinput = UInput::new()?;
        let remapper = Remapper::new(&config)?;
        let shared = Rc::new(RefCell::new(Shared {
            uinput,
            remapper,
            listeners: HashMap::new(),
            keyboard_names: config.keyboard_names,
        }));

        let mut poll = Poll::new()?;
        update_grabbed_keyboards(&shared, &mut poll)?;

        Ok(Self { poll, shared })
    }

    /// Subscribes the hot-plug watcher and the signal receiver, then runs
    /// the multiplexer until a termination signal arrives or every
    /// subscriber is gone.
    pub fn run(&mut self) -> Result<()> {
        let watcher = DirectoryWatcher::new(self.shared.clone())?;
        self.poll.subscribe(watcher);

        let signals = SignalReceiver::new()?;
        self.poll.subscribe(signals);

        self.poll.run()
    }
}

/// Enumerates devices and grabs every configured keyboard not grabbed yet.
/// Runs at startup and on every `/dev/input` change.
pub(crate) fn update_grabbed_keyboards(
    shared: &Rc<RefCell<Shared>>,
    poll: &mut Poll,
) -> Result<()> {
    let devices = device::enumerate_keyboards()?;

    let matched: Vec<_> = {
        let state = shared.borrow();
        devices
            .into_iter()
            .filter(|dev| {
                state.keyboard_names.iter().any(|name| name == &dev.name)
                    && !state.is_grabbed(&dev.path)
            })
            .collect()
    };

    for descriptor in matched {
        info!("matched keyboard {descriptor}");
        add_listener(shared, poll, descriptor.path)?;
    }
    Ok(())
}

fn add_listener(shared: &Rc<RefCell<Shared>>, poll: &mut Poll, path: PathBuf) -> Result<()> {
    if shared.borrow().is_grabbed(&path) {
        return Err(Error::DuplicateGrab { path });
    }

    let device = KeyboardDevice::open(path.clone(), shared.clone())?;
    let weak = Rc::downgrade(&device);
    poll.subscribe(device);
    shared.borrow_mut().listeners.insert(path.clone(), weak);

    info!("grabbed device {}", path.display());
    Ok(())
}
