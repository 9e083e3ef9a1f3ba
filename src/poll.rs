//! Event multiplexer over `poll(2)`.
//!
//! Single-threaded cooperative scheduling: subscribers register an fd and an
//! event mask, and the loop dispatches readiness callbacks in descriptor
//! table order. Unsubscribing marks the table slot with a tombstone fd that
//! the kernel ignores, so subscribers can unsubscribe themselves or their
//! peers from inside a callback while the table is being iterated; the table
//! is rebuilt once tombstones outnumber live entries by
//! `COMPACTION_THRESHOLD`. Alarms piggyback on the bounded poll timeout
//! instead of a timer fd, so their precision is limited by `WAIT_QUANTUM`.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::os::fd::RawFd;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{Error, Result};

/// Upper bound of one readiness wait, in milliseconds.
const WAIT_QUANTUM: u64 = 100;

/// The descriptor table is rebuilt when it grows past this multiple of the
/// live subscriber count.
const COMPACTION_THRESHOLD: usize = 3;

/// Tombstone for a logically deleted descriptor slot. Any negative fd is
/// ignored by `poll(2)`; -1 is avoided since it is also what careless code
/// passes around for "no fd".
const DELETED: RawFd = RawFd::MIN;

pub fn current_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Descriptor-table state every subscriber carries: fd, requested event
/// mask, a human-readable name for diagnostics, and a dirty bit recording
/// that fd or mask changed and the table must re-read them.
pub struct Registration {
    fd: RawFd,
    mask: libc::c_short,
    name: String,
    dirty: bool,
}

impl Registration {
    pub fn new(name: impl Into<String>, fd: RawFd, mask: libc::c_short) -> Self {
        Self {
            fd,
            mask,
            name: name.into(),
            dirty: false,
        }
    }

    pub fn fd(&self) -> RawFd {
        self.fd
    }

    pub fn mask(&self) -> libc::c_short {
        self.mask
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_fd(&mut self, fd: RawFd) {
        self.fd = fd;
        self.dirty = true;
    }

    pub fn set_mask(&mut self, mask: libc::c_short) {
        self.mask = mask;
        self.dirty = true;
    }

    /// Negates the fd so the kernel ignores the slot until [`enable`].
    ///
    /// [`enable`]: Self::enable
    pub fn disable(&mut self) {
        self.fd = -self.fd.abs();
        self.dirty = true;
    }

    pub fn enable(&mut self) {
        self.fd = self.fd.abs();
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }
}

/// A readiness consumer driven by [`Poll`].
///
/// Callbacks run to completion on the loop thread and must not block. They
/// may subscribe new subscribers (visible from the next wake-up),
/// unsubscribe any subscriber including themselves (effective immediately),
/// and request shutdown.
pub trait Subscriber {
    fn registration(&self) -> &Registration;
    fn registration_mut(&mut self) -> &mut Registration;

    fn on_input(&mut self, _poll: &mut Poll) -> Result<()> {
        Ok(())
    }

    fn on_output(&mut self, _poll: &mut Poll) -> Result<()> {
        Ok(())
    }

    fn on_error(&mut self, poll: &mut Poll, revents: libc::c_short) -> Result<()> {
        warn!(
            "{}: unexpected poll events {revents:#x}, unsubscribing",
            self.registration().name()
        );
        poll.unsubscribe(self.registration().fd());
        Ok(())
    }
}

/// A one-shot callback run once the wall clock passes its deadline.
pub struct Alarm {
    deadline: u64,
    callback: Box<dyn FnOnce()>,
}

impl Alarm {
    pub fn new(delay_millis: u64, callback: impl FnOnce() + 'static) -> Result<Self> {
        if delay_millis == 0 {
            return Err(Error::Internal("illegal alarm delay".to_owned()));
        }
        Ok(Self {
            deadline: current_time_millis() + delay_millis,
            callback: Box::new(callback),
        })
    }

    /// Absolute wake-up time in wall-clock milliseconds.
    pub fn deadline(&self) -> u64 {
        self.deadline
    }

    fn fire(self) {
        (self.callback)();
    }
}

pub struct Poll {
    /// Descriptor table handed to `poll(2)`; slots of unsubscribed
    /// subscribers hold the tombstone until the next compaction.
    fds: Vec<libc::pollfd>,
    /// Owning registry. Dispatch clones the `Rc` before the callback so a
    /// subscriber that unsubscribes itself survives its own in-flight call.
    subs: HashMap<RawFd, Rc<RefCell<dyn Subscriber>>>,
    /// Pending alarms, drained in deadline order; ties fire in insertion
    /// order.
    alarms: BTreeMap<(u64, u64), Alarm>,
    alarm_seq: u64,
    shutdown: bool,
}

impl Poll {
    pub fn new() -> Result<Self> {
        // The sink is written best-effort; a torn-down peer must surface as
        // a short write, not a fatal signal.
        let previous = unsafe { libc::signal(libc::SIGPIPE, libc::SIG_IGN) };
        if previous == libc::SIG_ERR {
            return Err(Error::Init {
                what: "SIGPIPE disposition",
                source: io::Error::last_os_error(),
            });
        }

        Ok(Self {
            fds: Vec::new(),
            subs: HashMap::new(),
            alarms: BTreeMap::new(),
            alarm_seq: 0,
            shutdown: false,
        })
    }

    pub fn subscribe(&mut self, sub: Rc<RefCell<dyn Subscriber>>) {
        let (fd, mask) = {
            let sub = sub.borrow();
            let reg = sub.registration();
            trace!("subscribing {} on fd {}", reg.name(), reg.fd());
            (reg.fd(), reg.mask())
        };
        self.fds.push(libc::pollfd {
            fd,
            events: mask,
            revents: 0,
        });
        self.subs.insert(fd, sub);
    }

    pub fn subscribe_alarm(&mut self, alarm: Alarm) {
        self.alarm_seq += 1;
        self.alarms.insert((alarm.deadline, self.alarm_seq), alarm);
    }

    /// Removes the subscriber registered under `fd`. Its descriptor slots
    /// become tombstones, so the removal is safe mid-dispatch and the
    /// subscriber will not be called again.
    pub fn unsubscribe(&mut self, fd: RawFd) {
        if self.subs.remove(&fd).is_none() {
            return;
        }
        for slot in &mut self.fds {
            if slot.fd == fd {
                slot.fd = DELETED;
            }
        }
    }

    /// Propagates a subscriber's mutated fd or mask into the descriptor
    /// table. Slots are matched by absolute fd value so a disabled
    /// (negated) registration still finds its slot.
    pub fn notify_subscriber_changed(&mut self, sub: &mut dyn Subscriber) {
        let reg = sub.registration_mut();
        if !reg.is_dirty() {
            return;
        }
        let initial = reg.fd().abs();
        for slot in &mut self.fds {
            if slot.fd != DELETED && slot.fd.abs() == initial {
                slot.fd = reg.fd();
                slot.events = reg.mask();
                reg.clear_dirty();
                break;
            }
        }
    }

    pub fn shutdown(&mut self) {
        self.shutdown = true;
    }

    fn compact(&mut self) {
        self.fds.retain(|slot| slot.fd != DELETED);
    }

    fn drain_due_alarms(&mut self, now: u64) {
        while self
            .alarms
            .first_key_value()
            .is_some_and(|(&(deadline, _), _)| deadline <= now)
        {
            if let Some((_, alarm)) = self.alarms.pop_first() {
                alarm.fire();
            }
        }
    }

    /// Runs until shutdown is requested or no subscribers remain.
    pub fn run(&mut self) -> Result<()> {
        let mut last_alarm_check = current_time_millis();

        while !self.shutdown && !self.subs.is_empty() {
            if self.fds.len() > COMPACTION_THRESHOLD * self.subs.len() {
                self.compact();
            }

            let ready = unsafe {
                libc::poll(
                    self.fds.as_mut_ptr(),
                    self.fds.len() as libc::nfds_t,
                    WAIT_QUANTUM as libc::c_int,
                )
            };
            if ready < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(Error::Internal(format!("poll failed: {err}")));
            }

            let now = current_time_millis();
            if ready == 0 || now.saturating_sub(last_alarm_check) > WAIT_QUANTUM {
                last_alarm_check = now;
                self.drain_due_alarms(now);
                continue;
            }

            let mut i = 0;
            while i < self.fds.len() {
                let slot = self.fds[i];
                i += 1;
                // A tombstoned slot can still carry revents filled in by
                // this wake-up; the owner is gone, skip it.
                if slot.fd == DELETED || slot.revents == 0 {
                    continue;
                }

                let Some(sub) = self.subs.get(&slot.fd).map(Rc::clone) else {
                    return Err(Error::Internal(format!(
                        "readiness for unregistered fd {}",
                        slot.fd
                    )));
                };

                let result = {
                    let mut sub = sub.borrow_mut();
                    if slot.revents & libc::POLLIN != 0 {
                        sub.on_input(self)
                    } else if slot.revents & libc::POLLOUT != 0 {
                        sub.on_output(self)
                    } else {
                        sub.on_error(self, slot.revents)
                    }
                };
                if let Err(err) = result {
                    let sub = sub.borrow();
                    warn!(
                        "error in event loop: {err} subscriber={} pollfd{{events={:#x}, fd={}, revents={:#x}}}",
                        sub.registration().name(),
                        slot.events,
                        slot.fd,
                        slot.revents
                    );
                }
            }
        }

        Ok(())
    }

    #[cfg(test)]
    fn descriptor_table_len(&self) -> usize {
        self.fds.len()
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        self.subs.len()
    }
}
