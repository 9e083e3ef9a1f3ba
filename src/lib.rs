#[macro_use]
extern crate tracing;

pub mod cli;
pub mod config;
pub mod device;
pub mod error;
pub mod event;
pub mod grab;
pub mod keys;
pub mod poll;
pub mod remap;
pub mod signals;
pub mod uinput;
pub mod watcher;

pub use error::Error;
