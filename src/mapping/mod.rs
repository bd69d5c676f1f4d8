//! Mapping of device state onto output actions.
//!
//! A [`Mapper`] groups [`Listener`]s; each listener pairs an [`Event`]
//! predicate with the [`Command`]s it runs. One [`DispatchEngine`] per
//! device fires all its mappers whenever the device state changes.

pub mod command;
pub mod engine;
pub mod error;
pub mod event;
pub mod listener;
pub mod mapper;
pub mod profile;

pub use command::Command;
pub use engine::{DispatchEngine, DispatchHandle};
pub use error::MappingError;
pub use event::{Event, EventContext};
pub use listener::Listener;
pub use mapper::Mapper;
pub use profile::Pointers;
