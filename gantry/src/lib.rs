//! Synchronous in-process boundary for driving foreign content-adaptation
//! modules.
//!
//! A content-adaptation host owns in-flight messages and drives a
//! per-message transaction state machine; the adaptation logic lives in a
//! foreign module behind the flat C-ABI tables of [`gantry_abi`]. This
//! crate is the host side of that boundary:
//!
//! - a value codec that moves identifiers, buffer views, transfer strings,
//!   and counted message handles across the boundary without leaking host
//!   internals ([`Area`], [`Name`], [`SharedMessage`]);
//! - a failure bridge giving every boundary call the `bool` + panic-record
//!   convention, preserving host exception identity across round trips
//!   ([`ForeignFailure`]);
//! - adapters implementing the host-facing interfaces by forwarding every
//!   call to the foreign module ([`ServiceAdapter`], [`XactionAdapter`]);
//! - the callback surface foreign code uses to read and mutate pipeline
//!   state while a transaction is active ([`host_table`]).
//!
//! The host application implements [`Host`], [`Transaction`], and the
//! message traits, installs itself with [`install`], and registers one
//! [`ServiceAdapter`] per configured foreign service. All calls are
//! synchronous in both directions; the only concession to asynchrony is
//! that a foreign module may invoke `resume` entries from another thread.

// Value types (versions, delays, locations) are constructed
// field-by-field by host applications; their shapes are part of the
// boundary contract.
#![allow(clippy::exhaustive_structs)]

mod area;
mod bridge;
mod codec;
mod error;
mod host;
mod log;
mod message;
mod name;
mod options;
mod service;
mod surface;
mod xaction;

pub use area::Area;
pub use bridge::{ForeignFailure, SourceLocation};
pub use error::{Error, Result};
pub use host::{Delay, Host, Transaction, install};
pub use log::{DebugSink, FrequencyLevel, ImportanceLevel, LogVerbosity, MessageSizeLevel};
pub use message::{Body, FirstLine, Header, Message, SharedMessage, Version};
pub use name::{Name, NameId};
pub use options::{NamedValueVisitor, Options};
pub use service::{Service, ServiceAdapter};
pub use surface::host_table;
pub use xaction::{Xaction, XactionAdapter};
