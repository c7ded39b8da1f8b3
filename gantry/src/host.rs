//! The host side of the adaptation boundary.

use std::sync::OnceLock;

use crate::area::Area;
use crate::bridge;
use crate::error::{Error, Result};
use crate::log::{DebugSink, LogVerbosity};
use crate::message::{Message, SharedMessage};

/// Progress report for a delayed adaptation.
#[derive(Debug, Clone, Default)]
pub struct Delay {
    /// Completed work fraction in `(0, 1)`, or `None` when unknown.
    pub progress: Option<f64>,
    /// User-friendly state description, if available.
    pub description: Option<String>,
}

/// The host application itself, as seen by adaptation modules.
///
/// One host is installed per process via [`install`]; the callback surface
/// serves every foreign request through it, possibly from a thread other
/// than the installing one.
pub trait Host: Send + Sync {
    /// Unique host URI.
    fn uri(&self) -> String;

    /// Free-format host description.
    fn describe(&self) -> String;

    /// Opens a debug sink, or declines to log at this verbosity.
    fn open_debug(&self, verbosity: LogVerbosity) -> Option<Box<dyn DebugSink>>;

    /// Closes a sink returned by [`Host::open_debug`].
    fn close_debug(&self, sink: Box<dyn DebugSink>);

    /// Constructs an empty request shell.
    fn new_request(&self) -> SharedMessage;

    /// Constructs an empty response shell.
    fn new_response(&self) -> SharedMessage;
}

/// The host side of one adaptation transaction.
///
/// Adaptation modules drive this interface through the callback surface
/// while the host drives the paired [`crate::Xaction`]. Calls may arrive
/// on a different thread than the one that created the transaction.
pub trait Transaction {
    /// The original, unmodified message.
    fn virgin(&mut self) -> &mut dyn Message;

    /// The message that triggered the virgin one, when adapting responses.
    fn cause(&mut self) -> &dyn Message;

    /// The message previously given to [`Transaction::use_adapted`].
    fn adapted(&mut self) -> &mut dyn Message;

    /// Deliver the virgin message unmodified.
    fn use_virgin(&mut self);

    /// Deliver the given message instead of the virgin one.
    fn use_adapted(&mut self, message: SharedMessage);

    /// Deny access to the virgin message.
    fn block_virgin(&mut self);

    /// More time is needed before adapted content appears.
    fn adaptation_delayed(&mut self, delay: &Delay);

    /// The adaptation terminated abnormally; no further calls either way.
    fn adaptation_aborted(&mut self);

    /// Register interest in resuming this transaction.
    fn resume(&mut self);

    /// The adapter will not look at the virgin body.
    fn virgin_body_discard(&mut self);

    /// The adapter is interested in the virgin body.
    fn virgin_body_make(&mut self);

    /// The adapter needs more virgin body to make progress.
    fn virgin_body_make_more(&mut self);

    /// The adapter will request no further virgin body content.
    fn virgin_body_stop_making(&mut self);

    /// The adapter temporarily cannot accept virgin content.
    fn virgin_body_pause(&mut self);

    /// The adapter can accept virgin content again.
    fn virgin_body_resume(&mut self);

    /// Extracts `[offset, offset+size)` of virgin body content.
    fn virgin_body_content(&mut self, offset: usize, size: usize) -> Area;

    /// The adapter consumed `size` virgin bytes; they may be dropped.
    fn virgin_body_content_shift(&mut self, size: usize);

    /// No more adapted body content will be produced; `at_end`
    /// distinguishes a clean end from a truncated stream.
    fn adapted_body_content_done(&mut self, at_end: bool);

    /// More adapted body content may be available.
    fn adapted_body_content_available(&mut self);
}

/// The installed host.
static HOST: OnceLock<Box<dyn Host>> = OnceLock::new();

/// Installs the process-wide adaptation host and arms the failure bridge.
///
/// Must happen before any foreign module is registered. A second install
/// fails with [`Error::HostInstalled`].
pub fn install(host: Box<dyn Host>) -> Result<()> {
    bridge::arm();
    HOST.set(host).map_err(|_| Error::HostInstalled)?;
    tracing::debug!("adaptation host installed");
    Ok(())
}

/// The installed host; raises when called before [`install`].
#[allow(clippy::panic)]
pub(crate) fn installed() -> &'static dyn Host {
    match HOST.get() {
        Some(host) => &**host,
        None => panic!("no adaptation host installed"),
    }
}
