//! Host-facing service interface and its boundary implementation.

#![allow(unsafe_code)]

use std::ffi::CStr;
use std::fmt;
use std::ptr;
use std::time::Duration;

use gantry_abi::{ForeignTable, ServiceHandle};
use libc::timeval;

use crate::bridge;
use crate::codec;
use crate::host::Transaction;
use crate::log::DebugSink;
use crate::options::Options;
use crate::xaction::{Xaction, XactionAdapter};

/// An adaptation service as the host pipeline sees it.
///
/// The host configures and starts a service once, consults
/// [`Service::wants_url`] before routing work to it, and asks it for one
/// [`Xaction`] per unit of work.
pub trait Service {
    /// Unique service URI, stable across vendors.
    fn uri(&self) -> String;

    /// Tag identifying this version and configuration.
    fn tag(&self) -> String;

    /// Writes a free-format description to the sink.
    fn describe(&self, sink: &mut dyn DebugSink);

    /// Whether transactions may complete asynchronously. When `false`, the
    /// host never calls [`Service::suspend`] or [`Service::resume`].
    fn is_async(&self) -> bool;

    /// Applies the initial configuration. Called once.
    fn configure(&self, options: &dyn Options);

    /// Applies a configuration update; may repeat the previous one.
    fn reconfigure(&self, options: &dyn Options);

    /// Prepare for [`Service::make_xaction`] calls.
    fn start(&self);

    /// Pause transaction creation until the next [`Service::start`].
    fn stop(&self);

    /// No further transactions will be requested.
    fn retire(&self);

    /// Lets the service shorten how long the host waits before checking on
    /// pending asynchronous transactions. Increasing the timeout is
    /// invalid.
    fn suspend(&self, timeout: &mut Duration);

    /// Kick pending asynchronous transactions; the service responds by
    /// calling [`Transaction::resume`] on the ones that are ready.
    fn resume(&self);

    /// Scope filter consulted before routing a URL to this service.
    fn wants_url(&self, url: &CStr) -> bool;

    /// Creates the per-transaction pair for one unit of work.
    fn make_xaction<'h>(&self, hostx: &'h mut (dyn Transaction + 'h)) -> Box<dyn Xaction + 'h>;
}

/// [`Service`] implementation that forwards every call to a foreign module.
///
/// Holds nothing but the opaque foreign handle and the module's entry
/// table; dropping the adapter releases the handle exactly once.
pub struct ServiceAdapter {
    /// Foreign service state, never dereferenced on this side.
    handle: ServiceHandle,
    /// The module's entry table.
    table: &'static ForeignTable,
}

// The foreign module owns the handle and its synchronization; the boundary
// contract permits calls from any thread.
unsafe impl Send for ServiceAdapter {}
unsafe impl Sync for ServiceAdapter {}

impl ServiceAdapter {
    /// Wraps a foreign service handle.
    ///
    /// # Safety
    ///
    /// `handle` must have been produced by the module that exported
    /// `table` and must not be released elsewhere; the adapter's drop is
    /// its one release.
    #[must_use]
    pub unsafe fn from_raw(handle: ServiceHandle, table: &'static ForeignTable) -> Self {
        Self { handle, table }
    }
}

impl Service for ServiceAdapter {
    fn uri(&self) -> String {
        let buf = bridge::call(self.table, |out| unsafe {
            (self.table.service.uri)(self.handle, out)
        });
        unsafe { codec::buf_into_string(buf) }
    }

    fn tag(&self) -> String {
        let buf = bridge::call(self.table, |out| unsafe {
            (self.table.service.tag)(self.handle, out)
        });
        unsafe { codec::buf_into_string(buf) }
    }

    fn describe(&self, sink: &mut dyn DebugSink) {
        let sink = codec::sink_borrow(sink);
        bridge::call_unit(self.table, || unsafe {
            (self.table.service.describe)(self.handle, sink)
        });
    }

    fn is_async(&self) -> bool {
        bridge::call(self.table, |out| unsafe {
            (self.table.service.is_async)(self.handle, out)
        })
    }

    fn configure(&self, options: &dyn Options) {
        let options = codec::options_ref(options);
        bridge::call_unit(self.table, || unsafe {
            (self.table.service.configure)(self.handle, options)
        });
    }

    fn reconfigure(&self, options: &dyn Options) {
        let options = codec::options_ref(options);
        bridge::call_unit(self.table, || unsafe {
            (self.table.service.reconfigure)(self.handle, options)
        });
    }

    fn start(&self) {
        bridge::call_unit(self.table, || unsafe {
            (self.table.service.start)(self.handle)
        });
    }

    fn stop(&self) {
        bridge::call_unit(self.table, || unsafe {
            (self.table.service.stop)(self.handle)
        });
    }

    fn retire(&self) {
        bridge::call_unit(self.table, || unsafe {
            (self.table.service.retire)(self.handle)
        });
    }

    #[allow(clippy::cast_possible_wrap)]
    fn suspend(&self, timeout: &mut Duration) {
        let mut raw = timeval {
            tv_sec: timeout.as_secs() as libc::time_t,
            tv_usec: timeout.subsec_micros() as libc::suseconds_t,
        };
        bridge::call_unit(self.table, || unsafe {
            (self.table.service.suspend)(self.handle, &raw mut raw)
        });
        #[allow(clippy::cast_sign_loss)]
        let shortened = Duration::new(raw.tv_sec.max(0) as u64, raw.tv_usec.max(0) as u32 * 1000);
        *timeout = shortened;
    }

    fn resume(&self) {
        bridge::call_unit(self.table, || unsafe {
            (self.table.service.resume)(self.handle)
        });
    }

    fn wants_url(&self, url: &CStr) -> bool {
        bridge::call(self.table, |out| unsafe {
            (self.table.service.wants_url)(self.handle, url.as_ptr(), out)
        })
    }

    fn make_xaction<'h>(&self, hostx: &'h mut (dyn Transaction + 'h)) -> Box<dyn Xaction + 'h> {
        // The back-reference outlives the returned adapter by the 'h bound.
        let back = codec::xaction_ref(rebind(ptr::from_mut(hostx)));
        let handle = bridge::call(self.table, |out| unsafe {
            (self.table.service.make_xaction)(self.handle, back, out)
        });
        tracing::trace!(?handle, "foreign transaction created");
        Box::new(unsafe { XactionAdapter::from_raw(handle, self.table) })
    }
}

/// Erases the borrow lifetime from a transaction pointer for encoding.
/// Validity stays bounded by the adapter's `'h`.
fn rebind<'h>(ptr: *mut (dyn Transaction + 'h)) -> *mut (dyn Transaction + 'static) {
    unsafe { std::mem::transmute(ptr) }
}

impl Drop for ServiceAdapter {
    fn drop(&mut self) {
        tracing::trace!(handle = ?self.handle, "releasing foreign service");
        unsafe { (self.table.service.free)(self.handle) };
    }
}

impl fmt::Debug for ServiceAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAdapter")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}
