//! Host-facing transaction interface and its boundary implementation.

#![allow(unsafe_code)]

use std::fmt;
use std::marker::PhantomData;

use gantry_abi::{ForeignTable, XactionHandle};

use crate::area::Area;
use crate::bridge;
use crate::codec;
use crate::host::Transaction;
use crate::name::Name;
use crate::options::{NamedValueVisitor, Options};

/// One adaptation transaction as the host pipeline drives it.
///
/// Created by [`crate::Service::make_xaction`]; the host calls
/// [`Xaction::start`] before any adapted-body operation and either
/// [`Xaction::stop`] or drops the transaction when done.
///
/// Implementations also expose transaction meta-information through the
/// [`Options`] supertrait.
pub trait Xaction: Options {
    /// Begin processing the virgin message.
    fn start(&mut self);

    /// Processing finished; no further calls in either direction.
    fn stop(&mut self);

    /// Continue an asynchronous transaction after
    /// [`Transaction::resume`] was called on the host side.
    fn resume(&mut self);

    /// The adapted body will never be produced. Only called before
    /// [`Xaction::adapted_body_make`].
    fn adapted_body_discard(&mut self);

    /// The host wants adapted body content. Called at most once.
    fn adapted_body_make(&mut self);

    /// The host needs more adapted body content to make progress.
    fn adapted_body_make_more(&mut self);

    /// The host no longer needs adapted content. Only called after
    /// [`Xaction::adapted_body_make`].
    fn adapted_body_stop_making(&mut self);

    /// The host temporarily cannot accept adapted content.
    fn adapted_body_pause(&mut self);

    /// The host can accept adapted content again. Only called after
    /// [`Xaction::adapted_body_pause`].
    fn adapted_body_resume(&mut self);

    /// Extracts `[offset, offset+size)` of already-produced adapted
    /// content. May return fewer bytes than requested.
    fn adapted_body_content(&mut self, offset: usize, size: usize) -> Area;

    /// The host consumed `size` adapted bytes; they may be dropped and
    /// future offsets are relative to the shifted start.
    fn adapted_body_content_shift(&mut self, size: usize);

    /// No more virgin body content will arrive; `at_end` distinguishes a
    /// clean end from a truncated stream. Fact, not a hint.
    fn virgin_body_content_done(&mut self, at_end: bool);

    /// More virgin body content may be available. A hint, not a fact.
    fn virgin_body_content_available(&mut self);
}

/// [`Xaction`] implementation that forwards every call to the paired
/// foreign transaction.
///
/// `'h` ties the adapter to the host transaction it was created around;
/// the foreign side calls back into that transaction for as long as the
/// adapter lives.
pub struct XactionAdapter<'h> {
    /// Foreign transaction state, never dereferenced on this side.
    handle: XactionHandle,
    /// The module's entry table.
    table: &'static ForeignTable,
    /// Keeps the host-transaction borrow alive for the adapter's lifetime.
    _host: PhantomData<&'h mut dyn Transaction>,
}

// The foreign module owns the handle's synchronization; the boundary
// contract permits calls from any thread.
unsafe impl Send for XactionAdapter<'_> {}

impl XactionAdapter<'_> {
    /// Wraps a foreign transaction handle.
    ///
    /// # Safety
    ///
    /// `handle` must have been produced by the module that exported
    /// `table`; the adapter's drop is its one release.
    pub(crate) unsafe fn from_raw(handle: XactionHandle, table: &'static ForeignTable) -> Self {
        Self {
            handle,
            table,
            _host: PhantomData,
        }
    }
}

macro_rules! forward {
    ($($method:ident => $entry:ident),+ $(,)?) => {
        $(
            fn $method(&mut self) {
                bridge::call_unit(self.table, || unsafe {
                    (self.table.xaction.$entry)(self.handle)
                });
            }
        )+
    };
}

impl Xaction for XactionAdapter<'_> {
    forward! {
        start => start,
        stop => stop,
        resume => resume,
        adapted_body_discard => ab_discard,
        adapted_body_make => ab_make,
        adapted_body_make_more => ab_make_more,
        adapted_body_stop_making => ab_stop_making,
        adapted_body_pause => ab_pause,
        adapted_body_resume => ab_resume,
        virgin_body_content_available => vb_content_available,
    }

    fn adapted_body_content(&mut self, offset: usize, size: usize) -> Area {
        let raw = bridge::call(self.table, |out| unsafe {
            (self.table.xaction.ab_content)(self.handle, offset, size, out)
        });
        unsafe { codec::area_decode(raw) }
    }

    fn adapted_body_content_shift(&mut self, size: usize) {
        bridge::call_unit(self.table, || unsafe {
            (self.table.xaction.ab_content_shift)(self.handle, size)
        });
    }

    fn virgin_body_content_done(&mut self, at_end: bool) {
        bridge::call_unit(self.table, || unsafe {
            (self.table.xaction.vb_content_done)(self.handle, at_end)
        });
    }
}

impl Options for XactionAdapter<'_> {
    // This transaction carries no meta-information; adapters that need a
    // metadata channel expose it elsewhere, not through this interface.
    fn option(&self, _name: &Name) -> Option<Area> {
        None
    }

    fn visit_each(&self, _visitor: &mut dyn NamedValueVisitor) {}
}

impl Drop for XactionAdapter<'_> {
    fn drop(&mut self) {
        tracing::trace!(handle = ?self.handle, "releasing foreign transaction");
        unsafe { (self.table.xaction.free)(self.handle) };
    }
}

impl fmt::Debug for XactionAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XactionAdapter")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}
