//! Failure propagation across the boundary.
//!
//! Every logic-bearing boundary call returns a success boolean. A failing
//! call leaves exactly one panic record on the failing side's channel; the
//! caller pops it and either re-raises the preserved host payload (when the
//! failure originated in host code) or raises a fresh [`ForeignFailure`].
//!
//! The record queue and the payload stash are thread-local: each thread
//! unwinds its own failure chain, and nesting pushes and pops in strict
//! LIFO order. A pop that finds nothing pending means the protocol was
//! already broken elsewhere and aborts the process.

#![allow(unsafe_code, clippy::panic)]

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::mem::MaybeUninit;
use std::panic::{self, AssertUnwindSafe};
use std::process;
use std::ptr;
use std::sync::Once;

use gantry_abi::{ForeignTable, RawBuf, RawLocation, RawPanic};

use crate::codec;
use crate::error::Error;

/// Source position captured from a failing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    /// Source file path.
    pub file: String,
    /// 1-based line.
    pub line: u32,
    /// 1-based column.
    pub column: u32,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// A failure that originated on the foreign side of the boundary.
///
/// Adapters raise this payload when a forwarded call reports a failure
/// that did not start as a host-side exception. Host code that catches
/// unwinds at its outer edge can downcast to recover the foreign message
/// and source location.
#[derive(Debug)]
pub struct ForeignFailure {
    /// Message reported by the foreign module.
    pub message: String,
    /// Failure origin on the foreign side, when reported.
    pub location: Option<SourceLocation>,
}

impl fmt::Display for ForeignFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{} (at {location})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ForeignFailure {}

/// One pending record on the host's panic channel.
struct Record {
    /// Whether the failure started as a host-side exception (and the stash
    /// holds its payload).
    host_origin: bool,
    /// Summary message.
    message: String,
    /// Capture site, when known.
    location: Option<SourceLocation>,
}

thread_local! {
    /// Records awaiting a foreign pop, most recent last.
    static RECORDS: RefCell<Vec<Record>> = const { RefCell::new(Vec::new()) };
    /// Caught host payloads awaiting re-raise, most recent last.
    static STASH: RefCell<Vec<Box<dyn Any + Send>>> = const { RefCell::new(Vec::new()) };
    /// Location of the most recent panic, set by the hook.
    static CAPTURE: Cell<Option<SourceLocation>> = const { Cell::new(None) };
}

static ARM: Once = Once::new();

/// Installs the location-capturing panic hook. Idempotent.
pub(crate) fn arm() {
    ARM.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let location = info.location().map(|l| SourceLocation {
                file: l.file().to_owned(),
                line: l.line(),
                column: l.column(),
            });
            tracing::trace!(location = ?location, "panic captured at boundary hook");
            CAPTURE.with(|slot| slot.set(location));
            previous(info);
        }));
    });
}

/// Extracts a printable message from a panic payload.
fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else if let Some(text) = payload.downcast_ref::<&'static str>() {
        (*text).to_owned()
    } else if let Some(error) = payload.downcast_ref::<Error>() {
        error.to_string()
    } else {
        String::from("non-string panic payload")
    }
}

/// Converts a caught unwind into a pending record (and, for host-origin
/// failures, a stashed payload).
fn absorb(payload: Box<dyn Any + Send>) {
    let location = CAPTURE.with(Cell::take);
    if let Some(foreign) = payload.downcast_ref::<ForeignFailure>() {
        // The failure is crossing back out of host code; the foreign
        // runtime still holds its original exception and will re-raise it.
        tracing::trace!(message = %foreign.message, "foreign failure leaving host code");
        RECORDS.with(|records| {
            records.borrow_mut().push(Record {
                host_origin: false,
                message: foreign.message.clone(),
                location: foreign.location.clone(),
            });
        });
    } else {
        let message = payload_message(&*payload);
        tracing::trace!(%message, "host failure stashed at boundary");
        RECORDS.with(|records| {
            records.borrow_mut().push(Record {
                host_origin: true,
                message,
                location,
            });
        });
        STASH.with(|stash| stash.borrow_mut().push(payload));
    }
}

/// Runs a callback body, converting any unwind into a pending record and a
/// `false` return. On success the result is written to `out`.
///
/// # Safety
///
/// `out` must be valid for writing one `R`.
pub(crate) unsafe fn guard<R>(out: *mut R, body: impl FnOnce() -> R) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(value) => {
            unsafe { ptr::write(out, value) };
            true
        }
        Err(payload) => {
            absorb(payload);
            false
        }
    }
}

/// [`guard`] for entries without a result.
pub(crate) fn guard_unit(body: impl FnOnce()) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(()) => true,
        Err(payload) => {
            absorb(payload);
            false
        }
    }
}

/// Pops the most recent pending record into `out`. Returns `false` when
/// none is pending.
///
/// # Safety
///
/// `out` must be valid for writing one record.
pub(crate) unsafe fn pop_record(out: *mut RawPanic) -> bool {
    let Some(record) = RECORDS.with(|records| records.borrow_mut().pop()) else {
        return false;
    };
    #[allow(clippy::cast_possible_wrap)]
    let location = match record.location {
        Some(location) => RawLocation {
            file: codec::buf_from_vec(location.file.into_bytes()),
            line: location.line as libc::c_int,
            column: location.column as libc::c_int,
        },
        None => RawLocation {
            file: RawBuf {
                len: 0,
                ptr: ptr::null_mut(),
                cap: 0,
            },
            line: 0,
            column: 0,
        },
    };
    unsafe {
        ptr::write(
            out,
            RawPanic {
                host_origin: record.host_origin,
                message: codec::buf_from_vec(record.message.into_bytes()),
                location,
            },
        );
    }
    true
}

/// Releases the buffers of a popped record.
pub(crate) unsafe fn free_record(record: RawPanic) {
    unsafe {
        drop(codec::buf_into_vec(record.message));
        drop(codec::buf_into_vec(record.location.file));
    }
}

/// Invokes a foreign entry expecting a result; on failure, unwinds with the
/// resolved exception.
pub(crate) fn call<R>(table: &'static ForeignTable, entry: impl FnOnce(*mut R) -> bool) -> R {
    let mut slot = MaybeUninit::<R>::uninit();
    if entry(slot.as_mut_ptr()) {
        unsafe { slot.assume_init() }
    } else {
        resolve(table)
    }
}

/// [`call`] for entries without a result.
pub(crate) fn call_unit(table: &'static ForeignTable, entry: impl FnOnce() -> bool) {
    if !entry() {
        resolve(table);
    }
}

/// Resolves a failed foreign call: pops the record and re-raises.
pub(crate) fn resolve(table: &'static ForeignTable) -> ! {
    let mut slot = MaybeUninit::<RawPanic>::uninit();
    if !unsafe { (table.panic.pop)(slot.as_mut_ptr()) } {
        fatal("boundary call failed with no panic record pending");
    }
    let raw = unsafe { slot.assume_init() };
    let host_origin = raw.host_origin;
    let message = copy_buf(&raw.message);
    #[allow(clippy::cast_sign_loss)]
    let location = if raw.location.file.ptr.is_null() {
        None
    } else {
        Some(SourceLocation {
            file: copy_buf(&raw.location.file),
            line: raw.location.line as u32,
            column: raw.location.column as u32,
        })
    };
    unsafe { (table.panic.free)(raw) };

    if host_origin {
        let Some(payload) = STASH.with(|stash| stash.borrow_mut().pop()) else {
            fatal("host-origin failure with an empty exception stash");
        };
        tracing::trace!(%message, "re-raising preserved host failure");
        panic::resume_unwind(payload)
    } else {
        tracing::trace!(%message, "raising foreign failure");
        panic::panic_any(ForeignFailure { message, location })
    }
}

/// Copies a record buffer without taking ownership.
fn copy_buf(buf: &RawBuf) -> String {
    if buf.ptr.is_null() || buf.len == 0 {
        return String::new();
    }
    let bytes = unsafe { std::slice::from_raw_parts(buf.ptr.cast::<u8>().cast_const(), buf.len) };
    String::from_utf8_lossy(bytes).into_owned()
}

/// Unrecoverable protocol violation: the bridge invariants were already
/// broken elsewhere, so no error can be reported through them.
fn fatal(reason: &str) -> ! {
    tracing::error!(reason, "boundary protocol violation");
    process::abort()
}
