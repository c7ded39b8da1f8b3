//! Entry-point tables exchanged at registration.

use libc::{c_char, c_void, timeval};

use crate::value::{
    BodyRef, HeaderRef, LineRef, MessageRef, OptionsRef, RawArea, RawBodySize, RawBuf, RawName,
    RawPanic, RawSharedMessage, RawVersion, ServiceHandle, SinkRef, VisitorFn, XactionHandle,
    XactionRef,
};

/// Per-service entries implemented by the foreign module.
///
/// Every `bool`-returning entry reports failure by returning `false` and
/// leaving one record on the module's panic channel.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ServiceTable {
    /// Unique service URI; out buffer is host-allocator memory.
    pub uri: unsafe extern "C" fn(ServiceHandle, *mut RawBuf) -> bool,
    /// Version/configuration tag.
    pub tag: unsafe extern "C" fn(ServiceHandle, *mut RawBuf) -> bool,
    /// Free-format description written to the given sink.
    pub describe: unsafe extern "C" fn(ServiceHandle, SinkRef) -> bool,
    /// Whether the service completes transactions asynchronously.
    pub is_async: unsafe extern "C" fn(ServiceHandle, *mut bool) -> bool,
    /// Initial configuration.
    pub configure: unsafe extern "C" fn(ServiceHandle, OptionsRef) -> bool,
    /// Configuration update; may repeat the previous configuration.
    pub reconfigure: unsafe extern "C" fn(ServiceHandle, OptionsRef) -> bool,
    /// Prepare for transaction creation.
    pub start: unsafe extern "C" fn(ServiceHandle) -> bool,
    /// Pause transaction creation until the next start.
    pub stop: unsafe extern "C" fn(ServiceHandle) -> bool,
    /// No further transactions will be requested.
    pub retire: unsafe extern "C" fn(ServiceHandle) -> bool,
    /// Hint at how long the host should wait; the service may shorten the
    /// timeout in place.
    pub suspend: unsafe extern "C" fn(ServiceHandle, *mut timeval) -> bool,
    /// Kick pending asynchronous transactions.
    pub resume: unsafe extern "C" fn(ServiceHandle) -> bool,
    /// Scope filter: should this service see the given URL?
    pub wants_url: unsafe extern "C" fn(ServiceHandle, *const c_char, *mut bool) -> bool,
    /// Create the foreign half of a transaction, keeping the host
    /// back-reference for later callbacks.
    pub make_xaction:
        unsafe extern "C" fn(ServiceHandle, XactionRef, *mut XactionHandle) -> bool,
    /// Release the service state. Called exactly once, on adapter drop.
    pub free: unsafe extern "C" fn(ServiceHandle),
}

/// Per-transaction entries implemented by the foreign module.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct XactionTable {
    /// Begin processing the virgin message.
    pub start: unsafe extern "C" fn(XactionHandle) -> bool,
    /// Processing finished; no further calls either way.
    pub stop: unsafe extern "C" fn(XactionHandle) -> bool,
    /// Continue an asynchronous transaction.
    pub resume: unsafe extern "C" fn(XactionHandle) -> bool,
    /// The adapted body will never be produced.
    pub ab_discard: unsafe extern "C" fn(XactionHandle) -> bool,
    /// The host wants adapted body content.
    pub ab_make: unsafe extern "C" fn(XactionHandle) -> bool,
    /// The host needs more adapted body content to make progress.
    pub ab_make_more: unsafe extern "C" fn(XactionHandle) -> bool,
    /// The host no longer needs adapted body content.
    pub ab_stop_making: unsafe extern "C" fn(XactionHandle) -> bool,
    /// The host temporarily cannot accept adapted content.
    pub ab_pause: unsafe extern "C" fn(XactionHandle) -> bool,
    /// The host can accept adapted content again.
    pub ab_resume: unsafe extern "C" fn(XactionHandle) -> bool,
    /// Extract `[offset, offset+size)` of produced adapted content.
    /// Ownership of the returned area transfers to the caller.
    pub ab_content:
        unsafe extern "C" fn(XactionHandle, usize, usize, *mut RawArea) -> bool,
    /// The host consumed `size` adapted bytes; they may be dropped.
    pub ab_content_shift: unsafe extern "C" fn(XactionHandle, usize) -> bool,
    /// No more virgin body content will arrive; `at_end` distinguishes a
    /// clean end from a truncated stream.
    pub vb_content_done: unsafe extern "C" fn(XactionHandle, bool) -> bool,
    /// More virgin body content may be available.
    pub vb_content_available: unsafe extern "C" fn(XactionHandle) -> bool,
    /// Release the transaction state. Called exactly once, on adapter drop.
    pub free: unsafe extern "C" fn(XactionHandle),
}

/// Panic-record channel of one side.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct PanicOps {
    /// Pop the most recent pending record. Returns `false` when none is
    /// pending.
    pub pop: unsafe extern "C" fn(*mut RawPanic) -> bool,
    /// Release a popped record's buffers.
    pub free: unsafe extern "C" fn(RawPanic),
}

/// Everything the foreign module exports to the host.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ForeignTable {
    /// Service lifecycle, configuration, and scope entries.
    pub service: ServiceTable,
    /// Transaction body-protocol entries.
    pub xaction: XactionTable,
    /// The module's panic channel.
    pub panic: PanicOps,
}

/// Host identity and message-construction entries.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct HostOps {
    /// Unique host URI.
    pub uri: unsafe extern "C" fn(*mut RawBuf) -> bool,
    /// Free-format host description.
    pub describe: unsafe extern "C" fn(*mut RawBuf) -> bool,
    /// Open a debug sink for the given verbosity mask; nil when the host
    /// declines to log at that verbosity.
    pub open_debug: unsafe extern "C" fn(usize, *mut SinkRef) -> bool,
    /// Close a sink returned by `open_debug`. Consumes the reference.
    pub close_debug: unsafe extern "C" fn(SinkRef) -> bool,
    /// Write bytes to an open sink.
    pub debug_write: unsafe extern "C" fn(SinkRef, *const c_char, usize) -> bool,
    /// Construct an empty request shell.
    pub new_request: unsafe extern "C" fn(*mut RawSharedMessage) -> bool,
    /// Construct an empty response shell.
    pub new_response: unsafe extern "C" fn(*mut RawSharedMessage) -> bool,
}

/// Host-transaction entries; every call takes the back-reference the
/// foreign transaction received at creation.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct HostXactionOps {
    /// Deliver the virgin message unmodified.
    pub use_virgin: unsafe extern "C" fn(XactionRef) -> bool,
    /// Deliver the given message instead; the host clones the handle, the
    /// caller keeps and releases its own.
    pub use_adapted: unsafe extern "C" fn(XactionRef, *const RawSharedMessage) -> bool,
    /// Deny access to the virgin message.
    pub block_virgin: unsafe extern "C" fn(XactionRef) -> bool,
    /// The adaptation terminated abnormally.
    pub adaptation_aborted: unsafe extern "C" fn(XactionRef) -> bool,
    /// Progress report: state description bytes and a completed fraction,
    /// negative when unknown.
    pub adaptation_delayed:
        unsafe extern "C" fn(XactionRef, *const c_char, usize, f64) -> bool,
    /// Register interest in resuming this transaction.
    pub resume: unsafe extern "C" fn(XactionRef) -> bool,
    /// The adapter wants the virgin body.
    pub vb_make: unsafe extern "C" fn(XactionRef) -> bool,
    /// The adapter will not look at the virgin body.
    pub vb_discard: unsafe extern "C" fn(XactionRef) -> bool,
    /// The adapter temporarily cannot accept virgin content.
    pub vb_pause: unsafe extern "C" fn(XactionRef) -> bool,
    /// The adapter can accept virgin content again.
    pub vb_resume: unsafe extern "C" fn(XactionRef) -> bool,
    /// The adapter needs more virgin body to make progress.
    pub vb_make_more: unsafe extern "C" fn(XactionRef) -> bool,
    /// The adapter will request no further virgin body content.
    pub vb_stop_making: unsafe extern "C" fn(XactionRef) -> bool,
    /// Extract `[offset, offset+size)` of virgin body content. Ownership of
    /// the returned area transfers to the caller.
    pub vb_content: unsafe extern "C" fn(XactionRef, usize, usize, *mut RawArea) -> bool,
    /// The adapter consumed `size` virgin bytes.
    pub vb_content_shift: unsafe extern "C" fn(XactionRef, usize) -> bool,
    /// The original, unmodified message.
    pub virgin: unsafe extern "C" fn(XactionRef, *mut MessageRef) -> bool,
    /// The message that triggered the virgin one; nil on the request side.
    pub cause: unsafe extern "C" fn(XactionRef, *mut MessageRef) -> bool,
    /// The message previously passed to `use_adapted`.
    pub adapted: unsafe extern "C" fn(XactionRef, *mut MessageRef) -> bool,
    /// Adapted body content may be available.
    pub note_ab_content_available: unsafe extern "C" fn(XactionRef) -> bool,
    /// No more adapted body content will be produced.
    pub note_ab_content_done: unsafe extern "C" fn(XactionRef, bool) -> bool,
}

/// Message accessors.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct MessageOps {
    /// Deep-copy the message, yielding a fresh handle.
    pub clone: unsafe extern "C" fn(MessageRef, *mut RawSharedMessage) -> bool,
    /// The request or status line.
    pub first_line: unsafe extern "C" fn(MessageRef, *mut LineRef) -> bool,
    /// The header.
    pub header: unsafe extern "C" fn(MessageRef, *mut HeaderRef) -> bool,
    /// The body; nil when the message has none.
    pub body: unsafe extern "C" fn(MessageRef, *mut BodyRef) -> bool,
    /// The trailer; nil when the message has none.
    pub trailer: unsafe extern "C" fn(MessageRef, *mut HeaderRef) -> bool,
    /// Attach an (empty) body.
    pub add_body: unsafe extern "C" fn(MessageRef) -> bool,
    /// Attach an (empty) trailer.
    pub add_trailer: unsafe extern "C" fn(MessageRef) -> bool,
}

/// Shared-handle plumbing. These entries are panic-free.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SharedOps {
    /// Borrow the message behind a handle. The reference is valid while the
    /// handle stays alive.
    pub get: unsafe extern "C" fn(*const RawSharedMessage) -> MessageRef,
    /// Release a handle. Exactly once per encode.
    pub free: unsafe extern "C" fn(*mut RawSharedMessage),
}

/// First-line accessors.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct LineOps {
    /// Protocol version.
    pub version: unsafe extern "C" fn(LineRef, *mut RawVersion) -> bool,
    /// Set the protocol version.
    pub set_version: unsafe extern "C" fn(LineRef, *const RawVersion) -> bool,
    /// Protocol name as a view; valid only for this call.
    pub protocol: unsafe extern "C" fn(LineRef, *mut RawName) -> bool,
    /// Set the protocol name; the host copies the view.
    pub set_protocol: unsafe extern "C" fn(LineRef, *const RawName) -> bool,
}

/// Header and trailer accessors.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct HeaderOps {
    /// Does at least one field with this name exist?
    pub has_any: unsafe extern "C" fn(HeaderRef, *const RawName, *mut bool) -> bool,
    /// Value of the named field(s); an empty area when absent.
    pub value: unsafe extern "C" fn(HeaderRef, *const RawName, *mut RawArea) -> bool,
    /// Append a field. The value area is borrowed, not consumed.
    pub add: unsafe extern "C" fn(HeaderRef, *const RawName, *const RawArea) -> bool,
    /// Remove all fields with this name.
    pub remove_any: unsafe extern "C" fn(HeaderRef, *const RawName) -> bool,
    /// Serialized image of the header.
    pub image: unsafe extern "C" fn(HeaderRef, *mut RawArea) -> bool,
    /// Parse a serialized image into the header. The buffer area is
    /// borrowed, not consumed.
    pub parse: unsafe extern "C" fn(HeaderRef, *const RawArea) -> bool,
    /// Visit every field in order.
    pub visit_each: unsafe extern "C" fn(HeaderRef, VisitorFn, *mut c_void) -> bool,
}

/// Body accessors.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct BodyOps {
    /// Known/unknown size of the body.
    pub size: unsafe extern "C" fn(BodyRef, *mut RawBodySize) -> bool,
}

/// Configuration option accessors.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct OptionsOps {
    /// Value of the named option; an empty area when absent.
    pub value: unsafe extern "C" fn(OptionsRef, *const RawName, *mut RawArea) -> bool,
    /// Visit every option, including ones with unknown names.
    pub visit: unsafe extern "C" fn(OptionsRef, VisitorFn, *mut c_void) -> bool,
}

/// Area construction and release. These entries are panic-free.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct AreaOps {
    /// The empty area.
    pub new: unsafe extern "C" fn() -> RawArea,
    /// Copy the given bytes into a host-backed area.
    pub from_bytes: unsafe extern "C" fn(*const c_char, usize) -> RawArea,
    /// Release an area without decoding it.
    pub free: unsafe extern "C" fn(*mut RawArea),
}

/// Transfer-buffer allocator pair. These entries are panic-free.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct BufOps {
    /// Copy the given bytes into a host-allocator buffer.
    pub new: unsafe extern "C" fn(*const c_char, usize) -> RawBuf,
    /// Release a buffer. Exactly once.
    pub free: unsafe extern "C" fn(RawBuf),
}

/// Everything the host exports to foreign modules.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct HostTable {
    /// Host identity, debug sinks, and message construction.
    pub host: HostOps,
    /// Host-transaction driving entries.
    pub xaction: HostXactionOps,
    /// Message accessors.
    pub message: MessageOps,
    /// Shared-handle plumbing.
    pub shared: SharedOps,
    /// First-line accessors.
    pub line: LineOps,
    /// Header and trailer accessors.
    pub header: HeaderOps,
    /// Body accessors.
    pub body: BodyOps,
    /// Configuration option accessors.
    pub options: OptionsOps,
    /// Area construction and release.
    pub area: AreaOps,
    /// Transfer-buffer allocator pair.
    pub buf: BufOps,
    /// The host's panic channel.
    pub panic: PanicOps,
}
