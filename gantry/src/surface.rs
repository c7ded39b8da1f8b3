//! Host callback surface: the entry points foreign modules call back into.
//!
//! Every entry delegates one call to the installed [`crate::Host`] or to
//! the host object named by an opaque reference, wrapped by the failure
//! bridge. Logic-bearing entries return the success boolean; allocator and
//! handle plumbing (`area`, `buf`, `shared`, `panic`) is plain and
//! panic-free.

#![allow(unsafe_code, clippy::panic)]

use std::panic;
use std::ptr;

use gantry_abi::{
    AreaOps, BodyOps, BodyRef, BufOps, HeaderOps, HeaderRef, HostOps, HostTable, HostXactionOps,
    LineOps, LineRef, MessageOps, MessageRef, OptionsOps, OptionsRef, PanicOps, RawArea,
    RawBodySize, RawBuf, RawName, RawPanic, RawSharedMessage, RawVersion, SharedOps, SinkRef,
    VisitorFn, XactionRef,
};
use libc::{c_char, c_void};

use crate::area::Area;
use crate::bridge;
use crate::codec;
use crate::host::{self, Delay, Transaction};
use crate::log::LogVerbosity;
use crate::message::{Body, FirstLine, Header, Message};
use crate::name::Name;
use crate::options::{NamedValueVisitor, Options};

/// The host's entry-point table, handed to foreign modules at
/// registration.
#[must_use]
pub fn host_table() -> &'static HostTable {
    &HOST_TABLE
}

static HOST_TABLE: HostTable = HostTable {
    host: HostOps {
        uri: host_uri,
        describe: host_describe,
        open_debug: host_open_debug,
        close_debug: host_close_debug,
        debug_write: host_debug_write,
        new_request: host_new_request,
        new_response: host_new_response,
    },
    xaction: HostXactionOps {
        use_virgin: xaction_use_virgin,
        use_adapted: xaction_use_adapted,
        block_virgin: xaction_block_virgin,
        adaptation_aborted: xaction_adaptation_aborted,
        adaptation_delayed: xaction_adaptation_delayed,
        resume: xaction_resume,
        vb_make: xaction_vb_make,
        vb_discard: xaction_vb_discard,
        vb_pause: xaction_vb_pause,
        vb_resume: xaction_vb_resume,
        vb_make_more: xaction_vb_make_more,
        vb_stop_making: xaction_vb_stop_making,
        vb_content: xaction_vb_content,
        vb_content_shift: xaction_vb_content_shift,
        virgin: xaction_virgin,
        cause: xaction_cause,
        adapted: xaction_adapted,
        note_ab_content_available: xaction_note_ab_content_available,
        note_ab_content_done: xaction_note_ab_content_done,
    },
    message: MessageOps {
        clone: message_clone,
        first_line: message_first_line,
        header: message_header,
        body: message_body,
        trailer: message_trailer,
        add_body: message_add_body,
        add_trailer: message_add_trailer,
    },
    shared: SharedOps {
        get: shared_get,
        free: shared_free,
    },
    line: LineOps {
        version: line_version,
        set_version: line_set_version,
        protocol: line_protocol,
        set_protocol: line_set_protocol,
    },
    header: HeaderOps {
        has_any: header_has_any,
        value: header_value,
        add: header_add,
        remove_any: header_remove_any,
        image: header_image,
        parse: header_parse,
        visit_each: header_visit_each,
    },
    body: BodyOps { size: body_size },
    options: OptionsOps {
        value: options_value,
        visit: options_visit,
    },
    area: AreaOps {
        new: area_new,
        from_bytes: area_from_bytes,
        free: area_free,
    },
    buf: BufOps {
        new: buf_new,
        free: buf_free,
    },
    panic: PanicOps {
        pop: panic_pop,
        free: panic_free,
    },
};

// ---- reference accessors -------------------------------------------------

/// # Safety: the reference must name a live host transaction.
unsafe fn xaction_mut<'a>(raw: XactionRef) -> &'a mut dyn Transaction {
    unsafe { &mut *codec::xaction_from(raw) }
}

/// # Safety: the reference must name a live message.
unsafe fn message_of<'a>(raw: MessageRef) -> &'a dyn Message {
    unsafe { &*codec::message_from(raw) }
}

/// # Safety: the reference must name a live message, not otherwise aliased.
unsafe fn message_mut<'a>(raw: MessageRef) -> &'a mut dyn Message {
    unsafe { &mut *codec::message_from(raw) }
}

/// # Safety: the reference must name a live header.
unsafe fn header_of<'a>(raw: HeaderRef) -> &'a dyn Header {
    unsafe { &*codec::header_from(raw) }
}

/// # Safety: the reference must name a live header, not otherwise aliased.
unsafe fn header_mut<'a>(raw: HeaderRef) -> &'a mut dyn Header {
    unsafe { &mut *codec::header_from(raw) }
}

/// # Safety: the reference must name a live first line.
unsafe fn line_of<'a>(raw: LineRef) -> &'a dyn FirstLine {
    unsafe { &*codec::line_from(raw) }
}

/// # Safety: the reference must name a live first line, not otherwise
/// aliased.
unsafe fn line_mut<'a>(raw: LineRef) -> &'a mut dyn FirstLine {
    unsafe { &mut *codec::line_from(raw) }
}

/// # Safety: the reference must name a live body.
unsafe fn body_of<'a>(raw: BodyRef) -> &'a dyn Body {
    unsafe { &*codec::body_from(raw) }
}

/// # Safety: the reference must name a live option set.
unsafe fn options_of<'a>(raw: OptionsRef) -> &'a dyn Options {
    unsafe { &*codec::options_from(raw) }
}

/// Relays host-side visits to a foreign callback.
struct VisitorTrampoline {
    /// Foreign callback.
    callback: VisitorFn,
    /// Opaque foreign context.
    extra: *mut c_void,
}

impl NamedValueVisitor for VisitorTrampoline {
    fn visit(&mut self, name: &Name, value: &Area) {
        let raw_name = codec::name_view(name);
        let bytes = value.as_bytes();
        unsafe {
            (self.callback)(
                &raw const raw_name,
                bytes.as_ptr().cast::<c_char>(),
                bytes.len(),
                self.extra,
            );
        }
    }
}

// ---- host ops ------------------------------------------------------------

unsafe extern "C" fn host_uri(out: *mut RawBuf) -> bool {
    unsafe { bridge::guard(out, || codec::buf_from_vec(host::installed().uri().into_bytes())) }
}

unsafe extern "C" fn host_describe(out: *mut RawBuf) -> bool {
    unsafe {
        bridge::guard(out, || {
            codec::buf_from_vec(host::installed().describe().into_bytes())
        })
    }
}

unsafe extern "C" fn host_open_debug(mask: usize, out: *mut SinkRef) -> bool {
    unsafe {
        bridge::guard(out, || {
            match host::installed().open_debug(LogVerbosity::from_mask(mask)) {
                Some(sink) => codec::sink_into_raw(sink),
                None => SinkRef::nil(),
            }
        })
    }
}

unsafe extern "C" fn host_close_debug(sink: SinkRef) -> bool {
    bridge::guard_unit(|| {
        if !sink.is_nil() {
            let sink = unsafe { codec::sink_into_box(sink) };
            host::installed().close_debug(sink);
        }
    })
}

unsafe extern "C" fn host_debug_write(sink: SinkRef, bytes: *const c_char, len: usize) -> bool {
    bridge::guard_unit(|| {
        if !sink.is_nil() {
            let bytes = unsafe { codec::view_bytes(bytes, len) };
            unsafe { &mut *codec::sink_from(sink) }.write(bytes);
        }
    })
}

unsafe extern "C" fn host_new_request(out: *mut RawSharedMessage) -> bool {
    unsafe { bridge::guard(out, || codec::shared_encode(host::installed().new_request())) }
}

unsafe extern "C" fn host_new_response(out: *mut RawSharedMessage) -> bool {
    unsafe { bridge::guard(out, || codec::shared_encode(host::installed().new_response())) }
}

// ---- transaction ops -----------------------------------------------------

macro_rules! xaction_entry {
    ($($name:ident => $method:ident),+ $(,)?) => {
        $(
            unsafe extern "C" fn $name(xaction: XactionRef) -> bool {
                bridge::guard_unit(|| unsafe { xaction_mut(xaction) }.$method())
            }
        )+
    };
}

xaction_entry! {
    xaction_use_virgin => use_virgin,
    xaction_block_virgin => block_virgin,
    xaction_adaptation_aborted => adaptation_aborted,
    xaction_resume => resume,
    xaction_vb_make => virgin_body_make,
    xaction_vb_discard => virgin_body_discard,
    xaction_vb_pause => virgin_body_pause,
    xaction_vb_resume => virgin_body_resume,
    xaction_vb_make_more => virgin_body_make_more,
    xaction_vb_stop_making => virgin_body_stop_making,
    xaction_note_ab_content_available => adapted_body_content_available,
}

unsafe extern "C" fn xaction_use_adapted(
    xaction: XactionRef,
    message: *const RawSharedMessage,
) -> bool {
    bridge::guard_unit(|| {
        let message = unsafe { codec::shared_clone(message) };
        unsafe { xaction_mut(xaction) }.use_adapted(message);
    })
}

unsafe extern "C" fn xaction_adaptation_delayed(
    xaction: XactionRef,
    state: *const c_char,
    len: usize,
    progress: f64,
) -> bool {
    bridge::guard_unit(|| {
        let description = unsafe { codec::view_bytes(state, len) };
        let delay = Delay {
            progress: (progress >= 0.0).then_some(progress),
            description: if description.is_empty() {
                None
            } else {
                Some(String::from_utf8_lossy(description).into_owned())
            },
        };
        unsafe { xaction_mut(xaction) }.adaptation_delayed(&delay);
    })
}

unsafe extern "C" fn xaction_vb_content(
    xaction: XactionRef,
    offset: usize,
    size: usize,
    out: *mut RawArea,
) -> bool {
    unsafe {
        bridge::guard(out, || {
            codec::area_encode(unsafe { xaction_mut(xaction) }.virgin_body_content(offset, size))
        })
    }
}

unsafe extern "C" fn xaction_vb_content_shift(xaction: XactionRef, size: usize) -> bool {
    bridge::guard_unit(|| unsafe { xaction_mut(xaction) }.virgin_body_content_shift(size))
}

unsafe extern "C" fn xaction_virgin(xaction: XactionRef, out: *mut MessageRef) -> bool {
    unsafe {
        bridge::guard(out, || {
            codec::message_ref(ptr::from_mut(unsafe { xaction_mut(xaction) }.virgin()))
        })
    }
}

unsafe extern "C" fn xaction_cause(xaction: XactionRef, out: *mut MessageRef) -> bool {
    unsafe {
        bridge::guard(out, || {
            // Handed out for reading; the mutable encoding is shared with
            // the other message accessors.
            codec::message_ref(ptr::from_ref(unsafe { xaction_mut(xaction) }.cause()).cast_mut())
        })
    }
}

unsafe extern "C" fn xaction_adapted(xaction: XactionRef, out: *mut MessageRef) -> bool {
    unsafe {
        bridge::guard(out, || {
            codec::message_ref(ptr::from_mut(unsafe { xaction_mut(xaction) }.adapted()))
        })
    }
}

unsafe extern "C" fn xaction_note_ab_content_done(xaction: XactionRef, at_end: bool) -> bool {
    bridge::guard_unit(|| unsafe { xaction_mut(xaction) }.adapted_body_content_done(at_end))
}

// ---- message ops ---------------------------------------------------------

unsafe extern "C" fn message_clone(message: MessageRef, out: *mut RawSharedMessage) -> bool {
    unsafe {
        bridge::guard(out, || {
            codec::shared_encode(unsafe { message_of(message) }.clone_message())
        })
    }
}

unsafe extern "C" fn message_first_line(message: MessageRef, out: *mut LineRef) -> bool {
    unsafe {
        bridge::guard(out, || {
            codec::line_ref(ptr::from_mut(unsafe { message_mut(message) }.first_line_mut()))
        })
    }
}

unsafe extern "C" fn message_header(message: MessageRef, out: *mut HeaderRef) -> bool {
    unsafe {
        bridge::guard(out, || {
            codec::header_ref(ptr::from_mut(unsafe { message_mut(message) }.header_mut()))
        })
    }
}

unsafe extern "C" fn message_body(message: MessageRef, out: *mut BodyRef) -> bool {
    unsafe {
        bridge::guard(out, || {
            match unsafe { message_mut(message) }.body_mut() {
                Some(body) => codec::body_ref(ptr::from_mut(body)),
                None => BodyRef::nil(),
            }
        })
    }
}

unsafe extern "C" fn message_trailer(message: MessageRef, out: *mut HeaderRef) -> bool {
    unsafe {
        bridge::guard(out, || {
            match unsafe { message_mut(message) }.trailer_mut() {
                Some(trailer) => codec::header_ref(ptr::from_mut(trailer)),
                None => HeaderRef::nil(),
            }
        })
    }
}

unsafe extern "C" fn message_add_body(message: MessageRef) -> bool {
    bridge::guard_unit(|| unsafe { message_mut(message) }.add_body())
}

unsafe extern "C" fn message_add_trailer(message: MessageRef) -> bool {
    bridge::guard_unit(|| unsafe { message_mut(message) }.add_trailer())
}

// ---- shared-handle ops ---------------------------------------------------

unsafe extern "C" fn shared_get(raw: *const RawSharedMessage) -> MessageRef {
    unsafe { codec::message_ref(codec::shared_get(raw)) }
}

unsafe extern "C" fn shared_free(raw: *mut RawSharedMessage) {
    unsafe { drop(codec::shared_decode(ptr::read(raw))) };
}

// ---- first-line ops ------------------------------------------------------

unsafe extern "C" fn line_version(line: LineRef, out: *mut RawVersion) -> bool {
    unsafe { bridge::guard(out, || codec::version_encode(unsafe { line_of(line) }.version())) }
}

unsafe extern "C" fn line_set_version(line: LineRef, version: *const RawVersion) -> bool {
    bridge::guard_unit(|| {
        let version = codec::version_decode(unsafe { &*version });
        unsafe { line_mut(line) }.set_version(version);
    })
}

unsafe extern "C" fn line_protocol(line: LineRef, out: *mut RawName) -> bool {
    unsafe { bridge::guard(out, || codec::name_view(unsafe { line_of(line) }.protocol())) }
}

unsafe extern "C" fn line_set_protocol(line: LineRef, name: *const RawName) -> bool {
    bridge::guard_unit(|| {
        let name = unsafe { codec::name_owned(&*name) };
        unsafe { line_mut(line) }.set_protocol(name);
    })
}

// ---- header ops ----------------------------------------------------------

unsafe extern "C" fn header_has_any(
    header: HeaderRef,
    name: *const RawName,
    out: *mut bool,
) -> bool {
    unsafe {
        bridge::guard(out, || {
            unsafe { header_of(header) }.has_any(&unsafe { codec::name_owned(&*name) })
        })
    }
}

unsafe extern "C" fn header_value(
    header: HeaderRef,
    name: *const RawName,
    out: *mut RawArea,
) -> bool {
    unsafe {
        bridge::guard(out, || {
            let name = unsafe { codec::name_owned(&*name) };
            codec::area_encode(unsafe { header_of(header) }.value(&name).unwrap_or_default())
        })
    }
}

unsafe extern "C" fn header_add(
    header: HeaderRef,
    name: *const RawName,
    value: *const RawArea,
) -> bool {
    bridge::guard_unit(|| {
        let name = unsafe { codec::name_owned(&*name) };
        // The value area stays owned by the caller; only its bytes are
        // taken.
        let bytes = unsafe { codec::view_bytes((*value).ptr, (*value).len) };
        unsafe { header_mut(header) }.add(name, Area::from_bytes(bytes));
    })
}

unsafe extern "C" fn header_remove_any(header: HeaderRef, name: *const RawName) -> bool {
    bridge::guard_unit(|| {
        let name = unsafe { codec::name_owned(&*name) };
        unsafe { header_mut(header) }.remove_any(&name);
    })
}

unsafe extern "C" fn header_image(header: HeaderRef, out: *mut RawArea) -> bool {
    unsafe { bridge::guard(out, || codec::area_encode(unsafe { header_of(header) }.image())) }
}

unsafe extern "C" fn header_parse(header: HeaderRef, image: *const RawArea) -> bool {
    bridge::guard_unit(|| {
        let bytes = unsafe { codec::view_bytes((*image).ptr, (*image).len) };
        let image = Area::from_bytes(bytes);
        if let Err(error) = unsafe { header_mut(header) }.parse(&image) {
            panic::panic_any(error);
        }
    })
}

unsafe extern "C" fn header_visit_each(
    header: HeaderRef,
    callback: VisitorFn,
    extra: *mut c_void,
) -> bool {
    bridge::guard_unit(|| {
        let mut visitor = VisitorTrampoline { callback, extra };
        unsafe { header_of(header) }.visit_each(&mut visitor);
    })
}

// ---- body ops ------------------------------------------------------------

unsafe extern "C" fn body_size(body: BodyRef, out: *mut RawBodySize) -> bool {
    unsafe {
        bridge::guard(out, || {
            if body.is_nil() {
                panic!("message has no body");
            }
            codec::body_size_encode(unsafe { body_of(body) }.size())
        })
    }
}

// ---- options ops ---------------------------------------------------------

unsafe extern "C" fn options_value(
    options: OptionsRef,
    name: *const RawName,
    out: *mut RawArea,
) -> bool {
    unsafe {
        bridge::guard(out, || {
            let name = unsafe { codec::name_owned(&*name) };
            codec::area_encode(unsafe { options_of(options) }.option(&name).unwrap_or_default())
        })
    }
}

unsafe extern "C" fn options_visit(
    options: OptionsRef,
    callback: VisitorFn,
    extra: *mut c_void,
) -> bool {
    bridge::guard_unit(|| {
        let mut visitor = VisitorTrampoline { callback, extra };
        unsafe { options_of(options) }.visit_each(&mut visitor);
    })
}

// ---- area ops ------------------------------------------------------------

unsafe extern "C" fn area_new() -> RawArea {
    codec::area_encode(Area::default())
}

unsafe extern "C" fn area_from_bytes(bytes: *const c_char, len: usize) -> RawArea {
    codec::area_encode(Area::from_bytes(unsafe { codec::view_bytes(bytes, len) }))
}

unsafe extern "C" fn area_free(raw: *mut RawArea) {
    unsafe { codec::area_release(raw) };
}

// ---- buf ops -------------------------------------------------------------

unsafe extern "C" fn buf_new(bytes: *const c_char, len: usize) -> RawBuf {
    codec::buf_from_vec(unsafe { codec::view_bytes(bytes, len) }.to_vec())
}

unsafe extern "C" fn buf_free(buf: RawBuf) {
    unsafe { drop(codec::buf_into_vec(buf)) };
}

// ---- panic ops -----------------------------------------------------------

unsafe extern "C" fn panic_pop(out: *mut RawPanic) -> bool {
    unsafe { bridge::pop_record(out) }
}

unsafe extern "C" fn panic_free(record: RawPanic) {
    unsafe { bridge::free_record(record) };
}
