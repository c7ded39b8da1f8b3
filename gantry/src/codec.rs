//! Conversions between host values and their boundary encodings.
//!
//! Encoding is the only place where host-private layouts (counted backing
//! pointers, trait-object pointers) are punned into the opaque byte blocks
//! of the boundary contract, and the layout contracts are checked at
//! compile time. Foreign code never interprets the blocks; it moves them
//! bitwise and hands them back through release entries.

#![allow(unsafe_code)]

use std::mem::{self, ManuallyDrop};
use std::ptr;
use std::slice;
use std::sync::Arc;

use gantry_abi::{
    BodyRef, DETAILS_SIZE, HOST_ID_NONE, HeaderRef, LineRef, MessageRef, NAME_ID_UNIDENTIFIED,
    NAME_ID_UNKNOWN, OBJ_REF_SIZE, OptionsRef, RawArea, RawBodySize, RawBuf, RawDetails, RawName,
    RawSharedMessage, RawStr, RawVersion, SinkRef, XactionRef,
};
use libc::{c_char, c_int};

use crate::area::{Area, Backing};
use crate::host::Transaction;
use crate::log::DebugSink;
use crate::message::{Body, FirstLine, Header, Message, SharedMessage, Version};
use crate::name::{Name, NameId};
use crate::options::Options;

// The opaque blocks of the boundary contract are sized for 64-bit
// platforms; these fail loudly anywhere the punned layouts do not fit.
const _: () = assert!(mem::size_of::<Backing>() == DETAILS_SIZE);
const _: () = assert!(mem::align_of::<Backing>() <= 8);
const _: () = assert!(mem::size_of::<Arc<dyn Message>>() == 16);
const _: () = assert!(mem::size_of::<*mut dyn Message>() == OBJ_REF_SIZE);

/// Borrows `len` bytes starting at `ptr`; empty for null input.
///
/// # Safety
///
/// Unless null, `ptr..ptr+len` must be readable for the caller-chosen
/// lifetime of the slice.
pub(crate) unsafe fn view_bytes<'a>(ptr: *const c_char, len: usize) -> &'a [u8] {
    if ptr.is_null() || len == 0 {
        &[]
    } else {
        unsafe { slice::from_raw_parts(ptr.cast::<u8>(), len) }
    }
}

// ---- transfer buffers ----------------------------------------------------

/// Moves a vector into an owned transfer buffer.
pub(crate) fn buf_from_vec(bytes: Vec<u8>) -> RawBuf {
    let mut bytes = ManuallyDrop::new(bytes);
    RawBuf {
        len: bytes.len(),
        ptr: bytes.as_mut_ptr().cast::<c_char>(),
        cap: bytes.capacity(),
    }
}

/// Adopts a transfer buffer back into a vector.
///
/// # Safety
///
/// The buffer must come from [`buf_from_vec`] (or the host's `buf.new`
/// entry) and must not be adopted or freed again.
pub(crate) unsafe fn buf_into_vec(buf: RawBuf) -> Vec<u8> {
    if buf.ptr.is_null() {
        return Vec::new();
    }
    unsafe { Vec::from_raw_parts(buf.ptr.cast::<u8>(), buf.len, buf.cap) }
}

/// [`buf_into_vec`] plus lossy UTF-8 conversion.
///
/// # Safety
///
/// Same contract as [`buf_into_vec`].
pub(crate) unsafe fn buf_into_string(buf: RawBuf) -> String {
    match String::from_utf8(unsafe { buf_into_vec(buf) }) {
        Ok(text) => text,
        Err(error) => String::from_utf8_lossy(error.as_bytes()).into_owned(),
    }
}

// ---- names ---------------------------------------------------------------

/// Encodes a name as a non-owning view. The view must not outlive `name`.
pub(crate) fn name_view(name: &Name) -> RawName {
    let image = name.image().unwrap_or(&[]);
    #[allow(clippy::cast_possible_wrap)]
    RawName {
        image: RawStr {
            len: image.len(),
            ptr: if image.is_empty() {
                ptr::null()
            } else {
                image.as_ptr().cast::<c_char>()
            },
        },
        id: match name.id() {
            NameId::Unknown => NAME_ID_UNKNOWN,
            NameId::Unidentified => NAME_ID_UNIDENTIFIED,
            NameId::Id(id) => id as c_int,
        },
        host_id: name.host_id().map_or(HOST_ID_NONE, |id| id as c_int),
    }
}

/// Decodes a name view into an owned name, copying the image.
///
/// # Safety
///
/// The view's image pointer must be readable for its stated length.
pub(crate) unsafe fn name_owned(raw: &RawName) -> Name {
    let image = unsafe { view_bytes(raw.image.ptr, raw.image.len) };
    #[allow(clippy::cast_sign_loss)]
    let id = match raw.id {
        NAME_ID_UNKNOWN => NameId::Unknown,
        NAME_ID_UNIDENTIFIED => NameId::Unidentified,
        other => NameId::Id(other as u32),
    };
    #[allow(clippy::cast_sign_loss)]
    let host_id = (raw.host_id != HOST_ID_NONE).then(|| raw.host_id as u32);
    Name::from_parts(image, id, host_id)
}

// ---- areas ---------------------------------------------------------------

/// Encodes an area, transferring its backing reference into the opaque tag.
pub(crate) fn area_encode(area: Area) -> RawArea {
    let (ptr, len, backing) = area.into_raw_parts();
    let mut details = RawDetails {
        bytes: [0; DETAILS_SIZE],
    };
    unsafe { ptr::write(details.bytes.as_mut_ptr().cast::<Backing>(), backing) };
    RawArea {
        len,
        ptr: ptr.cast::<c_char>(),
        details,
    }
}

/// Decodes an area, consuming the opaque tag and taking over its backing
/// reference.
///
/// # Safety
///
/// The area must come from [`area_encode`] and must not be decoded or
/// freed again.
pub(crate) unsafe fn area_decode(raw: RawArea) -> Area {
    let backing = unsafe { ptr::read(raw.details.bytes.as_ptr().cast::<Backing>()) };
    unsafe { Area::from_raw_parts(raw.ptr.cast::<u8>(), raw.len, backing) }
}

/// Releases an encoded area in place without decoding it, resetting the
/// tag so the block holds no reference afterwards.
///
/// # Safety
///
/// The area must come from [`area_encode`] and must not have been decoded.
pub(crate) unsafe fn area_release(raw: *mut RawArea) {
    unsafe {
        let tag = (*raw).details.bytes.as_mut_ptr().cast::<Backing>();
        drop(ptr::read(tag));
        ptr::write(tag, None);
    }
}

// ---- shared message handles ----------------------------------------------

/// Encodes a shared handle, moving its one reference into the block.
pub(crate) fn shared_encode(message: SharedMessage) -> RawSharedMessage {
    let mut raw = RawSharedMessage { bytes: [0; 16] };
    unsafe {
        ptr::write(
            raw.bytes.as_mut_ptr().cast::<Arc<dyn Message>>(),
            message.into_arc(),
        );
    }
    raw
}

/// Decodes a shared handle, taking over the block's reference.
///
/// # Safety
///
/// The block must come from [`shared_encode`] and must not be decoded or
/// released again.
pub(crate) unsafe fn shared_decode(raw: RawSharedMessage) -> SharedMessage {
    SharedMessage::from_arc(unsafe { ptr::read(raw.bytes.as_ptr().cast::<Arc<dyn Message>>()) })
}

/// Duplicates the handle behind an encoded block without consuming it.
///
/// # Safety
///
/// `raw` must point to a live encoded block.
pub(crate) unsafe fn shared_clone(raw: *const RawSharedMessage) -> SharedMessage {
    let held = unsafe {
        ManuallyDrop::new(ptr::read((*raw).bytes.as_ptr().cast::<Arc<dyn Message>>()))
    };
    SharedMessage::from_arc(Arc::clone(&held))
}

/// Borrows the message behind an encoded block.
///
/// # Safety
///
/// `raw` must point to a live encoded block; the pointer is valid while
/// that block stays alive.
pub(crate) unsafe fn shared_get(raw: *const RawSharedMessage) -> *mut dyn Message {
    let held = unsafe {
        ManuallyDrop::new(ptr::read((*raw).bytes.as_ptr().cast::<Arc<dyn Message>>()))
    };
    Arc::as_ptr(&held).cast_mut()
}

// ---- opaque object references --------------------------------------------

/// Puns a (fat) object pointer into an opaque reference block.
fn ref_bits<T: ?Sized>(object: *mut T) -> [u8; OBJ_REF_SIZE] {
    const {
        assert!(mem::size_of::<*mut T>() == OBJ_REF_SIZE);
    }
    unsafe { mem::transmute_copy::<*mut T, [u8; OBJ_REF_SIZE]>(&object) }
}

/// Reads an object pointer back out of a reference block.
///
/// # Safety
///
/// The bits must come from [`ref_bits`] with the same `T`.
unsafe fn ref_object<T: ?Sized>(bits: [u8; OBJ_REF_SIZE]) -> *mut T {
    unsafe { mem::transmute_copy::<[u8; OBJ_REF_SIZE], *mut T>(&bits) }
}

/// Encodes a host-transaction back-reference.
pub(crate) fn xaction_ref(transaction: *mut dyn Transaction) -> XactionRef {
    XactionRef {
        bytes: ref_bits(transaction),
    }
}

/// Decodes a host-transaction back-reference.
///
/// # Safety
///
/// The reference must come from [`xaction_ref`] and the transaction must
/// still be alive.
pub(crate) unsafe fn xaction_from(raw: XactionRef) -> *mut dyn Transaction {
    unsafe { ref_object(raw.bytes) }
}

/// Encodes a message reference.
pub(crate) fn message_ref(message: *mut dyn Message) -> MessageRef {
    MessageRef {
        bytes: ref_bits(message),
    }
}

/// Decodes a message reference.
///
/// # Safety
///
/// The reference must come from [`message_ref`] and must not be nil.
pub(crate) unsafe fn message_from(raw: MessageRef) -> *mut dyn Message {
    unsafe { ref_object(raw.bytes) }
}

/// Encodes a header reference.
pub(crate) fn header_ref(header: *mut dyn Header) -> HeaderRef {
    HeaderRef {
        bytes: ref_bits(header),
    }
}

/// Decodes a header reference.
///
/// # Safety
///
/// The reference must come from [`header_ref`] and must not be nil.
pub(crate) unsafe fn header_from(raw: HeaderRef) -> *mut dyn Header {
    unsafe { ref_object(raw.bytes) }
}

/// Encodes a body reference.
pub(crate) fn body_ref(body: *mut dyn Body) -> BodyRef {
    BodyRef {
        bytes: ref_bits(body),
    }
}

/// Decodes a body reference.
///
/// # Safety
///
/// The reference must come from [`body_ref`] and must not be nil.
pub(crate) unsafe fn body_from(raw: BodyRef) -> *mut dyn Body {
    unsafe { ref_object(raw.bytes) }
}

/// Encodes a first-line reference.
pub(crate) fn line_ref(line: *mut dyn FirstLine) -> LineRef {
    LineRef {
        bytes: ref_bits(line),
    }
}

/// Decodes a first-line reference.
///
/// # Safety
///
/// The reference must come from [`line_ref`] and must not be nil.
pub(crate) unsafe fn line_from(raw: LineRef) -> *mut dyn FirstLine {
    unsafe { ref_object(raw.bytes) }
}

/// Encodes an option-set reference.
pub(crate) fn options_ref(options: &dyn Options) -> OptionsRef {
    OptionsRef {
        bytes: ref_bits(ptr::from_ref(options).cast_mut()),
    }
}

/// Decodes an option-set reference.
///
/// # Safety
///
/// The reference must come from [`options_ref`] and the option set must
/// still be alive.
pub(crate) unsafe fn options_from(raw: OptionsRef) -> *const dyn Options {
    unsafe { ref_object::<dyn Options>(raw.bytes).cast_const() }
}

/// Encodes an owned debug sink, transferring it into the block.
pub(crate) fn sink_into_raw(sink: Box<dyn DebugSink>) -> SinkRef {
    SinkRef {
        bytes: ref_bits(Box::into_raw(sink)),
    }
}

/// Encodes a borrowed debug sink. The block must not outlive the borrow.
pub(crate) fn sink_borrow(sink: &mut dyn DebugSink) -> SinkRef {
    SinkRef {
        bytes: ref_bits(ptr::from_mut(sink)),
    }
}

/// Borrows the sink behind a reference block.
///
/// # Safety
///
/// The block must hold a live sink and must not be nil.
pub(crate) unsafe fn sink_from(raw: SinkRef) -> *mut dyn DebugSink {
    unsafe { ref_object(raw.bytes) }
}

/// Takes back ownership of a sink encoded with [`sink_into_raw`].
///
/// # Safety
///
/// The block must come from [`sink_into_raw`] and must not be used again.
pub(crate) unsafe fn sink_into_box(raw: SinkRef) -> Box<dyn DebugSink> {
    unsafe { Box::from_raw(ref_object(raw.bytes)) }
}

// ---- small scalars -------------------------------------------------------

/// Encodes a version triple; absent components become `-1`.
pub(crate) fn version_encode(version: Version) -> RawVersion {
    #[allow(clippy::cast_possible_wrap)]
    RawVersion {
        major: version.major.map_or(-1, |v| v as c_int),
        minor: version.minor.map_or(-1, |v| v as c_int),
        micro: version.micro.map_or(-1, |v| v as c_int),
    }
}

/// Decodes a version triple.
pub(crate) fn version_decode(raw: &RawVersion) -> Version {
    #[allow(clippy::cast_sign_loss)]
    let component = |value: c_int| (value >= 0).then(|| value as u32);
    Version {
        major: component(raw.major),
        minor: component(raw.minor),
        micro: component(raw.micro),
    }
}

/// Encodes a body-size query result.
pub(crate) fn body_size_encode(size: Option<u64>) -> RawBodySize {
    match size {
        Some(value) => RawBodySize { known: true, value },
        None => RawBodySize {
            known: false,
            value: 0,
        },
    }
}
