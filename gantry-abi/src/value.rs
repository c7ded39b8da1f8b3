//! Boundary-safe value encodings.

// Ownership-carrying blocks must not be Copy: a bitwise duplicate made in
// safe code would double a reference or a free.
#![allow(missing_copy_implementations)]

use core::fmt;

use libc::{c_char, c_int, c_void};

/// Opaque per-service state owned by the foreign module.
///
/// The host never dereferences this; it is created by the foreign module
/// before registration and released through [`super::ServiceTable::free`].
pub type ServiceHandle = *mut c_void;

/// Opaque per-transaction state owned by the foreign module.
pub type XactionHandle = *mut c_void;

/// Non-owning byte view. Valid only for the duration of the call that
/// produced it.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawStr {
    /// Length in bytes.
    pub len: usize,
    /// Start of the viewed bytes; may be null when `len` is zero.
    pub ptr: *const c_char,
}

/// Owned transfer buffer.
///
/// Always backed by the host allocator: the foreign side obtains one only
/// through [`super::BufOps::new`] and releases it only through
/// [`super::BufOps::free`]; the host adopts it directly. Exactly one release
/// per buffer.
#[repr(C)]
#[derive(Debug)]
pub struct RawBuf {
    /// Length in bytes.
    pub len: usize,
    /// Start of the owned allocation; null only for the empty buffer.
    pub ptr: *mut c_char,
    /// Allocation capacity in bytes.
    pub cap: usize,
}

/// Wire value of [`RawName::id`] for a name created without an image.
pub const NAME_ID_UNKNOWN: c_int = 0;
/// Wire value of [`RawName::id`] for a named but unregistered identifier.
pub const NAME_ID_UNIDENTIFIED: c_int = 1;
/// Wire value of [`RawName::host_id`] when the host has assigned none.
pub const HOST_ID_NONE: c_int = c_int::MIN;

/// Identifier crossing the boundary as a non-owning view.
///
/// The image points into caller-owned memory; receivers that keep the name
/// must copy it into an owned identifier before returning.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawName {
    /// Textual image view.
    pub image: RawStr,
    /// [`NAME_ID_UNKNOWN`], [`NAME_ID_UNIDENTIFIED`], or a registered id.
    pub id: c_int,
    /// Host-scope id, or [`HOST_ID_NONE`].
    pub host_id: c_int,
}

/// Size in bytes of the opaque ownership tag carried by [`RawArea`].
pub const DETAILS_SIZE: usize = 16;

/// Opaque ownership tag of a buffer view.
///
/// Holds the host's backing reference (or nothing, for borrowed views).
/// Never interpreted bitwise by callers; released exactly once through
/// decode or [`super::AreaOps::free`].
#[repr(C, align(8))]
pub struct RawDetails {
    /// Host-private tag bytes.
    pub bytes: [u8; DETAILS_SIZE],
}

impl fmt::Debug for RawDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RawDetails(opaque)")
    }
}

/// Buffer view plus ownership tag.
///
/// Crossing the boundary transfers ownership: the producer relinquishes the
/// backing, the consumer must release it exactly once.
#[repr(C)]
pub struct RawArea {
    /// Length in bytes of the viewed range.
    pub len: usize,
    /// Start of the viewed range.
    pub ptr: *const c_char,
    /// Ownership tag, host-private.
    pub details: RawDetails,
}

impl fmt::Debug for RawArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawArea")
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

/// Inline block holding one strong reference to a host message.
///
/// Carries exactly one reference: every encode must be matched by one
/// decode or one [`super::SharedOps::free`]. Handle duplication is the
/// explicit clone operation, not a bitwise copy by the caller.
#[repr(C, align(8))]
pub struct RawSharedMessage {
    /// Host-private control-block bytes.
    pub bytes: [u8; 16],
}

impl fmt::Debug for RawSharedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RawSharedMessage(opaque)")
    }
}

/// Size in bytes of the opaque object-reference blocks below.
pub const OBJ_REF_SIZE: usize = 16;

macro_rules! opaque_ref {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        ///
        /// Opaque host object reference. Foreign code passes it back verbatim
        /// and never inspects the bytes. An all-zero block is the nil
        /// reference.
        #[repr(C, align(8))]
        #[derive(Clone, Copy)]
        pub struct $name {
            /// Host-private reference bytes.
            pub bytes: [u8; OBJ_REF_SIZE],
        }

        impl $name {
            /// The nil reference.
            #[must_use]
            pub const fn nil() -> Self {
                Self { bytes: [0; OBJ_REF_SIZE] }
            }

            /// Whether this is the nil reference.
            #[must_use]
            pub fn is_nil(&self) -> bool {
                self.bytes == [0; OBJ_REF_SIZE]
            }
        }

        impl ::core::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("nil", &self.is_nil())
                    .finish()
            }
        }
    };
}

opaque_ref!(
    /// Reference to a host message.
    MessageRef
);
opaque_ref!(
    /// Reference to a host header or trailer.
    HeaderRef
);
opaque_ref!(
    /// Reference to a host message body.
    BodyRef
);
opaque_ref!(
    /// Reference to a host message first-line.
    LineRef
);
opaque_ref!(
    /// Reference to a host debug sink.
    SinkRef
);
opaque_ref!(
    /// Back-reference to the host transaction driving an adaptation.
    XactionRef
);
opaque_ref!(
    /// Reference to a host configuration option set.
    OptionsRef
);

/// Version triple; `-1` components are unknown.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawVersion {
    /// Major component or `-1`.
    pub major: c_int,
    /// Minor component or `-1`.
    pub minor: c_int,
    /// Micro component or `-1`.
    pub micro: c_int,
}

/// Body-size query result.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawBodySize {
    /// Whether the size is known.
    pub known: bool,
    /// Size in bytes; meaningful only when `known`.
    pub value: u64,
}

/// Source location of a failure; `file.ptr` null means no location.
#[repr(C)]
#[derive(Debug)]
pub struct RawLocation {
    /// Source file path.
    pub file: RawBuf,
    /// 1-based line.
    pub line: c_int,
    /// 1-based column.
    pub column: c_int,
}

/// Out-of-band failure record produced by a failing boundary call.
///
/// Produced exactly once per failure, retrieved exactly once through the
/// producing side's [`super::PanicOps::pop`].
#[repr(C)]
#[derive(Debug)]
pub struct RawPanic {
    /// True when the failure originated as a host-side exception; the host
    /// then holds the caught object and re-raises it when the failure
    /// unwinds back to host code.
    pub host_origin: bool,
    /// Human-readable failure message.
    pub message: RawBuf,
    /// Failure origin, when captured.
    pub location: RawLocation,
}

/// Callback invoked once per named value during header and option visits.
///
/// Arguments: name view, value bytes, value length, caller context.
/// All views are valid only for the duration of the callback.
pub type VisitorFn =
    unsafe extern "C" fn(*const RawName, *const c_char, usize, *mut c_void);
