//! Raw C-ABI contract for the gantry adaptation boundary.
//!
//! The boundary between the host pipeline and a foreign adaptation module is
//! a pair of flat function-pointer tables exchanged at registration time:
//! the foreign module hands the host a [`ForeignTable`], the host hands the
//! foreign module a [`HostTable`]. Every logic-bearing entry follows one
//! calling convention: `(args…, out) -> bool`, where `false` means the call
//! failed and exactly one panic record is pending on the failing side's
//! panic channel.
//!
//! This crate defines layout only. All opaque byte blocks ([`RawDetails`],
//! [`RawSharedMessage`], the `*Ref` types) are written and interpreted by
//! the host side exclusively; foreign code moves them around bitwise and
//! returns them through the matching release entry.

// Contract types are constructed field-by-field on both sides of the
// boundary; their layouts are frozen, not extensible.
#![allow(clippy::exhaustive_structs)]

mod table;
mod value;

pub use table::{
    AreaOps, BodyOps, BufOps, ForeignTable, HeaderOps, HostOps, HostTable, HostXactionOps,
    LineOps, MessageOps, OptionsOps, PanicOps, ServiceTable, SharedOps, XactionTable,
};
pub use value::{
    BodyRef, HeaderRef, LineRef, MessageRef, OptionsRef, RawArea, RawBodySize, RawBuf, RawDetails,
    RawLocation, RawName, RawPanic, RawSharedMessage, RawStr, RawVersion, ServiceHandle, SinkRef,
    VisitorFn, XactionHandle, XactionRef, DETAILS_SIZE, HOST_ID_NONE, NAME_ID_UNIDENTIFIED,
    NAME_ID_UNKNOWN, OBJ_REF_SIZE,
};
