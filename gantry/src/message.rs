//! Host message model: messages, headers, bodies, first lines.

use std::fmt;
use std::sync::Arc;

use crate::area::Area;
use crate::error::Result;
use crate::name::Name;
use crate::options::NamedValueVisitor;

/// Protocol version triple; components may individually be unknown.
#[derive(Debug, Clone, Copy, Eq)]
pub struct Version {
    /// Major component.
    pub major: Option<u32>,
    /// Minor component.
    pub minor: Option<u32>,
    /// Micro component.
    pub micro: Option<u32>,
}

impl Version {
    /// Whether the version carries any information at all.
    #[must_use]
    pub const fn known(&self) -> bool {
        self.major.is_some()
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.known()
            && self.major == other.major
            && self.minor == other.minor
            && self.micro == other.micro
    }
}

/// Message body buffer, shared by producer and consumer.
pub trait Body {
    /// Size in bytes, or `None` when not yet known.
    fn size(&self) -> Option<u64>;
}

/// The first line of a request or response.
pub trait FirstLine {
    /// Protocol version.
    fn version(&self) -> Version;
    /// Replaces the protocol version.
    fn set_version(&mut self, version: Version);
    /// Protocol name.
    fn protocol(&self) -> &Name;
    /// Replaces the protocol name.
    fn set_protocol(&mut self, protocol: Name);
}

/// A header (or trailer): an ordered multimap of [`Name`] to [`Area`].
pub trait Header {
    /// Whether at least one field with this name exists.
    fn has_any(&self, name: &Name) -> bool;

    /// Value of the named field(s). Multiple fields with the same name
    /// yield one `", "`-joined value.
    fn value(&self, name: &Name) -> Option<Area>;

    /// Appends a field.
    fn add(&mut self, name: Name, value: Area);

    /// Removes every field with this name.
    fn remove_any(&mut self, name: &Name);

    /// Visits every field in order.
    fn visit_each(&self, visitor: &mut dyn NamedValueVisitor);

    /// Serialized image of the header.
    fn image(&self) -> Area;

    /// Replaces the header contents by parsing a serialized image.
    fn parse(&mut self, image: &Area) -> Result<()>;
}

/// An in-flight request or response owned by the host.
pub trait Message {
    /// Deep-copies the message into a fresh shared handle.
    fn clone_message(&self) -> SharedMessage;

    /// The request or status line.
    fn first_line(&self) -> &dyn FirstLine;
    /// The request or status line, mutable.
    fn first_line_mut(&mut self) -> &mut dyn FirstLine;

    /// The header.
    fn header(&self) -> &dyn Header;
    /// The header, mutable.
    fn header_mut(&mut self) -> &mut dyn Header;

    /// Attaches an empty body.
    fn add_body(&mut self);
    /// The body, if present.
    fn body(&self) -> Option<&dyn Body>;
    /// The body, if present, mutable.
    fn body_mut(&mut self) -> Option<&mut dyn Body>;

    /// Attaches an empty trailer.
    fn add_trailer(&mut self);
    /// The trailer, if present.
    fn trailer(&self) -> Option<&dyn Header>;
    /// The trailer, if present, mutable.
    fn trailer_mut(&mut self) -> Option<&mut dyn Header>;
}

/// Reference-counted handle to a host message.
///
/// Cloning the handle increments the count; the message is destroyed when
/// the last handle is released. Crossing the boundary, the handle travels
/// as an opaque inline block carrying exactly one reference.
pub struct SharedMessage {
    /// The counted message.
    inner: Arc<dyn Message>,
}

impl SharedMessage {
    /// Wraps a message into a fresh handle.
    pub fn new<M: Message + 'static>(message: M) -> Self {
        Self {
            inner: Arc::new(message),
        }
    }

    /// Borrows the message.
    #[must_use]
    pub fn get(&self) -> &dyn Message {
        &*self.inner
    }

    /// Mutably borrows the message, when this is the only live handle.
    pub fn get_mut(&mut self) -> Option<&mut (dyn Message + 'static)> {
        Arc::get_mut(&mut self.inner)
    }

    /// Number of live handles to this message.
    #[must_use]
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Unwraps the counted pointer for boundary encoding.
    pub(crate) fn into_arc(self) -> Arc<dyn Message> {
        self.inner
    }

    /// Rewraps a counted pointer produced by [`SharedMessage::into_arc`].
    pub(crate) fn from_arc(inner: Arc<dyn Message>) -> Self {
        Self { inner }
    }
}

impl Clone for SharedMessage {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl fmt::Debug for SharedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedMessage")
            .field("handles", &self.handle_count())
            .finish()
    }
}
