//! Identifier names shared between the host and adaptation modules.

use std::cell::Cell;
use std::sync::atomic::{AtomicU32, Ordering};

/// Source of fresh registered ids. Registered names are expected to be a
/// small, global set created once at startup.
static LAST_ID: AtomicU32 = AtomicU32::new(2);

/// Identity classification of a [`Name`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum NameId {
    /// Created without an image; equal to nothing, including itself.
    Unknown,
    /// Created from an image but not registered for id-based comparison.
    Unidentified,
    /// Registered; compared by id alone.
    Id(u32),
}

/// A protocol token: textual image plus identity metadata.
///
/// Names compare by id when both sides are registered, by image otherwise.
/// The host may additionally attach its own scope id, which persists across
/// the adaptation boundary.
#[derive(Debug, Clone)]
pub struct Name {
    /// Textual image; absent for unknown names.
    image: Option<Vec<u8>>,
    /// Identity classification.
    id: NameId,
    /// Host-assigned scope id, set at most once.
    host_id: Cell<Option<u32>>,
}

impl Name {
    /// A name with no image. Compares equal to nothing.
    #[must_use]
    pub const fn unknown() -> Self {
        Self {
            image: None,
            id: NameId::Unknown,
            host_id: Cell::new(None),
        }
    }

    /// A name with the given image, compared by image.
    #[must_use]
    pub fn new_known(image: impl Into<Vec<u8>>) -> Self {
        let image = image.into();
        Self {
            image: if image.is_empty() { None } else { Some(image) },
            id: NameId::Unidentified,
            host_id: Cell::new(None),
        }
    }

    /// A name with the given image and a freshly registered id.
    #[must_use]
    pub fn new_identified(image: impl Into<Vec<u8>>) -> Self {
        Self {
            image: Some(image.into()),
            id: NameId::Id(LAST_ID.fetch_add(1, Ordering::Relaxed)),
            host_id: Cell::new(None),
        }
    }

    /// Reassembles a name from decoded parts.
    #[must_use]
    pub fn from_parts(image: impl Into<Vec<u8>>, id: NameId, host_id: Option<u32>) -> Self {
        let image = image.into();
        Self {
            image: if image.is_empty() { None } else { Some(image) },
            id,
            host_id: Cell::new(host_id),
        }
    }

    /// Identity classification.
    #[must_use]
    pub fn id(&self) -> NameId {
        self.id
    }

    /// Textual image, if the name has one.
    #[must_use]
    pub fn image(&self) -> Option<&[u8]> {
        self.image.as_deref()
    }

    /// Whether this name carries a registered id.
    #[must_use]
    pub fn identified(&self) -> bool {
        matches!(self.id, NameId::Id(_))
    }

    /// Whether this name was created with an image.
    #[must_use]
    pub fn known(&self) -> bool {
        !matches!(self.id, NameId::Unknown)
    }

    /// Host-assigned scope id, if any.
    #[must_use]
    pub fn host_id(&self) -> Option<u32> {
        self.host_id.get()
    }

    /// Attaches a host scope id. Host-only; must be called at most once.
    pub fn assign_host_id(&self, id: u32) {
        assert_eq!(self.host_id.replace(Some(id)), None);
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.known()
            && if self.identified() {
                self.id == other.id
            } else {
                self.image == other.image
            }
    }
}
