//! Shared, fixed-size buffer views.

#![allow(unsafe_code)]

use std::fmt;
use std::sync::Arc;

/// Reference-keeping backing of an [`Area`]; `None` for the empty view.
pub(crate) type Backing = Option<Arc<dyn AsRef<[u8]> + Send + Sync>>;

/// A contiguous byte view that can be copied without copying the bytes.
///
/// The view either owns nothing (the empty area) or keeps one strong
/// reference to a shared backing allocation. Cloning takes another
/// reference; dropping releases it. The backing is freed when the last
/// view goes away.
///
/// Areas are created at the boundary between the host and adaptation
/// modules; most code should hand them off rather than hold them.
pub struct Area {
    /// Start of the viewed range; null only for the empty area.
    ptr: *const u8,
    /// Length of the viewed range.
    len: usize,
    /// Strong reference keeping the bytes alive.
    backing: Backing,
}

impl Area {
    /// Creates an area by copying a byte slice into a fresh backing.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        if bytes.is_empty() {
            return Self::default();
        }
        Self::from_shared(Arc::new(bytes.to_vec()))
    }

    /// Creates an area over an existing shared allocation without copying.
    #[must_use]
    pub fn from_shared<B>(backing: Arc<B>) -> Self
    where
        B: AsRef<[u8]> + Send + Sync + 'static,
    {
        let bytes = (*backing).as_ref();
        let (ptr, len) = (bytes.as_ptr(), bytes.len());
        Self {
            ptr,
            len,
            backing: Some(backing),
        }
    }

    /// The viewed bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        if self.len == 0 {
            &[]
        } else {
            // The backing reference keeps the allocation alive and
            // immutable for as long as this view exists.
            unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
        }
    }

    /// Length of the view in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the view is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Splits the area into its raw parts, keeping the backing reference.
    pub(crate) fn into_raw_parts(self) -> (*const u8, usize, Backing) {
        (self.ptr, self.len, self.backing)
    }

    /// Reassembles an area from parts produced by [`Area::into_raw_parts`]
    /// or an equivalent boundary decode.
    ///
    /// # Safety
    ///
    /// `ptr..ptr+len` must stay valid and immutable for the lifetime of the
    /// returned area; when `backing` is `Some`, the range must lie inside
    /// that allocation.
    pub(crate) unsafe fn from_raw_parts(ptr: *const u8, len: usize, backing: Backing) -> Self {
        Self { ptr, len, backing }
    }
}

impl Default for Area {
    fn default() -> Self {
        Self {
            ptr: std::ptr::null(),
            len: 0,
            backing: None,
        }
    }
}

impl Clone for Area {
    fn clone(&self) -> Self {
        Self {
            ptr: self.ptr,
            len: self.len,
            backing: self.backing.clone(),
        }
    }
}

impl fmt::Debug for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Area")
            .field("len", &self.len)
            .field("shared", &self.backing.is_some())
            .finish()
    }
}
