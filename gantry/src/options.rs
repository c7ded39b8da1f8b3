//! Named-value access across the boundary.

use crate::area::Area;
use crate::name::Name;

/// Read-only access to `(Name, Area)` pairs: configuration on services,
/// meta-information on transactions.
///
/// Option sets and individual values are temporary; they must not be used
/// beyond the call that supplied them.
pub trait Options {
    /// Value of the named option, if present.
    fn option(&self, name: &Name) -> Option<Area>;

    /// Visits every option, including ones whose name is unknown.
    fn visit_each(&self, visitor: &mut dyn NamedValueVisitor);
}

/// Callback receiver for [`Options::visit_each`] and header visits.
pub trait NamedValueVisitor {
    /// Called once per named value, in order.
    fn visit(&mut self, name: &Name, value: &Area);
}
