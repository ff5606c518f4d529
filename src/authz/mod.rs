//! Role-based authorization with tenant domains.
//!
//! The flow:
//! 1. [`PolicyAdapter`] turns persisted grants and permission rules into
//!    [`PolicyFacts`]
//! 2. [`PolicySnapshot`] indexes those facts into an immutable lookup structure
//! 3. [`PolicyEnforcer`] serves decisions from the current snapshot and swaps
//!    in a new one on reload
//! 4. [`RouteMatcher`] derives `(resource, object)` from a forwarded path

mod adapter;
mod enforcer;
mod error;
mod facts;
mod matcher;
mod snapshot;

pub use adapter::{DbPolicyAdapter, PolicyAdapter};
pub use enforcer::{PolicyEnforcer, ReloadStats};
pub use error::AuthzError;
pub use facts::{GroupFact, PermissionFact, PolicyFacts};
pub use matcher::{RouteMatch, RouteMatchError, RouteMatcher};
pub use snapshot::{Decision, PolicySnapshot};

use crate::models::WILDCARD;

/// A fact field matches when it is the wildcard or equal to the request value.
pub(crate) fn field_matches(pattern: &str, value: &str) -> bool {
    pattern == WILDCARD || pattern == value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_matches() {
        assert!(field_matches("*", "anything"));
        assert!(field_matches("*", ""));
        assert!(field_matches("orders", "orders"));
        assert!(!field_matches("orders", "order"));
        // Only a lone `*` is a wildcard
        assert!(!field_matches("ord*", "orders"));
    }
}
