mod grant;
mod role;
mod rule;
mod subject;
mod tenant;

pub use grant::*;
pub use role::*;
pub use rule::*;
pub use subject::*;
pub use tenant::*;

/// Tenant name that matches every tenant.
pub const WILDCARD: &str = "*";
