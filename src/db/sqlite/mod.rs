mod common;
mod grants;
mod roles;
mod rules;
mod subjects;
mod tenants;

pub use grants::SqliteGrantRepo;
pub use roles::SqliteRoleRepo;
pub use rules::SqliteRuleRepo;
pub use subjects::SqliteSubjectRepo;
pub use tenants::SqliteTenantRepo;
