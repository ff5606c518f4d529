mod grants;
mod roles;
mod rules;
mod subjects;
mod tenants;

pub use grants::GrantRepo;
pub use roles::RoleRepo;
pub use rules::RuleRepo;
pub use subjects::SubjectRepo;
pub use tenants::TenantRepo;
