pub mod consume;
pub mod issue;
pub mod provider;

use uuid::Uuid;

/// Authenticated caller of the management API, resolved by the owner-key
/// middleware (or supplied directly by the CLI).
#[derive(Debug, Clone)]
pub struct OwnerIdentity {
    pub id: Uuid,
    pub tier: String,
}
