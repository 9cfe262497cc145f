//! Entity model: families, user profiles, memberships and their sync
//! metadata.

mod family;
mod membership;
mod record;
mod sync;
mod user_profile;

pub use family::Family;
pub use membership::{Membership, MembershipRole, MembershipStatus, MembershipView};
pub use record::Record;
pub use sync::{RemoteId, SyncMetadata, SyncStatus};
pub use user_profile::UserProfile;
