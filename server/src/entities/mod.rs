//! Entities module - persisted domain records.
//!
//! Each entity corresponds to a table. Where storage needs a different shape
//! (decimal text, flat invitation rows) a `*Row` type is decoded into the entity.

pub mod enums;
pub mod group;
pub mod invitation;
pub mod item;
pub mod list;
pub mod membership;
pub mod user;

// Re-exports for shorter imports
pub use enums::{InvitationStatus, InvitationType, ItemStatus};
pub use group::Group;
pub use invitation::{Invitation, InvitationAction, InvitationKind, InvitationRow};
pub use item::{Item, ItemRow};
pub use list::{List, ListOwner, ListRow};
pub use membership::Membership;
pub use user::User;
