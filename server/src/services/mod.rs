//! Services module - domain operations
//!
//! Every operation here is callable without HTTP. Writes run inside one
//! [`UnitOfWork`](crate::core::UnitOfWork) and re-validate ownership or
//! membership on their own, whatever gate sits in front of them.

pub mod blob;
pub mod codes;
pub mod group;
pub mod invitation;
pub mod item;
pub mod ledger;
pub mod membership;
pub mod user;

pub use blob::{Bucket, LocalBlobStore, Upload};
pub use group::GroupService;
pub use invitation::InvitationService;
pub use item::ItemService;
pub use user::UserService;
