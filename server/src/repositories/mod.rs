//! Repositories module - data access for every table.
//!
//! All queries are written with the runtime `query`/`query_as` builders and
//! `.bind(..)`, so the crate builds without a live database. A repository
//! never opens its own connection: the caller passes either a pooled
//! connection (plain reads) or the one inside a
//! [`UnitOfWork`](crate::core::UnitOfWork).

pub mod group;
pub mod invitation;
pub mod item;
pub mod list;
pub mod membership;
pub mod traits;
pub mod user;

pub use traits::{Create, Delete, Read};

pub use group::GroupRepository;
pub use invitation::{InvitationRepository, NewInvitation};
pub use item::{ItemRepository, NewItem};
pub use list::ListRepository;
pub use membership::{MembershipRepository, NewMembership};
pub use user::{NewUser, UserRepository};
