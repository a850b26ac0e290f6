//! DTOs module - Data Transfer Objects
//!
//! Shapes exchanged with clients, kept apart from the persisted entities.

pub mod group;
pub mod invitation;
pub mod item;
pub mod list;
pub mod user;
pub mod ws_event;

pub use group::{
    DisbandGroupDTO, GroupDTO, GroupMembersDTO, GroupSnippet, InviteHistoryDTO, LeaveGroupDTO,
    MemberDTO, UpdateGroupDTO,
};
pub use invitation::{
    AcceptedInvitationDTO, ExpiredInvitationsDTO, InvitationDTO, JoinRequestDTO, SendInviteDTO,
    SendRequestDTO, StartGroupDTO,
};
pub use item::{
    ClearedListDTO, CreateItemDTO, ItemDTO, ItemMutationDTO, PriceChange, PriceInput,
    UpdateItemDTO, UpdateItemStatusDTO,
};
pub use list::ListDTO;
pub use user::{
    DeletedUserDTO, ProvisionUserDTO, UpdateUserDTO, UserDTO, UserGroupDTO, UserSnippet,
};
pub use ws_event::WsFrame;
