pub mod conversation;
pub mod group;
pub mod message;
pub mod room;
pub mod user;
