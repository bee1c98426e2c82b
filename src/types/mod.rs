//! Public types for the Hermod API.

mod api;
mod category;
mod message;

pub use api::{ChatReply, ChatRequest, ErrorBody};
pub use category::Category;
pub use message::{Message, Role};
