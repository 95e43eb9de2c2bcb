//! Database records and their queries.
//!
//! Every query scoped to a user filters on `user_id` so callers cannot reach
//! rows they do not own.

pub mod contact;
pub mod note;
pub mod user;

pub use contact::{Contact, ContactUpdate, NewContact};
pub use note::{Note, NoteStatus};
pub use user::User;
