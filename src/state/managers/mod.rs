//! Domain managers for hub state.
//!
//! Each manager owns one slice of state behind accessor methods. The hub
//! composes them; nothing outside `state` touches their internals.

pub mod lifecycle;
pub mod presence;
pub mod room;
pub mod user;

pub use lifecycle::LifecycleManager;
pub use presence::{PresenceManager, Transition};
pub use room::{JoinError, RoomManager};
pub use user::UserManager;
