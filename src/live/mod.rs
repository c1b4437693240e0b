//! Live conversation transport (WebSocket-based).

pub mod events;
pub mod session;
pub mod state;

pub use events::LiveEvent;
pub use session::LiveSession;
pub use state::{Lifecycle, Phase};
