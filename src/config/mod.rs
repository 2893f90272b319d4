pub mod session;

pub use session::{SessionConfig, UserProfile};
