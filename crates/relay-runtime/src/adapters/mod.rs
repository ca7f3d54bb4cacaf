//! # Adapters
//!
//! Concrete implementations of the routing and transport ports:
//!
//! - `handlers`: log-event and save-event handlers
//! - `filters`: subscriber role filter
//! - `authorizer`: peer identity allow-list
//! - `observer`: keeps the subscription registry in step with sessions

pub mod authorizer;
pub mod filters;
pub mod handlers;
pub mod observer;

pub use authorizer::IdentityAllowList;
pub use filters::RoleFilter;
pub use handlers::{sanitise_filename, EventWriter, LogEventHandler};
pub use observer::RegistrationObserver;
