mod auth;
mod config;
mod list;
mod purge;

pub use auth::*;
pub use config::*;
pub use list::*;
pub use purge::*;
