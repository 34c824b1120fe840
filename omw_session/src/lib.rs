pub mod error;
pub mod geolocation;
pub mod notify;
pub mod profile_store;
pub mod route_resolver;
pub mod session;
mod tracker;

pub use error::*;
pub use tracker::*;
