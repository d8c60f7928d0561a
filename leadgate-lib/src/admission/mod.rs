pub mod auth;
pub mod client_id;
pub mod gatekeeper;
pub mod handlers;
pub mod rejection;
pub mod router;

pub use client_id::client_identity;
pub use gatekeeper::Gatekeeper;
pub use rejection::{Rejection, RespBody};
pub use router::{resolve, Endpoint, Resolution};
