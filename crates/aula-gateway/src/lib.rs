//! HTTP gateway exposing lesson plan generation with bearer auth, CORS and a health endpoint.

mod error;
mod handlers;
mod router;
mod server;

pub use error::{ApiError, GatewayError, status_for};
pub use router::{RouterConfig, build_router};
pub use server::{AppState, GatewayServer};
