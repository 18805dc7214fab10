//! Estthmar HTTP server: router and shared state.
//!
//! The binary in `main.rs` wires real collaborators into [`AppState`]; tests
//! build the same router around fakes.

pub mod routes;
pub mod state;

pub use routes::build_router;
pub use state::AppState;
