pub mod routes;
pub mod state;

pub use routes::{build_router, AppState};
