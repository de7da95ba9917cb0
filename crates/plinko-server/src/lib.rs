//! plinko-server: Plinko PIR query server
//!
//! Serves plaintext, FullSet and SetParity queries over HTTP from a database
//! loaded out of `hint.bin`. An update service can share the same database
//! in process so queries always observe the latest writes.

pub mod error;
pub mod metrics;
pub mod routes;
pub mod state;

pub use error::ServerError;
pub use crate::metrics::init_prometheus_recorder;
pub use routes::{create_router, create_router_with_metrics};
pub use state::ServerContext;
