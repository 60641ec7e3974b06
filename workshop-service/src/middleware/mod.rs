pub mod identity;
pub mod metrics;

pub use identity::{ACTOR_ID_HEADER, ACTOR_NAME_HEADER, ACTOR_ROLE_HEADER};
pub use metrics::metrics_middleware;
