//! Credential-gated gateway to the portal's managed services.
//!
//! One [`ServiceGateway`] fronts five facades (object storage, conversational
//! agent, metrics, queue, translation). Every facade returns a
//! [`portal_core::ServiceResult`]; none panic for expected failures.

pub mod backend;
pub mod cache;
pub mod credentials;
pub mod gateway;
pub mod memory;
pub mod mock;
pub mod region;
pub mod types;

pub use backend::{AgentBackend, ObjectStoreBackend, QueueBackend, ServiceBackends, TranslateBackend};
pub use cache::{CacheKey, CacheStats, ResponseCache};
pub use credentials::Credentials;
pub use gateway::ServiceGateway;
pub use region::RegionResolver;
pub use types::*;
