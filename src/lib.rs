//! Append-only event store and projection catch-up runtime for an
//! identity/authorization platform: command batches become events under
//! optimistic per-aggregate concurrency, events are globally ordered and
//! fanned out to in-process subscribers after commit, and projections catch
//! up from their own checkpoints.

pub mod bus;
pub mod config;
pub mod constraint;
mod error;
pub mod event;
pub mod filter;
pub mod projection;
pub mod reducer;
pub mod store;

pub use bus::{Subscription, SubscriptionFilter};
pub use config::{EventstoreConfig, ProjectionConfig};
pub use constraint::{UniqueConstraintClaim, UniqueConstraintScope};
pub use error::{Error, ErrorClass};
pub use event::{Aggregate, Command, Event, Position};
pub use filter::{Filter, SearchQuery};
pub use projection::{ProjectionHandler, ProjectionHealth, ProjectionRegistry};
pub use reducer::{ReadModelState, Reducer};
pub use store::{EventStore, EventStoreBuilder};
