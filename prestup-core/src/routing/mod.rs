//! Connection search: the round-based engine and the finders built on it.

pub mod alternatives;
pub mod direction;
pub mod engine;
mod extract;
pub mod journey;
pub mod range;
pub mod state;

pub use alternatives::{AlternativeTrip, alternative_trips};
pub use engine::{EndpointPoints, SearchRequest, search_connection};
pub use journey::{Journey, Leg, LegPoint};
pub use range::search_connection_range;
