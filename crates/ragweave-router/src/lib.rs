//! ragweave-router — query intent classification and dispatch.

pub mod classification;
pub mod router;

pub use classification::{Intent, IntentClassifier, RouterContext, SessionControl, ToolDescriptor};
pub use router::{QueryRouter, RouteOutcome};
