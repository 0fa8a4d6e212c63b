//! Vehicle rental workflow service: the booking state machine and its
//! vehicle, inspection, contract and invoice synchronisation, exposed as RPC
//! methods over HTTP.

mod models;
mod schema;

pub mod api;
pub mod availability;
pub mod booking;
pub mod contract;
pub mod error;
pub mod handlers;
pub mod inspection;
pub mod invoice;
pub mod store;
pub mod vehicle;
pub mod workflow;

pub use error::{StoreError, WorkflowError};
pub use handlers::{MethodCall, MethodHandler};
pub use store::{DocStore, EntityStore, MemoryStore, PgStore, WriteMode};
pub use workflow::{Outcome, RentalWorkflow, Settings};
