#![deny(unsafe_code)]

//! Issue-tracker collaborator: a Linear GraphQL client implementing the
//! core's [`intake_core::TicketTracker`] seam.

pub mod error;
pub mod linear;

pub use error::{TrackerError, TrackerResult};
pub use linear::{DEFAULT_LINEAR_ENDPOINT, LinearClient, LinearConfig};
