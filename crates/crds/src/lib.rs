//! Game-server CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for the game-server operator.

pub mod labels;
pub mod teamspeak;

pub use labels::*;
pub use teamspeak::*;
