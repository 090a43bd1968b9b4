//! Business logic services
//!
//! The provisioning controller and the narrow collaborator interfaces it drives,
//! separated from HTTP concerns.

pub mod connectivity;
pub mod mode;
pub mod network;
pub mod provisioning;
