//! Custom Resource Definitions for the disaster-recovery daemon
//!
//! The daemon can track any resource through configured field paths; the
//! `DisasterRecovery` CRD is the layout used when default paths are enabled.

mod disaster_recovery;
pub mod types;


pub use disaster_recovery::*;
pub use types::*;
