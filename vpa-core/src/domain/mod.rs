//! Domain types for the VPA signal pipeline.

pub mod bar;
pub mod ids;

pub use bar::{Bar, BarError};
pub use ids::{ConfigHash, IdGen, SignalEventId};

/// Symbol type alias.
pub type Symbol = String;
