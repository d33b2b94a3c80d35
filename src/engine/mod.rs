//! Background work that runs beside the HTTP server.

mod recalc;

pub use recalc::*;
