/// Tick-price math for the LP cycler
///
/// Pure functions converting between tick indices and X64 fixed-point sqrt
/// prices, range derivation from a percentage width, and the divergence-loss
/// estimate. No state, no I/O.

pub mod divergence;
pub mod tick;

pub use divergence::*;
pub use tick::*;
