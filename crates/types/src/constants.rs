/// Protocol-wide constants shared by the math and keeper crates

/// Lowest tick index usable as a position boundary
pub const MIN_TICK: i32 = -443_636;

/// Highest tick index usable as a position boundary
pub const MAX_TICK: i32 = 443_636;

/// Sqrt price at MIN_TICK in X64 fixed point
pub const MIN_SQRT_PRICE_X64: u128 = 4_295_048_016;

/// Sqrt price at MAX_TICK in X64 fixed point
pub const MAX_SQRT_PRICE_X64: u128 = 79_226_673_515_401_279_992_447_579_055;

/// 1.0 in X64 fixed point
pub const Q64: u128 = 1u128 << 64;

/// Basis points in 100%
pub const BPS_SCALE: u32 = 10_000;

/// Divergence-loss ceiling before a position is force-cycled (3%)
pub const DEFAULT_DIVERGENCE_LIMIT_BPS: u32 = 300;
