/// Tick index to sqrt price conversion and range derivation.
///
/// Implements the exchange's binary-decomposition formula: the tick's set
/// bits select precomputed per-bit factors which are multiplied together in
/// 256-bit fixed point. The composed transaction encodes the result as an
/// on-chain price bound, so the output must match the exchange's own
/// formula bit for bit on both branches.

use ethnum::U256;

use cycler_types::{MAX_TICK, MIN_TICK};

// ============================================================================
// Per-bit factor tables
// ============================================================================

/// sqrt(1.0001^(2^i)) in X96 fixed point, for non-negative ticks.
/// Index 0 seeds odd ticks; even ticks start from 2^96.
const POSITIVE_TICK_FACTORS: [u128; 19] = [
    79232123823359799118286999567,
    79236085330515764027303304731,
    79244008939048815603706035061,
    79259858533276714757314932305,
    79291567232598584799939703904,
    79355022692464371645785046466,
    79482085999252804386437311141,
    79736823300114093921829183326,
    80248749790819932309965073892,
    81282483887344747381513967011,
    83390072131320151908154831281,
    87770609709833776024991924138,
    97234110755111693312479820773,
    119332217159966728226237229890,
    179736315981702064433883588727,
    407748233172238350107850275304,
    2098478828474011932436660412517,
    55581415166113811149459800483533,
    38992368544603139932233054999993551,
];

/// sqrt(1.0001^-(2^i)) in X64 fixed point, the mirrored table for negative
/// ticks. Index 0 seeds odd magnitudes; even magnitudes start from 2^64.
const NEGATIVE_TICK_FACTORS: [u128; 19] = [
    18445821805675392311,
    18444899583751176498,
    18443055278223354162,
    18439367220385604838,
    18431993317065449817,
    18417254355718160513,
    18387811781193591352,
    18329067761203520168,
    18212142134806087854,
    17980523815641551639,
    17526086738831147013,
    16651378430235024244,
    15030750278693429944,
    12247334978882834399,
    8131365268884726200,
    3584323654723342297,
    696457651847595233,
    26294789957452057,
    37481735321082,
];

// ============================================================================
// Core conversions
// ============================================================================

/// Arithmetic right shift over a 256-bit two's-complement value.
///
/// The exchange formula shifts intermediate products as signed 256-bit
/// words. A plain unsigned shift silently corrupts negative magnitudes by
/// filling with zero bits, so the sign bit is extended explicitly.
fn signed_shift_right(value: U256, shift: u32) -> U256 {
    let logical = value >> shift;
    if value >> 255u32 == U256::ZERO {
        logical
    } else {
        logical | (U256::MAX << (256 - shift))
    }
}

fn sqrt_price_from_positive_tick(tick: u32) -> u128 {
    let mut ratio = if tick & 1 != 0 {
        U256::from(POSITIVE_TICK_FACTORS[0])
    } else {
        U256::ONE << 96u32
    };

    for (bit, factor) in POSITIVE_TICK_FACTORS.iter().enumerate().skip(1) {
        if tick & (1u32 << bit) != 0 {
            ratio = signed_shift_right(ratio * U256::from(*factor), 96);
        }
    }

    // X96 intermediate down to the X64 wire format
    signed_shift_right(ratio, 32).as_u128()
}

fn sqrt_price_from_negative_tick(tick_magnitude: u32) -> u128 {
    let mut ratio = if tick_magnitude & 1 != 0 {
        U256::from(NEGATIVE_TICK_FACTORS[0])
    } else {
        U256::ONE << 64u32
    };

    for (bit, factor) in NEGATIVE_TICK_FACTORS.iter().enumerate().skip(1) {
        if tick_magnitude & (1u32 << bit) != 0 {
            ratio = signed_shift_right(ratio * U256::from(*factor), 64);
        }
    }

    ratio.as_u128()
}

/// Convert a tick index to an X64 fixed-point sqrt price.
///
/// Ticks outside `[MIN_TICK, MAX_TICK]` are clamped, not rejected.
/// Monotonically increasing over the whole domain.
pub fn sqrt_price_from_tick(tick: i32) -> u128 {
    let tick = tick.clamp(MIN_TICK, MAX_TICK);
    if tick >= 0 {
        sqrt_price_from_positive_tick(tick as u32)
    } else {
        sqrt_price_from_negative_tick(tick.unsigned_abs())
    }
}

// ============================================================================
// Range derivation
// ============================================================================

/// Truncate a tick toward zero to a multiple of `spacing`.
///
/// Alignment never flips which side of zero a tick lands on; non-positive
/// spacing means no alignment.
pub fn align_to_spacing(tick: i32, spacing: i32) -> i32 {
    if spacing <= 0 {
        return tick;
    }
    (tick / spacing) * spacing
}

/// Tick offset equivalent to a percentage price move:
/// round(ln(1 + percent/100) / ln(1.0001)).
pub fn tick_offset_from_percent(percent: f64) -> i32 {
    let ratio = 1.0 + percent / 100.0;
    if ratio <= 0.0 {
        return MIN_TICK;
    }
    let offset = ratio.ln() / 1.0001_f64.ln();
    offset.round() as i32
}

/// Apply a percentage offset to the current tick, clamp to the tick bounds,
/// and align down toward zero to a multiple of `spacing`.
pub fn range_from_percent(current_tick: i32, percent: f64, spacing: i32) -> i32 {
    let shifted = current_tick.saturating_add(tick_offset_from_percent(percent));
    align_to_spacing(shifted.clamp(MIN_TICK, MAX_TICK), spacing)
}

/// Symmetric range bracketing the current tick, `width_bps / 2` on each
/// side. A range that collapses under alignment is widened by one spacing
/// step per side so the result is always a nonempty interval.
pub fn range_for_width_bps(current_tick: i32, width_bps: u32, spacing: i32) -> (i32, i32) {
    let half_percent = width_bps as f64 / 100.0 / 2.0;
    let mut lower = range_from_percent(current_tick, -half_percent, spacing);
    let mut upper = range_from_percent(current_tick, half_percent, spacing);

    if lower >= upper {
        let step = spacing.max(1);
        lower = (lower - step).max(align_to_spacing(MIN_TICK, spacing));
        upper = (upper + step).min(align_to_spacing(MAX_TICK, spacing));
    }

    (lower, upper)
}

/// Approximate percentage move represented by a tick offset (inverse of
/// `tick_offset_from_percent`).
pub fn percent_from_tick_offset(offset: i32) -> f64 {
    (1.0001_f64.powi(offset) - 1.0) * 100.0
}

// ============================================================================
// Tests
// ============================================================================
