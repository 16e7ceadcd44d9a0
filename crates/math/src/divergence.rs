/// Divergence-loss (impermanent-loss) estimation.
///
/// The estimate compares the current price to the realized range's
/// geometric-center price. The center stands in for the original entry
/// price, which is exact only when the position was opened centered on the
/// price at entry.

use cycler_types::{PositionRange, BPS_SCALE};

/// Price ratio implied by a tick delta: 1.0001^delta
pub fn price_ratio_from_tick_delta(delta: i32) -> f64 {
    1.0001_f64.powi(delta)
}

/// Estimated divergence loss in basis points for a position whose range is
/// `[tick_lower, tick_upper]` while the pool trades at `current_tick`.
///
/// Loss fraction is `|2*sqrt(r)/(1+r) - 1|` where `r` is the price ratio
/// between the current tick and the range's center tick.
pub fn divergence_loss_bps(current_tick: i32, tick_lower: i32, tick_upper: i32) -> u32 {
    let center = (tick_lower + tick_upper) / 2;
    let r = price_ratio_from_tick_delta(current_tick - center);
    let loss = (2.0 * r.sqrt() / (1.0 + r) - 1.0).abs();
    (loss * f64::from(BPS_SCALE)).round() as u32
}

/// Convenience wrapper over a realized [`PositionRange`]
pub fn divergence_loss_for_range(current_tick: i32, range: &PositionRange) -> u32 {
    divergence_loss_bps(current_tick, range.tick_lower, range.tick_upper)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_at_center() {
        assert_eq!(divergence_loss_bps(0, -1000, 1000), 0);
        assert_eq!(divergence_loss_bps(500, 0, 1000), 0);
    }

    #[test]
    fn test_symmetric_in_tick_delta() {
        let up = divergence_loss_bps(2000, -1000, 1000);
        let down = divergence_loss_bps(-2000, -1000, 1000);
        // r and 1/r produce the same loss
        assert_eq!(up, down);
        assert!(up > 0);
    }

    #[test]
    fn test_grows_with_excursion() {
        let near = divergence_loss_bps(1500, -1000, 1000);
        let far = divergence_loss_bps(6000, -1000, 1000);
        assert!(far > near);
    }

    #[test]
    fn test_known_magnitude() {
        // A 2x price ratio loses 2*sqrt(2)/3 - 1 = ~5.719%.
        // ln(2)/ln(1.0001) = ~6932 ticks.
        let loss = divergence_loss_bps(6932, -1, 1);
        assert!((571..=573).contains(&loss), "got {loss}");
    }

    #[test]
    fn test_breach_threshold_excursion() {
        // 3% loss needs roughly a 1.65x move; well past it at 2.5x
        let delta = (2.5_f64.ln() / 1.0001_f64.ln()).round() as i32;
        assert!(divergence_loss_bps(delta, -1, 1) > 300);
    }
}
