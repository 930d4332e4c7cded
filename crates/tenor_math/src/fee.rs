//! Fees on the interest leg
//!
//! Both the pool fee and the protocol fee are charged in basis points of
//! the movement of `y`. The pool fee stays in `y` and grows the product;
//! the protocol fee also stays in `y` but is tracked so the recipient can be
//! credited a claim of equal asset value.

use crate::wide::{mul_div_down, mul_div_up};
use crate::{CurveError, Result, BPS_SCALE};

/// Immutable fee parameters of a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeeSchedule {
    /// Pool fee in basis points of the interest leg
    pub fee_bps: u16,
    /// Protocol fee in basis points of the interest leg
    pub protocol_fee_bps: u16,
}

/// How a gross interest movement is divided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSplit {
    /// Part of the movement attributed to the caller
    ///
    /// For a decrease (lend) this is what leaves `y`; for an increase
    /// (borrow) this is the full amount added to `y`, fees included.
    pub applied: u128,
    /// Retained for liquidity providers
    pub pool_fee: u128,
    /// Retained for the protocol fee recipient
    pub protocol_fee: u128,
}

impl FeeSchedule {
    pub const ZERO: FeeSchedule = FeeSchedule { fee_bps: 0, protocol_fee_bps: 0 };

    pub fn new(fee_bps: u16, protocol_fee_bps: u16) -> Result<Self> {
        let schedule = Self { fee_bps, protocol_fee_bps };
        if schedule.total_bps() >= BPS_SCALE {
            return Err(CurveError::InvalidFee);
        }
        Ok(schedule)
    }

    #[inline]
    fn total_bps(&self) -> u128 {
        self.fee_bps as u128 + self.protocol_fee_bps as u128
    }

    /// Split a decrease of `y` (lend side)
    ///
    /// applied = floor(gross * (BPS - fees) / BPS). Truncating the caller's
    /// share hands every rounding unit to the pool.
    pub fn on_decrease(&self, gross: u128) -> Result<FeeSplit> {
        let keep = BPS_SCALE
            .checked_sub(self.total_bps())
            .ok_or(CurveError::InvalidFee)?;
        let applied = mul_div_down(gross, keep, BPS_SCALE)?;
        let protocol_fee = mul_div_down(gross, self.protocol_fee_bps as u128, BPS_SCALE)?;
        let pool_fee = gross
            .checked_sub(applied)
            .and_then(|rest| rest.checked_sub(protocol_fee))
            .ok_or(CurveError::InvariantViolation)?;

        Ok(FeeSplit { applied, pool_fee, protocol_fee })
    }

    /// Split an increase of `y` (borrow side)
    ///
    /// applied = ceil(gross * BPS / (BPS - fees)), so the caller is charged
    /// at least the gross movement plus both fees.
    pub fn on_increase(&self, gross: u128) -> Result<FeeSplit> {
        let keep = BPS_SCALE
            .checked_sub(self.total_bps())
            .ok_or(CurveError::InvalidFee)?;
        if keep == 0 {
            return Err(CurveError::InvalidFee);
        }
        let applied = mul_div_up(gross, BPS_SCALE, keep)?;
        let protocol_fee = mul_div_down(applied, self.protocol_fee_bps as u128, BPS_SCALE)?;
        let pool_fee = applied
            .checked_sub(gross)
            .and_then(|rest| rest.checked_sub(protocol_fee))
            .ok_or(CurveError::InvariantViolation)?;

        Ok(FeeSplit { applied, pool_fee, protocol_fee })
    }
}
