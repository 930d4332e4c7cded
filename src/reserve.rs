//! Reserve state of one pool
//!
//! Every mutation goes through [`ReserveState::apply`], which builds the full
//! next state with checked arithmetic and only then assigns it.

use tenor_math::Axes;

use crate::ledger::Claims;
use crate::{PoolError, Result};

/// Asset and collateral amounts
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tokens {
    pub asset: u128,
    pub collateral: u128,
}

impl Tokens {
    pub const ZERO: Tokens = Tokens { asset: 0, collateral: 0 };

    pub fn new(asset: u128, collateral: u128) -> Self {
        Self { asset, collateral }
    }

    pub fn is_zero(&self) -> bool {
        self.asset == 0 && self.collateral == 0
    }
}

/// Accounted state of a pool
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReserveState {
    /// Invariant axes
    pub axes: Axes,

    /// Custody balances the pool accounts for
    ///
    /// Anything custody holds above this is unaccounted surplus: either an
    /// incoming transfer for the current call or dust for `skim`.
    pub reserves: Tokens,

    /// Liquidity shares outstanding
    pub total_liquidity: u128,

    /// Claims outstanding, summed over every owner
    pub total_claims: Claims,

    /// Debt ever created (borrows and liquidity dues)
    pub total_debt_created: u128,

    /// Debt not yet repaid
    pub debt_outstanding: u128,
}

/// Signed change of a scalar, expressed as two unsigned halves
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Adjust {
    pub add: u128,
    pub sub: u128,
}

impl Adjust {
    pub const NONE: Adjust = Adjust { add: 0, sub: 0 };

    pub fn up(amount: u128) -> Self {
        Self { add: amount, sub: 0 }
    }

    pub fn down(amount: u128) -> Self {
        Self { add: 0, sub: amount }
    }

    /// value + add - sub, failing on overflow or underflow
    pub fn apply_to(&self, value: u128) -> Result<u128> {
        value
            .checked_add(self.add)
            .and_then(|v| v.checked_sub(self.sub))
            .ok_or(PoolError::RangeOverflow)
    }
}

/// Everything one operation changes in a [`ReserveState`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StateDelta {
    /// Replacement axes, already validated against the curve
    pub axes: Option<Axes>,
    pub asset: Adjust,
    pub collateral: Adjust,
    pub liquidity: Adjust,
    pub claims_minted: Claims,
    pub claims_burned: Claims,
    pub debt_created: u128,
    pub debt_repaid: u128,
}

impl ReserveState {
    /// True while any claim or unpaid debt exists
    pub fn has_obligations(&self) -> bool {
        !self.total_claims.is_zero() || self.debt_outstanding > 0
    }

    /// Compute the state `delta` would produce without committing it
    pub fn preview(&self, delta: &StateDelta) -> Result<ReserveState> {
        let total_claims = self
            .total_claims
            .checked_add(&delta.claims_minted)?
            .checked_sub(&delta.claims_burned)
            .map_err(|_| PoolError::RangeOverflow)?;

        let debt_outstanding = self
            .debt_outstanding
            .checked_add(delta.debt_created)
            .and_then(|d| d.checked_sub(delta.debt_repaid))
            .ok_or(PoolError::RangeOverflow)?;

        let next = ReserveState {
            axes: delta.axes.unwrap_or(self.axes),
            reserves: Tokens {
                asset: delta.asset.apply_to(self.reserves.asset)?,
                collateral: delta.collateral.apply_to(self.reserves.collateral)?,
            },
            total_liquidity: delta.liquidity.apply_to(self.total_liquidity)?,
            total_claims,
            total_debt_created: self
                .total_debt_created
                .checked_add(delta.debt_created)
                .ok_or(PoolError::RangeOverflow)?,
            debt_outstanding,
        };

        if let Some(axes) = delta.axes {
            axes.check_range()?;
            // Minimum-liquidity floor
            if next.has_obligations() && axes.is_degenerate() {
                return Err(PoolError::InsufficientReserve);
            }
            if axes.x > next.reserves.asset {
                return Err(PoolError::InsufficientReserve);
            }
        }

        Ok(next)
    }

    /// Apply `delta` atomically: on error `self` is untouched
    pub fn apply(&mut self, delta: &StateDelta) -> Result<()> {
        *self = self.preview(delta)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live() -> ReserveState {
        ReserveState {
            axes: Axes::new(1_000, 100, 10),
            reserves: Tokens::new(1_000, 50),
            total_liquidity: 1_000 << 16,
            total_claims: Claims { bond_principal: 10, ..Claims::ZERO },
            total_debt_created: 1_100,
            debt_outstanding: 1_100,
        }
    }

    #[test]
    fn test_apply_updates_every_field_together() {
        let mut state = live();
        let delta = StateDelta {
            axes: Some(Axes::new(1_100, 95, 9)),
            asset: Adjust::up(100),
            claims_minted: Claims { bond_principal: 100, bond_interest: 3, ..Claims::ZERO },
            ..StateDelta::default()
        };
        state.apply(&delta).unwrap();

        assert_eq!(state.axes, Axes::new(1_100, 95, 9));
        assert_eq!(state.reserves.asset, 1_100);
        assert_eq!(state.total_claims.bond().unwrap(), 113);
    }

    #[test]
    fn test_failed_apply_leaves_state_untouched() {
        let mut state = live();
        let before = state;
        let delta = StateDelta {
            asset: Adjust::up(5),
            collateral: Adjust::down(51),
            ..StateDelta::default()
        };
        assert_eq!(state.apply(&delta), Err(PoolError::RangeOverflow));
        assert_eq!(state, before);
    }

    #[test]
    fn test_floor_blocks_draining_axes_with_obligations() {
        let mut state = live();
        let delta = StateDelta {
            axes: Some(Axes::ZERO),
            asset: Adjust::down(1_000),
            liquidity: Adjust::down(1_000 << 16),
            ..StateDelta::default()
        };
        assert_eq!(state.apply(&delta), Err(PoolError::InsufficientReserve));

        state.total_claims = Claims::ZERO;
        state.debt_outstanding = 0;
        assert!(state.apply(&delta).is_ok());
        assert_eq!(state.total_liquidity, 0);
    }

    #[test]
    fn test_axes_cannot_outgrow_asset_reserve() {
        let mut state = live();
        let delta = StateDelta {
            axes: Some(Axes::new(1_001, 100, 10)),
            ..StateDelta::default()
        };
        assert_eq!(state.apply(&delta), Err(PoolError::InsufficientReserve));
    }
}
