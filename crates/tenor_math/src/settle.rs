//! Maturity settlement
//!
//! Once a pool has matured its books are frozen into a [`Settlement`]. All
//! later payouts are pro-rata slices of that snapshot, each rounded down, so
//! the sum paid over every claimant and every liquidity provider can never
//! exceed what the snapshot holds.
//!
//! # Partial default
//! With A = asset reserve, B = total bond claims, C = collateral reserve and
//! I = total insurance claims:
//! - A >= B: bonds are paid in full, insurance is worthless, LPs share A - B
//!   and all of C.
//! - A < B: bonds are paid A/B on the unit. The deficit D = B - A is
//!   compensated in collateral: insurance holders receive D · ins / B when
//!   C · B > D · I, otherwise they share all of C.

use crate::wide::{mul, mul_div_down, mul_div_up, wide};
use crate::{CurveError, Result};

/// Frozen pool books at maturity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Settlement {
    /// Asset reserve at settlement
    pub asset: u128,
    /// Collateral reserve at settlement (backs defaulted debt only)
    pub collateral: u128,
    /// Total bond claims (principal + interest)
    pub bond_total: u128,
    /// Total insurance claims (principal + interest)
    pub insurance_total: u128,
    /// Liquidity outstanding at settlement
    pub total_liquidity: u128,
}

impl Settlement {
    /// True when the asset reserve cannot cover every bond
    pub fn is_default(&self) -> bool {
        self.asset < self.bond_total
    }

    /// Bond value the asset reserve cannot cover
    pub fn deficit(&self) -> u128 {
        self.bond_total.saturating_sub(self.asset)
    }

    /// C · B > D · I: the collateral reserve covers the whole insurance book
    fn insurance_fully_covered(&self) -> Result<bool> {
        let lhs = mul(wide(self.collateral), wide(self.bond_total))?;
        let rhs = mul(wide(self.deficit()), wide(self.insurance_total))?;
        Ok(lhs > rhs)
    }

    /// Collateral reserved for insurance holders as a group (rounded up)
    pub fn insurance_obligation(&self) -> Result<u128> {
        if !self.is_default() {
            return Ok(0);
        }
        if self.insurance_fully_covered()? {
            mul_div_up(self.deficit(), self.insurance_total, self.bond_total)
        } else {
            Ok(self.collateral)
        }
    }

    /// Payout for redeeming `bond_in` of bond and `insurance_in` of insurance
    ///
    /// Returns `(asset_out, collateral_out)`, both rounded down.
    pub fn claim_payout(&self, bond_in: u128, insurance_in: u128) -> Result<(u128, u128)> {
        if bond_in > self.bond_total || insurance_in > self.insurance_total {
            return Err(CurveError::InsufficientReserve);
        }
        if !self.is_default() {
            return Ok((bond_in, 0));
        }

        let asset_out = mul_div_down(bond_in, self.asset, self.bond_total)?;
        let collateral_out = if insurance_in == 0 {
            0
        } else if self.insurance_fully_covered()? {
            mul_div_down(self.deficit(), insurance_in, self.bond_total)?
        } else {
            mul_div_down(insurance_in, self.collateral, self.insurance_total)?
        };
        Ok((asset_out, collateral_out))
    }

    /// Payout for burning `liquidity_in` after maturity
    ///
    /// Liquidity providers share whatever the claims do not take:
    /// asset = (A - B)⁺ · L / T, collateral = (C - obligation) · L / T.
    pub fn liquidity_payout(&self, liquidity_in: u128) -> Result<(u128, u128)> {
        if liquidity_in > self.total_liquidity {
            return Err(CurveError::InsufficientReserve);
        }
        if liquidity_in == 0 {
            return Ok((0, 0));
        }

        let free_asset = self.asset.saturating_sub(self.bond_total);
        let free_collateral = self
            .collateral
            .checked_sub(self.insurance_obligation()?)
            .ok_or(CurveError::InvariantViolation)?;

        Ok((
            mul_div_down(free_asset, liquidity_in, self.total_liquidity)?,
            mul_div_down(free_collateral, liquidity_in, self.total_liquidity)?,
        ))
    }
}

/// Collateral released by repaying `amount` of a due of `debt` backed by
/// `collateral`
///
/// Partial repayment releases floor(collateral · amount / debt); clearing the
/// debt releases everything that is left.
pub fn repay_release(debt: u128, collateral: u128, amount: u128) -> Result<u128> {
    if amount == 0 {
        return Err(CurveError::ZeroInput);
    }
    if amount > debt {
        return Err(CurveError::InsufficientReserve);
    }
    if amount == debt {
        return Ok(collateral);
    }
    mul_div_down(collateral, amount, debt)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solvent() -> Settlement {
        Settlement {
            asset: 1_200,
            collateral: 50,
            bond_total: 1_000,
            insurance_total: 400,
            total_liquidity: 100,
        }
    }

    fn defaulted() -> Settlement {
        Settlement {
            asset: 600,
            collateral: 500,
            bond_total: 1_000,
            insurance_total: 400,
            total_liquidity: 100,
        }
    }

    #[test]
    fn test_solvent_pool_pays_bonds_in_full() {
        let s = solvent();
        assert_eq!(s.claim_payout(300, 100).unwrap(), (300, 0));
        assert_eq!(s.insurance_obligation().unwrap(), 0);
        // LPs share the 200 surplus and all of the collateral
        assert_eq!(s.liquidity_payout(50).unwrap(), (100, 25));
    }

    #[test]
    fn test_default_haircuts_bonds_and_pays_insurance() {
        let s = defaulted();
        // deficit = 400, C·B = 500_000 > D·I = 160_000
        let (asset, collateral) = s.claim_payout(500, 200).unwrap();
        assert_eq!(asset, 300);
        assert_eq!(collateral, 80);
        assert_eq!(s.insurance_obligation().unwrap(), 160);
        assert_eq!(s.liquidity_payout(100).unwrap(), (0, 340));
    }

    #[test]
    fn test_insufficient_collateral_is_shared_pro_rata() {
        let s = Settlement { collateral: 100, ..defaulted() };
        // C·B = 100_000 < D·I = 160_000
        let (_, collateral) = s.claim_payout(0, 100).unwrap();
        assert_eq!(collateral, 25);
        assert_eq!(s.insurance_obligation().unwrap(), 100);
        assert_eq!(s.liquidity_payout(100).unwrap(), (0, 0));
    }

    #[test]
    fn test_default_without_insurance_pays_bonds_only() {
        let s = Settlement { collateral: 0, insurance_total: 0, ..defaulted() };
        assert_eq!(s.claim_payout(1_000, 0).unwrap(), (600, 0));
        assert_eq!(s.insurance_obligation().unwrap(), 0);
    }

    #[test]
    fn test_total_payouts_never_exceed_snapshot() {
        let s = Settlement {
            asset: 997,
            collateral: 331,
            bond_total: 1_013,
            insurance_total: 409,
            total_liquidity: 77,
        };
        let holders = [(101u128, 7u128), (333, 211), (579, 191)];
        let mut asset = 0;
        let mut collateral = 0;
        for (bond, insurance) in holders {
            let (a, c) = s.claim_payout(bond, insurance).unwrap();
            asset += a;
            collateral += c;
        }
        for lp in [33u128, 44] {
            let (a, c) = s.liquidity_payout(lp).unwrap();
            asset += a;
            collateral += c;
        }
        assert!(asset <= s.asset);
        assert!(collateral <= s.collateral);
    }

    #[test]
    fn test_repay_release() {
        assert_eq!(repay_release(1_000, 300, 500).unwrap(), 150);
        assert_eq!(repay_release(1_000, 301, 999).unwrap(), 300);
        assert_eq!(repay_release(1_000, 301, 1_000).unwrap(), 301);
        assert_eq!(repay_release(1_000, 301, 0), Err(CurveError::ZeroInput));
        assert_eq!(repay_release(1_000, 301, 1_001), Err(CurveError::InsufficientReserve));
    }
}
