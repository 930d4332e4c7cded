//! Formal verification with Kani
//!
//! These proofs verify the arithmetic safety properties of the pool engine.
//! Run with: cargo kani --harness <name> (individual proofs)
//! Run all: cargo kani (may take significant time)
//!
//! Key properties proven:
//! - Fee splits account for every unit and never undercharge
//! - Repayment never releases more than its share of collateral
//! - Settlement payouts to two claimants and one provider stay within the
//!   snapshot, solvent or not
//! - Reserve transitions are all-or-nothing
//!
//! Note: proofs that go through the 512-bit helpers are slow. Run them
//! individually with longer timeouts if needed:
//! cargo kani --harness <name> --solver-timeout 600

#![cfg(kani)]

use tenor::math::{repay_release, FeeSchedule, Settlement, BPS_SCALE};
use tenor::*;

// ============================================================================
// Fees
// ============================================================================

#[kani::proof]
#[kani::unwind(10)]
#[kani::solver(cadical)]
fn fee_decrease_split_is_exact() {
    let gross: u128 = kani::any();
    let fee_bps: u16 = kani::any();
    let protocol_fee_bps: u16 = kani::any();

    kani::assume(gross < 1_000_000);
    kani::assume(fee_bps < 1_000 && protocol_fee_bps < 1_000);

    let fees = FeeSchedule::new(fee_bps, protocol_fee_bps).unwrap();
    let split = fees.on_decrease(gross).unwrap();

    assert!(split.applied + split.pool_fee + split.protocol_fee == gross);
    assert!(split.applied <= gross);
}

#[kani::proof]
#[kani::unwind(10)]
#[kani::solver(cadical)]
fn fee_increase_never_undercharges() {
    let gross: u128 = kani::any();
    let fee_bps: u16 = kani::any();

    kani::assume(gross < 1_000_000);
    kani::assume(fee_bps < 1_000);

    let fees = FeeSchedule::new(fee_bps, 0).unwrap();
    let split = fees.on_increase(gross).unwrap();

    // applied * (BPS - fee) >= gross * BPS
    assert!(split.applied * (BPS_SCALE - fee_bps as u128) >= gross * BPS_SCALE);
    assert!(split.applied == gross + split.pool_fee);
}

// ============================================================================
// Repayment
// ============================================================================

#[kani::proof]
#[kani::unwind(10)]
#[kani::solver(cadical)]
fn repay_release_bounded_by_share() {
    let debt: u128 = kani::any();
    let collateral: u128 = kani::any();
    let amount: u128 = kani::any();

    kani::assume(debt > 0 && debt < 10_000);
    kani::assume(collateral < 10_000);
    kani::assume(amount > 0 && amount <= debt);

    let released = repay_release(debt, collateral, amount).unwrap();

    assert!(released <= collateral);
    if amount < debt {
        assert!(released * debt <= collateral * amount);
    } else {
        assert!(released == collateral);
    }
}

#[kani::proof]
#[kani::unwind(10)]
#[kani::solver(cadical)]
fn repay_release_rejects_zero_and_overpay() {
    let debt: u128 = kani::any();
    let collateral: u128 = kani::any();
    let amount: u128 = kani::any();

    kani::assume(debt < 10_000 && collateral < 10_000 && amount < 20_000);
    kani::assume(amount == 0 || amount > debt);

    assert!(repay_release(debt, collateral, amount).is_err());
}

// ============================================================================
// Settlement
// ============================================================================

#[kani::proof]
#[kani::unwind(10)]
#[kani::solver(cadical)]
fn settlement_payouts_within_snapshot() {
    let asset: u128 = kani::any();
    let collateral: u128 = kani::any();
    let bond_a: u128 = kani::any();
    let bond_b: u128 = kani::any();
    let ins_a: u128 = kani::any();
    let ins_b: u128 = kani::any();

    kani::assume(asset < 256 && collateral < 256);
    kani::assume(bond_a < 256 && bond_b < 256);
    kani::assume(ins_a < 256 && ins_b < 256);

    let settlement = Settlement {
        asset,
        collateral,
        bond_total: bond_a + bond_b,
        insurance_total: ins_a + ins_b,
        total_liquidity: 1,
    };

    let (asset_a, coll_a) = settlement.claim_payout(bond_a, ins_a).unwrap();
    let (asset_b, coll_b) = settlement.claim_payout(bond_b, ins_b).unwrap();
    let (asset_lp, coll_lp) = settlement.liquidity_payout(1).unwrap();

    assert!(asset_a + asset_b + asset_lp <= asset);
    assert!(coll_a + coll_b + coll_lp <= collateral);
}

#[kani::proof]
#[kani::unwind(10)]
#[kani::solver(cadical)]
fn solvent_settlement_pays_par() {
    let asset: u128 = kani::any();
    let bond: u128 = kani::any();
    let insurance: u128 = kani::any();

    kani::assume(asset < 10_000 && bond <= asset && insurance < 10_000);

    let settlement = Settlement {
        asset,
        collateral: 100,
        bond_total: bond,
        insurance_total: insurance,
        total_liquidity: 1,
    };
    let (asset_out, collateral_out) = settlement.claim_payout(bond, insurance).unwrap();

    assert!(asset_out == bond);
    assert!(collateral_out == 0);
}

// ============================================================================
// Reserve state
// ============================================================================

#[kani::proof]
#[kani::unwind(10)]
#[kani::solver(cadical)]
fn reserve_apply_is_all_or_nothing() {
    let asset: u128 = kani::any();
    let collateral: u128 = kani::any();
    let asset_sub: u128 = kani::any();
    let collateral_sub: u128 = kani::any();
    let liquidity_sub: u128 = kani::any();

    kani::assume(asset < 1_000 && collateral < 1_000);
    kani::assume(asset_sub < 2_000 && collateral_sub < 2_000 && liquidity_sub < 2_000);

    let mut state = ReserveState {
        reserves: Tokens::new(asset, collateral),
        total_liquidity: 500,
        ..ReserveState::default()
    };
    let before = state;
    let delta = StateDelta {
        asset: Adjust::down(asset_sub),
        collateral: Adjust::down(collateral_sub),
        liquidity: Adjust::down(liquidity_sub),
        ..StateDelta::default()
    };

    match state.apply(&delta) {
        Ok(()) => {
            assert!(state.reserves.asset == asset - asset_sub);
            assert!(state.reserves.collateral == collateral - collateral_sub);
            assert!(state.total_liquidity == 500 - liquidity_sub);
        }
        Err(_) => assert!(state == before),
    }
}

#[kani::proof]
#[kani::unwind(10)]
#[kani::solver(cadical)]
fn claims_sub_never_partial() {
    let held = Claims {
        bond_principal: kani::any(),
        bond_interest: kani::any(),
        insurance_principal: kani::any(),
        insurance_interest: kani::any(),
    };
    let taken = Claims {
        bond_principal: kani::any(),
        bond_interest: kani::any(),
        insurance_principal: kani::any(),
        insurance_interest: kani::any(),
    };

    match held.checked_sub(&taken) {
        Ok(rest) => {
            assert!(held.covers(&taken));
            assert!(rest.checked_add(&taken).unwrap() == held);
        }
        Err(e) => {
            assert!(e == PoolError::InsufficientBalance);
            assert!(!held.covers(&taken));
        }
    }
}
