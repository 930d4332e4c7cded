//! Three-axis constant product curve (x·y·z=k)
//!
//! - `x`: asset available to the curve
//! - `y`: interest rate factor; bond interest = Δy · duration >> 32
//! - `z`: collateral factor; insurance interest = Δz · duration >> 25,
//!   and z / x is the collateral locked per unit of principal
//!
//! A lend adds to `x` and removes from `y` and `z`; a borrow does the
//! opposite. Neither may lower the product. Borrows and unconstrained lends
//! resolve the two free variables at the neutral point of the curve, which
//! keeps the ratio y/z unchanged. A lender with minimum interest terms may
//! move along the curve instead (`quote_lend_for`).

use crate::fee::{FeeSchedule, FeeSplit};
use crate::wide::{
    div_up, mul, mul_div_down, mul_div_up, narrow, product3, scale_down, scale_up, sqrt_up, wide,
    U512,
};
use crate::{
    CurveError, Result, INSURANCE_SHIFT, INTEREST_SHIFT, LIQUIDITY_SHIFT, MAX_RESERVE,
};

/// The invariant axes of a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Axes {
    pub x: u128,
    pub y: u128,
    pub z: u128,
}

impl Axes {
    pub const ZERO: Axes = Axes { x: 0, y: 0, z: 0 };

    pub fn new(x: u128, y: u128, z: u128) -> Self {
        Self { x, y, z }
    }

    /// x·y·z computed without overflow
    pub fn product(&self) -> U512 {
        product3(self.x, self.y, self.z)
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0 && self.y == 0 && self.z == 0
    }

    /// True when any axis is zero (the curve cannot price a trade)
    pub fn is_degenerate(&self) -> bool {
        self.x == 0 || self.y == 0 || self.z == 0
    }

    pub fn check_range(&self) -> Result<()> {
        if self.x > MAX_RESERVE || self.y > MAX_RESERVE || self.z > MAX_RESERVE {
            return Err(CurveError::RangeOverflow);
        }
        Ok(())
    }
}

/// Validate a proposed transition of the axes
///
/// Fails with `RangeOverflow` if any new axis exceeds `MAX_RESERVE` and with
/// `InvariantViolation` if x1·y1·z1 < x0·y0·z0.
pub fn check_product(old: &Axes, new: &Axes) -> Result<()> {
    new.check_range()?;
    if new.product() < old.product() {
        return Err(CurveError::InvariantViolation);
    }
    Ok(())
}

/// Solve (y, z) for a new x so that x·y·z >= k and y/z stays put
///
/// yz = ceil(k / x1); y = ceil_sqrt(ceil(yz · y0 / z0)); z = ceil(yz / y).
/// Both roundings go up, so y·z >= yz and the product cannot fall.
fn neutral_point(axes: &Axes, x1: u128) -> Result<(u128, u128)> {
    let yz = div_up(axes.product(), wide(x1))?;
    let y_sq = div_up(mul(yz, wide(axes.y))?, wide(axes.z))?;
    let y1 = sqrt_up(y_sq)?;
    if y1.is_zero() {
        return Err(CurveError::InvariantViolation);
    }
    let z1 = div_up(yz, y1)?;
    Ok((narrow(y1)?, narrow(z1)?))
}

// ============================================================================
// Lend
// ============================================================================

/// Result of pricing a lend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LendQuote {
    /// Axes after the trade
    pub axes: Axes,
    pub bond_principal: u128,
    pub bond_interest: u128,
    pub insurance_principal: u128,
    pub insurance_interest: u128,
    /// Asset value of the protocol's share of the interest leg
    pub protocol_fee_interest: u128,
    /// Fee split of the y decrease
    pub fee: FeeSplit,
}

/// Minimum interest a lender accepts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LendTarget {
    pub min_bond_interest: u128,
    pub min_insurance_interest: u128,
}

impl LendTarget {
    pub fn accepts(&self, quote: &LendQuote) -> bool {
        quote.bond_interest >= self.min_bond_interest
            && quote.insurance_interest >= self.min_insurance_interest
    }
}

/// Price lending `asset_in` for `duration` seconds at the neutral point
///
/// ```text
/// x1 = x0 + asset_in
/// (y', z1) = neutral point at x1
/// y1 = y0 - applied(y0 - y')          (fees keep part of the decrease)
/// bond     = asset_in + applied · d >> 32
/// insurance = z0 · asset_in / x1 + (z0 - z1) · d >> 25
/// ```
pub fn quote_lend(
    axes: Axes,
    fees: &FeeSchedule,
    duration: u64,
    asset_in: u128,
) -> Result<LendQuote> {
    let x1 = lend_x(&axes, duration, asset_in)?;
    let (y_curve, z_curve) = neutral_point(&axes, x1)?;
    // The curve point never sits above the old axes on a lend
    price_lend(&axes, fees, duration, asset_in, x1, y_curve.min(axes.y), z_curve.min(axes.z))
}

/// Price a lend against the caller's minimum interest
///
/// The neutral point is taken when it meets both minimums. Otherwise z
/// falls by exactly what `min_insurance_interest` needs and y takes the
/// rest of the curve:
/// ```text
/// z1 = z0 - ceil(min_insurance << 25 / d)
/// y' = ceil(x0 · y0 · z0 / (x1 · z1))
/// ```
/// Fails with `Slippage` when that point still misses a minimum.
pub fn quote_lend_for(
    axes: Axes,
    fees: &FeeSchedule,
    duration: u64,
    asset_in: u128,
    target: LendTarget,
) -> Result<LendQuote> {
    let neutral = quote_lend(axes, fees, duration, asset_in)?;
    if target.accepts(&neutral) {
        return Ok(neutral);
    }

    let x1 = neutral.axes.x;
    let z_decrease = div_up(
        wide(target.min_insurance_interest) << INSURANCE_SHIFT as usize,
        wide(duration as u128),
    )?;
    if z_decrease >= wide(axes.z) {
        return Err(CurveError::Slippage);
    }
    let z1 = axes.z - narrow(z_decrease)?;

    let y_curve = div_up(axes.product(), mul(wide(x1), wide(z1))?)?;
    if y_curve > wide(axes.y) {
        return Err(CurveError::Slippage);
    }

    let quote = price_lend(&axes, fees, duration, asset_in, x1, narrow(y_curve)?, z1)?;
    if !target.accepts(&quote) {
        return Err(CurveError::Slippage);
    }
    Ok(quote)
}

fn lend_x(axes: &Axes, duration: u64, asset_in: u128) -> Result<u128> {
    if asset_in == 0 || duration == 0 {
        return Err(CurveError::ZeroInput);
    }
    if axes.is_degenerate() {
        return Err(CurveError::InsufficientReserve);
    }
    let x1 = axes.x.checked_add(asset_in).ok_or(CurveError::RangeOverflow)?;
    if x1 > MAX_RESERVE {
        return Err(CurveError::RangeOverflow);
    }
    Ok(x1)
}

/// Settle a lend at curve point (x1, y_curve, z1), y_curve <= y0, z1 <= z0
fn price_lend(
    axes: &Axes,
    fees: &FeeSchedule,
    duration: u64,
    asset_in: u128,
    x1: u128,
    y_curve: u128,
    z1: u128,
) -> Result<LendQuote> {
    let y_decrease = axes.y - y_curve;
    let z_decrease = axes.z - z1;

    let fee = fees.on_decrease(y_decrease)?;
    let y1 = axes.y - fee.applied;

    let new_axes = Axes::new(x1, y1, z1);
    check_product(axes, &new_axes)?;

    let quote = LendQuote {
        axes: new_axes,
        bond_principal: asset_in,
        bond_interest: scale_down(fee.applied, duration, INTEREST_SHIFT)?,
        insurance_principal: mul_div_down(axes.z, asset_in, x1)?,
        insurance_interest: scale_down(z_decrease, duration, INSURANCE_SHIFT)?,
        protocol_fee_interest: scale_down(fee.protocol_fee, duration, INTEREST_SHIFT)?,
        fee,
    };
    log::trace!(
        "quote_lend: asset_in={} y_dec={} z_dec={} bond_interest={}",
        asset_in,
        fee.applied,
        z_decrease,
        quote.bond_interest
    );
    Ok(quote)
}

// ============================================================================
// Borrow
// ============================================================================

/// Result of pricing a borrow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BorrowQuote {
    /// Axes after the trade
    pub axes: Axes,
    /// Asset owed at maturity (principal + interest + fees)
    pub debt: u128,
    /// Collateral the borrower must lock
    pub collateral: u128,
    /// Asset value of the protocol's share of the interest leg
    pub protocol_fee_interest: u128,
    /// Fee split of the y increase
    pub fee: FeeSplit,
}

/// Price borrowing `asset_out` for `duration` seconds
///
/// ```text
/// x1 = x0 - asset_out
/// (y', z1) = neutral point at x1
/// y1 = y0 + applied(y' - y0)          (fees enlarge the increase)
/// debt       = asset_out + ceil(applied · d >> 32)
/// collateral = ceil(asset_out · z0 / x1) + ceil((z1 - z0) · d >> 25)
/// ```
pub fn quote_borrow(
    axes: Axes,
    fees: &FeeSchedule,
    duration: u64,
    asset_out: u128,
) -> Result<BorrowQuote> {
    if asset_out == 0 || duration == 0 {
        return Err(CurveError::ZeroInput);
    }
    if axes.is_degenerate() {
        return Err(CurveError::InsufficientReserve);
    }
    if asset_out >= axes.x {
        return Err(CurveError::InsufficientReserve);
    }

    let x1 = axes.x - asset_out;
    let (y_curve, z_curve) = neutral_point(&axes, x1)?;
    // The curve point never sits below the old axes on a borrow
    let y_curve = y_curve.max(axes.y);
    let z1 = z_curve.max(axes.z);

    let y_increase = y_curve - axes.y;
    let z_increase = z1 - axes.z;

    let fee = fees.on_increase(y_increase)?;
    let y1 = axes.y.checked_add(fee.applied).ok_or(CurveError::RangeOverflow)?;

    let new_axes = Axes::new(x1, y1, z1);
    check_product(&axes, &new_axes)?;

    let debt = asset_out
        .checked_add(scale_up(fee.applied, duration, INTEREST_SHIFT)?)
        .ok_or(CurveError::RangeOverflow)?;
    let collateral = mul_div_up(asset_out, axes.z, x1)?
        .checked_add(scale_up(z_increase, duration, INSURANCE_SHIFT)?)
        .ok_or(CurveError::RangeOverflow)?;

    log::trace!(
        "quote_borrow: asset_out={} y_inc={} z_inc={} debt={} collateral={}",
        asset_out,
        fee.applied,
        z_increase,
        debt,
        collateral
    );
    Ok(BorrowQuote {
        axes: new_axes,
        debt,
        collateral,
        protocol_fee_interest: scale_down(fee.protocol_fee, duration, INTEREST_SHIFT)?,
        fee,
    })
}

// ============================================================================
// Mint / Burn
// ============================================================================

/// Result of pricing a liquidity deposit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MintQuote {
    pub axes: Axes,
    pub liquidity_out: u128,
    /// Asset owed by the provider at maturity
    pub debt: u128,
    /// Collateral the provider locks against that debt
    pub collateral: u128,
}

/// Debt and collateral behind a (y, z) increase
fn provider_due(asset_in: u128, y_increase: u128, z_increase: u128, duration: u64) -> Result<(u128, u128)> {
    let debt = asset_in
        .checked_add(scale_up(y_increase, duration, INTEREST_SHIFT)?)
        .ok_or(CurveError::RangeOverflow)?;
    let collateral = z_increase
        .checked_add(scale_up(z_increase, duration, INSURANCE_SHIFT)?)
        .ok_or(CurveError::RangeOverflow)?;
    Ok((debt, collateral))
}

/// Bootstrap an empty pool
///
/// The provider fixes the opening price through the debt and collateral it
/// is willing to take on:
/// ```text
/// x = asset_in
/// y = floor((debt_in - asset_in) << 32 / d)
/// z = floor(collateral_in << 25 / (2^25 + d))
/// ```
/// The resulting due never exceeds `debt_in` / `collateral_in`.
pub fn quote_mint_new(
    duration: u64,
    asset_in: u128,
    debt_in: u128,
    collateral_in: u128,
) -> Result<MintQuote> {
    if asset_in == 0 || debt_in == 0 || collateral_in == 0 || duration == 0 {
        return Err(CurveError::ZeroInput);
    }
    let interest = debt_in.checked_sub(asset_in).ok_or(CurveError::ZeroInput)?;

    let y = narrow((wide(interest) << INTEREST_SHIFT as usize) / U512::from(duration))?;
    let z_den = (U512::one() << INSURANCE_SHIFT as usize) + U512::from(duration);
    let z = narrow((wide(collateral_in) << INSURANCE_SHIFT as usize) / z_den)?;
    if y == 0 || z == 0 {
        return Err(CurveError::ZeroInput);
    }

    let axes = Axes::new(asset_in, y, z);
    axes.check_range()?;

    let liquidity_out = asset_in
        .checked_mul(1u128 << LIQUIDITY_SHIFT)
        .ok_or(CurveError::RangeOverflow)?;
    let (debt, collateral) = provider_due(asset_in, y, z, duration)?;

    Ok(MintQuote { axes, liquidity_out, debt, collateral })
}

/// Add liquidity to a live pool without moving its prices
///
/// y and z grow by the same proportion as x (rounded up, so the provider
/// adds at least its share); liquidity is minted pro rata (rounded down).
pub fn quote_mint_add(
    axes: Axes,
    total_liquidity: u128,
    duration: u64,
    asset_in: u128,
) -> Result<MintQuote> {
    if asset_in == 0 || duration == 0 {
        return Err(CurveError::ZeroInput);
    }
    if axes.is_degenerate() || total_liquidity == 0 {
        return Err(CurveError::InsufficientReserve);
    }

    let y_increase = mul_div_up(axes.y, asset_in, axes.x)?;
    let z_increase = mul_div_up(axes.z, asset_in, axes.x)?;
    let liquidity_out = mul_div_down(total_liquidity, asset_in, axes.x)?;

    let new_axes = Axes::new(
        axes.x.checked_add(asset_in).ok_or(CurveError::RangeOverflow)?,
        axes.y.checked_add(y_increase).ok_or(CurveError::RangeOverflow)?,
        axes.z.checked_add(z_increase).ok_or(CurveError::RangeOverflow)?,
    );
    check_product(&axes, &new_axes)?;

    let (debt, collateral) = provider_due(asset_in, y_increase, z_increase, duration)?;
    Ok(MintQuote { axes: new_axes, liquidity_out, debt, collateral })
}

/// Result of removing liquidity before maturity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BurnQuote {
    pub axes: Axes,
    pub asset_out: u128,
}

/// Remove `liquidity_in` of `total_liquidity` from the curve
///
/// Each axis shrinks by floor(axis · L / T); the provider receives the x
/// share as asset. Burning everything empties the curve exactly.
pub fn quote_burn(axes: Axes, total_liquidity: u128, liquidity_in: u128) -> Result<BurnQuote> {
    if liquidity_in == 0 {
        return Err(CurveError::ZeroInput);
    }
    if liquidity_in > total_liquidity {
        return Err(CurveError::InsufficientReserve);
    }

    let asset_out = mul_div_down(axes.x, liquidity_in, total_liquidity)?;
    let y_out = mul_div_down(axes.y, liquidity_in, total_liquidity)?;
    let z_out = mul_div_down(axes.z, liquidity_in, total_liquidity)?;

    Ok(BurnQuote {
        axes: Axes::new(axes.x - asset_out, axes.y - y_out, axes.z - z_out),
        asset_out,
    })
}
