//! Pool state machine
//!
//! One pool per (asset, collateral, maturity). The phase is derived from the
//! caller's clock on every call:
//! - Active (`now < maturity`): mint, lend, borrow, burn, pay
//! - Matured (`now >= maturity`): pay until the grace period ends, then
//!   burn and withdraw against the settlement snapshot
//!
//! Every operation follows the same order: validate, price, preview the next
//! [`ReserveState`], update the ledger, commit, and only then move tokens out
//! of custody.

use alloc::vec::Vec;

use tenor_math::{
    quote_borrow, quote_burn, quote_lend_for, quote_mint_add, quote_mint_new, repay_release, Axes,
    FeeSchedule, LendTarget, Settlement, U512,
};

use crate::custody::{Token, TokenCustody};
use crate::ledger::{Claims, ClaimsLedger, Due, DueId, DueStorage};
use crate::reserve::{Adjust, ReserveState, StateDelta, Tokens};
use crate::{Owner, PoolError, Result};

// ============================================================================
// Parameters & Outcomes
// ============================================================================

/// Immutable pool parameters
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolParams {
    /// Unix timestamp at which lending and borrowing stop
    pub maturity: u64,
    pub fees: FeeSchedule,
    /// Receives the protocol share of fees as bond interest
    pub fee_recipient: Owner,
    /// Seconds after maturity during which dues can still be paid
    pub grace_period: u64,
}

impl PoolParams {
    /// First timestamp at which the pool can settle
    pub fn settle_at(&self) -> u64 {
        self.maturity.saturating_add(self.grace_period)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Active,
    Matured,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MintParams {
    pub liquidity_to: Owner,
    pub due_to: Owner,
    pub asset_in: u128,
    /// Opening debt on an empty pool, maximum debt otherwise
    pub debt_in: u128,
    /// Opening collateral on an empty pool, maximum collateral otherwise
    pub collateral_in: u128,
    pub min_liquidity: u128,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MintOutcome {
    pub liquidity_out: u128,
    pub due_id: DueId,
    pub due: Due,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LendParams {
    pub to: Owner,
    pub asset_in: u128,
    pub min_bond_interest: u128,
    pub min_insurance_interest: u128,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LendOutcome {
    /// Claims credited to the lender
    pub claims: Claims,
    /// Bond interest credited to the fee recipient
    pub protocol_fee: u128,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BorrowParams {
    pub due_to: Owner,
    pub asset_to: Owner,
    pub asset_out: u128,
    pub max_collateral_in: u128,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BorrowOutcome {
    pub due_id: DueId,
    pub due: Due,
    /// Bond interest credited to the fee recipient
    pub protocol_fee: u128,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BurnOutcome {
    pub asset_out: u128,
    pub collateral_out: u128,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PayOutcome {
    pub asset_in: u128,
    pub collateral_out: u128,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WithdrawOutcome {
    pub asset_out: u128,
    pub collateral_out: u128,
}

// ============================================================================
// Pool
// ============================================================================

/// A fixed-maturity pool, generic over due storage
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pool<S: DueStorage = Vec<Due>> {
    params: PoolParams,
    state: ReserveState,
    ledger: ClaimsLedger<S>,

    /// Bond interest credited to the fee recipient so far
    protocol_fees: u128,

    /// Frozen books, taken on the first settlement after maturity
    settlement: Option<Settlement>,
}

/// Type alias for the default Vec-based pool
pub type VecPool = Pool<Vec<Due>>;

impl Pool<Vec<Due>> {
    pub fn new(params: PoolParams) -> Result<Self> {
        Self::with_storage(params, Vec::new())
    }
}

impl<S: DueStorage> Pool<S> {
    pub fn with_storage(params: PoolParams, dues: S) -> Result<Self> {
        FeeSchedule::new(params.fees.fee_bps, params.fees.protocol_fee_bps)?;
        if params.maturity == 0 {
            return Err(PoolError::InvalidParams);
        }
        Ok(Self {
            params,
            state: ReserveState::default(),
            ledger: ClaimsLedger::with_storage(dues),
            protocol_fees: 0,
            settlement: None,
        })
    }

    // ========================================
    // Views
    // ========================================

    pub fn params(&self) -> &PoolParams {
        &self.params
    }

    pub fn state(&self) -> &ReserveState {
        &self.state
    }

    pub fn phase(&self, now: u64) -> Phase {
        if now < self.params.maturity {
            Phase::Active
        } else {
            Phase::Matured
        }
    }

    /// x·y·z of the current axes
    pub fn product(&self) -> U512 {
        self.state.axes.product()
    }

    pub fn axes(&self) -> Axes {
        self.state.axes
    }

    pub fn claims_of(&self, owner: &Owner) -> Claims {
        self.ledger.claims_of(owner)
    }

    pub fn liquidity_of(&self, owner: &Owner) -> u128 {
        self.ledger.liquidity_of(owner)
    }

    pub fn due(&self, id: DueId) -> Option<&Due> {
        self.ledger.due(id)
    }

    pub fn ledger(&self) -> &ClaimsLedger<S> {
        &self.ledger
    }

    pub fn protocol_fees(&self) -> u128 {
        self.protocol_fees
    }

    pub fn settlement(&self) -> Option<&Settlement> {
        self.settlement.as_ref()
    }

    // ========================================
    // Internal helpers
    // ========================================

    /// Seconds to maturity; `Expired` once maturity is reached
    fn duration(&self, now: u64) -> Result<u64> {
        if now >= self.params.maturity {
            return Err(PoolError::Expired);
        }
        Ok(self.params.maturity - now)
    }

    fn require_settleable(&self, now: u64) -> Result<()> {
        if now < self.params.settle_at() {
            return Err(PoolError::NotYetMatured);
        }
        Ok(())
    }

    /// Custody holdings above the accounted reserves
    fn surplus<C: TokenCustody>(&self, custody: &C) -> Result<Tokens> {
        let asset = custody
            .balance(Token::Asset)
            .checked_sub(self.state.reserves.asset)
            .ok_or(PoolError::TransferShortfall)?;
        let collateral = custody
            .balance(Token::Collateral)
            .checked_sub(self.state.reserves.collateral)
            .ok_or(PoolError::TransferShortfall)?;
        Ok(Tokens { asset, collateral })
    }

    /// Fail unless custody received at least `needed` on top of the reserves
    fn require_incoming<C: TokenCustody>(&self, custody: &C, needed: Tokens) -> Result<()> {
        let surplus = self.surplus(custody)?;
        if surplus.asset < needed.asset || surplus.collateral < needed.collateral {
            return Err(PoolError::TransferShortfall);
        }
        Ok(())
    }

    fn require_outgoing<C: TokenCustody>(custody: &C, out: Tokens) -> Result<()> {
        if custody.balance(Token::Asset) < out.asset
            || custody.balance(Token::Collateral) < out.collateral
        {
            return Err(PoolError::InsufficientReserve);
        }
        Ok(())
    }

    fn send<C: TokenCustody>(custody: &mut C, to: &Owner, out: Tokens) -> Result<()> {
        if out.asset > 0 {
            custody.transfer_out(Token::Asset, to, out.asset)?;
        }
        if out.collateral > 0 {
            custody.transfer_out(Token::Collateral, to, out.collateral)?;
        }
        Ok(())
    }

    /// Existing snapshot, or the one the current state would produce
    fn settlement_view(&self) -> Result<Settlement> {
        if let Some(settlement) = self.settlement {
            return Ok(settlement);
        }
        Ok(Settlement {
            asset: self.state.reserves.asset,
            collateral: self.state.reserves.collateral,
            bond_total: self.state.total_claims.bond()?,
            insurance_total: self.state.total_claims.insurance()?,
            total_liquidity: self.state.total_liquidity,
        })
    }

    fn fee_claims(protocol_fee: u128) -> Claims {
        Claims { bond_interest: protocol_fee, ..Claims::ZERO }
    }
}

// ============================================================================
// Liquidity
// ============================================================================

impl<S: DueStorage> Pool<S> {
    /// Deposit asset (and collateral) as liquidity
    ///
    /// The first mint on an empty pool sets the opening rate and collateral
    /// factor from `debt_in` and `collateral_in`. Later mints add to every
    /// axis in proportion, leaving prices unchanged. Either way the provider
    /// receives liquidity plus a due for the interest its deposit underwrites.
    pub fn mint<C: TokenCustody>(
        &mut self,
        now: u64,
        custody: &mut C,
        params: MintParams,
    ) -> Result<MintOutcome> {
        let duration = self.duration(now)?;
        if params.asset_in == 0 || params.debt_in == 0 || params.collateral_in == 0 {
            return Err(PoolError::ZeroInput);
        }

        let quote = if self.state.total_liquidity == 0 {
            quote_mint_new(duration, params.asset_in, params.debt_in, params.collateral_in)?
        } else {
            quote_mint_add(self.state.axes, self.state.total_liquidity, duration, params.asset_in)?
        };

        if quote.debt > params.debt_in {
            return Err(PoolError::SlippageExceeded);
        }
        if quote.collateral > params.collateral_in {
            return Err(PoolError::CollateralExceeded);
        }
        if quote.liquidity_out == 0 || quote.liquidity_out < params.min_liquidity {
            return Err(PoolError::SlippageExceeded);
        }
        self.require_incoming(custody, Tokens::new(params.asset_in, quote.collateral))?;

        let next = self.state.preview(&StateDelta {
            axes: Some(quote.axes),
            asset: Adjust::up(params.asset_in),
            collateral: Adjust::up(quote.collateral),
            liquidity: Adjust::up(quote.liquidity_out),
            debt_created: quote.debt,
            ..StateDelta::default()
        })?;

        let due = Due {
            owner: params.due_to,
            debt: quote.debt,
            collateral: quote.collateral,
        };
        self.ledger.credit_liquidity(params.liquidity_to, quote.liquidity_out)?;
        let due_id = self.ledger.push_due(due);
        self.state = next;

        log::debug!(
            "mint: asset_in={} liquidity_out={} due={:?} debt={} collateral={}",
            params.asset_in,
            quote.liquidity_out,
            due_id,
            due.debt,
            due.collateral
        );
        Ok(MintOutcome { liquidity_out: quote.liquidity_out, due_id, due })
    }

    /// Redeem liquidity
    ///
    /// Before maturity the provider takes its share of `x` and every axis
    /// shrinks in proportion; burning the last liquidity of a pool with no
    /// claims or debt left also returns the repaid asset outside the curve.
    /// After settlement it takes its share of the asset surplus over bonds
    /// and of the collateral not owed to insurance.
    pub fn burn<C: TokenCustody>(
        &mut self,
        now: u64,
        custody: &mut C,
        owner: &Owner,
        liquidity_in: u128,
    ) -> Result<BurnOutcome> {
        if liquidity_in == 0 {
            return Err(PoolError::ZeroInput);
        }
        if self.ledger.liquidity_of(owner) < liquidity_in {
            return Err(PoolError::InsufficientBalance);
        }

        let (delta, out, settlement) = match self.phase(now) {
            Phase::Active => {
                let quote = quote_burn(self.state.axes, self.state.total_liquidity, liquidity_in)?;
                // The last provider out takes everything the pool holds; the
                // floor in `preview` refuses this while obligations remain.
                let out = if liquidity_in == self.state.total_liquidity {
                    self.state.reserves
                } else {
                    Tokens::new(quote.asset_out, 0)
                };
                let delta = StateDelta {
                    axes: Some(quote.axes),
                    asset: Adjust::down(out.asset),
                    collateral: Adjust::down(out.collateral),
                    liquidity: Adjust::down(liquidity_in),
                    ..StateDelta::default()
                };
                (delta, out, self.settlement)
            }
            Phase::Matured => {
                self.require_settleable(now)?;
                let settlement = self.settlement_view()?;
                let (asset_out, collateral_out) = settlement.liquidity_payout(liquidity_in)?;
                let delta = StateDelta {
                    asset: Adjust::down(asset_out),
                    collateral: Adjust::down(collateral_out),
                    liquidity: Adjust::down(liquidity_in),
                    ..StateDelta::default()
                };
                (delta, Tokens::new(asset_out, collateral_out), Some(settlement))
            }
        };

        let next = self.state.preview(&delta)?;
        Self::require_outgoing(custody, out)?;

        self.ledger.debit_liquidity(owner, liquidity_in)?;
        self.state = next;
        self.settlement = settlement;

        log::debug!(
            "burn: liquidity_in={} asset_out={} collateral_out={}",
            liquidity_in,
            out.asset,
            out.collateral
        );
        Self::send(custody, owner, out)?;
        Ok(BurnOutcome { asset_out: out.asset, collateral_out: out.collateral })
    }
}

// ============================================================================
// Lend / Borrow
// ============================================================================

impl<S: DueStorage> Pool<S> {
    /// Lend asset to the pool for bond and insurance claims
    ///
    /// With minimums the neutral point misses, the lender trades insurance
    /// interest for bond interest (or back) along the curve; see
    /// [`tenor_math::quote_lend_for`].
    pub fn lend<C: TokenCustody>(
        &mut self,
        now: u64,
        custody: &mut C,
        params: LendParams,
    ) -> Result<LendOutcome> {
        let duration = self.duration(now)?;
        if params.asset_in == 0 {
            return Err(PoolError::ZeroInput);
        }

        let target = LendTarget {
            min_bond_interest: params.min_bond_interest,
            min_insurance_interest: params.min_insurance_interest,
        };
        let quote = quote_lend_for(self.state.axes, &self.params.fees, duration, params.asset_in, target)?;
        self.require_incoming(custody, Tokens::new(params.asset_in, 0))?;

        let claims = Claims {
            bond_principal: quote.bond_principal,
            bond_interest: quote.bond_interest,
            insurance_principal: quote.insurance_principal,
            insurance_interest: quote.insurance_interest,
        };
        let fee_claims = Self::fee_claims(quote.protocol_fee_interest);
        let next = self.state.preview(&StateDelta {
            axes: Some(quote.axes),
            asset: Adjust::up(params.asset_in),
            claims_minted: claims.checked_add(&fee_claims)?,
            ..StateDelta::default()
        })?;
        let protocol_fees = self
            .protocol_fees
            .checked_add(quote.protocol_fee_interest)
            .ok_or(PoolError::RangeOverflow)?;

        self.ledger.credit_claims(params.to, &claims)?;
        self.ledger.credit_claims(self.params.fee_recipient, &fee_claims)?;
        self.protocol_fees = protocol_fees;
        self.state = next;

        log::debug!(
            "lend: asset_in={} bond_interest={} insurance_interest={} protocol_fee={}",
            params.asset_in,
            quote.bond_interest,
            quote.insurance_interest,
            quote.protocol_fee_interest
        );
        Ok(LendOutcome { claims, protocol_fee: quote.protocol_fee_interest })
    }

    /// Borrow asset against collateral
    pub fn borrow<C: TokenCustody>(
        &mut self,
        now: u64,
        custody: &mut C,
        params: BorrowParams,
    ) -> Result<BorrowOutcome> {
        let duration = self.duration(now)?;
        if params.asset_out == 0 || params.max_collateral_in == 0 {
            return Err(PoolError::ZeroInput);
        }
        if params.asset_out > self.state.reserves.asset {
            return Err(PoolError::InsufficientReserve);
        }

        let quote = quote_borrow(self.state.axes, &self.params.fees, duration, params.asset_out)?;
        if quote.collateral > params.max_collateral_in {
            return Err(PoolError::CollateralExceeded);
        }
        self.require_incoming(custody, Tokens::new(0, quote.collateral))?;

        let fee_claims = Self::fee_claims(quote.protocol_fee_interest);
        let next = self.state.preview(&StateDelta {
            axes: Some(quote.axes),
            asset: Adjust::down(params.asset_out),
            collateral: Adjust::up(quote.collateral),
            claims_minted: fee_claims,
            debt_created: quote.debt,
            ..StateDelta::default()
        })?;
        let protocol_fees = self
            .protocol_fees
            .checked_add(quote.protocol_fee_interest)
            .ok_or(PoolError::RangeOverflow)?;
        let out = Tokens::new(params.asset_out, 0);
        Self::require_outgoing(custody, out)?;

        let due = Due {
            owner: params.due_to,
            debt: quote.debt,
            collateral: quote.collateral,
        };
        self.ledger.credit_claims(self.params.fee_recipient, &fee_claims)?;
        let due_id = self.ledger.push_due(due);
        self.protocol_fees = protocol_fees;
        self.state = next;

        log::debug!(
            "borrow: asset_out={} due={:?} debt={} collateral={}",
            params.asset_out,
            due_id,
            due.debt,
            due.collateral
        );
        Self::send(custody, &params.asset_to, out)?;
        Ok(BorrowOutcome { due_id, due, protocol_fee: quote.protocol_fee_interest })
    }
}

// ============================================================================
// Repayment & Settlement
// ============================================================================

impl<S: DueStorage> Pool<S> {
    /// Repay a batch of dues owned by `payer`
    ///
    /// Each repayment releases collateral in proportion to the debt it
    /// clears. The batch is all-or-nothing; the same id may appear twice.
    pub fn pay<C: TokenCustody>(
        &mut self,
        now: u64,
        custody: &mut C,
        payer: &Owner,
        ids: &[DueId],
        amounts: &[u128],
    ) -> Result<PayOutcome> {
        if ids.len() != amounts.len() {
            return Err(PoolError::LengthMismatch);
        }
        if ids.is_empty() {
            return Err(PoolError::ZeroInput);
        }
        if now >= self.params.settle_at() || self.settlement.is_some() {
            return Err(PoolError::AlreadySettled);
        }

        let mut updated: Vec<(DueId, Due)> = Vec::with_capacity(ids.len());
        let mut asset_in = 0u128;
        let mut collateral_out = 0u128;

        for (&id, &amount) in ids.iter().zip(amounts) {
            let slot = updated.iter().position(|(seen, _)| *seen == id);
            let mut due = match slot {
                Some(i) => updated[i].1,
                None => *self.ledger.due(id).ok_or(PoolError::DebtNotFound)?,
            };
            if due.owner != *payer {
                return Err(PoolError::Unauthorized);
            }
            if amount == 0 {
                return Err(PoolError::ZeroInput);
            }
            if amount > due.debt {
                return Err(PoolError::OverRepay);
            }

            let released = repay_release(due.debt, due.collateral, amount)?;
            due.debt -= amount;
            due.collateral -= released;

            asset_in = asset_in.checked_add(amount).ok_or(PoolError::RangeOverflow)?;
            collateral_out = collateral_out
                .checked_add(released)
                .ok_or(PoolError::RangeOverflow)?;
            match slot {
                Some(i) => updated[i].1 = due,
                None => updated.push((id, due)),
            }
        }

        self.require_incoming(custody, Tokens::new(asset_in, 0))?;
        let next = self.state.preview(&StateDelta {
            asset: Adjust::up(asset_in),
            collateral: Adjust::down(collateral_out),
            debt_repaid: asset_in,
            ..StateDelta::default()
        })?;
        let out = Tokens::new(0, collateral_out);
        Self::require_outgoing(custody, out)?;

        for (id, due) in updated {
            if let Some(slot) = self.ledger.due_mut(id) {
                *slot = due;
            }
        }
        self.state = next;

        log::debug!("pay: dues={} asset_in={} collateral_out={}", ids.len(), asset_in, collateral_out);
        Self::send(custody, payer, out)?;
        Ok(PayOutcome { asset_in, collateral_out })
    }

    /// Freeze the books once maturity and the grace period have passed
    ///
    /// Idempotent; the first call (explicit, or implied by `withdraw` or a
    /// post-maturity `burn`) fixes the snapshot for good.
    pub fn settle(&mut self, now: u64) -> Result<Settlement> {
        self.require_settleable(now)?;
        let settlement = self.settlement_view()?;
        if self.settlement.is_none() {
            log::debug!(
                "settle: asset={} collateral={} bonds={} insurance={} default={}",
                settlement.asset,
                settlement.collateral,
                settlement.bond_total,
                settlement.insurance_total,
                settlement.is_default()
            );
            self.settlement = Some(settlement);
        }
        Ok(settlement)
    }

    /// Redeem claims for asset and, under default, collateral
    pub fn withdraw<C: TokenCustody>(
        &mut self,
        now: u64,
        custody: &mut C,
        owner: &Owner,
        claims_in: Claims,
    ) -> Result<WithdrawOutcome> {
        self.require_settleable(now)?;
        if claims_in.is_zero() {
            return Err(PoolError::ZeroInput);
        }
        if !self.ledger.claims_of(owner).covers(&claims_in) {
            return Err(PoolError::InsufficientBalance);
        }

        let settlement = self.settlement_view()?;
        let (asset_out, collateral_out) =
            settlement.claim_payout(claims_in.bond()?, claims_in.insurance()?)?;

        let next = self.state.preview(&StateDelta {
            asset: Adjust::down(asset_out),
            collateral: Adjust::down(collateral_out),
            claims_burned: claims_in,
            ..StateDelta::default()
        })?;
        let out = Tokens::new(asset_out, collateral_out);
        Self::require_outgoing(custody, out)?;

        self.ledger.debit_claims(owner, &claims_in)?;
        self.state = next;
        self.settlement = Some(settlement);

        log::debug!("withdraw: asset_out={} collateral_out={}", asset_out, collateral_out);
        Self::send(custody, owner, out)?;
        Ok(WithdrawOutcome { asset_out, collateral_out })
    }

    /// Send custody holdings above the accounted reserves to `to`
    pub fn skim<C: TokenCustody>(&self, custody: &mut C, to: &Owner) -> Result<Tokens> {
        let surplus = self.surplus(custody)?;
        Self::send(custody, to, surplus)?;
        if !surplus.is_zero() {
            log::debug!("skim: asset={} collateral={}", surplus.asset, surplus.collateral);
        }
        Ok(surplus)
    }
}
