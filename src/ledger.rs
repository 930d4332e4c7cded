//! Claims and dues
//!
//! Lenders hold fungible [`Claims`] that merge by addition; borrowers (and
//! liquidity providers) hold individual [`Due`] records that are never merged.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::{Owner, PoolError, Result};

// ============================================================================
// Claims
// ============================================================================

/// Bond and insurance claims held by one owner (or by the whole pool)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Claims {
    pub bond_principal: u128,
    pub bond_interest: u128,
    pub insurance_principal: u128,
    pub insurance_interest: u128,
}

impl Claims {
    pub const ZERO: Claims = Claims {
        bond_principal: 0,
        bond_interest: 0,
        insurance_principal: 0,
        insurance_interest: 0,
    };

    /// Total bond (principal + interest)
    pub fn bond(&self) -> Result<u128> {
        self.bond_principal
            .checked_add(self.bond_interest)
            .ok_or(PoolError::RangeOverflow)
    }

    /// Total insurance (principal + interest)
    pub fn insurance(&self) -> Result<u128> {
        self.insurance_principal
            .checked_add(self.insurance_interest)
            .ok_or(PoolError::RangeOverflow)
    }

    pub fn is_zero(&self) -> bool {
        *self == Claims::ZERO
    }

    /// True when every field of `self` is at least the matching field of `other`
    pub fn covers(&self, other: &Claims) -> bool {
        self.bond_principal >= other.bond_principal
            && self.bond_interest >= other.bond_interest
            && self.insurance_principal >= other.insurance_principal
            && self.insurance_interest >= other.insurance_interest
    }

    pub fn checked_add(&self, other: &Claims) -> Result<Claims> {
        Ok(Claims {
            bond_principal: self
                .bond_principal
                .checked_add(other.bond_principal)
                .ok_or(PoolError::RangeOverflow)?,
            bond_interest: self
                .bond_interest
                .checked_add(other.bond_interest)
                .ok_or(PoolError::RangeOverflow)?,
            insurance_principal: self
                .insurance_principal
                .checked_add(other.insurance_principal)
                .ok_or(PoolError::RangeOverflow)?,
            insurance_interest: self
                .insurance_interest
                .checked_add(other.insurance_interest)
                .ok_or(PoolError::RangeOverflow)?,
        })
    }

    /// Field-wise subtraction; any field going negative is `InsufficientBalance`
    pub fn checked_sub(&self, other: &Claims) -> Result<Claims> {
        if !self.covers(other) {
            return Err(PoolError::InsufficientBalance);
        }
        Ok(Claims {
            bond_principal: self.bond_principal - other.bond_principal,
            bond_interest: self.bond_interest - other.bond_interest,
            insurance_principal: self.insurance_principal - other.insurance_principal,
            insurance_interest: self.insurance_interest - other.insurance_interest,
        })
    }
}

// ============================================================================
// Dues
// ============================================================================

/// Arena index of a due
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DueId(pub u64);

/// A collateralized debt; one record per borrow (or mint), never merged
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Due {
    pub owner: Owner,
    /// Asset still owed
    pub debt: u128,
    /// Collateral still locked
    pub collateral: u128,
}

impl Due {
    pub fn is_cleared(&self) -> bool {
        self.debt == 0
    }
}

/// Trait for pluggable due storage
///
/// Records are append-only: ids are arena indices and stay valid for the
/// life of the pool, even after the debt is repaid.
pub trait DueStorage {
    /// Get a due by index (immutable)
    fn get(&self, index: usize) -> Option<&Due>;

    /// Get a due by index (mutable)
    fn get_mut(&mut self, index: usize) -> Option<&mut Due>;

    /// Get the number of dues
    fn len(&self) -> usize;

    /// Add a new due, returns its index
    fn push(&mut self, due: Due) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DueStorage for Vec<Due> {
    fn get(&self, index: usize) -> Option<&Due> {
        <[Due]>::get(self, index)
    }

    fn get_mut(&mut self, index: usize) -> Option<&mut Due> {
        <[Due]>::get_mut(self, index)
    }

    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn push(&mut self, due: Due) -> usize {
        let index = Vec::len(self);
        Vec::push(self, due);
        index
    }
}

// ============================================================================
// Ledger
// ============================================================================

/// Per-owner liquidity and claims plus the due arena of one pool
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClaimsLedger<S: DueStorage = Vec<Due>> {
    liquidity: BTreeMap<Owner, u128>,
    claims: BTreeMap<Owner, Claims>,
    dues: S,
}

impl<S: DueStorage> ClaimsLedger<S> {
    pub fn with_storage(dues: S) -> Self {
        Self {
            liquidity: BTreeMap::new(),
            claims: BTreeMap::new(),
            dues,
        }
    }

    // ========================================
    // Liquidity
    // ========================================

    pub fn liquidity_of(&self, owner: &Owner) -> u128 {
        self.liquidity.get(owner).copied().unwrap_or(0)
    }

    /// Sum of every owner's shares
    pub fn liquidity_sum(&self) -> u128 {
        self.liquidity.values().fold(0u128, |acc, v| acc.saturating_add(*v))
    }

    pub fn credit_liquidity(&mut self, owner: Owner, amount: u128) -> Result<()> {
        let balance = self
            .liquidity_of(&owner)
            .checked_add(amount)
            .ok_or(PoolError::RangeOverflow)?;
        self.liquidity.insert(owner, balance);
        Ok(())
    }

    pub fn debit_liquidity(&mut self, owner: &Owner, amount: u128) -> Result<()> {
        let balance = self
            .liquidity_of(owner)
            .checked_sub(amount)
            .ok_or(PoolError::InsufficientBalance)?;
        if balance == 0 {
            self.liquidity.remove(owner);
        } else {
            self.liquidity.insert(*owner, balance);
        }
        Ok(())
    }

    // ========================================
    // Claims
    // ========================================

    pub fn claims_of(&self, owner: &Owner) -> Claims {
        self.claims.get(owner).copied().unwrap_or_default()
    }

    pub fn credit_claims(&mut self, owner: Owner, amount: &Claims) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }
        let balance = self.claims_of(&owner).checked_add(amount)?;
        self.claims.insert(owner, balance);
        Ok(())
    }

    pub fn debit_claims(&mut self, owner: &Owner, amount: &Claims) -> Result<()> {
        let balance = self.claims_of(owner).checked_sub(amount)?;
        if balance.is_zero() {
            self.claims.remove(owner);
        } else {
            self.claims.insert(*owner, balance);
        }
        Ok(())
    }

    /// Field-wise sum of every owner's claims
    pub fn claims_sum(&self) -> Result<Claims> {
        self.claims
            .values()
            .try_fold(Claims::ZERO, |acc, c| acc.checked_add(c))
    }

    // ========================================
    // Dues
    // ========================================

    pub fn due(&self, id: DueId) -> Option<&Due> {
        usize::try_from(id.0).ok().and_then(|i| self.dues.get(i))
    }

    pub fn due_mut(&mut self, id: DueId) -> Option<&mut Due> {
        usize::try_from(id.0).ok().and_then(move |i| self.dues.get_mut(i))
    }

    pub fn push_due(&mut self, due: Due) -> DueId {
        DueId(self.dues.push(due) as u64)
    }

    /// Id the next `push_due` will return
    pub fn next_due_id(&self) -> DueId {
        DueId(self.dues.len() as u64)
    }

    pub fn due_count(&self) -> usize {
        self.dues.len()
    }

    /// Outstanding debt summed over every due
    pub fn debt_sum(&self) -> u128 {
        (0..self.dues.len())
            .filter_map(|i| self.dues.get(i))
            .fold(0u128, |acc, d| acc.saturating_add(d.debt))
    }

    /// Locked collateral summed over every due
    pub fn collateral_sum(&self) -> u128 {
        (0..self.dues.len())
            .filter_map(|i| self.dues.get(i))
            .fold(0u128, |acc, d| acc.saturating_add(d.collateral))
    }
}

impl ClaimsLedger<Vec<Due>> {
    pub fn new() -> Self {
        Self::with_storage(Vec::new())
    }
}
