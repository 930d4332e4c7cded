//! Token custody
//!
//! The pool never trusts a caller-stated incoming amount: it measures what
//! custody actually holds against its own accounted reserves.

use alloc::vec::Vec;

use tenor_math::BPS_SCALE;

use crate::reserve::Tokens;
use crate::{Owner, PoolError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Token {
    Asset,
    Collateral,
}

/// Holder of a pool's asset and collateral tokens
///
/// `transfer_out` must succeed whenever `balance(token) >= amount`; the pool
/// checks that before committing and only calls out after its state is final.
pub trait TokenCustody {
    /// Amount of `token` actually held
    fn balance(&self, token: Token) -> u128;

    /// Send `amount` of `token` to `to`
    fn transfer_out(&mut self, token: Token, to: &Owner, amount: u128) -> Result<()>;
}

/// Record of one outgoing transfer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transfer {
    pub token: Token,
    pub to: Owner,
    pub amount: u128,
}

/// Custody held in memory
///
/// `transfer_fee_bps` simulates fee-on-transfer tokens: a deposit of `n`
/// only credits `n - floor(n * fee / 10_000)`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InMemoryCustody {
    held: Tokens,
    pub transfer_fee_bps: u16,
    /// Outgoing transfers in call order
    pub sent: Vec<Transfer>,
}

impl InMemoryCustody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transfer_fee(transfer_fee_bps: u16) -> Self {
        Self { transfer_fee_bps, ..Self::default() }
    }

    /// Incoming transfer; returns the amount actually received
    pub fn deposit(&mut self, token: Token, amount: u128) -> Result<u128> {
        let fee = amount
            .checked_mul(self.transfer_fee_bps as u128)
            .ok_or(PoolError::RangeOverflow)?
            / BPS_SCALE;
        let received = amount - fee;
        let slot = self.slot_mut(token);
        *slot = slot.checked_add(received).ok_or(PoolError::RangeOverflow)?;
        Ok(received)
    }

    /// Total sent to `to` in `token`
    pub fn sent_to(&self, to: &Owner, token: Token) -> u128 {
        self.sent
            .iter()
            .filter(|t| t.to == *to && t.token == token)
            .map(|t| t.amount)
            .sum()
    }

    fn slot_mut(&mut self, token: Token) -> &mut u128 {
        match token {
            Token::Asset => &mut self.held.asset,
            Token::Collateral => &mut self.held.collateral,
        }
    }
}

impl TokenCustody for InMemoryCustody {
    fn balance(&self, token: Token) -> u128 {
        match token {
            Token::Asset => self.held.asset,
            Token::Collateral => self.held.collateral,
        }
    }

    fn transfer_out(&mut self, token: Token, to: &Owner, amount: u128) -> Result<()> {
        let slot = self.slot_mut(token);
        *slot = slot.checked_sub(amount).ok_or(PoolError::InsufficientReserve)?;
        self.sent.push(Transfer { token, to: *to, amount });
        Ok(())
    }
}
