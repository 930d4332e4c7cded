//! Fixed-Maturity Lending Pool Engine
//!
//! This crate implements the state machine of a fixed-maturity lending pool:
//! a three-axis constant product (x·y·z) prices fixed-rate lending and
//! borrowing against one pooled asset reserve, lenders hold fungible bond and
//! insurance claims, borrowers hold individual collateralized dues, and
//! everything settles at a fixed maturity timestamp.
//!
//! Guarantees:
//! 1. x·y·z never decreases across lend/borrow
//! 2. Every failed call leaves the pool byte-identical to its pre-call state
//! 3. Liquidity shares always sum to the pool's total liquidity
//! 4. Post-maturity payouts never exceed the settled reserves, even under
//!    partial default
//! 5. All outgoing transfers happen after the pool state is committed
//!
//! Pools own their state and are mutated through `&mut` only; there is no
//! global state and no interior mutability.

#![no_std]
#![forbid(unsafe_code)]

#[cfg(kani)]
extern crate kani;

extern crate alloc;

pub mod custody;
pub mod ledger;
pub mod pool;
pub mod registry;
pub mod reserve;

pub use custody::{InMemoryCustody, Token, TokenCustody, Transfer};
pub use ledger::{Claims, ClaimsLedger, Due, DueId, DueStorage};
pub use pool::{
    BorrowOutcome, BorrowParams, BurnOutcome, LendOutcome, LendParams, MintOutcome, MintParams,
    PayOutcome, Phase, Pool, PoolParams, VecPool, WithdrawOutcome,
};
pub use registry::{PoolKey, PoolRegistry, RegistryParams, TokenId};
pub use reserve::{Adjust, ReserveState, StateDelta, Tokens};

pub use tenor_math as math;
pub use tenor_math::{Axes, CurveError, FeeSchedule, Settlement};

/// Identity of an account holding liquidity, claims or dues
pub type Owner = [u8; 32];

// ============================================================================
// Error Types
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PoolError {
    /// A required amount was zero
    ZeroInput,

    /// Operation needs an active pool but maturity has passed
    Expired,

    /// Operation needs a settled pool but maturity (plus grace) has not passed
    NotYetMatured,

    /// Transition would lower x·y·z
    InvariantViolation,

    /// A value left the representable range
    RangeOverflow,

    /// Realized amount worse than the caller's limit
    SlippageExceeded,

    /// Required collateral above the caller's limit
    CollateralExceeded,

    /// Not enough reserve, or an axis would be drained while obligations remain
    InsufficientReserve,

    /// Repayment larger than the outstanding debt
    OverRepay,

    /// Unknown due id
    DebtNotFound,

    /// Repayment window has closed
    AlreadySettled,

    /// Owner holds less liquidity or claims than requested
    InsufficientBalance,

    /// Caller does not own the due
    Unauthorized,

    /// Batch slices differ in length
    LengthMismatch,

    /// Custody received less than the stated amount
    TransferShortfall,

    /// Invalid pool or registry parameters
    InvalidParams,

    /// A pool with this key already exists
    PoolExists,

    /// No pool with this key
    PoolNotFound,
}

impl From<CurveError> for PoolError {
    fn from(err: CurveError) -> Self {
        match err {
            CurveError::ZeroInput => PoolError::ZeroInput,
            CurveError::InvariantViolation => PoolError::InvariantViolation,
            CurveError::RangeOverflow => PoolError::RangeOverflow,
            CurveError::InsufficientReserve => PoolError::InsufficientReserve,
            CurveError::InvalidFee => PoolError::InvalidParams,
            CurveError::Slippage => PoolError::SlippageExceeded,
        }
    }
}

impl core::fmt::Display for PoolError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            PoolError::ZeroInput => "amount must be non-zero",
            PoolError::Expired => "pool has matured",
            PoolError::NotYetMatured => "pool has not matured",
            PoolError::InvariantViolation => "constant product would decrease",
            PoolError::RangeOverflow => "value out of range",
            PoolError::SlippageExceeded => "slippage limit exceeded",
            PoolError::CollateralExceeded => "collateral limit exceeded",
            PoolError::InsufficientReserve => "insufficient reserve",
            PoolError::OverRepay => "repayment exceeds debt",
            PoolError::DebtNotFound => "debt not found",
            PoolError::AlreadySettled => "repayment window closed",
            PoolError::InsufficientBalance => "insufficient balance",
            PoolError::Unauthorized => "caller does not own the debt",
            PoolError::LengthMismatch => "ids and amounts differ in length",
            PoolError::TransferShortfall => "custody received less than stated",
            PoolError::InvalidParams => "invalid parameters",
            PoolError::PoolExists => "pool already exists",
            PoolError::PoolNotFound => "pool not found",
        };
        f.write_str(msg)
    }
}

pub type Result<T> = core::result::Result<T, PoolError>;
