//! Tenor Math - Pure three-axis constant product math (x·y·z=k)
//!
//! This crate contains the curve, fee and settlement formulas used by the
//! fixed-maturity pool engine. Everything here is a total function over
//! unsigned integers: no floats, no panics on user input, no state.
//!
//! Rounding convention: values the pool pays or credits round down, values
//! the pool receives, retains or requires round up.

#![no_std]

pub mod wide;
pub mod fee;
pub mod curve;
pub mod settle;

pub use curve::{
    check_product, quote_borrow, quote_burn, quote_lend, quote_lend_for, quote_mint_add,
    quote_mint_new, Axes, BorrowQuote, BurnQuote, LendQuote, LendTarget, MintQuote,
};
pub use fee::{FeeSchedule, FeeSplit};
pub use settle::{repay_release, Settlement};
pub use wide::U512;

/// Basis points scale (10,000 bps = 100%)
pub const BPS_SCALE: u128 = 10_000;

/// Largest value any invariant axis may hold (2^112 - 1)
pub const MAX_RESERVE: u128 = (1u128 << 112) - 1;

/// Bond interest = y_delta * duration >> INTEREST_SHIFT
pub const INTEREST_SHIFT: u32 = 32;

/// Insurance interest = z_delta * duration >> INSURANCE_SHIFT
pub const INSURANCE_SHIFT: u32 = 25;

/// Liquidity minted on a fresh pool = asset_in << LIQUIDITY_SHIFT
pub const LIQUIDITY_SHIFT: u32 = 16;

/// Error types for curve operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveError {
    /// An amount that must be positive was zero
    ZeroInput,
    /// The proposed axes would lower x·y·z
    InvariantViolation,
    /// A value left the representable range
    RangeOverflow,
    /// Not enough reserve on the curve for the requested trade
    InsufficientReserve,
    /// Fee schedule does not leave anything for the caller
    InvalidFee,
    /// No point on the curve meets the caller's minimums
    Slippage,
}

pub type Result<T> = core::result::Result<T, CurveError>;
