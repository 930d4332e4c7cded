//! Offline quotes against a given curve position

use anyhow::{anyhow, Result};
use colored::Colorize;
use serde::Serialize;
use tenor::math::{quote_borrow, quote_lend_for, Axes, FeeSchedule, LendTarget};

/// Curve position and fee schedule to price against
#[derive(Debug, Clone, Copy)]
pub struct Market {
    pub axes: Axes,
    pub duration: u64,
    pub fees: FeeSchedule,
}

impl Market {
    pub fn new(x: u128, y: u128, z: u128, duration: u64, fee_bps: u16, protocol_fee_bps: u16) -> Result<Self> {
        let fees = FeeSchedule::new(fee_bps, protocol_fee_bps)
            .map_err(|e| anyhow!("invalid fee schedule: {:?}", e))?;
        Ok(Self { axes: Axes::new(x, y, z), duration, fees })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LendView {
    pub asset_in: u128,
    pub bond_principal: u128,
    pub bond_interest: u128,
    pub insurance_principal: u128,
    pub insurance_interest: u128,
    pub protocol_fee: u128,
    pub x: u128,
    pub y: u128,
    pub z: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BorrowView {
    pub asset_out: u128,
    pub debt: u128,
    pub collateral: u128,
    pub protocol_fee: u128,
    pub x: u128,
    pub y: u128,
    pub z: u128,
}

pub fn lend(market: &Market, asset_in: u128, target: LendTarget) -> Result<LendView> {
    let q = quote_lend_for(market.axes, &market.fees, market.duration, asset_in, target)
        .map_err(|e| anyhow!("lend rejected: {:?}", e))?;
    Ok(LendView {
        asset_in,
        bond_principal: q.bond_principal,
        bond_interest: q.bond_interest,
        insurance_principal: q.insurance_principal,
        insurance_interest: q.insurance_interest,
        protocol_fee: q.protocol_fee_interest,
        x: q.axes.x,
        y: q.axes.y,
        z: q.axes.z,
    })
}

pub fn borrow(market: &Market, asset_out: u128) -> Result<BorrowView> {
    let q = quote_borrow(market.axes, &market.fees, market.duration, asset_out)
        .map_err(|e| anyhow!("borrow rejected: {:?}", e))?;
    Ok(BorrowView {
        asset_out,
        debt: q.debt,
        collateral: q.collateral,
        protocol_fee: q.protocol_fee_interest,
        x: q.axes.x,
        y: q.axes.y,
        z: q.axes.z,
    })
}

pub fn print_lend(view: &LendView) {
    println!("{}", "=== Lend Quote ===".bright_green().bold());
    println!("{} {}", "Asset in:".bright_cyan(), view.asset_in);
    println!(
        "{} {} + {} interest",
        "Bond:".bright_cyan(),
        view.bond_principal,
        view.bond_interest
    );
    println!(
        "{} {} + {} interest",
        "Insurance:".bright_cyan(),
        view.insurance_principal,
        view.insurance_interest
    );
    println!("{} {}", "Protocol fee:".bright_cyan(), view.protocol_fee);
    println!("{} x={} y={} z={}", "Axes after:".bright_cyan(), view.x, view.y, view.z);
}

pub fn print_borrow(view: &BorrowView) {
    println!("{}", "=== Borrow Quote ===".bright_green().bold());
    println!("{} {}", "Asset out:".bright_cyan(), view.asset_out);
    println!("{} {}", "Debt at maturity:".bright_cyan(), view.debt);
    println!("{} {}", "Collateral locked:".bright_cyan(), view.collateral);
    println!("{} {}", "Protocol fee:".bright_cyan(), view.protocol_fee);
    println!("{} x={} y={} z={}", "Axes after:".bright_cyan(), view.x, view.y, view.z);
}
