//! Scenario runner
//!
//! Replays a scenario file against one pool held in an in-memory registry.
//! Before each action the actor's tokens are deposited into custody (the
//! declared maximum where the pool quotes the exact amount itself); after
//! it, any surplus the pool did not account for is skimmed back to the
//! actor. Rejected actions are recorded, not fatal.

use colored::Colorize;
use serde::Serialize;
use std::collections::BTreeMap;
use tenor::{
    BorrowParams, DueId, InMemoryCustody, LendParams, MintParams, Owner, PoolError, PoolKey,
    PoolRegistry, Token, Transfer, VecPool,
};

use crate::config::{display_id, parse_id, ActionConfig, ScenarioConfig, ScenarioError};

// ============================================================================
// Report
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Minted {
        liquidity_out: u128,
        due: u64,
        debt: u128,
        collateral: u128,
    },
    Lent {
        bond_principal: u128,
        bond_interest: u128,
        insurance_principal: u128,
        insurance_interest: u128,
        protocol_fee: u128,
    },
    Borrowed {
        due: u64,
        debt: u128,
        collateral: u128,
        protocol_fee: u128,
    },
    Burned {
        asset_out: u128,
        collateral_out: u128,
    },
    Paid {
        asset_in: u128,
        collateral_out: u128,
    },
    Withdrew {
        asset_out: u128,
        collateral_out: u128,
    },
    Settled {
        asset: u128,
        collateral: u128,
        bond_total: u128,
        insurance_total: u128,
        default: bool,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Amounts {
    pub asset: u128,
    pub collateral: u128,
}

impl Amounts {
    fn add(&mut self, transfer: &Transfer) {
        match transfer.token {
            Token::Asset => self.asset = self.asset.saturating_add(transfer.amount),
            Token::Collateral => self.collateral = self.collateral.saturating_add(transfer.amount),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.asset == 0 && self.collateral == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub step: usize,
    pub at: u64,
    pub action: &'static str,
    pub actor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected: Option<String>,
    /// Tokens the pool paid out to the actor
    pub received: Amounts,
    /// Deposited tokens the pool did not take
    pub refunded: Amounts,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolSummary {
    pub x: u128,
    pub y: u128,
    pub z: u128,
    pub reserve_asset: u128,
    pub reserve_collateral: u128,
    pub total_liquidity: u128,
    pub total_debt_created: u128,
    pub debt_outstanding: u128,
    pub protocol_fees: u128,
    pub settled: bool,
}

impl PoolSummary {
    fn of(pool: &VecPool) -> Self {
        let state = pool.state();
        Self {
            x: state.axes.x,
            y: state.axes.y,
            z: state.axes.z,
            reserve_asset: state.reserves.asset,
            reserve_collateral: state.reserves.collateral,
            total_liquidity: state.total_liquidity,
            total_debt_created: state.total_debt_created,
            debt_outstanding: state.debt_outstanding,
            protocol_fees: pool.protocol_fees(),
            settled: pool.settlement().is_some(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub asset: String,
    pub collateral: String,
    pub maturity: u64,
    pub settle_at: u64,
    pub steps: Vec<StepReport>,
    pub accepted: usize,
    pub rejected: usize,
    pub pool: PoolSummary,
    /// Pool payouts per account over the whole run, refunds excluded
    pub received: BTreeMap<String, Amounts>,
}

// ============================================================================
// Runner
// ============================================================================

pub struct Runner {
    registry: PoolRegistry,
    key: PoolKey,
    custody: InMemoryCustody,
    now: u64,
}

impl Runner {
    pub fn new(config: &ScenarioConfig) -> Result<Self, ScenarioError> {
        let mut registry = PoolRegistry::new(config.registry_params()?)
            .map_err(|e| ScenarioError::Pool(e.to_string()))?;
        let key = config.pool_key()?;
        let now = config.pool.created_at.resolve()?;
        registry
            .create_pool(now, key)
            .map_err(|e| ScenarioError::Pool(e.to_string()))?;

        Ok(Self {
            registry,
            key,
            custody: InMemoryCustody::with_transfer_fee(config.pool.transfer_fee_bps),
            now,
        })
    }

    pub fn pool(&self) -> Result<&VecPool, ScenarioError> {
        self.registry
            .pool(&self.key)
            .map_err(|e| ScenarioError::Pool(e.to_string()))
    }

    /// Run one action; pool rejections come back in the step report
    pub fn step(&mut self, step: usize, action: &ActionConfig) -> Result<StepReport, ScenarioError> {
        let at = action.at().resolve()?;
        if at < self.now {
            return Err(ScenarioError::ClockWentBackwards { step, at, previous: self.now });
        }
        self.now = at;

        let actor = match action {
            ActionConfig::Settle { .. } => None,
            ActionConfig::Mint { owner, .. }
            | ActionConfig::Lend { owner, .. }
            | ActionConfig::Borrow { owner, .. }
            | ActionConfig::Burn { owner, .. }
            | ActionConfig::Pay { owner, .. }
            | ActionConfig::Withdraw { owner, .. } => Some(parse_id(owner)?),
        };

        let sent_before = self.custody.sent.len();
        let result = self.execute(actor.as_ref(), action);
        let sent_after = self.custody.sent.len();

        let mut received = Amounts::default();
        for transfer in &self.custody.sent[sent_before..sent_after] {
            received.add(transfer);
        }

        let mut refunded = Amounts::default();
        if let Some(owner) = actor.as_ref() {
            let pool = self
                .registry
                .pool(&self.key)
                .map_err(|e| ScenarioError::Pool(e.to_string()))?;
            let skimmed = pool
                .skim(&mut self.custody, owner)
                .map_err(|e| ScenarioError::Pool(e.to_string()))?;
            refunded.asset = skimmed.asset;
            refunded.collateral = skimmed.collateral;
        }

        let (outcome, rejected) = match result {
            Ok(outcome) => (Some(outcome), None),
            Err(e) => {
                log::info!("step {} ({}) rejected: {}", step, action.name(), e);
                (None, Some(e.to_string()))
            }
        };

        Ok(StepReport {
            step,
            at,
            action: action.name(),
            actor: actor.as_ref().map(display_id),
            outcome,
            rejected,
            received,
            refunded,
        })
    }

    fn execute(&mut self, actor: Option<&Owner>, action: &ActionConfig) -> Result<Outcome, PoolError> {
        let now = self.now;
        let custody = &mut self.custody;
        let pool = self.registry.pool_mut(&self.key)?;

        match (action, actor) {
            (
                ActionConfig::Mint { asset_in, debt_in, collateral_in, min_liquidity, .. },
                Some(owner),
            ) => {
                custody.deposit(Token::Asset, *asset_in)?;
                custody.deposit(Token::Collateral, *collateral_in)?;
                let out = pool.mint(
                    now,
                    custody,
                    MintParams {
                        liquidity_to: *owner,
                        due_to: *owner,
                        asset_in: *asset_in,
                        debt_in: *debt_in,
                        collateral_in: *collateral_in,
                        min_liquidity: *min_liquidity,
                    },
                )?;
                Ok(Outcome::Minted {
                    liquidity_out: out.liquidity_out,
                    due: out.due_id.0,
                    debt: out.due.debt,
                    collateral: out.due.collateral,
                })
            }
            (
                ActionConfig::Lend { asset_in, min_bond_interest, min_insurance_interest, .. },
                Some(owner),
            ) => {
                custody.deposit(Token::Asset, *asset_in)?;
                let out = pool.lend(
                    now,
                    custody,
                    LendParams {
                        to: *owner,
                        asset_in: *asset_in,
                        min_bond_interest: *min_bond_interest,
                        min_insurance_interest: *min_insurance_interest,
                    },
                )?;
                Ok(Outcome::Lent {
                    bond_principal: out.claims.bond_principal,
                    bond_interest: out.claims.bond_interest,
                    insurance_principal: out.claims.insurance_principal,
                    insurance_interest: out.claims.insurance_interest,
                    protocol_fee: out.protocol_fee,
                })
            }
            (ActionConfig::Borrow { asset_out, max_collateral_in, .. }, Some(owner)) => {
                custody.deposit(Token::Collateral, *max_collateral_in)?;
                let out = pool.borrow(
                    now,
                    custody,
                    BorrowParams {
                        due_to: *owner,
                        asset_to: *owner,
                        asset_out: *asset_out,
                        max_collateral_in: *max_collateral_in,
                    },
                )?;
                Ok(Outcome::Borrowed {
                    due: out.due_id.0,
                    debt: out.due.debt,
                    collateral: out.due.collateral,
                    protocol_fee: out.protocol_fee,
                })
            }
            (ActionConfig::Burn { liquidity_in, .. }, Some(owner)) => {
                let liquidity_in = liquidity_in.unwrap_or_else(|| pool.liquidity_of(owner));
                let out = pool.burn(now, custody, owner, liquidity_in)?;
                Ok(Outcome::Burned {
                    asset_out: out.asset_out,
                    collateral_out: out.collateral_out,
                })
            }
            (ActionConfig::Pay { due, amount, .. }, Some(owner)) => {
                let id = DueId(*due);
                let amount = match amount {
                    Some(amount) => *amount,
                    None => pool.due(id).map(|d| d.debt).unwrap_or(0),
                };
                custody.deposit(Token::Asset, amount)?;
                let out = pool.pay(now, custody, owner, &[id], &[amount])?;
                Ok(Outcome::Paid {
                    asset_in: out.asset_in,
                    collateral_out: out.collateral_out,
                })
            }
            (ActionConfig::Withdraw { .. }, Some(owner)) => {
                let claims = pool.claims_of(owner);
                let out = pool.withdraw(now, custody, owner, claims)?;
                Ok(Outcome::Withdrew {
                    asset_out: out.asset_out,
                    collateral_out: out.collateral_out,
                })
            }
            (ActionConfig::Settle { .. }, _) => {
                let settlement = pool.settle(now)?;
                Ok(Outcome::Settled {
                    asset: settlement.asset,
                    collateral: settlement.collateral,
                    bond_total: settlement.bond_total,
                    insurance_total: settlement.insurance_total,
                    default: settlement.is_default(),
                })
            }
            // Every owned action resolves its actor in `step`
            (_, None) => Err(PoolError::Unauthorized),
        }
    }
}

/// Replay every action in `config`
pub fn run(config: &ScenarioConfig) -> Result<Report, ScenarioError> {
    let mut runner = Runner::new(config)?;
    let mut steps = Vec::with_capacity(config.actions.len());
    let mut received: BTreeMap<String, Amounts> = BTreeMap::new();

    for (i, action) in config.actions.iter().enumerate() {
        let report = runner.step(i + 1, action)?;
        if let Some(actor) = &report.actor {
            let total = received.entry(actor.clone()).or_default();
            total.asset = total.asset.saturating_add(report.received.asset);
            total.collateral = total.collateral.saturating_add(report.received.collateral);
        }
        steps.push(report);
    }

    let pool = runner.pool()?;
    let accepted = steps.iter().filter(|s| s.rejected.is_none()).count();
    Ok(Report {
        asset: config.pool.asset.clone(),
        collateral: config.pool.collateral.clone(),
        maturity: pool.params().maturity,
        settle_at: pool.params().settle_at(),
        rejected: steps.len() - accepted,
        accepted,
        steps,
        pool: PoolSummary::of(pool),
        received,
    })
}

// ============================================================================
// Output
// ============================================================================

pub fn print_report(report: &Report) {
    println!("{}", "=== Scenario ===".bright_green().bold());
    println!(
        "{} {}/{}",
        "Pool:".bright_cyan(),
        report.asset,
        report.collateral
    );
    println!("{} {}", "Maturity:".bright_cyan(), report.maturity);
    println!("{} {}", "Settles at:".bright_cyan(), report.settle_at);
    println!();

    for step in &report.steps {
        let actor = step.actor.as_deref().unwrap_or("-");
        let head = format!("#{:<3} {:>10}  {:<8} {:<10}", step.step, step.at, step.action, actor);
        match (&step.outcome, &step.rejected) {
            (Some(outcome), _) => println!("{} {}", head, describe(outcome).green()),
            (None, Some(reason)) => println!("{} {}", head, format!("rejected: {}", reason).red()),
            (None, None) => println!("{}", head),
        }
        if !step.received.is_zero() {
            println!(
                "      {} asset={} collateral={}",
                "received".dimmed(),
                step.received.asset,
                step.received.collateral
            );
        }
        if !step.refunded.is_zero() {
            println!(
                "      {} asset={} collateral={}",
                "refunded".dimmed(),
                step.refunded.asset,
                step.refunded.collateral
            );
        }
    }

    println!();
    println!("{}", "=== Pool State ===".bright_green().bold());
    let p = &report.pool;
    println!("{} x={} y={} z={}", "Axes:".bright_cyan(), p.x, p.y, p.z);
    println!(
        "{} asset={} collateral={}",
        "Reserves:".bright_cyan(),
        p.reserve_asset,
        p.reserve_collateral
    );
    println!("{} {}", "Total liquidity:".bright_cyan(), p.total_liquidity);
    println!(
        "{} {} of {} created",
        "Debt outstanding:".bright_cyan(),
        p.debt_outstanding,
        p.total_debt_created
    );
    println!("{} {}", "Protocol fees:".bright_cyan(), p.protocol_fees);
    println!("{} {}", "Settled:".bright_cyan(), p.settled);

    if !report.received.is_empty() {
        println!();
        println!("{}", "=== Payouts ===".bright_green().bold());
        for (who, amounts) in &report.received {
            println!(
                "{} asset={} collateral={}",
                format!("{}:", who).bright_cyan(),
                amounts.asset,
                amounts.collateral
            );
        }
    }

    println!();
    let summary = format!("{} accepted, {} rejected", report.accepted, report.rejected);
    if report.rejected == 0 {
        println!("{}", summary.bright_green());
    } else {
        println!("{}", summary.yellow());
    }
}

fn describe(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Minted { liquidity_out, due, debt, collateral } => format!(
            "liquidity={} due#{} debt={} collateral={}",
            liquidity_out, due, debt, collateral
        ),
        Outcome::Lent { bond_principal, bond_interest, insurance_principal, insurance_interest, protocol_fee } => format!(
            "bond={}+{} insurance={}+{} fee={}",
            bond_principal, bond_interest, insurance_principal, insurance_interest, protocol_fee
        ),
        Outcome::Borrowed { due, debt, collateral, protocol_fee } => format!(
            "due#{} debt={} collateral={} fee={}",
            due, debt, collateral, protocol_fee
        ),
        Outcome::Burned { asset_out, collateral_out } => {
            format!("asset={} collateral={}", asset_out, collateral_out)
        }
        Outcome::Paid { asset_in, collateral_out } => {
            format!("paid={} released={}", asset_in, collateral_out)
        }
        Outcome::Withdrew { asset_out, collateral_out } => {
            format!("asset={} collateral={}", asset_out, collateral_out)
        }
        Outcome::Settled { asset, collateral, bond_total, insurance_total, default } => format!(
            "asset={} collateral={} bonds={} insurance={}{}",
            asset,
            collateral,
            bond_total,
            insurance_total,
            if *default { " DEFAULT" } else { "" }
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PoolSection, RegistrySection, Timestamp};

    const START: u64 = 1_700_000_000;
    const MATURITY: u64 = START + 180 * 86_400;

    fn base(actions: Vec<ActionConfig>) -> ScenarioConfig {
        ScenarioConfig {
            registry: RegistrySection {
                fee_bps: 0,
                protocol_fee_bps: 0,
                grace_period: 0,
                fee_recipient: "treasury".into(),
            },
            pool: PoolSection {
                asset: "USDC".into(),
                collateral: "WETH".into(),
                maturity: Timestamp::Unix(MATURITY),
                created_at: Timestamp::Unix(START),
                transfer_fee_bps: 0,
            },
            actions,
        }
    }

    fn mint(at: u64) -> ActionConfig {
        ActionConfig::Mint {
            at: Timestamp::Unix(at),
            owner: "lp".into(),
            asset_in: 1_000_000_000,
            debt_in: 1_100_000_000,
            collateral_in: 2_000_000_000,
            min_liquidity: 0,
        }
    }

    #[test]
    fn test_sample_runs_clean() {
        let report = run(&ScenarioConfig::sample().unwrap()).unwrap();
        assert_eq!(report.rejected, 0, "{:?}", report.steps);
        assert!(report.pool.settled);
        assert!(report.received["alice"].asset > 250_000_000);
        assert!(report.received["treasury"].asset > 0);
    }

    #[test]
    fn test_rejections_are_recorded() {
        let config = base(vec![
            mint(START),
            ActionConfig::Lend {
                at: Timestamp::Unix(START + 1),
                owner: "alice".into(),
                asset_in: 1_000,
                min_bond_interest: u128::MAX,
                min_insurance_interest: 0,
            },
            ActionConfig::Settle { at: Timestamp::Unix(START + 2) },
        ]);
        let report = run(&config).unwrap();

        assert_eq!(report.accepted, 1);
        assert_eq!(report.rejected, 2);
        assert!(report.steps[1].rejected.as_deref().unwrap().contains("slippage"));
        // Rejected lend refunds the deposit in full
        assert_eq!(report.steps[1].refunded.asset, 1_000);
    }

    #[test]
    fn test_borrow_refunds_unused_collateral() {
        let config = base(vec![
            mint(START),
            ActionConfig::Borrow {
                at: Timestamp::Unix(START + 10),
                owner: "bob".into(),
                asset_out: 100_000_000,
                max_collateral_in: 1_000_000_000,
            },
        ]);
        let report = run(&config).unwrap();

        let Some(Outcome::Borrowed { collateral, .. }) = report.steps[1].outcome.clone() else {
            panic!("borrow rejected: {:?}", report.steps[1].rejected);
        };
        assert_eq!(report.steps[1].received.asset, 100_000_000);
        assert_eq!(collateral + report.steps[1].refunded.collateral, 1_000_000_000);
    }

    #[test]
    fn test_full_repay_releases_collateral() {
        let config = base(vec![
            mint(START),
            ActionConfig::Borrow {
                at: Timestamp::Unix(START + 10),
                owner: "bob".into(),
                asset_out: 100_000_000,
                max_collateral_in: 1_000_000_000,
            },
            ActionConfig::Pay {
                at: Timestamp::Unix(START + 20),
                owner: "bob".into(),
                due: 1,
                amount: None,
            },
        ]);
        let report = run(&config).unwrap();
        assert_eq!(report.rejected, 0);

        let Some(Outcome::Borrowed { collateral, .. }) = report.steps[1].outcome.clone() else {
            panic!("borrow rejected");
        };
        assert_eq!(report.steps[2].received.collateral, collateral);
    }

    #[test]
    fn test_clock_must_not_go_backwards() {
        let config = base(vec![mint(START + 10), ActionConfig::Settle { at: Timestamp::Unix(START) }]);
        assert!(matches!(
            run(&config),
            Err(ScenarioError::ClockWentBackwards { step: 2, .. })
        ));
    }

    #[test]
    fn test_fee_on_transfer_tokens_are_rejected() {
        let mut config = base(vec![mint(START)]);
        config.pool.transfer_fee_bps = 50;
        let report = run(&config).unwrap();

        assert_eq!(report.rejected, 1);
        assert!(report.steps[0].rejected.is_some());
        assert_eq!(report.pool.total_liquidity, 0);
    }

    #[test]
    fn test_report_serializes_to_json() {
        let report = run(&ScenarioConfig::sample().unwrap()).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["steps"][0]["outcome"]["kind"], "minted");
        assert_eq!(json["accepted"], report.steps.len());
    }
}
