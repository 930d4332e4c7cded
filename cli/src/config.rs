//! Scenario files
//!
//! A scenario describes one registry, one pool and a list of timestamped
//! actions against it. Timestamps are unix seconds or RFC 3339 strings;
//! owners and tokens are base58 32-byte ids or plain names.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tenor::{FeeSchedule, Owner, PoolKey, RegistryParams};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid timestamp {0:?}: expected unix seconds or RFC 3339")]
    Timestamp(String),

    #[error("name {0:?} is longer than 32 bytes")]
    NameTooLong(String),

    #[error("fee schedule rejected: fee_bps + protocol_fee_bps must be below 10000")]
    Fees,

    #[error("action {step} at {at} runs before the previous action at {previous}")]
    ClockWentBackwards { step: usize, at: u64, previous: u64 },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{0} already exists (use --force to overwrite)")]
    Exists(PathBuf),

    #[error("pool setup rejected: {0}")]
    Pool(String),
}

/// Unix seconds or an RFC 3339 date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    Unix(u64),
    Date(String),
}

impl Timestamp {
    pub fn resolve(&self) -> Result<u64, ScenarioError> {
        match self {
            Timestamp::Unix(secs) => Ok(*secs),
            Timestamp::Date(s) => chrono::DateTime::parse_from_rfc3339(s)
                .ok()
                .and_then(|dt| u64::try_from(dt.timestamp()).ok())
                .ok_or_else(|| ScenarioError::Timestamp(s.clone())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySection {
    #[serde(default)]
    pub fee_bps: u16,
    #[serde(default)]
    pub protocol_fee_bps: u16,
    #[serde(default)]
    pub grace_period: u64,
    pub fee_recipient: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSection {
    pub asset: String,
    pub collateral: String,
    pub maturity: Timestamp,
    /// Registry clock when the pool is created
    pub created_at: Timestamp,
    /// Simulated fee-on-transfer rate of both tokens
    #[serde(default)]
    pub transfer_fee_bps: u16,
}

/// Token amounts in scenario files
///
/// TOML integers stop at `i64::MAX`, so larger amounts are written as
/// decimal strings.
mod amount {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Int(u64),
        Text(String),
    }

    impl Repr {
        fn widen<E: Error>(self) -> Result<u128, E> {
            match self {
                Repr::Int(v) => Ok(v as u128),
                Repr::Text(s) => s
                    .replace('_', "")
                    .parse()
                    .map_err(|_| E::custom(format!("invalid amount {:?}", s))),
            }
        }
    }

    pub fn required<'de, D: Deserializer<'de>>(d: D) -> Result<u128, D::Error> {
        Repr::deserialize(d)?.widen()
    }

    pub fn optional<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u128>, D::Error> {
        Option::<Repr>::deserialize(d)?.map(Repr::widen).transpose()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionConfig {
    Mint {
        at: Timestamp,
        owner: String,
        #[serde(deserialize_with = "amount::required")]
        asset_in: u128,
        #[serde(deserialize_with = "amount::required")]
        debt_in: u128,
        #[serde(deserialize_with = "amount::required")]
        collateral_in: u128,
        #[serde(default, deserialize_with = "amount::required")]
        min_liquidity: u128,
    },
    Lend {
        at: Timestamp,
        owner: String,
        #[serde(deserialize_with = "amount::required")]
        asset_in: u128,
        #[serde(default, deserialize_with = "amount::required")]
        min_bond_interest: u128,
        #[serde(default, deserialize_with = "amount::required")]
        min_insurance_interest: u128,
    },
    Borrow {
        at: Timestamp,
        owner: String,
        #[serde(deserialize_with = "amount::required")]
        asset_out: u128,
        #[serde(deserialize_with = "amount::required")]
        max_collateral_in: u128,
    },
    /// Omitting `liquidity_in` burns everything the owner holds
    Burn {
        at: Timestamp,
        owner: String,
        #[serde(default, deserialize_with = "amount::optional")]
        liquidity_in: Option<u128>,
    },
    /// `due` is the index returned by mint or borrow; omitting `amount`
    /// repays the whole debt
    Pay {
        at: Timestamp,
        owner: String,
        due: u64,
        #[serde(default, deserialize_with = "amount::optional")]
        amount: Option<u128>,
    },
    /// Redeems every claim the owner holds
    Withdraw { at: Timestamp, owner: String },
    Settle { at: Timestamp },
}

impl ActionConfig {
    pub fn at(&self) -> &Timestamp {
        match self {
            ActionConfig::Mint { at, .. }
            | ActionConfig::Lend { at, .. }
            | ActionConfig::Borrow { at, .. }
            | ActionConfig::Burn { at, .. }
            | ActionConfig::Pay { at, .. }
            | ActionConfig::Withdraw { at, .. }
            | ActionConfig::Settle { at } => at,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ActionConfig::Mint { .. } => "mint",
            ActionConfig::Lend { .. } => "lend",
            ActionConfig::Borrow { .. } => "borrow",
            ActionConfig::Burn { .. } => "burn",
            ActionConfig::Pay { .. } => "pay",
            ActionConfig::Withdraw { .. } => "withdraw",
            ActionConfig::Settle { .. } => "settle",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub registry: RegistrySection,
    pub pool: PoolSection,
    #[serde(default)]
    pub actions: Vec<ActionConfig>,
}

const SAMPLE: &str = r#"# Tenor scenario
#
# Amounts are integers in the token's native units. Timestamps are unix
# seconds or RFC 3339 strings. Owners and tokens are plain names (up to 32
# bytes) or base58-encoded 32-byte ids.

[registry]
fee_bps = 30
protocol_fee_bps = 10
grace_period = 86400
fee_recipient = "treasury"

[pool]
asset = "USDC"
collateral = "WETH"
created_at = "2026-01-01T00:00:00Z"
maturity = "2026-07-01T00:00:00Z"

[[actions]]
type = "mint"
at = "2026-01-01T00:00:00Z"
owner = "lp"
asset_in = 1000000000
debt_in = 1050000000
collateral_in = 2000000000

[[actions]]
type = "lend"
at = "2026-01-02T00:00:00Z"
owner = "alice"
asset_in = 250000000

[[actions]]
type = "borrow"
at = "2026-01-03T00:00:00Z"
owner = "bob"
asset_out = 400000000
max_collateral_in = 2000000000

[[actions]]
type = "pay"
at = "2026-06-30T00:00:00Z"
owner = "bob"
due = 1
amount = 200000000

[[actions]]
type = "withdraw"
at = "2026-07-02T00:00:00Z"
owner = "alice"

[[actions]]
type = "withdraw"
at = "2026-07-02T00:00:00Z"
owner = "treasury"

[[actions]]
type = "burn"
at = "2026-07-03T00:00:00Z"
owner = "lp"
"#;

impl ScenarioConfig {
    /// Load a scenario file
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let data = fs::read_to_string(path).map_err(|source| ScenarioError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&data).map_err(|source| ScenarioError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The scenario `tenor init` writes
    pub fn sample() -> Result<Self, ScenarioError> {
        toml::from_str(SAMPLE).map_err(|source| ScenarioError::Parse {
            path: PathBuf::from("<sample>"),
            source,
        })
    }

    /// Write the sample scenario to `path`
    pub fn write_sample(path: &Path, force: bool) -> Result<(), ScenarioError> {
        if path.exists() && !force {
            return Err(ScenarioError::Exists(path.to_path_buf()));
        }
        fs::write(path, SAMPLE).map_err(|source| ScenarioError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn registry_params(&self) -> Result<RegistryParams, ScenarioError> {
        let fees = FeeSchedule::new(self.registry.fee_bps, self.registry.protocol_fee_bps)
            .map_err(|_| ScenarioError::Fees)?;
        Ok(RegistryParams {
            fees,
            fee_recipient: parse_id(&self.registry.fee_recipient)?,
            grace_period: self.registry.grace_period,
        })
    }

    pub fn pool_key(&self) -> Result<PoolKey, ScenarioError> {
        Ok(PoolKey {
            asset: parse_id(&self.pool.asset)?,
            collateral: parse_id(&self.pool.collateral)?,
            maturity: self.pool.maturity.resolve()?,
        })
    }
}

/// Resolve an owner or token id
///
/// A base58 string that decodes to exactly 32 bytes is taken as-is;
/// anything else is a name, zero-padded to 32 bytes.
pub fn parse_id(s: &str) -> Result<Owner, ScenarioError> {
    if let Ok(bytes) = bs58::decode(s).into_vec() {
        if let Ok(id) = <[u8; 32]>::try_from(bytes.as_slice()) {
            return Ok(id);
        }
    }
    let name = s.as_bytes();
    if name.len() > 32 {
        return Err(ScenarioError::NameTooLong(s.to_string()));
    }
    let mut id = [0u8; 32];
    id[..name.len()].copy_from_slice(name);
    Ok(id)
}

/// Render an id as its name when it is printable padding, base58 otherwise
pub fn display_id(id: &Owner) -> String {
    let end = id.iter().position(|b| *b == 0).unwrap_or(id.len());
    let (name, pad) = id.split_at(end);
    if !name.is_empty()
        && pad.iter().all(|b| *b == 0)
        && name.iter().all(|b| b.is_ascii_graphic())
    {
        String::from_utf8_lossy(name).into_owned()
    } else {
        bs58::encode(id).into_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sample_parses() {
        let config = ScenarioConfig::sample().unwrap();
        assert_eq!(config.registry.fee_bps, 30);
        assert_eq!(config.actions.len(), 7);
        assert_eq!(config.actions[0].name(), "mint");
        assert!(config.registry_params().is_ok());

        let key = config.pool_key().unwrap();
        assert!(key.maturity > config.pool.created_at.resolve().unwrap());
    }

    #[test]
    fn test_sample_round_trip_through_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scenario.toml");

        ScenarioConfig::write_sample(&path, false).unwrap();
        assert!(matches!(
            ScenarioConfig::write_sample(&path, false),
            Err(ScenarioError::Exists(_))
        ));
        ScenarioConfig::write_sample(&path, true).unwrap();

        let loaded = ScenarioConfig::load(&path).unwrap();
        assert_eq!(loaded, ScenarioConfig::sample().unwrap());
    }

    #[test]
    fn test_parse_error_names_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[registry]\nfee_bps = \"lots\"\n").unwrap();

        let err = ScenarioConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn test_amounts_accept_integers_and_strings() {
        let config: ScenarioConfig = toml::from_str(
            r#"
            [registry]
            fee_recipient = "treasury"

            [pool]
            asset = "USDC"
            collateral = "WETH"
            created_at = 0
            maturity = 1000

            [[actions]]
            type = "lend"
            at = 1
            owner = "alice"
            asset_in = 5_000

            [[actions]]
            type = "borrow"
            at = 2
            owner = "bob"
            asset_out = "340282366920938463463374607431768211455"
            max_collateral_in = "1_000"

            [[actions]]
            type = "pay"
            at = 3
            owner = "bob"
            due = 1
            "#,
        )
        .unwrap();

        assert!(matches!(config.actions[0], ActionConfig::Lend { asset_in: 5_000, min_bond_interest: 0, .. }));
        assert!(matches!(
            config.actions[1],
            ActionConfig::Borrow { asset_out: u128::MAX, max_collateral_in: 1_000, .. }
        ));
        assert!(matches!(config.actions[2], ActionConfig::Pay { amount: None, .. }));

        let bad = toml::from_str::<ScenarioConfig>(
            "[registry]\nfee_recipient = \"t\"\n[pool]\nasset = \"A\"\ncollateral = \"C\"\n\
             created_at = 0\nmaturity = 1\n[[actions]]\ntype = \"lend\"\nat = 0\n\
             owner = \"a\"\nasset_in = \"lots\"\n",
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_timestamps() {
        assert_eq!(Timestamp::Unix(42).resolve().unwrap(), 42);
        assert_eq!(
            Timestamp::Date("1970-01-02T00:00:00Z".into()).resolve().unwrap(),
            86_400
        );
        assert!(Timestamp::Date("tomorrow".into()).resolve().is_err());
    }

    #[test]
    fn test_ids() {
        let alice = parse_id("alice").unwrap();
        assert_eq!(&alice[..5], b"alice");
        assert_eq!(display_id(&alice), "alice");

        let raw = [7u8; 32];
        let encoded = bs58::encode(raw).into_string();
        assert_eq!(parse_id(&encoded).unwrap(), raw);
        assert_eq!(display_id(&raw), encoded);

        assert!(parse_id(&"x".repeat(33)).is_err());
    }
}
