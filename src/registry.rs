//! Pool registry
//!
//! Creates at most one pool per (asset, collateral, maturity) and hands every
//! pool the same immutable fee parameters.

use alloc::collections::BTreeMap;

use tenor_math::FeeSchedule;

use crate::pool::{Pool, PoolParams, VecPool};
use crate::{Owner, PoolError, Result};

/// Token identity (mint address, contract address, ...)
pub type TokenId = [u8; 32];

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PoolKey {
    pub asset: TokenId,
    pub collateral: TokenId,
    pub maturity: u64,
}

/// Parameters shared by every pool of a registry
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegistryParams {
    pub fees: FeeSchedule,
    pub fee_recipient: Owner,
    pub grace_period: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolRegistry {
    params: RegistryParams,
    pools: BTreeMap<PoolKey, VecPool>,
}

impl PoolRegistry {
    pub fn new(params: RegistryParams) -> Result<Self> {
        FeeSchedule::new(params.fees.fee_bps, params.fees.protocol_fee_bps)?;
        Ok(Self { params, pools: BTreeMap::new() })
    }

    pub fn params(&self) -> &RegistryParams {
        &self.params
    }

    /// Create the pool for `key`
    ///
    /// Fails with `InvalidParams` if the maturity is not in the future or both
    /// sides are the same token, and with `PoolExists` on a duplicate key.
    pub fn create_pool(&mut self, now: u64, key: PoolKey) -> Result<&mut VecPool> {
        if key.maturity <= now || key.asset == key.collateral {
            return Err(PoolError::InvalidParams);
        }
        if self.pools.contains_key(&key) {
            return Err(PoolError::PoolExists);
        }

        let pool = Pool::new(PoolParams {
            maturity: key.maturity,
            fees: self.params.fees,
            fee_recipient: self.params.fee_recipient,
            grace_period: self.params.grace_period,
        })?;
        log::debug!("create_pool: maturity={} pools={}", key.maturity, self.pools.len() + 1);
        Ok(self.pools.entry(key).or_insert(pool))
    }

    pub fn pool(&self, key: &PoolKey) -> Result<&VecPool> {
        self.pools.get(key).ok_or(PoolError::PoolNotFound)
    }

    pub fn pool_mut(&mut self, key: &PoolKey) -> Result<&mut VecPool> {
        self.pools.get_mut(key).ok_or(PoolError::PoolNotFound)
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &PoolKey> {
        self.pools.keys()
    }
}
