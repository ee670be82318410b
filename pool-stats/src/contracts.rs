//! Protocol contract set, event signatures and read selectors

use ethers::utils::{id, keccak256};
use serde::Serialize;
use rpc_core::{Address, ContractCall, H256};
use crate::config::Config;

pub const DEPOSIT_UPDATED_EVENT: &str =
    "DepositUpdated(address,uint256,uint256,uint256,uint256,uint256,uint256)";
pub const TRANSFER_EVENT: &str = "Transfer(address,address,uint256)";
pub const LIQUIDATION_EVENT: &str =
    "Liquidation(uint256,uint256,uint256,uint256,uint256,uint256,uint256,uint256,uint256,uint256)";

pub const TOTAL_DEPOSITS_FN: &str = "getTotalBoldDeposits()";
pub const COLL_BALANCE_FN: &str = "getCollBalance()";
pub const TOTAL_SUPPLY_FN: &str = "totalSupply()";

pub fn event_signature(signature: &str) -> H256 {
    H256::from(keccak256(signature.as_bytes()))
}

pub fn selector(signature: &str) -> Vec<u8> {
    id(signature).to_vec()
}

/// One collateral branch of the protocol
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Branch {
    pub id: u8,
    pub symbol: String,
    pub stability_pool: Address,
    pub trove_manager: Address,
}

impl Branch {
    pub fn total_deposits_call(&self) -> ContractCall {
        ContractCall::new(self.stability_pool, selector(TOTAL_DEPOSITS_FN))
    }

    pub fn coll_balance_call(&self) -> ContractCall {
        ContractCall::new(self.stability_pool, selector(COLL_BALANCE_FN))
    }
}

#[derive(Debug, Clone)]
pub struct ContractSet {
    branches: Vec<Branch>,
    bold_token: Address,
}

impl ContractSet {
    pub fn new(branches: Vec<Branch>, bold_token: Address) -> Self {
        Self { branches, bold_token }
    }

    pub fn from_config(config: &Config) -> Self {
        let branches = config
            .branches
            .iter()
            .map(|b| Branch {
                id: b.id,
                symbol: b.symbol.clone(),
                stability_pool: b.stability_pool,
                trove_manager: b.trove_manager,
            })
            .collect();
        Self::new(branches, config.chain.bold_token)
    }

    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    pub fn branch(&self, id: u8) -> Option<&Branch> {
        self.branches.iter().find(|b| b.id == id)
    }

    pub fn bold_token(&self) -> Address {
        self.bold_token
    }

    pub fn stability_pools(&self) -> Vec<Address> {
        self.branches.iter().map(|b| b.stability_pool).collect()
    }

    pub fn trove_managers(&self) -> Vec<Address> {
        self.branches.iter().map(|b| b.trove_manager).collect()
    }

    pub fn branch_for_pool(&self, address: &Address) -> Option<&Branch> {
        self.branches.iter().find(|b| &b.stability_pool == address)
    }

    pub fn branch_for_trove_manager(&self, address: &Address) -> Option<&Branch> {
        self.branches.iter().find(|b| &b.trove_manager == address)
    }

    pub fn bold_supply_call(&self) -> ContractCall {
        ContractCall::new(self.bold_token, selector(TOTAL_SUPPLY_FN))
    }
}
