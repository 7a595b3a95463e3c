//! Ledger service settings

use serde::{Deserialize, Serialize};

use core_kernel::Timezone;

/// Settings shared by the ledger services
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Shares per page for dividend and reset runs
    pub page_size: u32,
    /// Extra attempts after a unit of work loses a conditional write
    pub max_conflict_retries: u32,
    /// Timezone used for withdrawal-limit period boundaries
    pub timezone: Timezone,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            max_conflict_retries: 3,
            timezone: Timezone::default(),
        }
    }
}

impl LedgerConfig {
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_timezone(mut self, timezone: Timezone) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn with_max_conflict_retries(mut self, retries: u32) -> Self {
        self.max_conflict_retries = retries;
        self
    }
}
