//! Student stock positions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{StockId, StudentId, StudentStockId};

/// Shares of one stock owned by one student
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentStock {
    pub id: StudentStockId,
    pub student_id: StudentId,
    pub stock_id: StockId,
    pub shares_owned: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StudentStock {
    /// An empty position, created on a student's first purchase
    pub fn empty(student_id: StudentId, stock_id: StockId, now: DateTime<Utc>) -> Self {
        Self {
            id: StudentStockId::new_v7(),
            student_id,
            stock_id,
            shares_owned: 0,
            created_at: now,
            updated_at: now,
        }
    }
}
