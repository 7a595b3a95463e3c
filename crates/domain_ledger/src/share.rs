//! Student share accounts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{Money, ShareId, ShareTypeId, StudentId};

/// A student's account of a particular share type
///
/// The balance is only ever changed by the poster, together with the
/// transaction row that explains the change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Share {
    pub id: ShareId,
    pub student_id: StudentId,
    pub share_type_id: ShareTypeId,
    pub balance: Money,
    /// Withdrawals counted against the share type's limit since the last reset
    pub limited_withdrawal_count: u32,
    pub date_last_active: Option<DateTime<Utc>>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl Share {
    /// Opens an empty share
    pub fn open(student_id: StudentId, share_type_id: ShareTypeId, now: DateTime<Utc>) -> Self {
        Self {
            id: ShareId::new_v7(),
            student_id,
            share_type_id,
            balance: Money::ZERO,
            limited_withdrawal_count: 0,
            date_last_active: None,
            is_deleted: false,
            created_at: now,
        }
    }

    /// Returns true if postings may be written against this share
    pub fn accepts_transactions(&self) -> bool {
        !self.is_deleted
    }

    /// Marks the share deleted
    pub fn soft_delete(&mut self) {
        self.is_deleted = true;
    }
}
