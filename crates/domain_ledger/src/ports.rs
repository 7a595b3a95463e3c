//! Ledger Domain Ports
//!
//! Services never talk to a database directly. They open a unit of work on
//! a [`LedgerStore`], read and write through it, and either commit or drop
//! it. Dropping an uncommitted unit of work rolls it back.
//!
//! # Consistency
//!
//! Loads inside a unit of work see that unit's own writes. Share updates
//! are conditional on the balance the caller last read: an adapter that
//! finds a different stored balance returns `PortError::Conflict`, and the
//! services retry the whole unit.

use async_trait::async_trait;

use core_kernel::{DomainPort, InstanceId, Money, PortError, ShareId, ShareTypeId, StudentId};

use crate::share::Share;
use crate::share_type::ShareType;
use crate::student::Student;
use crate::transaction::Transaction;

/// Keyset page over the shares of one share type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharePageQuery {
    pub share_type_id: ShareTypeId,
    /// Only shares owned by students of this instance
    pub instance_id: Option<InstanceId>,
    /// Skip deleted shares and shares of deleted students
    pub active_only: bool,
    /// Return shares with an id greater than this one
    pub after: Option<ShareId>,
    pub limit: u32,
}

impl SharePageQuery {
    /// Every share of the type, deleted or not
    pub fn all(share_type_id: ShareTypeId, limit: u32) -> Self {
        Self {
            share_type_id,
            instance_id: None,
            active_only: false,
            after: None,
            limit,
        }
    }

    /// Active shares of the type held by active students of `instance_id`
    pub fn active_in_instance(share_type_id: ShareTypeId, instance_id: InstanceId, limit: u32) -> Self {
        Self {
            share_type_id,
            instance_id: Some(instance_id),
            active_only: true,
            after: None,
            limit,
        }
    }

    /// Moves the cursor past `last`
    pub fn after(mut self, last: ShareId) -> Self {
        self.after = Some(last);
        self
    }
}

/// One atomic unit of work against the ledger tables
#[async_trait]
pub trait LedgerUnitOfWork: Send {
    /// Loads a share, including deleted ones
    async fn share(&mut self, id: ShareId) -> Result<Option<Share>, PortError>;

    /// Loads a share type, including deleted ones
    async fn share_type(&mut self, id: ShareTypeId) -> Result<Option<ShareType>, PortError>;

    /// Loads a share type and holds it against other writers until the unit of work ends
    ///
    /// Only writers of the share type row itself need this. Postings read
    /// the share type with [`share_type`](Self::share_type).
    async fn lock_share_type(&mut self, id: ShareTypeId) -> Result<Option<ShareType>, PortError> {
        self.share_type(id).await
    }

    async fn student(&mut self, id: StudentId) -> Result<Option<Student>, PortError>;

    /// Non-deleted share types
    async fn share_types(&mut self) -> Result<Vec<ShareType>, PortError>;

    /// Writes a share whose stored balance must still be `expected_balance`
    async fn save_share(&mut self, share: &Share, expected_balance: Money) -> Result<(), PortError>;

    async fn save_share_type(&mut self, share_type: &ShareType) -> Result<(), PortError>;

    /// Appends a transaction row
    async fn insert_transaction(&mut self, transaction: &Transaction) -> Result<(), PortError>;

    /// Transactions of a share in posting order
    async fn transactions_for_share(&mut self, id: ShareId) -> Result<Vec<Transaction>, PortError>;

    /// Shares ordered by id, starting after the query cursor
    async fn shares_page(&mut self, query: &SharePageQuery) -> Result<Vec<Share>, PortError>;

    /// Sets the limited withdrawal count of the given shares to zero
    async fn reset_withdrawal_counts(&mut self, ids: &[ShareId]) -> Result<u64, PortError>;

    async fn commit(self: Box<Self>) -> Result<(), PortError>;

    async fn rollback(self: Box<Self>) -> Result<(), PortError>;
}

/// Entry point for ledger storage
#[async_trait]
pub trait LedgerStore: DomainPort {
    async fn begin(&self) -> Result<Box<dyn LedgerUnitOfWork>, PortError>;
}
