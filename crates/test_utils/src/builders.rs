//! Test Data Builders
//!
//! `ShareTypeBuilder` constructs share types with sensible defaults and
//! `TestLedger` wires every ledger and trading service to one in-memory
//! store and a fixed clock.

use chrono::{DateTime, Utc};
use fake::faker::name::en::Name;
use fake::Fake;
use std::sync::Arc;

use core_kernel::{
    Clock, FixedClock, InstanceId, Money, Rate, ShareId, Timezone, WithdrawalLimitPeriod,
};
use domain_ledger::{
    DividendDistributor, LedgerConfig, LedgerInquiry, LedgerStore, PostingRequest, Share,
    ShareType, Student, Transaction, TransactionPoster, TransferService, WithdrawalLimitResetter,
};
use domain_trading::{InMemoryTradingStore, Stock, TradingEngine, TradingStore};

use crate::fixtures::{StringFixtures, TemporalFixtures};

/// Builder for share types
pub struct ShareTypeBuilder {
    name: String,
    dividend_rate: Rate,
    withdrawal_limit: Option<(u32, WithdrawalLimitPeriod)>,
    fee: Option<Money>,
    last_reset: Option<DateTime<Utc>>,
    instances: Vec<InstanceId>,
    deleted: bool,
}

impl Default for ShareTypeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ShareTypeBuilder {
    pub fn new() -> Self {
        Self {
            name: StringFixtures::share_type_name().to_string(),
            dividend_rate: Rate::ZERO,
            withdrawal_limit: None,
            fee: None,
            last_reset: None,
            instances: Vec::new(),
            deleted: false,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_rate(mut self, rate: Rate) -> Self {
        self.dividend_rate = rate;
        self
    }

    pub fn with_withdrawal_limit(mut self, count: u32, period: WithdrawalLimitPeriod) -> Self {
        self.withdrawal_limit = Some((count, period));
        self
    }

    /// Charges `fee` instead of refusing withdrawals past the limit
    pub fn with_fee(mut self, fee: Money) -> Self {
        self.fee = Some(fee);
        self
    }

    pub fn last_reset_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_reset = Some(at);
        self
    }

    pub fn linked_to(mut self, instance_id: InstanceId) -> Self {
        self.instances.push(instance_id);
        self
    }

    pub fn deleted(mut self) -> Self {
        self.deleted = true;
        self
    }

    pub fn build(self) -> ShareType {
        let mut share_type = ShareType::new(self.name, self.dividend_rate);
        if let Some((count, period)) = self.withdrawal_limit {
            share_type = share_type.with_withdrawal_limit(count, period);
        }
        if let Some(fee) = self.fee {
            share_type = share_type.with_withdrawal_fee(fee);
        }
        for instance in self.instances {
            share_type = share_type.linked_to(instance);
        }
        share_type.withdrawal_limit_last_reset = self.last_reset;
        share_type.is_deleted = self.deleted;
        share_type
    }
}

/// An in-memory ledger with a controllable clock
///
/// # Example
///
/// ```rust,ignore
/// let ledger = TestLedger::new();
/// let student = ledger.add_student().await;
/// let savings = ledger.add_share_type(ShareTypeBuilder::new()).await;
/// let share = ledger.open_share(&student, &savings, MoneyFixtures::dollars(50)).await;
/// ledger.poster().post_one(PostingRequest::new(share.id, MoneyFixtures::dollars(-5))).await?;
/// ```
pub struct TestLedger {
    pub store: InMemoryTradingStore,
    pub clock: Arc<FixedClock>,
    pub config: LedgerConfig,
    pub instance_id: InstanceId,
}

impl Default for TestLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl TestLedger {
    /// A ledger whose clock reads `TemporalFixtures::school_day()`
    pub fn new() -> Self {
        Self::at(TemporalFixtures::school_day())
    }

    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            store: InMemoryTradingStore::new(),
            clock: Arc::new(FixedClock::new(now)),
            config: LedgerConfig::default(),
            instance_id: InstanceId::new(),
        }
    }

    pub fn with_config(mut self, config: LedgerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_timezone(mut self, timezone: Timezone) -> Self {
        self.config = self.config.with_timezone(timezone);
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn ledger_store(&self) -> Arc<dyn LedgerStore> {
        Arc::new(self.store.clone())
    }

    pub fn trading_store(&self) -> Arc<dyn TradingStore> {
        Arc::new(self.store.clone())
    }

    fn dyn_clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    pub fn poster(&self) -> TransactionPoster {
        TransactionPoster::new(self.ledger_store(), self.dyn_clock(), self.config.clone())
    }

    pub fn transfers(&self) -> TransferService {
        TransferService::new(self.ledger_store(), self.dyn_clock(), self.config.clone())
    }

    pub fn dividends(&self) -> DividendDistributor {
        DividendDistributor::new(self.ledger_store(), self.dyn_clock(), self.config.clone())
    }

    pub fn resetter(&self) -> WithdrawalLimitResetter {
        WithdrawalLimitResetter::new(self.ledger_store(), self.dyn_clock(), self.config.clone())
    }

    pub fn inquiry(&self) -> LedgerInquiry {
        LedgerInquiry::new(self.ledger_store())
    }

    pub fn trading(&self) -> TradingEngine {
        TradingEngine::new(self.trading_store(), self.dyn_clock(), self.config.clone())
    }

    /// Adds a student with a generated name to this ledger's instance
    pub async fn add_student(&self) -> Student {
        let name: String = Name().fake();
        let student = Student::new(self.instance_id, name);
        self.store.insert_student(student.clone()).await;
        student
    }

    /// Stores the built share type, linked to this ledger's instance
    pub async fn add_share_type(&self, builder: ShareTypeBuilder) -> ShareType {
        let share_type = builder.linked_to(self.instance_id).build();
        self.store.insert_share_type(share_type.clone()).await;
        share_type
    }

    /// Opens a share and posts `opening` to it as a deposit
    pub async fn open_share(&self, student: &Student, share_type: &ShareType, opening: Money) -> Share {
        let share = Share::open(student.id, share_type.id, self.now());
        self.store.insert_share(share.clone()).await;
        if !opening.is_zero() {
            self.poster()
                .post_one(PostingRequest::new(share.id, opening).with_comment("Opening deposit"))
                .await
                .expect("opening deposit should post");
        }
        self.share(share.id).await
    }

    /// Lists a stock in this ledger's instance
    pub async fn list_stock(&self, symbol: &str, value: Money, total_shares: i64) -> Stock {
        let stock = Stock::list(symbol, StringFixtures::stock_name(), value, total_shares, self.now())
            .linked_to(self.instance_id);
        self.store.insert_stock(stock.clone()).await;
        stock
    }

    /// Current state of a share
    pub async fn share(&self, id: ShareId) -> Share {
        self.store.get_share(id).await.expect("share should exist")
    }

    pub async fn balance(&self, id: ShareId) -> Money {
        self.share(id).await.balance
    }

    pub async fn transactions(&self, id: ShareId) -> Vec<Transaction> {
        self.store.snapshot().await.ledger.transactions_for_share(id)
    }
}
