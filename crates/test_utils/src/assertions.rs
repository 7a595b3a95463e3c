//! Custom Test Assertions
//!
//! Assertion helpers for ledger invariants that give more meaningful
//! failure messages than a bare `assert_eq!`.

use core_kernel::Money;
use domain_ledger::{LedgerTables, Share, Transaction, TransactionType};
use domain_trading::TradingTables;

/// Asserts that a share's balance equals the sum of its transaction amounts
pub fn assert_share_reconciled(share: &Share, transactions: &[Transaction]) {
    let total: Money = transactions
        .iter()
        .filter(|t| t.share_id == share.id)
        .map(|t| t.amount)
        .sum();
    assert_eq!(
        share.balance, total,
        "Share {} balance {} does not match its transaction total {}",
        share.id, share.balance, total
    );
}

/// Asserts that every share in the tables reconciles with its transactions
pub fn assert_reconciled(tables: &LedgerTables) {
    for share in tables.shares.values() {
        let transactions = tables.transactions_for_share(share.id);
        assert_share_reconciled(share, &transactions);
    }
}

/// Asserts that each row's running balance follows from the row before it
pub fn assert_running_balances(transactions: &[Transaction]) {
    let mut running = Money::ZERO;
    for (index, transaction) in transactions.iter().enumerate() {
        running = running + transaction.amount;
        assert_eq!(
            transaction.new_balance, running,
            "Row {} ({}) records new balance {} but the running total is {}",
            index, transaction.transaction_type, transaction.new_balance, running
        );
    }
}

/// Asserts that every stock's pool accounts for all of its shares
///
/// `available + Σ owned` must equal `total` and no count may be negative.
pub fn assert_stock_pool_consistent(tables: &TradingTables) {
    for stock in tables.stocks.values() {
        let owned: i64 = tables
            .positions
            .values()
            .filter(|p| p.stock_id == stock.id)
            .map(|p| {
                assert!(p.shares_owned >= 0, "Position {} owns {} shares", p.id, p.shares_owned);
                p.shares_owned
            })
            .sum();
        assert!(
            stock.available_shares >= 0,
            "Stock {} has {} available shares",
            stock.symbol,
            stock.available_shares
        );
        assert_eq!(
            stock.available_shares + owned,
            stock.total_shares,
            "Stock {}: {} available + {} owned != {} total",
            stock.symbol,
            stock.available_shares,
            owned,
            stock.total_shares
        );
    }
}

/// Asserts that the last row is a zero-amount audit row of `kind` at `balance`
pub fn assert_audit_row(transactions: &[Transaction], kind: TransactionType, balance: Money) {
    let last = transactions
        .last()
        .unwrap_or_else(|| panic!("Expected a {} audit row, found no transactions", kind));
    assert_eq!(last.transaction_type, kind, "Unexpected last row: {:?}", last);
    assert!(last.amount.is_zero(), "Audit row moved money: {:?}", last);
    assert_eq!(last.new_balance, balance, "Audit row records the wrong balance");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use core_kernel::{ShareId, ShareTypeId, StudentId};

    fn row(share_id: ShareId, mills: i64, new_balance: i64) -> Transaction {
        Transaction::posted(
            share_id,
            Money::from_mills(mills),
            Money::from_mills(new_balance),
            TransactionType::default_for(Money::from_mills(mills)),
            "",
            Utc::now(),
            Utc::now(),
        )
    }

    #[test]
    fn test_reconciled_share_passes() {
        let mut share = Share::open(StudentId::new(), ShareTypeId::new(), Utc::now());
        share.balance = Money::from_mills(7_000);
        let rows = vec![row(share.id, 10_000, 10_000), row(share.id, -3_000, 7_000)];
        assert_share_reconciled(&share, &rows);
        assert_running_balances(&rows);
    }

    #[test]
    #[should_panic(expected = "does not match")]
    fn test_unreconciled_share_panics() {
        let share = Share::open(StudentId::new(), ShareTypeId::new(), Utc::now());
        assert_share_reconciled(&share, &[row(share.id, 1_000, 1_000)]);
    }
}
