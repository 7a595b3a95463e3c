//! Trading repository implementation
//!
//! SQL for stocks, student positions and both history tables.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgConnection;
use uuid::Uuid;

use core_kernel::{
    InstanceId, StockHistoryId, StockId, StudentId, StudentStockHistoryId, StudentStockId,
    TransactionId,
};
use domain_trading::{Stock, StockHistory, StudentStock, StudentStockHistory};

use crate::error::DatabaseError;
use crate::repositories::ledger::money;

/// Database row for the stocks table
#[derive(Debug, sqlx::FromRow)]
pub struct StockRow {
    pub id: Uuid,
    pub symbol: String,
    pub name: String,
    pub current_value: Decimal,
    pub total_shares: i64,
    pub available_shares: i64,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl StockRow {
    pub fn into_domain(self, instances: Vec<Uuid>) -> Result<Stock, DatabaseError> {
        Ok(Stock {
            id: StockId::from_uuid(self.id),
            symbol: self.symbol,
            name: self.name,
            current_value: money(self.current_value)?,
            total_shares: self.total_shares,
            available_shares: self.available_shares,
            is_deleted: self.is_deleted,
            instance_ids: instances.into_iter().map(InstanceId::from_uuid).collect(),
            created_at: self.created_at,
        })
    }
}

/// Database row for the student_stocks table
#[derive(Debug, sqlx::FromRow)]
pub struct StudentStockRow {
    pub id: Uuid,
    pub student_id: Uuid,
    pub stock_id: Uuid,
    pub shares_owned: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<StudentStockRow> for StudentStock {
    fn from(row: StudentStockRow) -> Self {
        StudentStock {
            id: StudentStockId::from_uuid(row.id),
            student_id: StudentId::from_uuid(row.student_id),
            stock_id: StockId::from_uuid(row.stock_id),
            shares_owned: row.shares_owned,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct StockHistoryRow {
    pub id: Uuid,
    pub stock_id: Uuid,
    pub value: Decimal,
    pub changed_at: DateTime<Utc>,
}

impl TryFrom<StockHistoryRow> for StockHistory {
    type Error = DatabaseError;

    fn try_from(row: StockHistoryRow) -> Result<Self, Self::Error> {
        Ok(StockHistory {
            id: StockHistoryId::from_uuid(row.id),
            stock_id: StockId::from_uuid(row.stock_id),
            value: money(row.value)?,
            changed_at: row.changed_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct StudentStockHistoryRow {
    pub id: Uuid,
    pub student_stock_id: Uuid,
    pub quantity_traded: i64,
    pub shares_owned_after: i64,
    pub transaction_id: Uuid,
    pub trade_value: Decimal,
    pub traded_at: DateTime<Utc>,
}

impl TryFrom<StudentStockHistoryRow> for StudentStockHistory {
    type Error = DatabaseError;

    fn try_from(row: StudentStockHistoryRow) -> Result<Self, Self::Error> {
        Ok(StudentStockHistory {
            id: StudentStockHistoryId::from_uuid(row.id),
            student_stock_id: StudentStockId::from_uuid(row.student_stock_id),
            quantity_traded: row.quantity_traded,
            shares_owned_after: row.shares_owned_after,
            transaction_id: TransactionId::from_uuid(row.transaction_id),
            trade_value: money(row.trade_value)?,
            traded_at: row.traded_at,
        })
    }
}

/// Repository for trading tables
pub struct TradingRepository;

impl TradingRepository {
    /// Loads a stock and locks its row for the rest of the transaction
    pub async fn get_stock(
        conn: &mut PgConnection,
        id: StockId,
    ) -> Result<Option<Stock>, DatabaseError> {
        let row = sqlx::query_as::<_, StockRow>(
            r#"
            SELECT id, symbol, name, current_value, total_shares, available_shares,
                   is_deleted, created_at
            FROM stocks
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(*id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => {
                let instances = sqlx::query_scalar::<_, Uuid>(
                    "SELECT instance_id FROM stock_instances WHERE stock_id = $1 ORDER BY instance_id",
                )
                .bind(row.id)
                .fetch_all(&mut *conn)
                .await?;
                Ok(Some(row.into_domain(instances)?))
            }
            None => Ok(None),
        }
    }

    pub async fn insert_stock(conn: &mut PgConnection, stock: &Stock) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO stocks (
                id, symbol, name, current_value, total_shares, available_shares,
                is_deleted, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(*stock.id.as_uuid())
        .bind(&stock.symbol)
        .bind(&stock.name)
        .bind(stock.current_value.amount())
        .bind(stock.total_shares)
        .bind(stock.available_shares)
        .bind(stock.is_deleted)
        .bind(stock.created_at)
        .execute(&mut *conn)
        .await?;
        Self::replace_instances(conn, stock).await
    }

    /// Updates a stock only while its stored available count is `expected_available`
    pub async fn update_stock_if_available(
        conn: &mut PgConnection,
        stock: &Stock,
        expected_available: i64,
    ) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE stocks SET
                symbol = $2,
                name = $3,
                current_value = $4,
                total_shares = $5,
                available_shares = $6,
                is_deleted = $7
            WHERE id = $1 AND available_shares = $8
            "#,
        )
        .bind(*stock.id.as_uuid())
        .bind(&stock.symbol)
        .bind(&stock.name)
        .bind(stock.current_value.amount())
        .bind(stock.total_shares)
        .bind(stock.available_shares)
        .bind(stock.is_deleted)
        .bind(expected_available)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() > 0 {
            Self::replace_instances(conn, stock).await?;
        }
        Ok(result.rows_affected())
    }

    async fn replace_instances(conn: &mut PgConnection, stock: &Stock) -> Result<(), DatabaseError> {
        let instances: Vec<Uuid> = stock.instance_ids.iter().map(|i| *i.as_uuid()).collect();
        sqlx::query("DELETE FROM stock_instances WHERE stock_id = $1")
            .bind(*stock.id.as_uuid())
            .execute(&mut *conn)
            .await?;
        sqlx::query("INSERT INTO stock_instances (stock_id, instance_id) SELECT $1, unnest($2::uuid[])")
            .bind(*stock.id.as_uuid())
            .bind(&instances)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    pub async fn stock_exists(conn: &mut PgConnection, id: StockId) -> Result<bool, DatabaseError> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM stocks WHERE id = $1)")
            .bind(*id.as_uuid())
            .fetch_one(&mut *conn)
            .await?;
        Ok(exists)
    }

    /// Loads a position and locks its row for the rest of the transaction
    pub async fn get_position(
        conn: &mut PgConnection,
        student_id: StudentId,
        stock_id: StockId,
    ) -> Result<Option<StudentStock>, DatabaseError> {
        let row = sqlx::query_as::<_, StudentStockRow>(
            r#"
            SELECT id, student_id, stock_id, shares_owned, created_at, updated_at
            FROM student_stocks
            WHERE student_id = $1 AND stock_id = $2
            FOR UPDATE
            "#,
        )
        .bind(*student_id.as_uuid())
        .bind(*stock_id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?;
        Ok(row.map(StudentStock::from))
    }

    /// Inserts a new position; returns zero when one already exists for the pair
    pub async fn insert_position(
        conn: &mut PgConnection,
        position: &StudentStock,
    ) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            r#"
            INSERT INTO student_stocks (id, student_id, stock_id, shares_owned, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (student_id, stock_id) DO NOTHING
            "#,
        )
        .bind(*position.id.as_uuid())
        .bind(*position.student_id.as_uuid())
        .bind(*position.stock_id.as_uuid())
        .bind(position.shares_owned)
        .bind(position.created_at)
        .bind(position.updated_at)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Updates a position only while its stored count is `expected_owned`
    pub async fn update_position_if_owned(
        conn: &mut PgConnection,
        position: &StudentStock,
        expected_owned: i64,
    ) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE student_stocks SET shares_owned = $2, updated_at = $3
            WHERE id = $1 AND shares_owned = $4
            "#,
        )
        .bind(*position.id.as_uuid())
        .bind(position.shares_owned)
        .bind(position.updated_at)
        .bind(expected_owned)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn insert_stock_history(
        conn: &mut PgConnection,
        entry: &StockHistory,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO stock_history (id, stock_id, value, changed_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(*entry.id.as_uuid())
        .bind(*entry.stock_id.as_uuid())
        .bind(entry.value.amount())
        .bind(entry.changed_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn insert_position_history(
        conn: &mut PgConnection,
        entry: &StudentStockHistory,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO student_stock_history (
                id, student_stock_id, quantity_traded, shares_owned_after,
                transaction_id, trade_value, traded_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(*entry.id.as_uuid())
        .bind(*entry.student_stock_id.as_uuid())
        .bind(entry.quantity_traded)
        .bind(entry.shares_owned_after)
        .bind(*entry.transaction_id.as_uuid())
        .bind(entry.trade_value.amount())
        .bind(entry.traded_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn stock_history(
        conn: &mut PgConnection,
        stock_id: StockId,
    ) -> Result<Vec<StockHistory>, DatabaseError> {
        let rows = sqlx::query_as::<_, StockHistoryRow>(
            "SELECT id, stock_id, value, changed_at FROM stock_history WHERE stock_id = $1 ORDER BY seq",
        )
        .bind(*stock_id.as_uuid())
        .fetch_all(&mut *conn)
        .await?;
        rows.into_iter().map(StockHistory::try_from).collect()
    }

    pub async fn position_history(
        conn: &mut PgConnection,
        student_stock_id: StudentStockId,
    ) -> Result<Vec<StudentStockHistory>, DatabaseError> {
        let rows = sqlx::query_as::<_, StudentStockHistoryRow>(
            r#"
            SELECT id, student_stock_id, quantity_traded, shares_owned_after,
                   transaction_id, trade_value, traded_at
            FROM student_stock_history
            WHERE student_stock_id = $1
            ORDER BY seq
            "#,
        )
        .bind(*student_stock_id.as_uuid())
        .fetch_all(&mut *conn)
        .await?;
        rows.into_iter().map(StudentStockHistory::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::Money;
    use rust_decimal_macros::dec;

    #[test]
    fn test_stock_row_maps_instances() {
        let instance = Uuid::new_v4();
        let row = StockRow {
            id: Uuid::new_v4(),
            symbol: "XYZ".into(),
            name: "Xyz Corp".into(),
            current_value: dec!(12.500),
            total_shares: 100,
            available_shares: 70,
            is_deleted: false,
            created_at: Utc::now(),
        };
        let stock = row.into_domain(vec![instance]).unwrap();
        assert_eq!(stock.current_value, Money::from_mills(12_500));
        assert_eq!(stock.shares_held(), 30);
        assert!(stock.instance_ids.contains(&InstanceId::from_uuid(instance)));
    }

    #[test]
    fn test_history_row_keeps_sign_of_trade() {
        let row = StudentStockHistoryRow {
            id: Uuid::new_v4(),
            student_stock_id: Uuid::new_v4(),
            quantity_traded: -5,
            shares_owned_after: 25,
            transaction_id: Uuid::new_v4(),
            trade_value: dec!(10.000),
            traded_at: Utc::now(),
        };
        let entry = StudentStockHistory::try_from(row).unwrap();
        assert!(!entry.is_purchase());
        assert_eq!(entry.shares_owned_after, 25);
    }
}
