//! Ledger repository implementation
//!
//! SQL for students, share types, shares and transactions. Every function
//! runs on a connection the caller supplies, normally the open transaction
//! of a unit of work.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgConnection;
use uuid::Uuid;

use core_kernel::{
    InstanceId, Money, Rate, ShareId, ShareTypeId, StudentId, TransactionId,
    WithdrawalLimitPeriod,
};
use domain_ledger::{Share, SharePageQuery, ShareType, Student, Transaction, TransactionType};

use crate::error::DatabaseError;

const SHARE_COLUMNS: &str = "s.id, s.student_id, s.share_type_id, s.balance, \
     s.limited_withdrawal_count, s.date_last_active, s.is_deleted, s.created_at";

const SHARE_TYPE_COLUMNS: &str = "id, name, dividend_rate, withdrawal_limit_period, \
     withdrawal_limit_count, withdrawal_limit_should_fee, withdrawal_limit_fee, \
     withdrawal_limit_last_reset, is_deleted";

fn share_type_query(for_update: bool) -> String {
    let lock = if for_update { " FOR UPDATE" } else { "" };
    format!("SELECT {} FROM share_types WHERE id = $1{}", SHARE_TYPE_COLUMNS, lock)
}

pub(crate) fn money(value: Decimal) -> Result<Money, DatabaseError> {
    Money::from_decimal(value).map_err(|e| DatabaseError::SerializationError(e.to_string()))
}

fn count(value: i32, column: &str) -> Result<u32, DatabaseError> {
    u32::try_from(value).map_err(|_| {
        DatabaseError::SerializationError(format!("Negative {}: {}", column, value))
    })
}

fn count_column(value: u32) -> Result<i32, DatabaseError> {
    i32::try_from(value)
        .map_err(|_| DatabaseError::ConstraintViolation(format!("Count out of range: {}", value)))
}

/// Database row for the students table
#[derive(Debug, sqlx::FromRow)]
pub struct StudentRow {
    pub id: Uuid,
    pub instance_id: Uuid,
    pub name: String,
    pub is_deleted: bool,
}

impl From<StudentRow> for Student {
    fn from(row: StudentRow) -> Self {
        Student {
            id: StudentId::from_uuid(row.id),
            instance_id: InstanceId::from_uuid(row.instance_id),
            name: row.name,
            is_deleted: row.is_deleted,
        }
    }
}

/// Database row for the share_types table
#[derive(Debug, sqlx::FromRow)]
pub struct ShareTypeRow {
    pub id: Uuid,
    pub name: String,
    pub dividend_rate: Decimal,
    pub withdrawal_limit_period: String,
    pub withdrawal_limit_count: i32,
    pub withdrawal_limit_should_fee: bool,
    pub withdrawal_limit_fee: Decimal,
    pub withdrawal_limit_last_reset: Option<DateTime<Utc>>,
    pub is_deleted: bool,
}

impl ShareTypeRow {
    /// Builds the domain value from the row and its linked instances
    pub fn into_domain(self, instances: Vec<Uuid>) -> Result<ShareType, DatabaseError> {
        let period: WithdrawalLimitPeriod = self
            .withdrawal_limit_period
            .parse()
            .map_err(|e: core_kernel::TemporalError| {
                DatabaseError::SerializationError(e.to_string())
            })?;
        Ok(ShareType {
            id: ShareTypeId::from_uuid(self.id),
            name: self.name,
            dividend_rate: Rate::from_decimal(self.dividend_rate)
                .map_err(|e| DatabaseError::SerializationError(e.to_string()))?,
            withdrawal_limit_period: period,
            withdrawal_limit_count: count(self.withdrawal_limit_count, "withdrawal_limit_count")?,
            withdrawal_limit_should_fee: self.withdrawal_limit_should_fee,
            withdrawal_limit_fee: money(self.withdrawal_limit_fee)?,
            withdrawal_limit_last_reset: self.withdrawal_limit_last_reset,
            is_deleted: self.is_deleted,
            instance_ids: instances.into_iter().map(InstanceId::from_uuid).collect(),
        })
    }
}

/// Database row for the shares table
#[derive(Debug, sqlx::FromRow)]
pub struct ShareRow {
    pub id: Uuid,
    pub student_id: Uuid,
    pub share_type_id: Uuid,
    pub balance: Decimal,
    pub limited_withdrawal_count: i32,
    pub date_last_active: Option<DateTime<Utc>>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<ShareRow> for Share {
    type Error = DatabaseError;

    fn try_from(row: ShareRow) -> Result<Self, Self::Error> {
        Ok(Share {
            id: ShareId::from_uuid(row.id),
            student_id: StudentId::from_uuid(row.student_id),
            share_type_id: ShareTypeId::from_uuid(row.share_type_id),
            balance: money(row.balance)?,
            limited_withdrawal_count: count(
                row.limited_withdrawal_count,
                "limited_withdrawal_count",
            )?,
            date_last_active: row.date_last_active,
            is_deleted: row.is_deleted,
            created_at: row.created_at,
        })
    }
}

/// Database row for the transactions table
#[derive(Debug, sqlx::FromRow)]
pub struct TransactionRow {
    pub id: Uuid,
    pub share_id: Uuid,
    pub amount: Decimal,
    pub new_balance: Decimal,
    pub transaction_type: String,
    pub comment: String,
    pub effective_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = DatabaseError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let transaction_type: TransactionType = row
            .transaction_type
            .parse()
            .map_err(|e: domain_ledger::LedgerError| {
                DatabaseError::SerializationError(e.to_string())
            })?;
        Ok(Transaction {
            id: TransactionId::from_uuid(row.id),
            share_id: ShareId::from_uuid(row.share_id),
            amount: money(row.amount)?,
            new_balance: money(row.new_balance)?,
            transaction_type,
            comment: row.comment,
            effective_date: row.effective_date,
            created_at: row.created_at,
        })
    }
}

/// Repository for ledger tables
pub struct LedgerRepository;

impl LedgerRepository {
    pub async fn get_student(
        conn: &mut PgConnection,
        id: StudentId,
    ) -> Result<Option<Student>, DatabaseError> {
        let row = sqlx::query_as::<_, StudentRow>(
            "SELECT id, instance_id, name, is_deleted FROM students WHERE id = $1",
        )
        .bind(*id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?;
        Ok(row.map(Student::from))
    }

    pub async fn insert_student(
        conn: &mut PgConnection,
        student: &Student,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO students (id, instance_id, name, is_deleted)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(*student.id.as_uuid())
        .bind(*student.instance_id.as_uuid())
        .bind(&student.name)
        .bind(student.is_deleted)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    async fn share_type_instances(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Vec<Uuid>, DatabaseError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT instance_id FROM share_type_instances WHERE share_type_id = $1 ORDER BY instance_id",
        )
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(ids)
    }

    /// Loads a share type without locking its row
    pub async fn get_share_type(
        conn: &mut PgConnection,
        id: ShareTypeId,
    ) -> Result<Option<ShareType>, DatabaseError> {
        Self::fetch_share_type(conn, id, false).await
    }

    /// Loads a share type and locks its row for the rest of the transaction
    pub async fn lock_share_type(
        conn: &mut PgConnection,
        id: ShareTypeId,
    ) -> Result<Option<ShareType>, DatabaseError> {
        Self::fetch_share_type(conn, id, true).await
    }

    async fn fetch_share_type(
        conn: &mut PgConnection,
        id: ShareTypeId,
        for_update: bool,
    ) -> Result<Option<ShareType>, DatabaseError> {
        let row = sqlx::query_as::<_, ShareTypeRow>(&share_type_query(for_update))
            .bind(*id.as_uuid())
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(row) => {
                let instances = Self::share_type_instances(conn, row.id).await?;
                Ok(Some(row.into_domain(instances)?))
            }
            None => Ok(None),
        }
    }

    pub async fn list_share_types(
        conn: &mut PgConnection,
    ) -> Result<Vec<ShareType>, DatabaseError> {
        let rows = sqlx::query_as::<_, ShareTypeRow>(&format!(
            "SELECT {} FROM share_types WHERE NOT is_deleted ORDER BY name, id",
            SHARE_TYPE_COLUMNS
        ))
        .fetch_all(&mut *conn)
        .await?;

        let mut share_types = Vec::with_capacity(rows.len());
        for row in rows {
            let instances = Self::share_type_instances(conn, row.id).await?;
            share_types.push(row.into_domain(instances)?);
        }
        Ok(share_types)
    }

    /// Inserts or replaces a share type along with its instance links
    pub async fn upsert_share_type(
        conn: &mut PgConnection,
        share_type: &ShareType,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO share_types (
                id, name, dividend_rate, withdrawal_limit_period, withdrawal_limit_count,
                withdrawal_limit_should_fee, withdrawal_limit_fee, withdrawal_limit_last_reset,
                is_deleted
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                dividend_rate = EXCLUDED.dividend_rate,
                withdrawal_limit_period = EXCLUDED.withdrawal_limit_period,
                withdrawal_limit_count = EXCLUDED.withdrawal_limit_count,
                withdrawal_limit_should_fee = EXCLUDED.withdrawal_limit_should_fee,
                withdrawal_limit_fee = EXCLUDED.withdrawal_limit_fee,
                withdrawal_limit_last_reset = EXCLUDED.withdrawal_limit_last_reset,
                is_deleted = EXCLUDED.is_deleted
            "#,
        )
        .bind(*share_type.id.as_uuid())
        .bind(&share_type.name)
        .bind(share_type.dividend_rate.as_decimal())
        .bind(share_type.withdrawal_limit_period.as_str())
        .bind(count_column(share_type.withdrawal_limit_count)?)
        .bind(share_type.withdrawal_limit_should_fee)
        .bind(share_type.withdrawal_limit_fee.amount())
        .bind(share_type.withdrawal_limit_last_reset)
        .bind(share_type.is_deleted)
        .execute(&mut *conn)
        .await?;

        let instances: Vec<Uuid> = share_type.instance_ids.iter().map(|i| *i.as_uuid()).collect();
        sqlx::query("DELETE FROM share_type_instances WHERE share_type_id = $1")
            .bind(*share_type.id.as_uuid())
            .execute(&mut *conn)
            .await?;
        sqlx::query(
            r#"
            INSERT INTO share_type_instances (share_type_id, instance_id)
            SELECT $1, unnest($2::uuid[])
            "#,
        )
        .bind(*share_type.id.as_uuid())
        .bind(&instances)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Loads a share and locks its row for the rest of the transaction
    pub async fn get_share(
        conn: &mut PgConnection,
        id: ShareId,
    ) -> Result<Option<Share>, DatabaseError> {
        let row = sqlx::query_as::<_, ShareRow>(&format!(
            "SELECT {} FROM shares s WHERE s.id = $1 FOR UPDATE",
            SHARE_COLUMNS
        ))
        .bind(*id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?;
        row.map(Share::try_from).transpose()
    }

    pub async fn insert_share(conn: &mut PgConnection, share: &Share) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO shares (
                id, student_id, share_type_id, balance, limited_withdrawal_count,
                date_last_active, is_deleted, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(*share.id.as_uuid())
        .bind(*share.student_id.as_uuid())
        .bind(*share.share_type_id.as_uuid())
        .bind(share.balance.amount())
        .bind(count_column(share.limited_withdrawal_count)?)
        .bind(share.date_last_active)
        .bind(share.is_deleted)
        .bind(share.created_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Updates a share only while its stored balance is `expected_balance`
    ///
    /// Returns the number of rows written: zero means the balance moved or
    /// the share does not exist.
    pub async fn update_share_if_balance(
        conn: &mut PgConnection,
        share: &Share,
        expected_balance: Money,
    ) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE shares SET
                balance = $2,
                limited_withdrawal_count = $3,
                date_last_active = $4,
                is_deleted = $5
            WHERE id = $1 AND balance = $6
            "#,
        )
        .bind(*share.id.as_uuid())
        .bind(share.balance.amount())
        .bind(count_column(share.limited_withdrawal_count)?)
        .bind(share.date_last_active)
        .bind(share.is_deleted)
        .bind(expected_balance.amount())
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn share_exists(conn: &mut PgConnection, id: ShareId) -> Result<bool, DatabaseError> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM shares WHERE id = $1)")
            .bind(*id.as_uuid())
            .fetch_one(&mut *conn)
            .await?;
        Ok(exists)
    }

    /// Keyset page over the shares of one share type, ordered by id
    pub async fn shares_page(
        conn: &mut PgConnection,
        query: &SharePageQuery,
    ) -> Result<Vec<Share>, DatabaseError> {
        let rows = sqlx::query_as::<_, ShareRow>(&format!(
            r#"
            SELECT {}
            FROM shares s
            JOIN students st ON st.id = s.student_id
            WHERE s.share_type_id = $1
              AND ($2::uuid IS NULL OR st.instance_id = $2)
              AND (NOT $3 OR (NOT s.is_deleted AND NOT st.is_deleted))
              AND ($4::uuid IS NULL OR s.id > $4)
            ORDER BY s.id
            LIMIT $5
            "#,
            SHARE_COLUMNS
        ))
        .bind(*query.share_type_id.as_uuid())
        .bind(query.instance_id.map(Uuid::from))
        .bind(query.active_only)
        .bind(query.after.map(Uuid::from))
        .bind(i64::from(query.limit))
        .fetch_all(&mut *conn)
        .await?;

        rows.into_iter().map(Share::try_from).collect()
    }

    pub async fn reset_withdrawal_counts(
        conn: &mut PgConnection,
        ids: &[ShareId],
    ) -> Result<u64, DatabaseError> {
        let ids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let result = sqlx::query(
            "UPDATE shares SET limited_withdrawal_count = 0 WHERE id = ANY($1)",
        )
        .bind(&ids)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn insert_transaction(
        conn: &mut PgConnection,
        transaction: &Transaction,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO transactions (
                id, share_id, amount, new_balance, transaction_type, comment,
                effective_date, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(*transaction.id.as_uuid())
        .bind(*transaction.share_id.as_uuid())
        .bind(transaction.amount.amount())
        .bind(transaction.new_balance.amount())
        .bind(transaction.transaction_type.code())
        .bind(&transaction.comment)
        .bind(transaction.effective_date)
        .bind(transaction.created_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Transactions of a share in insertion order
    pub async fn transactions_for_share(
        conn: &mut PgConnection,
        id: ShareId,
    ) -> Result<Vec<Transaction>, DatabaseError> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT id, share_id, amount, new_balance, transaction_type, comment,
                   effective_date, created_at
            FROM transactions
            WHERE share_id = $1
            ORDER BY seq
            "#,
        )
        .bind(*id.as_uuid())
        .fetch_all(&mut *conn)
        .await?;

        rows.into_iter().map(Transaction::try_from).collect()
    }
}
