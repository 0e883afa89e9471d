use tokio_postgres::GenericClient;

use crate::balances;
use crate::errors::{AuctionError, Result};
use crate::models::{Balance, User, UserId};

fn row_to_user(row: &tokio_postgres::Row) -> User {
    User {
        id: UserId(row.get("id")),
        created_at: row.get("created_at"),
        balance: Balance {
            available: row.get("available"),
            reserved: row.get("reserved"),
            spent: row.get("spent"),
        },
        total_topups: row.get("total_topups"),
    }
}

/// Locks the row for the rest of the caller's transaction and reads the
/// current balance, so the arithmetic `balances::*` applies below is never
/// racing a concurrent mutation of the same user.
async fn lock_balance<C: GenericClient>(client: &C, id: UserId) -> Result<Balance> {
    let row = client
        .query_opt("SELECT available, reserved, spent FROM users WHERE id = $1 FOR UPDATE", &[&id.0])
        .await?
        .ok_or_else(|| AuctionError::NotFound(format!("user {id}")))?;
    Ok(Balance {
        available: row.get("available"),
        reserved: row.get("reserved"),
        spent: row.get("spent"),
    })
}

async fn write_balance<C: GenericClient>(client: &C, id: UserId, balance: Balance, total_topups_delta: i64) -> Result<User> {
    let row = client
        .query_one(
            "UPDATE users SET available = $2, reserved = $3, spent = $4, total_topups = total_topups + $5
             WHERE id = $1
             RETURNING *",
            &[&id.0, &balance.available, &balance.reserved, &balance.spent, &total_topups_delta],
        )
        .await?;
    Ok(row_to_user(&row))
}

pub async fn insert<C: GenericClient>(client: &C, user: &User) -> Result<()> {
    client
        .execute(
            "INSERT INTO users (id, created_at, available, reserved, spent, total_topups)
             VALUES ($1, $2, $3, $4, $5, $6)",
            &[
                &user.id.0,
                &user.created_at,
                &user.balance.available,
                &user.balance.reserved,
                &user.balance.spent,
                &user.total_topups,
            ],
        )
        .await?;
    Ok(())
}

pub async fn get<C: GenericClient>(client: &C, id: UserId) -> Result<User> {
    let row = client
        .query_opt("SELECT * FROM users WHERE id = $1", &[&id.0])
        .await?
        .ok_or_else(|| AuctionError::NotFound(format!("user {id}")))?;
    Ok(row_to_user(&row))
}

/// `topup` (SPEC_FULL §4.2): available += amount, totalTopups += amount.
/// Fails `NOT_FOUND` if the user does not exist. Locks the row, applies
/// `balances::topup`, then writes the resulting absolute balance back —
/// `balances.rs` is the only place that knows the arithmetic.
pub async fn apply_topup<C: GenericClient>(client: &C, id: UserId, amount: i64) -> Result<User> {
    debug_assert!(amount > 0);
    let balance = lock_balance(client, id).await?;
    let new_balance = balances::topup(balance, amount);
    write_balance(client, id, new_balance, amount).await
}

/// `reserve`: available -= delta, reserved += delta, predicated on
/// `available >= delta`. Returns `None` (`INSUFFICIENT_FUNDS`, mapped by the
/// caller) when `balances::reserve`'s predicate misses.
pub async fn try_reserve<C: GenericClient>(client: &C, id: UserId, delta: i64) -> Result<Option<User>> {
    debug_assert!(delta > 0);
    let balance = lock_balance(client, id).await?;
    match balances::reserve(balance, delta) {
        Ok(new_balance) => Ok(Some(write_balance(client, id, new_balance, 0).await?)),
        Err(balances::InsufficientFunds) => Ok(None),
    }
}

/// `unreserve`: reserved -= amount, available += amount, predicated on
/// `reserved >= amount`. A predicate miss here is always an invariant
/// violation — every call site knows the amount was actually reserved.
pub async fn unreserve<C: GenericClient>(client: &C, id: UserId, amount: i64) -> Result<User> {
    debug_assert!(amount > 0);
    let balance = lock_balance(client, id).await?;
    let new_balance = balances::unreserve(balance, amount).ok_or_else(|| {
        AuctionError::InvariantViolation(format!(
            "user {id} had insufficient reserved balance to unreserve {amount}"
        ))
    })?;
    write_balance(client, id, new_balance, 0).await
}

/// Settlement of a winning bid: reserved -= amount, spent += paid,
/// available += refunded, where `amount = paid + refunded`.
pub async fn settle_winner<C: GenericClient>(
    client: &C,
    id: UserId,
    amount: i64,
    paid: i64,
    refunded: i64,
) -> Result<User> {
    debug_assert_eq!(paid + refunded, amount);
    let balance = lock_balance(client, id).await?;
    let new_balance = balances::settle_winner(balance, amount, paid, refunded).ok_or_else(|| {
        AuctionError::InvariantViolation(format!(
            "user {id} had insufficient reserved balance to settle {amount}"
        ))
    })?;
    write_balance(client, id, new_balance, 0).await
}

pub async fn global_conservation_sums<C: GenericClient>(
    client: &C,
) -> Result<(i64, i64, i64, i64, i64)> {
    let row = client
        .query_one(
            "SELECT
                COALESCE(SUM(total_topups), 0),
                COALESCE(SUM(available), 0),
                COALESCE(SUM(reserved), 0),
                COALESCE(SUM(spent), 0),
                COUNT(*) FILTER (WHERE available < 0 OR reserved < 0 OR spent < 0)
             FROM users",
            &[],
        )
        .await?;
    Ok((
        row.get(0),
        row.get(1),
        row.get(2),
        row.get(3),
        row.get::<_, i64>(4),
    ))
}
