//! Transaction and pooling example
//!
//! This example demonstrates:
//! - Committing changes
//! - Rolling back on errors, explicitly or by dropping the guard
//! - Sharing one database between pooled sessions on several threads
//!
//! Run with: cargo run --example transactions

use rust_record_store::prelude::*;
use std::thread;

record! {
    #[derive(Debug)]
    pub struct Account<'a> as "accounts" {
        pub id: i64,
        pub name: &'a str,
        pub balance: f64,
    }
}

partial! {
    pub struct Balance for Account<'_> {
        pub balance: f64,
    }
}

fn print_balances(session: &Session<'_>) -> Result<()> {
    println!("   Current balances:");
    for account in session
        .query::<Account>()
        .order_by_asc(col!(Account, id))
        .find_all()?
    {
        println!("   - {}: ${:.2}", account.name, account.balance);
    }
    Ok(())
}

fn balance_of(session: &Session<'_>, id: i64) -> Result<f64> {
    let account: Option<Account> = session.find(id)?;
    account
        .map(|a| a.balance)
        .ok_or_else(|| DatabaseError::transaction(format!("account {} does not exist", id)))
}

/// Move `amount` between two accounts inside one transaction
fn transfer(session: &Session<'_>, from: i64, to: i64, amount: f64) -> Result<()> {
    let tx = session.transaction()?;
    let from_balance = balance_of(&tx, from)?;
    let to_balance = balance_of(&tx, to)?;
    tx.update::<Account, _>(from, &Balance { balance: from_balance - amount })?;
    tx.update::<Account, _>(to, &Balance { balance: to_balance + amount })?;
    tx.commit()
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== Rust Record Store - Transaction Example ===\n");

    let pool = Pool::new::<SqliteDriver>(
        SqliteOptions::shared_memory("transactions_demo"),
        PoolConfig::new(4),
    )?;
    let session = pool.session()?;

    println!("1. Setting up accounts table...");
    session.exec_all(
        "CREATE TABLE accounts (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            balance REAL NOT NULL CHECK(balance >= 0)
        );
        INSERT INTO accounts (id, name, balance) VALUES (1, 'Alice', 1000.0);
        INSERT INTO accounts (id, name, balance) VALUES (2, 'Bob', 500.0);
        INSERT INTO accounts (id, name, balance) VALUES (3, 'Charlie', 750.0);",
    )?;
    println!("   ✓ Accounts created\n");
    print_balances(&session)?;

    println!("\n2. Successful transfer (Alice -> Bob: $100)");
    transfer(&session, 1, 2, 100.0)?;
    println!("   ✓ Transaction committed");
    print_balances(&session)?;

    println!("\n3. Failing transfer (Bob -> Charlie: $10,000)");
    match transfer(&session, 2, 3, 10_000.0) {
        Ok(()) => println!("   ✗ Transfer unexpectedly succeeded"),
        Err(e) => println!("   ✓ Rolled back: {}", e),
    }
    print_balances(&session)?;

    println!("\n4. Explicit rollback");
    {
        let tx = session.transaction()?;
        tx.exec("UPDATE accounts SET balance = 0", ())?;
        println!("   balance inside transaction: ${:.2}", balance_of(&tx, 1)?);
        tx.rollback()?;
    }
    println!("   balance after rollback: ${:.2}", balance_of(&session, 1)?);

    println!("\n5. Concurrent transfers from pooled sessions");
    drop(session);
    let results: Vec<Result<()>> = thread::scope(|scope| {
        let workers: Vec<_> = (0..4)
            .map(|worker| {
                let pool = &pool;
                scope.spawn(move || -> Result<()> {
                    let session = pool.session()?;
                    for _ in 0..5 {
                        // shared-cache tables lock per transaction; retry until it lands
                        while let Err(e) = transfer(&session, 3, 1, 1.0) {
                            if e.kind() != ErrorKind::Driver {
                                return Err(e);
                            }
                            thread::yield_now();
                        }
                    }
                    println!("   worker {} done", worker);
                    Ok(())
                })
            })
            .collect();
        workers
            .into_iter()
            .map(|worker| {
                worker
                    .join()
                    .unwrap_or_else(|_| Err(DatabaseError::transaction("worker panicked")))
            })
            .collect()
    });
    for result in results {
        result?;
    }
    let stats = pool.stats();
    println!(
        "   pool: size {}, idle {}, in use {}",
        stats.size, stats.idle, stats.in_use
    );

    let session = pool.session()?;
    print_balances(&session)?;

    println!("\n=== Example completed successfully ===");
    Ok(())
}
