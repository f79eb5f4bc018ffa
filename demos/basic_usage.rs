//! Basic record store usage example
//!
//! This example demonstrates basic operations including:
//! - Declaring records and partial payloads
//! - Opening a session
//! - Inserting, finding, updating and deleting records
//! - Filtered queries and aggregates
//!
//! Run with: cargo run --example basic_usage

use rust_record_store::prelude::*;

record! {
    #[derive(Debug)]
    pub struct User<'a> as "users" {
        pub id: i64,
        pub username: &'a str,
        pub email: &'a str,
        pub age: Option<i64>,
        pub balance: f64,
        pub is_active: bool,
    }
}

partial! {
    pub struct NewUser<'a> for User<'a> {
        pub username: &'a str,
        pub email: &'a str,
        pub age: Option<i64>,
        pub balance: f64,
    }
}

partial! {
    pub struct Deactivate for User<'_> {
        pub is_active: bool,
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== Rust Record Store - Basic Usage Example ===\n");

    println!("1. Opening session...");
    let session = Session::open::<SqliteDriver>(&SqliteOptions::memory())?;
    println!("   ✓ Opened ({})\n", session.connection().backend_name());

    println!("2. Creating table...");
    session.exec_all(
        "CREATE TABLE users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL,
            email TEXT NOT NULL,
            age INTEGER,
            balance REAL NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1
        )",
    )?;
    println!("   ✓ Table created\n");

    println!("3. Inserting records...");
    let users = [
        ("alice", "alice@example.com", Some(30), 1500.50),
        ("bob", "bob@example.com", Some(25), 2300.75),
        ("charlie", "charlie@example.com", None, 980.25),
        ("diana", "diana@example.com", Some(28), 3200.00),
    ];
    for (username, email, age, balance) in users {
        let id = session.insert::<User, _>(&NewUser {
            username,
            email,
            age,
            balance,
        })?;
        println!("   ✓ Inserted {} with id {}", username, id);
    }
    println!();

    println!("4. Querying all users...");
    let all = session
        .query::<User>()
        .order_by_asc(col!(User, id))
        .find_all()?;
    println!("   Found {} users:", all.len());
    for user in &all {
        let age = user
            .age
            .map(|age| age.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        println!(
            "   - [{}] {} <{}>, age {}, balance ${:.2}",
            user.id, user.username, user.email, age, user.balance
        );
    }
    println!();

    println!("5. Filtered query (balance > 1000, oldest first)...");
    let rich = session
        .query::<User>()
        .where_gt(col!(User, balance), 1000.0)
        .where_not_null(col!(User, age))
        .order_by_desc(col!(User, age));
    println!("   SQL: {}", rich.to_sql()?);
    for user in rich.find_all()? {
        println!("   - {} (${:.2})", user.username, user.balance);
    }
    println!();

    println!("6. Aggregates...");
    let users = session.query::<User>();
    println!("   count:       {}", users.clone().count("*")?);
    println!("   with age:    {}", users.clone().count(col!(User, age))?);
    println!("   min balance: {:?}", users.clone().min::<f64>(col!(User, balance))?);
    println!("   max balance: {:?}", users.max::<f64>(col!(User, balance))?);
    println!();

    println!("7. Updating and deleting...");
    let changed = session.update::<User, _>(2, &Deactivate { is_active: false })?;
    println!("   ✓ Deactivated {} user(s)", changed);
    let bob: Option<User> = session.find(2)?;
    if let Some(bob) = bob {
        println!("   bob active: {}", bob.is_active);
    }
    let removed = session.delete::<User>(3)?;
    println!("   ✓ Deleted {} user(s)", removed);
    let active = session
        .query::<User>()
        .where_eq(col!(User, is_active), true)
        .count("*")?;
    println!("   active users left: {}", active);
    println!();

    println!("8. Raw SQL with positional parameters...");
    let total: Option<f64> = session.get(
        "SELECT SUM(balance) FROM users WHERE age >= ?",
        (26,),
    )?;
    println!("   total balance of users aged 26+: {:?}", total);
    println!("   arena bytes in use: {}", session.allocated_bytes());

    println!("\n=== Example completed successfully ===");
    Ok(())
}
