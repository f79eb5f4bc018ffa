//! Value types example
//!
//! This example demonstrates how host types map to database values:
//! - Integers, reals, text and blobs
//! - Optional columns and NULL
//! - Dense enums stored by ordinal
//! - JSON and chrono columns
//! - Decode errors for mismatched types
//!
//! Run with: cargo run --example value_types

use chrono::{NaiveDate, Utc};
use rust_record_store::prelude::*;
use serde::{Deserialize, Serialize};

sql_enum! {
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub enum Priority { Low, Normal, High, Urgent }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub tags: Vec<String>,
    pub estimate_hours: f32,
}

record! {
    #[derive(Debug)]
    pub struct Task<'a> as "tasks" {
        pub id: i64,
        pub title: &'a str,
        pub done: bool,
        pub priority: Priority,
        pub progress: f64,
        pub attachment: Option<&'a [u8]>,
        pub metadata: Option<Json<Metadata>>,
        pub due: Option<NaiveDate>,
        pub created_at: chrono::DateTime<Utc>,
    }
}

partial! {
    pub struct NewTask<'a> for Task<'a> {
        pub title: &'a str,
        pub priority: Priority,
        pub attachment: Option<&'a [u8]>,
        pub metadata: Option<Json<Metadata>>,
        pub due: Option<NaiveDate>,
        pub created_at: chrono::DateTime<Utc>,
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== Rust Record Store - Value Types Example ===\n");

    let session = Session::open::<SqliteDriver>(&SqliteOptions::memory())?;

    println!("1. Creating table with various column types...");
    session.exec_all(
        "CREATE TABLE tasks (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            done INTEGER NOT NULL DEFAULT 0,
            priority INTEGER NOT NULL,
            progress REAL NOT NULL DEFAULT 0.0,
            attachment BLOB,
            metadata TEXT,
            due TEXT,
            created_at TEXT NOT NULL
        )",
    )?;
    println!("   ✓ Table created\n");

    println!("2. Inserting records with different value types...");
    let bytes = b"%PDF-1.7";
    session.insert::<Task, _>(&NewTask {
        title: "Write report",
        priority: Priority::High,
        attachment: Some(&bytes[..]),
        metadata: Some(Json(Metadata {
            tags: vec!["work".to_string(), "q3".to_string()],
            estimate_hours: 4.5,
        })),
        due: NaiveDate::from_ymd_opt(2025, 9, 30),
        created_at: Utc::now(),
    })?;
    session.insert::<Task, _>(&NewTask {
        title: "Water plants",
        priority: Priority::Low,
        attachment: None,
        metadata: None,
        due: None,
        created_at: Utc::now(),
    })?;
    println!("   ✓ Data inserted\n");

    println!("3. Reading records back...\n");
    for task in session.query::<Task>().find_all()? {
        println!("   Task #{}: {}", task.id, task.title);
        println!("     done:       {}", task.done);
        println!("     priority:   {:?} (stored as {})", task.priority, task.priority.ordinal());
        println!("     progress:   {:.1}", task.progress);
        match task.attachment {
            Some(bytes) => println!("     attachment: {} bytes", bytes.len()),
            None => println!("     attachment: none"),
        }
        match &task.metadata {
            Some(meta) => println!(
                "     metadata:   tags {:?}, ~{}h",
                meta.tags, meta.estimate_hours
            ),
            None => println!("     metadata:   NULL"),
        }
        println!("     due:        {:?}", task.due);
        println!("     created:    {}\n", task.created_at.to_rfc3339());
    }

    println!("4. Raw dynamic values...\n");
    let row: Row = session
        .fetch_one("SELECT id, title, progress, attachment, metadata FROM tasks", ())?
        .ok_or_else(|| DatabaseError::decode("row", "no rows"))?;
    for (index, value) in row.values().iter().enumerate() {
        println!("   column {}: {:<8} {}", index, value.type_name(), value);
    }
    println!();

    println!("5. Decode errors...\n");
    match session.get::<i64, _>("SELECT title FROM tasks", ()) {
        Ok(v) => println!("   ✗ unexpected value {:?}", v),
        Err(e) => println!("   text as integer: {}", e),
    }
    match session.get::<Priority, _>("SELECT 9", ()) {
        Ok(v) => println!("   ✗ unexpected value {:?}", v),
        Err(e) => println!("   ordinal 9 as Priority: {}", e),
    }
    match session.get::<f64, _>("SELECT due FROM tasks WHERE due IS NULL", ()) {
        Ok(v) => println!("   ✗ unexpected value {:?}", v),
        Err(e) => println!("   NULL as f64: {}", e),
    }
    let optional: Option<Option<f64>> =
        session.get("SELECT due FROM tasks WHERE due IS NULL", ())?;
    println!("   NULL as Option<f64>: {:?}", optional);

    println!("\n=== Example completed successfully ===");
    Ok(())
}
