//! Criterion benchmarks for rust_record_store

use criterion::{
    black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput,
};
use rust_record_store::prelude::*;

record! {
    pub struct User<'a> as "users" {
        pub id: i64,
        pub name: &'a str,
        pub email: &'a str,
        pub age: i64,
        pub avatar: Option<&'a [u8]>,
    }
}

partial! {
    pub struct NewUser<'a> for User<'a> {
        pub name: &'a str,
        pub email: &'a str,
        pub age: i64,
    }
}

// ============================================================================
// Value Marshaling Benchmarks
// ============================================================================

fn bench_marshal(c: &mut Criterion) {
    let mut group = c.benchmark_group("marshal");
    group.throughput(Throughput::Elements(1));
    let arena = Arena::new();

    group.bench_function("i64_to_sql", |b| {
        b.iter(|| black_box(123456789i64).to_sql(&arena).unwrap());
    });

    group.bench_function("str_to_sql", |b| {
        b.iter_batched_ref(
            Arena::new,
            |arena| {
                black_box(black_box("Hello, World!").to_sql(arena).unwrap());
            },
            BatchSize::SmallInput,
        );
    });

    group.bench_function("i32_from_sql", |b| {
        b.iter(|| i32::from_sql(black_box(DatabaseValue::Integer(42))).unwrap());
    });

    group.bench_function("str_from_sql", |b| {
        b.iter(|| <&str>::from_sql(black_box(DatabaseValue::Text("Hello"))).unwrap());
    });

    for size in [16usize, 1024, 65536] {
        let blob = vec![0xabu8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("blob_to_arena", size), &blob, |b, blob| {
            b.iter_batched_ref(
                Arena::new,
                |arena| {
                    black_box(blob.to_sql(arena).unwrap());
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

// ============================================================================
// SQL Rendering Benchmarks
// ============================================================================

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");
    let session = Session::open::<SqliteDriver>(&SqliteOptions::memory()).unwrap();

    group.bench_function("select_filtered", |b| {
        b.iter(|| {
            session
                .query::<User>()
                .where_ge(col!(User, age), black_box(18))
                .where_like(col!(User, email), "%@example.com")
                .order_by_desc(col!(User, id))
                .limit(20)
                .to_sql()
                .unwrap()
        });
    });

    group.bench_function("partial_values", |b| {
        let user = NewUser {
            name: "Alice",
            email: "alice@example.com",
            age: 30,
        };
        b.iter_batched_ref(
            Arena::new,
            |arena| {
                black_box(black_box(&user).to_values(arena).unwrap());
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

// ============================================================================
// SQLite CRUD Benchmarks
// ============================================================================

fn user_session() -> Session<'static> {
    let session = Session::open::<SqliteDriver>(&SqliteOptions::memory()).unwrap();
    session
        .exec_all(
            "CREATE TABLE users (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL,
                age INTEGER NOT NULL,
                avatar BLOB
            )",
        )
        .unwrap();
    session
}

fn bench_crud(c: &mut Criterion) {
    let mut group = c.benchmark_group("sqlite_crud");

    group.bench_function("insert", |b| {
        let session = user_session();
        b.iter(|| {
            session
                .insert::<User, _>(&NewUser {
                    name: "Alice",
                    email: "alice@example.com",
                    age: 30,
                })
                .unwrap()
        });
    });

    group.bench_function("insert_in_transaction_x100", |b| {
        let session = user_session();
        b.iter(|| {
            let tx = session.transaction().unwrap();
            for age in 0..100 {
                tx.insert::<User, _>(&NewUser {
                    name: "Bob",
                    email: "bob@example.com",
                    age,
                })
                .unwrap();
            }
            tx.commit().unwrap();
        });
    });

    for rows in [10i64, 100, 1000] {
        let mut session = user_session();
        {
            let tx = session.transaction().unwrap();
            for age in 0..rows {
                tx.insert::<User, _>(&NewUser {
                    name: "Carol",
                    email: "carol@example.com",
                    age,
                })
                .unwrap();
            }
            tx.commit().unwrap();
        }
        session.reset_arena();

        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::new("find_all", rows), &rows, |b, _| {
            b.iter_batched_ref(
                Arena::new,
                |arena| {
                    let mut statement = session
                        .connection()
                        .prepare("SELECT id, name, email, age, avatar FROM users")
                        .unwrap();
                    let users: Vec<User> = statement.collect(arena).unwrap();
                    black_box(users.len())
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.bench_function("find_by_id", |b| {
        let session = user_session();
        let id = session
            .insert::<User, _>(&NewUser {
                name: "Dave",
                email: "dave@example.com",
                age: 40,
            })
            .unwrap();
        let connection = session.connection();
        b.iter_batched_ref(
            Arena::new,
            |arena| {
                let mut statement = connection
                    .prepare("SELECT id, name, email, age, avatar FROM users WHERE id = ?")
                    .unwrap();
                statement.bind_value(0, &id, arena).unwrap();
                let user: Option<User> = statement.next(arena).unwrap();
                black_box(user.map(|u| u.age))
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

// ============================================================================
// Pool Benchmarks
// ============================================================================

fn bench_pool(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool");
    let pool = Pool::new::<SqliteDriver>(SqliteOptions::memory(), PoolConfig::new(4)).unwrap();

    group.bench_function("checkout_checkin", |b| {
        b.iter(|| {
            let connection = pool.checkout().unwrap();
            pool.checkin(black_box(connection));
        });
    });

    group.bench_function("pooled_session_query", |b| {
        b.iter(|| {
            let session = pool.session().unwrap();
            let one: Option<i64> = session.get("SELECT 1", ()).unwrap();
            black_box(one)
        });
    });

    group.finish();
}

criterion_group!(benches, bench_marshal, bench_render, bench_crud, bench_pool);
criterion_main!(benches);
