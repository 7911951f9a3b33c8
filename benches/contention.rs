//! Booking throughput and contention against an in-process engine.
//!
//! Run with `cargo bench --bench contention`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use ulid::Ulid;

use pension::access::Identity;
use pension::engine::{Engine, EngineError, NewBooking, RoomRequest};

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.3}ms, p50={:.3}ms, p95={:.3}ms, p99={:.3}ms, max={:.3}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies.last().unwrap().as_secs_f64() * 1000.0,
    );
}

fn open_engine(name: &str) -> Arc<Engine> {
    let dir = std::env::temp_dir().join(format!("pension_bench_{}", Ulid::new()));
    std::fs::create_dir_all(&dir).unwrap();
    Arc::new(Engine::open(dir.join(name)).unwrap())
}

async fn room(engine: &Engine, name: &str) -> Ulid {
    engine
        .create_room(RoomRequest {
            name: name.into(),
            capacity: 1,
            price_per_night: Decimal::new(3500, 2),
            description: None,
        })
        .await
        .unwrap()
        .id
}

fn stay(room_id: Ulid, first: NaiveDate, offset: u64) -> NewBooking {
    // Two nights plus the inclusive turnover day: stays never touch.
    let check_in = first + Days::new(offset * 3);
    NewBooking {
        room_id,
        check_in,
        check_out: check_in + Days::new(2),
        notes: None,
        on_behalf_of: None,
    }
}

/// Back-to-back stays on one room from a single task.
async fn phase1_sequential(first: NaiveDate) {
    let engine = open_engine("sequential.wal");
    let room_id = room(&engine, "Sequential").await;

    let n = 2000;
    let mut latencies = Vec::with_capacity(n);
    let start = Instant::now();
    for i in 0..n {
        let t = Instant::now();
        engine
            .create_booking(&Identity::Admin, stay(room_id, first, i as u64))
            .await
            .unwrap();
        latencies.push(t.elapsed());
    }

    let elapsed = start.elapsed();
    let ops = n as f64 / elapsed.as_secs_f64();
    println!("  {n} bookings in {:.2}s = {ops:.0} ops/sec", elapsed.as_secs_f64());
    print_latency("write latency", &mut latencies);
}

/// One task per room; group commit batches their WAL writes.
async fn phase2_parallel_rooms(first: NaiveDate) {
    let engine = open_engine("parallel.wal");
    let n_tasks = 10;
    let n_per_task = 200;

    let start = Instant::now();
    let mut handles = Vec::new();
    for t in 0..n_tasks {
        let engine = engine.clone();
        let room_id = room(&engine, &format!("Room {t}")).await;
        handles.push(tokio::spawn(async move {
            for j in 0..n_per_task {
                engine
                    .create_booking(&Identity::Admin, stay(room_id, first, j))
                    .await
                    .unwrap();
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    let elapsed = start.elapsed();
    let total = n_tasks * n_per_task as usize;
    let ops = total as f64 / elapsed.as_secs_f64();
    println!(
        "  {n_tasks} tasks x {n_per_task} bookings = {total} total in {:.2}s = {ops:.0} ops/sec",
        elapsed.as_secs_f64()
    );
}

/// Every task races for the same stays. Exactly one wins each round.
async fn phase3_contended(first: NaiveDate) {
    let engine = open_engine("contended.wal");
    let room_id = room(&engine, "Contended").await;
    let n_tasks = 32;
    let rounds = 100;

    let start = Instant::now();
    let mut winners = 0;
    let mut conflicts = 0;
    for round in 0..rounds {
        let mut handles = Vec::with_capacity(n_tasks);
        for _ in 0..n_tasks {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine
                    .create_booking(&Identity::Admin, stay(room_id, first, round))
                    .await
            }));
        }
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => winners += 1,
                Err(EngineError::Conflict(_)) => conflicts += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
    }

    assert_eq!(winners, rounds);
    println!(
        "  {rounds} rounds x {n_tasks} racers in {:.2}s: {winners} bookings, {conflicts} conflicts",
        start.elapsed().as_secs_f64()
    );
}

fn main() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap();
    let first = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();

    runtime.block_on(async {
        println!("phase 1: sequential bookings");
        phase1_sequential(first).await;
        println!("phase 2: parallel rooms");
        phase2_parallel_rooms(first).await;
        println!("phase 3: contended room");
        phase3_contended(first).await;
    });
}
