//! # uthreads demo
//!
//! Runs three green threads on one OS thread:
//!
//! | Thread | Body       | Behavior |
//! |--------|------------|----------|
//! | 0      | `producer` | Takes the semaphore, burns CPU while holding it, releases |
//! | 1      | `producer` | Same, so the two contend and yield to each other |
//! | 2      | `reporter` | Prints every thread's virtual time once per round |
//!
//! Expected output: the reporter's lines arrive roughly once per full
//! rotation (three quanta), and the producers' virtual times grow at
//! similar rates. Stop it with Ctrl-C.

use std::hint;
use std::sync::atomic::{AtomicU64, Ordering};

use uthreads::sync::critical_section;
use uthreads::BinarySemaphore;

const THREADS: i32 = 3;
const BURN_ITERATIONS: u64 = 20_000_000;

static LOCK: BinarySemaphore = BinarySemaphore::new(1);
static HANDOFFS: AtomicU64 = AtomicU64::new(0);

fn tracing_init() {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .without_time()
        .finish();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("tracing already initialized: {err}");
    }
}

fn burn() {
    for _ in 0..BURN_ITERATIONS {
        hint::spin_loop();
    }
}

/// Holds the semaphore for a while, then gives it up.
fn producer(n: i32) {
    loop {
        if let Err(err) = LOCK.acquire() {
            critical_section(|_cs| tracing::error!(thread = n, "acquire failed: {err}"));
            return;
        }
        burn();
        HANDOFFS.fetch_add(1, Ordering::Relaxed);
        LOCK.release();
        burn();
    }
}

/// Reports virtual time of every thread, then burns CPU until the next round.
fn reporter(_n: i32) {
    loop {
        critical_section(|_cs| {
            let vtimes: Vec<u64> = (0..THREADS as usize).map(uthreads::get_vtime).collect();
            println!(
                "vtime (ms): {:?}  handoffs: {}  transfers: {}",
                vtimes,
                HANDOFFS.load(Ordering::Relaxed),
                uthreads::stats().transfers
            );
        });
        burn();
        burn();
    }
}

/// Report a setup failure and exit with the runtime's status code.
///
/// Misuse means the demo itself is wrong; anything else is the host
/// refusing a resource.
fn exit_on(stage: &str, err: uthreads::RuntimeError) -> ! {
    if err.is_misuse() {
        tracing::error!(stage, "demo called the runtime out of order: {err}");
    } else {
        tracing::error!(stage, "host refused a runtime resource: {err}");
    }
    eprintln!("{stage} failed: {err}");
    std::process::exit(err.code().abs())
}

fn main() {
    tracing_init();

    if let Err(err) = uthreads::init(THREADS) {
        exit_on("init", err);
    }
    for n in 0..THREADS - 1 {
        if let Err(err) = uthreads::spawn(producer, n) {
            exit_on("spawn", err);
        }
    }
    if let Err(err) = uthreads::spawn(reporter, THREADS - 1) {
        exit_on("spawn", err);
    }

    // Only returns on failure.
    match uthreads::start() {
        Ok(never) => match never {},
        Err(err) => exit_on("start", err),
    }
}
