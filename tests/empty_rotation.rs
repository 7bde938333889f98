//! Every thread returns at once, so the last exit leaves nothing to
//! rotate to. The runtime must report it and exit with status 1 instead of
//! falling back into `start`.
//!
//! The binary runs itself as a child with `CHILD_ENV` set: the child hosts
//! the runtime, the parent checks how it died.

mod common;

use std::env;
use std::process::Command;
use std::time::Duration;

use common::watchdog;
use uthreads::sync::critical_section;

const CHILD_ENV: &str = "UTHREADS_EMPTY_ROTATION_CHILD";
const DIAGNOSTIC: &str = "scheduler found no runnable thread";

fn returns_at_once(arg: i32) {
    critical_section(|_cs| println!("thread {arg} finished"));
}

fn child() {
    watchdog(Duration::from_secs(30));

    uthreads::init(2).unwrap();
    uthreads::spawn(returns_at_once, 0).unwrap();
    uthreads::spawn(returns_at_once, 1).unwrap();

    match uthreads::start() {
        Ok(never) => match never {},
        Err(err) => println!("start returned: {err}"),
    }
}

fn main() {
    if env::var_os(CHILD_ENV).is_some() {
        child();
        return;
    }

    let exe = env::current_exe().unwrap();
    let output = Command::new(exe).env(CHILD_ENV, "1").output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert_eq!(
        output.status.code(),
        Some(1),
        "unexpected exit status {:?}\nstdout:\n{stdout}\nstderr:\n{stderr}",
        output.status
    );
    assert!(stdout.contains("thread 0 finished"), "stdout:\n{stdout}");
    assert!(stdout.contains("thread 1 finished"), "stdout:\n{stdout}");
    assert!(!stdout.contains("start returned"), "stdout:\n{stdout}");
    assert!(stderr.contains(DIAGNOSTIC), "stderr:\n{stderr}");
    println!("empty_rotation: ok");
}
