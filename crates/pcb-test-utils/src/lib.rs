//! Fixtures shared by the synthesis tests: a small lab catalog and a bench
//! for wiring circuits against it.

pub mod bench;
pub mod catalog;

pub use bench::Bench;
pub use catalog::lab_catalog;

/// Routes `log` output through the test harness. Safe to call repeatedly.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
