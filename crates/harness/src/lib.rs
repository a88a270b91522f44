pub mod app;
pub mod backend;

pub use app::{Reported, TestApp};
pub use backend::MockBackend;

/// Routes `tracing` output to the test writer, filtered by `RUST_LOG`.
/// Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
