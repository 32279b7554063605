//! Terminal logger used by the driver when `verbose` is set.

use slog::{Drain, Logger, o};

/// Build a non-blocking terminal logger writing to stderr.
///
/// Records are formatted with `slog_term::FullFormat` and handed to a
/// `slog_async` worker thread, so logging never blocks the merge loop.
/// Dropping the returned logger flushes pending records.
pub fn term_logger() -> Logger {
    let decorator = slog_term::TermDecorator::new().stderr().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    Logger::root(drain, o!("component" => "blockwise_softmax"))
}
