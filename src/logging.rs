//! Construction of logging handles.
//!
//! The library never installs a global subscriber. Callers build a
//! [`Dispatch`] here (or anywhere else) and hand it to
//! [`SubjectReader::with_dispatch`](crate::reader::SubjectReader::with_dispatch).

use tracing::{Dispatch, Level};
use tracing_subscriber::fmt::MakeWriter;

/// Human-readable log lines on stderr, at `level` and above
pub fn dispatch(level: Level) -> Dispatch {
    Dispatch::new(
        tracing_subscriber::fmt()
            .with_max_level(level)
            .with_target(false)
            .with_writer(std::io::stderr)
            .finish(),
    )
}

/// Like [`dispatch`], writing to `writer` without ANSI colours
pub fn dispatch_to_writer<W>(level: Level, writer: W) -> Dispatch
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    Dispatch::new(
        tracing_subscriber::fmt()
            .with_max_level(level)
            .with_target(false)
            .with_ansi(false)
            .with_writer(writer)
            .finish(),
    )
}
