#[cfg(feature = "trace")]
use std::path::Path;

/// Keeps the background log writer alive; dropping it flushes the file.
#[must_use]
pub struct TraceGuard {
    #[cfg(feature = "trace")]
    _writer: Option<tracing_appender::non_blocking::WorkerGuard>,
}

/// Install the JSON subscriber. With a log directory the events go to
/// `dectool-trace.jsonl` inside it, otherwise to stderr.
#[cfg(feature = "trace")]
pub fn init_tracing(log_dir: Option<&Path>) -> TraceGuard {
    use tracing_subscriber::fmt::format::FmtSpan;
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dec_core=debug"));
    let builder = tracing_subscriber::fmt()
        .json()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_env_filter(filter);

    match log_dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::never(dir, "dectool-trace.jsonl");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            builder.with_writer(non_blocking).init();
            TraceGuard {
                _writer: Some(guard),
            }
        }
        None => {
            builder.with_writer(std::io::stderr).init();
            TraceGuard { _writer: None }
        }
    }
}

#[cfg(not(feature = "trace"))]
pub fn init_tracing(_log_dir: Option<&std::path::Path>) -> TraceGuard {
    TraceGuard {}
}
