use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_tree::HierarchicalLayer;
use tracing_tree::time::Uptime;

const DEFAULT_FILTER: &str = "info";

/// Installs the global subscriber.
///
/// The filter is read from `RUST_LOG` and falls back to `info`. Spans are
/// printed as an indented tree so that actor-thread work nests under the
/// refresh cycle that submitted it.
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let tree = HierarchicalLayer::new(2)
        .with_indent_lines(true)
        .with_targets(true)
        .with_thread_names(true)
        .with_deferred_spans(true)
        .with_span_retrace(true)
        .with_timer(Uptime::default());
    tracing_subscriber::registry().with(filter).with(tree).init();
}
