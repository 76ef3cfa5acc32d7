use std::marker::PhantomData;
use std::sync::{Arc, Mutex};
use tracing::Level;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

/// Initialize logging for the application
pub fn init_logging() {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tonk_server=debug"));

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set global default subscriber");
}

/// Captured log line for assertions in tests.
#[derive(Debug, Clone)]
pub struct CapturedLog {
    pub level: Level,
    pub target: String,
    pub message: String,
}

/// Log capture for tests. Build a layer from it, install with
/// `tracing::subscriber::with_default`, then assert on the captured
/// lines.
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
    lines: Arc<Mutex<Vec<CapturedLog>>>,
}

impl LogCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<CapturedLog> {
        self.lines.lock().expect("log capture poisoned").clone()
    }

    pub fn contains(&self, fragment: &str) -> bool {
        self.lines().iter().any(|line| line.message.contains(fragment))
    }

    pub fn into_layer<S>(self) -> CaptureLayer<S>
    where
        S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    {
        CaptureLayer {
            capture: self,
            _phantom: PhantomData,
        }
    }
}

pub struct CaptureLayer<S> {
    capture: LogCapture,
    _phantom: PhantomData<S>,
}

impl<S> Layer<S> for CaptureLayer<S>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let line = CapturedLog {
            level: *metadata.level(),
            target: metadata.target().to_string(),
            message: visitor.rendered,
        };
        self.capture
            .lines
            .lock()
            .expect("log capture poisoned")
            .push(line);
    }
}

#[derive(Default)]
struct MessageVisitor {
    rendered: String,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if !self.rendered.is_empty() {
            self.rendered.push(' ');
        }
        if field.name() == "message" {
            self.rendered.push_str(&format!("{value:?}"));
        } else {
            self.rendered
                .push_str(&format!("{}={:?}", field.name(), value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{info, warn};
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::Registry;

    #[test]
    fn capture_records_levels_and_fields() {
        let capture = LogCapture::new();
        let registry = Registry::default().with(capture.clone().into_layer());

        tracing::subscriber::with_default(registry, || {
            info!(table_id = "abc", "game started");
            warn!("slow consumer");
        });

        let lines = capture.lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].level, Level::INFO);
        assert!(capture.contains("game started"));
        assert!(capture.contains("table_id"));
        assert_eq!(lines[1].level, Level::WARN);
    }
}
