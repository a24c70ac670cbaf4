use tracing::subscriber::set_global_default;
use tracing::Subscriber;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_log::LogTracer;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Registry};

/// Compose the bunyan-style JSON subscriber used by the server.
///
/// `RUST_LOG` wins over `env_filter` when it is set. `sink` decides where the
/// records go, usually `std::io::stdout`.
pub fn get_subscriber<Sink>(
    name: String,
    env_filter: String,
    sink: Sink,
) -> impl Subscriber + Sync + Send
where
    Sink: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(env_filter));

    let formatting_layer = BunyanFormattingLayer::new(name, sink);

    // JsonStorageLayer keeps span fields around so every record carries its request context.
    Registry::default()
        .with(env_filter)
        .with(JsonStorageLayer)
        .with(formatting_layer)
}

/// Install `subscriber` globally. Call once, at process start.
pub fn init_subscriber(subscriber: impl Subscriber + Sync + Send) {
    // sqlx logs through the `log` facade.
    LogTracer::init().expect("Failed to set logger");
    set_global_default(subscriber).expect("Failed to set subscriber");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_records_are_bunyan_json_with_span_fields() {
        let captured = Captured::default();
        let sink = captured.clone();
        let subscriber =
            get_subscriber("workhours-test".into(), "info".into(), move || sink.clone());

        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::error_span!("http_request", request_id = "abc123");
            let _guard = span.enter();
            tracing::error!(date = "2024-01-01", "storage failure");
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        let records: Vec<Value> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        let record = records
            .iter()
            .find(|r| r["msg"] == "storage failure")
            .expect("event was not written to the sink");

        assert_eq!(record["name"], "workhours-test");
        assert_eq!(record["date"], "2024-01-01");
        assert_eq!(record["request_id"], "abc123");
    }
}
