use crate::level::LogLevel;
use crate::record::Location;
use crate::source::SourceRegistry;
use std::collections::BTreeMap;
use std::sync::{Arc, atomic::{AtomicU64, Ordering}};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// Target prefix of this crate's own events. They are never routed into the
/// registry, so a watched source cannot feed the listener's diagnostics back
/// into itself.
const OWN_TARGET: &str = "log_listener";

/// `tracing_subscriber` layer that turns every `tracing` event into an
/// emission on a named [`crate::source::Source`].
///
/// The event target becomes the source name with `::` replaced by `.`, so
/// `hyper::proto::h1::conn` is emitted on `hyper.proto.h1.conn` and reaches
/// a listener watching `hyper` through propagation.
pub struct SourceLayer {
    registry: Arc<SourceRegistry>,
    /// Total events seen by the layer.
    pub total_events: Arc<AtomicU64>,
    /// Events routed into the registry.
    pub routed_events: Arc<AtomicU64>,
}

impl SourceLayer {
    pub fn new(registry: Arc<SourceRegistry>) -> Self {
        Self {
            registry,
            total_events: Arc::new(AtomicU64::new(0)),
            routed_events: Arc::new(AtomicU64::new(0)),
        }
    }
}

/// Dotted source name for a `tracing` target.
pub fn source_name(target: &str) -> String {
    target.replace("::", ".")
}

impl<S> Layer<S> for SourceLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);

        let meta = event.metadata();
        let target = meta.target();
        if target.split("::").next() == Some(OWN_TARGET) {
            return;
        }

        let mut fields = BTreeMap::new();
        let mut message: Option<String> = None;

        let mut visitor = FieldVisitor { fields: &mut fields, message: &mut message };
        event.record(&mut visitor);

        let location = Location::new(
            meta.file().unwrap_or_default(),
            meta.line().unwrap_or_default(),
            meta.module_path().unwrap_or_default(),
        );

        self.registry.emit(
            &source_name(target),
            LogLevel::from(*meta.level()).value(),
            message.unwrap_or_default(),
            location,
            fields,
        );
        self.routed_events.fetch_add(1, Ordering::Relaxed);
    }
}

use tracing::field::{Field, Visit};

pub struct FieldVisitor<'a> {
    pub fields: &'a mut BTreeMap<String, serde_json::Value>,
    pub message: &'a mut Option<String>,
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.fields.insert(field.name().to_string(), serde_json::Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        // `message` arrives here when built from format arguments.
        if field.name() == "message" {
            *self.message = Some(format!("{:?}", value));
        } else {
            self.fields.insert(field.name().to_string(), serde_json::Value::String(format!("{:?}", value)));
        }
    }
}
