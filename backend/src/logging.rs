use std::fmt::Write as _;

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::Context, EnvFilter, Layer, Registry};

const DEFAULT_FILTER: &str = "warn,retailstar_backend=info,tower_http=warn";

/// Message plus any structured fields, in the order they were recorded.
#[derive(Default)]
struct EventVisitor {
    message: String,
    fields: Vec<(&'static str, String)>,
}

impl EventVisitor {
    fn push(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message.push_str(&value);
        } else {
            self.fields.push((field.name(), value));
        }
    }
}

impl Visit for EventVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.push(field, format!("{:?}", value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, value.to_string());
    }
}

/// Marker for a log line. Debug output is only kept for the spin, rotation,
/// recorder and rate limiter modules.
fn event_tag(target: &str, level: &Level) -> Option<&'static str> {
    if *level == Level::ERROR {
        return Some("❌");
    }
    if *level == Level::WARN {
        return Some("⚠️");
    }

    let domain = if target.ends_with("backend_spin_game") {
        Some("🎰")
    } else if target.ends_with("rotation_service") {
        Some("🔁")
    } else if target.ends_with("spin_recorder") {
        Some("📼")
    } else if target.ends_with("rate_limiter") {
        Some("⛔")
    } else {
        None
    };

    if *level == Level::INFO {
        Some(domain.unwrap_or("ℹ️"))
    } else if *level == Level::DEBUG {
        domain
    } else {
        None
    }
}

fn format_line(timestamp: &str, tag: &str, target: &str, visitor: &EventVisitor) -> String {
    let mut line = format!("[{}] {} {} - {}", timestamp, tag, target, visitor.message);
    for (name, value) in &visitor.fields {
        let _ = write!(line, " {}={}", name, value);
    }
    line
}

struct MallLayer;

impl<S: Subscriber> Layer<S> for MallLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();

        if metadata.target().starts_with("redis") {
            return;
        }

        let Some(tag) = event_tag(metadata.target(), metadata.level()) else {
            return;
        };

        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);
        if visitor.message.is_empty() && visitor.fields.is_empty() {
            return;
        }

        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string();
        println!("{}", format_line(&timestamp, tag, metadata.target(), &visitor));
    }
}

/// Installs the subscriber. `try_init` also bridges `log` records from the shared crate.
pub fn setup() -> Result<(), TryInitError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    Registry::default()
        .with(env_filter)
        .with(MallLayer)
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPIN: &str = "retailstar_backend::games::backend_spin_game";
    const ROTATION: &str = "retailstar_backend::services::rotation_service";

    #[test]
    fn test_domain_events_get_their_own_tag() {
        assert_eq!(event_tag(SPIN, &Level::INFO), Some("🎰"));
        assert_eq!(event_tag(ROTATION, &Level::INFO), Some("🔁"));
        assert_eq!(event_tag("retailstar_backend::services::spin_recorder", &Level::DEBUG), Some("📼"));
        assert_eq!(event_tag("retailstar_backend::rate_limiter", &Level::INFO), Some("⛔"));
        assert_eq!(event_tag("retailstar_backend", &Level::INFO), Some("ℹ️"));
    }

    #[test]
    fn test_severity_wins_and_stray_debug_is_dropped() {
        assert_eq!(event_tag(SPIN, &Level::ERROR), Some("❌"));
        assert_eq!(event_tag(ROTATION, &Level::WARN), Some("⚠️"));
        assert_eq!(event_tag("retailstar_backend::config", &Level::DEBUG), None);
        assert_eq!(event_tag(SPIN, &Level::TRACE), None);
    }

    #[test]
    fn test_line_carries_structured_fields() {
        let visitor = EventVisitor {
            message: "Spin resolved: Jackpot".to_string(),
            fields: vec![("wallet", "abc".to_string()), ("balance", "5 -> 0".to_string())],
        };
        assert_eq!(
            format_line("2024-01-01 00:00:00.000", "🎰", SPIN, &visitor),
            format!("[2024-01-01 00:00:00.000] 🎰 {} - Spin resolved: Jackpot wallet=abc balance=5 -> 0", SPIN)
        );
    }
}
