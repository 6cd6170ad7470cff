//! Routing of decoded envelopes into a monitor registry.

use tracing::{debug, warn};
use trendwatch_engine::MonitorRegistry;

use crate::envelope::Envelope;

/// Counters for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteStats {
    /// Envelopes delivered to a monitor.
    pub routed: u64,
    /// Envelopes for topics that are not monitored.
    pub unrouted: u64,
}

/// Feeds envelopes to a [`MonitorRegistry`].
///
/// With `auto_subscribe` every topic seen on the stream gets a monitor;
/// otherwise envelopes for unsubscribed topics are skipped.
#[derive(Debug)]
pub struct App {
    pub registry: MonitorRegistry,
    pub auto_subscribe: bool,
    pub stats: RouteStats,
}

impl App {
    pub fn new(registry: MonitorRegistry, auto_subscribe: bool) -> Self {
        Self {
            registry,
            auto_subscribe,
            stats: RouteStats::default(),
        }
    }

    /// Deliver one envelope. Returns `true` if a monitor received it.
    pub async fn route(&mut self, envelope: Envelope) -> bool {
        let topic = envelope.topic().to_string();
        if self.auto_subscribe && self.registry.handle(&topic).is_none() {
            self.registry.subscribe(&topic);
            debug!(topic = %topic, "Auto-subscribed");
        }

        let registry = &self.registry;
        let delivered = match envelope {
            Envelope::Sample { sample, .. } => registry.route_sample(&topic, sample).await,
            Envelope::History { batch, .. } => registry.load_history(&topic, batch).await.is_ok(),
            Envelope::Threshold { threshold, .. } => {
                registry.set_threshold(&topic, threshold).await.is_ok()
            }
            Envelope::TimeFrame { time_frame, .. } => {
                registry.set_time_frame(&topic, time_frame).await.is_ok()
            }
            Envelope::Restore { persisted, .. } => {
                registry.restore(&topic, persisted).await.is_ok()
            }
        };

        if delivered {
            self.stats.routed += 1;
        } else {
            self.stats.unrouted += 1;
            if self.stats.unrouted == 1 {
                warn!(topic = %topic, "Received data for an unmonitored topic; further drops are not logged");
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use trendwatch_engine::{EngineSettings, ManualClock, TimeFrame};

    fn registry() -> MonitorRegistry {
        MonitorRegistry::builder()
            .settings(EngineSettings {
                noise_amplitude: 0.0,
                ..EngineSettings::default()
            })
            .clock(Arc::new(ManualClock::new(0)))
            .build()
    }

    fn parse(line: &str) -> Envelope {
        Envelope::parse(line, None).unwrap()
    }

    #[tokio::test]
    async fn auto_subscribe_creates_monitors() {
        let mut app = App::new(registry(), true);
        assert!(app.route(parse(r#"{"topic":"a","time":1,"value":1}"#)).await);
        assert!(app.route(parse(r#"{"topic":"b","time":1,"value":1}"#)).await);
        assert_eq!(app.registry.topics(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(app.stats.routed, 2);
    }

    #[tokio::test]
    async fn fixed_topics_skip_others() {
        let registry = registry();
        registry.subscribe("a");
        let mut app = App::new(registry, false);

        assert!(app.route(parse(r#"{"topic":"a","time":1,"value":1}"#)).await);
        assert!(!app.route(parse(r#"{"topic":"z","time":1,"value":1}"#)).await);
        assert!(!app.route(parse(r#"{"topic":"z","type":"threshold","threshold":1}"#)).await);
        assert_eq!(app.stats, RouteStats { routed: 1, unrouted: 2 });
        assert_eq!(app.registry.len(), 1);
    }

    #[tokio::test]
    async fn configuration_envelopes_reach_monitor() {
        let mut app = App::new(registry(), true);
        app.route(parse(r#"{"topic":"a","type":"threshold","threshold":20}"#)).await;
        app.route(parse(r#"{"topic":"a","type":"timeFrame","timeFrame":"1d"}"#)).await;
        app.route(parse(
            r#"{"topic":"a","type":"history","history":[{"time":1,"value":1},{"time":2,"value":2}]}"#,
        ))
        .await;
        app.route(parse(r#"{"topic":"a","time":3,"value":3}"#)).await;

        let models = app.registry.sync_all().await;
        let model = &models["a"];
        assert_eq!(model.threshold, 20.0);
        assert_eq!(model.time_frame, TimeFrame::OneDay);
        assert_eq!(model.live_series.len(), 3);
        assert_eq!(model.forecast_series.len(), 1);
    }
}
