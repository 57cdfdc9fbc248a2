//! Per-map session state: the engine, the metrics currently on screen and the
//! listeners that render them.
//!
//! Every compute request takes the next generation number. A result is only
//! applied if its generation is still the newest when it resolves, so a slow
//! first load can never overwrite the metrics of a later polygon. Clearing
//! the drawings advances the generation as well.

use parking_lot::Mutex;
use serde_json::Value;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::engine::MetricsEngine;
use crate::errors::LoadResult;
use crate::events::{EventBus, ListenerId, SessionEvent};
use crate::feature_index::FeatureSource;
use crate::layers::{MetricLayerId, MetricLayerSet, ParcelLayerId, Rgba};
use crate::models::{DrawnPolygon, MetricsReport};
use crate::overlay::metric_overlay;
use crate::{console_error, console_log};

/// How a compute request ended, short of a load failure.
#[derive(Debug, Clone, PartialEq)]
pub enum ComputeOutcome {
    /// Fewer than three vertices; nothing was computed or changed.
    InsufficientGeometry,
    Applied(MetricsReport),
    /// A newer request or a clear happened while this one was loading.
    Superseded,
}

#[derive(Default)]
struct SessionState {
    generation: u64,
    current: Option<MetricsReport>,
    last_polygon: Option<DrawnPolygon>,
    metric_layers: MetricLayerSet,
}

pub struct Session<S> {
    id: String,
    engine: MetricsEngine<S>,
    state: Mutex<SessionState>,
    events: Mutex<EventBus>,
}

impl<S: FeatureSource> Session<S> {
    pub fn new(source: S, config: EngineConfig) -> Self {
        let id = Uuid::new_v4().to_string();
        console_log!("Session {} reading parcels from {}", id, source.location());
        Session {
            id,
            engine: MetricsEngine::new(source, config),
            state: Mutex::new(SessionState::default()),
            events: Mutex::new(EventBus::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn engine(&self) -> &MetricsEngine<S> {
        &self.engine
    }

    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    /// Compute metrics for a finished polygon and publish them if no newer
    /// request or clear has happened in the meantime.
    pub async fn compute_metrics(&self, polygon: DrawnPolygon) -> LoadResult<ComputeOutcome> {
        if !polygon.is_measurable() {
            return Ok(ComputeOutcome::InsufficientGeometry);
        }

        let generation = self.advance_generation();

        match self.engine.compute(&polygon).await {
            Ok(report) => {
                {
                    let mut state = self.state.lock();
                    if state.generation != generation {
                        console_log!(
                            "Session {}: discarding metrics of request {} (now at {})",
                            self.id,
                            generation,
                            state.generation
                        );
                        return Ok(ComputeOutcome::Superseded);
                    }
                    state.current = Some(report);
                    state.last_polygon = Some(polygon);
                }

                self.emit(&SessionEvent::MetricsUpdated {
                    generation,
                    report,
                });
                Ok(ComputeOutcome::Applied(report))
            }
            Err(err) => {
                console_error!("Session {}: metrics unavailable: {}", self.id, err);
                if self.generation() == generation {
                    self.emit(&SessionEvent::MetricsFailed {
                        generation,
                        reason: err.to_string(),
                    });
                }
                Err(err)
            }
        }
    }

    /// Drop the displayed metrics; in-flight requests become stale.
    pub fn clear(&self) {
        let generation = {
            let mut state = self.state.lock();
            state.generation += 1;
            state.current = None;
            state.last_polygon = None;
            state.generation
        };
        self.emit(&SessionEvent::MetricsCleared { generation });
    }

    pub fn current_report(&self) -> Option<MetricsReport> {
        self.state.lock().current
    }

    pub fn subscribe(&self, listener: impl Fn(&SessionEvent) + 'static) -> ListenerId {
        self.events.lock().subscribe(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.events.lock().unsubscribe(id)
    }

    pub fn metric_layers(&self) -> MetricLayerSet {
        self.state.lock().metric_layers.clone()
    }

    pub fn toggle_metric_layer(&self, id: MetricLayerId) -> bool {
        self.state.lock().metric_layers.toggle(id)
    }

    pub fn set_all_metric_layers(&self, visible: bool) {
        self.state.lock().metric_layers.set_all(visible);
    }

    /// Overlay of the current metrics over the polygon they were computed
    /// for, or `None` when nothing is displayed.
    pub fn metric_overlay(&self) -> Option<Value> {
        let state = self.state.lock();
        match (&state.last_polygon, &state.current) {
            (Some(polygon), Some(report)) => {
                Some(metric_overlay(polygon, &report.metrics, &state.metric_layers))
            }
            _ => None,
        }
    }

    /// Choropleth colours for every parcel of the dataset.
    pub async fn parcel_colors(&self, layer: ParcelLayerId) -> LoadResult<Vec<Rgba>> {
        let collection = self.engine.index().load().await?;
        Ok(layer.parcel_colors(&collection, self.engine.config()))
    }

    fn advance_generation(&self) -> u64 {
        let mut state = self.state.lock();
        state.generation += 1;
        state.generation
    }

    // Listeners run without any session lock held
    fn emit(&self, event: &SessionEvent) {
        let listeners = self.events.lock().snapshot();
        for listener in listeners {
            listener(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use futures::executor::block_on;
    use futures::future::join3;

    use super::*;
    use crate::errors::LoadError;
    use crate::feature_index::test_sources::{FlakySource, GatedSource, StaticSource};
    use crate::models::MetricsBasis;

    const DOC: &str = r#"{"type": "FeatureCollection", "features": [
        {"geometry": {"coordinates": [[[[0.4, 0.4], [0.4, 0.6], [0.6, 0.6], [0.6, 0.4]]]]},
         "properties": {"total_carbon_2017_sum": 100, "total_carbon_2024_sum": 170}},
        {"geometry": {"coordinates": [[[[5.0, 5.0], [5.0, 5.2], [5.2, 5.2], [5.2, 5.0]]]]},
         "properties": {"total_carbon_2017_sum": 10, "total_carbon_2024_sum": 80}}
    ]}"#;

    fn square(origin: f64) -> DrawnPolygon {
        DrawnPolygon::from(vec![
            [origin, origin],
            [origin, origin + 1.0],
            [origin + 1.0, origin + 1.0],
            [origin + 1.0, origin],
        ])
    }

    fn recorder<S: FeatureSource>(session: &Session<S>) -> Rc<RefCell<Vec<SessionEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        session.subscribe(move |e| sink.borrow_mut().push(e.clone()));
        events
    }

    #[test]
    fn applied_metrics_are_stored_and_published() {
        let session = Session::new(StaticSource::new(DOC), EngineConfig::default());
        let events = recorder(&session);

        let outcome = block_on(session.compute_metrics(square(0.0))).expect("loads");
        let report = match outcome {
            ComputeOutcome::Applied(report) => report,
            other => panic!("unexpected outcome {:?}", other),
        };
        assert_eq!(report.metrics.marketable_credits, 864000.0);
        assert_eq!(session.current_report(), Some(report.clone()));
        assert_eq!(
            *events.borrow(),
            vec![SessionEvent::MetricsUpdated { generation: 1, report }]
        );
    }

    #[test]
    fn short_polygon_leaves_state_untouched() {
        let session = Session::new(StaticSource::new(DOC), EngineConfig::default());
        block_on(session.compute_metrics(square(0.0))).expect("loads");
        let events = recorder(&session);

        let segment = DrawnPolygon::from(vec![[0.0, 0.0], [1.0, 1.0]]);
        let outcome = block_on(session.compute_metrics(segment)).expect("no load");
        assert_eq!(outcome, ComputeOutcome::InsufficientGeometry);
        assert_eq!(session.generation(), 1);
        assert!(session.current_report().is_some());
        assert!(events.borrow().is_empty());
        assert_eq!(session.engine().index().source().fetches.get(), 1);
    }

    #[test]
    fn clear_discards_metrics_and_notifies() {
        let session = Session::new(StaticSource::new(DOC), EngineConfig::default());
        block_on(session.compute_metrics(square(0.0))).expect("loads");
        let events = recorder(&session);

        session.clear();
        assert!(session.current_report().is_none());
        assert!(session.metric_overlay().is_none());
        assert_eq!(*events.borrow(), vec![SessionEvent::MetricsCleared { generation: 2 }]);
    }

    #[test]
    fn stale_result_is_discarded() {
        let (source, gate) = GatedSource::new();
        let session = Session::new(source, EngineConfig::default());
        let events = recorder(&session);

        // The first request holds the load while the second queues behind it
        let (first, second, _) = block_on(join3(
            session.compute_metrics(square(0.0)),
            session.compute_metrics(square(4.5)),
            async move {
                let _ = gate.send(DOC.to_string());
            },
        ));

        assert_eq!(first.expect("loads"), ComputeOutcome::Superseded);
        let second = match second.expect("loads") {
            ComputeOutcome::Applied(report) => report,
            other => panic!("unexpected outcome {:?}", other),
        };
        assert_eq!(second.aggregation.sum_earlier_stock, 10.0);
        assert_eq!(session.current_report(), Some(second.clone()));
        assert_eq!(
            *events.borrow(),
            vec![SessionEvent::MetricsUpdated {
                generation: 2,
                report: second
            }]
        );
    }

    #[test]
    fn clear_while_loading_keeps_metrics_cleared() {
        let (source, gate) = GatedSource::new();
        let session = Session::new(source, EngineConfig::default());

        let (outcome, _, _) = block_on(join3(
            session.compute_metrics(square(0.0)),
            async { session.clear() },
            async move {
                let _ = gate.send(DOC.to_string());
            },
        ));

        assert_eq!(outcome.expect("loads"), ComputeOutcome::Superseded);
        assert!(session.current_report().is_none());
    }

    #[test]
    fn load_failure_is_reported_and_retried_next_time() {
        let source = FlakySource {
            error: LoadError::HttpStatus {
                url: "memory://flaky".to_string(),
                status: 404,
            },
            recovered: RefCell::new(None),
        };
        let session = Session::new(source, EngineConfig::default());
        let events = recorder(&session);

        let err = block_on(session.compute_metrics(square(0.0))).unwrap_err();
        assert!(matches!(err, LoadError::HttpStatus { status: 404, .. }));
        assert!(session.current_report().is_none());
        assert!(matches!(
            events.borrow()[0],
            SessionEvent::MetricsFailed { generation: 1, .. }
        ));

        *session.engine().index().source().recovered.borrow_mut() = Some(DOC.to_string());
        let outcome = block_on(session.compute_metrics(square(0.0))).expect("recovers");
        assert!(matches!(outcome, ComputeOutcome::Applied(_)));
    }

    #[test]
    fn empty_area_reports_fallback_basis() {
        let session = Session::new(StaticSource::new(DOC), EngineConfig::default());
        match block_on(session.compute_metrics(square(20.0))).expect("loads") {
            ComputeOutcome::Applied(report) => {
                assert_eq!(report.basis, MetricsBasis::AreaFallback);
                assert!(report.metrics.carbon_stocks > 0.0);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn listener_may_read_session_while_notified() {
        let session = Rc::new(Session::new(StaticSource::new(DOC), EngineConfig::default()));
        let seen = Rc::new(RefCell::new(None));

        let inner = Rc::downgrade(&session);
        let sink = Rc::clone(&seen);
        session.subscribe(move |_| {
            if let Some(session) = inner.upgrade() {
                *sink.borrow_mut() = session.current_report();
            }
        });

        block_on(session.compute_metrics(square(0.0))).expect("loads");
        assert!(seen.borrow().is_some());
    }

    #[test]
    fn overlay_follows_layer_visibility() {
        let session = Session::new(StaticSource::new(DOC), EngineConfig::default());
        block_on(session.compute_metrics(square(0.0))).expect("loads");

        assert!(!session.toggle_metric_layer(MetricLayerId::Leakage));
        let overlay = session.metric_overlay().expect("metrics shown");
        assert_eq!(overlay["features"].as_array().map(Vec::len), Some(5));

        session.set_all_metric_layers(false);
        assert!(!session.metric_layers().any_visible());
    }

    #[test]
    fn parcel_colors_reuse_loaded_collection() {
        let session = Session::new(StaticSource::new(DOC), EngineConfig::default());
        let colors = block_on(session.parcel_colors(ParcelLayerId::Growth)).expect("loads");
        assert_eq!(colors.len(), 2);
        block_on(session.compute_metrics(square(0.0))).expect("loads");
        assert_eq!(session.engine().index().source().fetches.get(), 1);
    }
}
