use std::rc::Rc;

use serde::Serialize;

use crate::models::MetricsReport;

/// Notifications a session publishes to its UI listeners.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    #[serde(rename_all = "camelCase")]
    MetricsUpdated { generation: u64, report: MetricsReport },
    #[serde(rename_all = "camelCase")]
    MetricsCleared { generation: u64 },
    #[serde(rename_all = "camelCase")]
    MetricsFailed { generation: u64, reason: String },
}

pub type ListenerId = u32;

type Listener = Rc<dyn Fn(&SessionEvent)>;

/// Listener registry owned by one session.
#[derive(Default)]
pub struct EventBus {
    next_id: ListenerId,
    listeners: Vec<(ListenerId, Listener)>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: impl Fn(&SessionEvent) + 'static) -> ListenerId {
        self.next_id += 1;
        self.listeners.push((self.next_id, Rc::new(listener)));
        self.next_id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Listeners in subscription order. Callers invoke them after releasing
    /// whatever lock guards the bus, so a listener may re-enter the session.
    pub fn snapshot(&self) -> Vec<Listener> {
        self.listeners.iter().map(|(_, l)| Rc::clone(l)).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    #[test]
    fn listeners_receive_events_in_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new();

        let first = Rc::clone(&seen);
        bus.subscribe(move |e| first.borrow_mut().push(("first", e.clone())));
        let second = Rc::clone(&seen);
        bus.subscribe(move |e| second.borrow_mut().push(("second", e.clone())));

        let event = SessionEvent::MetricsCleared { generation: 3 };
        for listener in bus.snapshot() {
            listener(&event);
        }

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, "first");
        assert_eq!(seen[1].1, event);
    }

    #[test]
    fn unsubscribe_removes_only_that_listener() {
        let mut bus = EventBus::new();
        let a = bus.subscribe(|_| {});
        let b = bus.subscribe(|_| {});
        assert_ne!(a, b);

        assert!(bus.unsubscribe(a));
        assert!(!bus.unsubscribe(a));
        assert_eq!(bus.len(), 1);
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_value(SessionEvent::MetricsFailed {
            generation: 2,
            reason: "offline".to_string(),
        })
        .expect("serializable");
        assert_eq!(json["type"], "metricsFailed");
        assert_eq!(json["generation"], 2);
        assert_eq!(json["reason"], "offline");
    }
}
