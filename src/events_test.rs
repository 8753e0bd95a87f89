use std::cell::RefCell;
use std::rc::Rc;

use uuid::Uuid;

use super::*;

fn recorder(bus: &mut EventBus, filter: impl Into<EventFilter>) -> (SubscriptionId, Rc<RefCell<Vec<SceneEvent>>>) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let id = bus.subscribe(filter, move |event: &SceneEvent| sink.borrow_mut().push(event.clone()));
    (id, seen)
}

#[test]
fn every_kind_round_trips_through_its_name() {
    for kind in EventKind::ALL {
        assert_eq!(kind.as_str().parse::<EventKind>(), Ok(kind));
        assert_eq!(kind.to_string(), kind.as_str());
    }
}

#[test]
fn unknown_name_is_an_error() {
    let err = "object:exploded".parse::<EventKind>().unwrap_err();
    assert_eq!(err, UnknownEventName("object:exploded".into()));
}

#[test]
fn listener_receives_only_its_kind() {
    let mut bus = EventBus::new();
    let (_, seen) = recorder(&mut bus, EventKind::ObjectAdded);
    let id = Uuid::new_v4();
    bus.emit(&SceneEvent::ObjectRemoved { id });
    bus.emit(&SceneEvent::ObjectAdded { id });
    assert_eq!(seen.borrow().as_slice(), &[SceneEvent::ObjectAdded { id }]);
}

#[test]
fn all_filter_receives_everything_in_order() {
    let mut bus = EventBus::new();
    let (_, seen) = recorder(&mut bus, EventFilter::All);
    let id = Uuid::new_v4();
    bus.emit(&SceneEvent::SelectionCreated { id });
    bus.emit(&SceneEvent::SelectionCleared { previous: id });
    let kinds: Vec<EventKind> = seen.borrow().iter().map(SceneEvent::kind).collect();
    assert_eq!(kinds, vec![EventKind::SelectionCreated, EventKind::SelectionCleared]);
}

#[test]
fn kinds_filter_matches_any_listed() {
    let filter = EventFilter::Kinds(vec![EventKind::ObjectMoving, EventKind::ObjectScaling]);
    assert!(filter.matches(EventKind::ObjectScaling));
    assert!(!filter.matches(EventKind::ObjectRotating));
}

#[test]
fn unsubscribe_stops_delivery() {
    let mut bus = EventBus::new();
    let (sub, seen) = recorder(&mut bus, EventFilter::All);
    assert!(bus.unsubscribe(sub));
    assert!(!bus.unsubscribe(sub));
    bus.emit(&SceneEvent::ObjectAdded { id: Uuid::new_v4() });
    assert!(seen.borrow().is_empty());
    assert!(bus.listeners.is_empty());
}

#[test]
fn listeners_run_in_subscription_order() {
    let mut bus = EventBus::new();
    let order = Rc::new(RefCell::new(Vec::new()));
    for n in 0..3 {
        let order = Rc::clone(&order);
        bus.subscribe(EventFilter::All, move |_: &SceneEvent| order.borrow_mut().push(n));
    }
    bus.emit(&SceneEvent::ViewportChanged { zoom: 1.0, pan_x: 0.0, pan_y: 0.0 });
    assert_eq!(*order.borrow(), vec![0, 1, 2]);
}

#[test]
fn events_serialize_with_wire_name_tag() {
    let value = serde_json::to_value(SceneEvent::ViewportChanged { zoom: 2.0, pan_x: 3.0, pan_y: 4.0 }).unwrap();
    assert_eq!(value["type"], "viewport:changed");
    assert_eq!(value["panX"], 3.0);

    let value = serde_json::to_value(SceneEvent::MouseDown { x: 1.0, y: 2.0, target: None }).unwrap();
    assert_eq!(value["type"], "mouse:down");
    assert!(value["target"].is_null());
}
