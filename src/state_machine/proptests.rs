//! Property-based tests for the widget state machine
//!
//! These tests verify key invariants hold across arbitrary event sequences.

use super::state::*;
use super::transition::*;
use super::*;
use proptest::prelude::*;
use std::time::Duration;

fn test_context() -> WidgetContext {
    WidgetContext::new(Duration::from_millis(400))
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        Just(Event::IconActivated),
        Just(Event::CloseActivated),
        (0u64..6).prop_map(|token| Event::TransitionElapsed { token }),
        prop_oneof![Just(String::new()), Just("  ".to_string()), "[a-z ]{1,12}"]
            .prop_map(|text| Event::Submit { text }),
        Just(Event::TranscriptChanged),
        Just(Event::ResponseFinished),
    ]
}

/// Run a sequence, keeping the old model whenever a transition is rejected
fn run(events: &[Event]) -> (WidgetModel, Vec<(WidgetModel, Event, Result<TransitionResult, TransitionError>)>) {
    let ctx = test_context();
    let mut model = WidgetModel::default();
    let mut trace = Vec::new();
    for event in events {
        let result = transition(&model, &ctx, event.clone());
        let before = model;
        if let Ok(r) = &result {
            model = r.new_model;
        }
        trace.push((before, event.clone(), result));
    }
    (model, trace)
}

proptest! {
    /// Tokens only grow, and every scheduled timer uses a fresh token
    #[test]
    fn scheduled_tokens_are_unique(events in proptest::collection::vec(arb_event(), 0..60)) {
        let (_, trace) = run(&events);
        let mut seen = std::collections::HashSet::new();
        for (before, _, result) in &trace {
            if let Ok(r) = result {
                prop_assert!(r.new_model.next_token >= before.next_token);
                for effect in &r.effects {
                    if let Effect::ScheduleTransition { token, .. } = effect {
                        prop_assert!(seen.insert(*token), "token {} scheduled twice", token);
                    }
                }
            }
        }
    }

    /// While a transition is pending, only its own timer can move the widget
    #[test]
    fn transitions_are_exclusive(events in proptest::collection::vec(arb_event(), 0..60)) {
        let (_, trace) = run(&events);
        for (before, event, result) in &trace {
            let pending = match before.widget {
                WidgetState::Opening { token } | WidgetState::Closing { token } => Some(token),
                _ => None,
            };
            if let (Some(pending), Ok(r)) = (pending, result) {
                if r.new_model.widget != before.widget {
                    prop_assert_eq!(event, &Event::TransitionElapsed { token: pending });
                }
            }
        }
    }

    /// A submission is only ever accepted when open, idle, and non-blank
    #[test]
    fn submissions_are_gated(events in proptest::collection::vec(arb_event(), 0..60)) {
        let (_, trace) = run(&events);
        for (before, event, result) in &trace {
            if let (Event::Submit { text }, Ok(r)) = (event, result) {
                prop_assert!(before.is_open());
                prop_assert_eq!(before.request, RequestLifecycle::Idle);
                prop_assert!(!text.trim().is_empty());
                prop_assert_eq!(r.new_model.request, RequestLifecycle::InFlight);
                let sends = r.effects.iter().filter(|e| matches!(e, Effect::SendMessage { .. })).count();
                prop_assert_eq!(sends, 1);
            }
        }
    }

    /// Only submissions and finished replies touch the request lifecycle
    #[test]
    fn lifecycle_changes_only_on_submit_or_finish(events in proptest::collection::vec(arb_event(), 0..60)) {
        let (_, trace) = run(&events);
        for (before, event, result) in &trace {
            if let Ok(r) = result {
                if r.new_model.request != before.request {
                    let expected = matches!(event, Event::Submit { .. } | Event::ResponseFinished);
                    prop_assert!(expected, "lifecycle changed on {:?}", event);
                }
            }
        }
    }

    /// Scroll requests are only produced while the transcript is visible
    #[test]
    fn scrolling_requires_open(events in proptest::collection::vec(arb_event(), 0..60)) {
        let (_, trace) = run(&events);
        for (_, _, result) in &trace {
            if let Ok(r) = result {
                if r.effects.contains(&Effect::ScrollToLatest) {
                    prop_assert!(r.new_model.is_open());
                }
            }
        }
    }
}

#[test]
fn rapid_activation_opens_exactly_once() {
    let mut events = vec![Event::IconActivated];
    events.extend(std::iter::repeat_n(Event::IconActivated, 10));
    events.push(Event::TransitionElapsed { token: 1 });
    events.extend(std::iter::repeat_n(Event::TransitionElapsed { token: 1 }, 3));

    let (model, trace) = run(&events);
    let opened = trace
        .iter()
        .filter(|(before, _, result)| {
            matches!(result, Ok(r) if r.new_model.widget == WidgetState::Open && before.widget != WidgetState::Open)
        })
        .count();
    assert_eq!(opened, 1);
    assert_eq!(model.widget, WidgetState::Open);
}
