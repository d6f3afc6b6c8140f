//! Integration tests for the cross-thread proxy pipe
//!
//! These tests validate:
//! - FIFO delivery from a producer thread to a consumer thread
//! - Replay of the producer graph when the pipe is attached
//! - Unregistering and re-binding the producer side

mod common;

use common::builders::path_graph;
use common::recording::RecordingSink;
use graphvis_rs::graph::{Element, Graph};
use graphvis_rs::stream::{thread_proxy_pipe, EventKind, Source, ThreadProxyPipe};
use graphvis_rs::GraphError;
use proptest::prelude::*;
use std::rc::Rc;
use std::thread;

/// Pump until every producer is gone.
fn drain(pipe: &ThreadProxyPipe) {
    loop {
        match pipe.blocking_pump(0) {
            Ok(()) => {}
            Err(GraphError::Channel(_)) => break,
            Err(e) => panic!("unexpected pump error: {}", e),
        }
    }
}

/// Adds `count` nodes on a producer thread and collects the labels seen by
/// the consumer.
fn run_producer(count: usize) -> Vec<String> {
    let (input, output) = thread_proxy_pipe("consumer");

    let producer = thread::spawn(move || {
        let graph = Graph::new("producer");
        let _proxy = input.attach(graph.clone()).unwrap();
        for i in 0..count {
            graph.add_node(&format!("n{}", i)).unwrap();
        }
    });

    let pipe = output.into_pipe();
    let recorder = Rc::new(RecordingSink::new());
    pipe.add_sink(recorder.clone()).unwrap();
    drain(&pipe);
    producer.join().unwrap();

    recorder.labels()
}

#[test]
fn test_events_cross_threads_in_order() {
    let labels = run_producer(100);
    let expected: Vec<String> = (0..100).map(|i| format!("node_added:n{}", i)).collect();
    assert_eq!(labels, expected);
}

#[test]
fn test_attach_replays_existing_state() {
    let graph = path_graph("g", 3);
    graph.node("n0").unwrap().set_attribute("ui.label", "first").unwrap();

    let (input, output) = thread_proxy_pipe("view");
    let proxy = input.attach(graph.clone()).unwrap();
    let pipe = output.into_pipe();
    let recorder = Rc::new(RecordingSink::new());
    pipe.add_sink(recorder.clone()).unwrap();

    pipe.pump().unwrap();
    assert_eq!(
        recorder.labels(),
        vec![
            "node_added:n0",
            "attr:node:n0:ui.label",
            "node_added:n1",
            "node_added:n2",
            "edge_added:e0",
            "edge_added:e1",
        ]
    );
    // Replayed events carry the replay's own source id
    assert!(recorder.events()[0].source_id.starts_with("g-replay-"));

    graph.add_node("n3").unwrap();
    assert!(pipe.has_post_remaining());
    pipe.pump().unwrap();
    let last = recorder.events().pop().unwrap();
    assert_eq!(last.source_id, "g");
    assert!(proxy.is_attached());
}

#[test]
fn test_pump_is_non_blocking_and_timeout_is_not_an_error() {
    let graph = Graph::new("g");
    let (input, output) = thread_proxy_pipe("view");
    let _proxy = input.attach(graph.clone()).unwrap();
    let pipe = output.into_pipe();

    pipe.pump().unwrap();
    assert!(pipe.blocking_pump(10).is_ok());
    assert!(!pipe.has_post_remaining());
}

#[test]
fn test_dropping_producer_disconnects_consumer() {
    let graph = Graph::new("g");
    let (input, output) = thread_proxy_pipe("view");
    let proxy = input.attach(graph.clone()).unwrap();
    let pipe = output.into_pipe();

    graph.add_node("a").unwrap();
    proxy.detach().unwrap();
    drop(proxy);
    assert_eq!(graph.element_sink_count(), 0);

    // What was posted is still delivered before the disconnect shows
    let recorder = Rc::new(RecordingSink::new());
    pipe.add_sink(recorder.clone()).unwrap();
    assert!(pipe.blocking_pump(0).is_ok());
    assert_eq!(recorder.len(), 1);
    assert!(matches!(pipe.blocking_pump(0), Err(GraphError::Channel(_))));
}

#[test]
fn test_unregister_from_source() {
    let graph = Graph::new("g");
    let (input, output) = thread_proxy_pipe("view");
    let proxy = input.attach(graph.clone()).unwrap();
    let pipe = output.into_pipe();
    let recorder = Rc::new(RecordingSink::new());
    pipe.add_sink(recorder.clone()).unwrap();

    graph.add_node("a").unwrap();
    pipe.unregister_from_source();
    // The next event triggers the unregistration and is not forwarded
    graph.add_node("b").unwrap();
    graph.add_node("c").unwrap();
    pipe.pump().unwrap();

    assert_eq!(recorder.labels(), vec!["node_added:a"]);
    assert!(!proxy.is_attached());
    assert_eq!(graph.element_sink_count(), 0);
    assert_eq!(graph.attribute_sink_count(), 0);
}

#[test]
fn test_rebinding_discards_backlog_and_replays_new_source() {
    let first = Graph::new("first");
    let second = path_graph("second", 2);
    let (input, output) = thread_proxy_pipe("view");
    let proxy = input.attach(first.clone()).unwrap();
    let pipe = output.into_pipe();
    let recorder = Rc::new(RecordingSink::new());
    pipe.add_sink(recorder.clone()).unwrap();

    first.add_node("stale").unwrap();
    proxy
        .init(Some(second.clone() as Rc<dyn Source>), true)
        .unwrap();
    first.add_node("ignored").unwrap();
    pipe.pump().unwrap();

    assert_eq!(
        recorder.labels(),
        vec!["node_added:n0", "node_added:n1", "edge_added:e0"]
    );
    assert_eq!(first.element_sink_count(), 0);
    assert_eq!(second.element_sink_count(), 1);
}

#[test]
fn test_mixed_events_keep_identity_across_threads() {
    let (input, output) = thread_proxy_pipe("consumer");

    let producer = thread::spawn(move || {
        let graph = Graph::new("p");
        let _proxy = input.attach(graph.clone()).unwrap();
        graph.add_node("a").unwrap();
        graph.add_node("b").unwrap();
        graph.add_edge("ab", "a", "b", true).unwrap();
        graph.edge("ab").unwrap().set_attribute("w", 1.5).unwrap();
        graph.step_begins(2.0).unwrap();
        graph.clear().unwrap();
    });

    let pipe = output.into_pipe();
    let recorder = Rc::new(RecordingSink::new());
    pipe.add_sink(recorder.clone()).unwrap();
    drain(&pipe);
    producer.join().unwrap();

    assert_eq!(recorder.time_ids(), vec![1, 2, 3, 4, 5, 6]);
    assert!(recorder.events().iter().all(|e| e.source_id == "p"));
    assert!(matches!(
        recorder.events()[2].kind,
        EventKind::EdgeAdded { directed: true, .. }
    ));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_no_loss_no_duplication(count in 1usize..200) {
        let labels = run_producer(count);
        prop_assert_eq!(labels.len(), count);
        for (i, label) in labels.iter().enumerate() {
            prop_assert_eq!(label, &format!("node_added:n{}", i));
        }
    }
}
