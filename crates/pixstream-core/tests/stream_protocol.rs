//! Integration tests for the output-stream event protocol.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use pixstream_core::{OutputStream, SinkError, SinkEvent, StreamState};
use pixstream_test_support::MockEngine;

#[test]
fn test_chunks_delivered_intact() {
    let engine = Arc::new(MockEngine::new());
    let mut stream = OutputStream::new(engine.clone()).unwrap();

    let seen: Arc<Mutex<Vec<Vec<u8>>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    stream
        .on_write(move |chunk| {
            sink.lock().unwrap().push(chunk.to_vec());
            Ok(chunk.len())
        })
        .unwrap();

    // Lengths 0, 1, and a chunk with interior NUL bytes.
    assert_eq!(engine.fire_write(stream.handle(), b""), 0);
    assert_eq!(engine.fire_write(stream.handle(), b"x"), 1);
    assert_eq!(engine.fire_write(stream.handle(), b"a\0b\0c"), 5);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[0], b"");
    assert_eq!(seen[1], b"x");
    assert_eq!(seen[2], b"a\0b\0c");
}

#[test]
fn test_events_in_order_once_each() {
    let engine = Arc::new(MockEngine::new());
    let mut stream = OutputStream::new(engine.clone()).unwrap();

    let order: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&order);
    stream
        .on_write(move |chunk| {
            sink.lock().unwrap().push(chunk[0]);
            Ok(chunk.len())
        })
        .unwrap();

    for byte in 0u8..8 {
        engine.fire_write(stream.handle(), &[byte]);
    }

    assert_eq!(*order.lock().unwrap(), (0u8..8).collect::<Vec<_>>());
}

#[test]
fn test_end_to_end_accumulation() {
    let engine = Arc::new(MockEngine::new());
    let mut stream = OutputStream::new(engine.clone()).unwrap();

    let accumulated: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&accumulated);
    stream
        .on_write(move |chunk| {
            sink.lock().unwrap().extend_from_slice(chunk);
            Ok(chunk.len())
        })
        .unwrap();

    let completed = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&completed);
    stream
        .on_finish(move || flag.store(true, Ordering::Release))
        .unwrap();

    assert_eq!(engine.fire_write(stream.handle(), b"AB"), 2);
    assert_eq!(engine.fire_write(stream.handle(), b"CDE"), 3);
    engine.fire_finish(stream.handle());

    assert_eq!(*accumulated.lock().unwrap(), b"ABCDE");
    assert!(completed.load(Ordering::Acquire));
}

#[test]
fn test_allocation_failure_yields_no_adapter() {
    let engine = Arc::new(MockEngine::failing());
    let result = OutputStream::new(engine.clone());

    assert!(matches!(result, Err(SinkError::Allocation)));
    assert_eq!(engine.created_count(), 0);
}

#[test]
fn test_short_write_passes_through() {
    let engine = Arc::new(MockEngine::new());
    let mut stream = OutputStream::new(engine.clone()).unwrap();

    // Consume only one byte per event, whatever arrives.
    stream.on_write(|chunk| Ok(chunk.len().min(1))).unwrap();

    assert_eq!(engine.fire_write(stream.handle(), b"ABCDE"), 1);
    assert_eq!(engine.fire_write(stream.handle(), b""), 0);
}

#[test]
fn test_callback_error_reported_on_error_channel() {
    let engine = Arc::new(MockEngine::new());
    let mut stream = OutputStream::new(engine.clone()).unwrap();

    stream
        .on_write(|_| Err(anyhow::anyhow!("sink rejected chunk")))
        .unwrap();

    assert_eq!(engine.fire_write(stream.handle(), b"AB"), -1);

    let error = stream.take_last_error().expect("failure should be recorded");
    assert!(matches!(
        error,
        SinkError::Callback {
            event: SinkEvent::Write,
            ..
        }
    ));
    assert!(error.to_string().contains("sink rejected chunk"));
    // The retrieval channel is take-once.
    assert!(stream.take_last_error().is_none());
}

#[test]
fn test_callback_panic_does_not_unwind_into_engine() {
    let engine = Arc::new(MockEngine::new());
    let mut stream = OutputStream::new(engine.clone()).unwrap();

    stream.on_write(|_| panic!("boom")).unwrap();

    assert_eq!(engine.fire_write(stream.handle(), b"AB"), -1);

    let error = stream.take_last_error().expect("panic should be recorded");
    assert!(error.to_string().contains("boom"));

    // The stream stays usable for the engine's own error handling.
    assert_eq!(stream.state(), StreamState::Writing);
}

#[test]
fn test_overclaimed_count_rejected() {
    let engine = Arc::new(MockEngine::new());
    let mut stream = OutputStream::new(engine.clone()).unwrap();

    stream.on_write(|chunk| Ok(chunk.len() + 1)).unwrap();

    assert_eq!(engine.fire_write(stream.handle(), b"AB"), -1);
    assert!(matches!(
        stream.take_last_error(),
        Some(SinkError::Callback {
            event: SinkEvent::Write,
            ..
        })
    ));
}

#[test]
fn test_finish_panic_recorded() {
    let engine = Arc::new(MockEngine::new());
    let mut stream = OutputStream::new(engine.clone()).unwrap();

    stream.on_finish(|| panic!("flush failed")).unwrap();
    engine.fire_finish(stream.handle());

    assert!(matches!(
        stream.take_last_error(),
        Some(SinkError::Callback {
            event: SinkEvent::Finish,
            ..
        })
    ));
    assert_eq!(stream.state(), StreamState::Finished);
}

#[test]
fn test_duplicate_registration_rejected() {
    let engine = Arc::new(MockEngine::new());
    let mut stream = OutputStream::new(engine).unwrap();

    stream.on_write(|chunk| Ok(chunk.len())).unwrap();
    let result = stream.on_write(|chunk| Ok(chunk.len()));

    assert!(matches!(
        result,
        Err(SinkError::ProtocolMisuse {
            event: SinkEvent::Write,
            ..
        })
    ));
}

#[test]
fn test_registration_after_active_use_rejected() {
    let engine = Arc::new(MockEngine::new());
    let mut stream = OutputStream::new(engine.clone()).unwrap();

    stream.on_write(|chunk| Ok(chunk.len())).unwrap();
    engine.fire_write(stream.handle(), b"AB");

    let result = stream.on_finish(|| {});
    assert!(matches!(
        result,
        Err(SinkError::ProtocolMisuse {
            event: SinkEvent::Finish,
            ..
        })
    ));
}

#[test]
fn test_state_transitions() {
    let engine = Arc::new(MockEngine::new());
    let mut stream = OutputStream::new(engine.clone()).unwrap();
    stream.on_write(|chunk| Ok(chunk.len())).unwrap();
    stream.on_finish(|| {}).unwrap();

    assert_eq!(stream.state(), StreamState::Constructed);

    engine.fire_write(stream.handle(), b"AB");
    assert_eq!(stream.state(), StreamState::Writing);
    engine.fire_write(stream.handle(), b"CD");
    assert_eq!(stream.state(), StreamState::Writing);

    engine.fire_finish(stream.handle());
    assert_eq!(stream.state(), StreamState::Finished);
}

#[test]
fn test_drop_releases_native_stream() {
    let engine = Arc::new(MockEngine::new());
    let stream = OutputStream::new(engine.clone()).unwrap();
    let handle = stream.handle();

    assert!(!engine.released(handle));
    drop(stream);
    assert!(engine.released(handle));
}

#[test]
fn test_handlers_connected_at_registration_time() {
    let engine = Arc::new(MockEngine::new());
    let mut stream = OutputStream::new(engine.clone()).unwrap();

    assert!(!engine.connected(stream.handle(), SinkEvent::Write));
    stream.on_write(|chunk| Ok(chunk.len())).unwrap();
    assert!(engine.connected(stream.handle(), SinkEvent::Write));

    assert!(!engine.connected(stream.handle(), SinkEvent::Finish));
    stream.on_finish(|| {}).unwrap();
    assert!(engine.connected(stream.handle(), SinkEvent::Finish));
}
