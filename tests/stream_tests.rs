//! Tests for the stream buffer protocol

mod common;

use common::TestBackend;
use monet::{
    BufferRequest, Component, MonetError, OutputLocation, ProcessingOutput, Stream, StreamFactory,
    StreamRequest, StreamType, DEFAULT_OUTPUT_HEIGHT, DEFAULT_OUTPUT_WIDTH, MAX_BUFFERS_PER_PORT,
};

fn preview() -> OutputLocation {
    OutputLocation::new(Component::Processing, ProcessingOutput::Preview).unwrap()
}

fn build_stream(backend: &TestBackend, request: &mut StreamRequest) -> Stream {
    let mut factory = StreamFactory::new(Box::new(backend.clone())).unwrap();
    let mut stream = Stream::new();
    factory
        .initialize_stream(&mut stream, StreamType::StandardCapture, request)
        .unwrap();
    stream
}

#[test]
fn test_capture_build_seeds_processing_defaults() {
    let backend = TestBackend::new();
    let stream = build_stream(&backend, &mut StreamRequest::new());

    for port in [
        ProcessingOutput::Preview,
        ProcessingOutput::Still,
        ProcessingOutput::Video,
        ProcessingOutput::Thumbnail,
    ] {
        let location = OutputLocation::new(Component::Processing, port).unwrap();
        let counts = stream.buffer_counts(location).unwrap();
        assert_eq!(counts.requested, 4, "port {:?}", port);
        assert_eq!(counts.allocated, 0);

        let config = stream.output_port_config(location).unwrap();
        assert_eq!(config.surface().width, DEFAULT_OUTPUT_WIDTH);
        assert_eq!(config.surface().height, DEFAULT_OUTPUT_HEIGHT);
    }
}

#[test]
fn test_capture_build_propagates_source_requirements() {
    let backend = TestBackend::new();
    let stream = build_stream(&backend, &mut StreamRequest::new());

    for location in OutputLocation::ports_of(Component::Source) {
        let counts = stream.buffer_counts(location).unwrap();
        assert_eq!(counts.requested, 4);
    }
}

#[test]
fn test_custom_request_overrides_preview() {
    let backend = TestBackend::new();
    let mut request = StreamRequest::new();
    request
        .push(BufferRequest::counts(preview(), 2, 6).with_size(1920, 1080))
        .unwrap();

    let stream = build_stream(&backend, &mut request);

    let counts = stream.buffer_counts(preview()).unwrap();
    assert_eq!(counts.requested, 6);

    let config = stream.output_port_config(preview()).unwrap();
    assert_eq!(config.surface().width, 1920);
    assert_eq!(config.surface().height, 1080);

    // The other processing ports keep their defaults
    let still = OutputLocation::new(Component::Processing, ProcessingOutput::Still).unwrap();
    assert_eq!(
        stream.output_port_config(still).unwrap().surface().width,
        DEFAULT_OUTPUT_WIDTH
    );
}

#[test]
fn test_duplicate_override_rejected_at_push() {
    let mut request = StreamRequest::new();
    request
        .push(BufferRequest::counts(preview(), 2, 6).with_size(1920, 1080))
        .unwrap();
    let err = request
        .push(BufferRequest::counts(preview(), 4, 4))
        .unwrap_err();
    assert!(matches!(err, MonetError::BadParameter { .. }));
}

#[test]
fn test_operations_require_initialization() {
    let stream = Stream::new();
    let err = stream.buffer_counts(preview()).unwrap_err();
    assert!(matches!(err, MonetError::NotInitialized { .. }));

    let mut stream = Stream::new();
    let err = stream.set_buffer_count(preview(), 2, 4).unwrap_err();
    assert!(matches!(err, MonetError::NotInitialized { .. }));
}

#[test]
fn test_allocate_send_recover_cycle() {
    let backend = TestBackend::new();
    let mut stream = build_stream(&backend, &mut StreamRequest::new());

    stream.allocate_at(preview()).unwrap();
    assert_eq!(stream.buffer_counts(preview()).unwrap().allocated, 4);
    assert_eq!(backend.state.borrow().live_buffers, 4);

    stream.send_to_driver(preview()).unwrap();
    assert_eq!(stream.buffer_counts(preview()).unwrap().in_use, 4);
    assert_eq!(backend.state.borrow().gives, 4);

    stream.recover_from_driver(preview()).unwrap();
    assert_eq!(stream.buffer_counts(preview()).unwrap().in_use, 0);
    assert_eq!(backend.state.borrow().returns, 1);

    // Nothing in use: recover is a no-op
    stream.recover_from_driver(preview()).unwrap();
    assert_eq!(backend.state.borrow().returns, 1);
}

#[test]
fn test_acquire_release_round_trip() {
    let backend = TestBackend::new();
    let mut stream = build_stream(&backend, &mut StreamRequest::new());
    stream.allocate_at(preview()).unwrap();

    let acquired = stream.acquire_unused(preview(), 2).unwrap();
    assert_eq!(acquired.len(), 2);
    assert_eq!(acquired[0].id.location().unwrap(), preview());
    assert_eq!(stream.buffer_counts(preview()).unwrap().in_use, 2);

    let handles: Vec<_> = acquired.iter().map(|b| b.handle).collect();
    assert_eq!(stream.release(preview(), &handles).unwrap(), 2);
    assert_eq!(stream.buffer_counts(preview()).unwrap().in_use, 0);
}

#[test]
fn test_set_buffer_count_partial_fulfillment() {
    let backend = TestBackend::new();
    let mut stream = build_stream(&backend, &mut StreamRequest::new());

    stream.allocate_at(preview()).unwrap();
    assert_eq!(stream.buffer_counts(preview()).unwrap().allocated, 4);

    // Allow exactly two more allocations before the driver runs dry
    {
        let mut state = backend.state.borrow_mut();
        let so_far = state.allocations;
        state.fail_alloc_after = Some(so_far + 2);
    }

    let achieved = stream.set_buffer_count(preview(), 2, 8).unwrap();
    assert_eq!(achieved, 6);
    assert_eq!(stream.buffer_counts(preview()).unwrap().allocated, 6);
    // Freshly resized pools are handed straight back to the driver
    assert_eq!(stream.buffer_counts(preview()).unwrap().in_use, 6);
}

#[test]
fn test_set_buffer_count_failure_below_min_restores_size() {
    let backend = TestBackend::new();
    let mut stream = build_stream(&backend, &mut StreamRequest::new());

    stream.allocate_at(preview()).unwrap();
    {
        let mut state = backend.state.borrow_mut();
        let so_far = state.allocations;
        state.fail_alloc_after = Some(so_far + 1);
    }

    // Needs at least 8, driver can only reach 5
    let err = stream.set_buffer_count(preview(), 8, 10).unwrap_err();
    assert!(matches!(err, MonetError::Driver { .. }));
    assert_eq!(stream.buffer_counts(preview()).unwrap().allocated, 4);
}

#[test]
fn test_set_buffer_count_failure_restores_partially_filled_pool() {
    let backend = TestBackend::new();
    let mut stream = build_stream(&backend, &mut StreamRequest::new());

    // Partial fulfillment first: ask for 8, driver supplies 5
    {
        let mut state = backend.state.borrow_mut();
        let so_far = state.allocations;
        state.fail_alloc_after = Some(so_far + 5);
    }
    let achieved = stream.set_buffer_count(preview(), 2, 8).unwrap();
    assert_eq!(achieved, 5);

    // One more allocation available; the call needs two to reach its minimum
    backend.state.borrow_mut().fail_alloc_after = Some(6);
    let err = stream.set_buffer_count(preview(), 7, 8).unwrap_err();
    assert!(matches!(err, MonetError::Driver { .. }));

    // The buffer allocated by the failed call is freed again
    assert_eq!(stream.buffer_counts(preview()).unwrap().allocated, 5);
    assert_eq!(backend.state.borrow().live_buffers, 5);
    assert_eq!(stream.buffer_counts(preview()).unwrap().requested, 8);
}

#[test]
fn test_set_buffer_count_early_return_when_at_target() {
    let backend = TestBackend::new();
    let mut stream = build_stream(&backend, &mut StreamRequest::new());
    stream.allocate_at(preview()).unwrap();

    let gives_before = backend.state.borrow().gives;
    let achieved = stream.set_buffer_count(preview(), 2, 4).unwrap();
    assert_eq!(achieved, 4);
    // No recover/resize/send happened
    assert_eq!(backend.state.borrow().gives, gives_before);
    assert_eq!(backend.state.borrow().returns, 0);
}

#[test]
fn test_set_buffer_count_clamps_to_capacity() {
    let backend = TestBackend::new();
    let mut stream = build_stream(&backend, &mut StreamRequest::new());

    let achieved = stream.set_buffer_count(preview(), 2, 64).unwrap();
    assert_eq!(achieved, MAX_BUFFERS_PER_PORT);
    assert_eq!(
        stream.buffer_counts(preview()).unwrap().requested,
        MAX_BUFFERS_PER_PORT
    );
}

#[test]
fn test_set_buffer_count_validation() {
    let backend = TestBackend::new();
    let mut stream = build_stream(&backend, &mut StreamRequest::new());

    let err = stream.set_buffer_count(preview(), 6, 2).unwrap_err();
    assert!(matches!(err, MonetError::BadParameter { .. }));

    let err = stream
        .set_buffer_count(preview(), MAX_BUFFERS_PER_PORT + 1, MAX_BUFFERS_PER_PORT + 2)
        .unwrap_err();
    assert!(matches!(err, MonetError::BadParameter { .. }));

    // Failed validation leaves the pool untouched
    assert_eq!(stream.buffer_counts(preview()).unwrap().allocated, 0);
}

#[test]
fn test_set_buffer_count_shrinks_pool() {
    let backend = TestBackend::new();
    let mut stream = build_stream(&backend, &mut StreamRequest::new());

    stream.set_buffer_count(preview(), 2, 8).unwrap();
    assert_eq!(stream.buffer_counts(preview()).unwrap().allocated, 8);

    let achieved = stream.set_buffer_count(preview(), 2, 3).unwrap();
    assert_eq!(achieved, 3);
    assert_eq!(backend.state.borrow().live_buffers, 3);
}

#[test]
fn test_allocated_locations_enumeration() {
    let backend = TestBackend::new();
    let mut stream = build_stream(&backend, &mut StreamRequest::new());

    assert!(stream.allocated_locations().unwrap().is_empty());
    stream.allocate_at(preview()).unwrap();

    let locations = stream.allocated_locations().unwrap();
    assert_eq!(locations, vec![preview()]);
}

#[test]
fn test_close_frees_everything() {
    let backend = TestBackend::new();
    let mut stream = build_stream(&backend, &mut StreamRequest::new());

    stream.allocate_all().unwrap();
    stream.send_to_component(Component::Processing).unwrap();
    assert!(backend.state.borrow().live_buffers > 0);

    stream.close().unwrap();
    assert_eq!(backend.state.borrow().live_buffers, 0);
    assert!(!stream.is_initialized());

    let err = stream.buffer_counts(preview()).unwrap_err();
    assert!(matches!(err, MonetError::NotInitialized { .. }));
}
