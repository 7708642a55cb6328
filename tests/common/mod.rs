//! Shared fake driver backend for integration tests

// Each test binary uses a different subset of the fakes
#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use monet::{
    BufferAllocator, BufferConfiguration, BufferHandle, BufferHandler, Component, ComponentState,
    DriverBackend, DriverConfigurator, MonetError, OutputLocation, PooledBuffer, ProcessingInput,
    ProcessingOutput, Result,
};

/// Observable driver-side state shared between the fakes and the test body
#[derive(Debug, Default)]
pub struct DriverState {
    pub next_handle: u64,
    pub live_buffers: usize,
    pub allocations: usize,
    pub frees: usize,
    pub config_sets: usize,
    pub repurpose_calls: usize,
    pub gives: usize,
    pub returns: usize,
    /// Fail every allocation once this many have succeeded
    pub fail_alloc_after: Option<usize>,
    /// Whether repurpose requests are accepted
    pub accept_repurpose: bool,
    /// Make the next configuration query fail
    pub fail_configuration: bool,
}

/// Test backend handing out fakes that all share one [`DriverState`]
#[derive(Clone, Default)]
pub struct TestBackend {
    pub state: Rc<RefCell<DriverState>>,
}

impl TestBackend {
    pub fn new() -> Self {
        // Route crate logs through the test harness capture
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        Self::default()
    }

    pub fn accepting_repurpose() -> Self {
        let backend = Self::default();
        backend.state.borrow_mut().accept_repurpose = true;
        backend
    }
}

impl DriverBackend for TestBackend {
    fn new_allocator(&self) -> Result<Box<dyn BufferAllocator>> {
        Ok(Box::new(TestAllocator {
            state: self.state.clone(),
        }))
    }

    fn new_handler(&self) -> Result<Box<dyn BufferHandler>> {
        Ok(Box::new(TestHandler {
            state: self.state.clone(),
        }))
    }

    fn new_configurator(&self) -> Result<Box<dyn DriverConfigurator>> {
        Ok(Box::new(TestConfigurator {
            state: self.state.clone(),
        }))
    }
}

struct TestAllocator {
    state: Rc<RefCell<DriverState>>,
}

impl BufferAllocator for TestAllocator {
    fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    fn allocate_buffer(
        &mut self,
        _location: OutputLocation,
        _config: &BufferConfiguration,
    ) -> Result<BufferHandle> {
        let mut state = self.state.borrow_mut();
        if let Some(limit) = state.fail_alloc_after {
            if state.allocations >= limit {
                return Err(MonetError::driver("allocation quota exhausted"));
            }
        }
        state.allocations += 1;
        state.live_buffers += 1;
        state.next_handle += 1;
        Ok(BufferHandle(state.next_handle))
    }

    fn set_buffer_config(
        &mut self,
        _location: OutputLocation,
        _config: &BufferConfiguration,
        _handle: BufferHandle,
    ) -> Result<()> {
        self.state.borrow_mut().config_sets += 1;
        Ok(())
    }

    fn free_buffer(&mut self, _location: OutputLocation, _handle: BufferHandle) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.frees += 1;
        state.live_buffers -= 1;
        Ok(())
    }

    fn repurpose_buffers(
        &mut self,
        _location: OutputLocation,
        _original: &BufferConfiguration,
        _target: &BufferConfiguration,
        _handles: &[BufferHandle],
    ) -> Result<bool> {
        let mut state = self.state.borrow_mut();
        state.repurpose_calls += 1;
        Ok(state.accept_repurpose)
    }
}

struct TestHandler {
    state: Rc<RefCell<DriverState>>,
}

impl BufferHandler for TestHandler {
    fn give_buffer_to_component(
        &mut self,
        _location: OutputLocation,
        _buffer: &PooledBuffer,
    ) -> Result<()> {
        self.state.borrow_mut().gives += 1;
        Ok(())
    }

    fn return_buffers_to_manager(&mut self, _location: OutputLocation) -> Result<()> {
        self.state.borrow_mut().returns += 1;
        Ok(())
    }
}

struct TestConfigurator {
    state: Rc<RefCell<DriverState>>,
}

impl TestConfigurator {
    /// Derive a concrete configuration from a port's requirement: same
    /// surface, pitch equal to width.
    fn configure_port(state: &mut ComponentState, port: u32) {
        let pool = state.output_mut(port);
        if !pool.is_used() {
            return;
        }
        let surface = pool.requirement().surface.with_pitch(pool.requirement().surface.width);
        let mut config = pool.current_config().clone();
        *config.surface_mut() = surface;
        pool.set_current_config(config);
    }
}

impl DriverConfigurator for TestConfigurator {
    fn configure_drivers(&mut self) -> Result<()> {
        Ok(())
    }

    fn get_output_requirements(
        &mut self,
        _component: Component,
        _state: &mut ComponentState,
    ) -> Result<()> {
        // No hardware mandates in the fake; the seeded defaults stand.
        Ok(())
    }

    fn get_output_configuration(
        &mut self,
        component: Component,
        state: &mut ComponentState,
    ) -> Result<()> {
        if self.state.borrow().fail_configuration {
            return Err(MonetError::driver("configuration query failed"));
        }

        for port in 0..component.output_port_count() as u32 {
            Self::configure_port(state, port);
        }

        // Output negotiation on the processing stage also settles what it
        // needs from its upstream.
        if component == Component::Processing {
            let preview_req = state
                .output(u32::from(ProcessingOutput::Preview))
                .requirement()
                .clone();
            let still_req = state
                .output(u32::from(ProcessingOutput::Still))
                .requirement()
                .clone();

            let preview_in = state.input_mut(u32::from(ProcessingInput::Preview));
            preview_in.used = true;
            preview_in.requirement = preview_req;

            let still_in = state.input_mut(u32::from(ProcessingInput::Still));
            still_in.used = true;
            still_in.requirement = still_req;
        }
        Ok(())
    }

    fn get_input_requirement(
        &mut self,
        _component: Component,
        _state: &mut ComponentState,
    ) -> Result<()> {
        Ok(())
    }
}
