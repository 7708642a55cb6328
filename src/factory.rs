//! Stream negotiation and construction

use tracing::debug;

use crate::driver::{DriverBackend, DriverConfigurator};
use crate::error::{MonetError, Result};
use crate::request::StreamRequest;
use crate::stream::{ComponentState, Stream, StreamConfig, StreamType};
use crate::topology::{Component, OutputLocation, ProcessingInput, SourceOutput};

/// Negotiates buffer requirements into concrete configurations and turns
/// them into initialized streams.
///
/// One factory is bound to one device's driver backend. It owns the
/// configurator for the lifetime of the driver binding and attaches fresh
/// allocator/handler pairs to the streams it builds.
pub struct StreamFactory {
    backend: Box<dyn DriverBackend>,
    configurator: Option<Box<dyn DriverConfigurator>>,
    driver_initialized: bool,
}

impl std::fmt::Debug for StreamFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamFactory")
            .field("driver_initialized", &self.driver_initialized)
            .finish()
    }
}

impl StreamFactory {
    /// Create a factory bound to one device's driver backend
    pub fn new(backend: Box<dyn DriverBackend>) -> Result<Self> {
        let configurator = backend.new_configurator()?;
        Ok(Self {
            backend,
            configurator: Some(configurator),
            driver_initialized: true,
        })
    }

    /// Whether the factory currently holds a live driver binding
    pub fn is_driver_initialized(&self) -> bool {
        self.driver_initialized
    }

    /// Build (or rebuild) a stream for the given session layout.
    ///
    /// Custom requests override the defaults and hardware-mandated
    /// requirements port by port. Passing an already-initialized stream of
    /// the same type renegotiates it in place instead of starting over.
    /// On failure the stream's prior state is left untouched.
    pub fn initialize_stream(
        &mut self,
        stream: &mut Stream,
        stream_type: StreamType,
        request: &mut StreamRequest,
    ) -> Result<()> {
        if !self.driver_initialized {
            return Err(MonetError::invalid_state("driver info not initialized"));
        }

        if stream.is_initialized() && stream.stream_type() == stream_type {
            return self.reinitialize_stream(stream, request);
        }

        let mut config = match stream_type {
            StreamType::StandardCapture => self.configure_standard_capture(request)?,
        };

        // First time through: the current configurations become the
        // original allocation footprints.
        for component in [Component::Processing, Component::Source] {
            for location in OutputLocation::ports_of(component) {
                let pool = config.output_mut(location);
                if pool.is_used() {
                    pool.snapshot_original();
                }
            }
        }

        if !stream.has_allocator() {
            let mut allocator = self.backend.new_allocator()?;
            allocator.initialize()?;
            let handler = self.backend.new_handler()?;
            stream.attach(allocator, handler);
        }

        stream.replace_config(config);
        stream.mark_initialized(stream_type);
        Ok(())
    }

    /// Renegotiate an already-built stream against new requests without
    /// tearing it down.
    fn reinitialize_stream(
        &mut self,
        stream: &mut Stream,
        request: &mut StreamRequest,
    ) -> Result<()> {
        let configurator = required_configurator(&mut self.configurator)?;
        let mut new_config = stream.config().clone();

        // Reset driver-side port state, then start the new negotiation from
        // every port enabled with cleared allocation bookkeeping. Ports that
        // are not actually needed get pruned by the requirement and
        // override merging below.
        configurator.configure_drivers()?;
        for location in OutputLocation::all() {
            let pool = new_config.output_mut(location);
            pool.set_used(true);
            pool.clear_bookkeeping();
        }

        apply_custom_requests(
            Component::Processing,
            new_config.component_mut(Component::Processing),
            request,
            true,
        );

        configurator.get_output_configuration(
            Component::Processing,
            new_config.component_mut(Component::Processing),
        )?;

        // The source<->processing buffer contract may change shape, so get
        // every source buffer back from the driver up front.
        for port in [SourceOutput::Preview, SourceOutput::Capture] {
            let location = OutputLocation::new(Component::Source, port)?;
            stream.recover_from_driver(location)?;
        }

        let configurator = required_configurator(&mut self.configurator)?;
        configurator.get_output_configuration(
            Component::Source,
            new_config.component_mut(Component::Source),
        )?;

        // Renegotiation resets source counts to defaults; preserve what the
        // caller had configured on the live stream.
        for location in OutputLocation::ports_of(Component::Source) {
            let live = stream.config().output(location).requirement().clone();
            new_config
                .output_mut(location)
                .set_counts(live.min_count, live.max_count);
        }

        apply_custom_requests(
            Component::Source,
            new_config.component_mut(Component::Source),
            request,
            true,
        );

        // Persist the updated processing requirements on the live stream
        // only now that the whole negotiation has succeeded, so a failed
        // rebuild leaves the prior state untouched.
        for location in OutputLocation::ports_of(Component::Processing) {
            let requirement = new_config.output(location).requirement().clone();
            stream
                .config_mut()
                .output_mut(location)
                .set_requirement(requirement);
        }

        stream.reconfigure_component(Component::Source, new_config.component(Component::Source))?;
        stream.reconfigure_component(
            Component::Processing,
            new_config.component(Component::Processing),
        )?;

        debug!("stream renegotiation complete");
        Ok(())
    }

    /// Negotiate the standard capture topology from scratch
    fn configure_standard_capture(&mut self, request: &mut StreamRequest) -> Result<StreamConfig> {
        let configurator = required_configurator(&mut self.configurator)?;
        let mut config = StreamConfig::new();

        // Seed every processing output port with the default requirement
        // and configuration, then let the hardware overlay its mandates.
        {
            let processing = config.component_mut(Component::Processing);
            for port in 0..Component::Processing.output_port_count() as u32 {
                processing.output_mut(port).set_used(true);
            }
            configurator.get_output_requirements(Component::Processing, processing)?;
            apply_custom_requests(Component::Processing, processing, request, false);
            configurator.get_output_configuration(Component::Processing, processing)?;
        }

        // The processing stage's input requirements fall out of its output
        // negotiation; they become the source stage's output requirements.
        let preview_req = config
            .component(Component::Processing)
            .input(ProcessingInput::Preview as u32)
            .requirement
            .clone();
        let still_req = config
            .component(Component::Processing)
            .input(ProcessingInput::Still as u32)
            .requirement
            .clone();

        {
            let source = config.component_mut(Component::Source);
            let preview = source.output_mut(SourceOutput::Preview as u32);
            preview.set_used(true);
            preview.set_requirement(preview_req);

            let capture = source.output_mut(SourceOutput::Capture as u32);
            capture.set_used(true);
            capture.set_requirement(still_req);

            configurator.get_output_configuration(Component::Source, source)?;

            // Source and processing negotiate sizes between themselves, so
            // source overrides can only adjust buffer counts.
            apply_custom_requests(Component::Source, source, request, false);
        }

        Ok(config)
    }

    /// Detach the configurator and the stream's driver collaborators while
    /// the driver is torn down. Stream bookkeeping stays intact so buffers
    /// already granted to callers are not orphaned.
    pub fn invalidate_driver_info(&mut self, stream: &mut Stream) -> Result<()> {
        if self.driver_initialized {
            self.configurator = None;
            self.driver_initialized = false;
        }
        if stream.is_initialized() {
            stream.detach();
        }
        Ok(())
    }

    /// Re-attach fresh driver collaborators after an invalidate.
    ///
    /// Fails with `InvalidState` unless both the factory and the stream
    /// were previously invalidated.
    pub fn reinitialize_driver_info(
        &mut self,
        stream: &mut Stream,
        backend: Box<dyn DriverBackend>,
    ) -> Result<()> {
        if self.driver_initialized || stream.is_initialized() {
            return Err(MonetError::invalid_state(
                "reinitialize requires a prior invalidate",
            ));
        }

        self.backend = backend;
        self.configurator = Some(self.backend.new_configurator()?);
        self.driver_initialized = true;

        let mut allocator = self.backend.new_allocator()?;
        allocator.initialize()?;
        let handler = self.backend.new_handler()?;
        stream.attach(allocator, handler);
        stream.mark_initialized(stream.stream_type());
        Ok(())
    }
}

/// Drain the caller's override stack for one component into the negotiated
/// state. Width/height of zero leave the negotiated dimensions untouched;
/// source dimensions are never overridden since they are negotiated with
/// the processing stage.
fn apply_custom_requests(
    component: Component,
    state: &mut ComponentState,
    request: &mut StreamRequest,
    set_used: bool,
) {
    while let Some(custom) = request.pop(component) {
        let pool = state.output_mut(custom.location.port());
        if set_used {
            pool.set_used(true);
        }
        // Zero-buffer requirements are allowed
        pool.set_counts(custom.min_buffers, custom.max_buffers);

        if component != Component::Source {
            let requirement = pool.requirement_mut();
            if custom.width != 0 {
                requirement.surface.width = custom.width;
            }
            if custom.height != 0 {
                requirement.surface.height = custom.height;
            }
        }
    }
}

fn required_configurator(
    slot: &mut Option<Box<dyn DriverConfigurator>>,
) -> Result<&mut Box<dyn DriverConfigurator>> {
    slot.as_mut()
        .ok_or_else(|| MonetError::invalid_state("no configurator attached to factory"))
}
