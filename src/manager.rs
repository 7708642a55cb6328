//! Per-device registry owning one stream factory per device

use crate::driver::DriverBackend;
use crate::error::{MonetError, Result};
use crate::factory::StreamFactory;
use crate::request::StreamRequest;
use crate::stream::{Stream, StreamType};

/// Maximum number of devices the registry tracks
pub const MAX_DEVICES: usize = 5;

/// Bounded registry of stream factories, keyed by device id.
///
/// An explicit object rather than process-global state, so independent
/// instances can coexist (one per test, one per process, one per
/// subsystem). Each slot owns exactly one factory; lifecycle is
/// create-on-first-use and explicit release-on-last-use.
#[derive(Debug, Default)]
pub struct BufferManager {
    factories: [Option<StreamFactory>; MAX_DEVICES],
}

impl BufferManager {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a device id to a driver backend, creating its factory.
    /// A no-op when the device is already open.
    pub fn open_device(&mut self, device_id: usize, backend: Box<dyn DriverBackend>) -> Result<()> {
        let slot = self.slot_mut(device_id)?;
        if slot.is_none() {
            *slot = Some(StreamFactory::new(backend)?);
        }
        Ok(())
    }

    /// Drop a device's factory. Streams built by it must be closed first;
    /// this only releases the negotiation machinery.
    pub fn release_device(&mut self, device_id: usize) -> Result<()> {
        let slot = self.slot_mut(device_id)?;
        *slot = None;
        Ok(())
    }

    /// Whether a device id currently owns a factory
    pub fn is_open(&self, device_id: usize) -> bool {
        device_id < MAX_DEVICES && self.factories[device_id].is_some()
    }

    /// Build a new stream on one device
    pub fn create_stream(
        &mut self,
        device_id: usize,
        stream_type: StreamType,
        request: &mut StreamRequest,
    ) -> Result<Stream> {
        let factory = self.factory_mut(device_id)?;
        let mut stream = Stream::new();
        factory.initialize_stream(&mut stream, stream_type, request)?;
        Ok(stream)
    }

    /// Rebuild an existing stream on one device against new requests
    pub fn rebuild_stream(
        &mut self,
        device_id: usize,
        stream: &mut Stream,
        stream_type: StreamType,
        request: &mut StreamRequest,
    ) -> Result<()> {
        let factory = self.factory_mut(device_id)?;
        factory.initialize_stream(stream, stream_type, request)
    }

    /// Close a stream: recover every port from the driver, then free every
    /// unused buffer, guaranteeing nothing is leaked on teardown
    pub fn close_stream(&mut self, device_id: usize, stream: &mut Stream) -> Result<()> {
        // Validate the device binding even though the sweep runs on the
        // stream itself.
        self.factory_mut(device_id)?;
        stream.close()
    }

    /// Detach a device's driver binding ahead of a driver teardown
    pub fn invalidate(&mut self, device_id: usize, stream: &mut Stream) -> Result<()> {
        let factory = self.factory_mut(device_id)?;
        factory.invalidate_driver_info(stream)
    }

    /// Re-attach a device's driver binding after an invalidate
    pub fn reinit(
        &mut self,
        device_id: usize,
        stream: &mut Stream,
        backend: Box<dyn DriverBackend>,
    ) -> Result<()> {
        let factory = self.factory_mut(device_id)?;
        factory.reinitialize_driver_info(stream, backend)
    }

    /// The factory bound to one device
    pub fn factory_mut(&mut self, device_id: usize) -> Result<&mut StreamFactory> {
        self.slot_mut(device_id)?
            .as_mut()
            .ok_or_else(|| MonetError::invalid_state(format!("device {} is not open", device_id)))
    }

    fn slot_mut(&mut self, device_id: usize) -> Result<&mut Option<StreamFactory>> {
        if device_id >= MAX_DEVICES {
            return Err(MonetError::bad_parameter(
                "device_id",
                format!("device id {} exceeds registry capacity {}", device_id, MAX_DEVICES),
            ));
        }
        Ok(&mut self.factories[device_id])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_device_id() {
        let mut manager = BufferManager::new();
        let err = manager.release_device(MAX_DEVICES).unwrap_err();
        assert!(matches!(err, MonetError::BadParameter { .. }));
        assert!(!manager.is_open(MAX_DEVICES));
    }

    #[test]
    fn test_unopened_device_has_no_factory() {
        let mut manager = BufferManager::new();
        let err = manager.factory_mut(0).unwrap_err();
        assert!(matches!(err, MonetError::InvalidState { .. }));
    }
}
