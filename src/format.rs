//! Surface descriptors, buffer requirements, and negotiated configurations

use serde::{Deserialize, Serialize};

/// Default surface width seeded before negotiation
pub const DEFAULT_OUTPUT_WIDTH: u32 = 176;
/// Default surface height seeded before negotiation
pub const DEFAULT_OUTPUT_HEIGHT: u32 = 144;
/// Default buffer count seeded before negotiation
pub const DEFAULT_OUTPUT_BUFFERS: usize = 4;

/// Pixel color format of a surface plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorFormat {
    Y8,
    Yuv420,
    Nv12,
    Rgba8888,
}

/// Memory layout of a surface plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurfaceLayout {
    Pitch,
    Tiled,
}

/// Which memory space backs a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemorySpace {
    System,
    Device,
}

/// Byte order of buffer contents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Endianness {
    Little,
    Big,
}

/// Payload format family carried by a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormatId {
    Video,
    Audio,
    Metadata,
}

/// Shape of one surface plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceDescriptor {
    pub width: u32,
    pub height: u32,
    pub color_format: ColorFormat,
    pub layout: SurfaceLayout,
    pub pitch: u32,
}

impl Default for SurfaceDescriptor {
    fn default() -> Self {
        Self {
            width: DEFAULT_OUTPUT_WIDTH,
            height: DEFAULT_OUTPUT_HEIGHT,
            color_format: ColorFormat::Y8,
            layout: SurfaceLayout::Pitch,
            pitch: DEFAULT_OUTPUT_WIDTH,
        }
    }
}

impl SurfaceDescriptor {
    /// Set surface dimensions
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the pitch in bytes
    pub fn with_pitch(mut self, pitch: u32) -> Self {
        self.pitch = pitch;
        self
    }

    /// Set the color format
    pub fn with_color_format(mut self, format: ColorFormat) -> Self {
        self.color_format = format;
        self
    }
}

/// The negotiated ask for one port: a count range plus a surface shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferRequirement {
    /// Minimum number of buffers the port can operate with
    pub min_count: usize,
    /// Maximum number of buffers the port wants
    pub max_count: usize,
    /// Requested surface shape
    pub surface: SurfaceDescriptor,
}

impl Default for BufferRequirement {
    fn default() -> Self {
        Self {
            min_count: DEFAULT_OUTPUT_BUFFERS,
            max_count: DEFAULT_OUTPUT_BUFFERS,
            surface: SurfaceDescriptor::default(),
        }
    }
}

impl BufferRequirement {
    /// Set the buffer count range
    pub fn with_counts(mut self, min_count: usize, max_count: usize) -> Self {
        self.min_count = min_count;
        self.max_count = max_count;
        self
    }

    /// Set the requested surface shape
    pub fn with_surface(mut self, surface: SurfaceDescriptor) -> Self {
        self.surface = surface;
        self
    }
}

/// A concrete negotiated memory descriptor for one port
///
/// Two configurations are considered interchangeable when
/// [`BufferConfiguration::matches`] holds; that check is the single decision
/// point for whether a reconfiguration needs physical reallocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferConfiguration {
    pub byte_alignment: u32,
    pub contiguous: bool,
    pub memory_space: MemorySpace,
    pub endianness: Endianness,
    pub format_id: FormatId,
    /// Surface planes; the first entry is the representative surface
    pub surfaces: Vec<SurfaceDescriptor>,
}

impl Default for BufferConfiguration {
    fn default() -> Self {
        Self {
            byte_alignment: 0,
            contiguous: false,
            memory_space: MemorySpace::System,
            endianness: Endianness::Little,
            format_id: FormatId::Video,
            surfaces: vec![SurfaceDescriptor::default()],
        }
    }
}

impl BufferConfiguration {
    /// The representative (first) surface
    pub fn surface(&self) -> &SurfaceDescriptor {
        &self.surfaces[0]
    }

    /// Mutable access to the representative surface
    pub fn surface_mut(&mut self) -> &mut SurfaceDescriptor {
        &mut self.surfaces[0]
    }

    /// Whether two configurations describe interchangeable buffers.
    ///
    /// Compares the descriptor fields plus the representative surface only.
    /// Secondary planes are not compared; changes confined to them go
    /// undetected. Kept as-is from the original negotiation protocol.
    pub fn matches(&self, other: &BufferConfiguration) -> bool {
        if !(self.byte_alignment == other.byte_alignment
            && self.contiguous == other.contiguous
            && self.memory_space == other.memory_space
            && self.endianness == other.endianness
            && self.format_id == other.format_id)
        {
            return false;
        }

        let ours = self.surface();
        let theirs = other.surface();
        ours.width == theirs.width
            && ours.height == theirs.height
            && ours.color_format == theirs.color_format
            && ours.layout == theirs.layout
            && ours.pitch == theirs.pitch
    }
}
