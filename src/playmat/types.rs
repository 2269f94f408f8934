use crate::CanvasConfig;

/// Fixed output dimensions every upload is normalized to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl CanvasSize {
    /// Returns `None` when either dimension is zero.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            None
        } else {
            Some(Self { width, height })
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl Default for CanvasSize {
    fn default() -> Self {
        Self {
            width: 2400,
            height: 1400,
        }
    }
}

impl TryFrom<CanvasConfig> for CanvasSize {
    type Error = String;

    fn try_from(config: CanvasConfig) -> Result<Self, Self::Error> {
        CanvasSize::new(config.width, config.height).ok_or_else(|| {
            format!(
                "canvas dimensions must be non-zero, got {}x{}",
                config.width, config.height
            )
        })
    }
}

/// Rectangle of the source image kept by the center crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRegion {
    /// True when the region covers the whole `width` x `height` source.
    pub fn is_full(&self, width: u32, height: u32) -> bool {
        self.x == 0 && self.y == 0 && self.width == width && self.height == height
    }
}

/// Bounds applied while decoding untrusted uploads.
#[derive(Debug, Clone, Copy)]
pub struct DecodeLimits {
    pub max_dimension: u32,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_dimension: 20_000,
        }
    }
}
