use crate::batch::BufferPolicy;

/// Construction parameters for a [`Renderer`](super::Renderer).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RendererInit {
    pub width: u32,
    pub height: u32,
    /// Draw into an own framebuffer instead of the device's screen.
    pub offscreen: bool,
    /// Multisample count of the offscreen target. Ignored on screen.
    pub samples: u32,
    pub policy: BufferPolicy,
    /// Vertex cap of the geometry buffer; 0 means no cap.
    pub max_vertices: usize,
    /// Defer all shapes to `end_draw` instead of drawing at `end_shape`.
    pub depth_sort: bool,
    pub depth_test: bool,
    /// Collapse recorded children into one `shape` child where possible.
    pub merge_shapes: bool,
}

impl Default for RendererInit {
    fn default() -> Self {
        Self {
            width: 100,
            height: 100,
            offscreen: false,
            samples: 1,
            policy: BufferPolicy::Disabled,
            max_vertices: 0,
            depth_sort: false,
            depth_test: true,
            merge_shapes: false,
        }
    }
}

impl RendererInit {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height, ..Self::default() }
    }

    pub fn offscreen(mut self, samples: u32) -> Self {
        self.offscreen = true;
        self.samples = samples.max(1);
        self
    }

    pub fn with_policy(mut self, policy: BufferPolicy, max_vertices: usize) -> Self {
        self.policy = policy;
        self.max_vertices = max_vertices;
        self
    }

    pub fn with_depth_sort(mut self, on: bool) -> Self {
        self.depth_sort = on;
        self
    }

    pub fn with_depth_test(mut self, on: bool) -> Self {
        self.depth_test = on;
        self
    }

    pub fn with_merge_shapes(mut self, on: bool) -> Self {
        self.merge_shapes = on;
        self
    }
}

/// What a drawing surface can do.
pub trait RenderSurface {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Whether camera, projection and lights are available.
    fn supports_3d(&self) -> bool {
        false
    }

    /// Whether the surface can draw into an offscreen framebuffer.
    fn supports_offscreen(&self) -> bool {
        false
    }
}
