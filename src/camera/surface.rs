//! Rendering targets supplied by the embedder.

/// An opaque handle to the embedder's rendering target for the live preview.
///
/// The kind matters to scaling: a window surface is composited as-is, so the
/// preview must fit inside the viewfinder to avoid covering neighbouring UI.
/// A texture surface is transformed by the embedder and may safely extend
/// past the viewfinder edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreviewSurface {
    /// A windowed surface clipped to its own bounds.
    Window(u64),
    /// A texture the embedder samples from, free to overdraw.
    Texture(u64),
}

impl PreviewSurface {
    pub fn is_texture(&self) -> bool {
        matches!(self, PreviewSurface::Texture(_))
    }

    /// The embedder-defined handle value.
    pub fn handle(&self) -> u64 {
        match self {
            PreviewSurface::Window(handle) | PreviewSurface::Texture(handle) => *handle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_and_handle() {
        assert!(PreviewSurface::Texture(7).is_texture());
        assert!(!PreviewSurface::Window(7).is_texture());
        assert_eq!(PreviewSurface::Window(42).handle(), 42);
    }
}
