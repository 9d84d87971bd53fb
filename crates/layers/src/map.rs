use std::collections::BTreeMap;
use std::sync::Arc;

use foundation::GeoBounds;
use parking_lot::Mutex;
use tracing::debug;

use crate::layer::{Layer, LayerId};
use crate::raster::ImageOverlay;

/// The slice of a map widget the overlay loader drives.
pub trait MapSurface {
    fn allocate_layer_id(&mut self) -> LayerId;
    fn add_overlay(&mut self, overlay: ImageOverlay);
    /// Returns `false` if no layer with `id` was attached.
    fn remove_layer(&mut self, id: LayerId) -> bool;
    fn fit_bounds(&mut self, bounds: GeoBounds, padding_px: u32);
}

#[derive(Debug, Clone, PartialEq)]
pub enum MapEvent {
    Added { layer: LayerId, bounds: GeoBounds },
    Removed { layer: LayerId },
    FitBounds { bounds: GeoBounds, padding_px: u32 },
}

#[derive(Debug, Default)]
struct MapInner {
    next_layer: u64,
    overlays: BTreeMap<LayerId, ImageOverlay>,
    events: Vec<MapEvent>,
    viewport: Option<GeoBounds>,
    peak_overlays: usize,
}

/// Map surface without a renderer.
///
/// Cloning yields another handle onto the same map, so a caller can hand one
/// clone to the loader and keep another to inspect what was drawn. Used by the
/// CLI and by tests.
#[derive(Debug, Clone, Default)]
pub struct HeadlessMap {
    inner: Arc<Mutex<MapInner>>,
}

impl HeadlessMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn overlays(&self) -> Vec<ImageOverlay> {
        self.inner.lock().overlays.values().cloned().collect()
    }

    pub fn overlay_count(&self) -> usize {
        self.inner.lock().overlays.len()
    }

    pub fn events(&self) -> Vec<MapEvent> {
        self.inner.lock().events.clone()
    }

    pub fn viewport(&self) -> Option<GeoBounds> {
        self.inner.lock().viewport
    }

    /// Highest number of overlays ever attached at the same time.
    pub fn peak_overlays(&self) -> usize {
        self.inner.lock().peak_overlays
    }
}

impl MapSurface for HeadlessMap {
    fn allocate_layer_id(&mut self) -> LayerId {
        let mut inner = self.inner.lock();
        inner.next_layer += 1;
        LayerId(inner.next_layer)
    }

    fn add_overlay(&mut self, overlay: ImageOverlay) {
        let mut inner = self.inner.lock();
        let layer = overlay.id();
        inner.events.push(MapEvent::Added {
            layer,
            bounds: overlay.bounds,
        });
        inner.overlays.insert(layer, overlay);
        inner.peak_overlays = inner.peak_overlays.max(inner.overlays.len());
        debug!(layer = layer.0, "overlay attached");
    }

    fn remove_layer(&mut self, id: LayerId) -> bool {
        let mut inner = self.inner.lock();
        let existed = inner.overlays.remove(&id).is_some();
        if existed {
            inner.events.push(MapEvent::Removed { layer: id });
            debug!(layer = id.0, "overlay detached");
        }
        existed
    }

    fn fit_bounds(&mut self, bounds: GeoBounds, padding_px: u32) {
        let mut inner = self.inner.lock();
        inner.viewport = Some(bounds);
        inner.events.push(MapEvent::FitBounds { bounds, padding_px });
    }
}
