use std::sync::Arc;

use layers::MapSurface;
use parking_lot::Mutex;
use session::SatelliteImage;
use tracing::debug;

use crate::loader::{Command, LoaderConfig, OverlayLoader, Outcome};
use crate::source::ImageSource;
use crate::state::OverlayState;

/// Runs [`OverlayLoader`] commands against an [`ImageSource`].
///
/// The loader lock is taken only around synchronous transitions. A selection
/// made while another one is still loading simply wins: the older run keeps
/// going until its next result is rejected as stale.
pub struct OverlayController<S, M: MapSurface> {
    source: Arc<S>,
    loader: Arc<Mutex<OverlayLoader<M>>>,
}

impl<S, M: MapSurface> Clone for OverlayController<S, M> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            loader: self.loader.clone(),
        }
    }
}

impl<S: ImageSource, M: MapSurface> OverlayController<S, M> {
    pub fn new(source: S, map: M, config: LoaderConfig) -> Self {
        Self {
            source: Arc::new(source),
            loader: Arc::new(Mutex::new(OverlayLoader::new(map, config))),
        }
    }

    pub fn state(&self) -> OverlayState {
        self.loader.lock().state().clone()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Selects an image and drives it until it settles or is superseded.
    /// Returns the state current at that point, which may belong to a newer
    /// selection.
    pub async fn select(&self, image: &SatelliteImage) -> OverlayState {
        let command = self.loader.lock().select(image);
        self.drive(command).await
    }

    pub async fn select_id(&self, id: &str) -> OverlayState {
        let command = self.loader.lock().select_id(id);
        self.drive(command).await
    }

    pub async fn retry(&self) -> OverlayState {
        let command = self.loader.lock().retry();
        self.drive(command).await
    }

    pub fn clear(&self) {
        self.loader.lock().clear();
    }

    pub fn unmount(&self) {
        self.loader.lock().unmount();
    }

    async fn drive(&self, mut next: Option<Command>) -> OverlayState {
        while let Some(command) = next {
            let ticket = command.ticket().clone();
            let outcome = self.run(command).await;
            next = self.loader.lock().apply(&ticket, outcome);
        }
        self.state()
    }

    async fn run(&self, command: Command) -> Outcome {
        match command {
            Command::FetchMetadata(ticket) => {
                Outcome::Metadata(self.source.fetch_metadata(&ticket.image_id).await)
            }
            Command::Extract(ticket) => {
                Outcome::Extracted(self.source.extract_bbox(&ticket.image_id).await)
            }
            Command::TriggerRender(ticket) => {
                Outcome::RenderTriggered(self.source.trigger_render(&ticket.image_id).await)
            }
            Command::Poll { ticket, delay } => {
                debug!(image = %ticket.image_id, ?delay, "waiting before metadata poll");
                tokio::time::sleep(delay).await;
                Outcome::Polled(self.source.fetch_metadata(&ticket.image_id).await)
            }
            Command::FetchRaster { ticket, .. } => {
                Outcome::Raster(self.source.fetch_raster(&ticket.image_id).await)
            }
        }
    }
}
