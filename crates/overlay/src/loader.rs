use std::time::Duration;

use bytes::Bytes;
use foundation::{GeoBounds, Generation, GenerationCounter};
use layers::{ImageOverlay, LayerId, MapSurface, OverlayStyle};
use session::{ApiError, ExtractBboxResponse, RasterBytes, SatelliteImage};
use tracing::{debug, info, warn};

use crate::state::{ExtractPhase, OverlayFailure, OverlayState};

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LoaderConfig {
    /// Pause before each metadata poll after the render trigger.
    pub fallback_delay: Duration,
    pub fallback_polls: u32,
    pub fit_padding_px: u32,
    pub style: OverlayStyle,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            fallback_delay: Duration::from_millis(500),
            fallback_polls: 3,
            fit_padding_px: 20,
            style: OverlayStyle::default(),
        }
    }
}

/// Identifies the selection a request was issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub generation: Generation,
    pub image_id: String,
}

/// Work the loader wants done before it can move on.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    FetchMetadata(Ticket),
    Extract(Ticket),
    TriggerRender(Ticket),
    /// Re-read metadata after `delay`, hoping the render stored bounds.
    Poll { ticket: Ticket, delay: Duration },
    FetchRaster { ticket: Ticket, bounds: GeoBounds },
}

impl Command {
    pub fn ticket(&self) -> &Ticket {
        match self {
            Command::FetchMetadata(ticket)
            | Command::Extract(ticket)
            | Command::TriggerRender(ticket)
            | Command::Poll { ticket, .. }
            | Command::FetchRaster { ticket, .. } => ticket,
        }
    }
}

/// Result of running a [`Command`].
#[derive(Debug, Clone)]
pub enum Outcome {
    Metadata(Result<SatelliteImage, ApiError>),
    Extracted(Result<ExtractBboxResponse, ApiError>),
    RenderTriggered(Result<(), ApiError>),
    Polled(Result<SatelliteImage, ApiError>),
    Raster(Result<RasterBytes, ApiError>),
}

impl Outcome {
    fn name(&self) -> &'static str {
        match self {
            Outcome::Metadata(_) => "metadata",
            Outcome::Extracted(_) => "extracted",
            Outcome::RenderTriggered(_) => "render",
            Outcome::Polled(_) => "polled",
            Outcome::Raster(_) => "raster",
        }
    }
}

/// The map layer and the bytes behind it. Released as one.
#[derive(Debug)]
pub struct OverlayResource {
    pub layer: LayerId,
    pub blob: Bytes,
}

#[derive(Debug, Clone)]
struct Selection {
    id: String,
    name: String,
}

/// Overlay state machine for one map view.
///
/// Every entry point that changes the selection releases the live overlay
/// before it returns the first command for the new one, so two overlays never
/// coexist. Results come back through [`OverlayLoader::apply`]; anything
/// carrying an outdated generation is ignored.
#[derive(Debug)]
pub struct OverlayLoader<M: MapSurface> {
    map: M,
    config: LoaderConfig,
    generations: GenerationCounter,
    selection: Option<Selection>,
    state: OverlayState,
    resource: Option<OverlayResource>,
    mounted: bool,
}

impl<M: MapSurface> OverlayLoader<M> {
    pub fn new(map: M, config: LoaderConfig) -> Self {
        Self {
            map,
            config,
            generations: GenerationCounter::new(),
            selection: None,
            state: OverlayState::Idle,
            resource: None,
            mounted: true,
        }
    }

    pub fn state(&self) -> &OverlayState {
        &self.state
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selection.as_ref().map(|s| s.id.as_str())
    }

    pub fn resource(&self) -> Option<&OverlayResource> {
        self.resource.as_ref()
    }

    pub fn generation(&self) -> Generation {
        self.generations.current()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Selects an image whose metadata is already at hand.
    pub fn select(&mut self, image: &SatelliteImage) -> Option<Command> {
        let ticket = self.begin(&image.id, &image.name)?;
        self.resolve(ticket, image)
    }

    /// Selects by id; metadata is fetched first.
    pub fn select_id(&mut self, id: &str) -> Option<Command> {
        let ticket = self.begin(id, "")?;
        self.state = OverlayState::Resolving;
        Some(Command::FetchMetadata(ticket))
    }

    /// Starts the current selection over from its metadata.
    pub fn retry(&mut self) -> Option<Command> {
        let id = self.selection.as_ref()?.id.clone();
        info!(image = %id, "retrying overlay");
        self.select_id(&id)
    }

    pub fn clear(&mut self) {
        self.release();
        self.generations.advance();
        self.selection = None;
        self.state = OverlayState::Idle;
    }

    /// Tears everything down; later selections and results are ignored.
    pub fn unmount(&mut self) {
        self.clear();
        self.mounted = false;
    }

    /// The transition function. Feeds the result of a command back in and
    /// returns the next command, if any.
    pub fn apply(&mut self, ticket: &Ticket, outcome: Outcome) -> Option<Command> {
        if !self.mounted || !self.generations.is_current(ticket.generation) {
            debug!(
                image = %ticket.image_id,
                generation = ticket.generation.0,
                outcome = outcome.name(),
                "dropping stale result"
            );
            return None;
        }

        match (self.state.clone(), outcome) {
            (OverlayState::Resolving, Outcome::Metadata(result)) => match result {
                Ok(image) => {
                    if let Some(selection) = self.selection.as_mut() {
                        selection.name = image.name.clone();
                    }
                    self.resolve(ticket.clone(), &image)
                }
                Err(err) => self.fail(ticket, &err),
            },
            (
                OverlayState::Extracting {
                    phase: ExtractPhase::Primary,
                },
                Outcome::Extracted(result),
            ) => match result.map(|resp| resp.bounds()) {
                Ok(Some(bounds)) if bounds.is_valid_wgs84() => self.fetch(ticket.clone(), bounds),
                Ok(other) => {
                    warn!(image = %ticket.image_id, bounds = ?other, "extraction gave no usable bounds");
                    self.fallback(ticket.clone())
                }
                Err(err) => {
                    warn!(image = %ticket.image_id, "bbox extraction failed: {err}");
                    self.fallback(ticket.clone())
                }
            },
            (
                OverlayState::Extracting {
                    phase: ExtractPhase::Fallback { attempt: 0 },
                },
                Outcome::RenderTriggered(result),
            ) => match result {
                Ok(()) => self.poll(ticket.clone(), 0),
                Err(err) => {
                    warn!(image = %ticket.image_id, "render trigger failed: {err}");
                    self.unavailable(ticket)
                }
            },
            (
                OverlayState::Extracting {
                    phase: ExtractPhase::Fallback { attempt },
                },
                Outcome::Polled(result),
            ) => {
                match result {
                    Ok(image) => match image.embedded_bounds() {
                        Some(bounds) if bounds.is_valid_wgs84() => {
                            return self.fetch(ticket.clone(), bounds);
                        }
                        _ => debug!(image = %ticket.image_id, attempt, "no bounds yet"),
                    },
                    Err(err) => debug!(image = %ticket.image_id, attempt, "poll failed: {err}"),
                }
                self.poll(ticket.clone(), attempt)
            }
            (OverlayState::Fetching { bounds }, Outcome::Raster(result)) => match result {
                Ok(raster) => {
                    self.display(bounds, raster);
                    None
                }
                Err(err) => self.fail(ticket, &err),
            },
            (state, outcome) => {
                debug!(
                    state = state.name(),
                    outcome = outcome.name(),
                    "result does not match state"
                );
                None
            }
        }
    }

    /// Releases the current overlay and opens a new generation.
    fn begin(&mut self, id: &str, name: &str) -> Option<Ticket> {
        if !self.mounted {
            warn!(image = %id, "selection after unmount ignored");
            return None;
        }
        self.release();
        let generation = self.generations.advance();
        self.selection = Some(Selection {
            id: id.to_string(),
            name: name.to_string(),
        });
        self.state = OverlayState::Resolving;
        Some(Ticket {
            generation,
            image_id: id.to_string(),
        })
    }

    fn resolve(&mut self, ticket: Ticket, image: &SatelliteImage) -> Option<Command> {
        if !image.has_raster() {
            info!(image = %ticket.image_id, "image has no raster source");
            return self.unavailable(&ticket);
        }
        match image.embedded_bounds() {
            Some(bounds) if bounds.is_valid_wgs84() => self.fetch(ticket, bounds),
            Some(bounds) => {
                warn!(
                    image = %ticket.image_id,
                    ?bounds,
                    "stored bounds are not WGS84 (projected?), re-extracting"
                );
                self.extract(ticket)
            }
            None => {
                info!(image = %ticket.image_id, "no stored bounds, extracting");
                self.extract(ticket)
            }
        }
    }

    fn extract(&mut self, ticket: Ticket) -> Option<Command> {
        self.state = OverlayState::Extracting {
            phase: ExtractPhase::Primary,
        };
        Some(Command::Extract(ticket))
    }

    fn fallback(&mut self, ticket: Ticket) -> Option<Command> {
        self.state = OverlayState::Extracting {
            phase: ExtractPhase::Fallback { attempt: 0 },
        };
        Some(Command::TriggerRender(ticket))
    }

    /// Issues poll number `done + 1`, or gives up.
    fn poll(&mut self, ticket: Ticket, done: u32) -> Option<Command> {
        if done >= self.config.fallback_polls {
            return self.unavailable(&ticket);
        }
        self.state = OverlayState::Extracting {
            phase: ExtractPhase::Fallback { attempt: done + 1 },
        };
        Some(Command::Poll {
            ticket,
            delay: self.config.fallback_delay,
        })
    }

    fn fetch(&mut self, ticket: Ticket, bounds: GeoBounds) -> Option<Command> {
        self.state = OverlayState::Fetching { bounds };
        Some(Command::FetchRaster { ticket, bounds })
    }

    fn fail(&mut self, ticket: &Ticket, err: &ApiError) -> Option<Command> {
        let failure = OverlayFailure::from(err);
        warn!(image = %ticket.image_id, "overlay failed: {failure}");
        self.state = OverlayState::Failed(failure);
        None
    }

    fn unavailable(&mut self, ticket: &Ticket) -> Option<Command> {
        warn!(image = %ticket.image_id, "no usable bounds, overlay unavailable");
        self.state = OverlayState::Unavailable;
        None
    }

    fn display(&mut self, bounds: GeoBounds, raster: RasterBytes) {
        self.release();

        let layer = self.map.allocate_layer_id();
        let mut overlay = ImageOverlay::new(layer, bounds, raster.bytes.clone())
            .with_content_type(raster.content_type)
            .with_style(self.config.style);
        if let Some(selection) = self.selection.as_ref().filter(|s| !s.name.is_empty()) {
            overlay = overlay.with_attribution(format!("Satellite Image: {}", selection.name));
        }

        self.map.add_overlay(overlay);
        self.map.fit_bounds(bounds, self.config.fit_padding_px);
        info!(layer = layer.0, bytes = raster.bytes.len(), "overlay displayed");

        self.resource = Some(OverlayResource {
            layer,
            blob: raster.bytes,
        });
        self.state = OverlayState::Displayed { bounds, layer };
    }

    fn release(&mut self) {
        let Some(resource) = self.resource.take() else {
            return;
        };
        if !self.map.remove_layer(resource.layer) {
            warn!(layer = resource.layer.0, "overlay was already off the map");
        }
        debug!(
            layer = resource.layer.0,
            bytes = resource.blob.len(),
            "overlay released"
        );
    }
}

impl<M: MapSurface> Drop for OverlayLoader<M> {
    fn drop(&mut self) {
        self.release();
    }
}
