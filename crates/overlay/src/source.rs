use std::future::Future;
use std::pin::Pin;

use session::{ApiClient, ApiError, ExtractBboxResponse, RasterBytes, SatelliteImage};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The backend calls the overlay pipeline needs.
///
/// Methods return boxed futures so the trait stays dyn-compatible.
pub trait ImageSource: Send + Sync {
    fn fetch_metadata<'a>(&'a self, id: &'a str)
    -> BoxFuture<'a, Result<SatelliteImage, ApiError>>;

    /// Asks the backend to read the bounds out of the raster itself.
    fn extract_bbox<'a>(&'a self, id: &'a str)
    -> BoxFuture<'a, Result<ExtractBboxResponse, ApiError>>;

    /// Hits the render endpoint for its side effect of extracting bounds.
    fn trigger_render<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<(), ApiError>>;

    /// Display-ready raster bytes, fetched with the bearer token.
    fn fetch_raster<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<RasterBytes, ApiError>>;
}

impl ImageSource for ApiClient {
    fn fetch_metadata<'a>(
        &'a self,
        id: &'a str,
    ) -> BoxFuture<'a, Result<SatelliteImage, ApiError>> {
        Box::pin(async move { self.satellite_images().get(id).await })
    }

    fn extract_bbox<'a>(
        &'a self,
        id: &'a str,
    ) -> BoxFuture<'a, Result<ExtractBboxResponse, ApiError>> {
        Box::pin(async move { self.satellite_images().extract_bbox(id).await })
    }

    fn trigger_render<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<(), ApiError>> {
        Box::pin(async move { self.satellite_images().trigger_render(id).await })
    }

    fn fetch_raster<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<RasterBytes, ApiError>> {
        Box::pin(async move { self.satellite_images().display_image(id).await })
    }
}
