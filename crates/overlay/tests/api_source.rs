mod support;

use std::sync::atomic::Ordering;

use bytes::Bytes;
use credentials::InMemoryTokenStore;
use layers::HeadlessMap;
use overlay::{FailureReason, LoaderConfig, OverlayController, OverlayState};
use pretty_assertions::assert_eq;
use session::{RawBbox, SatelliteImage};
use support::{Backend, PNG_BYTES};

fn stored_image() -> SatelliteImage {
    SatelliteImage {
        id: "img-1".to_string(),
        name: "Bonny 2024-03".to_string(),
        is_cog_converted: true,
        bbox: Some(RawBbox {
            minx: 7.0,
            miny: 4.4,
            maxx: 7.3,
            maxy: 4.7,
        }),
        ..SatelliteImage::default()
    }
}

#[tokio::test]
async fn signed_out_raster_fetch_fails_with_authentication() {
    let backend = Backend::start().await;
    let client = backend.client_with(InMemoryTokenStore::new());
    let map = HeadlessMap::new();
    let ctl = OverlayController::new(client, map.clone(), LoaderConfig::default());

    let state = ctl.select(&stored_image()).await;

    match state {
        OverlayState::Failed(failure) => {
            assert_eq!(failure.reason, FailureReason::Authentication);
            assert_eq!(failure.message(), "Authentication failed. Please sign in again.");
        }
        other => panic!("expected an authentication failure, got {other:?}"),
    }
    // The fetch still goes out, without a header.
    assert_eq!(backend.state.raster_hits.load(Ordering::SeqCst), 1);
    assert_eq!(*backend.state.raster_bearer.lock(), None);
    assert_eq!(backend.state.refresh_calls(), 0);
    assert_eq!(map.overlay_count(), 0);
}

#[tokio::test]
async fn stale_token_is_refreshed_once_and_the_overlay_shows() {
    let backend = Backend::start().await;
    let client = backend.client_with_access("stale");
    let map = HeadlessMap::new();
    let ctl = OverlayController::new(client, map.clone(), LoaderConfig::default());

    let state = ctl.select_id("img-1").await;

    assert!(matches!(state, OverlayState::Displayed { .. }), "{state:?}");
    assert_eq!(backend.state.refresh_calls(), 1);
    assert_eq!(
        backend.state.raster_bearer.lock().as_deref(),
        Some("access-2")
    );
    assert_eq!(
        ctl.source().context().access_token().as_deref(),
        Some("access-2")
    );
}

#[tokio::test]
async fn raster_is_fetched_with_the_bearer_token() {
    let backend = Backend::start().await;
    let client = backend.client_with_access("access-1");
    let map = HeadlessMap::new();
    let ctl = OverlayController::new(client, map.clone(), LoaderConfig::default());

    let state = ctl.select_id("img-1").await;

    let bounds = state.bounds().unwrap();
    assert_eq!(
        (bounds.min_lon, bounds.min_lat, bounds.max_lon, bounds.max_lat),
        (7.0, 4.4, 7.3, 4.7)
    );
    assert_eq!(
        backend.state.raster_bearer.lock().as_deref(),
        Some("access-1")
    );
    assert_eq!(backend.state.refresh_calls(), 0);

    let overlays = map.overlays();
    assert_eq!(overlays.len(), 1);
    assert_eq!(overlays[0].image, Bytes::from_static(PNG_BYTES));
    assert_eq!(overlays[0].content_type.as_deref(), Some("image/png"));
    assert_eq!(
        overlays[0].attribution.as_deref(),
        Some("Satellite Image: Bonny 2024-03")
    );
}
