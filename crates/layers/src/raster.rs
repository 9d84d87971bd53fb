use bytes::Bytes;
use foundation::GeoBounds;

use crate::layer::{Layer, LayerId};
use crate::symbology::OverlayStyle;

/// Raster image pinned to a geographic rectangle.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageOverlay {
    id: LayerId,
    pub bounds: GeoBounds,
    pub image: Bytes,
    pub content_type: Option<String>,
    pub style: OverlayStyle,
    pub attribution: Option<String>,
}

impl ImageOverlay {
    pub fn new(id: LayerId, bounds: GeoBounds, image: Bytes) -> Self {
        Self {
            id,
            bounds,
            image,
            content_type: None,
            style: OverlayStyle::default(),
            attribution: None,
        }
    }

    pub fn with_content_type(mut self, content_type: Option<String>) -> Self {
        self.content_type = content_type;
        self
    }

    pub fn with_attribution(mut self, attribution: impl Into<String>) -> Self {
        self.attribution = Some(attribution.into());
        self
    }

    pub fn with_style(mut self, style: OverlayStyle) -> Self {
        self.style = style;
        self
    }
}

impl Layer for ImageOverlay {
    fn id(&self) -> LayerId {
        self.id
    }
}
