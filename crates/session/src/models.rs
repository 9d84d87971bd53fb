//! Response shapes of the backend. Fields the client never reads are left out;
//! serde ignores them.

use foundation::GeoBounds;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl User {
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct JwtPairResponse {
    pub access: String,
    pub refresh: String,
}

/// `bbox` object as the backend serializes it (projection-agnostic names).
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBbox {
    pub minx: f64,
    pub miny: f64,
    pub maxx: f64,
    pub maxy: f64,
}

/// Prefer the `bbox` object; otherwise all four discrete fields must be set.
///
/// No validity check happens here. The numbers may well be UTM metres.
fn bounds_from_parts(
    bbox: Option<&RawBbox>,
    minx: Option<f64>,
    miny: Option<f64>,
    maxx: Option<f64>,
    maxy: Option<f64>,
) -> Option<GeoBounds> {
    if let Some(b) = bbox {
        return Some(GeoBounds::new(b.minx, b.miny, b.maxx, b.maxy));
    }
    Some(GeoBounds::new(minx?, miny?, maxx?, maxy?))
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Active,
    Inactive,
    Maintenance,
    #[serde(other)]
    Unknown,
}

impl PipelineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStatus::Active => "active",
            PipelineStatus::Inactive => "inactive",
            PipelineStatus::Maintenance => "maintenance",
            PipelineStatus::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub status: PipelineStatus,
    #[serde(default)]
    pub length_km: Option<f64>,
    #[serde(default)]
    pub satellite_images_count: u32,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageType {
    Optical,
    Sar,
    Thermal,
    Multispectral,
    #[serde(other)]
    Unknown,
}

impl ImageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageType::Optical => "optical",
            ImageType::Sar => "sar",
            ImageType::Thermal => "thermal",
            ImageType::Multispectral => "multispectral",
            ImageType::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SatelliteImage {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub pipeline: Option<String>,
    #[serde(default)]
    pub pipeline_name: Option<String>,
    #[serde(default)]
    pub original_tiff: Option<String>,
    #[serde(default)]
    pub cog_url: Option<String>,
    #[serde(default)]
    pub acquisition_date: Option<String>,
    #[serde(default)]
    pub image_type: Option<ImageType>,
    #[serde(default)]
    pub is_cog_converted: bool,
    #[serde(default)]
    pub conversion_status: Option<JobStatus>,
    #[serde(default)]
    pub bbox: Option<RawBbox>,
    #[serde(default)]
    pub bbox_minx: Option<f64>,
    #[serde(default)]
    pub bbox_miny: Option<f64>,
    #[serde(default)]
    pub bbox_maxx: Option<f64>,
    #[serde(default)]
    pub bbox_maxy: Option<f64>,
    #[serde(default)]
    pub analyses_count: u32,
}

impl SatelliteImage {
    /// Bounds carried in the metadata, trusted or not.
    pub fn embedded_bounds(&self) -> Option<GeoBounds> {
        bounds_from_parts(
            self.bbox.as_ref(),
            self.bbox_minx,
            self.bbox_miny,
            self.bbox_maxx,
            self.bbox_maxy,
        )
    }

    /// Whether the backend has any raster to extract bounds from or render.
    pub fn has_raster(&self) -> bool {
        self.is_cog_converted
            || self
                .original_tiff
                .as_deref()
                .is_some_and(|s| !s.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExtractBboxResponse {
    #[serde(default)]
    pub bbox: Option<RawBbox>,
    #[serde(default)]
    pub bbox_minx: Option<f64>,
    #[serde(default)]
    pub bbox_miny: Option<f64>,
    #[serde(default)]
    pub bbox_maxx: Option<f64>,
    #[serde(default)]
    pub bbox_maxy: Option<f64>,
}

impl ExtractBboxResponse {
    pub fn bounds(&self) -> Option<GeoBounds> {
        bounds_from_parts(
            self.bbox.as_ref(),
            self.bbox_minx,
            self.bbox_miny,
            self.bbox_maxx,
            self.bbox_maxy,
        )
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub id: String,
    pub satellite_image: String,
    #[serde(default)]
    pub satellite_image_name: String,
    #[serde(default)]
    pub pipeline: Option<String>,
    pub analysis_type: String,
    #[serde(default)]
    pub analysis_type_display: String,
    pub status: JobStatus,
    #[serde(default)]
    pub confidence_score: Option<f64>,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub results_json: serde_json::Value,
    #[serde(default)]
    pub processing_time_seconds: Option<f64>,
    #[serde(default)]
    pub error_message: String,
    #[serde(default)]
    pub anomalies_count: u32,
    #[serde(default)]
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub id: String,
    pub analysis: String,
    pub anomaly_type: String,
    #[serde(default)]
    pub anomaly_type_display: String,
    pub severity: Severity,
    pub location_lat: f64,
    pub location_lon: f64,
    #[serde(default)]
    pub area_m2: Option<f64>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub confidence_score: f64,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub is_resolved: bool,
    #[serde(default)]
    pub satellite_image_name: String,
    #[serde(default)]
    pub created_at: String,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    Email,
    Push,
    Both,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    #[serde(default)]
    pub anomaly: Option<String>,
    #[serde(default)]
    pub anomaly_type: Option<String>,
    pub notification_type: NotificationChannel,
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub read_at: Option<String>,
    #[serde(default)]
    pub created_at: String,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UnreadCount {
    #[serde(default)]
    pub unread_count: u64,
}

/// List endpoints answer either with a bare array or a DRF page.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Listing<T> {
    Page {
        #[serde(default)]
        count: Option<u64>,
        results: Vec<T>,
    },
    Plain(Vec<T>),
}

impl<T> Listing<T> {
    pub fn into_items(self) -> Vec<T> {
        match self {
            Listing::Page { results, .. } => results,
            Listing::Plain(items) => items,
        }
    }
}
