//! Typed endpoint groups. Create and update calls for pipelines and images
//! send multipart forms; everything else is JSON.

use serde_json::json;

use crate::client::{ApiClient, ApiRequest, RasterBytes};
use crate::error::ApiError;
use crate::form::{PipelineForm, SatelliteImageForm};
use crate::models::{
    Analysis, Anomaly, ExtractBboxResponse, Listing, Notification, Pipeline, SatelliteImage,
    Severity, UnreadCount, User,
};

impl ApiClient {
    pub fn pipelines(&self) -> PipelinesApi<'_> {
        PipelinesApi { client: self }
    }

    pub fn satellite_images(&self) -> SatelliteImagesApi<'_> {
        SatelliteImagesApi { client: self }
    }

    pub fn analyses(&self) -> AnalysesApi<'_> {
        AnalysesApi { client: self }
    }

    pub fn anomalies(&self) -> AnomaliesApi<'_> {
        AnomaliesApi { client: self }
    }

    pub fn notifications(&self) -> NotificationsApi<'_> {
        NotificationsApi { client: self }
    }

    pub fn users(&self) -> UsersApi<'_> {
        UsersApi { client: self }
    }
}

pub struct PipelinesApi<'a> {
    client: &'a ApiClient,
}

impl PipelinesApi<'_> {
    pub async fn list(&self) -> Result<Vec<Pipeline>, ApiError> {
        let listing: Listing<Pipeline> = self.client.json(ApiRequest::get("/pipelines/")).await?;
        Ok(listing.into_items())
    }

    pub async fn get(&self, id: &str) -> Result<Pipeline, ApiError> {
        self.client
            .json(ApiRequest::get(format!("/pipelines/{id}/")))
            .await
    }

    /// Route geometry as a GeoJSON FeatureCollection.
    pub async fn geojson(&self, id: &str) -> Result<serde_json::Value, ApiError> {
        self.client
            .json(ApiRequest::get(format!("/pipelines/{id}/geojson/")))
            .await
    }

    pub async fn create(&self, form: &PipelineForm) -> Result<Pipeline, ApiError> {
        let req = ApiRequest::post("/pipelines/").multipart(form.to_multipart());
        self.client.json(req).await
    }

    pub async fn update(&self, id: &str, form: &PipelineForm) -> Result<Pipeline, ApiError> {
        let req = ApiRequest::put(format!("/pipelines/{id}/")).multipart(form.to_multipart());
        self.client.json(req).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.client
            .execute(ApiRequest::delete(format!("/pipelines/{id}/")))
            .await
    }
}

pub struct SatelliteImagesApi<'a> {
    client: &'a ApiClient,
}

impl SatelliteImagesApi<'_> {
    pub async fn list(&self, pipeline: Option<&str>) -> Result<Vec<SatelliteImage>, ApiError> {
        let req = ApiRequest::get("/satellite-images/").query_opt("pipeline", pipeline);
        let listing: Listing<SatelliteImage> = self.client.json(req).await?;
        Ok(listing.into_items())
    }

    pub async fn get(&self, id: &str) -> Result<SatelliteImage, ApiError> {
        self.client
            .json(ApiRequest::get(format!("/satellite-images/{id}/")))
            .await
    }

    /// Uploads run under the raster timeout; a GeoTIFF can be large.
    pub async fn create(&self, form: &SatelliteImageForm) -> Result<SatelliteImage, ApiError> {
        let req = ApiRequest::post("/satellite-images/")
            .multipart(form.to_multipart())
            .timeout(self.client.config().raster_timeout);
        self.client.json(req).await
    }

    pub async fn update(
        &self,
        id: &str,
        form: &SatelliteImageForm,
    ) -> Result<SatelliteImage, ApiError> {
        let req = ApiRequest::put(format!("/satellite-images/{id}/"))
            .multipart(form.to_multipart())
            .timeout(self.client.config().raster_timeout);
        self.client.json(req).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.client
            .execute(ApiRequest::delete(format!("/satellite-images/{id}/")))
            .await
    }

    pub async fn convert_to_cog(&self, id: &str) -> Result<(), ApiError> {
        self.client
            .execute(ApiRequest::post(format!(
                "/satellite-images/{id}/convert_to_cog/"
            )))
            .await
    }

    pub async fn run_analysis(&self, id: &str) -> Result<(), ApiError> {
        self.client
            .execute(ApiRequest::post(format!(
                "/satellite-images/{id}/run_analysis/"
            )))
            .await
    }

    /// Asks the backend to read the raster's extent, reprojected to WGS84.
    pub async fn extract_bbox(&self, id: &str) -> Result<ExtractBboxResponse, ApiError> {
        self.client
            .json(ApiRequest::post(format!(
                "/satellite-images/{id}/extract_bbox/"
            )))
            .await
    }

    /// Browser-displayable rendering of the raster, under the raster timeout.
    pub async fn display_image(&self, id: &str) -> Result<RasterBytes, ApiError> {
        let req = ApiRequest::get(display_image_path(id)).timeout(self.client.config().raster_timeout);
        self.client.bytes(req).await
    }

    /// Hits the render endpoint only for its side effect: the backend extracts
    /// and stores the bbox while rendering. The body is discarded.
    pub async fn trigger_render(&self, id: &str) -> Result<(), ApiError> {
        let req = ApiRequest::get(display_image_path(id)).timeout(self.client.config().raster_timeout);
        self.client.execute(req).await
    }
}

fn display_image_path(id: &str) -> String {
    format!("/satellite-images/{id}/display_image/")
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisFilter {
    pub satellite_image: Option<String>,
    pub pipeline: Option<String>,
    pub analysis_type: Option<String>,
    pub severity: Option<Severity>,
}

pub struct AnalysesApi<'a> {
    client: &'a ApiClient,
}

impl AnalysesApi<'_> {
    pub async fn list(&self, filter: &AnalysisFilter) -> Result<Vec<Analysis>, ApiError> {
        let req = ApiRequest::get("/analyses/")
            .query_opt("satellite_image", filter.satellite_image.as_deref())
            .query_opt("pipeline", filter.pipeline.as_deref())
            .query_opt("analysis_type", filter.analysis_type.as_deref())
            .query_opt("severity", filter.severity.map(|s| s.as_str()));
        let listing: Listing<Analysis> = self.client.json(req).await?;
        Ok(listing.into_items())
    }

    pub async fn get(&self, id: &str) -> Result<Analysis, ApiError> {
        self.client
            .json(ApiRequest::get(format!("/analyses/{id}/")))
            .await
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnomalyFilter {
    pub is_resolved: Option<bool>,
    pub severity: Option<Severity>,
    pub anomaly_type: Option<String>,
}

pub struct AnomaliesApi<'a> {
    client: &'a ApiClient,
}

impl AnomaliesApi<'_> {
    pub async fn list(&self, filter: &AnomalyFilter) -> Result<Vec<Anomaly>, ApiError> {
        let req = ApiRequest::get("/anomalies/")
            .query_opt("is_resolved", filter.is_resolved)
            .query_opt("severity", filter.severity.map(|s| s.as_str()))
            .query_opt("anomaly_type", filter.anomaly_type.as_deref());
        let listing: Listing<Anomaly> = self.client.json(req).await?;
        Ok(listing.into_items())
    }

    pub async fn get(&self, id: &str) -> Result<Anomaly, ApiError> {
        self.client
            .json(ApiRequest::get(format!("/anomalies/{id}/")))
            .await
    }

    pub async fn mark_resolved(&self, id: &str) -> Result<(), ApiError> {
        self.client
            .execute(ApiRequest::post(format!("/anomalies/{id}/mark_resolved/")))
            .await
    }

    pub async fn mark_unresolved(&self, id: &str) -> Result<(), ApiError> {
        self.client
            .execute(ApiRequest::post(format!("/anomalies/{id}/mark_unresolved/")))
            .await
    }
}

pub struct NotificationsApi<'a> {
    client: &'a ApiClient,
}

impl NotificationsApi<'_> {
    pub async fn list(&self, is_read: Option<bool>) -> Result<Vec<Notification>, ApiError> {
        let req = ApiRequest::get("/notifications/").query_opt("is_read", is_read);
        let listing: Listing<Notification> = self.client.json(req).await?;
        Ok(listing.into_items())
    }

    pub async fn get(&self, id: &str) -> Result<Notification, ApiError> {
        self.client
            .json(ApiRequest::get(format!("/notifications/{id}/")))
            .await
    }

    pub async fn mark_read(&self, id: &str) -> Result<(), ApiError> {
        self.client
            .execute(ApiRequest::post(format!("/notifications/{id}/mark_read/")))
            .await
    }

    pub async fn mark_all_read(&self) -> Result<(), ApiError> {
        self.client
            .execute(ApiRequest::post("/notifications/mark_all_read/"))
            .await
    }

    pub async fn unread_count(&self) -> Result<u64, ApiError> {
        let count: UnreadCount = self
            .client
            .json(ApiRequest::get("/notifications/unread_count/"))
            .await?;
        Ok(count.unread_count)
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.client
            .execute(ApiRequest::delete(format!("/notifications/{id}/")))
            .await
    }
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

pub struct UsersApi<'a> {
    client: &'a ApiClient,
}

impl UsersApi<'_> {
    pub async fn me(&self) -> Result<User, ApiError> {
        self.client.json(ApiRequest::get(crate::auth::ME_PATH)).await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, ApiError> {
        let body = serde_json::to_value(update).map_err(|e| ApiError::Invalid(e.to_string()))?;
        self.client
            .json(ApiRequest::patch(crate::auth::ME_PATH).json(body))
            .await
    }

    pub async fn set_password(&self, current: &str, new: &str) -> Result<(), ApiError> {
        let req = ApiRequest::post("/auth/users/set-password/").json(json!({
            "current_password": current,
            "new_password": new,
            "re_new_password": new,
        }));
        self.client.execute(req).await
    }

    pub async fn reset_password(&self, email: &str) -> Result<(), ApiError> {
        let req = ApiRequest::post("/auth/users/reset-password/")
            .json(json!({ "email": email }))
            .without_refresh();
        self.client.execute(req).await
    }

    /// Completes a reset with the `uid` and `token` from the reset email.
    pub async fn reset_password_confirm(
        &self,
        uid: &str,
        token: &str,
        new_password: &str,
    ) -> Result<(), ApiError> {
        let req = ApiRequest::post("/auth/users/reset-password-confirm/")
            .json(json!({
                "uid": uid,
                "token": token,
                "new_password": new_password,
                "re_new_password": new_password,
            }))
            .without_refresh();
        self.client.execute(req).await
    }

    pub async fn activate(&self, uid: &str, token: &str) -> Result<(), ApiError> {
        let req = ApiRequest::post("/auth/users/activation/")
            .json(json!({ "uid": uid, "token": token }))
            .without_refresh();
        self.client.execute(req).await
    }

    pub async fn resend_activation(&self, email: &str) -> Result<(), ApiError> {
        let req = ApiRequest::post("/auth/users/resend-activation/")
            .json(json!({ "email": email }))
            .without_refresh();
        self.client.execute(req).await
    }

    pub async fn delete_account(&self, current_password: &str) -> Result<(), ApiError> {
        let req = ApiRequest::delete(crate::auth::ME_PATH)
            .json(json!({ "current_password": current_password }));
        self.client.execute(req).await
    }
}
