//! Multipart bodies kept as plain data, so a request can be rebuilt and sent
//! again after a token refresh. `reqwest::multipart::Form` is single-use.

use bytes::Bytes;
use reqwest::multipart::{Form, Part};

use crate::error::ApiError;
use crate::models::{ImageType, PipelineStatus};

/// File content for one multipart field.
#[derive(Debug, Clone, PartialEq)]
pub struct Upload {
    pub file_name: String,
    pub mime: Option<String>,
    pub bytes: Bytes,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            mime: None,
            bytes: bytes.into(),
        }
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormValue {
    Text(String),
    File(Upload),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultipartForm {
    parts: Vec<(String, FormValue)>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.parts
            .push((name.into(), FormValue::Text(value.to_string())));
        self
    }

    pub fn text_opt(self, name: impl Into<String>, value: Option<impl ToString>) -> Self {
        match value {
            Some(v) => self.text(name, v),
            None => self,
        }
    }

    pub fn file(mut self, name: impl Into<String>, upload: Upload) -> Self {
        self.parts.push((name.into(), FormValue::File(upload)));
        self
    }

    pub fn parts(&self) -> &[(String, FormValue)] {
        &self.parts
    }

    /// Builds a fresh reqwest form for one send.
    pub fn to_reqwest(&self) -> Result<Form, ApiError> {
        let mut form = Form::new();
        for (name, value) in &self.parts {
            form = match value {
                FormValue::Text(text) => form.text(name.clone(), text.clone()),
                FormValue::File(upload) => {
                    let mut part =
                        Part::bytes(upload.bytes.to_vec()).file_name(upload.file_name.clone());
                    if let Some(mime) = &upload.mime {
                        part = part
                            .mime_str(mime)
                            .map_err(|e| ApiError::Invalid(format!("mime type {mime}: {e}")))?;
                    }
                    form.part(name.clone(), part)
                }
            };
        }
        Ok(form)
    }
}

/// Create/update fields of a pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineForm {
    pub name: String,
    pub description: Option<String>,
    pub status: Option<PipelineStatus>,
    pub length_km: Option<f64>,
}

impl PipelineForm {
    pub fn to_multipart(&self) -> MultipartForm {
        MultipartForm::new()
            .text("name", &self.name)
            .text_opt("description", self.description.as_ref())
            .text_opt("status", self.status.map(|s| s.as_str()))
            .text_opt("length_km", self.length_km)
    }
}

/// Create/update fields of a satellite image. A new image enters the system
/// through `original_tiff`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SatelliteImageForm {
    pub name: String,
    pub description: Option<String>,
    pub pipeline: Option<String>,
    pub acquisition_date: Option<String>,
    pub image_type: Option<ImageType>,
    pub original_tiff: Option<Upload>,
}

impl SatelliteImageForm {
    pub fn to_multipart(&self) -> MultipartForm {
        let form = MultipartForm::new()
            .text("name", &self.name)
            .text_opt("description", self.description.as_ref())
            .text_opt("pipeline", self.pipeline.as_ref())
            .text_opt("acquisition_date", self.acquisition_date.as_ref())
            .text_opt("image_type", self.image_type.map(|t| t.as_str()));
        match &self.original_tiff {
            Some(upload) => form.file("original_tiff", upload.clone()),
            None => form,
        }
    }
}
