//! Pipeline – ties together variant selection, card rendering,
//! rasterization and composition into one document per employee.

use std::time::Duration;

use async_trait::async_trait;

use crate::cancel::CancelToken;
use crate::card::CardRenderer;
use crate::compose::{compose, ExportDocument};
use crate::employee::EmployeeRecord;
use crate::error::ExportError;
use crate::frame::Frame;
use crate::raster::Rasterizer;
use crate::variant::{select_variants, TemplateVariant};

/// Render-time settings.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Supersampling factor from surface px to output px (default: 3.0).
    pub render_scale: f32,
    /// Upper bound on each image load (default: 5 s).
    pub image_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            render_scale: 3.0,
            image_timeout: Duration::from_secs(5),
        }
    }
}

/// A finished, not yet released, document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub page_count: usize,
}

impl Artifact {
    pub fn new(employee: &EmployeeRecord, bytes: Vec<u8>, page_count: usize) -> Self {
        Self {
            file_name: artifact_file_name(employee),
            bytes,
            page_count,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// `<id_number>_<last name>_id_card.pdf`, restricted to `[A-Za-z0-9_-]`.
pub fn artifact_file_name(employee: &EmployeeRecord) -> String {
    let id = match employee.id_number.trim() {
        "" => employee.id.to_string(),
        id_number => id_number.to_string(),
    };
    let stem = format!("{}_{}_id_card", id, employee.last_name.trim());
    let clean: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{clean}.pdf")
}

/// Produces the document for one employee. The export workflow only sees
/// this seam.
#[async_trait]
pub trait DocumentBuilder: Send + Sync {
    async fn build(
        &self,
        employee: &EmployeeRecord,
        cancel: &CancelToken,
    ) -> Result<Artifact, ExportError>;
}

pub struct CardPipeline {
    renderer: CardRenderer,
    rasterizer: Rasterizer,
    config: PipelineConfig,
}

impl CardPipeline {
    pub fn new(renderer: CardRenderer, rasterizer: Rasterizer, config: PipelineConfig) -> Self {
        Self {
            renderer,
            rasterizer,
            config,
        }
    }

    /// Capture every selected page strictly in selector order.
    pub async fn build_document(
        &self,
        employee: &EmployeeRecord,
        cancel: &CancelToken,
    ) -> Result<ExportDocument, ExportError> {
        let variants = select_variants(employee);
        let mut pages = Vec::with_capacity(variants.len());
        for variant in &variants {
            cancel.check()?;
            let descriptor = self.renderer.render(employee, variant);
            let (w, h) = variant.geometry.surface_size();
            let page = self
                .rasterizer
                .capture_cancellable(&descriptor, w, h, self.config.render_scale, cancel)
                .await?;
            pages.push(page);
        }
        Ok(compose(pages))
    }

    /// Laid-out frames for every page, for template debugging.
    pub fn frames(
        &self,
        employee: &EmployeeRecord,
    ) -> Result<Vec<(TemplateVariant, Frame)>, ExportError> {
        select_variants(employee)
            .into_iter()
            .map(|variant| {
                let descriptor = self.renderer.render(employee, &variant);
                let (w, h) = variant.geometry.surface_size();
                let frame = self.rasterizer.layout_frame(&descriptor, w, h)?;
                Ok((variant, frame))
            })
            .collect()
    }
}

#[async_trait]
impl DocumentBuilder for CardPipeline {
    async fn build(
        &self,
        employee: &EmployeeRecord,
        cancel: &CancelToken,
    ) -> Result<Artifact, ExportError> {
        let document = self.build_document(employee, cancel).await?;
        cancel.check()?;
        let title = format!("{} ID card", employee.full_name());
        let bytes = document.to_pdf_bytes(&title)?;
        log::debug!(
            "employee {}: {} page(s), {} bytes",
            employee.id,
            document.page_count(),
            bytes.len()
        );
        Ok(Artifact::new(employee, bytes, document.page_count()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_is_sanitised() {
        let e = EmployeeRecord {
            id: 9,
            id_number: "EMP/0009".into(),
            last_name: "Dela Cruz".into(),
            ..Default::default()
        };
        assert_eq!(artifact_file_name(&e), "EMP_0009_Dela_Cruz_id_card.pdf");
    }

    #[test]
    fn file_name_falls_back_to_record_id() {
        let e = EmployeeRecord {
            id: 9,
            last_name: "Reyes".into(),
            ..Default::default()
        };
        assert_eq!(artifact_file_name(&e), "9_Reyes_id_card.pdf");
    }
}
