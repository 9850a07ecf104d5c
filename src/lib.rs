//! # id-forge – employee ID-card export pipeline
//!
//! Turns an [`EmployeeRecord`] into a multi-page, print-ready PDF and moves
//! the employee through the approval lifecycle. The stages are:
//!
//! 1. **Select** – pick the card variants and sides to print ([`variant`])
//! 2. **Render** – build one descriptor per page from a rule table ([`card`])
//! 3. **Rasterise** – parse, style and lay out the descriptor with Taffy,
//!    wait for every image, then paint a bitmap ([`raster`])
//! 4. **Compose** – one PDF page per bitmap, each at its own physical size
//!    ([`compose`])
//! 5. **Release** – upload, approve and route through the
//!    [`workflow::ExportWorkflow`] state machine, one employee at a time or
//!    through the [`batch::BatchRunner`].

pub mod batch;
pub mod cancel;
pub mod card;
pub mod codec;
pub mod compose;
pub mod config;
pub mod descriptor;
pub mod dom;
pub mod employee;
pub mod error;
pub mod fonts;
pub mod frame;
pub mod images;
pub mod layout;
pub mod paint;
pub mod pipeline;
pub mod raster;
pub mod remote;
pub mod status;
pub mod style;
pub mod variant;
pub mod workflow;

// Re-exports for convenience
pub use employee::{EmployeeRecord, Status};
pub use error::{ErrorKind, ExportError};
pub use pipeline::{Artifact, CardPipeline, DocumentBuilder, PipelineConfig};
pub use variant::{select_variants, PageGeometry, TemplateVariant};
pub use workflow::{ExportResult, ExportWorkflow};
