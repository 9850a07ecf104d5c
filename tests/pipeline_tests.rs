//! End-to-end rendering tests: employee record in, composed PDF out.
//!
//! Images come from an in-memory fetcher that encodes PNGs on the fly, so
//! nothing here touches the network.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::{ImageFormat, Rgba, RgbaImage};
use sha2::{Digest, Sha256};

use id_forge::cancel::CancelToken;
use id_forge::card::CardRenderer;
use id_forge::codec::CodecService;
use id_forge::compose::{compose, ExportDocument};
use id_forge::descriptor::ImageKind;
use id_forge::employee::{EmployeeRecord, Status};
use id_forge::error::ExportError;
use id_forge::fonts::FontManager;
use id_forge::images::ImageFetcher;
use id_forge::pipeline::{CardPipeline, DocumentBuilder, PipelineConfig};
use id_forge::raster::{RasterPage, Rasterizer};
use id_forge::remote::{ObjectStore, RecordSystem, RemoteError, RoutingReport, UploadReceipt};
use id_forge::status::StatusBoard;
use id_forge::variant::{PageGeometry, PageOrientation, Side};
use id_forge::workflow::ExportWorkflow;

// =====================================================================
// Helpers
// =====================================================================

fn png(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba(color));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Serves photos, signatures and codec images by URL shape. URLs containing
/// `broken` fail. An optional delay holds every fetch.
struct FakeFetcher {
    delay: Duration,
    /// Edge length of the square PNG returned for barcodes.
    barcode_px: u32,
}

impl FakeFetcher {
    fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            barcode_px: 120,
        }
    }
}

#[async_trait]
impl ImageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, String> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if url.contains("broken") {
            return Err("HTTP 404 Not Found".into());
        }
        if url.contains("/barcode") {
            return Ok(png(self.barcode_px, self.barcode_px, [0, 0, 0, 255]));
        }
        if url.contains("/qr") {
            return Ok(png(120, 120, [0, 0, 0, 255]));
        }
        if url.contains("sig") {
            return Ok(png(90, 30, [0, 0, 128, 255]));
        }
        Ok(png(64, 80, [180, 40, 40, 255]))
    }
}

fn pipeline_from(fetcher: FakeFetcher) -> CardPipeline {
    let config = PipelineConfig::default();
    let rasterizer = Rasterizer::new(
        Arc::new(FontManager::default()),
        Arc::new(fetcher),
        config.image_timeout,
    );
    let renderer = CardRenderer::new(
        CodecService::new("http://codec.test/").unwrap(),
        "Acme Lending",
        "https://people.test/verify",
    );
    CardPipeline::new(renderer, rasterizer, config)
}

fn pipeline_with(delay: Duration) -> CardPipeline {
    pipeline_from(FakeFetcher::with_delay(delay))
}

fn pipeline() -> CardPipeline {
    pipeline_with(Duration::ZERO)
}

fn field_dual() -> EmployeeRecord {
    EmployeeRecord {
        id: 7,
        id_number: "EMP-0007".into(),
        first_name: "Maria".into(),
        middle_name: Some("Luna".into()),
        last_name: "Santos".into(),
        position: "Field Officer".into(),
        role_subtype: Some("Repossessor".into()),
        photo_url: Some("https://img.test/orig.png".into()),
        ai_photo_url: Some("https://img.test/ai.png".into()),
        signature_url: Some("https://img.test/sig.png".into()),
        status: Status::Rendered,
        ..Default::default()
    }
}

fn standard() -> EmployeeRecord {
    EmployeeRecord {
        id: 11,
        id_number: "EMP-0011".into(),
        first_name: "Ana".into(),
        last_name: "Reyes".into(),
        position: "Accountant".into(),
        photo_url: Some("https://img.test/ana.png".into()),
        ..Default::default()
    }
}

fn orientations(doc: &ExportDocument) -> Vec<(PageOrientation, Side)> {
    doc.pages
        .iter()
        .map(|p| (p.geometry.orientation, p.variant.side))
        .collect()
}

fn near(pixel: &Rgba<u8>, rgb: [u8; 3]) -> bool {
    let [r, g, b, _] = pixel.0;
    r.abs_diff(rgb[0]) <= 2 && g.abs_diff(rgb[1]) <= 2 && b.abs_diff(rgb[2]) <= 2
}

fn count_near(image: &RgbaImage, rgb: [u8; 3]) -> usize {
    image.pixels().filter(|p| near(p, rgb)).count()
}

const PHOTO_RED: [u8; 3] = [180, 40, 40];
const PLACEHOLDER_GREY: [u8; 3] = [230, 232, 235];

fn assert_valid_pdf(bytes: &[u8]) {
    assert!(bytes.len() > 100, "PDF too small: {} bytes", bytes.len());
    assert_eq!(&bytes[0..5], b"%PDF-", "Missing PDF header");
}

// =====================================================================
// Document assembly
// =====================================================================

#[tokio::test]
async fn dual_variant_employee_gets_four_pages_in_order() {
    let doc = pipeline()
        .build_document(&field_dual(), &CancelToken::new())
        .await
        .unwrap();
    assert_eq!(
        orientations(&doc),
        vec![
            (PageOrientation::Portrait, Side::Front),
            (PageOrientation::Portrait, Side::Back),
            (PageOrientation::Landscape, Side::Front),
            (PageOrientation::Landscape, Side::Back),
        ]
    );
    assert_eq!(doc.pages[0].image.dimensions(), (613, 959));
    assert_eq!(doc.pages[3].image.dimensions(), (959, 613));
}

#[tokio::test]
async fn artifact_is_a_pdf_with_one_page_per_side() {
    let artifact = pipeline()
        .build(&standard(), &CancelToken::new())
        .await
        .unwrap();
    assert_valid_pdf(&artifact.bytes);
    assert_eq!(artifact.page_count, 2);
    assert_eq!(artifact.file_name, "EMP-0011_Reyes_id_card.pdf");
}

#[test]
fn composed_pages_keep_their_own_geometry() {
    let pages: Vec<RasterPage> = id_forge::select_variants(&field_dual())
        .into_iter()
        .map(|variant| {
            let (w, h) = variant.geometry.device_px(1.0);
            RasterPage {
                variant,
                width_px: w,
                height_px: h,
                image: RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255])),
            }
        })
        .collect();
    let n = pages.len();
    let doc = compose(pages);
    assert_eq!(doc.page_count(), n);
    assert_eq!(doc.pages[1].geometry, PageGeometry::PORTRAIT_CARD);
    assert_eq!(doc.pages[2].geometry, PageGeometry::LANDSCAPE_CARD);
    assert_valid_pdf(&doc.to_pdf_bytes("geometry").unwrap());
}

// =====================================================================
// Photo rules and degradation
// =====================================================================

#[test]
fn landscape_front_uses_original_photo_even_with_ai_photo() {
    let frames = pipeline().frames(&field_dual()).unwrap();
    let photo_srcs = |index: usize| -> Vec<String> {
        frames[index]
            .1
            .image_boxes()
            .into_iter()
            .filter_map(|b| b.image.as_ref())
            .filter(|slot| slot.kind == ImageKind::Photo)
            .map(|slot| slot.src.clone())
            .collect()
    };
    assert_eq!(photo_srcs(0), vec!["https://img.test/ai.png".to_string()]);
    assert_eq!(photo_srcs(2), vec!["https://img.test/orig.png".to_string()]);
}

#[tokio::test]
async fn broken_photo_degrades_instead_of_failing() {
    let mut employee = standard();
    employee.photo_url = Some("https://img.test/broken.png".into());
    let p = pipeline();
    let artifact = p.build(&employee, &CancelToken::new()).await.unwrap();
    assert_eq!(artifact.page_count, 2);

    let doc = p.build_document(&employee, &CancelToken::new()).await.unwrap();
    let front = &doc.pages[0].image;
    assert_eq!(count_near(front, PHOTO_RED), 0);
    // The 96 x 112 px photo slot is filled grey at 3x.
    let grey = count_near(front, PLACEHOLDER_GREY);
    assert!(grey > 80 * 100 * 9, "no photo placeholder ({grey} px)");
}

/// Device pixels strictly inside the front-page barcode slot.
async fn barcode_slot_pixels(barcode_px: u32) -> Vec<Rgba<u8>> {
    let p = pipeline_from(FakeFetcher {
        delay: Duration::ZERO,
        barcode_px,
    });
    let employee = standard();
    let frames = p.frames(&employee).unwrap();
    let slot = frames[0]
        .1
        .image_boxes()
        .into_iter()
        .find(|b| matches!(&b.image, Some(s) if s.kind == ImageKind::Barcode))
        .cloned()
        .expect("front page has a barcode slot");

    let doc = p.build_document(&employee, &CancelToken::new()).await.unwrap();
    let front = &doc.pages[0].image;
    let scale = PipelineConfig::default().render_scale;
    let x0 = (slot.x * scale).ceil() as u32 + 1;
    let y0 = (slot.y * scale).ceil() as u32 + 1;
    let x1 = ((slot.x + slot.width) * scale).floor() as u32 - 1;
    let y1 = ((slot.y + slot.height) * scale).floor() as u32 - 1;
    assert!(x1 > x0 && y1 > y0);
    (y0..y1)
        .flat_map(|y| (x0..x1).map(move |x| (x, y)))
        .map(|(x, y)| *front.get_pixel(x, y))
        .collect()
}

#[tokio::test]
async fn undersized_barcode_leaves_its_slot_blank() {
    let dark = |pixels: &[Rgba<u8>]| pixels.iter().filter(|p| p.0[0] < 64).count();

    let full = barcode_slot_pixels(120).await;
    assert!(dark(&full) > full.len() / 2, "barcode not painted");

    let tiny = barcode_slot_pixels(8).await;
    assert_eq!(dark(&tiny), 0);
    assert!(tiny.iter().all(|p| near(p, [255, 255, 255])));
}

#[tokio::test]
async fn same_record_renders_identical_pixels() {
    let hash = |doc: &ExportDocument| {
        let mut hasher = Sha256::new();
        for page in &doc.pages {
            hasher.update(page.image.as_raw());
        }
        hasher.finalize()
    };
    let p = pipeline();
    let a = p.build_document(&field_dual(), &CancelToken::new()).await.unwrap();
    let b = p.build_document(&field_dual(), &CancelToken::new()).await.unwrap();
    assert_eq!(hash(&a), hash(&b));
}

#[tokio::test]
async fn photo_pixels_are_painted_after_load() {
    for delay in [Duration::ZERO, Duration::from_millis(50)] {
        let doc = pipeline_with(delay)
            .build_document(&standard(), &CancelToken::new())
            .await
            .unwrap();
        let red = count_near(&doc.pages[0].image, PHOTO_RED);
        assert!(
            red > 1000,
            "photo missing from front page after {delay:?} fetch ({red} px)"
        );
    }
}

// =====================================================================
// Preview and the full workflow on the real pipeline
// =====================================================================

struct AcceptingStore;

#[async_trait]
impl ObjectStore for AcceptingStore {
    async fn upload(&self, id: u64, name: &str, _: &[u8]) -> Result<UploadReceipt, RemoteError> {
        Ok(UploadReceipt {
            url: format!("https://store.test/{id}/{name}"),
            record_synced: true,
        })
    }
}

struct QuietRecords;

#[async_trait]
impl RecordSystem for QuietRecords {
    async fn approve(&self, _: u64, _: &str) -> Result<(), RemoteError> {
        Ok(())
    }
    async fn send_to_poc(&self, _: u64) -> Result<String, RemoteError> {
        Ok("Main".into())
    }
    async fn complete(&self, _: u64) -> Result<(), RemoteError> {
        Ok(())
    }
    async fn route_approved(&self, _: &[u64]) -> Result<RoutingReport, RemoteError> {
        Ok(RoutingReport::default())
    }
}

fn workflow(pipeline: CardPipeline) -> ExportWorkflow {
    ExportWorkflow::new(
        Arc::new(pipeline),
        Arc::new(AcceptingStore),
        Arc::new(QuietRecords),
        Arc::new(StatusBoard::new()),
    )
}

#[tokio::test]
async fn export_releases_pdf_after_upload() {
    let wf = workflow(pipeline());
    let receipt = wf.generate_and_approve(&field_dual()).await.unwrap();
    assert_eq!(
        receipt.document_url,
        "https://store.test/7/EMP-0007_Santos_id_card.pdf"
    );
    assert_eq!(receipt.artifact.page_count, 4);
    assert_valid_pdf(&receipt.artifact.bytes);
    assert_eq!(wf.board().status(7), Some(Status::Approved));
}

#[tokio::test]
async fn newer_preview_cancels_older_one() {
    let wf = workflow(pipeline_with(Duration::from_millis(150)));
    let employee = standard();

    let first = wf.preview(&employee);
    let second = async {
        tokio::time::sleep(Duration::from_millis(30)).await;
        wf.preview(&employee).await
    };
    let (first, second) = tokio::join!(first, second);

    assert!(matches!(first, Err(ExportError::Cancelled)));
    let artifact = second.unwrap();
    assert_eq!(artifact.page_count, 2);
    // Previews never touch the board.
    assert_eq!(wf.board().status(employee.id), None);
}
