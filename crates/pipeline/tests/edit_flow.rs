use std::io::Cursor;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use async_trait::async_trait;
use image::{GrayImage, ImageFormat, Rgb, RgbImage};
use retouch_core::error::CoreError;
use retouch_core::mask::{Point, Polygon, EDITABLE, PRESERVE};
use retouch_pipeline::edit::{EditOrchestrator, EditResult, EditService};
use retouch_pipeline::rewrite::PromptRewriter;
use retouch_pipeline::PipelineError;
use retouch_upstream::backend::{
    GenerativeEditBackend, ImageFetcher, InlineImage, InstructionRewriteBackend,
    MaskedEditBackend, UpscaleBackend,
};
use retouch_upstream::UpstreamError;

fn encoded(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb([40, 90, 160]));
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
    bytes
}

fn square(size: f64) -> Polygon {
    Polygon::new(vec![
        Point::new(0.0, 0.0),
        Point::new(size, 0.0),
        Point::new(size, size),
        Point::new(0.0, size),
    ])
}

// ---------------------------------------------------------------------------
// Doubles
// ---------------------------------------------------------------------------

struct StaticFetcher {
    bytes: Vec<u8>,
    calls: AtomicU32,
}

#[async_trait]
impl ImageFetcher for StaticFetcher {
    async fn fetch(&self, _url: &str) -> Result<Vec<u8>, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.bytes.clone())
    }
}

#[derive(Default)]
struct RecordingMasked {
    fail_with: Option<u16>,
    seen: Mutex<Option<(Vec<u8>, String)>>,
}

#[async_trait]
impl MaskedEditBackend for RecordingMasked {
    async fn edit_with_mask(
        &self,
        _image: &[u8],
        mask: &[u8],
        prompt: &str,
    ) -> Result<String, UpstreamError> {
        *self.seen.lock().unwrap() = Some((mask.to_vec(), prompt.to_string()));
        match self.fail_with {
            Some(status) => Err(UpstreamError::Api {
                backend: "ideogram",
                status,
                body: "rejected".into(),
            }),
            None => Ok("https://edits.example/out.png".into()),
        }
    }
}

struct CannedGenerative {
    bytes: Vec<u8>,
}

#[async_trait]
impl GenerativeEditBackend for CannedGenerative {
    async fn edit_without_mask(&self, _image: &[u8], _prompt: &str) -> Result<InlineImage, UpstreamError> {
        Ok(InlineImage {
            bytes: self.bytes.clone(),
            mime_type: Some("image/jpeg".into()),
        })
    }
}

struct CannedUpscale;

#[async_trait]
impl UpscaleBackend for CannedUpscale {
    async fn upscale(&self, _image: &[u8]) -> Result<String, UpstreamError> {
        Ok("https://edits.example/upscaled.png".into())
    }
}

struct EnglishRewrite;

#[async_trait]
impl InstructionRewriteBackend for EnglishRewrite {
    async fn rewrite_instruction(
        &self,
        _image: &[u8],
        _mask: &[u8],
        instruction: &str,
    ) -> Result<String, UpstreamError> {
        Ok(format!(r#"{{"instruction": "English for: {instruction}"}}"#))
    }
}

struct Harness {
    service: EditService,
    fetcher: Arc<StaticFetcher>,
    masked: Arc<RecordingMasked>,
}

fn harness(masked: RecordingMasked, generative_output: Vec<u8>) -> Harness {
    let fetcher = Arc::new(StaticFetcher {
        bytes: encoded(20, 20, ImageFormat::Png),
        calls: AtomicU32::new(0),
    });
    let masked = Arc::new(masked);
    let orchestrator = EditOrchestrator::new(
        masked.clone(),
        Arc::new(CannedGenerative {
            bytes: generative_output,
        }),
    );
    let service = EditService::new(orchestrator, Arc::new(CannedUpscale), fetcher.clone())
        .with_rewriter(PromptRewriter::new(Arc::new(EnglishRewrite)));
    Harness {
        service,
        fetcher,
        masked,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn masked_edit_sends_rasterized_polygons() {
    let h = harness(RecordingMasked::default(), Vec::new());

    let result = h
        .service
        .edit_with_polygons("https://src.example/a.png", &[square(10.0)], "add a lighthouse", false)
        .await
        .unwrap();

    assert_eq!(result, EditResult::Url("https://edits.example/out.png".into()));
    let (mask_png, prompt) = h.masked.seen.lock().unwrap().clone().unwrap();
    assert_eq!(prompt, "add a lighthouse");

    let mask: GrayImage = image::load_from_memory(&mask_png).unwrap().to_luma8();
    assert_eq!(mask.dimensions(), (20, 20));
    assert_eq!(mask.get_pixel(0, 0).0[0], EDITABLE);
    assert_eq!(mask.get_pixel(10, 10).0[0], EDITABLE);
    assert_eq!(mask.get_pixel(11, 10).0[0], PRESERVE);
    assert_eq!(mask.get_pixel(19, 19).0[0], PRESERVE);
    let editable = mask.pixels().filter(|p| p.0[0] == EDITABLE).count();
    assert_eq!(editable, 121);
}

#[tokio::test]
async fn masked_edit_without_polygons_preserves_everything() {
    let h = harness(RecordingMasked::default(), Vec::new());

    h.service
        .edit_with_polygons("https://src.example/a.png", &[], "brighten", false)
        .await
        .unwrap();

    let (mask_png, _) = h.masked.seen.lock().unwrap().clone().unwrap();
    let mask = image::load_from_memory(&mask_png).unwrap().to_luma8();
    assert!(mask.pixels().all(|p| p.0[0] == PRESERVE));
}

#[tokio::test]
async fn rewrite_flag_routes_prompt_through_rewriter() {
    let h = harness(RecordingMasked::default(), Vec::new());

    h.service
        .edit_with_polygons("https://src.example/a.png", &[square(5.0)], "ajoute un phare", true)
        .await
        .unwrap();

    let (_, prompt) = h.masked.seen.lock().unwrap().clone().unwrap();
    assert_eq!(prompt, "English for: ajoute un phare");
}

#[tokio::test]
async fn backend_status_is_preserved() {
    let h = harness(
        RecordingMasked {
            fail_with: Some(422),
            ..Default::default()
        },
        Vec::new(),
    );

    let err = h
        .service
        .edit_with_polygons("https://src.example/a.png", &[square(4.0)], "x", false)
        .await
        .unwrap_err();

    assert_matches!(err, PipelineError::Upstream(UpstreamError::Api { status: 422, .. }));
}

#[tokio::test]
async fn blank_prompt_is_rejected_before_fetching() {
    let h = harness(RecordingMasked::default(), Vec::new());

    let err = h
        .service
        .edit_with_polygons("https://src.example/a.png", &[square(4.0)], "   ", false)
        .await
        .unwrap_err();

    assert_matches!(err, PipelineError::Core(CoreError::InvalidInput(_)));
    assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), 0);
    assert!(h.masked.seen.lock().unwrap().is_none());
}

#[tokio::test]
async fn non_finite_polygon_is_invalid_input() {
    let h = harness(RecordingMasked::default(), Vec::new());
    let polygon = Polygon::new(vec![
        Point::new(0.0, 0.0),
        Point::new(f64::NAN, 3.0),
        Point::new(3.0, 3.0),
    ]);

    let err = h
        .service
        .edit_with_polygons("https://src.example/a.png", &[polygon], "x", false)
        .await
        .unwrap_err();

    assert_matches!(err, PipelineError::Core(CoreError::InvalidInput(_)));
}

#[tokio::test]
async fn mask_free_edit_returns_png_bytes() {
    let h = harness(RecordingMasked::default(), encoded(8, 6, ImageFormat::Jpeg));

    let result = h
        .service
        .edit_without_mask("https://src.example/a.png", "make it night")
        .await
        .unwrap();

    let (bytes, mime_type) = match result {
        EditResult::Inline { bytes, mime_type } => (bytes, mime_type),
        other => panic!("expected inline result, got {other:?}"),
    };
    assert_eq!(mime_type, "image/png");
    assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Png);
    let decoded = image::load_from_memory(&bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (8, 6));
}

#[tokio::test]
async fn mask_free_edit_rejects_undecodable_output() {
    let h = harness(RecordingMasked::default(), b"definitely not an image".to_vec());

    let err = h
        .service
        .edit_without_mask("https://src.example/a.png", "make it night")
        .await
        .unwrap_err();

    assert_matches!(err, PipelineError::Upstream(UpstreamError::InvalidResponse { .. }));
}

#[tokio::test]
async fn upscale_returns_backend_url() {
    let h = harness(RecordingMasked::default(), Vec::new());

    let result = h.service.upscale("https://src.example/a.png").await.unwrap();

    assert_eq!(result, EditResult::Url("https://edits.example/upscaled.png".into()));
    assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn empty_image_url_is_invalid_input() {
    let h = harness(RecordingMasked::default(), Vec::new());

    assert_matches!(
        h.service.upscale("  ").await,
        Err(PipelineError::Core(CoreError::InvalidInput(_)))
    );
}
