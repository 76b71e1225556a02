//! Caller-facing composition service.
//!
//! Wires the layout pipeline to the asset store: fetch the source image
//! (store-local, remote, or a plain filesystem path), rasterize the caption
//! band, persist the result, hand back its local URL. Rasterization is
//! CPU-bound and runs under `spawn_blocking`.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::compose::{encode_png, render_caption};
use crate::config::{Config, LayoutConfig};
use crate::errors::ComposeError;
use crate::layout::CaptionFont;
use crate::store::{AssetStore, MediaKind};

/// Timeout for fetching a remote source image (smaller than the media
/// download timeout — sources are single images, not generated videos).
const SOURCE_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

pub struct CaptionService {
    store: AssetStore,
    font: Arc<CaptionFont>,
    layout: LayoutConfig,
    http: reqwest::Client,
}

impl CaptionService {
    /// Builds the service from explicit configuration. The font is loaded
    /// once here; a missing file degrades inside [`CaptionFont::load`].
    pub fn new(config: &Config) -> std::io::Result<Self> {
        Ok(CaptionService {
            store: AssetStore::new(&config.static_dir, &config.public_base_url)?,
            font: Arc::new(CaptionFont::load(&config.font_path)),
            layout: config.layout.clone(),
            http: reqwest::Client::builder()
                .timeout(SOURCE_FETCH_TIMEOUT)
                .build()
                .expect("failed to build HTTP client"),
        })
    }

    pub fn store(&self) -> &AssetStore {
        &self.store
    }

    /// Overlays `text` on the caption band of the referenced image and
    /// stores the rendered PNG, returning its local URL.
    pub async fn compose_caption(
        &self,
        image_ref: &str,
        text: &str,
    ) -> Result<String, ComposeError> {
        let caption = sanitize_caption(text);
        debug!("composing caption '{caption}' onto {image_ref}");

        let bytes = self.load_source(image_ref).await?;

        let font = Arc::clone(&self.font);
        let layout = self.layout.clone();
        let rendered = tokio::task::spawn_blocking(move || {
            let source = image::load_from_memory(&bytes)
                .map_err(|e| ComposeError::ImageLoad(e.to_string()))?;
            encode_png(&render_caption(&source, &caption, &font, &layout))
        })
        .await
        .map_err(|e| ComposeError::Internal(anyhow::anyhow!("compose task failed: {e}")))??;

        let url = self.store.save(&rendered, MediaKind::Image).await?;
        info!("caption composed: {url}");
        Ok(url)
    }

    /// Rewrites a remote media URL into a local one. Never errors: on any
    /// failure the original URL comes back unchanged.
    pub async fn cache_remote(&self, url: &str, kind: MediaKind) -> String {
        self.store.resolve(url, kind).await
    }

    async fn load_source(&self, image_ref: &str) -> Result<Vec<u8>, ComposeError> {
        if let Some(path) = self.store.local_path(image_ref) {
            if !path.exists() {
                return Err(ComposeError::AssetNotFound(display_name(&path)));
            }
            return tokio::fs::read(&path)
                .await
                .map_err(|e| ComposeError::ImageLoad(e.to_string()));
        }

        if image_ref.starts_with("http://") || image_ref.starts_with("https://") {
            let response = self
                .http
                .get(image_ref)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| ComposeError::ImageLoad(e.to_string()))?;
            let bytes = response
                .bytes()
                .await
                .map_err(|e| ComposeError::ImageLoad(e.to_string()))?;
            return Ok(bytes.to_vec());
        }

        // Anything else is a plain filesystem path.
        tokio::fs::read(image_ref)
            .await
            .map_err(|e| ComposeError::ImageLoad(format!("{image_ref}: {e}")))
    }
}

/// Strips quoting noise the upstream tool layer tends to leave in captions:
/// quote characters and a leading `overlay text:` marker.
fn sanitize_caption(text: &str) -> String {
    text.replace(['\'', '"'], "")
        .replace("overlay text:", "")
        .trim()
        .to_string()
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use axum::Router;
    use image::{Rgba, RgbaImage};
    use tempfile::TempDir;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }

    fn test_config(tmp: &TempDir) -> Config {
        Config {
            static_dir: tmp.path().join("static"),
            public_base_url: "http://127.0.0.1:9007".into(),
            font_path: tmp.path().join("missing-font.ttf"),
            sweep_interval: Duration::from_secs(60),
            retention_max_age: Duration::from_secs(120),
            layout: LayoutConfig::default(),
        }
    }

    fn red_png_bytes() -> Vec<u8> {
        let img = RgbaImage::from_pixel(90, 90, Rgba([200, 30, 30, 255]));
        crate::compose::encode_png(&img).expect("encode fixture")
    }

    #[test]
    fn test_sanitize_strips_quotes_and_marker() {
        assert_eq!(
            sanitize_caption("overlay text: 'Hello' \"world\""),
            "Hello world"
        );
        assert_eq!(sanitize_caption("  plain caption "), "plain caption");
    }

    #[tokio::test]
    async fn test_compose_from_local_path_saves_band_filled_png() {
        init_tracing();
        let tmp = TempDir::new().unwrap();
        let service = CaptionService::new(&test_config(&tmp)).expect("service");

        let source_path = tmp.path().join("source.png");
        std::fs::write(&source_path, red_png_bytes()).unwrap();

        let url = service
            .compose_caption(source_path.to_str().unwrap(), "hello world")
            .await
            .expect("compose");
        assert!(service.store().is_local(&url));

        let saved = service.store().local_path(&url).expect("backing path");
        let rendered = image::open(&saved).expect("decode output").to_rgba8();
        assert_eq!(rendered.dimensions(), (90, 90));
        assert_eq!(
            *rendered.get_pixel(0, 0),
            Rgba([200, 30, 30, 255]),
            "upper image untouched"
        );
        assert_eq!(
            *rendered.get_pixel(0, 89),
            Rgba([255, 255, 255, 255]),
            "band corner filled"
        );
    }

    #[tokio::test]
    async fn test_compose_from_remote_url() {
        let tmp = TempDir::new().unwrap();
        let service = CaptionService::new(&test_config(&tmp)).expect("service");

        let body: &'static [u8] = red_png_bytes().leak();
        let app = Router::new().route("/source.png", get(move || async move { body }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let url = service
            .compose_caption(&format!("http://{addr}/source.png"), "标题")
            .await
            .expect("compose");
        assert!(service.store().is_local(&url));
    }

    #[tokio::test]
    async fn test_missing_store_asset_is_a_distinct_error() {
        let tmp = TempDir::new().unwrap();
        let service = CaptionService::new(&test_config(&tmp)).expect("service");

        let gone = service.store().local_url("deadbeef.png");
        let err = service.compose_caption(&gone, "caption").await.unwrap_err();
        assert!(
            matches!(err, ComposeError::AssetNotFound(_)),
            "expected AssetNotFound, got {err}"
        );
    }

    #[tokio::test]
    async fn test_unreadable_path_reports_image_load_failure() {
        let tmp = TempDir::new().unwrap();
        let service = CaptionService::new(&test_config(&tmp)).expect("service");

        let err = service
            .compose_caption("/nonexistent/source.png", "caption")
            .await
            .unwrap_err();
        assert!(matches!(err, ComposeError::ImageLoad(_)));
    }

    #[tokio::test]
    async fn test_undecodable_bytes_report_image_load_failure() {
        let tmp = TempDir::new().unwrap();
        let service = CaptionService::new(&test_config(&tmp)).expect("service");

        let bogus = tmp.path().join("not-an-image.png");
        std::fs::write(&bogus, b"plainly not a png").unwrap();

        let err = service
            .compose_caption(bogus.to_str().unwrap(), "caption")
            .await
            .unwrap_err();
        assert!(matches!(err, ComposeError::ImageLoad(_)));
    }
}
