//! Shared fixtures: a scripted rendering engine and a local origin server.
#![allow(dead_code)]

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use edgequake_pdf2img::{
    Converter, DocumentHandle, EngineError, EngineSession, RasterSpec, RenderEngine, ServiceConfig,
};
use image::{DynamicImage, Rgba, RgbaImage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Fake engine ──────────────────────────────────────────────────────────────

/// Magic prefix understood by [`FakeEngine`]; the page count follows it.
pub const FAKE_MAGIC: &str = "%PDF-FAKE ";

/// Bytes [`FakeEngine`] opens as an `n`-page document.
pub fn fake_pdf(pages: usize) -> Vec<u8> {
    format!("{FAKE_MAGIC}{pages}\n").into_bytes()
}

/// Engine that parses [`fake_pdf`] bytes and paints each page a distinct colour.
#[derive(Default)]
pub struct FakeEngine {
    pub sessions: AtomicUsize,
    pub rasterized: AtomicUsize,
    /// 0-based page index that fails to rasterise.
    pub fail_at: Option<usize>,
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_at(index: usize) -> Arc<Self> {
        Arc::new(Self {
            fail_at: Some(index),
            ..Default::default()
        })
    }

    pub fn rasterized(&self) -> usize {
        self.rasterized.load(Ordering::SeqCst)
    }

    pub fn sessions(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }
}

struct FakeSession<'e>(&'e FakeEngine);

struct FakeDocument<'e> {
    engine: &'e FakeEngine,
    pages: usize,
}

impl RenderEngine for FakeEngine {
    fn session(&self) -> Result<Box<dyn EngineSession + '_>, EngineError> {
        self.sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession(self)))
    }
}

impl EngineSession for FakeSession<'_> {
    fn open<'a>(&'a self, bytes: &'a [u8]) -> Result<Box<dyn DocumentHandle + 'a>, EngineError> {
        let text = std::str::from_utf8(bytes).map_err(|e| EngineError::Open(e.to_string()))?;
        let pages = text
            .strip_prefix(FAKE_MAGIC)
            .and_then(|rest| rest.trim().parse().ok())
            .ok_or_else(|| EngineError::Open("no PDF header".into()))?;
        Ok(Box::new(FakeDocument {
            engine: self.0,
            pages,
        }))
    }
}

impl DocumentHandle for FakeDocument<'_> {
    fn page_count(&self) -> usize {
        self.pages
    }

    fn rasterize(&self, index: usize, spec: RasterSpec) -> Result<DynamicImage, EngineError> {
        self.engine.rasterized.fetch_add(1, Ordering::SeqCst);
        if self.engine.fail_at == Some(index) {
            return Err(EngineError::Rasterise(format!("corrupt content stream on page {}", index + 1)));
        }
        let side = (spec.dpi / 24).clamp(1, spec.max_edge);
        let shade = (index * 37 % 256) as u8;
        Ok(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            side,
            side + 1,
            Rgba([shade, 255 - shade, 128, 255]),
        )))
    }
}

// ── Origin server ────────────────────────────────────────────────────────────

/// What the origin answers on `/doc.pdf`.
#[derive(Clone)]
pub struct Served {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    /// Send the body as a chunked stream with no `Content-Length`.
    pub chunked: bool,
    /// Wait this long before answering.
    pub delay: Option<Duration>,
}

impl Served {
    pub fn pdf(body: Vec<u8>) -> Self {
        Self {
            status: StatusCode::OK,
            content_type: "application/pdf",
            body,
            chunked: false,
            delay: None,
        }
    }

    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            content_type: "text/html",
            body: b"<html>nope</html>".to_vec(),
            chunked: false,
            delay: None,
        }
    }
}

#[derive(Clone)]
struct OriginState {
    served: Arc<Served>,
    hits: Arc<AtomicUsize>,
    last_user_agent: Arc<Mutex<Option<String>>>,
}

/// A running origin server on an ephemeral local port.
pub struct Origin {
    pub base: String,
    hits: Arc<AtomicUsize>,
    last_user_agent: Arc<Mutex<Option<String>>>,
}

impl Origin {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn doc_url(&self) -> String {
        self.url("/doc.pdf")
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn last_user_agent(&self) -> Option<String> {
        self.last_user_agent.lock().unwrap().clone()
    }
}

async fn serve_doc(State(state): State<OriginState>, headers: HeaderMap) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    *state.last_user_agent.lock().unwrap() = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let served = state.served.as_ref();
    if let Some(delay) = served.delay {
        tokio::time::sleep(delay).await;
    }
    let body = if served.chunked {
        let chunks: Vec<Result<Vec<u8>, std::io::Error>> =
            served.body.chunks(512).map(|c| Ok(c.to_vec())).collect();
        Body::from_stream(futures::stream::iter(chunks))
    } else {
        Body::from(served.body.clone())
    };

    (
        served.status,
        [(header::CONTENT_TYPE, served.content_type)],
        body,
    )
        .into_response()
}

/// Start an origin that answers `/doc.pdf` with `served` and redirects
/// `/moved` there.
pub async fn spawn_origin(served: Served) -> Origin {
    let hits = Arc::new(AtomicUsize::new(0));
    let last_user_agent = Arc::new(Mutex::new(None));
    let state = OriginState {
        served: Arc::new(served),
        hits: Arc::clone(&hits),
        last_user_agent: Arc::clone(&last_user_agent),
    };

    let app = Router::new()
        .route("/doc.pdf", get(serve_doc))
        .route("/moved", get(|| async { Redirect::temporary("/doc.pdf") }))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Origin {
        base: format!("http://{addr}"),
        hits,
        last_user_agent,
    }
}

/// A URL on a local port nothing is listening on.
pub async fn dead_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/doc.pdf")
}

// ── Converter helpers ────────────────────────────────────────────────────────

/// Small limits so tests exercise every boundary cheaply.
pub fn test_config() -> ServiceConfig {
    ServiceConfig::builder()
        .dpi(72)
        .max_pdf_bytes(64 * 1024)
        .max_page_count(50)
        .render_workers(2)
        .render_queue_depth(8)
        .download_timeout_secs(10)
        .build()
        .unwrap()
}

pub fn converter(config: ServiceConfig, engine: &Arc<FakeEngine>) -> Converter {
    Converter::new(config, Arc::clone(engine) as Arc<dyn RenderEngine>).unwrap()
}
