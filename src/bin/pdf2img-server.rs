//! HTTP service binary for edgequake-pdf2img.
//!
//! A thin shim over the library crate that maps CLI flags (or their
//! `PDF2IMG_*` environment fallbacks) to `ServiceConfig`, binds pdfium, and
//! serves the router until Ctrl-C / SIGTERM.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdf2img::{server, Converter, OutputMode, PdfiumEngine, ServiceConfig};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Archive variant on the default port
  pdf2img-server

  # Inline (base64 JSON) variant at 72 DPI
  pdf2img-server --output-mode inline --dpi 72

  # Use an existing pdfium build
  PDFIUM_LIB_PATH=/opt/pdfium/lib pdf2img-server --port 9000

ENDPOINTS:
  POST /convert-pdf   {"url": "https://example.com/doc.pdf"}
  GET  /health        {"status": "ok"}

ENVIRONMENT VARIABLES:
  PDF2IMG_HOST, PDF2IMG_PORT       Listen address
  PDF2IMG_OUTPUT_MODE              archive | inline
  PDF2IMG_DPI                      Rasterisation density (36–600)
  PDF2IMG_MAX_PDF_MB               Download size limit in MiB
  PDF2IMG_MAX_PAGES                Page-count limit
  PDF2IMG_RENDER_WORKERS           Concurrent renders (default: CPU count;
                                   pdfium serialises renders, so 1 in effect)
  PDF2IMG_CONNECT_TIMEOUT          Outbound connect timeout in seconds
  PDF2IMG_MAX_REDIRECTS            Redirects followed when fetching
  PDFIUM_LIB_PATH                  libpdfium file or directory
  RUST_LOG                         tracing filter, e.g. info,tower_http=debug
"#;

/// Fetch PDFs by URL and return their pages as PNG images.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2img-server",
    version,
    about = "HTTP service: fetch a PDF by URL and return its pages as PNG images",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Interface to bind.
    #[arg(long, env = "PDF2IMG_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to bind.
    #[arg(short, long, env = "PDF2IMG_PORT", default_value_t = 8000)]
    port: u16,

    /// Response representation: archive (ZIP) or inline (base64 JSON).
    #[arg(long, env = "PDF2IMG_OUTPUT_MODE", default_value = "archive")]
    output_mode: OutputMode,

    /// Rasterisation DPI (36–600).
    #[arg(long, env = "PDF2IMG_DPI", default_value_t = edgequake_pdf2img::config::DEFAULT_DPI,
          value_parser = clap::value_parser!(u32).range(36..=600))]
    dpi: u32,

    /// Maximum PDF size in MiB.
    #[arg(long, env = "PDF2IMG_MAX_PDF_MB", default_value_t = 100)]
    max_pdf_mb: u64,

    /// Maximum page count.
    #[arg(long, env = "PDF2IMG_MAX_PAGES", default_value_t = 5000)]
    max_pages: usize,

    /// Maximum rendered edge in pixels.
    #[arg(long, env = "PDF2IMG_MAX_PAGE_PIXELS", default_value_t = 10_000)]
    max_page_pixels: u32,

    /// Concurrent renders. Defaults to the number of logical CPUs.
    #[arg(long, env = "PDF2IMG_RENDER_WORKERS")]
    render_workers: Option<usize>,

    /// Renders allowed to wait for a worker. Defaults to 4 × workers.
    #[arg(long, env = "PDF2IMG_RENDER_QUEUE")]
    render_queue: Option<usize>,

    /// Outbound download timeout in seconds.
    #[arg(long, env = "PDF2IMG_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Outbound connect timeout in seconds.
    #[arg(long, env = "PDF2IMG_CONNECT_TIMEOUT", default_value_t = 10)]
    connect_timeout: u64,

    /// Maximum redirects followed when fetching.
    #[arg(long, env = "PDF2IMG_MAX_REDIRECTS", default_value_t = 10)]
    max_redirects: usize,

    /// Whole-request timeout in seconds (0 disables).
    #[arg(long, env = "PDF2IMG_REQUEST_TIMEOUT", default_value_t = 300)]
    request_timeout: u64,

    /// User-Agent sent to remote servers.
    #[arg(long, env = "PDF2IMG_USER_AGENT")]
    user_agent: Option<String>,

    /// Path to libpdfium, or a directory containing it.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2IMG_VERBOSE")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Rendering engine ─────────────────────────────────────────────────
    let engine = match cli.pdfium_lib {
        Some(ref path) => PdfiumEngine::with_library_path(path),
        None => PdfiumEngine::new(),
    };
    engine
        .probe()
        .context("Failed to bind pdfium; set PDFIUM_LIB_PATH to a libpdfium file or directory")?;

    // ── Config + converter ───────────────────────────────────────────────
    let config = build_config(&cli)?;
    tracing::info!("Configuration: {:?}", config);
    let converter =
        Converter::new(config, Arc::new(engine)).context("Failed to initialise converter")?;

    let app = if cli.request_timeout > 0 {
        server::router_with_timeout(converter, Duration::from_secs(cli.request_timeout))
    } else {
        server::router(converter)
    };

    // ── Serve ────────────────────────────────────────────────────────────
    let addr = format!("{}:{}", cli.host, cli.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    tracing::info!("pdf2img listening on {}", addr);
    tracing::info!("  - POST /convert-pdf");
    tracing::info!("  - GET  /health");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Shut down cleanly");
    Ok(())
}

/// Map CLI args to `ServiceConfig`.
fn build_config(cli: &Cli) -> Result<ServiceConfig> {
    let mut builder = ServiceConfig::builder()
        .dpi(cli.dpi)
        .max_pdf_bytes(cli.max_pdf_mb.saturating_mul(1024 * 1024))
        .max_page_count(cli.max_pages)
        .max_page_pixels(cli.max_page_pixels)
        .download_timeout_secs(cli.download_timeout)
        .connect_timeout_secs(cli.connect_timeout)
        .max_redirects(cli.max_redirects)
        .output_mode(cli.output_mode);

    if let Some(workers) = cli.render_workers {
        builder = builder
            .render_workers(workers)
            .render_queue_depth(workers.max(1) * 4);
    }
    if let Some(depth) = cli.render_queue {
        builder = builder.render_queue_depth(depth);
    }
    if let Some(ref agent) = cli.user_agent {
        builder = builder.user_agent(agent.clone());
    }

    builder.build().context("Invalid configuration")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Ctrl-C handler unavailable: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("SIGTERM handler unavailable: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
