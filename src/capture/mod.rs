// src/capture/mod.rs
// =============================================================================
// Drives one page through load, link extraction, and image capture.
//
// Pipeline for a single URL:
// 1. open an isolated page from the shared engine
// 2. navigate, waiting only for the DOM (hard timeout)      -> Navigation error
// 3. collect every raw href on the page
// 4. try to click away cookie/consent overlays              (never fails)
// 5. give the network a few seconds to go quiet             (never fails)
// 6. scroll to the top and take a full-page JPEG            -> Capture error
// 7. close the page, whatever happened above
//
// Nothing here touches crawler state; the scheduler decides what to do with
// the result.
// =============================================================================

pub mod overlay;

use crate::config::CaptureOptions;
use crate::engine::{EngineLauncher, RenderEngine, RenderPage, WaitUntil};
use crate::error::CrawlError;
use crate::events::image_data_uri;

/// Collects the raw href attribute of every anchor, unresolved
pub const LINK_EXTRACTION_SCRIPT: &str = "Array.from(document.querySelectorAll('a'))\
     .map((a) => a.getAttribute('href'))\
     .filter((href) => href)";

pub const SCROLL_TO_TOP_SCRIPT: &str = "window.scrollTo(0, 0)";

/// What one successful capture produces
#[derive(Debug, Clone)]
pub struct Capture {
    /// Raw href values, in document order
    pub links: Vec<String>,
    pub image: Vec<u8>,
}

/// A captured image tied to the URL and depth it came from
#[derive(Debug, Clone)]
pub struct PageArtifact {
    pub url: String,
    pub depth: usize,
    pub image: Vec<u8>,
    pub mime_type: &'static str,
}

impl PageArtifact {
    pub fn data_uri(&self) -> String {
        image_data_uri(self.mime_type, &self.image)
    }
}

pub async fn capture(
    engine: &dyn RenderEngine,
    url: &str,
    options: &CaptureOptions,
) -> Result<Capture, CrawlError> {
    let mut page = engine.open_page().await.map_err(|e| CrawlError::Navigation {
        url: url.to_string(),
        reason: format!("{:#}", e),
    })?;

    let result = drive(page.as_mut(), url, options).await;

    if let Err(e) = page.close().await {
        tracing::warn!("Failed to close page for {}: {}", url, e);
    }

    result
}

// Captures a single page on a browser of its own
//
// Used by the one-shot snapshot surfaces. The browser is shut down before
// returning, whether the capture worked or not.
pub async fn snapshot(
    launcher: &dyn EngineLauncher,
    url: &str,
    options: &CaptureOptions,
) -> Result<PageArtifact, CrawlError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(CrawlError::InvalidSeedUrl(
            "URL must start with http:// or https://".to_string(),
        ));
    }

    let engine = launcher
        .launch()
        .await
        .map_err(|e| CrawlError::EngineLaunch(format!("{:#}", e)))?;

    let result = capture(engine.as_ref(), url, options).await;

    if let Err(e) = engine.shutdown().await {
        tracing::warn!("Error during browser cleanup: {}", e);
    }

    let capture = result?;
    Ok(PageArtifact {
        url: url.to_string(),
        depth: 0,
        image: capture.image,
        mime_type: options.image.format.mime_type(),
    })
}

async fn drive(
    page: &mut dyn RenderPage,
    url: &str,
    options: &CaptureOptions,
) -> Result<Capture, CrawlError> {
    let navigation = tokio::time::timeout(
        options.navigation_timeout,
        page.navigate(url, WaitUntil::DomContentLoaded),
    )
    .await;
    match navigation {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            return Err(CrawlError::Navigation {
                url: url.to_string(),
                reason: format!("{:#}", e),
            })
        }
        Err(_) => {
            return Err(CrawlError::Navigation {
                url: url.to_string(),
                reason: format!(
                    "Timeout {}ms exceeded",
                    options.navigation_timeout.as_millis()
                ),
            })
        }
    }

    let links = extract_links(page, url).await?;

    overlay::dismiss_overlays(page, url).await;

    match tokio::time::timeout(options.idle_wait_timeout, page.wait_for(WaitUntil::NetworkIdle))
        .await
    {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!("Network idle wait failed for {}: {}", url, e),
        Err(_) => tracing::info!(
            "Network idle wait timed out for {}, continuing with screenshot",
            url
        ),
    }

    let capture_error = |reason: String| CrawlError::Capture {
        url: url.to_string(),
        reason,
    };

    page.evaluate(SCROLL_TO_TOP_SCRIPT)
        .await
        .map_err(|e| capture_error(format!("could not scroll to top: {:#}", e)))?;

    let image = page
        .capture_image(&options.image)
        .await
        .map_err(|e| capture_error(format!("{:#}", e)))?;
    if image.is_empty() {
        return Err(capture_error("browser returned an empty image".to_string()));
    }

    Ok(Capture { links, image })
}

async fn extract_links(page: &mut dyn RenderPage, url: &str) -> Result<Vec<String>, CrawlError> {
    let value = page
        .evaluate(LINK_EXTRACTION_SCRIPT)
        .await
        .map_err(|e| CrawlError::Capture {
            url: url.to_string(),
            reason: format!("link extraction failed: {:#}", e),
        })?;

    if value.is_null() {
        return Ok(Vec::new());
    }

    let links: Vec<String> = serde_json::from_value(value).map_err(|e| CrawlError::Capture {
        url: url.to_string(),
        reason: format!("unexpected link list: {}", e),
    })?;
    tracing::debug!("Extracted {} links from {}", links.len(), url);
    Ok(links)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fake::{FakeEngine, FakeLauncher, FakePage, TraceEvent, FAKE_JPEG};
    use std::time::Duration;

    fn quick_options() -> CaptureOptions {
        CaptureOptions {
            navigation_timeout: Duration::from_millis(200),
            idle_wait_timeout: Duration::from_millis(50),
            ..CaptureOptions::default()
        }
    }

    #[tokio::test]
    async fn test_capture_returns_raw_links_and_image() {
        let engine = FakeEngine::builder()
            .page(
                "https://example.com/",
                FakePage::html(
                    r#"<a href="/a.html">A</a><a href="b.html#top">B</a><a>no href</a>"#,
                ),
            )
            .build();

        let capture = capture(engine.as_ref(), "https://example.com/", &quick_options())
            .await
            .unwrap();

        assert_eq!(capture.links, vec!["/a.html", "b.html#top"]);
        assert!(!capture.image.is_empty());
        assert_eq!(engine.open_pages(), 0);
    }

    #[tokio::test]
    async fn test_navigation_timeout_is_navigation_error() {
        let engine = FakeEngine::builder()
            .page(
                "https://example.com/slow.html",
                FakePage::html("<p>slow</p>").with_delay(Duration::from_secs(5)),
            )
            .build();

        let err = capture(engine.as_ref(), "https://example.com/slow.html", &quick_options())
            .await
            .unwrap_err();

        assert!(matches!(err, CrawlError::Navigation { .. }), "got {:?}", err);
        assert!(err.to_string().contains("Timeout 200ms exceeded"));
        // the page is closed even though navigation never finished
        assert_eq!(engine.open_pages(), 0);
    }

    #[tokio::test]
    async fn test_unknown_host_is_navigation_error() {
        let engine = FakeEngine::builder().build();
        let err = capture(engine.as_ref(), "https://nowhere.test/", &quick_options())
            .await
            .unwrap_err();
        assert!(matches!(err, CrawlError::Navigation { .. }));
        assert_eq!(engine.open_pages(), 0);
    }

    #[tokio::test]
    async fn test_capture_failure_is_capture_error_and_page_is_closed() {
        let engine = FakeEngine::builder()
            .page("https://example.com/", FakePage::html("<p>hi</p>").failing_capture())
            .build();

        let err = capture(engine.as_ref(), "https://example.com/", &quick_options())
            .await
            .unwrap_err();

        assert!(matches!(err, CrawlError::Capture { .. }));
        assert_eq!(
            engine.trace(),
            vec![
                TraceEvent::Navigate("https://example.com/".to_string()),
                TraceEvent::Close("https://example.com/".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_image_is_capture_error() {
        let engine = FakeEngine::builder()
            .page("https://example.com/", FakePage::html("<p>hi</p>").with_empty_image())
            .build();

        let err = capture(engine.as_ref(), "https://example.com/", &quick_options())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("empty image"));
    }

    #[tokio::test]
    async fn test_overlay_and_idle_failures_do_not_abort() {
        let engine = FakeEngine::builder()
            .page(
                "https://example.com/",
                FakePage::html(r#"<a href="/x/">x</a>"#)
                    .failing_overlay_script()
                    .with_idle_delay(Duration::from_secs(5)),
            )
            .build();

        let capture = capture(engine.as_ref(), "https://example.com/", &quick_options())
            .await
            .unwrap();
        assert_eq!(capture.links, vec!["/x/"]);
    }

    #[tokio::test]
    async fn test_overlay_runs_before_scroll_and_capture() {
        let engine = FakeEngine::builder()
            .page("https://example.com/", FakePage::html("<p>hi</p>"))
            .build();

        capture(engine.as_ref(), "https://example.com/", &quick_options())
            .await
            .unwrap();

        let scripts = engine.scripts();
        assert_eq!(scripts.len(), 3);
        assert_eq!(scripts[0], LINK_EXTRACTION_SCRIPT);
        assert_eq!(scripts[1], overlay::dismissal_script());
        assert_eq!(scripts[2], SCROLL_TO_TOP_SCRIPT);
    }

    #[tokio::test]
    async fn test_snapshot_shuts_browser_down() {
        let engine = FakeEngine::builder()
            .page("https://example.com/", FakePage::html("<p>hi</p>"))
            .build();
        let launcher = FakeLauncher::new(engine.clone());

        let artifact = snapshot(&launcher, "https://example.com/", &quick_options())
            .await
            .unwrap();

        assert_eq!(artifact.image, FAKE_JPEG);
        assert_eq!(artifact.mime_type, "image/jpeg");
        assert_eq!(engine.shutdowns(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_rejects_non_http_urls() {
        let launcher = FakeLauncher::new(FakeEngine::builder().build());
        let err = snapshot(&launcher, "example.com", &quick_options())
            .await
            .unwrap_err();
        assert!(matches!(err, CrawlError::InvalidSeedUrl(_)));
        assert_eq!(launcher.launches(), 0);
    }

    #[tokio::test]
    async fn test_snapshot_failure_still_shuts_down() {
        let engine = FakeEngine::builder().build();
        let launcher = FakeLauncher::new(engine.clone());
        let err = snapshot(&launcher, "https://example.com/", &quick_options())
            .await
            .unwrap_err();
        assert!(matches!(err, CrawlError::Navigation { .. }));
        assert_eq!(engine.shutdowns(), 1);
    }

    #[test]
    fn test_artifact_data_uri() {
        let artifact = PageArtifact {
            url: "https://example.com/".to_string(),
            depth: 0,
            image: vec![0xff, 0xd8, 0xff],
            mime_type: "image/jpeg",
        };
        assert_eq!(artifact.data_uri(), "data:image/jpeg;base64,/9j/");
    }
}
