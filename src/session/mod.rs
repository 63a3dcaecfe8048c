//! Remote session controller.
//!
//! A [`Space`] is one live, automation-driven connection to an already
//! provisioned workspace's interactive surface: one browser engine process,
//! one browsing context, exactly one page. Commands are serialized per
//! handle: `invoke` takes `&mut self`, so the borrow checker enforces one
//! in-flight command at a time against the shared remote surface.

pub mod wait;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::model::SpaceId;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;
use tokio::task::JoinHandle;
use wait::WaitStrategy;

/// Settle applied after the readiness flag flips; the point cloud keeps
/// painting for a moment after the surface reports loaded.
const READY_SETTLE: Duration = Duration::from_secs(1);
/// Settle between re-plotting and capturing; axis changes animate.
const PLOT_RENDER_SETTLE: Duration = Duration::from_secs(5);
/// Plot region size used while capturing, and the resting size restored
/// afterwards.
const PLOT_CAPTURE_SIZE: (u32, u32) = (600, 600);
const PLOT_RESTING_SIZE: (u32, u32) = (100, 100);
/// Global the surface exposes for session tracing.
const CORRELATION_GLOBAL: &str = "window.__MCP_SESSION_ID";

/// Session lifecycle. Commands are only valid in `Ready`; `Closed` is
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Launching,
    AwaitingReady,
    Ready,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Launching => "launching",
            SessionState::AwaitingReady => "awaiting-ready",
            SessionState::Ready => "ready",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// A live remote-controlled surface bound to one workspace.
pub struct Space {
    space_id: SpaceId,
    config: ClientConfig,
    state: SessionState,
    browser: Option<Browser>,
    page: Option<Page>,
    events: Option<JoinHandle<()>>,
}

impl Space {
    /// Launch an isolated browser, inject the credential cookies, navigate to
    /// the workspace surface and complete the readiness handshake.
    ///
    /// On any failure past launch, every acquired resource is released before
    /// the error surfaces; no partial handle escapes.
    pub(crate) async fn open(
        space_id: SpaceId,
        cookie: &str,
        config: ClientConfig,
        strategy: WaitStrategy,
    ) -> Result<Self> {
        let mut space = Space::launch(space_id, config, strategy).await?;
        if let Err(err) = space.connect(cookie, strategy).await {
            space.close().await;
            return Err(err);
        }
        space.state = SessionState::Ready;
        tracing::info!(space_id = %space.space_id, "session ready");
        Ok(space)
    }

    async fn launch(
        space_id: SpaceId,
        config: ClientConfig,
        strategy: WaitStrategy,
    ) -> Result<Self> {
        let mut builder = BrowserConfig::builder().arg("--start-maximized");
        if config.render.headless {
            builder = builder.window_size(
                config.render.viewport.width,
                config.render.viewport.height,
            );
        } else {
            builder = builder.with_head();
        }
        if matches!(strategy, WaitStrategy::Polling { .. }) {
            // Constrained embeddings cannot spawn the browser's own sandbox
            // helper process.
            builder = builder.args(["--no-sandbox", "--disable-setuid-sandbox"]);
        }
        let browser_config = builder.build().map_err(Error::Automation)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|err| Error::Automation(err.to_string()))?;
        // The handler stream must be drained for the whole browser lifetime;
        // every command stalls otherwise.
        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page_result = browser.new_page("about:blank").await;
        let mut space = Space {
            space_id,
            config,
            state: SessionState::Launching,
            browser: Some(browser),
            page: None,
            events: Some(events),
        };
        match page_result {
            Ok(page) => space.page = Some(page),
            Err(err) => {
                space.close().await;
                return Err(Error::Automation(err.to_string()));
            }
        }
        Ok(space)
    }

    async fn connect(&mut self, cookie: &str, strategy: WaitStrategy) -> Result<()> {
        self.inject_cookies(cookie).await?;

        let url = format!(
            "{}/space/{}/",
            self.config.host.trim_end_matches('/'),
            self.space_id
        );
        self.navigate(&url).await?;

        self.state = SessionState::AwaitingReady;
        let flag = self.config.ready_flag.clone();
        let timeout = self.config.timeout;
        wait::await_ready(self.page()?, &flag, timeout, strategy).await?;

        tokio::time::sleep(READY_SETTLE).await;
        Ok(())
    }

    async fn inject_cookies(&mut self, cookie: &str) -> Result<()> {
        let mut params = Vec::new();
        for parsed in cookie::Cookie::split_parse(cookie.to_string()) {
            let parsed = parsed.map_err(|err| {
                Error::Precondition(format!("unparseable credential cookie: {err}"))
            })?;
            let param = CookieParam::builder()
                .name(parsed.name().to_string())
                .value(parsed.value().to_string())
                .domain(self.config.domain.clone())
                .path("/")
                .secure(true)
                .http_only(false)
                .build()
                .map_err(Error::Automation)?;
            params.push(param);
        }
        tracing::debug!(
            count = params.len(),
            domain = %self.config.domain,
            "injecting session cookies"
        );
        self.page()?
            .set_cookies(params)
            .await
            .map_err(|err| Error::Automation(err.to_string()))?;
        Ok(())
    }

    async fn navigate(&mut self, url: &str) -> Result<()> {
        let timeout = self.config.timeout;
        let page = self.page()?;
        let navigation = async {
            page.goto(url).await?;
            page.wait_for_navigation().await?;
            Ok::<(), chromiumoxide::error::CdpError>(())
        };
        tokio::time::timeout(timeout, navigation)
            .await
            .map_err(|_| Error::NavigationTimeout {
                url: url.to_string(),
                timeout,
            })?
            .map_err(|err| Error::Automation(err.to_string()))
    }

    pub fn space_id(&self) -> &SpaceId {
        &self.space_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.state != SessionState::Ready {
            return Err(Error::SessionNotReady { state: self.state });
        }
        Ok(())
    }

    fn page(&self) -> Result<&Page> {
        self.page
            .as_ref()
            .ok_or(Error::SessionNotReady { state: self.state })
    }

    /// Forward a command to the surface's generic command entry point and
    /// return its result verbatim.
    ///
    /// Valid only in `Ready`. The remote surface is a single serialized
    /// resource; the `&mut self` receiver keeps one invocation in flight per
    /// handle.
    pub async fn invoke(&mut self, command: &str, args: &[Value]) -> Result<Value> {
        self.ensure_ready()?;
        let command_json = Value::String(command.to_string()).to_string();
        let args_json = Value::Array(args.to_vec()).to_string();
        let expression =
            format!("(async () => window.sdkCommand({command_json}, {args_json}))()");
        let params = EvaluateParams::builder()
            .expression(expression)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(Error::Automation)?;

        let outcome = self
            .page()?
            .evaluate(params)
            .await
            .map_err(|err| Error::Automation(err.to_string()))?;
        Ok(outcome.value().cloned().unwrap_or(Value::Null))
    }

    /// Plot two columns against each other and capture the rendered plot as
    /// PNG bytes.
    ///
    /// Fixed sequence: grow the plot region, set the axis variables, resolve
    /// the capture-target selector, wait out the render settle, capture, then
    /// restore the plot region to its resting size.
    pub async fn render_plot(&mut self, dimension_x: &str, dimension_y: &str) -> Result<Vec<u8>> {
        self.ensure_ready()?;
        let (width, height) = PLOT_CAPTURE_SIZE;
        self.invoke("setPlotSize", &[json!(width), json!(height)])
            .await?;
        self.invoke("setPlotVariables", &[json!(dimension_x), json!(dimension_y)])
            .await?;

        let selector = self.invoke("getPlotSelect", &[]).await?;
        let selector = selector
            .as_str()
            .ok_or_else(|| {
                Error::Automation(format!("plot capture target missing, got {selector}"))
            })?
            .to_string();

        tokio::time::sleep(PLOT_RENDER_SETTLE).await;
        let image = self.capture(Some(&selector)).await?;

        let (width, height) = PLOT_RESTING_SIZE;
        self.invoke("setPlotSize", &[json!(width), json!(height)])
            .await?;
        Ok(image)
    }

    /// Select `count` points on the surface.
    pub async fn select_points(&mut self, count: u64) -> Result<Value> {
        self.invoke("selectPoints", &[json!(count)]).await
    }

    pub async fn open_panel(&mut self, panel_id: &str) -> Result<Value> {
        self.invoke("openPanel", &[json!(panel_id)]).await
    }

    pub async fn close_panel(&mut self, panel_id: &str) -> Result<Value> {
        self.invoke("closePanel", &[json!(panel_id)]).await
    }

    /// Execute a code string inside the surface.
    pub async fn run_code(&mut self, code: &str) -> Result<Value> {
        self.invoke("execCode", &[json!(code)]).await
    }

    /// Screenshot the whole surface, or one element when `selector` is
    /// given. Always returns non-empty PNG bytes or fails; a selector that
    /// matches nothing is an error, never a silent full-surface fallback.
    pub async fn capture(&mut self, selector: Option<&str>) -> Result<Vec<u8>> {
        self.ensure_ready()?;
        let page = self.page()?;
        let image = match selector {
            Some(selector) => {
                let element = page.find_element(selector).await.map_err(|err| {
                    Error::Automation(format!("capture target {selector:?}: {err}"))
                })?;
                element
                    .screenshot(CaptureScreenshotFormat::Png)
                    .await
                    .map_err(|err| Error::Automation(err.to_string()))?
            }
            None => page
                .screenshot(
                    ScreenshotParams::builder()
                        .format(CaptureScreenshotFormat::Png)
                        .build(),
                )
                .await
                .map_err(|err| Error::Automation(err.to_string()))?,
        };
        if image.is_empty() {
            return Err(Error::Automation("capture produced no image data".to_string()));
        }
        Ok(image)
    }

    /// Opaque identifier the surface exposes for tracing this session, if
    /// set.
    pub async fn correlation_id(&mut self) -> Result<Option<String>> {
        self.ensure_ready()?;
        let outcome = self
            .page()?
            .evaluate(CORRELATION_GLOBAL)
            .await
            .map_err(|err| Error::Automation(err.to_string()))?;
        Ok(outcome.value().and_then(Value::as_str).map(str::to_string))
    }

    /// Release the page, browser process and event task.
    ///
    /// Safe to call at any point in the lifecycle, including after a failed
    /// `open`, and safe to call twice; released resources are simply
    /// skipped.
    pub async fn close(&mut self) {
        self.state = SessionState::Closed;
        if let Some(page) = self.page.take() {
            if let Err(err) = page.close().await {
                tracing::debug!(%err, "page already gone at close");
            }
        }
        if let Some(mut browser) = self.browser.take() {
            if let Err(err) = browser.close().await {
                tracing::debug!(%err, "browser already gone at close");
            }
            let _ = browser.wait().await;
        }
        // Dropping the JoinHandle would leave the event task running; abort
        // it explicitly.
        if let Some(events) = self.events.take() {
            events.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detached(state: SessionState) -> Space {
        Space {
            space_id: SpaceId::from("test-space"),
            config: ClientConfig::default(),
            state,
            browser: None,
            page: None,
            events: None,
        }
    }

    #[tokio::test]
    async fn invoke_outside_ready_is_rejected_without_remote_calls() {
        for state in [
            SessionState::Launching,
            SessionState::AwaitingReady,
            SessionState::Closed,
        ] {
            let mut space = detached(state);
            let err = space.invoke("selectPoints", &[json!(3)]).await.unwrap_err();
            assert!(matches!(err, Error::SessionNotReady { state: s } if s == state));
        }
    }

    #[tokio::test]
    async fn capture_outside_ready_is_rejected() {
        let mut space = detached(SessionState::Closed);
        assert!(matches!(
            space.capture(None).await,
            Err(Error::SessionNotReady { .. })
        ));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let mut space = detached(SessionState::Ready);
        space.close().await;
        assert_eq!(space.state(), SessionState::Closed);
        // Second close finds everything already released.
        space.close().await;
        assert_eq!(space.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn derived_operations_share_the_ready_guard() {
        let mut space = detached(SessionState::Launching);
        assert!(matches!(
            space.render_plot("x", "y").await,
            Err(Error::SessionNotReady { .. })
        ));
        assert!(matches!(
            space.correlation_id().await,
            Err(Error::SessionNotReady { .. })
        ));
    }
}
