//! Browser Launcher
//!
//! Handles browser discovery for the two supported engines, launching with the
//! portal's flags, and the [`BrowserDriver`] that pairs a browser with its page.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::cdp::transport::launch_process;
use crate::cdp::{Connection, Transport};
use crate::driver::{ElementState, FrameMark, PageDriver};
use crate::error::{Error, Result};
use crate::locators::Locator;
use crate::page::Page;
use crate::session::EngineProvider;
use crate::PortalConfig;

/// Global counter for unique user data directories
static BROWSER_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A Chromium-based browser the portal can be driven with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserEngine {
    Chrome,
    Edge,
}

impl BrowserEngine {
    pub fn name(self) -> &'static str {
        match self {
            BrowserEngine::Chrome => "chrome",
            BrowserEngine::Edge => "edge",
        }
    }

    /// Well-known install locations for this engine on the current OS
    fn candidates(self) -> &'static [&'static str] {
        match self {
            BrowserEngine::Chrome if cfg!(target_os = "macos") => &[
                "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
                "/Applications/Chromium.app/Contents/MacOS/Chromium",
            ],
            BrowserEngine::Chrome if cfg!(target_os = "windows") => &[
                r"C:\Program Files\Google\Chrome\Application\chrome.exe",
                r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            ],
            BrowserEngine::Chrome => &[
                "/usr/bin/google-chrome",
                "/usr/bin/google-chrome-stable",
                "/usr/bin/chromium",
                "/usr/bin/chromium-browser",
                "/snap/bin/chromium",
            ],
            BrowserEngine::Edge if cfg!(target_os = "macos") => {
                &["/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge"]
            }
            BrowserEngine::Edge if cfg!(target_os = "windows") => &[
                r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
                r"C:\Program Files\Microsoft\Edge\Application\msedge.exe",
            ],
            BrowserEngine::Edge => &[
                "/usr/bin/microsoft-edge",
                "/usr/bin/microsoft-edge-stable",
                "/opt/microsoft/msedge/msedge",
            ],
        }
    }

    /// Locate the engine's binary
    pub fn find_binary(self) -> Result<PathBuf> {
        self.candidates()
            .iter()
            .map(Path::new)
            .find(|p| p.exists())
            .map(Path::to_path_buf)
            .ok_or_else(|| Error::BrowserNotFound(self.to_string()))
    }
}

impl fmt::Display for BrowserEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BrowserEngine::Chrome => "Chrome",
            BrowserEngine::Edge => "Edge",
        })
    }
}

/// Command line flags for a portal browser
fn launch_args(config: &PortalConfig) -> Vec<String> {
    let mut args = vec![
        "--no-first-run".into(),
        "--no-default-browser-check".into(),
        "--disable-default-apps".into(),
        "--disable-popup-blocking".into(),
        "--disable-translate".into(),
        "--disable-sync".into(),
        "--password-store=basic".into(),
        "--use-mock-keychain".into(),
        format!(
            "--window-size={},{}",
            config.viewport_width, config.viewport_height
        ),
    ];

    if config.headless {
        args.extend([
            "--headless=new".into(),
            "--disable-gpu".into(),
            "--no-sandbox".into(),
            "--disable-dev-shm-usage".into(),
        ]);
    } else {
        args.push("--start-maximized".into());
    }

    args
}

/// A launched browser process and its DevTools connection
pub struct Browser {
    engine: BrowserEngine,
    connection: Connection,
    /// User data directory (cleaned up on close)
    user_data_dir: PathBuf,
}

impl Browser {
    /// Launch `engine` with the portal configuration
    pub async fn launch(engine: BrowserEngine, config: &PortalConfig) -> Result<Self> {
        let binary = match &config.browser_path {
            Some(p) => PathBuf::from(p),
            None => engine.find_binary()?,
        };

        let instance_id = BROWSER_COUNTER.fetch_add(1, Ordering::Relaxed);
        let user_data_dir = std::env::temp_dir().join(format!(
            "meterpay-{}-{}-{}",
            engine.name(),
            std::process::id(),
            instance_id
        ));
        let _ = std::fs::remove_dir_all(&user_data_dir);
        std::fs::create_dir_all(&user_data_dir)?;

        let mut args = launch_args(config);
        args.push(format!("--user-data-dir={}", user_data_dir.display()));

        tracing::info!("Launching {} from {:?}", engine, binary);
        let (child, ws_url) =
            tokio::task::spawn_blocking(move || launch_process(&binary, &args))
                .await
                .map_err(|e| Error::Launch(e.to_string()))??;

        let transport = Transport::connect(child, &ws_url)?;
        let connection = Connection::new(transport);

        let version = connection.version().await?;
        tracing::info!("Connected to {}", version.product);

        Ok(Self {
            engine,
            connection,
            user_data_dir,
        })
    }

    pub fn engine(&self) -> BrowserEngine {
        self.engine
    }

    /// Open a tab, navigate to `url` and wait for the document to load
    pub async fn new_page(&self, url: &str, load_timeout: Duration) -> Result<Page> {
        let session = self.connection.open_page("about:blank").await?;
        session.page_enable().await?;

        let page = Page::new(session);
        tracing::info!("Loading page: {}", url);
        page.goto(url).await?;
        page.wait_for_load(load_timeout).await?;
        Ok(page)
    }

    /// Close the browser
    pub async fn close(&self) -> Result<()> {
        self.connection.close().await?;
        let _ = std::fs::remove_dir_all(&self.user_data_dir);
        Ok(())
    }
}

impl Drop for Browser {
    fn drop(&mut self) {
        // The Transport's Drop impl handles killing the process
        let _ = std::fs::remove_dir_all(&self.user_data_dir);
    }
}

/// A browser with the portal page open in it
pub struct BrowserDriver {
    browser: Browser,
    page: Page,
}

impl BrowserDriver {
    pub fn browser(&self) -> &Browser {
        &self.browser
    }

    pub fn page(&self) -> &Page {
        &self.page
    }
}

#[async_trait]
impl PageDriver for BrowserDriver {
    async fn probe(&self, locator: &Locator) -> Result<Option<ElementState>> {
        self.page.probe(locator).await
    }

    async fn click(&self, locator: &Locator) -> Result<()> {
        self.page.click(locator).await
    }

    async fn fill(&self, locator: &Locator, text: &str) -> Result<()> {
        self.page.fill(locator, text).await
    }

    async fn texts(&self, locator: &Locator) -> Result<Vec<String>> {
        self.page.texts(locator).await
    }

    async fn mark_frame(&self, locator: &Locator) -> Result<Option<FrameMark>> {
        self.page.mark_frame(locator).await
    }

    async fn is_stale(&self, mark: &FrameMark) -> Result<bool> {
        self.page.is_stale(mark).await
    }

    async fn close(&self) -> Result<()> {
        tracing::info!("Closing {}", self.browser.engine());
        self.browser.close().await
    }
}

#[async_trait]
impl EngineProvider for BrowserEngine {
    type Driver = BrowserDriver;

    fn name(&self) -> &str {
        BrowserEngine::name(*self)
    }

    async fn launch(&self, config: &PortalConfig) -> Result<BrowserDriver> {
        let browser = Browser::launch(*self, config).await?;
        match browser.new_page(&config.url, config.timeouts.visible).await {
            Ok(page) => Ok(BrowserDriver { browser, page }),
            Err(e) => {
                let _ = browser.close().await;
                Err(e)
            }
        }
    }
}
