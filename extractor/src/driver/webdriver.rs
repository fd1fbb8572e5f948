use super::{BrowserDriver, DriverFactory, KeyStroke};
use crate::errors::ExtractorError;
use crate::{Element, ElementImpl, Selector};
use async_trait::async_trait;
use fantoccini::actions::{InputSource, KeyAction, KeyActions};
use fantoccini::key::Key;
use fantoccini::wd::WindowHandle;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{json, Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, info, instrument, warn};

/// Starts Chrome sessions through a running chromedriver.
///
/// Profiles and the download directory live under one temporary root that is
/// removed when the factory is dropped at process shutdown.
pub struct WebDriverFactory {
    webdriver_url: String,
    headless: bool,
    root: TempDir,
    download_dir: PathBuf,
}

impl WebDriverFactory {
    pub fn new(webdriver_url: impl Into<String>, headless: bool) -> Result<Self, ExtractorError> {
        let root = tempfile::Builder::new()
            .prefix("afip-extractor-")
            .tempdir()?;
        let download_dir = root.path().join("downloads");
        std::fs::create_dir_all(&download_dir)?;
        Ok(Self {
            webdriver_url: webdriver_url.into(),
            headless,
            root,
            download_dir,
        })
    }

    fn capabilities(&self, profile_dir: &Path) -> Map<String, Value> {
        let mut args = vec![
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--window-size=1366,900".to_string(),
            format!("--user-data-dir={}", profile_dir.display()),
        ];
        if self.headless {
            args.push("--headless=new".to_string());
        }

        // Print preview defaults to "Save as PDF" so that confirming it opens a save dialog
        let print_state = json!({
            "recentDestinations": [{ "id": "Save as PDF", "origin": "local", "account": "" }],
            "selectedDestinationId": "Save as PDF",
            "version": 2
        });
        let download_dir = self.download_dir.display().to_string();

        let mut caps = Map::new();
        caps.insert("browserName".to_string(), json!("chrome"));
        caps.insert(
            "goog:chromeOptions".to_string(),
            json!({
                "args": args,
                "prefs": {
                    "download.default_directory": download_dir,
                    "savefile.default_directory": download_dir,
                    "download.prompt_for_download": false,
                    "printing.print_preview_sticky_settings.appState": print_state.to_string(),
                }
            }),
        );
        caps
    }
}

#[async_trait]
impl DriverFactory for WebDriverFactory {
    #[instrument(skip(self), fields(url = %self.webdriver_url))]
    async fn launch(&self) -> Result<Arc<dyn BrowserDriver>, ExtractorError> {
        let profile = tempfile::Builder::new()
            .prefix("profile-")
            .tempdir_in(self.root.path())?;
        let client = ClientBuilder::native()
            .capabilities(self.capabilities(profile.path()))
            .connect(&self.webdriver_url)
            .await?;
        info!("Browser session started");
        Ok(Arc::new(WebDriverSession::new(client, profile)))
    }
}

/// One Chrome window tree driven over WebDriver
pub struct WebDriverSession {
    client: Client,
    closed: AtomicBool,
    _profile: TempDir,
}

impl WebDriverSession {
    fn new(client: Client, profile: TempDir) -> Self {
        Self {
            client,
            closed: AtomicBool::new(false),
            _profile: profile,
        }
    }

    fn ensure_open(&self) -> Result<(), ExtractorError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ExtractorError::SessionClosed(
                "the browser was already closed".to_string(),
            ));
        }
        Ok(())
    }

    async fn perform_keys(&self, actions: KeyActions) -> Result<(), ExtractorError> {
        self.client.perform_actions(actions).await?;
        self.client.release_actions().await?;
        Ok(())
    }
}

#[async_trait]
impl BrowserDriver for WebDriverSession {
    async fn goto(&self, url: &str) -> Result<(), ExtractorError> {
        self.ensure_open()?;
        debug!("goto {}", url);
        Ok(self.client.goto(url).await?)
    }

    async fn current_url(&self) -> Result<String, ExtractorError> {
        self.ensure_open()?;
        Ok(self.client.current_url().await?.to_string())
    }

    async fn title(&self) -> Result<String, ExtractorError> {
        self.ensure_open()?;
        Ok(self.client.title().await?)
    }

    async fn find_all(&self, selector: &Selector) -> Result<Vec<Element>, ExtractorError> {
        self.ensure_open()?;
        let found = self.client.find_all(to_locator(selector)?).await?;
        Ok(found
            .into_iter()
            .map(|element| wrap(self.client.clone(), element))
            .collect())
    }

    async fn window_handles(&self) -> Result<Vec<String>, ExtractorError> {
        self.ensure_open()?;
        let handles = self.client.windows().await?;
        Ok(handles.into_iter().map(String::from).collect())
    }

    async fn current_window(&self) -> Result<String, ExtractorError> {
        self.ensure_open()?;
        Ok(String::from(self.client.window().await?))
    }

    async fn switch_to_window(&self, handle: &str) -> Result<(), ExtractorError> {
        self.ensure_open()?;
        let handle = WindowHandle::try_from(handle.to_string()).map_err(|e| {
            ExtractorError::InvalidArgument(format!("bad window handle '{handle}': {e}"))
        })?;
        Ok(self.client.switch_to_window(handle).await?)
    }

    async fn press_key(&self, key: KeyStroke) -> Result<(), ExtractorError> {
        self.ensure_open()?;
        let actions = match key {
            KeyStroke::Enter => KeyActions::new("keys".to_string())
                .then(KeyAction::Down { value: Key::Enter.into() })
                .then(KeyAction::Up { value: Key::Enter.into() }),
            KeyStroke::Escape => KeyActions::new("keys".to_string())
                .then(KeyAction::Down { value: Key::Escape.into() })
                .then(KeyAction::Up { value: Key::Escape.into() }),
            KeyStroke::SelectAll => KeyActions::new("keys".to_string())
                .then(KeyAction::Down { value: Key::Control.into() })
                .then(KeyAction::Down { value: 'a' })
                .then(KeyAction::Up { value: 'a' })
                .then(KeyAction::Up { value: Key::Control.into() }),
        };
        self.perform_keys(actions).await
    }

    async fn type_text(&self, text: &str) -> Result<(), ExtractorError> {
        self.ensure_open()?;
        let mut actions = KeyActions::new("keys".to_string());
        for c in text.chars() {
            actions = actions
                .then(KeyAction::Down { value: c })
                .then(KeyAction::Up { value: c });
        }
        self.perform_keys(actions).await
    }

    async fn quit(&self) -> Result<(), ExtractorError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        match self.client.clone().close().await {
            Ok(()) => {
                info!("Browser session closed");
                Ok(())
            }
            Err(e) => {
                warn!("Error while closing the browser: {}", e);
                Err(e.into())
            }
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

fn to_locator(selector: &Selector) -> Result<Locator<'_>, ExtractorError> {
    match selector {
        Selector::Css(css) => Ok(Locator::Css(css)),
        Selector::XPath(xpath) => Ok(Locator::XPath(xpath)),
        Selector::Id(id) => Ok(Locator::Id(id)),
        Selector::LinkText(text) => Ok(Locator::LinkText(text)),
        Selector::Invalid(reason) => Err(ExtractorError::InvalidSelector(reason.clone())),
    }
}

fn wrap(client: Client, element: fantoccini::elements::Element) -> Element {
    Element::new(Box::new(WebDriverElement { client, element }))
}

#[derive(Clone)]
struct WebDriverElement {
    client: Client,
    element: fantoccini::elements::Element,
}

impl fmt::Debug for WebDriverElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebDriverElement")
            .field("element", &self.element.element_id())
            .finish()
    }
}

impl WebDriverElement {
    async fn run_script(&self, script: &str) -> Result<(), ExtractorError> {
        let arg = serde_json::to_value(&self.element)?;
        self.client.execute(script, vec![arg]).await?;
        Ok(())
    }
}

#[async_trait]
impl ElementImpl for WebDriverElement {
    async fn text(&self) -> Result<String, ExtractorError> {
        Ok(self.element.text().await?)
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>, ExtractorError> {
        Ok(self.element.attr(name).await?)
    }

    async fn is_displayed(&self) -> Result<bool, ExtractorError> {
        Ok(self.element.is_displayed().await?)
    }

    async fn is_enabled(&self) -> Result<bool, ExtractorError> {
        Ok(self.element.is_enabled().await?)
    }

    async fn click(&self) -> Result<(), ExtractorError> {
        Ok(self.element.click().await?)
    }

    async fn js_click(&self) -> Result<(), ExtractorError> {
        self.run_script("arguments[0].click();").await
    }

    async fn scroll_into_view(&self) -> Result<(), ExtractorError> {
        self.run_script("arguments[0].scrollIntoView({block: 'center'});")
            .await
    }

    async fn clear(&self) -> Result<(), ExtractorError> {
        Ok(self.element.clear().await?)
    }

    async fn send_keys(&self, text: &str) -> Result<(), ExtractorError> {
        Ok(self.element.send_keys(text).await?)
    }

    async fn find_all(&self, selector: &Selector) -> Result<Vec<Element>, ExtractorError> {
        let found = self.element.find_all(to_locator(selector)?).await?;
        Ok(found
            .into_iter()
            .map(|element| wrap(self.client.clone(), element))
            .collect())
    }

    fn clone_box(&self) -> Box<dyn ElementImpl> {
        Box::new(self.clone())
    }
}
