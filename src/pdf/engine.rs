//! Headless Chromium rendering engine.
//!
//! One browser process starts on first use and is kept until `shutdown`.
//! Every conversion gets its own browser context, so cookies, cache and
//! storage never leak between reports. The context is disposed when the
//! conversion ends, whichever way it exits.

use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{broadcast, Mutex};

use super::devtools::DevToolsConnection;
use super::{looks_like_pdf, PdfError, PdfOptions, RenderingEngine};
use crate::config::PdfConfig;

const INPUT_FILENAME: &str = "report.html";
const LISTENING_PREFIX: &str = "DevTools listening on ";
const LAUNCH_TIMEOUT: Duration = Duration::from_secs(30);
const CLOSE_GRACE: Duration = Duration::from_secs(5);
const MAX_STDERR_BYTES: usize = 16 * 1024;
const MM_PER_INCH: f64 = 25.4;

/// A running browser and its control connection.
struct Browser {
    connection: Arc<DevToolsConnection>,
    process: Mutex<Child>,
    _profile: TempDir,
}

impl Browser {
    fn is_alive(&self) -> bool {
        self.connection.is_open()
    }

    async fn close(&self) {
        // The browser drops the connection while closing, so no reply is expected.
        let _ = tokio::time::timeout(
            CLOSE_GRACE,
            self.connection.call("Browser.close", json!({}), None),
        )
        .await;
        let mut process = self.process.lock().await;
        if tokio::time::timeout(CLOSE_GRACE, process.wait()).await.is_err() {
            log::warn!("Rendering engine still running after {:?}, killing it", CLOSE_GRACE);
            if let Err(e) = process.kill().await {
                log::error!("Failed to kill rendering engine: {}", e);
            }
        }
    }
}

/// Chromium driven over the DevTools protocol.
pub struct ChromiumEngine {
    executable: String,
    no_sandbox: bool,
    timeout: Duration,
    browser: Mutex<Option<Arc<Browser>>>,
    shut_down: AtomicBool,
}

impl ChromiumEngine {
    pub fn new(config: &PdfConfig) -> Self {
        Self {
            executable: config.executable.clone(),
            no_sandbox: config.no_sandbox,
            timeout: config.timeout,
            browser: Mutex::new(None),
            shut_down: AtomicBool::new(false),
        }
    }

    fn command(&self, profile: &Path) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.arg("--headless")
            .arg("--disable-gpu")
            .arg("--disable-extensions")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--remote-debugging-port=0")
            .arg(format!("--user-data-dir={}", profile.display()));
        if self.no_sandbox {
            cmd.arg("--no-sandbox").arg("--disable-setuid-sandbox");
        }
        cmd.arg("about:blank")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn launch(&self) -> Result<Browser, PdfError> {
        let profile = tempdir().map_err(PdfError::Workspace)?;
        let mut child = self.command(profile.path()).spawn().map_err(PdfError::Launch)?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| PdfError::Protocol("engine stderr not captured".to_string()))?;
        let mut lines = BufReader::new(stderr).lines();

        // The browser announces its websocket endpoint on stderr.
        let mut output = String::new();
        let announced = tokio::time::timeout(LAUNCH_TIMEOUT, async {
            while let Some(line) = lines.next_line().await? {
                if let Some(url) = line.strip_prefix(LISTENING_PREFIX) {
                    return Ok(Some(url.trim().to_string()));
                }
                if output.len() < MAX_STDERR_BYTES {
                    output.push_str(&line);
                    output.push('\n');
                }
            }
            Ok::<_, std::io::Error>(None)
        })
        .await;

        let ws_url = match announced {
            Ok(Ok(Some(url))) => url,
            Ok(Ok(None)) => {
                let status = child.wait().await.map_err(PdfError::Launch)?;
                let code = status.code().unwrap_or(-1);
                log::error!(
                    "Rendering engine exited during startup with status {}: {}",
                    code,
                    output.trim()
                );
                return Err(PdfError::EngineExit {
                    code,
                    stderr: output,
                });
            }
            Ok(Err(e)) => return Err(PdfError::Launch(e)),
            Err(_) => {
                log::error!("Rendering engine did not start within {:?}", LAUNCH_TIMEOUT);
                return Err(PdfError::Timeout(LAUNCH_TIMEOUT));
            }
        };

        // Keep draining so a chatty browser never blocks on a full pipe.
        tokio::spawn(async move {
            while let Ok(Some(line)) = lines.next_line().await {
                log::debug!("chromium: {}", line);
            }
        });

        let connection = DevToolsConnection::connect(&ws_url).await?;
        let version = connection.call("Browser.getVersion", json!({}), None).await?;
        log::info!(
            "Rendering engine ready: {}",
            version.get("product").and_then(Value::as_str).unwrap_or("unknown")
        );

        Ok(Browser {
            connection: Arc::new(connection),
            process: Mutex::new(child),
            _profile: profile,
        })
    }

    /// The running browser; started on first use and restarted if it died.
    async fn browser(&self) -> Result<Arc<Browser>, PdfError> {
        let mut slot = self.browser.lock().await;
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(PdfError::ShutDown);
        }
        if let Some(browser) = slot.as_ref() {
            if browser.is_alive() {
                return Ok(browser.clone());
            }
            log::warn!("Rendering engine connection lost, relaunching");
        }
        let browser = Arc::new(self.launch().await?);
        *slot = Some(browser.clone());
        Ok(browser)
    }
}

#[async_trait]
impl RenderingEngine for ChromiumEngine {
    async fn render(&self, html: &str, options: &PdfOptions) -> Result<Vec<u8>, PdfError> {
        let browser = self.browser().await?;

        let workspace = tempdir().map_err(PdfError::Workspace)?;
        let input = workspace.path().join(INPUT_FILENAME);
        tokio::fs::write(&input, with_print_css(html, &options.print_css()))
            .await
            .map_err(PdfError::Workspace)?;
        let url = file_url(&input);

        let printed = tokio::time::timeout(self.timeout, async {
            let context = IsolatedContext::open(browser.connection.clone()).await?;
            context.print(&url, options).await
        })
        .await;
        match printed {
            Ok(result) => result,
            Err(_) => {
                log::warn!("Rendering engine timed out after {:?}", self.timeout);
                Err(PdfError::Timeout(self.timeout))
            }
        }
    }

    async fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
        let browser = self.browser.lock().await.take();
        if let Some(browser) = browser {
            browser.close().await;
            log::info!("Rendering engine closed");
        }
    }
}

/// A browser context owned by one conversion. Disposed on drop, which also
/// covers a conversion cancelled by a timeout.
struct IsolatedContext {
    connection: Arc<DevToolsConnection>,
    id: String,
}

impl IsolatedContext {
    async fn open(connection: Arc<DevToolsConnection>) -> Result<Self, PdfError> {
        let created = connection
            .call(
                "Target.createBrowserContext",
                json!({ "disposeOnDetach": true }),
                None,
            )
            .await?;
        let id = string_field(&created, "browserContextId")?;
        Ok(Self { connection, id })
    }

    async fn print(&self, url: &str, options: &PdfOptions) -> Result<Vec<u8>, PdfError> {
        let connection = &self.connection;
        let target = connection
            .call(
                "Target.createTarget",
                json!({ "url": "about:blank", "browserContextId": self.id }),
                None,
            )
            .await?;
        let target_id = string_field(&target, "targetId")?;
        let attached = connection
            .call(
                "Target.attachToTarget",
                json!({ "targetId": target_id, "flatten": true }),
                None,
            )
            .await?;
        let session_id = string_field(&attached, "sessionId")?;
        let session = Some(session_id.as_str());

        connection.call("Page.enable", json!({}), session).await?;
        let mut events = connection.subscribe();
        let navigation = connection
            .call("Page.navigate", json!({ "url": url }), session)
            .await?;
        if let Some(error) = navigation.get("errorText").and_then(Value::as_str) {
            return Err(PdfError::Protocol(format!("navigation failed: {}", error)));
        }
        wait_for_event(&mut events, "Page.loadEventFired", &session_id).await?;

        let printed = connection
            .call("Page.printToPDF", print_params(options), session)
            .await?;
        let pdf = STANDARD
            .decode(string_field(&printed, "data")?)
            .map_err(|_| PdfError::InvalidOutput)?;
        if pdf.is_empty() {
            return Err(PdfError::MissingOutput);
        }
        if !looks_like_pdf(&pdf) {
            return Err(PdfError::InvalidOutput);
        }
        Ok(pdf)
    }
}

impl Drop for IsolatedContext {
    fn drop(&mut self) {
        let connection = self.connection.clone();
        let id = std::mem::take(&mut self.id);
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        runtime.spawn(async move {
            let params = json!({ "browserContextId": &id });
            let disposed = tokio::time::timeout(
                CLOSE_GRACE,
                connection.call("Target.disposeBrowserContext", params, None),
            )
            .await;
            match disposed {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => log::warn!("Failed to dispose browser context {}: {}", id, e),
                Err(_) => log::warn!("Timed out disposing browser context {}", id),
            }
        });
    }
}

async fn wait_for_event(
    events: &mut broadcast::Receiver<Value>,
    method: &str,
    session_id: &str,
) -> Result<(), PdfError> {
    loop {
        match events.recv().await {
            Ok(event) if event["method"] == method && event["sessionId"] == session_id => {
                return Ok(())
            }
            Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
            Err(broadcast::error::RecvError::Closed) => {
                return Err(PdfError::Protocol("event stream closed".to_string()))
            }
        }
    }
}

fn print_params(options: &PdfOptions) -> Value {
    let margin = f64::from(options.margin_mm) / MM_PER_INCH;
    json!({
        "printBackground": options.print_background,
        "preferCSSPageSize": true,
        "displayHeaderFooter": false,
        "marginTop": margin,
        "marginBottom": margin,
        "marginLeft": margin,
        "marginRight": margin,
    })
}

fn string_field(reply: &Value, key: &str) -> Result<String, PdfError> {
    reply
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| PdfError::Protocol(format!("reply is missing {}", key)))
}

/// Insert the print stylesheet right after `<head>`, or prepend it.
fn with_print_css(html: &str, css: &str) -> String {
    let style = format!("<style>{}</style>", css);
    match html.find("<head>") {
        Some(pos) => {
            let split = pos + "<head>".len();
            format!("{}{}{}", &html[..split], style, &html[split..])
        }
        None => format!("{}{}", style, html),
    }
}

fn file_url(path: &Path) -> String {
    format!("file://{}", path.display())
}
