// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

use crate::catalog::CatalogRow;
use crate::console::{Console, Control, Field};
use crate::error::{Error, Result};
use crate::fs::path_to_str;
use reqwest::blocking::Client;
use reqwest::Method;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// W3C key under which element references are returned.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

const REQUEST_TIMEOUT_SECS: u64 = 60;

/// HTTP budget per command. An element lookup may block for the whole
/// implicit wait, so the client must outlast it.
fn request_timeout(page_timeout: Duration) -> Duration {
    Duration::from_secs(REQUEST_TIMEOUT_SECS).max(page_timeout + Duration::from_secs(10))
}

fn timeouts_body(page_timeout: Duration) -> Value {
    let implicit = u64::try_from(page_timeout.as_millis()).unwrap_or(u64::MAX);
    json!({ "implicit": implicit })
}

/// Rows of the app catalog table.
const CATALOG_ROWS: &str = "div.nt_multi table tr";

/// Column holding a row's "Configure" link.
const CONFIGURE_COLUMN: usize = 5;

const READ_CATALOG_SCRIPT: &str = r#"
return Array.from(document.querySelectorAll(arguments[0])).map(function (row) {
    var first = row.cells[0];
    var strong = first ? first.querySelector('strong') : null;
    var status = row.cells[1];
    return {
        name: strong ? { text: strong.innerText, title: strong.getAttribute('title') } : null,
        status: status ? status.innerText : ''
    };
});
"#;

const OPEN_ROW_SCRIPT: &str = r#"
var row = document.querySelectorAll(arguments[0])[arguments[1]];
var cell = row ? row.cells[arguments[2]] : null;
var link = cell ? cell.querySelector('a') : null;
if (!link) { return false; }
link.click();
return true;
"#;

const SELECT_OPTION_SCRIPT: &str = r#"
var select = document.querySelector(arguments[0]);
if (!select) { return false; }
for (var i = 0; i < select.options.length; i++) {
    var option = select.options[i];
    if (option.text.trim() === arguments[1]) {
        select.value = option.value;
        select.dispatchEvent(new Event('change', { bubbles: true }));
        return true;
    }
}
return false;
"#;

const SUBMIT_FORM_SCRIPT: &str = "arguments[0].submit();";

const VALIDATE_UPLOAD_SCRIPT: &str = "callFileValidate();";

fn control_selector(control: Control) -> &'static str {
    match control {
        Control::SignIn => "form[name='appleConnectForm']",
        Control::SaveTeam => "#saveTeamSelection_saveTeamSelection_save",
        Control::EnablePush => "#enablePush",
        Control::ConfigureProduction => "#aps-assistant-btn-prod-en",
        Control::RenewProduction => "#aps-assistant-btn-ov-prod-en",
        Control::Continue => "#ext-gen59",
        Control::SubmitCsr => "#ext-gen75",
        Control::Download => "[alt='Download']",
        Control::Done => "#ext-gen91",
    }
}

fn field_selector(field: Field) -> &'static str {
    match field {
        Field::AccountName => "input[name='theAccountName']",
        Field::Password => "#accountpassword",
        Field::Team => "#teams",
        Field::CsrUpload => "input[name='upload']",
    }
}

/// Pull `value` out of a WebDriver response, turning protocol errors into
/// [`Error::Console`].
fn unwrap_value(mut response: Value) -> Result<Value> {
    let value = response
        .get_mut("value")
        .map(Value::take)
        .unwrap_or(Value::Null);

    if let Some(error) = value.get("error").and_then(Value::as_str) {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default();
        return Err(Error::Console(format!("{}: {}", error, message)));
    }

    Ok(value)
}

fn element_id(value: &Value) -> Result<String> {
    value
        .get(ELEMENT_KEY)
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| Error::Console(format!("malformed element reference: {}", value)))
}

fn send(http: &Client, method: Method, url: &str, body: Option<Value>) -> Result<Value> {
    let request = http.request(method, url);
    let request = match body {
        Some(body) => request.json(&body),
        None => request,
    };
    let response: Value = request.send()?.json()?;
    unwrap_value(response)
}

/// A browser session driven over the W3C WebDriver protocol
/// (chromedriver, geckodriver, ...).
pub struct WebDriverConsole {
    http: Client,
    base: String,
    session_id: String,
}

impl WebDriverConsole {
    /// Start a browser session whose downloads land in `download_dir`.
    pub fn connect(
        webdriver_url: &str,
        browser: &str,
        download_dir: &Path,
        page_timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(request_timeout(page_timeout))
            .build()?;
        let base = webdriver_url.trim_end_matches('/').to_string();

        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": browser,
                    "goog:chromeOptions": {
                        "prefs": {
                            "download.default_directory": path_to_str(download_dir)?,
                            "download.prompt_for_download": false
                        }
                    }
                }
            }
        });

        let value = send(
            &http,
            Method::POST,
            &format!("{}/session", base),
            Some(capabilities),
        )?;
        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Console("new session response has no sessionId".into()))?
            .to_string();
        debug!(session = %session_id, browser, "webdriver session started");

        let console = Self {
            http,
            base,
            session_id,
        };
        // element lookups right after a click wait for the next page instead
        // of failing with "no such element"
        console.command(Method::POST, "/timeouts", Some(timeouts_body(page_timeout)))?;
        Ok(console)
    }

    fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let url = format!("{}/session/{}{}", self.base, self.session_id, path);
        send(&self.http, method, &url, body)
    }

    fn find(&self, css: &str) -> Result<String> {
        let value = self.command(
            Method::POST,
            "/element",
            Some(json!({ "using": "css selector", "value": css })),
        )?;
        element_id(&value)
    }

    fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value> {
        self.command(
            Method::POST,
            "/execute/sync",
            Some(json!({ "script": script, "args": args })),
        )
    }

    fn send_keys(&self, element: &str, text: &str) -> Result<()> {
        self.command(
            Method::POST,
            &format!("/element/{}/value", element),
            Some(json!({ "text": text })),
        )?;
        Ok(())
    }
}

impl Console for WebDriverConsole {
    fn navigate(&mut self, url: &str) -> Result<()> {
        debug!(url, "navigate");
        self.command(Method::POST, "/url", Some(json!({ "url": url })))?;
        Ok(())
    }

    fn current_text(&mut self) -> Result<String> {
        let body = self.find("body")?;
        let value = self.command(Method::GET, &format!("/element/{}/text", body), None)?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    fn click(&mut self, control: Control) -> Result<()> {
        debug!(?control, "click");
        let element = self.find(control_selector(control))?;
        if control == Control::SignIn {
            // The sign-in "control" is the login form itself
            self.execute(SUBMIT_FORM_SCRIPT, vec![json!({ ELEMENT_KEY: element })])?;
        } else {
            self.command(
                Method::POST,
                &format!("/element/{}/click", element),
                Some(json!({})),
            )?;
        }
        Ok(())
    }

    fn set_field(&mut self, field: Field, value: &str) -> Result<()> {
        let element = self.find(field_selector(field))?;
        self.command(
            Method::POST,
            &format!("/element/{}/clear", element),
            Some(json!({})),
        )?;
        self.send_keys(&element, value)
    }

    fn upload_file(&mut self, field: Field, path: &Path) -> Result<()> {
        let element = self.find(field_selector(field))?;
        self.send_keys(&element, path_to_str(path)?)
    }

    fn select_option(&mut self, field: Field, visible_text: &str) -> Result<()> {
        let selected = self.execute(
            SELECT_OPTION_SCRIPT,
            vec![json!(field_selector(field)), json!(visible_text)],
        )?;
        if selected.as_bool() != Some(true) {
            return Err(Error::UnexpectedPage {
                expected: format!("an option named '{}'", visible_text),
            });
        }
        Ok(())
    }

    fn validate_upload(&mut self) -> Result<()> {
        self.execute(VALIDATE_UPLOAD_SCRIPT, Vec::new())?;
        Ok(())
    }

    fn catalog_rows(&mut self) -> Result<Vec<CatalogRow>> {
        let rows = self.execute(READ_CATALOG_SCRIPT, vec![json!(CATALOG_ROWS)])?;
        serde_json::from_value(rows)
            .map_err(|e| Error::Console(format!("unreadable catalog table: {}", e)))
    }

    fn open_app(&mut self, row: usize) -> Result<()> {
        let opened = self.execute(
            OPEN_ROW_SCRIPT,
            vec![json!(CATALOG_ROWS), json!(row), json!(CONFIGURE_COLUMN)],
        )?;
        if opened.as_bool() != Some(true) {
            return Err(Error::UnexpectedPage {
                expected: format!("a configure link in catalog row {}", row),
            });
        }
        Ok(())
    }
}

impl Drop for WebDriverConsole {
    fn drop(&mut self) {
        let url = format!("{}/session/{}", self.base, self.session_id);
        if let Err(e) = send(&self.http, Method::DELETE, &url, None) {
            warn!(error = %e, "failed to close webdriver session");
        }
    }
}
