// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

//! The remote developer console, seen through a narrow interface.
//!
//! The workflow only ever names *what* to press or fill ([`Control`],
//! [`Field`]); how that maps onto the console's markup is the business of the
//! concrete driver.

mod webdriver;

pub use webdriver::WebDriverConsole;

use crate::catalog::CatalogRow;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::wait::{wait_until, Timeouts};
use std::path::Path;
use std::time::Duration;
use tracing::info;
use zeroize::Zeroizing;

/// Page texts the workflow waits on.
pub mod text {
    pub const SIGN_IN: &str = "Sign in";
    pub const SELECT_TEAM: &str = "Select Your Team";
    pub const CSR_INSTRUCTIONS: &str = "Generate a Certificate Signing Request";
    pub const CSR_SUBMIT: &str = "Submit Certificate Signing Request";
    pub const CERTIFICATE_GENERATED: &str = "Your APNs SSL Certificate has been generated.";
    pub const DOWNLOAD_STEP: &str = "Step 1: Download";
    pub const INSTALL_STEP: &str =
        "Download & Install Your Apple Push Notification service SSL Certificate";
}

/// Buttons and links the workflow presses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    SignIn,
    SaveTeam,
    EnablePush,
    ConfigureProduction,
    RenewProduction,
    Continue,
    SubmitCsr,
    Download,
    Done,
}

/// Inputs the workflow fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    AccountName,
    Password,
    Team,
    CsrUpload,
}

pub trait Console {
    fn navigate(&mut self, url: &str) -> Result<()>;
    /// Visible text of the whole page.
    fn current_text(&mut self) -> Result<String>;
    fn click(&mut self, control: Control) -> Result<()>;
    fn set_field(&mut self, field: Field, value: &str) -> Result<()>;
    fn upload_file(&mut self, field: Field, path: &Path) -> Result<()>;
    fn select_option(&mut self, field: Field, visible_text: &str) -> Result<()>;
    /// Run the console's client-side check of an uploaded signing request.
    fn validate_upload(&mut self) -> Result<()>;
    fn catalog_rows(&mut self) -> Result<Vec<CatalogRow>>;
    /// Follow the configure link of catalog row `row`.
    fn open_app(&mut self, row: usize) -> Result<()>;

    fn wait_for_text(&mut self, text: &str, timeout: Duration, poll: Duration) -> Result<()> {
        wait_until(&format!("\"{}\"", text), timeout, poll, || {
            Ok(self.current_text()?.contains(text))
        })
    }
}

/// What the console is asking for before the catalog can be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    SignIn,
    TeamSelection,
    Ready,
}

pub fn detect_prompt(page_text: &str) -> Prompt {
    if page_text.contains(text::SIGN_IN) {
        Prompt::SignIn
    } else if page_text.contains(text::SELECT_TEAM) {
        Prompt::TeamSelection
    } else {
        Prompt::Ready
    }
}

/// Fill the credentials and submit once.
pub fn authenticate(
    console: &mut dyn Console,
    user: &str,
    password: &str,
    timeouts: &Timeouts,
) -> Result<()> {
    info!("Not logged in... logging in...");
    console.set_field(Field::AccountName, user)?;
    console.set_field(Field::Password, password)?;
    console.click(Control::SignIn)?;

    let settled = wait_until("sign-in to complete", timeouts.page, timeouts.poll, || {
        Ok(detect_prompt(&console.current_text()?) != Prompt::SignIn)
    });
    match settled {
        Ok(()) => {
            info!("Logged in");
            Ok(())
        }
        Err(Error::TimedOut { .. }) => Err(Error::AuthenticationFailed),
        Err(e) => Err(e),
    }
}

pub fn select_team(console: &mut dyn Console, team: &str) -> Result<()> {
    if team.trim().is_empty() {
        return Err(Error::Config(
            "the console asks for a team but 'team' is not set".into(),
        ));
    }
    info!(team, "selecting team");
    console.select_option(Field::Team, team)?;
    console.click(Control::SaveTeam)
}

/// Open the catalog, signing in and picking the team if the console asks.
///
/// `password` is only called when a sign-in is actually needed.
pub fn open_catalog<P>(console: &mut dyn Console, config: &Config, password: P) -> Result<()>
where
    P: FnOnce() -> Result<Zeroizing<String>>,
{
    let timeouts = config.timeouts();
    console.navigate(&config.console_url)?;

    if detect_prompt(&console.current_text()?) == Prompt::SignIn {
        let password = password()?;
        authenticate(console, &config.user, &password, &timeouts)?;
    }

    if detect_prompt(&console.current_text()?) == Prompt::TeamSelection {
        select_team(console, &config.team)?;
        wait_until("team selection to complete", timeouts.page, timeouts.poll, || {
            Ok(detect_prompt(&console.current_text()?) == Prompt::Ready)
        })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Login page that accepts one password, then shows a team picker.
    struct LoginPage {
        page: &'static str,
        fields: Vec<(Field, String)>,
        accepted_password: &'static str,
        asks_for_team: bool,
        selected_team: Option<String>,
    }

    impl LoginPage {
        fn new(asks_for_team: bool) -> Self {
            Self {
                page: "",
                fields: Vec::new(),
                accepted_password: "hunter2",
                asks_for_team,
                selected_team: None,
            }
        }

        fn field(&self, field: Field) -> Option<&str> {
            self.fields
                .iter()
                .rev()
                .find(|(f, _)| *f == field)
                .map(|(_, v)| v.as_str())
        }
    }

    impl Console for LoginPage {
        fn navigate(&mut self, _url: &str) -> Result<()> {
            self.page = "Sign in to your developer account";
            Ok(())
        }
        fn current_text(&mut self) -> Result<String> {
            Ok(self.page.to_string())
        }
        fn click(&mut self, control: Control) -> Result<()> {
            match control {
                Control::SignIn => {
                    if self.field(Field::Password) == Some(self.accepted_password) {
                        self.page = if self.asks_for_team {
                            "Select Your Team"
                        } else {
                            "App IDs"
                        };
                    }
                }
                Control::SaveTeam => self.page = "App IDs",
                _ => return Err(Error::Console(format!("unexpected click {:?}", control))),
            }
            Ok(())
        }
        fn set_field(&mut self, field: Field, value: &str) -> Result<()> {
            self.fields.push((field, value.to_string()));
            Ok(())
        }
        fn upload_file(&mut self, _field: Field, _path: &Path) -> Result<()> {
            Ok(())
        }
        fn select_option(&mut self, field: Field, visible_text: &str) -> Result<()> {
            assert_eq!(field, Field::Team);
            self.selected_team = Some(visible_text.to_string());
            Ok(())
        }
        fn validate_upload(&mut self) -> Result<()> {
            Ok(())
        }
        fn catalog_rows(&mut self) -> Result<Vec<CatalogRow>> {
            Ok(Vec::new())
        }
        fn open_app(&mut self, _row: usize) -> Result<()> {
            Ok(())
        }
    }

    fn quick_config(team: &str) -> Config {
        let mut config = Config {
            user: "dev@example.com".into(),
            team: team.into(),
            ..Config::default()
        };
        config.timeouts.page_secs = 1;
        config.timeouts.poll_millis = 5;
        config
    }

    #[test]
    fn test_detect_prompt() {
        assert_eq!(detect_prompt("Please Sign in"), Prompt::SignIn);
        assert_eq!(detect_prompt("Select Your Team"), Prompt::TeamSelection);
        assert_eq!(detect_prompt("App IDs"), Prompt::Ready);
    }

    #[test]
    fn test_open_catalog_signs_in_and_selects_team() {
        let mut console = LoginPage::new(true);
        let config = quick_config("Example Inc.");

        open_catalog(&mut console, &config, || Ok(Zeroizing::new("hunter2".into())))
            .expect("catalog should open");

        assert_eq!(console.field(Field::AccountName), Some("dev@example.com"));
        assert_eq!(console.selected_team.as_deref(), Some("Example Inc."));
        assert_eq!(console.page, "App IDs");
    }

    #[test]
    fn test_open_catalog_wrong_password() {
        let mut console = LoginPage::new(false);
        let config = quick_config("");

        let result = open_catalog(&mut console, &config, || Ok(Zeroizing::new("wrong".into())));
        assert!(matches!(result, Err(Error::AuthenticationFailed)));
    }

    #[test]
    fn test_open_catalog_team_required_but_unset() {
        let mut console = LoginPage::new(true);
        let config = quick_config("");

        let result = open_catalog(&mut console, &config, || Ok(Zeroizing::new("hunter2".into())));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_open_catalog_does_not_ask_for_password_when_signed_in() {
        struct SignedIn;
        impl Console for SignedIn {
            fn navigate(&mut self, _url: &str) -> Result<()> {
                Ok(())
            }
            fn current_text(&mut self) -> Result<String> {
                Ok("App IDs".into())
            }
            fn click(&mut self, _control: Control) -> Result<()> {
                Ok(())
            }
            fn set_field(&mut self, _field: Field, _value: &str) -> Result<()> {
                Ok(())
            }
            fn upload_file(&mut self, _field: Field, _path: &Path) -> Result<()> {
                Ok(())
            }
            fn select_option(&mut self, _field: Field, _text: &str) -> Result<()> {
                Ok(())
            }
            fn validate_upload(&mut self) -> Result<()> {
                Ok(())
            }
            fn catalog_rows(&mut self) -> Result<Vec<CatalogRow>> {
                Ok(Vec::new())
            }
            fn open_app(&mut self, _row: usize) -> Result<()> {
                Ok(())
            }
        }

        let config = quick_config("");
        open_catalog(&mut SignedIn, &config, || {
            panic!("password should not be requested")
        })
        .expect("catalog should open");
    }
}
