// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Config not found at {0}. Run 'pushcert init' first.")]
    ConfigNotFound(PathBuf),

    #[error("Config already exists at {0}. Use --force to overwrite.")]
    ConfigAlreadyExists(PathBuf),

    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to remove {path}: {source}")]
    Remove {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid path (non-UTF8): {0}")]
    InvalidPath(PathBuf),

    #[error("Invalid app identifier '{id}': {reason}")]
    InvalidAppId { id: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Key or signing request generation failed: {0}")]
    CertGen(#[from] rcgen::Error),

    #[error("Timed out after {seconds}s waiting for {waiting_for}")]
    TimedOut { waiting_for: String, seconds: u64 },

    #[error("Command '{command}' not found.\n{hint}")]
    CommandNotFound { command: String, hint: String },

    #[error("Command failed: {command}\n{stderr}")]
    Command { command: String, stderr: String },

    #[error("Keystore operation failed: {0}")]
    Keystore(String),

    #[error("Console automation failed: {0}")]
    Console(String),

    #[error("Console is not showing the expected page: {expected}")]
    UnexpectedPage { expected: String },

    #[error("Sign-in was rejected by the console. Check 'user' and the password.")]
    AuthenticationFailed,

    #[error("Failed to read identity bundle: {0}")]
    Pkcs12(String),

    #[error("WebDriver request failed: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
