// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use pushcert::{
    default_keystore, open_catalog, plan_catalog, process_catalog, Action, AppFilter,
    CertificateArtifacts, Config, Error, Paths, Policy, Result, RunReport, WebDriverConsole,
};
use std::path::{Path, PathBuf};
use tracing::debug;
use zeroize::Zeroizing;

const PASSWORD_ENV: &str = "PUSHCERT_PASSWORD";

#[derive(Parser)]
#[command(name = "pushcert")]
#[command(about = "Provision production push certificates for every app in a developer account")]
#[command(version)]
#[command(after_help = "\
EXAMPLES:
    pushcert init --user dev@example.com   # Write a starter config
    pushcert plan                          # Show what a run would do
    pushcert run --filter FanFB            # Configure matching apps
    pushcert run --refresh                 # Also renew enabled apps")]
struct Cli {
    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Show detailed output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CatalogArgs {
    /// Config file (default: config.toml in the data directory)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Renew certificates of apps that are already enabled
    #[arg(long)]
    refresh: bool,

    /// Only process apps whose identifier ends with this suffix
    #[arg(long)]
    filter: Option<String>,
}

impl CatalogArgs {
    fn policy(&self, config: &Config) -> Policy {
        let mut policy = config.policy();
        policy.refresh_existing |= self.refresh;
        if let Some(filter) = &self.filter {
            policy.filter = AppFilter::suffix(filter.clone());
        }
        policy
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,

        /// Console account name
        #[arg(long)]
        user: Option<String>,

        /// Team to pick when the console asks for one
        #[arg(long)]
        team: Option<String>,
    },

    /// Generate the RSA key and certificate signing request only
    Keygen {
        /// Config file (default: config.toml in the data directory)
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Replace the existing RSA key
        #[arg(long)]
        force: bool,
    },

    /// Sign in, scan the catalog and show the action for every app
    Plan {
        #[command(flatten)]
        args: CatalogArgs,
    },

    /// Configure or renew push certificates and write one PEM per app
    Run {
        #[command(flatten)]
        args: CatalogArgs,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Output helper that respects --quiet.
#[derive(Clone, Copy)]
struct Output {
    quiet: bool,
}

impl Output {
    fn print(&self, msg: &str) {
        if !self.quiet {
            println!("{}", msg);
        }
    }
}

fn main() {
    // Reset SIGPIPE to default behavior (exit) instead of panic
    #[cfg(unix)]
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(quiet: bool, verbose: bool) {
    let level = if quiet {
        tracing::Level::WARN
    } else if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);
    let out = Output { quiet: cli.quiet };

    match cli.command {
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Init { force, user, team } => cmd_init(&Paths::new()?, force, user, team, out),
        Commands::Keygen { config, force } => {
            cmd_keygen(&Paths::new()?, config.as_deref(), force, out)
        }
        Commands::Plan { args } => cmd_plan(&Paths::new()?, &args, out),
        Commands::Run { args } => cmd_run(&Paths::new()?, &args, out),
    }
}

fn load_config(paths: &Paths, config: Option<&Path>) -> Result<Config> {
    let path = config.unwrap_or(paths.config.as_path());
    debug!(path = %path.display(), "loading config");
    Config::load(path)
}

fn cmd_init(
    paths: &Paths,
    force: bool,
    user: Option<String>,
    team: Option<String>,
    out: Output,
) -> Result<()> {
    if paths.config.exists() && !force {
        return Err(Error::ConfigAlreadyExists(paths.config.clone()));
    }

    paths.ensure_dir()?;
    let config = Config {
        user: user.unwrap_or_default(),
        team: team.unwrap_or_default(),
        ..Config::default()
    };
    config.save(&paths.config)?;

    out.print(&format!("Wrote {}", paths.config.display()));
    if config.user.is_empty() {
        out.print("Set 'user' in it before running 'pushcert run'.");
    }
    Ok(())
}

fn cmd_keygen(paths: &Paths, config: Option<&Path>, force: bool, out: Output) -> Result<()> {
    let config = load_config(paths, config)?;
    paths.ensure_dir()?;

    let artifacts = CertificateArtifacts::new(paths, &config);
    artifacts.prepare(&config.user, &config.country_code, force)?;

    out.print(&format!("RSA key:         {}", artifacts.rsa_key.display()));
    out.print(&format!("Signing request: {}", artifacts.csr.display()));
    Ok(())
}

/// Console password from config, environment or prompt, in that order.
fn resolve_password(config: &Config) -> Result<Zeroizing<String>> {
    if let Some(pwd) = config.password.as_deref().filter(|p| !p.is_empty()) {
        return Ok(Zeroizing::new(pwd.to_string()));
    }

    if let Ok(pwd) = std::env::var(PASSWORD_ENV) {
        if pwd.is_empty() {
            return Err(Error::Config(format!(
                "{} is set but empty. Password cannot be empty.",
                PASSWORD_ENV
            )));
        }
        return Ok(Zeroizing::new(pwd));
    }

    let pwd = rpassword::prompt_password(format!("Password for {}: ", config.user))
        .map_err(|e| Error::Config(format!("Failed to read password: {}", e)))?;
    if pwd.is_empty() {
        return Err(Error::Config("Password cannot be empty".to_string()));
    }
    Ok(Zeroizing::new(pwd))
}

fn connect(config: &Config) -> Result<WebDriverConsole> {
    let mut console = WebDriverConsole::connect(
        &config.webdriver_url,
        &config.browser,
        &config.download_dir,
        config.timeouts().page,
    )?;
    open_catalog(&mut console, config, || resolve_password(config))?;
    Ok(console)
}

fn cmd_plan(paths: &Paths, args: &CatalogArgs, out: Output) -> Result<()> {
    let config = load_config(paths, args.config.as_deref())?;
    let policy = args.policy(&config);

    let mut console = connect(&config)?;
    let plan = plan_catalog(&mut console, &policy)?;

    if plan.is_empty() {
        out.print("No apps found in the catalog.");
        return Ok(());
    }
    println!("{:<48} {:<14} ACTION", "APP", "STATUS");
    for (app, action) in &plan {
        println!(
            "{:<48} {:<14} {}",
            app.id,
            app.push_status.label(),
            action.label()
        );
    }
    Ok(())
}

fn cmd_run(paths: &Paths, args: &CatalogArgs, out: Output) -> Result<()> {
    let config = load_config(paths, args.config.as_deref())?;
    let policy = args.policy(&config);
    paths.ensure_dir()?;

    let artifacts = CertificateArtifacts::new(paths, &config);
    artifacts.prepare(&config.user, &config.country_code, false)?;
    debug!(csr = %artifacts.csr.display(), "key material ready");

    let mut console = connect(&config)?;
    let keystore = default_keystore();
    let report = process_catalog(
        &mut console,
        keystore.as_ref(),
        &artifacts,
        &config,
        &policy,
    )?;

    print_summary(&report, out);
    Ok(())
}

fn print_summary(report: &RunReport, out: Output) {
    out.print(&format!(
        "Done: {} configured, {} renewed, {} skipped",
        report.count(Action::ConfigureNew),
        report.count(Action::RenewExisting),
        report.count(Action::Skip)
    ));
    for pem in report.produced() {
        out.print(&format!("  {}", pem.display()));
    }
}

fn cmd_completions(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "pushcert", &mut std::io::stdout());
    Ok(())
}
