// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Safehold: client-side security layer
//
// Entry point. Initialises logging, loads configuration, opens the store and
// audit log, and dispatches one subcommand:
//
//   validate <path> --type <mime>   - run the upload validation pipeline
//   limit <key> --max N --window-ms W
//                                   - count an attempt against a rate limit
//   put / get / remove / keys / clear
//                                   - integrity-checked store operations
//   audit                           - show recent security events
//   config show | init              - print or write the configuration

mod data_dir;
mod services;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};

use safehold_core::human_errors::{humanize_error, humanize_validation};
use safehold_core::types::{ContentCategory, StorageMode, StorageScope, ValidationFailure};
use safehold_core::{SafeholdError, SecurityConfig};
use safehold_security::{GetOptions, PutOptions, SecurityEvent, hash_reader};
use safehold_upload::{DiskUpload, ValidationResult, validate_category};

use services::Services;

/// Exit status for a rejected upload or a denied attempt.
const EXIT_DENIED: u8 = 2;

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "safehold",
    version,
    about = "Safehold client-side security layer",
    long_about = "safehold: validate uploads, rate-limit actions, and manage the tamper-evident local store"
)]
struct Cli {
    /// Path to the JSON configuration file (default: <data-dir>/config.json)
    #[arg(long, short = 'c', env = "SAFEHOLD_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the store and audit databases
    #[arg(long, env = "SAFEHOLD_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate a file as an upload
    Validate {
        /// File on disk
        path: PathBuf,
        /// Declared MIME type
        #[arg(long = "type", short = 't')]
        mime: String,
        /// Preset to validate against (default: inferred from the MIME type)
        #[arg(long, value_parser = parse_category)]
        category: Option<ContentCategory>,
        /// Name to validate instead of the path's file name
        #[arg(long)]
        name: Option<String>,
    },

    /// Count one attempt against a fixed-window rate limit
    Limit {
        /// Limiter key, e.g. login:alice@example.com
        key: String,
        /// Attempts allowed per window
        #[arg(long)]
        max: u32,
        /// Window length in milliseconds
        #[arg(long)]
        window_ms: u64,
        /// Report remaining attempts without counting one
        #[arg(long, conflicts_with = "reset")]
        status: bool,
        /// Forget all attempts for the key
        #[arg(long)]
        reset: bool,
    },

    /// Store a JSON value
    Put {
        key: String,
        /// JSON document to store
        json: String,
        /// Expire after this many milliseconds
        #[arg(long)]
        ttl_ms: Option<u64>,
        /// Integrity-checked plaintext instead of encryption
        #[arg(long)]
        plain: bool,
        /// Use the session scope (in memory, lasts for this process only)
        #[arg(long)]
        session: bool,
    },

    /// Read a stored value
    ///
    /// The mode must match the one used by `put`: an entry read in the wrong
    /// mode fails verification and is purged.
    Get {
        key: String,
        #[arg(long)]
        plain: bool,
        #[arg(long)]
        session: bool,
    },

    /// Delete a stored value
    Remove {
        key: String,
        #[arg(long)]
        session: bool,
    },

    /// List stored keys
    Keys {
        /// Only keys starting with this prefix
        #[arg(long, short = 'p')]
        prefix: Option<String>,
        #[arg(long)]
        session: bool,
    },

    /// Delete every stored value, or those under a prefix
    Clear {
        #[arg(long, short = 'p')]
        prefix: Option<String>,
        #[arg(long)]
        session: bool,
    },

    /// Show recent security events
    Audit {
        /// Maximum entries to show
        #[arg(long, default_value_t = 20)]
        limit: u32,
        /// Only events about this subject
        #[arg(long)]
        subject: Option<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (defaults merged with the config file)
    Show,
    /// Write the default configuration to the config path
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn parse_category(name: &str) -> std::result::Result<ContentCategory, String> {
    ContentCategory::from_name(name)
        .ok_or_else(|| format!("unknown category '{name}' (expected image, document, audio, or video)"))
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(code) => code,
        Err(e) => {
            report_error(&e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let data_dir = data_dir::data_dir(cli.data_dir.as_deref())?;
    let config_path = cli.config.unwrap_or_else(|| data_dir.join("config.json"));
    let config = SecurityConfig::load(&config_path)
        .with_context(|| format!("loading config: {}", config_path.display()))?;

    // Config commands never touch the databases.
    if let Commands::Config { action } = &cli.command {
        return match action {
            ConfigAction::Show => cmd_config_show(&config, &config_path),
            ConfigAction::Init { force } => cmd_config_init(&config_path, *force),
        };
    }

    let services = Services::init(config, &data_dir)?;
    tracing::debug!(data_dir = %services.data_dir.display(), "services ready");

    match cli.command {
        Commands::Validate { path, mime, category, name } => {
            cmd_validate(&services, &path, &mime, category, name)
        }
        Commands::Limit { key, max, window_ms, status, reset } => {
            cmd_limit(&services, &key, max, window_ms, status, reset)
        }
        Commands::Put { key, json, ttl_ms, plain, session } => {
            cmd_put(&services, &key, &json, ttl_ms, plain, session)
        }
        Commands::Get { key, plain, session } => cmd_get(&services, &key, plain, session),
        Commands::Remove { key, session } => {
            services.store.remove_item(&key, scope(session))?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Keys { prefix, session } => {
            for key in services.store.keys(scope(session), prefix.as_deref())? {
                println!("{key}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Clear { prefix, session } => {
            let removed = services.store.clear(scope(session), prefix.as_deref())?;
            println!("removed {removed} entries");
            Ok(ExitCode::SUCCESS)
        }
        Commands::Audit { limit, subject } => cmd_audit(&services, limit, subject.as_deref()),
        Commands::Config { .. } => Ok(ExitCode::SUCCESS),
    }
}

/// Print a friendly message for store errors, the full chain otherwise.
fn report_error(e: &anyhow::Error) {
    match e.downcast_ref::<SafeholdError>() {
        Some(err) => {
            let human = humanize_error(err);
            eprintln!("error: {}", human.message);
            eprintln!("  {}", human.suggestion);
            tracing::debug!(error = %format!("{e:#}"), "command failed");
        }
        None => eprintln!("error: {e:#}"),
    }
}

fn scope(session: bool) -> StorageScope {
    if session {
        StorageScope::Session
    } else {
        StorageScope::Persistent
    }
}

fn mode(services: &Services, plain: bool) -> StorageMode {
    if plain {
        StorageMode::PlainIntegrityChecked
    } else {
        services.config.default_mode
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ── Commands ──────────────────────────────────────────────────────────────────

/// Preset implied by a MIME type's major part; anything unrecognised is
/// treated as a document.
fn infer_category(mime: &str) -> ContentCategory {
    let major = mime.split('/').next().unwrap_or_default().trim();
    match major.to_ascii_lowercase().as_str() {
        "image" => ContentCategory::Image,
        "audio" => ContentCategory::Audio,
        "video" => ContentCategory::Video,
        _ => ContentCategory::Document,
    }
}

fn cmd_validate(
    services: &Services,
    path: &Path,
    mime: &str,
    category: Option<ContentCategory>,
    name: Option<String>,
) -> Result<ExitCode> {
    let mut upload = DiskUpload::open(path, mime)
        .with_context(|| format!("opening upload: {}", path.display()))?;
    if let Some(name) = name {
        upload = upload.with_name(name);
    }

    let category = category.unwrap_or_else(|| infer_category(mime));
    let result = validate_category(&upload, category, &services.config.upload);
    print_json(&result)?;

    if let Some(failure) = result.failure {
        let human = humanize_validation(failure);
        eprintln!("{}  {}", human.message, human.suggestion);
        let details = rejection_details(&upload, category, &result);
        if let Err(e) = services.audit.record(
            SecurityEvent::UploadRejected,
            &result.sanitized_filename,
            Some(&details),
        ) {
            tracing::error!(error = %e, "failed to record upload rejection");
        }
        return Ok(ExitCode::from(EXIT_DENIED));
    }
    Ok(ExitCode::SUCCESS)
}

/// Audit detail for a rejected upload: the reason, plus a content hash that
/// identifies the file.  Oversized files are not hashed.
fn rejection_details(upload: &DiskUpload, category: ContentCategory, result: &ValidationResult) -> String {
    let mut details = format!("{category}: {}", result.error.as_deref().unwrap_or_default());
    if result.failure == Some(ValidationFailure::TooLarge) {
        return details;
    }
    match File::open(upload.path()).and_then(hash_reader) {
        Ok(digest) => details.push_str(&format!(" sha256={digest}")),
        Err(e) => tracing::warn!(error = %e, "could not hash rejected upload"),
    }
    details
}

fn cmd_limit(
    services: &Services,
    key: &str,
    max: u32,
    window_ms: u64,
    status: bool,
    reset: bool,
) -> Result<ExitCode> {
    let window = Duration::from_millis(window_ms);

    if reset {
        services.limiter.reset(key)?;
        println!("reset {key}");
        return Ok(ExitCode::SUCCESS);
    }

    if status {
        let status = services.limiter.status(key, max, window)?;
        print_json(&json!({
            "remaining": status.remaining,
            "retry_after_ms": status.retry_after.map(|d| d.as_millis() as u64),
        }))?;
        return Ok(ExitCode::SUCCESS);
    }

    let decision = services.limiter.check_client_rate_limit(key, max, window_ms);
    print_json(&json!({
        "allowed": decision.allowed,
        "retry_after_ms": decision.retry_after.map(|d| d.as_millis() as u64),
    }))?;
    Ok(if decision.allowed {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_DENIED)
    })
}

fn cmd_put(
    services: &Services,
    key: &str,
    raw: &str,
    ttl_ms: Option<u64>,
    plain: bool,
    session: bool,
) -> Result<ExitCode> {
    let value: Value = serde_json::from_str(raw).context("value is not valid JSON")?;
    let mut options = PutOptions::default()
        .mode(mode(services, plain))
        .scope(scope(session));
    if let Some(ms) = ttl_ms {
        options = options.ttl(Duration::from_millis(ms));
    }
    services.store.set_item(key, &value, options)?;
    Ok(ExitCode::SUCCESS)
}

fn cmd_get(services: &Services, key: &str, plain: bool, session: bool) -> Result<ExitCode> {
    let options = GetOptions::default()
        .mode(mode(services, plain))
        .scope(scope(session));
    match services.store.get_item::<Value>(key, options)? {
        Some(value) => {
            print_json(&value)?;
            Ok(ExitCode::SUCCESS)
        }
        None => {
            eprintln!("{key}: not found");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn cmd_audit(services: &Services, limit: u32, subject: Option<&str>) -> Result<ExitCode> {
    let mut entries = match subject {
        Some(subject) => services.audit.entries_for_subject(subject)?,
        None => services.audit.recent_entries(limit)?,
    };
    // Subject queries come back oldest first; keep the newest.
    let keep = limit as usize;
    if subject.is_some() && entries.len() > keep {
        entries.drain(..entries.len() - keep);
    }
    entries.truncate(keep);
    if subject.is_none() {
        println!("# {} of {} events", entries.len(), services.audit.count()?);
    }
    for entry in entries {
        println!(
            "{}  {:<22} {}{}",
            entry.timestamp,
            entry.event,
            entry.subject,
            entry.details.map(|d| format!("  ({d})")).unwrap_or_default()
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_config_show(config: &SecurityConfig, path: &Path) -> Result<ExitCode> {
    println!("# config: {}", path.display());
    print_json(config)?;
    Ok(ExitCode::SUCCESS)
}

fn cmd_config_init(path: &Path, force: bool) -> Result<ExitCode> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    SecurityConfig::default().save(path)?;
    println!("wrote {}", path.display());
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn category_is_inferred_from_mime() {
        assert_eq!(infer_category("image/png"), ContentCategory::Image);
        assert_eq!(infer_category("Audio/mpeg"), ContentCategory::Audio);
        assert_eq!(infer_category("video/mp4"), ContentCategory::Video);
        assert_eq!(infer_category("application/pdf"), ContentCategory::Document);
        assert_eq!(infer_category(""), ContentCategory::Document);
    }

    #[test]
    fn category_flag_parses() {
        let cli = Cli::try_parse_from([
            "safehold", "validate", "a.png", "--type", "image/png", "--category", "IMAGE",
        ])
        .unwrap();
        match cli.command {
            Commands::Validate { category, .. } => assert_eq!(category, Some(ContentCategory::Image)),
            other => panic!("unexpected command {other:?}"),
        }
        assert!(
            Cli::try_parse_from(["safehold", "validate", "a", "--type", "x/y", "--category", "exe"])
                .is_err()
        );
    }

    fn limits(max_bytes: u64) -> safehold_core::UploadLimits {
        safehold_core::UploadLimits {
            max_image_bytes: max_bytes,
            ..Default::default()
        }
    }

    #[test]
    fn rejected_upload_is_identified_by_streamed_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png");
        std::fs::write(&path, b"GIF89a not a png").unwrap();

        let upload = DiskUpload::open(&path, "image/png").unwrap();
        let result = validate_category(&upload, ContentCategory::Image, &limits(1024));
        assert_eq!(result.failure, Some(ValidationFailure::SignatureMismatch));

        let details = rejection_details(&upload, ContentCategory::Image, &result);
        let expected = hash_reader(&b"GIF89a not a png"[..]).unwrap();
        assert!(details.ends_with(&format!(" sha256={expected}")), "{details}");
    }

    #[test]
    fn oversized_upload_is_not_hashed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png");
        std::fs::write(&path, vec![0u8; 4096]).unwrap();

        let upload = DiskUpload::open(&path, "image/png").unwrap();
        let result = validate_category(&upload, ContentCategory::Image, &limits(1024));
        assert_eq!(result.failure, Some(ValidationFailure::TooLarge));

        // Deleting the file proves nothing reads it after the size check.
        std::fs::remove_file(&path).unwrap();
        let details = rejection_details(&upload, ContentCategory::Image, &result);
        assert!(!details.contains("sha256="), "{details}");
        assert!(details.starts_with("image: "), "{details}");
    }

    #[test]
    fn audit_listing_runs_against_a_fresh_data_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let services = Services::init(SecurityConfig::default(), tmp.path()).unwrap();
        services
            .audit
            .record(SecurityEvent::RateLimited, "login", None)
            .unwrap();

        assert_eq!(cmd_audit(&services, 10, None).unwrap(), ExitCode::SUCCESS);
        assert_eq!(cmd_audit(&services, 10, Some("login")).unwrap(), ExitCode::SUCCESS);
        assert_eq!(services.audit.count().unwrap(), 1);
    }
}
