// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service layer: opens the stores and logs under the data directory and
// hands them to the command handlers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use safehold_bridge::platform_surfaces;
use safehold_core::SecurityConfig;
use safehold_security::{AuditLog, EnvironmentFingerprint, RateLimiter, SecureStore};

const STORE_DB: &str = "store.db";
const AUDIT_DB: &str = "audit.db";

/// Everything a command needs, opened once per invocation.
pub struct Services {
    pub config: SecurityConfig,
    pub store: Arc<SecureStore>,
    pub limiter: RateLimiter,
    pub audit: Arc<AuditLog>,
    pub data_dir: PathBuf,
}

impl Services {
    /// Open the persistent store and audit log under `data_dir`.
    ///
    /// The audit log falls back to an in-memory database when the file
    /// cannot be opened, so a read-only data directory does not stop
    /// validation from working.
    pub fn init(config: SecurityConfig, data_dir: &Path) -> Result<Self> {
        info!(path = %data_dir.display(), "initialising services");

        let audit = match AuditLog::open(data_dir.join(AUDIT_DB)) {
            Ok(log) => log,
            Err(e) => {
                warn!(error = %e, "audit log unavailable; using in-memory fallback");
                AuditLog::open_in_memory().context("opening in-memory audit log")?
            }
        };
        let audit = Arc::new(audit);

        let surfaces = platform_surfaces(&data_dir.join(STORE_DB), config.session_quota_bytes);
        let fingerprint = EnvironmentFingerprint::from_process_env(config.fingerprint_salt.clone());
        let store = Arc::new(
            SecureStore::new(surfaces, fingerprint, &config).with_audit(Arc::clone(&audit)),
        );
        let limiter = RateLimiter::new(Arc::clone(&store), config.rate_limit_failure_policy);

        Ok(Self {
            config,
            store,
            limiter,
            audit,
            data_dir: data_dir.to_path_buf(),
        })
    }
}
