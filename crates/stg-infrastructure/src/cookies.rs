//! Cookie profile store.
//!
//! Profiles are declared in a YAML registry and backed by JSON cookie files
//! under the data directory. Reads go through a TTL cache; loads for the
//! same profile coalesce to a single disk read. Files must be owned by the
//! process user with mode exactly `0600` or `0400`, and must resolve inside
//! the data directory.

use std::collections::HashMap;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use moka::future::Cache;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use stg_domain::error::{Error, Result};
use stg_domain::ports::{CookieProfile, CookieProfileInfo, CookieProfileSource};

/// The YAML registry: `{version, sessions: {<name>: {...}}}`.
#[derive(Debug, Deserialize)]
struct SessionsFile {
    #[allow(dead_code)]
    #[serde(default)]
    version: u32,
    #[serde(default)]
    sessions: HashMap<String, SessionDecl>,
}

#[derive(Debug, Clone, Deserialize)]
struct SessionDecl {
    #[serde(default)]
    description: Option<String>,
    /// Path relative to the data directory
    cookie_file: PathBuf,
    /// Seconds the loaded profile stays fresh
    cache_ttl: u64,
    #[serde(default)]
    metadata: HashMap<String, Value>,
}

struct CachedProfile {
    profile: CookieProfile,
    loaded_at: Instant,
    ttl: Duration,
}

impl CachedProfile {
    fn is_fresh(&self) -> bool {
        self.loaded_at.elapsed() < self.ttl
    }
}

/// TTL-cached loader for per-profile cookie files.
pub struct CookieProfileStore {
    registry_path: PathBuf,
    data_dir: PathBuf,
    cache: Cache<String, Arc<CachedProfile>>,
    /// Per-profile load locks so concurrent misses coalesce
    loads: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl CookieProfileStore {
    #[must_use]
    pub fn new(registry_path: PathBuf, data_dir: PathBuf) -> Self {
        Self {
            registry_path,
            data_dir,
            cache: Cache::builder().build(),
            loads: Mutex::new(HashMap::new()),
        }
    }

    /// Re-read the declared profile set from the registry file.
    fn read_registry(&self) -> Result<SessionsFile> {
        let content = std::fs::read_to_string(&self.registry_path).map_err(|e| {
            Error::config_with_source(
                format!(
                    "cannot read cookie session registry {}",
                    self.registry_path.display()
                ),
                e,
            )
        })?;
        serde_yaml::from_str(&content).map_err(|e| {
            Error::parse_with_source(
                format!(
                    "malformed cookie session registry {}",
                    self.registry_path.display()
                ),
                e,
            )
        })
    }

    fn declaration(&self, name: &str) -> Result<SessionDecl> {
        let registry = self.read_registry()?;
        registry
            .sessions
            .get(name)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("cookie profile '{name}'")))
    }

    /// Resolve and canonicalise the cookie file, rejecting escapes.
    fn resolve_path(&self, decl: &SessionDecl) -> Result<PathBuf> {
        let joined = self.data_dir.join(&decl.cookie_file);
        let canonical = joined.canonicalize().map_err(|e| {
            Error::io_with_source(format!("cookie file {} unreadable", joined.display()), e)
        })?;
        let root = self.data_dir.canonicalize().map_err(|e| {
            Error::io_with_source(
                format!("data directory {} unreadable", self.data_dir.display()),
                e,
            )
        })?;
        if !canonical.starts_with(&root) {
            return Err(Error::path_escape(canonical.display().to_string()));
        }
        Ok(canonical)
    }

    /// Mode must be exactly `0600` or `0400` and the owner must match the
    /// process user.
    fn check_permissions(path: &Path) -> Result<()> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            Error::io_with_source(format!("cannot stat {}", path.display()), e)
        })?;
        let mode = metadata.mode() & 0o7777;
        if mode != 0o600 && mode != 0o400 {
            return Err(Error::insecure_permissions(
                path.display().to_string(),
                format!("mode {mode:04o}, expected 0600 or 0400"),
            ));
        }
        let process_uid = nix::unistd::geteuid().as_raw();
        if metadata.uid() != process_uid {
            return Err(Error::insecure_permissions(
                path.display().to_string(),
                format!("owned by uid {}, process runs as {process_uid}", metadata.uid()),
            ));
        }
        Ok(())
    }

    fn load_profile(&self, name: &str, decl: &SessionDecl) -> Result<CookieProfile> {
        let path = self.resolve_path(decl)?;
        Self::check_permissions(&path)?;

        let content = std::fs::read_to_string(&path).map_err(|e| {
            Error::io_with_source(format!("cannot read {}", path.display()), e)
        })?;
        let cookies: HashMap<String, String> = serde_json::from_str(&content).map_err(|e| {
            Error::parse_with_source(
                format!("cookie file {} is not a string map", path.display()),
                e,
            )
        })?;

        debug!(profile = name, path = %path.display(), "cookie profile loaded");
        Ok(CookieProfile {
            name: name.to_owned(),
            cookies,
            last_updated: Utc::now(),
            description: decl.description.clone(),
            metadata: decl.metadata.clone(),
        })
    }

    fn load_lock(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut loads = self.loads.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        Arc::clone(
            loads
                .entry(name.to_owned())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }
}

#[async_trait]
impl CookieProfileSource for CookieProfileStore {
    async fn get(&self, name: &str) -> Result<CookieProfile> {
        let decl = self.declaration(name)?;
        let ttl = Duration::from_secs(decl.cache_ttl);

        if let Some(cached) = self.cache.get(name).await
            && cached.is_fresh()
        {
            return Ok(cached.profile.clone());
        }

        let lock = self.load_lock(name);
        let _guard = lock.lock().await;

        // Another waiter may have refreshed the entry while we queued.
        if let Some(cached) = self.cache.get(name).await
            && cached.is_fresh()
        {
            return Ok(cached.profile.clone());
        }

        let profile = self.load_profile(name, &decl)?;
        self.cache
            .insert(
                name.to_owned(),
                Arc::new(CachedProfile {
                    profile: profile.clone(),
                    loaded_at: Instant::now(),
                    ttl,
                }),
            )
            .await;
        Ok(profile)
    }

    async fn list(&self) -> Result<Vec<CookieProfileInfo>> {
        let registry = self.read_registry()?;
        let mut infos: Vec<CookieProfileInfo> = registry
            .sessions
            .into_iter()
            .map(|(name, decl)| CookieProfileInfo {
                name,
                description: decl.description,
                cache_ttl_secs: decl.cache_ttl,
                metadata: decl.metadata,
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(infos)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    use super::*;

    struct Fixture {
        _dir: tempfile::TempDir,
        store: CookieProfileStore,
        data_dir: PathBuf,
    }

    fn fixture(cookie_file: &str, ttl: u64) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        fs::create_dir_all(&data_dir).unwrap();

        let registry = dir.path().join("cookie_sessions.yaml");
        fs::write(
            &registry,
            format!(
                "version: 1\nsessions:\n  admin:\n    description: admin session\n    cookie_file: {cookie_file}\n    cache_ttl: {ttl}\n"
            ),
        )
        .unwrap();

        let store = CookieProfileStore::new(registry, data_dir.clone());
        Fixture {
            _dir: dir,
            store,
            data_dir,
        }
    }

    fn write_cookie_file(dir: &Path, name: &str, mode: u32) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, r#"{"sid": "aaa", "csrf": "bbb"}"#).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    #[tokio::test]
    async fn loads_a_well_formed_profile_with_0600() {
        let fx = fixture("admin.json", 300);
        write_cookie_file(&fx.data_dir, "admin.json", 0o600);

        let profile = fx.store.get("admin").await.expect("profile");
        assert_eq!(profile.cookies["sid"], "aaa");
        assert_eq!(profile.description.as_deref(), Some("admin session"));
    }

    #[tokio::test]
    async fn mode_0400_is_accepted() {
        let fx = fixture("admin.json", 300);
        write_cookie_file(&fx.data_dir, "admin.json", 0o400);
        assert!(fx.store.get("admin").await.is_ok());
    }

    #[tokio::test]
    async fn group_readable_file_is_rejected() {
        let fx = fixture("admin.json", 300);
        write_cookie_file(&fx.data_dir, "admin.json", 0o644);

        let err = fx.store.get("admin").await.expect_err("must fail");
        assert_eq!(err.kind(), "insecure_permissions");
    }

    #[tokio::test]
    async fn paths_escaping_the_data_dir_are_rejected() {
        let fx = fixture("../outside.json", 300);
        // Write the file one level above the data directory.
        write_cookie_file(fx.data_dir.parent().unwrap(), "outside.json", 0o600);

        let err = fx.store.get("admin").await.expect_err("must fail");
        assert_eq!(err.kind(), "path_escape");
    }

    #[tokio::test]
    async fn malformed_json_is_a_parse_error() {
        let fx = fixture("admin.json", 300);
        let path = fx.data_dir.join("admin.json");
        fs::write(&path, "not json").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();

        let err = fx.store.get("admin").await.expect_err("must fail");
        assert_eq!(err.kind(), "parse_error");
    }

    #[tokio::test]
    async fn unknown_profiles_are_not_found() {
        let fx = fixture("admin.json", 300);
        let err = fx.store.get("nope").await.expect_err("must fail");
        assert_eq!(err.kind(), "not_found");
    }

    #[tokio::test]
    async fn fresh_entries_are_served_from_cache() {
        let fx = fixture("admin.json", 300);
        let path = write_cookie_file(&fx.data_dir, "admin.json", 0o600);

        let first = fx.store.get("admin").await.expect("first load");
        // Rewrite on disk; the cached value must win while fresh.
        fs::write(&path, r#"{"sid": "zzz"}"#).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();

        let second = fx.store.get("admin").await.expect("cached load");
        assert_eq!(first.cookies, second.cookies);
    }

    #[tokio::test]
    async fn zero_ttl_reloads_every_read() {
        let fx = fixture("admin.json", 0);
        let path = write_cookie_file(&fx.data_dir, "admin.json", 0o600);
        fx.store.get("admin").await.expect("first load");

        fs::write(&path, r#"{"sid": "zzz"}"#).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();

        let reloaded = fx.store.get("admin").await.expect("reload");
        assert_eq!(reloaded.cookies["sid"], "zzz");
    }

    #[tokio::test]
    async fn listing_returns_the_declared_set() {
        let fx = fixture("admin.json", 300);
        let infos = fx.store.list().await.expect("list");
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].name, "admin");
        assert_eq!(infos[0].cache_ttl_secs, 300);
    }
}
