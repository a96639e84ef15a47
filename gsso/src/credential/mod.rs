//! Credential cache backed by an INI file with one section per profile.
//!
//! The file is not locked and is rewritten in place. Two invocations that load and save the
//! same cache concurrently race, and the last writer wins.

use chrono::{DateTime, SecondsFormat, Utc};
use ini::Ini;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::common::{AuthError, AuthResult, TemporaryCredential};

pub const KEY_ACCESS_KEY_ID: &str = "aws_access_key_id";
pub const KEY_SECRET_ACCESS_KEY: &str = "aws_secret_access_key";
pub const KEY_SESSION_TOKEN: &str = "aws_session_token";
pub const KEY_SESSION_EXPIRATION: &str = "aws_session_expiration";

/// `Version` field of the credential_process envelope
const ENVELOPE_VERSION: u8 = 1;

/// JSON shape expected by `credential_process` consumers
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Envelope<'a> {
    access_key_id: &'a str,
    expiration: String,
    secret_access_key: &'a str,
    session_token: &'a str,
    version: u8,
}

/// Loads, validates and persists the credential of a single profile
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
    credential: TemporaryCredential,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            credential: TemporaryCredential::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn credential(&self) -> &TemporaryCredential {
        &self.credential
    }

    /// Replace the in-memory credential, typically with one fresh from STS
    pub fn set_credential(&mut self, credential: TemporaryCredential) {
        self.credential = credential;
    }

    /// Read the profile's section into memory.
    ///
    /// A missing cache file is created empty and yields an empty, expired credential. A missing
    /// expiration key is not an error either; the credential just stays incomplete.
    pub fn load(&mut self, profile: &str) -> AuthResult<()> {
        self.credential = TemporaryCredential::empty(profile);

        if !self.exists()? {
            self.create_empty()?;
            info!("Created credential cache at {}", self.path.display());
            return Ok(());
        }

        let ini = Ini::load_from_file(&self.path).map_err(|e| AuthError::cache_io(&self.path, e))?;
        let section = ini
            .section(Some(profile))
            .ok_or_else(|| AuthError::section_not_found(profile))?;

        let value = |key: &str| section.get(key).unwrap_or_default().to_string();
        self.credential.access_key_id = value(KEY_ACCESS_KEY_ID);
        self.credential.secret_access_key = value(KEY_SECRET_ACCESS_KEY);
        self.credential.session_token = value(KEY_SESSION_TOKEN);

        if let Some(raw) = section.get(KEY_SESSION_EXPIRATION).filter(|v| !v.is_empty()) {
            self.credential.expiration = Some(parse_expiration(raw)?);
        }

        debug!(
            "Loaded cached credential for profile {} (expiration: {:?})",
            profile, self.credential.expiration
        );
        Ok(())
    }

    pub fn is_expired(&self) -> bool {
        self.credential.is_expired()
    }

    /// Replace the profile's section with the in-memory credential and rewrite the file
    pub fn save(&self) -> AuthResult<()> {
        let expiration = self.credential.validate()?;
        let profile = self.credential.profile.as_str();

        let mut ini = if self.exists()? {
            Ini::load_from_file(&self.path).map_err(|e| AuthError::cache_io(&self.path, e))?
        } else {
            Ini::new()
        };

        ini.delete(Some(profile));
        ini.with_section(Some(profile))
            .set(KEY_ACCESS_KEY_ID, self.credential.access_key_id.as_str())
            .set(KEY_SECRET_ACCESS_KEY, self.credential.secret_access_key.as_str())
            .set(KEY_SESSION_TOKEN, self.credential.session_token.as_str())
            .set(KEY_SESSION_EXPIRATION, format_expiration(&expiration));

        self.ensure_parent()?;
        let mut file = open_private(&self.path).map_err(|e| AuthError::cache_io(&self.path, e))?;
        ini.write_to(&mut file)
            .map_err(|e| AuthError::cache_io(&self.path, e))?;

        info!("Saved credential for profile {}", profile);
        Ok(())
    }

    /// Render the credential_process JSON envelope
    pub fn output(&self) -> AuthResult<String> {
        let expiration = self.credential.validate()?;

        let envelope = Envelope {
            access_key_id: &self.credential.access_key_id,
            expiration: format_expiration(&expiration),
            secret_access_key: &self.credential.secret_access_key,
            session_token: &self.credential.session_token,
            version: ENVELOPE_VERSION,
        };

        Ok(serde_json::to_string_pretty(&envelope)?)
    }

    fn exists(&self) -> AuthResult<bool> {
        match fs::metadata(&self.path) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AuthError::cache_io(&self.path, e)),
        }
    }

    fn ensure_parent(&self) -> AuthResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| AuthError::cache_io(parent, e))?;
        }
        Ok(())
    }

    fn create_empty(&self) -> AuthResult<()> {
        self.ensure_parent()?;
        open_private(&self.path).map_err(|e| AuthError::cache_io(&self.path, e))?;
        Ok(())
    }
}

/// Open the cache for rewriting; a newly created file is readable by its owner only
fn open_private(path: &Path) -> io::Result<fs::File> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

/// RFC 3339 with whole seconds and a `Z` suffix
pub fn format_expiration(expiration: &DateTime<Utc>) -> String {
    expiration.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn parse_expiration(raw: &str) -> AuthResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AuthError::parse(raw, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    fn cache_path(dir: &TempDir) -> PathBuf {
        dir.path().join("gsso").join("credentials")
    }

    fn credential(profile: &str, expiration: DateTime<Utc>) -> TemporaryCredential {
        TemporaryCredential {
            access_key_id: "AKIA...".to_string(),
            secret_access_key: "secret".to_string(),
            session_token: "token".to_string(),
            expiration: Some(expiration),
            profile: profile.to_string(),
        }
    }

    #[test]
    fn test_load_creates_missing_cache() {
        let dir = TempDir::new().unwrap();
        let path = cache_path(&dir);
        let mut store = CredentialStore::new(&path);

        store.load("dev").unwrap();

        assert!(path.exists());
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
        assert_eq!(store.credential(), &TemporaryCredential::empty("dev"));
        assert!(store.is_expired());
    }

    #[test]
    fn test_load_missing_section() {
        let dir = TempDir::new().unwrap();
        let path = cache_path(&dir);
        let mut store = CredentialStore::new(&path);
        store.load("dev").unwrap();

        let err = store.load("prod").unwrap_err();
        assert!(matches!(err, AuthError::SectionNotFound { ref profile } if profile == "prod"));
    }

    #[test]
    fn test_load_malformed_expiration() {
        let dir = TempDir::new().unwrap();
        let path = cache_path(&dir);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            &path,
            "[dev]\naws_access_key_id = AKIA\naws_secret_access_key = s\naws_session_token = t\naws_session_expiration = yesterday\n",
        )
        .unwrap();

        let mut store = CredentialStore::new(&path);
        let err = store.load("dev").unwrap_err();
        assert!(matches!(err, AuthError::Parse { ref value, .. } if value == "yesterday"));
    }

    #[test]
    fn test_load_without_expiration_is_incomplete() {
        let dir = TempDir::new().unwrap();
        let path = cache_path(&dir);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            &path,
            "[dev]\naws_access_key_id = AKIA\naws_secret_access_key = s\naws_session_token = t\n",
        )
        .unwrap();

        let mut store = CredentialStore::new(&path);
        store.load("dev").unwrap();

        assert_eq!(store.credential().access_key_id, "AKIA");
        assert_eq!(store.credential().expiration, None);
        assert!(store.is_expired());
        assert!(matches!(
            store.output().unwrap_err(),
            AuthError::Validation {
                field: "expiration"
            }
        ));
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = cache_path(&dir);
        let expiration = Utc.with_ymd_and_hms(2031, 5, 17, 8, 30, 45).unwrap();

        let mut writer = CredentialStore::new(&path);
        writer.set_credential(credential("dev", expiration));
        writer.save().unwrap();

        let mut reader = CredentialStore::new(&path);
        reader.load("dev").unwrap();

        assert_eq!(reader.credential(), &credential("dev", expiration));
        assert!(!reader.is_expired());
    }

    #[test]
    fn test_save_replaces_section_and_keeps_others() {
        let dir = TempDir::new().unwrap();
        let path = cache_path(&dir);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            &path,
            "[dev]\naws_access_key_id = OLD\nstale_key = leftover\n\n[prod]\naws_access_key_id = PROD\n",
        )
        .unwrap();

        let mut store = CredentialStore::new(&path);
        store.set_credential(credential("dev", Utc::now() + Duration::hours(1)));
        store.save().unwrap();

        let ini = Ini::load_from_file(&path).unwrap();
        let dev = ini.section(Some("dev")).unwrap();
        assert_eq!(dev.get(KEY_ACCESS_KEY_ID), Some("AKIA..."));
        assert_eq!(dev.get("stale_key"), None);
        assert_eq!(
            ini.section(Some("prod")).unwrap().get(KEY_ACCESS_KEY_ID),
            Some("PROD")
        );
    }

    #[test]
    fn test_save_and_output_require_complete_credential() {
        let dir = TempDir::new().unwrap();
        let path = cache_path(&dir);
        let complete = credential("dev", Utc::now() + Duration::hours(1));

        let mut missing_key = complete.clone();
        missing_key.access_key_id.clear();
        let mut missing_secret = complete.clone();
        missing_secret.secret_access_key.clear();
        let mut missing_token = complete.clone();
        missing_token.session_token.clear();
        let mut missing_expiration = complete;
        missing_expiration.expiration = None;

        for (incomplete, missing) in [
            (missing_key, "access key id"),
            (missing_secret, "secret access key"),
            (missing_token, "session token"),
            (missing_expiration, "expiration"),
        ] {
            let mut store = CredentialStore::new(&path);
            store.set_credential(incomplete);

            assert!(matches!(
                store.save().unwrap_err(),
                AuthError::Validation { field } if field == missing
            ));
            assert!(matches!(
                store.output().unwrap_err(),
                AuthError::Validation { field } if field == missing
            ));
        }
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_cache_is_private_to_owner() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let created = cache_path(&dir);
        CredentialStore::new(&created).load("dev").unwrap();

        let saved = dir.path().join("saved").join("credentials");
        let mut store = CredentialStore::new(&saved);
        store.set_credential(credential("dev", Utc::now() + Duration::hours(1)));
        store.save().unwrap();

        for path in [created, saved] {
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600, "{}", path.display());
        }
    }

    #[test]
    fn test_output_envelope_shape() {
        let mut store = CredentialStore::new("unused");
        store.set_credential(credential(
            "dev",
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        ));

        let expected = r#"{
  "AccessKeyId": "AKIA...",
  "Expiration": "2024-01-01T00:00:00Z",
  "SecretAccessKey": "secret",
  "SessionToken": "token",
  "Version": 1
}"#;
        assert_eq!(store.output().unwrap(), expected);
    }

    #[test]
    fn test_parse_expiration_normalizes_offsets() {
        let parsed = parse_expiration("2024-01-01T09:00:00+09:00").unwrap();
        assert_eq!(format_expiration(&parsed), "2024-01-01T00:00:00Z");
    }

    // No locking: interleaved load/save on one file keeps whichever save ran last.
    #[test]
    fn test_concurrent_writers_last_one_wins() {
        let dir = TempDir::new().unwrap();
        let path = cache_path(&dir);
        let expiration = Utc.with_ymd_and_hms(2031, 1, 1, 0, 0, 0).unwrap();

        let mut seed = CredentialStore::new(&path);
        seed.set_credential(credential("dev", expiration));
        seed.save().unwrap();

        let mut first = CredentialStore::new(&path);
        let mut second = CredentialStore::new(&path);
        first.load("dev").unwrap();
        second.load("dev").unwrap();

        let mut first_credential = credential("dev", expiration);
        first_credential.access_key_id = "FIRST".to_string();
        let mut second_credential = credential("dev", expiration);
        second_credential.access_key_id = "SECOND".to_string();

        first.set_credential(first_credential);
        second.set_credential(second_credential);
        first.save().unwrap();
        second.save().unwrap();

        let mut reader = CredentialStore::new(&path);
        reader.load("dev").unwrap();
        assert_eq!(reader.credential().access_key_id, "SECOND");
    }
}
