//! Credential handling for the CDS API.
//!
//! Credentials live in the per-user `~/.cdsapirc` file, two lines:
//!
//! ```text
//! url: https://cds.climate.copernicus.eu/api/v2
//! key: 153228:b5e40948-b398-41c2-9a8a-e9c003f4410f
//! ```
//!
//! where the key line joins the six-digit UID and the API key (a UUID, v1 or
//! v4) from the Copernicus user page with a colon.
//!
//! How credentials are obtained is always the caller's choice: a
//! [`CredentialProvider`] is injected into [`crate::AdClimaConfig`], and the
//! interactive variant only ever prompts when explicitly selected. Retrieval
//! code never asks the terminal for anything on its own.

use crate::cds::error::CredentialError;
use log::info;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Root of the CDS API v2.
pub const DEFAULT_API_URL: &str = "https://cds.climate.copernicus.eu/api/v2";

const CDSAPIRC_FILE_NAME: &str = ".cdsapirc";

/// A resolved set of CDS credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdsCredentials {
    /// API root URL.
    pub url: String,
    /// Six-digit Copernicus UID.
    pub uid: String,
    /// API key (UUID) from the Copernicus user page.
    pub key: String,
}

impl CdsCredentials {
    /// Validates and wraps an explicit UID/key pair, using the default API URL.
    pub fn new(uid: &str, key: &str) -> Result<Self, CredentialError> {
        validate(uid, key)?;
        Ok(Self {
            url: DEFAULT_API_URL.to_string(),
            uid: uid.to_string(),
            key: key.to_string(),
        })
    }

    /// The colon-joined `UID:API-key` form used by the credentials file and
    /// HTTP basic auth.
    pub fn api_key(&self) -> String {
        format!("{}:{}", self.uid, self.key)
    }

    /// Default credentials file location, `~/.cdsapirc`.
    pub fn default_path() -> Result<PathBuf, CredentialError> {
        dirs::home_dir()
            .map(|home| home.join(CDSAPIRC_FILE_NAME))
            .ok_or(CredentialError::HomeDirResolution)
    }

    /// Parses a `.cdsapirc` file.
    pub fn from_file(path: &Path) -> Result<Self, CredentialError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CredentialError::FileRead(path.to_path_buf(), e))?;

        let mut url = None;
        let mut key_line = None;
        for line in contents.lines() {
            if let Some(value) = line.strip_prefix("url:") {
                url = Some(value.trim().to_string());
            } else if let Some(value) = line.strip_prefix("key:") {
                key_line = Some(value.trim().to_string());
            }
        }
        let url = url.ok_or(CredentialError::MissingField(path.to_path_buf(), "url"))?;
        let key_line = key_line.ok_or(CredentialError::MissingField(path.to_path_buf(), "key"))?;
        let (uid, key) = key_line
            .split_once(':')
            .ok_or_else(|| CredentialError::MalformedKey(path.to_path_buf()))?;

        Ok(Self {
            url,
            uid: uid.to_string(),
            key: key.to_string(),
        })
    }

    /// Writes the credentials in the `.cdsapirc` format.
    pub fn write_to_file(&self, path: &Path) -> Result<(), CredentialError> {
        let contents = format!("url: {}\nkey: {}\n", self.url, self.api_key());
        std::fs::write(path, contents)
            .map_err(|e| CredentialError::FileWrite(path.to_path_buf(), e))?;
        info!("Credentials stored at {}", path.display());
        Ok(())
    }
}

fn validate(uid: &str, key: &str) -> Result<(), CredentialError> {
    if uid.len() != 6 || !uid.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CredentialError::InvalidUid(uid.to_string()));
    }
    let parsed = Uuid::parse_str(key).map_err(CredentialError::InvalidKey)?;
    match parsed.get_version_num() {
        1 | 4 => Ok(()),
        version => Err(CredentialError::UnsupportedKeyVersion(version)),
    }
}

/// How [`crate::AdClima`] obtains its CDS credentials.
#[derive(Debug, Clone, Default)]
pub enum CredentialProvider {
    /// Read `~/.cdsapirc`.
    #[default]
    FromFile,
    /// Read a specific credentials file.
    FromPath(PathBuf),
    /// Use the given UID and API key, persisting them to `~/.cdsapirc` so the
    /// next run can use [`CredentialProvider::FromFile`].
    Explicit { uid: String, key: String },
    /// Prompt for the UID and key on the terminal, then persist them.
    ///
    /// Blocks on stdin; only pick this for interactive tools.
    Interactive,
}

impl CredentialProvider {
    /// Resolves the provider into concrete credentials.
    pub fn resolve(&self) -> Result<CdsCredentials, CredentialError> {
        match self {
            CredentialProvider::FromFile => {
                CdsCredentials::from_file(&CdsCredentials::default_path()?)
            }
            CredentialProvider::FromPath(path) => CdsCredentials::from_file(path),
            CredentialProvider::Explicit { uid, key } => {
                let credentials = CdsCredentials::new(uid, key)?;
                credentials.write_to_file(&CdsCredentials::default_path()?)?;
                Ok(credentials)
            }
            CredentialProvider::Interactive => {
                let stdin = std::io::stdin();
                let mut lines = stdin.lock();
                let uid = prompt(&mut lines, "Insert UID: ")?;
                let key = prompt(&mut lines, "Insert API Key: ")?;
                let credentials = CdsCredentials::new(&uid, &key)?;
                credentials.write_to_file(&CdsCredentials::default_path()?)?;
                Ok(credentials)
            }
        }
    }
}

fn prompt(input: &mut impl BufRead, message: &str) -> Result<String, CredentialError> {
    print!("{message}");
    std::io::stdout().flush().map_err(CredentialError::Prompt)?;
    let mut answer = String::new();
    input.read_line(&mut answer).map_err(CredentialError::Prompt)?;
    Ok(answer.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const UID: &str = "153228";
    const KEY: &str = "b5e40948-b398-41c2-9a8a-e9c003f4410f";

    #[test]
    fn accepts_valid_credentials() {
        let credentials = CdsCredentials::new(UID, KEY).unwrap();
        assert_eq!(credentials.url, DEFAULT_API_URL);
        assert_eq!(credentials.api_key(), format!("{UID}:{KEY}"));
    }

    #[test]
    fn rejects_bad_uid() {
        assert!(matches!(
            CdsCredentials::new("12345", KEY),
            Err(CredentialError::InvalidUid(_))
        ));
        assert!(matches!(
            CdsCredentials::new("12345a", KEY),
            Err(CredentialError::InvalidUid(_))
        ));
    }

    #[test]
    fn rejects_bad_key() {
        assert!(matches!(
            CdsCredentials::new(UID, "not-a-uuid"),
            Err(CredentialError::InvalidKey(_))
        ));
        // UUID v3 keys are not issued by the CDS.
        assert!(matches!(
            CdsCredentials::new(UID, "a3bb189e-8bf9-3888-9912-ace4e6543002"),
            Err(CredentialError::UnsupportedKeyVersion(3))
        ));
    }

    #[test]
    fn cdsapirc_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".cdsapirc");
        let credentials = CdsCredentials::new(UID, KEY).unwrap();
        credentials.write_to_file(&path).unwrap();

        let read_back = CdsCredentials::from_file(&path).unwrap();
        assert_eq!(read_back, credentials);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            format!("url: {DEFAULT_API_URL}\nkey: {UID}:{KEY}\n")
        );
    }

    #[test]
    fn from_file_reports_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".cdsapirc");
        std::fs::write(&path, "url: https://example.org/api\n").unwrap();
        assert!(matches!(
            CdsCredentials::from_file(&path),
            Err(CredentialError::MissingField(_, "key"))
        ));

        std::fs::write(&path, format!("key: {UID}:{KEY}\n")).unwrap();
        assert!(matches!(
            CdsCredentials::from_file(&path),
            Err(CredentialError::MissingField(_, "url"))
        ));

        std::fs::write(&path, "url: https://example.org/api\nkey: nocolon\n").unwrap();
        assert!(matches!(
            CdsCredentials::from_file(&path),
            Err(CredentialError::MalformedKey(_))
        ));
    }

    #[test]
    fn provider_from_path_resolves() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cdsapirc");
        CdsCredentials::new(UID, KEY)
            .unwrap()
            .write_to_file(&path)
            .unwrap();

        let provider = CredentialProvider::FromPath(path);
        let credentials = provider.resolve().unwrap();
        assert_eq!(credentials.uid, UID);
        assert_eq!(credentials.key, KEY);
    }
}
