//! OCSP response store
//!
//! Responses are looked up by CertID. The filesystem store keeps one
//! pre-signed DER response per certificate at
//! `base_dir/hashAlgorithm/issuerNameHash/issuerKeyHash/serialNumber`.

use async_trait::async_trait;
use pkix_proto::ocsp::CertId;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum StoreError {
    /// The store itself is unusable
    #[error("store configuration error: {0}")]
    Config(String),

    /// No response for the requested certificate
    #[error("response not found: {0}")]
    NotFound(String),

    /// The response exists but could not be read
    #[error("store IO error: {0}")]
    Io(#[from] io::Error),
}

impl StoreError {
    pub fn code(&self) -> u8 {
        match self {
            StoreError::Config(_) | StoreError::Io(_) => 1,
            StoreError::NotFound(_) => 2,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::Config(_) => "StoreConfig",
            StoreError::NotFound(_) => "StoreNotFound",
            StoreError::Io(_) => "StoreIo",
        }
    }
}

/// Source of pre-signed OCSP responses
#[async_trait]
pub trait Store: Send + Sync {
    /// DER response for `cert_id`
    async fn get_response(&self, cert_id: &CertId) -> Result<Vec<u8>, StoreError>;
}

/// Directory tree of DER responses
#[derive(Debug, Clone)]
pub struct FsStore {
    base_dir: PathBuf,
}

impl FsStore {
    /// Fails with [`StoreError::Config`] unless `base_dir` is a directory
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let base_dir = base_dir.into();
        if !base_dir.is_dir() {
            return Err(StoreError::Config(format!(
                "Directory {} does not exist",
                base_dir.display()
            )));
        }
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Location of the response for `cert_id`
    pub fn path_for(&self, cert_id: &CertId) -> Result<PathBuf, StoreError> {
        let components = [
            cert_id.hash_algorithm.as_str(),
            cert_id.issuer_name_hash.as_str(),
            cert_id.issuer_key_hash.as_str(),
            cert_id.serial_number.as_str(),
        ];

        let mut path = self.base_dir.clone();
        for component in components {
            // Components come from a parsed request: OIDs and hex only
            if component.is_empty()
                || !component.chars().all(|c| c.is_ascii_hexdigit() || c == '.')
                || component.starts_with('.')
            {
                return Err(StoreError::NotFound(format!(
                    "invalid CertID component {:?}",
                    component
                )));
            }
            path.push(component);
        }
        Ok(path)
    }
}

#[async_trait]
impl Store for FsStore {
    async fn get_response(&self, cert_id: &CertId) -> Result<Vec<u8>, StoreError> {
        let path = self.path_for(cert_id)?;
        debug!(path = %path.display(), "Looking up stored response");

        match tokio::fs::read(&path).await {
            Ok(data) if data.is_empty() => Err(StoreError::NotFound(format!(
                "{} is empty",
                path.display()
            ))),
            Ok(data) => Ok(data),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(path.display().to_string()))
            }
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}
