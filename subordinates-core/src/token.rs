//! Provisioning token decoding
//!
//! A token is base64 text wrapping a gzip-compressed tar archive. The
//! archive carries exactly one JSON manifest describing the new subordinate
//! and any number of credential files (certificate, key, CA certificate).
//!
//! Decoding is a pure function of the token text: it touches no shared
//! state, and any failure aborts the whole decode.

use base64::Engine;
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;

use crate::error::{SubordinatesError, SubordinatesResult};

/// Credential files keyed by base name
pub type Blobs = BTreeMap<String, Vec<u8>>;

/// Interface classes tried, in order, when picking a reachable address
const ADDRESS_PREFERENCE: [&str; 2] = ["wan", "lan"];

/// Structured description of the device that issued the token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub device_id: String,
    pub port: u16,
    /// Interface class ("lan", "wan", ...) to its IPv4 addresses
    pub ipv4_ips: BTreeMap<String, Vec<String>>,
    /// Fields carried along but not interpreted (name, hostname, ...)
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Manifest {
    /// First WAN address if any, otherwise first LAN address
    pub fn preferred_address(&self) -> Option<&str> {
        ADDRESS_PREFERENCE
            .iter()
            .find_map(|class| self.ipv4_ips.get(*class).and_then(|ips| ips.first()))
            .map(String::as_str)
    }

    fn validate(&self) -> SubordinatesResult<()> {
        if !is_valid_controller_id(&self.device_id) {
            return Err(SubordinatesError::manifest(format!(
                "device_id {:?} is not a valid controller id",
                self.device_id
            )));
        }
        Ok(())
    }
}

/// Whether `id` can be used both as a section name and a directory name
pub fn is_valid_controller_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Manifest plus every file of the bundle
#[derive(Debug, Clone)]
pub struct DecodedToken {
    pub manifest: Manifest,
    pub blobs: Blobs,
}

/// Decode a base64 token
pub fn decode(token: &str) -> SubordinatesResult<DecodedToken> {
    let compact: String = token.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let archive = base64::engine::general_purpose::STANDARD.decode(compact)?;
    decode_archive(&archive)
}

/// Decode the gzip-compressed tar archive carried inside a token
pub fn decode_archive(archive: &[u8]) -> SubordinatesResult<DecodedToken> {
    let mut tar = tar::Archive::new(GzDecoder::new(archive));
    let entries = tar
        .entries()
        .map_err(|e| SubordinatesError::token(format!("unreadable archive: {}", e)))?;

    let mut blobs = Blobs::new();
    let mut manifests = Vec::new();

    for entry in entries {
        let mut entry =
            entry.map_err(|e| SubordinatesError::token(format!("corrupt archive entry: {}", e)))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let path = entry
            .path()
            .map_err(|e| SubordinatesError::token(format!("invalid entry path: {}", e)))?
            .into_owned();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_owned)
            .ok_or_else(|| {
                SubordinatesError::token(format!("unusable file name {}", path.display()))
            })?;

        let mut content = Vec::new();
        entry
            .read_to_end(&mut content)
            .map_err(|e| SubordinatesError::token(format!("cannot read {}: {}", name, e)))?;

        if name.ends_with(".json") {
            manifests.push(content.clone());
        }
        blobs.insert(name, content);
    }

    let manifest = match manifests.as_slice() {
        [] => return Err(SubordinatesError::ManifestMissing),
        [single] => serde_json::from_slice::<Manifest>(single)
            .map_err(|e| SubordinatesError::manifest(e.to_string()))?,
        many => {
            return Err(SubordinatesError::ManifestAmbiguous { count: many.len() });
        }
    };
    manifest.validate()?;

    Ok(DecodedToken { manifest, blobs })
}
