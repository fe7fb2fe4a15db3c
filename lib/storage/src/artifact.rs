// Artifact persistence: one file per fitted model.
//
// Layout: 8-byte magic, u32 format version (LE), 32-byte SHA-256 of the
// body, then the bincode-encoded ModelArtifact. Writes go to a temp file
// that is renamed over the target, so readers never see a partial file.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use songvec_core::{Error, ModelArtifact, Result, ARTIFACT_FORMAT_VERSION};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const MAGIC: &[u8; 8] = b"SONGVEC\x01";
const HEADER_LEN: usize = 8 + 4 + 32;

/// Description of a saved artifact for logs and the model endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactDescription {
    pub path: PathBuf,
    pub size: u64,
    pub checksum: String,
    pub saved_at: String,
}

/// Serialize an artifact into a self-describing blob.
pub fn encode_artifact(artifact: &ModelArtifact) -> Result<Vec<u8>> {
    let body = bincode::serialize(artifact)
        .map_err(|e| Error::Serialization(format!("failed to encode artifact: {}", e)))?;
    let checksum = Sha256::digest(&body);

    let mut blob = Vec::with_capacity(HEADER_LEN + body.len());
    blob.extend_from_slice(MAGIC);
    blob.extend_from_slice(&ARTIFACT_FORMAT_VERSION.to_le_bytes());
    blob.extend_from_slice(&checksum);
    blob.extend_from_slice(&body);
    Ok(blob)
}

/// Decode and verify a blob produced by [`encode_artifact`].
pub fn decode_artifact(blob: &[u8]) -> Result<ModelArtifact> {
    if blob.len() < HEADER_LEN || &blob[..8] != MAGIC {
        return Err(Error::Serialization("not a songvec artifact".to_string()));
    }

    let mut version = [0u8; 4];
    version.copy_from_slice(&blob[8..12]);
    let version = u32::from_le_bytes(version);
    if version != ARTIFACT_FORMAT_VERSION {
        return Err(Error::StaleArtifact(format!(
            "artifact format {} is not supported (expected {})",
            version, ARTIFACT_FORMAT_VERSION
        )));
    }

    let expected = &blob[12..HEADER_LEN];
    let body = &blob[HEADER_LEN..];
    if Sha256::digest(body).as_slice() != expected {
        return Err(Error::Serialization("artifact checksum mismatch".to_string()));
    }

    bincode::deserialize(body)
        .map_err(|e| Error::Serialization(format!("failed to decode artifact: {}", e)))
}

/// File-backed artifact location.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    path: PathBuf,
}

impl ArtifactStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the artifact atomically (temp file + rename).
    pub fn save(&self, artifact: &ModelArtifact) -> Result<ArtifactDescription> {
        let blob = encode_artifact(artifact)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let temp_file = self.path.with_extension("tmp");
        fs::write(&temp_file, &blob)?;
        fs::rename(&temp_file, &self.path)?;

        let description = ArtifactDescription {
            path: self.path.clone(),
            size: blob.len() as u64,
            checksum: format!("{:x}", Sha256::digest(&blob)),
            saved_at: Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        };
        info!(path = ?self.path, size = description.size, "artifact saved");
        Ok(description)
    }

    /// Load the artifact. Any failure (missing file, corrupt or foreign
    /// blob) is reported as [`Error::MissingArtifact`], except a format
    /// version mismatch which stays [`Error::StaleArtifact`].
    pub fn load(&self) -> Result<ModelArtifact> {
        let blob = fs::read(&self.path).map_err(|e| {
            Error::MissingArtifact(format!("cannot read {}: {}", self.path.display(), e))
        })?;
        let artifact = decode_artifact(&blob).map_err(|e| match e {
            Error::StaleArtifact(_) => e,
            other => Error::MissingArtifact(format!("{}: {}", self.path.display(), other)),
        })?;
        info!(
            path = ?self.path,
            model = %artifact.header.embedding_model,
            contract = %artifact.header.contract,
            "artifact loaded"
        );
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use songvec_core::{fit_pipeline, HashingEmbedder, NumericAttribute, PipelineConfig, SongRecord, Vector};
    use tempfile::TempDir;

    fn artifact() -> ModelArtifact {
        let records: Vec<SongRecord> = (0..22)
            .map(|i| {
                SongRecord::new(i.to_string())
                    .with_artists([format!("Artist {}", i % 4)])
                    .with_genre(["pop", "rock"][i % 2])
                    .with_track(format!("Song {}", i))
                    .with_numeric(NumericAttribute::Energy, i as f64 * 0.03)
                    .with_numeric(NumericAttribute::Tempo, 80.0 + i as f64)
            })
            .collect();
        fit_pipeline(&records, &HashingEmbedder::new(32), &PipelineConfig::default())
            .unwrap()
            .artifact
    }

    #[test]
    fn test_blob_roundtrip_reproduces_transform() {
        let original = artifact();
        let restored = decode_artifact(&encode_artifact(&original).unwrap()).unwrap();
        assert_eq!(original, restored);

        let fused_dim = original.header.fused_dim;
        for seed in 0..5 {
            let probe = Vector::new((0..fused_dim).map(|j| ((seed * 13 + j) as f64).cos()).collect());
            assert_eq!(
                original.reduction.transform(&probe).unwrap(),
                restored.reduction.transform(&probe).unwrap()
            );
        }
    }

    #[test]
    fn test_corrupt_blob_is_rejected() {
        let mut blob = encode_artifact(&artifact()).unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0xff;
        assert!(matches!(decode_artifact(&blob), Err(Error::Serialization(_))));
        assert!(decode_artifact(b"garbage").is_err());
    }

    #[test]
    fn test_store_save_and_load() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path().join("models").join("model.bin"));
        let original = artifact();
        let description = store.save(&original).unwrap();
        assert!(store.path().exists());
        assert_eq!(description.size, fs::metadata(store.path()).unwrap().len());
        assert_eq!(store.load().unwrap(), original);
    }

    #[test]
    fn test_missing_file_is_missing_artifact() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path().join("absent.bin"));
        assert!(matches!(store.load(), Err(Error::MissingArtifact(_))));

        fs::write(store.path(), b"not an artifact at all, definitely not").unwrap();
        assert!(matches!(store.load(), Err(Error::MissingArtifact(_))));
    }
}
