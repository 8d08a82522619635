//! OCI image-layout packaging for policy bundles.
//!
//! The bundle filesystem becomes one gzip-compressed tar layer. Blobs are
//! content-addressed under `blobs/sha256/`, and the manifest is tagged in
//! `index.json`.

use crate::services::writers::{archive, compress, MemFs};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

pub const MANIFEST_MEDIA_TYPE: &str = "application/vnd.oci.image.manifest.v1+json";
pub const INDEX_MEDIA_TYPE: &str = "application/vnd.oci.image.index.v1+json";
pub const LAYER_MEDIA_TYPE: &str = "application/vnd.oci.image.layer.v1.tar+gzip";
pub const EMPTY_MEDIA_TYPE: &str = "application/vnd.oci.empty.v1+json";
pub const ARTIFACT_TYPE: &str = "application/vnd.gatepeeker.policies.v1";
pub const REF_NAME_ANNOTATION: &str = "org.opencontainers.image.ref.name";

#[derive(thiserror::Error, Debug)]
pub enum OciError {
    #[error("oci layout i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("oci metadata is invalid: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    pub media_type: String,
    pub digest: String,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_type: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub schema_version: u32,
    pub media_type: String,
    pub artifact_type: String,
    pub config: Descriptor,
    pub layers: Vec<Descriptor>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    pub schema_version: u32,
    #[serde(default)]
    pub media_type: String,
    #[serde(default)]
    pub manifests: Vec<Descriptor>,
}

pub fn digest_of(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

fn descriptor(media_type: &str, data: &[u8]) -> Descriptor {
    Descriptor {
        media_type: media_type.to_string(),
        digest: digest_of(data),
        size: data.len() as u64,
        artifact_type: None,
        annotations: BTreeMap::new(),
    }
}

fn push_blob(layout: &Path, desc: &Descriptor, data: &[u8]) -> Result<(), OciError> {
    let hex = desc.digest.trim_start_matches("sha256:");
    let dir = layout.join("blobs").join("sha256");
    std::fs::create_dir_all(&dir)?;
    let path = dir.join(hex);
    if !path.exists() {
        std::fs::write(path, data)?;
    }
    Ok(())
}

fn load_index(layout: &Path) -> Result<Index, OciError> {
    let path = layout.join("index.json");
    if !path.exists() {
        return Ok(Index {
            schema_version: 2,
            media_type: INDEX_MEDIA_TYPE.to_string(),
            manifests: vec![],
        });
    }
    Ok(serde_json::from_slice(&std::fs::read(path)?)?)
}

/// Packs `fsys` into an OCI image layout at `layout`, tagged as `tag`.
///
/// Returns the manifest descriptor recorded in `index.json`.
pub fn build_image(fsys: &MemFs, layout: &Path, tag: &str) -> Result<Descriptor, OciError> {
    let tar = archive(fsys)?;
    info!(digest = %digest_of(&tar), "built archive from filesystem");

    let mut layer = Vec::new();
    compress(&tar, &mut layer)?;
    let layer_desc = descriptor(LAYER_MEDIA_TYPE, &layer);
    info!(digest = %layer_desc.digest, "compressed archive");
    push_blob(layout, &layer_desc, &layer)?;

    let config = b"{}";
    let config_desc = descriptor(EMPTY_MEDIA_TYPE, config);
    push_blob(layout, &config_desc, config)?;

    let manifest = Manifest {
        schema_version: 2,
        media_type: MANIFEST_MEDIA_TYPE.to_string(),
        artifact_type: ARTIFACT_TYPE.to_string(),
        config: config_desc,
        layers: vec![layer_desc],
    };
    let manifest_bytes = serde_json::to_vec(&manifest)?;
    let mut manifest_desc = descriptor(MANIFEST_MEDIA_TYPE, &manifest_bytes);
    push_blob(layout, &manifest_desc, &manifest_bytes)?;
    manifest_desc.artifact_type = Some(ARTIFACT_TYPE.to_string());
    manifest_desc
        .annotations
        .insert(REF_NAME_ANNOTATION.to_string(), tag.to_string());

    std::fs::write(
        layout.join("oci-layout"),
        br#"{"imageLayoutVersion":"1.0.0"}"#,
    )?;
    let mut index = load_index(layout)?;
    index
        .manifests
        .retain(|m| m.annotations.get(REF_NAME_ANNOTATION).map(String::as_str) != Some(tag));
    index.manifests.push(manifest_desc.clone());
    std::fs::write(
        layout.join("index.json"),
        serde_json::to_vec_pretty(&index)?,
    )?;
    info!(digest = %manifest_desc.digest, tag, "tagged manifest");
    Ok(manifest_desc)
}
