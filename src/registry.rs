//! Versioned registry of model variable snapshots.
//!
//! Stores content-hashed snapshots of a model's trainable and non-trainable
//! state under a family name. Versions are monotonic per family. In-memory
//! only; nothing here crosses a process or network boundary.

use std::collections::HashMap;

use anyhow::Result;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::model::Model;
use crate::tensor::TensorMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub id: Uuid,
    pub family: String,
    pub version: u64,
    pub hash: String,
    pub created_at: i64,
    pub trainable: TensorMap,
    pub non_trainable: TensorMap,
}

#[derive(Default)]
pub struct ModelRegistry {
    families: RwLock<HashMap<String, Vec<ModelSnapshot>>>,
}

impl ModelRegistry {
    pub fn new() -> Self { Self::default() }

    /// Snapshots the model's parameter state under `family` and returns the
    /// stored record. Local variables are deliberately excluded.
    pub fn register(&self, family: &str, model: &dyn Model) -> Result<ModelSnapshot> {
        let trainable = snapshot_variables(model.trainable_variables());
        let non_trainable = snapshot_variables(model.non_trainable_variables());
        let hash = content_hash(&trainable, &non_trainable)?;

        let mut families = self.families.write();
        let entries = families.entry(family.to_string()).or_default();
        let version = entries.last().map(|s| s.version + 1).unwrap_or(1);
        let snapshot = ModelSnapshot {
            id: Uuid::new_v4(),
            family: family.to_string(),
            version,
            hash,
            created_at: chrono::Utc::now().timestamp(),
            trainable,
            non_trainable,
        };
        tracing::info!(family, version, hash = %snapshot.hash, "model snapshot registered");
        entries.push(snapshot.clone());
        Ok(snapshot)
    }

    pub fn latest(&self, family: &str) -> Option<ModelSnapshot> {
        self.families.read().get(family).and_then(|v| v.last().cloned())
    }

    pub fn get(&self, family: &str, version: u64) -> Option<ModelSnapshot> {
        self.families
            .read()
            .get(family)
            .and_then(|v| v.iter().find(|s| s.version == version).cloned())
    }

    pub fn list(&self, family: &str) -> Vec<ModelSnapshot> {
        self.families.read().get(family).cloned().unwrap_or_default()
    }
}

fn snapshot_variables(vars: &[crate::tensor::Variable]) -> TensorMap {
    let mut map = TensorMap::new();
    for v in vars {
        map.insert(v.name(), v.value());
    }
    map
}

fn content_hash(trainable: &TensorMap, non_trainable: &TensorMap) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(trainable)?);
    hasher.update(serde_json::to_vec(non_trainable)?);
    Ok(hex::encode(hasher.finalize()))
}
