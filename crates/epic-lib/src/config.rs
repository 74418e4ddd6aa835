use crate::criteria::MissingPolicy;
use crate::render::{ExpansionPolicy, DEFAULT_POOL_SIZE};
use crate::tree::TreeBuilder;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// How a view groups and displays a store, as read from TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub split_by: Vec<String>,
    pub missing: MissingPolicy,
    pub missing_overrides: BTreeMap<String, MissingPolicy>,
    pub pool_size: usize,
    pub expand_depth: usize,
    pub stream: String,
    pub trunk_label: String,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            split_by: Vec::new(),
            missing: MissingPolicy::default(),
            missing_overrides: BTreeMap::new(),
            pool_size: DEFAULT_POOL_SIZE,
            expand_depth: 0,
            stream: "Amp1".to_string(),
            trunk_label: "Epochs".to_string(),
        }
    }
}

impl ViewConfig {
    pub fn builder(&self) -> TreeBuilder {
        let mut builder =
            TreeBuilder::new(self.split_by.iter().cloned()).missing_policy(self.missing);
        for (name, policy) in &self.missing_overrides {
            builder = builder.missing_policy_for(name.clone(), *policy);
        }
        builder
    }

    pub fn expansion(&self) -> ExpansionPolicy {
        ExpansionPolicy {
            expand_depth: self.expand_depth,
        }
    }
}

pub fn parse_config(text: &str) -> Result<ViewConfig> {
    let config: ViewConfig = toml::from_str(text).context("parsing view config")?;
    Ok(config)
}

pub fn read_config(path: &Path) -> Result<ViewConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read view config {}", path.display()))?;
    let config: ViewConfig = toml::from_str(&contents)
        .with_context(|| format!("parsing view config {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{EpochRecord, EpochStore};
    use crate::tree::EpochTree;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn empty_document_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config, ViewConfig::default());
        assert_eq!(config.pool_size, 128);
        assert_eq!(config.expansion(), ExpansionPolicy::default());
    }

    #[test]
    fn parses_policies_and_overrides() {
        let config = parse_config(
            r#"
            split_by = ["cellInfo.type", "parameters.contrast"]
            missing = "fail"
            pool_size = 32
            expand_depth = 1

            [missing_overrides]
            "parameters.contrast" = "sentinel"
            "#,
        )
        .unwrap();
        assert_eq!(config.split_by.len(), 2);
        assert_eq!(config.missing, MissingPolicy::Fail);
        assert_eq!(config.pool_size, 32);
        assert_eq!(config.expansion().expand_depth, 1);
        assert_eq!(config.stream, "Amp1");

        let mut store = EpochStore::new();
        store.push(EpochRecord::new(json!({ "cellInfo": { "type": "OnP" } })));
        let tree = EpochTree::build(store, &config.builder()).unwrap();
        let leaf = tree.root().leaf_nodes().next().unwrap();
        assert!(leaf.split_value().unwrap().is_undefined());
    }

    #[test]
    fn read_config_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("view.toml");
        fs::write(&path, "pool_size = \"many\"").unwrap();
        let err = read_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("view.toml"));
        assert!(read_config(&dir.path().join("absent.toml")).is_err());
    }
}
