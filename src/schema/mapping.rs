use serde::{Deserialize, Serialize};

pub const INDEX_NAME_SEPARATOR: &str = "_";

/// Prefixes `name` with the cluster alias, if one is configured.
pub fn with_cluster_alias(cluster_alias: &str, name: &str) -> String {
    if cluster_alias.is_empty() {
        name.to_string()
    } else {
        format!("{}{}{}", cluster_alias, INDEX_NAME_SEPARATOR, name)
    }
}

/// Where documents of one entity type live, and which alias groups hold
/// documents denormalizing data from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexMapping {
    pub index_name: String,
    #[serde(default)]
    pub alias: String,
    #[serde(default)]
    pub parent_aliases: Vec<String>,
    #[serde(default)]
    pub child_aliases: Vec<String>,
    pub index_mapping_file: String,
}

impl IndexMapping {
    pub fn index_name(&self, cluster_alias: &str) -> String {
        with_cluster_alias(cluster_alias, &self.index_name)
    }

    pub fn alias(&self, cluster_alias: &str) -> String {
        with_cluster_alias(cluster_alias, &self.alias)
    }

    pub fn parent_aliases(&self, cluster_alias: &str) -> Vec<String> {
        self.parent_aliases
            .iter()
            .map(|alias| with_cluster_alias(cluster_alias, alias))
            .collect()
    }

    pub fn child_aliases(&self, cluster_alias: &str) -> Vec<String> {
        self.child_aliases
            .iter()
            .map(|alias| with_cluster_alias(cluster_alias, alias))
            .collect()
    }

    /// Own alias followed by the parent aliases, all cluster-qualified.
    pub fn all_aliases(&self, cluster_alias: &str) -> Vec<String> {
        let mut aliases = Vec::with_capacity(self.parent_aliases.len() + 1);
        if !self.alias.is_empty() {
            aliases.push(self.alias(cluster_alias));
        }
        aliases.extend(self.parent_aliases(cluster_alias));
        aliases
    }

    /// Schema resource path for `language` (`%s` in the template).
    pub fn mapping_file(&self, language: &str) -> String {
        self.index_mapping_file.replace("%s", &language.to_lowercase())
    }
}
