//! Recipes: an ordered list of steps run through the engine.
//!
//! ```yaml
//! steps:
//!   - cluster: { column: country, method: fingerprint }
//!     accept: all
//!     canonical: [{ index: 0, value: United States }]
//!   - type: filter
//!     params: { column: country, value: united }
//!   - type: hashId
//!     params: { columns: [name, email], algorithm: simple }
//! undo: 1
//! ```
//!
//! Files ending in `.yaml` or `.yml` are read as YAML, anything else as JSON.

use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    cluster::ClusterRequest,
    engine::Engine,
    ops::Transform,
    remap::ClusterSelection,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    #[serde(default)]
    pub steps: Vec<RecipeStep>,
    /// Operations to step back once every step has run.
    #[serde(default)]
    pub undo: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecipeStep {
    Cluster(ClusterStep),
    Operation(Transform),
}

/// Propose clusters, then merge the accepted ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterStep {
    pub cluster: ClusterRequest,
    #[serde(default)]
    pub accept: Acceptance,
    #[serde(default)]
    pub canonical: Vec<CanonicalOverride>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Acceptance {
    Keyword(AcceptKeyword),
    Indices(Vec<usize>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcceptKeyword {
    All,
    None,
}

impl Default for Acceptance {
    fn default() -> Self {
        Acceptance::Keyword(AcceptKeyword::All)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalOverride {
    pub index: usize,
    pub value: String,
}

impl ClusterStep {
    /// Selection state for `count` proposed clusters.
    pub fn selection(&self, count: usize) -> ClusterSelection {
        let mut selection = match &self.accept {
            Acceptance::Keyword(AcceptKeyword::All) => ClusterSelection::all(count),
            Acceptance::Keyword(AcceptKeyword::None) => ClusterSelection::new(),
            Acceptance::Indices(indices) => {
                let mut selection = ClusterSelection::new();
                for &index in indices {
                    selection.set_accepted(index, true);
                }
                selection
            }
        };
        for entry in &self.canonical {
            selection.set_canonical(entry.index, entry.value.clone());
        }
        selection
    }
}

impl Recipe {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening recipe file {path:?}"))?;
        let reader = BufReader::new(file);
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));
        let recipe = if is_yaml {
            serde_yaml::from_reader(reader).context("Parsing recipe YAML")?
        } else {
            serde_json::from_reader(reader).context("Parsing recipe JSON")?
        };
        Ok(recipe)
    }

    /// Runs every step in order, then the trailing undo count.
    pub fn run(&self, engine: &mut Engine) -> Result<()> {
        for (idx, step) in self.steps.iter().enumerate() {
            let position = idx + 1;
            match step {
                RecipeStep::Operation(transform) => {
                    engine
                        .apply(transform.clone())
                        .with_context(|| format!("Recipe step {position} ({})", transform.kind_name()))?;
                }
                RecipeStep::Cluster(cluster_step) => {
                    let column = cluster_step.cluster.column.clone();
                    let (clusters, _) = engine
                        .propose_clusters(cluster_step.cluster.clone())
                        .with_context(|| format!("Recipe step {position} (cluster '{column}')"))?;
                    if cluster_step.accept == Acceptance::Keyword(AcceptKeyword::None) {
                        debug!(
                            "Step {position}: discarding {} cluster(s) in '{column}'",
                            clusters.len()
                        );
                        engine.discard_clusters();
                        continue;
                    }
                    let selection = cluster_step.selection(clusters.len());
                    debug!(
                        "Step {position}: accepting {} of {} cluster(s) in '{column}'",
                        selection.accepted_indices().count(),
                        clusters.len()
                    );
                    engine
                        .apply_cluster_merge(&selection)
                        .with_context(|| format!("Recipe step {position} (merge '{column}')"))?;
                }
            }
        }
        for _ in 0..self.undo {
            if !engine.undo().context("Undoing recipe step")? {
                break;
            }
        }
        info!(
            "Recipe finished: {} step(s), cursor at {:?}",
            self.steps.len(),
            engine.history().cursor()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{data::Value, dataset::Table};

    const YAML: &str = r#"
steps:
  - cluster: { column: country, method: fingerprint }
    accept: all
    canonical: [{ index: 0, value: United States }]
  - type: sort
    params: { column: id, direction: desc }
  - type: clean
undo: 1
"#;

    fn table() -> Table {
        Table::from_rows(
            vec!["id".into(), "country".into()],
            vec![
                vec![Value::Number(1.0), "USA".into()],
                vec![Value::Number(2.0), "usa".into()],
                vec![Value::Number(3.0), Value::Null],
            ],
        )
        .unwrap()
    }

    #[test]
    fn yaml_recipe_parses_both_step_shapes() {
        let recipe: Recipe = serde_yaml::from_str(YAML).unwrap();
        assert_eq!(recipe.steps.len(), 3);
        assert!(matches!(recipe.steps[0], RecipeStep::Cluster(_)));
        assert!(matches!(recipe.steps[1], RecipeStep::Operation(Transform::Sort(_))));
        assert_eq!(recipe.steps[2], RecipeStep::Operation(Transform::Clean));
        assert_eq!(recipe.undo, 1);
    }

    #[test]
    fn json_acceptance_accepts_index_lists() {
        let step: ClusterStep = serde_json::from_str(
            r#"{"cluster": {"column": "c", "method": "levenshtein", "threshold": 0.8}, "accept": [1]}"#,
        )
        .unwrap();
        let selection = step.selection(3);
        assert_eq!(selection.accepted_indices().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn run_applies_steps_then_undoes() {
        let recipe: Recipe = serde_yaml::from_str(YAML).unwrap();
        let mut engine = Engine::new(table());
        recipe.run(&mut engine).unwrap();
        assert_eq!(engine.history().len(), 3);
        assert_eq!(engine.history().cursor(), Some(1));
        let countries = engine
            .current()
            .column_values(1)
            .map(Value::as_display)
            .collect::<Vec<_>>();
        assert_eq!(countries, vec!["", "United States", "United States"]);
    }

    #[test]
    fn accept_none_reviews_without_merging() {
        let recipe: Recipe = serde_yaml::from_str(
            "steps:\n  - cluster: { column: country, method: fingerprint }\n    accept: none\n",
        )
        .unwrap();
        let mut engine = Engine::new(table());
        recipe.run(&mut engine).unwrap();
        assert!(engine.history().is_empty());
        assert!(engine.pending_clusters().is_none());
        assert_eq!(engine.current(), &table());
    }
}
