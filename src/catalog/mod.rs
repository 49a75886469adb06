//! Semantic catalog - the read-only index of entities and their joins.
//!
//! The catalog is built once from a [`CatalogDefinition`], checked
//! structurally, and never mutated afterwards, so it can be shared across
//! concurrent runs behind an `Arc` without locking.
//!
//! - `entity`: entity, dimension, measure and join records
//! - `search`: lexical search index
//! - `error`: catalog errors

mod entity;
mod error;
mod search;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};

pub use entity::{
    AggregationKind, Dimension, Entity, Field, Join, JoinKind, Measure, TableStats, ValueType,
};
pub use error::{CatalogError, CatalogResult};
pub use search::{EntitySummary, SearchIndex};

/// Ingestion record: the already-parsed entity list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogDefinition {
    pub entities: Vec<Entity>,
}

impl CatalogDefinition {
    pub fn from_json(json: &str) -> CatalogResult<Self> {
        serde_json::from_str(json).map_err(|e| CatalogError::Definition(e.to_string()))
    }
}

/// Edge data in the join graph.
///
/// Every declared join is stored twice: once as declared and once reversed,
/// so traversal can follow relationships in either direction.
#[derive(Debug, Clone)]
pub struct JoinEdge {
    pub kind: JoinKind,
    pub from_columns: Vec<String>,
    pub to_columns: Vec<String>,
}

/// Read-only catalog of entities.
#[derive(Debug, Clone)]
pub struct SemanticCatalog {
    entities: BTreeMap<String, Entity>,
    /// Nodes are entity ids; edges are joins in both directions.
    graph: DiGraph<String, JoinEdge>,
    node_indices: HashMap<String, NodeIndex>,
    index: SearchIndex,
}

impl SemanticCatalog {
    /// Build a catalog, failing fast on structural defects.
    pub fn from_definition(definition: CatalogDefinition) -> CatalogResult<Self> {
        let mut entities = BTreeMap::new();
        for mut entity in definition.entities {
            entity.normalize();
            check_fields(&entity)?;
            let id = entity.id.clone();
            if entities.insert(id.clone(), entity).is_some() {
                return Err(CatalogError::DuplicateEntity(id));
            }
        }

        for entity in entities.values() {
            for join in &entity.joins {
                check_join(entity, join, &entities)?;
            }
        }

        let mut graph = DiGraph::new();
        let mut node_indices = HashMap::new();
        for id in entities.keys() {
            node_indices.insert(id.clone(), graph.add_node(id.clone()));
        }

        let mut join_count = 0;
        for entity in entities.values() {
            let from = node_indices[&entity.id];
            for join in &entity.joins {
                let to = node_indices[&join.target];
                graph.add_edge(
                    from,
                    to,
                    JoinEdge {
                        kind: join.kind,
                        from_columns: join.local_columns.clone(),
                        to_columns: join.remote_columns.clone(),
                    },
                );
                graph.add_edge(
                    to,
                    from,
                    JoinEdge {
                        kind: join.kind.reverse(),
                        from_columns: join.remote_columns.clone(),
                        to_columns: join.local_columns.clone(),
                    },
                );
                join_count += 1;
            }
        }

        let index = SearchIndex::build(entities.values());

        tracing::info!(
            entities = entities.len(),
            joins = join_count,
            "semantic catalog loaded"
        );

        Ok(Self {
            entities,
            graph,
            node_indices,
            index,
        })
    }

    /// Parse a JSON catalog definition and build the catalog.
    pub fn from_json(json: &str) -> CatalogResult<Self> {
        Self::from_definition(CatalogDefinition::from_json(json)?)
    }

    /// Load a JSON catalog definition from disk.
    pub fn from_file(path: impl AsRef<Path>) -> CatalogResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| CatalogError::Definition(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    pub fn lookup_entity(&self, id: &str) -> CatalogResult<&Entity> {
        self.entities
            .get(id)
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))
    }

    /// Ranked entity summaries matching `query`.
    pub fn search_entities(&self, query: &str) -> Vec<EntitySummary> {
        self.index.search(query)
    }

    /// The entity backed by a physical table, if any. `table` is compared
    /// with the entity's schema-qualified table name.
    pub fn entity_by_table(&self, table: &str) -> Option<&Entity> {
        self.entities
            .values()
            .find(|e| e.qualified_table().eq_ignore_ascii_case(table))
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    pub(crate) fn graph(&self) -> &DiGraph<String, JoinEdge> {
        &self.graph
    }

    pub(crate) fn node_index(&self, id: &str) -> Option<NodeIndex> {
        self.node_indices.get(id).copied()
    }
}

fn check_fields(entity: &Entity) -> CatalogResult<()> {
    let mut seen = HashSet::new();
    for name in entity.field_names() {
        if !seen.insert(name) {
            return Err(CatalogError::DuplicateField {
                entity: entity.id.clone(),
                field: name.to_string(),
            });
        }
    }
    Ok(())
}

fn check_join(entity: &Entity, join: &Join, entities: &BTreeMap<String, Entity>) -> CatalogResult<()> {
    if !entities.contains_key(&join.target) {
        return Err(CatalogError::UndeclaredJoinTarget {
            entity: entity.id.clone(),
            target: join.target.clone(),
        });
    }
    if join.local_columns.is_empty() || join.remote_columns.is_empty() {
        return Err(CatalogError::EmptyJoinKeys {
            entity: entity.id.clone(),
            target: join.target.clone(),
        });
    }
    if join.local_columns.len() != join.remote_columns.len() {
        return Err(CatalogError::JoinKeyMismatch {
            entity: entity.id.clone(),
            target: join.target.clone(),
            local: join.local_columns.len(),
            remote: join.remote_columns.len(),
        });
    }
    Ok(())
}
