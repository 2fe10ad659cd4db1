// File-backed topology - Equipment graph loaded from a JSON document
use crate::application::graph_resolver::GraphResolver;
use crate::domain::equipment::{
    EntityId, EquipmentClass, PointRole, ResolvedPoints, RoleBinding, RoleSpec, SensorId,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::Path;

#[derive(Debug, Deserialize)]
struct TopologyDocument {
    #[serde(default)]
    entities: Vec<EntityRecord>,
    #[serde(default)]
    points: Vec<PointRecord>,
}

#[derive(Debug, Deserialize)]
struct EntityRecord {
    id: EntityId,
    class: String,
    #[serde(default)]
    feeds: Vec<EntityId>,
}

#[derive(Debug, Deserialize)]
struct PointRecord {
    id: EntityId,
    class: String,
    point_of: EntityId,
    #[serde(default)]
    srcid: Option<SensorId>,
}

/// In-memory topology. Classes match by exact Brick class name; no subclass reasoning.
#[derive(Debug, Clone, Default)]
pub struct FileTopology {
    classes: BTreeMap<EntityId, String>,
    feeds: BTreeMap<EntityId, BTreeSet<EntityId>>,
    /// owner -> (point class, point id)
    points: BTreeMap<EntityId, Vec<(String, EntityId)>>,
    srcids: BTreeMap<EntityId, SensorId>,
}

impl FileTopology {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read topology file {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("Invalid topology file {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let document: TopologyDocument =
            serde_json::from_str(text).context("Failed to parse topology document")?;

        let mut topology = Self::default();
        for entity in document.entities {
            topology
                .feeds
                .entry(entity.id.clone())
                .or_default()
                .extend(entity.feeds);
            topology.classes.insert(entity.id, entity.class);
        }
        for point in document.points {
            if let Some(srcid) = point.srcid {
                topology.srcids.insert(point.id.clone(), srcid);
            }
            topology
                .points
                .entry(point.point_of)
                .or_default()
                .push((point.class, point.id));
        }
        for points in topology.points.values_mut() {
            points.sort();
        }

        tracing::debug!(
            "Loaded topology with {} entities and {} points with source ids",
            topology.classes.len(),
            topology.srcids.len()
        );
        Ok(topology)
    }
}

#[async_trait]
impl GraphResolver for FileTopology {
    async fn list_equipment_of_class(&self, class: EquipmentClass) -> Result<BTreeSet<EntityId>> {
        Ok(self
            .classes
            .iter()
            .filter(|(_, c)| c.as_str() == class.brick_class())
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn feeds(&self, parent: &EntityId, transitive: bool) -> Result<BTreeSet<EntityId>> {
        let direct = |id: &EntityId| self.feeds.get(id).into_iter().flatten();

        if !transitive {
            return Ok(direct(parent).cloned().collect());
        }

        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<&EntityId> = direct(parent).collect();
        while let Some(next) = queue.pop_front() {
            if seen.insert(next.clone()) {
                queue.extend(direct(next));
            }
        }
        Ok(seen)
    }

    async fn resolve_points(&self, entity: &EntityId, role_specs: &[RoleSpec]) -> Result<ResolvedPoints> {
        let owned = self.points.get(entity).map(Vec::as_slice).unwrap_or(&[]);

        let mut resolved = ResolvedPoints::new();
        for spec in role_specs {
            let Some(class) = spec.role.brick_class() else {
                resolved.bind(spec.role, RoleBinding::Absent);
                continue;
            };
            let mut matches = owned.iter().filter(|(c, _)| c == class).map(|(_, id)| id);
            let first = matches.next().cloned();
            if matches.next().is_some() {
                tracing::warn!(
                    "Several {} points on {}, using {:?}",
                    class,
                    entity,
                    first
                );
            }
            resolved.bind(spec.role, first.into());
        }
        Ok(resolved)
    }

    async fn points_of_role(&self, role: PointRole) -> Result<BTreeSet<EntityId>> {
        let Some(class) = role.brick_class() else {
            return Ok(BTreeSet::new());
        };
        Ok(self
            .points
            .values()
            .flatten()
            .filter(|(c, _)| c == class)
            .map(|(_, id)| id.clone())
            .collect())
    }

    async fn source_id(&self, point: &EntityId) -> Result<Option<SensorId>> {
        Ok(self.srcids.get(point).cloned())
    }
}
