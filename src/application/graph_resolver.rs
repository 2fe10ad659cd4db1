// Graph resolver trait for equipment topology access
use crate::domain::equipment::{EntityId, EquipmentClass, PointRole, ResolvedPoints, RoleSpec, SensorId};
use async_trait::async_trait;
use std::collections::BTreeSet;

#[async_trait]
pub trait GraphResolver: Send + Sync {
    /// All entities of `class`, including subclasses where the backend reasons about them.
    async fn list_equipment_of_class(&self, class: EquipmentClass) -> anyhow::Result<BTreeSet<EntityId>>;

    /// Entities fed by `parent`, directly or through any chain of `feeds` edges.
    async fn feeds(&self, parent: &EntityId, transitive: bool) -> anyhow::Result<BTreeSet<EntityId>>;

    /// Points of `entity` for each requested role. Roles with no matching point come back
    /// `Absent`, whatever their requirement.
    async fn resolve_points(&self, entity: &EntityId, role_specs: &[RoleSpec]) -> anyhow::Result<ResolvedPoints>;

    /// Every point whose class matches `role`, whichever entity it belongs to. Empty for
    /// derived roles.
    async fn points_of_role(&self, role: PointRole) -> anyhow::Result<BTreeSet<EntityId>>;

    /// Series store key of a point, if the topology records one.
    async fn source_id(&self, point: &EntityId) -> anyhow::Result<Option<SensorId>>;
}
