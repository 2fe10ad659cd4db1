// Point resolver - Role sets and fallback rules on top of the graph resolver
use crate::application::graph_resolver::GraphResolver;
use crate::domain::equipment::{
    EntityId, EquipmentClass, EquipmentNode, PointRole, ResolvedPoints, RoleBinding, RoleSpec,
};
use crate::domain::error::{MeterError, MeterResult};
use std::sync::Arc;

pub const AHU_ROLES: [RoleSpec; 5] = [
    RoleSpec::optional(PointRole::MixedAirTemperature),
    RoleSpec::optional(PointRole::ReturnAirTemperature),
    RoleSpec::optional(PointRole::OutsideAirTemperature),
    RoleSpec::optional(PointRole::DischargeAirTemperatureSetpoint),
    RoleSpec::optional(PointRole::DischargeAirFlow),
];

/// Roles looked up on the VAV itself.
const VAV_POINT_ROLES: [RoleSpec; 3] = [
    RoleSpec::required(PointRole::ZoneTemperature),
    RoleSpec::required(PointRole::SupplyAirFlow),
    RoleSpec::optional(PointRole::SupplyAirTemperature),
];

/// Roles a VAV needs once the discharge temperature fallback has been applied.
pub const VAV_ROLES: [RoleSpec; 4] = [
    RoleSpec::required(PointRole::ZoneTemperature),
    RoleSpec::required(PointRole::SupplyAirFlow),
    RoleSpec::optional(PointRole::SupplyAirTemperature),
    RoleSpec::required(PointRole::DischargeAirTemperature),
];

pub const PLANT_ROLES: [RoleSpec; 3] = [
    RoleSpec::required(PointRole::ChilledWaterFlow),
    RoleSpec::required(PointRole::ChilledWaterSupplyTemperature),
    RoleSpec::required(PointRole::ChilledWaterReturnTemperature),
];

/// How the chilled-water plant is located.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlantSelection {
    pub entity: Option<EntityId>,
    /// Required substring of a building-wide flow sensor's source id.
    pub srcid_contains: Option<String>,
}

/// A VAV node plus the zone it serves.
#[derive(Debug, Clone)]
pub struct VavNode {
    pub node: EquipmentNode,
    pub zone: Option<EntityId>,
}

#[derive(Clone)]
pub struct PointResolver {
    graph: Arc<dyn GraphResolver>,
}

impl PointResolver {
    pub fn new(graph: Arc<dyn GraphResolver>) -> Self {
        Self { graph }
    }

    pub async fn list_ahus(&self) -> MeterResult<Vec<EntityId>> {
        let ahus = self
            .graph
            .list_equipment_of_class(EquipmentClass::Ahu)
            .await
            .map_err(MeterError::Topology)?;
        Ok(ahus.into_iter().collect())
    }

    pub async fn resolve_ahu(&self, ahu: &EntityId) -> MeterResult<EquipmentNode> {
        let points = self
            .graph
            .resolve_points(ahu, &AHU_ROLES)
            .await
            .map_err(MeterError::Topology)?;
        Ok(EquipmentNode::new(ahu.clone(), EquipmentClass::Ahu, points, &AHU_ROLES))
    }

    /// Every VAV fed by `ahu`, directly or downstream of other equipment.
    ///
    /// A supply-air temperature sensor on the VAV becomes its discharge temperature;
    /// otherwise the AHU's discharge-air temperature setpoint stands in. VAVs missing
    /// required roles are returned too, marked unresolved, so they count towards the
    /// population the aggregate compensates for.
    pub async fn resolve_vavs(&self, ahu: &EquipmentNode) -> MeterResult<Vec<VavNode>> {
        let downstream = self
            .graph
            .feeds(&ahu.id, true)
            .await
            .map_err(MeterError::Topology)?;
        let all_vavs = self
            .graph
            .list_equipment_of_class(EquipmentClass::Vav)
            .await
            .map_err(MeterError::Topology)?;
        let zones = self
            .graph
            .list_equipment_of_class(EquipmentClass::HvacZone)
            .await
            .map_err(MeterError::Topology)?;

        let ahu_setpoint = ahu.points.point(PointRole::DischargeAirTemperatureSetpoint);

        let mut vavs = Vec::new();
        for vav in downstream.intersection(&all_vavs) {
            let mut points = self
                .graph
                .resolve_points(vav, &VAV_POINT_ROLES)
                .await
                .map_err(MeterError::Topology)?;
            apply_discharge_fallback(&mut points, ahu_setpoint);

            let served = self
                .graph
                .feeds(vav, true)
                .await
                .map_err(MeterError::Topology)?;
            let zone = served.intersection(&zones).next().cloned();

            let node = EquipmentNode::new(vav.clone(), EquipmentClass::Vav, points, &VAV_ROLES);
            if !node.is_resolved() {
                tracing::warn!("VAV {} has unresolved roles {:?}", vav, node.unresolved);
            }
            vavs.push(VavNode { node, zone });
        }

        tracing::debug!("Resolved {} VAVs under {}", vavs.len(), ahu.id);
        Ok(vavs)
    }

    /// The chilled-water plant to meter.
    ///
    /// The configured entity, else the chilled-water system found by class. When neither
    /// owns any plant point, the three plant sensors are looked up building-wide and the
    /// node takes the flow meter's id.
    pub async fn resolve_plant(&self, selection: &PlantSelection) -> MeterResult<Option<EquipmentNode>> {
        let entity = match &selection.entity {
            Some(plant) => Some(plant.clone()),
            None => self.discover_plant_entity().await?,
        };

        let owned = match entity {
            Some(plant) => {
                let points = self
                    .graph
                    .resolve_points(&plant, &PLANT_ROLES)
                    .await
                    .map_err(MeterError::Topology)?;
                let node =
                    EquipmentNode::new(plant, EquipmentClass::ChilledWaterSystem, points, &PLANT_ROLES);
                if node.unresolved.len() < PLANT_ROLES.len() {
                    return Ok(Some(node));
                }
                Some(node)
            }
            None => None,
        };

        let points = self
            .building_wide_plant_points(selection.srcid_contains.as_deref())
            .await?;
        let Some(meter) = PLANT_ROLES
            .iter()
            .find_map(|spec| points.point(spec.role))
            .cloned()
        else {
            if owned.is_none() {
                tracing::warn!("No chilled water system or chilled water sensors in the topology");
            }
            return Ok(owned);
        };

        let id = owned.map_or(meter, |node| node.id);
        tracing::info!("Metering plant {} from building-wide chilled water sensors", id);
        Ok(Some(EquipmentNode::new(
            id,
            EquipmentClass::ChilledWaterSystem,
            points,
            &PLANT_ROLES,
        )))
    }

    async fn discover_plant_entity(&self) -> MeterResult<Option<EntityId>> {
        let plants = self
            .graph
            .list_equipment_of_class(EquipmentClass::ChilledWaterSystem)
            .await
            .map_err(MeterError::Topology)?;
        if plants.len() > 1 {
            tracing::warn!(
                "{} chilled water systems found, using the first of {:?}",
                plants.len(),
                plants
            );
        }
        Ok(plants.into_iter().next())
    }

    /// Plant roles bound to any matching point in the topology. Only flow sensors whose
    /// source id contains `srcid_contains` qualify when a pattern is given.
    async fn building_wide_plant_points(&self, srcid_contains: Option<&str>) -> MeterResult<ResolvedPoints> {
        let mut points = ResolvedPoints::new();
        for spec in &PLANT_ROLES {
            let mut candidates = Vec::new();
            for point in self
                .graph
                .points_of_role(spec.role)
                .await
                .map_err(MeterError::Topology)?
            {
                if let (PointRole::ChilledWaterFlow, Some(pattern)) = (spec.role, srcid_contains) {
                    let srcid = self.source_id(&point).await?;
                    if !srcid.is_some_and(|id| id.contains(pattern)) {
                        continue;
                    }
                }
                candidates.push(point);
            }
            if candidates.len() > 1 {
                tracing::warn!(
                    "{} candidates for {:?}, using {}",
                    candidates.len(),
                    spec.role,
                    candidates[0]
                );
            }
            points.bind(spec.role, candidates.into_iter().next().into());
        }
        Ok(points)
    }

    pub async fn source_id(&self, point: &EntityId) -> MeterResult<Option<String>> {
        self.graph.source_id(point).await.map_err(MeterError::Topology)
    }
}

/// Bind the effective `DischargeAirTemperature` role of a VAV.
fn apply_discharge_fallback(points: &mut ResolvedPoints, ahu_setpoint: Option<&EntityId>) {
    let binding = match points.binding(PointRole::SupplyAirTemperature) {
        RoleBinding::Resolved(sat) => RoleBinding::Resolved(sat.clone()),
        RoleBinding::Absent => ahu_setpoint.cloned().into(),
    };
    points.bind(PointRole::DischargeAirTemperature, binding);
}
