// Equipment and point-role domain models
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a topology entity (equipment, zone or point), typically a URI.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key of a sensor in the series store (Brick `bf:srcid`).
pub type SensorId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EquipmentClass {
    #[serde(rename = "AHU")]
    Ahu,
    #[serde(rename = "VAV")]
    Vav,
    #[serde(rename = "HVAC_Zone")]
    HvacZone,
    #[serde(rename = "Chilled_Water_System")]
    ChilledWaterSystem,
}

impl EquipmentClass {
    pub fn brick_class(&self) -> &'static str {
        match self {
            EquipmentClass::Ahu => "AHU",
            EquipmentClass::Vav => "VAV",
            EquipmentClass::HvacZone => "HVAC_Zone",
            EquipmentClass::ChilledWaterSystem => "Chilled_Water_System",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PointRole {
    MixedAirTemperature,
    ReturnAirTemperature,
    OutsideAirTemperature,
    DischargeAirTemperatureSetpoint,
    DischargeAirFlow,
    ZoneTemperature,
    SupplyAirFlow,
    SupplyAirTemperature,
    /// Effective VAV discharge temperature, bound by the resolver's fallback rule rather
    /// than by a Brick class of its own.
    DischargeAirTemperature,
    ChilledWaterFlow,
    ChilledWaterSupplyTemperature,
    ChilledWaterReturnTemperature,
}

impl PointRole {
    /// Brick point class matched for this role. `None` for derived roles.
    pub fn brick_class(&self) -> Option<&'static str> {
        let class = match self {
            PointRole::MixedAirTemperature => "Mixed_Air_Temperature_Sensor",
            PointRole::ReturnAirTemperature => "Return_Air_Temperature_Sensor",
            PointRole::OutsideAirTemperature => "Outside_Air_Temperature_Sensor",
            PointRole::DischargeAirTemperatureSetpoint => "Discharge_Air_Temperature_Setpoint",
            PointRole::DischargeAirFlow => "Discharge_Air_Flow_Sensor",
            PointRole::ZoneTemperature => "Zone_Temperature_Sensor",
            PointRole::SupplyAirFlow => "Supply_Air_Flow_Sensor",
            PointRole::SupplyAirTemperature => "Supply_Air_Temperature_Sensor",
            PointRole::DischargeAirTemperature => return None,
            PointRole::ChilledWaterFlow => "Chilled_Water_Flow_Sensor",
            PointRole::ChilledWaterSupplyTemperature => "Chilled_Water_Supply_Temperature_Sensor",
            PointRole::ChilledWaterReturnTemperature => "Chilled_Water_Return_Temperature_Sensor",
        };
        Some(class)
    }

    /// Query variable name used for this role, e.g. `zone_temperature`.
    pub fn variable(&self) -> &'static str {
        match self {
            PointRole::MixedAirTemperature => "mixed_air_temperature",
            PointRole::ReturnAirTemperature => "return_air_temperature",
            PointRole::OutsideAirTemperature => "outside_air_temperature",
            PointRole::DischargeAirTemperatureSetpoint => "discharge_air_temperature_setpoint",
            PointRole::DischargeAirFlow => "discharge_air_flow",
            PointRole::ZoneTemperature => "zone_temperature",
            PointRole::SupplyAirFlow => "supply_air_flow",
            PointRole::SupplyAirTemperature => "supply_air_temperature",
            PointRole::DischargeAirTemperature => "discharge_air_temperature",
            PointRole::ChilledWaterFlow => "chilled_water_flow",
            PointRole::ChilledWaterSupplyTemperature => "chilled_water_supply_temperature",
            PointRole::ChilledWaterReturnTemperature => "chilled_water_return_temperature",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Required,
    Optional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleSpec {
    pub role: PointRole,
    pub requirement: Requirement,
}

impl RoleSpec {
    pub const fn required(role: PointRole) -> Self {
        Self {
            role,
            requirement: Requirement::Required,
        }
    }

    pub const fn optional(role: PointRole) -> Self {
        Self {
            role,
            requirement: Requirement::Optional,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "point")]
pub enum RoleBinding {
    Resolved(EntityId),
    Absent,
}

impl RoleBinding {
    pub fn point(&self) -> Option<&EntityId> {
        match self {
            RoleBinding::Resolved(id) => Some(id),
            RoleBinding::Absent => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, RoleBinding::Resolved(_))
    }
}

impl From<Option<EntityId>> for RoleBinding {
    fn from(point: Option<EntityId>) -> Self {
        point.map_or(RoleBinding::Absent, RoleBinding::Resolved)
    }
}

/// Typed role → point mapping. Roles never asked for read as `Absent`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResolvedPoints {
    bindings: BTreeMap<PointRole, RoleBinding>,
}

impl ResolvedPoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, role: PointRole, binding: RoleBinding) {
        self.bindings.insert(role, binding);
    }

    pub fn binding(&self, role: PointRole) -> &RoleBinding {
        self.bindings.get(&role).unwrap_or(&RoleBinding::Absent)
    }

    pub fn point(&self, role: PointRole) -> Option<&EntityId> {
        self.binding(role).point()
    }

    /// Roles from `specs` marked required whose binding is absent.
    pub fn missing_required(&self, specs: &[RoleSpec]) -> Vec<PointRole> {
        specs
            .iter()
            .filter(|spec| spec.requirement == Requirement::Required)
            .filter(|spec| !self.binding(spec.role).is_resolved())
            .map(|spec| spec.role)
            .collect()
    }
}

/// A physical unit together with its resolved points.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquipmentNode {
    pub id: EntityId,
    pub class: EquipmentClass,
    pub points: ResolvedPoints,
    /// Required roles left unresolved; a node with any cannot produce an estimate.
    pub unresolved: Vec<PointRole>,
}

impl EquipmentNode {
    pub fn new(id: EntityId, class: EquipmentClass, points: ResolvedPoints, specs: &[RoleSpec]) -> Self {
        let unresolved = points.missing_required(specs);
        Self {
            id,
            class,
            points,
            unresolved,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.unresolved.is_empty()
    }
}
