// Power calculator - Flow times temperature difference per equipment class
use crate::domain::equipment::EntityId;
use crate::domain::error::MeterResult;
use crate::domain::power::{AlignedSeries, PowerSeries, Quantity};

/// `flow × (hot − cold)`, elementwise. Any missing input means no power for the node.
fn flow_times_delta(
    node: &EntityId,
    quantity: Quantity,
    flow: Option<&AlignedSeries>,
    hot: Option<&AlignedSeries>,
    cold: Option<&AlignedSeries>,
) -> MeterResult<Option<PowerSeries>> {
    let (Some(flow), Some(hot), Some(cold)) = (flow, hot, cold) else {
        return Ok(None);
    };

    let what = format!("{:?} inputs of {}", quantity, node);
    let delta = hot.zip_with(cold, &what, |h, c| h - c)?;
    let power = flow.zip_with(&delta, &what, |f, d| f * d)?;

    Ok(Some(PowerSeries::new(node.clone(), quantity, power)))
}

/// discharge airflow × (mixed-air temperature − discharge-air temperature)
pub fn ahu_cooling_power(
    ahu: &EntityId,
    discharge_airflow: Option<&AlignedSeries>,
    mixed_air_temp: Option<&AlignedSeries>,
    discharge_air_temp: Option<&AlignedSeries>,
) -> MeterResult<Option<PowerSeries>> {
    flow_times_delta(
        ahu,
        Quantity::AhuCoolingPower,
        discharge_airflow,
        mixed_air_temp,
        discharge_air_temp,
    )
}

/// discharge airflow × (return-air temperature − mixed-air temperature)
pub fn ahu_returned_power(
    ahu: &EntityId,
    discharge_airflow: Option<&AlignedSeries>,
    return_air_temp: Option<&AlignedSeries>,
    mixed_air_temp: Option<&AlignedSeries>,
) -> MeterResult<Option<PowerSeries>> {
    flow_times_delta(
        ahu,
        Quantity::AhuReturnedPower,
        discharge_airflow,
        return_air_temp,
        mixed_air_temp,
    )
}

/// supply airflow × (zone temperature − discharge-air temperature)
///
/// Positive while the zone is warmer than the air delivered to it.
pub fn vav_cooling_power(
    vav: &EntityId,
    supply_airflow: Option<&AlignedSeries>,
    zone_temp: Option<&AlignedSeries>,
    discharge_air_temp: Option<&AlignedSeries>,
) -> MeterResult<Option<PowerSeries>> {
    flow_times_delta(
        vav,
        Quantity::VavCoolingPower,
        supply_airflow,
        zone_temp,
        discharge_air_temp,
    )
}

/// chilled-water flow × (return temperature − supply temperature)
pub fn plant_thermal_power(
    plant: &EntityId,
    flow: Option<&AlignedSeries>,
    return_temp: Option<&AlignedSeries>,
    supply_temp: Option<&AlignedSeries>,
) -> MeterResult<Option<PowerSeries>> {
    flow_times_delta(
        plant,
        Quantity::PlantThermalPower,
        flow,
        return_temp,
        supply_temp,
    )
}
