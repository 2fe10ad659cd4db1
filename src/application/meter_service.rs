// Meter service - Drives one resolution-to-calibration run for an AHU
use crate::application::aggregator::{aggregate_with_compensation, sum_available};
use crate::application::calibrator::{self, Predictor};
use crate::application::graph_resolver::GraphResolver;
use crate::application::point_resolver::{PlantSelection, PointResolver, VavNode};
use crate::application::power_calculator::{
    ahu_cooling_power, ahu_returned_power, plant_thermal_power, vav_cooling_power,
};
use crate::application::series_store::SeriesStore;
use crate::application::time_aligner::align;
use crate::domain::equipment::{EntityId, EquipmentNode, PointRole};
use crate::domain::error::{FetchError, MeterError, MeterResult};
use crate::domain::power::{AlignedSeries, PowerSeries, Quantity};
use crate::domain::report::{CalibrationOutcome, RunReport, VavCoverage, VavOutcome, VavStatus};
use crate::domain::time_grid::{AnalysisWindow, TimeGrid};
use chrono::{DateTime, Duration, Utc};
use futures::future::try_join_all;
use std::sync::Arc;

pub const PLANT_RESPONSE: &str = "plant_thermal_power";
pub const VAV_COOLING_PREDICTOR: &str = "vav_cooling_power";
pub const AHU_RETURNED_PREDICTOR: &str = "ahu_returned_power";
pub const CONSTANT_PREDICTOR: &str = "constant";

/// Per-run state shared by every fetch.
struct RunContext {
    grid: Arc<TimeGrid>,
    fetch_begin: DateTime<Utc>,
    fetch_end: DateTime<Utc>,
}

struct VavResult {
    outcome: VavOutcome,
    power: Option<PowerSeries>,
    supply_airflow: Option<AlignedSeries>,
}

#[derive(Clone)]
pub struct MeterService {
    resolver: PointResolver,
    store: Arc<dyn SeriesStore>,
    fetch_margin: Duration,
    plant: PlantSelection,
}

impl MeterService {
    pub fn new(
        graph: Arc<dyn GraphResolver>,
        store: Arc<dyn SeriesStore>,
        fetch_margin: Duration,
        plant: PlantSelection,
    ) -> Self {
        Self {
            resolver: PointResolver::new(graph),
            store,
            fetch_margin,
            plant,
        }
    }

    pub async fn list_ahus(&self) -> MeterResult<Vec<EntityId>> {
        self.resolver.list_ahus().await
    }

    /// Run the whole pipeline for `ahu` over `window`.
    ///
    /// Missing topology and missing data degrade to unavailable estimates in the report.
    /// Topology or retrieval failures and shape mismatches abort the run.
    pub async fn run(&self, ahu: &EntityId, window: &AnalysisWindow) -> MeterResult<RunReport> {
        if !self.list_ahus().await?.contains(ahu) {
            return Err(MeterError::UnknownEquipment {
                id: ahu.to_string(),
            });
        }

        let grid = Arc::new(TimeGrid::new(window));
        let (fetch_begin, fetch_end) = window.padded(self.fetch_margin);
        let ctx = RunContext {
            grid: grid.clone(),
            fetch_begin,
            fetch_end,
        };
        tracing::info!("Starting run for {} over {} grid points", ahu, grid.len());

        let ahu_node = self.resolver.resolve_ahu(ahu).await?;
        let vavs = self.resolver.resolve_vavs(&ahu_node).await?;
        let plant_node = self.resolver.resolve_plant(&self.plant).await?;

        // Barrier: every VAV reaches a result or an explicit unavailable outcome.
        let vav_results = try_join_all(vavs.iter().map(|vav| self.vav_power(&ctx, vav))).await?;

        let discharge_airflow = match self.load(&ctx, &ahu_node, PointRole::DischargeAirFlow).await? {
            Some(airflow) => Some(airflow),
            None => {
                let supply: Vec<Option<&AlignedSeries>> = vav_results
                    .iter()
                    .map(|r| r.supply_airflow.as_ref())
                    .collect();
                tracing::debug!("{} has no discharge airflow sensor, summing VAV supply airflow", ahu);
                sum_available(&supply)?
            }
        };
        let mixed = self.load(&ctx, &ahu_node, PointRole::MixedAirTemperature).await?;
        let returned = self.load(&ctx, &ahu_node, PointRole::ReturnAirTemperature).await?;
        let discharge = self
            .load(&ctx, &ahu_node, PointRole::DischargeAirTemperatureSetpoint)
            .await?;

        let ahu_cooling = ahu_cooling_power(
            ahu,
            discharge_airflow.as_ref(),
            mixed.as_ref(),
            discharge.as_ref(),
        )?;
        let ahu_returned = ahu_returned_power(
            ahu,
            discharge_airflow.as_ref(),
            returned.as_ref(),
            mixed.as_ref(),
        )?;

        let plant_power = match &plant_node {
            Some(plant) => self.plant_power(&ctx, plant).await?,
            None => None,
        };

        let vav_powers: Vec<Option<&AlignedSeries>> = vav_results
            .iter()
            .map(|r| r.power.as_ref().map(|p| &p.series))
            .collect();
        let aggregate = aggregate_with_compensation(&vav_powers)?;
        if aggregate.available > 0 && aggregate.available < aggregate.total {
            tracing::warn!(
                "Only {} of {} VAVs under {} report cooling power, scaling by {:.3}",
                aggregate.available,
                aggregate.total,
                ahu,
                aggregate.scale.unwrap_or(f64::NAN)
            );
        }
        let coverage = VavCoverage {
            available: aggregate.available,
            total: aggregate.total,
            scale: aggregate.scale,
        };
        let aggregated = aggregate
            .series
            .map(|s| PowerSeries::new(ahu.clone(), Quantity::AggregatedVavCoolingPower, s));

        let calibration = calibrate(
            &grid,
            aggregated.as_ref(),
            ahu_returned.as_ref(),
            plant_power.as_ref(),
        )?;
        match &calibration {
            CalibrationOutcome::Fitted(result) => tracing::info!(
                "Calibrated {} on {} observations, r2={:.4}",
                ahu,
                result.observations,
                result.r_squared
            ),
            CalibrationOutcome::Skipped { reason } => {
                tracing::warn!("Calibration skipped for {}: {}", ahu, reason)
            }
        }

        let mut vav_outcomes = Vec::with_capacity(vav_results.len());
        let mut powers = Vec::new();
        for result in vav_results {
            vav_outcomes.push(result.outcome);
            powers.extend(result.power);
        }
        powers.extend(aggregated);
        powers.extend(ahu_cooling);
        powers.extend(ahu_returned);
        powers.extend(plant_power);

        Ok(RunReport {
            ahu: ahu.clone(),
            ahu_points: ahu_node.points,
            plant: plant_node.map(|p| p.id),
            window: window.clone(),
            timestamps_ms: grid.timestamps_ms().to_vec(),
            powers,
            vavs: vav_outcomes,
            coverage,
            calibration,
        })
    }

    /// Fetch and align the point bound to `role` on `node`.
    ///
    /// `None` when the role is absent, the point has no source id, the store does not
    /// know the sensor, or fewer than two samples fall in the fetch range.
    async fn load(
        &self,
        ctx: &RunContext,
        node: &EquipmentNode,
        role: PointRole,
    ) -> MeterResult<Option<AlignedSeries>> {
        let Some(point) = node.points.point(role) else {
            tracing::debug!("{} has no {:?} point", node.id, role);
            return Ok(None);
        };
        let Some(sensor) = self.resolver.source_id(point).await? else {
            tracing::warn!("Point {} ({:?} of {}) has no source id", point, role, node.id);
            return Ok(None);
        };

        let raw = match self.store.fetch(&sensor, ctx.fetch_begin, ctx.fetch_end).await {
            Ok(raw) => raw,
            Err(FetchError::NotFound { sensor }) => {
                tracing::warn!("Sensor {} ({:?} of {}) not found", sensor, role, node.id);
                return Ok(None);
            }
            Err(FetchError::Retrieval { sensor, source }) => {
                return Err(MeterError::Retrieval { sensor, source });
            }
        };

        let aligned = align(&raw, &ctx.grid);
        if aligned.is_none() {
            tracing::debug!(
                "Sensor {} ({:?} of {}) has {} samples in range, treating as unavailable",
                sensor,
                role,
                node.id,
                raw.len()
            );
        }
        Ok(aligned)
    }

    async fn vav_power(&self, ctx: &RunContext, vav: &VavNode) -> MeterResult<VavResult> {
        let node = &vav.node;
        // Supply airflow also feeds the AHU airflow total, even for unresolved VAVs.
        let supply_airflow = self.load(ctx, node, PointRole::SupplyAirFlow).await?;

        if !node.is_resolved() {
            return Ok(VavResult {
                outcome: VavOutcome {
                    vav: node.id.clone(),
                    zone: vav.zone.clone(),
                    status: VavStatus::Unresolved {
                        roles: node.unresolved.clone(),
                    },
                },
                power: None,
                supply_airflow,
            });
        }

        let zone_temp = self.load(ctx, node, PointRole::ZoneTemperature).await?;
        let discharge_temp = self.load(ctx, node, PointRole::DischargeAirTemperature).await?;

        let power = vav_cooling_power(
            &node.id,
            supply_airflow.as_ref(),
            zone_temp.as_ref(),
            discharge_temp.as_ref(),
        )?;

        let status = if power.is_some() {
            VavStatus::Available
        } else {
            let roles = [
                (PointRole::SupplyAirFlow, supply_airflow.is_some()),
                (PointRole::ZoneTemperature, zone_temp.is_some()),
                (PointRole::DischargeAirTemperature, discharge_temp.is_some()),
            ]
            .into_iter()
            .filter(|(_, present)| !present)
            .map(|(role, _)| role)
            .collect();
            VavStatus::NoData { roles }
        };

        Ok(VavResult {
            outcome: VavOutcome {
                vav: node.id.clone(),
                zone: vav.zone.clone(),
                status,
            },
            power,
            supply_airflow,
        })
    }

    async fn plant_power(&self, ctx: &RunContext, plant: &EquipmentNode) -> MeterResult<Option<PowerSeries>> {
        if !plant.is_resolved() {
            tracing::warn!("Plant {} has unresolved roles {:?}", plant.id, plant.unresolved);
            return Ok(None);
        }
        let flow = self.load(ctx, plant, PointRole::ChilledWaterFlow).await?;
        let return_temp = self.load(ctx, plant, PointRole::ChilledWaterReturnTemperature).await?;
        let supply_temp = self.load(ctx, plant, PointRole::ChilledWaterSupplyTemperature).await?;

        plant_thermal_power(&plant.id, flow.as_ref(), return_temp.as_ref(), supply_temp.as_ref())
    }
}

/// Fit plant power against the aggregated VAV power, the AHU returned power and a
/// constant. Missing inputs or a degenerate design skip the fit with a reason.
fn calibrate(
    grid: &Arc<TimeGrid>,
    aggregated: Option<&PowerSeries>,
    returned: Option<&PowerSeries>,
    plant: Option<&PowerSeries>,
) -> MeterResult<CalibrationOutcome> {
    let skipped = |reason: &str| {
        Ok(CalibrationOutcome::Skipped {
            reason: reason.to_string(),
        })
    };
    let Some(aggregated) = aggregated else {
        return skipped("no VAV cooling power available");
    };
    let Some(returned) = returned else {
        return skipped("no AHU returned power available");
    };
    let Some(plant) = plant else {
        return skipped("no plant thermal power available");
    };

    let constant = AlignedSeries::constant(grid.clone(), 1.0);
    let fit = calibrator::fit(
        PLANT_RESPONSE,
        &plant.series,
        &[
            Predictor::new(VAV_COOLING_PREDICTOR, &aggregated.series),
            Predictor::new(AHU_RETURNED_PREDICTOR, &returned.series),
            Predictor::new(CONSTANT_PREDICTOR, &constant),
        ],
    );

    match fit {
        Ok(result) => Ok(CalibrationOutcome::Fitted(result)),
        Err(e @ (MeterError::InsufficientSamples { .. } | MeterError::SingularDesign { .. })) => {
            Ok(CalibrationOutcome::Skipped {
                reason: e.to_string(),
            })
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::telemetry::TimeSeriesPoint;
    use crate::infrastructure::file_topology::FileTopology;
    use crate::infrastructure::memory_series_store::MemorySeriesStore;
    use chrono::TimeZone;

    const POINTS: usize = 12;

    const TOPOLOGY: &str = r#"{
        "entities": [
            {"id": "ahu1", "class": "AHU", "feeds": ["vav1", "vav2", "vav3", "vav4"]},
            {"id": "ahu2", "class": "AHU", "feeds": ["vav5"]},
            {"id": "vav1", "class": "VAV", "feeds": ["zone1"]},
            {"id": "vav2", "class": "VAV", "feeds": ["zone2"]},
            {"id": "vav3", "class": "VAV", "feeds": ["zone3"]},
            {"id": "vav4", "class": "VAV", "feeds": ["zone4"]},
            {"id": "vav5", "class": "VAV"},
            {"id": "zone1", "class": "HVAC_Zone"},
            {"id": "zone2", "class": "HVAC_Zone"},
            {"id": "zone3", "class": "HVAC_Zone"},
            {"id": "zone4", "class": "HVAC_Zone"},
            {"id": "cws", "class": "Chilled_Water_System"}
        ],
        "points": [
            {"id": "ahu1_mat", "class": "Mixed_Air_Temperature_Sensor", "point_of": "ahu1", "srcid": "mat"},
            {"id": "ahu1_rat", "class": "Return_Air_Temperature_Sensor", "point_of": "ahu1", "srcid": "rat"},
            {"id": "ahu1_dat", "class": "Discharge_Air_Temperature_Setpoint", "point_of": "ahu1", "srcid": "dat"},
            {"id": "ahu1_oat", "class": "Outside_Air_Temperature_Sensor", "point_of": "ahu1", "srcid": "oat"},
            {"id": "ahu2_mat", "class": "Mixed_Air_Temperature_Sensor", "point_of": "ahu2", "srcid": "mat"},
            {"id": "ahu2_rat", "class": "Return_Air_Temperature_Sensor", "point_of": "ahu2", "srcid": "rat"},
            {"id": "ahu2_daf", "class": "Discharge_Air_Flow_Sensor", "point_of": "ahu2", "srcid": "daf2"},
            {"id": "vav1_znt", "class": "Zone_Temperature_Sensor", "point_of": "vav1", "srcid": "znt1"},
            {"id": "vav1_saf", "class": "Supply_Air_Flow_Sensor", "point_of": "vav1", "srcid": "saf1"},
            {"id": "vav1_sat", "class": "Supply_Air_Temperature_Sensor", "point_of": "vav1", "srcid": "sat1"},
            {"id": "vav2_znt", "class": "Zone_Temperature_Sensor", "point_of": "vav2", "srcid": "znt2"},
            {"id": "vav2_saf", "class": "Supply_Air_Flow_Sensor", "point_of": "vav2", "srcid": "saf2"},
            {"id": "vav3_znt", "class": "Zone_Temperature_Sensor", "point_of": "vav3", "srcid": "znt3"},
            {"id": "vav3_saf", "class": "Supply_Air_Flow_Sensor", "point_of": "vav3", "srcid": "saf3"},
            {"id": "vav4_znt", "class": "Zone_Temperature_Sensor", "point_of": "vav4", "srcid": "znt4"},
            {"id": "vav4_saf", "class": "Supply_Air_Flow_Sensor", "point_of": "vav4", "srcid": "saf4"},
            {"id": "cwf", "class": "Chilled_Water_Flow_Sensor", "point_of": "cws", "srcid": "cwf"},
            {"id": "cwst", "class": "Chilled_Water_Supply_Temperature_Sensor", "point_of": "cws", "srcid": "cwst"},
            {"id": "cwrt", "class": "Chilled_Water_Return_Temperature_Sensor", "point_of": "cws", "srcid": "cwrt"}
        ]
    }"#;

    fn begin() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2018, 4, 6, 0, 0, 0).unwrap()
    }

    fn window() -> AnalysisWindow {
        AnalysisWindow::new(
            begin(),
            begin() + Duration::minutes(5 * (POINTS as i64 - 1)),
            Duration::minutes(5),
        )
        .unwrap()
    }

    /// One sample per grid point.
    fn sampled(f: impl Fn(usize) -> f64) -> Vec<TimeSeriesPoint> {
        let t0 = begin().timestamp_millis();
        (0..POINTS)
            .map(|i| TimeSeriesPoint::new(t0 + i as i64 * 300_000, f(i)))
            .collect()
    }

    fn saf(k: usize, i: usize) -> f64 {
        100.0 + 10.0 * k as f64 + (i * (k + 1)) as f64
    }
    fn znt(k: usize, i: usize) -> f64 {
        24.0 + 0.1 * k as f64 * (i % 3) as f64
    }
    fn ahu_dat(i: usize) -> f64 {
        13.0 + 0.2 * (i % 4) as f64
    }
    fn sat1(_i: usize) -> f64 {
        14.0
    }
    fn mat(i: usize) -> f64 {
        20.0 + 0.5 * (i % 5) as f64
    }
    fn rat(i: usize) -> f64 {
        24.0 + 0.3 * (i % 2) as f64
    }

    /// Expected aggregate with vav4 missing: 4/3 of the three reporting VAVs.
    fn aggregated(i: usize) -> f64 {
        let vav1 = saf(1, i) * (znt(1, i) - sat1(i));
        let vav2 = saf(2, i) * (znt(2, i) - ahu_dat(i));
        let vav3 = saf(3, i) * (znt(3, i) - ahu_dat(i));
        (vav1 + vav2 + vav3) * 4.0 / 3.0
    }

    fn returned(i: usize) -> f64 {
        let airflow = saf(1, i) + saf(2, i) + saf(3, i);
        airflow * (rat(i) - mat(i))
    }

    fn store() -> MemorySeriesStore {
        // Return minus supply is a constant 5, so flow carries the model exactly.
        MemorySeriesStore::new()
            .with_series("znt1", sampled(|i| znt(1, i)))
            .with_series("saf1", sampled(|i| saf(1, i)))
            .with_series("sat1", sampled(sat1))
            .with_series("znt2", sampled(|i| znt(2, i)))
            .with_series("saf2", sampled(|i| saf(2, i)))
            .with_series("znt3", sampled(|i| znt(3, i)))
            .with_series("saf3", sampled(|i| saf(3, i)))
            .with_series("znt4", sampled(|i| znt(4, i)))
            .with_series("saf4", vec![])
            .with_series("dat", sampled(ahu_dat))
            .with_series("mat", sampled(mat))
            .with_series("rat", sampled(rat))
            .with_series("daf2", sampled(|_| 50.0))
            .with_series("cwst", sampled(|_| 7.0))
            .with_series("cwrt", sampled(|_| 12.0))
            .with_series(
                "cwf",
                sampled(|i| (2.0 * aggregated(i) + 3.0 * returned(i) + 5.0) / 5.0),
            )
    }

    fn service_with(topology: &str, store: MemorySeriesStore, plant: PlantSelection) -> MeterService {
        let topology = FileTopology::from_json(topology).unwrap();
        MeterService::new(Arc::new(topology), Arc::new(store), Duration::minutes(60), plant)
    }

    fn service(store: MemorySeriesStore) -> MeterService {
        service_with(TOPOLOGY, store, PlantSelection::default())
    }

    /// The same building with its chilled water sensors attached to the building rather
    /// than to a plant entity, plus a second flow meter that has no data.
    fn building_wide_topology() -> String {
        TOPOLOGY
            .replace(
                r#"{"id": "cws", "class": "Chilled_Water_System"}"#,
                r#"{"id": "building", "class": "Building"}"#,
            )
            .replace(r#""point_of": "cws""#, r#""point_of": "building""#)
            .replace(
                r#""point_of": "building", "srcid": "cwf"}"#,
                r#""point_of": "building", "srcid": "ION-cwf"},
            {"id": "bms_cwf", "class": "Chilled_Water_Flow_Sensor", "point_of": "building", "srcid": "bms-cwf"}"#,
            )
    }

    #[tokio::test]
    async fn test_full_run_calibrates() {
        let report = service(store())
            .run(&EntityId::new("ahu1"), &window())
            .await
            .unwrap();

        assert_eq!(report.timestamps_ms.len(), POINTS);
        assert_eq!(report.plant, Some(EntityId::new("cws")));
        assert_eq!(
            report.coverage,
            VavCoverage {
                available: 3,
                total: 4,
                scale: Some(4.0 / 3.0)
            }
        );

        let vav4 = report.vavs.iter().find(|v| v.vav.as_str() == "vav4").unwrap();
        assert_eq!(
            vav4.status,
            VavStatus::NoData {
                roles: vec![PointRole::SupplyAirFlow]
            }
        );

        let CalibrationOutcome::Fitted(result) = &report.calibration else {
            panic!("expected a fit, got {:?}", report.calibration);
        };
        assert!((result.coefficient(VAV_COOLING_PREDICTOR).unwrap() - 2.0).abs() < 1e-6);
        assert!((result.coefficient(AHU_RETURNED_PREDICTOR).unwrap() - 3.0).abs() < 1e-6);
        assert!((result.coefficient(CONSTANT_PREDICTOR).unwrap() - 5.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_vav_uses_its_own_supply_air_temperature() {
        let report = service(store())
            .run(&EntityId::new("ahu1"), &window())
            .await
            .unwrap();

        let vav1 = report
            .power(Quantity::VavCoolingPower)
            .find(|p| p.node.as_str() == "vav1")
            .unwrap();
        for (i, value) in vav1.series.values().iter().enumerate() {
            let expected = saf(1, i) * (znt(1, i) - sat1(i));
            assert!((value - expected).abs() < 1e-9);
        }

        let aggregate = report.power(Quantity::AggregatedVavCoolingPower).next().unwrap();
        assert!((aggregate.series.values()[3] - aggregated(3)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_direct_discharge_airflow_preferred() {
        let report = service(store())
            .run(&EntityId::new("ahu2"), &window())
            .await
            .unwrap();

        let returned = report.power(Quantity::AhuReturnedPower).next().unwrap();
        for (i, value) in returned.series.values().iter().enumerate() {
            assert!((value - 50.0 * (rat(i) - mat(i))).abs() < 1e-9);
        }

        // vav5 has no points at all.
        assert_eq!(report.coverage.available, 0);
        assert_eq!(report.coverage.total, 1);
        assert_eq!(
            report.calibration,
            CalibrationOutcome::Skipped {
                reason: "no VAV cooling power available".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_missing_plant_data_skips_calibration() {
        let store = store().with_series("cwf", vec![]);
        let report = service(store)
            .run(&EntityId::new("ahu1"), &window())
            .await
            .unwrap();

        assert_eq!(report.power(Quantity::PlantThermalPower).count(), 0);
        assert_eq!(
            report.calibration,
            CalibrationOutcome::Skipped {
                reason: "no plant thermal power available".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_retrieval_failure_aborts_run() {
        let store = store().with_failure("cwrt");
        let result = service(store).run(&EntityId::new("ahu1"), &window()).await;

        assert!(matches!(
            result,
            Err(MeterError::Retrieval { ref sensor, .. }) if sensor == "cwrt"
        ));
    }

    #[tokio::test]
    async fn test_outside_air_point_reported() {
        let report = service(store())
            .run(&EntityId::new("ahu1"), &window())
            .await
            .unwrap();

        assert_eq!(
            report.ahu_points.point(PointRole::OutsideAirTemperature),
            Some(&EntityId::new("ahu1_oat"))
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(
            json["ahu_points"]["outside_air_temperature"]["point"],
            "ahu1_oat"
        );
    }

    #[tokio::test]
    async fn test_unknown_sensor_treated_as_unavailable() {
        let store = store().without_series("saf2");
        let report = service(store)
            .run(&EntityId::new("ahu1"), &window())
            .await
            .unwrap();

        let vav2 = report.vavs.iter().find(|v| v.vav.as_str() == "vav2").unwrap();
        assert_eq!(
            vav2.status,
            VavStatus::NoData {
                roles: vec![PointRole::SupplyAirFlow]
            }
        );
        assert_eq!(
            report.coverage,
            VavCoverage {
                available: 2,
                total: 4,
                scale: Some(2.0)
            }
        );

        let aggregate = report.power(Quantity::AggregatedVavCoolingPower).next().unwrap();
        let expected = 2.0
            * (saf(1, 0) * (znt(1, 0) - sat1(0)) + saf(3, 0) * (znt(3, 0) - ahu_dat(0)));
        assert!((aggregate.series.values()[0] - expected).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_building_wide_chilled_water_sensors_calibrate() {
        let store = store().with_series(
            "ION-cwf",
            sampled(|i| (2.0 * aggregated(i) + 3.0 * returned(i) + 5.0) / 5.0),
        );
        let plant = PlantSelection {
            entity: None,
            srcid_contains: Some("ION".to_string()),
        };
        let report = service_with(&building_wide_topology(), store, plant)
            .run(&EntityId::new("ahu1"), &window())
            .await
            .unwrap();

        assert_eq!(report.plant, Some(EntityId::new("cwf")));
        let CalibrationOutcome::Fitted(result) = &report.calibration else {
            panic!("expected a fit, got {:?}", report.calibration);
        };
        assert!((result.coefficient(VAV_COOLING_PREDICTOR).unwrap() - 2.0).abs() < 1e-6);
        assert!((result.coefficient(AHU_RETURNED_PREDICTOR).unwrap() - 3.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_unknown_ahu_rejected() {
        let result = service(store()).run(&EntityId::new("vav1"), &window()).await;
        assert!(matches!(result, Err(MeterError::UnknownEquipment { .. })));
    }

    #[tokio::test]
    async fn test_list_ahus() {
        let ahus = service(store()).list_ahus().await.unwrap();
        assert_eq!(ahus, vec![EntityId::new("ahu1"), EntityId::new("ahu2")]);
    }
}
