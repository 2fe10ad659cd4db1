// Application state for HTTP handlers
use crate::application::meter_service::MeterService;
use crate::infrastructure::config::AnalysisSettings;

#[derive(Clone)]
pub struct AppState {
    pub meter_service: MeterService,
    pub analysis: AnalysisSettings,
}
