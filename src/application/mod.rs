// Application layer - Pipeline stages and the collaborator traits they consume
pub mod aggregator;
pub mod calibrator;
pub mod graph_resolver;
pub mod meter_service;
pub mod point_resolver;
pub mod power_calculator;
pub mod series_store;
pub mod time_aligner;
