// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod file_topology;
pub mod influx_series_store;
#[cfg(test)]
pub mod memory_series_store;
pub mod sparql_graph_resolver;
