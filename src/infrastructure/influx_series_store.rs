// InfluxDB series store implementation
use crate::application::series_store::SeriesStore;
use crate::domain::error::FetchError;
use crate::domain::telemetry::{RawSeries, TimeSeriesPoint};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct InfluxSeriesStore {
    host: String,
    token: String,
    database: String,
    retention_policy: String,
    measurement: String,
    tag_key: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct InfluxQLResponse {
    results: Vec<InfluxQLResult>,
}

#[derive(Debug, Deserialize)]
struct InfluxQLResult {
    #[serde(default)]
    series: Option<Vec<InfluxQLSeries>>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InfluxQLSeries {
    #[allow(dead_code)]
    name: String,
    columns: Vec<String>,
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

/// Connection settings, grouped to keep the constructor readable.
#[derive(Debug, Clone)]
pub struct InfluxConnection {
    pub host: String,
    pub token: String,
    pub database: String,
    pub retention_policy: String,
    pub measurement: String,
    pub tag_key: String,
    pub timeout: Duration,
}

impl InfluxSeriesStore {
    pub fn new(connection: InfluxConnection) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(connection.timeout)
            .build()
            .context("Failed to build InfluxDB HTTP client")?;
        Ok(Self {
            host: connection.host.trim_end_matches('/').to_string(),
            token: connection.token,
            database: connection.database,
            retention_policy: connection.retention_policy,
            measurement: connection.measurement,
            tag_key: connection.tag_key,
            client,
        })
    }

    fn build_query_url(&self, query: &str) -> String {
        let encoded_query = urlencoding::encode(query);
        format!(
            "{}/query?db={}&rp={}&epoch=ms&q={}",
            self.host, self.database, self.retention_policy, encoded_query
        )
    }

    async fn execute_query(&self, query: &str) -> Result<InfluxQLResponse> {
        tracing::debug!("Executing InfluxQL query: {}", query);
        let url = self.build_query_url(query);

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Token {}", self.token))
            .header("Accept", "application/json")
            .send()
            .await
            .context("Failed to send request to InfluxDB")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("InfluxDB query failed with status {}: {}", status, body);
        }

        let data = response
            .json::<InfluxQLResponse>()
            .await
            .context("Failed to parse InfluxDB response")?;

        if let Some(result) = data.results.first() {
            if let Some(error) = &result.error {
                anyhow::bail!("InfluxDB query error: {}", error);
            }
        }

        Ok(data)
    }

    fn series_query(&self, sensor_id: &str, begin: DateTime<Utc>, end: DateTime<Utc>) -> String {
        format!(
            "SELECT \"value\" FROM \"{}\" WHERE \"{}\" = '{}' AND time >= '{}' AND time <= '{}'",
            self.measurement,
            self.tag_key,
            escape_literal(sensor_id),
            begin.to_rfc3339_opts(SecondsFormat::Secs, true),
            end.to_rfc3339_opts(SecondsFormat::Secs, true),
        )
    }

    fn tag_query(&self, sensor_id: &str) -> String {
        format!(
            "SHOW TAG VALUES FROM \"{m}\" WITH KEY = \"{k}\" WHERE \"{k}\" = '{v}'",
            m = self.measurement,
            k = self.tag_key,
            v = escape_literal(sensor_id),
        )
    }

    async fn sensor_exists(&self, sensor_id: &str) -> Result<bool> {
        let response = self.execute_query(&self.tag_query(sensor_id)).await?;
        Ok(parse_tag_exists(&response))
    }
}

fn escape_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Whether a `SHOW TAG VALUES` response lists any value.
fn parse_tag_exists(response: &InfluxQLResponse) -> bool {
    response
        .results
        .first()
        .and_then(|r| r.series.as_ref())
        .is_some_and(|series| series.iter().any(|s| !s.values.is_empty()))
}

/// Collect `(time, value)` rows of every returned series. Rows whose value is not
/// numeric are skipped.
fn parse_points(response: &InfluxQLResponse) -> Vec<TimeSeriesPoint> {
    let mut points = Vec::new();
    if let Some(result) = response.results.first() {
        if let Some(series) = &result.series {
            for s in series {
                let time_idx = s.columns.iter().position(|c| c == "time").unwrap_or(0);
                let value_idx = s.columns.iter().position(|c| c == "value").unwrap_or(1);

                for value_row in &s.values {
                    let time = value_row.get(time_idx).and_then(|v| v.as_i64());
                    let value = value_row.get(value_idx).and_then(|v| v.as_f64());
                    if let (Some(time_ms), Some(value)) = (time, value) {
                        points.push(TimeSeriesPoint::new(time_ms, value));
                    }
                }
            }
        }
    }
    points
}

#[async_trait]
impl SeriesStore for InfluxSeriesStore {
    async fn fetch(
        &self,
        sensor_id: &str,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<RawSeries, FetchError> {
        let retrieval = |source: anyhow::Error| FetchError::Retrieval {
            sensor: sensor_id.to_string(),
            source,
        };

        let query = self.series_query(sensor_id, begin, end);
        let response = self.execute_query(&query).await.map_err(retrieval)?;
        let points = parse_points(&response);

        if points.is_empty() && !self.sensor_exists(sensor_id).await.map_err(retrieval)? {
            return Err(FetchError::NotFound {
                sensor: sensor_id.to_string(),
            });
        }

        tracing::debug!("Fetched {} samples for sensor {}", points.len(), sensor_id);
        Ok(RawSeries::from_points(points))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn store() -> InfluxSeriesStore {
        InfluxSeriesStore::new(InfluxConnection {
            host: "http://influx:8086/".to_string(),
            token: "t".to_string(),
            database: "building".to_string(),
            retention_policy: "autogen".to_string(),
            measurement: "timeseries".to_string(),
            tag_key: "srcid".to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn test_series_query() {
        let begin = Utc.with_ymd_and_hms(2018, 4, 6, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2018, 4, 14, 0, 0, 0).unwrap();
        let query = store().series_query("506_0_3000485", begin, end);

        assert_eq!(
            query,
            "SELECT \"value\" FROM \"timeseries\" WHERE \"srcid\" = '506_0_3000485' \
             AND time >= '2018-04-06T00:00:00Z' AND time <= '2018-04-14T00:00:00Z'"
        );
    }

    #[test]
    fn test_literal_is_escaped() {
        let query = store().tag_query("a'b");
        assert!(query.ends_with("WHERE \"srcid\" = 'a\\'b'"));
    }

    #[test]
    fn test_url_requests_epoch_millis() {
        let url = store().build_query_url("SHOW MEASUREMENTS");
        assert_eq!(
            url,
            "http://influx:8086/query?db=building&rp=autogen&epoch=ms&q=SHOW%20MEASUREMENTS"
        );
    }

    #[test]
    fn test_parse_points_skips_null_values() {
        let body = r#"{"results": [{"series": [{
            "name": "timeseries",
            "columns": ["time", "value"],
            "values": [[1523000000000, 21.5], [1523000300000, null], [1523000600000, 22]]
        }]}]}"#;
        let response: InfluxQLResponse = serde_json::from_str(body).unwrap();
        let points = parse_points(&response);

        assert_eq!(
            points,
            vec![
                TimeSeriesPoint::new(1523000000000, 21.5),
                TimeSeriesPoint::new(1523000600000, 22.0),
            ]
        );
    }

    #[test]
    fn test_empty_result_has_no_points() {
        let response: InfluxQLResponse =
            serde_json::from_str(r#"{"results": [{"statement_id": 0}]}"#).unwrap();
        assert!(parse_points(&response).is_empty());
    }

    #[test]
    fn test_tag_values_decide_existence() {
        let known: InfluxQLResponse = serde_json::from_str(
            r#"{"results": [{"statement_id": 0, "series": [{
                "name": "timeseries",
                "columns": ["key", "value"],
                "values": [["srcid", "506_0_3000485"]]
            }]}]}"#,
        )
        .unwrap();
        assert!(parse_tag_exists(&known));

        let unknown: InfluxQLResponse =
            serde_json::from_str(r#"{"results": [{"statement_id": 0}]}"#).unwrap();
        assert!(!parse_tag_exists(&unknown));

        let empty_series: InfluxQLResponse = serde_json::from_str(
            r#"{"results": [{"series": [{"name": "timeseries", "columns": ["key", "value"], "values": []}]}]}"#,
        )
        .unwrap();
        assert!(!parse_tag_exists(&empty_series));
    }
}
