// SPARQL graph resolver - Brick topology queries over HTTP
use crate::application::graph_resolver::GraphResolver;
use crate::domain::equipment::{
    EntityId, EquipmentClass, PointRole, ResolvedPoints, RoleBinding, RoleSpec, SensorId,
};
use crate::domain::topology::QueryRows;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

const PREFIXES: &str = "\
PREFIX rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#>
PREFIX rdfs: <http://www.w3.org/2000/01/rdf-schema#>
PREFIX brick: <https://brickschema.org/schema/1.0.2/Brick#>
PREFIX bf: <https://brickschema.org/schema/1.0.2/BrickFrame#>
";

#[derive(Debug, Clone)]
pub struct SparqlGraphResolver {
    endpoint: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SparqlResponse {
    head: SparqlHead,
    results: SparqlResults,
}

#[derive(Debug, Deserialize)]
struct SparqlHead {
    #[serde(default)]
    vars: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SparqlResults {
    bindings: Vec<HashMap<String, SparqlTerm>>,
}

#[derive(Debug, Deserialize)]
struct SparqlTerm {
    #[serde(rename = "type")]
    #[allow(dead_code)]
    kind: String,
    value: String,
}

impl SparqlResponse {
    fn into_rows(self) -> QueryRows {
        let variables = self.head.vars;
        let rows = self
            .results
            .bindings
            .into_iter()
            .map(|mut binding| {
                variables
                    .iter()
                    .map(|var| binding.remove(var).map(|term| EntityId::new(term.value)))
                    .collect()
            })
            .collect();
        QueryRows::new(variables, rows)
    }
}

impl SparqlGraphResolver {
    pub fn new(endpoint: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build SPARQL HTTP client")?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn build_query_url(&self, query: &str) -> String {
        let full = format!("{}{}", PREFIXES, query);
        format!("{}?query={}", self.endpoint, urlencoding::encode(&full))
    }

    async fn select(&self, query: &str) -> Result<QueryRows> {
        tracing::debug!("Executing SPARQL query: {}", query);
        let url = self.build_query_url(query);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/sparql-results+json")
            .send()
            .await
            .context("Failed to send request to SPARQL endpoint")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("SPARQL query failed with status {}: {}", status, body);
        }

        let data = response
            .json::<SparqlResponse>()
            .await
            .context("Failed to parse SPARQL response")?;

        Ok(data.into_rows())
    }
}

fn iri(id: &EntityId) -> String {
    format!("<{}>", id.as_str())
}

fn class_query(class: &str) -> String {
    format!("SELECT ?e WHERE {{ ?e a/rdfs:subClassOf* brick:{} . }}", class)
}

fn points_query(entity: &EntityId, role_specs: &[RoleSpec]) -> Option<String> {
    let mut vars = Vec::new();
    let mut blocks = Vec::new();
    for spec in role_specs {
        let Some(class) = spec.role.brick_class() else {
            continue;
        };
        let var = spec.role.variable();
        vars.push(format!("?{}", var));
        blocks.push(format!(
            "  OPTIONAL {{ ?{var} a brick:{class} . ?{var} bf:isPointOf {entity} . }}",
            var = var,
            class = class,
            entity = iri(entity)
        ));
    }
    if vars.is_empty() {
        return None;
    }
    Some(format!(
        "SELECT {} WHERE {{\n{}\n}}",
        vars.join(" "),
        blocks.join("\n")
    ))
}

#[async_trait]
impl GraphResolver for SparqlGraphResolver {
    async fn list_equipment_of_class(&self, class: EquipmentClass) -> Result<BTreeSet<EntityId>> {
        let rows = self.select(&class_query(class.brick_class())).await?;
        Ok(rows.values("e").into_iter().collect())
    }

    async fn feeds(&self, parent: &EntityId, transitive: bool) -> Result<BTreeSet<EntityId>> {
        let path = if transitive { "bf:feeds+" } else { "bf:feeds" };
        let query = format!("SELECT ?e WHERE {{ {} {} ?e . }}", iri(parent), path);
        let rows = self.select(&query).await?;
        Ok(rows.values("e").into_iter().collect())
    }

    async fn resolve_points(&self, entity: &EntityId, role_specs: &[RoleSpec]) -> Result<ResolvedPoints> {
        let mut resolved = ResolvedPoints::new();
        let rows = match points_query(entity, role_specs) {
            Some(query) => self.select(&query).await?,
            None => QueryRows::default(),
        };

        for spec in role_specs {
            // Independent OPTIONAL blocks multiply: each role's candidates appear across rows.
            let mut candidates = rows.values(spec.role.variable());
            candidates.sort();
            if candidates.len() > 1 {
                tracing::warn!(
                    "Several points for {:?} on {}, using {}",
                    spec.role,
                    entity,
                    candidates[0]
                );
            }
            let binding: RoleBinding = candidates.into_iter().next().into();
            resolved.bind(spec.role, binding);
        }
        Ok(resolved)
    }

    async fn points_of_role(&self, role: PointRole) -> Result<BTreeSet<EntityId>> {
        let Some(class) = role.brick_class() else {
            return Ok(BTreeSet::new());
        };
        let rows = self.select(&class_query(class)).await?;
        Ok(rows.values("e").into_iter().collect())
    }

    async fn source_id(&self, point: &EntityId) -> Result<Option<SensorId>> {
        let query = format!("SELECT ?srcid WHERE {{ {} bf:srcid ?srcid . }}", iri(point));
        let rows = self.select(&query).await?;
        Ok(rows
            .values("srcid")
            .into_iter()
            .next()
            .map(|id| id.as_str().to_string()))
    }
}
