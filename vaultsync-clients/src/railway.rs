//! Railway platform client (GraphQL v2).
//!
//! Three operations against one service instance:
//!
//! - `variables`: current key/value map
//! - `variableCollectionUpsert`: bulk upsert keyed by variable name
//! - `serviceInstanceRedeploy`: restart with the new variables
//!
//! The upsert only adds and overwrites; keys missing from the submitted
//! set are left in place on the platform.
//!
//! Railway injects its own `RAILWAY_*` variables into every service. They
//! are dropped when the current snapshot is read, so they never show up as
//! deletions against the vault.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use vaultsync_core::config::{RailwayConfig, Secret};
use vaultsync_core::Snapshot;
use vaultsync_sync::{ApplyResult, PlatformTarget, RestartResult, SyncError};

use crate::error::ClientError;
use crate::http;

pub const RAILWAY_GRAPHQL_URL: &str = "https://backboard.railway.app/graphql/v2";
const SERVICE: &str = "railway";
/// Prefix of the variables Railway provides to every service.
pub const PLATFORM_PREFIX: &str = "RAILWAY_";

const VARIABLES_QUERY: &str = "\
query variables($projectId: String!, $environmentId: String!, $serviceId: String) {
  variables(projectId: $projectId, environmentId: $environmentId, serviceId: $serviceId)
}";

const UPSERT_MUTATION: &str = "\
mutation variableCollectionUpsert($input: VariableCollectionUpsertInput!) {
  variableCollectionUpsert(input: $input)
}";

const REDEPLOY_MUTATION: &str = "\
mutation serviceInstanceRedeploy($environmentId: String!, $serviceId: String!) {
  serviceInstanceRedeploy(environmentId: $environmentId, serviceId: $serviceId)
}";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct VariablesData {
    variables: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct UpsertData {
    #[serde(rename = "variableCollectionUpsert")]
    upserted: bool,
}

#[derive(Debug, Deserialize)]
struct RedeployData {
    #[serde(rename = "serviceInstanceRedeploy")]
    redeployed: bool,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct RailwayClient {
    agent: ureq::Agent,
    endpoint: String,
    token: Secret,
    project_id: String,
    environment_id: String,
    service_id: String,
}

impl RailwayClient {
    pub fn new(config: &RailwayConfig, timeout: Duration) -> Self {
        Self::with_endpoint(config, timeout, RAILWAY_GRAPHQL_URL)
    }

    pub fn with_endpoint(config: &RailwayConfig, timeout: Duration, endpoint: &str) -> Self {
        Self {
            agent: http::agent(timeout),
            endpoint: endpoint.to_string(),
            token: config.token.clone(),
            project_id: config.project_id.clone(),
            environment_id: config.environment_id.clone(),
            service_id: config.service_id.clone(),
        }
    }

    fn graphql<T: DeserializeOwned>(&self, query: &str, variables: Value) -> Result<T, ClientError> {
        let body = json!({ "query": query, "variables": variables });
        let response = http::check(
            SERVICE,
            self.agent
                .post(&self.endpoint)
                .set("Authorization", &http::bearer(self.token.expose()))
                .send_json(body),
        )?;
        let text = http::read_body(SERVICE, response)?;
        decode_envelope(&text)
    }

    fn upsert_variables(&self, snapshot: &Snapshot) -> Value {
        json!({
            "input": {
                "projectId": self.project_id,
                "environmentId": self.environment_id,
                "serviceId": self.service_id,
                "variables": variables_object(snapshot),
            }
        })
    }
}

impl PlatformTarget for RailwayClient {
    fn current_snapshot(&self) -> Result<Snapshot, SyncError> {
        let data: VariablesData = self.graphql(
            VARIABLES_QUERY,
            json!({
                "projectId": self.project_id,
                "environmentId": self.environment_id,
                "serviceId": self.service_id,
            }),
        )?;
        Ok(snapshot_from_variables(data.variables))
    }

    fn apply_variables(&self, snapshot: &Snapshot) -> Result<ApplyResult, SyncError> {
        let data: UpsertData = self.graphql(UPSERT_MUTATION, self.upsert_variables(snapshot))?;
        Ok(ApplyResult {
            submitted: snapshot.len(),
            acknowledged: data.upserted,
        })
    }

    fn restart_service(&self) -> Result<RestartResult, SyncError> {
        let data: RedeployData = self.graphql(
            REDEPLOY_MUTATION,
            json!({
                "environmentId": self.environment_id,
                "serviceId": self.service_id,
            }),
        )?;
        Ok(RestartResult {
            acknowledged: data.redeployed,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn decode_envelope<T: DeserializeOwned>(text: &str) -> Result<T, ClientError> {
    let envelope: Envelope<T> =
        serde_json::from_str(text).map_err(|err| ClientError::decode(SERVICE, err))?;
    if !envelope.errors.is_empty() {
        let message = envelope
            .errors
            .into_iter()
            .map(|e| e.message)
            .collect::<Vec<_>>()
            .join("; ");
        return Err(ClientError::GraphQl {
            service: SERVICE,
            message,
        });
    }
    envelope
        .data
        .ok_or_else(|| ClientError::decode(SERVICE, "response carried neither data nor errors"))
}

/// Project the platform's variable map down to id/key/value records,
/// skipping the variables Railway provides itself.
fn snapshot_from_variables(variables: Map<String, Value>) -> Snapshot {
    let before = variables.len();
    let snapshot = Snapshot::from_pairs(
        variables
            .into_iter()
            .filter(|(key, _)| !key.starts_with(PLATFORM_PREFIX))
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => s,
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                (key, value)
            }),
    );
    tracing::debug!(
        "ignoring {} platform-provided variables",
        before - snapshot.len()
    );
    snapshot
}

fn variables_object(snapshot: &Snapshot) -> Map<String, Value> {
    snapshot
        .iter()
        .map(|r| (r.key.clone(), Value::String(r.value.clone())))
        .collect()
}
