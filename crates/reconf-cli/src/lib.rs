//! File-driven front end for the reconfigure server
//!
//! Loads a property tree, an optional schema and an optional server config
//! from disk, then either describes the resulting schema or applies one
//! request. Output is JSON.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

use anyhow::{Context, Result};
use reconf_property::{share, PropertyBag};
use reconf_protocol::ConfigMessage;
use reconf_schema::Schema;
use reconf_server::{ReconfigureServer, ServerConfig};
use serde_json::{json, Value};
use std::path::Path;

/// Files an invocation works on
#[derive(Debug, Clone, Copy)]
pub struct Inputs<'a> {
    /// Property tree (YAML or JSON)
    pub properties: &'a Path,
    /// Schema document; derived from the properties when absent
    pub schema: Option<&'a Path>,
    /// Server config (TOML or YAML)
    pub config: Option<&'a Path>,
}

fn is_json(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("json")
}

/// Load a property tree
///
/// # Errors
/// Returns error if the file is unreadable or not a property tree.
pub fn load_properties(path: &Path) -> Result<PropertyBag> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading properties from {}", path.display()))?;
    let bag: PropertyBag = if is_json(path) {
        serde_json::from_str(&text)?
    } else {
        serde_yaml::from_str(&text)?
    };
    Ok(bag)
}

/// Load a schema document
///
/// # Errors
/// Returns error if the file is unreadable or the schema is invalid.
pub fn load_schema(path: &Path) -> Result<Schema> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading schema from {}", path.display()))?;
    let schema = if is_json(path) {
        Schema::from_json(&text)
    } else {
        Schema::from_yaml(&text)
    };
    schema.with_context(|| format!("invalid schema {}", path.display()))
}

/// Load a JSON request
///
/// # Errors
/// Returns error if the file is unreadable or not a message.
pub fn load_request(path: &Path) -> Result<ConfigMessage> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading request from {}", path.display()))?;
    ConfigMessage::from_json(&text).with_context(|| format!("invalid request {}", path.display()))
}

/// Build a server over the loaded inputs
///
/// # Errors
/// Returns error if any input fails to load or the server cannot be built.
pub fn build_server(inputs: Inputs<'_>) -> Result<ReconfigureServer> {
    let properties = load_properties(inputs.properties)?;
    let config = match inputs.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    let mut builder = ReconfigureServer::builder(share(properties)).config(config);
    if let Some(path) = inputs.schema {
        builder = builder.schema(load_schema(path)?);
    }
    Ok(builder.build()?)
}

/// Describe the schema, its default/min/max messages and the current values
///
/// # Errors
/// Returns error if the server cannot be built.
pub fn describe(inputs: Inputs<'_>) -> Result<Value> {
    let server = build_server(inputs)?;
    let schema = server.describe();
    let snapshot = server.get_config();
    tracing::debug!(parameters = schema.len(), "describing schema");

    Ok(json!({
        "service": server.name(),
        "fingerprint": schema.fingerprint(),
        "schema": schema.definition(),
        "defaults": schema.defaults(),
        "minimums": schema.minimums(),
        "maximums": schema.maximums(),
        "current": snapshot.values,
    }))
}

/// Apply one request and report the outcome
///
/// # Errors
/// Returns error if inputs fail to load or the request is rejected.
pub fn apply(inputs: Inputs<'_>, request: &Path) -> Result<Value> {
    let server = build_server(inputs)?;
    let request = load_request(request)?;
    let outcome = server
        .set_config(&request)
        .context("request rejected")?;
    let properties = server.properties().read().clone();

    Ok(json!({
        "version": outcome.snapshot.version,
        "level": outcome.level,
        "changed": outcome.changes.names().collect::<Vec<_>>(),
        "warnings": outcome.warnings.iter().map(ToString::to_string).collect::<Vec<_>>(),
        "config": outcome.response(),
        "properties": properties,
    }))
}
