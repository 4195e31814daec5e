//! Shared fixtures for the grid integration tests.

#![allow(dead_code)]

use std::collections::HashMap;

use kgrid_lib::grid::GridConfig;
use kgrid_lib::grid::KnowledgeGrid;
use kgrid_lib::model::ColumnConfig;
use kgrid_lib::model::Row;
use kgrid_lib::model::Value;
use kgrid_lib::remote::MemoryRemote;
use kgrid_lib::store::MemoryBackend;
use kgrid_lib::store::OverlayStore;

pub const TABLE: &str = "leads";

/// A remote holding `n` rows `q-{i}` with durable ids `o-{i}`.
///
/// Names are `Company {i}`; cities alternate Berlin (even) and Paris (odd).
pub fn seeded_remote(n: usize) -> MemoryRemote {
    let remote = MemoryRemote::new();
    for i in 0..n {
        let mut data = serde_json::Map::new();
        data.insert("company_name".to_string(), format!("Company {i}").into());
        let city = if i % 2 == 0 { "Berlin" } else { "Paris" };
        data.insert("city".to_string(), city.into());
        remote.insert(TABLE, format!("q-{i}"), Some(format!("o-{i}").as_str()), data);
    }
    remote
}

pub fn config() -> GridConfig {
    GridConfig::new(TABLE).with_columns(vec![
        ColumnConfig::new("Name", "company_name"),
        ColumnConfig::new("City", "city"),
    ])
}

pub fn grid(remote: &MemoryRemote) -> KnowledgeGrid {
    grid_with(config(), remote, OverlayStore::new(MemoryBackend::new()))
}

pub fn grid_with(config: GridConfig, remote: &MemoryRemote, store: OverlayStore) -> KnowledgeGrid {
    KnowledgeGrid::new(config, remote.clone(), store)
}

pub fn fields(pairs: &[(&str, &str)]) -> HashMap<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), Value::from(*v)))
        .collect()
}

pub fn ids(rows: &[Row]) -> Vec<String> {
    rows.iter().map(|r| r.id().to_string()).collect()
}
