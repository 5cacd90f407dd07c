//! In-memory store backed by a JSON snapshot of the relevant tables.
//!
//! Each row carries the CDN it belongs to and (for delivery-service scoped
//! rows) whether the service is active, so one snapshot can hold several
//! CDNs and the adapter filters exactly as the database queries do.
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ports::store::{
    CrConfigStore, DeliveryServiceRow, ProfileParameterRow, RegexRow, StaticDnsRow, StoreError,
    StoreResult,
};

fn default_active() -> bool {
    true
}

/// A row tagged with the CDN it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scoped<T> {
    pub cdn: String,
    /// Whether the owning delivery service is active. Ignored for profile parameters.
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(flatten)]
    pub row: T,
}

impl<T> Scoped<T> {
    /// Row of an active delivery service in `cdn`.
    pub fn new(cdn: impl Into<String>, row: T) -> Self {
        Self {
            cdn: cdn.into(),
            active: true,
            row,
        }
    }

    /// Mark the owning delivery service inactive.
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

/// Serialized form of a snapshot file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreSnapshot {
    pub delivery_services: Vec<Scoped<DeliveryServiceRow>>,
    pub regexes: Vec<Scoped<RegexRow>>,
    pub static_dns_entries: Vec<Scoped<StaticDnsRow>>,
    /// Parameters of profiles attached to servers; `cdn` is the servers' CDN.
    pub profile_parameters: Vec<Scoped<ProfileParameterRow>>,
}

impl StoreSnapshot {
    pub fn from_json(json: &str) -> StoreResult<Self> {
        serde_json::from_str(json).map_err(|e| StoreError::Snapshot(e.to_string()))
    }
}

/// Read-only [`CrConfigStore`] over an immutable [`StoreSnapshot`].
#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    snapshot: StoreSnapshot,
}

impl SnapshotStore {
    pub fn new(snapshot: StoreSnapshot) -> Self {
        Self { snapshot }
    }

    /// Load a snapshot file.
    pub async fn from_path(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path).await?;
        let snapshot = StoreSnapshot::from_json(&json).map_err(|e| match e {
            StoreError::Snapshot(msg) => StoreError::Snapshot(format!("{}: {msg}", path.display())),
            other => other,
        })?;
        tracing::info!(
            path = %path.display(),
            delivery_services = snapshot.delivery_services.len(),
            "loaded store snapshot"
        );
        Ok(Self::new(snapshot))
    }

    fn active_in<'a, T: Clone + 'a>(
        rows: &'a [Scoped<T>],
        cdn: &'a str,
    ) -> impl Iterator<Item = T> + 'a {
        rows.iter()
            .filter(move |scoped| scoped.cdn == cdn && scoped.active)
            .map(|scoped| scoped.row.clone())
    }
}

#[async_trait]
impl CrConfigStore for SnapshotStore {
    async fn delivery_services(&self, cdn: &str) -> StoreResult<Vec<DeliveryServiceRow>> {
        Ok(Self::active_in(&self.snapshot.delivery_services, cdn).collect())
    }

    async fn static_dns_entries(&self, cdn: &str) -> StoreResult<Vec<StaticDnsRow>> {
        Ok(Self::active_in(&self.snapshot.static_dns_entries, cdn).collect())
    }

    async fn regexes(&self, cdn: &str) -> StoreResult<Vec<RegexRow>> {
        let mut rows: Vec<RegexRow> = Self::active_in(&self.snapshot.regexes, cdn).collect();
        // stable: rows sharing a set number keep file order
        rows.sort_by_key(|row| row.set_number);
        Ok(rows)
    }

    async fn server_profile_parameters(&self, cdn: &str) -> StoreResult<Vec<ProfileParameterRow>> {
        Ok(self
            .snapshot
            .profile_parameters
            .iter()
            .filter(|scoped| scoped.cdn == cdn)
            .map(|scoped| scoped.row.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    const SNAPSHOT_JSON: &str = r#"
{
  "deliveryServices": [
    { "cdn": "cdn1", "xml_id": "ds1", "type": "HTTP", "protocol": 2, "miss_lat": 12.3 },
    { "cdn": "cdn1", "active": false, "xml_id": "old", "type": "HTTP" }
  ],
  "regexes": [
    { "cdn": "cdn1", "xml_id": "ds1", "pattern": "/b", "regex_type": "PATH_REGEXP", "ds_type": "HTTP", "set_number": 1 },
    { "cdn": "cdn1", "xml_id": "ds1", "pattern": ".*\\.ds1\\..*", "regex_type": "HOST_REGEXP", "ds_type": "HTTP" },
    { "cdn": "cdn1", "xml_id": "ds1", "pattern": "/a", "regex_type": "PATH_REGEXP", "ds_type": "HTTP", "set_number": 1 }
  ],
  "profileParameters": [
    { "cdn": "cdn1", "profile": "EDGE", "name": "tld.ttls.NS", "value": "60" },
    { "cdn": "cdn2", "profile": "EDGE2", "name": "tld.ttls.NS", "value": "90" }
  ]
}
"#;

    #[tokio::test]
    async fn filters_by_cdn_and_active_flag() {
        let store = SnapshotStore::new(StoreSnapshot::from_json(SNAPSHOT_JSON).unwrap());

        let services = store.delivery_services("cdn1").await.unwrap();
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].xml_id, "ds1");
        assert_eq!(services[0].protocol, Some(2));
        assert_eq!(services[0].miss_lat, Some(12.3));
        assert_eq!(services[0].miss_long, None);

        let params = store.server_profile_parameters("cdn1").await.unwrap();
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].value, "60");

        assert!(store.static_dns_entries("cdn1").await.unwrap().is_empty());
        assert!(store.delivery_services("cdn3").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn regexes_are_ordered_by_set_number() {
        let store = SnapshotStore::new(StoreSnapshot::from_json(SNAPSHOT_JSON).unwrap());
        let patterns: Vec<_> = store
            .regexes("cdn1")
            .await
            .unwrap()
            .into_iter()
            .map(|row| row.pattern)
            .collect();
        assert_eq!(patterns, vec![r".*\.ds1\..*", "/b", "/a"]);
    }

    #[tokio::test]
    async fn rows_of_inactive_services_are_hidden() {
        let row = |xml_id: &str| DeliveryServiceRow {
            xml_id: xml_id.to_string(),
            ..DeliveryServiceRow::default()
        };
        let store = SnapshotStore::new(StoreSnapshot {
            delivery_services: vec![
                Scoped::new("cdn1", row("live")),
                Scoped::new("cdn1", row("retired")).inactive(),
            ],
            ..StoreSnapshot::default()
        });

        let services = store.delivery_services("cdn1").await.unwrap();
        let ids: Vec<_> = services.iter().map(|ds| ds.xml_id.as_str()).collect();
        assert_eq!(ids, ["live"]);
    }

    #[tokio::test]
    async fn loads_from_file() {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        write!(file, "{SNAPSHOT_JSON}").unwrap();

        let store = SnapshotStore::from_path(file.path()).await.unwrap();
        assert_eq!(store.delivery_services("cdn1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn malformed_file_is_a_snapshot_error() {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        write!(file, "{{ \"deliveryServices\": 7 }}").unwrap();

        let err = SnapshotStore::from_path(file.path()).await.unwrap_err();
        assert!(matches!(err, StoreError::Snapshot(_)));
    }
}
