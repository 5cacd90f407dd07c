use std::collections::HashMap;

use crate::{
    core::{error::SynthesisResult, model::StaticDnsEntry},
    ports::store::{CrConfigStore, StaticDnsRow},
};

const RECORD_TYPE_SUFFIX: &str = "_RECORD";

/// `CNAME_RECORD` → `CNAME`.
pub fn normalize_record_type(record_type: &str) -> &str {
    record_type
        .strip_suffix(RECORD_TYPE_SUFFIX)
        .unwrap_or(record_type)
}

/// Group static DNS rows by delivery service, keeping row order within each.
pub fn assemble(rows: Vec<StaticDnsRow>) -> HashMap<String, Vec<StaticDnsEntry>> {
    let mut entries: HashMap<String, Vec<StaticDnsEntry>> = HashMap::new();
    for row in rows {
        let record_type = normalize_record_type(&row.record_type).to_string();
        entries.entry(row.xml_id).or_default().push(StaticDnsEntry {
            name: row.host,
            ttl: row.ttl,
            value: row.address,
            record_type,
        });
    }
    entries
}

/// Fetch and group the static DNS entries of `cdn`.
pub async fn assemble_static_dns(
    store: &dyn CrConfigStore,
    cdn: &str,
) -> SynthesisResult<HashMap<String, Vec<StaticDnsEntry>>> {
    let rows = store.static_dns_entries(cdn).await?;
    tracing::debug!(rows = rows.len(), "fetched static DNS entries");
    Ok(assemble(rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(xml_id: &str, host: &str, record_type: &str) -> StaticDnsRow {
        StaticDnsRow {
            xml_id: xml_id.to_string(),
            host: host.to_string(),
            ttl: 300,
            address: "192.0.2.1".to_string(),
            record_type: record_type.to_string(),
        }
    }

    #[test]
    fn strips_record_suffix() {
        assert_eq!(normalize_record_type("A_RECORD"), "A");
        assert_eq!(normalize_record_type("CNAME_RECORD"), "CNAME");
        assert_eq!(normalize_record_type("TXT"), "TXT");
    }

    #[test]
    fn preserves_row_order_per_service() {
        let grouped = assemble(vec![
            entry("ds1", "b", "A_RECORD"),
            entry("ds2", "x", "AAAA_RECORD"),
            entry("ds1", "a", "CNAME_RECORD"),
        ]);

        let names: Vec<_> = grouped["ds1"].iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(grouped["ds1"][1].record_type, "CNAME");
        assert_eq!(grouped["ds2"][0].record_type, "AAAA");
        assert_eq!(grouped["ds2"][0].ttl, 300);
    }
}
