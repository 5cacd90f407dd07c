//! Postgres-backed store.
//!
//! A synthesis run must observe one consistent state across its four reads, so
//! queries are not served from the pool directly. [`PostgresStore::begin_snapshot`]
//! opens a `REPEATABLE READ, READ ONLY` transaction and the returned
//! [`PostgresSnapshot`] answers every query of the run from it. Dropping the
//! snapshot rolls the transaction back.
use std::time::Duration;

use async_trait::async_trait;
use sqlx::{
    PgPool, Postgres, Row, Transaction,
    postgres::{PgPoolOptions, PgRow},
};
use tokio::sync::Mutex;

use crate::ports::store::{
    CrConfigStore, DeliveryServiceRow, ProfileParameterRow, RegexRow, StaticDnsRow, StoreError,
    StoreResult,
};

const BEGIN_SNAPSHOT: &str = "SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY";

const SELECT_DELIVERY_SERVICES: &str = r"
    SELECT d.xml_id,
           d.miss_lat::float8 AS miss_lat,
           d.miss_long::float8 AS miss_long,
           d.protocol::int8 AS protocol,
           d.ccr_dns_ttl::int8 AS ttl,
           d.routing_name,
           d.geo_provider::int8 AS geo_provider,
           t.name AS type,
           d.geo_limit::int8 AS geo_limit,
           d.geo_limit_countries,
           d.geolimit_redirect_url,
           d.initial_dispersion::int8 AS initial_dispersion,
           d.regional_geo_blocking,
           d.max_dns_answers::int8 AS max_dns_answers,
           p.name AS profile,
           d.dns_bypass_ip,
           d.dns_bypass_ip6,
           d.dns_bypass_ttl::int8 AS dns_bypass_ttl,
           d.dns_bypass_cname,
           d.http_bypass_fqdn,
           d.ipv6_routing_enabled,
           d.deep_caching_type::text AS deep_caching_type,
           d.tr_request_headers,
           d.tr_response_headers,
           d.anonymous_blocking_enabled
    FROM deliveryservice AS d
    INNER JOIN type AS t ON t.id = d.type
    LEFT OUTER JOIN profile AS p ON p.id = d.profile
    WHERE d.cdn_id = (SELECT id FROM cdn WHERE name = $1)
      AND d.active = true
";

const SELECT_STATIC_DNS_ENTRIES: &str = r"
    SELECT d.xml_id,
           e.host,
           e.ttl::int8 AS ttl,
           e.address,
           t.name AS record_type
    FROM staticdnsentry AS e
    INNER JOIN deliveryservice AS d ON d.id = e.deliveryservice
    INNER JOIN type AS t ON t.id = e.type
    WHERE d.cdn_id = (SELECT id FROM cdn WHERE name = $1)
      AND d.active = true
";

const SELECT_REGEXES: &str = r"
    SELECT d.xml_id,
           r.pattern,
           t.name AS regex_type,
           dt.name AS ds_type,
           COALESCE(dr.set_number, 0)::int8 AS set_number
    FROM regex AS r
    INNER JOIN deliveryservice_regex AS dr ON r.id = dr.regex
    INNER JOIN deliveryservice AS d ON d.id = dr.deliveryservice
    INNER JOIN type AS t ON t.id = r.type
    INNER JOIN type AS dt ON dt.id = d.type
    WHERE d.cdn_id = (SELECT id FROM cdn WHERE name = $1)
      AND d.active = true
    ORDER BY COALESCE(dr.set_number, 0) ASC
";

const SELECT_SERVER_PROFILE_PARAMETERS: &str = r"
    SELECT profile.name AS profile,
           parameter.name,
           parameter.value
    FROM profile
    INNER JOIN profile_parameter AS pp ON pp.profile = profile.id
    INNER JOIN parameter ON parameter.id = pp.parameter
    WHERE profile.id IN (
        SELECT server.profile FROM server
        WHERE server.cdn_id = (SELECT id FROM cdn WHERE name = $1)
    )
";

/// Connection pool to the operational database.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a new pool.
    pub async fn connect(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await
            .map_err(|e| StoreError::Connect(e.to_string()))?;
        tracing::info!(max_connections, "connected to Postgres");
        Ok(Self::new(pool))
    }

    /// Open a read-only, repeatable-read transaction for one synthesis run.
    pub async fn begin_snapshot(&self) -> StoreResult<PostgresSnapshot> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::query("beginning snapshot transaction", e))?;
        sqlx::query(BEGIN_SNAPSHOT)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::query("setting snapshot isolation", e))?;
        tracing::debug!("opened repeatable-read snapshot");
        Ok(PostgresSnapshot { tx: Mutex::new(tx) })
    }
}

/// All reads of one run, served from a single transaction.
pub struct PostgresSnapshot {
    tx: Mutex<Transaction<'static, Postgres>>,
}

impl PostgresSnapshot {
    async fn fetch_all(
        &self,
        operation: &'static str,
        sql: &'static str,
        cdn: &str,
    ) -> StoreResult<Vec<PgRow>> {
        let mut tx = self.tx.lock().await;
        sqlx::query(sql)
            .bind(cdn)
            .fetch_all(&mut **tx)
            .await
            .map_err(|e| StoreError::query(operation, e))
    }
}

fn decode_delivery_service(row: &PgRow) -> Result<DeliveryServiceRow, sqlx::Error> {
    Ok(DeliveryServiceRow {
        xml_id: row.try_get("xml_id")?,
        miss_lat: row.try_get("miss_lat")?,
        miss_long: row.try_get("miss_long")?,
        protocol: row.try_get("protocol")?,
        ttl: row.try_get("ttl")?,
        routing_name: row.try_get("routing_name")?,
        geo_provider: row.try_get("geo_provider")?,
        type_name: row.try_get("type")?,
        geo_limit: row.try_get("geo_limit")?,
        geo_limit_countries: row.try_get("geo_limit_countries")?,
        geolimit_redirect_url: row.try_get("geolimit_redirect_url")?,
        initial_dispersion: row.try_get("initial_dispersion")?,
        regional_geo_blocking: row.try_get("regional_geo_blocking")?,
        max_dns_answers: row.try_get("max_dns_answers")?,
        profile: row.try_get("profile")?,
        dns_bypass_ip: row.try_get("dns_bypass_ip")?,
        dns_bypass_ip6: row.try_get("dns_bypass_ip6")?,
        dns_bypass_ttl: row.try_get("dns_bypass_ttl")?,
        dns_bypass_cname: row.try_get("dns_bypass_cname")?,
        http_bypass_fqdn: row.try_get("http_bypass_fqdn")?,
        ipv6_routing_enabled: row.try_get("ipv6_routing_enabled")?,
        deep_caching_type: row.try_get("deep_caching_type")?,
        tr_request_headers: row.try_get("tr_request_headers")?,
        tr_response_headers: row.try_get("tr_response_headers")?,
        anonymous_blocking_enabled: row.try_get("anonymous_blocking_enabled")?,
    })
}

fn decode_static_dns(row: &PgRow) -> Result<StaticDnsRow, sqlx::Error> {
    Ok(StaticDnsRow {
        xml_id: row.try_get("xml_id")?,
        host: row.try_get("host")?,
        ttl: row.try_get("ttl")?,
        address: row.try_get("address")?,
        record_type: row.try_get("record_type")?,
    })
}

fn decode_regex(row: &PgRow) -> Result<RegexRow, sqlx::Error> {
    Ok(RegexRow {
        xml_id: row.try_get("xml_id")?,
        pattern: row.try_get("pattern")?,
        regex_type: row.try_get("regex_type")?,
        ds_type: row.try_get("ds_type")?,
        set_number: row.try_get("set_number")?,
    })
}

fn decode_profile_parameter(row: &PgRow) -> Result<ProfileParameterRow, sqlx::Error> {
    Ok(ProfileParameterRow {
        profile: row.try_get("profile")?,
        name: row.try_get("name")?,
        value: row.try_get("value")?,
    })
}

fn scan_all<T>(
    rows: &[PgRow],
    operation: &'static str,
    decode: fn(&PgRow) -> Result<T, sqlx::Error>,
) -> StoreResult<Vec<T>> {
    rows.iter()
        .map(|row| decode(row).map_err(|e| StoreError::query(operation, e)))
        .collect()
}

#[async_trait]
impl CrConfigStore for PostgresSnapshot {
    async fn delivery_services(&self, cdn: &str) -> StoreResult<Vec<DeliveryServiceRow>> {
        let rows = self
            .fetch_all("querying delivery services", SELECT_DELIVERY_SERVICES, cdn)
            .await?;
        scan_all(&rows, "scanning delivery services", decode_delivery_service)
    }

    async fn static_dns_entries(&self, cdn: &str) -> StoreResult<Vec<StaticDnsRow>> {
        let rows = self
            .fetch_all("querying static DNS entries", SELECT_STATIC_DNS_ENTRIES, cdn)
            .await?;
        scan_all(&rows, "scanning static DNS entries", decode_static_dns)
    }

    async fn regexes(&self, cdn: &str) -> StoreResult<Vec<RegexRow>> {
        let rows = self
            .fetch_all("querying delivery service regexes", SELECT_REGEXES, cdn)
            .await?;
        scan_all(&rows, "scanning delivery service regexes", decode_regex)
    }

    async fn server_profile_parameters(&self, cdn: &str) -> StoreResult<Vec<ProfileParameterRow>> {
        let rows = self
            .fetch_all(
                "querying server profile parameters",
                SELECT_SERVER_PROFILE_PARAMETERS,
                cdn,
            )
            .await?;
        scan_all(
            &rows,
            "scanning server profile parameters",
            decode_profile_parameter,
        )
    }
}
