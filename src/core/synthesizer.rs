//! Core synthesis orchestration.
//!
//! `CrConfigSynthesizer` drives a single pass for one CDN: resolve the
//! CDN-wide parameters, assemble regex match-sets and static DNS entries, then
//! decode every active delivery-service row into the output document. The
//! first fatal error from any stage aborts the pass; callers never see a
//! partially populated document.
use std::{collections::BTreeMap, sync::Arc};

use chrono::Utc;
use tracing::Instrument;

use crate::{
    core::{
        decoder::{DecodeContext, decode},
        diagnostics::Diagnostics,
        error::{SynthesisError, SynthesisResult},
        matchsets::assemble_routing_rules,
        model::{CrConfigDocument, DocumentStats, Soa, TtlDefaults},
        params::resolve_parameters,
        static_dns::assemble_static_dns,
    },
    metrics::{self, RunOutcome, SynthesisTimer},
    ports::store::CrConfigStore,
    tracing_setup::{create_decode_span, create_synthesis_span},
};

/// A finished synthesis run: the document plus every non-fatal condition
/// that was logged while building it.
#[derive(Debug, Clone)]
pub struct SynthesisReport {
    pub document: CrConfigDocument,
    pub diagnostics: Diagnostics,
}

/// Builds CR config documents from a [`CrConfigStore`].
///
/// The synthesizer holds no state between runs, so one instance can serve any
/// number of sequential or concurrent runs for different CDNs.
#[derive(Clone)]
pub struct CrConfigSynthesizer {
    store: Arc<dyn CrConfigStore>,
}

impl CrConfigSynthesizer {
    pub fn new(store: Arc<dyn CrConfigStore>) -> Self {
        Self { store }
    }

    /// Synthesize the document for `cdn`, whose delivery-service domains are
    /// rooted at `domain`.
    pub async fn synthesize(&self, cdn: &str, domain: &str) -> SynthesisResult<SynthesisReport> {
        let _timer = SynthesisTimer::new(cdn);
        let span = create_synthesis_span(cdn, domain);
        let result = self.run(cdn, domain).instrument(span.clone()).await;

        match &result {
            Ok(report) => {
                span.record("delivery_services", report.document.delivery_services.len());
                metrics::increment_synthesis_runs(cdn, RunOutcome::Success);
                metrics::set_delivery_services(cdn, report.document.delivery_services.len());
                tracing::info!(
                    cdn,
                    delivery_services = report.document.delivery_services.len(),
                    diagnostics = report.diagnostics.len(),
                    "CR config synthesized"
                );
            }
            Err(e) => {
                metrics::increment_synthesis_runs(cdn, RunOutcome::Failure);
                tracing::error!(cdn, error = %e, "CR config synthesis failed");
            }
        }
        result
    }

    async fn run(&self, cdn: &str, domain: &str) -> SynthesisResult<SynthesisReport> {
        let store = self.store.as_ref();
        let mut diagnostics = Diagnostics::new();

        let params = resolve_parameters(store, cdn).await?;
        let rules = assemble_routing_rules(store, cdn, domain, &mut diagnostics).await?;
        let static_dns = assemble_static_dns(store, cdn).await?;
        let rows = store.delivery_services(cdn).await?;
        tracing::debug!(rows = rows.len(), "fetched delivery services");

        let soa = Arc::new(Soa::cdn_default());
        let ctx = DecodeContext {
            params: &params,
            rules: &rules,
            static_dns: &static_dns,
            soa: &soa,
        };

        let mut delivery_services = BTreeMap::new();
        for row in &rows {
            let ds = create_decode_span(&row.xml_id)
                .in_scope(|| decode(row, &ctx, &mut diagnostics))?;
            if delivery_services.insert(row.xml_id.clone(), ds).is_some() {
                return Err(SynthesisError::decode(
                    &row.xml_id,
                    "xml id appears on more than one active delivery service",
                ));
            }
        }

        let document = CrConfigDocument {
            config: params.into_map(),
            delivery_services,
            soa,
            ttls: TtlDefaults::default(),
            stats: DocumentStats {
                cdn_name: cdn.to_string(),
                domain_name: domain.to_string(),
                generated_at: Utc::now(),
            },
        };

        Ok(SynthesisReport {
            document,
            diagnostics,
        })
    }
}
