//! Parse, associate, recommend in one pass

use tracing::info;
use uuid::Uuid;

use fpa_analysis::{AnalysisService, PolicySnapshot};
use fpa_common::{FpaResult, TrafficStats, TunerConfig};

use crate::associate::associate;
use crate::recommend::recommend;
use crate::syslog::SyslogParser;

/// Traffic pipeline over a rule snapshot
///
/// Holds the compiled syslog patterns and the tuning thresholds; one
/// instance serves any number of batches and devices.
pub struct TrafficTuner {
    config: TunerConfig,
    parser: SyslogParser,
}

impl TrafficTuner {
    /// Build a tuner with the given thresholds
    pub fn new(config: TunerConfig) -> Self {
        Self {
            config,
            parser: SyslogParser::new(),
        }
    }

    /// Run one raw batch against a snapshot
    pub fn ingest(&self, snap: &PolicySnapshot, raw: &str) -> TrafficStats {
        let parsed = self.parser.parse(raw);
        let assoc = associate(snap, &parsed.entries);
        let recommendations = recommend(snap, &assoc, &self.config);
        info!(
            device = %snap.device(),
            entries = parsed.entries.len(),
            malformed = parsed.malformed,
            denied = assoc.denied,
            unmatched = assoc.unmatched,
            recommendations = recommendations.len(),
            "traffic batch ingested"
        );
        TrafficStats {
            total_entries: parsed.entries.len() as u64,
            denied: assoc.denied,
            unmatched: assoc.unmatched,
            malformed: parsed.malformed,
            direct_mapped: assoc.direct,
            heuristic_mapped: assoc.heuristic,
            per_rule: assoc.per_rule,
            recommendations,
        }
    }
}

impl Default for TrafficTuner {
    fn default() -> Self {
        Self::new(TunerConfig::default())
    }
}

/// Traffic ingestion against a managed device
pub trait TrafficIngest {
    /// Parse a raw log batch and run it against the device's current rules.
    ///
    /// The batch is evaluated against the rules as they stand now; entries
    /// captured before a rule swap may map to different rules than they did
    /// on the device.
    fn ingest_traffic_log(
        &self,
        tuner: &TrafficTuner,
        device: Uuid,
        raw: &str,
    ) -> FpaResult<TrafficStats>;
}

impl TrafficIngest for AnalysisService {
    fn ingest_traffic_log(
        &self,
        tuner: &TrafficTuner,
        device: Uuid,
        raw: &str,
    ) -> FpaResult<TrafficStats> {
        let snap = self.snapshot(device)?;
        Ok(tuner.ingest(&snap, raw))
    }
}
