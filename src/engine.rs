use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Instant;

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;
use uuid::Uuid;

use crate::clustering::cluster_points;
use crate::config::AnalysisConfig;
use crate::dedup::deduplicate;
use crate::error::{EngineError, EngineResult};
use crate::geodesy;
use crate::models::{
    AnalysisSummary, CanonicalRetailer, ClusterLabel, ClusterReport, DistanceMatrix, RecordIssue,
    RetailerDetail, RiskDistribution, RiskLevel, TraderClusterCount, VisitRecord,
};
use crate::risk::score_cluster;
use crate::similarity::analyze_clusters;
use crate::stats::{aggregate, group_members, retailer_detail};

/// Everything one analysis run produced. Nothing in here changes after
/// [`run_analysis`] returns; callers keep it around for drill-down queries.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub config: AnalysisConfig,
    pub retailers: Vec<CanonicalRetailer>,
    pub labels: Vec<ClusterLabel>,
    pub clusters: Vec<ClusterReport>,
    pub issues: Vec<RecordIssue>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

pub fn run_analysis(records: &[VisitRecord], config: &AnalysisConfig) -> EngineResult<AnalysisResult> {
    config.validate()?;
    let start_time = Instant::now();
    let run_id = Uuid::new_v4();
    info!(
        "Starting analysis {} over {} visits (radius {}m, min_samples {}, name threshold {})",
        run_id,
        records.len(),
        config.radius_meters,
        config.min_samples,
        config.name_threshold
    );

    let deduplicated = deduplicate(records)?;
    if !deduplicated.issues.is_empty() {
        warn!(
            "Excluded {} visits with unusable coordinates",
            deduplicated.issues.len()
        );
    }
    let retailers = deduplicated.retailers;

    let points: Vec<(f64, f64)> = retailers.iter().map(|r| (r.latitude, r.longitude)).collect();
    let clustering = cluster_points(&points, config.radius_meters, config.min_samples);
    let groups = group_members(&clustering.labels);

    let similarities = analyze_clusters(&retailers, &groups, config.name_threshold);
    let clusters: Vec<ClusterReport> = aggregate(&retailers, &groups)
        .into_iter()
        .map(|stats| {
            let similarity = similarities.get(&stats.cluster_id).cloned().unwrap_or_default();
            let risk = score_cluster(&stats, Some(&similarity));
            ClusterReport {
                stats,
                similarity,
                risk,
            }
        })
        .collect();

    let index = retailers
        .iter()
        .enumerate()
        .map(|(idx, r)| (r.buyer_id.clone(), idx))
        .collect();

    let result = AnalysisResult {
        run_id,
        generated_at: Utc::now(),
        config: *config,
        retailers,
        labels: clustering.labels,
        clusters,
        issues: deduplicated.issues,
        index,
    };

    let summary = result.summary();
    info!(
        "Analysis {} complete in {:.2?}: {} retailers, {} clusters, {} high risk, {} noise",
        run_id,
        start_time.elapsed(),
        summary.unique_retailers,
        summary.clusters_found,
        summary.high_risk_clusters,
        summary.noise_retailers
    );
    Ok(result)
}

impl AnalysisResult {
    pub fn label_of(&self, buyer_id: &str) -> Option<ClusterLabel> {
        self.index.get(buyer_id.trim()).map(|&idx| self.labels[idx])
    }

    pub fn retailer(&self, buyer_id: &str) -> Option<&CanonicalRetailer> {
        self.index.get(buyer_id.trim()).map(|&idx| &self.retailers[idx])
    }

    pub fn cluster(&self, cluster_id: usize) -> Option<&ClusterReport> {
        self.clusters
            .binary_search_by_key(&cluster_id, |report| report.stats.cluster_id)
            .ok()
            .map(|pos| &self.clusters[pos])
    }

    /// Clusters whose risk level is one of `levels`, in cluster id order. An
    /// empty slice selects every cluster.
    pub fn clusters_at_levels(&self, levels: &[RiskLevel]) -> Vec<&ClusterReport> {
        self.clusters
            .iter()
            .filter(|report| levels.is_empty() || levels.contains(&report.risk.level))
            .collect()
    }

    /// Canonical retailers of a cluster in input order; empty for unknown ids.
    pub fn members(&self, cluster_id: usize) -> Vec<&CanonicalRetailer> {
        self.retailers
            .iter()
            .zip(&self.labels)
            .filter(|(_, label)| **label == ClusterLabel::Cluster(cluster_id))
            .map(|(retailer, _)| retailer)
            .collect()
    }

    pub fn noise(&self) -> Vec<&CanonicalRetailer> {
        self.retailers
            .iter()
            .zip(&self.labels)
            .filter(|(_, label)| label.is_noise())
            .map(|(retailer, _)| retailer)
            .collect()
    }

    /// Label of every raw visit, inherited from its retailer by buyer id. An
    /// excluded visit still takes its retailer's label when that buyer has
    /// another valid visit; it is noise only when the buyer has none.
    pub fn visit_labels(&self, records: &[VisitRecord]) -> Vec<ClusterLabel> {
        records
            .iter()
            .map(|record| self.label_of(&record.buyer_id).unwrap_or(ClusterLabel::Noise))
            .collect()
    }

    pub fn cluster_details(&self, cluster_id: usize) -> EngineResult<Vec<RetailerDetail>> {
        self.cluster(cluster_id)
            .ok_or(EngineError::UnknownCluster(cluster_id))?;
        Ok(self.members(cluster_id).into_iter().map(retailer_detail).collect())
    }

    pub fn distance_matrix(&self, cluster_id: usize) -> EngineResult<DistanceMatrix> {
        self.cluster(cluster_id)
            .ok_or(EngineError::UnknownCluster(cluster_id))?;
        Ok(geodesy::distance_matrix(&self.members(cluster_id)))
    }

    pub fn summary(&self) -> AnalysisSummary {
        let mut risk_distribution = RiskDistribution::default();
        for report in &self.clusters {
            match report.risk.level {
                RiskLevel::High => risk_distribution.high += 1,
                RiskLevel::Medium => risk_distribution.medium += 1,
                RiskLevel::Low => risk_distribution.low += 1,
            }
        }

        let clustered: Vec<&CanonicalRetailer> = self
            .retailers
            .iter()
            .zip(&self.labels)
            .filter(|(_, label)| !label.is_noise())
            .map(|(retailer, _)| retailer)
            .collect();
        let traders: BTreeSet<&str> = clustered
            .iter()
            .flat_map(|r| r.trader_ids.iter().map(String::as_str))
            .collect();

        AnalysisSummary {
            unique_retailers: self.retailers.len(),
            clusters_found: self.clusters.len(),
            high_risk_clusters: risk_distribution.high,
            clustered_retailers: clustered.len(),
            traders_involved: traders.len(),
            noise_retailers: self.retailers.len() - clustered.len(),
            excluded_records: self.issues.len(),
            risk_distribution,
        }
    }

    /// Traders ranked by the number of distinct clusters holding a retailer
    /// they visited last. Ties keep trader-name order.
    pub fn trader_cluster_counts(&self, top_n: usize) -> Vec<TraderClusterCount> {
        let mut clusters_by_trader: BTreeMap<&str, BTreeSet<usize>> = BTreeMap::new();
        for (retailer, label) in self.retailers.iter().zip(&self.labels) {
            if let Some(cluster_id) = label.cluster_id() {
                clusters_by_trader
                    .entry(retailer.trader_name.as_str())
                    .or_default()
                    .insert(cluster_id);
            }
        }

        let mut counts: Vec<TraderClusterCount> = clusters_by_trader
            .into_iter()
            .map(|(trader_name, clusters)| TraderClusterCount {
                trader_name: trader_name.to_string(),
                cluster_count: clusters.len(),
            })
            .collect();
        counts.sort_by(|a, b| b.cluster_count.cmp(&a.cluster_count));
        counts.truncate(top_n);
        counts
    }
}
