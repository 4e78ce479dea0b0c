use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One field visit as handed over by ingestion. Coordinates stay optional here
/// so the engine can report unparsable values instead of dropping them silently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitRecord {
    pub buyer_id: String,
    pub buyer_name: Option<String>,
    pub buyer_phone: String,
    pub trader_id: String,
    pub trader_name: String,
    pub site_name: String,
    pub visited_at: Option<NaiveDateTime>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub selfie: Option<String>,
    pub verification_doc: Option<String>,
    pub remarks: Option<String>,
}

/// The most recent visit of one retailer identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalRetailer {
    pub buyer_id: String,
    pub buyer_name: Option<String>,
    pub buyer_phone: String,
    pub trader_id: String,
    pub trader_name: String,
    pub site_name: String,
    pub visited_at: Option<NaiveDateTime>,
    pub latitude: f64,
    pub longitude: f64,
    pub selfie: Option<String>,
    pub verification_doc: Option<String>,
    pub remarks: Option<String>,
    pub visit_count: usize,
    /// Distinct trader ids across every visit of this retailer, in first-seen order.
    pub trader_ids: Vec<String>,
}

impl CanonicalRetailer {
    pub fn display_name(&self) -> &str {
        self.buyer_name.as_deref().unwrap_or("(unnamed)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(into = "i64")]
pub enum ClusterLabel {
    Noise,
    Cluster(usize),
}

impl ClusterLabel {
    pub fn cluster_id(self) -> Option<usize> {
        match self {
            ClusterLabel::Noise => None,
            ClusterLabel::Cluster(id) => Some(id),
        }
    }

    pub fn is_noise(self) -> bool {
        matches!(self, ClusterLabel::Noise)
    }
}

impl From<ClusterLabel> for i64 {
    fn from(label: ClusterLabel) -> i64 {
        match label {
            ClusterLabel::Noise => -1,
            ClusterLabel::Cluster(id) => id as i64,
        }
    }
}

impl fmt::Display for ClusterLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", i64::from(*self))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterStats {
    pub cluster_id: usize,
    pub retailer_count: usize,
    pub trader_count: usize,
    pub center_lat: f64,
    pub center_lon: f64,
    pub retailer_names: Vec<String>,
    pub phone_numbers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityPair {
    pub retailer1: String,
    pub retailer2: String,
    pub id1: String,
    pub id2: String,
    pub similarity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhoneGroup {
    pub phone: String,
    pub retailers: Vec<String>,
    pub ids: Vec<String>,
}

impl PhoneGroup {
    pub fn count(&self) -> usize {
        self.ids.len()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ClusterSimilarity {
    pub cluster_id: usize,
    pub name_pairs: Vec<SimilarityPair>,
    pub phone_groups: Vec<PhoneGroup>,
    pub similar_name_pair_count: usize,
    pub phone_duplicate_group_count: usize,
    pub max_similarity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, clap::ValueEnum)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RiskScore {
    pub score: u32,
    pub level: RiskLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterReport {
    pub stats: ClusterStats,
    pub similarity: ClusterSimilarity,
    pub risk: RiskScore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IssueKind {
    MissingCoordinates,
    NonFiniteCoordinates,
    OutOfRange,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            IssueKind::MissingCoordinates => "missing coordinates",
            IssueKind::NonFiniteCoordinates => "non-finite coordinates",
            IssueKind::OutOfRange => "coordinates out of range",
        };
        f.write_str(label)
    }
}

/// A record left out of clustering because of bad coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordIssue {
    pub row: usize,
    pub buyer_id: String,
    pub kind: IssueKind,
}

/// Square matrix of geodesic distances in meters, labelled by buyer id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistanceMatrix {
    pub buyer_ids: Vec<String>,
    pub names: Vec<String>,
    pub meters: Vec<Vec<f64>>,
}

impl DistanceMatrix {
    pub fn empty() -> Self {
        DistanceMatrix {
            buyer_ids: Vec::new(),
            names: Vec::new(),
            meters: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buyer_ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buyer_ids.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetailerDetail {
    pub buyer_id: String,
    pub buyer_name: String,
    pub buyer_phone: String,
    pub trader_name: String,
    pub trader_id: String,
    pub site_name: String,
    pub latest_visit: Option<NaiveDateTime>,
    pub latitude: f64,
    pub longitude: f64,
    pub has_selfie: bool,
    pub has_verification: bool,
    pub remarks: Option<String>,
    pub visit_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct RiskDistribution {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisSummary {
    pub unique_retailers: usize,
    pub clusters_found: usize,
    pub high_risk_clusters: usize,
    pub clustered_retailers: usize,
    pub traders_involved: usize,
    pub noise_retailers: usize,
    pub excluded_records: usize,
    pub risk_distribution: RiskDistribution,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraderClusterCount {
    pub trader_name: String,
    pub cluster_count: usize,
}
