use std::collections::{BTreeMap, HashSet};

use crate::models::{CanonicalRetailer, ClusterLabel, ClusterStats, RetailerDetail};
use crate::similarity::normalize_phone;

/// Groups retailer indices by cluster id, dropping noise. Members keep input order.
pub fn group_members(labels: &[ClusterLabel]) -> BTreeMap<usize, Vec<usize>> {
    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (idx, label) in labels.iter().enumerate() {
        if let Some(cluster_id) = label.cluster_id() {
            groups.entry(cluster_id).or_default().push(idx);
        }
    }
    groups
}

/// Summary of one cluster. `trader_count` counts distinct trader ids across
/// every visit of every member, not only the latest visit.
pub fn cluster_stats(cluster_id: usize, members: &[&CanonicalRetailer]) -> ClusterStats {
    let retailer_count = members.len();
    let traders: HashSet<&str> = members
        .iter()
        .flat_map(|retailer| retailer.trader_ids.iter().map(String::as_str))
        .collect();

    let (center_lat, center_lon) = if retailer_count == 0 {
        (0.0, 0.0)
    } else {
        let lat_sum: f64 = members.iter().map(|r| r.latitude).sum();
        let lon_sum: f64 = members.iter().map(|r| r.longitude).sum();
        (lat_sum / retailer_count as f64, lon_sum / retailer_count as f64)
    };

    ClusterStats {
        cluster_id,
        retailer_count,
        trader_count: traders.len(),
        center_lat,
        center_lon,
        retailer_names: members
            .iter()
            .map(|r| r.display_name().to_string())
            .collect(),
        phone_numbers: members.iter().map(|r| normalize_phone(&r.buyer_phone)).collect(),
    }
}

/// One [`ClusterStats`] per group, in cluster id order.
pub fn aggregate(
    retailers: &[CanonicalRetailer],
    groups: &BTreeMap<usize, Vec<usize>>,
) -> Vec<ClusterStats> {
    groups
        .iter()
        .map(|(&cluster_id, indices)| {
            let members: Vec<&CanonicalRetailer> = indices.iter().map(|&idx| &retailers[idx]).collect();
            cluster_stats(cluster_id, &members)
        })
        .collect()
}

pub fn retailer_detail(retailer: &CanonicalRetailer) -> RetailerDetail {
    RetailerDetail {
        buyer_id: retailer.buyer_id.clone(),
        buyer_name: retailer.display_name().to_string(),
        buyer_phone: retailer.buyer_phone.clone(),
        trader_name: retailer.trader_name.clone(),
        trader_id: retailer.trader_id.clone(),
        site_name: retailer.site_name.clone(),
        latest_visit: retailer.visited_at,
        latitude: retailer.latitude,
        longitude: retailer.longitude,
        has_selfie: retailer.selfie.is_some(),
        has_verification: retailer.verification_doc.is_some(),
        remarks: retailer.remarks.clone(),
        visit_count: retailer.visit_count,
    }
}
