use std::collections::HashMap;

use log::debug;

use crate::error::{EngineError, EngineResult};
use crate::geodesy::check_coordinates;
use crate::models::{CanonicalRetailer, RecordIssue, VisitRecord};

#[derive(Debug, Clone, Default)]
pub struct Deduplicated {
    /// One entry per buyer id, in order of first appearance in the input.
    pub retailers: Vec<CanonicalRetailer>,
    pub issues: Vec<RecordIssue>,
}

struct Group<'a> {
    latest: &'a VisitRecord,
    latitude: f64,
    longitude: f64,
    visit_count: usize,
    trader_ids: Vec<String>,
}

/// Identity used when counting traders: the trader id, or the trader name
/// when the id is blank. Visits with neither are not attributed to anyone.
fn trader_key(record: &VisitRecord) -> Option<&str> {
    [record.trader_id.trim(), record.trader_name.trim()]
        .into_iter()
        .find(|key| !key.is_empty())
}

fn note_trader(trader_ids: &mut Vec<String>, record: &VisitRecord) {
    if let Some(key) = trader_key(record) {
        if !trader_ids.iter().any(|t| t == key) {
            trader_ids.push(key.to_string());
        }
    }
}

/// Collapses visits to one canonical record per buyer id.
///
/// The latest `visited_at` wins; a visit without a timestamp never beats a
/// dated one. On identical timestamps the visit that appears first in the
/// input is kept. Visits with unusable coordinates are reported and left out
/// of both the canonical choice and the visit count.
pub fn deduplicate(records: &[VisitRecord]) -> EngineResult<Deduplicated> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<Group> = Vec::new();
    let mut issues = Vec::new();

    for (position, record) in records.iter().enumerate() {
        let row = position + 1;
        let buyer_id = record.buyer_id.trim();
        if buyer_id.is_empty() {
            return Err(EngineError::Validation {
                row,
                reason: "buyerId is missing".to_string(),
            });
        }

        let (latitude, longitude) = match check_coordinates(record.latitude, record.longitude) {
            Ok(coords) => coords,
            Err(kind) => {
                debug!("Excluding row {} ({}): {}", row, buyer_id, kind);
                issues.push(RecordIssue {
                    row,
                    buyer_id: buyer_id.to_string(),
                    kind,
                });
                continue;
            }
        };

        match index.get(buyer_id) {
            Some(&slot) => {
                let group = &mut groups[slot];
                group.visit_count += 1;
                note_trader(&mut group.trader_ids, record);
                if record.visited_at > group.latest.visited_at {
                    group.latest = record;
                    group.latitude = latitude;
                    group.longitude = longitude;
                }
            }
            None => {
                index.insert(buyer_id, groups.len());
                let mut trader_ids = Vec::new();
                note_trader(&mut trader_ids, record);
                groups.push(Group {
                    latest: record,
                    latitude,
                    longitude,
                    visit_count: 1,
                    trader_ids,
                });
            }
        }
    }

    let retailers = groups
        .into_iter()
        .map(|group| {
            let latest = group.latest;
            CanonicalRetailer {
                buyer_id: latest.buyer_id.trim().to_string(),
                buyer_name: latest.buyer_name.clone(),
                buyer_phone: latest.buyer_phone.clone(),
                trader_id: latest.trader_id.clone(),
                trader_name: latest.trader_name.clone(),
                site_name: latest.site_name.clone(),
                visited_at: latest.visited_at,
                latitude: group.latitude,
                longitude: group.longitude,
                selfie: latest.selfie.clone(),
                verification_doc: latest.verification_doc.clone(),
                remarks: latest.remarks.clone(),
                visit_count: group.visit_count,
                trader_ids: group.trader_ids,
            }
        })
        .collect();

    Ok(Deduplicated { retailers, issues })
}
