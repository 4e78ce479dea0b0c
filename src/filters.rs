use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::models::VisitRecord;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterOptions {
    pub sites: Vec<String>,
    pub traders: Vec<String>,
    pub date_range: Option<(NaiveDateTime, NaiveDateTime)>,
}

/// Narrows a batch of visits before analysis. Empty lists and missing bounds
/// do not constrain anything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisitFilter {
    pub sites: Vec<String>,
    pub traders: Vec<String>,
    pub from: Option<NaiveDateTime>,
    pub to: Option<NaiveDateTime>,
}

impl VisitFilter {
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty() && self.traders.is_empty() && self.from.is_none() && self.to.is_none()
    }

    pub fn matches(&self, visit: &VisitRecord) -> bool {
        if !self.sites.is_empty() && !self.sites.contains(&visit.site_name) {
            return false;
        }
        if !self.traders.is_empty() && !self.traders.contains(&visit.trader_name) {
            return false;
        }
        if self.from.is_none() && self.to.is_none() {
            return true;
        }
        // undated visits cannot satisfy a date range
        let Some(visited_at) = visit.visited_at else {
            return false;
        };
        self.from.map_or(true, |from| visited_at >= from) && self.to.map_or(true, |to| visited_at <= to)
    }
}

pub fn filter_options(visits: &[VisitRecord]) -> FilterOptions {
    let sites: BTreeSet<&str> = visits.iter().map(|v| v.site_name.as_str()).collect();
    let traders: BTreeSet<&str> = visits.iter().map(|v| v.trader_name.as_str()).collect();
    let dates = visits.iter().filter_map(|v| v.visited_at);
    let date_range = dates.clone().min().zip(dates.max());

    FilterOptions {
        sites: sites.into_iter().map(str::to_string).collect(),
        traders: traders.into_iter().map(str::to_string).collect(),
        date_range,
    }
}

pub fn apply(visits: &[VisitRecord], filter: &VisitFilter) -> Vec<VisitRecord> {
    visits.iter().filter(|visit| filter.matches(visit)).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 4, day)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    fn visit(site: &str, trader: &str, day: Option<u32>) -> VisitRecord {
        VisitRecord {
            buyer_id: format!("{site}-{trader}"),
            buyer_name: None,
            buyer_phone: String::new(),
            trader_id: trader.to_string(),
            trader_name: trader.to_string(),
            site_name: site.to_string(),
            visited_at: day.map(at),
            latitude: Some(12.97),
            longitude: Some(77.59),
            selfie: None,
            verification_doc: None,
            remarks: None,
        }
    }

    #[test]
    fn options_are_sorted_and_distinct() {
        let visits = vec![
            visit("Whitefield", "Ravi", Some(3)),
            visit("HSR", "Asha", Some(1)),
            visit("HSR", "Ravi", None),
        ];
        let options = filter_options(&visits);
        assert_eq!(options.sites, vec!["HSR", "Whitefield"]);
        assert_eq!(options.traders, vec!["Asha", "Ravi"]);
        assert_eq!(options.date_range, Some((at(1), at(3))));
    }

    #[test]
    fn empty_filter_keeps_everything() {
        let visits = vec![visit("HSR", "Asha", None), visit("HSR", "Ravi", Some(2))];
        let filter = VisitFilter::default();
        assert!(filter.is_empty());
        assert_eq!(apply(&visits, &filter).len(), 2);
    }

    #[test]
    fn filters_by_site_trader_and_inclusive_dates() {
        let visits = vec![
            visit("HSR", "Asha", Some(1)),
            visit("HSR", "Ravi", Some(5)),
            visit("Whitefield", "Ravi", Some(5)),
            visit("HSR", "Ravi", None),
            visit("HSR", "Ravi", Some(9)),
        ];
        let filter = VisitFilter {
            sites: vec!["HSR".to_string()],
            traders: vec!["Ravi".to_string()],
            from: Some(at(5)),
            to: Some(at(9)),
        };
        let kept = apply(&visits, &filter);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|v| v.site_name == "HSR" && v.trader_name == "Ravi"));
    }
}
