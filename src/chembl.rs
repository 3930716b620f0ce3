//! For loading bioactivity data from the [ChEMBL API](https://www.ebi.ac.uk/chembl/api/data/docs)
//!
//! We use the `activity` endpoint, filtered by target, and keep only the structure and the
//! pChEMBL value of each measurement.

use std::time::Duration;

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ureq::{self, Agent};

use crate::{config::DataConfig, error::Result};

/// One measured activity against the target.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub molecule_chembl_id: Option<String>,
    pub canonical_smiles: String,
    /// -log10 of the molar potency; higher is more potent.
    pub pchembl_value: f64,
}

/// One page of the activity endpoint, after filtering.
#[derive(Debug, Default)]
pub struct ActivityPage {
    pub records: Vec<ActivityRecord>,
    /// Elements in the payload, before filtering.
    pub num_raw: usize,
    /// Path or URL of the next page, if there is one.
    pub next: Option<String>,
}

#[derive(Deserialize)]
struct ActivityResponse {
    activities: Vec<RawActivity>,
    #[serde(default)]
    page_meta: Option<PageMeta>,
}

#[derive(Deserialize)]
struct RawActivity {
    #[serde(default)]
    molecule_chembl_id: Option<String>,
    #[serde(default)]
    canonical_smiles: Option<String>,
    /// ChEMBL serves this as a decimal string, but we accept numbers too.
    #[serde(default)]
    pchembl_value: Option<Value>,
}

#[derive(Deserialize)]
struct PageMeta {
    #[serde(default)]
    next: Option<String>,
}

fn activity_url(cfg: &DataConfig) -> String {
    format!(
        "{}/activity.json?target_chembl_id={}&limit={}",
        cfg.api_base_url.trim_end_matches('/'),
        cfg.target_id,
        cfg.limit
    )
}

/// ChEMBL's `page_meta.next` is a path on the API host; make it absolute.
fn resolve_next(api_base_url: &str, next: &str) -> String {
    if next.starts_with("http://") || next.starts_with("https://") {
        return next.to_owned();
    }

    let origin = match api_base_url.find("://") {
        Some(i) => {
            let after_scheme = i + 3;
            match api_base_url[after_scheme..].find('/') {
                Some(j) => &api_base_url[..after_scheme + j],
                None => api_base_url,
            }
        }
        None => api_base_url,
    };

    format!("{origin}/{}", next.trim_start_matches('/'))
}

fn parse_pchembl(v: &Value, chembl_id: Option<&str>) -> Option<f64> {
    let result = match v {
        Value::Null => return None,
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match result {
        Some(val) if val.is_finite() => Some(val),
        _ => {
            warn!(
                "Dropping activity {}: non-numeric pChEMBL value {v}",
                chembl_id.unwrap_or("(no ID)")
            );
            None
        }
    }
}

/// Parse one activity-endpoint payload. Rows missing a structure or a pChEMBL value are dropped.
/// A payload without an `activities` array is an error.
pub fn parse_activities(json: &str) -> Result<ActivityPage> {
    let resp: ActivityResponse = serde_json::from_str(json)?;

    let num_raw = resp.activities.len();
    let mut records = Vec::with_capacity(num_raw);

    for act in resp.activities {
        let Some(smiles) = act.canonical_smiles.filter(|s| !s.trim().is_empty()) else {
            continue;
        };
        let Some(pchembl) = act
            .pchembl_value
            .as_ref()
            .and_then(|v| parse_pchembl(v, act.molecule_chembl_id.as_deref()))
        else {
            continue;
        };

        records.push(ActivityRecord {
            molecule_chembl_id: act.molecule_chembl_id,
            canonical_smiles: smiles,
            pchembl_value: pchembl,
        });
    }

    Ok(ActivityPage {
        records,
        num_raw,
        next: resp.page_meta.and_then(|m| m.next),
    })
}

/// Fetch activities for the configured target. A non-success HTTP status is logged, and ends
/// the fetch with what was collected so far; for the first page, that's an empty table.
/// Transport failures and malformed payloads are errors.
pub fn fetch_activities(cfg: &DataConfig) -> Result<Vec<ActivityRecord>> {
    let config = Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(cfg.timeout_secs)))
        .build();

    let agent: Agent = config.into();

    let mut result = Vec::new();
    let mut url = Some(activity_url(cfg));
    let mut page_i = 0;

    while let Some(u) = url.take() {
        if page_i >= cfg.max_pages.max(1) {
            break;
        }

        info!("Fetching ChEMBL activities: {u}");

        let body = match agent.get(&u).call() {
            Ok(mut resp) => resp.body_mut().read_to_string()?,
            Err(ureq::Error::StatusCode(code)) => {
                error!("ChEMBL request failed with HTTP status {code}: {u}");
                break;
            }
            Err(e) => return Err(e.into()),
        };

        let page = parse_activities(&body)?;
        debug!(
            "Page {page_i}: {} of {} activities usable",
            page.records.len(),
            page.num_raw
        );

        result.extend(page.records);
        url = page.next.map(|n| resolve_next(&cfg.api_base_url, &n));
        page_i += 1;
    }

    info!(
        "Fetched {} activities for {} across {page_i} page(s)",
        result.len(),
        cfg.target_id
    );

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;

    const PAYLOAD: &str = r#"{
        "activities": [
            {"molecule_chembl_id": "CHEMBL1", "canonical_smiles": "CCO", "pchembl_value": "6.52"},
            {"molecule_chembl_id": "CHEMBL2", "canonical_smiles": "c1ccncc1", "pchembl_value": 5.1},
            {"molecule_chembl_id": "CHEMBL3", "canonical_smiles": "CCN", "pchembl_value": null},
            {"molecule_chembl_id": "CHEMBL4", "canonical_smiles": null, "pchembl_value": "7.0"},
            {"molecule_chembl_id": "CHEMBL5", "pchembl_value": "7.0"},
            {"molecule_chembl_id": "CHEMBL6", "canonical_smiles": "CC", "pchembl_value": "n/a"},
            {"canonical_smiles": "CCCC", "pchembl_value": "4.25"}
        ],
        "page_meta": {
            "limit": 7,
            "next": "/chembl/api/data/activity.json?limit=7&offset=7&target_chembl_id=CHEMBL4105728",
            "offset": 0,
            "total_count": 20
        }
    }"#;

    #[test]
    fn parse_filters_incomplete_rows() {
        let page = parse_activities(PAYLOAD).unwrap();

        assert_eq!(page.num_raw, 7);
        assert_eq!(page.records.len(), 3);

        assert_eq!(page.records[0].canonical_smiles, "CCO");
        assert_eq!(page.records[0].pchembl_value, 6.52);
        assert_eq!(page.records[1].pchembl_value, 5.1);
        assert_eq!(page.records[2].molecule_chembl_id, None);
        assert_eq!(page.records[2].pchembl_value, 4.25);

        assert!(page.next.is_some());
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(matches!(
            parse_activities(r#"{"error": "nope"}"#),
            Err(PipelineError::Payload(_))
        ));
        assert!(parse_activities("not json").is_err());
    }

    #[test]
    fn empty_activities_is_empty_table() {
        let page = parse_activities(r#"{"activities": [], "page_meta": {"next": null}}"#).unwrap();
        assert!(page.records.is_empty());
        assert!(page.next.is_none());
    }

    #[test]
    fn urls() {
        let cfg = DataConfig::default();
        assert_eq!(
            activity_url(&cfg),
            "https://www.ebi.ac.uk/chembl/api/data/activity.json?target_chembl_id=CHEMBL4105728&limit=1000"
        );
        assert_eq!(
            resolve_next(&cfg.api_base_url, "/chembl/api/data/activity.json?offset=1000"),
            "https://www.ebi.ac.uk/chembl/api/data/activity.json?offset=1000"
        );
        assert_eq!(
            resolve_next(&cfg.api_base_url, "https://example.org/x"),
            "https://example.org/x"
        );
    }
}
