//! Turns user preference flags and per-call overrides into a concrete
//! attempt plan. Total: there is no error case, only different plans.

use serde::{Deserialize, Serialize};

use crate::{SearchRequest, TierId, TIER_ORDER};

pub const DEFAULT_SEARCH_MODE: &str = "auto";
pub const DEFAULT_MAX_SEARCH_RESULTS: usize = 15;

/// Read-only slice of the user profile this engine cares about.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UserSearchPreferences {
    pub premium_enabled: bool,
}

/// One entry of the premium `sources` array, in the provider's wire shape:
/// `{"type":"web"}`, `{"type":"x"}` or `{"type":"x","x_handles":[...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PremiumSource {
    Web,
    X {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        x_handles: Vec<String>,
    },
}

/// `search_parameters` payload for the premium tier. Optional fields are
/// omitted from the wire entirely, never sent as null placeholders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PremiumParams {
    pub sources: Vec<PremiumSource>,
    pub mode: String,
    pub return_citations: bool,
    pub max_search_results: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safe_search: Option<bool>,
}

impl Default for PremiumParams {
    fn default() -> Self {
        Self {
            sources: vec![PremiumSource::Web],
            mode: DEFAULT_SEARCH_MODE.to_string(),
            return_citations: true,
            max_search_results: DEFAULT_MAX_SEARCH_RESULTS,
            from_date: None,
            to_date: None,
            country: None,
            safe_search: None,
        }
    }
}

/// Ephemeral, derived per call; never cached across requests.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptPlan {
    /// Eligible tiers in fixed priority order.
    pub tiers: Vec<TierId>,
    /// Present iff the premium tier is eligible.
    pub premium: Option<PremiumParams>,
}

/// Normalize X handles: trim, drop leading `@`s, drop empties.
///
/// Iterates each entry to a fixpoint so the cleaning is idempotent even for
/// junk like `"@ @name"`; for well-formed input this strips one leading `@`.
pub fn clean_handles(handles: &[String]) -> Vec<String> {
    handles
        .iter()
        .filter_map(|h| {
            let mut s = h.trim();
            loop {
                let t = s.trim_start_matches('@').trim();
                if t == s {
                    break;
                }
                s = t;
            }
            if s.is_empty() {
                None
            } else {
                Some(s.to_string())
            }
        })
        .collect()
}

/// Premium is eligible iff forced per call or enabled in the profile. Any
/// enrichment input — a profile with premium enabled, a handle, or a date
/// bound — upgrades the parameter set from the minimal web-only default to
/// web + X sources; only a bare forced call stays web-only.
pub fn resolve_plan(prefs: &UserSearchPreferences, req: &SearchRequest) -> AttemptPlan {
    let premium_eligible = req.force_premium || prefs.premium_enabled;
    if !premium_eligible {
        return AttemptPlan {
            tiers: vec![TierId::Primary, TierId::Secondary, TierId::Scrape],
            premium: None,
        };
    }

    let handles = clean_handles(&req.handles);
    let enriched = prefs.premium_enabled
        || !handles.is_empty()
        || req.from_date.is_some()
        || req.to_date.is_some();

    let premium = if enriched {
        PremiumParams {
            sources: vec![PremiumSource::Web, PremiumSource::X { x_handles: handles }],
            from_date: req.from_date.clone(),
            to_date: req.to_date.clone(),
            ..Default::default()
        }
    } else {
        PremiumParams::default()
    };

    AttemptPlan {
        tiers: TIER_ORDER.to_vec(),
        premium: Some(premium),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn req(query: &str) -> SearchRequest {
        SearchRequest::new(query)
    }

    #[test]
    fn premium_skipped_when_disabled_and_not_forced() {
        let plan = resolve_plan(
            &UserSearchPreferences {
                premium_enabled: false,
            },
            &req("Tesla stock news"),
        );
        assert_eq!(
            plan.tiers,
            vec![TierId::Primary, TierId::Secondary, TierId::Scrape]
        );
        assert!(plan.premium.is_none());
    }

    #[test]
    fn force_premium_overrides_disabled_preference() {
        let mut r = req("Tesla stock news");
        r.force_premium = true;
        let plan = resolve_plan(
            &UserSearchPreferences {
                premium_enabled: false,
            },
            &r,
        );
        assert_eq!(plan.tiers, TIER_ORDER.to_vec());
        let p = plan.premium.unwrap();
        // No enrichment input: minimal web-only default.
        assert_eq!(p.sources, vec![PremiumSource::Web]);
        assert_eq!(p.mode, "auto");
        assert!(p.return_citations);
        assert_eq!(p.max_search_results, 15);
        assert!(p.from_date.is_none());
    }

    #[test]
    fn profile_enabled_premium_gets_handleless_x_source() {
        let plan = resolve_plan(
            &UserSearchPreferences {
                premium_enabled: true,
            },
            &req("Tesla stock news"),
        );
        let p = plan.premium.unwrap();
        // A profile with premium on counts as enrichment: both sources,
        // even without handles or date bounds.
        assert_eq!(
            p.sources,
            vec![PremiumSource::Web, PremiumSource::X { x_handles: vec![] }]
        );
    }

    #[test]
    fn handles_upgrade_to_multi_source_params() {
        let mut r = req("latest launches");
        r.handles = vec!["@elonmusk".to_string(), " tesla ".to_string()];
        let plan = resolve_plan(
            &UserSearchPreferences {
                premium_enabled: true,
            },
            &r,
        );
        let p = plan.premium.unwrap();
        assert_eq!(
            p.sources,
            vec![
                PremiumSource::Web,
                PremiumSource::X {
                    x_handles: vec!["elonmusk".to_string(), "tesla".to_string()],
                },
            ]
        );
    }

    #[test]
    fn date_bound_alone_adds_handleless_x_source() {
        let mut r = req("quarterly results");
        r.from_date = Some("2026-01-01".to_string());
        let plan = resolve_plan(
            &UserSearchPreferences {
                premium_enabled: true,
            },
            &r,
        );
        let p = plan.premium.unwrap();
        assert_eq!(p.from_date.as_deref(), Some("2026-01-01"));
        assert!(p.to_date.is_none());
        assert_eq!(
            p.sources,
            vec![
                PremiumSource::Web,
                PremiumSource::X {
                    x_handles: vec![],
                },
            ]
        );
    }

    #[test]
    fn params_serialize_in_provider_wire_shape() {
        let mut r = req("q");
        r.handles = vec!["@a".to_string()];
        r.to_date = Some("2026-02-01".to_string());
        let plan = resolve_plan(
            &UserSearchPreferences {
                premium_enabled: true,
            },
            &r,
        );
        let js = serde_json::to_value(plan.premium.unwrap()).unwrap();
        assert_eq!(
            js["sources"],
            serde_json::json!([
                {"type": "web"},
                {"type": "x", "x_handles": ["a"]},
            ])
        );
        assert_eq!(js["to_date"], "2026-02-01");
        // Absent optionals must be omitted, not null.
        assert!(js.get("from_date").is_none());
        assert!(js.get("country").is_none());
        assert!(js.get("safe_search").is_none());
    }

    #[test]
    fn handleless_x_source_omits_x_handles_key() {
        let js = serde_json::to_value(PremiumSource::X { x_handles: vec![] }).unwrap();
        assert_eq!(js, serde_json::json!({"type": "x"}));
    }

    #[test]
    fn clean_handles_strips_ats_and_whitespace_and_empties() {
        let input = vec![
            "@elonmusk".to_string(),
            " tesla ".to_string(),
            "".to_string(),
            "  ".to_string(),
            "@".to_string(),
        ];
        assert_eq!(
            clean_handles(&input),
            vec!["elonmusk".to_string(), "tesla".to_string()]
        );
    }

    proptest! {
        #[test]
        fn clean_handles_is_idempotent(handles in prop::collection::vec(".{0,24}", 0..8)) {
            let once = clean_handles(&handles);
            let twice = clean_handles(&once);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn cleaned_handles_never_start_with_at_or_space(handles in prop::collection::vec(".{0,24}", 0..8)) {
            for h in clean_handles(&handles) {
                prop_assert!(!h.starts_with('@'));
                prop_assert_eq!(h.trim(), h.as_str());
                prop_assert!(!h.is_empty());
            }
        }
    }
}
