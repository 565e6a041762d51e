//! Tier classification: ordered rule tables over spatial relationships.

use parcel_scout_resolver::SpatialRelationship;
use parcel_scout_scoring_models::{CategoryConfig, NO_DATA_TIER, RulePredicate};

use crate::ScoringError;

/// Classifies a resolved relationship into one of the category's tiers.
///
/// Rules are evaluated in declared order and the first match wins. A rule
/// with an attribute requirement only matches when the matched feature's
/// attributes satisfy it; otherwise classification falls through to the
/// next rule (this is the "only count the stop if it is
/// frequency-validated" behavior, applied centrally).
///
/// No-data relationships always classify to the reserved [`NO_DATA_TIER`]
/// without consulting the rule list — missing reference data must stay
/// distinguishable from a confirmed low tier.
///
/// Classification is pure: identical inputs always produce the same tier.
///
/// # Errors
///
/// Returns [`ScoringError::UnmappedTier`] when no rule matches and the
/// category declares no fallback rule.
pub fn classify(
    category: &CategoryConfig,
    relationship: &SpatialRelationship,
) -> Result<String, ScoringError> {
    if relationship.is_no_data() {
        return Ok(NO_DATA_TIER.to_owned());
    }

    for rule in &category.rules {
        let predicate_holds = match &rule.predicate {
            RulePredicate::Containment => {
                matches!(relationship, SpatialRelationship::Contained { .. })
            }
            RulePredicate::Within { distance_miles } => relationship
                .distance_miles()
                .is_some_and(|distance| distance <= *distance_miles),
            RulePredicate::Fallback => true,
        };
        if !predicate_holds {
            continue;
        }

        if let Some(requirement) = &rule.requires {
            let satisfied = relationship
                .matched()
                .is_some_and(|feature| requirement.is_satisfied_by(&feature.attributes));
            if !satisfied {
                log::debug!(
                    "Rule for tier '{}' in category '{}' matched spatially but failed \
                     its attribute requirement on '{}'",
                    rule.tier,
                    category.id,
                    requirement.attribute
                );
                continue;
            }
        }

        return Ok(rule.tier.clone());
    }

    Err(ScoringError::UnmappedTier {
        category: category.id.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parcel_scout_geodata::MatchedFeature;
    use std::collections::BTreeMap;

    fn transit_category() -> CategoryConfig {
        toml::from_str(
            r#"
            id = "transit"
            name = "Transit proximity"
            weight = 1.0
            search_radius_miles = 2.0

            [[tier]]
            name = "TRANSIT_TOP"
            points = 7.0
            severity = 0

            [[tier]]
            name = "TRANSIT_NEAR"
            points = 5.0
            severity = 1

            [[tier]]
            name = "TRANSIT_FAR"
            points = 3.0
            severity = 2

            [[tier]]
            name = "TRANSIT_NONE"
            points = 0.0
            severity = 3

            [[tier]]
            name = "NO_DATA"
            points = 0.0
            severity = 3

            [[rule]]
            tier = "TRANSIT_TOP"
            match = "containment"
            requires = { attribute = "high_frequency", equals = "true" }

            [[rule]]
            tier = "TRANSIT_NEAR"
            match = "within"
            distance_miles = 0.25
            requires = { attribute = "peak_headway_minutes", max = 30.0 }

            [[rule]]
            tier = "TRANSIT_FAR"
            match = "within"
            distance_miles = 0.5

            [[rule]]
            tier = "TRANSIT_NONE"
            match = "fallback"
            "#,
        )
        .unwrap()
    }

    fn matched(attributes: &[(&str, &str)]) -> MatchedFeature {
        MatchedFeature {
            feature_id: "f1".to_owned(),
            source: "src".to_owned(),
            attributes: attributes
                .iter()
                .map(|(k, v)| {
                    (
                        (*k).to_owned(),
                        serde_json::Value::String((*v).to_owned()),
                    )
                })
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn containment_with_validated_attribute_takes_top_tier() {
        let relationship = SpatialRelationship::Contained {
            feature: matched(&[("high_frequency", "true")]),
        };
        let tier = classify(&transit_category(), &relationship).unwrap();
        assert_eq!(tier, "TRANSIT_TOP");
    }

    #[test]
    fn failed_attribute_requirement_falls_through() {
        // Inside a transit polygon that is not high-frequency: containment
        // rule fails validation, distance-zero still satisfies the next
        // distance rule's bound, but its headway requirement fails too, so
        // classification lands on the unvalidated distance tier.
        let relationship = SpatialRelationship::Contained {
            feature: matched(&[("high_frequency", "false")]),
        };
        let tier = classify(&transit_category(), &relationship).unwrap();
        assert_eq!(tier, "TRANSIT_FAR");
    }

    #[test]
    fn distance_bound_is_inclusive() {
        let relationship = SpatialRelationship::Nearby {
            distance_miles: 0.25,
            feature: matched(&[("peak_headway_minutes", "12")]),
        };
        let tier = classify(&transit_category(), &relationship).unwrap();
        assert_eq!(tier, "TRANSIT_NEAR");
    }

    #[test]
    fn distance_past_bound_takes_next_looser_tier() {
        // 0.3 mi against a 0.25 mi bound: the tighter tier must not match.
        let relationship = SpatialRelationship::Nearby {
            distance_miles: 0.3,
            feature: matched(&[("peak_headway_minutes", "12")]),
        };
        let tier = classify(&transit_category(), &relationship).unwrap();
        assert_eq!(tier, "TRANSIT_FAR");
    }

    #[test]
    fn fallback_catches_distances_past_every_bound() {
        let relationship = SpatialRelationship::Nearby {
            distance_miles: 1.8,
            feature: matched(&[]),
        };
        let tier = classify(&transit_category(), &relationship).unwrap();
        assert_eq!(tier, "TRANSIT_NONE");
    }

    #[test]
    fn no_data_classifies_to_reserved_tier() {
        let tier = classify(&transit_category(), &SpatialRelationship::NoData).unwrap();
        assert_eq!(tier, NO_DATA_TIER);
    }

    #[test]
    fn missing_fallback_is_a_hard_error() {
        let mut category = transit_category();
        category.rules.pop();

        let relationship = SpatialRelationship::Nearby {
            distance_miles: 1.8,
            feature: matched(&[]),
        };
        let err = classify(&category, &relationship).unwrap_err();
        assert_eq!(
            err,
            ScoringError::UnmappedTier {
                category: "transit".to_owned()
            }
        );
    }

    #[test]
    fn classification_is_deterministic() {
        let relationship = SpatialRelationship::Nearby {
            distance_miles: 0.4,
            feature: matched(&[("peak_headway_minutes", "12")]),
        };
        let category = transit_category();
        let first = classify(&category, &relationship).unwrap();
        let second = classify(&category, &relationship).unwrap();
        assert_eq!(first, second);
    }
}
