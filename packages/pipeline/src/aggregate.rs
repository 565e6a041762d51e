//! Composite aggregation, elimination rules, and ranking.

use std::cmp::Ordering;

use parcel_scout_pipeline_models::ScoreResult;
use parcel_scout_scoring_models::{CategoryScore, EliminationRule, ProgramConfig};
use parcel_scout_site_models::Site;

/// Combines a site's category scores into one composite result.
///
/// The total is the sum of weighted category points in the program's
/// declared category order. Elimination rules are evaluated over the full
/// score set; any firing rule marks the result eliminated and records its
/// reason, but the numeric total is still computed so eliminated sites
/// remain auditable.
#[must_use]
pub fn aggregate(
    site: &Site,
    category_scores: Vec<CategoryScore>,
    program: &ProgramConfig,
) -> ScoreResult {
    let total_points: f64 = category_scores
        .iter()
        .map(|score| score.weighted_points)
        .sum();

    let mut elimination_reasons = Vec::new();
    for rule in &program.eliminations {
        if rule_fires(rule, &category_scores) {
            log::info!(
                "Site '{}' eliminated by rule on category '{}': {}",
                site.id,
                rule.category(),
                rule.reason()
            );
            elimination_reasons.push(rule.reason().to_owned());
        }
    }

    ScoreResult {
        site_id: site.id.clone(),
        total_points,
        eliminated: !elimination_reasons.is_empty(),
        elimination_reasons,
        category_scores,
    }
}

/// Whether an elimination rule fires against a score set.
fn rule_fires(rule: &EliminationRule, scores: &[CategoryScore]) -> bool {
    let Some(score) = scores.iter().find(|s| s.category == rule.category()) else {
        return false;
    };

    match rule {
        EliminationRule::TierIs { tier, .. } => score.tier == *tier,
        EliminationRule::WithinMiles { distance_miles, .. } => score
            .distance_miles
            .is_some_and(|distance| distance <= *distance_miles),
    }
}

/// Orders scored results into a deterministic total order.
///
/// Non-eliminated sites always rank ahead of eliminated ones regardless
/// of score. Within each group: higher total points first, then fewer
/// fired elimination rules, then lower aggregate tier severity, then site
/// id — input order never influences the ranking.
#[must_use]
pub fn rank<'a>(results: impl IntoIterator<Item = &'a ScoreResult>) -> Vec<&'a ScoreResult> {
    let mut ranked: Vec<&ScoreResult> = results.into_iter().collect();
    ranked.sort_by(|a, b| ranking_order(a, b));
    ranked
}

/// Comparator form of the ranking order, for callers sorting their own
/// collections.
#[must_use]
pub fn ranking_order(a: &ScoreResult, b: &ScoreResult) -> Ordering {
    a.eliminated
        .cmp(&b.eliminated)
        .then_with(|| b.total_points.total_cmp(&a.total_points))
        .then_with(|| a.elimination_reasons.len().cmp(&b.elimination_reasons.len()))
        .then_with(|| a.aggregate_severity().cmp(&b.aggregate_severity()))
        .then_with(|| a.site_id.cmp(&b.site_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program() -> ProgramConfig {
        toml::from_str(
            r#"
            id = "test"
            name = "Test Program"

            [[category]]
            id = "flood"
            name = "Flood"
            weight = 1.0
            search_radius_miles = 1.0

            [[category.tier]]
            name = "FLOOD_VERY_HIGH"
            points = 0.0
            severity = 5

            [[category.tier]]
            name = "FLOOD_CLEAR"
            points = 4.0
            severity = 0

            [[category.tier]]
            name = "NO_DATA"
            points = 0.0
            severity = 2

            [[category.rule]]
            tier = "FLOOD_VERY_HIGH"
            match = "containment"

            [[category.rule]]
            tier = "FLOOD_CLEAR"
            match = "fallback"

            [[category]]
            id = "competing"
            name = "Competing developments"
            weight = 0.0
            search_radius_miles = 1.0

            [[category.tier]]
            name = "COMPETING_NEARBY"
            points = 0.0
            severity = 1

            [[category.tier]]
            name = "COMPETING_CLEAR"
            points = 0.0
            severity = 0

            [[category.tier]]
            name = "NO_DATA"
            points = 0.0
            severity = 0

            [[category.rule]]
            tier = "COMPETING_NEARBY"
            match = "within"
            distance_miles = 0.25

            [[category.rule]]
            tier = "COMPETING_CLEAR"
            match = "fallback"

            [[elimination]]
            kind = "tier_is"
            category = "flood"
            tier = "FLOOD_VERY_HIGH"
            reason = "Site lies in a very-high flood zone"

            [[elimination]]
            kind = "within_miles"
            category = "competing"
            distance_miles = 0.25
            reason = "Competing development within a quarter mile"
            "#,
        )
        .unwrap()
    }

    fn score(
        category: &str,
        tier: &str,
        severity: u8,
        weighted: f64,
        distance: Option<f64>,
    ) -> CategoryScore {
        CategoryScore {
            category: category.to_owned(),
            tier: tier.to_owned(),
            severity,
            points: weighted,
            weight: 1.0,
            weighted_points: weighted,
            distance_miles: distance,
            effective_distance_miles: None,
            matched_feature_id: None,
            matched_source: None,
            applied_modifiers: Vec::new(),
        }
    }

    fn result(site_id: &str, scores: Vec<CategoryScore>) -> ScoreResult {
        aggregate(&Site::new(site_id, 34.0, -118.0), scores, &program())
    }

    #[test]
    fn total_is_weighted_sum_in_category_order() {
        let result = result(
            "s1",
            vec![
                score("flood", "FLOOD_CLEAR", 0, 4.0, None),
                score("competing", "COMPETING_CLEAR", 0, 0.0, None),
            ],
        );
        assert!((result.total_points - 4.0).abs() < f64::EPSILON);
        assert!(!result.eliminated);
        assert!((result.recomputed_total() - result.total_points).abs() < f64::EPSILON);
    }

    #[test]
    fn tier_elimination_fires_and_keeps_total() {
        let result = result(
            "s1",
            vec![score("flood", "FLOOD_VERY_HIGH", 5, 0.0, Some(0.0))],
        );
        assert!(result.eliminated);
        assert_eq!(result.elimination_reasons.len(), 1);
        assert!((result.total_points - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn distance_elimination_fires_inside_exclusion_radius() {
        let near = result(
            "s1",
            vec![score("competing", "COMPETING_NEARBY", 1, 0.0, Some(0.2))],
        );
        assert!(near.eliminated);

        let clear = result(
            "s2",
            vec![score("competing", "COMPETING_CLEAR", 0, 0.0, Some(0.6))],
        );
        assert!(!clear.eliminated);
    }

    #[test]
    fn eliminated_site_never_outranks_viable_site() {
        // The eliminated site scores 10 points higher but must rank last.
        let eliminated = result(
            "high-score",
            vec![
                score("flood", "FLOOD_VERY_HIGH", 5, 10.0, Some(0.0)),
                score("competing", "COMPETING_CLEAR", 0, 0.0, None),
            ],
        );
        let viable = result(
            "low-score",
            vec![
                score("flood", "FLOOD_CLEAR", 0, 0.0, None),
                score("competing", "COMPETING_CLEAR", 0, 0.0, None),
            ],
        );
        assert!(eliminated.eliminated);
        assert!(eliminated.total_points > viable.total_points);

        let ranked = rank([&eliminated, &viable]);
        assert_eq!(ranked[0].site_id, "low-score");
        assert_eq!(ranked[1].site_id, "high-score");
    }

    #[test]
    fn equal_scores_break_by_severity_then_id() {
        let risky = result(
            "b-site",
            vec![score("flood", "NO_DATA", 2, 4.0, None)],
        );
        let safe = result(
            "c-site",
            vec![score("flood", "FLOOD_CLEAR", 0, 4.0, None)],
        );
        let ranked = rank([&risky, &safe]);
        assert_eq!(ranked[0].site_id, "c-site");

        let twin_a = result("a-site", vec![score("flood", "FLOOD_CLEAR", 0, 4.0, None)]);
        let ranked = rank([&safe, &twin_a]);
        assert_eq!(ranked[0].site_id, "a-site");
    }

    #[test]
    fn ranking_ignores_input_order() {
        let first = result("s1", vec![score("flood", "FLOOD_CLEAR", 0, 4.0, None)]);
        let second = result("s2", vec![score("flood", "NO_DATA", 2, 0.0, None)]);

        let forward = rank([&first, &second]);
        let backward = rank([&second, &first]);
        let forward_ids: Vec<_> = forward.iter().map(|r| r.site_id.as_str()).collect();
        let backward_ids: Vec<_> = backward.iter().map(|r| r.site_id.as_str()).collect();
        assert_eq!(forward_ids, backward_ids);
    }
}
