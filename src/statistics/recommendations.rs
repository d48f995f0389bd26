use super::models::{AllianceRecommendations, TeamMetrics};
use super::opr::median_of_sorted;

const FIRST_PICK_COUNT: usize = 8;
const SECOND_PICK_COUNT: usize = 16;
const DEFENSIVE_PICK_COUNT: usize = 5;
const BALANCED_PICK_COUNT: usize = 5;

/// Buckets teams into alliance-selection tiers.
///
/// First and second picks are consecutive slices of the CCWM ranking.
/// Defensive picks allow the fewest points. Balanced picks are at least
/// median on offense and at most median on points allowed.
pub fn recommend_alliances(teams: &[TeamMetrics]) -> AllianceRecommendations {
    let mut by_ccwm: Vec<&TeamMetrics> = teams.iter().collect();
    by_ccwm.sort_by(|a, b| b.ccwm.total_cmp(&a.ccwm).then(a.team_number.cmp(&b.team_number)));

    let mut by_dpr: Vec<&TeamMetrics> = teams.iter().collect();
    by_dpr.sort_by(|a, b| a.dpr.total_cmp(&b.dpr).then(a.team_number.cmp(&b.team_number)));

    let median_opr = median(teams.iter().map(|t| t.opr));
    let median_dpr = median(teams.iter().map(|t| t.dpr));

    AllianceRecommendations {
        first_pick: by_ccwm
            .iter()
            .take(FIRST_PICK_COUNT)
            .map(|t| t.team_number)
            .collect(),
        second_pick: by_ccwm
            .iter()
            .skip(FIRST_PICK_COUNT)
            .take(SECOND_PICK_COUNT)
            .map(|t| t.team_number)
            .collect(),
        defensive_pick: by_dpr
            .iter()
            .take(DEFENSIVE_PICK_COUNT)
            .map(|t| t.team_number)
            .collect(),
        balanced_pick: by_ccwm
            .iter()
            .filter(|t| t.opr >= median_opr && t.dpr <= median_dpr)
            .take(BALANCED_PICK_COUNT)
            .map(|t| t.team_number)
            .collect(),
    }
}

fn median(values: impl Iterator<Item = f64>) -> f64 {
    let mut values: Vec<f64> = values.collect();
    values.sort_by(f64::total_cmp);
    median_of_sorted(&values)
}
