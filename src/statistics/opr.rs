use chrono::Utc;
use nalgebra::{DMatrix, DVector};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, instrument};

use super::models::{Distribution, FieldStatistics, OprMetrics, TeamMetrics};
use super::recommendations::recommend_alliances;
use super::StatisticsError;
use crate::matches::{Alliance, MatchModel};

/// Singular values below this are treated as zero
const SINGULAR_EPSILON: f64 = 1e-9;

/// Teams with fewer matches than this get a low-sample warning
const MIN_RELIABLE_MATCHES: usize = 3;

/// One alliance's appearance: its teams, what it scored and what it allowed
struct AllianceEquation {
    teams: Vec<i32>,
    scored: f64,
    allowed: f64,
}

/// Solves OPR and DPR for every team that played a completed match.
///
/// Each alliance in each completed match contributes one equation: the sum
/// of its teams' OPR approximates the alliance score, and the sum of their
/// DPR approximates the opposing score. The least squares solution is the
/// minimum-norm one, so rank-deficient schedules still produce numbers
/// (with a warning).
#[instrument(skip(matches), fields(matches = matches.len()))]
pub fn calculate_opr(event_key: &str, matches: &[MatchModel]) -> Result<OprMetrics, StatisticsError> {
    let equations: Vec<AllianceEquation> = matches
        .iter()
        .filter(|m| m.is_completed())
        .flat_map(|m| [Alliance::Red, Alliance::Blue].map(|alliance| (m, alliance)))
        .filter_map(|(m, alliance)| {
            let teams = m.alliance_teams(alliance);
            if teams.is_empty() {
                return None;
            }
            Some(AllianceEquation {
                teams,
                scored: f64::from(m.alliance_score(alliance)?),
                allowed: f64::from(m.alliance_score(alliance.opponent())?),
            })
        })
        .collect();

    let completed_matches = matches.iter().filter(|m| m.is_completed()).count();
    if completed_matches == 0 {
        return Err(StatisticsError::NoCompletedMatches {
            event_key: event_key.to_string(),
        });
    }

    let teams: Vec<i32> = equations
        .iter()
        .flat_map(|e| e.teams.iter().copied())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let column: BTreeMap<i32, usize> = teams.iter().enumerate().map(|(i, t)| (*t, i)).collect();

    if teams.is_empty() || equations.len() < teams.len() {
        return Err(StatisticsError::InsufficientData {
            equations: equations.len(),
            unknowns: teams.len(),
        });
    }

    let mut design = DMatrix::<f64>::zeros(equations.len(), teams.len());
    let mut matches_played = vec![0usize; teams.len()];
    for (row, equation) in equations.iter().enumerate() {
        for team in &equation.teams {
            let col = column[team];
            design[(row, col)] = 1.0;
            matches_played[col] += 1;
        }
    }
    let scored = DVector::from_iterator(equations.len(), equations.iter().map(|e| e.scored));
    let allowed = DVector::from_iterator(equations.len(), equations.iter().map(|e| e.allowed));

    let svd = design.svd(true, true);
    let rank = svd.rank(SINGULAR_EPSILON);
    let insufficient = || StatisticsError::InsufficientData {
        equations: equations.len(),
        unknowns: teams.len(),
    };
    let opr = svd.solve(&scored, SINGULAR_EPSILON).map_err(|_| insufficient())?;
    let dpr = svd.solve(&allowed, SINGULAR_EPSILON).map_err(|_| insufficient())?;

    let mut warnings = Vec::new();
    if rank < teams.len() {
        warnings.push(format!(
            "Schedule does not separate all teams (rank {rank} of {}); values are minimum-norm estimates",
            teams.len()
        ));
    }

    let mut metrics: Vec<TeamMetrics> = teams
        .iter()
        .enumerate()
        .map(|(i, team_number)| TeamMetrics {
            team_number: *team_number,
            opr: opr[i],
            dpr: dpr[i],
            ccwm: opr[i] - dpr[i],
            matches_played: matches_played[i],
        })
        .collect();
    metrics.sort_by(|a, b| b.opr.total_cmp(&a.opr).then(a.team_number.cmp(&b.team_number)));

    warnings.extend(
        metrics
            .iter()
            .filter(|t| t.matches_played < MIN_RELIABLE_MATCHES)
            .map(|t| {
                format!(
                    "Team {} has played only {} match(es)",
                    t.team_number, t.matches_played
                )
            }),
    );

    debug!(
        equations = equations.len(),
        teams = teams.len(),
        rank,
        warnings = warnings.len(),
        "Solved event ratings"
    );

    Ok(OprMetrics {
        event_key: event_key.to_string(),
        completed_matches,
        team_count: metrics.len(),
        field: field_statistics(&metrics),
        recommendations: recommend_alliances(&metrics),
        teams: metrics,
        warnings,
        calculated_at: Utc::now(),
    })
}

pub fn field_statistics(teams: &[TeamMetrics]) -> FieldStatistics {
    FieldStatistics {
        opr: distribution(teams.iter().map(|t| t.opr).collect()),
        dpr: distribution(teams.iter().map(|t| t.dpr).collect()),
        ccwm: distribution(teams.iter().map(|t| t.ccwm).collect()),
    }
}

/// Population statistics; all zeros for an empty sample
pub fn distribution(mut values: Vec<f64>) -> Distribution {
    if values.is_empty() {
        return Distribution::default();
    }
    values.sort_by(f64::total_cmp);

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

    Distribution {
        mean,
        median: median_of_sorted(&values),
        min: values[0],
        max: values[values.len() - 1],
        std_dev: variance.sqrt(),
    }
}

pub(crate) fn median_of_sorted(values: &[f64]) -> f64 {
    match values.len() {
        0 => 0.0,
        n if n % 2 == 1 => values[n / 2],
        n => (values[n / 2 - 1] + values[n / 2]) / 2.0,
    }
}
