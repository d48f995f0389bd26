use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use strum_macros::{AsRefStr, Display, EnumString};

/// Competition level of a match. Declaration order is play order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CompLevel {
    Qm,
    Ef,
    Qf,
    Sf,
    F,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Alliance {
    Red,
    Blue,
}

impl Alliance {
    pub fn opponent(self) -> Alliance {
        match self {
            Alliance::Red => Alliance::Blue,
            Alliance::Blue => Alliance::Red,
        }
    }
}

/// A scheduled or played match as stored by the match repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchModel {
    pub event_key: String,
    pub match_key: String,
    pub comp_level: CompLevel,
    pub set_number: i32,
    pub match_number: i32,
    pub red_1: Option<i32>,
    pub red_2: Option<i32>,
    pub red_3: Option<i32>,
    pub blue_1: Option<i32>,
    pub blue_2: Option<i32>,
    pub blue_3: Option<i32>,
    pub red_score: Option<i32>,
    pub blue_score: Option<i32>,
    /// Official breakdown keyed by alliance (`red` / `blue`)
    pub score_breakdown: Option<Value>,
}

impl MatchModel {
    /// Creates an unplayed qualification match with the given alliances.
    /// Zero team numbers leave the slot empty.
    pub fn qualification(event_key: &str, match_number: i32, red: [i32; 3], blue: [i32; 3]) -> Self {
        let slot = |team: i32| (team > 0).then_some(team);
        Self {
            event_key: event_key.to_string(),
            match_key: format!("{}_qm{}", event_key, match_number),
            comp_level: CompLevel::Qm,
            set_number: 1,
            match_number,
            red_1: slot(red[0]),
            red_2: slot(red[1]),
            red_3: slot(red[2]),
            blue_1: slot(blue[0]),
            blue_2: slot(blue[1]),
            blue_3: slot(blue[2]),
            red_score: None,
            blue_score: None,
            score_breakdown: None,
        }
    }

    pub fn with_scores(mut self, red_score: i32, blue_score: i32) -> Self {
        self.red_score = Some(red_score);
        self.blue_score = Some(blue_score);
        self
    }

    pub fn with_breakdown(mut self, breakdown: Value) -> Self {
        self.score_breakdown = Some(breakdown);
        self
    }

    /// Both alliances have a recorded, non-negative score
    pub fn is_completed(&self) -> bool {
        matches!((self.red_score, self.blue_score), (Some(r), Some(b)) if r >= 0 && b >= 0)
    }

    pub fn alliance_teams(&self, alliance: Alliance) -> Vec<i32> {
        let slots = match alliance {
            Alliance::Red => [self.red_1, self.red_2, self.red_3],
            Alliance::Blue => [self.blue_1, self.blue_2, self.blue_3],
        };
        slots.into_iter().flatten().collect()
    }

    /// All teams in the match, red alliance first, in station order
    pub fn teams(&self) -> Vec<i32> {
        let mut teams = self.alliance_teams(Alliance::Red);
        teams.extend(self.alliance_teams(Alliance::Blue));
        teams
    }

    /// Alliance and 1-based driver station of a team
    pub fn position_of(&self, team_number: i32) -> Option<(Alliance, usize)> {
        let red = [self.red_1, self.red_2, self.red_3];
        let blue = [self.blue_1, self.blue_2, self.blue_3];

        if let Some(idx) = red.iter().position(|slot| *slot == Some(team_number)) {
            return Some((Alliance::Red, idx + 1));
        }
        blue.iter()
            .position(|slot| *slot == Some(team_number))
            .map(|idx| (Alliance::Blue, idx + 1))
    }

    pub fn alliance_score(&self, alliance: Alliance) -> Option<i32> {
        match alliance {
            Alliance::Red => self.red_score,
            Alliance::Blue => self.blue_score,
        }
    }

    pub fn alliance_breakdown(&self, alliance: Alliance) -> Option<&Value> {
        let key: &str = alliance.as_ref();
        self.score_breakdown
            .as_ref()
            .and_then(|breakdown| breakdown.get(key))
            .filter(|value| value.is_object())
    }

    pub fn season_year(&self) -> Option<i32> {
        season_from_event_key(&self.event_key)
    }

    /// Play order: comp level, set, match number, then key as a tiebreaker
    pub fn canonical_cmp(&self, other: &MatchModel) -> Ordering {
        self.comp_level
            .cmp(&other.comp_level)
            .then(self.set_number.cmp(&other.set_number))
            .then(self.match_number.cmp(&other.match_number))
            .then_with(|| self.match_key.cmp(&other.match_key))
    }
}

/// Event keys start with the four-digit season, e.g. `2025wimi`
pub fn season_from_event_key(event_key: &str) -> Option<i32> {
    let prefix = event_key.get(0..4)?;
    if !prefix.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    prefix.parse().ok()
}
