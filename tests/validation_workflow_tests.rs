use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt; // for `oneshot`

use scouter_validation::{
    elo::{InMemoryScouterEloRepository, ScouterEloRepository},
    matches::MatchModel,
    routes,
    validation::{ValidationOutcome, ValidationResultRepository, ValidationStrategyType},
};

mod utils;

use utils::*;

const CONSENSUS: &[ValidationStrategyType] = &[ValidationStrategyType::Consensus];

fn standard_performance() -> Value {
    json!({
        "schema_version": "2025.1",
        "auto": { "left_starting_zone": true, "coral_l4": 2 },
        "teleop": { "coral_l2": 5, "algae_net": 1 },
        "endgame": { "position": "deep" },
    })
}

fn two_match_event() -> EventBuilder {
    EventBuilder::new("2025wimi")
        .with_played_match(1, [254, 1114, 2056], [118, 148, 1678])
        .with_played_match(2, [930, 2767, 3310], [971, 1323, 4414])
}

#[tokio::test]
async fn test_consensus_needs_minimum_scouts_per_team() {
    let event = two_match_event().with_scouts_everywhere(&["alex", "blair"], standard_performance());
    let setup = TestSetupBuilder::new(event).with_min_scouts(3).build();

    let summary = setup
        .service
        .validate_event("2025wimi", Some(CONSENSUS))
        .await
        .unwrap();

    assert_eq!(summary.total_matches, 2);
    assert_eq!(summary.matches_processed, 2);
    assert_eq!(summary.total_validations, 0);
    assert_eq!(summary.scouters_affected, 0);
    assert!(summary.errors.is_empty());
    assert_eq!(setup.results.result_count().await, 0);
    assert_eq!(setup.elo.history_len().await, 0);
}

#[tokio::test]
async fn test_consensus_run_rates_every_scout() {
    let event = two_match_event()
        .with_scouts_everywhere(&["alex", "blair", "casey"], standard_performance());
    let setup = TestSetupBuilder::new(event).with_min_scouts(3).build();

    let summary = setup
        .service
        .validate_event("2025wimi", Some(CONSENSUS))
        .await
        .unwrap();

    // 12 teams, 3 scouts each
    assert_eq!(summary.teams_validated, 12);
    assert_eq!(summary.total_validations, 36);
    assert_eq!(
        summary.validations_by_type.get(&ValidationStrategyType::Consensus),
        Some(&36)
    );
    assert_eq!(summary.scouters_affected, 3);
    let truths = setup.service.get_match_truths("2025wimi_qm1").await.unwrap();
    assert_eq!(truths.len(), 6);

    for update in &summary.elo_updates {
        assert_eq!(update.starting_elo, 1500);
        assert_eq!(update.validations_processed, 12);
        assert!(update.ending_elo > update.starting_elo);
        assert_eq!(update.average_accuracy, 1.0);
    }
}

#[tokio::test]
async fn test_history_chains_in_play_order() {
    let event = two_match_event()
        .with_scouts_everywhere(&["alex", "blair", "casey"], standard_performance());
    let setup = TestSetupBuilder::new(event).with_min_scouts(3).build();

    setup.service.validate_event("2025wimi", None).await.unwrap();

    let history = setup
        .service
        .get_scouter_rating_history("alex", 2025, None)
        .await
        .unwrap();
    assert_eq!(history.len(), 12);
    assert_eq!(history[0].elo_before, 1500);
    assert_eq!(history[0].match_key, "2025wimi_qm1");
    assert_eq!(history[11].match_key, "2025wimi_qm2");
    assert!(history[..6].iter().all(|e| e.match_key == "2025wimi_qm1"));
    for pair in history.windows(2) {
        assert_eq!(pair[0].elo_after, pair[1].elo_before);
    }

    let rating = setup.service.get_scouter_rating("alex", 2025).await.unwrap();
    assert_eq!(rating.current_elo, history[11].elo_after);
    assert_eq!(rating.total_validations, 12);
    assert_eq!(rating.successful_validations, 12);
    assert_eq!(rating.peak_elo, rating.current_elo);

    let recent = setup
        .service
        .get_scouter_rating_history("alex", 2025, Some(3))
        .await
        .unwrap();
    assert_eq!(recent.len(), 3);
    assert_eq!(recent[2].id, history[11].id);
}

#[tokio::test]
async fn test_outlier_scout_falls_behind() {
    let sloppy = json!({
        "auto": { "left_starting_zone": false, "coral_l4": 6 },
        "teleop": { "coral_l2": 0, "algae_net": 4 },
        "endgame": { "position": "none" },
    });
    let event = EventBuilder::new("2025wimi")
        .with_played_match(1, [254, 1114, 2056], [118, 148, 1678])
        .with_scouts(1, 254, &["alex", "blair", "casey"], standard_performance())
        .with_scouts(1, 254, &["drew"], sloppy);
    let setup = TestSetupBuilder::new(event).with_min_scouts(3).build();

    let summary = setup
        .service
        .validate_event("2025wimi", Some(CONSENSUS))
        .await
        .unwrap();
    assert_eq!(summary.total_validations, 4);

    let drew = setup
        .results
        .find_by_scouter("drew", Some(2025))
        .await
        .unwrap();
    assert_eq!(drew.len(), 1);
    assert_eq!(drew[0].outcome, ValidationOutcome::Mismatch);

    let board = setup
        .service
        .get_event_leaderboard("2025wimi", None)
        .await
        .unwrap();
    assert_eq!(board.len(), 4);
    assert_eq!(board[0].rank, 1);
    assert_eq!(board[3].scouter_id, "drew");
    assert!(board[3].elo_change < 0);

    let season = setup
        .service
        .get_season_leaderboard(2025, Some(2))
        .await
        .unwrap();
    assert_eq!(season.len(), 2);
    assert!(season.iter().all(|entry| entry.scouter_id != "drew"));
}

#[tokio::test]
async fn test_official_breakdown_validates_scouts() {
    let played = MatchModel::qualification("2025wimi", 1, [254, 1114, 2056], [118, 148, 1678])
        .with_scores(120, 60)
        .with_breakdown(json!({
            "red": {
                "autoLineRobot1": "Yes",
                "endGameRobot1": "DeepCage",
                "autoLineRobot2": "No",
                "endGameRobot2": "Parked",
            },
            "blue": {}
        }));
    let event = EventBuilder::new("2025wimi")
        .with_match(played)
        .with_scouts(1, 254, &["alex"], standard_performance())
        .with_scouts(1, 1114, &["blair"], standard_performance());
    let setup = TestSetupBuilder::new(event).build();

    let summary = setup.service.validate_match("2025wimi_qm1", None).await.unwrap();

    assert_eq!(summary.match_key.as_deref(), Some("2025wimi_qm1"));
    assert_eq!(
        summary.validations_by_type.get(&ValidationStrategyType::Tba),
        Some(&2)
    );
    assert!(!summary
        .validations_by_type
        .contains_key(&ValidationStrategyType::Consensus));

    let results = setup.service.get_match_validations("2025wimi_qm1").await.unwrap();
    let alex = results.iter().find(|r| r.scouter_id == "alex").unwrap();
    let blair = results.iter().find(|r| r.scouter_id == "blair").unwrap();
    assert_eq!(alex.outcome, ValidationOutcome::ExactMatch);
    assert_eq!(blair.outcome, ValidationOutcome::Mismatch);
    assert_eq!(blair.accuracy_score, 0.0);
}

#[tokio::test]
async fn test_failing_team_does_not_abort_match() {
    let event = EventBuilder::new("2025wimi")
        .with_played_match(1, [254, 1114, 2056], [118, 148, 1678])
        .with_scouts_everywhere(&["alex", "blair", "casey"], standard_performance());
    let (_, observations) = EventBuilder::new("2025wimi")
        .with_played_match(1, [254, 1114, 2056], [118, 148, 1678])
        .with_scouts_everywhere(&["alex", "blair", "casey"], standard_performance())
        .build();
    let setup = TestSetupBuilder::new(event)
        .with_min_scouts(3)
        .with_scouting_repository(Arc::new(FlakyScoutingRepository::new(observations, 1114)))
        .build();

    let summary = setup
        .service
        .validate_match("2025wimi_qm1", Some(CONSENSUS))
        .await
        .unwrap();

    assert_eq!(summary.teams_validated, 5);
    assert_eq!(summary.total_validations, 15);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].team_number, Some(1114));
    assert_eq!(summary.errors[0].match_key.as_deref(), Some("2025wimi_qm1"));
    assert!(summary.errors[0].message.contains("connection reset"));
}

#[tokio::test]
async fn test_stale_rating_write_is_reported_per_scouter() {
    let event = EventBuilder::new("2025wimi")
        .with_played_match(1, [254, 1114, 2056], [118, 148, 1678])
        .with_scouts(1, 254, &["alex", "blair", "casey"], standard_performance());
    let backing = Arc::new(InMemoryScouterEloRepository::new());
    let writer = Arc::new(InterferingEloRepository::new(backing.clone(), "blair"));
    let setup = TestSetupBuilder::new(event)
        .with_min_scouts(3)
        .with_elo_repository(writer, backing)
        .build();

    let summary = setup.service.validate_event("2025wimi", None).await.unwrap();

    assert_eq!(summary.total_validations, 3);
    assert_eq!(summary.scouters_affected, 2);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].scouter_id.as_deref(), Some("blair"));
    assert!(summary.errors[0].message.contains("Conflict"));

    // the competing writer's value survives
    let blair = setup.elo.get_current_rating("blair", 2025).await.unwrap().unwrap();
    assert_eq!(blair.current_elo, 1507);
    assert!(setup
        .elo
        .get_rating_history("blair", 2025, None)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_overlapping_runs_for_one_event_serialize() {
    let event = two_match_event()
        .with_scouts_everywhere(&["alex", "blair", "casey"], standard_performance());
    let setup = TestSetupBuilder::new(event).with_min_scouts(3).build();

    let first = setup.service.clone();
    let second = setup.service.clone();
    let (a, b) = tokio::join!(
        async move { first.validate_event("2025wimi", None).await },
        async move { second.validate_event("2025wimi", None).await },
    );

    assert!(a.unwrap().errors.is_empty());
    assert!(b.unwrap().errors.is_empty());

    let history = setup
        .service
        .get_scouter_rating_history("alex", 2025, None)
        .await
        .unwrap();
    assert_eq!(history.len(), 24);
    for pair in history.windows(2) {
        assert_eq!(pair[0].elo_after, pair[1].elo_before);
    }
}

#[tokio::test]
async fn test_http_validation_and_leaderboard() {
    let event = two_match_event()
        .with_scouts_everywhere(&["alex", "blair", "casey"], standard_performance());
    let setup = TestSetupBuilder::new(event).with_min_scouts(3).build();
    let app = routes::router(setup.app_state());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/events/2025wimi/validate")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"strategies": ["consensus"]}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/events/2025wimi/leaderboard?limit=2")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let board: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(board.as_array().map(Vec::len), Some(2));
    assert_eq!(board[0]["rank"], 1);
    assert_eq!(board[0]["validations"], 12);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/events/2025wimi/opr")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    // 4 alliance equations for 12 teams
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}
