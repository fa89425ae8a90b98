use std::fs;
use std::path::PathBuf;

use serde_json::Value;

use hoops_aggregator::adapters::espn_athlete_stats::parse_athlete_averages;
use hoops_aggregator::adapters::espn_roster::parse_espn_roster_json;
use hoops_aggregator::adapters::maxpreps_leaders::parse_maxpreps_leaders;
use hoops_aggregator::adapters::maxpreps_text::parse_leader_blurbs;
use hoops_aggregator::adapters::recruiting_247::parse_247_rankings;
use hoops_aggregator::adapters::sports_ref_ratings::{find_team, parse_ratings_table};
use hoops_aggregator::adapters::sports_ref_roster::parse_sports_ref_roster;
use hoops_aggregator::error::FetchErrorKind;
use hoops_aggregator::normalize::derive_id;
use hoops_aggregator::record::{Dataset, PlayerRecord, RecruitRecord, Structured};
use hoops_aggregator::stat_parse::{extract_stat_from_text, parse_height, parse_weight};

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

#[test]
fn height_and_weight_scenarios() {
    assert_eq!(parse_height("6-8"), Some(80));
    assert_eq!(parse_height("6'8\""), Some(80));
    assert_eq!(parse_height("N/A"), None);
    assert_eq!(parse_height(""), None);
    assert_eq!(parse_weight("215 lbs"), Some(215));
    assert_eq!(parse_weight("--"), None);
}

#[test]
fn stat_from_free_text() {
    let text = "Averaging 24.1 ppg and 7.3 rpg this season";
    assert_eq!(extract_stat_from_text(text, "ppg"), 24.1);
    assert_eq!(extract_stat_from_text(text, "RPG"), 7.3);
    assert_eq!(extract_stat_from_text(text, "apg"), 0.0);
    assert_eq!(extract_stat_from_text("", "ppg"), 0.0);
}

#[test]
fn player_id_is_stable_across_formatting() {
    let id = derive_id("Cooper Flagg");
    assert_eq!(id, derive_id("Cooper Flagg"));
    assert_eq!(id, derive_id("  cooper   FLAGG "));
    assert_ne!(id, derive_id("Ace Bailey"));
    assert_eq!(derive_id(""), 0);
}

#[test]
fn parses_espn_roster_fixture() {
    let raw = read_fixture("espn_roster.json");
    let records = parse_espn_roster_json(&raw).expect("fixture should parse");
    assert_eq!(records.len(), 4);
    assert_eq!(records.iter().filter(|r| r.is_structurally_valid()).count(), 3);

    let jones = &records[0];
    assert_eq!(jones.name.as_deref(), Some("Denver Jones"));
    assert_eq!(jones.source_id.as_deref(), Some("4433176"));
    assert_eq!(jones.height, Some(76));
    assert_eq!(jones.weight, Some(180));
    assert_eq!(jones.team.as_deref(), Some("Auburn Tigers"));
    assert_eq!(jones.home_state.as_deref(), Some("FL"));

    let broome = &records[2];
    assert_eq!(broome.height, Some(82));
    assert_eq!(broome.position.as_deref(), Some("F"));
}

#[test]
fn parses_athlete_stats_fixture() {
    let raw = read_fixture("espn_athlete_stats.json");
    let root: Value = serde_json::from_str(&raw).expect("fixture should be json");
    let stats = parse_athlete_averages(&root).expect("averages present");
    assert_eq!(stats.games, Some(35.0));
    assert_eq!(stats.points, Some(18.6));
    assert_eq!(stats.rebounds, Some(10.9));
    assert_eq!(stats.blocks, Some(2.1));
    assert!((stats.three_point_pct.unwrap() - 0.278).abs() < 1e-9);
}

#[test]
fn parses_sports_ref_roster_fixture() {
    let raw = read_fixture("sports_ref_roster.html");
    let records = parse_sports_ref_roster(&raw, "auburn").expect("fixture should parse");
    assert_eq!(records.len(), 3);

    let broome = &records[0];
    assert_eq!(broome.name.as_deref(), Some("Johni Broome"));
    assert_eq!(broome.team.as_deref(), Some("Auburn Tigers"));
    assert_eq!(broome.height, Some(82));
    assert_eq!(broome.class_year.as_deref(), Some("SR"));
    assert_eq!(broome.stats.points, Some(18.6));
    assert!((broome.stats.field_goal_pct.unwrap() - 0.51).abs() < 1e-9);

    let cardwell = &records[2];
    assert_eq!(cardwell.name.as_deref(), Some("Dylan Cardwell"));
    assert!(cardwell.stats.is_empty());

    let player = PlayerRecord::from_raw(cardwell, Dataset::Roster, "sports_ref_roster", 1).unwrap();
    assert_eq!(player.points, 0.0);
    assert_eq!(player.home_town, "Augusta");
}

#[test]
fn parses_247_fixture() {
    let raw = read_fixture("recruiting_247.html");
    let records = parse_247_rankings(&raw, 2024).expect("fixture should parse");
    assert_eq!(records.len(), 3);

    let flagg = &records[0];
    assert_eq!(flagg.ranking.as_deref(), Some("1"));
    assert_eq!(flagg.team.as_deref(), Some("Montverde Academy"));
    assert_eq!(flagg.home_town.as_deref(), Some("Montverde"));
    assert_eq!(flagg.height, Some(81));
    assert_eq!(flagg.weight, Some(205));
    assert_eq!(flagg.stars, Some(5));
    assert_eq!(flagg.committed_to.as_deref(), Some("Duke"));
    assert_eq!(flagg.class_year.as_deref(), Some("2024"));

    assert_eq!(records[1].committed_to.as_deref(), Some("Rutgers"));
    assert_eq!(records[2].stars, Some(4));
    assert!(records[2].committed_to.is_none());

    let recruit = RecruitRecord::from_raw(&records[2], "recruiting_247").unwrap();
    assert_eq!(recruit.school, "Long Island Lutheran");
    assert_eq!(recruit.home_state, "N/A");
}

#[test]
fn parses_maxpreps_leaders_fixture() {
    let raw = read_fixture("maxpreps_leaders.html");
    let records = parse_maxpreps_leaders(&raw).expect("fixture should parse");
    assert_eq!(records.len(), 3);

    let carter = &records[0];
    assert_eq!(carter.name.as_deref(), Some("Jalen Carter"));
    assert_eq!(carter.class_year.as_deref(), Some("Sr"));
    assert_eq!(carter.position.as_deref(), Some("G"));
    assert_eq!(carter.team.as_deref(), Some("Duncanville"));
    assert_eq!(carter.home_state.as_deref(), Some("TX"));
    assert_eq!(carter.stats.points, Some(34.2));
    assert!((carter.stats.field_goal_pct.unwrap() - 0.523).abs() < 1e-9);

    let reed = &records[1];
    assert_eq!(reed.name.as_deref(), Some("Marcus Reed"));
    assert_eq!(reed.position.as_deref(), Some("F/C"));
    assert!((reed.stats.field_goal_pct.unwrap() - 0.58).abs() < 1e-9);

    // "--" degrades to zero instead of failing the row.
    assert_eq!(records[2].stats.points, Some(0.0));
}

#[test]
fn maxpreps_without_table_is_terminal() {
    let err = parse_maxpreps_leaders("<html><body><p>Blocked</p></body></html>").unwrap_err();
    assert_eq!(err.kind, FetchErrorKind::Terminal);
}

#[test]
fn parses_maxpreps_text_fixture() {
    let raw = read_fixture("maxpreps_text.html");
    let records = parse_leader_blurbs(&raw).expect("fixture should parse");
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].stats.assists, Some(4.4));
    assert_eq!(records[1].name.as_deref(), Some("Marcus Reed"));
    assert_eq!(records[1].stats.rebounds, Some(11.0));
    assert_eq!(records[2].team.as_deref(), Some("Westlake"));
    assert_eq!(records[2].stats.steals, Some(2.2));
    assert_eq!(records[2].stats.points, None);
}

#[test]
fn parses_ratings_fixture() {
    let raw = read_fixture("ratings.html");
    let ratings = parse_ratings_table(&raw).expect("fixture should parse");
    assert_eq!(ratings.len(), 3);

    let auburn = find_team(&ratings, "auburn").expect("auburn present");
    assert_eq!(auburn.ranking, Some(2));
    assert_eq!(auburn.rating, 27.16);
    assert_eq!(auburn.offense, 126.0);
    assert_eq!(auburn.defense, 95.1);
    assert_eq!(auburn.conference.as_deref(), Some("SEC"));
    assert!(find_team(&ratings, "Gonzaga").is_none());
}
