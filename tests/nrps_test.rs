// ABOUTME: Integration tests for the Names and Role Provisioning Services roster client
// ABOUTME: Covers Link header pagination, role normalization, status filtering, and page limits
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use std::sync::Arc;

use common::{roster_member, MockLms};
use lti_advantage_server::{
    constants::{
        nrps::SCOPE_MEMBERSHIP_READONLY,
        roles::{INSTRUCTOR, LEARNER, TEACHING_ASSISTANT},
    },
    errors::{ErrorCategory, ErrorCode},
    lti::{member_has_role, normalize_role, parse_next_link, EngineSettings, LtiEngine},
    models::{RosterMember, SessionClaims},
    rewrite::UrlRewriter,
};

async fn setup(max_pages: usize) -> (MockLms, SessionClaims, LtiEngine) {
    let mock = MockLms::start().await;
    let store = common::create_test_store().await;
    let platform = mock.register_in(&store).await;
    let settings = EngineSettings {
        nrps_max_pages: max_pages,
        ..common::test_settings("https://tool.example")
    };
    let engine = common::create_engine(Arc::clone(&store), settings, UrlRewriter::disabled());
    (mock, common::session_for(&platform), engine)
}

fn learners(prefix: &str, count: usize) -> Vec<RosterMember> {
    (0..count)
        .map(|i| roster_member(&format!("{prefix}-{i}"), LEARNER, Some("Active")))
        .collect()
}

fn ids(members: &[RosterMember]) -> Vec<&str> {
    members.iter().map(|m| m.user_id.as_str()).collect()
}

#[tokio::test]
async fn test_follows_next_links_across_pages() {
    let (mock, session, engine) = setup(100).await;
    mock.state().roster_pages = vec![learners("a", 2), learners("b", 2), learners("c", 1)];

    let members = engine.nrps().get_members(&session, "Learner").await.unwrap();

    assert_eq!(members.len(), 5);
    assert_eq!(ids(&members), ["a-0", "a-1", "b-0", "b-1", "c-0"]);
    assert_eq!(mock.state().roster_requests.len(), 3);
}

#[tokio::test]
async fn test_requests_roster_with_membership_scope_and_role_filter() {
    let (mock, session, engine) = setup(100).await;
    mock.state().roster_pages = vec![learners("a", 1)];

    engine.nrps().get_members(&session, "student").await.unwrap();

    let state = mock.state();
    assert_eq!(state.token_requests[0]["scope"], SCOPE_MEMBERSHIP_READONLY);
    assert_eq!(state.roster_requests[0]["role"], LEARNER);
}

#[tokio::test]
async fn test_role_short_names_and_urn_are_equivalent() {
    let (mock, session, engine) = setup(100).await;
    mock.state().roster_pages = vec![vec![
        roster_member("s1", LEARNER, None),
        roster_member("s2", "Learner", None),
        roster_member("t1", INSTRUCTOR, None),
    ]];

    let mut results = Vec::new();
    for role in ["Student", "Learner", LEARNER] {
        let members = engine.nrps().get_members(&session, role).await.unwrap();
        results.push(ids(&members).iter().map(|s| (*s).to_owned()).collect::<Vec<_>>());
    }

    assert_eq!(results[0], ["s1", "s2"]);
    assert_eq!(results[0], results[1]);
    assert_eq!(results[1], results[2]);
}

#[tokio::test]
async fn test_inactive_members_are_dropped() {
    let (mock, session, engine) = setup(100).await;
    mock.state().roster_pages = vec![vec![
        roster_member("active", LEARNER, Some("Active")),
        roster_member("implicit", LEARNER, None),
        roster_member("gone", LEARNER, Some("Inactive")),
        roster_member("deleted", LEARNER, Some("Deleted")),
    ]];

    let members = engine.nrps().get_members(&session, "learner").await.unwrap();
    assert_eq!(ids(&members), ["active", "implicit"]);
}

#[tokio::test]
async fn test_all_disables_role_filtering() {
    let (mock, session, engine) = setup(100).await;
    mock.state().roster_pages = vec![vec![
        roster_member("s1", LEARNER, None),
        roster_member("t1", INSTRUCTOR, None),
        roster_member("x1", INSTRUCTOR, Some("Inactive")),
    ]];

    let members = engine.nrps().get_members(&session, "ALL").await.unwrap();

    assert_eq!(ids(&members), ["s1", "t1"]);
    assert!(!mock.state().roster_requests[0].contains_key("role"));
}

#[tokio::test]
async fn test_revisited_next_link_stops_pagination() {
    let (mock, session, engine) = setup(100).await;
    {
        let mut state = mock.state();
        state.roster_pages = vec![learners("a", 1), learners("b", 1), learners("c", 1)];
        state.roster_cycle = true;
    }

    let members = engine.nrps().get_members(&session, "learner").await.unwrap();

    assert_eq!(ids(&members), ["a-0", "b-0", "c-0"]);
    assert_eq!(mock.state().roster_requests.len(), 3);
}

#[tokio::test]
async fn test_page_limit_is_an_upstream_error() {
    let (mock, session, engine) = setup(2).await;
    mock.state().roster_pages = vec![learners("a", 1), learners("b", 1), learners("c", 1)];

    let err = engine
        .nrps()
        .get_members(&session, "learner")
        .await
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Upstream);
    assert!(err.message.contains("exceeds 2 pages"));
    assert_eq!(mock.state().roster_requests.len(), 2);
}

#[tokio::test]
async fn test_session_without_roster_service_is_rejected() {
    let (mock, mut session, engine) = setup(100).await;
    session.nrps = None;

    let err = engine
        .nrps()
        .get_members(&session, "learner")
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidInput);
    assert!(mock.state().token_requests.is_empty());
}

#[test]
fn test_normalize_role_maps_short_names() {
    assert_eq!(normalize_role("Student"), LEARNER);
    assert_eq!(normalize_role(" teacher "), INSTRUCTOR);
    assert_eq!(normalize_role("TA"), TEACHING_ASSISTANT);
    assert_eq!(normalize_role(LEARNER), LEARNER);
    assert_eq!(normalize_role("urn:custom:role"), "urn:custom:role");
}

#[test]
fn test_member_has_role_accepts_sub_roles() {
    let ta = roster_member("ta", TEACHING_ASSISTANT, None);
    assert!(member_has_role(&ta, TEACHING_ASSISTANT));
    assert!(!member_has_role(&ta, LEARNER));

    let sub = roster_member("sub", &format!("{INSTRUCTOR}#Lead"), None);
    assert!(member_has_role(&sub, INSTRUCTOR));
}

#[test]
fn test_parse_next_link_picks_rel_next() {
    let header = r#"<https://lms/m?page=1>; rel="first", <https://lms/m?page=3>; rel="next""#;
    assert_eq!(parse_next_link(header).as_deref(), Some("https://lms/m?page=3"));
    assert!(parse_next_link(r#"<https://lms/m?page=1>; rel="prev""#).is_none());
    assert!(parse_next_link("garbage").is_none());
}
