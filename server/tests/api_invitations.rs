//! Integration tests for the invitation state machine
//!
//! Covers:
//! - POST /invitations/start-group, /invitations/invite, /invitations/request
//! - POST /invitations/{id}/accept|decline|cancel
//! - POST /invitations/expire
//! - GET /invitations/{id} and the per-user invitation listings

mod common;

#[cfg(test)]
mod invitation_tests {
    use super::common::*;
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use chrono::{Duration, Utc};
    use grocery_server::core::ErrorKind;
    use grocery_server::entities::{InvitationStatus, User};
    use grocery_server::events::DomainEvent;
    use grocery_server::repositories::{Read, UserRepository};
    use serde_json::{Value, json};
    use std::sync::Arc;

    async fn received(server: &TestServer, user: &TestUser) -> Vec<Value> {
        let body: Value = server
            .get(&format!("/users/{}/invitations/received", user.id))
            .authorization_bearer(&user.token)
            .await
            .json();
        body["data"].as_array().cloned().unwrap_or_default()
    }

    async fn load_user(state: &Arc<grocery_server::AppState>, id: &str) -> User {
        let mut conn = state.db.pool().acquire().await.unwrap();
        UserRepository::read(&mut conn, id).await.unwrap().unwrap()
    }

    // ============================================================
    // START_GROUP and the shared list
    // ============================================================

    #[tokio::test]
    async fn test_start_group_then_shared_list_totals() {
        let (state, bus) = create_test_state().await;
        let server = create_test_server(state);
        let u1 = register_user(&server, "u1", "One").await;
        let u2 = register_user(&server, "u2", "Two").await;

        let proposal = server
            .post("/invitations/start-group")
            .authorization_bearer(&u1.token)
            .json(&json!({ "to_user_code": u2.user_code, "group_name": "Test" }))
            .await;
        proposal.assert_status(StatusCode::CREATED);
        let proposal: Value = proposal.json();
        assert_eq!(proposal["data"]["type"], "START_GROUP");
        assert_eq!(proposal["data"]["status"], "PENDING");
        assert_eq!(proposal["data"]["group_name"], "Test");
        let invitation_id = proposal["data"]["id"].as_i64().unwrap();
        assert_eq!(bus.names(), vec!["invitation_received"]);

        let accepted: Value = server
            .post(&format!("/invitations/{invitation_id}/accept"))
            .authorization_bearer(&u2.token)
            .await
            .json();
        assert_eq!(accepted["data"]["member_count"], 2);
        assert_eq!(accepted["data"]["group"]["group_name"], "Test");
        assert_eq!(
            accepted["data"]["group"]["group_code"].as_str().unwrap().len(),
            6
        );
        let group_id = accepted["data"]["group"]["id"].as_i64().unwrap();

        let members: Value = server
            .get(&format!("/groups/{group_id}/members"))
            .authorization_bearer(&u1.token)
            .await
            .json();
        assert_eq!(members["data"]["member_count"], 2);

        let list: Value = server
            .get(&format!("/groups/{group_id}/list"))
            .authorization_bearer(&u2.token)
            .await
            .json();
        assert_eq!(list["data"]["expected_total"], "0.00");
        assert_eq!(list["data"]["actual_total"], "0.00");

        let added = server
            .post(&format!("/groups/{group_id}/list/items"))
            .authorization_bearer(&u1.token)
            .json(&json!({
                "item_name": "Milk",
                "item_price": 3.99,
                "item_quantity": 2,
                "item_status": "NEEDED"
            }))
            .await;
        added.assert_status(StatusCode::CREATED);
        let added: Value = added.json();
        assert_eq!(added["data"]["updated_totals"]["expected_total"], "7.98");
        let item_id = added["data"]["item"]["id"].as_i64().unwrap();

        let purchased: Value = server
            .put(&format!("/items/{item_id}/status"))
            .authorization_bearer(&u2.token)
            .json(&json!({ "item_status": "PURCHASED" }))
            .await
            .json();
        assert_eq!(purchased["data"]["updated_totals"]["expected_total"], "0.00");
        assert_eq!(purchased["data"]["updated_totals"]["actual_total"], "7.98");
        assert_eq!(purchased["data"]["item"]["user_id"], "u2");

        let deleted: Value = server
            .delete(&format!("/items/{item_id}"))
            .authorization_bearer(&u1.token)
            .await
            .json();
        assert_eq!(deleted["data"]["updated_totals"]["expected_total"], "0.00");
        assert_eq!(deleted["data"]["updated_totals"]["actual_total"], "0.00");

        server
            .post("/invitations/invite")
            .authorization_bearer(&u1.token)
            .json(&json!({ "to_user_code": u2.user_code, "group_id": group_id }))
            .await
            .assert_status(StatusCode::CONFLICT);

        let names = bus.names();
        assert_eq!(
            names.iter().filter(|n| **n == "group_member_joined").count(),
            2
        );
        for name in ["invitation_status_updated", "list_item_added", "list_item_updated", "list_item_deleted"] {
            assert!(names.contains(&name), "missing {name}");
        }
    }

    #[tokio::test]
    async fn test_accepted_start_group_is_kept_with_its_group() {
        let (state, _) = create_test_state().await;
        let server = create_test_server(state);
        let u1 = register_user(&server, "u1", "One").await;
        let u2 = register_user(&server, "u2", "Two").await;

        let proposal: Value = server
            .post("/invitations/start-group")
            .authorization_bearer(&u1.token)
            .json(&json!({ "to_user_code": u2.user_code, "group_name": "Kept" }))
            .await
            .json();
        let invitation_id = proposal["data"]["id"].as_i64().unwrap();
        server
            .post(&format!("/invitations/{invitation_id}/accept"))
            .authorization_bearer(&u2.token)
            .await
            .assert_status_ok();

        let details: Value = server
            .get(&format!("/invitations/{invitation_id}"))
            .authorization_bearer(&u1.token)
            .await
            .json();
        assert_eq!(details["data"]["status"], "ACCEPTED");
        assert!(details["data"]["group_id"].is_i64());
        assert!(details["data"]["responded_at"].is_string());
    }

    #[tokio::test]
    async fn test_failed_start_group_accept_leaves_no_group_behind() {
        let (state, _) = create_test_state().await;
        let server = create_test_server(state.clone());
        let u1 = register_user(&server, "u1", "One").await;
        let u2 = register_user(&server, "u2", "Two").await;

        let proposal: Value = server
            .post("/invitations/start-group")
            .authorization_bearer(&u1.token)
            .json(&json!({ "to_user_code": u2.user_code, "group_name": "Ghost" }))
            .await
            .json();
        let invitation_id = proposal["data"]["id"].as_i64().unwrap();

        // the sender vanishes without the cascade, so adding them fails after the group insert
        let pool = state.db.pool();
        for statement in [
            "PRAGMA foreign_keys = OFF",
            "DELETE FROM users WHERE id = 'u1'",
            "PRAGMA foreign_keys = ON",
        ] {
            sqlx::query(statement).execute(pool).await.unwrap();
        }
        let lists_before: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM lists")
            .fetch_one(pool)
            .await
            .unwrap();

        server
            .post(&format!("/invitations/{invitation_id}/accept"))
            .authorization_bearer(&u2.token)
            .await
            .assert_status(StatusCode::CONFLICT);

        let groups: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM groups")
            .fetch_one(pool)
            .await
            .unwrap();
        assert_eq!(groups, 0);
        let members: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM group_members")
            .fetch_one(pool)
            .await
            .unwrap();
        assert_eq!(members, 0);
        let lists_after: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM lists")
            .fetch_one(pool)
            .await
            .unwrap();
        assert_eq!(lists_after, lists_before);

        let status: String = sqlx::query_scalar("SELECT status FROM invitations WHERE id = ?")
            .bind(invitation_id)
            .fetch_one(pool)
            .await
            .unwrap();
        assert_eq!(status, "PENDING");
    }

    #[tokio::test]
    async fn test_start_group_rejects_self_unknown_and_duplicates() {
        let (state, _) = create_test_state().await;
        let server = create_test_server(state);
        let u1 = register_user(&server, "u1", "One").await;
        let u2 = register_user(&server, "u2", "Two").await;

        server
            .post("/invitations/start-group")
            .authorization_bearer(&u1.token)
            .json(&json!({ "to_user_code": u1.user_code, "group_name": "Solo" }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        server
            .post("/invitations/start-group")
            .authorization_bearer(&u1.token)
            .json(&json!({ "to_user_code": "ZZZZZZZ", "group_name": "Nobody" }))
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .post("/invitations/start-group")
            .authorization_bearer(&u1.token)
            .json(&json!({ "to_user_code": u2.user_code, "group_name": "   " }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        server
            .post("/invitations/start-group")
            .authorization_bearer(&u1.token)
            .json(&json!({ "to_user_code": u2.user_code, "group_name": "First" }))
            .await
            .assert_status(StatusCode::CREATED);
        // pending proposals block both directions
        server
            .post("/invitations/start-group")
            .authorization_bearer(&u2.token)
            .json(&json!({ "to_user_code": u1.user_code, "group_name": "Second" }))
            .await
            .assert_status(StatusCode::CONFLICT);
    }

    // ============================================================
    // GROUP_INVITE
    // ============================================================

    #[tokio::test]
    async fn test_group_invite_rules() {
        let (state, _) = create_test_state().await;
        let server = create_test_server(state);
        let alice = register_user(&server, "alice", "Alice").await;
        let bob = register_user(&server, "bob", "Bob").await;
        let carol = register_user(&server, "carol", "Carol").await;
        let dave = register_user(&server, "dave", "Dave").await;
        let group_id = found_group(&server, &alice, &bob, "Flat").await;

        // only members invite
        server
            .post("/invitations/invite")
            .authorization_bearer(&dave.token)
            .json(&json!({ "to_user_code": carol.user_code, "group_id": group_id }))
            .await
            .assert_status(StatusCode::FORBIDDEN);
        server
            .post("/invitations/invite")
            .authorization_bearer(&alice.token)
            .json(&json!({ "to_user_code": carol.user_code, "group_id": 9999 }))
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .post("/invitations/invite")
            .authorization_bearer(&alice.token)
            .json(&json!({ "to_user_code": "bad", "group_id": group_id }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let invite = server
            .post("/invitations/invite")
            .authorization_bearer(&alice.token)
            .json(&json!({
                "to_user_code": carol.user_code.to_lowercase(),
                "group_id": group_id,
                "message": "join us"
            }))
            .await;
        invite.assert_status(StatusCode::CREATED);
        let invite: Value = invite.json();
        assert_eq!(invite["data"]["to_user"]["id"], "carol");
        assert_eq!(invite["data"]["group"]["id"], group_id);

        server
            .post("/invitations/invite")
            .authorization_bearer(&alice.token)
            .json(&json!({ "to_user_code": carol.user_code, "group_id": group_id }))
            .await
            .assert_status(StatusCode::CONFLICT);

        let pending = received(&server, &carol).await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0]["from_user"]["id"], "alice");

        let invitation_id = invite["data"]["id"].as_i64().unwrap();
        let accepted: Value = server
            .post(&format!("/invitations/{invitation_id}/accept"))
            .authorization_bearer(&carol.token)
            .await
            .json();
        assert_eq!(accepted["data"]["member_count"], 3);
        assert_eq!(accepted["data"]["joined_user_ids"], json!(["carol"]));

        let groups: Value = server
            .get("/users/carol/groups")
            .authorization_bearer(&carol.token)
            .await
            .json();
        assert_eq!(groups["data"][0]["id"], group_id);
        assert_eq!(groups["data"][0]["member_count"], 3);
    }

    #[tokio::test]
    async fn test_only_the_right_party_can_respond() {
        let (state, _) = create_test_state().await;
        let server = create_test_server(state);
        let alice = register_user(&server, "alice", "Alice").await;
        let bob = register_user(&server, "bob", "Bob").await;
        let carol = register_user(&server, "carol", "Carol").await;

        let proposal: Value = server
            .post("/invitations/start-group")
            .authorization_bearer(&alice.token)
            .json(&json!({ "to_user_code": bob.user_code, "group_name": "Pair" }))
            .await
            .json();
        let id = proposal["data"]["id"].as_i64().unwrap();

        server
            .get(&format!("/invitations/{id}"))
            .authorization_bearer(&carol.token)
            .await
            .assert_status(StatusCode::FORBIDDEN);
        server
            .post(&format!("/invitations/{id}/accept"))
            .authorization_bearer(&alice.token)
            .await
            .assert_status(StatusCode::FORBIDDEN);
        server
            .post(&format!("/invitations/{id}/cancel"))
            .authorization_bearer(&bob.token)
            .await
            .assert_status(StatusCode::FORBIDDEN);
        server
            .post(&format!("/invitations/{id}/decline"))
            .authorization_bearer(&carol.token)
            .await
            .assert_status(StatusCode::FORBIDDEN);
        server
            .post("/invitations/424242/accept")
            .authorization_bearer(&bob.token)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_terminal_invitations_reject_further_transitions() {
        let (state, bus) = create_test_state().await;
        let server = create_test_server(state);
        let alice = register_user(&server, "alice", "Alice").await;
        let bob = register_user(&server, "bob", "Bob").await;

        let proposal: Value = server
            .post("/invitations/start-group")
            .authorization_bearer(&alice.token)
            .json(&json!({ "to_user_code": bob.user_code, "group_name": "Pair" }))
            .await
            .json();
        let id = proposal["data"]["id"].as_i64().unwrap();

        let declined: Value = server
            .post(&format!("/invitations/{id}/decline"))
            .authorization_bearer(&bob.token)
            .await
            .json();
        assert_eq!(declined["data"]["status"], "DECLINED");
        assert!(bus.names().contains(&"invitation_status_updated"));

        server
            .post(&format!("/invitations/{id}/accept"))
            .authorization_bearer(&bob.token)
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        server
            .post(&format!("/invitations/{id}/decline"))
            .authorization_bearer(&bob.token)
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        server
            .post(&format!("/invitations/{id}/cancel"))
            .authorization_bearer(&alice.token)
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let groups: Value = server
            .get("/users/bob/groups")
            .authorization_bearer(&bob.token)
            .await
            .json();
        assert_eq!(groups["data"], json!([]));

        // a declined proposal no longer blocks a new one
        server
            .post("/invitations/start-group")
            .authorization_bearer(&alice.token)
            .json(&json!({ "to_user_code": bob.user_code, "group_name": "Again" }))
            .await
            .assert_status(StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_sender_cancels_and_sees_sent_history() {
        let (state, _) = create_test_state().await;
        let server = create_test_server(state);
        let alice = register_user(&server, "alice", "Alice").await;
        let bob = register_user(&server, "bob", "Bob").await;

        let proposal: Value = server
            .post("/invitations/start-group")
            .authorization_bearer(&alice.token)
            .json(&json!({ "to_user_code": bob.user_code, "group_name": "Pair" }))
            .await
            .json();
        let id = proposal["data"]["id"].as_i64().unwrap();

        let cancelled: Value = server
            .post(&format!("/invitations/{id}/cancel"))
            .authorization_bearer(&alice.token)
            .await
            .json();
        assert_eq!(cancelled["data"]["status"], "CANCELLED");
        assert!(received(&server, &bob).await.is_empty());

        let sent: Value = server
            .get("/users/alice/invitations/sent")
            .authorization_bearer(&alice.token)
            .await
            .json();
        assert_eq!(sent["data"][0]["id"], id);
        assert_eq!(sent["data"][0]["status"], "CANCELLED");
    }

    // ============================================================
    // JOIN_REQUEST fan-out
    // ============================================================

    #[tokio::test]
    async fn test_join_request_fans_out_and_one_accept_consumes_all() {
        let (state, bus) = create_test_state().await;
        let server = create_test_server(state);
        let alice = register_user(&server, "alice", "Alice").await;
        let bob = register_user(&server, "bob", "Bob").await;
        let carol = register_user(&server, "carol", "Carol").await;
        let dave = register_user(&server, "dave", "Dave").await;
        let group_id = found_group(&server, &alice, &bob, "Flat").await;
        invite_and_join(&server, &alice, &carol, group_id).await;
        let code = group_code(&server, &alice, group_id).await;

        let request = server
            .post("/invitations/request")
            .authorization_bearer(&dave.token)
            .json(&json!({ "group_code": code.to_lowercase(), "message": "hi" }))
            .await;
        request.assert_status(StatusCode::CREATED);
        let request: Value = request.json();
        assert_eq!(request["data"]["recipients"], 3);
        assert_eq!(request["data"]["invitations"].as_array().unwrap().len(), 3);

        server
            .post("/invitations/request")
            .authorization_bearer(&dave.token)
            .json(&json!({ "group_code": code }))
            .await
            .assert_status(StatusCode::CONFLICT);

        for member in [&alice, &bob, &carol] {
            let pending = received(&server, member).await;
            assert_eq!(pending.len(), 1, "{} should see the request", member.id);
            assert_eq!(pending[0]["type"], "JOIN_REQUEST");
        }

        let bobs_copy = received(&server, &bob).await[0]["id"].as_i64().unwrap();
        let alices_copy = received(&server, &alice).await[0]["id"].as_i64().unwrap();
        bus.take();
        let accepted: Value = server
            .post(&format!("/invitations/{bobs_copy}/accept"))
            .authorization_bearer(&bob.token)
            .await
            .json();
        assert_eq!(accepted["data"]["joined_user_ids"], json!(["dave"]));
        assert_eq!(accepted["data"]["member_count"], 4);

        let mut notified: Vec<String> = bus
            .take()
            .into_iter()
            .filter_map(|event| match event {
                DomainEvent::InvitationStatusUpdated(notice) => {
                    assert_eq!(notice.status, InvitationStatus::Accepted);
                    assert_eq!(notice.responded_by.id, "bob");
                    Some(notice.recipient_id)
                }
                _ => None,
            })
            .collect();
        notified.sort();
        assert_eq!(notified, vec!["alice", "carol", "dave"]);

        for member in [&alice, &bob, &carol] {
            assert!(received(&server, member).await.is_empty());
        }
        for copy in [bobs_copy, alices_copy] {
            let details: Value = server
                .get(&format!("/invitations/{copy}"))
                .authorization_bearer(&dave.token)
                .await
                .json();
            assert_eq!(details["data"]["status"], "ACCEPTED");
        }
        server
            .post(&format!("/invitations/{alices_copy}/accept"))
            .authorization_bearer(&alice.token)
            .await
            .assert_status(StatusCode::CONFLICT);

        server
            .get(&format!("/groups/{group_id}/list"))
            .authorization_bearer(&dave.token)
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn test_join_request_rules() {
        let (state, _) = create_test_state().await;
        let server = create_test_server(state);
        let alice = register_user(&server, "alice", "Alice").await;
        let bob = register_user(&server, "bob", "Bob").await;
        let group_id = found_group(&server, &alice, &bob, "Flat").await;
        let code = group_code(&server, &alice, group_id).await;

        server
            .post("/invitations/request")
            .authorization_bearer(&alice.token)
            .json(&json!({ "group_code": code }))
            .await
            .assert_status(StatusCode::CONFLICT);
        server
            .post("/invitations/request")
            .authorization_bearer(&alice.token)
            .json(&json!({ "group_code": "NOPE00" }))
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .post("/invitations/request")
            .authorization_bearer(&alice.token)
            .json(&json!({ "group_code": "TOO-LONG-CODE" }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_cancelling_a_join_request_cancels_every_copy() {
        let (state, _) = create_test_state().await;
        let server = create_test_server(state);
        let alice = register_user(&server, "alice", "Alice").await;
        let bob = register_user(&server, "bob", "Bob").await;
        let dave = register_user(&server, "dave", "Dave").await;
        let group_id = found_group(&server, &alice, &bob, "Flat").await;
        let code = group_code(&server, &alice, group_id).await;

        let request: Value = server
            .post("/invitations/request")
            .authorization_bearer(&dave.token)
            .json(&json!({ "group_code": code }))
            .await
            .json();
        let first = request["data"]["invitations"][0]["id"].as_i64().unwrap();

        server
            .post(&format!("/invitations/{first}/cancel"))
            .authorization_bearer(&dave.token)
            .await
            .assert_status_ok();

        assert!(received(&server, &alice).await.is_empty());
        assert!(received(&server, &bob).await.is_empty());

        let history: Value = server
            .get(&format!("/groups/{group_id}/invitations"))
            .authorization_bearer(&alice.token)
            .await
            .json();
        let cancelled = history["data"]["invitations"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|inv| inv["type"] == "JOIN_REQUEST" && inv["status"] == "CANCELLED")
            .count();
        assert_eq!(cancelled, 2);
    }

    #[tokio::test]
    async fn test_declining_one_copy_leaves_the_others_pending() {
        let (state, _) = create_test_state().await;
        let server = create_test_server(state);
        let alice = register_user(&server, "alice", "Alice").await;
        let bob = register_user(&server, "bob", "Bob").await;
        let dave = register_user(&server, "dave", "Dave").await;
        let group_id = found_group(&server, &alice, &bob, "Flat").await;
        let code = group_code(&server, &alice, group_id).await;

        server
            .post("/invitations/request")
            .authorization_bearer(&dave.token)
            .json(&json!({ "group_code": code }))
            .await
            .assert_status(StatusCode::CREATED);

        let alices_copy = received(&server, &alice).await[0]["id"].as_i64().unwrap();
        server
            .post(&format!("/invitations/{alices_copy}/decline"))
            .authorization_bearer(&alice.token)
            .await
            .assert_status_ok();

        let bobs = received(&server, &bob).await;
        assert_eq!(bobs.len(), 1);
        let bobs_copy = bobs[0]["id"].as_i64().unwrap();
        server
            .post(&format!("/invitations/{bobs_copy}/accept"))
            .authorization_bearer(&bob.token)
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn test_concurrent_accepts_add_the_requester_once() {
        let (state, _) = create_test_state().await;
        let server = create_test_server(state.clone());
        let alice = register_user(&server, "alice", "Alice").await;
        let bob = register_user(&server, "bob", "Bob").await;
        let dave = register_user(&server, "dave", "Dave").await;
        let group_id = found_group(&server, &alice, &bob, "Flat").await;
        let code = group_code(&server, &alice, group_id).await;

        server
            .post("/invitations/request")
            .authorization_bearer(&dave.token)
            .json(&json!({ "group_code": code }))
            .await
            .assert_status(StatusCode::CREATED);
        let alices_copy = received(&server, &alice).await[0]["id"].as_i64().unwrap();
        let bobs_copy = received(&server, &bob).await[0]["id"].as_i64().unwrap();

        let alice_user = load_user(&state, "alice").await;
        let bob_user = load_user(&state, "bob").await;
        let (first, second) = tokio::join!(
            state.invitations.accept(&alice_user, alices_copy),
            state.invitations.accept(&bob_user, bobs_copy),
        );

        let outcomes = [first, second];
        let succeeded = outcomes.iter().filter(|r| r.is_ok()).count();
        assert_eq!(succeeded, 1);
        let failure = outcomes.into_iter().find_map(Result::err).unwrap();
        assert_eq!(failure.kind(), ErrorKind::Conflict);

        let members: Value = server
            .get(&format!("/groups/{group_id}/members"))
            .authorization_bearer(&alice.token)
            .await
            .json();
        assert_eq!(members["data"]["member_count"], 3);
    }

    #[tokio::test]
    async fn test_invite_for_a_group_already_joined_by_request_stays_pending() {
        let (state, _) = create_test_state().await;
        let server = create_test_server(state);
        let alice = register_user(&server, "alice", "Alice").await;
        let bob = register_user(&server, "bob", "Bob").await;
        let carol = register_user(&server, "carol", "Carol").await;
        let group_id = found_group(&server, &alice, &bob, "Flat").await;
        let code = group_code(&server, &alice, group_id).await;

        let invite: Value = server
            .post("/invitations/invite")
            .authorization_bearer(&alice.token)
            .json(&json!({ "to_user_code": carol.user_code, "group_id": group_id }))
            .await
            .json();
        let invite_id = invite["data"]["id"].as_i64().unwrap();

        server
            .post("/invitations/request")
            .authorization_bearer(&carol.token)
            .json(&json!({ "group_code": code }))
            .await
            .assert_status(StatusCode::CREATED);
        let bobs_copy = received(&server, &bob).await[0]["id"].as_i64().unwrap();
        server
            .post(&format!("/invitations/{bobs_copy}/accept"))
            .authorization_bearer(&bob.token)
            .await
            .assert_status_ok();

        server
            .post(&format!("/invitations/{invite_id}/accept"))
            .authorization_bearer(&carol.token)
            .await
            .assert_status(StatusCode::CONFLICT);

        let details: Value = server
            .get(&format!("/invitations/{invite_id}"))
            .authorization_bearer(&carol.token)
            .await
            .json();
        assert_eq!(details["data"]["status"], "PENDING");
        assert!(details["data"]["responded_at"].is_null());

        let members: Value = server
            .get(&format!("/groups/{group_id}/members"))
            .authorization_bearer(&alice.token)
            .await
            .json();
        assert_eq!(members["data"]["member_count"], 3);
    }

    // ============================================================
    // Expiry
    // ============================================================

    #[tokio::test]
    async fn test_expired_invitations_cannot_be_accepted_and_get_swept() {
        let (state, _) = create_test_state().await;
        let server = create_test_server(state.clone());
        let alice = register_user(&server, "alice", "Alice").await;
        let bob = register_user(&server, "bob", "Bob").await;

        let proposal: Value = server
            .post("/invitations/start-group")
            .authorization_bearer(&alice.token)
            .json(&json!({ "to_user_code": bob.user_code, "group_name": "Late" }))
            .await
            .json();
        let id = proposal["data"]["id"].as_i64().unwrap();

        sqlx::query("UPDATE invitations SET expires_at = ? WHERE id = ?")
            .bind(Utc::now() - Duration::hours(1))
            .bind(id)
            .execute(state.db.pool())
            .await
            .unwrap();

        server
            .post(&format!("/invitations/{id}/accept"))
            .authorization_bearer(&bob.token)
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let swept: Value = server
            .post("/invitations/expire")
            .authorization_bearer(&alice.token)
            .await
            .json();
        assert_eq!(swept["data"]["expired_count"], 1);

        let details: Value = server
            .get(&format!("/invitations/{id}"))
            .authorization_bearer(&bob.token)
            .await
            .json();
        assert_eq!(details["data"]["status"], "EXPIRED");

        let again: Value = server
            .post("/invitations/expire")
            .authorization_bearer(&alice.token)
            .await
            .json();
        assert_eq!(again["data"]["expired_count"], 0);
    }

    #[tokio::test]
    async fn test_sweep_respects_the_deadline() {
        let (state, _) = create_test_state().await;
        let server = create_test_server(state.clone());
        let alice = register_user(&server, "alice", "Alice").await;
        let bob = register_user(&server, "bob", "Bob").await;

        server
            .post("/invitations/start-group")
            .authorization_bearer(&alice.token)
            .json(&json!({ "to_user_code": bob.user_code, "group_name": "Fresh" }))
            .await
            .assert_status(StatusCode::CREATED);

        let now = state.invitations.expire_stale_at(Utc::now()).await.unwrap();
        assert_eq!(now.expired_count, 0);
        let later = state
            .invitations
            .expire_stale_at(Utc::now() + Duration::days(8))
            .await
            .unwrap();
        assert_eq!(later.expired_count, 1);
    }
}
