//! Integration tests for group endpoints
//!
//! Covers:
//! - the membership gate on /groups/{group_id}/*
//! - DELETE /groups/{group_id}/leave and the disband threshold
//! - DELETE /groups/{group_id}
//! - PUT /groups/{group_id} (multipart)
//! - group list writes and the events they publish

mod common;

#[cfg(test)]
mod group_tests {
    use super::common::*;
    use axum::http::StatusCode;
    use axum_test::multipart::{MultipartForm, Part};
    use futures_util::future::join_all;
    use grocery_server::events::DomainEvent;
    use serde_json::{Value, json};
    use std::future::IntoFuture;

    // ============================================================
    // Membership gate
    // ============================================================

    #[tokio::test]
    async fn test_non_members_are_kept_out() {
        let (state, _) = create_test_state().await;
        let server = create_test_server(state);
        let alice = register_user(&server, "alice", "Alice").await;
        let bob = register_user(&server, "bob", "Bob").await;
        let eve = register_user(&server, "eve", "Eve").await;
        let group_id = found_group(&server, &alice, &bob, "Flat").await;

        for path in [
            format!("/groups/{group_id}"),
            format!("/groups/{group_id}/list"),
            format!("/groups/{group_id}/members"),
            format!("/groups/{group_id}/invitations"),
        ] {
            server
                .get(&path)
                .authorization_bearer(&eve.token)
                .await
                .assert_status(StatusCode::FORBIDDEN);
        }
        server
            .post(&format!("/groups/{group_id}/list/items"))
            .authorization_bearer(&eve.token)
            .json(&json!({ "item_name": "Milk", "item_quantity": 1 }))
            .await
            .assert_status(StatusCode::FORBIDDEN);
        server
            .delete(&format!("/groups/{group_id}"))
            .authorization_bearer(&eve.token)
            .await
            .assert_status(StatusCode::FORBIDDEN);

        server
            .get("/groups/9999")
            .authorization_bearer(&eve.token)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_group_list_items_are_forbidden_to_outsiders() {
        let (state, _) = create_test_state().await;
        let server = create_test_server(state);
        let alice = register_user(&server, "alice", "Alice").await;
        let bob = register_user(&server, "bob", "Bob").await;
        let eve = register_user(&server, "eve", "Eve").await;
        let group_id = found_group(&server, &alice, &bob, "Flat").await;

        let added: Value = server
            .post(&format!("/groups/{group_id}/list/items"))
            .authorization_bearer(&alice.token)
            .json(&json!({ "item_name": "Milk", "item_quantity": 1 }))
            .await
            .json();
        let item_id = added["data"]["item"]["id"].as_i64().unwrap();

        server
            .put(&format!("/items/{item_id}/status"))
            .authorization_bearer(&eve.token)
            .json(&json!({ "item_status": "PURCHASED" }))
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let item: Value = server
            .get(&format!("/items/{item_id}"))
            .authorization_bearer(&bob.token)
            .await
            .json();
        assert_eq!(item["data"]["added_by"]["id"], "alice");
    }

    // ============================================================
    // Shared list
    // ============================================================

    #[tokio::test]
    async fn test_group_list_writes_publish_totals() {
        let (state, bus) = create_test_state().await;
        let server = create_test_server(state);
        let alice = register_user(&server, "alice", "Alice").await;
        let bob = register_user(&server, "bob", "Bob").await;
        let group_id = found_group(&server, &alice, &bob, "Flat").await;
        bus.take();

        server
            .post(&format!("/groups/{group_id}/list/items"))
            .authorization_bearer(&alice.token)
            .json(&json!({ "item_name": "Rice", "item_quantity": 2, "item_price": "1.50" }))
            .await
            .assert_status(StatusCode::CREATED);
        let cleared: Value = server
            .put(&format!("/groups/{group_id}/list/clear"))
            .authorization_bearer(&bob.token)
            .await
            .json();
        assert_eq!(cleared["data"]["deleted_count"], 1);

        let events = bus.take();
        assert_eq!(events.len(), 2);
        match &events[0] {
            DomainEvent::ListItemAdded(notice) => {
                assert_eq!(notice.group_id, group_id);
                assert_eq!(notice.user.id, "alice");
                assert_eq!(notice.updated_totals.expected_total.to_string(), "3.00");
            }
            other => panic!("unexpected event {}", other.name()),
        }
        match &events[1] {
            DomainEvent::ListCleared(notice) => {
                assert_eq!(notice.deleted_count, 1);
                assert_eq!(notice.user.id, "bob");
            }
            other => panic!("unexpected event {}", other.name()),
        }
    }

    #[tokio::test]
    async fn test_concurrent_item_adds_keep_totals_consistent() {
        let (state, _) = create_test_state().await;
        let server = create_test_server(state);
        let alice = register_user(&server, "alice", "Alice").await;
        let bob = register_user(&server, "bob", "Bob").await;
        let group_id = found_group(&server, &alice, &bob, "Flat").await;

        let path = format!("/groups/{group_id}/list/items");
        let requests = (0..10).map(|i| {
            let token = if i % 2 == 0 { &alice.token } else { &bob.token };
            server
                .post(&path)
                .authorization_bearer(token)
                .json(&json!({
                    "item_name": format!("Item {i}"),
                    "item_quantity": 1,
                    "item_price": "0.10"
                }))
                .into_future()
        });
        for response in join_all(requests).await {
            response.assert_status(StatusCode::CREATED);
        }

        let list: Value = server
            .get(&format!("/groups/{group_id}/list"))
            .authorization_bearer(&alice.token)
            .await
            .json();
        assert_eq!(list["data"]["item_count"], 10);
        assert_eq!(list["data"]["expected_total"], "1.00");
    }

    // ============================================================
    // Leave and disband
    // ============================================================

    #[tokio::test]
    async fn test_leaving_a_pair_disbands_the_group() {
        let (state, bus) = create_test_state().await;
        let server = create_test_server(state);
        let alice = register_user(&server, "alice", "Alice").await;
        let bob = register_user(&server, "bob", "Bob").await;
        let group_id = found_group(&server, &alice, &bob, "Pair").await;
        server
            .post(&format!("/groups/{group_id}/list/items"))
            .authorization_bearer(&alice.token)
            .json(&json!({ "item_name": "Milk", "item_quantity": 1 }))
            .await
            .assert_status(StatusCode::CREATED);

        let left: Value = server
            .delete(&format!("/groups/{group_id}/leave"))
            .authorization_bearer(&alice.token)
            .await
            .json();
        assert_eq!(left["data"]["remaining_members"], 0);
        assert!(bus.names().contains(&"group_disbanded"));

        server
            .get(&format!("/groups/{group_id}"))
            .authorization_bearer(&bob.token)
            .await
            .assert_status(StatusCode::NOT_FOUND);
        let groups: Value = server
            .get("/users/bob/groups")
            .authorization_bearer(&bob.token)
            .await
            .json();
        assert_eq!(groups["data"], json!([]));
    }

    #[tokio::test]
    async fn test_leaving_a_trio_keeps_the_group() {
        let (state, bus) = create_test_state().await;
        let server = create_test_server(state);
        let alice = register_user(&server, "alice", "Alice").await;
        let bob = register_user(&server, "bob", "Bob").await;
        let carol = register_user(&server, "carol", "Carol").await;
        let group_id = found_group(&server, &alice, &bob, "Trio").await;
        invite_and_join(&server, &alice, &carol, group_id).await;

        let left: Value = server
            .delete(&format!("/groups/{group_id}/leave"))
            .authorization_bearer(&carol.token)
            .await
            .json();
        assert_eq!(left["data"]["remaining_members"], 2);
        assert!(bus.names().contains(&"group_member_left"));
        assert!(!bus.names().contains(&"group_disbanded"));

        let members: Value = server
            .get(&format!("/groups/{group_id}/members"))
            .authorization_bearer(&alice.token)
            .await
            .json();
        assert_eq!(members["data"]["member_count"], 2);
        server
            .get(&format!("/groups/{group_id}"))
            .authorization_bearer(&carol.token)
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_disband_removes_group_list_and_invitations() {
        let (state, bus) = create_test_state().await;
        let server = create_test_server(state);
        let alice = register_user(&server, "alice", "Alice").await;
        let bob = register_user(&server, "bob", "Bob").await;
        let carol = register_user(&server, "carol", "Carol").await;
        let group_id = found_group(&server, &alice, &bob, "Flat").await;

        let invite: Value = server
            .post("/invitations/invite")
            .authorization_bearer(&alice.token)
            .json(&json!({ "to_user_code": carol.user_code, "group_id": group_id }))
            .await
            .json();
        let invitation_id = invite["data"]["id"].as_i64().unwrap();
        let added: Value = server
            .post(&format!("/groups/{group_id}/list/items"))
            .authorization_bearer(&bob.token)
            .json(&json!({ "item_name": "Milk", "item_quantity": 1 }))
            .await
            .json();
        let item_id = added["data"]["item"]["id"].as_i64().unwrap();

        let disbanded: Value = server
            .delete(&format!("/groups/{group_id}"))
            .authorization_bearer(&bob.token)
            .await
            .json();
        assert_eq!(disbanded["data"]["member_count"], 2);
        assert_eq!(disbanded["data"]["disbanded_by"], "bob");
        assert!(disbanded["data"]["deleted_invitations"].as_u64().unwrap() >= 1);

        let events = bus.take();
        let notice = events
            .iter()
            .find_map(|event| match event {
                DomainEvent::GroupDisbanded(notice) => Some(notice.clone()),
                _ => None,
            })
            .expect("group_disbanded published");
        assert_eq!(notice.member_ids.len(), 2);

        server
            .get(&format!("/items/{item_id}"))
            .authorization_bearer(&bob.token)
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .post(&format!("/invitations/{invitation_id}/accept"))
            .authorization_bearer(&carol.token)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    // ============================================================
    // Update
    // ============================================================

    #[tokio::test]
    async fn test_update_group_name_and_image() {
        let (state, _) = create_test_state().await;
        let server = create_test_server(state);
        let alice = register_user(&server, "alice", "Alice").await;
        let bob = register_user(&server, "bob", "Bob").await;
        let group_id = found_group(&server, &alice, &bob, "Flat").await;

        let form = MultipartForm::new()
            .add_text("group_name", "Flat 2B")
            .add_part(
                "group_image",
                Part::bytes(vec![0x89, b'P', b'N', b'G', 1, 2, 3])
                    .file_name("kitchen.png")
                    .mime_type("image/png"),
            );
        let updated: Value = server
            .put(&format!("/groups/{group_id}"))
            .authorization_bearer(&bob.token)
            .multipart(form)
            .await
            .json();
        assert_eq!(updated["data"]["group_name"], "Flat 2B");
        let image = updated["data"]["group_image"].as_str().unwrap();
        assert!(image.starts_with("http://localhost/media/group-pics/"));
        assert!(image.ends_with(".png"));

        let not_an_image = MultipartForm::new().add_part(
            "group_image",
            Part::text("hello").file_name("notes.txt").mime_type("text/plain"),
        );
        server
            .put(&format!("/groups/{group_id}"))
            .authorization_bearer(&bob.token)
            .multipart(not_an_image)
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        server
            .put(&format!("/groups/{group_id}"))
            .authorization_bearer(&bob.token)
            .multipart(MultipartForm::new())
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    // ============================================================
    // Account deletion
    // ============================================================

    #[tokio::test]
    async fn test_deleting_an_account_leaves_its_groups() {
        let (state, _) = create_test_state().await;
        let server = create_test_server(state);
        let alice = register_user(&server, "alice", "Alice").await;
        let bob = register_user(&server, "bob", "Bob").await;
        let carol = register_user(&server, "carol", "Carol").await;
        let pair = found_group(&server, &alice, &bob, "Pair").await;
        let trio = found_group(&server, &alice, &carol, "Trio").await;
        invite_and_join(&server, &alice, &bob, trio).await;

        server
            .post(&format!("/groups/{trio}/list/items"))
            .authorization_bearer(&alice.token)
            .json(&json!({ "item_name": "Milk", "item_quantity": 1 }))
            .await
            .assert_status(StatusCode::CREATED);

        let deleted: Value = server
            .delete("/users/alice")
            .authorization_bearer(&alice.token)
            .await
            .json();
        assert_eq!(deleted["data"]["groups_left"].as_array().unwrap().len(), 2);

        server
            .get(&format!("/groups/{pair}"))
            .authorization_bearer(&bob.token)
            .await
            .assert_status(StatusCode::NOT_FOUND);

        let list: Value = server
            .get(&format!("/groups/{trio}/list"))
            .authorization_bearer(&carol.token)
            .await
            .json();
        assert_eq!(list["data"]["item_count"], 1);
        assert!(list["data"]["items"][0]["user_id"].is_null());

        server
            .get("/auth/me")
            .authorization_bearer(&alice.token)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_deleting_an_account_removes_images_of_disbanded_groups() {
        let (state, _) = create_test_state().await;
        let media_root = std::path::PathBuf::from(&state.config.media_root);
        let server = create_test_server(state);
        let alice = register_user(&server, "alice", "Alice").await;
        let bob = register_user(&server, "bob", "Bob").await;
        let group_id = found_group(&server, &alice, &bob, "Pair").await;

        let form = MultipartForm::new().add_part(
            "group_image",
            Part::bytes(vec![0x89, b'P', b'N', b'G', 4, 5, 6])
                .file_name("door.png")
                .mime_type("image/png"),
        );
        let updated: Value = server
            .put(&format!("/groups/{group_id}"))
            .authorization_bearer(&alice.token)
            .multipart(form)
            .await
            .json();
        let image = updated["data"]["group_image"].as_str().unwrap();
        let file_name = image.rsplit('/').next().unwrap();
        let stored = media_root.join("group-pics").join(file_name);
        assert!(stored.exists());

        server
            .delete("/users/alice")
            .authorization_bearer(&alice.token)
            .await
            .assert_status_ok();

        server
            .get(&format!("/groups/{group_id}"))
            .authorization_bearer(&bob.token)
            .await
            .assert_status(StatusCode::NOT_FOUND);
        assert!(!stored.exists());
    }
}
