mod common;

use campus_admin::models::{InvitationFilter, InvitationStatus, RoleName};
use campus_admin::services::error::SESSION_EXPIRED;
use campus_admin::storage::TOKEN_KEY;
use chrono::{Duration, Utc};
use common::{invitation_json, organization, TestConsole, OTHER_ORG_ID, TEST_ORG_ID};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_create_without_permission_makes_no_request() {
    let app = TestConsole::spawn().await;
    let sub_admin = app.sign_in_to(RoleName::SubAdmin, TEST_ORG_ID);

    Mock::given(method("POST"))
        .and(path("/invitations"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&app.server)
        .await;

    let result = app
        .console
        .invitations
        .create("boss@example.com", RoleName::Admin, &sub_admin)
        .await;

    assert!(!result.success);
    assert!(result.data.is_none());
    assert!(result.message.unwrap().contains("permission"));
}

#[tokio::test]
async fn test_create_starts_pending_in_active_organization() {
    let app = TestConsole::spawn().await;
    let sub_admin = app.sign_in_to(RoleName::SubAdmin, TEST_ORG_ID);
    let expires_at = Utc::now() + Duration::days(7);

    Mock::given(method("POST"))
        .and(path("/invitations"))
        .and(body_partial_json(json!({
            "email": "teacher@example.com",
            "roleToAssign": "instructor",
            "organizationId": TEST_ORG_ID,
            "invitedBy": sub_admin.id.clone()
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "invitation": invitation_json("inv-1", TEST_ORG_ID, "pending", "instructor", expires_at)
        })))
        .expect(1)
        .mount(&app.server)
        .await;

    let result = app
        .console
        .invitations
        .create("teacher@example.com", RoleName::Instructor, &sub_admin)
        .await;

    assert!(result.success, "create failed: {:?}", result.message);
    let invitation = result.data.unwrap();
    assert_eq!(invitation.status, InvitationStatus::Pending);
    assert_eq!(invitation.organization_id, TEST_ORG_ID);
    assert!(app.console.invitations.cached("inv-1").is_some());
}

#[tokio::test]
async fn test_create_requires_active_organization() {
    let app = TestConsole::spawn().await;
    let admin = app.sign_in(RoleName::Admin, None);

    let result = app
        .console
        .invitations
        .create("someone@example.com", RoleName::Student, &admin)
        .await;

    assert!(!result.success);
}

#[tokio::test]
async fn test_list_is_scoped_and_evaluates_expiry_lazily() {
    let app = TestConsole::spawn().await;
    app.sign_in_to(RoleName::Admin, TEST_ORG_ID);
    let now = Utc::now();

    Mock::given(method("GET"))
        .and(path("/invitations"))
        .and(query_param("organizationId", TEST_ORG_ID))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "invitations": [
                invitation_json("inv-live", TEST_ORG_ID, "pending", "student", now + Duration::days(3)),
                invitation_json("inv-stale", TEST_ORG_ID, "pending", "student", now - Duration::hours(1)),
                invitation_json("inv-foreign", OTHER_ORG_ID, "pending", "student", now + Duration::days(3)),
            ]
        })))
        .expect(1)
        .mount(&app.server)
        .await;

    let result = app
        .console
        .invitations
        .list(InvitationFilter::default())
        .await;

    assert!(result.success, "list failed: {:?}", result.message);
    let views = result.data.unwrap();
    let ids: Vec<&str> = views.iter().map(|v| v.invitation.id.as_str()).collect();
    assert_eq!(ids, vec!["inv-live", "inv-stale"]);

    assert_eq!(views[0].effective_status, InvitationStatus::Pending);
    assert_eq!(views[1].effective_status, InvitationStatus::Expired);
    // Display-only: the stored status stays pending.
    assert_eq!(views[1].invitation.status, InvitationStatus::Pending);
    assert_eq!(
        app.console.invitations.cached("inv-stale").unwrap().status,
        InvitationStatus::Pending
    );
    assert!(app.console.invitations.cached("inv-foreign").is_none());
}

#[tokio::test]
async fn test_list_forwards_filters() {
    let app = TestConsole::spawn().await;
    app.sign_in_to(RoleName::Admin, TEST_ORG_ID);
    let expires_at = Utc::now() + Duration::days(1);

    Mock::given(method("GET"))
        .and(path("/invitations"))
        .and(query_param("status", "revoked"))
        .and(query_param("role", "instructor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            invitation_json("inv-r", TEST_ORG_ID, "revoked", "instructor", expires_at),
            invitation_json("inv-p", TEST_ORG_ID, "pending", "instructor", expires_at),
        ])))
        .expect(1)
        .mount(&app.server)
        .await;

    let views = app
        .console
        .invitations
        .list(InvitationFilter {
            status: Some(InvitationStatus::Revoked),
            role_to_assign: Some(RoleName::Instructor),
        })
        .await
        .into_data()
        .unwrap();

    assert_eq!(views.len(), 1);
    assert_eq!(views[0].invitation.id, "inv-r");
}

#[tokio::test]
async fn test_terminal_invitations_cannot_be_revoked_or_resent() {
    let app = TestConsole::spawn().await;
    app.sign_in_to(RoleName::Admin, TEST_ORG_ID);
    let expires_at = Utc::now() + Duration::days(1);

    Mock::given(method("GET"))
        .and(path("/invitations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            invitation_json("inv-accepted", TEST_ORG_ID, "accepted", "student", expires_at),
            invitation_json("inv-expired", TEST_ORG_ID, "expired", "student", expires_at),
            invitation_json("inv-revoked", TEST_ORG_ID, "revoked", "student", expires_at),
        ])))
        .mount(&app.server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.server)
        .await;

    let invitations = &app.console.invitations;
    assert!(invitations.list(InvitationFilter::default()).await.success);

    for id in ["inv-accepted", "inv-expired", "inv-revoked"] {
        let before = invitations.cached(id).unwrap().status;
        assert!(!invitations.revoke(id).await.success);
        assert!(!invitations.resend(id).await.success);
        assert_eq!(invitations.cached(id).unwrap().status, before);
    }
}

#[tokio::test]
async fn test_revoke_is_idempotent_after_first_transition() {
    let app = TestConsole::spawn().await;
    app.sign_in_to(RoleName::Admin, TEST_ORG_ID);
    let expires_at = Utc::now() + Duration::days(1);

    Mock::given(method("GET"))
        .and(path("/invitations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            invitation_json("inv-1", TEST_ORG_ID, "pending", "instructor", expires_at),
        ])))
        .mount(&app.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/invitations/inv-1/revoke"))
        .respond_with(ResponseTemplate::new(200).set_body_json(invitation_json(
            "inv-1",
            TEST_ORG_ID,
            "revoked",
            "instructor",
            expires_at,
        )))
        .expect(1)
        .mount(&app.server)
        .await;

    let invitations = &app.console.invitations;
    invitations.list(InvitationFilter::default()).await;

    let first = invitations.revoke("inv-1").await;
    assert!(first.success);
    assert_eq!(first.data.unwrap().status, InvitationStatus::Revoked);

    let second = invitations.revoke("inv-1").await;
    let third = invitations.revoke("inv-1").await;
    assert!(!second.success);
    assert_eq!(second, third);
    assert_eq!(
        invitations.cached("inv-1").unwrap().status,
        InvitationStatus::Revoked
    );
}

#[tokio::test]
async fn test_resend_keeps_status_and_expiry() {
    let app = TestConsole::spawn().await;
    app.sign_in_to(RoleName::Instructor, TEST_ORG_ID);
    let expires_at = Utc::now() + Duration::days(2);

    Mock::given(method("GET"))
        .and(path("/invitations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            invitation_json("inv-s", TEST_ORG_ID, "pending", "student", expires_at),
            invitation_json("inv-i", TEST_ORG_ID, "pending", "instructor", expires_at),
        ])))
        .mount(&app.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/invitations/inv-s/resend"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "Invitation resent"})))
        .expect(1)
        .mount(&app.server)
        .await;

    let invitations = &app.console.invitations;
    invitations.list(InvitationFilter::default()).await;
    let before = invitations.cached("inv-s").unwrap();

    let result = invitations.resend("inv-s").await;
    assert!(result.success, "resend failed: {:?}", result.message);
    let after = result.data.unwrap();
    assert_eq!(after.status, InvitationStatus::Pending);
    assert_eq!(after.expires_at, before.expires_at);

    // Instructors may only invite students.
    assert!(!invitations.resend("inv-i").await.success);
}

#[tokio::test]
async fn test_unknown_invitation_is_not_found() {
    let app = TestConsole::spawn().await;
    app.sign_in_to(RoleName::Admin, TEST_ORG_ID);

    let result = app.console.invitations.revoke("missing").await;

    assert!(!result.success);
    assert_eq!(result.message.as_deref(), Some("Invitation not found."));
}

#[tokio::test]
async fn test_create_uses_session_role_not_caller_identity() {
    let app = TestConsole::spawn().await;
    let instructor = app.sign_in_to(RoleName::Instructor, TEST_ORG_ID);

    Mock::given(method("POST"))
        .and(path("/invitations"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&app.server)
        .await;

    let mut promoted = instructor.clone();
    promoted.role = RoleName::Admin;
    let result = app
        .console
        .invitations
        .create("teacher@example.com", RoleName::Instructor, &promoted)
        .await;
    assert!(!result.success);
    assert!(result.message.unwrap().contains("permission"));

    let mut stranger = instructor;
    stranger.id = "someone-else".to_string();
    let result = app
        .console
        .invitations
        .create("pupil@example.com", RoleName::Student, &stranger)
        .await;
    assert!(!result.success);
}

#[tokio::test]
async fn test_registry_does_not_outlive_tenant_or_session() {
    let app = TestConsole::spawn().await;
    app.sign_in_to(RoleName::Admin, TEST_ORG_ID);
    let expires_at = Utc::now() + Duration::days(1);

    Mock::given(method("GET"))
        .and(path("/invitations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            invitation_json("inv-a", TEST_ORG_ID, "pending", "student", expires_at),
        ])))
        .mount(&app.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&app.server)
        .await;

    let invitations = &app.console.invitations;
    assert!(invitations.list(InvitationFilter::default()).await.success);
    assert!(invitations.cached("inv-a").is_some());

    app.console
        .organizations
        .switch_organization(organization(OTHER_ORG_ID, false))
        .unwrap();
    assert!(invitations.cached("inv-a").is_none());
    assert!(!invitations.revoke("inv-a").await.success);

    app.console.logout().await;
    app.sign_in_to(RoleName::Admin, TEST_ORG_ID);
    assert!(invitations.cached("inv-a").is_none());
}

#[tokio::test]
async fn test_unauthorized_list_forces_logout() {
    let app = TestConsole::spawn().await;
    app.sign_in_to(RoleName::Admin, TEST_ORG_ID);

    Mock::given(method("GET"))
        .and(path("/invitations"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&app.server)
        .await;

    let result = app
        .console
        .invitations
        .list(InvitationFilter::default())
        .await;

    assert!(!result.success);
    assert_eq!(result.message.as_deref(), Some(SESSION_EXPIRED));
    assert!(!app.console.session.is_authenticated());
    assert!(app.stored(TOKEN_KEY).is_none());
    assert!(app.console.organizations.current().is_none());
}
