mod common;

use common::{ids, names, TestApp};
use recipe_api::{
    schema::{Id, LabelKind},
    store::Store,
};
use rstest::rstest;
use serde_json::json;
use warp::http::StatusCode;

async fn user_id(app: &TestApp, email: &str) -> Id {
    app.store
        .get_user_by_email(email)
        .await
        .unwrap()
        .unwrap()
        .id
}

#[rstest]
#[case(LabelKind::Tag)]
#[case(LabelKind::Ingredient)]
#[tokio::test]
async fn auth_is_required(#[case] kind: LabelKind) {
    let app = TestApp::new();

    let (status, _) = app
        .request("GET", &format!("/{}", kind.path()), None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[rstest]
#[case(LabelKind::Tag, "Vegan", "Dessert")]
#[case(LabelKind::Ingredient, "Salt", "Kale")]
#[tokio::test]
async fn list_is_ordered_by_name_descending(
    #[case] kind: LabelKind,
    #[case] first: &str,
    #[case] second: &str,
) {
    let app = TestApp::new();
    let auth = app.login("user@example.com", "testpass123").await;
    let owner = user_id(&app, "user@example.com").await;

    app.store.create_label(kind, owner, second).await.unwrap();
    app.store.create_label(kind, owner, first).await.unwrap();

    let (status, body) = app
        .request("GET", &format!("/{}", kind.path()), Some(&auth), None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(names(&body), vec![first, second]);
    assert_eq!(body[0].as_object().unwrap().len(), 2);
}

#[rstest]
#[case(LabelKind::Tag)]
#[case(LabelKind::Ingredient)]
#[tokio::test]
async fn list_is_limited_to_owner(#[case] kind: LabelKind) {
    let app = TestApp::new();
    app.login("other@example.com", "testpass123").await;
    let auth = app.login("user@example.com", "testpass123").await;

    let other = user_id(&app, "other@example.com").await;
    let owner = user_id(&app, "user@example.com").await;
    app.store.create_label(kind, other, "Theirs").await.unwrap();
    let mine = app.store.create_label(kind, owner, "Mine").await.unwrap();

    let (_, body) = app
        .request("GET", &format!("/{}", kind.path()), Some(&auth), None)
        .await;

    assert_eq!(body, json!([{ "id": mine.id, "name": "Mine" }]));
}

#[rstest]
#[case(LabelKind::Tag)]
#[case(LabelKind::Ingredient)]
#[tokio::test]
async fn retrieve_and_rename(#[case] kind: LabelKind) {
    let app = TestApp::new();
    let auth = app.login("user@example.com", "testpass123").await;
    let owner = user_id(&app, "user@example.com").await;
    let label = app.store.create_label(kind, owner, "Before").await.unwrap();
    let path = format!("/{}/{}", kind.path(), label.id);

    let (status, body) = app.request("GET", &path, Some(&auth), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "id": label.id, "name": "Before" }));

    let (status, body) = app
        .request("PATCH", &path, Some(&auth), Some(json!({ "name": "After" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "After");

    let (status, body) = app
        .request("PUT", &path, Some(&auth), Some(json!({ "name": "Again" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Again");

    let stored = app.store.get_label(kind, owner, label.id).await.unwrap().unwrap();
    assert_eq!(stored.name, "Again");
}

#[tokio::test]
async fn rename_validates_name() {
    let app = TestApp::new();
    let auth = app.login("user@example.com", "testpass123").await;
    let owner = user_id(&app, "user@example.com").await;
    let tag = app
        .store
        .create_label(LabelKind::Tag, owner, "Breakfast")
        .await
        .unwrap();
    let path = format!("/tags/{}", tag.id);

    let (status, body) = app
        .request("PATCH", &path, Some(&auth), Some(json!({ "name": "" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["name"].is_array());

    let (status, body) = app
        .request("PUT", &path, Some(&auth), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["name"][0], "This field is required.");

    let (status, body) = app
        .request("PATCH", &path, Some(&auth), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Breakfast");
}

#[rstest]
#[case(LabelKind::Tag)]
#[case(LabelKind::Ingredient)]
#[tokio::test]
async fn foreign_labels_are_not_found(#[case] kind: LabelKind) {
    let app = TestApp::new();
    app.login("other@example.com", "testpass123").await;
    let auth = app.login("user@example.com", "testpass123").await;
    let other = user_id(&app, "other@example.com").await;
    let theirs = app.store.create_label(kind, other, "Theirs").await.unwrap();
    let path = format!("/{}/{}", kind.path(), theirs.id);

    let (status, _) = app.request("GET", &path, Some(&auth), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .request("PATCH", &path, Some(&auth), Some(json!({ "name": "Mine" })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.request("DELETE", &path, Some(&auth), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let stored = app.store.get_label(kind, other, theirs.id).await.unwrap().unwrap();
    assert_eq!(stored.name, "Theirs");
}

#[rstest]
#[case(LabelKind::Tag)]
#[case(LabelKind::Ingredient)]
#[tokio::test]
async fn delete_detaches_from_recipes(#[case] kind: LabelKind) {
    let app = TestApp::new();
    let auth = app.login("user@example.com", "testpass123").await;

    let (_, recipe) = app
        .request(
            "POST",
            "/recipes",
            Some(&auth),
            Some(json!({
                "title": "T",
                "time_minutes": 5,
                "price": "5.50",
                kind.path(): [{ "name": "Doomed" }],
            })),
        )
        .await;
    let label_id = recipe[kind.path()][0]["id"].as_i64().unwrap();

    let (status, _) = app
        .request(
            "DELETE",
            &format!("/{}/{label_id}", kind.path()),
            Some(&auth),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, labels) = app
        .request("GET", &format!("/{}", kind.path()), Some(&auth), None)
        .await;
    assert_eq!(labels, json!([]));

    let (status, detail) = app
        .request("GET", &format!("/recipes/{}", recipe["id"]), Some(&auth), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail[kind.path()], json!([]));
}

#[rstest]
#[case(LabelKind::Tag)]
#[case(LabelKind::Ingredient)]
#[tokio::test]
async fn assigned_only_filters_and_deduplicates(#[case] kind: LabelKind) {
    let app = TestApp::new();
    let auth = app.login("user@example.com", "testpass123").await;
    let owner = user_id(&app, "user@example.com").await;
    app.store.create_label(kind, owner, "Unused").await.unwrap();

    let mut assigned = None;
    for title in ["Eggs Benedict", "Herb Eggs"] {
        let (status, recipe) = app
            .request(
                "POST",
                "/recipes",
                Some(&auth),
                Some(json!({
                    "title": title,
                    "time_minutes": 60,
                    "price": "7.00",
                    kind.path(): [{ "name": "Shared" }],
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assigned = recipe[kind.path()][0]["id"].as_i64();
    }

    let (status, body) = app
        .request(
            "GET",
            &format!("/{}?assigned_only=1", kind.path()),
            Some(&auth),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), vec![assigned.unwrap()]);

    let (_, body) = app
        .request(
            "GET",
            &format!("/{}?assigned_only=0", kind.path()),
            Some(&auth),
            None,
        )
        .await;
    assert_eq!(names(&body), vec!["Unused", "Shared"]);
}

#[tokio::test]
async fn assigned_only_must_be_an_integer() {
    let app = TestApp::new();
    let auth = app.login("user@example.com", "testpass123").await;

    let (status, body) = app
        .request("GET", "/tags?assigned_only=yes", Some(&auth), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn labels_cannot_be_created_directly() {
    let app = TestApp::new();
    let auth = app.login("user@example.com", "testpass123").await;

    let (status, _) = app
        .request("POST", "/tags", Some(&auth), Some(json!({ "name": "New" })))
        .await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn padded_names_reuse_existing_labels() {
    let app = TestApp::new();
    let auth = app.login("user@example.com", "testpass123").await;
    let owner = user_id(&app, "user@example.com").await;
    let vegan = app
        .store
        .create_label(LabelKind::Tag, owner, "Vegan")
        .await
        .unwrap();

    let (status, recipe) = app
        .request(
            "POST",
            "/recipes",
            Some(&auth),
            Some(json!({
                "title": "  T  ",
                "time_minutes": 5,
                "price": "5.50",
                "tags": [{ "name": "Vegan" }, { "name": " Vegan " }],
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(recipe["title"], "T");
    assert_eq!(recipe["tags"], json!([{ "id": vegan.id, "name": "Vegan" }]));

    let (_, tags) = app.request("GET", "/tags", Some(&auth), None).await;
    assert_eq!(names(&tags), vec!["Vegan"]);

    let path = format!("/tags/{}", vegan.id);
    let (status, body) = app
        .request("PATCH", &path, Some(&auth), Some(json!({ "name": "  Plant based " })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Plant based");
}
