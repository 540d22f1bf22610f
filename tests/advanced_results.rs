use advanced_results::{
    app,
    types::{AppContext, Context, Store},
    utils::advanced_results::{memory::MemoryStore, AdvancedResult, CountMode, Settings},
};
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

async fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();

    for index in 1..=35 {
        store
            .insert(
                "bootcamps",
                json!({
                    "id": format!("b{index}"),
                    "name": format!("Bootcamp {index}"),
                    "description": format!("Description {index}"),
                    "averageCost": index * 1000,
                    "careers": if index % 2 == 0 { json!(["Business"]) } else { json!(["Web Development", "UI/UX"]) },
                    "createdAt": format!("2024-01-{:02}T00:00:00Z", index % 28 + 1),
                }),
            )
            .await
            .unwrap();
    }

    let courses = [
        json!({ "id": "c1", "title": "Front End", "tuition": 8000, "bootcamp": "b1", "createdAt": "2024-02-01T00:00:00Z" }),
        json!({ "id": "c2", "title": "Full Stack", "tuition": 10000, "bootcamp": "b1", "createdAt": "2024-02-02T00:00:00Z" }),
        json!({ "id": "c3", "title": "Data", "tuition": 12000, "bootcamp": "b2", "createdAt": "2024-02-03T00:00:00Z" }),
    ];
    for course in courses {
        store.insert("courses", course).await.unwrap();
    }

    store
}

async fn router_with(settings: Settings) -> Router {
    let ctx = Context {
        app: AppContext {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        store: Store::Memory(seeded_store().await),
        query: settings,
    };

    app::get_router(Arc::new(ctx))
}

async fn get_json(router: Router, uri: &str) -> (StatusCode, Value) {
    let response = router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();

    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn should_answer_health_check() {
    let (status, body) = get_json(router_with(Settings::default()).await, "/api").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn should_list_first_page_with_defaults() {
    let (status, body) = get_json(router_with(Settings::default()).await, "/api/bootcamps").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["count"], json!(25));
    assert_eq!(body["pagination"], json!({ "next": { "page": 2, "limit": 25 } }));

    // newest first
    let created = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|bootcamp| bootcamp["createdAt"].as_str().unwrap().to_string())
        .collect::<Vec<_>>();
    let mut sorted = created.clone();
    sorted.sort_by(|a, b| b.cmp(a));
    assert_eq!(created, sorted);
}

#[tokio::test]
async fn should_filter_select_sort_and_paginate() {
    let (status, body) = get_json(
        router_with(Settings::default()).await,
        "/api/bootcamps?averageCost[gt]=5000&select=name,averageCost&sort=-averageCost&page=2&limit=10",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], json!(10));
    assert_eq!(
        body["pagination"],
        json!({ "prev": { "page": 1, "limit": 10 }, "next": { "page": 3, "limit": 10 } })
    );
    assert_eq!(body["data"][0], json!({ "name": "Bootcamp 25", "averageCost": 25000 }));
    assert_eq!(body["data"][9], json!({ "name": "Bootcamp 16", "averageCost": 16000 }));
}

#[tokio::test]
async fn should_count_the_whole_collection_by_default() {
    let uri = "/api/bootcamps?averageCost[gte]=30000&limit=5";

    let (_, body) = get_json(router_with(Settings::default()).await, uri).await;
    assert_eq!(body["count"], json!(5));
    assert_eq!(body["pagination"], json!({ "next": { "page": 2, "limit": 5 } }));

    let filtered = Settings {
        count_mode: CountMode::Filtered,
        ..Default::default()
    };
    let (_, body) = get_json(router_with(filtered).await, uri).await;
    assert_eq!(body["count"], json!(6));
    assert_eq!(body["pagination"], json!({ "next": { "page": 2, "limit": 5 } }));

    let filtered = Settings {
        count_mode: CountMode::Filtered,
        ..Default::default()
    };
    let (_, body) = get_json(
        router_with(filtered).await,
        "/api/bootcamps?averageCost[gte]=31000&limit=5",
    )
    .await;
    assert_eq!(body["count"], json!(5));
    assert_eq!(body["pagination"], json!({}));
}

#[tokio::test]
async fn should_filter_with_in_lists() {
    let (status, body) = get_json(
        router_with(Settings::default()).await,
        "/api/bootcamps?careers[in]=Business&averageCost[lte]=6000&sort=averageCost&select=name",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"],
        json!([{ "name": "Bootcamp 2" }, { "name": "Bootcamp 4" }, { "name": "Bootcamp 6" }])
    );
}

#[tokio::test]
async fn should_populate_relations() {
    let router = router_with(Settings::default()).await;
    let (status, body) = get_json(router.clone(), "/api/courses?sort=title").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], json!(3));
    assert_eq!(body["data"][0]["title"], json!("Data"));
    assert_eq!(
        body["data"][0]["bootcamp"],
        json!({ "name": "Bootcamp 2", "description": "Description 2" })
    );

    let (_, body) = get_json(router, "/api/bootcamps?id=b1&select=name,courses").await;
    let courses = body["data"][0]["courses"].as_array().unwrap();
    assert_eq!(body["data"][0]["name"], json!("Bootcamp 1"));
    assert_eq!(courses.len(), 2);
    assert_eq!(courses[0]["title"], json!("Front End"));
}

#[tokio::test]
async fn should_reject_empty_values() {
    for uri in [
        "/api/bootcamps?name=",
        "/api/bootcamps?name=undefined",
        "/api/courses?tuition[lt]=",
    ] {
        let (status, body) = get_json(router_with(Settings::default()).await, uri).await;

        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "{uri}");
        assert_eq!(
            body,
            json!({ "success": false, "error": "One or more field is Empty, Null or Undefined" })
        );
    }
}

#[tokio::test]
async fn should_reject_malformed_parameters() {
    for uri in [
        "/api/bootcamps?select=name,-description",
        "/api/bootcamps?sort[name]=1",
        "/api/bootcamps?name[$where]=1",
        "/api/bootcamps?page[x]=2",
        "/api/bootcamps?limit[x]=2",
    ] {
        let (status, body) = get_json(router_with(Settings::default()).await, uri).await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["success"], json!(false));
    }
}

#[tokio::test]
async fn should_answer_pages_far_past_the_end() {
    let (status, body) = get_json(
        router_with(Settings::default()).await,
        "/api/bootcamps?page=99999999999999&limit=99999999",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], json!(0));
    assert_eq!(body["data"], json!([]));
    assert_eq!(
        body["pagination"],
        json!({ "prev": { "page": 99999999999998u64, "limit": 99999999 } })
    );
}

#[tokio::test]
async fn should_fail_when_middleware_is_missing() {
    async fn handler(results: AdvancedResult) -> Json<AdvancedResult> {
        Json(results)
    }

    let router = Router::new().route("/", get(handler));
    let (status, body) = get_json(router, "/").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], json!("Failed to fetch results"));
}
