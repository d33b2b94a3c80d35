pub mod auth;
pub mod error;
mod plants;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Credential routes (public)
    let auth_routes = Router::new()
        .route("/register/", post(auth::register))
        .route("/login/", post(auth::login))
        .route("/reauthenticate/", post(auth::reauthenticate));

    // Bearer session token required, enforced by the Account extractor
    let plant_routes = Router::new()
        .route("/plants/", get(plants::list_plants).post(plants::create_plant))
        .route("/plants/:id/", get(plants::get_plant))
        .route(
            "/plants/remove/:id/",
            get(plants::remove_plant).post(plants::remove_plant),
        )
        .route("/plants/water/:id", post(plants::water_plant))
        .route("/account/delete/", post(auth::delete_account));

    Router::new()
        .route("/health", get(health_check))
        .merge(auth_routes)
        .merge(plant_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{format_timestamp, PlantListResponse, PlantResponse, TokenPair};
    use crate::storage::MemoryObjectStore;
    use crate::test_support::{png_data_uri, test_state};
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
        response::Response,
    };
    use chrono::{Duration, Utc};
    use http_body_util::BodyExt;
    use serde::de::DeserializeOwned;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct TestApp {
        router: Router,
        state: Arc<AppState>,
        storage: Arc<MemoryObjectStore>,
    }

    async fn app() -> TestApp {
        let (state, storage) = test_state().await;
        TestApp {
            router: create_router(state.clone()),
            state,
            storage,
        }
    }

    impl TestApp {
        async fn send(
            &self,
            method: Method,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> Response {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
            }
            let request = match body {
                Some(body) => builder
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };
            self.router.clone().oneshot(request).await.unwrap()
        }

        async fn register(&self, username: &str, password: &str) -> TokenPair {
            let response = self
                .send(
                    Method::POST,
                    "/register/",
                    None,
                    Some(json!({"username": username, "password": password})),
                )
                .await;
            assert_eq!(response.status(), StatusCode::CREATED);
            read_json(response).await
        }

        async fn create_fern(&self, token: &str) -> PlantResponse {
            let response = self
                .send(
                    Method::POST,
                    "/plants/",
                    Some(token),
                    Some(json!({
                        "watering_time": 86_400_000.0,
                        "name": "Fern",
                        "image": png_data_uri(8, 6),
                    })),
                )
                .await;
            assert_eq!(response.status(), StatusCode::CREATED);
            read_json(response).await
        }
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> T {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    async fn error_of(response: Response) -> String {
        let body: Value = read_json(response).await;
        assert_eq!(body["success"], json!(false));
        body["error"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let app = app().await;
        let response = app.send(Method::GET, "/health", None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"OK");
    }

    #[tokio::test]
    async fn test_register_login_and_list() {
        let app = app().await;
        let registered = app.register("alice", "pw123").await;
        assert_eq!(registered.session_token.len(), 64);

        let response = app
            .send(
                Method::POST,
                "/login/",
                None,
                Some(json!({"username": "alice", "password": "wrongpw"})),
            )
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .send(
                Method::POST,
                "/login/",
                None,
                Some(json!({"username": "alice", "password": "pw123"})),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let pair: TokenPair = read_json(response).await;
        assert_ne!(pair.session_token, registered.session_token);

        let response = app.send(Method::GET, "/plants/", Some(&pair.session_token), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = read_json(response).await;
        assert_eq!(body, json!({"plants": []}));

        // The registration pair was replaced by the login
        let response = app
            .send(Method::GET, "/plants/", Some(&registered.session_token), None)
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_register_duplicate_and_missing_fields() {
        let app = app().await;
        app.register("alice", "pw123").await;

        let response = app
            .send(
                Method::POST,
                "/register/",
                None,
                Some(json!({"username": "alice", "password": "other"})),
            )
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .send(Method::POST, "/register/", None, Some(json!({"username": "bob"})))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .send(Method::POST, "/login/", None, Some(json!({"password": "pw123"})))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app.send(Method::POST, "/login/", None, None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(!error_of(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_bearer_is_not_found() {
        let app = app().await;
        for (method, uri) in [
            (Method::GET, "/plants/"),
            (Method::GET, "/plants/1/"),
            (Method::POST, "/plants/water/1"),
            (Method::POST, "/reauthenticate/"),
        ] {
            let response = app.send(method, uri, None, None).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_expired_session_is_forbidden_and_refresh_recovers() {
        let app = app().await;
        let pair = app.register("alice", "pw123").await;

        sqlx::query("UPDATE accounts SET session_expires_at = ?")
            .bind(format_timestamp(Utc::now() - Duration::minutes(1)))
            .execute(&app.state.db)
            .await
            .unwrap();

        let response = app.send(Method::GET, "/plants/", Some(&pair.session_token), None).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .send(Method::POST, "/reauthenticate/", Some(&pair.refresh_token), None)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let renewed: TokenPair = read_json(response).await;

        let response = app
            .send(Method::GET, "/plants/", Some(&renewed.session_token), None)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_expired_refresh_token_is_unauthorized() {
        let app = app().await;
        let pair = app.register("alice", "pw123").await;

        let past = format_timestamp(Utc::now() - Duration::seconds(1));
        sqlx::query("UPDATE accounts SET session_expires_at = ?, refresh_expires_at = ?")
            .bind(&past)
            .bind(&past)
            .execute(&app.state.db)
            .await
            .unwrap();

        let response = app
            .send(Method::POST, "/reauthenticate/", Some(&pair.refresh_token), None)
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .send(Method::POST, "/reauthenticate/", Some("not-a-token"), None)
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_plant_lifecycle() {
        let app = app().await;
        let pair = app.register("alice", "pw123").await;
        let token = pair.session_token.as_str();

        let created = app.create_fern(token).await;
        assert_eq!(created.name, "Fern");
        assert_eq!(created.time_elapsed, 0.0);
        assert_eq!(created.watering_time, 86_400_000.0);
        assert!(created.image.url.starts_with("https://leafy-images.s3-us-east-1.amazonaws.com/"));
        assert!(created.image.url.ends_with(".png"));
        assert_eq!(app.storage.len(), 1);

        let response = app
            .send(Method::GET, &format!("/plants/{}/", created.id), Some(token), None)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let fetched: PlantResponse = read_json(response).await;
        assert_eq!(fetched, created);

        let response = app
            .send(Method::POST, &format!("/plants/water/{}", created.id), Some(token), None)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let watered: PlantResponse = read_json(response).await;
        assert_eq!(watered.id, created.id);
        assert_eq!(watered.time_elapsed, 0.0);
        assert!(watered.start_time >= created.start_time);

        let response = app.send(Method::GET, "/plants/", Some(token), None).await;
        let listed: PlantListResponse = read_json(response).await;
        assert_eq!(listed.plants.len(), 1);

        let response = app
            .send(Method::GET, &format!("/plants/remove/{}/", created.id), Some(token), None)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = read_json(response).await;
        assert_eq!(body, json!({"success": true}));
        assert!(app.storage.is_empty());

        let response = app
            .send(Method::POST, &format!("/plants/remove/{}/", created.id), Some(token), None)
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_plant_validation() {
        let app = app().await;
        let pair = app.register("alice", "pw123").await;
        let token = Some(pair.session_token.as_str());

        let response = app
            .send(
                Method::POST,
                "/plants/",
                token,
                Some(json!({"name": "Fern", "image": png_data_uri(2, 2)})),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .send(
                Method::POST,
                "/plants/",
                token,
                Some(json!({
                    "watering_time": 1000,
                    "name": "Fern",
                    "image": "data:image/bmp;base64,Qk0=",
                })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(error_of(response).await.contains("is not supported"));
        assert!(app.storage.is_empty());
    }

    #[tokio::test]
    async fn test_oversized_watering_time_is_rejected() {
        let app = app().await;
        let pair = app.register("alice", "pw123").await;

        let response = app
            .send(
                Method::POST,
                "/plants/",
                Some(&pair.session_token),
                Some(json!({
                    "watering_time": 9.0e15,
                    "name": "Fern",
                    "image": png_data_uri(2, 2),
                })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(error_of(response).await.contains("watering_time"));
        assert!(app.storage.is_empty());

        // The server is still serving
        let response = app.send(Method::GET, "/plants/", Some(&pair.session_token), None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_plant_tag_is_echoed_only_when_present() {
        let app = app().await;
        let pair = app.register("alice", "pw123").await;

        let response = app
            .send(
                Method::POST,
                "/plants/",
                Some(&pair.session_token),
                Some(json!({
                    "watering_time": 1000,
                    "name": "Cactus",
                    "image": png_data_uri(2, 2),
                    "plant_tag": "desk",
                })),
            )
            .await;
        let body: Value = read_json(response).await;
        assert_eq!(body["plant_tag"], json!("desk"));

        let untagged = app.create_fern(&pair.session_token).await;
        assert_eq!(untagged.plant_tag, None);
        let response = app
            .send(Method::GET, &format!("/plants/{}/", untagged.id), Some(&pair.session_token), None)
            .await;
        let body: Value = read_json(response).await;
        assert!(body.get("plant_tag").is_none());
    }

    #[tokio::test]
    async fn test_other_accounts_plants_are_not_found() {
        let app = app().await;
        let alice = app.register("alice", "pw123").await;
        let bob = app.register("bob", "pw456").await;
        let plant = app.create_fern(&alice.session_token).await;

        for (method, uri) in [
            (Method::GET, format!("/plants/{}/", plant.id)),
            (Method::POST, format!("/plants/water/{}", plant.id)),
            (Method::POST, format!("/plants/remove/{}/", plant.id)),
        ] {
            let response = app.send(method, &uri, Some(&bob.session_token), None).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
        }

        let response = app.send(Method::GET, "/plants/", Some(&bob.session_token), None).await;
        let listed: PlantListResponse = read_json(response).await;
        assert!(listed.plants.is_empty());
        assert_eq!(app.storage.len(), 1);

        let response = app
            .send(Method::GET, "/plants/not-a-number/", Some(&alice.session_token), None)
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_account_removes_plants_and_images() {
        let app = app().await;
        let alice = app.register("alice", "pw123").await;
        app.create_fern(&alice.session_token).await;
        app.create_fern(&alice.session_token).await;

        let response = app
            .send(Method::POST, "/account/delete/", Some(&alice.session_token), None)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(app.storage.is_empty());

        let response = app
            .send(Method::GET, "/plants/", Some(&alice.session_token), None)
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        // The username is free again
        app.register("alice", "pw123").await;
    }
}
