#[cfg(test)]
mod tests {
    use crate::config::ServerConfig;
    use crate::{build_router, AppState};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use axum::Router;
    use scan_client::{ScanClient, ScanConfig};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;
    use watchlist_store::InMemoryWatchlistStore;

    fn app() -> Router {
        let scan = ScanClient::new(ScanConfig::default()).unwrap();
        let state = AppState::new(
            Arc::new(InMemoryWatchlistStore::new()),
            scan,
            "demo-user-1",
            "memory",
        );
        build_router(state, &ServerConfig::default())
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        user: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header("x-user-id", user);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn add(app: &Router, user: Option<&str>, body: Value) -> (StatusCode, Value) {
        send(app, Method::POST, "/api/watchlist", user, Some(body)).await
    }

    #[tokio::test]
    async fn test_add_returns_created_item_with_snapshot() {
        let app = app();

        let (status, item) = add(
            &app,
            None,
            json!({
                "symbol": "reliance",
                "name": "Reliance Industries",
                "currentPrice": 2890.5,
                "rsi": 61.2,
                "drawdown": 12.4,
                "volume": 1500000,
                "momentumScore": 84,
                "metrics": { "sector": "Energy" }
            }),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(item["symbol"], "RELIANCE");
        assert_eq!(item["userId"], "demo-user-1");
        assert_eq!(item["label"], "All");
        assert_eq!(item["metrics"]["name"], "Reliance Industries");
        assert_eq!(item["metrics"]["currentPrice"], 2890.5);
        assert_eq!(item["metrics"]["momentumScore"], 84.0);
        assert_eq!(item["metrics"]["sector"], "Energy");
        assert!(item["metrics"]["addedAt"].is_string());
        assert!(item["id"].as_str().is_some_and(|id| !id.is_empty()));
        assert_eq!(item["createdAt"], item["updatedAt"]);
    }

    #[tokio::test]
    async fn test_add_from_scanned_record() {
        let app = app();

        let (status, item) = add(
            &app,
            None,
            json!({
                "label": "Breakouts",
                "stock": {
                    "Symbol": "TCS",
                    "Name": "Tata Consultancy",
                    "Current Price": 3900,
                    "RSI (14)": 58,
                    "Momentum Score": 77,
                    "Drawdown %": 9.5,
                    "Is Consolidating": false
                }
            }),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(item["symbol"], "TCS");
        assert_eq!(item["label"], "Breakouts");
        assert_eq!(item["metrics"]["name"], "Tata Consultancy");
        assert_eq!(item["metrics"]["momentumScore"], 77.0);
        assert_eq!(item["metrics"]["drawdown"], 9.5);
        assert_eq!(item["metrics"]["Is Consolidating"], false);
    }

    #[tokio::test]
    async fn test_add_without_symbol_is_bad_request() {
        let app = app();

        let (status, body) = add(&app, None, json!({ "name": "Nameless" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Symbol is required");
        assert!(body["message"].is_string());

        let (status, _) = add(&app, None, json!({ "symbol": "   " })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, list) = send(&app, Method::GET, "/api/watchlist", None, None).await;
        assert_eq!(list, json!([]));
    }

    #[tokio::test]
    async fn test_duplicate_symbol_conflicts() {
        let app = app();

        let (status, _) = add(&app, None, json!({ "symbol": "INFY" })).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = add(&app, None, json!({ "symbol": " infy " })).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "Stock already in watchlist");

        let (_, list) = send(&app, Method::GET, "/api/watchlist", None, None).await;
        assert_eq!(list.as_array().unwrap().len(), 1);

        // another user may hold the same symbol
        let (status, item) = add(&app, Some("other-user"), json!({ "symbol": "INFY" })).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(item["userId"], "other-user");
    }

    #[tokio::test]
    async fn test_list_is_newest_first_and_user_scoped() {
        let app = app();

        for symbol in ["AAA", "BBB", "CCC"] {
            add(&app, None, json!({ "symbol": symbol })).await;
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
        add(&app, Some("someone-else"), json!({ "symbol": "ZZZ" })).await;

        let (status, list) = send(&app, Method::GET, "/api/watchlist", None, None).await;
        assert_eq!(status, StatusCode::OK);
        let symbols: Vec<&str> = list
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["symbol"].as_str().unwrap())
            .collect();
        assert_eq!(symbols, vec!["CCC", "BBB", "AAA"]);
    }

    #[tokio::test]
    async fn test_list_filters_by_label() {
        let app = app();

        add(&app, None, json!({ "symbol": "AAA", "label": "Swing" })).await;
        add(&app, None, json!({ "symbol": "BBB" })).await;

        let (_, list) = send(&app, Method::GET, "/api/watchlist?label=Swing", None, None).await;
        let list = list.as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["symbol"], "AAA");
    }

    #[tokio::test]
    async fn test_list_after_creates_and_deletes() {
        let app = app();

        let mut ids = Vec::new();
        for symbol in ["A1", "A2", "A3", "A4", "A5", "A6"] {
            let (_, item) = add(&app, None, json!({ "symbol": symbol })).await;
            ids.push(item["id"].as_str().unwrap().to_string());
        }
        for id in &ids[..2] {
            let (status, _) =
                send(&app, Method::DELETE, &format!("/api/watchlist/{id}"), None, None).await;
            assert_eq!(status, StatusCode::OK);
        }

        let (_, list) = send(&app, Method::GET, "/api/watchlist", None, None).await;
        assert_eq!(list.as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_patch_changes_only_label() {
        let app = app();

        let (_, created) = add(
            &app,
            None,
            json!({ "symbol": "HDFC", "rsi": 44.5, "metrics": { "pe": 18.2 } }),
        )
        .await;
        let id = created["id"].as_str().unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;

        let (status, updated) = send(
            &app,
            Method::PATCH,
            &format!("/api/watchlist/{id}"),
            None,
            Some(json!({ "label": "Banks" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["label"], "Banks");
        assert_eq!(updated["metrics"], created["metrics"]);
        assert_eq!(updated["id"], created["id"]);
        assert_eq!(updated["symbol"], created["symbol"]);
        assert_eq!(updated["userId"], created["userId"]);
        assert_eq!(updated["createdAt"], created["createdAt"]);
        assert_ne!(updated["updatedAt"], created["updatedAt"]);

        let (_, fetched) =
            send(&app, Method::GET, &format!("/api/watchlist/{id}"), None, None).await;
        assert_eq!(fetched, updated);
    }

    #[tokio::test]
    async fn test_patch_errors() {
        let app = app();
        let (_, created) = add(&app, None, json!({ "symbol": "SBIN" })).await;
        let id = created["id"].as_str().unwrap();

        let (status, body) = send(
            &app,
            Method::PATCH,
            &format!("/api/watchlist/{id}"),
            None,
            Some(json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Label is required");

        let (status, body) = send(
            &app,
            Method::PATCH,
            "/api/watchlist/does-not-exist",
            None,
            Some(json!({ "label": "x" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Watchlist item not found");

        let (status, _) = send(
            &app,
            Method::PATCH,
            &format!("/api/watchlist/{id}"),
            Some("intruder"),
            Some(json!({ "label": "mine now" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_delete_twice_is_not_found() {
        let app = app();
        let (_, created) = add(&app, None, json!({ "symbol": "ITC" })).await;
        let uri = format!("/api/watchlist/{}", created["id"].as_str().unwrap());

        let (status, body) = send(&app, Method::DELETE, &uri, None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Removed from watchlist");

        let (status, body) = send(&app, Method::DELETE, &uri, None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Watchlist item not found");
    }

    #[tokio::test]
    async fn test_delete_by_other_user_is_forbidden() {
        let app = app();
        let (_, created) = add(&app, Some("owner"), json!({ "symbol": "WIPRO" })).await;
        let uri = format!("/api/watchlist/{}", created["id"].as_str().unwrap());

        let (status, body) = send(&app, Method::DELETE, &uri, Some("intruder"), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Unauthorized");

        let (status, item) = send(&app, Method::GET, &uri, Some("owner"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(item["symbol"], "WIPRO");

        let (status, _) = send(&app, Method::GET, &uri, None, None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_responses_carry_request_id_and_no_store() {
        let app = app();

        let request = Request::builder()
            .uri("/api/watchlist")
            .header("x-request-id", "req-123")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();

        assert_eq!(response.headers()["x-request-id"], "req-123");
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
        assert_eq!(response.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");

        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_malformed_bodies_get_json_errors() {
        let app = app();
        let cases = [
            (Method::POST, "/api/watchlist", true, "not json", StatusCode::BAD_REQUEST),
            (
                Method::POST,
                "/api/watchlist",
                true,
                r#"{"symbol":123}"#,
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                Method::POST,
                "/api/watchlist",
                false,
                r#"{"symbol":"AAA"}"#,
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ),
            (Method::PATCH, "/api/watchlist/x", true, "{", StatusCode::BAD_REQUEST),
        ];

        for (method, uri, json_content_type, body, expected) in cases {
            let mut builder = Request::builder().method(method).uri(uri);
            if json_content_type {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
            }
            let request = builder.body(Body::from(body)).unwrap();

            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), expected, "{uri} {body}");
            assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");

            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let json: Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(json["error"], "Invalid request body");
            assert!(json["message"].as_str().is_some_and(|m| !m.is_empty()));
        }

        let (_, list) = send(&app, Method::GET, "/api/watchlist", None, None).await;
        assert_eq!(list, json!([]));
    }
}
