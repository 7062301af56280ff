//! Spawns the real router on an ephemeral port with an in-memory store.

#![allow(dead_code)]

use std::sync::Arc;

use opensase_pos::api::auth::hash_password;
use opensase_pos::api::{build_app, AppState, AuthKeys};
use opensase_pos::domain::aggregates::{Role, User, UserDraft};
use opensase_pos::infra::{EventPublisher, InMemoryStore, Store};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::{json, Value};

const JWT_SECRET: &str = "test-secret-test-secret-test-secret";
pub const PASSWORD: &str = "cafe123";

pub struct TestServer {
    pub base_url: String,
    pub store: Arc<InMemoryStore>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub async fn spawn() -> Self {
        let store = Arc::new(InMemoryStore::new());
        for (email, role) in [
            ("admin@cafe.com", Role::Admin),
            ("vendedor@cafe.com", Role::Vendedor),
            ("bodega@cafe.com", Role::Bodeguero),
        ] {
            let draft = UserDraft { email: email.into(), full_name: None, role, is_active: true, password: None };
            store.insert_user(&User::new(&draft, hash_password(PASSWORD).unwrap())).await.unwrap();
        }

        let keys = AuthKeys::new(&SecretString::from(JWT_SECRET.to_string()), 60);
        let app = build_app(AppState::new(store.clone(), keys, EventPublisher::disabled(), 5));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, store, handle }
    }

    pub fn url(&self, path: &str) -> String { format!("{}{}", self.base_url, path) }

    pub async fn login(&self, client: &reqwest::Client, email: &str) -> String {
        let res = client
            .post(self.url("/api/auth/login"))
            .form(&[("username", email), ("password", PASSWORD)])
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = res.json().await.unwrap();
        body["access_token"].as_str().unwrap().to_string()
    }

    pub async fn create_product(&self, client: &reqwest::Client, token: &str, sku: &str, name: &str, price: &str, stock: u32) -> String {
        let res = client
            .post(self.url("/api/products"))
            .bearer_auth(token)
            .json(&json!({ "sku": sku, "name": name, "category": "Café", "price": price, "stock": stock }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        let body: Value = res.json().await.unwrap();
        body["id"].as_str().unwrap().to_string()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub fn money(value: &Value) -> Decimal {
    value.as_str().and_then(|s| s.parse().ok()).unwrap_or_else(|| panic!("not a money string: {value}"))
}

pub fn cents(amount: i64) -> Decimal { Decimal::new(amount, 2) }

pub async fn stock_of(srv: &TestServer, client: &reqwest::Client, token: &str, id: &str) -> u64 {
    let body: Value = client
        .get(srv.url(&format!("/api/products/{id}")))
        .bearer_auth(token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    body["stock"].as_u64().unwrap()
}
