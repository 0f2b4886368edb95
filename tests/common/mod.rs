#![allow(dead_code)]

use std::sync::{Arc, Once};

use recipe_api::{
    api, context::Context, cryptography::Hasher, media::MediaStorage, memory::MemoryStore,
    session::TokenLifetime, store::Store,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use warp::{http::StatusCode, Filter, Reply};

static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

/// An in-memory application plus the temp dir holding its media.
pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub ctx: Context,
    pub media_dir: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        init_test_logging();

        let store = Arc::new(MemoryStore::new());
        let media_dir = tempfile::tempdir().expect("temp media dir");
        let ctx = Context::new(
            store.clone() as Arc<dyn Store>,
            Hasher::new(true),
            MediaStorage::new(media_dir.path(), "/media/"),
        );

        Self {
            store,
            ctx,
            media_dir,
        }
    }

    pub fn with_token_lifetime(mut self, lifetime: TokenLifetime) -> Self {
        self.ctx = self.ctx.with_token_lifetime(lifetime);
        self
    }

    pub fn filter(
        &self,
    ) -> impl Filter<Extract = (impl Reply,), Error = std::convert::Infallible> + Clone {
        api::routes(self.ctx.clone())
    }

    /// Registers an account and returns an `Authorization` header value for it.
    pub async fn login(&self, email: &str, password: &str) -> String {
        let filter = self.filter();

        let res = warp::test::request()
            .method("POST")
            .path("/users/create")
            .json(&json!({ "email": email, "password": password, "first_name": "Test" }))
            .reply(&filter)
            .await;
        assert_eq!(res.status(), StatusCode::CREATED, "{:?}", res.body());

        let res = warp::test::request()
            .method("POST")
            .path("/users/token")
            .json(&json!({ "email": email, "password": password }))
            .reply(&filter)
            .await;
        assert_eq!(res.status(), StatusCode::OK, "{:?}", res.body());

        let token = body(&res)["token"].as_str().expect("token").to_string();
        format!("Token {token}")
    }

    pub async fn request(
        &self,
        method: &str,
        path: &str,
        auth: Option<&str>,
        payload: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = warp::test::request().method(method).path(path);
        if let Some(auth) = auth {
            req = req.header("authorization", auth);
        }
        if let Some(payload) = payload {
            req = req.json(&payload);
        }

        let res = req.reply(&self.filter()).await;
        (res.status(), body(&res))
    }
}

pub fn body(res: &warp::http::Response<bytes::Bytes>) -> Value {
    if res.body().is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(res.body()).expect("json body")
}

/// Ids of a JSON array of objects, in order.
pub fn ids(value: &Value) -> Vec<i64> {
    value
        .as_array()
        .expect("array")
        .iter()
        .map(|item| item["id"].as_i64().expect("id"))
        .collect()
}

pub fn names(value: &Value) -> Vec<String> {
    value
        .as_array()
        .expect("array")
        .iter()
        .map(|item| item["name"].as_str().expect("name").to_string())
        .collect()
}
