#![allow(dead_code)]

use std::sync::Arc;

use bibsync::cache::SqliteStorage;
use bibsync::remote::RemoteGateway;
use bibsync::repository::{Entity, Repository};
use serde_json::{json, Value};
use url::Url;

/// Nothing listens on the discard port, so connections are refused at once.
pub const UNREACHABLE: &str = "http://127.0.0.1:9/api";

pub fn store() -> Arc<SqliteStorage> {
  Arc::new(SqliteStorage::in_memory().unwrap())
}

pub fn repository<E: Entity>(
  base: &str,
  collection: &str,
  store: Arc<SqliteStorage>,
) -> Repository<E, SqliteStorage> {
  let base = Url::parse(base).unwrap();
  let gateway = RemoteGateway::new(reqwest::Client::new(), &base, collection).unwrap();
  Repository::new(gateway, store)
}

/// Body of a successful backend response.
pub fn ok(data: Value) -> Value {
  json!({ "success": true, "data": data })
}
