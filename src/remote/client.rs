use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::warn;
use url::Url;

use super::api_types::ApiEnvelope;
use super::error::{GatewayError, GatewayResult};

/// HTTP access to one REST collection endpoint (e.g. `/api/livros`).
///
/// Stateless: every call is a single request, failures are returned and
/// never retried.
#[derive(Clone, Debug)]
pub struct RemoteGateway {
  client: Client,
  endpoint: Url,
}

impl RemoteGateway {
  /// Build a gateway for `collection` under `base` (e.g. `https://host/api`).
  pub fn new(client: Client, base: &Url, collection: &str) -> GatewayResult<Self> {
    let mut endpoint = base.clone();
    endpoint
      .path_segments_mut()
      .map_err(|_| GatewayError::Url(base.to_string()))?
      .pop_if_empty()
      .push(collection);

    Ok(Self { client, endpoint })
  }

  pub fn endpoint(&self) -> &Url {
    &self.endpoint
  }

  /// Lightweight reachability check (HEAD on the collection).
  pub async fn probe(&self) -> GatewayResult<()> {
    let response = self
      .client
      .request(Method::HEAD, self.endpoint.clone())
      .send()
      .await?;

    match response.status() {
      status if status.is_success() => Ok(()),
      StatusCode::NOT_FOUND => Err(GatewayError::NotFound),
      status => Err(GatewayError::Status {
        status,
        body: String::new(),
      }),
    }
  }

  /// List the whole collection.
  pub async fn list<T: DeserializeOwned>(&self) -> GatewayResult<Vec<T>> {
    self.list_with(&[], &[]).await
  }

  /// List a filtered view: extra path segments and/or query parameters.
  ///
  /// Items are decoded one by one; an item that does not decode is logged
  /// and skipped instead of failing the whole list.
  pub async fn list_with<T: DeserializeOwned>(
    &self,
    segments: &[&str],
    query: &[(&str, &str)],
  ) -> GatewayResult<Vec<T>> {
    let url = self.url_for(segments)?;
    let items: Vec<Value> = self.send(self.client.get(url).query(query)).await?;

    Ok(
      items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
          Ok(record) => Some(record),
          Err(e) => {
            warn!(endpoint = %self.endpoint, error = %e, "skipping undecodable record");
            None
          }
        })
        .collect(),
    )
  }

  /// Get a single record by id.
  pub async fn get<T: DeserializeOwned>(&self, id: &str) -> GatewayResult<T> {
    let url = self.url_for(&[id])?;
    self.send(self.client.get(url)).await
  }

  /// Create a record (POST to the collection).
  pub async fn create<B, T>(&self, body: &B) -> GatewayResult<T>
  where
    B: Serialize + ?Sized,
    T: DeserializeOwned,
  {
    self
      .send(self.client.post(self.endpoint.clone()).json(body))
      .await
  }

  /// Replace a record (PUT by id).
  pub async fn replace<B, T>(&self, id: &str, body: &B) -> GatewayResult<T>
  where
    B: Serialize + ?Sized,
    T: DeserializeOwned,
  {
    let url = self.url_for(&[id])?;
    self.send(self.client.put(url).json(body)).await
  }

  /// Invoke an action sub-resource (PATCH `/{id}/{action}`).
  pub async fn patch_action<B, T>(&self, id: &str, action: &str, body: &B) -> GatewayResult<T>
  where
    B: Serialize + ?Sized,
    T: DeserializeOwned,
  {
    let url = self.url_for(&[id, action])?;
    self.send(self.client.patch(url).json(body)).await
  }

  /// Delete a record by id.
  pub async fn delete(&self, id: &str) -> GatewayResult<()> {
    let url = self.url_for(&[id])?;
    self
      .send::<Value>(self.client.delete(url))
      .await
      .map(|_| ())
  }

  fn url_for(&self, segments: &[&str]) -> GatewayResult<Url> {
    let mut url = self.endpoint.clone();
    url
      .path_segments_mut()
      .map_err(|_| GatewayError::Url(self.endpoint.to_string()))?
      .extend(segments);
    Ok(url)
  }

  /// Send a request and unwrap the `{ success, data }` envelope.
  async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> GatewayResult<T> {
    let response = request
      .header(reqwest::header::ACCEPT, "application/json")
      .send()
      .await?;

    let status = response.status();
    if status == StatusCode::NOT_FOUND {
      return Err(GatewayError::NotFound);
    }

    let body = response.bytes().await?;
    if !status.is_success() {
      return Err(GatewayError::Status {
        status,
        body: String::from_utf8_lossy(&body).into_owned(),
      });
    }

    let envelope: ApiEnvelope<T> = serde_json::from_slice(&body)?;
    if !envelope.success {
      return Err(GatewayError::Rejected(
        envelope
          .message
          .unwrap_or_else(|| "success=false".to_string()),
      ));
    }

    match envelope.data {
      Some(data) => Ok(data),
      // DELETE answers commonly omit `data`
      None => serde_json::from_value(Value::Null).map_err(GatewayError::from),
    }
  }
}
