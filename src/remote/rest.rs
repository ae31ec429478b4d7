//! PostgREST (Supabase REST) transport.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use color_eyre::{eyre::eyre, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_RANGE};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::Config;
use crate::error::RemoteError;
use crate::resource::{FieldPatch, Order, Resource};

use super::api_types::ApiError;
use super::RemoteCollection;

/// Ask PostgREST to echo the affected rows back.
const RETURN_REPRESENTATION: &str = "return=representation";

/// Ask for the number of affected rows only, reported in `Content-Range`.
const RETURN_COUNT: &str = "return=minimal, count=exact";

/// Remote collection served over the PostgREST HTTP API.
///
/// One instance can serve any number of resource types; the table is taken
/// from [`Resource::COLLECTION`].
#[derive(Clone)]
pub struct RestCollection {
  http: reqwest::Client,
  rest_root: Url,
}

impl RestCollection {
  /// Create a transport from configuration and environment credentials.
  pub fn new(config: &Config) -> Result<Self> {
    let api_key = Config::get_api_key()?;
    let access_token = Config::get_access_token();

    Self::connect(
      &config.backend.url,
      &api_key,
      access_token.as_deref(),
      config.backend.timeout(),
    )
  }

  /// Create a transport for the project at `url`.
  ///
  /// Requests carry `api_key` as `apikey` and the access token (or the key
  /// itself when there is none) as a bearer token.
  pub fn connect(
    url: &str,
    api_key: &str,
    access_token: Option<&str>,
    timeout: Duration,
  ) -> Result<Self> {
    let mut base = Url::parse(url).map_err(|e| eyre!("Invalid backend URL {}: {}", url, e))?;
    if !base.path().ends_with('/') {
      let path = format!("{}/", base.path());
      base.set_path(&path);
    }
    let rest_root = base
      .join("rest/v1/")
      .map_err(|e| eyre!("Invalid backend URL {}: {}", url, e))?;

    let mut headers = HeaderMap::new();
    let mut key =
      HeaderValue::from_str(api_key).map_err(|e| eyre!("Invalid API key header: {}", e))?;
    key.set_sensitive(true);
    headers.insert("apikey", key);

    let mut bearer = HeaderValue::from_str(&format!("Bearer {}", access_token.unwrap_or(api_key)))
      .map_err(|e| eyre!("Invalid access token header: {}", e))?;
    bearer.set_sensitive(true);
    headers.insert(AUTHORIZATION, bearer);

    let http = reqwest::Client::builder()
      .default_headers(headers)
      .timeout(timeout)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { http, rest_root })
  }

  fn table_url(&self, collection: &'static str) -> Result<Url, RemoteError> {
    self
      .rest_root
      .join(collection)
      .map_err(|e| RemoteError::Transport {
        collection,
        message: format!("invalid collection URL: {}", e),
      })
  }

  /// URL of the row `id`, optionally pinned to a known `updated_at`.
  fn row_url(
    &self,
    collection: &'static str,
    id: &str,
    expected_updated_at: Option<DateTime<Utc>>,
  ) -> Result<Url, RemoteError> {
    let mut url = self.table_url(collection)?;
    {
      let mut query = url.query_pairs_mut();
      query.append_pair("id", &format!("eq.{}", id));
      if let Some(ts) = expected_updated_at {
        query.append_pair(
          "updated_at",
          &format!("eq.{}", ts.to_rfc3339_opts(SecondsFormat::Micros, true)),
        );
      }
    }
    Ok(url)
  }

  /// Send a request and turn non-2xx answers into [`RemoteError::Rejected`].
  async fn send(
    &self,
    collection: &'static str,
    request: RequestBuilder,
  ) -> Result<Response, RemoteError> {
    let response = request.send().await.map_err(|e| RemoteError::Transport {
      collection,
      message: e.to_string(),
    })?;

    let status = response.status();
    if status.is_success() {
      return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let (code, message) = match serde_json::from_str::<ApiError>(&body) {
      Ok(api_error) => (api_error.code.clone(), api_error.into_message()),
      Err(_) => (
        None,
        format!(
          "{} {}",
          status.as_u16(),
          status.canonical_reason().unwrap_or("request failed")
        ),
      ),
    };

    debug!(collection, status = status.as_u16(), %message, "request rejected");
    Err(RemoteError::Rejected {
      status: status.as_u16(),
      code,
      message,
    })
  }

  async fn rows<R: DeserializeOwned>(
    collection: &'static str,
    response: Response,
  ) -> Result<Vec<R>, RemoteError> {
    response
      .json::<Vec<R>>()
      .await
      .map_err(|e| RemoteError::Decode {
        collection,
        message: e.to_string(),
      })
  }
}

#[async_trait]
impl<T: Resource> RemoteCollection<T> for RestCollection {
  async fn select(&self, order: Order) -> Result<Vec<T>, RemoteError> {
    let mut url = self.table_url(T::COLLECTION)?;
    url
      .query_pairs_mut()
      .append_pair("select", "*")
      .append_pair(
        "order",
        &format!(
          "{}.{}",
          order.column,
          if order.descending { "desc" } else { "asc" }
        ),
      );

    debug!(%url, "GET");
    let response = self.send(T::COLLECTION, self.http.get(url)).await?;
    Self::rows(T::COLLECTION, response).await
  }

  async fn insert(&self, draft: &T::Draft) -> Result<T, RemoteError> {
    let url = self.table_url(T::COLLECTION)?;

    debug!(%url, "POST");
    let request = self
      .http
      .post(url)
      .header("Prefer", RETURN_REPRESENTATION)
      .json(draft);
    let response = self.send(T::COLLECTION, request).await?;

    let mut rows: Vec<T> = Self::rows(T::COLLECTION, response).await?;
    if rows.len() != 1 {
      return Err(RemoteError::Decode {
        collection: T::COLLECTION,
        message: format!("expected one created row, got {}", rows.len()),
      });
    }
    Ok(rows.remove(0))
  }

  async fn update(
    &self,
    id: &str,
    patch: &T::Patch,
    expected_updated_at: Option<DateTime<Utc>>,
  ) -> Result<T, RemoteError> {
    let mut url = self.row_url(T::COLLECTION, id, expected_updated_at)?;

    // PostgREST answers an empty PATCH with no rows, so read the row instead.
    let request = if patch.is_empty() {
      url.query_pairs_mut().append_pair("select", "*");
      debug!(%url, "GET (empty patch)");
      self.http.get(url)
    } else {
      debug!(%url, "PATCH");
      self
        .http
        .patch(url)
        .header("Prefer", RETURN_REPRESENTATION)
        .json(patch)
    };
    let response = self.send(T::COLLECTION, request).await?;

    let rows: Vec<T> = Self::rows(T::COLLECTION, response).await?;
    match rows.into_iter().next() {
      Some(row) => Ok(row),
      None if expected_updated_at.is_some() => Err(RemoteError::Conflict {
        collection: T::COLLECTION,
        id: id.to_string(),
      }),
      None => Err(RemoteError::NotFound {
        collection: T::COLLECTION,
        id: id.to_string(),
      }),
    }
  }

  async fn delete(
    &self,
    id: &str,
    expected_updated_at: Option<DateTime<Utc>>,
  ) -> Result<usize, RemoteError> {
    let url = self.row_url(T::COLLECTION, id, expected_updated_at)?;

    // The count covers rows the caller may delete but not read back.
    debug!(%url, "DELETE");
    let request = self.http.delete(url).header("Prefer", RETURN_COUNT);
    let response = self.send(T::COLLECTION, request).await?;

    let content_range = response
      .headers()
      .get(CONTENT_RANGE)
      .and_then(|value| value.to_str().ok());
    let removed = content_range
      .and_then(range_total)
      .ok_or_else(|| RemoteError::Decode {
        collection: T::COLLECTION,
        message: format!(
          "missing or invalid Content-Range: {}",
          content_range.unwrap_or("<none>")
        ),
      })?;

    if removed == 0 && expected_updated_at.is_some() {
      return Err(RemoteError::Conflict {
        collection: T::COLLECTION,
        id: id.to_string(),
      });
    }
    Ok(removed)
  }
}

/// Total from a PostgREST `Content-Range` value such as `*/1` or `0-9/10`.
fn range_total(content_range: &str) -> Option<usize> {
  content_range.rsplit_once('/')?.1.trim().parse().ok()
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  fn collection(url: &str) -> RestCollection {
    RestCollection::connect(url, "anon-key", None, Duration::from_secs(5)).unwrap()
  }

  #[test]
  fn test_rest_root_keeps_base_path() {
    let rest = collection("https://example.supabase.co");
    assert_eq!(
      rest.table_url("notes").unwrap().as_str(),
      "https://example.supabase.co/rest/v1/notes"
    );

    let proxied = collection("http://localhost:8000/api");
    assert_eq!(
      proxied.table_url("notes").unwrap().as_str(),
      "http://localhost:8000/api/rest/v1/notes"
    );
  }

  #[test]
  fn test_row_url_filters() {
    let rest = collection("https://example.supabase.co/");
    let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

    let url = rest.row_url("notes", "n1", Some(ts)).unwrap();
    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    assert_eq!(
      pairs,
      vec![
        ("id".to_string(), "eq.n1".to_string()),
        (
          "updated_at".to_string(),
          "eq.2024-03-01T12:00:00.000000Z".to_string()
        ),
      ]
    );
  }

  #[test]
  fn test_range_total() {
    assert_eq!(range_total("*/1"), Some(1));
    assert_eq!(range_total("*/0"), Some(0));
    assert_eq!(range_total("0-9/10"), Some(10));
    assert_eq!(range_total("*/*"), None);
    assert_eq!(range_total("garbage"), None);
  }

  #[test]
  fn test_invalid_url_is_rejected() {
    assert!(RestCollection::connect("not a url", "k", None, Duration::from_secs(1)).is_err());
  }
}
