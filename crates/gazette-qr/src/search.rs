//! Gazette index client.
//!
//! The index answers every lookup with one of three JSON shapes:
//!
//! - `null`: nothing matched
//! - a bare string: the index corrected the query and redirected internally;
//!   the data lives at the resolved location of the response
//! - an array of items carrying `prenom` / `nom`
//!
//! All lookups go through [`SearchClient::query_items`], which classifies the
//! reply, follows at most one redirect marker, and normalizes the items.
//! Failures never reach callers: they are logged and turned into an empty
//! list, which callers read as "not found".

use std::future::Future;
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Query marker asking the index for a JSON body.
const FORMAT_KEY: &str = "format";
const FORMAT_JSON: &str = "JSON";

/// A person entry returned by the gazette index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedItem {
    /// First name (`prenom` on the wire).
    pub given_name: String,
    /// Last name (`nom` on the wire).
    pub family_name: String,
}

impl ResolvedItem {
    /// Display label, "given family".
    pub fn label(&self) -> String {
        format!("{} {}", self.given_name, self.family_name)
    }
}

/// An organisation known to the index by its Wikidata identifier.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct OrganisationIdentity {
    /// Display name.
    pub name: String,
    /// Wikidata identifier, as returned by the index.
    pub id: String,
}

/// Raw item as it appears in index replies. Extra fields are ignored.
#[derive(Debug, Default, Deserialize)]
struct RawItem {
    #[serde(default)]
    prenom: Option<String>,
    #[serde(default)]
    nom: Option<String>,
}

/// Lookups the follow resolver needs from the gazette index.
pub trait GazetteIndex: Send + Sync {
    /// Entries for a person, by (normalized) name. Follows one redirect marker.
    fn search_by_person_name(&self, name: &str)
    -> impl Future<Output = Vec<ResolvedItem>> + Send;

    /// Entries carrying a function tag, optionally with an exact tag value.
    fn search_by_tag(
        &self,
        tag: &str,
        tag_value: Option<&str>,
    ) -> impl Future<Output = Vec<ResolvedItem>> + Send;

    /// Entries published for an organisation.
    fn search_by_organisation(
        &self,
        wikidata_id: &str,
    ) -> impl Future<Output = Vec<ResolvedItem>> + Send;

    /// Display names registered for an organisation identifier.
    fn resolve_organisation_names(
        &self,
        wikidata_id: &str,
    ) -> impl Future<Output = Vec<OrganisationIdentity>> + Send;
}

/// Failure talking to the index. Never leaves this module.
#[derive(Debug, thiserror::Error)]
enum SearchError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed body: {0}")]
    Body(#[from] serde_json::Error),

    #[error("cannot build index URL from {0}")]
    InvalidUrl(String),
}

/// Classified index reply.
#[derive(Debug)]
enum IndexReply {
    Empty,
    Redirect(Url),
    Items(Vec<ResolvedItem>),
}

/// HTTP client for the gazette index.
#[derive(Debug, Clone)]
pub struct SearchClient {
    http: reqwest::Client,
    base_url: Url,
}

impl SearchClient {
    /// Create a client for the index at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url)?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url })
    }

    /// Build `{base}/{segments...}`. Segments are percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, SearchError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| SearchError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Build a JSON-format lookup URL.
    fn lookup_url(&self, segments: &[&str]) -> Result<Url, SearchError> {
        let mut url = self.endpoint(segments)?;
        url.query_pairs_mut().append_pair(FORMAT_KEY, FORMAT_JSON);
        Ok(url)
    }

    /// Query the index and normalize the reply.
    ///
    /// With `follow_redirect`, a redirect marker triggers exactly one
    /// follow-up request against the resolved location; whatever that request
    /// returns is final.
    async fn query_items(
        &self,
        url: Result<Url, SearchError>,
        follow_redirect: bool,
    ) -> Vec<ResolvedItem> {
        let url = match url {
            Ok(url) => url,
            Err(err) => {
                tracing::warn!(error = %err, "gazette index lookup skipped");
                return Vec::new();
            }
        };

        match self.fetch_reply(url.clone()).await {
            Ok(IndexReply::Items(items)) => items,
            Ok(IndexReply::Empty) => Vec::new(),
            Ok(IndexReply::Redirect(location)) if follow_redirect => {
                let location = with_format_marker(location);
                tracing::debug!(from = %url, to = %location, "following index redirect");
                match self.fetch_reply(location.clone()).await {
                    Ok(IndexReply::Items(items)) => items,
                    Ok(_) => Vec::new(),
                    Err(err) => {
                        tracing::warn!(url = %location, error = %err, "gazette index lookup failed");
                        Vec::new()
                    }
                }
            }
            Ok(IndexReply::Redirect(_)) => Vec::new(),
            Err(err) => {
                tracing::warn!(url = %url, error = %err, "gazette index lookup failed");
                Vec::new()
            }
        }
    }

    /// Issue one GET and classify the body.
    async fn fetch_reply(&self, url: Url) -> Result<IndexReply, SearchError> {
        let response = self.http.get(url).send().await?.error_for_status()?;
        let location = response.url().clone();
        let bytes = response.bytes().await?;
        let body: Value = serde_json::from_slice(&bytes)?;
        Ok(classify(body, location))
    }
}

impl GazetteIndex for SearchClient {
    async fn search_by_person_name(&self, name: &str) -> Vec<ResolvedItem> {
        let items = self.query_items(self.lookup_url(&["name", name]), true).await;
        tracing::debug!(name = %name, results = items.len(), "person lookup");
        items
    }

    async fn search_by_tag(&self, tag: &str, tag_value: Option<&str>) -> Vec<ResolvedItem> {
        let segment = match tag_value {
            Some(value) => format!("{tag}=\"{value}\""),
            None => tag.to_string(),
        };
        let items = self.query_items(self.lookup_url(&["tag", &segment]), false).await;
        tracing::debug!(tag = %segment, results = items.len(), "tag lookup");
        items
    }

    async fn search_by_organisation(&self, wikidata_id: &str) -> Vec<ResolvedItem> {
        let id = wikidata_id.to_uppercase();
        let items = self.query_items(self.lookup_url(&[&id]), false).await;
        tracing::debug!(organisation = %id, results = items.len(), "organisation lookup");
        items
    }

    async fn resolve_organisation_names(&self, wikidata_id: &str) -> Vec<OrganisationIdentity> {
        let id = wikidata_id.to_uppercase();
        let result = async {
            let mut url = self.endpoint(&["wikidata_id_to_name"])?;
            url.query_pairs_mut().append_pair("ids[]", &id);
            let response = self.http.get(url).send().await?.error_for_status()?;
            let bytes = response.bytes().await?;
            let entries: Vec<Value> = serde_json::from_slice(&bytes)?;
            Ok::<_, SearchError>(entries)
        }
        .await;

        match result {
            Ok(entries) => {
                let identities: Vec<OrganisationIdentity> = entries
                    .into_iter()
                    .filter_map(|v| serde_json::from_value(v).ok())
                    .collect();
                tracing::debug!(organisation = %id, results = identities.len(), "organisation names");
                identities
            }
            Err(err) => {
                tracing::warn!(organisation = %id, error = %err, "organisation name lookup failed");
                Vec::new()
            }
        }
    }
}

/// Map a parsed body onto the three reply shapes.
fn classify(body: Value, location: Url) -> IndexReply {
    match body {
        Value::Null => IndexReply::Empty,
        Value::String(_) => IndexReply::Redirect(location),
        Value::Array(entries) => IndexReply::Items(normalize_items(entries)),
        other => {
            tracing::debug!(kind = json_kind(&other), "unexpected index reply shape");
            IndexReply::Empty
        }
    }
}

/// Keep the entries that carry both a first and a last name.
fn normalize_items(entries: Vec<Value>) -> Vec<ResolvedItem> {
    entries
        .into_iter()
        .filter_map(|entry| serde_json::from_value::<RawItem>(entry).ok())
        .filter_map(|raw| match (raw.prenom, raw.nom) {
            (Some(given), Some(family)) if !given.trim().is_empty() && !family.trim().is_empty() => {
                Some(ResolvedItem {
                    given_name: given,
                    family_name: family,
                })
            }
            _ => None,
        })
        .collect()
}

/// Append `format=JSON` unless a format is already requested.
/// Force `format=JSON` on a redirect target, replacing any other format.
fn with_format_marker(mut url: Url) -> Url {
    let mut formats = url.query_pairs().filter(|(k, _)| k == FORMAT_KEY);
    if matches!((formats.next(), formats.next()), (Some((_, v)), None) if v == FORMAT_JSON) {
        return url;
    }

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != FORMAT_KEY)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(FORMAT_KEY, FORMAT_JSON);
    url
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::Router;
    use axum::extract::{Path, Query, State};
    use axum::response::{IntoResponse, Redirect};
    use axum::routing::get;
    use serde_json::json;

    type Hits = Arc<AtomicUsize>;

    /// Serve `router` on an ephemeral port and return its base URL.
    async fn spawn_index(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn client(base: &str) -> SearchClient {
        SearchClient::new(base, Duration::from_secs(5)).unwrap()
    }

    fn item(given: &str, family: &str) -> ResolvedItem {
        ResolvedItem {
            given_name: given.to_string(),
            family_name: family.to_string(),
        }
    }

    #[test]
    fn null_reply_is_empty() {
        let url = Url::parse("http://index/name/x").unwrap();
        assert!(matches!(classify(Value::Null, url), IndexReply::Empty));
    }

    #[test]
    fn string_reply_is_redirect_to_location() {
        let url = Url::parse("http://index/name/Jean%20Dupont").unwrap();
        match classify(json!("Jean Dupont"), url.clone()) {
            IndexReply::Redirect(location) => assert_eq!(location, url),
            other => panic!("expected redirect, got {other:?}"),
        }
    }

    #[test]
    fn object_reply_is_empty() {
        let url = Url::parse("http://index/x").unwrap();
        assert!(matches!(
            classify(json!({"error": "nope"}), url),
            IndexReply::Empty
        ));
    }

    #[test]
    fn item_missing_family_name_is_dropped() {
        assert!(normalize_items(vec![json!({"prenom": "A"})]).is_empty());
    }

    #[test]
    fn bad_items_do_not_invalidate_batch() {
        let items = normalize_items(vec![
            json!({"prenom": "Jean", "nom": "Dupont", "organisations": [], "date": "2024-01-01"}),
            json!({"prenom": "", "nom": "Vide"}),
            json!({"prenom": 12, "nom": "Nombre"}),
            json!("stray string"),
            json!({"nom": "Seul"}),
            json!({"prenom": "Marie", "nom": "Curie"}),
        ]);
        assert_eq!(items, vec![item("Jean", "Dupont"), item("Marie", "Curie")]);
    }

    #[test]
    fn format_marker_added_once() {
        let url = with_format_marker(Url::parse("http://index/name/A%20B").unwrap());
        assert_eq!(url.as_str(), "http://index/name/A%20B?format=JSON");

        let url = with_format_marker(Url::parse("http://index/name/A?format=JSON").unwrap());
        assert_eq!(url.as_str(), "http://index/name/A?format=JSON");
    }

    #[test]
    fn format_marker_replaces_other_formats() {
        let url =
            with_format_marker(Url::parse("http://index/name/A?format=HTML&page=2").unwrap());
        assert_eq!(url.as_str(), "http://index/name/A?page=2&format=JSON");

        let url = with_format_marker(
            Url::parse("http://index/name/A?format=JSON&format=HTML").unwrap(),
        );
        assert_eq!(url.as_str(), "http://index/name/A?format=JSON");
    }

    #[test]
    fn lookup_url_encodes_segments() {
        let client = client("http://index.test/");
        let url = client.lookup_url(&["name", "Jean Dupont"]).unwrap();
        assert_eq!(url.as_str(), "http://index.test/name/Jean%20Dupont?format=JSON");
    }

    #[tokio::test]
    async fn person_lookup_returns_items() {
        let router = Router::new().route(
            "/name/{name}",
            get(|Path(name): Path<String>| async move {
                assert_eq!(name, "Jean Dupont");
                axum::Json(json!([{"prenom": "Jean", "nom": "Dupont"}, {"prenom": "X"}]))
            }),
        );
        let base = spawn_index(router).await;

        let items = client(&base).search_by_person_name("Jean Dupont").await;
        assert_eq!(items, vec![item("Jean", "Dupont")]);
    }

    #[tokio::test]
    async fn person_lookup_null_is_empty() {
        let router = Router::new().route(
            "/name/{name}",
            get(|| async { axum::Json(Value::Null) }),
        );
        let base = spawn_index(router).await;

        assert!(client(&base).search_by_person_name("Jean Dupont").await.is_empty());
    }

    /// `/name/Dupont Jean` redirects to `/name/Jean Dupont` without the format
    /// marker; the redirect target answers with a bare string unless asked
    /// for JSON.
    #[tokio::test]
    async fn redirect_marker_followed_once() {
        let hits: Hits = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route(
                "/name/{name}",
                get(
                    |State(hits): State<Hits>,
                     Path(name): Path<String>,
                     Query(query): Query<HashMap<String, String>>| async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        let json_format = query.get("format").map(String::as_str) == Some("JSON");
                        match (name.as_str(), json_format) {
                            ("Dupont Jean", _) => {
                                Redirect::temporary("/name/Jean%20Dupont").into_response()
                            }
                            ("Jean Dupont", false) => axum::Json(json!("Jean Dupont")).into_response(),
                            ("Jean Dupont", true) => {
                                axum::Json(json!([{"prenom": "Jean", "nom": "Dupont"}]))
                                    .into_response()
                            }
                            _ => axum::Json(Value::Null).into_response(),
                        }
                    },
                ),
            )
            .with_state(hits.clone());
        let base = spawn_index(router).await;

        let items = client(&base).search_by_person_name("Dupont Jean").await;
        assert_eq!(items, vec![item("Jean", "Dupont")]);
        // redirect source, redirect target, follow-up
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn redirect_to_html_format_is_followed_as_json() {
        let router = Router::new().route(
            "/name/{name}",
            get(
                |Path(name): Path<String>, Query(query): Query<HashMap<String, String>>| async move {
                    let format = query.get("format").map(String::as_str);
                    match (name.as_str(), format) {
                        ("Dupont Jean", _) => {
                            Redirect::temporary("/name/Jean%20Dupont?format=HTML").into_response()
                        }
                        ("Jean Dupont", Some("JSON")) => {
                            axum::Json(json!([{"prenom": "Jean", "nom": "Dupont"}])).into_response()
                        }
                        _ => axum::Json(json!("Jean Dupont")).into_response(),
                    }
                },
            ),
        );
        let base = spawn_index(router).await;

        let items = client(&base).search_by_person_name("Dupont Jean").await;
        assert_eq!(items, vec![item("Jean", "Dupont")]);
    }

    #[tokio::test]
    async fn second_redirect_marker_is_no_result() {
        let hits: Hits = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route(
                "/name/{name}",
                get(|State(hits): State<Hits>| async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    axum::Json(json!("always a string"))
                }),
            )
            .with_state(hits.clone());
        let base = spawn_index(router).await;

        let items = client(&base).search_by_person_name("Jean Dupont").await;
        assert!(items.is_empty());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn tag_lookup_does_not_follow_redirect_marker() {
        let hits: Hits = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route(
                "/tag/{tag}",
                get(|State(hits): State<Hits>| async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    axum::Json(json!("redirected"))
                }),
            )
            .with_state(hits.clone());
        let base = spawn_index(router).await;

        assert!(client(&base).search_by_tag("ambassadeur", None).await.is_empty());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn tag_value_is_quoted() {
        let router = Router::new().route(
            "/tag/{tag}",
            get(|Path(tag): Path<String>| async move {
                if tag == "ministre=\"Premier ministre\"" {
                    axum::Json(json!([{"prenom": "Michel", "nom": "Barnier"}]))
                } else {
                    axum::Json(Value::Null)
                }
            }),
        );
        let base = spawn_index(router).await;
        let client = client(&base);

        let items = client.search_by_tag("ministre", Some("Premier ministre")).await;
        assert_eq!(items, vec![item("Michel", "Barnier")]);
        assert!(client.search_by_tag("ministre", None).await.is_empty());
    }

    #[tokio::test]
    async fn organisation_lookup_uppercases_identifier() {
        let router = Router::new().route(
            "/{id}",
            get(|Path(id): Path<String>| async move {
                if id == "Q109039648" {
                    axum::Json(json!([{"prenom": "Anne", "nom": "Martin"}]))
                } else {
                    axum::Json(Value::Null)
                }
            }),
        );
        let base = spawn_index(router).await;

        let items = client(&base).search_by_organisation("q109039648").await;
        assert_eq!(items, vec![item("Anne", "Martin")]);
    }

    #[tokio::test]
    async fn organisation_names_lookup() {
        let router = Router::new().route(
            "/wikidata_id_to_name",
            get(|Query(query): Query<HashMap<String, String>>| async move {
                match query.get("ids[]").map(String::as_str) {
                    Some("Q42") => axum::Json(json!([
                        {"name": "Conseil d'Etat", "id": "Q42"},
                        {"id": "Q42"}
                    ])),
                    _ => axum::Json(json!([])),
                }
            }),
        );
        let base = spawn_index(router).await;
        let client = client(&base);

        let names = client.resolve_organisation_names("q42").await;
        assert_eq!(
            names,
            vec![OrganisationIdentity {
                name: "Conseil d'Etat".to_string(),
                id: "Q42".to_string(),
            }]
        );
        assert!(client.resolve_organisation_names("Q1").await.is_empty());
    }

    #[tokio::test]
    async fn server_error_degrades_to_empty() {
        let router = Router::new().route(
            "/name/{name}",
            get(|| async { (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let base = spawn_index(router).await;

        assert!(client(&base).search_by_person_name("Jean Dupont").await.is_empty());
    }

    #[tokio::test]
    async fn malformed_body_degrades_to_empty() {
        let router = Router::new().route("/{id}", get(|| async { "<html>not json</html>" }));
        let base = spawn_index(router).await;

        assert!(client(&base).search_by_organisation("Q1").await.is_empty());
        assert!(client(&base).resolve_organisation_names("Q1").await.is_empty());
    }

    #[tokio::test]
    async fn unreachable_index_degrades_to_empty() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client = client(&format!("http://{addr}"));

        assert!(client.search_by_person_name("Jean Dupont").await.is_empty());
        assert!(client.search_by_tag("ambassadeur", None).await.is_empty());
        assert!(client.search_by_organisation("Q1").await.is_empty());
        assert!(client.resolve_organisation_names("Q1").await.is_empty());
    }
}
