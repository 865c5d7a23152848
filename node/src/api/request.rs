//! Request-option extraction for the primary endpoint.
//!
//! URL parameters win when they carry a `query`. Otherwise only POST bodies
//! are read, interpreted by content type:
//!
//! | Content type                         | Interpretation                 |
//! |--------------------------------------|--------------------------------|
//! | `application/graphql`                | body is the query text         |
//! | `application/x-www-form-urlencoded`  | `query` / `variables` / `operationName` fields |
//! | anything else                        | JSON object                    |
//!
//! Malformed input yields empty options; the executor then reports the
//! empty document.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{FromRequest, Query, Request};
use axum::http::{header::CONTENT_TYPE, Method, Uri};
use axum::Form;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::executor::GraphQLRequest;

const GRAPHQL: &str = "application/graphql";
const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// JSON body whose `variables` arrived as a JSON-encoded string.
#[derive(Debug, Deserialize)]
struct StringVariables {
    #[serde(default)]
    query: String,
    #[serde(default)]
    variables: String,
    #[serde(default, rename = "operationName")]
    operation_name: Option<String>,
}

fn parse_variables(text: &str) -> Option<Map<String, Value>> {
    serde_json::from_str(text).ok()
}

/// Options from a flat key/value set (URL query or form body). `None`
/// unless `query` is present and non-empty.
fn from_fields(fields: &HashMap<String, String>) -> Option<GraphQLRequest> {
    let query = fields.get("query").filter(|q| !q.is_empty())?;
    Some(GraphQLRequest {
        query: query.clone(),
        variables: fields.get("variables").and_then(|v| parse_variables(v)),
        operation_name: fields.get("operationName").cloned(),
    })
}

fn from_uri(uri: &Uri) -> Option<GraphQLRequest> {
    let Query(params) = Query::<HashMap<String, String>>::try_from_uri(uri).ok()?;
    from_fields(&params)
}

fn from_json(body: &[u8]) -> GraphQLRequest {
    if let Ok(options) = serde_json::from_slice::<GraphQLRequest>(body) {
        return options;
    }
    match serde_json::from_slice::<StringVariables>(body) {
        Ok(compat) => GraphQLRequest {
            query: compat.query,
            variables: parse_variables(&compat.variables),
            operation_name: compat.operation_name,
        },
        Err(e) => {
            debug!(error = %e, "request body is not a JSON request object");
            GraphQLRequest::default()
        }
    }
}

/// The media type of the request without parameters, lowercased.
fn media_type(request: &Request) -> String {
    request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_ascii_lowercase())
        .unwrap_or_default()
}

/// Extracts query, variables and operation name from an inbound request.
pub async fn request_options(request: Request) -> GraphQLRequest {
    if let Some(options) = from_uri(request.uri()) {
        return options;
    }
    if request.method() != Method::POST {
        return GraphQLRequest::default();
    }

    match media_type(&request).as_str() {
        GRAPHQL => match String::from_request(request, &()).await {
            Ok(query) => GraphQLRequest {
                query,
                ..Default::default()
            },
            Err(e) => {
                debug!(error = %e, "unreadable graphql body");
                GraphQLRequest::default()
            }
        },
        FORM_URLENCODED => match Form::<HashMap<String, String>>::from_request(request, &()).await {
            Ok(Form(fields)) => from_fields(&fields).unwrap_or_default(),
            Err(e) => {
                debug!(error = %e, "unreadable form body");
                GraphQLRequest::default()
            }
        },
        _ => match Bytes::from_request(request, &()).await {
            Ok(body) => from_json(&body),
            Err(e) => {
                debug!(error = %e, "unreadable request body");
                GraphQLRequest::default()
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http;
    use serde_json::json;

    fn post(content_type: &str, body: &str) -> Request {
        http::Request::builder()
            .method(Method::POST)
            .uri("/bftx-api")
            .header(CONTENT_TYPE, content_type)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn url_parameters_win() {
        let req = http::Request::builder()
            .method(Method::POST)
            .uri("/bftx-api?query=%7BgetTotal%7D&operationName=T&variables=%7B%22a%22%3A1%7D")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"query":"{ getInfo { Data } }"}"#))
            .unwrap();
        let opts = request_options(req).await;
        assert_eq!(opts.query, "{getTotal}");
        assert_eq!(opts.operation_name.as_deref(), Some("T"));
        assert_eq!(opts.variables.unwrap()["a"], 1);
    }

    #[tokio::test]
    async fn get_without_query_is_empty() {
        let req = http::Request::builder()
            .uri("/bftx-api?foo=bar")
            .body(Body::empty())
            .unwrap();
        assert_eq!(request_options(req).await, GraphQLRequest::default());
    }

    #[tokio::test]
    async fn graphql_body_is_the_query() {
        let opts = request_options(post("application/graphql", "{ getTotal }")).await;
        assert_eq!(opts.query, "{ getTotal }");
        assert!(opts.variables.is_none());
    }

    #[tokio::test]
    async fn form_fields() {
        let opts = request_options(post(
            "application/x-www-form-urlencoded; charset=utf-8",
            "query=%7B+getTotal+%7D&variables=%7B%22id%22%3A%22x%22%7D",
        ))
        .await;
        assert_eq!(opts.query, "{ getTotal }");
        assert_eq!(opts.variables.unwrap()["id"], "x");
    }

    #[tokio::test]
    async fn json_body_with_object_or_string_variables() {
        let body = json!({
            "query": "query Q($id: String) { getTransaction(Id: $id) { Id } }",
            "variables": { "id": "abc" },
            "operationName": "Q",
        });
        let opts = request_options(post("application/json", &body.to_string())).await;
        assert_eq!(opts.variables.unwrap()["id"], "abc");
        assert_eq!(opts.operation_name.as_deref(), Some("Q"));

        let body = json!({ "query": "{ getTotal }", "variables": "{\"id\":\"abc\"}" });
        let opts = request_options(post("text/plain", &body.to_string())).await;
        assert_eq!(opts.query, "{ getTotal }");
        assert_eq!(opts.variables.unwrap()["id"], "abc");
    }

    #[tokio::test]
    async fn malformed_json_is_empty() {
        let opts = request_options(post("application/json", "{not json")).await;
        assert_eq!(opts, GraphQLRequest::default());
    }
}
