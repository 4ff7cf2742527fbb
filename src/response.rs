//! Success envelopes: `{"data": ...}` for one item, `{"data": [...], "meta": {"count": n}}` for lists.

use axum::{http::StatusCode, Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct SuccessOne<T> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

#[derive(Serialize)]
pub struct SuccessMany<T> {
    pub data: Vec<T>,
    pub meta: MetaCount,
}

#[derive(Serialize)]
pub struct MetaCount {
    pub count: u64,
}

pub type One<T> = (StatusCode, Json<SuccessOne<T>>);
pub type Many<T> = (StatusCode, Json<SuccessMany<T>>);

pub fn created<T: Serialize>(data: T) -> One<T> {
    (StatusCode::CREATED, Json(SuccessOne { data, meta: None }))
}

pub fn ok<T: Serialize>(data: T) -> One<T> {
    (StatusCode::OK, Json(SuccessOne { data, meta: None }))
}

pub fn many<T: Serialize>(data: Vec<T>) -> Many<T> {
    let count = data.len() as u64;
    (
        StatusCode::OK,
        Json(SuccessMany {
            data,
            meta: MetaCount { count },
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_envelope_counts_items() {
        let (status, Json(body)) = many(vec![1, 2, 3]);
        assert_eq!(status, StatusCode::OK);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["meta"]["count"], 3);
        assert_eq!(json["data"][2], 3);
    }

    #[test]
    fn single_envelope_omits_empty_meta() {
        let (status, Json(body)) = created("x");
        assert_eq!(status, StatusCode::CREATED);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({"data": "x"}));
    }
}
