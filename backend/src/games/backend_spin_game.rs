use axum::{
    debug_handler,
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use sha2::Sha256;
use shared::constants::{SESSION_SPIN_CAP, SPIN_COST, SPIN_ENDPOINT, SPIN_PRIZES_ENDPOINT, TICKET_CAP};
use shared::shared_spin_game::*;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::error::Error;
use crate::services::spin_recorder::SpinRecord;
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route(SPIN_ENDPOINT, post(spin))
        .route(SPIN_PRIZES_ENDPOINT, get(get_prizes))
}

/// Signs `wallet:label:newBalance:timestamp` so a client can show the result
/// was issued by this server.
fn sign_receipt(secret: &str, message: &str) -> Result<String, Error> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| {
        error!("Failed to key receipt signature: {}", e);
        Error::Receipt
    })?;
    mac.update(message.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[debug_handler]
async fn spin(
    State(state): State<AppState>,
    payload: Result<Json<SpinRequest>, JsonRejection>,
) -> Result<Json<SpinResponse>, Error> {
    let Json(request) = payload.map_err(|rejection| {
        debug!("Unreadable spin body: {}", rejection);
        SpinRejection::MissingFields
    })?;

    let claim = request.validate().map_err(|rejection| {
        debug!("Spin rejected: {}", rejection.message());
        rejection
    })?;

    let prize = state.prizes.draw(&mut OsRng).clone();
    let new_balance = claim.new_balance();
    let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    let receipt = sign_receipt(
        &state.receipt_secret,
        &format!("{}:{}:{}:{}", claim.wallet, prize.label, new_balance, timestamp),
    )?;

    let record = SpinRecord {
        id: Uuid::new_v4(),
        wallet: claim.wallet.clone(),
        prize: prize.clone(),
        claimed_tickets: claim.tickets.clone(),
        new_balance: new_balance.clone(),
        timestamp: timestamp.clone(),
    };
    state.recorder.record(&record).await;

    info!(
        wallet = %claim.wallet,
        rarity = %prize.rarity,
        balance = %format!("{} -> {}", claim.tickets, new_balance),
        "Spin resolved: {}",
        prize.label
    );

    Ok(Json(SpinResponse {
        message: spin_message(&prize),
        prize,
        new_balance,
        timestamp,
        receipt: Some(receipt),
    }))
}

async fn get_prizes(State(state): State<AppState>) -> Json<SpinConfigResponse> {
    Json(SpinConfigResponse {
        spin_cost: SPIN_COST,
        ticket_cap: TICKET_CAP,
        session_spin_cap: SESSION_SPIN_CAP,
        prizes: state.prizes.prizes().to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use serde_json::{json, Value};
    use shared::constants::{INSUFFICIENT_TICKETS_ERROR, MISSING_FIELDS_ERROR};
    use tower::ServiceExt;

    async fn send(method: Method, uri: &str, body: Body, json_body: bool) -> (StatusCode, Value) {
        let dir = tempfile::tempdir().unwrap();
        let state = crate::test_state(dir.path());
        let app = crate::build_router(state, &[]);

        let mut builder = Request::builder().method(method).uri(uri);
        if json_body {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
        }
        let response = app.oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn post_spin(body: Value) -> (StatusCode, Value) {
        send(Method::POST, &api(SPIN_ENDPOINT), Body::from(body.to_string()), true).await
    }

    fn api(path: &str) -> String {
        format!("/api{}", path)
    }

    #[tokio::test]
    async fn test_missing_fields_rejected() {
        for body in [
            json!({ "tickets": 5 }),
            json!({ "wallet": "", "tickets": 5 }),
            json!({ "wallet": "   ", "tickets": 5 }),
            json!({ "wallet": "abc" }),
            json!({ "wallet": "abc", "tickets": "5" }),
            json!({ "wallet": 42, "tickets": 5 }),
        ] {
            let (status, value) = post_spin(body.clone()).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body {}", body);
            assert_eq!(value["message"], MISSING_FIELDS_ERROR);
        }
    }

    #[tokio::test]
    async fn test_insufficient_tickets_rejected() {
        for tickets in [json!(0), json!(3), json!(4.5), json!(-10)] {
            let (status, value) = post_spin(json!({ "wallet": "abc", "tickets": tickets })).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(value["message"], INSUFFICIENT_TICKETS_ERROR);
        }
    }

    #[tokio::test]
    async fn test_successful_spin_debits_claimed_balance() {
        let (status, value) = post_spin(json!({ "wallet": "abc", "tickets": 5 })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["newBalance"], json!(0));

        let label = value["prize"]["label"].as_str().unwrap();
        assert!(shared::prize::PrizeTable::default()
            .prizes()
            .iter()
            .any(|p| p.label == label));
        assert!(!value["message"].as_str().unwrap().is_empty());

        let timestamp = value["timestamp"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());

        let receipt = value["receipt"].as_str().unwrap();
        assert_eq!(receipt.len(), 64);
        assert!(receipt.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_claim_above_cap_is_trusted() {
        let (status, value) = post_spin(json!({ "wallet": "abc", "tickets": 12 })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["newBalance"], json!(7));
    }

    #[tokio::test]
    async fn test_unreadable_body_is_missing_fields() {
        let (status, value) = send(Method::POST, &api(SPIN_ENDPOINT), Body::from("not json"), true).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(value["message"], MISSING_FIELDS_ERROR);

        let (status, value) = send(Method::POST, &api(SPIN_ENDPOINT), Body::empty(), false).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(value["message"], MISSING_FIELDS_ERROR);
    }

    #[tokio::test]
    async fn test_wrong_method_is_405() {
        for method in [Method::GET, Method::PUT, Method::DELETE] {
            let (status, _) = send(method, &api(SPIN_ENDPOINT), Body::empty(), false).await;
            assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        }
    }

    #[tokio::test]
    async fn test_prizes_endpoint_lists_table() {
        let (status, value) = send(Method::GET, &api(SPIN_PRIZES_ENDPOINT), Body::empty(), false).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["spinCost"], json!(SPIN_COST));
        assert_eq!(value["ticketCap"], json!(TICKET_CAP));
        assert_eq!(value["sessionSpinCap"], json!(SESSION_SPIN_CAP));
        assert_eq!(value["prizes"].as_array().unwrap().len(), 6);
    }

    #[test]
    fn test_receipt_depends_on_secret_and_message() {
        let a = sign_receipt("secret", "abc:Jackpot:0:t").unwrap();
        assert_eq!(a, sign_receipt("secret", "abc:Jackpot:0:t").unwrap());
        assert_ne!(a, sign_receipt("other", "abc:Jackpot:0:t").unwrap());
        assert_ne!(a, sign_receipt("secret", "abc:Jackpot:1:t").unwrap());
    }
}
