use gloo_net::http::Request;
use log::error;
use serde::Deserialize;
use shared::constants::{SPIN_ENDPOINT, SPIN_FAILED_ERROR, SPIN_PRIZES_ENDPOINT};
use shared::prize::PrizeTable;
use shared::shared_spin_game::{SpinConfigResponse, SpinRequest, SpinResponse};

use crate::config::get_api_base_url;

/// Spin errors come back as `{ message }`, rate limiting as `{ error }`.
#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

pub async fn request_server_spin(wallet: &str, tickets: u32) -> Result<SpinResponse, String> {
    let url = format!("{}/api{}", get_api_base_url(), SPIN_ENDPOINT);

    let request = Request::post(&url)
        .json(&SpinRequest::new(wallet, tickets))
        .map_err(|e| {
            error!("Failed to build spin request: {}", e);
            SPIN_FAILED_ERROR.to_string()
        })?;

    let response = request.send().await.map_err(|e| {
        error!("Spin request failed: {}", e);
        SPIN_FAILED_ERROR.to_string()
    })?;

    if response.ok() {
        return response.json::<SpinResponse>().await.map_err(|e| {
            error!("Unreadable spin response: {}", e);
            SPIN_FAILED_ERROR.to_string()
        });
    }

    let status = response.status();
    match response.json::<ErrorBody>().await {
        Ok(ErrorBody { message: Some(message), .. }) | Ok(ErrorBody { error: Some(message), .. }) => Err(message),
        _ => Err(format!("Spin failed with status {}", status)),
    }
}

fn prize_table_from_config(config: SpinConfigResponse) -> Result<PrizeTable, String> {
    PrizeTable::new(config.prizes).map_err(|e| format!("Server prize table rejected: {}", e))
}

pub async fn fetch_prize_table() -> Result<PrizeTable, String> {
    let url = format!("{}/api{}", get_api_base_url(), SPIN_PRIZES_ENDPOINT);

    let response = Request::get(&url)
        .send()
        .await
        .map_err(|e| format!("Prize table request failed: {}", e))?;

    if !response.ok() {
        return Err(format!("Prize table request failed with status {}", response.status()));
    }

    let config = response
        .json::<SpinConfigResponse>()
        .await
        .map_err(|e| format!("Unreadable prize table: {}", e))?;
    prize_table_from_config(config)
}
