use log::debug;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

use crate::config::Config;
use crate::error::SourceError;

/// Create the shared HTTP session; every request carries the courtesy user agent
pub fn create_client(config: &Config) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(config.user_agent())
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
}

/// Send a request and decode a JSON body, mapping non-success statuses to errors
pub async fn get_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, SourceError> {
    let resp = request.send().await?;
    let status = resp.status();
    if !status.is_success() {
        debug!("{} returned status {}", resp.url(), status);
        return Err(SourceError::Status(status.as_u16()));
    }
    resp.json::<T>()
        .await
        .map_err(|e| SourceError::Malformed(e.to_string()))
}
