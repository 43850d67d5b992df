//! IP/city lookup.
//!
//! `GeoLookup` port implementation for script-style endpoints that answer
//! with `var returnCitySN = {"cip": "...", "cid": "...", "cname": "..."};`.

use std::time::Duration;

use async_trait::async_trait;
use pagepulse_core::error::CoreError;
use pagepulse_core::models::record::GeoInfo;
use pagepulse_core::ports::geo::GeoLookup;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct CityJson {
    cip: Option<String>,
    cname: Option<String>,
}

/// Extracts ip and city from a `returnCitySN` script body.
pub fn parse_city_json(body: &str) -> Result<GeoInfo, CoreError> {
    let (Some(start), Some(end)) = (body.find('{'), body.rfind('}')) else {
        return Err(CoreError::Validation {
            field: "returnCitySN".to_string(),
            message: "no JSON object in response".to_string(),
        });
    };
    if end < start {
        return Err(CoreError::Validation {
            field: "returnCitySN".to_string(),
            message: "malformed JSON object".to_string(),
        });
    }

    let city: CityJson = serde_json::from_str(&body[start..=end])?;
    Ok(GeoInfo {
        ip: city.cip.filter(|ip| !ip.is_empty()),
        city: city.cname.filter(|name| !name.is_empty()),
    })
}

/// reqwest-backed city-JSON lookup
pub struct CityJsonGeoClient {
    client: reqwest::Client,
    url: String,
}

impl CityJsonGeoClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl GeoLookup for CityJsonGeoClient {
    async fn lookup(&self) -> Result<GeoInfo, CoreError> {
        debug!("geo lookup: {}", self.url);

        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| CoreError::Network(format!("geo lookup failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(CoreError::Transport {
                channel: "geo".to_string(),
                message: format!("lookup answered {status}"),
            });
        }

        let body = resp
            .text()
            .await
            .map_err(|e| CoreError::Network(format!("failed to read geo response: {e}")))?;
        let info = parse_city_json(&body)?;
        debug!("geo lookup: ip={:?} city={:?}", info.ip, info.city);
        Ok(info)
    }
}
