//! External IP/geolocation lookup port.
//!
//! Implementation: `pagepulse-network` crate (`CityJsonGeoClient`)

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::record::GeoInfo;

/// Opaque async lookup of the client's public IP and city
#[async_trait]
pub trait GeoLookup: Send + Sync {
    async fn lookup(&self) -> Result<GeoInfo, CoreError>;
}
