//! Country lookup for source IP addresses

use crate::error::Result;
use maxminddb::{geoip2, Reader};
use std::net::IpAddr;
use std::path::Path;
use tracing::debug;

/// Country attached to a record; both fields are empty when unknown
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeoInfo {
    pub country_code: String,
    pub country_name: String,
}

/// Maps an IP address to the country it belongs to
pub trait GeoLookup {
    fn lookup(&self, ip: &str) -> GeoInfo;
}

/// Lookup used when no GeoIP database is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct NoGeoLookup;

impl GeoLookup for NoGeoLookup {
    fn lookup(&self, _ip: &str) -> GeoInfo {
        GeoInfo::default()
    }
}

/// Lookup backed by a MaxMind GeoLite2 / GeoIP2 country or city database
pub struct MaxMindGeoLookup {
    reader: Reader<Vec<u8>>,
}

impl MaxMindGeoLookup {
    pub fn open(path: &Path) -> Result<Self> {
        let reader = Reader::open_readfile(path)?;
        Ok(Self { reader })
    }
}

impl GeoLookup for MaxMindGeoLookup {
    fn lookup(&self, ip: &str) -> GeoInfo {
        let Ok(addr) = ip.trim().parse::<IpAddr>() else {
            return GeoInfo::default();
        };

        let country = match self.reader.lookup::<geoip2::Country>(addr) {
            Ok(found) => found.country,
            Err(e) => {
                debug!(ip = %addr, error = %e, "No GeoIP entry");
                return GeoInfo::default();
            },
        };

        let Some(country) = country else {
            return GeoInfo::default();
        };

        GeoInfo {
            country_code: country.iso_code.unwrap_or_default().to_string(),
            country_name: country
                .names
                .as_ref()
                .and_then(|names| names.get("en").copied())
                .unwrap_or_default()
                .to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_geo_lookup_is_empty() {
        assert_eq!(NoGeoLookup.lookup("8.8.8.8"), GeoInfo::default());
        assert_eq!(NoGeoLookup.lookup(""), GeoInfo::default());
    }

    #[test]
    fn test_missing_database_is_an_error() {
        assert!(MaxMindGeoLookup::open(Path::new("/nonexistent/GeoLite2-Country.mmdb")).is_err());
    }
}
