//! Typed location lookups used by the quoting pipeline.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::IntegrationResult;
use crate::lookup::client::LookupClient;
use crate::lookup::types::{Lookup, LookupParams};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Country {
    pub country_code: String,
    pub country_name: String,
    #[serde(default)]
    pub capital: Option<String>,
    #[serde(default)]
    pub currency_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub population: Option<u64>,
}

/// First-level administrative division (state, province).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    pub name: String,
    #[serde(default)]
    pub admin_code1: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub geoname_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct City {
    pub name: String,
    #[serde(default)]
    pub admin_code1: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub geoname_id: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub population: Option<u64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub lng: Option<f64>,
}

/// A named place resolved through the postal code index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Place {
    pub place_name: String,
    pub country_code: String,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub admin_code1: Option<String>,
    #[serde(default)]
    pub admin_name1: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub lng: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostalCode {
    #[serde(deserialize_with = "code_string")]
    pub postal_code: String,
    #[serde(default)]
    pub place_name: Option<String>,
    #[serde(default)]
    pub admin_code1: Option<String>,
}

impl LookupClient {
    pub async fn countries(&self) -> IntegrationResult<Lookup<Country>> {
        self.fetch_as("countries", &LookupParams::new()).await
    }

    pub async fn regions(&self, country: &str) -> IntegrationResult<Lookup<Region>> {
        self.fetch_as("regions", &LookupParams::new().with("country", country))
            .await
    }

    pub async fn cities(&self, country: &str, region: &str) -> IntegrationResult<Lookup<City>> {
        let params = LookupParams::new()
            .with("country", country)
            .with("region", region);
        self.fetch_as("cities", &params).await
    }

    /// Places named `place`, narrowed to `region` when given.
    pub async fn places(
        &self,
        country: &str,
        region: Option<&str>,
        place: &str,
    ) -> IntegrationResult<Lookup<Place>> {
        let params = LookupParams::new()
            .with("country", country)
            .with("region", region.unwrap_or_default())
            .with("place", place);
        self.fetch_as("places", &params).await
    }

    pub async fn postal_codes(
        &self,
        country: &str,
        place: &str,
    ) -> IntegrationResult<Lookup<PostalCode>> {
        let params = LookupParams::new()
            .with("country", country)
            .with("place", place);
        self.fetch_as("postal_codes", &params).await
    }
}

// The upstream serializes some numbers as strings ("population": "39512223").
fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn code_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "postal code must be a string or number, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::LookupConfig;
    use crate::http::{HttpResponse, ScriptedTransport};
    use crate::lookup::LookupSource;
    use serde_json::json;
    use std::sync::Arc;

    fn client(transport: ScriptedTransport) -> (LookupClient, Arc<ScriptedTransport>) {
        let transport = Arc::new(transport);
        let config = LookupConfig {
            base_url: "http://geo.test".into(),
            client_id: Some("portal".into()),
            ..LookupConfig::default()
        };
        let client =
            LookupClient::with_transport(config, transport.clone(), Arc::new(ManualClock::new()));
        (client, transport)
    }

    #[test]
    fn test_country_with_string_population() {
        let country: Country = serde_json::from_value(json!({
            "countryCode": "US",
            "countryName": "United States",
            "population": "327167434",
            "capital": "Washington"
        }))
        .unwrap();
        assert_eq!(country.population, Some(327_167_434));
        assert_eq!(country.currency_code, None);
    }

    #[test]
    fn test_numeric_postal_code() {
        let code: PostalCode = serde_json::from_value(json!({"postalCode": 90210})).unwrap();
        assert_eq!(code.postal_code, "90210");
    }

    #[tokio::test]
    async fn test_countries_sorted_by_name() {
        let transport = ScriptedTransport::new().route(
            "/countryInfoJSON",
            vec![Ok(HttpResponse::json_body(
                200,
                &json!({"geonames": [
                    {"countryCode": "US", "countryName": "United States"},
                    {"countryCode": "CA", "countryName": "Canada"},
                    {"countryCode": "US", "countryName": "United States"}
                ]}),
            ))],
        );
        let (client, _) = client(transport);

        let countries = client.countries().await.unwrap();
        let codes: Vec<_> = countries.records.iter().map(|c| c.country_code.as_str()).collect();
        assert_eq!(codes, vec!["CA", "US"]);
        assert_eq!(countries.source, LookupSource::Upstream);
    }

    #[tokio::test]
    async fn test_places_narrowed_by_region() {
        let transport = ScriptedTransport::new().route(
            "/postalCodeSearchJSON",
            vec![Ok(HttpResponse::json_body(
                200,
                &json!({"postalCodes": [
                    {"placeName": "Springfield", "countryCode": "US", "adminCode1": "MO", "lat": 37.2, "lng": -93.3},
                    {"placeName": "Springfield", "countryCode": "US", "adminCode1": "IL", "lat": 39.8, "lng": -89.6}
                ]}),
            ))],
        );
        let (client, transport) = client(transport);

        let places = client.places("US", Some("IL"), "Springfield").await.unwrap();
        assert_eq!(places.len(), 1);
        assert_eq!(places.records[0].admin_code1.as_deref(), Some("IL"));
        assert_eq!(places.records[0].lat, Some(39.8));

        // The region narrows results locally; it is not sent upstream.
        let request = &transport.requests()[0];
        assert_eq!(request.query_value("placename"), Some("Springfield"));
        assert_eq!(request.query_value("adminCode1"), None);
    }

    #[tokio::test]
    async fn test_postal_codes_degrade_to_empty() {
        let transport = ScriptedTransport::new().route(
            "/postalCodeSearchJSON",
            vec![Ok(HttpResponse::new(500, "boom"))],
        );
        let (client, _) = client(transport);

        let codes = client.postal_codes("US", "Nowhere").await.unwrap();
        assert!(codes.is_empty());
        assert!(codes.is_degraded());
    }
}
