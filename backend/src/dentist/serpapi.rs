use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde_json::Value;
use shared::DentistRecord;
use thiserror::Error;
use url::Url;

use crate::config::SearchConfig;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid search URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("Search API error: {0}")]
    Api(String),
}

/// A local-search backend returning the raw result document.
#[async_trait]
pub trait DentistSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<Value, SearchError>;
}

pub struct SerpApiClient {
    http_client: HttpClient,
    api_key: String,
    base_url: String,
}

impl SerpApiClient {
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
        }
    }

    fn search_url(&self, query: &str) -> Result<Url, SearchError> {
        let mut url = Url::parse(&self.base_url)?;
        url.query_pairs_mut()
            .append_pair("engine", "google_maps")
            .append_pair("type", "search")
            .append_pair("q", query)
            .append_pair("hl", "en")
            .append_pair("gl", "us")
            .append_pair("api_key", &self.api_key);
        Ok(url)
    }
}

#[async_trait]
impl DentistSearch for SerpApiClient {
    async fn search(&self, query: &str) -> Result<Value, SearchError> {
        let url = self.search_url(query)?;
        log::info!("Searching for dentists with query: {}", query);

        let response = self.http_client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(SearchError::Api(format!("{}: {}", status.as_u16(), body)));
        }

        check_response(serde_json::from_str(&body)?)
    }
}

const NO_RESULTS_MARKER: &str = "hasn't returned any results";

/// SerpAPI reports an empty result set through the `error` field; that case
/// is a successful search with nothing in it.
fn check_response(value: Value) -> Result<Value, SearchError> {
    match value.get("error").and_then(Value::as_str) {
        Some(error) if error.contains(NO_RESULTS_MARKER) => {
            log::info!("Search returned no results: {}", error);
            Ok(value)
        }
        Some(error) => Err(SearchError::Api(error.to_string())),
        None => Ok(value),
    }
}

const SPECIALTY_KEYWORDS: &[(&str, &[&str])] = &[
    ("Oral Surgery", &["oral surgery", "maxillofacial", "oral and maxillofacial"]),
    ("Orthodontics", &["orthodontics", "orthodontist", "braces", "invisalign"]),
    ("Endodontics", &["endodontics", "endodontist", "root canal"]),
    ("Periodontics", &["periodontics", "periodontist", "gum disease"]),
    ("Prosthodontics", &["prosthodontics", "prosthodontist", "crowns", "bridges"]),
    ("Pediatric Dentistry", &["pediatric", "children", "kids", "family"]),
    ("Oral Medicine", &["oral medicine", "oral pathology"]),
    ("Cosmetic Dentistry", &["cosmetic", "veneers", "whitening", "aesthetic"]),
];

pub fn determine_specialties(name: &str, description: &str) -> Vec<String> {
    let text = format!("{} {}", name, description).to_lowercase();
    let mut specialties = vec!["General Dentistry".to_string()];
    for (specialty, keywords) in SPECIALTY_KEYWORDS {
        if keywords.iter().any(|k| text.contains(k)) {
            specialties.push(specialty.to_string());
        }
    }
    specialties
}

fn text_field(result: &Value, key: &str) -> Option<String> {
    match result.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn number_field(result: &Value, key: &str) -> Option<f64> {
    match result.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    }
}

// Google Maps results carry hours as a string or an object keyed by day.
fn hours_field(result: &Value) -> Option<String> {
    match result.get("hours").or_else(|| result.get("operating_hours"))? {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) if !map.is_empty() => Some(
            map.iter()
                .map(|(day, hours)| match hours {
                    Value::String(h) => format!("{}: {}", day, h),
                    other => format!("{}: {}", day, other),
                })
                .collect::<Vec<_>>()
                .join(", "),
        ),
        _ => None,
    }
}

fn from_local_result(result: &Value, index: usize) -> DentistRecord {
    let name = text_field(result, "title").unwrap_or_else(|| format!("Dentist {}", index + 1));
    let description = text_field(result, "description").unwrap_or_default();
    DentistRecord {
        specialties: determine_specialties(&name, &description),
        address: text_field(result, "address").unwrap_or_else(|| "Address not available".to_string()),
        phone: text_field(result, "phone").unwrap_or_else(|| "Phone not available".to_string()),
        rating: number_field(result, "rating").unwrap_or(0.0) as f32,
        distance_km: (index + 1) as f32 * 2.5,
        website: text_field(result, "website").unwrap_or_default(),
        availability: hours_field(result).unwrap_or_else(|| "Hours not available".to_string()),
        insurance_accepted: vec!["Contact for insurance details".to_string()],
        reviews_count: number_field(result, "reviews").map(|r| r.max(0.0) as u32).unwrap_or(0),
        source: "serpapi".to_string(),
        name,
    }
}

fn from_organic_result(result: &Value, index: usize) -> DentistRecord {
    let name = text_field(result, "title").unwrap_or_else(|| format!("Dentist {}", index + 1));
    let snippet = text_field(result, "snippet").unwrap_or_default();
    DentistRecord {
        specialties: determine_specialties(&name, &snippet),
        address: "Address not available".to_string(),
        phone: "Phone not available".to_string(),
        rating: 0.0,
        distance_km: (index + 1) as f32 * 3.0,
        website: text_field(result, "link").unwrap_or_default(),
        availability: "Contact for hours".to_string(),
        insurance_accepted: vec!["Contact for insurance details".to_string()],
        reviews_count: 0,
        source: "serpapi_organic".to_string(),
        name,
    }
}

/// Maps a search response onto dentist records, preferring map results over
/// organic web results.
pub fn parse_search_results(results: &Value) -> Vec<DentistRecord> {
    let list = |key: &str| results.get(key).and_then(Value::as_array).cloned().unwrap_or_default();

    let local: Vec<DentistRecord> = list("local_results")
        .iter()
        .take(10)
        .enumerate()
        .map(|(i, r)| from_local_result(r, i))
        .collect();
    if !local.is_empty() {
        return local;
    }

    list("organic_results")
        .iter()
        .take(5)
        .enumerate()
        .map(|(i, r)| from_organic_result(r, i))
        .collect()
}
