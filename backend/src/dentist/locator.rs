use shared::{DentistRecord, DentistSearchRequest, DentistSearchResponse};
use std::collections::HashSet;

use super::mock::{self, MAX_RESULTS};
use super::serpapi::{parse_search_results, DentistSearch, SearchError, SerpApiClient};
use crate::config::AppConfig;
use crate::llm::{ChatClient, ChatMessage};

const KM_TO_MILES: f64 = 0.621371;
const MAX_RECOMMENDATIONS: usize = 4;

const DEFAULT_RECOMMENDATIONS: &[&str] = &[
    "Consider scheduling consultations with multiple dentists to compare approaches",
    "Check insurance coverage before making appointments",
    "Ask about availability for urgent concerns",
    "Prepare a list of questions about your specific needs",
];

const NO_RESULTS_RECOMMENDATION: &str = "No dentists found in the specified area. Try expanding your search radius.";

/// Joins the address parts into a single search location. The country is
/// only named when it is not the US.
pub fn build_location(request: &DentistSearchRequest) -> String {
    let mut parts = vec![request.address.trim()];
    for part in [request.city.as_deref(), request.state.as_deref()].into_iter().flatten() {
        if !part.trim().is_empty() {
            parts.push(part.trim());
        }
    }
    let country = request.country.trim();
    if !country.is_empty() && !country.eq_ignore_ascii_case("US") {
        parts.push(country);
    }
    parts.join(", ")
}

pub fn radius_miles(radius_km: u32) -> u32 {
    (radius_km as f64 * KM_TO_MILES).floor() as u32
}

/// Radius for the follow-up query when the first one comes back sparse.
/// Saturates at `u32::MAX`.
pub fn widened_radius_miles(radius_km: u32) -> u32 {
    (radius_km as f64 * KM_TO_MILES * 2.0).floor() as u32
}

fn search_query(location: &str, specialty: Option<&str>, miles: u32) -> String {
    match specialty {
        Some(specialty) => format!("{} dentist near {} within {} miles", specialty, location, miles),
        None => format!("dentist near {} within {} miles", location, miles),
    }
}

/// Appends records with unseen names until `MAX_RESULTS` are held.
fn merge_unique(dentists: &mut Vec<DentistRecord>, extra: Vec<DentistRecord>) {
    let mut names: HashSet<String> = dentists.iter().map(|d| d.name.clone()).collect();
    for dentist in extra {
        if dentists.len() >= MAX_RESULTS {
            break;
        }
        if names.insert(dentist.name.clone()) {
            dentists.push(dentist);
        }
    }
}

fn recommendation_prompt(dentists: &[DentistRecord], specialty: Option<&str>) -> String {
    let summary = dentists
        .iter()
        .take(MAX_RESULTS)
        .map(|d| format!("- {} (Rating: {}, Specialties: {})", d.name, d.rating, d.specialties.join(", ")))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Based on these dentists found for {}:\n\n{}\n\nProvide 3-4 helpful recommendations for the patient. \
Keep them practical and actionable. Put each recommendation on its own line.",
        specialty.unwrap_or("general dental care"),
        summary
    )
}

/// Splits a model reply into at most four recommendation lines, dropping
/// list markers.
pub fn parse_recommendations(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| {
            line.trim()
                .trim_start_matches(|c: char| c.is_ascii_digit() || matches!(c, '-' | '*' | '•' | '.' | ')'))
                .trim()
        })
        .filter(|line| !line.is_empty() && !line.ends_with(':'))
        .take(MAX_RECOMMENDATIONS)
        .map(String::from)
        .collect()
}

fn default_recommendations() -> Vec<String> {
    DEFAULT_RECOMMENDATIONS.iter().map(|s| s.to_string()).collect()
}

pub struct DentistLocator {
    search: Option<Box<dyn DentistSearch>>,
    llm: Option<ChatClient>,
}

impl DentistLocator {
    pub fn new(search: Option<Box<dyn DentistSearch>>, llm: Option<ChatClient>) -> Self {
        Self { search, llm }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let search = config
            .search
            .as_ref()
            .map(|c| Box::new(SerpApiClient::new(c)) as Box<dyn DentistSearch>);
        if search.is_none() {
            log::warn!("SERPAPI_KEY not set, dentist search will use mock data");
        }
        let llm = config.llm.as_ref().map(ChatClient::new);
        Self::new(search, llm)
    }

    pub fn is_live(&self) -> bool {
        self.search.is_some()
    }

    /// Searches the live backend when one is configured and falls back to
    /// the built-in directory on any failure.
    pub async fn find_dentists(&self, request: &DentistSearchRequest) -> DentistSearchResponse {
        let Some(search) = self.search.as_deref() else {
            log::info!("Using mock data for dentist search");
            return mock::mock_search(request);
        };

        match self.live_search(search, request).await {
            Ok(response) => response,
            Err(e) => {
                log::error!("Dentist search failed: {}. Falling back to mock data.", e);
                let mut response = mock::mock_search(request);
                response.additional_info.error = Some(format!("Search service temporarily unavailable: {}", e));
                response
            }
        }
    }

    async fn live_search(
        &self,
        search: &dyn DentistSearch,
        request: &DentistSearchRequest,
    ) -> Result<DentistSearchResponse, SearchError> {
        let location = build_location(request);
        let specialty = request.specialty.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let miles = radius_miles(request.radius_km);
        log::info!("Searching for dentists near {}", location);

        let mut dentists = parse_search_results(&search.search(&search_query(&location, specialty, miles)).await?);
        if dentists.len() < MAX_RESULTS {
            match search.search(&search_query(&location, specialty, widened_radius_miles(request.radius_km))).await {
                Ok(broader) => merge_unique(&mut dentists, parse_search_results(&broader)),
                Err(e) => log::warn!("Could not get additional results: {}", e),
            }
        }

        let total_found = dentists.len();
        dentists.truncate(MAX_RESULTS);

        let (recommendations, llm_processed) = self.recommendations(&dentists, specialty).await;

        let mut info = mock::search_info(request, chrono::Utc::now().to_rfc3339());
        info.live_search = true;
        info.llm_processed = llm_processed;

        Ok(DentistSearchResponse {
            dentists,
            total_found,
            search_location: location,
            search_radius: request.radius_km,
            recommendations,
            additional_info: info,
        })
    }

    async fn recommendations(&self, dentists: &[DentistRecord], specialty: Option<&str>) -> (Vec<String>, bool) {
        if dentists.is_empty() {
            return (vec![NO_RESULTS_RECOMMENDATION.to_string()], false);
        }
        let Some(llm) = self.llm.as_ref().filter(|c| c.has_credentials()) else {
            return (default_recommendations(), false);
        };

        let messages = [ChatMessage::user(recommendation_prompt(dentists, specialty))];
        match llm.complete(&messages).await {
            Ok(text) => {
                let parsed = parse_recommendations(&text);
                if parsed.is_empty() {
                    (default_recommendations(), false)
                } else {
                    (parsed, true)
                }
            }
            Err(e) => {
                log::warn!("Error generating recommendations with LLM: {}", e);
                (default_recommendations(), false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    struct FakeSearch {
        pages: Mutex<Vec<Result<Value, String>>>,
        queries: Mutex<Vec<String>>,
    }

    impl FakeSearch {
        fn new(pages: Vec<Result<Value, String>>) -> Self {
            Self {
                pages: Mutex::new(pages),
                queries: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl DentistSearch for FakeSearch {
        async fn search(&self, query: &str) -> Result<Value, SearchError> {
            self.queries.lock().unwrap().push(query.to_string());
            let mut pages = self.pages.lock().unwrap();
            if pages.is_empty() {
                return Ok(json!({}));
            }
            pages.remove(0).map_err(SearchError::Api)
        }
    }

    fn local(names: &[&str]) -> Value {
        json!({ "local_results": names.iter().map(|n| json!({ "title": n, "rating": 4.0 })).collect::<Vec<_>>() })
    }

    fn request() -> DentistSearchRequest {
        DentistSearchRequest {
            address: "1 Main St".into(),
            city: Some("Austin".into()),
            state: Some("TX".into()),
            country: "US".into(),
            radius_km: 25,
            specialty: None,
        }
    }

    #[test]
    fn location_skips_us_and_blanks() {
        assert_eq!(build_location(&request()), "1 Main St, Austin, TX");

        let mut req = request();
        req.city = Some("  ".into());
        req.state = None;
        req.country = "Canada".into();
        assert_eq!(build_location(&req), "1 Main St, Canada");
    }

    #[test]
    fn converts_radius_to_whole_miles() {
        assert_eq!(radius_miles(25), 15);
        assert_eq!(radius_miles(1), 0);
        assert_eq!(radius_miles(100), 62);
        assert_eq!(widened_radius_miles(25), 31);
        assert_eq!(widened_radius_miles(100), 124);
        assert_eq!(widened_radius_miles(u32::MAX), u32::MAX);
    }

    #[test]
    fn query_includes_specialty_and_radius() {
        assert_eq!(
            search_query("Austin, TX", Some("Orthodontics"), 15),
            "Orthodontics dentist near Austin, TX within 15 miles"
        );
        assert_eq!(search_query("Austin, TX", None, 3), "dentist near Austin, TX within 3 miles");
    }

    #[test]
    fn strips_list_markers() {
        let text = "Here are some tips:\n1. Book early\n- Bring your insurance card\n\n* Ask about sedation\n2) Compare ratings\nExtra line";
        assert_eq!(
            parse_recommendations(text),
            vec!["Book early", "Bring your insurance card", "Ask about sedation", "Compare ratings"]
        );
    }

    #[actix_web::test]
    async fn without_search_backend_uses_mock_data() {
        let locator = DentistLocator::new(None, None);
        assert!(!locator.is_live());
        let response = locator.find_dentists(&request()).await;
        assert!(response.additional_info.mock_data_used);
        assert_eq!(response.dentists.len(), 3);
    }

    #[actix_web::test]
    async fn live_results_are_capped_at_three() {
        let fake = FakeSearch::new(vec![Ok(local(&["A", "B", "C", "D", "E"]))]);
        let locator = DentistLocator::new(Some(Box::new(fake)), None);
        let response = locator.find_dentists(&request()).await;

        assert_eq!(response.dentists.len(), 3);
        assert_eq!(response.total_found, 5);
        assert!(response.additional_info.live_search);
        assert!(!response.additional_info.mock_data_used);
        assert!(!response.additional_info.llm_processed);
        assert_eq!(response.recommendations.len(), 4);
        assert_eq!(response.search_location, "1 Main St, Austin, TX");
        assert_eq!(response.search_radius, 25);
    }

    #[actix_web::test]
    async fn sparse_results_trigger_broader_search() {
        let fake = FakeSearch::new(vec![Ok(local(&["A"])), Ok(local(&["A", "B", "C", "D"]))]);
        let locator = DentistLocator::new(Some(Box::new(fake)), None);
        let response = locator.find_dentists(&request()).await;

        let names: Vec<&str> = response.dentists.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert_eq!(response.total_found, 3);
    }

    #[actix_web::test]
    async fn broader_search_uses_doubled_radius() {
        let fake = std::sync::Arc::new(FakeSearch::new(vec![Ok(local(&["A"])), Err("quota".into())]));

        struct Shared(std::sync::Arc<FakeSearch>);
        #[async_trait]
        impl DentistSearch for Shared {
            async fn search(&self, query: &str) -> Result<Value, SearchError> {
                self.0.search(query).await
            }
        }

        let locator = DentistLocator::new(Some(Box::new(Shared(fake.clone()))), None);
        let response = locator.find_dentists(&request()).await;

        assert_eq!(response.dentists.len(), 1);
        assert!(response.additional_info.live_search);
        let queries = fake.queries.lock().unwrap();
        assert_eq!(queries.len(), 2);
        assert!(queries[0].ends_with("within 15 miles"));
        assert!(queries[1].ends_with("within 31 miles"));
    }

    #[actix_web::test]
    async fn extreme_radius_does_not_overflow() {
        let fake = FakeSearch::new(vec![Ok(local(&["A"])), Ok(local(&["B"]))]);
        let locator = DentistLocator::new(Some(Box::new(fake)), None);
        let mut wide = request();
        wide.radius_km = u32::MAX;

        let response = locator.find_dentists(&wide).await;
        assert!(response.additional_info.live_search);
        assert_eq!(response.search_radius, u32::MAX);
        assert_eq!(response.dentists.len(), 2);
    }

    #[actix_web::test]
    async fn empty_live_results_suggest_wider_radius() {
        let fake = FakeSearch::new(vec![Ok(json!({})), Ok(json!({}))]);
        let locator = DentistLocator::new(Some(Box::new(fake)), None);
        let response = locator.find_dentists(&request()).await;
        assert!(response.dentists.is_empty());
        assert_eq!(response.total_found, 0);
        assert_eq!(response.recommendations, vec![NO_RESULTS_RECOMMENDATION.to_string()]);
    }

    #[actix_web::test]
    async fn search_failure_falls_back_to_mock() {
        let fake = FakeSearch::new(vec![Err("Invalid API key".into())]);
        let locator = DentistLocator::new(Some(Box::new(fake)), None);
        let response = locator.find_dentists(&request()).await;

        assert!(response.additional_info.mock_data_used);
        assert!(!response.additional_info.live_search);
        assert!(response.additional_info.error.as_deref().unwrap().contains("Invalid API key"));
        assert_eq!(response.dentists.len(), 3);
    }
}
