use lazy_static::lazy_static;
use shared::{
    DentistRecord, DentistSearchRequest, DentistSearchResponse, EmergencyContacts, EmergencyService,
    SearchInfo, UrgentCareCenter,
};
use std::cmp::Ordering;

pub const MAX_RESULTS: usize = 3;

struct MockDentist {
    name: &'static str,
    address: &'static str,
    phone: &'static str,
    rating: f32,
    distance_km: f32,
    specialties: &'static [&'static str],
    website: &'static str,
    availability: &'static str,
    insurance_accepted: &'static [&'static str],
    reviews_count: u32,
}

lazy_static! {
    static ref MOCK_DENTISTS: Vec<MockDentist> = vec![
        MockDentist {
            name: "Dr. Sarah Johnson - Oral Medicine Specialist",
            address: "123 Main St, {city}, {state}",
            phone: "(555) 123-4567",
            rating: 4.8,
            distance_km: 2.3,
            specialties: &["Oral Medicine", "Oral Pathology"],
            website: "https://example-dental.com",
            availability: "Monday-Friday 9AM-5PM",
            insurance_accepted: &["Aetna", "Blue Cross", "Cigna"],
            reviews_count: 127,
        },
        MockDentist {
            name: "Dr. Michael Chen - Oral & Maxillofacial Surgery",
            address: "456 Oak Ave, {city}, {state}",
            phone: "(555) 234-5678",
            rating: 4.6,
            distance_km: 5.7,
            specialties: &["Oral Surgery", "Head & Neck Surgery"],
            website: "https://chen-oral-surgery.com",
            availability: "Monday-Thursday 8AM-6PM",
            insurance_accepted: &["Aetna", "Medicare", "Medicaid"],
            reviews_count: 89,
        },
        MockDentist {
            name: "Dr. Emily Rodriguez - General Dentistry",
            address: "789 Pine St, {city}, {state}",
            phone: "(555) 345-6789",
            rating: 4.7,
            distance_km: 3.1,
            specialties: &["General Dentistry", "Preventive Care"],
            website: "https://rodriguez-dental.com",
            availability: "Monday-Saturday 8AM-7PM",
            insurance_accepted: &["Blue Cross", "Delta Dental", "MetLife"],
            reviews_count: 203,
        },
        MockDentist {
            name: "Dr. James Wilson - Oral Cancer Specialist",
            address: "321 Elm St, {city}, {state}",
            phone: "(555) 456-7890",
            rating: 4.9,
            distance_km: 4.2,
            specialties: &["Oral Cancer", "Oral Pathology", "Oral Medicine"],
            website: "https://wilson-oral-cancer.com",
            availability: "Tuesday-Friday 9AM-4PM",
            insurance_accepted: &["Aetna", "Blue Cross", "Cigna", "Medicare"],
            reviews_count: 156,
        },
    ];
}

pub const MOCK_RECOMMENDATIONS: &[&str] = &[
    "Consider scheduling a consultation with the highest-rated specialist",
    "Check insurance coverage before making an appointment",
    "Ask about availability for urgent concerns",
    "Prepare a list of questions about your symptoms",
];

impl MockDentist {
    fn to_record(&self, city: &str, state: &str) -> DentistRecord {
        DentistRecord {
            name: self.name.to_string(),
            address: self.address.replace("{city}", city).replace("{state}", state),
            phone: self.phone.to_string(),
            rating: self.rating,
            distance_km: self.distance_km,
            specialties: self.specialties.iter().map(|s| s.to_string()).collect(),
            website: self.website.to_string(),
            availability: self.availability.to_string(),
            insurance_accepted: self.insurance_accepted.iter().map(|s| s.to_string()).collect(),
            reviews_count: self.reviews_count,
            source: "mock".to_string(),
        }
    }

    fn offers(&self, specialty: &str) -> bool {
        let wanted = specialty.to_lowercase();
        self.specialties.iter().any(|s| s.to_lowercase().contains(&wanted))
    }
}

pub(crate) fn search_info(request: &DentistSearchRequest, timestamp: String) -> SearchInfo {
    SearchInfo {
        search_specialty: request
            .specialty
            .clone()
            .unwrap_or_else(|| "General dentistry".to_string()),
        search_timestamp: timestamp,
        coverage_area: format!("{}km radius", request.radius_km),
        live_search: false,
        mock_data_used: false,
        llm_processed: false,
        error: None,
    }
}

/// Answers a search from the built-in directory.
pub fn mock_search(request: &DentistSearchRequest) -> DentistSearchResponse {
    let city = request.city.as_deref().unwrap_or("");
    let state = request.state.as_deref().unwrap_or("");
    let specialty = request.specialty.as_deref().map(str::trim).filter(|s| !s.is_empty());

    let mut matches: Vec<&MockDentist> = MOCK_DENTISTS
        .iter()
        .filter(|d| specialty.is_none_or(|s| d.offers(s)))
        .collect();
    matches.sort_by(|a, b| {
        b.rating
            .partial_cmp(&a.rating)
            .unwrap_or(Ordering::Equal)
            .then(a.distance_km.partial_cmp(&b.distance_km).unwrap_or(Ordering::Equal))
    });

    let total_found = matches.len();
    let dentists = matches
        .into_iter()
        .take(MAX_RESULTS)
        .map(|d| d.to_record(city, state))
        .collect();

    let mut info = search_info(request, chrono::Utc::now().to_rfc3339());
    info.mock_data_used = true;

    DentistSearchResponse {
        dentists,
        total_found,
        search_location: format!("{}, {}, {}", request.address, city, state),
        search_radius: request.radius_km,
        recommendations: MOCK_RECOMMENDATIONS.iter().map(|s| s.to_string()).collect(),
        additional_info: info,
    }
}

pub fn specialties() -> Vec<&'static str> {
    vec![
        "General Dentistry",
        "Oral and Maxillofacial Surgery",
        "Oral Pathology",
        "Oral Medicine",
        "Periodontics",
        "Endodontics",
        "Orthodontics",
        "Prosthodontics",
        "Pediatric Dentistry",
        "Oral Cancer Specialist",
        "Head and Neck Surgery",
    ]
}

pub fn emergency_contacts() -> EmergencyContacts {
    EmergencyContacts {
        emergency_services: vec![
            EmergencyService {
                name: "Emergency Dental Service".to_string(),
                phone: "1-800-DENTIST".to_string(),
                description: "24/7 emergency dental care".to_string(),
            },
            EmergencyService {
                name: "Oral Cancer Emergency".to_string(),
                phone: "911".to_string(),
                description: "For immediate medical emergencies".to_string(),
            },
        ],
        urgent_care_centers: vec![UrgentCareCenter {
            name: "Urgent Care Dental".to_string(),
            description: "Walk-in dental urgent care".to_string(),
            hours: "24/7".to_string(),
        }],
        when_to_seek_emergency: [
            "Severe pain that doesn't respond to over-the-counter medication",
            "Significant bleeding from the mouth",
            "Difficulty breathing or swallowing",
            "Signs of infection (fever, swelling, pus)",
            "Trauma to the mouth or face",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect(),
    }
}
