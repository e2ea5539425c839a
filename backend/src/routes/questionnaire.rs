use actix_web::{web, HttpResponse};
use serde_json::json;
use shared::QuestionnaireRequest;

use crate::errors::ApiError;
use crate::questionnaire::rules;
use crate::questionnaire::QuestionnaireAnalyzer;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/analyze").route(web::post().to(analyze)))
        .service(web::resource("/quick-analysis").route(web::post().to(quick_analysis)))
        .service(web::resource("/questions").route(web::get().to(questions)));
}

async fn analyze(
    analyzer: web::Data<QuestionnaireAnalyzer>,
    request: web::Json<QuestionnaireRequest>,
) -> Result<HttpResponse, ApiError> {
    log::info!("Received questionnaire analysis request with {} answers", request.answers.len());
    let response = analyzer.analyze(&request).await?;
    Ok(HttpResponse::Ok().json(response))
}

async fn quick_analysis(
    analyzer: web::Data<QuestionnaireAnalyzer>,
    request: web::Json<QuestionnaireRequest>,
) -> Result<HttpResponse, ApiError> {
    let response = analyzer.quick_analysis(&request.answers)?;
    Ok(HttpResponse::Ok().json(response))
}

async fn questions() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "questions": rules::questions() }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use serde_json::Value;

    fn app_data() -> web::Data<QuestionnaireAnalyzer> {
        web::Data::new(QuestionnaireAnalyzer::rules_only())
    }

    fn body(yes: &[&str]) -> Value {
        let answers: Vec<Value> = ["q1", "q2", "q3", "q4", "q5"]
            .iter()
            .map(|id| json!({ "question_id": id, "answer": if yes.contains(id) { "yes" } else { "no" } }))
            .collect();
        json!({ "answers": answers })
    }

    #[actix_web::test]
    async fn analyze_uses_rules() {
        let app = test::init_service(
            App::new()
                .app_data(app_data())
                .service(web::scope("/questionnaire").configure(configure)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/questionnaire/analyze")
            .set_json(body(&["q1", "q2", "q4"]))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let value: Value = test::read_body_json(resp).await;
        assert_eq!(value["risk_level"], "High");
        assert_eq!(value["detailed_insights"]["yes_count"], 3);
        assert!(value["metadata"]["questionnaire_id"].as_str().unwrap().starts_with("q_"));
    }

    #[actix_web::test]
    async fn zero_answers_is_bad_request() {
        let app = test::init_service(
            App::new()
                .app_data(app_data())
                .service(web::scope("/questionnaire").configure(configure)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/questionnaire/analyze")
            .set_json(json!({ "answers": [] }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let value: Value = test::read_body_json(resp).await;
        assert!(value["error"].is_string());
    }

    #[actix_web::test]
    async fn missing_answer_field_is_bad_request() {
        let app = test::init_service(
            App::new()
                .app_data(app_data())
                .app_data(web::JsonConfig::default().error_handler(crate::errors::json_error_handler))
                .service(web::scope("/questionnaire").configure(configure)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/questionnaire/analyze")
            .set_json(json!({ "answers": [{ "question_id": "q1" }] }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let value: Value = test::read_body_json(resp).await;
        assert!(value["error"].as_str().unwrap().starts_with("Invalid request body"));
    }

    #[actix_web::test]
    async fn quick_analysis_counts_factors() {
        let app = test::init_service(
            App::new()
                .app_data(app_data())
                .service(web::scope("/questionnaire").configure(configure)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/questionnaire/quick-analysis")
            .set_json(body(&["q3", "q5"]))
            .to_request();
        let value: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(value["risk_level"], "Medium");
        assert_eq!(value["risk_factors_count"], 2);
    }

    #[actix_web::test]
    async fn lists_five_questions() {
        let app = test::init_service(App::new().service(web::scope("/questionnaire").configure(configure))).await;
        let req = test::TestRequest::get().uri("/questionnaire/questions").to_request();
        let value: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(value["questions"].as_array().unwrap().len(), 5);
        assert_eq!(value["questions"][0]["id"], "q1");
    }
}
