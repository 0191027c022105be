use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use serde_json::{json, Value};

use card_sourcer::domain::solver_factory::SolveOptions;
use card_sourcer::models::PlanDocument;
use card_sourcer::server::{json_config, routes, AppState};

const JSON_LIMIT: usize = 2 * 1024 * 1024;

fn state() -> web::Data<AppState> {
    web::Data::new(AppState::new(SolveOptions::default(), 8))
}

fn scenario_request() -> Value {
    json!({
        "listings": [
            {"item_id": "a", "seller_id": "s1", "unit_price": 100, "stock_qty": 5, "shipping_cost": 60},
            {"item_id": "a", "seller_id": "s2", "unit_price": 90, "stock_qty": 4, "shipping_cost": 60,
             "listing_id": "p-17", "product_name": "Blue-Eyes"}
        ],
        "demand": {
            "items": [{"item_id": "a", "required_qty": 3}],
            "default_shipping_cost": 60
        }
    })
}

#[actix_web::test]
async fn test_health_check() {
    let app = test::init_service(App::new().configure(routes)).await;
    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    assert_eq!(&body[..], b"OK");
}

#[actix_web::test]
async fn test_optimize_returns_plan_document() {
    let app = test::init_service(
        App::new()
            .app_data(state())
            .app_data(json_config(JSON_LIMIT))
            .configure(routes),
    )
    .await;
    let req = test::TestRequest::post()
        .uri("/optimize")
        .set_json(scenario_request())
        .to_request();
    let plan: PlanDocument = test::call_and_read_body_json(&app, req).await;

    assert_eq!(plan.summary.grand_total, 330);
    assert_eq!(plan.summary.seller_count, 1);
    let seller = &plan.sellers["s2"];
    assert_eq!(seller.item_subtotal, 270);
    assert_eq!(seller.shipping_cost, 60);
    assert_eq!(seller.items[0].listing_id.as_deref(), Some("p-17"));
    assert_eq!(seller.items[0].product_name.as_deref(), Some("Blue-Eyes"));
    assert!(plan.solver.proven_optimal);
    assert!(plan.solver.strategy.starts_with("exact"));
}

#[actix_web::test]
async fn test_optimize_honours_requested_strategy() {
    let app = test::init_service(
        App::new()
            .app_data(state())
            .app_data(json_config(JSON_LIMIT))
            .configure(routes),
    )
    .await;
    let mut body = scenario_request();
    body["strategy"] = json!("heuristic");
    let req = test::TestRequest::post().uri("/optimize").set_json(body).to_request();
    let plan: PlanDocument = test::call_and_read_body_json(&app, req).await;

    assert_eq!(plan.solver.strategy, "heuristic");
    assert!(!plan.solver.proven_optimal);
    assert_eq!(plan.summary.grand_total, 330);
}

#[actix_web::test]
async fn test_repeated_request_is_served_from_cache() {
    let shared = state();
    let app = test::init_service(
        App::new()
            .app_data(shared.clone())
            .app_data(json_config(JSON_LIMIT))
            .configure(routes),
    )
    .await;

    let mut replies = Vec::new();
    for _ in 0..2 {
        let req = test::TestRequest::post()
            .uri("/optimize")
            .set_json(scenario_request())
            .to_request();
        let plan: PlanDocument = test::call_and_read_body_json(&app, req).await;
        replies.push(plan);
    }
    assert_eq!(shared.cache.len(), 1);
    assert!(!replies[0].solver.cached);
    assert!(replies[1].solver.cached);
    assert_eq!(replies[1].solver.elapsed_ms, 0);
    assert_eq!(replies[0].summary, replies[1].summary);
    assert_eq!(replies[0].sellers, replies[1].sellers);

    let mut other = scenario_request();
    other["demand"]["items"][0]["required_qty"] = json!(2);
    let req = test::TestRequest::post().uri("/optimize").set_json(other).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(shared.cache.len(), 2);
}

#[actix_web::test]
async fn test_insufficient_supply_maps_to_unprocessable_entity() {
    let app = test::init_service(
        App::new()
            .app_data(state())
            .app_data(json_config(JSON_LIMIT))
            .configure(routes),
    )
    .await;
    let mut body = scenario_request();
    body["demand"]["items"][0]["required_qty"] = json!(20);
    let req = test::TestRequest::post().uri("/optimize").set_json(body).to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let error: Value = test::read_body_json(resp).await;
    assert_eq!(error["kind"], "insufficient_supply");
    assert!(error["error"].as_str().unwrap().contains("'a'"));
}

#[actix_web::test]
async fn test_invalid_demand_maps_to_bad_request() {
    let app = test::init_service(
        App::new()
            .app_data(state())
            .app_data(json_config(JSON_LIMIT))
            .configure(routes),
    )
    .await;
    let mut body = scenario_request();
    body["demand"]["items"][0]["required_qty"] = json!(0);
    let req = test::TestRequest::post().uri("/optimize").set_json(body).to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let error: Value = test::read_body_json(resp).await;
    assert_eq!(error["kind"], "invalid_input");
}

#[actix_web::test]
async fn test_malformed_json_maps_to_bad_request() {
    let app = test::init_service(
        App::new()
            .app_data(state())
            .app_data(json_config(JSON_LIMIT))
            .configure(routes),
    )
    .await;
    let req = test::TestRequest::post()
        .uri("/optimize")
        .insert_header(("content-type", "application/json"))
        .set_payload("{\"listings\": [")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let error: Value = test::read_body_json(resp).await;
    assert_eq!(error["kind"], "invalid_input");
}
