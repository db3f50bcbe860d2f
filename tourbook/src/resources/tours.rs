//! Tours: schema, routes and reports

use std::collections::BTreeMap;
use std::sync::LazyLock;

use axum::{
    extract::{Path, RawQuery, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Datelike, Utc};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use super::geo::{self, Point, Unit};
use super::{query_params, reviews, ResourceRoutes};
use crate::handlers::{ApiError, ApiOperation};
use crate::query::{FilterPredicate, ProjectionSpec, QueryPreset, ResourceQuery};
use crate::repository::{Document, FieldSpec, FieldType, Model, Populate, Schema};
use crate::state::AppState;

pub const COLLECTION: &str = "tours";

/// Tours at or above this rating count towards the stats
const STATS_MIN_RATING: f64 = 4.5;

static TOUR_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z ]+$").expect("tour name regex is valid"));

fn letters_only(value: &Value, _: &Document) -> bool {
    value.as_str().is_some_and(|name| TOUR_NAME.is_match(name))
}

/// Discount must stay below the tour's price
fn below_price(value: &Value, document: &Document) -> bool {
    match (value.as_f64(), document.get("price").and_then(Value::as_f64)) {
        (Some(discount), Some(price)) => discount < price,
        _ => true,
    }
}

fn duration_weeks(document: &Document) -> Option<Value> {
    let duration = document.get("duration")?.as_f64()?;
    Some(Value::from(duration / 7.0))
}

pub fn schema() -> Schema {
    Schema::new("Tour", COLLECTION)
        .field(
            FieldSpec::string("name")
                .required("A tour must have a name")
                .unique()
                .trim()
                .max_length(40, "A tour name must have at most 40 characters")
                .min_length(10, "A tour name must have at least 10 characters")
                .validate(letters_only, "A tour name must only contain letters"),
        )
        .field(FieldSpec::string("slug"))
        .field(FieldSpec::number("duration").required("A tour must have a duration"))
        .field(FieldSpec::number("maxGroupSize").required("A tour must have a group size"))
        .field(
            FieldSpec::string("difficulty")
                .required("A tour must have a difficulty")
                .one_of(
                    ["easy", "medium", "difficult"],
                    "Available options: easy, medium, difficult",
                ),
        )
        .field(
            FieldSpec::number("ratingsAverage")
                .default_value(4.5)
                .min(1.0, "Rating must be at least 1.0")
                .max(5.0, "Rating must be at most 5.0")
                .round_to(1),
        )
        .field(FieldSpec::number("ratingsQuantity").default_value(0))
        .field(FieldSpec::number("price").required("A tour must have a price"))
        .field(FieldSpec::number("priceDiscount").validate_on_create(
            below_price,
            "Discount price ({VALUE}) must be below the regular price",
        ))
        .field(
            FieldSpec::string("summary")
                .trim()
                .required("A tour must have a summary"),
        )
        .field(FieldSpec::string("description").trim())
        .field(FieldSpec::string("imageCover").required("A tour must have a cover image"))
        .field(FieldSpec::array("images", FieldType::String))
        .field(FieldSpec::date("createdAt").default_now().hidden())
        .field(FieldSpec::array("startDates", FieldType::Date))
        .field(FieldSpec::boolean("secretTour").default_value(false))
        .field(FieldSpec::object("startLocation"))
        .field(FieldSpec::array("locations", FieldType::Object))
        .field(FieldSpec::references("guides", super::users::COLLECTION))
        .always_filter(FilterPredicate::ne("secretTour", true))
        .auto_populate(
            Populate::path("guides").select(ProjectionSpec::excluding(["__v", "passwordChangedAt"])),
        )
        .virtual_relation("reviews", reviews::COLLECTION, "tour", "_id")
        .computed("durationWeeks", duration_weeks)
        .slug("name", "slug")
}

fn routes() -> ResourceRoutes {
    ResourceRoutes::new(COLLECTION).populate_on_read(vec![Populate::path("reviews")])
}

pub fn router() -> Router<AppState> {
    let tours = routes();
    let top_five = tours.clone();

    Router::new()
        .route("/", tours.collection_routes())
        .route(
            "/top-5-cheap",
            get(
                move |State(state): State<AppState>, RawQuery(query): RawQuery| async move {
                    let params = QueryPreset::top_five_cheap().apply(query_params(query.as_deref()));
                    top_five.list(&state, params, None).await
                },
            ),
        )
        .route("/tour-stats", get(tour_stats))
        .route("/monthly-plan/{year}", get(monthly_plan))
        .route(
            "/tours-within-radius/{distance}/center/{latlng}/unit/{unit}",
            get(tours_within_radius),
        )
        .route("/distances/{latlng}/unit/{unit}", get(distances))
        .route("/{id}", tours.document_routes())
        .route("/{id}/reviews", reviews::nested_routes())
}

/// Rating and price summary for one difficulty level
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyStats {
    #[serde(rename = "_id")]
    pub difficulty: String,
    pub num_tours: u64,
    pub num_ratings: f64,
    pub avg_rating: f64,
    pub avg_price: f64,
    pub min_price: f64,
    pub max_price: f64,
}

#[derive(Debug, Default)]
struct StatsAccumulator {
    tours: u64,
    ratings: f64,
    rating_sum: f64,
    price_sum: f64,
    min_price: Option<f64>,
    max_price: Option<f64>,
}

/// Group well-rated tours by difficulty, cheapest group first
pub fn summarize_difficulty(tours: &[Document]) -> Vec<DifficultyStats> {
    let mut groups: BTreeMap<String, StatsAccumulator> = BTreeMap::new();

    for tour in tours {
        let rating = tour.get("ratingsAverage").and_then(Value::as_f64);
        if !rating.is_some_and(|r| r >= STATS_MIN_RATING) {
            continue;
        }
        let difficulty = tour
            .get("difficulty")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_uppercase();
        let price = tour.get("price").and_then(Value::as_f64).unwrap_or_default();

        let group = groups.entry(difficulty).or_default();
        group.tours += 1;
        group.ratings += tour
            .get("ratingsQuantity")
            .and_then(Value::as_f64)
            .unwrap_or_default();
        group.rating_sum += rating.unwrap_or_default();
        group.price_sum += price;
        group.min_price = Some(group.min_price.map_or(price, |m| m.min(price)));
        group.max_price = Some(group.max_price.map_or(price, |m| m.max(price)));
    }

    let mut stats = groups
        .into_iter()
        .map(|(difficulty, group)| {
            let count = group.tours as f64;
            DifficultyStats {
                difficulty,
                num_tours: group.tours,
                num_ratings: group.ratings,
                avg_rating: group.rating_sum / count,
                avg_price: group.price_sum / count,
                min_price: group.min_price.unwrap_or_default(),
                max_price: group.max_price.unwrap_or_default(),
            }
        })
        .collect::<Vec<_>>();
    stats.sort_by(|a, b| a.avg_price.total_cmp(&b.avg_price));
    stats
}

/// Tour starts within one calendar month
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthPlan {
    pub month: u32,
    pub num_tour_starts: u64,
    pub tours: Vec<String>,
}

/// Count tour starts per month of `year`, busiest month first
pub fn plan_year(tours: &[Document], year: i32) -> Vec<MonthPlan> {
    let mut months: BTreeMap<u32, MonthPlan> = BTreeMap::new();

    for tour in tours {
        let name = tour.get("name").and_then(Value::as_str).unwrap_or_default();
        let starts = tour
            .get("startDates")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .filter_map(|date| DateTime::parse_from_rfc3339(date).ok())
            .map(|date| date.with_timezone(&Utc))
            .filter(|date| date.year() == year);

        for start in starts {
            let plan = months.entry(start.month()).or_insert_with(|| MonthPlan {
                month: start.month(),
                num_tour_starts: 0,
                tours: Vec::new(),
            });
            plan.num_tour_starts += 1;
            plan.tours.push(name.to_string());
        }
    }

    let mut plan = months.into_values().collect::<Vec<_>>();
    // Stable: equal counts stay in calendar order
    plan.sort_by(|a, b| b.num_tour_starts.cmp(&a.num_tour_starts));
    plan.truncate(12);
    plan
}

async fn visible_tours(state: &AppState) -> Result<Vec<Document>, ApiError> {
    let tours = state.store().model(COLLECTION)?;
    let documents = tours
        .find(&ResourceQuery::unbounded(Vec::new()))
        .await
        .map_err(|err| ApiError::from(err).with_operation(ApiOperation::Aggregate))?;
    Ok(documents)
}

/// `GET /tours/tour-stats`
pub async fn tour_stats(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let stats = summarize_difficulty(&visible_tours(&state).await?);
    Ok(Json(serde_json::json!({
        "status": "success",
        "stats": stats,
    })))
}

/// `GET /tours/monthly-plan/{year}`
pub async fn monthly_plan(
    State(state): State<AppState>,
    Path(year): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let year = year
        .trim()
        .parse::<i32>()
        .map_err(|_| ApiError::bad_request(format!("Invalid year: {}.", year)))?;
    let plan = plan_year(&visible_tours(&state).await?, year);
    Ok(Json(serde_json::json!({
        "status": "success",
        "plan": plan,
    })))
}

/// `GET /tours/tours-within-radius/{distance}/center/{latlng}/unit/{unit}`
pub async fn tours_within_radius(
    State(state): State<AppState>,
    Path((distance, latlng, unit)): Path<(String, String, String)>,
) -> Result<Json<Value>, ApiError> {
    let center = Point::parse(&latlng)?;
    let distance = distance
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| ApiError::bad_request(format!("Invalid distance: {}.", distance)))?;

    let tours = geo::within_radius(visible_tours(&state).await?, center, distance, Unit::parse(&unit));
    Ok(Json(serde_json::json!({
        "status": "success",
        "results": tours.len(),
        "data": { "data": tours },
    })))
}

/// `GET /tours/distances/{latlng}/unit/{unit}`
pub async fn distances(
    State(state): State<AppState>,
    Path((latlng, unit)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let origin = Point::parse(&latlng)?;
    let rows = geo::distances_from(&visible_tours(&state).await?, origin, Unit::parse(&unit));
    Ok(Json(serde_json::json!({
        "status": "success",
        "data": { "data": rows },
    })))
}
