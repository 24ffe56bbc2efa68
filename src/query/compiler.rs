//! Search request compiler
//!
//! Translates a [`SearchRequest`] into an [`EngineQuery`]. Compilation is
//! pure and total: clauses whose operator or value cannot be translated are
//! dropped instead of failing the whole request.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::models::{
    AggregateClause, AggregateKey, AggregateOperator, BoostClause, FilterClause, FilterOperator,
    SearchRequest,
};
use crate::query::dsl::{
    Aggregation, BoolQuery, Clause, EngineQuery, Metric, Query, RangeBound, ScoreFunction,
    SortEntry, LIST_BUCKET_LIMIT,
};

/// Ground distance (km) spanned by a zoom-0 map tile at the equator.
const EQUATOR_TILE_KM: f64 = 38_000.0;

/// Geo filter value: map centre and zoom level
#[derive(Debug, Deserialize)]
struct GeoViewport {
    lat: f64,
    lon: f64,
    zoom: f64,
}

/// Search radius (km) visible around `lat` at a slippy-map `zoom` level.
pub fn zoom_radius_km(lat: f64, zoom: f64) -> f64 {
    (EQUATOR_TILE_KM / 2f64.powf(zoom)) * lat.to_radians().cos()
}

/// Name of the aggregation compiled for `clause`, e.g. `price_min`.
pub fn aggregation_name(clause: &AggregateClause) -> String {
    format!("{}_{}", clause.key.label(), clause.operator.as_str())
}

/// Compile `request`, targeting `default_index` when it names no index.
pub fn compile(request: &SearchRequest, default_index: &str) -> EngineQuery {
    let mut bool_query = BoolQuery::default();
    for filter in &request.filter {
        apply_filter(&mut bool_query, filter);
    }

    let mut sort: Vec<SortEntry> = request
        .sort
        .iter()
        .map(|clause| SortEntry::Field {
            field: clause.key.clone(),
            order: clause.order,
        })
        .collect();

    let mut query = if request.boost.is_empty() {
        Query::Bool(bool_query)
    } else {
        sort.insert(0, SortEntry::Score);
        Query::FunctionScore {
            query: bool_query,
            functions: request.boost.iter().filter_map(score_function).collect(),
            max_boost: request.boost.iter().map(|b| b.weight).sum(),
        }
    };

    // Applied last: random scoring discards any boost functions.
    if request.random {
        query = Query::RandomScore {
            query: query.into_bool_query(),
        };
    }

    EngineQuery {
        index: request
            .index
            .clone()
            .unwrap_or_else(|| default_index.to_string()),
        query,
        sort,
        size: request.limit,
        from: u64::from(request.page.saturating_sub(1)) * u64::from(request.limit),
        aggs: compile_aggregations(&request.aggregate),
    }
}

fn apply_filter(query: &mut BoolQuery, filter: &FilterClause) {
    let field = filter.key.clone();
    let value = &filter.value;

    if value.is_null() {
        return;
    }

    match filter.operator {
        FilterOperator::Equals => match value {
            Value::Array(values) => query.push_must(Clause::Terms { field, values: values.clone() }),
            _ => query.push_must(Clause::Match { field, value: value.clone() }),
        },
        FilterOperator::NotEquals => {
            query.push_must_not(Clause::Match { field, value: value.clone() });
        }
        FilterOperator::GreaterThan => query.push_must(range(field, RangeBound::Gt, value)),
        FilterOperator::GreaterThanEquals => query.push_must(range(field, RangeBound::Gte, value)),
        FilterOperator::LessThan => query.push_must(range(field, RangeBound::Lt, value)),
        FilterOperator::LessThanEquals => query.push_must(range(field, RangeBound::Lte, value)),
        FilterOperator::Contains => match value {
            Value::Array(values) => match values.as_slice() {
                [Value::String(single)] => query.push_must(Clause::Wildcard {
                    field,
                    pattern: format!("*{}*", single.to_lowercase()),
                    case_insensitive: true,
                }),
                _ => query.push_must(Clause::Terms { field, values: values.clone() }),
            },
            _ => query.push_must(Clause::MatchPhrase { field, value: value.clone() }),
        },
        FilterOperator::NotContains => match value {
            Value::Array(values) => {
                query.push_must_not(Clause::Terms { field, values: values.clone() })
            }
            _ => query.push_must_not(Clause::MatchPhrase { field, value: value.clone() }),
        },
        FilterOperator::Query | FilterOperator::OrContains => {
            if scalar_text(value).is_some() {
                query.add_or_extend_multi_match(&field, value.clone(), filter.fuzziness);
            }
        }
        FilterOperator::StartsWith => {
            if let Some(text) = scalar_text(value) {
                query.push_must(Clause::Prefix { field, value: text });
            }
        }
        FilterOperator::EndsWith => {
            if let Some(text) = scalar_text(value) {
                query.push_must(Clause::Wildcard {
                    field,
                    pattern: format!("*{}", text),
                    case_insensitive: false,
                });
            }
        }
        FilterOperator::Length => {
            if let Some(size) = value.as_u64() {
                query.push_must(Clause::ArrayLength {
                    field: data_field(&field),
                    size,
                });
            }
        }
        FilterOperator::Geo => {
            if let Ok(viewport) = GeoViewport::deserialize(value) {
                query.push_must(Clause::GeoDistance {
                    field,
                    lat: viewport.lat,
                    lon: viewport.lon,
                    distance_km: zoom_radius_km(viewport.lat, viewport.zoom),
                });
            }
        }
        FilterOperator::Unknown => {}
    }
}

/// Script fields live under the document's `data` object; bare keys are
/// resolved there, already-qualified `data.` paths are kept.
fn data_field(key: &str) -> String {
    if key.starts_with("data.") {
        key.to_string()
    } else {
        format!("data.{}", key)
    }
}

fn range(field: String, bound: RangeBound, value: &Value) -> Clause {
    Clause::Range { field, bound, value: value.clone() }
}

/// Text form of a scalar value; `None` for arrays, objects and null.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn score_function(boost: &BoostClause) -> Option<ScoreFunction> {
    let filter = match boost.operator {
        FilterOperator::StartsWith => Clause::Wildcard {
            field: boost.key.clone(),
            pattern: format!("{}*", scalar_text(&boost.value)?),
            case_insensitive: false,
        },
        FilterOperator::Equals => {
            if boost.value.is_null() {
                return None;
            }
            Clause::Match {
                field: boost.key.clone(),
                value: boost.value.clone(),
            }
        }
        // No scoring function for other operators.
        _ => return None,
    };

    Some(ScoreFunction { filter, weight: boost.weight })
}

fn compile_aggregations(clauses: &[AggregateClause]) -> BTreeMap<String, Aggregation> {
    let mut aggs = BTreeMap::new();

    for clause in clauses {
        let aggregation = match (&clause.key, clause.operator) {
            (AggregateKey::Single(field), AggregateOperator::Min) => metric(Metric::Min, field),
            (AggregateKey::Single(field), AggregateOperator::Max) => metric(Metric::Max, field),
            (AggregateKey::Single(field), AggregateOperator::Avg) => metric(Metric::Avg, field),
            (AggregateKey::Single(field), AggregateOperator::List) => Aggregation::Terms {
                field: field.clone(),
                size: LIST_BUCKET_LIMIT,
            },
            (AggregateKey::Multi(fields), AggregateOperator::List) => Aggregation::MultiTerms {
                fields: fields.clone(),
                size: LIST_BUCKET_LIMIT,
            },
            // Metric aggregations take exactly one field.
            (AggregateKey::Multi(_), _) | (_, AggregateOperator::Unknown) => continue,
        };

        aggs.insert(aggregation_name(clause), aggregation);
    }

    aggs
}

fn metric(metric: Metric, field: &str) -> Aggregation {
    Aggregation::Metric { metric, field: field.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(value: Value) -> SearchRequest {
        serde_json::from_value(value).unwrap()
    }

    /// Compile against the `profile` index.
    fn compile(request: &SearchRequest) -> EngineQuery {
        super::compile(request, "profile")
    }

    fn body(value: Value) -> Value {
        compile(&request(value)).to_body()
    }

    #[test]
    fn empty_request_compiles_to_match_all_bool() {
        let query = compile(&SearchRequest::default());

        assert_eq!(query.index, "profile");
        assert_eq!(query.query, Query::Bool(BoolQuery::default()));
        assert!(query.sort.is_empty());
        assert_eq!(query.size, 10);
        assert_eq!(query.from, 0);

        let body = query.to_body();
        assert_eq!(body["track_total_hits"], true);
        assert_eq!(body["aggs"], json!({}));
    }

    #[test]
    fn pagination_sets_from_and_size() {
        let query = compile(&request(json!({ "page": 3, "limit": 25 })));

        assert_eq!(query.size, 25);
        assert_eq!(query.from, 50);
    }

    #[test]
    fn compiling_twice_is_byte_identical() {
        let input = json!({
            "index": "profile",
            "filter": [
                { "key": "data.city", "value": ["Tehran", "Shiraz"], "operator": "equals" },
                { "key": "data.gender", "value": "f", "operator": "not-equals" },
                { "key": "data.age", "value": 18, "operator": "greater-than-equals" },
                { "key": "data.age", "value": 40, "operator": "less-than" },
                { "key": "data.bio", "value": "music", "operator": "contains" },
                { "key": "data.tags", "value": ["smoker"], "operator": "not-contains" },
                { "key": "data.name", "value": "sa", "operator": "starts-with" },
                { "key": "data.email", "value": "@mail.com", "operator": "ends-with" },
                { "key": "data.photos", "value": 3, "operator": "length" },
                { "key": "location", "value": { "lat": 35.7, "lon": 51.4, "zoom": 10 }, "operator": "geo" },
                { "key": "data.bio", "value": "hiking", "operator": "query" }
            ],
            "sort": [{ "key": "updatedAt", "order": "desc" }],
            "aggregate": [{ "key": "data.age", "operator": "avg" }],
            "boost": [{ "key": "data.vip", "value": true, "weight": 10, "operator": "equals" }]
        });

        let first = serde_json::to_string(&body(input.clone())).unwrap();
        let second = serde_json::to_string(&body(input)).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn equals_uses_terms_for_arrays_and_match_for_scalars() {
        let query = compile(&request(json!({
            "filter": [
                { "key": "data.city", "value": ["Tehran", "Karaj"], "operator": "equals" },
                { "key": "data.gender", "value": "m", "operator": "equals" }
            ]
        })));

        let must = &query.query.bool_query().must;
        assert_eq!(
            must[0],
            Clause::Terms { field: "data.city".into(), values: vec![json!("Tehran"), json!("Karaj")] }
        );
        assert_eq!(must[1], Clause::Match { field: "data.gender".into(), value: json!("m") });
    }

    #[test]
    fn range_operators_map_to_bounds() {
        let query = compile(&request(json!({
            "filter": [
                { "key": "a", "value": 1, "operator": "greater-than" },
                { "key": "b", "value": 2, "operator": "greater-than-equals" },
                { "key": "c", "value": 3, "operator": "less-than" },
                { "key": "d", "value": "2024-01-01", "operator": "less-than-equals" }
            ]
        })));

        let bounds: Vec<RangeBound> = query
            .query
            .bool_query()
            .must
            .iter()
            .map(|clause| match clause {
                Clause::Range { bound, .. } => *bound,
                other => panic!("unexpected clause {:?}", other),
            })
            .collect();

        assert_eq!(bounds, vec![RangeBound::Gt, RangeBound::Gte, RangeBound::Lt, RangeBound::Lte]);
    }

    #[test]
    fn contains_depends_on_value_shape() {
        let query = compile(&request(json!({
            "filter": [
                { "key": "data.name", "value": ["AlI"], "operator": "contains" },
                { "key": "data.tags", "value": ["a", "b"], "operator": "contains" },
                { "key": "data.bio", "value": "green tea", "operator": "contains" }
            ]
        })));

        let must = &query.query.bool_query().must;
        assert_eq!(
            must[0],
            Clause::Wildcard { field: "data.name".into(), pattern: "*ali*".into(), case_insensitive: true }
        );
        assert!(matches!(&must[1], Clause::Terms { values, .. } if values.len() == 2));
        assert_eq!(must[2], Clause::MatchPhrase { field: "data.bio".into(), value: json!("green tea") });
    }

    #[test]
    fn negations_land_in_must_not() {
        let query = compile(&request(json!({
            "filter": [
                { "key": "data.status", "value": "banned", "operator": "not-equals" },
                { "key": "data.tags", "value": ["x"], "operator": "not-contains" },
                { "key": "data.bio", "value": "spam", "operator": "not-contains" }
            ]
        })));

        let bool_query = query.query.bool_query();
        assert!(bool_query.must.is_empty());
        assert_eq!(bool_query.must_not.len(), 3);
        assert!(matches!(bool_query.must_not[1], Clause::Terms { .. }));
        assert!(matches!(bool_query.must_not[2], Clause::MatchPhrase { .. }));
    }

    #[test]
    fn or_contains_filters_merge_into_one_multi_match() {
        let body = body(json!({
            "filter": [
                { "key": "title", "value": "rust", "operator": "or-contains" },
                { "key": "body", "value": "rust", "operator": "or-contains" }
            ]
        }));

        let must = body["query"]["bool"]["must"].as_array().unwrap();
        assert_eq!(must.len(), 1);
        assert_eq!(must[0], json!({ "multi_match": { "query": "rust", "fields": ["title", "body"] } }));
    }

    #[test]
    fn query_and_or_contains_share_the_clause() {
        let query = compile(&request(json!({
            "filter": [
                { "key": "data.bio", "value": "art", "operator": "query", "fuzziness": 1 },
                { "key": "data.age", "value": 20, "operator": "greater-than" },
                { "key": "data.job", "value": "art", "operator": "or-contains" }
            ]
        })));

        let must = &query.query.bool_query().must;
        assert_eq!(must.len(), 2);
        assert!(matches!(&must[0], Clause::MultiMatch(m) if m.fields == ["data.bio", "data.job"] && m.fuzziness == 1));
    }

    #[test]
    fn prefix_suffix_and_length() {
        let query = compile(&request(json!({
            "filter": [
                { "key": "data.name", "value": "Ma", "operator": "starts-with" },
                { "key": "data.phone", "value": 1234, "operator": "ends-with" },
                { "key": "data.photos", "value": 2, "operator": "length" }
            ]
        })));

        let must = &query.query.bool_query().must;
        assert_eq!(must[0], Clause::Prefix { field: "data.name".into(), value: "Ma".into() });
        assert_eq!(
            must[1],
            Clause::Wildcard { field: "data.phone".into(), pattern: "*1234".into(), case_insensitive: false }
        );
        assert_eq!(must[2], Clause::ArrayLength { field: "data.photos".into(), size: 2 });
    }

    #[test]
    fn length_counts_the_array_under_data() {
        let body = body(json!({
            "filter": [
                { "key": "photos", "value": 2, "operator": "length" },
                { "key": "data.tags", "value": 0, "operator": "length" }
            ]
        }));

        let must = &body["query"]["bool"]["must"];
        assert_eq!(must[0]["script"]["script"]["params"], json!({ "field": "data.photos", "size": 2 }));
        assert_eq!(must[1]["script"]["script"]["params"], json!({ "field": "data.tags", "size": 0 }));
    }

    #[test]
    fn request_index_overrides_default() {
        let query = super::compile(&request(json!({ "index": "blog" })), "profile");
        assert_eq!(query.index, "blog");

        let query = super::compile(&SearchRequest::default(), "profiles-v2");
        assert_eq!(query.index, "profiles-v2");
    }

    #[test]
    fn geo_radius_is_derived_from_zoom() {
        let query = compile(&request(json!({
            "filter": [{ "key": "location", "value": { "lat": 35.7, "lon": 51.4, "zoom": 10 }, "operator": "geo" }]
        })));

        let expected = (38000.0 / 2f64.powi(10)) * (35.7 * std::f64::consts::PI / 180.0).cos();
        match &query.query.bool_query().must[0] {
            Clause::GeoDistance { field, lat, lon, distance_km } => {
                assert_eq!(field, "location");
                assert_eq!((*lat, *lon), (35.7, 51.4));
                assert!((distance_km - expected).abs() < 1e-9);
                assert!((distance_km - 30.13).abs() < 0.01);
            }
            other => panic!("unexpected clause {:?}", other),
        }
    }

    #[test]
    fn unknown_operator_adds_no_clause() {
        let query = compile(&request(json!({
            "filter": [
                { "key": "data.name", "value": "x", "operator": "sounds-like" },
                { "key": "data.city", "value": "Qom", "operator": "equals" }
            ]
        })));

        let bool_query = query.query.bool_query();
        assert_eq!(bool_query.must.len(), 1);
        assert!(bool_query.must_not.is_empty());
    }

    #[test]
    fn ill_shaped_values_are_dropped() {
        let query = compile(&request(json!({
            "filter": [
                { "key": "location", "value": "tehran", "operator": "geo" },
                { "key": "data.photos", "value": "two", "operator": "length" },
                { "key": "data.name", "value": { "a": 1 }, "operator": "starts-with" },
                { "key": "data.bio", "value": ["a"], "operator": "query" },
                { "key": "data.city", "operator": "equals" }
            ]
        })));

        assert_eq!(query.query, Query::Bool(BoolQuery::default()));
    }

    #[test]
    fn sort_keeps_input_order() {
        let body = body(json!({
            "sort": [
                { "key": "data.age", "order": "asc" },
                { "key": "createdAt", "order": "desc" }
            ]
        }));

        assert_eq!(body["sort"], json!([{ "data.age": "asc" }, { "createdAt": "desc" }]));
    }

    #[test]
    fn boosts_are_additive() {
        let query = compile(&request(json!({
            "sort": [{ "key": "createdAt", "order": "desc" }],
            "boost": [
                { "key": "data.city", "value": "Tehran", "weight": 20, "operator": "equals" },
                { "key": "data.name", "value": "Ar", "weight": 30, "operator": "starts-with" }
            ]
        })));

        match &query.query {
            Query::FunctionScore { functions, max_boost, .. } => {
                assert_eq!(*max_boost, 50);
                assert_eq!(functions.len(), 2);
                assert_eq!(functions[0].weight, 20);
                assert_eq!(
                    functions[1].filter,
                    Clause::Wildcard { field: "data.name".into(), pattern: "Ar*".into(), case_insensitive: false }
                );
            }
            other => panic!("expected function score, got {:?}", other),
        }

        let body = query.to_body();
        let function_score = &body["query"]["function_score"];
        assert_eq!(function_score["score_mode"], "sum");
        assert_eq!(function_score["boost_mode"], "sum");
        assert_eq!(function_score["max_boost"], 50);
        assert_eq!(function_score["min_score"], 0);
        assert_eq!(function_score["boost"], 1);
        assert_eq!(body["sort"], json!([{ "_score": "desc" }, { "createdAt": "desc" }]));
    }

    #[test]
    fn unsupported_boost_operators_count_toward_max_boost_only() {
        let query = compile(&request(json!({
            "boost": [
                { "key": "data.age", "value": 30, "weight": 5, "operator": "greater-than" },
                { "key": "data.vip", "value": true, "weight": 7, "operator": "equals" }
            ]
        })));

        match &query.query {
            Query::FunctionScore { functions, max_boost, .. } => {
                assert_eq!(functions.len(), 1);
                assert_eq!(*max_boost, 12);
            }
            other => panic!("expected function score, got {:?}", other),
        }
    }

    #[test]
    fn random_replaces_boost_scoring() {
        let body = body(json!({
            "random": true,
            "filter": [{ "key": "data.city", "value": "Tabriz", "operator": "equals" }],
            "boost": [{ "key": "data.vip", "value": true, "weight": 10, "operator": "equals" }]
        }));

        let function_score = &body["query"]["function_score"];
        assert_eq!(function_score["random_score"], json!({}));
        assert_eq!(function_score["boost_mode"], "replace");
        assert!(function_score.get("functions").is_none());
        assert_eq!(
            function_score["query"]["bool"]["must"],
            json!([{ "match": { "data.city": "Tabriz" } }])
        );
    }

    #[test]
    fn random_without_boost_wraps_bool_query() {
        let query = compile(&request(json!({
            "random": true,
            "filter": [{ "key": "data.age", "value": 30, "operator": "less-than" }]
        })));

        assert!(matches!(&query.query, Query::RandomScore { query } if query.must.len() == 1));
        assert!(query.sort.is_empty());
    }

    #[test]
    fn aggregations_are_named_by_key_and_operator() {
        let query = compile(&request(json!({
            "aggregate": [
                { "key": "price", "operator": "min" },
                { "key": "price", "operator": "max" },
                { "key": "data.city", "operator": "list" },
                { "key": ["data.city", "data.gender"], "operator": "list" },
                { "key": ["data.a", "data.b"], "operator": "avg" }
            ]
        })));

        let names: Vec<&str> = query.aggs.keys().map(String::as_str).collect();
        assert_eq!(
            names,
            vec!["data.city,data.gender_list", "data.city_list", "price_max", "price_min"]
        );
        assert_eq!(
            query.aggs["data.city_list"],
            Aggregation::Terms { field: "data.city".into(), size: 10_000 }
        );
        assert_eq!(
            query.to_body()["aggs"]["price_min"],
            json!({ "min": { "field": "price" } })
        );
    }
}
