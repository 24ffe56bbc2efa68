//! Result shaping
//!
//! Turns the engine's raw search response into the gateway's paginated,
//! scored, aggregated envelope.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::models::{
    AggregateBucket, AggregateOperator, AggregateResult, Hit, SearchData, SearchMeta,
    SearchRequest, SearchResponse,
};
use crate::query::compiler::aggregation_name;
use crate::search_db::{RawHit, RawSearchResponse};

/// Number of pages for `total` hits, never less than one.
pub fn last_page(total: u64, limit: u32) -> u64 {
    if limit == 0 {
        return 1;
    }
    total.div_ceil(u64::from(limit)).max(1)
}

pub fn shape(raw: RawSearchResponse, request: &SearchRequest, took_ms: u64) -> SearchResponse {
    let total = raw.hits.total.as_ref().map_or(0, |t| t.value);
    let hits = raw.hits.hits.into_iter().map(shape_hit).collect();
    let aggregate = shape_aggregates(&raw.aggregations, request);

    SearchResponse {
        meta: SearchMeta {
            page: request.page,
            limit: request.limit,
            total,
            last_page: last_page(total, request.limit),
            took_ms,
        },
        data: SearchData { hits, aggregate },
    }
}

fn shape_hit(hit: RawHit) -> Hit {
    let mut fields = hit.source;
    // `id` and `score` are reserved for the engine's values.
    fields.remove("id");
    fields.remove("score");

    Hit {
        id: hit.id,
        score: hit.score,
        fields,
    }
}

fn shape_aggregates(
    raw: &serde_json::Map<String, Value>,
    request: &SearchRequest,
) -> BTreeMap<String, AggregateResult> {
    let mut shaped: BTreeMap<String, AggregateResult> = BTreeMap::new();

    for clause in &request.aggregate {
        let Some(bucket) = raw.get(&aggregation_name(clause)) else {
            continue;
        };
        let key = clause.key.label();

        match clause.operator {
            AggregateOperator::Min | AggregateOperator::Max | AggregateOperator::Avg => {
                let value = bucket.get("value").and_then(Value::as_f64);
                let stat = clause.operator.as_str().to_string();

                match shaped.get_mut(&key) {
                    Some(AggregateResult::Stats(stats)) => {
                        stats.insert(stat, value);
                    }
                    // A stat after a `list` on the same key starts a fresh object.
                    _ => {
                        shaped.insert(key, AggregateResult::Stats(BTreeMap::from([(stat, value)])));
                    }
                }
            }
            AggregateOperator::List => {
                let buckets = bucket
                    .get("buckets")
                    .and_then(Value::as_array)
                    .map(|buckets| {
                        buckets
                            .iter()
                            .map(|b| AggregateBucket {
                                value: b.get("key").cloned().unwrap_or(Value::Null),
                                count: b.get("doc_count").and_then(Value::as_u64).unwrap_or(0),
                            })
                            .collect()
                    })
                    .unwrap_or_default();

                shaped.insert(key, AggregateResult::List(buckets));
            }
            AggregateOperator::Unknown => {}
        }
    }

    shaped
}
