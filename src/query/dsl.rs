//! Typed Elasticsearch query DSL
//!
//! Every clause the compiler can emit is a variant here; JSON is produced
//! only at the edge, when the query is sent to the engine.

use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use crate::models::SortOrder;

/// Upper bound on buckets returned by a `list` aggregate.
pub const LIST_BUCKET_LIMIT: u32 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeBound {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl RangeBound {
    pub fn as_str(&self) -> &'static str {
        match self {
            RangeBound::Gt => "gt",
            RangeBound::Gte => "gte",
            RangeBound::Lt => "lt",
            RangeBound::Lte => "lte",
        }
    }
}

/// Multi-field full-text clause shared by `query` and `or-contains` filters
#[derive(Debug, Clone, PartialEq)]
pub struct MultiMatch {
    pub query: Value,
    pub fields: Vec<String>,
    pub fuzziness: u8,
}

/// One atomic constraint in a bool query
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Match { field: String, value: Value },
    Terms { field: String, values: Vec<Value> },
    Range { field: String, bound: RangeBound, value: Value },
    Wildcard { field: String, pattern: String, case_insensitive: bool },
    MatchPhrase { field: String, value: Value },
    MultiMatch(MultiMatch),
    Prefix { field: String, value: String },
    GeoDistance { field: String, lat: f64, lon: f64, distance_km: f64 },
    /// Cardinality of the array at `field` equals `size`
    ArrayLength { field: String, size: u64 },
}

fn keyed(field: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(field.to_string(), value);
    Value::Object(map)
}

impl Clause {
    pub fn to_json(&self) -> Value {
        match self {
            Clause::Match { field, value } => json!({ "match": keyed(field, value.clone()) }),
            Clause::Terms { field, values } => {
                json!({ "terms": keyed(field, Value::Array(values.clone())) })
            }
            Clause::Range { field, bound, value } => json!({
                "range": keyed(field, json!({ bound.as_str(): value }))
            }),
            Clause::Wildcard { field, pattern, case_insensitive } => {
                let mut body = json!({ "value": pattern });
                if *case_insensitive {
                    body["case_insensitive"] = Value::Bool(true);
                }
                json!({ "wildcard": keyed(field, body) })
            }
            Clause::MatchPhrase { field, value } => {
                json!({ "match_phrase": keyed(field, value.clone()) })
            }
            Clause::MultiMatch(multi) => {
                let mut body = json!({
                    "query": multi.query,
                    "fields": multi.fields,
                });
                if multi.fuzziness > 0 {
                    body["fuzziness"] = json!(multi.fuzziness);
                }
                json!({ "multi_match": body })
            }
            Clause::Prefix { field, value } => json!({ "prefix": keyed(field, json!(value)) }),
            Clause::GeoDistance { field, lat, lon, distance_km } => {
                let mut body = keyed(field, json!({ "lat": lat, "lon": lon }));
                body["distance"] = json!(format!("{}km", distance_km));
                json!({ "geo_distance": body })
            }
            Clause::ArrayLength { field, size } => json!({
                "script": {
                    "script": {
                        "source": "doc[params.field].size() == params.size",
                        "params": { "field": field, "size": size }
                    }
                }
            }),
        }
    }
}

impl Serialize for Clause {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// `must` (AND), `must_not` (AND-NOT) and `should` (OR) clause buckets
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoolQuery {
    pub must: Vec<Clause>,
    pub must_not: Vec<Clause>,
    pub should: Vec<Clause>,
}

impl BoolQuery {
    pub fn push_must(&mut self, clause: Clause) {
        self.must.push(clause);
    }

    pub fn push_must_not(&mut self, clause: Clause) {
        self.must_not.push(clause);
    }

    /// Add `field` to the existing multi-match clause in `must`, or create
    /// one with `query` if there is none yet. All `query`/`or-contains`
    /// filters share a single clause; only the first one's text is used.
    pub fn add_or_extend_multi_match(&mut self, field: &str, query: Value, fuzziness: u8) {
        let existing = self.must.iter_mut().find_map(|clause| match clause {
            Clause::MultiMatch(multi) => Some(multi),
            _ => None,
        });

        match existing {
            Some(multi) => {
                multi.fields.push(field.to_string());
                multi.fuzziness = multi.fuzziness.max(fuzziness);
            }
            None => self.must.push(Clause::MultiMatch(MultiMatch {
                query,
                fields: vec![field.to_string()],
                fuzziness,
            })),
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "bool": {
                "must": self.must,
                "must_not": self.must_not,
                "should": self.should,
            }
        })
    }
}

/// A weighted scoring function inside a function-score query
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreFunction {
    pub filter: Clause,
    pub weight: u32,
}

impl ScoreFunction {
    pub fn to_json(&self) -> Value {
        json!({ "filter": self.filter, "weight": self.weight })
    }
}

/// Top-level query slot
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Bool(BoolQuery),
    /// Additive boosting: `score_mode` and `boost_mode` are both `sum`
    FunctionScore {
        query: BoolQuery,
        functions: Vec<ScoreFunction>,
        max_boost: u32,
    },
    /// Uniform random scoring that replaces any relevance score
    RandomScore { query: BoolQuery },
}

impl Query {
    pub fn bool_query(&self) -> &BoolQuery {
        match self {
            Query::Bool(query) => query,
            Query::FunctionScore { query, .. } => query,
            Query::RandomScore { query } => query,
        }
    }

    pub fn into_bool_query(self) -> BoolQuery {
        match self {
            Query::Bool(query) => query,
            Query::FunctionScore { query, .. } => query,
            Query::RandomScore { query } => query,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Query::Bool(query) => query.to_json(),
            Query::FunctionScore { query, functions, max_boost } => json!({
                "function_score": {
                    "query": query.to_json(),
                    "boost": 1,
                    "functions": functions.iter().map(ScoreFunction::to_json).collect::<Vec<_>>(),
                    "score_mode": "sum",
                    "boost_mode": "sum",
                    "max_boost": max_boost,
                    "min_score": 0,
                }
            }),
            Query::RandomScore { query } => json!({
                "function_score": {
                    "query": query.to_json(),
                    "random_score": {},
                    "boost_mode": "replace",
                }
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SortEntry {
    Score,
    Field { field: String, order: SortOrder },
}

impl SortEntry {
    pub fn to_json(&self) -> Value {
        match self {
            SortEntry::Score => json!({ "_score": "desc" }),
            SortEntry::Field { field, order } => keyed(field, json!(order.as_str())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Min,
    Max,
    Avg,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Min => "min",
            Metric::Max => "max",
            Metric::Avg => "avg",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Aggregation {
    Metric { metric: Metric, field: String },
    Terms { field: String, size: u32 },
    MultiTerms { fields: Vec<String>, size: u32 },
}

impl Aggregation {
    pub fn to_json(&self) -> Value {
        match self {
            Aggregation::Metric { metric, field } => json!({
                metric.as_str(): { "field": field }
            }),
            Aggregation::Terms { field, size } => json!({
                "terms": { "field": field, "size": size }
            }),
            Aggregation::MultiTerms { fields, size } => json!({
                "multi_terms": {
                    "terms": fields.iter().map(|f| json!({ "field": f })).collect::<Vec<_>>(),
                    "size": size,
                }
            }),
        }
    }
}

/// A compiled search, ready to send to the document index
#[derive(Debug, Clone, PartialEq)]
pub struct EngineQuery {
    pub index: String,
    pub query: Query,
    pub sort: Vec<SortEntry>,
    pub size: u32,
    pub from: u64,
    pub aggs: BTreeMap<String, Aggregation>,
}

impl EngineQuery {
    /// Request body for `POST /{index}/_search`
    pub fn to_body(&self) -> Value {
        let aggs: Map<String, Value> = self
            .aggs
            .iter()
            .map(|(name, agg)| (name.clone(), agg.to_json()))
            .collect();

        json!({
            "query": self.query.to_json(),
            "sort": self.sort.iter().map(SortEntry::to_json).collect::<Vec<_>>(),
            "size": self.size,
            "from": self.from,
            "track_total_hits": true,
            "aggs": aggs,
        })
    }
}
