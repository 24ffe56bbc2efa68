//! Search request and response models

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::{GatewayError, GatewayResult};

/// Largest page a client may request.
pub const MAX_LIMIT: u32 = 100;

/// Highest fuzziness accepted on a filter clause.
pub const MAX_FUZZINESS: u8 = 2;

/// Filter (and boost) operators.
///
/// Anything outside the known set deserializes to `Unknown` so the
/// compiler stays total; request validation rejects it before compiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterOperator {
    Query,
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanEquals,
    LessThan,
    LessThanEquals,
    Contains,
    NotContains,
    OrContains,
    StartsWith,
    EndsWith,
    Length,
    Geo,
    #[serde(other)]
    Unknown,
}

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Query => "query",
            FilterOperator::Equals => "equals",
            FilterOperator::NotEquals => "not-equals",
            FilterOperator::GreaterThan => "greater-than",
            FilterOperator::GreaterThanEquals => "greater-than-equals",
            FilterOperator::LessThan => "less-than",
            FilterOperator::LessThanEquals => "less-than-equals",
            FilterOperator::Contains => "contains",
            FilterOperator::NotContains => "not-contains",
            FilterOperator::OrContains => "or-contains",
            FilterOperator::StartsWith => "starts-with",
            FilterOperator::EndsWith => "ends-with",
            FilterOperator::Length => "length",
            FilterOperator::Geo => "geo",
            FilterOperator::Unknown => "unknown",
        }
    }

    /// Operators a boost clause may declare. Only `equals` and
    /// `starts-with` currently produce a scoring function.
    pub fn is_boost_operator(&self) -> bool {
        !matches!(
            self,
            FilterOperator::Query | FilterOperator::Geo | FilterOperator::Unknown
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateOperator {
    Min,
    Max,
    Avg,
    List,
    #[serde(other)]
    Unknown,
}

impl AggregateOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateOperator::Min => "min",
            AggregateOperator::Max => "max",
            AggregateOperator::Avg => "avg",
            AggregateOperator::List => "list",
            AggregateOperator::Unknown => "unknown",
        }
    }
}

/// Aggregate target: one field path or several.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AggregateKey {
    Single(String),
    Multi(Vec<String>),
}

impl AggregateKey {
    /// Key under which shaped results are reported; several fields join with `,`.
    pub fn label(&self) -> String {
        match self {
            AggregateKey::Single(field) => field.clone(),
            AggregateKey::Multi(fields) => fields.join(","),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterClause {
    pub key: String,
    #[serde(default)]
    pub value: Value,
    #[serde(alias = "oprator")]
    pub operator: FilterOperator,
    #[serde(default)]
    pub fuzziness: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortClause {
    pub key: String,
    pub order: SortOrder,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateClause {
    pub key: AggregateKey,
    #[serde(alias = "oprator")]
    pub operator: AggregateOperator,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostClause {
    pub key: String,
    #[serde(default)]
    pub value: Value,
    #[serde(alias = "boost")]
    pub weight: u32,
    #[serde(alias = "oprator")]
    pub operator: FilterOperator,
}

/// Declarative search request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Target index; the configured default when absent
    #[serde(default)]
    pub index: Option<String>,

    /// Replace ranking with uniform random scoring
    #[serde(default)]
    pub random: bool,

    #[serde(default = "default_page")]
    pub page: u32,

    #[serde(default = "default_limit")]
    pub limit: u32,

    #[serde(default)]
    pub filter: Vec<FilterClause>,

    #[serde(default)]
    pub sort: Vec<SortClause>,

    #[serde(default)]
    pub aggregate: Vec<AggregateClause>,

    #[serde(default)]
    pub boost: Vec<BoostClause>,
}

fn default_page() -> u32 { 1 }
fn default_limit() -> u32 { 10 }

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            index: None,
            random: false,
            page: default_page(),
            limit: default_limit(),
            filter: Vec::new(),
            sort: Vec::new(),
            aggregate: Vec::new(),
            boost: Vec::new(),
        }
    }
}

/// An explicitly named index must not be blank.
pub fn check_index(index: Option<&str>) -> GatewayResult<()> {
    match index {
        Some(index) if index.trim().is_empty() => {
            Err(GatewayError::Validation("index cannot be empty".to_string()))
        }
        _ => Ok(()),
    }
}

impl SearchRequest {
    /// Reject malformed requests before they are compiled.
    pub fn validate(&self) -> GatewayResult<()> {
        check_index(self.index.as_deref())?;
        if self.page < 1 {
            return Err(GatewayError::Validation("page must be at least 1".to_string()));
        }
        if self.limit > MAX_LIMIT {
            return Err(GatewayError::Validation(format!(
                "limit cannot exceed {}",
                MAX_LIMIT
            )));
        }

        for (i, filter) in self.filter.iter().enumerate() {
            if filter.operator == FilterOperator::Unknown {
                return Err(GatewayError::Validation(format!(
                    "filter[{}]: unknown operator",
                    i
                )));
            }
            if filter.fuzziness > MAX_FUZZINESS {
                return Err(GatewayError::Validation(format!(
                    "filter[{}]: fuzziness must be between 0 and {}",
                    i, MAX_FUZZINESS
                )));
            }
        }

        for (i, aggregate) in self.aggregate.iter().enumerate() {
            if aggregate.operator == AggregateOperator::Unknown {
                return Err(GatewayError::Validation(format!(
                    "aggregate[{}]: unknown operator",
                    i
                )));
            }
        }

        for (i, boost) in self.boost.iter().enumerate() {
            if !boost.operator.is_boost_operator() {
                return Err(GatewayError::Validation(format!(
                    "boost[{}]: operator '{}' not allowed in boost",
                    i,
                    boost.operator.as_str()
                )));
            }
            if matches!(boost.value, Value::Null | Value::Array(_) | Value::Object(_)) {
                return Err(GatewayError::Validation(format!(
                    "boost[{}]: value must be a string, number or boolean",
                    i
                )));
            }
            if !(1..=100).contains(&boost.weight) {
                return Err(GatewayError::Validation(format!(
                    "boost[{}]: weight must be between 1 and 100",
                    i
                )));
            }
        }

        Ok(())
    }
}

/// A single search hit: engine id and score around the stored fields
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hit {
    pub id: String,
    pub score: Option<f64>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// One distinct value of a `list` aggregate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateBucket {
    pub value: Value,
    pub count: u64,
}

/// Shaped aggregate for one field
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AggregateResult {
    /// `min` / `max` / `avg` accumulated per field
    Stats(BTreeMap<String, Option<f64>>),
    /// `list` buckets in engine order
    List(Vec<AggregateBucket>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMeta {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub last_page: u64,
    pub took_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchData {
    pub hits: Vec<Hit>,
    pub aggregate: BTreeMap<String, AggregateResult>,
}

/// Full search response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    pub meta: SearchMeta,
    pub data: SearchData,
}
