//! Entity records: the logical tables exposed to planning.
//!
//! These are also the ingestion records. A catalog definition is a list of
//! [`Entity`] values deserialized from JSON; [`super::SemanticCatalog`]
//! checks them structurally before anything reads them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::sql::expr::{self, Expr};

/// Value type of a dimension or measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Number,
    Date,
    Boolean,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValueType::String => "string",
            ValueType::Number => "number",
            ValueType::Date => "date",
            ValueType::Boolean => "boolean",
        })
    }
}

/// How a measure is aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationKind {
    Sum,
    Count,
    Avg,
    Min,
    Max,
    CountDistinct,
}

impl AggregationKind {
    /// Wrap a column expression in this aggregation.
    pub fn apply(self, column: Expr) -> Expr {
        match self {
            AggregationKind::Sum => expr::sum(column),
            AggregationKind::Count => expr::count(column),
            AggregationKind::Avg => expr::avg(column),
            AggregationKind::Min => expr::min(column),
            AggregationKind::Max => expr::max(column),
            AggregationKind::CountDistinct => expr::count_distinct(column),
        }
    }

    /// Value type of the aggregate, given the type of its input.
    pub fn result_type(self, input: ValueType) -> ValueType {
        match self {
            AggregationKind::Count | AggregationKind::CountDistinct => ValueType::Number,
            AggregationKind::Sum | AggregationKind::Avg => ValueType::Number,
            AggregationKind::Min | AggregationKind::Max => input,
        }
    }
}

/// Cardinality of a declared join, read from the declaring entity's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinKind {
    OneToOne,
    OneToMany,
    ManyToOne,
}

impl JoinKind {
    /// The same relationship seen from the other side.
    pub fn reverse(self) -> Self {
        match self {
            JoinKind::OneToMany => JoinKind::ManyToOne,
            JoinKind::ManyToOne => JoinKind::OneToMany,
            JoinKind::OneToOne => JoinKind::OneToOne,
        }
    }

    /// Returns true if following this join can multiply rows.
    pub fn causes_fanout(&self) -> bool {
        matches!(self, JoinKind::OneToMany)
    }
}

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinKind::OneToOne => write!(f, "1:1"),
            JoinKind::OneToMany => write!(f, "1:N"),
            JoinKind::ManyToOne => write!(f, "N:1"),
        }
    }
}

/// A groupable, filterable attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    /// Source column; defaults to `name` when omitted.
    #[serde(default)]
    pub column: String,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    /// Enumerated domain, if the dimension only takes known values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// An aggregatable attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    pub name: String,
    /// Source column; defaults to `name` when omitted.
    #[serde(default)]
    pub column: String,
    pub aggregation: AggregationKind,
    #[serde(rename = "type", default = "default_measure_type")]
    pub value_type: ValueType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_measure_type() -> ValueType {
    ValueType::Number
}

/// A declared relationship from the owning entity to `target`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Join {
    pub target: String,
    pub kind: JoinKind,
    pub local_columns: Vec<String>,
    pub remote_columns: Vec<String>,
}

/// Table statistics used by the cost estimator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableStats {
    #[serde(default)]
    pub row_count: Option<u64>,
    #[serde(default)]
    pub avg_row_bytes: Option<u64>,
    /// Distinct value counts keyed by column name.
    #[serde(default)]
    pub distinct_counts: BTreeMap<String, u64>,
}

/// A logical table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub dimensions: Vec<Dimension>,
    #[serde(default)]
    pub measures: Vec<Measure>,
    #[serde(default)]
    pub joins: Vec<Join>,
    #[serde(default)]
    pub stats: TableStats,
}

/// A field of an entity: either a dimension or a measure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Field<'a> {
    Dimension(&'a Dimension),
    Measure(&'a Measure),
}

impl Field<'_> {
    pub fn name(&self) -> &str {
        match self {
            Field::Dimension(d) => &d.name,
            Field::Measure(m) => &m.name,
        }
    }

    pub fn column(&self) -> &str {
        match self {
            Field::Dimension(d) => &d.column,
            Field::Measure(m) => &m.column,
        }
    }

    pub fn is_measure(&self) -> bool {
        matches!(self, Field::Measure(_))
    }
}

impl Entity {
    /// `schema.table`, or the bare table name when no schema is declared.
    pub fn qualified_table(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{schema}.{}", self.table),
            None => self.table.clone(),
        }
    }

    pub fn dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    pub fn measure(&self, name: &str) -> Option<&Measure> {
        self.measures.iter().find(|m| m.name == name)
    }

    /// Look up a dimension or measure by name.
    pub fn field(&self, name: &str) -> Option<Field<'_>> {
        self.dimension(name)
            .map(Field::Dimension)
            .or_else(|| self.measure(name).map(Field::Measure))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.dimensions
            .iter()
            .map(|d| d.name.as_str())
            .chain(self.measures.iter().map(|m| m.name.as_str()))
    }

    /// Distinct count for a source column, if known.
    pub fn distinct_count(&self, column: &str) -> Option<u64> {
        self.stats.distinct_counts.get(column).copied()
    }

    /// Fill in defaulted source columns.
    pub(crate) fn normalize(&mut self) {
        for d in &mut self.dimensions {
            if d.column.is_empty() {
                d.column = d.name.clone();
            }
        }
        for m in &mut self.measures {
            if m.column.is_empty() {
                m.column = m.name.clone();
            }
        }
    }
}
