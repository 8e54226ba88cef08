//! xBRL-JSON (2021 REC) export.
//!
//! Emits the `documentInfo` + `facts` object described in
//! <https://www.xbrl.org/Specification/xbrl-json/REC-2021-10-13/>. Fact
//! iteration order is the instance's fact order, so exports are stable
//! across runs.

use serde_json::{json, Map, Value};

use crate::model::{Decimals, DimensionMember, FactValue, Period, XbrlInstance};
use crate::{Error, Result};

pub const DOCUMENT_TYPE: &str = "https://xbrl.org/2021/xbrl-json";

#[derive(Debug, Clone, Default)]
pub struct JsonOptions {
    /// Replace fact ids with `f1..fN` in stable iteration order instead of
    /// carrying the (often opaque) xml ids.
    pub override_fact_ids: bool,
}

pub fn to_json(instance: &XbrlInstance, options: &JsonOptions) -> Value {
    let mut facts = Map::new();
    for (index, fact) in instance.facts.iter().enumerate() {
        let fact_id = match (&fact.xml_id, options.override_fact_ids) {
            (Some(id), false) => id.to_string(),
            _ => format!("f{}", index + 1),
        };
        facts.insert(fact_id, fact_to_json(instance, fact));
    }

    json!({
        "documentInfo": {
            "documentType": DOCUMENT_TYPE,
            "taxonomy": instance.taxonomy.schema_urls(),
            "baseUrl": instance.source_url.as_str(),
        },
        "facts": facts,
    })
}

pub fn to_json_string(instance: &XbrlInstance, options: &JsonOptions) -> Result<String> {
    serde_json::to_string_pretty(&to_json(instance, options))
        .map_err(|e| Error::SchemaValidation(format!("JSON serialization failed: {e}")))
}

fn fact_to_json(instance: &XbrlInstance, fact: &crate::model::Fact) -> Value {
    let concept = instance.taxonomy.concept(fact.concept);

    let mut dimensions = Map::new();
    dimensions.insert("concept".into(), Value::String(concept.name().to_string()));

    if let Some(context_ref) = fact.context {
        let context = instance.context(context_ref);
        dimensions.insert(
            "entity".into(),
            Value::String(context.entity.identifier.to_string()),
        );
        dimensions.insert("period".into(), Value::String(period_string(&context.period)));
        for member in context.segment.iter().chain(context.scenario.iter()) {
            match member {
                DimensionMember::Explicit { dimension, member } => {
                    let axis = instance.taxonomy.concept(*dimension);
                    let value = instance.taxonomy.concept(*member);
                    dimensions.insert(
                        format!("dim:{}", axis.name()),
                        Value::String(value.name().to_string()),
                    );
                }
                DimensionMember::Typed { dimension, value } => {
                    let axis = instance.taxonomy.concept(*dimension);
                    dimensions.insert(
                        format!("dim:{}", axis.name()),
                        Value::String(value.clone()),
                    );
                }
            }
        }
    }
    if let Some(unit_ref) = fact.unit {
        dimensions.insert(
            "unit".into(),
            Value::String(instance.unit(unit_ref).to_string()),
        );
    }
    if let Some(lang) = &fact.lang {
        dimensions.insert("language".into(), Value::String(lang.to_string()));
    }

    let value = match &fact.value {
        FactValue::Text(s) | FactValue::Numeric(s) => Value::String(s.clone()),
        FactValue::Nil => Value::Null,
        FactValue::Tuple(members) => Value::Array(
            members
                .iter()
                .map(|id| json!(format!("f{}", id.0 + 1)))
                .collect(),
        ),
    };

    let mut out = Map::new();
    out.insert("value".into(), value);
    if let Some(Decimals::Value(decimals)) = fact.decimals {
        out.insert("decimals".into(), json!(decimals));
    }
    out.insert("dimensions".into(), Value::Object(dimensions));
    Value::Object(out)
}

fn period_string(period: &Period) -> String {
    match period {
        Period::Instant { date } => date.to_string(),
        Period::Duration { start, end } => format!("{start}/{end}"),
        // forever is not representable in REC-2021-10-13
        Period::Forever => String::new(),
    }
}

/// A fact as read back from xBRL-JSON, for consumers that compare exports.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct JsonFact {
    pub concept: String,
    pub entity: String,
    pub period: String,
    pub unit: Option<String>,
    pub value: String,
    pub decimals: Option<i32>,
}

/// Reads the `facts` object of an xBRL-JSON document back into comparable
/// tuples, keyed in document order.
pub fn facts_from_json(document: &Value) -> Result<Vec<(String, JsonFact)>> {
    let facts = document
        .get("facts")
        .and_then(|f| f.as_object())
        .ok_or_else(|| Error::SchemaValidation("xBRL-JSON has no facts object".into()))?;
    let mut out = Vec::with_capacity(facts.len());
    for (id, body) in facts {
        let dimensions = body
            .get("dimensions")
            .and_then(|d| d.as_object())
            .ok_or_else(|| {
                Error::SchemaValidation(format!("fact {id} has no dimensions object"))
            })?;
        let text = |key: &str| {
            dimensions
                .get(key)
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };
        out.push((
            id.clone(),
            JsonFact {
                concept: text("concept").unwrap_or_default(),
                entity: text("entity").unwrap_or_default(),
                period: text("period").unwrap_or_default(),
                unit: text("unit"),
                value: body
                    .get("value")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                decimals: body
                    .get("decimals")
                    .and_then(|d| d.as_i64())
                    .map(|d| d as i32),
            },
        ));
    }
    Ok(out)
}
