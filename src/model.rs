use chrono::NaiveDate;
use compact_str::CompactString;
use std::collections::HashMap;

use crate::taxonomy::Taxonomy;

// ============================================================================
// Core XBRL data structures
// ============================================================================

/// Namespace-qualified name. The `(namespace, local_name)` pair is globally
/// unique for concepts across a DTS.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    pub namespace: CompactString,
    pub local_name: CompactString,
}

impl QName {
    pub fn new(namespace: impl Into<CompactString>, local_name: impl Into<CompactString>) -> Self {
        Self {
            namespace: namespace.into(),
            local_name: local_name.into(),
        }
    }
}

impl std::fmt::Display for QName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.local_name)
        } else {
            write!(f, "{{{}}}{}", self.namespace, self.local_name)
        }
    }
}

/// Integer handle into the concept arena owned by [`Taxonomy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConceptId(pub u32);

/// What a concept's substitution-group chain makes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConceptKind {
    Item,
    Tuple,
    Dimension,
    Hypercube,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodType {
    Instant,
    Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Balance {
    Debit,
    Credit,
}

/// A reportable element declared in a taxonomy schema, i.e.
/// `<xs:element id="us-gaap_Assets" name="Assets" nillable="true"
///  substitutionGroup="xbrli:item" type="xbrli:monetaryItemType"
///  xbrli:balance="debit" xbrli:periodType="instant"/>`.
///
/// Immutable once its owning schema is parsed.
#[derive(Debug, Clone)]
pub struct Concept {
    pub qname: QName,
    /// XML id within the declaring schema; linkbase locators point here.
    pub xml_id: Option<CompactString>,
    pub schema_url: CompactString,
    /// Declared type as written, e.g. `xbrli:monetaryItemType`.
    pub concept_type: Option<CompactString>,
    /// Substitution group as a resolved qname, if declared.
    pub substitution_group: Option<QName>,
    pub kind: ConceptKind,
    pub period_type: Option<PeriodType>,
    pub balance: Option<Balance>,
    pub nillable: bool,
    pub abstract_: bool,
    /// Any further attributes carried by the declaration (extension
    /// taxonomies attach arbitrary ones).
    pub attributes: HashMap<QName, String>,
}

impl Concept {
    pub fn name(&self) -> &str {
        &self.qname.local_name
    }

    /// Whether facts of this concept carry a unit. Decided by the declared
    /// item type: the XBRL 2.1 numeric item type families.
    pub fn is_numeric(&self) -> bool {
        let Some(ty) = &self.concept_type else {
            return false;
        };
        let local = ty.rsplit(':').next().unwrap_or(ty).to_ascii_lowercase();
        // monetaryItemType, sharesItemType, perShareItemType, percentItemType,
        // the decimal/float/double families and the XML Schema integer tower
        const NUMERIC_STEMS: [&str; 10] = [
            "monetary", "shares", "decimal", "float", "double", "integer", "fraction", "pure",
            "percent", "intitemtype",
        ];
        NUMERIC_STEMS.iter().any(|stem| local.contains(stem))
            || local.starts_with("long")
            || local.starts_with("short")
    }
}

/// A label resource attached to a concept, e.g.
/// `<link:label xlink:role=".../role/terseLabel" xml:lang="en-US">Assets</link:label>`.
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub role: CompactString,
    pub lang: CompactString,
    pub text: String,
}

pub const STANDARD_LABEL_ROLE: &str = "http://www.xbrl.org/2003/role/label";

// ============================================================================
// Instance-side structures: contexts, units, facts
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Period {
    Instant { date: NaiveDate },
    Duration { start: NaiveDate, end: NaiveDate },
    Forever,
}

impl Period {
    pub fn period_type(&self) -> PeriodType {
        match self {
            Period::Instant { .. } => PeriodType::Instant,
            _ => PeriodType::Duration,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub scheme: CompactString,
    pub identifier: CompactString,
}

/// One axis/member qualification of a context, either explicit
/// (`xbrldi:explicitMember`) or typed (`xbrldi:typedMember`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DimensionMember {
    Explicit {
        dimension: ConceptId,
        member: ConceptId,
    },
    Typed {
        dimension: ConceptId,
        /// Literal member value, serialized XML.
        value: String,
    },
}

#[derive(Debug, Clone)]
pub struct Context {
    pub id: CompactString,
    pub entity: Entity,
    pub period: Period,
    pub segment: Vec<DimensionMember>,
    pub scenario: Vec<DimensionMember>,
}

impl Context {
    /// Normalized comparison key: two contexts with equal entity, period and
    /// dimensional qualification are the same context for fact comparison,
    /// regardless of id or member ordering.
    pub fn key(&self) -> String {
        let mut dims: Vec<String> = self
            .segment
            .iter()
            .chain(self.scenario.iter())
            .map(|m| match m {
                DimensionMember::Explicit { dimension, member } => {
                    format!("e:{}={}", dimension.0, member.0)
                }
                DimensionMember::Typed { dimension, value } => {
                    format!("t:{}={}", dimension.0, value.trim())
                }
            })
            .collect();
        dims.sort();
        let period = match &self.period {
            Period::Instant { date } => format!("{date}"),
            Period::Duration { start, end } => format!("{start}/{end}"),
            Period::Forever => String::new(),
        };
        format!(
            "{}|{}|{}|{}",
            self.entity.scheme,
            self.entity.identifier,
            period,
            dims.join(",")
        )
    }
}

/// A single measure such as `iso4217:USD`, kept with its declared prefix for
/// display and its resolved namespace for comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Measure {
    pub prefix: CompactString,
    pub namespace: CompactString,
    pub name: CompactString,
}

impl std::fmt::Display for Measure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.prefix.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}:{}", self.prefix, self.name)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitKind {
    Simple(Vec<Measure>),
    Divide {
        numerator: Vec<Measure>,
        denominator: Vec<Measure>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    pub id: CompactString,
    pub kind: UnitKind,
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn join(measures: &[Measure]) -> String {
            measures
                .iter()
                .map(|m| m.to_string())
                .collect::<Vec<_>>()
                .join("*")
        }
        match &self.kind {
            UnitKind::Simple(measures) => write!(f, "{}", join(measures)),
            UnitKind::Divide { numerator, denominator } => {
                write!(f, "{}/{}", join(numerator), join(denominator))
            }
        }
    }
}

/// Accuracy of a numeric fact, preserved verbatim (`INF` included).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decimals {
    Value(i32),
    Infinite,
}

impl Decimals {
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.eq_ignore_ascii_case("inf") {
            Some(Decimals::Infinite)
        } else {
            text.parse::<i32>().ok().map(Decimals::Value)
        }
    }
}

impl std::fmt::Display for Decimals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decimals::Value(v) => write!(f, "{v}"),
            Decimals::Infinite => write!(f, "INF"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextRef(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitRef(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FactId(pub u32);

#[derive(Debug, Clone, PartialEq)]
pub enum FactValue {
    Text(String),
    /// Canonical decimal string, transforms / scale / sign already applied.
    Numeric(String),
    Nil,
    /// Composite fact: ordered member facts of an `ix:tuple` or XML tuple.
    Tuple(Vec<FactId>),
}

impl FactValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FactValue::Text(s) | FactValue::Numeric(s) => Some(s),
            _ => None,
        }
    }
}

/// Where an iXBRL fact came from: the display-layer attributes that were
/// applied during value construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InlineSource {
    pub scale: i32,
    pub negated: bool,
    pub format: Option<CompactString>,
}

#[derive(Debug, Clone)]
pub struct Fact {
    pub xml_id: Option<CompactString>,
    pub concept: ConceptId,
    /// Absent only for tuple facts, which carry no context of their own.
    pub context: Option<ContextRef>,
    pub unit: Option<UnitRef>,
    pub value: FactValue,
    pub decimals: Option<Decimals>,
    pub precision: Option<Decimals>,
    pub lang: Option<CompactString>,
    pub footnotes: Vec<usize>,
    /// Set for facts extracted from an inline document.
    pub inline: Option<InlineSource>,
}

impl Fact {
    pub fn numeric_value(&self) -> Option<f64> {
        match &self.value {
            FactValue::Numeric(s) => s.parse().ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Footnote {
    pub lang: Option<CompactString>,
    pub content: String,
}

// ============================================================================
// The parsed instance
// ============================================================================

/// Root object produced by a parse: owns contexts, units, facts and
/// footnotes, and the resolved taxonomy the facts reference into.
pub struct XbrlInstance {
    pub source_url: CompactString,
    pub taxonomy: Taxonomy,
    pub contexts: Vec<Context>,
    pub units: Vec<Unit>,
    pub facts: Vec<Fact>,
    pub footnotes: Vec<Footnote>,
    context_index: HashMap<CompactString, ContextRef>,
    unit_index: HashMap<CompactString, UnitRef>,
}

impl XbrlInstance {
    pub fn new(source_url: impl Into<CompactString>, taxonomy: Taxonomy) -> Self {
        Self {
            source_url: source_url.into(),
            taxonomy,
            contexts: Vec::new(),
            units: Vec::new(),
            facts: Vec::new(),
            footnotes: Vec::new(),
            context_index: HashMap::new(),
            unit_index: HashMap::new(),
        }
    }

    pub fn add_context(&mut self, context: Context) -> ContextRef {
        let id = ContextRef(self.contexts.len() as u32);
        self.context_index.insert(context.id.clone(), id);
        self.contexts.push(context);
        id
    }

    pub fn add_unit(&mut self, unit: Unit) -> UnitRef {
        let id = UnitRef(self.units.len() as u32);
        self.unit_index.insert(unit.id.clone(), id);
        self.units.push(unit);
        id
    }

    pub fn add_fact(&mut self, fact: Fact) -> FactId {
        let id = FactId(self.facts.len() as u32);
        self.facts.push(fact);
        id
    }

    pub fn context_by_id(&self, id: &str) -> Option<&Context> {
        self.context_index.get(id).map(|r| &self.contexts[r.0 as usize])
    }

    pub fn context_ref(&self, id: &str) -> Option<ContextRef> {
        self.context_index.get(id).copied()
    }

    pub fn unit_ref(&self, id: &str) -> Option<UnitRef> {
        self.unit_index.get(id).copied()
    }

    pub fn context(&self, r: ContextRef) -> &Context {
        &self.contexts[r.0 as usize]
    }

    pub fn unit(&self, r: UnitRef) -> &Unit {
        &self.units[r.0 as usize]
    }

    pub fn fact(&self, id: FactId) -> &Fact {
        &self.facts[id.0 as usize]
    }

    /// All facts tagged with the concept named `prefix-free` qname, e.g.
    /// `("http://fasb.org/us-gaap/2020-01-31", "Assets")`.
    pub fn facts_by_qname(&self, namespace: &str, local_name: &str) -> Vec<&Fact> {
        let Some(concept) = self.taxonomy.concept_by_qname(namespace, local_name) else {
            return Vec::new();
        };
        self.facts.iter().filter(|f| f.concept == concept).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn concept(ty: &str) -> Concept {
        Concept {
            qname: QName::new("http://example.com/ns", "Assets"),
            xml_id: Some("ex_Assets".into()),
            schema_url: "http://example.com/ex.xsd".into(),
            concept_type: Some(ty.into()),
            substitution_group: None,
            kind: ConceptKind::Item,
            period_type: Some(PeriodType::Instant),
            balance: Some(Balance::Debit),
            nillable: true,
            abstract_: false,
            attributes: HashMap::new(),
        }
    }

    #[test]
    fn numeric_type_classification() {
        assert!(concept("xbrli:monetaryItemType").is_numeric());
        assert!(concept("xbrli:sharesItemType").is_numeric());
        assert!(concept("num:percentItemType").is_numeric());
        assert!(!concept("xbrli:stringItemType").is_numeric());
        assert!(!concept("nonnum:textBlockItemType").is_numeric());
    }

    #[test]
    fn context_key_ignores_member_order_and_id() {
        let base = Context {
            id: "c1".into(),
            entity: Entity {
                scheme: "http://www.sec.gov/CIK".into(),
                identifier: "0000320193".into(),
            },
            period: Period::Instant {
                date: NaiveDate::from_ymd_opt(2020, 9, 26).unwrap(),
            },
            segment: vec![
                DimensionMember::Explicit { dimension: ConceptId(1), member: ConceptId(2) },
                DimensionMember::Explicit { dimension: ConceptId(3), member: ConceptId(4) },
            ],
            scenario: vec![],
        };
        let mut reordered = base.clone();
        reordered.id = "c2".into();
        reordered.segment.reverse();
        assert_eq!(base.key(), reordered.key());
    }

    #[test]
    fn unit_display() {
        let usd = Unit {
            id: "usd".into(),
            kind: UnitKind::Simple(vec![Measure {
                prefix: "iso4217".into(),
                namespace: "http://www.xbrl.org/2003/iso4217".into(),
                name: "USD".into(),
            }]),
        };
        assert_eq!(usd.to_string(), "iso4217:USD");

        let per_share = Unit {
            id: "usdPerShare".into(),
            kind: UnitKind::Divide {
                numerator: vec![Measure {
                    prefix: "iso4217".into(),
                    namespace: "http://www.xbrl.org/2003/iso4217".into(),
                    name: "USD".into(),
                }],
                denominator: vec![Measure {
                    prefix: "xbrli".into(),
                    namespace: "http://www.xbrl.org/2003/instance".into(),
                    name: "shares".into(),
                }],
            },
        };
        assert_eq!(per_share.to_string(), "iso4217:USD/xbrli:shares");
    }
}
