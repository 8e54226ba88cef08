//! ferroxbrl - XBRL and Inline-XBRL filing parser
//!
//! Licensed under AGPL-3.0
//!
//! Parses XBRL 2.1 instance documents and Inline XBRL 1.1 (iXBRL) filings
//! together with their full taxonomy closure (schemas and linkbases) into a
//! single navigable object graph. Remote files are fetched through a polite,
//! filesystem-mirrored [`HttpCache`].

pub mod cache;
pub mod instance;
pub mod ixbrl;
pub mod json;
pub mod linkbase;
pub mod model;
pub mod schema;
pub mod taxonomy;
pub mod transforms;
pub mod xml;

pub use cache::{CancelToken, HttpCache};
pub use instance::XbrlParser;
pub use linkbase::{Linkbase, LinkbaseKind};
pub use model::{Concept, ConceptId, Context, Fact, Period, Unit, XbrlInstance};
pub use taxonomy::Taxonomy;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not fetch {url}: {reason}")]
    RemoteFetch { url: String, reason: String },

    #[error("malformed XML in {url}: {reason}")]
    XmlWellFormedness { url: String, reason: String },

    #[error("schema validation failed: {0}")]
    SchemaValidation(String),

    #[error("unknown concept {0}")]
    UnknownConcept(String),

    #[error("conflicting redeclaration of concept {0}")]
    DuplicateConcept(String),

    #[error("no taxonomy schema found for namespace {0}")]
    TaxonomyNotFound(String),

    #[error("transform {format} cannot be applied to {value:?}")]
    Transform { format: String, value: String },

    #[error("could not parse numeric value {0:?}")]
    NumericParse(String),

    #[error("archive error for {url}: {reason}")]
    Archive { url: String, reason: String },

    #[error("operation cancelled")]
    Cancelled,
}

/// Non-fatal findings accumulated while resolving a taxonomy. Parsing
/// continues past all of these; they are attached to the returned
/// [`Taxonomy`] for inspection.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// A linkbase locator pointed at an id that does not exist in any
    /// discovered schema. Seen in practice in regulator filings.
    BrokenLocator { href: String, linkbase_url: String },

    /// The summation-item graph of a calculation role contains a cycle.
    CalculationCycle { role: String },

    /// A presentation or definition role contains a cycle.
    RelationshipCycle { role: String, arcrole: String },

    /// More than one optional arc survived override resolution at the same
    /// priority for one equivalence key; the first by discovery order wins.
    AmbiguousArc { source: String, target: String, arcrole: String },

    /// A transform was unknown or failed and the parser was configured to
    /// degrade instead of failing the fact.
    DegradedTransform { format: String, value: String },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::BrokenLocator { href, linkbase_url } => {
                write!(f, "locator {href} in {linkbase_url} resolves to no concept")
            }
            Warning::CalculationCycle { role } => {
                write!(f, "calculation cycle in role {role}")
            }
            Warning::RelationshipCycle { role, arcrole } => {
                write!(f, "{arcrole} cycle in role {role}")
            }
            Warning::AmbiguousArc { source, target, arcrole } => {
                write!(f, "ambiguous arcs {source} -> {target} ({arcrole})")
            }
            Warning::DegradedTransform { format, value } => {
                write!(f, "kept raw value {value:?}, transform {format} not applied")
            }
        }
    }
}
