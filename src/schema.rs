//! Taxonomy schema parsing.
//!
//! One `.xsd` file declares reportable concepts and points at the linkbases
//! describing their relationships, e.g.
//! `<xs:element id="us-gaap_Assets" name="Assets" nillable="true"
//!  substitutionGroup="xbrli:item" type="xbrli:monetaryItemType"
//!  xbrli:balance="debit" xbrli:periodType="instant"/>`.
//!
//! The output is one parsed schema; chasing imports and wiring linkbases is
//! the resolver's job.

use compact_str::CompactString;
use std::collections::HashMap;

use crate::cache::resolve_uri;
use crate::linkbase::LinkbaseKind;
use crate::model::{Balance, Concept, ConceptKind, PeriodType, QName};
use crate::xml::{XmlDocument, XmlElement, LINK_NS, XBRLDT_NS, XBRLI_NS, XLINK_NS, XS_NS};
use crate::{Error, Result};

/// A `<link:roleType>` declaration: an extended link role with its
/// human-readable definition (e.g. "1003000 - Statement - Consolidated
/// Balance Sheets").
#[derive(Debug, Clone)]
pub struct RoleType {
    pub xml_id: CompactString,
    pub uri: CompactString,
    pub definition: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LinkbaseRef {
    /// Absolute URL (or path), already resolved against the schema base.
    pub href: String,
    pub kind: Option<LinkbaseKind>,
}

/// One parsed taxonomy schema file, before DTS resolution.
#[derive(Debug, Clone)]
pub struct ParsedSchema {
    pub source_url: CompactString,
    pub target_namespace: CompactString,
    pub concepts: Vec<Concept>,
    /// Import and include locations in document order, resolved.
    pub imports: Vec<String>,
    pub linkbase_refs: Vec<LinkbaseRef>,
    pub role_types: Vec<RoleType>,
}

pub fn parse_schema(doc: &XmlDocument) -> Result<ParsedSchema> {
    let root = &doc.root;
    if !root.is(XS_NS, "schema") {
        return Err(Error::SchemaValidation(format!(
            "{} is not a taxonomy schema (root is {})",
            doc.source_url, root.local_name
        )));
    }
    let target_namespace: CompactString = root
        .attr_local("targetNamespace")
        .ok_or_else(|| {
            Error::SchemaValidation(format!("{} has no targetNamespace", doc.source_url))
        })?
        .into();

    let mut schema = ParsedSchema {
        source_url: doc.source_url.clone(),
        target_namespace: target_namespace.clone(),
        concepts: Vec::new(),
        imports: Vec::new(),
        linkbase_refs: Vec::new(),
        role_types: Vec::new(),
    };

    for element in root.child_elements() {
        if element.is(XS_NS, "import") || element.is(XS_NS, "include") {
            if let Some(location) = element.attr_local("schemaLocation") {
                schema
                    .imports
                    .push(resolve_uri(&doc.source_url, location));
            }
        } else if element.is(XS_NS, "element") {
            if let Some(concept) = parse_concept(element, &target_namespace, &doc.source_url) {
                schema.concepts.push(concept);
            }
        }
    }

    // linkbaseRefs and roleTypes live under xs:annotation/xs:appinfo
    root.walk(&mut |element| {
        if element.is(LINK_NS, "linkbaseRef") {
            if let Some(href) = element.attr(XLINK_NS, "href") {
                let kind = element
                    .attr(XLINK_NS, "role")
                    .and_then(LinkbaseKind::from_linkbase_ref_role)
                    .or_else(|| LinkbaseKind::guess_from_href(href));
                schema.linkbase_refs.push(LinkbaseRef {
                    href: resolve_uri(&doc.source_url, href),
                    kind,
                });
            }
        } else if element.is(LINK_NS, "roleType") {
            let (Some(id), Some(uri)) = (element.attr_local("id"), element.attr_local("roleURI"))
            else {
                return;
            };
            let definition = element
                .find(LINK_NS, "definition")
                .map(|d| d.text_content().trim().to_string())
                .filter(|d| !d.is_empty());
            schema.role_types.push(RoleType {
                xml_id: id.into(),
                uri: uri.into(),
                definition,
            });
        }
    });

    Ok(schema)
}

fn parse_concept(
    element: &XmlElement,
    target_namespace: &CompactString,
    schema_url: &CompactString,
) -> Option<Concept> {
    // a concept without an id cannot be referenced by any linkbase locator
    let name = element.attr_local("name")?;
    let xml_id = element.attr_local("id");
    if xml_id.is_none() {
        log::debug!("element {name} in {schema_url} has no id, keeping it unreferencable");
    }

    let substitution_group = element
        .attr_local("substitutionGroup")
        .and_then(|sg| element.resolve_qname(sg));
    let kind = substitution_group
        .as_ref()
        .map(classify_substitution_group)
        .unwrap_or(ConceptKind::Other);

    let period_type = match element.attr(XBRLI_NS, "periodType") {
        Some("instant") => Some(PeriodType::Instant),
        Some("duration") => Some(PeriodType::Duration),
        _ => None,
    };
    let balance = match element.attr(XBRLI_NS, "balance") {
        Some("debit") => Some(Balance::Debit),
        Some("credit") => Some(Balance::Credit),
        _ => None,
    };

    const KNOWN: [&str; 6] = ["id", "name", "type", "substitutionGroup", "abstract", "nillable"];
    let mut attributes = HashMap::new();
    for attr in &element.attributes {
        let known = (attr.namespace.is_empty() && KNOWN.contains(&attr.local_name.as_str()))
            || attr.namespace == XBRLI_NS;
        if !known {
            attributes.insert(
                QName::new(attr.namespace.clone(), attr.local_name.clone()),
                attr.value.clone(),
            );
        }
    }

    Some(Concept {
        qname: QName::new(target_namespace.clone(), name),
        xml_id: xml_id.map(Into::into),
        schema_url: schema_url.clone(),
        concept_type: element.attr_local("type").map(Into::into),
        substitution_group,
        kind,
        period_type,
        balance,
        nillable: element.attr_local("nillable") == Some("true"),
        abstract_: element.attr_local("abstract") == Some("true"),
        attributes,
    })
}

/// Direct classification from the substitution group qname. The resolver
/// refines this by walking chains that end in these groups.
pub fn classify_substitution_group(group: &QName) -> ConceptKind {
    if group.namespace == XBRLI_NS {
        match group.local_name.as_str() {
            "item" => return ConceptKind::Item,
            "tuple" => return ConceptKind::Tuple,
            _ => {}
        }
    }
    if group.namespace == XBRLDT_NS {
        match group.local_name.as_str() {
            "dimensionItem" => return ConceptKind::Dimension,
            "hypercubeItem" => return ConceptKind::Hypercube,
            _ => {}
        }
    }
    ConceptKind::Other
}
