//! XBRL instance parsing and the parser facade.
//!
//! A classic XML instance carries its contexts, units and facts as children
//! of the `<xbrl>` root; `<link:schemaRef>` names the extension schema the
//! DTS is resolved from. The facade autodetects the inline (HTML) form and
//! hands it to [`crate::ixbrl`].

use chrono::NaiveDate;
use compact_str::CompactString;
use std::path::Path;

use crate::cache::{resolve_uri, HttpCache};
use crate::ixbrl;
use crate::linkbase::{self, Linkbase, LinkbaseKind};
use crate::model::{
    Context, Decimals, DimensionMember, Entity, Fact, FactId, FactValue, Footnote, Measure,
    Period, Unit, UnitKind, XbrlInstance,
};
use crate::taxonomy::{self, Taxonomy};
use crate::xml::{self, XmlElement, LINK_NS, XBRLDI_NS, XBRLI_NS, XLINK_NS, XSI_NS};
use crate::{Error, Result};

/// Parser facade: owns nothing but a reference to the cache, so one cache
/// can serve many parses.
pub struct XbrlParser<'a> {
    cache: &'a HttpCache,
    lenient_transforms: bool,
}

impl<'a> XbrlParser<'a> {
    pub fn new(cache: &'a HttpCache) -> Self {
        Self {
            cache,
            lenient_transforms: false,
        }
    }

    /// Degrade transform and numeric-construction failures on inline facts
    /// to warnings, keeping the raw display text as the value.
    pub fn with_lenient_transforms(mut self, lenient: bool) -> Self {
        self.lenient_transforms = lenient;
        self
    }

    /// Parses an instance document from a URL or local path, autodetecting
    /// classic XML vs inline HTML from the leading bytes.
    pub fn parse_instance(&self, uri: &str) -> Result<XbrlInstance> {
        let bytes = self.cache.get(uri)?;
        self.parse_bytes(&bytes, uri)
    }

    pub fn parse_instance_locally(&self, path: impl AsRef<Path>) -> Result<XbrlInstance> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        self.parse_bytes(&bytes, &path.to_string_lossy())
    }

    fn parse_bytes(&self, bytes: &[u8], source_url: &str) -> Result<XbrlInstance> {
        if is_inline_document(bytes) {
            ixbrl::parse_ixbrl(self.cache, bytes, source_url, self.lenient_transforms)
        } else {
            parse_xbrl(self.cache, bytes, source_url)
        }
    }

    pub fn parse_taxonomy(&self, url: &str) -> Result<Taxonomy> {
        taxonomy::parse_taxonomy(self.cache, url)
    }

    pub fn parse_linkbase(&self, url: &str, kind: Option<LinkbaseKind>) -> Result<Linkbase> {
        let doc = self.cache.get_and_parse_xml(url)?;
        linkbase::parse_linkbase(&doc, kind)
    }
}

/// An inline filing is an HTML document; a classic instance opens with an
/// `<xbrl>` root. Decided on the first bytes, not the file extension.
fn is_inline_document(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(2048)];
    let head = String::from_utf8_lossy(head).to_lowercase();
    head.contains("<html") || head.contains("<!doctype html") || head.contains("<xhtml:html")
}

pub fn parse_xbrl(cache: &HttpCache, bytes: &[u8], source_url: &str) -> Result<XbrlInstance> {
    let doc = xml::read(bytes, source_url)?;
    let root = &doc.root;
    let cancel = cache.cancel_token();

    let schema_urls = schema_ref_urls(root, source_url)?;
    let mut taxonomy = resolve_dts(cache, &schema_urls)?;

    // contexts and units first, facts reference them by id
    let mut contexts = Vec::new();
    for context_elem in root.find_all(XBRLI_NS, "context") {
        cancel.check()?;
        contexts.push(parse_context(context_elem, cache, &mut taxonomy)?);
    }
    let mut units = Vec::new();
    for unit_elem in root.find_all(XBRLI_NS, "unit") {
        units.push(parse_unit(unit_elem)?);
    }

    let mut instance = XbrlInstance::new(source_url, taxonomy);
    for context in contexts {
        instance.add_context(context);
    }
    for unit in units {
        instance.add_unit(unit);
    }

    let mut facts_by_xml_id: Vec<(CompactString, FactId)> = Vec::new();
    for element in root.child_elements() {
        cancel.check()?;
        if element.namespace == XBRLI_NS || element.namespace == LINK_NS {
            continue;
        }
        if let Some(fact_id) = parse_plain_fact(element, cache, &mut instance)? {
            if let Some(id) = instance.facts[fact_id.0 as usize].xml_id.clone() {
                facts_by_xml_id.push((id, fact_id));
            }
        }
    }

    for footnote_link in root.find_all(LINK_NS, "footnoteLink") {
        attach_footnotes(footnote_link, &mut instance, &facts_by_xml_id);
    }

    Ok(instance)
}

/// Parses one plain element fact (classic instances and the `ix:hidden`
/// section alike). Returns `None` for elements that are not facts.
pub(crate) fn parse_plain_fact(
    element: &XmlElement,
    cache: &HttpCache,
    instance: &mut XbrlInstance,
) -> Result<Option<FactId>> {
    let Some(context_ref) = element.attr_local("contextRef") else {
        return Ok(None);
    };
    let nil = element.attr(XSI_NS, "nil") == Some("true");
    let text = element.text_content().trim().to_string();
    if text.is_empty() && !nil {
        log::debug!("skipping empty fact {}", element.local_name);
        return Ok(None);
    }

    let concept = instance.taxonomy.resolve_instance_qname(
        cache,
        &element.namespace,
        &element.local_name,
    )?;
    let context = instance.context_ref(context_ref.trim()).ok_or_else(|| {
        Error::SchemaValidation(format!(
            "fact {} references undefined context {context_ref}",
            element.local_name
        ))
    })?;

    let unit = match element.attr_local("unitRef") {
        Some(unit_ref) => Some(instance.unit_ref(unit_ref.trim()).ok_or_else(|| {
            Error::SchemaValidation(format!(
                "fact {} references undefined unit {unit_ref}",
                element.local_name
            ))
        })?),
        None => None,
    };

    validate_fact(instance, concept, context, unit.is_some(), &element.local_name)?;

    let numeric = instance.taxonomy.concept(concept).is_numeric();
    let value = if nil {
        FactValue::Nil
    } else if numeric {
        FactValue::Numeric(text)
    } else {
        FactValue::Text(text)
    };

    let fact = Fact {
        xml_id: element.attr_local("id").map(Into::into),
        concept,
        context: Some(context),
        unit,
        value,
        decimals: element.attr_local("decimals").and_then(Decimals::parse),
        precision: element.attr_local("precision").and_then(Decimals::parse),
        lang: element.xml_lang().map(Into::into),
        footnotes: Vec::new(),
        inline: None,
    };
    Ok(Some(instance.add_fact(fact)))
}

pub(crate) fn schema_ref_urls(root: &XmlElement, source_url: &str) -> Result<Vec<String>> {
    let mut urls = Vec::new();
    root.walk(&mut |element| {
        if element.is(LINK_NS, "schemaRef") {
            if let Some(href) = element.attr(XLINK_NS, "href") {
                urls.push(resolve_uri(source_url, href));
            }
        }
    });
    if urls.is_empty() {
        return Err(Error::SchemaValidation(format!(
            "{source_url} contains no link:schemaRef"
        )));
    }
    Ok(urls)
}

pub(crate) fn resolve_dts(cache: &HttpCache, schema_urls: &[String]) -> Result<Taxonomy> {
    let mut taxonomy = taxonomy::parse_taxonomy(cache, &schema_urls[0])?;
    for url in &schema_urls[1..] {
        taxonomy.extend_from(cache, url)?;
    }
    Ok(taxonomy)
}

pub(crate) fn parse_context(
    element: &XmlElement,
    cache: &HttpCache,
    taxonomy: &mut Taxonomy,
) -> Result<Context> {
    let id: CompactString = element
        .attr_local("id")
        .ok_or_else(|| Error::SchemaValidation("context without id".into()))?
        .into();

    let entity_elem = element
        .find(XBRLI_NS, "entity")
        .ok_or_else(|| Error::SchemaValidation(format!("context {id} has no entity")))?;
    let identifier_elem = entity_elem
        .find(XBRLI_NS, "identifier")
        .ok_or_else(|| Error::SchemaValidation(format!("context {id} has no identifier")))?;
    let entity = Entity {
        scheme: identifier_elem.attr_local("scheme").unwrap_or_default().into(),
        identifier: identifier_elem.text_content().trim().into(),
    };

    let period_elem = element
        .find(XBRLI_NS, "period")
        .ok_or_else(|| Error::SchemaValidation(format!("context {id} has no period")))?;
    let period = if let Some(instant) = period_elem.find(XBRLI_NS, "instant") {
        Period::Instant {
            date: parse_date(&instant.text_content(), &id)?,
        }
    } else if period_elem.find(XBRLI_NS, "forever").is_some() {
        Period::Forever
    } else {
        let start = period_elem
            .find(XBRLI_NS, "startDate")
            .ok_or_else(|| Error::SchemaValidation(format!("context {id} period has no start")))?;
        let end = period_elem
            .find(XBRLI_NS, "endDate")
            .ok_or_else(|| Error::SchemaValidation(format!("context {id} period has no end")))?;
        Period::Duration {
            start: parse_date(&start.text_content(), &id)?,
            end: parse_date(&end.text_content(), &id)?,
        }
    };

    let mut segment = Vec::new();
    if let Some(segment_elem) = entity_elem.find(XBRLI_NS, "segment") {
        parse_members(segment_elem, cache, taxonomy, &mut segment)?;
    }
    let mut scenario = Vec::new();
    if let Some(scenario_elem) = element.find(XBRLI_NS, "scenario") {
        parse_members(scenario_elem, cache, taxonomy, &mut scenario)?;
    }

    Ok(Context {
        id,
        entity,
        period,
        segment,
        scenario,
    })
}

fn parse_members(
    container: &XmlElement,
    cache: &HttpCache,
    taxonomy: &mut Taxonomy,
    out: &mut Vec<DimensionMember>,
) -> Result<()> {
    for member_elem in container.find_all(XBRLDI_NS, "explicitMember") {
        let dimension = resolve_member_concept(
            member_elem,
            member_elem.attr_local("dimension").unwrap_or_default(),
            cache,
            taxonomy,
        )?;
        let member = resolve_member_concept(
            member_elem,
            member_elem.text_content().trim(),
            cache,
            taxonomy,
        )?;
        out.push(DimensionMember::Explicit { dimension, member });
    }
    for member_elem in container.find_all(XBRLDI_NS, "typedMember") {
        let dimension = resolve_member_concept(
            member_elem,
            member_elem.attr_local("dimension").unwrap_or_default(),
            cache,
            taxonomy,
        )?;
        let value = member_elem
            .child_elements()
            .next()
            .map(|child| child.to_xml_string())
            .unwrap_or_else(|| member_elem.text_content().trim().to_string());
        out.push(DimensionMember::Typed { dimension, value });
    }
    Ok(())
}

fn resolve_member_concept(
    element: &XmlElement,
    qname_text: &str,
    cache: &HttpCache,
    taxonomy: &mut Taxonomy,
) -> Result<crate::model::ConceptId> {
    let qname = element
        .resolve_qname(qname_text)
        .ok_or_else(|| Error::UnknownConcept(qname_text.to_string()))?;
    taxonomy.resolve_instance_qname(cache, &qname.namespace, &qname.local_name)
}

pub(crate) fn parse_unit(element: &XmlElement) -> Result<Unit> {
    let id: CompactString = element
        .attr_local("id")
        .ok_or_else(|| Error::SchemaValidation("unit without id".into()))?
        .into();

    let kind = if let Some(divide) = element.find(XBRLI_NS, "divide") {
        let numerator = divide
            .find(XBRLI_NS, "unitNumerator")
            .map(|n| parse_measures(n))
            .unwrap_or_default();
        let denominator = divide
            .find(XBRLI_NS, "unitDenominator")
            .map(|d| parse_measures(d))
            .unwrap_or_default();
        if numerator.is_empty() || denominator.is_empty() {
            return Err(Error::SchemaValidation(format!(
                "unit {id} divide is missing numerator or denominator"
            )));
        }
        UnitKind::Divide {
            numerator,
            denominator,
        }
    } else {
        let measures = parse_measures(element);
        if measures.is_empty() {
            return Err(Error::SchemaValidation(format!("unit {id} has no measure")));
        }
        UnitKind::Simple(measures)
    };
    Ok(Unit { id, kind })
}

fn parse_measures(container: &XmlElement) -> Vec<Measure> {
    container
        .find_all(XBRLI_NS, "measure")
        .map(|measure_elem| {
            let text = measure_elem.text_content();
            let text = text.trim();
            let (prefix, name) = match text.split_once(':') {
                Some((p, n)) => (p, n),
                None => ("", text),
            };
            Measure {
                prefix: prefix.into(),
                namespace: measure_elem.resolve_prefix(prefix).unwrap_or_default().into(),
                name: name.into(),
            }
        })
        .collect()
}

/// Structural fact rules: units go with numeric concepts and only with
/// them; the context period variant must match the concept's period type.
pub(crate) fn validate_fact(
    instance: &XbrlInstance,
    concept: crate::model::ConceptId,
    context: crate::model::ContextRef,
    has_unit: bool,
    fact_name: &str,
) -> Result<()> {
    let declared = instance.taxonomy.concept(concept);
    if declared.is_numeric() && !has_unit {
        return Err(Error::SchemaValidation(format!(
            "numeric fact {fact_name} has no unitRef"
        )));
    }
    if !declared.is_numeric() && has_unit {
        return Err(Error::SchemaValidation(format!(
            "non-numeric fact {fact_name} carries a unitRef"
        )));
    }
    if let Some(period_type) = declared.period_type {
        let context_kind = instance.context(context).period.period_type();
        if context_kind != period_type {
            return Err(Error::SchemaValidation(format!(
                "fact {fact_name} period type does not match its context"
            )));
        }
    }
    Ok(())
}

fn attach_footnotes(
    footnote_link: &XmlElement,
    instance: &mut XbrlInstance,
    facts_by_xml_id: &[(CompactString, FactId)],
) {
    use std::collections::HashMap;
    let mut locators: HashMap<&str, &str> = HashMap::new();
    let mut notes: HashMap<&str, usize> = HashMap::new();

    for child in footnote_link.child_elements() {
        if child.is(LINK_NS, "loc") {
            if let (Some(label), Some(href)) =
                (child.attr(XLINK_NS, "label"), child.attr(XLINK_NS, "href"))
            {
                let fragment = href.rsplit_once('#').map(|(_, f)| f).unwrap_or(href);
                locators.insert(label, fragment);
            }
        } else if child.is(LINK_NS, "footnote") {
            if let Some(label) = child.attr(XLINK_NS, "label") {
                let index = instance.footnotes.len();
                instance.footnotes.push(Footnote {
                    lang: child.xml_lang().map(Into::into),
                    content: child.text_content().trim().to_string(),
                });
                notes.insert(label, index);
            }
        }
    }

    for child in footnote_link.child_elements() {
        if !child.local_name.ends_with("Arc") {
            continue;
        }
        let (Some(from), Some(to)) = (child.attr(XLINK_NS, "from"), child.attr(XLINK_NS, "to"))
        else {
            continue;
        };
        let (Some(&fragment), Some(&note_index)) = (locators.get(from), notes.get(to)) else {
            continue;
        };
        if let Some((_, fact_id)) = facts_by_xml_id.iter().find(|(id, _)| id.as_str() == fragment) {
            instance.facts[fact_id.0 as usize].footnotes.push(note_index);
        }
    }
}

fn parse_date(text: &str, context_id: &str) -> Result<NaiveDate> {
    let text = text.trim();
    let date_part = &text[..text.len().min(10)];
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|_| {
        Error::SchemaValidation(format!("context {context_id} has invalid date {text:?}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_detection() {
        assert!(is_inline_document(
            b"<!DOCTYPE html><html xmlns:ix=\"http://www.xbrl.org/2013/inlineXBRL\">"
        ));
        assert!(is_inline_document(b"<html><head></head></html>"));
        assert!(!is_inline_document(
            b"<?xml version=\"1.0\"?>\n<xbrl xmlns=\"http://www.xbrl.org/2003/instance\"/>"
        ));
    }

    #[test]
    fn unit_parsing() {
        let doc = xml::read_str(
            r#"<xbrli:unit xmlns:xbrli="http://www.xbrl.org/2003/instance"
                   xmlns:iso4217="http://www.xbrl.org/2003/iso4217" id="usd">
                 <xbrli:measure>iso4217:USD</xbrli:measure>
               </xbrli:unit>"#,
            "test://unit",
        )
        .unwrap();
        let unit = parse_unit(&doc.root).unwrap();
        assert_eq!(unit.to_string(), "iso4217:USD");
        match &unit.kind {
            UnitKind::Simple(measures) => {
                assert_eq!(measures[0].namespace, "http://www.xbrl.org/2003/iso4217");
            }
            _ => panic!("expected simple unit"),
        }
    }

    #[test]
    fn divide_unit_requires_both_sides() {
        let doc = xml::read_str(
            r#"<xbrli:unit xmlns:xbrli="http://www.xbrl.org/2003/instance" id="bad">
                 <xbrli:divide>
                   <xbrli:unitNumerator><xbrli:measure>iso4217:USD</xbrli:measure></xbrli:unitNumerator>
                 </xbrli:divide>
               </xbrli:unit>"#,
            "test://unit",
        )
        .unwrap();
        assert!(matches!(parse_unit(&doc.root), Err(Error::SchemaValidation(_))));
    }

    #[test]
    fn date_parsing_tolerates_timestamps() {
        assert_eq!(
            parse_date("2020-09-26T00:00:00", "c").unwrap(),
            NaiveDate::from_ymd_opt(2020, 9, 26).unwrap()
        );
        assert!(parse_date("soon", "c").is_err());
    }
}
