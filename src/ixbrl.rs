//! Inline XBRL (iXBRL 1.1) fact extraction.
//!
//! The filing is an XHTML document; facts live in `ix:nonFraction` /
//! `ix:nonNumeric` elements scattered through the visible markup, with
//! contexts, units and non-displayed facts tucked into
//! `ix:header/ix:hidden`. Value construction concatenates descendant text
//! in document order, follows `continuedAt` chains, applies the named
//! format transform, then scale and sign for numeric facts.

use compact_str::CompactString;
use std::collections::{HashMap, HashSet};

use crate::cache::HttpCache;
use crate::instance::{
    parse_context, parse_plain_fact, parse_unit, resolve_dts, schema_ref_urls, validate_fact,
};
use crate::model::{
    Decimals, Fact, FactId, FactValue, Footnote, InlineSource, XbrlInstance,
};
use crate::transforms;
use crate::xml::{self, XmlElement, IX_NS, XBRLI_NS, XSI_NS};
use crate::{Error, Result, Warning};

pub fn parse_ixbrl(
    cache: &HttpCache,
    bytes: &[u8],
    source_url: &str,
    lenient_transforms: bool,
) -> Result<XbrlInstance> {
    let text = String::from_utf8_lossy(bytes);
    let text = strip_scripts(&text);
    let doc = xml::read_str(&text, source_url)?;
    let root = &doc.root;
    let cancel = cache.cancel_token();

    let schema_urls = schema_ref_urls(root, source_url)?;
    let mut taxonomy = resolve_dts(cache, &schema_urls)?;

    let mut contexts = Vec::new();
    for context_elem in root.descendants(XBRLI_NS, "context") {
        cancel.check()?;
        contexts.push(parse_context(context_elem, cache, &mut taxonomy)?);
    }
    let mut units = Vec::new();
    for unit_elem in root.descendants(XBRLI_NS, "unit") {
        units.push(parse_unit(unit_elem)?);
    }

    let mut instance = XbrlInstance::new(source_url, taxonomy);
    for context in contexts {
        instance.add_context(context);
    }
    for unit in units {
        instance.add_unit(unit);
    }

    // continuations are addressed by id from continuedAt attributes
    let mut continuations: HashMap<&str, &XmlElement> = HashMap::new();
    for continuation in root.descendants(IX_NS, "continuation") {
        if let Some(id) = continuation.attr_local("id") {
            continuations.insert(id, continuation);
        }
    }

    let mut collected: Vec<Collected<'_>> = Vec::new();
    collect_inline_elements(root, None, false, &mut collected);

    let mut facts_by_xml_id: Vec<(CompactString, FactId)> = Vec::new();
    // tuple address -> (member fact, order) accumulated while members parse
    let mut tuple_members: HashMap<usize, Vec<(f64, FactId)>> = HashMap::new();
    let mut tuple_ids: HashMap<&str, usize> = HashMap::new();
    for item in &collected {
        if let Collected::Tuple { element, addr } = item {
            if let Some(tuple_id) = element.attr_local("tupleID") {
                tuple_ids.insert(tuple_id, *addr);
            }
        }
    }

    for item in &collected {
        cancel.check()?;
        match item {
            Collected::Hidden { element } => {
                if let Some(fact_id) = parse_plain_fact(element, cache, &mut instance)? {
                    record_id(&instance, fact_id, &mut facts_by_xml_id);
                }
            }
            Collected::NonNumeric { element, tuple } | Collected::NonFraction { element, tuple } => {
                let numeric = matches!(item, Collected::NonFraction { .. });
                let fact_id = parse_inline_fact(
                    element,
                    numeric,
                    cache,
                    &mut instance,
                    &continuations,
                    lenient_transforms,
                )?;
                let Some(fact_id) = fact_id else { continue };
                record_id(&instance, fact_id, &mut facts_by_xml_id);
                let membership = element
                    .attr_local("tupleRef")
                    .and_then(|r| tuple_ids.get(r).copied())
                    .or(*tuple);
                if let Some(addr) = membership {
                    let order = element
                        .attr_local("order")
                        .and_then(|o| o.trim().parse().ok())
                        .unwrap_or(1.0);
                    tuple_members.entry(addr).or_default().push((order, fact_id));
                }
            }
            Collected::Tuple { .. } => {}
        }
    }

    // tuples last: their members must exist first
    for item in &collected {
        let Collected::Tuple { element, addr } = item else {
            continue;
        };
        let Some(name) = element.attr_local("name") else {
            continue;
        };
        let qname = element
            .resolve_qname(name)
            .ok_or_else(|| Error::UnknownConcept(name.to_string()))?;
        let concept = instance.taxonomy.resolve_instance_qname(
            cache,
            &qname.namespace,
            &qname.local_name,
        )?;
        let mut members = tuple_members.remove(addr).unwrap_or_default();
        members.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        let fact = Fact {
            xml_id: element.attr_local("id").map(Into::into),
            concept,
            context: None,
            unit: None,
            value: FactValue::Tuple(members.into_iter().map(|(_, id)| id).collect()),
            decimals: None,
            precision: None,
            lang: element.xml_lang().map(Into::into),
            footnotes: Vec::new(),
            inline: Some(InlineSource::default()),
        };
        let fact_id = instance.add_fact(fact);
        record_id(&instance, fact_id, &mut facts_by_xml_id);
    }

    attach_inline_footnotes(root, &mut instance, &facts_by_xml_id);
    Ok(instance)
}

fn record_id(
    instance: &XbrlInstance,
    fact_id: FactId,
    facts_by_xml_id: &mut Vec<(CompactString, FactId)>,
) {
    if let Some(id) = instance.facts[fact_id.0 as usize].xml_id.clone() {
        facts_by_xml_id.push((id, fact_id));
    }
}

enum Collected<'a> {
    NonFraction { element: &'a XmlElement, tuple: Option<usize> },
    NonNumeric { element: &'a XmlElement, tuple: Option<usize> },
    Tuple { element: &'a XmlElement, addr: usize },
    Hidden { element: &'a XmlElement },
}

/// Document-order collection of every inline construct, tracking the
/// nearest enclosing `ix:tuple` for lexical tuple membership. Inside
/// `ix:hidden` both forms occur: `ix:` facts and plain element facts
/// straight out of the classic instance syntax.
fn collect_inline_elements<'a>(
    element: &'a XmlElement,
    enclosing_tuple: Option<usize>,
    in_hidden: bool,
    out: &mut Vec<Collected<'a>>,
) {
    let mut tuple = enclosing_tuple;
    let hidden = in_hidden || element.is(IX_NS, "hidden");
    if element.namespace == IX_NS {
        match element.local_name.as_str() {
            "nonFraction" => out.push(Collected::NonFraction { element, tuple }),
            "nonNumeric" => out.push(Collected::NonNumeric { element, tuple }),
            "tuple" => {
                let addr = element as *const XmlElement as usize;
                out.push(Collected::Tuple { element, addr });
                tuple = Some(addr);
            }
            _ => {}
        }
    } else if hidden
        && element.namespace != XBRLI_NS
        && element.attr_local("contextRef").is_some()
    {
        out.push(Collected::Hidden { element });
        return;
    }
    for child in element.child_elements() {
        collect_inline_elements(child, tuple, hidden, out);
    }
}

fn parse_inline_fact(
    element: &XmlElement,
    numeric: bool,
    cache: &HttpCache,
    instance: &mut XbrlInstance,
    continuations: &HashMap<&str, &XmlElement>,
    lenient: bool,
) -> Result<Option<FactId>> {
    let name = element
        .attr_local("name")
        .ok_or_else(|| Error::SchemaValidation("inline fact without name".into()))?;
    let qname = element
        .resolve_qname(name)
        .ok_or_else(|| Error::UnknownConcept(name.to_string()))?;
    let concept =
        instance
            .taxonomy
            .resolve_instance_qname(cache, &qname.namespace, &qname.local_name)?;

    let context_ref = element
        .attr_local("contextRef")
        .ok_or_else(|| Error::SchemaValidation(format!("inline fact {name} has no contextRef")))?;
    let context = instance.context_ref(context_ref.trim()).ok_or_else(|| {
        Error::SchemaValidation(format!(
            "inline fact {name} references undefined context {context_ref}"
        ))
    })?;
    let unit = match element.attr_local("unitRef") {
        Some(unit_ref) => Some(instance.unit_ref(unit_ref.trim()).ok_or_else(|| {
            Error::SchemaValidation(format!(
                "inline fact {name} references undefined unit {unit_ref}"
            ))
        })?),
        None => None,
    };
    validate_fact(instance, concept, context, unit.is_some(), name)?;

    let nil = element.attr(XSI_NS, "nil") == Some("true");
    let scale: i32 = element
        .attr_local("scale")
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(0);
    let negated = element.attr_local("sign") == Some("-");
    let format: Option<CompactString> = element.attr_local("format").map(Into::into);

    let value = if nil {
        FactValue::Nil
    } else {
        let raw = assemble_text(element, continuations)?;
        match construct_value(element, &raw, numeric, scale, negated) {
            Ok(value) => value,
            Err(error) => {
                if lenient {
                    let format_name = format.clone().unwrap_or_default().to_string();
                    log::warn!("degrading inline fact {name}: {error}");
                    instance.taxonomy.warnings.push(Warning::DegradedTransform {
                        format: format_name,
                        value: raw.trim().to_string(),
                    });
                    FactValue::Text(raw.trim().to_string())
                } else {
                    return Err(error);
                }
            }
        }
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
        inline: Some(InlineSource {
            scale,
            negated,
            format,
        }),
    };
    Ok(Some(instance.add_fact(fact)))
}

/// Descendant text in document order, `ix:exclude` subtrees omitted,
/// `continuedAt` chains appended. A chain that revisits a continuation is
/// an error.
fn assemble_text(
    element: &XmlElement,
    continuations: &HashMap<&str, &XmlElement>,
) -> Result<String> {
    let keep = |child: &XmlElement| !child.is(IX_NS, "exclude");
    let mut text = element.text_content_filtered(&keep);
    let mut visited: HashSet<&str> = HashSet::new();
    let mut next = element.attr_local("continuedAt");
    while let Some(id) = next {
        if !visited.insert(id) {
            return Err(Error::SchemaValidation(format!(
                "continuation cycle through {id}"
            )));
        }
        let continuation = continuations.get(id).ok_or_else(|| {
            Error::SchemaValidation(format!("missing ix:continuation {id}"))
        })?;
        text.push_str(&continuation.text_content_filtered(&keep));
        next = continuation.attr_local("continuedAt");
    }
    Ok(text)
}

fn construct_value(
    element: &XmlElement,
    raw: &str,
    numeric: bool,
    scale: i32,
    negated: bool,
) -> Result<FactValue> {
    let mut value = raw.trim().to_string();
    if let Some(format) = element.attr_local("format") {
        let qname = element.resolve_qname(format).ok_or_else(|| Error::Transform {
            format: format.to_string(),
            value: value.clone(),
        })?;
        value = transforms::normalize(&qname.namespace, &qname.local_name, &value)?;
    }
    if !numeric {
        return Ok(FactValue::Text(value));
    }
    let mut scaled =
        scale_decimal(&value, scale).ok_or_else(|| Error::NumericParse(value.clone()))?;
    if negated {
        scaled = if let Some(positive) = scaled.strip_prefix('-') {
            positive.to_string()
        } else {
            format!("-{scaled}")
        };
    }
    Ok(FactValue::Numeric(scaled))
}

/// Shifts the decimal point of a plain decimal string by `10^scale`,
/// without going through floating point.
fn scale_decimal(value: &str, scale: i32) -> Option<String> {
    let value = value.trim();
    let (sign, magnitude) = match value.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", value.strip_prefix('+').unwrap_or(value)),
    };
    let (int_part, frac_part) = match magnitude.split_once('.') {
        Some((i, f)) => (i, f),
        None => (magnitude, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
        || magnitude.matches('.').count() > 1
    {
        return None;
    }

    let digits: String = format!("{int_part}{frac_part}");
    let point = int_part.len() as i32 + scale;
    let mut out = String::new();
    if point <= 0 {
        out.push_str("0.");
        for _ in 0..-point {
            out.push('0');
        }
        out.push_str(&digits);
    } else if point as usize >= digits.len() {
        out.push_str(&digits);
        for _ in 0..(point as usize - digits.len()) {
            out.push('0');
        }
    } else {
        out.push_str(&digits[..point as usize]);
        out.push('.');
        out.push_str(&digits[point as usize..]);
    }

    // canonical form: no leading zeros, no trailing fractional zeros
    let out = canonicalize_decimal(&out);
    if out == "0" {
        return Some(out);
    }
    Some(format!("{sign}{out}"))
}

fn canonicalize_decimal(value: &str) -> String {
    let (int_part, frac_part) = match value.split_once('.') {
        Some((i, f)) => (i, f),
        None => (value, ""),
    };
    let int_trimmed = int_part.trim_start_matches('0');
    let int_out = if int_trimmed.is_empty() { "0" } else { int_trimmed };
    let frac_trimmed = frac_part.trim_end_matches('0');
    if frac_trimmed.is_empty() {
        int_out.to_string()
    } else {
        format!("{int_out}.{frac_trimmed}")
    }
}

fn attach_inline_footnotes(
    root: &XmlElement,
    instance: &mut XbrlInstance,
    facts_by_xml_id: &[(CompactString, FactId)],
) {
    let mut notes: HashMap<&str, usize> = HashMap::new();
    for footnote in root.descendants(IX_NS, "footnote") {
        let Some(id) = footnote.attr_local("id") else {
            continue;
        };
        let index = instance.footnotes.len();
        instance.footnotes.push(Footnote {
            lang: footnote.xml_lang().map(Into::into),
            content: footnote.text_content().trim().to_string(),
        });
        notes.insert(id, index);
    }
    if notes.is_empty() {
        return;
    }

    for relationship in root.descendants(IX_NS, "relationship") {
        let from_refs = relationship.attr_local("fromRefs").unwrap_or_default();
        let to_refs = relationship.attr_local("toRefs").unwrap_or_default();
        for fact_ref in from_refs.split_whitespace() {
            let Some((_, fact_id)) = facts_by_xml_id
                .iter()
                .find(|(id, _)| id.as_str() == fact_ref)
            else {
                continue;
            };
            for note_ref in to_refs.split_whitespace() {
                if let Some(&note_index) = notes.get(note_ref) {
                    instance.facts[fact_id.0 as usize].footnotes.push(note_index);
                }
            }
        }
    }
}

/// Drops `<script>...</script>` blocks before XML parsing; filings embed
/// javascript that is not well-formed XML.
fn strip_scripts(text: &str) -> String {
    let lower = text.to_lowercase();
    let mut out = String::with_capacity(text.len());
    let mut position = 0;
    while let Some(start_offset) = lower[position..].find("<script") {
        let start = position + start_offset;
        out.push_str(&text[position..start]);
        match lower[start..].find("</script") {
            Some(end_offset) => {
                let close = start + end_offset;
                match lower[close..].find('>') {
                    Some(gt) => position = close + gt + 1,
                    None => {
                        position = text.len();
                    }
                }
            }
            None => {
                position = text.len();
            }
        }
    }
    out.push_str(&text[position..]);
    out
}
