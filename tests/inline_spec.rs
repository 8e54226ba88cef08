//! End-to-end coverage for inline XBRL: value construction with
//! transforms, scale and sign, continuations, tuples, the hidden section,
//! and equivalence with the classic XML form.

mod common;

use ferroxbrl::model::{Decimals, FactValue};
use ferroxbrl::{Error, HttpCache, XbrlInstance, XbrlParser};

fn parse_inline_fixture() -> XbrlInstance {
    let dir = tempfile::tempdir().unwrap();
    let path = common::write_filing(dir.path(), "report.htm", common::INSTANCE_IXBRL);
    let cache = HttpCache::new(dir.path().join("cache"));
    XbrlParser::new(&cache).parse_instance_locally(&path).unwrap()
}

fn fact_by_id<'a>(instance: &'a XbrlInstance, id: &str) -> &'a ferroxbrl::Fact {
    instance
        .facts
        .iter()
        .find(|f| f.xml_id.as_deref() == Some(id))
        .unwrap()
}

#[test]
fn autodetects_inline_and_extracts_facts() {
    let instance = parse_inline_fixture();
    // hidden narrative + assets + revenues + continued narrative
    // + two tuple members + the tuple itself
    assert_eq!(instance.facts.len(), 7);
    assert_eq!(instance.contexts.len(), 2);
    assert_eq!(instance.units.len(), 1);
}

#[test]
fn scale_sign_and_format_produce_canonical_numerics() {
    let instance = parse_inline_fixture();

    // 1,234.50 with format num-dot-decimal, scale 6, sign "-"
    let revenues = fact_by_id(&instance, "f-revenues");
    assert_eq!(revenues.value, FactValue::Numeric("-1234500000".into()));
    assert_eq!(revenues.decimals, Some(Decimals::Value(-6)));
    let inline = revenues.inline.as_ref().unwrap();
    assert_eq!(inline.scale, 6);
    assert!(inline.negated);
    assert_eq!(inline.format.as_deref(), Some("ixt:num-dot-decimal"));

    // 323,888,000 at scale 3
    let assets = fact_by_id(&instance, "f-assets");
    assert_eq!(assets.value, FactValue::Numeric("323888000000".into()));
    assert_eq!(assets.numeric_value(), Some(323_888_000_000.0));
}

#[test]
fn continuations_and_excludes_shape_text_values() {
    let instance = parse_inline_fixture();
    let narrative = fact_by_id(&instance, "f-narrative");
    match &narrative.value {
        FactValue::Text(text) => {
            assert!(text.starts_with("Results were mixed"));
            assert!(text.ends_with("improved late in the year."));
            assert!(!text.contains("unaudited"));
        }
        other => panic!("unexpected value {other:?}"),
    }
}

#[test]
fn hidden_section_facts_are_parsed() {
    let instance = parse_inline_fixture();
    let hidden = fact_by_id(&instance, "hidden-note");
    assert_eq!(hidden.value, FactValue::Text("Strong year.".into()));
    assert!(hidden.inline.is_some());
}

#[test]
fn tuples_group_member_facts_in_order() {
    let instance = parse_inline_fixture();
    let tuple = fact_by_id(&instance, "f-contact");
    assert!(tuple.context.is_none());
    match &tuple.value {
        FactValue::Tuple(members) => {
            assert_eq!(members.len(), 2);
            // order attributes (1, 2) beat document order
            let first = instance.fact(members[0]);
            let second = instance.fact(members[1]);
            assert_eq!(first.value, FactValue::Text("One Apple Park Way".into()));
            assert_eq!(second.value, FactValue::Text("Cupertino".into()));
        }
        other => panic!("unexpected value {other:?}"),
    }
}

#[test]
fn inline_footnotes_attach_through_relationships() {
    let instance = parse_inline_fixture();
    let assets = fact_by_id(&instance, "f-assets");
    assert_eq!(assets.footnotes.len(), 1);
    assert_eq!(instance.footnotes[assets.footnotes[0]].content, "Audited figures.");
}

#[test]
fn unknown_transform_fails_loudly_or_degrades() {
    let dir = tempfile::tempdir().unwrap();
    let broken = common::INSTANCE_IXBRL.replace("ixt:num-dot-decimal", "ixt:num-unit-decimal");
    let path = common::write_filing(dir.path(), "report.htm", &broken);
    let cache = HttpCache::new(dir.path().join("cache"));

    let strict = XbrlParser::new(&cache).parse_instance_locally(&path);
    assert!(matches!(strict, Err(Error::Transform { .. })));

    let lenient = XbrlParser::new(&cache)
        .with_lenient_transforms(true)
        .parse_instance_locally(&path)
        .unwrap();
    let assets = fact_by_id(&lenient, "f-assets");
    // raw display text survives untransformed
    assert_eq!(assets.value, FactValue::Text("323,888,000".into()));
    assert!(!lenient.taxonomy.warnings.is_empty());
}

#[test]
fn malformed_numeric_is_a_numeric_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let broken = common::INSTANCE_IXBRL.replace(
        r#"id="f-assets">323,888,000"#,
        r#"id="f-assets">n/a"#,
    );
    let path = common::write_filing(dir.path(), "report.htm", &broken);
    let cache = HttpCache::new(dir.path().join("cache"));
    let result = XbrlParser::new(&cache).parse_instance_locally(&path);
    assert!(matches!(
        result,
        Err(Error::Transform { .. }) | Err(Error::NumericParse(_))
    ));
}

/// The iXBRL rendition and an equivalent classic instance must yield the
/// same fact multiset once transforms, scale and sign are applied.
#[test]
fn inline_and_xml_forms_agree_on_shared_facts() {
    let inline = parse_inline_fixture();

    let dir = tempfile::tempdir().unwrap();
    let equivalent_xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<xbrl xmlns="http://www.xbrl.org/2003/instance"
      xmlns:link="http://www.xbrl.org/2003/linkbase"
      xmlns:xlink="http://www.w3.org/1999/xlink"
      xmlns:iso4217="http://www.xbrl.org/2003/iso4217"
      xmlns:ex="http://example.com/2020">
  <link:schemaRef xlink:type="simple" xlink:href="ex.xsd"/>
  <context id="AsOf2020">
    <entity><identifier scheme="http://www.sec.gov/CIK">0000320193</identifier></entity>
    <period><instant>2020-09-26</instant></period>
  </context>
  <context id="FY2020">
    <entity><identifier scheme="http://www.sec.gov/CIK">0000320193</identifier></entity>
    <period><startDate>2019-09-29</startDate><endDate>2020-09-26</endDate></period>
  </context>
  <unit id="usd"><measure>iso4217:USD</measure></unit>
  <ex:Assets contextRef="AsOf2020" unitRef="usd" decimals="-6">323888000000</ex:Assets>
  <ex:Revenues contextRef="FY2020" unitRef="usd" decimals="-6">-1234500000</ex:Revenues>
</xbrl>"#;
    let path = common::write_filing(dir.path(), "instance.xml", equivalent_xml);
    let cache = HttpCache::new(dir.path().join("cache"));
    let xml = XbrlParser::new(&cache).parse_instance_locally(&path).unwrap();

    let key = |instance: &XbrlInstance, fact: &ferroxbrl::Fact| {
        (
            instance.taxonomy.concept(fact.concept).name().to_string(),
            instance.context(fact.context.unwrap()).key(),
            fact.unit.map(|u| instance.unit(u).to_string()),
            fact.value.as_str().unwrap().to_string(),
        )
    };
    let mut xml_facts: Vec<_> = xml.facts.iter().map(|f| key(&xml, f)).collect();
    xml_facts.sort();

    let mut inline_numeric: Vec<_> = inline
        .facts
        .iter()
        .filter(|f| matches!(f.value, FactValue::Numeric(_)))
        .map(|f| key(&inline, f))
        .collect();
    inline_numeric.sort();

    assert_eq!(xml_facts, inline_numeric);
}
