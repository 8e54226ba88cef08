//! Shared filing fixtures: a small extension taxonomy with label,
//! presentation and calculation linkbases, plus instance documents in both
//! syntaxes. Everything parses offline.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

pub const EX_NS: &str = "http://example.com/2020";

pub const EX_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           xmlns:xbrli="http://www.xbrl.org/2003/instance"
           xmlns:xbrldt="http://xbrl.org/2005/xbrldt"
           xmlns:link="http://www.xbrl.org/2003/linkbase"
           xmlns:xlink="http://www.w3.org/1999/xlink"
           xmlns:ex="http://example.com/2020"
           targetNamespace="http://example.com/2020">
  <xs:annotation>
    <xs:appinfo>
      <link:linkbaseRef xlink:type="simple" xlink:href="ex_lab.xml"
          xlink:role="http://www.xbrl.org/2003/role/labelLinkbaseRef"/>
      <link:linkbaseRef xlink:type="simple" xlink:href="ex_pre.xml"
          xlink:role="http://www.xbrl.org/2003/role/presentationLinkbaseRef"/>
      <link:linkbaseRef xlink:type="simple" xlink:href="ex_cal.xml"
          xlink:role="http://www.xbrl.org/2003/role/calculationLinkbaseRef"/>
      <link:roleType id="BalanceSheet" roleURI="http://example.com/role/BalanceSheet">
        <link:definition>1000 - Statement - Balance Sheet</link:definition>
      </link:roleType>
    </xs:appinfo>
  </xs:annotation>
  <xs:element id="ex_Assets" name="Assets" nillable="true"
      substitutionGroup="xbrli:item" type="xbrli:monetaryItemType"
      xbrli:balance="debit" xbrli:periodType="instant"/>
  <xs:element id="ex_Cash" name="Cash" nillable="true"
      substitutionGroup="xbrli:item" type="xbrli:monetaryItemType"
      xbrli:balance="debit" xbrli:periodType="instant"/>
  <xs:element id="ex_OtherAssets" name="OtherAssets" nillable="true"
      substitutionGroup="xbrli:item" type="xbrli:monetaryItemType"
      xbrli:balance="debit" xbrli:periodType="instant"/>
  <xs:element id="ex_Revenues" name="Revenues" nillable="true"
      substitutionGroup="xbrli:item" type="xbrli:monetaryItemType"
      xbrli:balance="credit" xbrli:periodType="duration"/>
  <xs:element id="ex_Narrative" name="Narrative" nillable="true"
      substitutionGroup="xbrli:item" type="xbrli:stringItemType"
      xbrli:periodType="duration"/>
  <xs:element id="ex_ContactInfo" name="ContactInfo" nillable="true"
      substitutionGroup="xbrli:tuple"/>
  <xs:element id="ex_SegmentAxis" name="SegmentAxis" abstract="true" nillable="true"
      substitutionGroup="xbrldt:dimensionItem" type="xbrli:stringItemType"
      xbrli:periodType="duration"/>
  <xs:element id="ex_EuropeMember" name="EuropeMember" abstract="true" nillable="true"
      substitutionGroup="xbrli:item" type="xbrli:stringItemType"
      xbrli:periodType="duration"/>
</xs:schema>"#;

pub const EX_LAB: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<link:linkbase xmlns:link="http://www.xbrl.org/2003/linkbase"
               xmlns:xlink="http://www.w3.org/1999/xlink">
  <link:labelLink xlink:type="extended" xlink:role="http://www.xbrl.org/2003/role/link">
    <link:loc xlink:type="locator" xlink:label="loc_Assets" xlink:href="ex.xsd#ex_Assets"/>
    <link:loc xlink:type="locator" xlink:label="loc_Revenues" xlink:href="ex.xsd#ex_Revenues"/>
    <link:label xlink:type="resource" xlink:label="lab_Assets"
        xlink:role="http://www.xbrl.org/2003/role/label" xml:lang="en-US">Assets</link:label>
    <link:label xlink:type="resource" xlink:label="lab_Assets"
        xlink:role="http://www.xbrl.org/2003/role/terseLabel" xml:lang="en-US">Assets, total</link:label>
    <link:label xlink:type="resource" xlink:label="lab_Revenues"
        xlink:role="http://www.xbrl.org/2003/role/label" xml:lang="en-US">Revenues</link:label>
    <link:labelArc xlink:type="arc"
        xlink:arcrole="http://www.xbrl.org/2003/arcrole/concept-label"
        xlink:from="loc_Assets" xlink:to="lab_Assets"/>
    <link:labelArc xlink:type="arc"
        xlink:arcrole="http://www.xbrl.org/2003/arcrole/concept-label"
        xlink:from="loc_Revenues" xlink:to="lab_Revenues"/>
  </link:labelLink>
</link:linkbase>"#;

pub const EX_PRE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<link:linkbase xmlns:link="http://www.xbrl.org/2003/linkbase"
               xmlns:xlink="http://www.w3.org/1999/xlink">
  <link:roleRef roleURI="http://example.com/role/BalanceSheet"
      xlink:type="simple" xlink:href="ex.xsd#BalanceSheet"/>
  <link:presentationLink xlink:type="extended" xlink:role="http://example.com/role/BalanceSheet">
    <link:loc xlink:type="locator" xlink:label="loc_Assets" xlink:href="ex.xsd#ex_Assets"/>
    <link:loc xlink:type="locator" xlink:label="loc_Cash" xlink:href="ex.xsd#ex_Cash"/>
    <link:loc xlink:type="locator" xlink:label="loc_Other" xlink:href="ex.xsd#ex_OtherAssets"/>
    <link:presentationArc xlink:type="arc"
        xlink:arcrole="http://www.xbrl.org/2003/arcrole/parent-child"
        xlink:from="loc_Assets" xlink:to="loc_Cash" order="2"
        preferredLabel="http://www.xbrl.org/2003/role/terseLabel"/>
    <link:presentationArc xlink:type="arc"
        xlink:arcrole="http://www.xbrl.org/2003/arcrole/parent-child"
        xlink:from="loc_Assets" xlink:to="loc_Other" order="1"/>
  </link:presentationLink>
</link:linkbase>"#;

pub const EX_CAL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<link:linkbase xmlns:link="http://www.xbrl.org/2003/linkbase"
               xmlns:xlink="http://www.w3.org/1999/xlink">
  <link:roleRef roleURI="http://example.com/role/BalanceSheet"
      xlink:type="simple" xlink:href="ex.xsd#BalanceSheet"/>
  <link:calculationLink xlink:type="extended" xlink:role="http://example.com/role/BalanceSheet">
    <link:loc xlink:type="locator" xlink:label="loc_Assets" xlink:href="ex.xsd#ex_Assets"/>
    <link:loc xlink:type="locator" xlink:label="loc_Cash" xlink:href="ex.xsd#ex_Cash"/>
    <link:loc xlink:type="locator" xlink:label="loc_Other" xlink:href="ex.xsd#ex_OtherAssets"/>
    <link:calculationArc xlink:type="arc"
        xlink:arcrole="http://www.xbrl.org/2003/arcrole/summation-item"
        xlink:from="loc_Assets" xlink:to="loc_Cash" order="1" weight="1.0"/>
    <link:calculationArc xlink:type="arc"
        xlink:arcrole="http://www.xbrl.org/2003/arcrole/summation-item"
        xlink:from="loc_Assets" xlink:to="loc_Other" order="2" weight="1.0"/>
  </link:calculationLink>
</link:linkbase>"#;

pub const INSTANCE_XML: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<xbrl xmlns="http://www.xbrl.org/2003/instance"
      xmlns:link="http://www.xbrl.org/2003/linkbase"
      xmlns:xlink="http://www.w3.org/1999/xlink"
      xmlns:xbrldi="http://xbrl.org/2006/xbrldi"
      xmlns:iso4217="http://www.xbrl.org/2003/iso4217"
      xmlns:ex="http://example.com/2020">
  <link:schemaRef xlink:type="simple" xlink:href="ex.xsd"/>
  <context id="AsOf2020">
    <entity><identifier scheme="http://www.sec.gov/CIK">0000320193</identifier></entity>
    <period><instant>2020-09-26</instant></period>
  </context>
  <context id="AsOf2020Europe">
    <entity>
      <identifier scheme="http://www.sec.gov/CIK">0000320193</identifier>
      <segment>
        <xbrldi:explicitMember dimension="ex:SegmentAxis">ex:EuropeMember</xbrldi:explicitMember>
      </segment>
    </entity>
    <period><instant>2020-09-26</instant></period>
  </context>
  <context id="FY2020">
    <entity><identifier scheme="http://www.sec.gov/CIK">0000320193</identifier></entity>
    <period><startDate>2019-09-29</startDate><endDate>2020-09-26</endDate></period>
  </context>
  <unit id="usd"><measure>iso4217:USD</measure></unit>
  <ex:Assets contextRef="AsOf2020" unitRef="usd" decimals="-6" id="fact-assets">323888000000</ex:Assets>
  <ex:Cash contextRef="AsOf2020" unitRef="usd" decimals="-6">38016000000</ex:Cash>
  <ex:Assets contextRef="AsOf2020Europe" unitRef="usd" decimals="-6">68640000000</ex:Assets>
  <ex:Revenues contextRef="FY2020" unitRef="usd" decimals="-6">274515000000</ex:Revenues>
  <ex:Narrative contextRef="FY2020" id="fact-narrative">Strong year.</ex:Narrative>
  <link:footnoteLink xlink:type="extended" xlink:role="http://www.xbrl.org/2003/role/link">
    <link:loc xlink:type="locator" xlink:href="#fact-narrative" xlink:label="fact1"/>
    <link:footnote xlink:type="resource" xlink:label="note1"
        xlink:role="http://www.xbrl.org/2003/role/footnote"
        xml:lang="en-US">See segment note.</link:footnote>
    <link:footnoteArc xlink:type="arc"
        xlink:arcrole="http://www.xbrl.org/2003/arcrole/fact-footnote"
        xlink:from="fact1" xlink:to="note1"/>
  </link:footnoteLink>
</xbrl>"##;

pub const INSTANCE_IXBRL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml"
      xmlns:ix="http://www.xbrl.org/2013/inlineXBRL"
      xmlns:ixt="http://www.xbrl.org/inlineXBRL/transformation/2020-02-12"
      xmlns:link="http://www.xbrl.org/2003/linkbase"
      xmlns:xlink="http://www.w3.org/1999/xlink"
      xmlns:xbrli="http://www.xbrl.org/2003/instance"
      xmlns:iso4217="http://www.xbrl.org/2003/iso4217"
      xmlns:ex="http://example.com/2020">
<head><title>Annual report</title>
<script type="text/javascript">if (window.x < 1) { window.x = 1; }</script>
</head>
<body>
  <div style="display:none">
    <ix:header>
      <ix:hidden>
        <ix:nonNumeric name="ex:Narrative" contextRef="FY2020" id="hidden-note">Strong year.</ix:nonNumeric>
      </ix:hidden>
      <ix:references>
        <link:schemaRef xlink:type="simple" xlink:href="ex.xsd"/>
      </ix:references>
      <ix:resources>
        <xbrli:context id="AsOf2020">
          <xbrli:entity><xbrli:identifier scheme="http://www.sec.gov/CIK">0000320193</xbrli:identifier></xbrli:entity>
          <xbrli:period><xbrli:instant>2020-09-26</xbrli:instant></xbrli:period>
        </xbrli:context>
        <xbrli:context id="FY2020">
          <xbrli:entity><xbrli:identifier scheme="http://www.sec.gov/CIK">0000320193</xbrli:identifier></xbrli:entity>
          <xbrli:period><xbrli:startDate>2019-09-29</xbrli:startDate><xbrli:endDate>2020-09-26</xbrli:endDate></xbrli:period>
        </xbrli:context>
        <xbrli:unit id="usd"><xbrli:measure>iso4217:USD</xbrli:measure></xbrli:unit>
      </ix:resources>
    </ix:header>
  </div>
  <p>Total assets were
    <ix:nonFraction name="ex:Assets" contextRef="AsOf2020" unitRef="usd"
        decimals="-6" scale="3" format="ixt:num-dot-decimal"
        id="f-assets">323,888,000</ix:nonFraction>.
  </p>
  <p>The items below sum to revenues of $
    <ix:nonFraction name="ex:Revenues" contextRef="FY2020" unitRef="usd"
        decimals="-6" scale="6" sign="-" format="ixt:num-dot-decimal"
        id="f-revenues">1,234.50</ix:nonFraction> million.
  </p>
  <p>
    <ix:nonNumeric name="ex:Narrative" contextRef="FY2020"
        continuedAt="more" id="f-narrative">Results were <b>mixed</b>
      <ix:exclude>(unaudited)</ix:exclude>overall</ix:nonNumeric>
    and <ix:continuation id="more"> improved late in the year.</ix:continuation>
  </p>
  <div>
    <ix:tuple name="ex:ContactInfo" tupleID="t1" id="f-contact">
      <ix:nonNumeric name="ex:Narrative" contextRef="FY2020" order="2" id="f-city">Cupertino</ix:nonNumeric>
      <ix:nonNumeric name="ex:Narrative" contextRef="FY2020" order="1" id="f-street">One Apple Park Way</ix:nonNumeric>
    </ix:tuple>
  </div>
  <p>
    <ix:footnote id="fn1" xml:lang="en-US">Audited figures.</ix:footnote>
    <ix:relationship fromRefs="f-assets" toRefs="fn1"/>
  </p>
</body>
</html>"#;

/// Writes the shared taxonomy plus the given instance body into `dir`.
pub fn write_filing(dir: &Path, instance_name: &str, instance_body: &str) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join("ex.xsd"), EX_XSD).unwrap();
    fs::write(dir.join("ex_lab.xml"), EX_LAB).unwrap();
    fs::write(dir.join("ex_pre.xml"), EX_PRE).unwrap();
    fs::write(dir.join("ex_cal.xml"), EX_CAL).unwrap();
    let instance_path = dir.join(instance_name);
    fs::write(&instance_path, instance_body).unwrap();
    instance_path
}
