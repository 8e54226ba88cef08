//! Linkbase parsing.
//!
//! A linkbase is an XLink document relating concepts to concepts (the
//! presentation, calculation and definition linkbases) or to resources
//! (label and reference linkbases). Each `link:*Link` element is an
//! extended link: a bag of locators, resources and arcs sharing a role,
//! with labels that are local to that link.
//!
//! Everything stays in parsed form here, prohibited arcs included; the
//! resolver applies override and prohibition semantics once the whole DTS
//! is known.

use compact_str::CompactString;

use crate::cache::resolve_uri;
use crate::model::{QName, STANDARD_LABEL_ROLE};
use crate::xml::{XmlDocument, XmlElement, LINK_NS, XLINK_NS, XML_NS};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkbaseKind {
    Label,
    Presentation,
    Calculation,
    Definition,
    Reference,
    Generic,
}

impl LinkbaseKind {
    /// From a `linkbaseRef` `xlink:role`, e.g.
    /// `http://www.xbrl.org/2003/role/labelLinkbaseRef`.
    pub fn from_linkbase_ref_role(role: &str) -> Option<Self> {
        Some(match role {
            "http://www.xbrl.org/2003/role/labelLinkbaseRef" => LinkbaseKind::Label,
            "http://www.xbrl.org/2003/role/presentationLinkbaseRef" => LinkbaseKind::Presentation,
            "http://www.xbrl.org/2003/role/calculationLinkbaseRef" => LinkbaseKind::Calculation,
            "http://www.xbrl.org/2003/role/definitionLinkbaseRef" => LinkbaseKind::Definition,
            "http://www.xbrl.org/2003/role/referenceLinkbaseRef" => LinkbaseKind::Reference,
            _ => return None,
        })
    }

    /// Filers frequently omit the role; the conventional file naming gives
    /// the kind away (`aapl-20200926_lab.xml`).
    pub fn guess_from_href(href: &str) -> Option<Self> {
        Some(if href.contains("_lab") {
            LinkbaseKind::Label
        } else if href.contains("_pre") {
            LinkbaseKind::Presentation
        } else if href.contains("_cal") {
            LinkbaseKind::Calculation
        } else if href.contains("_def") {
            LinkbaseKind::Definition
        } else if href.contains("_ref") {
            LinkbaseKind::Reference
        } else {
            return None;
        })
    }

    fn from_extended_link_name(local_name: &str) -> Option<Self> {
        Some(match local_name {
            "labelLink" => LinkbaseKind::Label,
            "presentationLink" => LinkbaseKind::Presentation,
            "calculationLink" => LinkbaseKind::Calculation,
            "definitionLink" => LinkbaseKind::Definition,
            "referenceLink" => LinkbaseKind::Reference,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArcUse {
    Optional,
    Prohibited,
}

/// One arc, e.g.
/// `<link:presentationArc order="30" use="prohibited" priority="2"
///  xlink:arcrole="http://www.xbrl.org/2003/arcrole/parent-child"
///  xlink:from="loc_Assets" xlink:to="loc_Cash"/>`.
#[derive(Debug, Clone)]
pub struct Arc {
    pub from: CompactString,
    pub to: CompactString,
    pub arcrole: CompactString,
    pub order: f64,
    pub weight: Option<f64>,
    pub priority: i32,
    pub use_: ArcUse,
    pub preferred_label: Option<CompactString>,
}

/// `<link:loc xlink:label="loc_Assets"
///  xlink:href="../elts/us-gaap-2020-01-31.xsd#us-gaap_Assets"/>` —
/// the bridge from link-local labels back to schema concepts. The href is
/// stored absolute.
#[derive(Debug, Clone)]
pub struct Locator {
    pub label: CompactString,
    pub href: CompactString,
}

#[derive(Debug, Clone)]
pub struct LabelResource {
    pub xlink_label: CompactString,
    pub role: CompactString,
    pub lang: CompactString,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct ReferenceResource {
    pub xlink_label: CompactString,
    pub role: CompactString,
    /// Part name/value pairs, e.g. `(ref:Section, "13")`. Exposed as data,
    /// no interpretation.
    pub parts: Vec<(QName, String)>,
}

#[derive(Debug, Clone)]
pub struct ExtendedLink {
    pub role: CompactString,
    pub locators: Vec<Locator>,
    pub labels: Vec<LabelResource>,
    pub references: Vec<ReferenceResource>,
    pub arcs: Vec<Arc>,
}

#[derive(Debug, Clone)]
pub struct Linkbase {
    pub kind: LinkbaseKind,
    pub source_url: CompactString,
    pub extended_links: Vec<ExtendedLink>,
    /// roleURI -> href, from `link:roleRef` (connects extended link roles
    /// to the `roleType` declarations in the schema).
    pub role_refs: Vec<(CompactString, CompactString)>,
}

pub fn parse_linkbase(doc: &XmlDocument, kind_hint: Option<LinkbaseKind>) -> Result<Linkbase> {
    let root = &doc.root;
    if !root.is(LINK_NS, "linkbase") {
        return Err(Error::SchemaValidation(format!(
            "{} is not a linkbase (root is {})",
            doc.source_url, root.local_name
        )));
    }

    let mut linkbase = Linkbase {
        kind: kind_hint.unwrap_or(LinkbaseKind::Generic),
        source_url: doc.source_url.clone(),
        extended_links: Vec::new(),
        role_refs: Vec::new(),
    };
    let mut detected: Option<LinkbaseKind> = None;

    for element in root.child_elements() {
        if element.is(LINK_NS, "roleRef") {
            if let (Some(uri), Some(href)) =
                (element.attr_local("roleURI"), element.attr(XLINK_NS, "href"))
            {
                linkbase.role_refs.push((uri.into(), href.into()));
            }
            continue;
        }
        let is_extended = element.attr(XLINK_NS, "type") == Some("extended")
            || LinkbaseKind::from_extended_link_name(&element.local_name).is_some();
        if !is_extended {
            continue;
        }
        if detected.is_none() {
            detected = LinkbaseKind::from_extended_link_name(&element.local_name);
        }
        linkbase
            .extended_links
            .push(parse_extended_link(element, &doc.source_url));
    }

    if kind_hint.is_none() {
        linkbase.kind = detected.unwrap_or(LinkbaseKind::Generic);
    }
    Ok(linkbase)
}

fn parse_extended_link(element: &XmlElement, source_url: &str) -> ExtendedLink {
    let mut link = ExtendedLink {
        role: element.attr(XLINK_NS, "role").unwrap_or_default().into(),
        locators: Vec::new(),
        labels: Vec::new(),
        references: Vec::new(),
        arcs: Vec::new(),
    };

    for child in element.child_elements() {
        match child.attr(XLINK_NS, "type") {
            Some("locator") => {
                let (Some(label), Some(href)) =
                    (child.attr(XLINK_NS, "label"), child.attr(XLINK_NS, "href"))
                else {
                    continue;
                };
                link.locators.push(Locator {
                    label: label.into(),
                    href: resolve_uri(source_url, href).into(),
                });
            }
            Some("resource") => parse_resource(child, &mut link),
            Some("arc") => {
                if let Some(arc) = parse_arc(child) {
                    link.arcs.push(arc);
                }
            }
            _ => {
                // tolerate documents that omit xlink:type on standard names
                if child.local_name.ends_with("Arc") {
                    if let Some(arc) = parse_arc(child) {
                        link.arcs.push(arc);
                    }
                } else if child.is(LINK_NS, "loc") {
                    if let (Some(label), Some(href)) =
                        (child.attr(XLINK_NS, "label"), child.attr(XLINK_NS, "href"))
                    {
                        link.locators.push(Locator {
                            label: label.into(),
                            href: resolve_uri(source_url, href).into(),
                        });
                    }
                }
            }
        }
    }
    link
}

fn parse_resource(child: &XmlElement, link: &mut ExtendedLink) {
    let Some(xlink_label) = child.attr(XLINK_NS, "label") else {
        return;
    };
    if child.is(LINK_NS, "label") {
        link.labels.push(LabelResource {
            xlink_label: xlink_label.into(),
            role: child
                .attr(XLINK_NS, "role")
                .unwrap_or(STANDARD_LABEL_ROLE)
                .into(),
            lang: child.attr(XML_NS, "lang").unwrap_or_default().into(),
            text: child.text_content().trim().to_string(),
        });
    } else if child.is(LINK_NS, "reference") {
        let parts = child
            .child_elements()
            .map(|part| {
                (
                    QName::new(part.namespace.clone(), part.local_name.clone()),
                    part.text_content().trim().to_string(),
                )
            })
            .collect();
        link.references.push(ReferenceResource {
            xlink_label: xlink_label.into(),
            role: child.attr(XLINK_NS, "role").unwrap_or_default().into(),
            parts,
        });
    }
}

fn parse_arc(element: &XmlElement) -> Option<Arc> {
    let from = element.attr(XLINK_NS, "from")?;
    let to = element.attr(XLINK_NS, "to")?;
    Some(Arc {
        from: from.into(),
        to: to.into(),
        arcrole: element.attr(XLINK_NS, "arcrole").unwrap_or_default().into(),
        order: element
            .attr_local("order")
            .and_then(|o| o.trim().parse().ok())
            .unwrap_or(1.0),
        weight: element.attr_local("weight").and_then(|w| w.trim().parse().ok()),
        priority: element
            .attr_local("priority")
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(0),
        use_: match element.attr_local("use") {
            Some("prohibited") => ArcUse::Prohibited,
            _ => ArcUse::Optional,
        },
        preferred_label: element.attr_local("preferredLabel").map(Into::into),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml;

    const LABEL_LINKBASE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<link:linkbase xmlns:link="http://www.xbrl.org/2003/linkbase"
               xmlns:xlink="http://www.w3.org/1999/xlink"
               xmlns:xml="http://www.w3.org/XML/1998/namespace">
  <link:labelLink xlink:type="extended" xlink:role="http://www.xbrl.org/2003/role/link">
    <link:loc xlink:type="locator" xlink:label="loc_Assets"
              xlink:href="ex.xsd#ex_Assets"/>
    <link:label xlink:type="resource" xlink:label="lab_Assets"
                xlink:role="http://www.xbrl.org/2003/role/label"
                xml:lang="en-US">Assets</link:label>
    <link:label xlink:type="resource" xlink:label="lab_Assets"
                xlink:role="http://www.xbrl.org/2003/role/terseLabel"
                xml:lang="en-US">Assets, total</link:label>
    <link:labelArc xlink:type="arc"
                   xlink:arcrole="http://www.xbrl.org/2003/arcrole/concept-label"
                   xlink:from="loc_Assets" xlink:to="lab_Assets"/>
  </link:labelLink>
</link:linkbase>"#;

    #[test]
    fn parses_label_linkbase() {
        let doc = xml::read_str(LABEL_LINKBASE, "https://example.com/taxonomy/ex_lab.xml").unwrap();
        let lb = parse_linkbase(&doc, None).unwrap();
        assert_eq!(lb.kind, LinkbaseKind::Label);
        assert_eq!(lb.extended_links.len(), 1);
        let link = &lb.extended_links[0];
        assert_eq!(link.locators.len(), 1);
        // relative locator hrefs resolve against the linkbase location
        assert_eq!(
            link.locators[0].href,
            "https://example.com/taxonomy/ex.xsd#ex_Assets"
        );
        assert_eq!(link.labels.len(), 2);
        assert_eq!(link.labels[1].text, "Assets, total");
        assert_eq!(link.arcs.len(), 1);
        assert_eq!(link.arcs[0].use_, ArcUse::Optional);
        assert_eq!(link.arcs[0].priority, 0);
        assert_eq!(link.arcs[0].order, 1.0);
    }

    const CALC_LINKBASE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<link:linkbase xmlns:link="http://www.xbrl.org/2003/linkbase"
               xmlns:xlink="http://www.w3.org/1999/xlink">
  <link:roleRef roleURI="http://example.com/role/BalanceSheet"
                xlink:type="simple" xlink:href="ex.xsd#BalanceSheet"/>
  <link:calculationLink xlink:type="extended" xlink:role="http://example.com/role/BalanceSheet">
    <link:loc xlink:type="locator" xlink:label="loc_Assets" xlink:href="ex.xsd#ex_Assets"/>
    <link:loc xlink:type="locator" xlink:label="loc_Cash" xlink:href="ex.xsd#ex_Cash"/>
    <link:calculationArc xlink:type="arc"
        xlink:arcrole="http://www.xbrl.org/2003/arcrole/summation-item"
        xlink:from="loc_Assets" xlink:to="loc_Cash" order="10" weight="1.0"
        use="prohibited" priority="2"/>
  </link:calculationLink>
</link:linkbase>"#;

    #[test]
    fn keeps_prohibited_arcs_in_parsed_form() {
        let doc = xml::read_str(CALC_LINKBASE, "https://example.com/taxonomy/ex_cal.xml").unwrap();
        let lb = parse_linkbase(&doc, Some(LinkbaseKind::Calculation)).unwrap();
        assert_eq!(lb.role_refs.len(), 1);
        let arc = &lb.extended_links[0].arcs[0];
        assert_eq!(arc.use_, ArcUse::Prohibited);
        assert_eq!(arc.priority, 2);
        assert_eq!(arc.weight, Some(1.0));
        assert_eq!(arc.order, 10.0);
    }

    #[test]
    fn kind_guessing() {
        assert_eq!(
            LinkbaseKind::guess_from_href("aapl-20200926_lab.xml"),
            Some(LinkbaseKind::Label)
        );
        assert_eq!(
            LinkbaseKind::guess_from_href("aapl-20200926_cal.xml"),
            Some(LinkbaseKind::Calculation)
        );
        assert_eq!(LinkbaseKind::guess_from_href("aapl-20200926.xsd"), None);
    }
}
