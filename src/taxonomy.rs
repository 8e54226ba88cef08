//! DTS resolution: the Discoverable Taxonomy Set.
//!
//! Starting from an entry point schema, follows every `xs:import`,
//! `xs:include` and `link:linkbaseRef` breadth-first (visited set, so the
//! cyclic imports real taxonomies contain terminate), registers every
//! concept under both its qname and its `(schema URL, xml id)` address,
//! materializes arcs into relationships under XBRL 2.1 override and
//! prohibition semantics, and builds the label and relationship indices
//! consumers query.

use compact_str::CompactString;
use std::collections::{HashMap, HashSet, VecDeque};

use crate::cache::{resolve_uri, url_key, HttpCache};
use crate::linkbase::{
    self, ArcUse, LabelResource, Linkbase, LinkbaseKind, ReferenceResource,
};
use crate::model::{Concept, ConceptId, ConceptKind, Label, QName, STANDARD_LABEL_ROLE};
use crate::schema::{self, RoleType};
use crate::{Error, Result, Warning};

pub const SUMMATION_ITEM_ARCROLE: &str = "http://www.xbrl.org/2003/arcrole/summation-item";
pub const PARENT_CHILD_ARCROLE: &str = "http://www.xbrl.org/2003/arcrole/parent-child";
pub const CONCEPT_LABEL_ARCROLE: &str = "http://www.xbrl.org/2003/arcrole/concept-label";

/// Well-known namespaces whose schema location filers routinely omit.
/// Instances reference these taxonomies without importing them; the
/// resolver falls back to this table.
fn common_schema_url(namespace: &str) -> Option<&'static str> {
    Some(match namespace {
        "http://fasb.org/srt/2018-01-31" => "http://xbrl.fasb.org/srt/2018/elts/srt-2018-01-31.xsd",
        "http://fasb.org/srt/2019-01-31" => "http://xbrl.fasb.org/srt/2019/elts/srt-2019-01-31.xsd",
        "http://fasb.org/srt/2020-01-31" => "http://xbrl.fasb.org/srt/2020/elts/srt-2020-01-31.xsd",
        "http://xbrl.sec.gov/stpr/2018-01-31" => "https://xbrl.sec.gov/stpr/2018/stpr-2018-01-31.xsd",
        "http://xbrl.sec.gov/country/2017-01-31" => "https://xbrl.sec.gov/country/2017/country-2017-01-31.xsd",
        "http://xbrl.sec.gov/country/2020-01-31" => "https://xbrl.sec.gov/country/2020/country-2020-01-31.xsd",
        "http://xbrl.us/invest/2009-01-31" => "https://taxonomies.xbrl.us/us-gaap/2009/non-gaap/invest-2009-01-31.xsd",
        "http://xbrl.sec.gov/invest/2011-01-31" => "https://xbrl.sec.gov/invest/2011/invest-2011-01-31.xsd",
        "http://xbrl.sec.gov/invest/2012-01-31" => "https://xbrl.sec.gov/invest/2012/invest-2012-01-31.xsd",
        "http://xbrl.sec.gov/invest/2013-01-31" => "https://xbrl.sec.gov/invest/2013/invest-2013-01-31.xsd",
        "http://xbrl.sec.gov/dei/2011-01-31" => "https://xbrl.sec.gov/dei/2011/dei-2011-01-31.xsd",
        "http://xbrl.sec.gov/dei/2012-01-31" => "https://xbrl.sec.gov/dei/2012/dei-2012-01-31.xsd",
        "http://xbrl.sec.gov/dei/2013-01-31" => "https://xbrl.sec.gov/dei/2013/dei-2013-01-31.xsd",
        "http://xbrl.sec.gov/dei/2014-01-31" => "https://xbrl.sec.gov/dei/2014/dei-2014-01-31.xsd",
        "http://xbrl.sec.gov/dei/2018-01-31" => "https://xbrl.sec.gov/dei/2018/dei-2018-01-31.xsd",
        "http://xbrl.sec.gov/dei/2019-01-31" => "https://xbrl.sec.gov/dei/2019/dei-2019-01-31.xsd",
        "http://xbrl.sec.gov/dei/2020-01-31" => "https://xbrl.sec.gov/dei/2020/dei-2020-01-31.xsd",
        "http://xbrl.sec.gov/dei/2021" => "https://xbrl.sec.gov/dei/2021/dei-2021.xsd",
        "http://fasb.org/us-gaap/2011-01-31" => "http://xbrl.fasb.org/us-gaap/2011/elts/us-gaap-2011-01-31.xsd",
        "http://fasb.org/us-gaap/2012-01-31" => "http://xbrl.fasb.org/us-gaap/2012/elts/us-gaap-2012-01-31.xsd",
        "http://fasb.org/us-gaap/2013-01-31" => "http://xbrl.fasb.org/us-gaap/2013/elts/us-gaap-2013-01-31.xsd",
        "http://fasb.org/us-gaap/2014-01-31" => "http://xbrl.fasb.org/us-gaap/2014/elts/us-gaap-2014-01-31.xsd",
        "http://fasb.org/us-gaap/2015-01-31" => "http://xbrl.fasb.org/us-gaap/2015/elts/us-gaap-2015-01-31.xsd",
        "http://fasb.org/us-gaap/2016-01-31" => "http://xbrl.fasb.org/us-gaap/2016/elts/us-gaap-2016-01-31.xsd",
        "http://fasb.org/us-gaap/2017-01-31" => "http://xbrl.fasb.org/us-gaap/2017/elts/us-gaap-2017-01-31.xsd",
        "http://fasb.org/us-gaap/2018-01-31" => "http://xbrl.fasb.org/us-gaap/2018/elts/us-gaap-2018-01-31.xsd",
        "http://fasb.org/us-gaap/2019-01-31" => "http://xbrl.fasb.org/us-gaap/2019/elts/us-gaap-2019-01-31.xsd",
        "http://fasb.org/us-gaap/2020-01-31" => "http://xbrl.fasb.org/us-gaap/2020/elts/us-gaap-2020-01-31.xsd",
        "http://fasb.org/us-gaap/2021-01-31" => "http://xbrl.fasb.org/us-gaap/2021/elts/us-gaap-2021-01-31.xsd",
        _ => return None,
    })
}

/// One schema in the resolved set. The concepts live in the taxonomy-wide
/// arena; this records which ids the schema contributed.
#[derive(Debug, Clone)]
pub struct TaxonomySchema {
    pub source_url: CompactString,
    pub target_namespace: CompactString,
    pub concepts: Vec<ConceptId>,
    pub imports: Vec<CompactString>,
    pub role_types: Vec<RoleType>,
}

/// Post-override product of an arc.
#[derive(Debug, Clone)]
pub struct Relationship {
    pub source: ConceptId,
    pub target: ConceptId,
    pub arcrole: CompactString,
    pub role: CompactString,
    pub order: f64,
    pub weight: Option<f64>,
    pub preferred_label: Option<CompactString>,
}

pub struct Taxonomy {
    pub entry_url: CompactString,
    pub schemas: Vec<TaxonomySchema>,
    pub linkbases: Vec<Linkbase>,
    pub relationships: Vec<Relationship>,
    pub warnings: Vec<Warning>,
    concepts: Vec<Concept>,
    by_qname: HashMap<QName, ConceptId>,
    by_href: HashMap<(String, CompactString), ConceptId>,
    namespaces: HashSet<CompactString>,
    visited: HashSet<String>,
    labels: Vec<(ConceptId, Label)>,
    concept_labels: HashMap<ConceptId, Vec<usize>>,
    label_index: HashMap<(ConceptId, CompactString, CompactString), usize>,
    references: HashMap<ConceptId, Vec<ReferenceResource>>,
    children_index: HashMap<(ConceptId, CompactString, CompactString), Vec<usize>>,
    parents_index: HashMap<(ConceptId, CompactString, CompactString), Vec<usize>>,
}

/// Resolves the full DTS reachable from `entry_url` (URL or local path).
pub fn parse_taxonomy(cache: &HttpCache, entry_url: &str) -> Result<Taxonomy> {
    let mut taxonomy = Taxonomy::new(entry_url);
    taxonomy.discover(cache, entry_url)?;
    taxonomy.finalize();
    Ok(taxonomy)
}

enum WorkItem {
    Schema(String),
    Linkbase(String, Option<LinkbaseKind>),
}

impl Taxonomy {
    fn new(entry_url: &str) -> Self {
        Self {
            entry_url: entry_url.into(),
            schemas: Vec::new(),
            linkbases: Vec::new(),
            relationships: Vec::new(),
            warnings: Vec::new(),
            concepts: Vec::new(),
            by_qname: HashMap::new(),
            by_href: HashMap::new(),
            namespaces: HashSet::new(),
            visited: HashSet::new(),
            labels: Vec::new(),
            concept_labels: HashMap::new(),
            label_index: HashMap::new(),
            references: HashMap::new(),
            children_index: HashMap::new(),
            parents_index: HashMap::new(),
        }
    }

    // ------------------------------------------------------------------
    // discovery
    // ------------------------------------------------------------------

    /// Breadth-first discovery from one entry schema. Import cycles are cut
    /// by the visited set; enqueue order is preserved because override ties
    /// break on discovery order.
    pub(crate) fn discover(&mut self, cache: &HttpCache, entry_url: &str) -> Result<()> {
        let cancel = cache.cancel_token();
        let mut queue: VecDeque<WorkItem> = VecDeque::new();
        queue.push_back(WorkItem::Schema(entry_url.to_string()));

        while let Some(item) = queue.pop_front() {
            cancel.check()?;
            match item {
                WorkItem::Schema(url) => {
                    if !self.visited.insert(url_key(&url)) {
                        continue;
                    }
                    log::debug!("discovering schema {url}");
                    let doc = cache.get_and_parse_xml(&url)?;
                    let parsed = schema::parse_schema(&doc)?;
                    for import in &parsed.imports {
                        queue.push_back(WorkItem::Schema(import.clone()));
                    }
                    for lb_ref in &parsed.linkbase_refs {
                        queue.push_back(WorkItem::Linkbase(lb_ref.href.clone(), lb_ref.kind));
                    }
                    self.ingest_schema(parsed)?;
                }
                WorkItem::Linkbase(url, kind) => {
                    if !self.visited.insert(url_key(&url)) {
                        continue;
                    }
                    log::debug!("discovering linkbase {url}");
                    let doc = cache.get_and_parse_xml(&url)?;
                    let linkbase = linkbase::parse_linkbase(&doc, kind)?;
                    self.linkbases.push(linkbase);
                }
            }
        }
        Ok(())
    }

    fn ingest_schema(&mut self, parsed: schema::ParsedSchema) -> Result<()> {
        let mut ids = Vec::with_capacity(parsed.concepts.len());
        for concept in parsed.concepts {
            let id = match self.by_qname.get(&concept.qname) {
                Some(&existing) => {
                    let earlier = &self.concepts[existing.0 as usize];
                    if !compatible_redeclaration(earlier, &concept) {
                        return Err(Error::DuplicateConcept(format!(
                            "{}:{} in {} and {}",
                            concept.qname.namespace,
                            concept.qname.local_name,
                            earlier.schema_url,
                            concept.schema_url
                        )));
                    }
                    existing
                }
                None => {
                    let id = ConceptId(self.concepts.len() as u32);
                    self.by_qname.insert(concept.qname.clone(), id);
                    self.concepts.push(concept.clone());
                    id
                }
            };
            if let Some(xml_id) = &concept.xml_id {
                self.by_href
                    .insert((url_key(&concept.schema_url), xml_id.clone()), id);
            }
            ids.push(id);
        }
        self.namespaces.insert(parsed.target_namespace.clone());
        self.schemas.push(TaxonomySchema {
            source_url: parsed.source_url,
            target_namespace: parsed.target_namespace,
            concepts: ids,
            imports: parsed.imports.iter().map(|i| i.as_str().into()).collect(),
            role_types: parsed.role_types,
        });
        Ok(())
    }

    /// Loads the schema for a namespace the DTS does not cover yet, using
    /// the well-known-namespace table. Called by instance parsing when a
    /// fact or dimension references a taxonomy the filing never imported.
    pub fn load_common_namespace(&mut self, cache: &HttpCache, namespace: &str) -> Result<()> {
        let url = common_schema_url(namespace)
            .ok_or_else(|| Error::TaxonomyNotFound(namespace.to_string()))?;
        self.discover(cache, url)?;
        self.finalize();
        Ok(())
    }

    pub fn has_namespace(&self, namespace: &str) -> bool {
        self.namespaces.contains(namespace)
    }

    /// Folds another entry point into this DTS; instances may carry several
    /// `schemaRef`s.
    pub fn extend_from(&mut self, cache: &HttpCache, entry_url: &str) -> Result<()> {
        self.discover(cache, entry_url)?;
        self.finalize();
        Ok(())
    }

    // ------------------------------------------------------------------
    // finalization: kinds, relationships, labels, indices
    // ------------------------------------------------------------------

    /// (Re)builds everything derived from schemas + linkbases. Idempotent;
    /// run again after late schema loads.
    pub(crate) fn finalize(&mut self) {
        self.refine_concept_kinds();

        self.warnings.clear();
        self.relationships.clear();
        self.labels.clear();
        self.concept_labels.clear();
        self.label_index.clear();
        self.references.clear();
        self.children_index.clear();
        self.parents_index.clear();

        let tentative = self.collect_tentative_arcs();
        self.resolve_overrides(tentative);
        self.build_relationship_indices();
        self.build_label_index();
        self.detect_cycles();
    }

    /// Walks substitution-group chains: `xbrli:item` anywhere in the chain
    /// makes an item, `xbrli:tuple` a tuple, with the xbrldt groups taking
    /// precedence as the dimensional refinements.
    fn refine_concept_kinds(&mut self) {
        let mut resolved: Vec<(usize, ConceptKind)> = Vec::new();
        for (index, concept) in self.concepts.iter().enumerate() {
            let mut group = concept.substitution_group.clone();
            let mut kind = ConceptKind::Other;
            let mut hops = 0;
            while let Some(qname) = group {
                hops += 1;
                if hops > 32 {
                    break;
                }
                match schema::classify_substitution_group(&qname) {
                    ConceptKind::Other => {}
                    found => {
                        kind = found;
                        break;
                    }
                }
                group = self
                    .by_qname
                    .get(&qname)
                    .and_then(|id| self.concepts[id.0 as usize].substitution_group.clone());
            }
            if kind != concept.kind && kind != ConceptKind::Other {
                resolved.push((index, kind));
            }
        }
        for (index, kind) in resolved {
            self.concepts[index].kind = kind;
        }
    }

    fn collect_tentative_arcs(&mut self) -> Vec<TentativeArc> {
        let mut tentative = Vec::new();
        let mut seq = 0usize;
        let mut broken: Vec<Warning> = Vec::new();

        for linkbase in &self.linkbases {
            for link in &linkbase.extended_links {
                let mut locator_map: HashMap<&str, &CompactString> = HashMap::new();
                for locator in &link.locators {
                    locator_map.insert(locator.label.as_str(), &locator.href);
                }
                for arc in &link.arcs {
                    let Some(source_href) = locator_map.get(arc.from.as_str()) else {
                        log::warn!(
                            "arc in {} references unknown label {}",
                            linkbase.source_url,
                            arc.from
                        );
                        continue;
                    };
                    let Some(source) = self.concept_by_locator_href(source_href) else {
                        broken.push(Warning::BrokenLocator {
                            href: source_href.to_string(),
                            linkbase_url: linkbase.source_url.to_string(),
                        });
                        continue;
                    };

                    let mut push = |target: Target| {
                        tentative.push(TentativeArc {
                            source,
                            target,
                            arcrole: arc.arcrole.clone(),
                            role: link.role.clone(),
                            order: arc.order,
                            weight: arc.weight,
                            priority: arc.priority,
                            prohibited: arc.use_ == ArcUse::Prohibited,
                            preferred_label: arc.preferred_label.clone(),
                            seq,
                        });
                        seq += 1;
                    };

                    if let Some(target_href) = locator_map.get(arc.to.as_str()) {
                        match self.concept_by_locator_href(target_href) {
                            Some(target) => push(Target::Concept(target)),
                            None => broken.push(Warning::BrokenLocator {
                                href: target_href.to_string(),
                                linkbase_url: linkbase.source_url.to_string(),
                            }),
                        }
                        continue;
                    }
                    // not a locator: the arc points at link-local resources
                    let mut found = false;
                    for label in link.labels.iter().filter(|l| l.xlink_label == arc.to) {
                        push(Target::Label(label.clone()));
                        found = true;
                    }
                    for reference in link.references.iter().filter(|r| r.xlink_label == arc.to) {
                        push(Target::Reference(reference.clone()));
                        found = true;
                    }
                    if !found {
                        log::warn!(
                            "arc in {} references unknown label {}",
                            linkbase.source_url,
                            arc.to
                        );
                    }
                }
            }
        }
        self.warnings.extend(broken);
        tentative
    }

    /// XBRL 2.1 §3.5.3.9: within an equivalence group the highest priority
    /// wins; a surviving prohibited arc discards the whole group; duplicate
    /// survivors are a warning with the first-discovered winning.
    fn resolve_overrides(&mut self, tentative: Vec<TentativeArc>) {
        let mut group_order: Vec<GroupKey> = Vec::new();
        let mut groups: HashMap<GroupKey, Vec<TentativeArc>> = HashMap::new();
        for arc in tentative {
            let key = arc.group_key();
            groups
                .entry(key.clone())
                .or_insert_with(|| {
                    group_order.push(key.clone());
                    Vec::new()
                })
                .push(arc);
        }

        for key in group_order {
            let members = groups.remove(&key).unwrap_or_default();
            let max_priority = members.iter().map(|a| a.priority).max().unwrap_or(0);
            let mut survivors: Vec<&TentativeArc> = members
                .iter()
                .filter(|a| a.priority == max_priority)
                .collect();
            if survivors.iter().any(|a| a.prohibited) {
                continue;
            }
            survivors.sort_by_key(|a| a.seq);
            if survivors.len() > 1 {
                let first = survivors[0];
                self.warnings.push(Warning::AmbiguousArc {
                    source: self.concepts[first.source.0 as usize].qname.to_string(),
                    target: first.target.describe(),
                    arcrole: first.arcrole.to_string(),
                });
            }
            let Some(winner) = survivors.first() else {
                continue;
            };
            match &winner.target {
                Target::Concept(target) => self.relationships.push(Relationship {
                    source: winner.source,
                    target: *target,
                    arcrole: winner.arcrole.clone(),
                    role: winner.role.clone(),
                    order: winner.order,
                    weight: winner.weight,
                    preferred_label: winner.preferred_label.clone(),
                }),
                Target::Label(label) => {
                    let index = self.labels.len();
                    self.labels.push((
                        winner.source,
                        Label {
                            role: label.role.clone(),
                            lang: label.lang.clone(),
                            text: label.text.clone(),
                        },
                    ));
                    self.concept_labels
                        .entry(winner.source)
                        .or_default()
                        .push(index);
                }
                Target::Reference(reference) => {
                    self.references
                        .entry(winner.source)
                        .or_default()
                        .push(reference.clone());
                }
            }
        }
    }

    fn build_relationship_indices(&mut self) {
        // siblings order by `order`, ties by discovery sequence (already the
        // vec order after override resolution)
        let mut order: Vec<usize> = (0..self.relationships.len()).collect();
        order.sort_by(|&a, &b| {
            let ra = &self.relationships[a];
            let rb = &self.relationships[b];
            ra.source
                .cmp(&rb.source)
                .then(ra.arcrole.cmp(&rb.arcrole))
                .then(ra.role.cmp(&rb.role))
                .then(ra.order.partial_cmp(&rb.order).unwrap_or(std::cmp::Ordering::Equal))
                .then(a.cmp(&b))
        });
        let reordered: Vec<Relationship> = order
            .iter()
            .map(|&i| self.relationships[i].clone())
            .collect();
        self.relationships = reordered;

        for (index, rel) in self.relationships.iter().enumerate() {
            self.children_index
                .entry((rel.source, rel.arcrole.clone(), rel.role.clone()))
                .or_default()
                .push(index);
            self.parents_index
                .entry((rel.target, rel.arcrole.clone(), rel.role.clone()))
                .or_default()
                .push(index);
        }
    }

    fn build_label_index(&mut self) {
        for (index, (concept, label)) in self.labels.iter().enumerate() {
            self.label_index
                .entry((*concept, label.role.clone(), label.lang.clone()))
                .or_insert(index);
        }
    }

    fn detect_cycles(&mut self) {
        let mut keys: Vec<(CompactString, CompactString)> = self
            .relationships
            .iter()
            .map(|r| (r.arcrole.clone(), r.role.clone()))
            .collect();
        keys.sort();
        keys.dedup();

        for (arcrole, role) in keys {
            let mut adjacency: HashMap<ConceptId, Vec<ConceptId>> = HashMap::new();
            let mut nodes: Vec<ConceptId> = Vec::new();
            for rel in self
                .relationships
                .iter()
                .filter(|r| r.arcrole == arcrole && r.role == role)
            {
                adjacency.entry(rel.source).or_default().push(rel.target);
                nodes.push(rel.source);
                nodes.push(rel.target);
            }
            nodes.sort();
            nodes.dedup();

            if has_cycle(&adjacency, &nodes) {
                if arcrole == SUMMATION_ITEM_ARCROLE {
                    self.warnings.push(Warning::CalculationCycle {
                        role: role.to_string(),
                    });
                } else {
                    self.warnings.push(Warning::RelationshipCycle {
                        role: role.to_string(),
                        arcrole: arcrole.to_string(),
                    });
                }
            }
        }
    }

    fn concept_by_locator_href(&self, href: &str) -> Option<ConceptId> {
        let decoded = percent_decode(href);
        let (schema_url, fragment) = decoded.split_once('#')?;
        self.by_href
            .get(&(url_key(schema_url), CompactString::from(fragment)))
            .copied()
    }

    // ------------------------------------------------------------------
    // queries
    // ------------------------------------------------------------------

    pub fn concept(&self, id: ConceptId) -> &Concept {
        &self.concepts[id.0 as usize]
    }

    pub fn concepts(&self) -> impl Iterator<Item = (ConceptId, &Concept)> {
        self.concepts
            .iter()
            .enumerate()
            .map(|(i, c)| (ConceptId(i as u32), c))
    }

    pub fn concept_count(&self) -> usize {
        self.concepts.len()
    }

    pub fn concept_by_qname(&self, namespace: &str, local_name: &str) -> Option<ConceptId> {
        self.by_qname
            .get(&QName::new(namespace, local_name))
            .copied()
    }

    /// Address used by linkbase locators: `schema-url#xml-id`.
    pub fn concept_by_href(&self, href: &str) -> Option<ConceptId> {
        self.concept_by_locator_href(href)
    }

    /// All labels attached to a concept.
    pub fn labels_for(&self, concept: ConceptId) -> Vec<&Label> {
        self.concept_labels
            .get(&concept)
            .map(|indices| indices.iter().map(|&i| &self.labels[i].1).collect())
            .unwrap_or_default()
    }

    /// Label lookup with the documented fallback chain: exact (role, lang),
    /// standard label in `lang`, any label in `lang`, any standard label,
    /// first available. The first two steps are O(1) through the index.
    pub fn label(&self, concept: ConceptId, role: &str, lang: &str) -> Option<&str> {
        if let Some(&index) = self.label_index.get(&(
            concept,
            CompactString::from(role),
            CompactString::from(lang),
        )) {
            return Some(&self.labels[index].1.text);
        }
        if let Some(&index) = self.label_index.get(&(
            concept,
            CompactString::const_new(STANDARD_LABEL_ROLE),
            CompactString::from(lang),
        )) {
            return Some(&self.labels[index].1.text);
        }
        let candidates = self.concept_labels.get(&concept)?;
        if let Some(&index) = candidates.iter().find(|&&i| self.labels[i].1.lang == lang) {
            return Some(&self.labels[index].1.text);
        }
        if let Some(&index) = candidates
            .iter()
            .find(|&&i| self.labels[i].1.role == STANDARD_LABEL_ROLE)
        {
            return Some(&self.labels[index].1.text);
        }
        candidates.first().map(|&i| self.labels[i].1.text.as_str())
    }

    pub fn references_for(&self, concept: ConceptId) -> &[ReferenceResource] {
        self.references
            .get(&concept)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Ordered children of a concept under one arcrole + extended link role.
    pub fn children(&self, concept: ConceptId, arcrole: &str, role: &str) -> Vec<&Relationship> {
        self.children_index
            .get(&(
                concept,
                CompactString::from(arcrole),
                CompactString::from(role),
            ))
            .map(|indices| indices.iter().map(|&i| &self.relationships[i]).collect())
            .unwrap_or_default()
    }

    pub fn parents(&self, concept: ConceptId, arcrole: &str, role: &str) -> Vec<&Relationship> {
        self.parents_index
            .get(&(
                concept,
                CompactString::from(arcrole),
                CompactString::from(role),
            ))
            .map(|indices| indices.iter().map(|&i| &self.relationships[i]).collect())
            .unwrap_or_default()
    }

    /// Schema URLs in discovery order (the xBRL-JSON `taxonomy` array).
    pub fn schema_urls(&self) -> Vec<String> {
        self.schemas
            .iter()
            .map(|s| s.source_url.to_string())
            .collect()
    }

    /// Extended link roles declared by any schema of the DTS.
    pub fn role_types(&self) -> impl Iterator<Item = &RoleType> {
        self.schemas.iter().flat_map(|s| s.role_types.iter())
    }

    /// Resolves a concept qname coming from instance content, loading
    /// well-known namespaces on demand.
    pub(crate) fn resolve_instance_qname(
        &mut self,
        cache: &HttpCache,
        namespace: &str,
        local_name: &str,
    ) -> Result<ConceptId> {
        if let Some(id) = self.concept_by_qname(namespace, local_name) {
            return Ok(id);
        }
        if !self.has_namespace(namespace) {
            self.load_common_namespace(cache, namespace)?;
            if let Some(id) = self.concept_by_qname(namespace, local_name) {
                return Ok(id);
            }
        }
        Err(Error::UnknownConcept(format!("{namespace}:{local_name}")))
    }
}

fn compatible_redeclaration(earlier: &Concept, later: &Concept) -> bool {
    earlier.concept_type == later.concept_type
        && earlier.period_type == later.period_type
        && earlier.balance == later.balance
        && earlier.substitution_group == later.substitution_group
}

#[derive(Debug, Clone)]
enum Target {
    Concept(ConceptId),
    Label(LabelResource),
    Reference(ReferenceResource),
}

impl Target {
    fn describe(&self) -> String {
        match self {
            Target::Concept(id) => format!("concept#{}", id.0),
            Target::Label(l) => format!("label[{}]", l.role),
            Target::Reference(r) => format!("reference[{}]", r.role),
        }
    }
}

/// Equivalence key for override grouping. Resource targets compare by
/// role (+ language for labels) because resource identity is link-local.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum TargetKey {
    Concept(ConceptId),
    Label(CompactString, CompactString),
    Reference(CompactString),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GroupKey {
    source: ConceptId,
    target: TargetKey,
    arcrole: CompactString,
    role: CompactString,
}

struct TentativeArc {
    source: ConceptId,
    target: Target,
    arcrole: CompactString,
    role: CompactString,
    order: f64,
    weight: Option<f64>,
    priority: i32,
    prohibited: bool,
    preferred_label: Option<CompactString>,
    seq: usize,
}

impl TentativeArc {
    fn group_key(&self) -> GroupKey {
        let target = match &self.target {
            Target::Concept(id) => TargetKey::Concept(*id),
            Target::Label(l) => TargetKey::Label(l.role.clone(), l.lang.clone()),
            Target::Reference(r) => TargetKey::Reference(r.role.clone()),
        };
        GroupKey {
            source: self.source,
            target,
            arcrole: self.arcrole.clone(),
            role: self.role.clone(),
        }
    }
}

fn has_cycle(adjacency: &HashMap<ConceptId, Vec<ConceptId>>, nodes: &[ConceptId]) -> bool {
    #[derive(Clone, Copy, PartialEq)]
    enum Color {
        White,
        Gray,
        Black,
    }
    let mut colors: HashMap<ConceptId, Color> =
        nodes.iter().map(|&n| (n, Color::White)).collect();

    fn visit(
        node: ConceptId,
        adjacency: &HashMap<ConceptId, Vec<ConceptId>>,
        colors: &mut HashMap<ConceptId, Color>,
    ) -> bool {
        colors.insert(node, Color::Gray);
        if let Some(targets) = adjacency.get(&node) {
            for &next in targets {
                match colors.get(&next).copied().unwrap_or(Color::White) {
                    Color::Gray => return true,
                    Color::White => {
                        if visit(next, adjacency, colors) {
                            return true;
                        }
                    }
                    Color::Black => {}
                }
            }
        }
        colors.insert(node, Color::Black);
        false
    }

    for &node in nodes {
        if colors.get(&node) == Some(&Color::White) && visit(node, adjacency, &mut colors) {
            return true;
        }
    }
    false
}

/// Locator hrefs occasionally arrive percent-encoded.
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index] == b'%' && index + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[index + 1..index + 3]).unwrap_or("");
            if let Ok(byte) = u8::from_str_radix(hex, 16) {
                out.push(byte);
                index += 3;
                continue;
            }
        }
        out.push(bytes[index]);
        index += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_decoding() {
        assert_eq!(percent_decode("a%20b.xsd#us-gaap_Assets"), "a b.xsd#us-gaap_Assets");
        assert_eq!(percent_decode("plain.xsd#id"), "plain.xsd#id");
        assert_eq!(percent_decode("trail%2"), "trail%2");
    }

    #[test]
    fn cycle_detector() {
        let mut adjacency: HashMap<ConceptId, Vec<ConceptId>> = HashMap::new();
        adjacency.insert(ConceptId(0), vec![ConceptId(1)]);
        adjacency.insert(ConceptId(1), vec![ConceptId(2)]);
        let nodes = vec![ConceptId(0), ConceptId(1), ConceptId(2)];
        assert!(!has_cycle(&adjacency, &nodes));
        adjacency.insert(ConceptId(2), vec![ConceptId(0)]);
        assert!(has_cycle(&adjacency, &nodes));
    }

    #[test]
    fn common_namespace_table_covers_us_gaap_and_dei() {
        assert!(common_schema_url("http://fasb.org/us-gaap/2020-01-31").is_some());
        assert!(common_schema_url("http://xbrl.sec.gov/dei/2020-01-31").is_some());
        assert!(common_schema_url("http://example.com/unknown").is_none());
    }
}
