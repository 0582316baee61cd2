//! Element, Topology and Property types stored in a [crate::store::TopologyStore].
//!
//! Every stored record carries a [SeqKey]: a store-assigned, strictly increasing key that defines
//! which of several same-GRENML-ID copies is "newest". GRENML IDs themselves are supplied by
//! contributors and are NOT unique for Institutions, Nodes and Links.

use enumset::{EnumSet, EnumSetType};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeSet,
    fmt::{Display, Formatter},
};

pub const TAG_PROPERTY: &str = "tag";

pub const NAME_MAX_LEN: usize = 128;
pub const SHORT_NAME_MAX_LEN: usize = 32;
pub const ADDRESS_MAX_LEN: usize = 500;
pub const UNLOCODE_MAX_LEN: usize = 5;
pub const PROPERTY_NAME_MAX_LEN: usize = 32;
pub const PROPERTY_VALUE_MAX_LEN: usize = 512;

const TRIM_SUFFIX: &str = "...";

/// Store-assigned sequence key. Unique across every record kind in one store.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SeqKey(pub u64);

impl SeqKey {
    pub fn is_assigned(&self) -> bool {
        self.0 != 0
    }
}

impl Display for SeqKey {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SeqKey {
    fn from(value: u64) -> Self {
        SeqKey(value)
    }
}

/// The three reconcilable element kinds. Topologies are not elements: they group them.
#[derive(Debug, Serialize, Deserialize, PartialOrd, Ord, Hash, EnumSetType)]
#[enumset(serialize_repr = "list")]
pub enum ElementKind {
    Institution,
    Node,
    Link,
}

pub type ElementKindSet = EnumSet<ElementKind>;

impl ElementKind {
    pub fn all() -> &'static [ElementKind] {
        &[ElementKind::Institution, ElementKind::Node, ElementKind::Link]
    }

    pub fn plural(&self) -> &'static str {
        match self {
            ElementKind::Institution => "Institutions",
            ElementKind::Node => "Nodes",
            ElementKind::Link => "Links",
        }
    }
}

impl Display for ElementKind {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A typed pointer at one stored element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ElementRef {
    pub kind: ElementKind,
    pub key: SeqKey,
}

impl ElementRef {
    pub fn new(kind: ElementKind, key: SeqKey) -> Self {
        ElementRef { kind, key }
    }

    pub fn institution(key: SeqKey) -> Self {
        ElementRef::new(ElementKind::Institution, key)
    }

    pub fn node(key: SeqKey) -> Self {
        ElementRef::new(ElementKind::Node, key)
    }

    pub fn link(key: SeqKey) -> Self {
        ElementRef::new(ElementKind::Link, key)
    }
}

impl Display for ElementRef {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{} [{}]", self.kind, self.key)
    }
}

/// Truncate `value` to at most `max` characters, marking the cut with a trailing ellipsis.
/// Returns the (possibly) trimmed value and whether a trim happened.
pub fn trim_field(value: &str, max: usize) -> (String, bool) {
    if value.chars().count() <= max {
        return (value.to_string(), false);
    }
    let keep = max.saturating_sub(TRIM_SUFFIX.len());
    let mut trimmed: String = value.chars().take(keep).collect();
    trimmed.push_str(TRIM_SUFFIX);
    (trimmed, true)
}

/// A free-form key/value pair attached to an element or topology.
///
/// Names are stored lower-cased. Several properties may share a name (tags commonly do).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub value: String,
}

impl Property {
    pub fn new(name: &str, value: &str) -> Self {
        let (name, _) = trim_field(&name.to_lowercase(), PROPERTY_NAME_MAX_LEN);
        let (value, _) = trim_field(value, PROPERTY_VALUE_MAX_LEN);
        Property { name, value }
    }

    pub fn tag(value: &str) -> Self {
        Property::new(TAG_PROPERTY, value)
    }

    pub fn is_tag(&self) -> bool {
        self.name == TAG_PROPERTY
    }
}

impl Display for Property {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// Geographic position. Coordinates are clamped into physically plausible ranges on write.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
    pub unlocode: Option<String>,
    pub address: Option<String>,
}

impl Location {
    /// South Pole to North Pole.
    pub const LATITUDE_RANGE: (f64, f64) = (-90.0, 90.0);
    /// 180th meridian.
    pub const LONGITUDE_RANGE: (f64, f64) = (-180.0, 180.0);
    /// Mariana Trench to Mount Everest, in metres.
    pub const ALTITUDE_RANGE: (f64, f64) = (-11000.0, 9000.0);

    pub fn at(latitude: f64, longitude: f64) -> Self {
        let mut location = Location::default();
        location.set_coordinates(Some(latitude), Some(longitude), None);
        location
    }

    pub fn set_coordinates(
        &mut self,
        latitude: Option<f64>,
        longitude: Option<f64>,
        altitude: Option<f64>,
    ) {
        self.latitude = clamp_coordinate(latitude.unwrap_or(0.0), Self::LATITUDE_RANGE);
        self.longitude = clamp_coordinate(longitude.unwrap_or(0.0), Self::LONGITUDE_RANGE);
        self.altitude = altitude.map(|alt| clamp_coordinate(alt, Self::ALTITUDE_RANGE));
    }

    /// Returns a trim message when the value had to be shortened.
    pub fn set_address(&mut self, address: Option<&str>) -> Option<String> {
        let (value, msg) = trim_optional("address", address, ADDRESS_MAX_LEN);
        self.address = value;
        msg
    }

    pub fn set_unlocode(&mut self, unlocode: Option<&str>) -> Option<String> {
        let (value, msg) = trim_optional("unlocode", unlocode, UNLOCODE_MAX_LEN);
        self.unlocode = value;
        msg
    }

    fn fill_empty_from(&mut self, other: &Location) {
        fill_empty(&mut self.altitude, &other.altitude);
        fill_empty(&mut self.unlocode, &other.unlocode);
        fill_empty(&mut self.address, &other.address);
    }
}

fn clamp_coordinate(value: f64, range: (f64, f64)) -> f64 {
    if value.is_nan() {
        tracing::debug!("Coordinate is not a number. Defaulting to 0.0.");
        return 0.0;
    }
    if value < range.0 || value > range.1 {
        tracing::debug!(
            "Capping coordinate {} to range {}-{}.",
            value,
            range.0,
            range.1
        );
    }
    value.clamp(range.0, range.1)
}

fn trim_optional(
    field: &str,
    value: Option<&str>,
    max: usize,
) -> (Option<String>, Option<String>) {
    match value {
        None => (None, None),
        Some(raw) => {
            let (trimmed, was_trimmed) = trim_field(raw, max);
            let msg = was_trimmed.then(|| {
                format!("{field} truncated from \"{raw}\" to correct length as \"{trimmed}\"")
            });
            (Some(trimmed), msg)
        }
    }
}

fn fill_empty<T: Clone>(target: &mut Option<T>, source: &Option<T>) {
    if target.is_none() {
        if let Some(value) = source {
            *target = Some(value.clone());
        }
    }
}

/// Active interval, ISO 8601 timestamps.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lifetime {
    pub start: Option<String>,
    pub end: Option<String>,
}

impl Lifetime {
    fn fill_empty_from(&mut self, other: &Lifetime) {
        fill_empty(&mut self.start, &other.start);
        fill_empty(&mut self.end, &other.end);
    }
}

/// Fields shared by every Institution, Node and Link.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementBase {
    #[serde(default)]
    pub key: SeqKey,
    pub grenml_id: String,
    pub name: String,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub properties: Vec<Property>,
    #[serde(default)]
    pub topologies: BTreeSet<SeqKey>,
    #[serde(default)]
    pub dirty: bool,
}

impl ElementBase {
    pub fn new(grenml_id: &str, name: &str) -> Self {
        let mut base = ElementBase {
            grenml_id: grenml_id.to_string(),
            ..Default::default()
        };
        base.set_name(name);
        base
    }

    /// Identifying string suitable for log messages: `name <grenml_id> [key]`.
    pub fn log_str(&self) -> String {
        format!("{} <{}> [{}]", self.name, self.grenml_id, self.key)
    }

    pub fn set_name(&mut self, name: &str) -> Option<String> {
        let (trimmed, was_trimmed) = trim_field(name, NAME_MAX_LEN);
        let msg = was_trimmed.then(|| {
            format!(
                "{} name truncated from \"{}\" to correct length as \"{}\"",
                self.log_str(),
                name,
                trimmed
            )
        });
        self.name = trimmed;
        msg
    }

    pub fn set_short_name(&mut self, short_name: Option<&str>) -> Option<String> {
        let (value, msg) = trim_optional("short_name", short_name, SHORT_NAME_MAX_LEN);
        self.short_name = value;
        msg.map(|m| format!("{} {}", self.log_str(), m))
    }

    pub fn property_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.properties
            .iter()
            .filter(move |p| p.name == name)
            .map(|p| p.value.as_str())
    }

    pub fn has_property(&self, name: &str, value: &str) -> bool {
        self.properties
            .iter()
            .any(|p| p.name == name && p.value == value)
    }

    fn fill_empty_from(&mut self, other: &ElementBase) {
        fill_empty(&mut self.short_name, &other.short_name);
        fill_empty(&mut self.version, &other.version);
    }
}

/// Common access to the three element variants.
pub trait Element {
    const KIND: ElementKind;

    fn base(&self) -> &ElementBase;
    fn base_mut(&mut self) -> &mut ElementBase;

    /// Copy every optional field that is empty here and populated on `other`.
    fn fill_empty_from(&mut self, other: &Self);

    fn key(&self) -> SeqKey {
        self.base().key
    }

    fn element_ref(&self) -> ElementRef {
        ElementRef::new(Self::KIND, self.key())
    }

    fn log_str(&self) -> String {
        self.base().log_str()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Institution {
    #[serde(flatten)]
    pub base: ElementBase,
    #[serde(default)]
    pub location: Location,
}

impl Institution {
    pub fn new(grenml_id: &str, name: &str) -> Self {
        Institution {
            base: ElementBase::new(grenml_id, name),
            location: Location::default(),
        }
    }
}

impl Element for Institution {
    const KIND: ElementKind = ElementKind::Institution;

    fn base(&self) -> &ElementBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ElementBase {
        &mut self.base
    }

    fn fill_empty_from(&mut self, other: &Self) {
        self.base.fill_empty_from(&other.base);
        self.location.fill_empty_from(&other.location);
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(flatten)]
    pub base: ElementBase,
    #[serde(default)]
    pub location: Location,
    #[serde(default)]
    pub lifetime: Lifetime,
    #[serde(default)]
    pub owners: BTreeSet<SeqKey>,
}

impl Node {
    pub fn new(grenml_id: &str, name: &str) -> Self {
        Node {
            base: ElementBase::new(grenml_id, name),
            ..Default::default()
        }
    }
}

impl Element for Node {
    const KIND: ElementKind = ElementKind::Node;

    fn base(&self) -> &ElementBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ElementBase {
        &mut self.base
    }

    fn fill_empty_from(&mut self, other: &Self) {
        self.base.fill_empty_from(&other.base);
        self.location.fill_empty_from(&other.location);
        self.lifetime.fill_empty_from(&other.lifetime);
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    #[serde(flatten)]
    pub base: ElementBase,
    pub node_a: SeqKey,
    pub node_b: SeqKey,
    #[serde(default)]
    pub lifetime: Lifetime,
    #[serde(default)]
    pub owners: BTreeSet<SeqKey>,
}

impl Link {
    pub fn new(grenml_id: &str, name: &str, node_a: SeqKey, node_b: SeqKey) -> Self {
        Link {
            base: ElementBase::new(grenml_id, name),
            node_a,
            node_b,
            ..Default::default()
        }
    }

    /// The unordered endpoint pair.
    pub fn endpoints(&self) -> BTreeSet<SeqKey> {
        BTreeSet::from([self.node_a, self.node_b])
    }

    pub fn touches(&self, node: SeqKey) -> bool {
        self.node_a == node || self.node_b == node
    }
}

impl Element for Link {
    const KIND: ElementKind = ElementKind::Link;

    fn base(&self) -> &ElementBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ElementBase {
        &mut self.base
    }

    fn fill_empty_from(&mut self, other: &Self) {
        self.base.fill_empty_from(&other.base);
        self.lifetime.fill_empty_from(&other.lifetime);
    }
}

/// A named, hierarchical grouping of elements. Topology GRENML IDs are unique within a store.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    #[serde(default)]
    pub key: SeqKey,
    pub grenml_id: String,
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub properties: Vec<Property>,
    #[serde(default)]
    pub parent: Option<SeqKey>,
    #[serde(default)]
    pub owner: Option<SeqKey>,
    #[serde(default)]
    pub main: bool,
}

impl Topology {
    pub fn new(grenml_id: &str, name: &str) -> Self {
        let (name, _) = trim_field(name, NAME_MAX_LEN);
        Topology {
            grenml_id: grenml_id.to_string(),
            name,
            ..Default::default()
        }
    }

    pub fn log_str(&self) -> String {
        format!("{} <{}> [{}]", self.name, self.grenml_id, self.key)
    }
}
