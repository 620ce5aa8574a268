use std::collections::BTreeMap;
use std::fmt;

use crate::error::FieldError;
use crate::introspect::{Introspect, Shape};

/// Longest error-marker message embedded in a snapshot. Anything longer is
/// cut so a failing introspector cannot inflate the snapshot.
const MARKER_MESSAGE_MAX: usize = 128;

/// Size bounds for one conversion call.
///
/// Both limits exist to make conversion safe against adversarial input: a
/// crafted payload that deserializes into a deeply nested, cyclic, or
/// enormous object graph must not be able to consume unbounded CPU or
/// memory on the request path. The element budget is shared across the
/// whole call, not per container.
///
/// # Examples
///
/// ```
/// use appsec_gateway::Limits;
///
/// let defaults = Limits::default_limits();
/// assert_eq!(defaults.max_depth(), 20);
/// assert_eq!(defaults.max_elements(), 256);
///
/// let tight = Limits::new(4, 32);
/// assert_eq!(tight.max_depth(), 4);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    max_depth: usize,
    max_elements: usize,
}

impl Limits {
    /// Default recursion depth limit.
    pub const DEFAULT_MAX_DEPTH: usize = 20;
    /// Default whole-call element budget.
    pub const DEFAULT_MAX_ELEMENTS: usize = 256;

    /// Creates limits with the given depth and element bounds.
    ///
    /// # Panics
    ///
    /// Panics if `max_elements` is 0.
    pub fn new(max_depth: usize, max_elements: usize) -> Self {
        assert!(max_elements > 0, "max_elements must be greater than 0");
        Self {
            max_depth,
            max_elements,
        }
    }

    /// Creates the default limits: depth 20, 256 elements.
    pub fn default_limits() -> Self {
        Self::new(Self::DEFAULT_MAX_DEPTH, Self::DEFAULT_MAX_ELEMENTS)
    }

    /// Maximum recursion depth; nodes deeper than this convert to absent.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Whole-call element budget.
    pub fn max_elements(&self) -> usize {
        self.max_elements
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self::default_limits()
    }
}

/// Bounded, type-normalized copy of an object graph.
///
/// Leaves are strings (from text-like and numeric originals); interior
/// nodes are ordered sequences or name→node mappings. A snapshot owns all
/// its nodes and shares nothing with the graph it was derived from, so the
/// security engine reads a point-in-time view that concurrent application
/// threads cannot mutate under it.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    /// No value: the original was absent, or the budget/depth limit cut
    /// this node off (soft truncation, not an error).
    Absent,
    /// Textual leaf.
    Text(String),
    /// Ordered sequence of nodes; possibly truncated.
    Sequence(Vec<Snapshot>),
    /// Key→node mapping from a map-like or structure original.
    Mapping(BTreeMap<String, Snapshot>),
}

impl Snapshot {
    /// Returns `true` for the absent node.
    pub fn is_absent(&self) -> bool {
        matches!(self, Snapshot::Absent)
    }

    /// Returns the leaf text, if this is a text node.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Snapshot::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Returns the elements, if this is a sequence node.
    pub fn as_sequence(&self) -> Option<&[Snapshot]> {
        match self {
            Snapshot::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the entries, if this is a mapping node.
    pub fn as_mapping(&self) -> Option<&BTreeMap<String, Snapshot>> {
        match self {
            Snapshot::Mapping(entries) => Some(entries),
            _ => None,
        }
    }

    /// Looks up a mapping entry by key.
    ///
    /// Returns `None` for non-mapping nodes and missing keys alike.
    pub fn get(&self, key: &str) -> Option<&Snapshot> {
        self.as_mapping().and_then(|entries| entries.get(key))
    }

    /// Counts the produced nodes in this snapshot.
    ///
    /// Absent nodes count zero; every text leaf, sequence and mapping
    /// counts one. Never exceeds the element budget of the conversion that
    /// produced the snapshot.
    pub fn node_count(&self) -> usize {
        match self {
            Snapshot::Absent => 0,
            Snapshot::Text(_) => 1,
            Snapshot::Sequence(items) => 1 + items.iter().map(Snapshot::node_count).sum::<usize>(),
            Snapshot::Mapping(entries) => {
                1 + entries.values().map(Snapshot::node_count).sum::<usize>()
            }
        }
    }
}

/// Compact single-line rendering; also used to render converted map keys.
impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Snapshot::Absent => write!(f, "<absent>"),
            Snapshot::Text(text) => f.write_str(text),
            Snapshot::Sequence(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Snapshot::Mapping(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Converts arbitrary object graphs into bounded [`Snapshot`]s.
///
/// `convert` never fails visibly: budget and depth exhaustion truncate
/// silently, and a failing field read collapses to a single error-marker
/// leaf while siblings convert normally. The conversion budget is local to
/// one call; nothing is shared across threads.
///
/// Field names on the denylist are dropped from structures regardless of
/// their value — use it for framework plumbing and back-reference fields
/// that carry nothing inspectable but can fan out across object graphs
/// without bound.
///
/// # Examples
///
/// ```
/// use appsec_gateway::Snapshotter;
///
/// let snapshotter = Snapshotter::new();
///
/// let snapshot = snapshotter.convert(&vec![1, 2, 3]);
/// assert_eq!(snapshot.to_string(), "[1, 2, 3]");
/// ```
#[derive(Debug, Clone)]
pub struct Snapshotter {
    limits: Limits,
    denylist: Vec<&'static str>,
}

/// Plumbing field names excluded by default.
const DEFAULT_DENYLIST: &[&str] = &["__meta_class", "__outer"];

impl Snapshotter {
    /// Creates a snapshotter with default limits and the default denylist.
    pub fn new() -> Self {
        Self::with_limits(Limits::default_limits())
    }

    /// Creates a snapshotter with explicit limits.
    pub fn with_limits(limits: Limits) -> Self {
        Self {
            limits,
            denylist: DEFAULT_DENYLIST.to_vec(),
        }
    }

    /// Adds a field name to the denylist.
    ///
    /// # Examples
    ///
    /// ```
    /// use appsec_gateway::Snapshotter;
    ///
    /// let snapshotter = Snapshotter::new().exclude_field("__registry_backref");
    /// ```
    pub fn exclude_field(mut self, name: &'static str) -> Self {
        if !self.denylist.contains(&name) {
            self.denylist.push(name);
        }
        self
    }

    /// The limits this snapshotter converts under.
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Converts an object graph into a bounded snapshot.
    ///
    /// Always returns a node; pathological input yields [`Snapshot::Absent`]
    /// or a truncated tree, never an error.
    pub fn convert(&self, value: &dyn Introspect) -> Snapshot {
        let mut budget = Budget::new(self.limits.max_elements);
        let snapshot = self.convert_bounded(value, 0, &mut budget);
        if budget.exhausted() {
            tracing::trace!(
                max_elements = self.limits.max_elements,
                "snapshot truncated by element budget"
            );
        }
        snapshot
    }

    fn convert_bounded(
        &self,
        value: &dyn Introspect,
        depth: usize,
        budget: &mut Budget,
    ) -> Snapshot {
        // Every visited node costs one element, even one that ends up
        // absent; the budget is shared by the entire call.
        if !budget.consume() || depth > self.limits.max_depth {
            return Snapshot::Absent;
        }

        match value.shape() {
            Shape::Absent => Snapshot::Absent,
            Shape::Text(text) => Snapshot::Text(text.into_owned()),
            Shape::Sequence(items) => {
                let mut converted = Vec::new();
                for item in items {
                    if budget.exhausted() {
                        break;
                    }
                    converted.push(self.convert_bounded(item, depth + 1, budget));
                }
                Snapshot::Sequence(converted)
            }
            Shape::Mapping(entries) => {
                let mut converted = BTreeMap::new();
                for (key, value) in entries {
                    if budget.exhausted() {
                        break;
                    }
                    let converted_key = self.convert_bounded(key, depth + 1, budget);
                    if converted_key.is_absent() {
                        // Either the key itself was absent or the budget ran
                        // out while converting it; an entry without a usable
                        // key is dropped whole.
                        continue;
                    }
                    let key_text = converted_key.to_string();
                    let converted_value = self.convert_bounded(value, depth + 1, budget);
                    converted.insert(key_text, converted_value);
                }
                Snapshot::Mapping(converted)
            }
            Shape::Structure(fields) => {
                let mut converted = BTreeMap::new();
                for field in fields {
                    if budget.exhausted() {
                        break;
                    }
                    if self.denylist.contains(&field.name()) {
                        continue;
                    }
                    let node = match field.value() {
                        Ok(value) => self.convert_bounded(value, depth + 1, budget),
                        // A marker leaf stands where the field's value node
                        // would, so it pays the same budget cost and obeys
                        // the same depth cut.
                        Err(error) => {
                            if budget.consume() && depth + 1 <= self.limits.max_depth {
                                self.error_marker(field.name(), error)
                            } else {
                                Snapshot::Absent
                            }
                        }
                    };
                    converted.insert(field.name().to_string(), node);
                }
                Snapshot::Mapping(converted)
            }
        }
    }

    /// Absorbs a field read failure into a single marker leaf.
    fn error_marker(&self, field: &'static str, error: &FieldError) -> Snapshot {
        tracing::trace!(field, error = %error, "field read absorbed into error marker");
        let mut message = error.message().to_string();
        if message.len() > MARKER_MESSAGE_MAX {
            let mut cut = MARKER_MESSAGE_MAX;
            while !message.is_char_boundary(cut) {
                cut -= 1;
            }
            message.truncate(cut);
        }
        Snapshot::Text(format!("<error: {}>", message))
    }
}

impl Default for Snapshotter {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrementing whole-call element budget.
///
/// Mirrors the decrement-then-check discipline of the conversion: a node is
/// produced only while the post-decrement count stays positive, so a budget
/// of N produces at most N-1 nodes.
struct Budget {
    remaining: usize,
}

impl Budget {
    fn new(max_elements: usize) -> Self {
        Self {
            remaining: max_elements,
        }
    }

    /// Pays for one node. Returns `false` once the budget is used up.
    fn consume(&mut self) -> bool {
        self.remaining = self.remaining.saturating_sub(1);
        self.remaining > 0
    }

    fn exhausted(&self) -> bool {
        self.remaining == 0
    }
}
