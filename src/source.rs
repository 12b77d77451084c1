// 🌳 Source Query Layer - Namespace-qualified lookups over the notice tree
//
// Paths are `prefix:Local` steps separated by `/`, evaluated relative to a
// node. A step may carry one attribute filter: `cbc:ID[@schemeName='Lot']`.
// An empty path designates the node itself.

use roxmltree::{Document, Node};

// ============================================================================
// NAMESPACES
// ============================================================================

/// Prefixes usable in query paths
pub const NAMESPACES: &[(&str, &str)] = &[
    (
        "cbc",
        "urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2",
    ),
    (
        "cac",
        "urn:oasis:names:specification:ubl:schema:xsd:CommonAggregateComponents-2",
    ),
    (
        "ext",
        "urn:oasis:names:specification:ubl:schema:xsd:CommonExtensionComponents-2",
    ),
    (
        "efac",
        "http://data.europa.eu/p27/eforms-ubl-extension-aggregate-components/1",
    ),
    (
        "efbc",
        "http://data.europa.eu/p27/eforms-ubl-extension-basic-components/1",
    ),
    ("efext", "http://data.europa.eu/p27/eforms-ubl-extensions/1"),
];

/// Path from any UBL element to its eForms extension block
pub const EFORMS_EXTENSION: &str =
    "ext:UBLExtensions/ext:UBLExtension/ext:ExtensionContent/efext:EformsExtension";

fn namespace_uri(prefix: &str) -> Option<&'static str> {
    NAMESPACES
        .iter()
        .find(|(p, _)| *p == prefix)
        .map(|(_, uri)| *uri)
}

// ============================================================================
// SOURCE DOCUMENT
// ============================================================================

/// A parsed notice. Read-only for the whole conversion.
pub struct SourceDocument<'input> {
    doc: Document<'input>,
}

impl<'input> SourceDocument<'input> {
    pub fn parse(text: &'input str) -> Result<Self, roxmltree::Error> {
        Ok(SourceDocument {
            doc: Document::parse(text)?,
        })
    }

    /// The notice root element (`ContractNotice`, `ContractAwardNotice`, ...)
    pub fn root(&self) -> Node<'_, 'input> {
        self.doc.root_element()
    }

    /// The `efext:EformsExtension` block under the root, if any
    pub fn extension(&self) -> Option<Node<'_, 'input>> {
        find_node(self.root(), EFORMS_EXTENSION)
    }
}

// ============================================================================
// PATH EVALUATION
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
struct Step<'p> {
    prefix: &'p str,
    local: &'p str,
    filter: Option<(&'p str, &'p str)>,
}

fn parse_step(raw: &str) -> Option<Step<'_>> {
    let (name, filter) = match raw.find('[') {
        Some(open) => {
            let inner = raw[open + 1..].strip_suffix(']')?;
            let inner = inner.strip_prefix('@')?;
            let (attr, value) = inner.split_once('=')?;
            let value = value.trim_matches(|c| c == '\'' || c == '"');
            (&raw[..open], Some((attr.trim(), value)))
        }
        None => (raw, None),
    };
    let (prefix, local) = name.split_once(':')?;
    Some(Step {
        prefix,
        local,
        filter,
    })
}

/// Split on `/` outside of `[...]` filters
fn split_path(path: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, c) in path.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            '/' if depth == 0 => {
                parts.push(&path[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&path[start..]);
    parts.into_iter().filter(|p| !p.is_empty()).collect()
}

fn step_matches(node: &Node<'_, '_>, step: &Step<'_>, uri: &str) -> bool {
    if !node.is_element() {
        return false;
    }
    let tag = node.tag_name();
    if tag.name() != step.local || tag.namespace() != Some(uri) {
        return false;
    }
    match step.filter {
        Some((attr, value)) => node.attribute(attr) == Some(value),
        None => true,
    }
}

/// All nodes reached from `node` by `path`, in document order
pub fn find_nodes<'a, 'i>(node: Node<'a, 'i>, path: &str) -> Vec<Node<'a, 'i>> {
    let mut current = vec![node];
    for raw in split_path(path) {
        let Some(step) = parse_step(raw) else {
            tracing::debug!(path, step = raw, "Malformed query step");
            return Vec::new();
        };
        let Some(uri) = namespace_uri(step.prefix) else {
            tracing::debug!(path, prefix = step.prefix, "Unknown namespace prefix");
            return Vec::new();
        };
        current = current
            .iter()
            .flat_map(|n| n.children())
            .filter(|child| step_matches(child, &step, uri))
            .collect();
        if current.is_empty() {
            break;
        }
    }
    current
}

/// First node reached by `path`
pub fn find_node<'a, 'i>(node: Node<'a, 'i>, path: &str) -> Option<Node<'a, 'i>> {
    find_nodes(node, path).into_iter().next()
}

/// Trimmed, non-empty text of the first node reached by `path`
pub fn find_text(node: Node<'_, '_>, path: &str) -> Option<String> {
    find_node(node, path).and_then(text_of)
}

/// Texts of every node reached by `path` (empty ones skipped)
pub fn find_texts(node: Node<'_, '_>, path: &str) -> Vec<String> {
    find_nodes(node, path)
        .into_iter()
        .filter_map(text_of)
        .collect()
}

/// Attribute of the first node reached by `path`
pub fn find_attribute(node: Node<'_, '_>, path: &str, attr: &str) -> Option<String> {
    find_node(node, path)
        .and_then(|n| n.attribute(attr))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Trimmed, non-empty text content of a node
pub fn text_of(node: Node<'_, '_>) -> Option<String> {
    node.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
}

// ============================================================================
// TESTS
// ============================================================================
