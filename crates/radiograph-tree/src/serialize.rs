//! Line-oriented text persistence of decision trees.
//!
//! The tree is written in pre-order, one node per line:
//!
//! ```text
//! tree      := node
//! node      := "NULL" | leaf_line child child | node_line child child
//! leaf_line := "LEAF" INT INT FLOAT      (class, -1, 0)
//! node_line := "NODE" INT INT FLOAT      (-1, feature, threshold)
//! child     := node
//! ```
//!
//! Leaves are always followed by two `NULL` children. Thresholds use the
//! shortest representation that parses back to the same `f64`, so a
//! save/load cycle is exact; files from writers that keep only six
//! significant digits load with that precision.
//!
//! The loader requires the two `NULL` lines after every `LEAF`. Files in
//! the older dialect that write a leaf with no child lines, so that the next
//! sibling follows the `LEAF` directly, are rejected as malformed on purpose:
//! a `LEAF` followed by `LEAF` or `NODE` is reported at that line.

use std::collections::VecDeque;
use std::io::{BufRead, Write};

use tracing::debug;

use crate::error::TreeError;
use crate::node::{FeatureIndex, Node, NodeIndex};
use crate::tree::DecisionTree;

const TAG_NULL: &str = "NULL";
const TAG_LEAF: &str = "LEAF";
const TAG_NODE: &str = "NODE";

/// Placeholder written in the fields a node shape does not use.
const UNUSED_INDEX: i64 = -1;
const UNUSED_THRESHOLD: f64 = 0.0;

/// Write `tree` (or a lone `NULL` for an empty tree) in pre-order.
pub(crate) fn write_tree<W: Write>(tree: Option<&DecisionTree>, out: &mut W) -> std::io::Result<()> {
    let Some(tree) = tree else {
        return writeln!(out, "{TAG_NULL}");
    };

    let mut stack: Vec<Option<NodeIndex>> = vec![Some(NodeIndex::new(0))];
    while let Some(entry) = stack.pop() {
        let Some(idx) = entry else {
            writeln!(out, "{TAG_NULL}")?;
            continue;
        };
        match &tree.nodes[idx.index()] {
            Node::Leaf { prediction } => {
                writeln!(out, "{TAG_LEAF} {prediction} {UNUSED_INDEX} {UNUSED_THRESHOLD}")?;
                stack.push(None);
                stack.push(None);
            }
            Node::Split {
                feature,
                threshold,
                left,
                right,
                ..
            } => {
                writeln!(out, "{TAG_NODE} {UNUSED_INDEX} {feature} {threshold}")?;
                stack.push(*right);
                stack.push(*left);
            }
        }
    }
    Ok(())
}

/// Where the next parsed node attaches.
#[derive(Debug, Clone, Copy)]
enum Slot {
    Root,
    Left(usize),
    Right(usize),
    /// A child position of the leaf declared on the given line; only `NULL` fits.
    UnderLeaf(usize),
}

/// Parse a pre-order tree. A `NULL` root yields `Ok(None)`.
///
/// # Errors
///
/// [`TreeError::MalformedModel`] for grammar violations, [`TreeError::Stream`]
/// when the reader fails.
pub(crate) fn read_tree<R: BufRead>(reader: R) -> Result<Option<DecisionTree>, TreeError> {
    let mut tokens = Tokens::new(reader);
    let mut nodes: Vec<Node> = Vec::new();
    let mut max_feature: Option<usize> = None;
    let mut pending = vec![Slot::Root];

    while let Some(slot) = pending.pop() {
        let (line, tag) = tokens.require("node tag")?;
        match tag.as_str() {
            TAG_NULL => {
                // Absent children simply stay `None`.
            }
            TAG_LEAF | TAG_NODE => {
                if let Slot::UnderLeaf(leaf_line) = slot {
                    return Err(malformed(
                        line,
                        format!("leaf declared on line {leaf_line} cannot have children"),
                    ));
                }
                let class = tokens.integer("class")?;
                let feature = tokens.integer("feature index")?;
                let threshold = tokens.float("threshold")?;

                let idx = nodes.len();
                if tag == TAG_LEAF {
                    let prediction = match class {
                        0 => 0,
                        1 => 1,
                        other => {
                            return Err(malformed(line, format!("leaf class {other} is not 0 or 1")));
                        }
                    };
                    nodes.push(Node::Leaf { prediction });
                    pending.push(Slot::UnderLeaf(line));
                    pending.push(Slot::UnderLeaf(line));
                } else {
                    let feature = usize::try_from(feature).map_err(|_| {
                        malformed(line, format!("split feature index {feature} is negative"))
                    })?;
                    max_feature = max_feature.max(Some(feature));
                    nodes.push(Node::Split {
                        feature: FeatureIndex::new(feature),
                        threshold,
                        left: None,
                        right: None,
                        impurity_decrease: 0.0,
                    });
                    pending.push(Slot::Right(idx));
                    pending.push(Slot::Left(idx));
                }
                attach(&mut nodes, slot, idx);
            }
            other => {
                return Err(malformed(
                    line,
                    format!("unexpected tag {other:?}, expected NULL, LEAF or NODE"),
                ));
            }
        }
    }

    if let Some((line, extra)) = tokens.next_token()? {
        return Err(malformed(line, format!("trailing token {extra:?} after the tree")));
    }

    if nodes.is_empty() {
        debug!("persisted tree is empty");
        return Ok(None);
    }

    debug!(n_nodes = nodes.len(), "persisted tree parsed");
    Ok(Some(DecisionTree {
        nodes,
        n_features: max_feature.map_or(0, |f| f + 1),
    }))
}

fn attach(nodes: &mut [Node], slot: Slot, child: usize) {
    let child = Some(NodeIndex::new(child));
    match slot {
        Slot::Left(parent) => {
            if let Node::Split { left, .. } = &mut nodes[parent] {
                *left = child;
            }
        }
        Slot::Right(parent) => {
            if let Node::Split { right, .. } = &mut nodes[parent] {
                *right = child;
            }
        }
        Slot::Root | Slot::UnderLeaf(_) => {}
    }
}

fn malformed(line: usize, reason: String) -> TreeError {
    TreeError::MalformedModel { line, reason }
}

/// Whitespace-delimited tokens tagged with their one-based line number.
struct Tokens<R> {
    reader: R,
    line: usize,
    queue: VecDeque<String>,
}

impl<R: BufRead> Tokens<R> {
    fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            queue: VecDeque::new(),
        }
    }

    fn next_token(&mut self) -> Result<Option<(usize, String)>, TreeError> {
        while self.queue.is_empty() {
            let mut buf = String::new();
            if self.reader.read_line(&mut buf)? == 0 {
                return Ok(None);
            }
            self.line += 1;
            self.queue
                .extend(buf.split_whitespace().map(str::to_owned));
        }
        Ok(self.queue.pop_front().map(|t| (self.line, t)))
    }

    fn require(&mut self, what: &str) -> Result<(usize, String), TreeError> {
        self.next_token()?
            .ok_or_else(|| malformed(self.line, format!("unexpected end of input, expected {what}")))
    }

    fn integer(&mut self, what: &str) -> Result<i64, TreeError> {
        let (line, raw) = self.require(what)?;
        raw.parse()
            .map_err(|_| malformed(line, format!("expected integer {what}, found {raw:?}")))
    }

    fn float(&mut self, what: &str) -> Result<f64, TreeError> {
        let (line, raw) = self.require(what)?;
        match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(malformed(line, format!("expected finite {what}, found {raw:?}"))),
        }
    }
}
