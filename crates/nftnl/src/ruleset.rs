//! Ruleset aggregation, streaming document parsing, and rendering.
//!
//! A serialized ruleset document holds a sequence of top-level nodes, each
//! describing a command applied to one object. The streaming entry points
//! ([`parse_buffer_cb`], [`parse_reader_cb`]) walk the document node by node
//! and hand each one to a caller closure as an ephemeral [`ParseContext`];
//! [`Ruleset::parse`] is the convenience path that accumulates the objects
//! instead. Only the JSON document format is implemented; text and XML
//! inputs report an unsupported operation.

use std::io::Read;
use std::ops::ControlFlow;

use serde_json::Value;
use tracing::debug;

use crate::chain::Chain;
use crate::error::ParseError;
use crate::json;
use crate::output::{Command, Format, cmd_footer, cmd_header};
use crate::rule::Rule;
use crate::set::Set;
use crate::table::Table;

/// Kind of object a parsed top-level node describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RulesetKind {
    /// A nested ruleset node wrapping further nodes.
    Ruleset,
    Table,
    Chain,
    Rule,
    Set,
    /// Elements destined for an existing set.
    SetElems,
}

/// Why a callback-driven parse stopped early.
///
/// The two arms stay distinguishable so a caller can tell "I chose to stop"
/// from "the document is malformed".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseAbort {
    /// The callback broke out with its own value.
    Callback(i32),
    /// The document itself failed to parse.
    Parse(ParseError),
}

impl From<ParseError> for ParseAbort {
    fn from(err: ParseError) -> Self {
        Self::Parse(err)
    }
}

/// One decoded top-level node.
#[derive(Debug)]
enum Node {
    Table(Table),
    Chain(Chain),
    Rule(Rule),
    Set(Set),
    SetElems(Set),
}

/// Transient descriptor of one parsed top-level node, handed to the caller's
/// closure during a streaming parse.
///
/// Valid only for the duration of one closure invocation; the closure must
/// copy out anything it wants to keep. The accessor matching the node's
/// [`kind`](Self::kind) returns the decoded object, the others return
/// `None`.
#[derive(Debug)]
pub struct ParseContext<'a> {
    command: Command,
    kind: RulesetKind,
    node: &'a Node,
}

impl<'a> ParseContext<'a> {
    fn new(command: Command, node: &'a Node) -> Self {
        let kind = match node {
            Node::Table(_) => RulesetKind::Table,
            Node::Chain(_) => RulesetKind::Chain,
            Node::Rule(_) => RulesetKind::Rule,
            Node::Set(_) => RulesetKind::Set,
            Node::SetElems(_) => RulesetKind::SetElems,
        };
        Self {
            command,
            kind,
            node,
        }
    }

    /// Command this node applies.
    pub fn command(&self) -> Command {
        self.command
    }

    /// Kind of object this node holds.
    pub fn kind(&self) -> RulesetKind {
        self.kind
    }

    /// The decoded table, for table nodes.
    pub fn table(&self) -> Option<&Table> {
        match self.node {
            Node::Table(table) => Some(table),
            _ => None,
        }
    }

    /// The decoded chain, for chain nodes.
    pub fn chain(&self) -> Option<&Chain> {
        match self.node {
            Node::Chain(chain) => Some(chain),
            _ => None,
        }
    }

    /// The decoded rule, for rule nodes.
    pub fn rule(&self) -> Option<&Rule> {
        match self.node {
            Node::Rule(rule) => Some(rule),
            _ => None,
        }
    }

    /// The decoded set, for set and set-elements nodes. A set-elements node
    /// carries the owning set's name and table plus the parsed elements.
    pub fn set(&self) -> Option<&Set> {
        match self.node {
            Node::Set(set) | Node::SetElems(set) => Some(set),
            _ => None,
        }
    }
}

/// Decode one document node into its command and object.
fn parse_node(value: &Value) -> Result<(Command, Node), ParseError> {
    let obj = json::as_object(value, "command")?;

    let command = match json::opt_str_field(obj, "command")? {
        None => Command::Unspec,
        Some(tag) => Command::from_tag(tag).ok_or_else(|| ParseError::bad_type("command"))?,
    };

    let node = if let Some(body) = obj.get("table") {
        Node::Table(Table::from_json(body)?)
    } else if let Some(body) = obj.get("chain") {
        Node::Chain(Chain::from_json(body)?)
    } else if let Some(body) = obj.get("rule") {
        Node::Rule(Rule::from_json(body)?)
    } else if let Some(body) = obj.get("set") {
        Node::Set(Set::from_json(body)?)
    } else if let Some(body) = obj.get("elements") {
        Node::SetElems(Set::from_json(body)?)
    } else {
        // The node's kind is not one this parser implements.
        return Err(ParseError::NotSupported);
    };

    Ok((command, node))
}

/// Dispatch the nodes of a document array, recursing through nested
/// ruleset nodes, until the array is exhausted or the callback breaks.
fn dispatch<F>(nodes: &[Value], cb: &mut F) -> Result<(), ParseAbort>
where
    F: FnMut(&ParseContext<'_>) -> ControlFlow<i32>,
{
    for value in nodes {
        if let Some(inner) = value.as_object().and_then(|obj| obj.get("ruleset")) {
            let inner = inner
                .as_array()
                .ok_or_else(|| ParseError::bad_type("ruleset"))?;
            dispatch(inner, cb)?;
            continue;
        }

        let (command, node) = parse_node(value)?;
        let ctx = ParseContext::new(command, &node);
        debug!(kind = ?ctx.kind(), command = ?ctx.command(), "dispatching ruleset node");
        if let ControlFlow::Break(code) = cb(&ctx) {
            return Err(ParseAbort::Callback(code));
        }
    }
    Ok(())
}

/// Parse a complete in-memory ruleset document, invoking `cb` once per
/// top-level node.
///
/// Nodes are consumed in document order; a node already handed to the
/// callback is never revisited. The callback stops the parse by returning
/// [`ControlFlow::Break`]; that value comes back as
/// [`ParseAbort::Callback`], kept distinct from [`ParseAbort::Parse`] for
/// malformed input.
pub fn parse_buffer_cb<F>(format: Format, buffer: &str, mut cb: F) -> Result<(), ParseAbort>
where
    F: FnMut(&ParseContext<'_>) -> ControlFlow<i32>,
{
    if format != Format::Json {
        return Err(ParseError::NotSupported.into());
    }

    let doc: Value = serde_json::from_str(buffer).map_err(ParseError::from)?;
    let obj = json::as_object(&doc, "ruleset")?;
    let nodes = match obj.get("ruleset") {
        None => return Err(ParseError::missing("ruleset").into()),
        Some(value) => value
            .as_array()
            .ok_or_else(|| ParseError::bad_type("ruleset"))?,
    };
    dispatch(nodes, &mut cb)
}

/// Parse a ruleset document from a readable stream.
///
/// The stream is drained once up front; dispatch then proceeds as in
/// [`parse_buffer_cb`]. A read failure reports an undefined parse error.
pub fn parse_reader_cb<R, F>(format: Format, mut reader: R, cb: F) -> Result<(), ParseAbort>
where
    R: Read,
    F: FnMut(&ParseContext<'_>) -> ControlFlow<i32>,
{
    let mut buffer = String::new();
    reader
        .read_to_string(&mut buffer)
        .map_err(|_| ParseError::Undefined)?;
    parse_buffer_cb(format, &buffer, cb)
}

/// Optional object lists of a [`Ruleset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RulesetAttr {
    Tables,
    Chains,
    Sets,
    Rules,
}

/// Aggregate of tables, chains, sets, and rules for combined parsing and
/// rendering.
///
/// The lists own their objects; dropping the ruleset drops everything in
/// them. Not internally synchronized.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Ruleset {
    tables: Vec<Table>,
    chains: Vec<Chain>,
    sets: Vec<Set>,
    rules: Vec<Rule>,
}

impl Ruleset {
    /// Create an empty ruleset.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn chains(&self) -> &[Chain] {
        &self.chains
    }

    pub fn sets(&self) -> &[Set] {
        &self.sets
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn push_table(&mut self, table: Table) {
        self.tables.push(table);
    }

    pub fn push_chain(&mut self, chain: Chain) {
        self.chains.push(chain);
    }

    pub fn push_set(&mut self, set: Set) {
        self.sets.push(set);
    }

    pub fn push_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// Check whether an object list holds anything.
    pub fn is_set(&self, attr: RulesetAttr) -> bool {
        match attr {
            RulesetAttr::Tables => !self.tables.is_empty(),
            RulesetAttr::Chains => !self.chains.is_empty(),
            RulesetAttr::Sets => !self.sets.is_empty(),
            RulesetAttr::Rules => !self.rules.is_empty(),
        }
    }

    /// Drop every object in a list. Clearing an empty list is a no-op.
    pub fn unset(&mut self, attr: RulesetAttr) {
        match attr {
            RulesetAttr::Tables => self.tables.clear(),
            RulesetAttr::Chains => self.chains.clear(),
            RulesetAttr::Sets => self.sets.clear(),
            RulesetAttr::Rules => self.rules.clear(),
        }
    }

    /// Parse a document, accumulating every successfully parsed object into
    /// this ruleset.
    ///
    /// Stops at the first failure; objects collected up to that point stay
    /// in place. Elements for a set already in the ruleset are merged into
    /// it, matched by name and table; otherwise the carrying set is added
    /// as a new one.
    pub fn parse(&mut self, format: Format, document: &str) -> Result<(), ParseError> {
        let outcome = parse_buffer_cb(format, document, |ctx| {
            self.absorb(ctx);
            ControlFlow::Continue(())
        });
        match outcome {
            Ok(()) => Ok(()),
            Err(ParseAbort::Parse(err)) => Err(err),
            // The accumulating callback never breaks.
            Err(ParseAbort::Callback(_)) => Err(ParseError::Undefined),
        }
    }

    /// Parse a document from a readable stream, as [`parse`](Self::parse).
    pub fn parse_reader<R: Read>(
        &mut self,
        format: Format,
        mut reader: R,
    ) -> Result<(), ParseError> {
        let mut buffer = String::new();
        reader
            .read_to_string(&mut buffer)
            .map_err(|_| ParseError::Undefined)?;
        self.parse(format, &buffer)
    }

    fn absorb(&mut self, ctx: &ParseContext<'_>) {
        match ctx.kind() {
            RulesetKind::Ruleset => {}
            RulesetKind::Table => self.tables.push(ctx.table().cloned().unwrap_or_default()),
            RulesetKind::Chain => self.chains.push(ctx.chain().cloned().unwrap_or_default()),
            RulesetKind::Rule => self.rules.push(ctx.rule().cloned().unwrap_or_default()),
            RulesetKind::Set => self.sets.push(ctx.set().cloned().unwrap_or_default()),
            RulesetKind::SetElems => {
                let Some(incoming) = ctx.set() else { return };
                let owner = self.sets.iter_mut().find(|set| {
                    set.name() == incoming.name() && set.table() == incoming.table()
                });
                match owner {
                    Some(set) => {
                        for elem in incoming.elems() {
                            set.push_elem(elem.clone());
                        }
                    }
                    None => self.sets.push(incoming.clone()),
                }
            }
        }
    }

    /// Render every object, each wrapped in the command's header/footer
    /// markers and separated by newlines. An unspecified command wraps
    /// nothing.
    pub fn render(&self, format: Format, cmd: Command) -> String {
        let mut parts = Vec::new();
        for table in &self.tables {
            parts.push(wrap(table.render(format), cmd, format));
        }
        for chain in &self.chains {
            parts.push(wrap(chain.render(format), cmd, format));
        }
        for set in &self.sets {
            parts.push(wrap(set.render(format), cmd, format));
        }
        for rule in &self.rules {
            parts.push(wrap(rule.render(format), cmd, format));
        }
        parts.join("\n")
    }
}

fn wrap(body: String, cmd: Command, format: Format) -> String {
    format!("{}{}{}", cmd_header(cmd, format), body, cmd_footer(cmd, format))
}
