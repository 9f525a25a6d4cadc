//! CSS selector subset evaluated against a [`DomSnapshot`].
//!
//! Supported: type and universal selectors, `#id`, `.class`, attribute
//! selectors (`[a]`, `=`, `~=`, `|=`, `^=`, `$=`, `*=`), descendant and
//! child combinators, selector lists, `:nth-of-type(n)` and the
//! `:contains("text")` extension that workflow authors rely on.

use std::str::FromStr;

use crate::errors::{SelectorError, SelectorResult};
use crate::model::{DomNode, DomSnapshot, NodeId};

#[derive(Clone, Debug, PartialEq)]
pub struct SelectorList {
    selectors: Vec<ComplexSelector>,
}

#[derive(Clone, Debug, PartialEq)]
struct ComplexSelector {
    compounds: Vec<Compound>,
    /// `combinators[i]` joins `compounds[i]` and `compounds[i + 1]`.
    combinators: Vec<Combinator>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Clone, Debug, Default, PartialEq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<AttrSelector>,
    nth_of_type: Option<usize>,
    contains: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
struct AttrSelector {
    name: String,
    op: Option<(AttrOp, String)>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AttrOp {
    Equals,
    Includes,
    DashMatch,
    Prefix,
    Suffix,
    Substring,
}

impl SelectorList {
    pub fn parse(input: &str) -> SelectorResult<Self> {
        Parser::new(input).parse_list()
    }

    pub fn matches(&self, snapshot: &DomSnapshot, node: NodeId) -> bool {
        self.selectors
            .iter()
            .any(|selector| selector.matches(snapshot, node))
    }
}

impl FromStr for SelectorList {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// All nodes matching `selector`, in document order.
pub fn query_selector_all(snapshot: &DomSnapshot, selector: &str) -> SelectorResult<Vec<NodeId>> {
    let list = SelectorList::parse(selector)?;
    Ok(select_all(snapshot, &list))
}

/// First node matching `selector` in document order.
pub fn query_selector(snapshot: &DomSnapshot, selector: &str) -> SelectorResult<Option<NodeId>> {
    let list = SelectorList::parse(selector)?;
    Ok(snapshot
        .nodes()
        .map(|node| node.id)
        .find(|id| list.matches(snapshot, *id)))
}

pub fn select_all(snapshot: &DomSnapshot, list: &SelectorList) -> Vec<NodeId> {
    snapshot
        .nodes()
        .map(|node| node.id)
        .filter(|id| list.matches(snapshot, *id))
        .collect()
}

impl ComplexSelector {
    fn matches(&self, snapshot: &DomSnapshot, node: NodeId) -> bool {
        self.match_from(snapshot, node, self.compounds.len() - 1)
    }

    fn match_from(&self, snapshot: &DomSnapshot, node: NodeId, index: usize) -> bool {
        let Some(dom) = snapshot.node(node) else {
            return false;
        };
        if !self.compounds[index].matches(snapshot, dom) {
            return false;
        }
        if index == 0 {
            return true;
        }
        match self.combinators[index - 1] {
            Combinator::Child => dom
                .parent
                .map_or(false, |parent| self.match_from(snapshot, parent, index - 1)),
            Combinator::Descendant => snapshot
                .ancestors(node)
                .any(|ancestor| self.match_from(snapshot, ancestor.id, index - 1)),
        }
    }
}

impl Compound {
    fn matches(&self, snapshot: &DomSnapshot, node: &DomNode) -> bool {
        if let Some(tag) = &self.tag {
            if &node.tag != tag {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if node.attr("id") != Some(id.as_str()) {
                return false;
            }
        }
        if !self
            .classes
            .iter()
            .all(|class| node.classes().any(|c| c == class))
        {
            return false;
        }
        if !self.attributes.iter().all(|attr| attr.matches(node)) {
            return false;
        }
        if let Some(nth) = self.nth_of_type {
            if snapshot.nth_of_type(node.id) != nth {
                return false;
            }
        }
        if let Some(needle) = &self.contains {
            if !snapshot.text_content(node.id).contains(needle.as_str()) {
                return false;
            }
        }
        true
    }

    fn is_empty(&self) -> bool {
        *self == Compound::default()
    }
}

impl AttrSelector {
    fn matches(&self, node: &DomNode) -> bool {
        let Some(actual) = node.attr(&self.name) else {
            return false;
        };
        let Some((op, expected)) = &self.op else {
            return true;
        };
        match op {
            AttrOp::Equals => actual == expected,
            AttrOp::Includes => actual.split_whitespace().any(|word| word == expected),
            AttrOp::DashMatch => {
                actual == expected
                    || actual
                        .strip_prefix(expected.as_str())
                        .map_or(false, |rest| rest.starts_with('-'))
            }
            AttrOp::Prefix => !expected.is_empty() && actual.starts_with(expected.as_str()),
            AttrOp::Suffix => !expected.is_empty() && actual.ends_with(expected.as_str()),
            AttrOp::Substring => !expected.is_empty() && actual.contains(expected.as_str()),
        }
    }
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        Some(ch)
    }

    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().map_or(false, char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn unexpected(&self) -> SelectorError {
        match self.peek() {
            Some(ch) => SelectorError::UnexpectedChar {
                ch,
                offset: self.pos,
            },
            None => SelectorError::UnexpectedEnd,
        }
    }

    fn expect(&mut self, expected: char) -> SelectorResult<()> {
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn parse_list(mut self) -> SelectorResult<SelectorList> {
        self.skip_ws();
        if self.peek().is_none() {
            return Err(SelectorError::Empty);
        }
        let mut selectors = Vec::new();
        loop {
            self.skip_ws();
            selectors.push(self.parse_complex()?);
            self.skip_ws();
            match self.peek() {
                None => break,
                Some(',') => {
                    self.pos += 1;
                }
                Some(_) => return Err(self.unexpected()),
            }
        }
        Ok(SelectorList { selectors })
    }

    fn parse_complex(&mut self) -> SelectorResult<ComplexSelector> {
        let mut compounds = vec![self.parse_compound()?];
        let mut combinators = Vec::new();
        loop {
            let had_ws = self.skip_ws();
            let combinator = match self.peek() {
                None | Some(',') => break,
                Some('>') => {
                    self.pos += 1;
                    self.skip_ws();
                    Combinator::Child
                }
                Some(_) if had_ws => Combinator::Descendant,
                Some(_) => return Err(self.unexpected()),
            };
            combinators.push(combinator);
            compounds.push(self.parse_compound()?);
        }
        Ok(ComplexSelector {
            compounds,
            combinators,
        })
    }

    fn parse_compound(&mut self) -> SelectorResult<Compound> {
        let mut compound = Compound::default();
        let mut universal = false;
        if self.peek() == Some('*') {
            self.pos += 1;
            universal = true;
        } else if self.peek().map_or(false, is_ident_start) {
            compound.tag = Some(self.parse_ident()?.to_ascii_lowercase());
        }
        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    compound.id = Some(self.parse_ident()?);
                }
                Some('.') => {
                    self.pos += 1;
                    compound.classes.push(self.parse_ident()?);
                }
                Some('[') => {
                    self.pos += 1;
                    compound.attributes.push(self.parse_attr()?);
                }
                Some(':') => {
                    self.pos += 1;
                    self.parse_pseudo(&mut compound)?;
                }
                _ => break,
            }
        }
        if compound.is_empty() && !universal {
            return Err(self.unexpected());
        }
        Ok(compound)
    }

    fn parse_ident(&mut self) -> SelectorResult<String> {
        let start = self.pos;
        let mut ident = String::new();
        while let Some(ch) = self.peek() {
            if ch == '\\' {
                self.pos += 1;
                ident.push(self.bump().ok_or(SelectorError::UnexpectedEnd)?);
            } else if is_ident_char(ch) {
                ident.push(ch);
                self.pos += 1;
            } else {
                break;
            }
        }
        if self.pos == start {
            return Err(self.unexpected());
        }
        Ok(ident)
    }

    fn parse_attr(&mut self) -> SelectorResult<AttrSelector> {
        self.skip_ws();
        let name = self.parse_ident()?.to_ascii_lowercase();
        self.skip_ws();
        let op = match self.peek() {
            Some(']') => {
                self.pos += 1;
                return Ok(AttrSelector { name, op: None });
            }
            Some('=') => {
                self.pos += 1;
                AttrOp::Equals
            }
            Some(prefix) => {
                let op = match prefix {
                    '~' => AttrOp::Includes,
                    '|' => AttrOp::DashMatch,
                    '^' => AttrOp::Prefix,
                    '$' => AttrOp::Suffix,
                    '*' => AttrOp::Substring,
                    _ => return Err(self.unexpected()),
                };
                self.pos += 1;
                self.expect('=')?;
                op
            }
            None => return Err(SelectorError::UnexpectedEnd),
        };
        self.skip_ws();
        let value = match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                self.parse_quoted(quote)?
            }
            Some(_) => self.parse_ident()?,
            None => return Err(SelectorError::UnexpectedEnd),
        };
        self.skip_ws();
        // Case-sensitivity flags are accepted and ignored.
        if matches!(self.peek(), Some('i' | 's' | 'I' | 'S')) {
            self.pos += 1;
            self.skip_ws();
        }
        self.expect(']')?;
        Ok(AttrSelector {
            name,
            op: Some((op, value)),
        })
    }

    fn parse_quoted(&mut self, quote: char) -> SelectorResult<String> {
        let mut value = String::new();
        loop {
            match self.bump() {
                None => return Err(SelectorError::UnexpectedEnd),
                Some('\\') => value.push(self.bump().ok_or(SelectorError::UnexpectedEnd)?),
                Some(ch) if ch == quote => return Ok(value),
                Some(ch) => value.push(ch),
            }
        }
    }

    fn parse_pseudo(&mut self, compound: &mut Compound) -> SelectorResult<()> {
        let name = self.parse_ident()?.to_ascii_lowercase();
        match name.as_str() {
            "nth-of-type" => {
                self.expect('(')?;
                self.skip_ws();
                let start = self.pos;
                while self.peek().map_or(false, |ch| ch != ')') {
                    self.pos += 1;
                }
                let raw: String = self.chars[start..self.pos].iter().collect();
                self.expect(')')?;
                let nth = raw
                    .trim()
                    .parse::<usize>()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| SelectorError::InvalidNth(raw.trim().to_string()))?;
                compound.nth_of_type = Some(nth);
            }
            "first-of-type" => compound.nth_of_type = Some(1),
            "contains" => {
                self.expect('(')?;
                self.skip_ws();
                let text = match self.peek() {
                    Some(quote @ ('"' | '\'')) => {
                        self.pos += 1;
                        self.parse_quoted(quote)?
                    }
                    _ => {
                        let start = self.pos;
                        while self.peek().map_or(false, |ch| ch != ')') {
                            self.pos += 1;
                        }
                        self.chars[start..self.pos]
                            .iter()
                            .collect::<String>()
                            .trim()
                            .to_string()
                    }
                };
                self.skip_ws();
                self.expect(')')?;
                compound.contains = Some(text);
            }
            other => return Err(SelectorError::UnsupportedPseudo(other.to_string())),
        }
        Ok(())
    }
}

fn is_ident_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_' || ch == '-'
}

fn is_ident_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '-'
}

/// True when `value` can be written as a bare identifier after `#` or `.`.
pub fn is_plain_ident(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if is_ident_start(first) && first != '-' => chars.all(is_ident_char),
        _ => false,
    }
}

/// Quote an attribute value for use inside `[name="..."]`.
pub fn quote_attr_value(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for ch in value.chars() {
        if ch == '"' || ch == '\\' {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}
