//! The two small languages of the extraction configuration: path expressions
//! (`path:` fields) and value expressions (label values and substitutable
//! names). Both are compiled once when the configuration is loaded and
//! evaluated against JSON nodes during a scrape.

use {serde_json::Value, std::fmt, thiserror::Error};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty path segment")]
    EmptySegment,
    #[error("invalid path segment {0:?}")]
    InvalidSegment(String),
    #[error("unterminated `${{` in {0:?}")]
    Unterminated(String),
    #[error("unsupported expression {0:?}: expected a capture index or `$` followed by `.field` selectors")]
    Unsupported(String),
}

/// A compiled `path:` expression.
///
/// Grammar: `segment ('.' segment)*` where a segment is an object key, `*`,
/// or `key[index]`. Every `*` binds the next positional capture slot to the
/// matched object key or stringified array index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExpr {
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// Matches an object key verbatim.
    Key(String),
    /// `key[index]`: descends into the key, then into the array element.
    Element(String, usize),
    /// Matches every key of an object or every index of an array.
    Wildcard,
}

impl PathExpr {
    /// Compiles a path. The empty path is valid and means "stay on the
    /// current node".
    pub fn parse(path: &str) -> Result<Self, ParseError> {
        let mut segments = Vec::new();
        if path.is_empty() {
            return Ok(Self { segments });
        }
        for raw in path.split('.') {
            if raw.is_empty() {
                return Err(ParseError::EmptySegment);
            }
            if raw == "*" {
                segments.push(Segment::Wildcard);
                continue;
            }
            let segment = match raw.split_once('[') {
                Some((key, index)) => {
                    let index = index
                        .strip_suffix(']')
                        .and_then(|index| index.parse().ok())
                        .ok_or_else(|| ParseError::InvalidSegment(raw.to_string()))?;
                    if key.is_empty() {
                        return Err(ParseError::InvalidSegment(raw.to_string()));
                    }
                    Segment::Element(key.to_string(), index)
                }
                None => {
                    if raw.contains(['*', ']']) {
                        return Err(ParseError::InvalidSegment(raw.to_string()));
                    }
                    Segment::Key(raw.to_string())
                }
            };
            segments.push(segment);
        }
        Ok(Self { segments })
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of capture slots this path binds.
    pub fn wildcards(&self) -> usize {
        self.segments
            .iter()
            .filter(|segment| matches!(segment, Segment::Wildcard))
            .count()
    }

    /// The identifier of the last segment, used for name defaulting. `None`
    /// when the path ends in a wildcard.
    pub fn last_identifier(&self) -> Option<&str> {
        match self.segments.last() {
            Some(Segment::Key(key)) | Some(Segment::Element(key, _)) => Some(key),
            Some(Segment::Wildcard) => None,
            // The empty path contributes no name segment.
            None => Some(""),
        }
    }

    /// Resolves the path against `node`, yielding every matched node together
    /// with the captures bound by wildcard segments, in document order.
    /// Absent intermediate keys simply yield no matches.
    pub fn resolve<'a>(&self, node: &'a Value) -> Vec<(&'a Value, Vec<String>)> {
        let mut matches = vec![(node, Vec::new())];
        for segment in &self.segments {
            let mut next = Vec::new();
            for (node, captures) in matches {
                match segment {
                    Segment::Key(key) => {
                        if let Some(child) = node.get(key) {
                            next.push((child, captures));
                        }
                    }
                    Segment::Element(key, index) => {
                        if let Some(child) = node.get(key).and_then(|array| array.get(index)) {
                            next.push((child, captures));
                        }
                    }
                    Segment::Wildcard => match node {
                        Value::Object(object) => {
                            for (key, child) in object {
                                let mut captures = captures.clone();
                                captures.push(key.clone());
                                next.push((child, captures));
                            }
                        }
                        Value::Array(array) => {
                            for (index, child) in array.iter().enumerate() {
                                let mut captures = captures.clone();
                                captures.push(index.to_string());
                                next.push((child, captures));
                            }
                        }
                        _ => {}
                    },
                }
            }
            matches = next;
        }
        matches
    }
}

impl fmt::Display for PathExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            match segment {
                Segment::Key(key) => f.write_str(key)?,
                Segment::Element(key, index) => write!(f, "{key}[{index}]")?,
                Segment::Wildcard => f.write_str("*")?,
            }
        }
        Ok(())
    }
}

/// A compiled value expression: literal text mixed with positional capture
/// references (`$1`, `${0}`) and restricted JSONPath selectors (`${$.field}`)
/// resolved against the current JSON node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    /// `$N`/`${N}`. Slot 0 joins the captures of the current node's path.
    Capture(usize),
    /// `${$.a.b}`: field selectors applied to the current node. An empty
    /// selector list (`${$}`) is the node itself.
    Selector(Vec<String>),
}

/// Inputs a [`Template`] renders against.
pub struct TemplateContext<'a> {
    /// The JSON node selected by the enclosing path.
    pub node: &'a Value,
    /// Captures accumulated across the ancestor chain, outermost first.
    pub captures: &'a [String],
    /// How many trailing entries of `captures` were bound by the current
    /// node's own path; `$0` joins exactly those.
    pub local: usize,
}

impl Template {
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut chars = input.char_indices().peekable();
        while let Some((_, ch)) = chars.next() {
            if ch != '$' {
                literal.push(ch);
                continue;
            }
            match chars.peek() {
                Some((_, '{')) => {
                    chars.next();
                    let mut body = String::new();
                    loop {
                        match chars.next() {
                            Some((_, '}')) => break,
                            Some((_, ch)) => body.push(ch),
                            None => return Err(ParseError::Unterminated(input.to_string())),
                        }
                    }
                    flush(&mut literal, &mut parts);
                    parts.push(parse_braced(&body, input)?);
                }
                Some((_, digit)) if digit.is_ascii_digit() => {
                    let mut number = String::new();
                    while let Some((_, digit)) = chars.peek().filter(|(_, c)| c.is_ascii_digit()) {
                        number.push(*digit);
                        chars.next();
                    }
                    flush(&mut literal, &mut parts);
                    parts.push(Part::Capture(
                        number
                            .parse()
                            .map_err(|_| ParseError::Unsupported(input.to_string()))?,
                    ));
                }
                // A `$` not followed by a substitution form is plain text.
                _ => literal.push('$'),
            }
        }
        flush(&mut literal, &mut parts);
        Ok(Self { parts })
    }

    /// A template that renders `text` verbatim.
    pub fn literal(text: &str) -> Self {
        let parts = if text.is_empty() {
            Vec::new()
        } else {
            vec![Part::Literal(text.to_string())]
        };
        Self { parts }
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// The highest positional capture slot referenced, ignoring `$0`.
    pub fn max_capture(&self) -> usize {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Capture(n) => Some(*n),
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// Renders the template. `None` means a `${…}` selector addressed an
    /// absent or non-scalar field; callers drop the affected sample.
    pub fn render(&self, ctx: &TemplateContext) -> Option<String> {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Literal(text) => out.push_str(text),
                Part::Capture(0) => {
                    let start = ctx.captures.len() - ctx.local;
                    out.push_str(&ctx.captures[start..].join("_"));
                }
                Part::Capture(n) => {
                    let capture = ctx
                        .captures
                        .get(n - 1)
                        .expect("capture slots are validated when the configuration is compiled");
                    out.push_str(capture);
                }
                Part::Selector(fields) => {
                    let mut node = ctx.node;
                    for field in fields {
                        node = node.get(field)?;
                    }
                    out.push_str(&scalar_to_string(node)?);
                }
            }
        }
        Some(out)
    }
}

fn flush(literal: &mut String, parts: &mut Vec<Part>) {
    if !literal.is_empty() {
        parts.push(Part::Literal(std::mem::take(literal)));
    }
}

fn parse_braced(body: &str, input: &str) -> Result<Part, ParseError> {
    if body.chars().all(|ch| ch.is_ascii_digit()) && !body.is_empty() {
        return Ok(Part::Capture(
            body.parse()
                .map_err(|_| ParseError::Unsupported(input.to_string()))?,
        ));
    }
    if body == "$" {
        return Ok(Part::Selector(Vec::new()));
    }
    let Some(selectors) = body.strip_prefix("$.") else {
        return Err(ParseError::Unsupported(body.to_string()));
    };
    // Only plain field selectors are in scope; bracketed filters are not.
    if selectors.contains('[') {
        return Err(ParseError::Unsupported(body.to_string()));
    }
    let fields: Vec<String> = selectors.split('.').map(str::to_string).collect();
    if fields.iter().any(String::is_empty) {
        return Err(ParseError::Unsupported(body.to_string()));
    }
    Ok(Part::Selector(fields))
}

fn scalar_to_string(node: &Value) -> Option<String> {
    match node {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(value) => Some(value.to_string()),
        Value::Null | Value::Object(_) | Value::Array(_) => None,
    }
}
