pub mod ast;

use std::collections::BTreeMap;

use log::trace;

use crate::{
    error::{EngineError, EngineResult, ErrorKind},
    expression::{parse_expression, Expr},
    frontmatter,
    lexer::{Lexer, Token, TokenKind},
    position::Position,
};

use self::ast::*;

/// Tag names handled by the engine itself. Everything else becomes a
/// [`ResolverCall`].
pub const BUILTIN_TAGS: [&str; 15] = [
    "prompty.var",
    "prompty.raw",
    "prompty.comment",
    "prompty.include",
    "prompty.extends",
    "prompty.block",
    "prompty.parent",
    "prompty.if",
    "prompty.elseif",
    "prompty.else",
    "prompty.for",
    "prompty.switch",
    "prompty.case",
    "prompty.casedefault",
    "prompty.message",
];

/// Parse a template source into an immutable [`TemplateData`].
///
/// Splits off front matter, lexes the remainder with the given delimiter pair
/// and runs a single forward pass over the token stream.
pub fn parse_source(
    source: &str,
    open_delim: &str,
    close_delim: &str,
) -> EngineResult<TemplateData> {
    let (front_matter, body_offset) = frontmatter::split(source);
    let tokens = Lexer::new(source, open_delim, close_delim)
        .with_start(body_offset)
        .lex()?;

    trace!("parsing template of {} tokens", tokens.len());

    Parser::new(source, tokens).parse_template(front_matter)
}

/// How a body parse ended.
#[derive(Debug)]
enum BodyEnd {
    /// End of input (only legal at the top level).
    Eof,
    /// The matching block close was consumed; `end` is the byte offset just
    /// past the closing delimiter.
    Close { end: usize },
    /// An opening sibling tag (elseif/else/case/casedefault) is next; it has
    /// not been consumed.
    Sibling { name: String },
}

/// The block construct currently being parsed; a block close must match its
/// name, and structural errors point at its position.
#[derive(Debug, Clone)]
struct OpenFrame {
    tag_name: String,
    position: Position,
}

/// The header of a tag, up to and including its closing delimiter.
#[derive(Debug)]
struct TagHeader {
    name: String,
    attributes: Attributes,
    position: Position,
    start: usize,
    /// Byte offset just past the header's closing delimiter.
    end: usize,
    self_closing: bool,
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    index: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str, tokens: Vec<Token>) -> Self {
        Self {
            source,
            tokens,
            index: 0,
        }
    }

    fn parse_template(mut self, front_matter: Option<frontmatter::FrontMatter>) -> EngineResult<TemplateData> {
        let (root_body, end) = self.parse_nodes(None, &[])?;
        debug_assert!(matches!(end, BodyEnd::Eof));

        let inherits = validate_extends(&root_body)?;

        let mut declared_blocks = BTreeMap::new();
        collect_blocks(&root_body, &mut declared_blocks)?;

        Ok(TemplateData {
            source: self.source.to_owned(),
            front_matter,
            root_body,
            inherits,
            declared_blocks,
        })
    }

    fn parse_nodes(
        &mut self,
        enclosing: Option<&OpenFrame>,
        stops: &[&str],
    ) -> EngineResult<(Vec<Node>, BodyEnd)> {
        let mut nodes = vec![];

        loop {
            let token = self.peek().clone();

            match token.kind {
                TokenKind::Eof => {
                    let Some(frame) = enclosing else {
                        return Ok((nodes, BodyEnd::Eof));
                    };
                    return Err(EngineError::at(
                        ErrorKind::ParseStructural,
                        format!("block '{}' is never closed", frame.tag_name),
                        frame.position,
                    ));
                }
                TokenKind::Text => {
                    self.next();
                    let end = self.peek().position.offset;
                    nodes.push(
                        Text {
                            content: token.value,
                            position: token.position,
                            span: token.position.offset..end,
                        }
                        .into(),
                    );
                }
                TokenKind::OpenTagDelim => {
                    let name = self.lookahead_tag_name();
                    if stops.contains(&name.as_str()) {
                        return Ok((nodes, BodyEnd::Sibling { name }));
                    }
                    nodes.push(self.parse_tag()?);
                }
                TokenKind::BlockCloseDelim => {
                    let name = self.lookahead_tag_name();

                    let Some(frame) = enclosing else {
                        return Err(EngineError::at(
                            ErrorKind::ParseStructural,
                            format!("unexpected closing tag '{name}'"),
                            token.position,
                        ));
                    };

                    if frame.tag_name != name {
                        return Err(EngineError::at(
                            ErrorKind::ParseStructural,
                            format!(
                                "closing tag '{name}' does not match open block '{}'",
                                frame.tag_name
                            ),
                            frame.position,
                        ));
                    }

                    self.next();
                    self.next();
                    let close = self.expect(TokenKind::CloseTagDelim)?;
                    let end = close.position.offset + close.value.len();
                    return Ok((nodes, BodyEnd::Close { end }));
                }
                _ => {
                    return Err(EngineError::at(
                        ErrorKind::ParseStructural,
                        format!("unexpected token '{}'", token.value),
                        token.position,
                    ))
                }
            }
        }
    }

    fn parse_tag(&mut self) -> EngineResult<Node> {
        let header = self.parse_tag_header()?;

        match header.name.as_str() {
            "prompty.var" => self.build_variable(header),
            "prompty.extends" => self.build_extends(header),
            "prompty.parent" => self.build_parent(header),
            "prompty.include" => self.build_include(header),
            "prompty.raw" => self.parse_raw(header),
            "prompty.comment" => self.parse_comment(header),
            "prompty.block" => self.parse_block(header),
            "prompty.if" => self.parse_if(header),
            "prompty.for" => self.parse_for(header),
            "prompty.switch" => self.parse_switch(header),
            "prompty.message" => self.parse_message(header),
            "prompty.elseif" | "prompty.else" => Err(EngineError::at(
                ErrorKind::ParseStructural,
                format!("'{}' is only valid inside prompty.if", header.name),
                header.position,
            )),
            "prompty.case" | "prompty.casedefault" => Err(EngineError::at(
                ErrorKind::ParseStructural,
                format!("'{}' is only valid inside prompty.switch", header.name),
                header.position,
            )),
            _ => self.parse_resolver_call(header),
        }
    }

    /// Consume `open_delim name (attr = "value")*` and the tag-ending
    /// delimiter.
    fn parse_tag_header(&mut self) -> EngineResult<TagHeader> {
        let open = self.expect(TokenKind::OpenTagDelim)?;
        let name = self.expect(TokenKind::TagName)?;

        let mut attributes = Attributes::new();
        loop {
            match self.peek().kind {
                TokenKind::AttributeName => {
                    let attr_name = self.next();
                    self.expect(TokenKind::Equals)?;
                    let attr_value = self.expect(TokenKind::AttributeValue)?;

                    if !attributes.insert(&attr_name.value, &attr_value.value, attr_value.position)
                    {
                        return Err(EngineError::at(
                            ErrorKind::ParseStructural,
                            format!("duplicate attribute '{}'", attr_name.value),
                            attr_name.position,
                        ));
                    }
                }
                TokenKind::SelfCloseDelim => {
                    let close = self.next();
                    return Ok(TagHeader {
                        name: name.value,
                        attributes,
                        position: open.position,
                        start: open.position.offset,
                        end: close.position.offset + close.value.len(),
                        self_closing: true,
                    });
                }
                TokenKind::CloseTagDelim => {
                    let close = self.next();
                    return Ok(TagHeader {
                        name: name.value,
                        attributes,
                        position: open.position,
                        start: open.position.offset,
                        end: close.position.offset + close.value.len(),
                        self_closing: false,
                    });
                }
                _ => {
                    let token = self.peek().clone();
                    return Err(EngineError::at(
                        ErrorKind::ParseStructural,
                        format!("unexpected token '{}' in tag '{}'", token.value, name.value),
                        token.position,
                    ));
                }
            }
        }
    }

    fn build_variable(&mut self, header: TagHeader) -> EngineResult<Node> {
        self.require_self_closing(&header)?;

        Ok(Variable {
            name: header.attributes.get("name").unwrap_or_default().to_owned(),
            default: header.attributes.get("default").map(str::to_owned),
            on_error: header.attributes.get("on_error").map(str::to_owned),
            position: header.position,
            span: header.start..header.end,
        }
        .into())
    }

    fn build_extends(&mut self, header: TagHeader) -> EngineResult<Node> {
        self.require_self_closing(&header)?;

        Ok(Extends {
            parent: header
                .attributes
                .get("template")
                .unwrap_or_default()
                .to_owned(),
            position: header.position,
            span: header.start..header.end,
        }
        .into())
    }

    fn build_parent(&mut self, header: TagHeader) -> EngineResult<Node> {
        self.require_self_closing(&header)?;

        Ok(ParentCall {
            position: header.position,
            span: header.start..header.end,
        }
        .into())
    }

    fn build_include(&mut self, header: TagHeader) -> EngineResult<Node> {
        self.require_self_closing(&header)?;

        let mut bindings = vec![];
        for attribute in header.attributes.iter() {
            if RESERVED_INCLUDE_ATTRS.contains(&attribute.name.as_str()) {
                continue;
            }

            let expression = parse_expression(&attribute.value)
                .map_err(|error| error.with_position(attribute.position))?;
            bindings.push(Binding {
                name: attribute.name.clone(),
                expression,
                position: attribute.position,
            });
        }

        Ok(Include {
            template_name: header
                .attributes
                .get("template")
                .unwrap_or_default()
                .to_owned(),
            bindings,
            with_path: header.attributes.get("with").map(str::to_owned),
            isolate: header.attributes.get("isolate") == Some("true"),
            attributes: header.attributes,
            position: header.position,
            span: header.start..header.end,
        }
        .into())
    }

    fn parse_raw(&mut self, header: TagHeader) -> EngineResult<Node> {
        if header.self_closing {
            return Err(EngineError::at(
                ErrorKind::ParseStructural,
                "raw blocks require a body",
                header.position,
            ));
        }

        // The lexer emits the raw body as a single literal text token.
        let content = if self.peek().kind == TokenKind::Text {
            self.next().value
        } else {
            String::new()
        };

        let frame = self.frame(&header);
        let end = self.consume_block_close(&frame)?;

        Ok(RawBlock {
            content,
            position: header.position,
            span: header.start..end,
        }
        .into())
    }

    fn parse_comment(&mut self, header: TagHeader) -> EngineResult<Node> {
        if header.self_closing {
            return Ok(CommentBlock {
                body: vec![],
                position: header.position,
                span: header.start..header.end,
            }
            .into());
        }

        let frame = self.frame(&header);
        let (body, end) = self.parse_nodes(Some(&frame), &[])?;
        let end = self.expect_close(end, &frame)?;

        Ok(CommentBlock {
            body,
            position: header.position,
            span: header.start..end,
        }
        .into())
    }

    fn parse_block(&mut self, header: TagHeader) -> EngineResult<Node> {
        let Some(name) = header.attributes.get("name").map(str::to_owned) else {
            return Err(EngineError::at(
                ErrorKind::ParseStructural,
                "blocks require a 'name' attribute",
                header.position,
            ));
        };

        if header.self_closing {
            return Ok(BlockDef {
                name,
                body: vec![],
                position: header.position,
                span: header.start..header.end,
            }
            .into());
        }

        let frame = self.frame(&header);
        let (body, end) = self.parse_nodes(Some(&frame), &[])?;
        let end = self.expect_close(end, &frame)?;

        Ok(BlockDef {
            name,
            body,
            position: header.position,
            span: header.start..end,
        }
        .into())
    }

    fn parse_if(&mut self, header: TagHeader) -> EngineResult<Node> {
        self.require_block(&header)?;
        let frame = self.frame(&header);

        let mut condition = self.expression_attr(&header, "eval")?;
        let mut condition_position = header.position;
        let mut branches = vec![];

        loop {
            let (body, end) = self.parse_nodes(Some(&frame), &["prompty.elseif", "prompty.else"])?;
            branches.push(IfBranch {
                condition,
                body,
                position: condition_position,
            });

            match end {
                BodyEnd::Close { end } => {
                    return Ok(IfBlock {
                        branches,
                        else_body: None,
                        position: header.position,
                        span: header.start..end,
                    }
                    .into());
                }
                BodyEnd::Sibling { name } if name == "prompty.elseif" => {
                    let sibling = self.parse_tag_header()?;
                    self.require_block(&sibling)?;
                    condition = self.expression_attr(&sibling, "eval")?;
                    condition_position = sibling.position;
                }
                BodyEnd::Sibling { .. } => {
                    let sibling = self.parse_tag_header()?;
                    self.require_block(&sibling)?;
                    let (else_body, end) = self.parse_nodes(Some(&frame), &[])?;
                    let end = self.expect_close(end, &frame)?;

                    return Ok(IfBlock {
                        branches,
                        else_body: Some(else_body),
                        position: header.position,
                        span: header.start..end,
                    }
                    .into());
                }
                BodyEnd::Eof => unreachable!("parse_nodes errors on EOF inside a block"),
            }
        }
    }

    fn parse_for(&mut self, header: TagHeader) -> EngineResult<Node> {
        self.require_block(&header)?;

        let limit = match header.attributes.attribute("limit") {
            Some(attribute) => Some(attribute.value.parse::<usize>().map_err(|_| {
                EngineError::at(
                    ErrorKind::ParseStructural,
                    format!("'limit' must be a non-negative integer, found '{}'", attribute.value),
                    attribute.position,
                )
            })?),
            None => None,
        };

        let collection = self.expression_attr(&header, "in")?;
        let frame = self.frame(&header);
        let (body, end) = self.parse_nodes(Some(&frame), &[])?;
        let end = self.expect_close(end, &frame)?;

        Ok(ForBlock {
            item: header.attributes.get("item").unwrap_or_default().to_owned(),
            index: header.attributes.get("index").map(str::to_owned),
            collection,
            limit,
            body,
            position: header.position,
            span: header.start..end,
        }
        .into())
    }

    fn parse_switch(&mut self, header: TagHeader) -> EngineResult<Node> {
        self.require_block(&header)?;
        let frame = self.frame(&header);

        let scrutinee = self.expression_attr(&header, "eval")?;
        let mut cases = vec![];
        let mut default_body: Option<Vec<Node>> = None;

        loop {
            let (lead, end) =
                self.parse_nodes(Some(&frame), &["prompty.case", "prompty.casedefault"])?;

            // Between cases only whitespace is tolerated.
            if let Some(stray) = lead
                .iter()
                .find(|node| !matches!(node, Node::Text(text) if text.is_whitespace()))
            {
                return Err(EngineError::at(
                    ErrorKind::ParseStructural,
                    "only case tags may appear directly inside a switch",
                    stray.position(),
                ));
            }

            match end {
                BodyEnd::Close { end } => {
                    return Ok(SwitchBlock {
                        scrutinee,
                        cases,
                        default_body,
                        position: header.position,
                        span: header.start..end,
                    }
                    .into());
                }
                BodyEnd::Sibling { name } => {
                    let sibling = self.parse_tag_header()?;
                    self.require_block(&sibling)?;

                    if default_body.is_some() {
                        return Err(EngineError::at(
                            ErrorKind::ParseStructural,
                            "casedefault must be the last case of a switch",
                            sibling.position,
                        ));
                    }

                    let case_frame = self.frame(&sibling);
                    let (body, case_end) = self.parse_nodes(Some(&case_frame), &[])?;
                    self.expect_close(case_end, &case_frame)?;

                    if name == "prompty.casedefault" {
                        default_body = Some(body);
                    } else {
                        let test = if let Some(value) = sibling.attributes.get("value") {
                            CaseTest::Literal(value.to_owned())
                        } else if sibling.attributes.has("eval") {
                            CaseTest::Condition(self.expression_attr(&sibling, "eval")?)
                        } else {
                            return Err(EngineError::at(
                                ErrorKind::ParseStructural,
                                "case requires a 'value' or 'eval' attribute",
                                sibling.position,
                            ));
                        };

                        cases.push(SwitchCase {
                            test,
                            body,
                            position: sibling.position,
                        });
                    }
                }
                BodyEnd::Eof => unreachable!("parse_nodes errors on EOF inside a block"),
            }
        }
    }

    fn parse_message(&mut self, header: TagHeader) -> EngineResult<Node> {
        self.require_block(&header)?;
        let frame = self.frame(&header);

        let (body, end) = self.parse_nodes(Some(&frame), &[])?;
        let end = self.expect_close(end, &frame)?;

        Ok(MessageBlock {
            role: header.attributes.get("role").unwrap_or_default().to_owned(),
            cache: header.attributes.get("cache") == Some("true"),
            body,
            position: header.position,
            span: header.start..end,
        }
        .into())
    }

    fn parse_resolver_call(&mut self, header: TagHeader) -> EngineResult<Node> {
        if header.self_closing {
            return Ok(ResolverCall {
                tag_name: header.name,
                attributes: header.attributes,
                body: None,
                position: header.position,
                span: header.start..header.end,
            }
            .into());
        }

        let frame = self.frame(&header);
        let (body, end) = self.parse_nodes(Some(&frame), &[])?;
        let end = self.expect_close(end, &frame)?;

        Ok(ResolverCall {
            tag_name: header.name,
            attributes: header.attributes,
            body: Some(body),
            position: header.position,
            span: header.start..end,
        }
        .into())
    }

    /// Parse the expression held by an attribute; a missing attribute parses
    /// as a nil literal so the validator can report it without the parser
    /// rejecting the document.
    fn expression_attr(&self, header: &TagHeader, name: &str) -> EngineResult<Expr> {
        let Some(attribute) = header.attributes.attribute(name) else {
            return Ok(Expr::nil());
        };

        parse_expression(&attribute.value)
            .map_err(|error| error.with_position(attribute.position))
    }

    fn require_self_closing(&self, header: &TagHeader) -> EngineResult<()> {
        if !header.self_closing {
            return Err(EngineError::at(
                ErrorKind::ParseStructural,
                format!("tag '{}' must be self-closing", header.name),
                header.position,
            ));
        }
        Ok(())
    }

    fn require_block(&self, header: &TagHeader) -> EngineResult<()> {
        if header.self_closing {
            return Err(EngineError::at(
                ErrorKind::ParseStructural,
                format!("tag '{}' cannot be self-closing", header.name),
                header.position,
            ));
        }
        Ok(())
    }

    fn frame(&self, header: &TagHeader) -> OpenFrame {
        OpenFrame {
            tag_name: header.name.clone(),
            position: header.position,
        }
    }

    /// Consume `{~/name ~}` for an already-known frame.
    fn consume_block_close(&mut self, frame: &OpenFrame) -> EngineResult<usize> {
        let token = self.peek().clone();
        if token.kind != TokenKind::BlockCloseDelim {
            return Err(EngineError::at(
                ErrorKind::ParseStructural,
                format!("block '{}' is never closed", frame.tag_name),
                frame.position,
            ));
        }

        let name = self.lookahead_tag_name();
        if name != frame.tag_name {
            return Err(EngineError::at(
                ErrorKind::ParseStructural,
                format!(
                    "closing tag '{name}' does not match open block '{}'",
                    frame.tag_name
                ),
                frame.position,
            ));
        }

        self.next();
        self.next();
        let close = self.expect(TokenKind::CloseTagDelim)?;
        Ok(close.position.offset + close.value.len())
    }

    fn expect_close(&self, end: BodyEnd, frame: &OpenFrame) -> EngineResult<usize> {
        match end {
            BodyEnd::Close { end } => Ok(end),
            _ => Err(EngineError::at(
                ErrorKind::ParseStructural,
                format!("block '{}' is never closed", frame.tag_name),
                frame.position,
            )),
        }
    }

    /// The tag name following the delimiter at the current index.
    fn lookahead_tag_name(&self) -> String {
        self.tokens
            .get(self.index + 1)
            .filter(|token| token.kind == TokenKind::TagName)
            .map(|token| token.value.clone())
            .unwrap_or_default()
    }

    fn peek(&self) -> &Token {
        // The token stream always ends in EOF, so the index stays in bounds.
        &self.tokens[self.index.min(self.tokens.len() - 1)]
    }

    fn next(&mut self) -> Token {
        let token = self.peek().clone();
        if self.index < self.tokens.len() - 1 {
            self.index += 1;
        }
        token
    }

    fn expect(&mut self, kind: TokenKind) -> EngineResult<Token> {
        let token = self.next();
        if token.kind != kind {
            return Err(EngineError::at(
                ErrorKind::ParseStructural,
                format!("unexpected token '{}'", token.value),
                token.position,
            ));
        }
        Ok(token)
    }
}

/// Enforce the extends rules: at most one `prompty.extends`, nothing
/// output-producing before it, and nothing output-producing outside of blocks
/// in an extending template.
fn validate_extends(root_body: &[Node]) -> EngineResult<Option<String>> {
    let mut extends: Option<&Extends> = None;

    for node in root_body {
        if let Node::Extends(marker) = node {
            if extends.is_some() {
                return Err(EngineError::at(
                    ErrorKind::ParseStructural,
                    "a template can extend at most one parent",
                    marker.position,
                ));
            }
            extends = Some(marker);
        }
    }

    let Some(marker) = extends else {
        return Ok(None);
    };

    for node in root_body {
        match node {
            Node::Extends(_) | Node::Block(_) => {}
            node if node.produces_output() => {
                return Err(EngineError::at(
                    ErrorKind::ParseStructural,
                    "an extending template may only produce output inside blocks",
                    node.position(),
                ));
            }
            _ => {}
        }
    }

    Ok(Some(marker.parent.clone()))
}

/// Collect every block declared in the tree, rejecting duplicate names.
fn collect_blocks(
    nodes: &[Node],
    blocks: &mut BTreeMap<String, BlockDef>,
) -> EngineResult<()> {
    for node in nodes {
        match node {
            Node::Block(block) => {
                if blocks.contains_key(&block.name) {
                    return Err(EngineError::at(
                        ErrorKind::ParseStructural,
                        format!("duplicate block '{}'", block.name),
                        block.position,
                    ));
                }
                blocks.insert(block.name.clone(), block.clone());
                collect_blocks(&block.body, blocks)?;
            }
            Node::Comment(comment) => collect_blocks(&comment.body, blocks)?,
            Node::If(conditional) => {
                for branch in &conditional.branches {
                    collect_blocks(&branch.body, blocks)?;
                }
                if let Some(else_body) = &conditional.else_body {
                    collect_blocks(else_body, blocks)?;
                }
            }
            Node::For(for_loop) => collect_blocks(&for_loop.body, blocks)?,
            Node::Switch(switch) => {
                for case in &switch.cases {
                    collect_blocks(&case.body, blocks)?;
                }
                if let Some(default_body) = &switch.default_body {
                    collect_blocks(default_body, blocks)?;
                }
            }
            Node::Message(message) => collect_blocks(&message.body, blocks)?,
            Node::ResolverCall(call) => {
                if let Some(body) = &call.body {
                    collect_blocks(body, blocks)?;
                }
            }
            _ => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> EngineResult<TemplateData> {
        parse_source(source, "{~", "~}")
    }

    #[test]
    fn test_text_and_variable() {
        let template = parse(r#"Hello, {~prompty.var name="u" /~}!"#).expect("should parse");

        assert_eq!(3, template.root_body.len());
        assert!(matches!(
            &template.root_body[0],
            Node::Text(text) if text.content == "Hello, "
        ));
        assert!(matches!(
            &template.root_body[1],
            Node::Variable(variable) if variable.name == "u"
        ));
        assert!(matches!(
            &template.root_body[2],
            Node::Text(text) if text.content == "!"
        ));
    }

    #[test]
    fn test_variable_span_covers_tag() {
        let source = r#"ab{~prompty.var name="u" /~}cd"#;
        let template = parse(source).expect("should parse");

        let span = template.root_body[1].span();
        assert_eq!(r#"{~prompty.var name="u" /~}"#, &source[span]);
    }

    #[test]
    fn test_if_elseif_else() {
        let template = parse(
            r#"{~prompty.if eval="a"~}A{~prompty.elseif eval="b"~}B{~prompty.else~}C{~/prompty.if~}"#,
        )
        .expect("should parse");

        let Node::If(conditional) = &template.root_body[0] else {
            panic!("expected an if node");
        };
        assert_eq!(2, conditional.branches.len());
        assert!(conditional.else_body.is_some());
    }

    #[test]
    fn test_mismatched_close() {
        let error = parse(r#"{~prompty.if eval="a"~}A{~/prompty.for~}"#).expect_err("should fail");

        assert_eq!(ErrorKind::ParseStructural, error.kind);
        assert!(error.message.contains("does not match"));
        // Structural errors point at the opener.
        assert_eq!(Some(Position::new(0, 1, 1)), error.position);
    }

    #[test]
    fn test_unclosed_block() {
        let error = parse(r#"{~prompty.for item="x" in="xs"~}body"#).expect_err("should fail");

        assert_eq!(ErrorKind::ParseStructural, error.kind);
        assert!(error.message.contains("never closed"));
    }

    #[test]
    fn test_unexpected_close_at_top_level() {
        let error = parse("{~/prompty.if~}").expect_err("should fail");

        assert_eq!(ErrorKind::ParseStructural, error.kind);
        assert!(error.message.contains("unexpected closing tag"));
    }

    #[test]
    fn test_switch_shape() {
        let template = parse(
            r#"{~prompty.switch eval="day"~} {~prompty.case value="mon"~}M{~/prompty.case~} {~prompty.casedefault~}?{~/prompty.casedefault~} {~/prompty.switch~}"#,
        )
        .expect("should parse");

        let Node::Switch(switch) = &template.root_body[0] else {
            panic!("expected a switch node");
        };
        assert_eq!(1, switch.cases.len());
        assert!(switch.default_body.is_some());
    }

    #[test]
    fn test_switch_rejects_stray_content() {
        let error = parse(r#"{~prompty.switch eval="x"~}stray{~/prompty.switch~}"#)
            .expect_err("should fail");

        assert_eq!(ErrorKind::ParseStructural, error.kind);
        assert!(error.message.contains("case tags"));
    }

    #[test]
    fn test_switch_rejects_case_after_default() {
        let error = parse(
            r#"{~prompty.switch eval="x"~}{~prompty.casedefault~}d{~/prompty.casedefault~}{~prompty.case value="y"~}c{~/prompty.case~}{~/prompty.switch~}"#,
        )
        .expect_err("should fail");

        assert!(error.message.contains("last case"));
    }

    #[test]
    fn test_switch_rejects_duplicate_default() {
        let error = parse(
            r#"{~prompty.switch eval="x"~}{~prompty.casedefault~}a{~/prompty.casedefault~}{~prompty.casedefault~}b{~/prompty.casedefault~}{~/prompty.switch~}"#,
        )
        .expect_err("should fail");

        assert!(error.message.contains("last case"));
    }

    #[test]
    fn test_raw_block_keeps_tags_literal() {
        let template = parse(r#"{~prompty.raw~}{~prompty.var name="x" /~}{~/prompty.raw~}"#)
            .expect("should parse");

        let Node::Raw(raw) = &template.root_body[0] else {
            panic!("expected a raw node");
        };
        assert_eq!(r#"{~prompty.var name="x" /~}"#, raw.content);
    }

    #[test]
    fn test_unknown_tag_becomes_resolver_call() {
        let template =
            parse(r#"{~widget kind="card" /~}{~wrapper~}inner{~/wrapper~}"#).expect("should parse");

        let Node::ResolverCall(leaf) = &template.root_body[0] else {
            panic!("expected a resolver call");
        };
        assert_eq!("widget", leaf.tag_name);
        assert!(leaf.body.is_none());

        let Node::ResolverCall(block) = &template.root_body[1] else {
            panic!("expected a resolver call");
        };
        assert!(block.body.is_some());
    }

    #[test]
    fn test_extends_collects_blocks() {
        let template = parse(
            r#"{~prompty.extends template="base" /~} {~prompty.block name="header"~}H{~/prompty.block~}"#,
        )
        .expect("should parse");

        assert_eq!(Some("base".to_owned()), template.inherits);
        assert!(template.declared_blocks.contains_key("header"));
    }

    #[test]
    fn test_extends_rejects_output_outside_blocks() {
        let error = parse(r#"{~prompty.extends template="base" /~}stray text"#)
            .expect_err("should fail");

        assert_eq!(ErrorKind::ParseStructural, error.kind);
        assert!(error.message.contains("inside blocks"));
    }

    #[test]
    fn test_extends_rejects_double_extends() {
        let error = parse(
            r#"{~prompty.extends template="a" /~}{~prompty.extends template="b" /~}"#,
        )
        .expect_err("should fail");

        assert!(error.message.contains("at most one parent"));
    }

    #[test]
    fn test_duplicate_block_names_rejected() {
        let error = parse(
            r#"{~prompty.block name="x"~}a{~/prompty.block~}{~prompty.block name="x"~}b{~/prompty.block~}"#,
        )
        .expect_err("should fail");

        assert!(error.message.contains("duplicate block"));
    }

    #[test]
    fn test_include_bindings_are_expressions() {
        let template = parse(
            r#"{~prompty.include template="sub" with="user" greeting="\"hi\"" count="n" /~}"#,
        )
        .expect("should parse");

        let Node::Include(include) = &template.root_body[0] else {
            panic!("expected an include node");
        };
        assert_eq!("sub", include.template_name);
        assert_eq!(Some("user".to_owned()), include.with_path);
        assert_eq!(2, include.bindings.len());
        assert_eq!("greeting", include.bindings[0].name);
    }

    #[test]
    fn test_bad_expression_reports_attr_position() {
        let error = parse(r#"{~prompty.if eval="a &&"~}x{~/prompty.if~}"#).expect_err("should fail");

        assert_eq!(ErrorKind::ExprParse, error.kind);
        assert!(error.position.is_some());
    }

    #[test]
    fn test_front_matter_is_split_off() {
        let template = parse("---\nname: greeting\n---\nHello").expect("should parse");

        assert!(template.front_matter.is_some());
        assert!(matches!(
            &template.root_body[0],
            Node::Text(text) if text.content == "Hello"
        ));
    }

    #[test]
    fn test_comment_body_is_parsed() {
        let template = parse(
            r#"{~prompty.comment~}note {~prompty.var name="x" /~}{~/prompty.comment~}after"#,
        )
        .expect("should parse");

        let Node::Comment(comment) = &template.root_body[0] else {
            panic!("expected a comment node");
        };
        assert_eq!(2, comment.body.len());
    }

    #[test]
    fn test_elseif_outside_if_fails() {
        let error = parse(r#"{~prompty.elseif eval="x"~}"#).expect_err("should fail");

        assert!(error.message.contains("only valid inside"));
    }

    #[test]
    fn test_parse_determinism() {
        let source =
            r#"{~prompty.for item="n" in="xs"~}{~prompty.var name="n" /~};{~/prompty.for~}"#;

        assert_eq!(parse(source), parse(source));
    }
}
