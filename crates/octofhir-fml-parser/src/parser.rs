//! Recursive descent parser for mapping documents

use crate::ParseOptions;
use crate::lexer::{Lexer, Token};
use log::trace;
use octofhir_fml_ast::{
    Cardinality, ConceptMap, ConceptMapPrefix, ConceptMapping, ConceptRelationship, Constant,
    DependentInvocation, Expression, Group, GroupParameter, Literal, MappingDefinition,
    Parameter, ParameterMode, Rule, RuleSource, RuleTarget, SourceListMode, StructureDeclaration,
    StructureMode, TargetListMode, Transform, TransformBuildError, TypeMode, transform_arity,
};
use octofhir_fml_diagnostics::{
    FmlError, LineIndex, ParseError, ParseErrorKind, Result, SourceLocation, Span, Spanned,
};
use std::collections::VecDeque;
use std::sync::Arc;

fn is_doc(token: &Spanned<Token>) -> bool {
    matches!(token.inner, Token::DocComment(_))
}

/// Token cursor with unbounded lookahead.
///
/// Documentation comments stay in the buffer so that [`Parser::take_docs`]
/// can claim them for the next group or rule; every other lookup skips them.
pub struct Parser<'a> {
    source: &'a str,
    lexer: Lexer<'a>,
    lines: Arc<LineIndex>,
    lookahead: VecDeque<Spanned<Token>>,
    exhausted: bool,
    depth: usize,
    max_depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str, options: &ParseOptions) -> Self {
        let lexer = Lexer::new(source);
        let lines = lexer.line_index();
        Self {
            source,
            lexer,
            lines,
            lookahead: VecDeque::new(),
            exhausted: false,
            depth: 0,
            max_depth: options.max_nesting_depth,
        }
    }

    // === Cursor ===

    fn fill(&mut self) -> Result<bool> {
        if self.exhausted {
            return Ok(false);
        }
        match self.lexer.next_token()? {
            Some(token) => {
                trace!("token {} at {}", token.inner, token.span);
                self.lookahead.push_back(token);
                Ok(true)
            }
            None => {
                self.exhausted = true;
                Ok(false)
            }
        }
    }

    fn ensure(&mut self, n: usize) -> Result<()> {
        while self.lookahead.iter().filter(|t| !is_doc(t)).count() <= n {
            if !self.fill()? {
                break;
            }
        }
        Ok(())
    }

    pub fn peek_nth(&mut self, n: usize) -> Result<Option<&Spanned<Token>>> {
        self.ensure(n)?;
        Ok(self.lookahead.iter().filter(|t| !is_doc(t)).nth(n))
    }

    pub fn peek(&mut self) -> Result<Option<&Spanned<Token>>> {
        self.peek_nth(0)
    }

    pub fn peek_token(&mut self) -> Result<Option<Token>> {
        Ok(self.peek()?.map(|t| t.inner.clone()))
    }

    pub fn check(&mut self, token: &Token) -> Result<bool> {
        Ok(self.peek()?.is_some_and(|t| t.inner == *token))
    }

    pub fn check_nth(&mut self, n: usize, token: &Token) -> Result<bool> {
        Ok(self.peek_nth(n)?.is_some_and(|t| t.inner == *token))
    }

    fn check_keyword(&mut self, word: &str) -> Result<bool> {
        Ok(self.peek()?.is_some_and(|t| t.is_keyword(word)))
    }

    /// Text of the next token if it is a plain identifier
    fn peek_word(&mut self) -> Result<Option<String>> {
        Ok(self.peek()?.and_then(|t| match &t.inner {
            Token::Identifier(word) => Some(word.clone()),
            _ => None,
        }))
    }

    /// Consume the next significant token, dropping any documentation before it
    pub fn advance(&mut self, expected: &str) -> Result<Spanned<Token>> {
        self.ensure(0)?;
        while let Some(token) = self.lookahead.pop_front() {
            if !is_doc(&token) {
                return Ok(token);
            }
        }
        Err(self.end_error(expected))
    }

    pub fn eat(&mut self, token: &Token) -> Result<bool> {
        if self.check(token)? {
            self.advance("")?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn eat_keyword(&mut self, word: &str) -> Result<Option<Span>> {
        if self.check_keyword(word)? {
            Ok(Some(self.advance(word)?.span))
        } else {
            Ok(None)
        }
    }

    pub fn expect(&mut self, token: Token, expected: &str) -> Result<Span> {
        if self.check(&token)? {
            Ok(self.advance(expected)?.span)
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn expect_keyword(&mut self, word: &str) -> Result<Span> {
        match self.eat_keyword(word)? {
            Some(span) => Ok(span),
            None => Err(self.unexpected(&format!("'{word}'"))),
        }
    }

    pub fn expect_end(&mut self) -> Result<()> {
        match self.peek()? {
            None => Ok(()),
            Some(_) => Err(self.unexpected("end of input")),
        }
    }

    /// Collect documentation comments ahead of the next significant token
    fn take_docs(&mut self) -> Result<Option<String>> {
        self.ensure(0)?;
        let mut lines = Vec::new();
        while let Some(Token::DocComment(_)) = self.lookahead.front().map(|t| &t.inner) {
            if let Some(Spanned {
                inner: Token::DocComment(text),
                ..
            }) = self.lookahead.pop_front()
            {
                lines.push(text);
            }
        }
        Ok((!lines.is_empty()).then(|| lines.join("\n")))
    }

    // === Errors ===

    pub fn location(&self, span: Span) -> SourceLocation {
        self.lines.location(self.source, span)
    }

    fn end_error(&self, expected: &str) -> FmlError {
        let location = self.location(Span::point(self.source.len()));
        ParseError::unexpected_end(expected, location).into()
    }

    /// Error for whatever token is next, or for the end of input
    pub fn unexpected(&mut self, expected: &str) -> FmlError {
        match self.peek() {
            Ok(Some(token)) => {
                let (found, span) = (token.inner.to_string(), token.span);
                ParseError::unexpected_token(found, expected, self.location(span)).into()
            }
            Ok(None) => self.end_error(expected),
            Err(e) => e,
        }
    }

    pub fn descend(&mut self, span: Span) -> Result<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(ParseError::new(
                ParseErrorKind::NestingTooDeep,
                format!("Nesting exceeds the maximum depth of {}", self.max_depth),
                self.location(span),
            )
            .into());
        }
        Ok(())
    }

    pub fn ascend(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    // === Terminals ===

    /// An identifier in plain or delimited form
    pub fn name(&mut self, what: &str) -> Result<Spanned<String>> {
        let found = self
            .peek()?
            .and_then(|t| t.as_name().map(|n| (n.to_string(), t.span)));
        match found {
            Some((name, span)) => {
                self.advance(what)?;
                Ok(Spanned::new(name, span))
            }
            None => Err(self.unexpected(what)),
        }
    }

    /// A URL, written as a string or a delimited identifier
    fn url(&mut self) -> Result<String> {
        match self.peek_token()? {
            Some(Token::String(url) | Token::DelimitedIdentifier(url)) => {
                self.advance("url")?;
                Ok(url)
            }
            _ => Err(self.unexpected("quoted url")),
        }
    }

    /// A literal, with an optional leading `-` on numbers
    pub fn literal(&mut self) -> Result<Option<Literal>> {
        let negative = self.check(&Token::Minus)?
            && self
                .peek_nth(1)?
                .is_some_and(|t| matches!(t.inner, Token::Integer(_) | Token::Decimal(_)));
        if negative {
            self.advance("number")?;
        }
        let literal = match self.peek_token()? {
            Some(Token::String(s)) => Literal::String(s),
            Some(Token::Integer(i)) => Literal::Integer(if negative { -i } else { i }),
            Some(Token::Decimal(d)) => Literal::Decimal(if negative { -d } else { d }),
            Some(Token::Boolean(b)) => Literal::Boolean(b),
            Some(Token::Date(s)) => Literal::Date(s),
            Some(Token::DateTime(s)) => Literal::DateTime(s),
            Some(Token::Time(s)) => Literal::Time(s),
            _ => return Ok(None),
        };
        self.advance("literal")?;
        Ok(Some(literal))
    }

    fn small_integer(&mut self, what: &str) -> Result<u32> {
        let found = self.peek()?.and_then(|t| match t.inner {
            Token::Integer(i) => Some((i, t.span)),
            _ => None,
        });
        match found {
            Some((value, span)) => {
                self.advance(what)?;
                u32::try_from(value).map_err(|_| {
                    ParseError::unexpected_token(format!("number {value}"), what, self.location(span))
                        .into()
                })
            }
            None => Err(self.unexpected(what)),
        }
    }

    // === Document ===

    pub fn mapping_definition(&mut self) -> Result<MappingDefinition> {
        let mut map = MappingDefinition::new();
        let mut pending_docs = self.header(&mut map)?;

        loop {
            let docs = join_docs(pending_docs.take(), self.take_docs()?);
            let Some(token) = self.peek_token()? else {
                break;
            };
            let Token::Identifier(word) = token else {
                return Err(self.unexpected("declaration or 'group'"));
            };
            match word.as_str() {
                "map" => self.map_declaration(&mut map)?,
                "uses" => {
                    let structure = self.uses()?;
                    map.structures.push(structure);
                }
                "imports" => {
                    self.advance("imports")?;
                    let url = self.url()?;
                    map.imports.push(url);
                }
                "let" => {
                    let constant = self.constant()?;
                    if map.constant(&constant.inner.name).is_some() {
                        return Err(self.duplicate("constant", &constant.inner.name, constant.span));
                    }
                    map.constants.push(constant.inner);
                }
                "conceptmap" => {
                    let concept_map = self.concept_map()?;
                    if map.concept_map(&concept_map.inner.name).is_some() {
                        return Err(self.duplicate(
                            "concept map",
                            &concept_map.inner.name,
                            concept_map.span,
                        ));
                    }
                    map.concept_maps.push(concept_map.inner);
                }
                "group" => {
                    let group = self.group(docs)?;
                    if map.group(&group.inner.name).is_some() {
                        return Err(self.duplicate("group", &group.inner.name, group.span));
                    }
                    map.groups.push(group.inner);
                }
                _ => return Err(self.unexpected("declaration or 'group'")),
            }
        }

        if map.groups.is_empty() {
            return Err(self.end_error("'group'"));
        }
        Ok(map)
    }

    fn duplicate(&self, what: &str, name: &str, span: Span) -> FmlError {
        ParseError::duplicate_name(what, name, self.location(span)).into()
    }

    /// The first run of documentation lines is the header unless it sits
    /// directly on a `group`. Its leading `key = value` lines become metadata
    /// and the remaining lines start the documentation of the first group.
    fn header(&mut self, map: &mut MappingDefinition) -> Result<Option<String>> {
        self.ensure(0)?;
        let mut run = 0;
        let mut end = None;
        for token in &self.lookahead {
            let continues = match end {
                None => true,
                Some(previous) => !self.blank_line_between(previous, token.span.start),
            };
            if !is_doc(token) || !continues {
                break;
            }
            run += 1;
            end = Some(token.span.end);
        }
        let Some(end) = end else {
            return Ok(None);
        };
        let attached = self.lookahead.get(run).is_some_and(|next| {
            next.inner.is_keyword("group") && !self.blank_line_between(end, next.span.start)
        });
        if attached {
            return Ok(None);
        }

        let mut rest: Vec<String> = Vec::new();
        for token in self.lookahead.drain(..run) {
            let Token::DocComment(line) = token.inner else {
                continue;
            };
            match split_metadata(&line) {
                Some((key, value)) if rest.is_empty() => map.metadata.set(key, value),
                _ => rest.push(line),
            }
        }
        Ok((!rest.is_empty()).then(|| rest.join("\n")))
    }

    /// Whether an empty line separates the byte offsets `end` and `start`
    fn blank_line_between(&self, end: usize, start: usize) -> bool {
        let gap: Vec<&str> = self.source[end..start].split('\n').collect();
        gap.len() > 2 && gap[1..gap.len() - 1].iter().any(|line| line.trim().is_empty())
    }

    /// `map "url" = "name"`
    fn map_declaration(&mut self, map: &mut MappingDefinition) -> Result<()> {
        self.expect_keyword("map")?;
        let url = self.url()?;
        self.expect(Token::Equal, "'='")?;
        let name = match self.peek_token()? {
            Some(Token::String(name)) => {
                self.advance("map name")?;
                name
            }
            _ => self.name("map name")?.inner,
        };
        map.metadata.url = Some(url);
        map.metadata.name = Some(name);
        Ok(())
    }

    /// `uses "url" alias Name as source`
    fn uses(&mut self) -> Result<StructureDeclaration> {
        self.expect_keyword("uses")?;
        let url = self.url()?;
        let alias = match self.eat_keyword("alias")? {
            Some(_) => Some(self.name("alias")?.inner),
            None => None,
        };
        self.expect_keyword("as")?;
        let mode = self
            .peek_word()?
            .and_then(|w| StructureMode::from_keyword(&w))
            .ok_or_else(|| self.unexpected("'source', 'target', 'queried' or 'produced'"))?;
        self.advance("structure mode")?;
        Ok(StructureDeclaration { url, alias, mode })
    }

    /// `let name = literal;`
    fn constant(&mut self) -> Result<Spanned<Constant>> {
        self.expect_keyword("let")?;
        let name = self.name("constant name")?;
        self.expect(Token::Equal, "'='")?;
        let value = match self.literal()? {
            Some(value) => value,
            None => return Err(self.unexpected("literal")),
        };
        self.expect(Token::Semicolon, "';'")?;
        Ok(Spanned::new(Constant::new(name.inner, value), name.span))
    }

    /// `conceptmap name { prefix s = "url" ... s:code == t:code ... }`
    fn concept_map(&mut self) -> Result<Spanned<ConceptMap>> {
        self.expect_keyword("conceptmap")?;
        let name = match self.peek_token()? {
            Some(Token::String(name)) => Spanned::new(name, self.advance("concept map name")?.span),
            _ => self.name("concept map name")?,
        };
        let mut concept_map = ConceptMap::new(name.inner.clone());
        self.expect(Token::LeftBrace, "'{'")?;

        while !self.check(&Token::RightBrace)? {
            let is_prefix =
                self.check_keyword("prefix")? && self.check_nth(2, &Token::Equal)?;
            if is_prefix {
                self.advance("prefix")?;
                let prefix = self.name("prefix")?.inner;
                self.expect(Token::Equal, "'='")?;
                let url = self.url()?;
                concept_map.prefixes.push(ConceptMapPrefix { prefix, url });
            } else {
                let (source_prefix, source_code) = self.concept()?;
                let relationship = self.relationship()?;
                let (target_prefix, target_code) = self.concept()?;
                concept_map.mappings.push(ConceptMapping {
                    source_prefix,
                    source_code,
                    relationship,
                    target_prefix,
                    target_code,
                });
            }
            self.eat(&Token::Semicolon)?;
        }
        self.expect(Token::RightBrace, "'}'")?;
        Ok(Spanned::new(concept_map, name.span))
    }

    /// `prefix:code`
    fn concept(&mut self) -> Result<(String, String)> {
        let prefix = self.name("concept map prefix")?.inner;
        self.expect(Token::Colon, "':'")?;
        let found = self.peek()?.map(|t| (t.inner.clone(), t.span));
        let code = match found {
            Some((Token::Identifier(c) | Token::DelimitedIdentifier(c) | Token::String(c), _)) => c,
            Some((Token::Integer(_) | Token::Decimal(_), span)) => self.source[span.start..span.end].to_string(),
            Some((Token::Boolean(b), _)) => b.to_string(),
            _ => return Err(self.unexpected("code")),
        };
        self.advance("code")?;
        Ok((prefix, code))
    }

    fn relationship(&mut self) -> Result<ConceptRelationship> {
        let relationship = match self.peek_token()? {
            Some(Token::EqualEqual) => ConceptRelationship::Equivalent,
            Some(Token::Equal) => ConceptRelationship::Equal,
            Some(Token::NotEqual) => ConceptRelationship::Disjoint,
            Some(Token::LessEqual) => ConceptRelationship::Wider,
            Some(Token::GreaterEqual) => ConceptRelationship::Narrower,
            Some(Token::Tilde) => ConceptRelationship::Inexact,
            _ => return Err(self.unexpected("concept relationship")),
        };
        self.advance("concept relationship")?;
        Ok(relationship)
    }

    // === Groups ===

    fn group(&mut self, documentation: Option<String>) -> Result<Spanned<Group>> {
        self.expect_keyword("group")?;
        let name = self.name("group name")?;
        let mut group = Group::new(name.inner.clone());
        group.documentation = documentation;

        self.expect(Token::LeftParen, "'('")?;
        loop {
            let parameter = self.group_parameter()?;
            if group.parameter(&parameter.inner.name).is_some() {
                return Err(self.duplicate("parameter", &parameter.inner.name, parameter.span));
            }
            group.parameters.push(parameter.inner);
            if !self.eat(&Token::Comma)? {
                break;
            }
        }
        self.expect(Token::RightParen, "')'")?;

        let mut type_mode_seen = false;
        loop {
            if group.extends.is_none() && self.eat_keyword("extends")?.is_some() {
                group.extends = Some(self.name("group name")?.inner);
            } else if !type_mode_seen && self.eat(&Token::DoubleLess)? {
                group.type_mode = self.type_mode()?;
                type_mode_seen = true;
            } else {
                break;
            }
        }

        group.rules = self.rule_block()?;
        trace!("group {} with {} rule(s)", group.name, group.rules.len());
        Ok(Spanned::new(group, name.span))
    }

    fn group_parameter(&mut self) -> Result<Spanned<GroupParameter>> {
        let mode = match self.peek_word()?.as_deref() {
            Some("source") => ParameterMode::Source,
            Some("target") => ParameterMode::Target,
            _ => return Err(self.unexpected("'source' or 'target'")),
        };
        self.advance("parameter mode")?;
        let name = self.name("parameter name")?;
        let type_name = if self.eat(&Token::Colon)? {
            Some(self.name("type name")?.inner)
        } else {
            None
        };
        let parameter = GroupParameter {
            mode,
            name: name.inner,
            type_name,
        };
        Ok(Spanned::new(parameter, name.span))
    }

    /// After `<<`: `types>>` or `type+>>`
    fn type_mode(&mut self) -> Result<TypeMode> {
        let mode = if self.eat_keyword("types")?.is_some() {
            TypeMode::Types
        } else if self.eat_keyword("type")?.is_some() {
            self.expect(Token::Plus, "'+'")?;
            TypeMode::TypeAndTypes
        } else {
            return Err(self.unexpected("'types' or 'type+'"));
        };
        self.expect(Token::DoubleGreater, "'>>'")?;
        Ok(mode)
    }

    // === Rules ===

    /// `{ rule* }`
    fn rule_block(&mut self) -> Result<Vec<Rule>> {
        let open = self.expect(Token::LeftBrace, "'{'")?;
        self.descend(open)?;
        let mut rules = Vec::new();
        while !self.check(&Token::RightBrace)? {
            let documentation = self.take_docs()?;
            if self.peek()?.is_none() {
                return Err(self.end_error("'}'"));
            }
            rules.push(self.rule(rules.len() + 1, documentation)?);
        }
        self.expect(Token::RightBrace, "'}'")?;
        self.ascend();
        Ok(rules)
    }

    fn rule(&mut self, index: usize, documentation: Option<String>) -> Result<Rule> {
        let mut sources = vec![self.source()?];
        while self.eat(&Token::Comma)? {
            sources.push(self.source()?);
        }

        let mut targets = Vec::new();
        if self.eat(&Token::Arrow)? {
            targets.push(self.target()?);
            while self.eat(&Token::Comma)? {
                targets.push(self.target()?);
            }
        }

        let mut rule = Rule::new(sources, targets, index);
        rule.documentation = documentation;

        let mut ends_with_block = false;
        if let Some(then) = self.eat_keyword("then")? {
            let blocked = rule
                .targets
                .iter()
                .filter_map(|t| t.transform.as_ref())
                .find(|t| !t.introduces_element());
            if let Some(transform) = blocked {
                return Err(ParseError::new(
                    ParseErrorKind::UnexpectedToken,
                    format!(
                        "Unexpected 'then': a rule with a '{}' target cannot have dependent rules",
                        transform.name()
                    ),
                    self.location(then),
                )
                .into());
            }

            if !self.check(&Token::LeftBrace)? {
                loop {
                    rule.dependents.push(self.invocation()?);
                    if !self.eat(&Token::Comma)? {
                        break;
                    }
                }
            }
            if self.check(&Token::LeftBrace)? {
                rule.rules = self.rule_block()?;
                ends_with_block = true;
            }
        }

        match self.peek_token()? {
            Some(Token::String(name) | Token::DelimitedIdentifier(name)) => {
                self.advance("rule name")?;
                rule.name = name;
                self.expect(Token::Semicolon, "';'")?;
            }
            _ if ends_with_block => {
                self.eat(&Token::Semicolon)?;
            }
            _ => {
                self.expect(Token::Semicolon, "';'")?;
            }
        }
        Ok(rule)
    }

    fn source(&mut self) -> Result<RuleSource> {
        let mut source = RuleSource::new(self.name("source variable")?.inner);
        if self.eat(&Token::Dot)? {
            source.element = Some(self.name("element name")?.inner);
        }
        if self.eat(&Token::Colon)? {
            let is_cardinality = self.peek()?.is_some_and(|t| matches!(t.inner, Token::Integer(_)));
            if !is_cardinality {
                source.type_name = Some(self.name("type name")?.inner);
            }
            if self.peek()?.is_some_and(|t| matches!(t.inner, Token::Integer(_))) {
                source.cardinality = Some(self.cardinality()?);
            }
        }

        while let Some(word) = self.peek_word()? {
            match word.as_str() {
                "default" if source.default_value.is_none() => {
                    self.advance("default")?;
                    source.default_value = Some(self.default_value()?);
                }
                "as" if source.variable.is_none() => {
                    self.advance("as")?;
                    source.variable = Some(self.name("variable name")?.inner);
                }
                "where" if source.condition.is_none() => {
                    self.advance("where")?;
                    source.condition = Some(self.expression()?);
                }
                "check" if source.check.is_none() => {
                    self.advance("check")?;
                    source.check = Some(self.expression()?);
                }
                "log" if source.log.is_none() => {
                    self.advance("log")?;
                    source.log = Some(self.expression()?);
                }
                "while" if source.while_condition.is_none() => {
                    self.advance("while")?;
                    source.while_condition = Some(self.expression()?);
                }
                other => match SourceListMode::from_keyword(other) {
                    Some(mode) if source.list_mode.is_none() => {
                        self.advance("list mode")?;
                        source.list_mode = Some(mode);
                    }
                    _ => break,
                },
            }
        }
        Ok(source)
    }

    /// `min..max` with `*` for unbounded
    fn cardinality(&mut self) -> Result<Cardinality> {
        let min = self.small_integer("minimum cardinality")?;
        self.expect(Token::DotDot, "'..'")?;
        let max = if self.eat(&Token::Star)? {
            None
        } else {
            Some(self.small_integer("maximum cardinality")?)
        };
        Ok(Cardinality::new(min, max))
    }

    /// `default 'x'` or `default (expr)`
    fn default_value(&mut self) -> Result<Expression> {
        if self.check(&Token::LeftParen)? {
            return self.expression();
        }
        match self.literal()? {
            Some(literal) => Ok(Expression::Literal(literal)),
            None => Err(self.unexpected("literal or '('")),
        }
    }

    fn target(&mut self) -> Result<RuleTarget> {
        let is_invocation = self
            .peek()?
            .is_some_and(|t| matches!(t.inner, Token::Identifier(_)))
            && self.check_nth(1, &Token::LeftParen)?;

        let mut target = if is_invocation {
            RuleTarget::bare(self.transform_call()?)
        } else {
            let mut target = RuleTarget::new(self.name("target variable")?.inner);
            if self.eat(&Token::Dot)? {
                target.element = Some(self.name("element name")?.inner);
            }
            if self.eat(&Token::Equal)? {
                target.transform = Some(self.transform_value()?);
            }
            target
        };

        if self.eat_keyword("as")?.is_some() {
            target.variable = Some(self.name("variable name")?.inner);
        }
        target.list_mode = self.target_list_mode()?;
        Ok(target)
    }

    fn target_list_mode(&mut self) -> Result<Option<TargetListMode>> {
        let mode = match self.peek_word()?.as_deref() {
            Some("first") => TargetListMode::First,
            Some("last") => TargetListMode::Last,
            Some("single") => TargetListMode::Single,
            Some("collate") => TargetListMode::Collate,
            Some("share") => {
                self.advance("share")?;
                return Ok(Some(TargetListMode::Share(self.name("share id")?.inner)));
            }
            _ => return Ok(None),
        };
        self.advance("list mode")?;
        Ok(Some(mode))
    }

    /// Right-hand side of `target = ...`
    fn transform_value(&mut self) -> Result<Transform> {
        if self.eat(&Token::LeftParen)? {
            let expression = self.expression()?;
            self.expect(Token::RightParen, "')'")?;
            return Ok(Transform::Evaluate { expression });
        }
        let is_call = self
            .peek()?
            .is_some_and(|t| matches!(t.inner, Token::Identifier(_)))
            && self.check_nth(1, &Token::LeftParen)?;
        if is_call {
            return self.transform_call();
        }
        Ok(Transform::Copy {
            value: self.parameter()?,
        })
    }

    /// `name(arg, ...)` over the closed transform set
    fn transform_call(&mut self) -> Result<Transform> {
        let name = self.name("transform name")?;
        if transform_arity(&name.inner).is_none() {
            return Err(ParseError::unknown_transform(&name.inner, self.location(name.span)).into());
        }
        self.expect(Token::LeftParen, "'('")?;

        if name.inner == "evaluate" {
            let mut args = self.argument_expressions()?;
            return match (args.pop(), args.is_empty()) {
                (Some(expression), true) => Ok(Transform::Evaluate { expression }),
                (last, _) => Err(ParseError::invalid_arity(
                    "evaluate",
                    1,
                    args.len() + usize::from(last.is_some()),
                    self.location(name.span),
                )
                .into()),
            };
        }

        let mut args = Vec::new();
        if !self.check(&Token::RightParen)? {
            loop {
                args.push(self.parameter()?);
                if !self.eat(&Token::Comma)? {
                    break;
                }
            }
        }
        self.expect(Token::RightParen, "')'")?;

        Transform::from_parameters(&name.inner, args).map_err(|e| {
            let location = self.location(name.span);
            match e {
                TransformBuildError::Unknown(n) => ParseError::unknown_transform(&n, location),
                TransformBuildError::Arity {
                    name,
                    expected,
                    found,
                } => ParseError::invalid_arity(name, expected, found, location),
            }
            .into()
        })
    }

    fn parameter(&mut self) -> Result<Parameter> {
        if let Some(literal) = self.literal()? {
            return Ok(Parameter::Literal(literal));
        }
        Ok(Parameter::Id(self.name("transform argument")?.inner))
    }

    /// `Group(a, b)` after `then`
    fn invocation(&mut self) -> Result<DependentInvocation> {
        let name = self.name("group name")?.inner;
        self.expect(Token::LeftParen, "'('")?;
        let mut arguments = Vec::new();
        if !self.check(&Token::RightParen)? {
            loop {
                arguments.push(self.name("variable name")?.inner);
                if !self.eat(&Token::Comma)? {
                    break;
                }
            }
        }
        self.expect(Token::RightParen, "')'")?;
        Ok(DependentInvocation { name, arguments })
    }
}

/// `key = value` or `key = 'value'` from a header line
fn split_metadata(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    let valid_key = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if !valid_key {
        return None;
    }
    let value = value.trim();
    let value = value
        .strip_prefix('\'')
        .and_then(|v| v.strip_suffix('\''))
        .unwrap_or(value);
    Some((key, value))
}

fn join_docs(first: Option<String>, second: Option<String>) -> Option<String> {
    match (first, second) {
        (Some(a), Some(b)) => Some(format!("{a}\n{b}")),
        (a, b) => a.or(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parse, parse_with_options};
    use octofhir_fml_diagnostics::{FML0001, FML0002, FML0010, FML0011, FML0012, FML0013};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn group_source(rules: &str) -> String {
        format!("group Main(source src, target tgt) {{\n{rules}\n}}")
    }

    fn single_rule(rule: &str) -> Rule {
        let map = parse(&group_source(rule)).unwrap();
        map.groups[0].rules[0].clone()
    }

    #[test]
    fn test_split_metadata() {
        assert_eq!(split_metadata("url = 'http://x'"), Some(("url", "http://x")));
        assert_eq!(split_metadata("status=draft"), Some(("status", "draft")));
        assert_eq!(split_metadata("Maps a patient"), None);
        assert_eq!(split_metadata("a b = c"), None);
    }

    #[test]
    fn test_header_then_group_docs() {
        let map = parse(
            "/// url = 'http://example.org/map'\n/// name = 'Example'\n/// Main entry\n\ngroup Main(source s) { s -> s; }",
        )
        .unwrap();
        assert_eq!(map.metadata.url.as_deref(), Some("http://example.org/map"));
        assert_eq!(map.metadata.name.as_deref(), Some("Example"));
        assert_eq!(map.groups[0].documentation.as_deref(), Some("Main entry"));
    }

    #[test]
    fn test_header_ends_at_blank_line() {
        let map = parse("/// url = 'http://example.org/map'\n\n/// note = keep\ngroup G(source s) { s; }").unwrap();
        assert_eq!(map.metadata.url.as_deref(), Some("http://example.org/map"));
        assert!(map.metadata.extra.is_empty());
        assert_eq!(map.groups[0].documentation.as_deref(), Some("note = keep"));
    }

    #[test]
    fn test_docs_on_first_group_are_not_a_header() {
        let map = parse("/// note = keep\ngroup G(source s) { s; }").unwrap();
        assert!(map.metadata.extra.is_empty());
        assert_eq!(map.groups[0].documentation.as_deref(), Some("note = keep"));
    }

    #[test]
    fn test_map_declaration() {
        let map = parse("map \"http://example.org/m\" = \"M\"\ngroup G(source s) { s; }").unwrap();
        assert_eq!(map.metadata.url.as_deref(), Some("http://example.org/m"));
        assert_eq!(map.metadata.name.as_deref(), Some("M"));
    }

    #[test]
    fn test_source_clauses_any_order() {
        let rule = single_rule(
            "src.item : BackboneElement 0..* only_one as i where (i.exists()) check (true) log (i) -> tgt.item = i;",
        );
        let source = &rule.sources[0];
        assert_eq!(source.type_name.as_deref(), Some("BackboneElement"));
        assert_eq!(source.cardinality, Some(Cardinality::new(0, None)));
        assert_eq!(source.list_mode, Some(SourceListMode::OnlyOne));
        assert_eq!(source.variable.as_deref(), Some("i"));
        assert!(source.condition.is_some());
        assert!(source.check.is_some());
        assert!(source.log.is_some());
    }

    #[test]
    fn test_default_literal_and_expression() {
        let rule = single_rule("src.a default 'x' as a -> tgt.a = a;");
        assert_eq!(
            rule.sources[0].default_value,
            Some(Expression::Literal(Literal::string("x")))
        );
        let rule = single_rule("src.a default ('x' & 'y') as a -> tgt.a = a;");
        assert!(matches!(rule.sources[0].default_value, Some(Expression::Binary { .. })));
    }

    #[test]
    fn test_target_forms() {
        let rule = single_rule(
            "src.a as a -> tgt.b = create('Coding') as c share shared, tgt.x = 'lit' first, uuid() as u;",
        );
        assert_eq!(
            rule.targets[0].list_mode,
            Some(TargetListMode::Share("shared".into()))
        );
        assert_eq!(
            rule.targets[1].transform,
            Some(Transform::Copy {
                value: Parameter::string("lit")
            })
        );
        assert_eq!(rule.targets[2].context, None);
        assert_eq!(rule.targets[2].transform, Some(Transform::Uuid));
    }

    #[test]
    fn test_evaluate_forms_are_equal() {
        let short = single_rule("src.a as a -> tgt.b = (a.length() + 1);");
        let long = single_rule("src.a as a -> tgt.b = evaluate(a.length() + 1);");
        assert_eq!(short.targets[0].transform, long.targets[0].transform);
    }

    #[test]
    fn test_then_with_invocations_and_block() {
        let rule = single_rule(
            "src.name as n -> tgt.name as tn then Name(n, tn), Extra(n) {\n  n.given as g -> tn.given = g;\n};",
        );
        assert_eq!(rule.dependents.len(), 2);
        assert_eq!(rule.dependents[0].arguments, vec!["n", "tn"]);
        assert_eq!(rule.rules.len(), 1);
        assert_eq!(rule.rules[0].name, "given");
    }

    #[test]
    fn test_block_semicolon_optional() {
        let map = parse(&group_source("src.a as a then { a -> tgt.a = a; }\nsrc.b as b -> tgt.b = b;")).unwrap();
        assert_eq!(map.groups[0].rules.len(), 2);
        assert_eq!(map.groups[0].rules[1].name, "b");
    }

    #[test]
    fn test_rule_names() {
        let map = parse(&group_source(
            "src.a as a -> tgt.a = a \"copyA\";\nsrc as s -> tgt.b = 'x';\nsrc.c as c -> tgt.c = c;",
        ))
        .unwrap();
        let names: Vec<_> = map.groups[0].rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["copyA", "rule2", "c"]);
    }

    #[test]
    fn test_negative_constant() {
        let map = parse("let offset = -5;\ngroup G(source s) { s; }").unwrap();
        assert_eq!(map.constant("offset"), Some(&Literal::Integer(-5)));
    }

    #[test]
    fn test_concept_map() {
        let map = parse(
            "conceptmap \"sex\" {\n  prefix s = \"http://src\"\n  prefix t = \"http://hl7.org/fhir/administrative-gender\"\n  s:M == t:male\n  s:\"F\" == t:female\n  s:0 != t:unknown\n}\ngroup G(source s) { s; }",
        )
        .unwrap();
        let cm = map.concept_map("sex").unwrap();
        assert_eq!(cm.prefixes.len(), 2);
        assert_eq!(cm.mappings.len(), 3);
        assert_eq!(cm.mappings[2].source_code, "0");
        assert_eq!(cm.mappings[2].relationship, ConceptRelationship::Disjoint);
    }

    #[test]
    fn test_group_header() {
        let map = parse(
            "group Child(source s : Patient, target t : Patient) extends Base <<type+>> { s; }\ngroup Base(source s, target t) { s; }",
        )
        .unwrap();
        let group = &map.groups[0];
        assert_eq!(group.extends.as_deref(), Some("Base"));
        assert_eq!(group.type_mode, TypeMode::TypeAndTypes);
        assert_eq!(group.parameters[0].type_name.as_deref(), Some("Patient"));
    }

    #[rstest]
    #[case::duplicate_group("group A(source s) { s; } group A(source s) { s; }", FML0010)]
    #[case::duplicate_parameter("group A(source s, target s) { s; }", FML0010)]
    #[case::duplicate_constant("let a = 1; let a = 2; group A(source s) { s; }", FML0010)]
    #[case::arity("group A(source s, target t) { s -> t.x = truncate(s); }", FML0011)]
    #[case::evaluate_arity("group A(source s, target t) { s -> t.x = evaluate(s, 1); }", FML0011)]
    #[case::unknown("group A(source s, target t) { s -> t.x = frobnicate(s); }", FML0012)]
    #[case::no_group("uses \"http://x\" as source", FML0002)]
    #[case::missing_brace("group A(source s) { s;", FML0002)]
    #[case::then_with_copy("group A(source s, target t) { s.a as a -> t.a = a then B(a); }", FML0001)]
    #[case::repeated_clause("group A(source s) { s as a as b; }", FML0001)]
    fn test_parse_errors(#[case] source: &str, #[case] code: octofhir_fml_diagnostics::ErrorCode) {
        assert_eq!(parse(source).unwrap_err().code(), code);
    }

    #[test]
    fn test_error_position_points_at_token() {
        let err = parse("group A(source s) {\n  s -> ;\n}").unwrap_err();
        assert_eq!(err.parse_kind(), Some(ParseErrorKind::UnexpectedToken));
        assert_eq!((err.location().line, err.location().column), (2, 8));
    }

    #[test]
    fn test_nesting_limit() {
        let source = group_source("s then { s then { s then { s; }; }; };");
        let options = ParseOptions {
            max_nesting_depth: 3,
        };
        assert_eq!(parse_with_options(&source, &options).unwrap_err().code(), FML0013);
        assert!(parse(&source).is_ok());
    }
}
