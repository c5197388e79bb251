//! Canonical FML rendering
//!
//! The output is a single normalized form: one declaration per line, rules
//! indented by two spaces per nesting level, `copy` written as `= value`,
//! `evaluate` as `= (expr)`, and names that are not plain identifiers in
//! delimited form. Parsing the output yields a definition equal to the input.

use octofhir_fml_ast::{
    Expression, Group, Literal, MappingDefinition, Parameter, Rule, RuleSource, RuleTarget,
    TargetListMode, Transform, escape_string, is_plain_identifier,
};

const INDENT: &str = "  ";

/// Render a mapping definition as canonical FML text
pub fn render(map: &MappingDefinition) -> String {
    let mut renderer = Renderer::default();
    renderer.mapping_definition(map);
    renderer.out
}

/// Render an expression in canonical form
pub fn render_expression(expression: &Expression) -> String {
    let mut out = String::new();
    write_expression(&mut out, expression);
    out
}

#[derive(Default)]
struct Renderer {
    out: String,
}

impl Renderer {
    fn line(&mut self, depth: usize, text: &str) {
        for _ in 0..depth {
            self.out.push_str(INDENT);
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn blank(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with("\n\n") {
            self.out.push('\n');
        }
    }

    fn docs(&mut self, depth: usize, documentation: Option<&str>) {
        if let Some(docs) = documentation {
            for line in docs.lines() {
                let text = if line.is_empty() {
                    "///".to_string()
                } else {
                    format!("/// {line}")
                };
                self.line(depth, &text);
            }
        }
    }

    fn mapping_definition(&mut self, map: &MappingDefinition) {
        for (key, value) in map.metadata.entries() {
            self.line(0, &format!("/// {key} = '{value}'"));
        }

        self.blank();
        for structure in &map.structures {
            let alias = structure
                .alias
                .as_deref()
                .map(|a| format!(" alias {}", name(a)))
                .unwrap_or_default();
            self.line(
                0,
                &format!("uses {}{alias} as {}", url(&structure.url), structure.mode),
            );
        }

        self.blank();
        for import in &map.imports {
            self.line(0, &format!("imports {}", url(import)));
        }

        self.blank();
        for constant in &map.constants {
            self.line(
                0,
                &format!("let {} = {};", name(&constant.name), constant.value),
            );
        }

        for concept_map in &map.concept_maps {
            self.blank();
            self.line(0, &format!("conceptmap {} {{", url(&concept_map.name)));
            for prefix in &concept_map.prefixes {
                self.line(
                    1,
                    &format!("prefix {} = {}", name(&prefix.prefix), url(&prefix.url)),
                );
            }
            for mapping in &concept_map.mappings {
                self.line(
                    1,
                    &format!(
                        "{}:{} {} {}:{}",
                        name(&mapping.source_prefix),
                        url(&mapping.source_code),
                        mapping.relationship.symbol(),
                        name(&mapping.target_prefix),
                        url(&mapping.target_code),
                    ),
                );
            }
            self.line(0, "}");
        }

        for group in &map.groups {
            self.blank();
            self.group(group);
        }
    }

    fn group(&mut self, group: &Group) {
        self.docs(0, group.documentation.as_deref());
        let parameters: Vec<String> = group
            .parameters
            .iter()
            .map(|p| match &p.type_name {
                Some(type_name) => format!("{} {} : {}", p.mode, name(&p.name), name(type_name)),
                None => format!("{} {}", p.mode, name(&p.name)),
            })
            .collect();
        let mut header = format!("group {}({})", name(&group.name), parameters.join(", "));
        if let Some(extends) = &group.extends {
            header.push_str(&format!(" extends {}", name(extends)));
        }
        let annotation = group.type_mode.annotation();
        if !annotation.is_empty() {
            header.push(' ');
            header.push_str(annotation);
        }
        header.push_str(" {");
        self.line(0, &header);
        self.rules(1, &group.rules);
        self.line(0, "}");
    }

    fn rules(&mut self, depth: usize, rules: &[Rule]) {
        for (position, rule) in rules.iter().enumerate() {
            self.rule(depth, rule, position + 1);
        }
    }

    fn rule(&mut self, depth: usize, rule: &Rule, index: usize) {
        self.docs(depth, rule.documentation.as_deref());

        let sources: Vec<String> = rule.sources.iter().map(source).collect();
        let mut text = sources.join(", ");
        if !rule.targets.is_empty() {
            let targets: Vec<String> = rule.targets.iter().map(target).collect();
            text.push_str(" -> ");
            text.push_str(&targets.join(", "));
        }
        if !rule.dependents.is_empty() || !rule.rules.is_empty() {
            text.push_str(" then");
        }
        if !rule.dependents.is_empty() {
            let invocations: Vec<String> = rule
                .dependents
                .iter()
                .map(|d| {
                    let arguments: Vec<String> = d.arguments.iter().map(|a| name(a)).collect();
                    format!("{}({})", name(&d.name), arguments.join(", "))
                })
                .collect();
            text.push(' ');
            text.push_str(&invocations.join(", "));
        }

        let suffix = if rule.has_explicit_name(index) {
            format!(" \"{}\";", escape_string(&rule.name, '"'))
        } else {
            ";".to_string()
        };

        if rule.rules.is_empty() {
            text.push_str(&suffix);
            self.line(depth, &text);
        } else {
            text.push_str(" {");
            self.line(depth, &text);
            self.rules(depth + 1, &rule.rules);
            self.line(depth, &format!("}}{suffix}"));
        }
    }
}

/// A name, delimited with `"` unless it is a plain identifier
fn name(value: &str) -> String {
    if is_plain_identifier(value) {
        value.to_string()
    } else {
        url(value)
    }
}

/// Always-delimited text
fn url(value: &str) -> String {
    format!("\"{}\"", escape_string(value, '"'))
}

fn source(source: &RuleSource) -> String {
    let mut text = name(&source.context);
    if let Some(element) = &source.element {
        text.push('.');
        text.push_str(&name(element));
    }
    if source.type_name.is_some() || source.cardinality.is_some() {
        text.push_str(" :");
        if let Some(type_name) = &source.type_name {
            text.push(' ');
            text.push_str(&name(type_name));
        }
        if let Some(cardinality) = &source.cardinality {
            text.push_str(&format!(" {cardinality}"));
        }
    }
    if let Some(default) = &source.default_value {
        text.push_str(&format!(" default ({})", render_expression(default)));
    }
    if let Some(mode) = &source.list_mode {
        text.push(' ');
        text.push_str(mode.keyword());
    }
    if let Some(variable) = &source.variable {
        text.push_str(&format!(" as {}", name(variable)));
    }
    let clauses = [
        ("where", &source.condition),
        ("check", &source.check),
        ("log", &source.log),
        ("while", &source.while_condition),
    ];
    for (keyword, expression) in clauses {
        if let Some(expression) = expression {
            text.push_str(&format!(" {keyword} ({})", render_expression(expression)));
        }
    }
    text
}

fn target(target: &RuleTarget) -> String {
    let mut text = match &target.context {
        Some(context) => {
            let mut text = name(context);
            if let Some(element) = &target.element {
                text.push('.');
                text.push_str(&name(element));
            }
            if let Some(transform) = &target.transform {
                text.push_str(" = ");
                text.push_str(&transform_value(transform));
            }
            text
        }
        None => target.transform.as_ref().map(transform_call).unwrap_or_default(),
    };
    if let Some(variable) = &target.variable {
        text.push_str(&format!(" as {}", name(variable)));
    }
    if let Some(mode) = &target.list_mode {
        text.push(' ');
        text.push_str(mode.keyword());
        if let TargetListMode::Share(id) = mode {
            text.push(' ');
            text.push_str(&name(id));
        }
    }
    text
}

/// Right-hand side of `target = ...`
fn transform_value(transform: &Transform) -> String {
    match transform {
        Transform::Copy { value } => parameter(value),
        Transform::Evaluate { expression } => format!("({})", render_expression(expression)),
        other => transform_call(other),
    }
}

/// Function-call form, used for invocation targets and non-copy transforms
fn transform_call(transform: &Transform) -> String {
    match transform {
        Transform::Evaluate { expression } => {
            format!("evaluate({})", render_expression(expression))
        }
        other => {
            let arguments: Vec<String> = other.parameters().into_iter().map(parameter).collect();
            format!("{}({})", other.name(), arguments.join(", "))
        }
    }
}

fn parameter(parameter: &Parameter) -> String {
    match parameter {
        Parameter::Id(id) => name(id),
        Parameter::Literal(literal) => literal.to_string(),
    }
}

/// Identifier inside an expression, delimited with backticks when needed
fn expression_name(value: &str) -> String {
    if is_plain_identifier(value) {
        value.to_string()
    } else {
        format!("`{}`", escape_string(value, '`'))
    }
}

/// Whether the expression is written starting with a number literal
fn starts_with_number(expression: &Expression) -> bool {
    match expression {
        Expression::Literal(Literal::Integer(_) | Literal::Decimal(_)) => true,
        Expression::Member { target, .. } | Expression::Index { target, .. } => {
            starts_with_number(target)
        }
        Expression::Function {
            target: Some(target),
            ..
        } => starts_with_number(target),
        _ => false,
    }
}

/// Operand of a postfix operator or of unary minus
fn write_operand(out: &mut String, expression: &Expression, wrap_numbers: bool) {
    let wrap = matches!(
        expression,
        Expression::Binary { .. } | Expression::Unary { .. }
    ) || (wrap_numbers && starts_with_number(expression));
    if wrap {
        out.push('(');
        write_expression(out, expression);
        out.push(')');
    } else {
        write_expression(out, expression);
    }
}

fn write_arguments(out: &mut String, args: &[Expression]) {
    out.push('(');
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_expression(out, arg);
    }
    out.push(')');
}

fn write_expression(out: &mut String, expression: &Expression) {
    match expression {
        Expression::Literal(literal) => out.push_str(&literal.to_string()),
        Expression::Empty => out.push_str("{}"),
        Expression::Identifier(id) => out.push_str(&expression_name(id)),
        Expression::Constant(id) => {
            out.push('%');
            out.push_str(&expression_name(id));
        }
        Expression::This => out.push_str("$this"),
        Expression::Member { target, name } => {
            write_operand(out, target, false);
            out.push('.');
            out.push_str(&expression_name(name));
        }
        Expression::Function { target, name, args } => {
            if let Some(target) = target {
                write_operand(out, target, false);
                out.push('.');
            }
            out.push_str(name);
            write_arguments(out, args);
        }
        Expression::Index { target, index } => {
            write_operand(out, target, false);
            out.push('[');
            write_expression(out, index);
            out.push(']');
        }
        Expression::Unary { op, operand } => {
            out.push_str(op.symbol());
            write_operand(out, operand, true);
        }
        Expression::Binary { op, left, right } => {
            write_binary_operand(out, left);
            out.push(' ');
            out.push_str(op.symbol());
            out.push(' ');
            write_binary_operand(out, right);
        }
    }
}

fn write_binary_operand(out: &mut String, expression: &Expression) {
    if matches!(expression, Expression::Binary { .. }) {
        out.push('(');
        write_expression(out, expression);
        out.push(')');
    } else {
        write_expression(out, expression);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parse, parse_expression};
    use octofhir_fml_ast::{BinaryOp, GroupParameter, RuleSource, UnaryOp};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn test_render_minimal_group() {
        let map = parse("group Main(source src, target tgt) { src.a as a -> tgt.a = a; }").unwrap();
        assert_eq!(
            render(&map),
            "group Main(source src, target tgt) {\n  src.a as a -> tgt.a = a;\n}\n"
        );
    }

    #[test]
    fn test_copy_and_evaluate_are_normalized() {
        let map = parse(
            "group G(source s, target t) { s.a as a -> t.b = copy(a), t.c = evaluate(a + 1); }",
        )
        .unwrap();
        let text = render(&map);
        assert!(text.contains("t.b = a, t.c = (a + 1);"), "{text}");
    }

    #[test]
    fn test_bare_invocation_targets_use_call_form() {
        let map = parse("group G(source s, target t) { s -> copy(s) as c, evaluate(s.a) as e; }").unwrap();
        assert!(render(&map).contains("s -> copy(s) as c, evaluate(s.a) as e;"));
    }

    #[test]
    fn test_explicit_rule_name_only() {
        let map = parse("group G(source s, target t) { s.a as a -> t.a = a \"a\"; s.b as b -> t.b = b \"named\"; }").unwrap();
        let text = render(&map);
        assert!(text.contains("s.a as a -> t.a = a;"));
        assert!(text.contains("s.b as b -> t.b = b \"named\";"));
    }

    #[test]
    fn test_reserved_names_are_delimited() {
        let mut group = Group::new("Main")
            .with_parameter(GroupParameter::source("source", None))
            .with_parameter(GroupParameter::target("has space", Some("Patient")));
        group = group.with_rule(Rule::new(vec![RuleSource::new("source")], vec![], 1));
        let map = MappingDefinition {
            groups: vec![group],
            ..MappingDefinition::default()
        };
        let text = render(&map);
        assert!(text.starts_with("group Main(source \"source\", target \"has space\" : Patient)"));
        assert_eq!(parse(&text).unwrap(), map);
    }

    #[rstest]
    #[case("a + b * c", "a + (b * c)")]
    #[case("(a + b) * c", "(a + b) * c")]
    #[case("-(a + b)", "-(a + b)")]
    #[case("-x.abs()", "-x.abs()")]
    #[case("(-x).abs()", "(-x).abs()")]
    #[case("a - -5", "a - -5")]
    #[case("-(5.abs())", "-(5.abs())")]
    #[case("name.where(use = 'official').given.first()", "name.where(use = 'official').given.first()")]
    #[case("%`my const` & `and`", "%`my const` & `and`")]
    fn test_expression_rendering(#[case] source: &str, #[case] expected: &str) {
        assert_eq!(render_expression(&parse_expression(source).unwrap()), expected);
    }

    #[test]
    fn test_negated_number_survives() {
        let expr = Expression::Unary {
            op: UnaryOp::Negate,
            operand: Box::new(Expression::Literal(Literal::Integer(5))),
        };
        let text = render_expression(&expr);
        assert_eq!(text, "-(5)");
        assert_eq!(parse_expression(&text).unwrap(), expr);
    }

    #[test]
    fn test_programmatic_binary_round_trip() {
        let expr = Expression::binary(
            BinaryOp::Implies,
            Expression::binary(BinaryOp::Implies, Expression::identifier("a"), Expression::identifier("b")),
            Expression::identifier("c"),
        );
        assert_eq!(parse_expression(&render_expression(&expr)).unwrap(), expr);
    }
}
