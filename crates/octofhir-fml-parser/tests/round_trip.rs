//! Round-trip property over generated mapping definitions
//!
//! Every generated definition is one the parser could have produced: rule
//! names are derived or explicit, rules with dependents only create
//! elements, and names are unique where the grammar requires it.

use octofhir_fml_ast::{
    BinaryOp, Cardinality, ConceptMap, ConceptMapPrefix, ConceptMapping, ConceptRelationship,
    Constant, DependentInvocation, Expression, Group, GroupParameter, Literal, MappingDefinition,
    Metadata, Parameter, Rule, RuleSource, RuleTarget, SourceListMode, StructureDeclaration,
    StructureMode, TRANSFORM_ARITIES, TargetListMode, Transform, TypeMode, UnaryOp,
};
use octofhir_fml_parser::{parse, parse_expression, render, render_expression};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rust_decimal::Decimal;

fn name() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => "[a-z][a-zA-Z0-9_]{0,6}",
        1 => prop::sample::select(vec!["as", "then", "where", "true", "source", "div"]).prop_map(String::from),
        1 => "[a-z]{1,4} [a-z]{1,4}",
    ]
}

fn text() -> impl Strategy<Value = String> {
    "[ -~]{0,10}"
}

fn literal() -> impl Strategy<Value = Literal> {
    prop_oneof![
        any::<bool>().prop_map(Literal::Boolean),
        (-1000i64..1000).prop_map(Literal::Integer),
        (-100_000i64..100_000, 1u32..4).prop_map(|(m, s)| Literal::Decimal(Decimal::new(m, s))),
        text().prop_map(Literal::String),
        prop::sample::select(vec!["2024", "2024-01", "2024-01-15"]).prop_map(|d| Literal::Date(d.into())),
        prop::sample::select(vec!["2024-01-15T10:30:00Z", "2024-01-15T10:30:00.250+02:00"])
            .prop_map(|d| Literal::DateTime(d.into())),
        prop::sample::select(vec!["10", "10:30", "10:30:15.5"]).prop_map(|t| Literal::Time(t.into())),
    ]
}

fn binary_op() -> impl Strategy<Value = BinaryOp> {
    prop::sample::select(vec![
        BinaryOp::Implies,
        BinaryOp::Or,
        BinaryOp::Xor,
        BinaryOp::And,
        BinaryOp::In,
        BinaryOp::Contains,
        BinaryOp::Equal,
        BinaryOp::NotEqual,
        BinaryOp::Equivalent,
        BinaryOp::Less,
        BinaryOp::LessOrEqual,
        BinaryOp::Greater,
        BinaryOp::GreaterOrEqual,
        BinaryOp::Union,
        BinaryOp::Add,
        BinaryOp::Subtract,
        BinaryOp::Concatenate,
        BinaryOp::Multiply,
        BinaryOp::Divide,
        BinaryOp::Div,
        BinaryOp::Mod,
    ])
}

fn function_name() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["exists", "where", "first", "upper", "substring", "iif"])
        .prop_map(String::from)
}

fn expression() -> impl Strategy<Value = Expression> {
    let leaf = prop_oneof![
        literal().prop_map(Expression::Literal),
        name().prop_map(Expression::Identifier),
        name().prop_map(Expression::Constant),
        Just(Expression::This),
        Just(Expression::Empty),
    ];
    leaf.prop_recursive(3, 24, 3, |inner| {
        prop_oneof![
            (inner.clone(), name()).prop_map(|(t, n)| Expression::member(t, n)),
            (
                prop::option::of(inner.clone()),
                function_name(),
                prop::collection::vec(inner.clone(), 0..3)
            )
                .prop_map(|(t, n, a)| Expression::call(t, n, a)),
            (inner.clone(), inner.clone()).prop_map(|(t, i)| Expression::Index {
                target: Box::new(t),
                index: Box::new(i),
            }),
            inner.clone().prop_map(|e| Expression::Unary {
                op: UnaryOp::Negate,
                operand: Box::new(e),
            }),
            (binary_op(), inner.clone(), inner).prop_map(|(op, l, r)| Expression::binary(op, l, r)),
        ]
    })
}

fn parameter() -> impl Strategy<Value = Parameter> {
    prop_oneof![
        name().prop_map(Parameter::Id),
        literal().prop_map(Parameter::Literal),
    ]
}

fn transform() -> impl Strategy<Value = Transform> {
    let call = (0..TRANSFORM_ARITIES.len(), prop::collection::vec(parameter(), 0..6)).prop_filter_map(
        "arity",
        |(index, args)| {
            let (name, arity) = TRANSFORM_ARITIES[index];
            let count = (0..=args.len()).rev().find(|c| arity.accepts(*c))?;
            Transform::from_parameters(name, args.into_iter().take(count).collect()).ok()
        },
    );
    prop_oneof![
        3 => call,
        1 => expression().prop_map(|expression| Transform::Evaluate { expression }),
    ]
}

fn cardinality() -> impl Strategy<Value = Cardinality> {
    (0u32..3, prop::option::of(1u32..5)).prop_map(|(min, max)| Cardinality::new(min, max))
}

fn source() -> impl Strategy<Value = RuleSource> {
    (
        (name(), prop::option::of(name()), prop::option::of(name()), prop::option::of(cardinality())),
        (
            prop::option::of(expression()),
            prop::option::of(prop::sample::select(vec![
                SourceListMode::First,
                SourceListMode::NotFirst,
                SourceListMode::Last,
                SourceListMode::NotLast,
                SourceListMode::OnlyOne,
            ])),
            prop::option::of(name()),
        ),
        prop::collection::vec(prop::option::of(expression()), 4),
    )
        .prop_map(|((context, element, type_name, cardinality), (default_value, list_mode, variable), mut clauses)| {
            RuleSource {
                context,
                element,
                type_name,
                cardinality,
                default_value,
                list_mode,
                variable,
                while_condition: clauses.pop().flatten(),
                log: clauses.pop().flatten(),
                check: clauses.pop().flatten(),
                condition: clauses.pop().flatten(),
            }
        })
}

fn target_list_mode() -> impl Strategy<Value = TargetListMode> {
    prop_oneof![
        Just(TargetListMode::First),
        Just(TargetListMode::Last),
        Just(TargetListMode::Single),
        Just(TargetListMode::Collate),
        name().prop_map(TargetListMode::Share),
    ]
}

fn target() -> impl Strategy<Value = RuleTarget> {
    let contextual = (name(), prop::option::of(name()), prop::option::of(transform())).prop_map(
        |(context, element, transform)| RuleTarget {
            context: Some(context),
            element,
            transform,
            ..RuleTarget::default()
        },
    );
    let bare = transform().prop_map(RuleTarget::bare);
    (
        prop_oneof![3 => contextual, 1 => bare],
        prop::option::of(name()),
        prop::option::of(target_list_mode()),
    )
        .prop_map(|(mut target, variable, list_mode)| {
            target.variable = variable;
            target.list_mode = list_mode;
            target
        })
}

/// Documentation lines, including ones shaped like `key = value` metadata
fn docs() -> impl Strategy<Value = Option<String>> {
    let line = prop_oneof![
        3 => "[a-z]{1,6}( [a-z=]{1,6}){0,3}",
        1 => "[a-z]{1,6} = '?[a-z]{1,6}'?",
    ];
    prop::option::of(prop::collection::vec(line, 1..3).prop_map(|l| l.join("\n")))
}

fn invocation() -> impl Strategy<Value = DependentInvocation> {
    (name(), prop::collection::vec(name(), 0..3)).prop_map(|(n, a)| DependentInvocation::new(n, a))
}

fn rules() -> impl Strategy<Value = Vec<Rule>> {
    let rule = |nested: BoxedStrategy<Vec<Rule>>| {
        (
            prop::collection::vec(source(), 1..3),
            prop::collection::vec(target(), 0..3),
            prop::collection::vec(invocation(), 0..2),
            nested,
            prop::option::of("[a-zA-Z ]{1,8}"),
            docs(),
        )
            .prop_map(|(sources, mut targets, dependents, rules, name, documentation)| {
                if !dependents.is_empty() || !rules.is_empty() {
                    for target in &mut targets {
                        if target.transform.as_ref().is_some_and(|t| !t.introduces_element()) {
                            target.transform = None;
                        }
                    }
                    targets.retain(|t| t.context.is_some() || t.transform.is_some());
                }
                Rule {
                    name: name.unwrap_or_default(),
                    sources,
                    targets,
                    dependents,
                    rules,
                    documentation,
                }
            })
    };
    let leaf = prop::collection::vec(rule(Just(Vec::new()).boxed()), 0..3);
    leaf.prop_recursive(2, 12, 3, move |inner| prop::collection::vec(rule(inner.boxed()), 0..3))
        .prop_map(|mut rules| {
            name_rules(&mut rules);
            rules
        })
}

/// Give unnamed rules their positional names
fn name_rules(rules: &mut [Rule]) {
    for (position, rule) in rules.iter_mut().enumerate() {
        if rule.name.is_empty() {
            rule.name = Rule::derived_name(&rule.sources, position + 1);
        }
        name_rules(&mut rule.rules);
    }
}

fn group() -> impl Strategy<Value = Group> {
    (
        name(),
        prop::collection::vec((any::<bool>(), name(), prop::option::of(name())), 1..4),
        prop::option::of(name()),
        prop::sample::select(vec![TypeMode::None, TypeMode::Types, TypeMode::TypeAndTypes]),
        rules(),
        docs(),
    )
        .prop_map(|(name, params, extends, type_mode, rules, documentation)| {
            let parameters = params
                .into_iter()
                .enumerate()
                .map(|(i, (is_source, n, t))| {
                    let n = format!("{n}{i}");
                    if is_source {
                        GroupParameter::source(n, t.as_deref())
                    } else {
                        GroupParameter::target(n, t.as_deref())
                    }
                })
                .collect();
            Group {
                name,
                parameters,
                extends,
                type_mode,
                rules,
                documentation,
            }
        })
}

fn metadata() -> impl Strategy<Value = Metadata> {
    prop::collection::vec(
        (
            prop::sample::select(vec!["url", "name", "title", "status", "publisher", "version"]),
            "[a-zA-Z0-9:/._-]{1,12}",
        ),
        0..4,
    )
    .prop_map(|entries| {
        let mut metadata = Metadata::default();
        for (key, value) in entries {
            metadata.set(key, value);
        }
        metadata
    })
}

fn concept_map() -> impl Strategy<Value = ConceptMap> {
    let relationship = prop::sample::select(vec![
        ConceptRelationship::Equivalent,
        ConceptRelationship::Equal,
        ConceptRelationship::Disjoint,
        ConceptRelationship::Wider,
        ConceptRelationship::Narrower,
        ConceptRelationship::Inexact,
    ]);
    (
        name(),
        prop::collection::vec((name(), text()), 0..3),
        prop::collection::vec((name(), "[A-Za-z0-9]{1,5}", relationship, name(), "[A-Za-z0-9]{1,5}"), 0..4),
    )
        .prop_map(|(name, prefixes, mappings)| ConceptMap {
            name,
            prefixes: prefixes
                .into_iter()
                .map(|(prefix, url)| ConceptMapPrefix { prefix, url })
                .collect(),
            mappings: mappings
                .into_iter()
                .map(|(sp, sc, relationship, tp, tc)| ConceptMapping {
                    source_prefix: sp,
                    source_code: sc,
                    relationship,
                    target_prefix: tp,
                    target_code: tc,
                })
                .collect(),
        })
}

fn mapping_definition() -> impl Strategy<Value = MappingDefinition> {
    let mode = prop::sample::select(vec![
        StructureMode::Source,
        StructureMode::Target,
        StructureMode::Queried,
        StructureMode::Produced,
    ]);
    (
        metadata(),
        prop::collection::vec((text(), prop::option::of(name()), mode), 0..3),
        prop::collection::vec(text(), 0..2),
        prop::collection::vec((name(), literal()), 0..3),
        prop::collection::vec(concept_map(), 0..2),
        prop::collection::vec(group(), 1..3),
    )
        .prop_map(|(metadata, structures, imports, constants, concept_maps, groups)| {
            MappingDefinition {
                metadata,
                structures: structures
                    .into_iter()
                    .map(|(url, alias, mode)| StructureDeclaration { url, alias, mode })
                    .collect(),
                imports,
                constants: constants
                    .into_iter()
                    .enumerate()
                    .map(|(i, (n, v))| Constant::new(format!("{n}{i}"), v))
                    .collect(),
                concept_maps: concept_maps
                    .into_iter()
                    .enumerate()
                    .map(|(i, mut cm)| {
                        cm.name = format!("{}{i}", cm.name);
                        cm
                    })
                    .collect(),
                groups: groups
                    .into_iter()
                    .enumerate()
                    .map(|(i, mut g)| {
                        g.name = format!("{}{i}", g.name);
                        g
                    })
                    .collect(),
            }
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_render_parse_round_trip(map in mapping_definition()) {
        let text = render(&map);
        let reparsed = parse(&text).map_err(|e| TestCaseError::fail(format!("{e}\n{text}")))?;
        prop_assert_eq!(reparsed, map);
    }

    #[test]
    fn prop_render_idempotent(map in mapping_definition()) {
        let once = render(&map);
        let reparsed = parse(&once).map_err(|e| TestCaseError::fail(format!("{e}\n{once}")))?;
        prop_assert_eq!(render(&reparsed), once);
    }

    #[test]
    fn prop_expression_round_trip(expr in expression()) {
        let text = render_expression(&expr);
        let reparsed = parse_expression(&text).map_err(|e| TestCaseError::fail(format!("{e}\n{text}")))?;
        prop_assert_eq!(reparsed, expr);
    }
}

#[test]
fn test_constants_keep_declaration_order() {
    let map = parse("let b = 2;\nlet a = 'x';\ngroup G(source s) { s; }").unwrap();
    let rendered = render(&map);
    assert_eq!(rendered, "let b = 2;\nlet a = 'x';\n\ngroup G(source s) {\n  s;\n}\n");
}

#[test]
fn test_group_docs_stay_out_of_the_header() {
    let map = parse("map \"http://x\" = \"M\"\n/// note = keep\ngroup G(source s) { s; }").unwrap();
    let rendered = render(&map);
    let reparsed = parse(&rendered).unwrap();
    assert_eq!(reparsed.groups[0].documentation.as_deref(), Some("note = keep"));
    assert_eq!(reparsed, map);
}

#[test]
fn test_metadata_shaped_docs_on_first_group() {
    let mut map = parse("group G(source s) { s; }").unwrap();
    map.groups[0].documentation = Some("status = draft\nmore".to_string());
    assert_eq!(parse(&render(&map)).unwrap(), map);
}
