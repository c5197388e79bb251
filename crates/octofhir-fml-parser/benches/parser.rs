//! Parser benchmarks using divan
//!
//! Tokenizing, parsing and rendering of expressions and whole maps.

use octofhir_fml_parser::{parse, parse_expression, render, tokenize};

fn main() {
    divan::main();
}

const SMALL_MAP: &str = r#"
group Main(source src, target tgt) {
  src.id as id -> tgt.id = id;
}
"#;

const PATIENT_MAP: &str = r#"
/// url = 'http://example.org/fhir/StructureMap/PatientTransfer'
/// name = 'PatientTransfer'

uses "http://example.org/StructureDefinition/LegacyPatient" alias Legacy as source
uses "http://hl7.org/fhir/StructureDefinition/Patient" alias Patient as target

conceptmap "sex" {
  prefix s = "http://example.org/legacy-sex"
  prefix t = "http://hl7.org/fhir/administrative-gender"

  s:M == t:male
  s:F == t:female
}

group Transfer(source src : Legacy, target tgt : Patient) {
  src.mrn as mrn -> tgt.identifier as id then {
    mrn -> id.system = 'http://example.org/mrn';
    mrn -> id.value = mrn;
  };
  src.name as n -> tgt.name as tn then Name(n, tn);
  src.sex as sex -> tgt.gender = translate(sex, '#sex', 'code');
  src.birth as b where (b.exists() and b > @1900-01-01) -> tgt.birthDate = b;
  src.phone as p -> tgt.telecom = cp('phone', p);
  src -> tgt.id = uuid();
}

group Name(source n : HumanName, target tn : HumanName) <<types>> {
  n.family as f -> tn.family = f;
  n.given as g where (g.length() > 0) -> tn.given = truncate(g, 35);
}
"#;

/// A map with `count` groups of ten rules each
fn generated_map(count: usize) -> String {
    let mut out = String::new();
    for g in 0..count {
        out.push_str(&format!("group G{g}(source src, target tgt) {{\n"));
        for r in 0..10 {
            out.push_str(&format!(
                "  src.e{r} as v{r} where (v{r}.exists()) -> tgt.e{r} = (v{r} + {r});\n"
            ));
        }
        out.push_str("}\n");
    }
    out
}

// === Expression Benchmarks ===

mod expressions {
    use super::*;

    #[divan::bench]
    fn path(bencher: divan::Bencher) {
        bencher.bench_local(|| parse_expression(divan::black_box("name.given.first()")));
    }

    #[divan::bench]
    fn filter(bencher: divan::Bencher) {
        bencher.bench_local(|| {
            parse_expression(divan::black_box(
                "telecom.where(system = 'phone' and use != 'old').value",
            ))
        });
    }

    #[divan::bench]
    fn nested_arithmetic(bencher: divan::Bencher) {
        bencher.bench_local(|| {
            parse_expression(divan::black_box("((1 + 2) * (3 - 4)) / ((5 + 6) * (7 - 8))"))
        });
    }
}

// === Document Benchmarks ===

mod documents {
    use super::*;

    #[divan::bench]
    fn tokenize_patient_map(bencher: divan::Bencher) {
        bencher.bench_local(|| tokenize(divan::black_box(PATIENT_MAP)));
    }

    #[divan::bench]
    fn parse_small_map(bencher: divan::Bencher) {
        bencher.bench_local(|| parse(divan::black_box(SMALL_MAP)));
    }

    #[divan::bench]
    fn parse_patient_map(bencher: divan::Bencher) {
        bencher.bench_local(|| parse(divan::black_box(PATIENT_MAP)));
    }

    #[divan::bench(args = [1, 10, 50])]
    fn parse_generated(bencher: divan::Bencher, groups: usize) {
        let source = generated_map(groups);
        bencher.bench_local(|| parse(divan::black_box(&source)));
    }
}

// === Rendering Benchmarks ===

mod rendering {
    use super::*;

    #[divan::bench]
    fn render_patient_map(bencher: divan::Bencher) {
        let map = parse(PATIENT_MAP).unwrap();
        bencher.bench_local(|| render(divan::black_box(&map)));
    }

    #[divan::bench]
    fn round_trip_patient_map(bencher: divan::Bencher) {
        bencher.bench_local(|| {
            let map = parse(divan::black_box(PATIENT_MAP)).unwrap();
            render(&map)
        });
    }
}
