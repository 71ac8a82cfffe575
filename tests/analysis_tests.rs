// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::process::Command;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use test_log::test;

use cspta::ir::builder::ProgramBuilder;
use cspta::ir::loader::load_program_from_file;
use cspta::ir::program::{AllocSiteId, CallSiteId, MethodId, Program, Stmt, TypeId, VarId};
use cspta::ir::ProgramManager;
use cspta::pta::context_sensitive::ContextSensitivePTA;
use cspta::pta::context_strategy::{ContextInsensitive, ContextSelector, KCallSiteSensitive, KObjectSensitive};
use cspta::pta::heap_model::{AllocationSiteHeapModel, HeapModel, TypeBasedHeapModel};
use cspta::pta::PointerAnalysis;

fn input_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("unit_tests")
        .join(name)
}

fn load(name: &str) -> Program {
    load_program_from_file(input_path(name)).unwrap()
}

fn analyze<'p, S: ContextSelector, H: HeapModel>(
    program: &'p Program,
    selector: S,
    heap_model: H,
) -> ContextSensitivePTA<'p, S, H> {
    let mut pta = ContextSensitivePTA::new(program, selector, heap_model);
    pta.analyze().unwrap();
    pta
}

fn var(program: &Program, method: &str, name: &str) -> VarId {
    let method = program.find_method(method).unwrap();
    program.find_var(method, name).unwrap()
}

/// Type names of the objects `var` may point to.
fn pointee_types<S: ContextSelector, H: HeapModel>(
    program: &Program,
    pta: &ContextSensitivePTA<S, H>,
    var: VarId,
) -> Vec<String> {
    pta.objects_of_var(var)
        .into_iter()
        .map(|obj| program.ty(pta.cs_manager().obj(obj).ty).name.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn callsites_of(program: &Program, method: &str) -> Vec<CallSiteId> {
    let method = program.find_method(method).unwrap();
    program
        .method(method)
        .stmts
        .iter()
        .filter_map(|stmt| match stmt {
            Stmt::Call(cs) => Some(*cs),
            _ => None,
        })
        .collect()
}

/// Names of the methods a call site may invoke under any context.
fn callees<S: ContextSelector, H: HeapModel>(
    program: &Program,
    pta: &ContextSensitivePTA<S, H>,
    callsite: CallSiteId,
) -> Vec<String> {
    let csm = pta.cs_manager();
    pta.call_graph()
        .edges()
        .filter(|edge| csm.cs_callsite(edge.callsite).callsite == callsite)
        .map(|edge| program.method_name(csm.cs_method(edge.callee).method))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Allocation sites of the objects `var` may point to. Object ids are
/// local to one analysis run, allocation sites are not.
fn pointee_sites<S: ContextSelector, H: HeapModel>(pta: &ContextSensitivePTA<S, H>, var: VarId) -> BTreeSet<AllocSiteId> {
    pta.objects_of_var(var)
        .into_iter()
        .filter_map(|obj| pta.cs_manager().obj(obj).alloc_site())
        .collect()
}

fn reachable_methods<S: ContextSelector, H: HeapModel>(pta: &ContextSensitivePTA<S, H>) -> BTreeSet<MethodId> {
    pta.call_graph()
        .reach_funcs()
        .map(|m| pta.cs_manager().cs_method(m).method)
        .collect()
}

#[test]
fn callsite_sensitivity_resolves_dynamic_calls() {
    let program = load("cs_call.json");
    let for_cs1_calls = callsites_of(&program, "Main.for_cs1");
    let for_cs2_calls = callsites_of(&program, "Main.for_cs2");
    let draw_calls_1 = &for_cs1_calls[2..];
    let draw_calls_2 = &for_cs2_calls[2..];
    let both = vec!["Circle.draw".to_string(), "Rectangle.draw".to_string()];

    let ci = analyze(&program, ContextInsensitive, AllocationSiteHeapModel);
    for cs in draw_calls_1.iter().chain(draw_calls_2) {
        assert_eq!(callees(&program, &ci, *cs), both);
    }

    let cs1 = analyze(&program, KCallSiteSensitive::new(1), AllocationSiteHeapModel);
    assert_eq!(callees(&program, &cs1, draw_calls_1[0]), vec!["Circle.draw"]);
    assert_eq!(callees(&program, &cs1, draw_calls_1[1]), vec!["Rectangle.draw"]);
    // `id2` calls `id` from a single call site
    for cs in draw_calls_2 {
        assert_eq!(callees(&program, &cs1, *cs), both);
    }

    let cs2 = analyze(&program, KCallSiteSensitive::new(2), AllocationSiteHeapModel);
    assert_eq!(callees(&program, &cs2, draw_calls_2[0]), vec!["Circle.draw"]);
    assert_eq!(callees(&program, &cs2, draw_calls_2[1]), vec!["Rectangle.draw"]);
    assert_eq!(reachable_methods(&cs2), reachable_methods(&ci));
}

#[test]
fn object_sensitivity_separates_receivers() {
    let program = load("obj_sens.json");
    let x = var(&program, "Main.main", "x");
    let y = var(&program, "Main.main", "y");

    let ci = analyze(&program, ContextInsensitive, AllocationSiteHeapModel);
    assert_eq!(pointee_types(&program, &ci, x), vec!["A", "C"]);
    assert_eq!(pointee_types(&program, &ci, y), vec!["A", "C"]);

    // `put` reaches `set` through one call site
    let cs1 = analyze(&program, KCallSiteSensitive::new(1), AllocationSiteHeapModel);
    assert_eq!(pointee_types(&program, &cs1, x), vec!["A", "C"]);

    let cs2 = analyze(&program, KCallSiteSensitive::new(2), AllocationSiteHeapModel);
    assert_eq!(pointee_types(&program, &cs2, x), vec!["A"]);
    assert_eq!(pointee_types(&program, &cs2, y), vec!["C"]);

    let obj1 = analyze(&program, KObjectSensitive::new(1), AllocationSiteHeapModel);
    assert_eq!(pointee_types(&program, &obj1, x), vec!["A"]);
    assert_eq!(pointee_types(&program, &obj1, y), vec!["C"]);
}

#[test]
fn special_calls_bind_receiver() {
    let program = load("special_call.json");
    let pta = analyze(&program, KCallSiteSensitive::new(1), AllocationSiteHeapModel);

    let n = var(&program, "Main.main", "n");
    let m = var(&program, "Main.main", "m");
    assert_eq!(pointee_types(&program, &pta, n), vec!["Node"]);
    assert!(pointee_types(&program, &pta, m).is_empty());

    let init_calls = callsites_of(&program, "Main.main");
    assert_eq!(callees(&program, &pta, init_calls[0]), vec!["Leaf.init"]);
    let super_init = callsites_of(&program, "Leaf.init")[0];
    assert_eq!(callees(&program, &pta, super_init), vec!["Node.init"]);
    assert_eq!(reachable_methods(&pta).len(), 4);
}

#[test]
fn type_based_heap_merges_allocations() {
    let program = load("cs_call.json");
    let pta = analyze(&program, ContextInsensitive, TypeBasedHeapModel);
    assert_eq!(pta.cs_manager().num_objs(), 2);
    let c1 = var(&program, "Main.for_cs1", "c");
    let c2 = var(&program, "Main.for_cs2", "c");
    assert_eq!(pta.objects_of_var(c1), pta.objects_of_var(c2));
}

struct RandomProgram {
    program: Program,
    vars: Vec<VarId>,
}

/// Generates a well-formed program of static methods and one class
/// hierarchy, so that no call can fail to resolve.
fn random_program(seed: u64) -> RandomProgram {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut b = ProgramBuilder::new();
    let main_ty = b.add_type("Main", None);
    let base = b.add_type("Base", None);
    let sub1 = b.add_type("Sub1", Some(base));
    let sub2 = b.add_type("Sub2", Some(base));
    let classes: [TypeId; 3] = [base, sub1, sub2];
    let fields = [b.field("f"), b.field("g")];

    let main = b.add_static_method(main_ty, "main", &[]);
    let statics = (0..3)
        .map(|i| b.add_static_method(main_ty, &format!("s{}", i), &["p"]))
        .collect::<Vec<_>>();
    let base_m = b.add_method(base, "m", &["p"]);
    let sub1_m = b.add_method(sub1, "m", &["p"]);

    let mut vars = Vec::new();
    let bodies = std::iter::once(main)
        .chain(statics.iter().copied())
        .chain([base_m, sub1_m])
        .collect::<Vec<_>>();
    for method in bodies {
        let mut locals = (0..4).map(|i| b.var(method, &format!("v{}", i))).collect::<Vec<_>>();
        locals.extend(b.params(method).iter().copied());
        locals.extend(b.this_var(method));
        vars.extend(locals.iter().copied());
        let pick = |rng: &mut StdRng| locals[rng.gen_range(0..locals.len())];

        for _ in 0..10 {
            let to = pick(&mut rng);
            let from = pick(&mut rng);
            let field = fields[rng.gen_range(0..fields.len())];
            match rng.gen_range(0..6) {
                0 => {
                    b.new_obj(method, to, classes[rng.gen_range(0..classes.len())]);
                }
                1 => b.assign(method, to, from),
                2 => b.load(method, to, from, field),
                3 => b.store(method, to, field, from),
                4 => {
                    let callee = statics[rng.gen_range(0..statics.len())];
                    b.call_static(method, callee, &[from], Some(to));
                }
                _ => {
                    let recv = pick(&mut rng);
                    b.call_virtual(method, recv, base_m, &[from], Some(to));
                }
            }
        }
        let ret = pick(&mut rng);
        b.ret(method, ret);
    }
    b.add_entry(main);
    RandomProgram {
        program: b.build(),
        vars,
    }
}

#[test]
fn context_sensitive_results_refine_insensitive_ones() {
    for seed in 0..20 {
        let RandomProgram { program, vars } = random_program(seed);
        let ci = analyze(&program, ContextInsensitive, AllocationSiteHeapModel);
        let cs = analyze(&program, KCallSiteSensitive::new(2), AllocationSiteHeapModel);
        let obj = analyze(&program, KObjectSensitive::new(1), AllocationSiteHeapModel);

        assert!(reachable_methods(&cs).is_subset(&reachable_methods(&ci)), "seed {}", seed);
        assert!(reachable_methods(&obj).is_subset(&reachable_methods(&ci)), "seed {}", seed);
        for &v in &vars {
            let ci_sites = pointee_sites(&ci, v);
            for refined in [pointee_sites(&cs, v), pointee_sites(&obj, v)] {
                assert!(
                    refined.is_subset(&ci_sites),
                    "seed {}: {} is not refined",
                    seed,
                    program.var_name(v)
                );
            }
        }
    }
}

fn run_pta(args: &[&str], pta_flags: Option<&str>) -> std::process::Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_pta"));
    cmd.args(args);
    match pta_flags {
        Some(flags) => cmd.env("PTA_FLAGS", flags),
        None => cmd.env_remove("PTA_FLAGS"),
    };
    cmd.output().unwrap()
}

#[test]
fn cli_dumps_points_to_results() {
    let input = input_path("obj_sens.json");
    let input = input.to_str().unwrap();

    let output = run_pta(&["--pta-type", "ci", "--dump-pts", "stdout", input], None);
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Main.main/x ==> { NewObj#2<A>@Main.main NewObj#3<C>@Main.main }"));

    // the command line overrides PTA_FLAGS
    let output = run_pta(
        &["--pta-type", "obj", "--dump-pts", "stdout", input],
        Some(r#"["--pta-type", "ci", "--dump-stats"]"#),
    );
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Main.main/x ==> { NewObj#2<A>@Main.main }"));
    assert!(stdout.contains("CS Points-to Statistics"));
}

#[test]
fn cli_entry_override_and_failures() {
    let input = input_path("obj_sens.json");
    let input = input.to_str().unwrap();

    let output = run_pta(&["--entry-func", "Box.get", "--dump-stats", input], None);
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("#Reachable CI methods: 1"));

    assert!(!run_pta(&["--entry-func", "Box.nothing", input], None).status.success());
    assert!(!run_pta(&["no_such_file.json"], None).status.success());
    assert!(!run_pta(&[input], Some("not json")).status.success());
}
