//! Whole-pipeline scenarios on small hand-built fabrics.

use spnr_config::{FirstCut, MrrgConfig, ObjectiveKind, PnrConfig, PopcountEncoding};
use spnr_diagnostics::DiagnosticSink;
use spnr_fabric::{Address, Fabric, FabricBuilder, Location};
use spnr_ir::Design;
use spnr_mrrg::{build_mrrg, Mrrg, MrrgOptions};
use spnr_pnr::session::{PLACEMENT_FROZEN, STOPPED_EARLY};
use spnr_pnr::{
    place_and_route, Constraint, Feasibility, NodeFilter, Objective, OptimizeOptions, PnrSession,
    VarKey,
};
use spnr_smt::SatResult;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

const L: Location = Location::new(0, 0);

fn at(element: &str, port: &str) -> Address {
    Address::new(L, element, port)
}

fn design(ops: &[(&str, &str)], ties: &[(&str, &str, u32)], dup: &[&str]) -> Design {
    let ops: BTreeMap<String, String> = ops
        .iter()
        .map(|(n, o)| (n.to_string(), o.to_string()))
        .collect();
    let ties: Vec<_> = ties
        .iter()
        .map(|(s, d, o)| (s.to_string(), d.to_string(), *o))
        .collect();
    let dup: BTreeSet<String> = dup.iter().map(|s| s.to_string()).collect();
    Design::new(&ops, &ties, &dup).unwrap()
}

fn mrrg(fabric: &Fabric, contexts: u32) -> Mrrg {
    let options = MrrgOptions {
        contexts,
        ..MrrgOptions::default()
    };
    build_mrrg(fabric, &options).unwrap()
}

/// `k` (const) reaches `u.a` through `mA`, directly or by way of `mB`.
fn detour_fabric() -> Fabric {
    let mut b = FabricBuilder::new();
    b.functional_unit(L, "k", &["const"], &[])
        .functional_unit(L, "u", &["add"], &["a", "b"])
        .mux(L, "mA", 2)
        .mux(L, "mB", 1)
        .connect(at("k", "out"), at("mA", "in0"))
        .connect(at("k", "out"), at("mB", "in0"))
        .connect(at("mB", "out"), at("mA", "in1"))
        .connect(at("mA", "out"), at("u", "a"));
    b.build().unwrap()
}

/// `k` reaches each of `u1.a` and `u2.a` through its own chain of four
/// muxes, so every mapping of `const_into_add` uses exactly four.
fn long_chain_fabric() -> Fabric {
    let mut b = FabricBuilder::new();
    b.functional_unit(L, "k", &["const"], &[]);
    for (unit, chain) in [("u1", ["m1", "m2", "m3", "m4"]), ("u2", ["n1", "n2", "n3", "n4"])] {
        b.functional_unit(L, unit, &["add"], &["a"]);
        let mut prev = at("k", "out");
        for mux in chain {
            b.mux(L, mux, 1).connect(prev, at(mux, "in0"));
            prev = at(mux, "out");
        }
        b.connect(prev, at(unit, "a"));
    }
    b.build().unwrap()
}

fn emitted(sink: &DiagnosticSink, code: spnr_diagnostics::DiagnosticCode) -> bool {
    sink.diagnostics().iter().any(|d| d.code == code)
}

fn const_into_add() -> Design {
    design(&[("c", "const"), ("s", "add")], &[("c", "s", 0)], &[])
}

fn optimize_config(encoding: PopcountEncoding, incremental: bool) -> PnrConfig {
    let mut config = PnrConfig::default();
    config.optimize.enabled = true;
    config.optimize.objective = ObjectiveKind::Mux;
    config.optimize.encoding = encoding;
    config.optimize.incremental = incremental;
    config
}

#[test]
fn single_add() {
    let mut b = FabricBuilder::new();
    b.functional_unit(L, "alu", &["add", "sub"], &["a", "b"]);
    let g = mrrg(&b.build().unwrap(), 1);
    let d = design(&[("x", "add")], &[], &[]);
    let sink = DiagnosticSink::new();
    let outcome = place_and_route(&g, &d, &PnrConfig::default(), &sink).unwrap();
    let solution = outcome.solution.unwrap();
    let x = d.op_by_name("x").unwrap().id;
    assert_eq!(g.node(solution.placements[&x][0]).name, "FunctionalUnit_alu_0_0_0");
    assert!(solution.paths.is_empty());
    assert_eq!(outcome.solver_calls, 1);
}

#[test]
fn chain_without_muxes() {
    let mut b = FabricBuilder::new();
    b.functional_unit(L, "k", &["const"], &[])
        .functional_unit(L, "u1", &["add"], &["a"])
        .functional_unit(L, "u2", &["add"], &["a"])
        .connect(at("k", "out"), at("u1", "a"))
        .connect(at("u1", "out"), at("u2", "a"));
    let g = mrrg(&b.build().unwrap(), 1);
    let d = design(
        &[("c", "const"), ("s1", "add"), ("s2", "add")],
        &[("c", "s1", 0), ("s1", "s2", 0)],
        &[],
    );
    let sink = DiagnosticSink::new();
    let config = optimize_config(PopcountEncoding::BitHack, false);
    let outcome = place_and_route(&g, &d, &config, &sink).unwrap();
    let opt = outcome.optimization.unwrap();
    assert!(opt.sat);
    assert_eq!((opt.lower, opt.upper), (0, 0));
    assert!(opt.proven_optimal);
    assert_eq!(opt.iterations, 0);
    let solution = outcome.solution.unwrap();
    assert_eq!(solution.paths.len(), 2);
    assert!(solution.used_nodes().iter().all(|&n| !g.node(n).is_mux()));
}

#[test]
fn fan_out_splits_at_muxes() {
    let mut b = FabricBuilder::new();
    b.functional_unit(L, "k", &["const"], &[])
        .functional_unit(L, "u1", &["add"], &["a"])
        .functional_unit(L, "u2", &["add"], &["a"])
        .mux(L, "m1", 1)
        .mux(L, "m2", 1)
        .connect(at("k", "out"), at("m1", "in0"))
        .connect(at("k", "out"), at("m2", "in0"))
        .connect(at("m1", "out"), at("u1", "a"))
        .connect(at("m2", "out"), at("u2", "a"));
    let g = mrrg(&b.build().unwrap(), 1);
    let d = design(
        &[("c", "const"), ("s1", "add"), ("s2", "add")],
        &[("c", "s1", 0), ("c", "s2", 0)],
        &[],
    );
    let sink = DiagnosticSink::new();
    let mut session = PnrSession::new(&g, &d, &sink);
    session.declare_variables().unwrap();
    session.assert_constraints(&Constraint::ALL).unwrap();
    assert_eq!(session.solve().unwrap(), SatResult::Sat);
    let model = session.extract_model().unwrap();
    let solution = session.verify(&model).unwrap();
    assert_eq!(solution.paths.len(), 2);

    let value = &d.values()[0];
    for mux in ["Mux_m1_0_0_0", "Mux_m2_0_0_0"] {
        let id = g.node_by_name(mux).unwrap().id;
        assert!(model.is_set(VarKey::Route(id, value.id)));
        let tags = value
            .dsts
            .iter()
            .filter(|&&t| model.is_set(VarKey::RouteTo(id, value.id, t)))
            .count();
        assert_eq!(tags, 1, "{mux} must serve exactly one terminal");
    }
}

#[test]
fn pigeonhole_makes_no_solver_calls() {
    let mut b = FabricBuilder::new();
    b.functional_unit(L, "alu", &["add"], &[]);
    let g = mrrg(&b.build().unwrap(), 1);
    let d = design(&[("x", "add"), ("y", "add")], &[], &[]);
    let sink = DiagnosticSink::new();
    let outcome = place_and_route(&g, &d, &PnrConfig::default(), &sink).unwrap();
    assert!(matches!(outcome.feasibility, Feasibility::Infeasible { .. }));
    assert!(!outcome.is_sat());
    assert_eq!(outcome.solver_calls, 0);
    assert_eq!(sink.error_count(), 1);
}

#[test]
fn optimizer_bounds_are_monotonic() {
    let g = mrrg(&detour_fabric(), 1);
    let d = const_into_add();
    let sink = DiagnosticSink::new();
    let mut session = PnrSession::new(&g, &d, &sink);
    let objective = Objective::new(NodeFilter::Mux, PopcountEncoding::BitHack);
    let outcome = session
        .optimize(&objective, &OptimizeOptions::default())
        .unwrap();
    assert!(outcome.sat);
    for pair in outcome.history.windows(2) {
        assert!(pair[1].0 >= pair[0].0);
        assert!(pair[1].1 <= pair[0].1);
    }
    assert_eq!((outcome.lower, outcome.upper), (1, 1));
    assert!(outcome.proven_optimal);
    let model = outcome.model.unwrap();
    assert_eq!(objective.eval(&g, &d, &model).unwrap(), outcome.upper);
}

#[test]
fn incremental_matches_rebuilding() {
    let g = mrrg(&detour_fabric(), 1);
    let d = const_into_add();
    let mut uppers = Vec::new();
    for incremental in [false, true] {
        let sink = DiagnosticSink::new();
        let config = optimize_config(PopcountEncoding::Ite, incremental);
        let outcome = place_and_route(&g, &d, &config, &sink).unwrap();
        let opt = outcome.optimization.unwrap();
        assert!(opt.proven_optimal);
        uppers.push(opt.upper);
    }
    assert_eq!(uppers, vec![1, 1]);
}

#[test]
fn encodings_reach_the_same_optimum() {
    let g = mrrg(&detour_fabric(), 1);
    let d = const_into_add();
    for encoding in [
        PopcountEncoding::Ite,
        PopcountEncoding::ZeroExtend,
        PopcountEncoding::BitHack,
        PopcountEncoding::Shannon,
    ] {
        let sink = DiagnosticSink::new();
        let outcome = place_and_route(&g, &d, &optimize_config(encoding, true), &sink).unwrap();
        let opt = outcome.optimization.unwrap();
        assert_eq!((opt.lower, opt.upper), (1, 1), "{encoding:?}");
    }
}

#[test]
fn iteration_budget_stops_early() {
    let g = mrrg(&detour_fabric(), 1);
    let d = const_into_add();
    let sink = DiagnosticSink::new();
    let mut session = PnrSession::new(&g, &d, &sink);
    let objective = Objective::new(NodeFilter::Mux, PopcountEncoding::Shannon);
    let options = OptimizeOptions {
        max_iterations: Some(0),
        ..OptimizeOptions::default()
    };
    let outcome = session.optimize(&objective, &options).unwrap();
    assert!(outcome.sat);
    assert_eq!(outcome.iterations, 0);
    assert_eq!(outcome.history.len(), 1);
    assert!(outcome.upper >= 1);
    assert!(!outcome.proven_optimal);
}

#[test]
fn duplicated_constant_stays_on_capable_units() {
    let mut b = FabricBuilder::new();
    b.functional_unit(L, "k1", &["const"], &[])
        .functional_unit(L, "k2", &["const"], &[])
        .functional_unit(L, "u1", &["add"], &["a"])
        .functional_unit(L, "u2", &["add"], &["a"])
        .mux(L, "m1", 2)
        .mux(L, "m2", 1)
        .connect(at("k1", "out"), at("m1", "in0"))
        .connect(at("u2", "out"), at("m1", "in1"))
        .connect(at("k2", "out"), at("m2", "in0"))
        .connect(at("m1", "out"), at("u1", "a"))
        .connect(at("m2", "out"), at("u2", "a"));
    let g = mrrg(&b.build().unwrap(), 1);
    let d = design(
        &[("c", "const"), ("s1", "add"), ("s2", "add")],
        &[("c", "s1", 0), ("c", "s2", 0)],
        &["const"],
    );
    let sink = DiagnosticSink::new();
    let outcome = place_and_route(&g, &d, &PnrConfig::default(), &sink).unwrap();
    let solution = outcome.solution.unwrap();
    let c = d.op_by_name("c").unwrap().id;
    let hosts: Vec<&str> = solution.placements[&c]
        .iter()
        .map(|&n| g.node(n).name.as_str())
        .collect();
    assert_eq!(hosts, ["FunctionalUnit_k1_0_0_0", "FunctionalUnit_k2_0_0_0"]);
    for path in &solution.paths {
        assert!(g.node(path.source()).name.starts_with("FunctionalUnit_k"));
    }
}

#[test]
fn second_context_doubles_supply() {
    let mut b = FabricBuilder::new();
    b.functional_unit(L, "alu", &["add"], &[]);
    let fabric = b.build().unwrap();
    let d = design(&[("x", "add"), ("y", "add")], &[], &[]);

    let one = mrrg(&fabric, 1);
    let sink = DiagnosticSink::new();
    let outcome = place_and_route(&one, &d, &PnrConfig::default(), &sink).unwrap();
    assert!(!outcome.is_sat());

    let two = mrrg(&fabric, 2);
    let sink = DiagnosticSink::new();
    let outcome = place_and_route(&two, &d, &PnrConfig::default(), &sink).unwrap();
    let solution = outcome.solution.unwrap();
    let contexts: BTreeSet<u32> = solution
        .placements
        .values()
        .map(|units| two.node(units[0]).context)
        .collect();
    assert_eq!(contexts.len(), 2);
}

#[test]
fn register_carries_value_into_next_context() {
    let mut b = FabricBuilder::new();
    b.functional_unit(L, "k", &["const"], &[])
        .functional_unit(L, "u", &["add"], &["a"])
        .register(L, "r")
        .connect(at("k", "out"), at("r", "in"))
        .connect(at("r", "out"), at("u", "a"));
    let fabric = b.build().unwrap();
    let d = const_into_add();
    let config = PnrConfig {
        mrrg: MrrgConfig {
            contexts: 2,
            ..MrrgConfig::default()
        },
        ..PnrConfig::default()
    };
    let g = build_mrrg(&fabric, &MrrgOptions::from(&config.mrrg)).unwrap();
    let sink = DiagnosticSink::new();
    let outcome = place_and_route(&g, &d, &config, &sink).unwrap();
    let solution = outcome.solution.unwrap();
    let path = &solution.paths[0];
    assert_eq!(path.nodes.len(), 3);
    let source = g.node(path.source()).context;
    let sink_ctx = g.node(path.sink()).context;
    assert!(g.node(path.nodes[1]).is_register());
    assert_eq!(sink_ctx, (source + 1) % 2);
}

#[test]
fn unroutable_design_is_unsat() {
    let mut b = FabricBuilder::new();
    b.functional_unit(L, "k", &["const"], &[])
        .functional_unit(L, "u", &["add"], &["a"]);
    let g = mrrg(&b.build().unwrap(), 1);
    let d = const_into_add();
    let sink = DiagnosticSink::new();
    let outcome = place_and_route(&g, &d, &PnrConfig::default(), &sink).unwrap();
    assert_eq!(outcome.feasibility, Feasibility::Feasible);
    assert!(!outcome.is_sat());
    assert_eq!(outcome.solver_calls, 1);
}

#[test]
fn freezing_keeps_the_global_lower_bound() {
    let g = mrrg(&long_chain_fabric(), 1);
    let d = const_into_add();
    let objective = Objective::new(NodeFilter::Mux, PopcountEncoding::BitHack);
    for incremental in [true, false] {
        let sink = DiagnosticSink::new();
        let mut session = PnrSession::new(&g, &d, &sink);
        let options = OptimizeOptions {
            incremental,
            cutoff: Some(0.5),
            freeze_placement: true,
            final_cutoff: 0.0,
            first_cut: FirstCut::Midpoint,
            ..OptimizeOptions::default()
        };
        let outcome = session.optimize(&objective, &options).unwrap();
        assert!(outcome.frozen, "incremental={incremental}");
        assert!(emitted(&sink, PLACEMENT_FROZEN));
        // Probe at 1 fails before the freeze; probes at 2 and 3 fail after it.
        assert_eq!(outcome.history, vec![(0, 4), (2, 4), (3, 4), (4, 4)]);
        assert_eq!((outcome.lower, outcome.upper), (2, 4));
        assert_eq!(outcome.frozen_lower, Some(4));
        assert!(!outcome.proven_optimal);
        assert_eq!(outcome.iterations, 3);

        let model = outcome.model.unwrap();
        let solution = session.verify(&model).unwrap();
        let s = d.op_by_name("s").unwrap().id;
        assert_eq!(solution.placements[&s].len(), 1);
        assert_eq!(objective.eval(&g, &d, &model).unwrap(), 4);
    }
}

#[test]
fn cutoff_stops_the_search() {
    let g = mrrg(&long_chain_fabric(), 1);
    let d = const_into_add();
    let sink = DiagnosticSink::new();
    let mut session = PnrSession::new(&g, &d, &sink);
    let objective = Objective::new(NodeFilter::Mux, PopcountEncoding::Ite);
    let options = OptimizeOptions {
        cutoff: Some(0.3),
        first_cut: FirstCut::Midpoint,
        ..OptimizeOptions::default()
    };
    let outcome = session.optimize(&objective, &options).unwrap();
    // [2, 4] is a gap of 0.5; [3, 4] is 0.25 and stops the loop.
    assert_eq!(outcome.history, vec![(0, 4), (2, 4), (3, 4)]);
    assert_eq!((outcome.lower, outcome.upper), (3, 4));
    let gap = (outcome.upper - outcome.lower) as f64 / outcome.upper as f64;
    assert!(gap <= 0.3);
    assert!(!outcome.frozen);
    assert_eq!(outcome.frozen_lower, None);
    assert!(!outcome.proven_optimal);
    assert!(emitted(&sink, STOPPED_EARLY));
    assert!(!emitted(&sink, PLACEMENT_FROZEN));
}

#[test]
fn zero_time_budget_keeps_the_first_model() {
    let g = mrrg(&long_chain_fabric(), 1);
    let d = const_into_add();
    let sink = DiagnosticSink::new();
    let mut session = PnrSession::new(&g, &d, &sink);
    let objective = Objective::new(NodeFilter::Mux, PopcountEncoding::ZeroExtend);
    let options = OptimizeOptions {
        time_budget: Some(Duration::ZERO),
        ..OptimizeOptions::default()
    };
    let outcome = session.optimize(&objective, &options).unwrap();
    assert!(outcome.sat);
    assert_eq!(outcome.iterations, 0);
    assert_eq!(outcome.history, vec![(0, 4)]);
    assert_eq!(session.solver_calls(), 1);
    assert!(!outcome.proven_optimal);
    assert!(emitted(&sink, STOPPED_EARLY));
    assert!(session.verify(&outcome.model.unwrap()).is_ok());
}
