//! Directive overrides and the marked-pure contract check end to end.

mod common;

use pretty_assertions::assert_eq;

use puremark::diagnostics::CollectSink;
use puremark::model::{MemberDef, Snapshot, SymbolId, TypeDef};
use puremark::model::syntax::{Call, Expr, Stmt};
use puremark::{PurityChecker, PurityResolver, Verdict};

#[test]
fn assume_pure_overrides_an_impure_body() {
    let snapshot = Snapshot::builder()
        .ty(TypeDef::new("Legacy"))
        .ty(TypeDef::new("Api"))
        .member(MemberDef::field("Legacy", "hits").static_())
        .member(
            MemberDef::method("Legacy", "Touch")
                .static_()
                .assume_pure()
                .body(vec![common::static_write(SymbolId::new("Legacy", "hits"))]),
        )
        .member(
            MemberDef::method("Api", "Use")
                .static_()
                .body(vec![common::static_call(SymbolId::new("Legacy", "Touch"))]),
        )
        .build()
        .unwrap();
    common::init_logging();
    let resolver = PurityResolver::new(&snapshot);
    assert_eq!(
        resolver.resolve(&SymbolId::new("Legacy", "Touch")).verdict,
        Verdict::Pure
    );
    assert_eq!(
        resolver.resolve(&SymbolId::new("Api", "Use")).verdict,
        Verdict::Pure
    );
}

#[test]
fn returns_fresh_makes_an_opaque_factory_usable() {
    // An opaque factory annotated fresh: its result counts as local, so
    // instance mutation of that result stays invisible.
    let snapshot = Snapshot::builder()
        .ty(TypeDef::new("Widget"))
        .ty(TypeDef::new("Factory"))
        .ty(TypeDef::new("Api"))
        .member(MemberDef::field("Widget", "state"))
        .member(
            MemberDef::method("Widget", "Taint")
                .body(vec![common::own_field_write(SymbolId::new(
                    "Widget", "state",
                ))]),
        )
        .member(
            MemberDef::method("Factory", "Create")
                .static_()
                .returns_fresh()
                .returns("Widget")
                .opaque(),
        )
        .member(
            MemberDef::method("Api", "Build")
                .static_()
                .body(vec![
                    Stmt::Let {
                        name: "w".to_string(),
                        value: Expr::Call(Call::static_call(
                            SymbolId::new("Factory", "Create"),
                            vec![],
                        )),
                    },
                    common::call_on(SymbolId::new("Widget", "Taint"), Expr::local("w")),
                ]),
        )
        .build()
        .unwrap();
    let resolver = PurityResolver::new(&snapshot);
    assert_eq!(
        resolver.resolve(&SymbolId::new("Api", "Build")).verdict,
        Verdict::Pure
    );
}

#[test]
fn unannotated_opaque_factory_result_stays_external() {
    let snapshot = Snapshot::builder()
        .ty(TypeDef::new("Widget"))
        .ty(TypeDef::new("Factory"))
        .ty(TypeDef::new("Api"))
        .member(MemberDef::field("Widget", "state"))
        .member(
            MemberDef::method("Widget", "Taint")
                .body(vec![common::own_field_write(SymbolId::new(
                    "Widget", "state",
                ))]),
        )
        .member(
            MemberDef::method("Factory", "Create")
                .static_()
                .returns("Widget")
                .assume_pure()
                .opaque(),
        )
        .member(
            MemberDef::method("Api", "Build")
                .static_()
                .body(vec![
                    Stmt::Let {
                        name: "w".to_string(),
                        value: Expr::Call(Call::static_call(
                            SymbolId::new("Factory", "Create"),
                            vec![],
                        )),
                    },
                    common::call_on(SymbolId::new("Widget", "Taint"), Expr::local("w")),
                ]),
        )
        .build()
        .unwrap();
    let resolver = PurityResolver::new(&snapshot);
    // The call itself is trusted pure, but its result came from outside the
    // member, so mutating it is an external-object mutation.
    assert_eq!(
        resolver.resolve(&SymbolId::new("Api", "Build")).verdict,
        Verdict::Impure
    );
}

#[test]
fn checker_reports_each_violating_member_once_in_symbol_order() {
    let snapshot = Snapshot::builder()
        .ty(TypeDef::new("Svc"))
        .member(MemberDef::field("Svc", "log").static_())
        .member(
            MemberDef::method("Svc", "Alpha")
                .static_()
                .marked_pure()
                .at("svc.src", 3)
                .body(vec![common::static_write(SymbolId::new("Svc", "log"))]),
        )
        .member(
            MemberDef::method("Svc", "Beta")
                .static_()
                .marked_pure()
                .body(vec![Stmt::Return(Some(Expr::Constant))]),
        )
        .member(
            MemberDef::method("Svc", "Gamma")
                .static_()
                .marked_pure()
                .body(vec![common::static_call(SymbolId::new("Svc", "Alpha"))]),
        )
        .build()
        .unwrap();
    let checker = PurityChecker::new(&snapshot);
    let sink = CollectSink::new();
    let count = checker.check_all(&sink);
    let diagnostics = sink.into_inner();

    assert_eq!(count, 2);
    assert_eq!(diagnostics.len(), 2);
    assert_eq!(diagnostics[0].symbol, SymbolId::new("Svc", "Alpha"));
    assert_eq!(diagnostics[1].symbol, SymbolId::new("Svc", "Gamma"));
    assert_eq!(diagnostics[0].location.as_ref().unwrap().line, 3);

    // Gamma's chain explains the violation through the call into Alpha.
    let chain = diagnostics[1].reason.as_ref().unwrap().to_string();
    assert!(chain.contains("call of Svc::Alpha"), "{chain}");
    assert!(chain.contains("write of static Svc::log"), "{chain}");
}

#[test]
fn diagnostics_round_trip_through_serde() {
    let snapshot = Snapshot::builder()
        .ty(TypeDef::new("Svc"))
        .member(MemberDef::field("Svc", "log").static_())
        .member(
            MemberDef::method("Svc", "Alpha")
                .static_()
                .marked_pure()
                .at("svc.src", 3)
                .body(vec![common::static_write(SymbolId::new("Svc", "log"))]),
        )
        .build()
        .unwrap();
    let checker = PurityChecker::new(&snapshot);
    let sink = CollectSink::new();
    checker.check_all(&sink);
    let diagnostics = sink.into_inner();

    let json = serde_json::to_string(&diagnostics).unwrap();
    let back: Vec<puremark::Diagnostic> = serde_json::from_str(&json).unwrap();
    assert_eq!(diagnostics, back);
}

#[test]
fn marked_pure_members_that_hold_are_silent() {
    let snapshot = Snapshot::builder()
        .ty(TypeDef::new("Calc"))
        .member(
            MemberDef::method("Calc", "Twice")
                .static_()
                .marked_pure()
                .body(vec![Stmt::Return(Some(Expr::Constant))]),
        )
        .build()
        .unwrap();
    let checker = PurityChecker::new(&snapshot);
    let sink = CollectSink::new();
    assert_eq!(checker.check_all(&sink), 0);
    assert!(sink.into_inner().is_empty());
}

#[test]
fn directive_names_map_through_the_config() {
    use puremark::model::{Directive, DirectiveConfig};
    let config = DirectiveConfig::default();
    assert_eq!(config.classify("IsPure"), Directive::MarkedPure);
    assert_eq!(config.classify("AssumeIsPure"), Directive::AssumePure);
    assert_eq!(
        config.classify("ReturnsNewObject"),
        Directive::ReturnsFreshObject
    );

    let custom = DirectiveConfig {
        marked_pure_names: ["Pure"].iter().map(|s| s.to_string()).collect(),
        ..DirectiveConfig::default()
    };
    assert_eq!(custom.classify("Pure"), Directive::MarkedPure);
    assert_eq!(custom.classify("IsPure"), Directive::None);
}

#[test]
fn fresh_result_fed_external_input_is_not_local() {
    let snapshot = Snapshot::builder()
        .ty(TypeDef::new("Widget"))
        .ty(TypeDef::new("Factory"))
        .ty(TypeDef::new("Api"))
        .member(MemberDef::field("Widget", "state"))
        .member(
            MemberDef::method("Widget", "Taint")
                .body(vec![common::own_field_write(SymbolId::new(
                    "Widget", "state",
                ))]),
        )
        .member(
            MemberDef::method("Factory", "Wrap")
                .static_()
                .returns_fresh()
                .returns("Widget")
                .opaque(),
        )
        .member(
            MemberDef::method("Api", "Build")
                .static_()
                .body(vec![
                    Stmt::Let {
                        name: "w".to_string(),
                        value: Expr::Call(Call::static_call(
                            SymbolId::new("Factory", "Wrap"),
                            vec![Expr::param("seed")],
                        )),
                    },
                    common::call_on(SymbolId::new("Widget", "Taint"), Expr::local("w")),
                ]),
        )
        .build()
        .unwrap();
    let resolver = PurityResolver::new(&snapshot);
    assert_eq!(
        resolver.resolve(&SymbolId::new("Api", "Build")).verdict,
        Verdict::Impure
    );
}
