//! Integration tests for the public planning API: the built-in suite plan,
//! its ordering guarantees, and plan files round-tripping through TOML.
//! Everything here runs offline; the mock-chain orchestration tests live
//! next to the orchestrator.

use tangelo_deploy::suite::{self, SuiteConfig};
use tangelo_deploy::{DeploymentPlan, PlanError, Slot};

#[test]
fn test_suite_plan_is_valid_and_stable() {
    let plan = SuiteConfig::default().plan().expect("suite plan must build");

    let order: Vec<&str> = plan.order().map(|c| c.name.as_str()).collect();
    assert_eq!(
        order,
        vec![
            suite::CBTC,
            suite::PRICE_ORACLE,
            suite::CGOV,
            suite::STABLECOIN,
            suite::AMM_DEX,
            suite::AGGREGATOR_ORACLE,
            suite::PAYMENT_GATEWAY,
        ]
    );

    // Every reference points at an earlier component.
    let position = |name: &str| order.iter().position(|n| *n == name).unwrap();
    for component in plan.components() {
        for slot in &component.constructor {
            if let Slot::Component(reference) = slot {
                assert!(
                    position(reference) < position(&component.name),
                    "`{}` must be deployed before `{}`",
                    reference,
                    component.name
                );
            }
        }
    }

    // The same configuration always produces the same fingerprint.
    assert_eq!(
        plan.fingerprint(),
        SuiteConfig::default().plan().unwrap().fingerprint()
    );
}

#[test]
fn test_suite_plan_round_trips_through_toml() {
    let plan = SuiteConfig::default().plan().unwrap();
    let raw = toml::to_string(&plan).expect("plan must serialize");
    let parsed: DeploymentPlan = toml::from_str(&raw).expect("plan must re-validate");

    assert_eq!(parsed, plan);
    assert_eq!(parsed.fingerprint(), plan.fingerprint());
}

#[test]
fn test_plan_file_with_unknown_reference_is_rejected() {
    let raw = r#"
        [[components]]
        name = "x"

        [[components]]
        name = "y"
        constructor = [{ component = "missing" }]
    "#;
    let err = toml::from_str::<DeploymentPlan>(raw).unwrap_err();
    assert!(err.to_string().contains("missing"));
}

#[test]
fn test_plan_file_with_cycle_is_rejected() {
    let raw = r#"
        [[components]]
        name = "a"
        constructor = [{ component = "b" }]

        [[components]]
        name = "b"
        constructor = [{ component = "a" }]
    "#;
    let err = toml::from_str::<DeploymentPlan>(raw).unwrap_err();
    assert!(err.to_string().contains("cycle"));
}

#[test]
fn test_handwritten_plan_cycle_detection() {
    use tangelo_deploy::ComponentSpec;

    let err = DeploymentPlan::build(
        vec![
            ComponentSpec::new("a").arg(Slot::Component("b".to_string())),
            ComponentSpec::new("b").arg(Slot::Component("c".to_string())),
            ComponentSpec::new("c").arg(Slot::Component("a".to_string())),
        ],
        vec![],
    )
    .unwrap_err();

    assert!(matches!(err, PlanError::CycleDetected(_)));
}
