//! Scenario runs against scripted sessions
//!
//! Each test runs a full scenario through `ScenarioRunner` with an in-memory
//! page and checks the result, the artifacts on disk and what the session
//! saw. Time is paused so multi-second waits finish instantly.

use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tempfile::TempDir;

use scenecheck_harness::catalog;
use scenecheck_harness::scripted::{Script, ScriptedFactory};
use scenecheck_harness::{
    ConsoleLevel, ConsoleMessage, FailureKind, HarnessConfig, HarnessError, InteractionAction,
    Locator, Point, PointerEvent, ReadinessCondition, Region, RunReport, Scenario, ScenarioResult,
    ScenarioRunner, ScenarioStep, Viewport,
};

fn config(output: &Path) -> HarnessConfig {
    HarnessConfig {
        output_root: output.to_path_buf(),
        probe_target: false,
        run_id: Some("run-1".to_string()),
        ..Default::default()
    }
}

fn runner(output: &Path, factory: &ScriptedFactory) -> ScenarioRunner {
    ScenarioRunner::new(config(output), Arc::new(factory.clone()))
}

fn canvas_page() -> Script {
    Script::new(Viewport::default()).selector("canvas")
}

fn failure_of(report: &RunReport) -> (usize, FailureKind, Option<&Path>) {
    match &report.result {
        ScenarioResult::Failure { failed_step_index, reason, evidence } => {
            (*failed_step_index, reason.kind, evidence.as_deref())
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_initial_state_success_writes_initial_png() {
    let dir = TempDir::new().unwrap();
    let factory = ScriptedFactory::new(Script::permissive(Viewport::default()));

    let report = runner(dir.path(), &factory)
        .run(&catalog::initial_state())
        .await
        .unwrap();

    let expected = dir.path().join("initial-state/run-1/initial.png");
    assert_eq!(
        report.result,
        ScenarioResult::Success { evidence: vec![expected.clone()] }
    );
    assert!(expected.exists());
    assert_eq!(report.steps.len(), 4);
    assert_eq!(factory.log().lock().navigations, vec!["http://localhost:5173/"]);
}

#[tokio::test(start_paused = true)]
async fn test_surface_never_renders() {
    let dir = TempDir::new().unwrap();
    let factory = ScriptedFactory::new(Script::new(Viewport::default()));

    let report = runner(dir.path(), &factory)
        .run(&catalog::initial_state())
        .await
        .unwrap();

    let (index, kind, evidence) = failure_of(&report);
    assert_eq!(index, 1);
    assert_eq!(kind, FailureKind::ReadinessTimeout);
    assert_eq!(evidence, Some(dir.path().join("initial-state/run-1/failure.png").as_path()));
    assert!(!dir.path().join("initial-state/run-1/initial.png").exists());
}

#[tokio::test(start_paused = true)]
async fn test_failure_stops_at_first_failing_step() {
    let dir = TempDir::new().unwrap();
    let factory = ScriptedFactory::new(canvas_page());
    let scenario = Scenario::new("stops-early").steps([
        ScenarioStep::navigate("/"),
        ScenarioStep::wait_for_surface("canvas", Duration::from_secs(1)),
        ScenarioStep::wait(
            ReadinessCondition::TextPresent("Victory".to_string()),
            Duration::from_secs(1),
        ),
        ScenarioStep::click(Point::new(100.0, 100.0)),
        ScenarioStep::capture("after"),
    ]);

    let report = runner(dir.path(), &factory).run(&scenario).await.unwrap();

    let (index, kind, evidence) = failure_of(&report);
    assert_eq!(index, 2);
    assert_eq!(kind, FailureKind::ReadinessTimeout);
    assert!(evidence.unwrap().exists());

    // Steps 4 and 5 never ran
    let log = factory.log();
    let log = log.lock();
    assert!(log.events.is_empty());
    assert_eq!(log.screenshots.len(), 1);
    assert_eq!(report.steps.len(), 3);
    assert!(!dir.path().join("stops-early/run-1/after.png").exists());
}

#[tokio::test(start_paused = true)]
async fn test_late_surface_is_waited_for() {
    let dir = TempDir::new().unwrap();
    let factory = ScriptedFactory::new(
        Script::new(Viewport::default()).selector_after("canvas", Duration::from_secs(3)),
    );

    let report = runner(dir.path(), &factory)
        .run(&catalog::initial_state())
        .await
        .unwrap();
    assert!(report.result.is_success(), "{:?}", report.result);
}

#[tokio::test(start_paused = true)]
async fn test_session_released_once_on_success_and_failure() {
    let dir = TempDir::new().unwrap();

    let ok = ScriptedFactory::new(Script::permissive(Viewport::default()));
    runner(dir.path(), &ok).run(&catalog::initial_state()).await.unwrap();
    assert_eq!(ok.log().lock().launches, 1);
    assert_eq!(ok.log().lock().closes, 1);

    let failing = ScriptedFactory::new(Script::new(Viewport::default()));
    let report = runner(&dir.path().join("failing"), &failing)
        .run(&catalog::initial_state())
        .await
        .unwrap();
    assert!(!report.result.is_success());
    assert_eq!(failing.log().lock().closes, 1);
}

#[tokio::test(start_paused = true)]
async fn test_session_released_when_automation_panics() {
    let dir = TempDir::new().unwrap();
    let factory = ScriptedFactory::new(canvas_page().panic_on_pointer());
    let scenario = Scenario::new("panics").steps([
        ScenarioStep::navigate("/"),
        ScenarioStep::wait_for_surface("canvas", Duration::from_secs(1)),
        ScenarioStep::click(Point::new(10.0, 10.0)),
    ]);

    let runner = runner(dir.path(), &factory);
    let outcome = AssertUnwindSafe(runner.run(&scenario)).catch_unwind().await;

    assert!(outcome.is_err(), "panic should propagate to the caller");
    assert_eq!(factory.log().lock().closes, 1);
}

#[tokio::test(start_paused = true)]
async fn test_drag_never_produces_a_click() {
    let dir = TempDir::new().unwrap();
    let factory = ScriptedFactory::new(Script::permissive(Viewport::default()));

    let report = runner(dir.path(), &factory)
        .run(&catalog::click_vs_drag())
        .await
        .unwrap();
    assert!(report.result.is_success(), "{:?}", report.result);

    let log = factory.log();
    let guard = log.lock();
    let events = &guard.events;
    // Only the Demo button is clicked; the drag is down, moves, up
    let clicks = events
        .iter()
        .filter(|e| matches!(e, PointerEvent::Click { .. }))
        .count();
    assert_eq!(clicks, 1);

    let drag_start = events
        .iter()
        .position(|e| *e == PointerEvent::Down { at: catalog::layout::DRAG_FROM })
        .unwrap();
    let drag = &events[drag_start..];
    assert_eq!(drag.len(), 7);
    assert_eq!(drag[6], PointerEvent::Up { at: catalog::layout::DRAG_TO });
    assert!(drag[1..6].iter().all(|e| matches!(e, PointerEvent::Move { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_drawer_search_finds_worker() {
    let dir = TempDir::new().unwrap();
    let script = canvas_page()
        .selector(".main-menu-btn")
        .text_at("Demo", Region::new(130.0, 300.0, 100.0, 40.0))
        .reveal_on_click(Region::new(170.0, 490.0, 10.0, 10.0), catalog::DRAWER_MARKER);
    let factory = ScriptedFactory::new(script);

    let report = runner(dir.path(), &factory)
        .run(&catalog::character_drawer())
        .await
        .unwrap();
    assert!(report.result.is_success(), "{:?}", report.result);

    let log = factory.log();
    let clicks: Vec<Point> = log
        .lock()
        .events
        .iter()
        .filter_map(|e| match e {
            PointerEvent::Click { at } => Some(*at),
            _ => None,
        })
        .collect();
    // Demo button centre, then (160, 480..525) and (175, 480), hit at (175, 495)
    assert_eq!(clicks.first(), Some(&Point::new(180.0, 320.0)));
    assert_eq!(clicks.len(), 1 + 6);
    assert_eq!(clicks.last(), Some(&Point::new(175.0, 495.0)));
    assert!(dir.path().join("character-drawer/run-1/drawer.png").exists());
}

#[tokio::test(start_paused = true)]
async fn test_drawer_search_falls_back_to_house() {
    let dir = TempDir::new().unwrap();
    let script = canvas_page()
        .selector(".main-menu-btn")
        .text_at("Demo", Region::new(130.0, 300.0, 100.0, 40.0));
    let factory = ScriptedFactory::new(script);

    let report = runner(dir.path(), &factory)
        .run(&catalog::character_drawer())
        .await
        .unwrap();
    assert!(report.result.is_success(), "{:?}", report.result);

    let log = factory.log();
    let last_click = log.lock().events.iter().rev().find_map(|e| match e {
        PointerEvent::Click { at } => Some(*at),
        _ => None,
    });
    assert_eq!(last_click, Some(catalog::layout::HOUSE));
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_target_is_navigation_failure() {
    let dir = TempDir::new().unwrap();
    let factory = ScriptedFactory::new(canvas_page().unreachable("localhost:5173"));

    let report = runner(dir.path(), &factory)
        .run(&catalog::initial_state())
        .await
        .unwrap();

    let (index, kind, evidence) = failure_of(&report);
    assert_eq!(index, 0);
    assert_eq!(kind, FailureKind::NavigationFailure);
    assert!(evidence.is_some());
    assert_eq!(factory.log().lock().closes, 1);
}

#[tokio::test(start_paused = true)]
async fn test_failure_evidence_is_best_effort() {
    let dir = TempDir::new().unwrap();
    let factory = ScriptedFactory::new(Script::new(Viewport::default()).fail_screenshots());

    let report = runner(dir.path(), &factory)
        .run(&catalog::initial_state())
        .await
        .unwrap();

    let (index, kind, evidence) = failure_of(&report);
    assert_eq!(index, 1);
    assert_eq!(kind, FailureKind::ReadinessTimeout);
    assert!(evidence.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_capture_error_is_reported() {
    let dir = TempDir::new().unwrap();
    let factory = ScriptedFactory::new(canvas_page().fail_screenshots());

    let report = runner(dir.path(), &factory)
        .run(&catalog::initial_state())
        .await
        .unwrap();

    let (index, kind, _) = failure_of(&report);
    assert_eq!(index, 3);
    assert_eq!(kind, FailureKind::CaptureIoError);
}

#[tokio::test(start_paused = true)]
async fn test_best_effort_wait_continues() {
    let dir = TempDir::new().unwrap();
    let factory = ScriptedFactory::new(canvas_page());
    let scenario = Scenario::new("best-effort").steps([
        ScenarioStep::navigate("/"),
        ScenarioStep::wait_for_surface("canvas", Duration::from_secs(1)),
        ScenarioStep::WaitForReady {
            condition: ReadinessCondition::TextPresent("Loaded".to_string()),
            timeout: Some(Duration::from_secs(2)),
            best_effort: true,
        },
        ScenarioStep::capture("state"),
    ]);

    let report = runner(dir.path(), &factory).run(&scenario).await.unwrap();

    assert!(report.result.is_success(), "{:?}", report.result);
    let waited = serde_json::to_value(&report.steps[2]).unwrap();
    assert_eq!(waited["status"], "timed_out_best_effort");
}

#[tokio::test(start_paused = true)]
async fn test_assert_visible_region_outside_viewport() {
    let dir = TempDir::new().unwrap();
    let factory = ScriptedFactory::new(canvas_page());
    let scenario = Scenario::new("off-screen").steps([
        ScenarioStep::navigate("/"),
        ScenarioStep::wait_for_surface("canvas", Duration::from_secs(1)),
        ScenarioStep::AssertVisible {
            locator: Locator::Region(Region::new(300.0, 600.0, 100.0, 100.0)),
            timeout: None,
        },
    ]);

    let report = runner(dir.path(), &factory).run(&scenario).await.unwrap();

    let (index, kind, _) = failure_of(&report);
    assert_eq!(index, 2);
    assert_eq!(kind, FailureKind::TargetUnresolvable);
}

#[tokio::test(start_paused = true)]
async fn test_click_outside_viewport_is_unresolvable() {
    let dir = TempDir::new().unwrap();
    let factory = ScriptedFactory::new(canvas_page());
    let scenario = Scenario::new("bad-click").steps([
        ScenarioStep::navigate("/"),
        ScenarioStep::wait_for_surface("canvas", Duration::from_secs(1)),
        ScenarioStep::Interact {
            action: InteractionAction::Click { at: Point::new(500.0, 100.0) },
        },
    ]);

    let report = runner(dir.path(), &factory).run(&scenario).await.unwrap();

    let (index, kind, _) = failure_of(&report);
    assert_eq!(index, 2);
    assert_eq!(kind, FailureKind::TargetUnresolvable);
    assert!(factory.log().lock().events.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_console_messages_are_relayed() {
    let dir = TempDir::new().unwrap();
    let factory = ScriptedFactory::new(Script::permissive(Viewport::default()).console(ConsoleMessage {
        level: ConsoleLevel::Error,
        text: "Failed to load spritesheet".to_string(),
    }));

    let report = runner(dir.path(), &factory)
        .run(&catalog::initial_state())
        .await
        .unwrap();

    assert_eq!(report.console.len(), 1);
    assert_eq!(report.console[0].text, "Failed to load spritesheet");
}

#[tokio::test(start_paused = true)]
async fn test_console_flushed_at_close_is_relayed() {
    let dir = TempDir::new().unwrap();
    let factory = ScriptedFactory::new(Script::permissive(Viewport::default()).console_on_close(
        ConsoleMessage {
            level: ConsoleLevel::PageError,
            text: "Uncaught TypeError: sprite is undefined".to_string(),
        },
    ));

    let report = runner(dir.path(), &factory)
        .run(&catalog::initial_state())
        .await
        .unwrap();

    assert_eq!(report.console.len(), 1);
    assert_eq!(report.console[0].level, ConsoleLevel::PageError);
    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(report.report_path.unwrap()).unwrap()).unwrap();
    assert_eq!(written["console"][0]["text"], "Uncaught TypeError: sprite is undefined");
}

#[tokio::test(start_paused = true)]
async fn test_report_json_is_written() {
    let dir = TempDir::new().unwrap();
    let factory = ScriptedFactory::new(Script::permissive(Viewport::default()));

    let report = runner(dir.path(), &factory)
        .run(&catalog::initial_state())
        .await
        .unwrap();

    let path = report.report_path.clone().unwrap();
    assert_eq!(path, dir.path().join("initial-state/run-1/report.json"));
    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written["scenario"], "initial-state");
    assert_eq!(written["run_id"], "run-1");
    assert_eq!(written["result"]["outcome"], "success");
    assert_eq!(written["evidence"][0]["label"], "initial");
}

#[tokio::test(start_paused = true)]
async fn test_invalid_scenario_never_launches() {
    let dir = TempDir::new().unwrap();
    let factory = ScriptedFactory::new(Script::permissive(Viewport::default()));
    let scenario = Scenario::new("no-readiness").steps([
        ScenarioStep::navigate("/"),
        ScenarioStep::capture("too-early"),
    ]);

    let err = runner(dir.path(), &factory).run(&scenario).await.unwrap_err();

    assert!(matches!(err, HarnessError::InvalidScenario(_)), "{err}");
    assert_eq!(factory.log().lock().launches, 0);
}

#[tokio::test(start_paused = true)]
async fn test_run_all_separates_output_directories() {
    let dir = TempDir::new().unwrap();
    let factory = ScriptedFactory::new(Script::permissive(Viewport::default()));
    let scenarios = vec![catalog::initial_state(), catalog::back_button()];

    let suite = runner(dir.path(), &factory)
        .run_concurrent(&scenarios, 2)
        .await
        .unwrap();

    assert_eq!(suite.total, 2);
    assert_eq!(suite.passed, 2);
    assert_eq!(suite.reports[0].scenario, "initial-state");
    assert_eq!(suite.reports[1].scenario, "back-button");
    assert!(dir.path().join("initial-state/run-1/initial.png").exists());
    assert!(dir.path().join("back-button/run-1/back_button.png").exists());
    assert_eq!(factory.log().lock().launches, 2);
    assert_eq!(factory.log().lock().closes, 2);
}

#[tokio::test(start_paused = true)]
async fn test_run_all_rejects_duplicate_names() {
    let dir = TempDir::new().unwrap();
    let factory = ScriptedFactory::new(Script::permissive(Viewport::default()));
    let scenarios = vec![catalog::initial_state(), catalog::initial_state()];

    let err = runner(dir.path(), &factory).run_all(&scenarios).await.unwrap_err();
    assert!(matches!(err, HarnessError::InvalidScenario(_)));
}

#[tokio::test(start_paused = true)]
async fn test_run_all_rejects_names_sharing_a_directory() {
    let dir = TempDir::new().unwrap();
    let factory = ScriptedFactory::new(Script::permissive(Viewport::default()));
    let named = |name: &str| {
        let mut scenario = catalog::initial_state();
        scenario.name = name.to_string();
        scenario
    };
    let scenarios = vec![named("tile scene"), named("tile_scene")];

    let err = runner(dir.path(), &factory)
        .run_concurrent(&scenarios, 2)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("tile_scene"), "{err}");
    assert_eq!(factory.log().lock().launches, 0);
}
