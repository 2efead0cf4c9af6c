use super::*;
use crate::binding::{Binding, BindingTable};
use crate::gesture::types::{
    CommandVariables, Direction, GestureDescriptor, GestureKind, LifecyclePhase, MotionStep,
};

#[derive(Clone, Default)]
struct RecordingBackend {
    calls: Arc<Mutex<Vec<String>>>,
    speed: Option<f64>,
}

impl PointerBackend for RecordingBackend {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn base_speed(&mut self) -> Option<f64> {
        self.speed
    }

    fn button_down(&mut self) -> Result<(), DispatchError> {
        self.calls.lock().push("down".into());
        Ok(())
    }

    fn button_up(&mut self) -> Result<(), DispatchError> {
        self.calls.lock().push("up".into());
        Ok(())
    }

    fn move_relative(&mut self, dx: i32, dy: i32) -> Result<(), DispatchError> {
        self.calls.lock().push(format!("move {dx} {dy}"));
        Ok(())
    }

    fn key_press(&mut self, keys: &str) -> Result<(), DispatchError> {
        self.calls.lock().push(format!("key {keys}"));
        Ok(())
    }
}

struct FailingRunner;

impl CommandRunner for FailingRunner {
    fn run(&mut self, command: &str) -> Result<(), DispatchError> {
        Err(DispatchError::Spawn {
            command: command.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "sh missing"),
        })
    }
}

fn drag_table() -> Arc<BindingTable> {
    Arc::new(BindingTable::new(vec![Binding {
        kind: GestureKind::Swipe,
        direction: Direction::Any,
        fingers: 3,
        on_start: Some("start".into()),
        on_update: Some("update $delta_x".into()),
        on_end: Some("end".into()),
        mouse_up_delay_ms: Some(500),
        acceleration: Some(20.0),
    }]))
}

fn event(id: u64, phase: LifecyclePhase, delta_x: f64, step_dx: f64) -> LifecycleEvent {
    LifecycleEvent {
        instance_id: id,
        phase,
        t_ms: 0,
        binding: 0,
        descriptor: GestureDescriptor {
            kind: GestureKind::Swipe,
            direction: Direction::E,
            fingers: 3,
        },
        variables: CommandVariables {
            delta_x,
            ..CommandVariables::default()
        },
        step: MotionStep { dx: step_dx, dy: 0.0 },
    }
}

fn drag_events(id: u64) -> Vec<LifecycleEvent> {
    vec![
        event(id, LifecyclePhase::Start, 0.0, 0.0),
        event(id, LifecyclePhase::Update, 50.0, 50.0),
        event(id, LifecyclePhase::Update, 70.0, 20.0),
        event(id, LifecyclePhase::End { cancelled: false }, 70.0, 0.0),
    ]
}

fn settings(inject_pointer: bool) -> DispatcherSettings {
    DispatcherSettings {
        reference_speed: 10.0,
        default_speed_multiplier: 1.0,
        inject_pointer,
    }
}

#[test]
fn worker_runs_actions_in_issue_order() {
    let runner = DryRunRunner::new();
    let backend = RecordingBackend {
        speed: Some(2.0),
        ..RecordingBackend::default()
    };
    let calls = Arc::clone(&backend.calls);
    let planner = ActionPlanner::new(drag_table(), None).expect("planner");
    let dispatcher = Dispatcher::spawn(
        planner,
        ActionExecutor::new(Box::new(runner.clone()), Box::new(backend)),
        settings(true),
    )
    .expect("dispatcher");

    for event in drag_events(1) {
        dispatcher.send(event).expect("worker alive");
    }
    let stats = dispatcher.shutdown();

    assert_eq!(runner.issued(), vec!["start", "update 50", "update 70", "end"]);
    // acceleration 20 * pointer speed 2 / reference 10 = 4x.
    assert_eq!(
        *calls.lock(),
        vec!["down", "move 200 0", "move 80 0", "up"]
    );
    assert_eq!(
        stats,
        DispatchStats {
            events: 4,
            actions: 8,
            failures: 0,
        }
    );
}

#[test]
fn pointer_speed_falls_back_to_default_multiplier() {
    let backend = RecordingBackend::default();
    let calls = Arc::clone(&backend.calls);
    let planner = ActionPlanner::new(drag_table(), None).expect("planner");
    let dispatcher = Dispatcher::spawn(
        planner,
        ActionExecutor::new(Box::new(DryRunRunner::new()), Box::new(backend)),
        settings(true),
    )
    .expect("dispatcher");
    for event in drag_events(1) {
        dispatcher.send(event).expect("worker alive");
    }
    dispatcher.shutdown();
    assert_eq!(*calls.lock(), vec!["down", "move 100 0", "move 40 0", "up"]);
}

#[test]
fn disabled_injection_only_runs_templates() {
    let runner = DryRunRunner::new();
    let backend = RecordingBackend::default();
    let calls = Arc::clone(&backend.calls);
    let planner = ActionPlanner::new(drag_table(), None).expect("planner");
    let dispatcher = Dispatcher::spawn(
        planner,
        ActionExecutor::new(Box::new(runner.clone()), Box::new(backend)),
        settings(false),
    )
    .expect("dispatcher");
    for event in drag_events(1) {
        dispatcher.send(event).expect("worker alive");
    }
    dispatcher.shutdown();
    assert_eq!(runner.issued().len(), 4);
    assert!(calls.lock().is_empty());
}

#[test]
fn failing_commands_are_counted_and_do_not_stop_the_worker() {
    let planner = ActionPlanner::new(drag_table(), None).expect("planner");
    let dispatcher = Dispatcher::spawn(
        planner,
        ActionExecutor::new(Box::new(FailingRunner), Box::new(NullBackend)),
        settings(false),
    )
    .expect("dispatcher");
    for id in [1, 2] {
        for event in drag_events(id) {
            dispatcher.send(event).expect("worker alive");
        }
    }
    let stats = dispatcher.shutdown();
    assert_eq!(stats.events, 8);
    assert_eq!(stats.failures, 8);
}

#[test]
fn shell_runner_spawns_without_waiting() {
    let dir = tempfile::tempdir().expect("temp dir");
    let marker = dir.path().join("ran");
    let mut runner = ShellRunner::new();
    runner
        .run(&format!("touch '{}'", marker.display()))
        .expect("sh should spawn");

    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
    while !marker.exists() && std::time::Instant::now() < deadline {
        thread::sleep(std::time::Duration::from_millis(10));
    }
    assert!(marker.exists());

    while runner.running() > 0 && std::time::Instant::now() < deadline {
        runner.reap();
        thread::sleep(std::time::Duration::from_millis(10));
    }
    assert_eq!(runner.running(), 0);
}
