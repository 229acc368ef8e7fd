//! Built-in scenarios for the game client
//!
//! Coordinates target the 360x640 portrait layout and are declared once in
//! [`layout`]; a layout change means editing that module, not the flows.

use std::time::Duration;

use crate::locator::{Locator, Viewport};
use crate::scenario::{InteractionAction, ReadinessCondition, Scenario, ScenarioStep, SearchPolicy};

/// Screen positions of interactive elements drawn on the canvas
pub mod layout {
    use crate::locator::{Point, Viewport};

    pub const VIEWPORT: Viewport = Viewport { width: 360, height: 640 };

    pub const RED_CHARACTER: Point = Point { x: 95.0, y: 380.0 };
    pub const ATTACK_BUTTON: Point = Point { x: 160.0, y: 450.0 };
    pub const LEFT_BUTTON: Point = Point { x: 160.0, y: 520.0 };

    /// Empty ground near the top-left corner
    pub const EMPTY_GROUND: Point = Point { x: 10.0, y: 10.0 };
    pub const DRAG_FROM: Point = Point { x: 100.0, y: 100.0 };
    pub const DRAG_TO: Point = Point { x: 150.0, y: 150.0 };

    /// Half-open area where workers gather after the demo scene loads
    pub const WORKER_AREA_X: (u32, u32) = (160, 220);
    pub const WORKER_AREA_Y: (u32, u32) = (480, 540);
    pub const WORKER_SEARCH_STEP: u32 = 15;

    /// The house; selecting it opens the drawer when no worker was hit
    pub const HOUSE: Point = Point { x: 200.0, y: 220.0 };
}

const SURFACE: &str = "canvas";
const SURFACE_TIMEOUT: Duration = Duration::from_secs(10);
const UI_TIMEOUT: Duration = Duration::from_secs(5);

/// Label shown in the character drawer once an entity is selected
pub const DRAWER_MARKER: &str = "武力";

fn base(name: &str, description: &str) -> Scenario {
    Scenario::new(name)
        .describe(description)
        .viewport(layout::VIEWPORT)
        .step(ScenarioStep::navigate("/"))
        .step(ScenarioStep::wait_for_surface(SURFACE, SURFACE_TIMEOUT))
}

fn wait_for(locator: Locator) -> ScenarioStep {
    ScenarioStep::wait(ReadinessCondition::ElementPresent(locator), UI_TIMEOUT)
}

fn enter_demo(scenario: Scenario) -> Scenario {
    scenario
        .step(wait_for(Locator::text("Demo")))
        .step(ScenarioStep::click_locator(Locator::text("Demo")))
        .step(ScenarioStep::wait_for_surface(SURFACE, SURFACE_TIMEOUT))
}

/// Canvas loads and the first frame renders
pub fn initial_state() -> Scenario {
    base("initial-state", "Canvas loads and renders the first frame")
        .tag("smoke")
        .step(ScenarioStep::settle(Duration::from_secs(2)))
        .step(ScenarioStep::capture("initial"))
}

/// Select a character, then issue an attack-left command
pub fn character_viewer() -> Scenario {
    base("character-viewer", "Select the red character and order an attack to the left")
        .tag("interaction")
        .steps([
            ScenarioStep::settle(Duration::from_secs(2)),
            ScenarioStep::capture("initial"),
            ScenarioStep::click(layout::RED_CHARACTER),
            ScenarioStep::settle(Duration::from_millis(500)),
            ScenarioStep::capture("red_selected"),
            ScenarioStep::click(layout::ATTACK_BUTTON),
            ScenarioStep::settle(Duration::from_millis(500)),
            ScenarioStep::click(layout::LEFT_BUTTON),
            ScenarioStep::settle(Duration::from_millis(500)),
            ScenarioStep::capture("attack_left"),
        ])
}

/// A press and release in place is a click; a press that travels is a drag
pub fn click_vs_drag() -> Scenario {
    enter_demo(base("click-vs-drag", "Click on empty ground, then drag; the drag must not select"))
        .tag("interaction")
        .steps([
            ScenarioStep::settle(Duration::from_secs(2)),
            ScenarioStep::Interact {
                action: InteractionAction::PointerMove { to: layout::EMPTY_GROUND },
            },
            ScenarioStep::Interact {
                action: InteractionAction::PointerDown { at: layout::EMPTY_GROUND },
            },
            ScenarioStep::Interact { action: InteractionAction::PointerUp },
            ScenarioStep::settle(Duration::from_millis(500)),
            ScenarioStep::Interact {
                action: InteractionAction::Drag {
                    from: layout::DRAG_FROM,
                    to: layout::DRAG_TO,
                    steps: 5,
                },
            },
            ScenarioStep::capture("after_drag"),
        ])
}

/// Find a worker by probing the worker area, falling back to the house
pub fn character_drawer() -> Scenario {
    let search = SearchPolicy::grid(
        layout::WORKER_AREA_X,
        layout::WORKER_AREA_Y,
        layout::WORKER_SEARCH_STEP,
        ReadinessCondition::TextPresent(DRAWER_MARKER.to_string()),
    )
    .with_fallback(layout::HOUSE);

    base("character-drawer", "Select a worker and open the character status drawer")
        .tag("interaction")
        .steps([
            wait_for(Locator::selector(".main-menu-btn")),
            ScenarioStep::click_locator(Locator::text("Demo")),
            ScenarioStep::wait_for_surface(SURFACE, SURFACE_TIMEOUT),
            ScenarioStep::settle(Duration::from_secs(4)),
            ScenarioStep::Interact {
                action: InteractionAction::Search(search),
            },
            ScenarioStep::settle(Duration::from_millis(500)),
            ScenarioStep::capture("drawer"),
        ])
}

/// Leaving the main menu shows the navigation header with its back button
pub fn back_button() -> Scenario {
    base("back-button", "Enter a scene from the main menu and check the navigation header")
        .tag("navigation")
        .steps([
            wait_for(Locator::selector(".main-menu-btn")),
            ScenarioStep::click_locator(Locator::selector(".main-menu-btn")),
            wait_for(Locator::selector(".nav-header")),
            ScenarioStep::settle(Duration::from_secs(2)),
            ScenarioStep::capture("back_button"),
        ])
}

/// The tile test scene opens and shows its header
pub fn tile_scene() -> Scenario {
    base("tile-scene", "Open the tile test scene from the main menu")
        .tag("navigation")
        .steps([
            wait_for(Locator::text("Tile测试")),
            ScenarioStep::click_locator(Locator::text("Tile测试")),
            ScenarioStep::AssertVisible {
                locator: Locator::text("Base Scene Test"),
                timeout: Some(UI_TIMEOUT),
            },
            ScenarioStep::settle(Duration::from_secs(2)),
            ScenarioStep::capture("background"),
        ])
}

/// The demon king interface toggles between minimized and full mode
pub fn interface_modes() -> Scenario {
    let mut scenario = Scenario::new("interface-modes")
        .describe("Toggle the demon king interface between minimized and full mode")
        .tag("ui")
        .viewport(Viewport::new(1280, 720))
        .steps([
            ScenarioStep::navigate("/"),
            ScenarioStep::wait_for_surface(".demon-king-interface", SURFACE_TIMEOUT),
            wait_for(Locator::selector(".interface-layer.minimized")),
            ScenarioStep::capture("minimized_mode"),
            ScenarioStep::click_locator(Locator::selector(".mode-toggle-btn")),
            ScenarioStep::settle(Duration::from_millis(500)),
            wait_for(Locator::selector(".interface-layer.full")),
            ScenarioStep::capture("full_mode"),
        ]);
    scenario.surface = ".demon-king-interface".to_string();
    scenario
}

/// Every built-in scenario
pub fn all() -> Vec<Scenario> {
    vec![
        initial_state(),
        character_viewer(),
        click_vs_drag(),
        character_drawer(),
        back_button(),
        tile_scene(),
        interface_modes(),
    ]
}

/// Look up a built-in scenario by name
pub fn find(name: &str) -> Option<Scenario> {
    all().into_iter().find(|s| s.name == name)
}
