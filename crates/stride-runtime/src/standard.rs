//! The standard sport-mode catalog, ids 0–23.
//!
//! | Id    | Behavior                 | Enabled | Needs monitoring |
//! |-------|--------------------------|---------|------------------|
//! | 0–6   | basic primitives & walks | yes     | no               |
//! | 7     | `custom_patrol`          | yes     | yes              |
//! | 8–15  | acrobatics & gaits       | no      | no               |
//! | 16    | `custom_dance`           | no      | no               |
//! | 17–19 | switch gaits             | no      | no               |
//! | 20    | `custom_greeting`        | yes     | no               |
//! | 21    | `custom_circle_walk`     | yes     | no               |
//! | 22    | `state_aware_behavior`   | yes     | yes              |
//! | 23    | `test_state_monitor`     | yes     | yes              |
//!
//! Stability waits inside the composite behaviors are advisory: a robot that
//! does not settle in time is logged and the routine carries on.

use std::time::Duration;

use stride_kernel::{StabilityThresholds, StateReport};
use stride_types::{Primitive, StateSnapshot, StrideError};

use crate::behavior::{BehaviorDefinition, Step};
use crate::catalog::BehaviorCatalog;

/// Body height under which the adaptive behavior switches to short steps.
const LOW_STANCE_HEIGHT_M: f64 = 0.25;
/// Peak foot force above which the adaptive behavior stretches.
const HIGH_FOOT_PRESSURE_N: f64 = 100.0;

fn secs(s: f64) -> Duration {
    Duration::from_secs_f64(s)
}

fn settle(timeout: Duration) -> Step {
    Step::wait_for_stable(timeout)
}

fn stop_move() -> Step {
    Step::primitive(Primitive::StopMove, secs(1.0))
}

fn state_report(label: &'static str, thresholds: StabilityThresholds) -> Step {
    Step::report(label, move |snapshot: Option<&StateSnapshot>| match snapshot {
        Some(s) => format!("{label}: {}", StateReport::from_snapshot(s, &thresholds).summary()),
        None => format!("{label}: no state data"),
    })
}

/// Build the standard behavior list using `thresholds` for embedded reports.
pub fn standard_behaviors(thresholds: StabilityThresholds) -> Vec<BehaviorDefinition> {
    vec![
        BehaviorDefinition::new(0, "damp", vec![Step::primitive(Primitive::Damp, secs(1.0))]),
        BehaviorDefinition::new(1, "stand_up", vec![Step::primitive(Primitive::StandUp, secs(2.0))]),
        BehaviorDefinition::new(2, "stand_down", vec![Step::primitive(Primitive::StandDown, secs(2.0))]),
        BehaviorDefinition::new(3, "move forward", vec![Step::walk(0.2, 0.0, 0.0, secs(3.0)), stop_move()]),
        BehaviorDefinition::new(4, "move lateral", vec![Step::walk(-0.2, 0.0, 0.0, secs(3.0)), stop_move()]),
        // Rotation keeps going until stop_move.
        BehaviorDefinition::new(5, "move rotate", vec![Step::walk(0.0, 0.0, 0.5, secs(1.0))]),
        BehaviorDefinition::new(6, "stop_move", vec![stop_move()]),
        patrol(thresholds),
        BehaviorDefinition::new(
            8,
            "hand stand",
            vec![
                Step::toggle(Primitive::HandStand, true, secs(4.0)),
                Step::toggle(Primitive::HandStand, false, secs(2.0)),
            ],
        )
        .disabled(),
        BehaviorDefinition::new(9, "balanced stand", vec![Step::primitive(Primitive::BalanceStand, secs(2.0))])
            .disabled(),
        BehaviorDefinition::new(10, "recovery", vec![Step::primitive(Primitive::RecoveryStand, secs(3.0))])
            .disabled(),
        BehaviorDefinition::new(11, "left flip", vec![Step::primitive(Primitive::LeftFlip, secs(4.0))]).disabled(),
        BehaviorDefinition::new(12, "back flip", vec![Step::primitive(Primitive::BackFlip, secs(4.0))]).disabled(),
        BehaviorDefinition::new(13, "free walk", vec![Step::primitive(Primitive::FreeWalk, secs(2.0))]).disabled(),
        BehaviorDefinition::new(
            14,
            "free bound",
            vec![
                Step::toggle(Primitive::FreeBound, true, secs(2.0)),
                Step::toggle(Primitive::FreeBound, false, secs(2.0)),
            ],
        )
        .disabled(),
        BehaviorDefinition::new(
            15,
            "free avoid",
            vec![
                Step::toggle(Primitive::FreeAvoid, true, secs(2.0)),
                Step::toggle(Primitive::FreeAvoid, false, secs(2.0)),
            ],
        )
        .disabled(),
        dance(),
        switch_gait(17, "walk upright", Primitive::WalkUpright),
        switch_gait(18, "cross step", Primitive::CrossStep),
        switch_gait(19, "free jump", Primitive::FreeJump),
        greeting(),
        circle_walk(thresholds),
        state_aware(thresholds),
        monitor_test(thresholds),
    ]
}

/// A catalog pre-populated with [`standard_behaviors`].
///
/// # Errors
///
/// Propagates registration failures; the built-in list is expected to be
/// valid and free of duplicates.
pub fn standard_catalog(thresholds: StabilityThresholds) -> Result<BehaviorCatalog, StrideError> {
    let catalog = BehaviorCatalog::new();
    for def in standard_behaviors(thresholds) {
        catalog.register(def)?;
    }
    Ok(catalog)
}

// ─────────────────────────────────────────────────────────────────────────────
// Composite behaviors
// ─────────────────────────────────────────────────────────────────────────────

fn switch_gait(id: u32, name: &str, primitive: Primitive) -> BehaviorDefinition {
    BehaviorDefinition::new(
        id,
        name,
        vec![
            Step::toggle(primitive, true, secs(4.0)),
            Step::toggle(primitive, false, secs(2.0)),
        ],
    )
    .disabled()
}

/// Walk a rectangle-like loop, measuring the first leg's displacement.
fn patrol(thresholds: StabilityThresholds) -> BehaviorDefinition {
    let leg = |vx: f64, vyaw: f64, duration: f64| {
        [Step::walk(vx, 0.0, vyaw, secs(duration)), stop_move(), settle(secs(5.0))]
    };

    let mut steps = vec![
        state_report("patrol start", thresholds),
        Step::primitive(Primitive::StandUp, secs(2.0)),
        settle(secs(5.0)),
        Step::record_start(),
        Step::walk(0.3, 0.0, 0.0, secs(3.0)),
        stop_move(),
        Step::record_end(),
        settle(secs(5.0)),
    ];
    steps.extend(leg(0.0, -0.5, 2.0));
    steps.extend(leg(0.3, 0.0, 2.0));
    steps.extend(leg(0.0, -0.5, 2.0));
    steps.push(state_report("patrol final", thresholds));

    BehaviorDefinition::new(7, "custom_patrol", steps).requiring_state_monitoring()
}

/// Spin, side-step, rock, bow.
fn dance() -> BehaviorDefinition {
    BehaviorDefinition::new(
        16,
        "custom_dance",
        vec![
            Step::primitive(Primitive::StandUp, secs(2.0)),
            Step::walk(0.0, 0.0, 1.0, secs(2.0)),
            Step::primitive(Primitive::StopMove, secs(0.5)),
            Step::walk(0.0, 0.3, 0.0, secs(1.0)),
            Step::walk(0.0, -0.3, 0.0, secs(1.0)),
            Step::primitive(Primitive::StopMove, secs(0.5)),
            Step::walk(0.2, 0.0, 0.0, secs(1.0)),
            Step::walk(-0.2, 0.0, 0.0, secs(1.0)),
            stop_move(),
            Step::primitive(Primitive::Hello, secs(2.0)),
        ],
    )
    .disabled()
}

fn greeting() -> BehaviorDefinition {
    BehaviorDefinition::new(
        20,
        "custom_greeting",
        vec![
            Step::primitive(Primitive::StandUp, secs(2.0)),
            Step::primitive(Primitive::Hello, secs(2.0)),
            Step::primitive(Primitive::Hello, secs(2.0)),
            Step::primitive(Primitive::Hello, secs(2.0)),
            Step::primitive(Primitive::Stretch, secs(3.0)),
        ],
    )
}

fn circle_walk(thresholds: StabilityThresholds) -> BehaviorDefinition {
    BehaviorDefinition::new(
        21,
        "custom_circle_walk",
        vec![
            Step::primitive(Primitive::StandUp, secs(2.0)),
            Step::record_start(),
            Step::walk(0.2, 0.0, 0.3, secs(8.0)),
            stop_move(),
            Step::record_end(),
            state_report("circle walk final", thresholds),
        ],
    )
}

/// Adapt gait to body height, then stretch under high foot pressure.
fn state_aware(thresholds: StabilityThresholds) -> BehaviorDefinition {
    let short_step = || [Step::walk(0.1, 0.0, 0.0, secs(1.0)), stop_move(), settle(secs(2.0))];
    let careful: Vec<Step> = (0..3).flat_map(|_| short_step()).collect();
    let normal = vec![Step::walk(0.3, 0.0, 0.0, secs(2.0)), stop_move(), settle(secs(5.0))];

    BehaviorDefinition::new(
        22,
        "state_aware_behavior",
        vec![
            Step::primitive(Primitive::StandUp, secs(2.0)),
            Step::report("initial body height", |snapshot: Option<&StateSnapshot>| match snapshot {
                Some(s) => format!("initial body height: {:.3}m", s.body_height),
                None => "initial body height: unknown".to_string(),
            }),
            Step::when(
                "body below low-stance height",
                |s| s.body_height < LOW_STANCE_HEIGHT_M,
                careful,
                normal,
            ),
            Step::when(
                "high foot pressure",
                |s| s.foot_forces.iter().copied().fold(f64::MIN, f64::max) > HIGH_FOOT_PRESSURE_N,
                vec![Step::primitive(Primitive::Stretch, secs(3.0))],
                vec![],
            ),
            state_report("state-aware final", thresholds),
        ],
    )
    .requiring_state_monitoring()
}

/// Read-only self-test: render the full state report, move nothing.
fn monitor_test(thresholds: StabilityThresholds) -> BehaviorDefinition {
    BehaviorDefinition::new(
        23,
        "test_state_monitor",
        vec![Step::report("state monitor", move |snapshot: Option<&StateSnapshot>| {
            match snapshot {
                Some(s) => StateReport::from_snapshot(s, &thresholds).to_string(),
                None => "no state data received yet".to_string(),
            }
        })],
    )
    .requiring_state_monitoring()
}
