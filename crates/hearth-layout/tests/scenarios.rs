use hearth_core::{BoxSpec, Constraint, Geometry, LayoutError, Priority};
use hearth_layout::{anchors, DiscardReason, LayoutDiagnostic, LayoutSession};

fn assert_close(actual: Option<Geometry>, expected: (f64, f64, f64, f64)) {
    let actual = actual.expect("box has no published geometry");
    let expected = Geometry::new(expected.0, expected.1, expected.2, expected.3);
    assert!(actual.approx_eq(&expected, 1e-6), "expected {expected:?}, got {actual:?}");
}

fn centered_session() -> (LayoutSession, hearth_core::BoxId) {
    let mut session = LayoutSession::new(800.0, 600.0).unwrap();
    let root = session.root();
    let child = session.add_box(root, BoxSpec::new().named("dialog")).unwrap();
    session.add_constraints(anchors::center_in(child, root).unwrap()).unwrap();
    session.add_constraints(anchors::fixed_size(child, 200.0, 100.0).unwrap()).unwrap();
    (session, child)
}

#[test]
fn test_centered_child() {
    let (session, child) = centered_session();
    assert_close(session.geometry(child), (300.0, 250.0, 200.0, 100.0));
}

#[test]
fn test_resize_recenters_and_leaves_others() {
    let (mut session, child) = centered_session();
    let root = session.root();
    let sidebar = session.add_box(root, BoxSpec::new().intrinsic_size(120.0, 40.0)).unwrap();
    session
        .add_constraint(Constraint::build(sidebar.top()).equal_to(20.0).finish().unwrap())
        .unwrap();
    let sidebar_before = session.geometry(sidebar);

    let update = session.on_resize(400.0, 600.0).unwrap();
    assert_close(session.geometry(child), (100.0, 250.0, 200.0, 100.0));
    assert_eq!(session.geometry(sidebar), sidebar_before);
    assert!(update.changed.contains(&child));
    assert!(!update.changed.contains(&sidebar));
}

#[test]
fn test_conflicting_required_widths() {
    let mut session = LayoutSession::new(800.0, 600.0).unwrap();
    let root = session.root();
    let child = session.add_box(root, BoxSpec::new()).unwrap();
    let c1 = session
        .add_constraint(Constraint::build(child.width()).equal_to(100.0).finish().unwrap())
        .unwrap();
    session
        .add_constraint(Constraint::build(child.left()).equal_to(4.0).finish().unwrap())
        .unwrap();

    let err = session
        .add_constraint(Constraint::build(child.width()).equal_to(150.0).finish().unwrap())
        .unwrap_err();
    match err {
        LayoutError::UnsatisfiableRequiredConstraints { conflicting } => {
            // The rejected constraint would have taken the next id.
            assert_eq!(conflicting.len(), 2);
            assert_eq!(conflicting[0], c1);
            assert!(conflicting[1] > c1);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(session.graph().len(), 2);
    assert_close(session.geometry(child), (4.0, 0.0, 100.0, 0.0));
}

#[test]
fn test_optional_yields_to_required() {
    let mut session = LayoutSession::new(800.0, 600.0).unwrap();
    let root = session.root();
    let child = session.add_box(root, BoxSpec::new()).unwrap();
    session
        .add_constraint(Constraint::build(child.width()).equal_to(200.0).finish().unwrap())
        .unwrap();
    let optional = session
        .add_constraint(
            Constraint::build(child.width())
                .equal_to(300.0)
                .priority(Priority::MEDIUM)
                .finish()
                .unwrap(),
        )
        .unwrap();

    assert_eq!(session.geometry(child).map(|g| g.width), Some(200.0));
    assert_eq!(
        session.diagnostics(),
        &[LayoutDiagnostic::OptionalDiscarded {
            constraint: optional,
            priority: Priority::MEDIUM,
            reason: DiscardReason::Conflict,
        }]
    );
}

#[test]
fn test_resolve_is_idempotent() {
    let (mut session, child) = centered_session();
    let root = session.root();
    let note = session.add_box(child, BoxSpec::new().intrinsic_size(50.0, 10.0)).unwrap();
    session
        .add_constraint(
            Constraint::build(note.right())
                .at_most(root.right())
                .priority(Priority::STRONG)
                .finish()
                .unwrap(),
        )
        .unwrap();

    let first = session.snapshot();
    let update = session.relayout().unwrap();
    assert!(update.changed.is_empty());
    assert_eq!(session.snapshot(), first);
}

#[test]
fn test_equal_priority_ties_go_to_earliest() {
    let mut session = LayoutSession::new(800.0, 600.0).unwrap();
    let root = session.root();
    let child = session.add_box(root, BoxSpec::new()).unwrap();
    for width in [120.0, 160.0] {
        session
            .add_constraint(
                Constraint::build(child.width())
                    .equal_to(width)
                    .priority(Priority::WEAK)
                    .finish()
                    .unwrap(),
            )
            .unwrap();
    }
    assert_eq!(session.geometry(child).map(|g| g.width), Some(120.0));
}

#[test]
fn test_forced_negative_width() {
    let mut session = LayoutSession::new(800.0, 600.0).unwrap();
    let root = session.root();
    let child = session.add_box(root, BoxSpec::new().intrinsic_size(30.0, 30.0)).unwrap();
    let before = session.snapshot();

    let err = session
        .add_constraint(
            Constraint::build(child.width())
                .equal_to(root.width())
                .constant(-1000.0)
                .finish()
                .unwrap(),
        )
        .unwrap_err();
    assert!(matches!(err, LayoutError::NegativeDimension { box_id, .. } if box_id == child));
    assert_eq!(session.snapshot(), before);
}

#[test]
fn test_required_cycle_keeps_geometry() {
    let mut session = LayoutSession::new(800.0, 600.0).unwrap();
    let root = session.root();
    let a = session.add_box(root, BoxSpec::new().intrinsic_size(10.0, 10.0)).unwrap();
    let b = session.add_box(root, BoxSpec::new().intrinsic_size(10.0, 10.0)).unwrap();
    session
        .add_constraint(Constraint::build(a.width()).equal_to(b.width()).finish().unwrap())
        .unwrap();
    let before = session.snapshot();

    let err = session
        .add_constraint(Constraint::build(b.width()).equal_to(a.width()).finish().unwrap())
        .unwrap_err();
    assert!(matches!(err, LayoutError::CyclicRequiredConstraint { .. }));
    assert_eq!(session.graph().len(), 1);
    assert_eq!(session.snapshot(), before);
}

#[test]
fn test_failed_resize_keeps_last_layout() {
    let mut session = LayoutSession::new(800.0, 600.0).unwrap();
    let root = session.root();
    let panel = session.add_box(root, BoxSpec::new()).unwrap();
    session
        .add_constraint(Constraint::build(panel.width()).equal_to(500.0).finish().unwrap())
        .unwrap();
    session
        .add_constraint(Constraint::build(panel.right()).at_most(root.right()).finish().unwrap())
        .unwrap();
    session
        .add_constraint(Constraint::build(panel.left()).at_least(root.left()).finish().unwrap())
        .unwrap();
    let before = session.snapshot();

    assert!(session.on_resize(300.0, 600.0).is_err());
    assert_eq!(session.snapshot(), before);
    assert_eq!(session.viewport().x, 300.0);

    session.on_resize(640.0, 480.0).unwrap();
    assert_close(session.geometry(panel), (0.0, 0.0, 500.0, 0.0));
}

#[test]
fn test_rejected_size_leaves_viewport() {
    let (mut session, _) = centered_session();
    assert!(matches!(
        session.on_resize(f64::NAN, 10.0),
        Err(LayoutError::InvalidSize { .. })
    ));
    assert_eq!(session.viewport().x, 800.0);
}

#[test]
fn test_hit_test_after_solve() {
    let (mut session, dialog) = centered_session();
    let button = session.add_box(dialog, BoxSpec::new().intrinsic_size(40.0, 20.0)).unwrap();
    session
        .add_constraints(
            anchors::pin_edges(
                button,
                dialog,
                &[hearth_core::Attribute::Right, hearth_core::Attribute::Bottom],
                8.0,
            )
            .unwrap(),
        )
        .unwrap();

    assert_close(session.geometry(button), (452.0, 322.0, 40.0, 20.0));
    let point = glam::DVec2::new(460.0, 330.0);
    assert_eq!(session.hit_test(point), Some(button));
    assert_eq!(session.hit_test(glam::DVec2::new(310.0, 260.0)), Some(dialog));
    assert_eq!(session.hit_test(glam::DVec2::new(5.0, 5.0)), Some(session.root()));
}

fn wide_panel() -> (LayoutSession, hearth_core::BoxId) {
    let mut session = LayoutSession::new(800.0, 600.0).unwrap();
    let root = session.root();
    let panel = session.add_box(root, BoxSpec::new().intrinsic_size(900.0, 40.0)).unwrap();
    (session, panel)
}

#[test]
fn test_nested_required_upper_bounds() {
    let (mut session, panel) = wide_panel();
    session
        .add_constraint(Constraint::build(panel.width()).at_most(500.0).finish().unwrap())
        .unwrap();
    session
        .add_constraint(Constraint::build(panel.width()).at_most(300.0).finish().unwrap())
        .unwrap();

    assert_close(session.geometry(panel), (0.0, 0.0, 300.0, 40.0));
}

#[test]
fn test_weak_bound_inside_strong_bound() {
    let (mut session, panel) = wide_panel();
    for (limit, priority) in [(500.0, Priority::STRONG), (300.0, Priority::WEAK)] {
        session
            .add_constraint(
                Constraint::build(panel.width())
                    .at_most(limit)
                    .priority(priority)
                    .finish()
                    .unwrap(),
            )
            .unwrap();
    }

    assert_close(session.geometry(panel), (0.0, 0.0, 300.0, 40.0));
    assert!(session.diagnostics().is_empty());
}

#[test]
fn test_unmet_optional_inequality_settles_at_nearest_value() {
    let mut session = LayoutSession::new(800.0, 600.0).unwrap();
    let root = session.root();
    let panel = session.add_box(root, BoxSpec::new()).unwrap();
    session
        .add_constraints([
            Constraint::build(panel.width()).equal_to(100.0).finish().unwrap(),
            Constraint::build(panel.right()).at_most(150.0).finish().unwrap(),
        ])
        .unwrap();
    let weak = session
        .add_constraint(
            Constraint::build(panel.left())
                .at_least(100.0)
                .priority(Priority::WEAK)
                .finish()
                .unwrap(),
        )
        .unwrap();

    assert_close(session.geometry(panel), (50.0, 0.0, 100.0, 0.0));
    match session.diagnostics() {
        [LayoutDiagnostic::OptionalRelaxed { constraint, priority, shortfall }] => {
            assert_eq!(*constraint, weak);
            assert_eq!(*priority, Priority::WEAK);
            assert!((shortfall - 50.0).abs() < 1e-6);
        }
        other => panic!("unexpected diagnostics: {other:?}"),
    }
    assert_eq!(session.last_update().stats.optional_relaxed, 1);
}

#[test]
fn test_min_max_clamp_around_intrinsic_size() {
    let mut session = LayoutSession::new(800.0, 600.0).unwrap();
    let root = session.root();
    let panel = session.add_box(root, BoxSpec::new().intrinsic_size(50.0, 40.0)).unwrap();
    session
        .add_constraints([
            Constraint::build(panel.width()).at_least(100.0).finish().unwrap(),
            Constraint::build(panel.width()).at_most(200.0).finish().unwrap(),
        ])
        .unwrap();
    assert_close(session.geometry(panel), (0.0, 0.0, 100.0, 40.0));

    session.set_intrinsic_size(panel, 500.0, 40.0).unwrap();
    assert_close(session.geometry(panel), (0.0, 0.0, 200.0, 40.0));

    session.set_intrinsic_size(panel, 160.0, 40.0).unwrap();
    assert_close(session.geometry(panel), (0.0, 0.0, 160.0, 40.0));
}
