// Snapshot loader - Bulk bootstrap of the registry
use crate::application::context::TrackingContext;
use crate::application::render_adapter::{render_placement, render_update, RenderAdapter};
use crate::domain::change::ExternalEntityDescriptor;
use crate::domain::position::{EntityId, GeoBounds};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotReport {
    /// Entries created by this load
    pub registered: usize,
    /// Already-known entities whose snapshot position went through the update path
    pub refreshed: usize,
    /// Already-known entities reported at their last known position
    pub unchanged: usize,
    pub positioned: usize,
    pub unpositioned: usize,
    /// Ids that need a transport subscription; never contains an id twice per session
    pub newly_subscribed: Vec<EntityId>,
    /// Box around every positioned descriptor, for fitting the initial view
    pub bounds: Option<GeoBounds>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotOutcome {
    Loaded(SnapshotReport),
    /// The source returned no entities; informational, not an error
    Empty,
}

impl SnapshotOutcome {
    pub fn newly_subscribed(&self) -> &[EntityId] {
        match self {
            SnapshotOutcome::Loaded(report) => &report.newly_subscribed,
            SnapshotOutcome::Empty => &[],
        }
    }
}

/// Fold a bulk entity list into the context and draw what can be drawn.
///
/// Every descriptor is registered and marked for subscription, positioned
/// or not. Loading the same ids again never duplicates entries or
/// subscriptions.
pub fn load_snapshot(
    ctx: &mut TrackingContext,
    descriptors: Vec<ExternalEntityDescriptor>,
    adapter: &mut dyn RenderAdapter,
) -> SnapshotOutcome {
    if descriptors.is_empty() {
        tracing::info!("Units not found: snapshot contained no entities");
        return SnapshotOutcome::Empty;
    }

    let mut report = SnapshotReport::default();
    let mut positions = Vec::new();

    for descriptor in &descriptors {
        if ctx.registry.register(descriptor) {
            report.registered += 1;
            if let Some(state) = ctx.registry.get(&descriptor.id) {
                render_placement(adapter, state);
            }
        } else if let Some(position) = descriptor.position {
            let known = ctx
                .registry
                .get(&descriptor.id)
                .and_then(|state| state.last_known_position);
            if known == Some(position) {
                // Applying the same report again would only duplicate the trail point
                report.unchanged += 1;
            } else {
                report.refreshed += 1;
                if let Some(update) = ctx.registry.apply_position(&descriptor.id, position, descriptor.speed) {
                    render_update(adapter, &update);
                }
            }
        }

        match descriptor.position {
            Some(position) => {
                report.positioned += 1;
                positions.push(position);
            }
            None => {
                report.unpositioned += 1;
                tracing::debug!("Entity {} has no reported position yet", descriptor.id);
            }
        }

        if ctx.subscribe(&descriptor.id) {
            report.newly_subscribed.push(descriptor.id.clone());
        }
    }

    report.bounds = GeoBounds::enclosing(&positions);

    tracing::info!(
        "Snapshot loaded: {} new, {} refreshed, {} unchanged, {} positioned, {} without position",
        report.registered,
        report.refreshed,
        report.unchanged,
        report.positioned,
        report.unpositioned
    );

    SnapshotOutcome::Loaded(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::render_adapter::testing::RecordingRenderAdapter;
    use crate::application::render_adapter::RenderCommand;
    use crate::domain::position::PositionSample;

    fn unit(id: &str) -> ExternalEntityDescriptor {
        ExternalEntityDescriptor::new(id, format!("Unit {}", id))
    }

    #[test]
    fn test_empty_snapshot() {
        let mut ctx = TrackingContext::default();
        let mut adapter = RecordingRenderAdapter::default();

        let outcome = load_snapshot(&mut ctx, Vec::new(), &mut adapter);

        assert_eq!(outcome, SnapshotOutcome::Empty);
        assert!(ctx.registry.is_empty());
        assert!(adapter.commands().is_empty());
    }

    #[test]
    fn test_positioned_entity_is_placed_with_one_point_trail() {
        let mut ctx = TrackingContext::default();
        let mut adapter = RecordingRenderAdapter::default();
        let position = PositionSample::new(52.0, 9.0);

        load_snapshot(
            &mut ctx,
            vec![unit("U1").at(position).with_speed(30.0).with_icon("icon.png")],
            &mut adapter,
        );

        let id = EntityId::from("U1");
        let state = ctx.registry.get(&id).unwrap();
        assert_eq!(state.trail.as_sequence(), vec![position]);
        assert_eq!(
            adapter.commands(),
            vec![
                RenderCommand::PlaceMarker {
                    id: id.clone(),
                    position,
                    label: "Unit U1\nSpeed: 30 kph".to_string(),
                    icon_url: Some("icon.png".to_string()),
                },
                RenderCommand::AppendTrailPoint { id, position },
            ]
        );
    }

    #[test]
    fn test_unpositioned_entity_is_registered_and_subscribed() {
        let mut ctx = TrackingContext::default();
        let mut adapter = RecordingRenderAdapter::default();

        let outcome = load_snapshot(&mut ctx, vec![unit("U2")], &mut adapter);

        let id = EntityId::from("U2");
        let state = ctx.registry.get(&id).unwrap();
        assert!(state.last_known_position.is_none());
        assert!(state.trail.is_empty());
        assert!(ctx.is_subscribed(&id));
        assert_eq!(outcome.newly_subscribed(), &[id]);
        assert!(adapter.commands().is_empty());
    }

    #[test]
    fn test_distinct_ids_give_exact_registry_size() {
        let mut ctx = TrackingContext::default();
        let mut adapter = RecordingRenderAdapter::default();
        let descriptors = vec![
            unit("A").at(PositionSample::new(1.0, 1.0)),
            unit("B"),
            unit("A").at(PositionSample::new(1.5, 1.0)),
            unit("C").at(PositionSample::new(2.0, 3.0)),
        ];

        let outcome = load_snapshot(&mut ctx, descriptors, &mut adapter);

        assert_eq!(ctx.registry.len(), 3);
        assert_eq!(ctx.subscription_count(), 3);
        match outcome {
            SnapshotOutcome::Loaded(report) => {
                assert_eq!(report.registered, 3);
                assert_eq!(report.refreshed, 1);
                assert_eq!(report.newly_subscribed.len(), 3);
                let bounds = report.bounds.unwrap();
                assert_eq!((bounds.south, bounds.north), (1.0, 2.0));
                assert_eq!((bounds.west, bounds.east), (1.0, 3.0));
            }
            SnapshotOutcome::Empty => panic!("expected a loaded snapshot"),
        }
    }

    #[test]
    fn test_reload_does_not_resubscribe() {
        let mut ctx = TrackingContext::default();
        let mut adapter = RecordingRenderAdapter::default();
        load_snapshot(&mut ctx, vec![unit("U1").at(PositionSample::new(52.0, 9.0))], &mut adapter);
        adapter.clear();

        let outcome = load_snapshot(
            &mut ctx,
            vec![unit("U1").at(PositionSample::new(52.01, 9.0)), unit("U2")],
            &mut adapter,
        );

        assert_eq!(ctx.registry.len(), 2);
        assert_eq!(outcome.newly_subscribed(), &[EntityId::from("U2")]);

        let state = ctx.registry.get(&EntityId::from("U1")).unwrap();
        assert_eq!(state.trail.len(), 2);
        assert!(matches!(adapter.commands()[0], RenderCommand::MoveMarker { .. }));
    }

    #[test]
    fn test_reload_at_same_position_keeps_trail() {
        let mut ctx = TrackingContext::default();
        let mut adapter = RecordingRenderAdapter::default();
        let position = PositionSample::new(52.0, 9.0);
        load_snapshot(&mut ctx, vec![unit("U1").at(position)], &mut adapter);
        adapter.clear();

        for _ in 0..3 {
            let outcome = load_snapshot(&mut ctx, vec![unit("U1").at(position)], &mut adapter);
            match outcome {
                SnapshotOutcome::Loaded(report) => {
                    assert_eq!(report.unchanged, 1);
                    assert_eq!(report.refreshed, 0);
                }
                SnapshotOutcome::Empty => panic!("expected a loaded snapshot"),
            }
        }

        let state = ctx.registry.get(&EntityId::from("U1")).unwrap();
        assert_eq!(state.trail.as_sequence(), vec![position]);
        assert!(adapter.commands().is_empty());
    }
}
