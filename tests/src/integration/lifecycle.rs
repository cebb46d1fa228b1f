//! # Bulk Lifecycle and Diagnostics
//!
//! Group teardown, dead-provider cleanup, full reset, and the read-only
//! diagnostic views.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use locator_core::{
        ContractKey, GroupId, InjectOptions, LocatorConfig, RegisterOptions, RegistrationState,
        ServiceInstance, ServiceLocator, ServiceLocatorApi, ServiceSnapshot, TimeoutScheduler,
    };
    use locator_telemetry::{log_event, TelemetryConfig};

    use crate::fixtures::{
        locator, ready, until, AudioService, Gamepad, InputService, Mixer, PhysicsService, Player,
        RigidBodies,
    };

    #[tokio::test]
    async fn test_unregister_group_fails_pending_injection() {
        let locator = locator(LocatorConfig::default());
        let level = GroupId::new("level-1");
        locator
            .register::<dyn AudioService>(
                Arc::new(Mixer { channel: 1 }),
                RegisterOptions::new().in_group(level.clone()),
            )
            .expect("register");
        ready::<dyn InputService>(&locator, Arc::new(Gamepad));

        let task = {
            let locator = Arc::clone(&locator);
            tokio::spawn(async move {
                let mut player = Player::default();
                let result = locator.inject_into(&mut player, InjectOptions::new()).await;
                (result, player)
            })
        };
        until(|| {
            locator
                .registry()
                .waiter_count(ContractKey::of::<dyn AudioService>())
                > 0
        })
        .await;

        assert_eq!(locator.unregister_group(&level), 1);
        let (result, player) = task.await.expect("join");
        let error = result.expect_err("missing");
        assert_eq!(error.kind(), "missing_required");
        assert!(player.audio.is_none());
        assert!(locator.get_ready::<dyn InputService>().is_some());
    }

    #[tokio::test]
    async fn test_cleanup_dead_removes_destroyed_owners() {
        let locator = locator(LocatorConfig::default());
        let host_object = Arc::new("physics host");

        let bodies = Arc::new(RigidBodies);
        let instance = ServiceInstance::concrete(&bodies)
            .expose::<dyn PhysicsService>(bodies.clone())
            .owned_by(&host_object);
        locator
            .registry()
            .register_instance(
                ContractKey::of::<dyn PhysicsService>(),
                Some(instance),
                RegisterOptions::new(),
            )
            .expect("register");
        ready::<dyn AudioService>(&locator, Arc::new(Mixer { channel: 1 }));

        assert_eq!(locator.cleanup_dead(), 0);
        drop(host_object);
        assert!(locator
            .snapshots()
            .iter()
            .any(|snapshot| !snapshot.alive));

        assert_eq!(locator.cleanup_dead(), 1);
        assert_eq!(
            locator
                .registry()
                .status_of(ContractKey::of::<dyn PhysicsService>()),
            RegistrationState::Unregistered
        );
        assert_eq!(locator.snapshots().len(), 1);
    }

    #[tokio::test]
    async fn test_clear_all_resets_everything() {
        let locator = locator(LocatorConfig::default());
        ready::<dyn AudioService>(&locator, Arc::new(Mixer { channel: 1 }));
        locator
            .register::<dyn PhysicsService>(Arc::new(RigidBodies), RegisterOptions::new().exempt())
            .expect("physics");

        let task = {
            let locator = Arc::clone(&locator);
            tokio::spawn(async move {
                let mut player = Player::default();
                let result = locator.inject_into(&mut player, InjectOptions::new()).await;
                (result, player)
            })
        };
        until(|| {
            locator
                .registry()
                .waiter_count(ContractKey::of::<dyn PhysicsService>())
                > 0
        })
        .await;

        locator.clear_all();
        let (result, player) = task.await.expect("join");
        assert!(result.is_err());
        assert!(player.audio.is_none());

        assert!(locator.snapshots().is_empty());
        assert_eq!(locator.graph().node_count(), 0);
        assert!(!locator
            .graph()
            .is_exempt(ContractKey::of::<dyn PhysicsService>()));
    }

    #[tokio::test]
    async fn test_diagnostics_views() {
        let locator = locator(LocatorConfig::default());
        locator
            .register::<dyn PhysicsService>(
                Arc::new(RigidBodies),
                RegisterOptions::new().with_tag("simulation").exempt(),
            )
            .expect("physics");
        ready::<dyn AudioService>(&locator, Arc::new(Mixer { channel: 1 }));
        locator
            .registry()
            .add_tag(ContractKey::of::<dyn AudioService>(), "core");

        let snapshots = locator.snapshots();
        let names: Vec<&str> = snapshots.iter().map(|s| s.contract.as_str()).collect();
        assert_eq!(names, vec!["AudioService", "PhysicsService"]);

        assert_eq!(
            locator.status_line(ContractKey::of::<dyn PhysicsService>()),
            "PhysicsService: Registered (tags: [simulation])"
        );
        assert_eq!(
            locator.status_line(ContractKey::of::<dyn InputService>()),
            "InputService: Unregistered"
        );
        assert_eq!(
            locator.registry().find_by_tag("core"),
            vec![ContractKey::of::<dyn AudioService>()]
        );

        let mut player = Player::default();
        locator
            .inject_into(
                &mut player,
                InjectOptions::new().with_timeout(std::time::Duration::from_millis(10)),
            )
            .await
            .ok();
        let report = locator.dependency_report();
        assert!(report.contains("Player"));
        assert!(report.contains("→ AudioService (field `audio`)"));
        assert!(report.contains("PhysicsService [exempt]"));

        let json = locator.export_json().expect("json");
        let parsed: Vec<ServiceSnapshot> = serde_json::from_str(&json).expect("parse");
        assert_eq!(parsed, snapshots);
        log_event!(debug, "lifecycle-test", "Diagnostics exported", bytes = json.len());
    }

    #[tokio::test]
    async fn test_locators_share_one_scheduler() {
        let scheduler = TimeoutScheduler::new();
        let first = ServiceLocator::with_scheduler(LocatorConfig::default(), Arc::clone(&scheduler))
            .expect("first");
        let second = ServiceLocator::with_scheduler(LocatorConfig::default(), Arc::clone(&scheduler))
            .expect("second");

        ready::<dyn AudioService>(&first, Arc::new(Mixer { channel: 1 }));
        assert!(second.get_ready::<dyn AudioService>().is_none());
        assert!(Arc::ptr_eq(first.scheduler(), second.scheduler()));
    }

    #[test]
    fn test_telemetry_config_for_host() {
        let config = TelemetryConfig::for_host("arena");
        assert_eq!(config.service_name, "arena-locator");
    }
}
