//! # Locator Guarantees
//!
//! Properties that must hold for every run, independent of scheduling:
//!
//! 1. **Atomic optional resolution**: a ready provider is never observed as
//!    missing by a concurrent injection call
//! 2. **Two-phase ordering**: ready requires a prior registration
//! 3. **Cycle determinism**: a cycle is reported, never waited on
//! 4. **Optional absence**: an unregistered optional dependency resolves to
//!    `None` within one step
//! 5. **All-or-nothing**: a failed call applies nothing
//! 6. **Timeout accounting**: a timeout fires at its duration, within one
//!    tick

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use futures::future::join_all;
    use tokio::time::Instant;

    use locator_core::{
        ContractKey, InjectOptions, InjectionError, InjectionField, LocatorConfig,
        OutstandingStatus, RegisterOptions, RegistrationState, RegistryError, ServiceLocatorApi,
    };

    use crate::fixtures::{
        locator, ready, AudioService, Mixer, PhysicsService, Player, Radar, RigidBodies,
        SpatialMixer,
    };

    // =============================================================================
    // ATOMICITY
    // =============================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_optional_field_never_missing_under_concurrency() {
        let locator = locator(LocatorConfig::default());
        ready::<dyn AudioService>(&locator, Arc::new(Mixer { channel: 1 }));
        ready::<dyn PhysicsService>(&locator, Arc::new(RigidBodies));

        let calls = (0..64).map(|_| {
            let locator = Arc::clone(&locator);
            tokio::spawn(async move {
                let mut player = Player::default();
                locator
                    .inject_into(&mut player, InjectOptions::new())
                    .await
                    .map(|_| player.physics.is_some())
            })
        });

        for result in join_all(calls).await {
            assert_eq!(result.expect("join"), Ok(true));
        }
    }

    // =============================================================================
    // TWO-PHASE ORDERING
    // =============================================================================

    #[tokio::test]
    async fn test_mark_ready_requires_registration() {
        let locator = locator(LocatorConfig::default());

        let error = locator.mark_ready::<dyn AudioService>().expect_err("invalid");
        assert_eq!(
            error,
            RegistryError::InvalidState {
                contract: ContractKey::of::<dyn AudioService>(),
                state: RegistrationState::Unregistered,
            }
        );

        locator
            .register::<dyn AudioService>(Arc::new(Mixer { channel: 4 }), RegisterOptions::new())
            .expect("register");
        assert!(locator.get_ready::<dyn AudioService>().is_none());

        locator.mark_ready::<dyn AudioService>().expect("ready");
        let audio = locator.get_ready::<dyn AudioService>().expect("ready audio");
        assert_eq!(audio.channel(), 4);
    }

    // =============================================================================
    // CYCLE DETERMINISM
    // =============================================================================

    fn audio_needs_physics() -> RegisterOptions {
        RegisterOptions::new().with_dependencies(vec![InjectionField::required::<dyn PhysicsService>(
            "physics",
        )])
    }

    fn physics_needs_audio() -> RegisterOptions {
        RegisterOptions::new().with_dependencies(vec![InjectionField::required::<dyn AudioService>(
            "audio",
        )])
    }

    #[tokio::test]
    async fn test_cycle_reported_in_either_registration_order() {
        for audio_first in [true, false] {
            let locator = locator(LocatorConfig::default());

            let (first, second) = if audio_first {
                (
                    locator.register::<dyn AudioService>(
                        Arc::new(Mixer { channel: 1 }),
                        audio_needs_physics(),
                    ),
                    locator.register::<dyn PhysicsService>(Arc::new(RigidBodies), physics_needs_audio()),
                )
            } else {
                (
                    locator.register::<dyn PhysicsService>(Arc::new(RigidBodies), physics_needs_audio()),
                    locator.register::<dyn AudioService>(
                        Arc::new(Mixer { channel: 1 }),
                        audio_needs_physics(),
                    ),
                )
            };

            assert!(first.is_ok());
            match second {
                Err(RegistryError::CircularDependency { record, .. }) => {
                    let expected = if audio_first {
                        "AudioService → PhysicsService → AudioService"
                    } else {
                        "PhysicsService → AudioService → PhysicsService"
                    };
                    assert_eq!(record.describe(), expected);
                }
                other => panic!("expected a cycle, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_cycle_reported_at_injection_not_as_timeout() {
        let locator = locator(LocatorConfig::default());
        locator
            .register::<dyn PhysicsService>(Arc::new(RigidBodies), physics_needs_audio())
            .expect("physics");

        let started = std::time::Instant::now();
        let mut mixer = SpatialMixer::default();
        let error = locator
            .inject_into(
                &mut mixer,
                InjectOptions::new().with_timeout(Duration::from_secs(30)),
            )
            .await
            .expect_err("cycle");

        assert_eq!(error.kind(), "circular");
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(locator
            .graph()
            .has_circular_error(ContractKey::of::<dyn PhysicsService>()));
    }

    #[tokio::test]
    async fn test_exempt_contract_never_forms_cycle() {
        let locator = locator(LocatorConfig::default());
        locator
            .register::<dyn PhysicsService>(Arc::new(RigidBodies), physics_needs_audio().exempt())
            .expect("exempt physics");
        locator
            .register::<dyn AudioService>(Arc::new(Mixer { channel: 2 }), audio_needs_physics())
            .expect("audio");
    }

    // =============================================================================
    // OPTIONAL ABSENCE
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_unregistered_optional_resolves_within_one_tick() {
        let config = LocatorConfig::default();
        let tick = config.tick_interval;
        let locator = locator(config);
        let started = Instant::now();

        let mut radar = Radar::default();
        let outcome = locator
            .inject_into(&mut radar, InjectOptions::new())
            .await
            .expect("inject");

        assert!(outcome.is_completed());
        assert!(radar.physics.is_none());
        assert!(started.elapsed() < tick);
    }

    // =============================================================================
    // ALL-OR-NOTHING
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_failed_call_applies_nothing() {
        let locator = locator(LocatorConfig::default());
        ready::<dyn PhysicsService>(&locator, Arc::new(RigidBodies));

        let mut player = Player::default();
        let result = locator
            .inject_into(
                &mut player,
                InjectOptions::new().with_timeout(Duration::from_millis(100)),
            )
            .await;

        assert!(result.is_err());
        assert!(player.physics.is_none());
        assert!(player.audio.is_none());
    }

    #[tokio::test]
    async fn test_shutdown_applies_resolved_fields() {
        let locator = locator(LocatorConfig::default());
        ready::<dyn PhysicsService>(&locator, Arc::new(RigidBodies));

        let task = {
            let locator = Arc::clone(&locator);
            tokio::spawn(async move {
                let mut player = Player::default();
                let outcome = locator.inject_into(&mut player, InjectOptions::new()).await;
                (outcome, player)
            })
        };
        crate::fixtures::until(|| {
            locator
                .registry()
                .waiter_count(ContractKey::of::<dyn AudioService>())
                > 0
        })
        .await;

        locator.shutdown();
        let (outcome, player) = task.await.expect("join");
        assert!(outcome.expect("interrupted").is_interrupted());
        assert!(player.physics.is_some());
        assert!(player.audio.is_none());
    }

    // =============================================================================
    // TIMEOUT ACCOUNTING
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fires_at_configured_duration() {
        let config = LocatorConfig::default();
        let tick = config.tick_interval;
        let locator = locator(config);
        let duration = Duration::from_millis(250);
        let started = Instant::now();

        let mut player = Player::default();
        let error = locator
            .inject_into(&mut player, InjectOptions::new().with_timeout(duration))
            .await
            .expect_err("timeout");
        let elapsed = started.elapsed();

        assert!(elapsed >= duration, "fired early: {elapsed:?}");
        assert!(elapsed <= duration + tick, "fired late: {elapsed:?}");
        match error {
            InjectionError::Timeout {
                duration: reported,
                outstanding,
                ..
            } => {
                assert_eq!(reported, duration);
                assert_eq!(outstanding[0].status, OutstandingStatus::NeverRegistered);
            }
            other => panic!("expected a timeout, got {other}"),
        }
        assert_eq!(locator.scheduler().active_count(), 0);
        assert_eq!(locator.registry().pending_waiters(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_calls_leave_no_waiters() {
        let locator = locator(LocatorConfig::default());

        for _ in 0..3 {
            let mut player = Player::default();
            let result = locator
                .inject_into(
                    &mut player,
                    InjectOptions::new().with_timeout(Duration::from_millis(20)),
                )
                .await;
            assert!(result.is_err());
        }

        assert_eq!(locator.registry().pending_waiters(), 0);
        assert_eq!(
            locator
                .registry()
                .waiter_count(ContractKey::of::<dyn AudioService>()),
            0
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_config_default_timeout_applies() {
        let config = LocatorConfig::default().with_default_timeout(Some(Duration::from_millis(80)));
        let locator = locator(config);
        let started = Instant::now();

        let mut player = Player::default();
        let error = locator
            .inject_into(&mut player, InjectOptions::new())
            .await
            .expect_err("timeout");

        assert_eq!(error.kind(), "timeout");
        assert!(started.elapsed() >= Duration::from_millis(80));
    }
}
