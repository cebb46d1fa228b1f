//! # Register → Ready → Inject Flows
//!
//! End-to-end flows through the public facade, including the error-mode
//! surface and late providers.

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::time::timeout;
    use tokio_util::sync::CancellationToken;

    use locator_core::{
        ContractKey, ErrorMode, InjectOptions, InjectionError, InjectionField, LocatorConfig,
        RegisterOptions, RegistryError, ServiceLocatorApi, WaitError,
    };

    use crate::fixtures::{
        locator, ready, until, AudioService, Gamepad, InputService, LocalPlayer, Mixer,
        PhysicsService, Player, Radar, RigidBodies, SpatialMixer,
    };

    #[tokio::test]
    async fn test_ready_provider_injected_immediately() {
        let locator = locator(LocatorConfig::default());
        let mixer: Arc<dyn AudioService> = Arc::new(Mixer { channel: 3 });
        ready::<dyn AudioService>(&locator, Arc::clone(&mixer));

        let mut player = Player::default();
        let outcome = timeout(
            Duration::from_millis(500),
            locator.inject_into(&mut player, InjectOptions::new()),
        )
        .await
        .expect("completes immediately")
        .expect("inject");

        assert!(outcome.is_completed());
        let audio = player.audio.expect("audio injected");
        assert!(Arc::ptr_eq(&audio, &mixer));
    }

    #[tokio::test]
    async fn test_unregistered_optional_is_none_well_before_timeout() {
        let locator = locator(LocatorConfig::default());

        let mut radar = Radar::default();
        let outcome = timeout(
            Duration::from_millis(500),
            locator.inject_into(&mut radar, InjectOptions::new().with_timeout(Duration::from_secs(30))),
        )
        .await
        .expect("no timeout wait")
        .expect("inject");

        assert!(radar.physics.is_none());
        assert_eq!(outcome.report().map(|r| r.absent.clone()), Some(vec!["physics"]));
    }

    #[tokio::test]
    async fn test_registration_cycle_names_path() {
        let locator = locator(LocatorConfig::default());
        locator
            .register::<dyn AudioService>(
                Arc::new(Mixer { channel: 1 }),
                RegisterOptions::new()
                    .with_dependencies(vec![InjectionField::required::<dyn PhysicsService>("physics")]),
            )
            .expect("audio");

        let error = locator
            .register::<dyn PhysicsService>(
                Arc::new(RigidBodies),
                RegisterOptions::new()
                    .with_dependencies(vec![InjectionField::required::<dyn AudioService>("audio")]),
            )
            .expect_err("cycle");

        let message = error.to_string();
        assert!(message.contains("AudioService → PhysicsService → AudioService"));
        assert!(message.contains("closed by AudioService.physics"));
        assert!(locator.dependency_report().contains("[circular:"));
    }

    #[tokio::test]
    async fn test_provider_descriptor_edges_checked_at_registration() {
        let locator = locator(LocatorConfig::default());
        locator
            .register_provider::<dyn AudioService, SpatialMixer>(
                Arc::new(Mixer { channel: 1 }),
                RegisterOptions::new(),
            )
            .expect("audio");

        let error = locator
            .register::<dyn PhysicsService>(
                Arc::new(RigidBodies),
                RegisterOptions::new()
                    .with_dependencies(vec![InjectionField::required::<dyn AudioService>("audio")]),
            )
            .expect_err("cycle");
        match error {
            RegistryError::CircularDependency { record, .. } => {
                assert_eq!(record.describe(), "AudioService → PhysicsService → AudioService");
            }
            other => panic!("expected a cycle, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_late_provider_completes_pending_injection() {
        let locator = locator(LocatorConfig::default());

        let task = {
            let locator = Arc::clone(&locator);
            tokio::spawn(async move {
                let mut player = Player::default();
                locator
                    .inject_into(&mut player, InjectOptions::new())
                    .await
                    .map(|_| player.audio.map(|a| a.channel()))
            })
        };
        until(|| {
            locator
                .registry()
                .waiter_count(ContractKey::of::<dyn AudioService>())
                > 0
        })
        .await;

        locator
            .register::<dyn AudioService>(Arc::new(Mixer { channel: 8 }), RegisterOptions::new())
            .expect("register");
        // Registered is not enough.
        tokio::task::yield_now().await;
        assert!(!task.is_finished());

        locator.mark_ready::<dyn AudioService>().expect("ready");
        assert_eq!(task.await.expect("join"), Ok(Some(8)));
    }

    #[tokio::test]
    async fn test_inherited_fields_injected() {
        let locator = locator(LocatorConfig::default());
        ready::<dyn AudioService>(&locator, Arc::new(Mixer { channel: 1 }));
        ready::<dyn InputService>(&locator, Arc::new(Gamepad));

        let mut local = LocalPlayer::default();
        let outcome = locator
            .inject_into(&mut local, InjectOptions::new())
            .await
            .expect("inject");

        assert!(local.input.is_some());
        assert!(local.player.audio.is_some());
        assert!(local.player.physics.is_none());
        let report = outcome.report().expect("report");
        assert_eq!(report.resolved, vec!["audio", "input"]);
        assert_eq!(report.absent, vec!["physics"]);
    }

    #[tokio::test]
    async fn test_wait_until_ready_per_caller_cancellation() {
        let locator = locator(LocatorConfig::default());
        let cancelled = CancellationToken::new();

        let first = {
            let locator = Arc::clone(&locator);
            let token = cancelled.clone();
            tokio::spawn(async move {
                locator
                    .wait_until_ready::<dyn AudioService>(&token)
                    .await
                    .map(|a| a.channel())
            })
        };
        let second = {
            let locator = Arc::clone(&locator);
            tokio::spawn(async move {
                locator
                    .wait_until_ready::<dyn AudioService>(&CancellationToken::new())
                    .await
                    .map(|a| a.channel())
            })
        };
        until(|| {
            locator
                .registry()
                .waiter_count(ContractKey::of::<dyn AudioService>())
                == 2
        })
        .await;

        cancelled.cancel();
        assert_eq!(
            first.await.expect("join"),
            Err(WaitError::Cancelled {
                contract: ContractKey::of::<dyn AudioService>()
            })
        );

        ready::<dyn AudioService>(&locator, Arc::new(Mixer { channel: 5 }));
        assert_eq!(second.await.expect("join"), Ok(5));
    }

    #[tokio::test]
    async fn test_try_get_ready_reports_observed_state() {
        let locator = locator(LocatorConfig::default());
        assert!(locator.try_get_ready::<dyn AudioService>().is_err());

        ready::<dyn AudioService>(&locator, Arc::new(Mixer { channel: 2 }));
        let audio = locator.try_get_ready::<dyn AudioService>().expect("ready");
        assert_eq!(audio.channel(), 2);
    }

    // =============================================================================
    // ERROR MODES
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_custom_handler_invoked_for_every_failure() {
        let failures = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&failures);
        let config = LocatorConfig::default().with_error_mode(ErrorMode::custom(move |error| {
            assert_eq!(error.target(), "Player");
            seen.fetch_add(1, Ordering::SeqCst);
        }));
        let locator = locator(config);

        for _ in 0..3 {
            let mut player = Player::default();
            let outcome = locator
                .inject_into(
                    &mut player,
                    InjectOptions::new().with_timeout(Duration::from_millis(40)),
                )
                .await
                .expect("suppressed");
            assert!(outcome.is_suppressed());
            assert!(player.audio.is_none());
        }

        // Through the injector directly as well.
        let mut player = Player::default();
        let outcome = locator
            .injector()
            .inject_into(
                &mut player,
                InjectOptions::new().with_timeout(Duration::from_millis(40)),
            )
            .await
            .expect("suppressed");
        assert!(outcome.is_suppressed());

        assert_eq!(failures.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_call_error_mode_overrides_default() {
        let locator = locator(LocatorConfig::default().with_error_mode(ErrorMode::Silent));

        let mut player = Player::default();
        let result = locator
            .inject_into(
                &mut player,
                InjectOptions::new()
                    .with_timeout(Duration::from_millis(30))
                    .with_error_mode(ErrorMode::Rethrow),
            )
            .await;
        assert!(matches!(result, Err(InjectionError::Timeout { .. })));

        let mut player = Player::default();
        let outcome = locator
            .inject_into(
                &mut player,
                InjectOptions::new().with_timeout(Duration::from_millis(30)),
            )
            .await
            .expect("silent");
        match outcome {
            locator_core::InjectionOutcome::Suppressed(error) => assert_eq!(error.kind(), "timeout"),
            other => panic!("expected suppression, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_registry_errors_ignore_error_mode() {
        let locator = locator(LocatorConfig::default().with_error_mode(ErrorMode::Silent));
        let error = locator.mark_ready::<dyn AudioService>().expect_err("invalid state");
        assert!(matches!(error, RegistryError::InvalidState { .. }));
    }
}
