use std::sync::Arc;
use std::time::Duration;

use pulsegate_core::{
    CommandKind, Conditions, CooldownConfig, DeviceId, EventPayload, EventUser, Mapping, MappingAction, MappingId, Pattern, PatternId,
    PatternStep,
};
use pulsegate_device::MockDeviceBackend;
use pulsegate_queue::DispatcherConfig;
use pulsegate_router::Core;
use pulsegate_safety::SafetyArbiter;
use tracing::info;

/// Feed a small, fixed sequence of synthetic events through the whole
/// pipeline against an in-memory mock device backend, then report what the
/// mock backend recorded. Analogue of the teacher's `acteon-simulation` demo
/// harness, scoped to this core's M/P/Q/S/D shape.
pub async fn run(safety: Arc<SafetyArbiter>, dispatcher_config: DispatcherConfig) {
    let device = Arc::new(MockDeviceBackend::new());
    let core = Core::spawn(safety, Arc::clone(&device) as Arc<dyn pulsegate_device::DynDeviceBackend>, dispatcher_config);

    core.admit_mapping(Mapping {
        id: MappingId::new("rose-vibrate"),
        name: "Rose gift -> vibrate".into(),
        enabled: true,
        event_kind: pulsegate_core::EventKind::Gift,
        conditions: Conditions {
            gift_name: Some("Rose".into()),
            ..Default::default()
        },
        action: MappingAction::Command {
            device_id: DeviceId::new("sim-device-1"),
            command_kind: CommandKind::Vibrate,
            intensity: 40,
            duration_ms: 1500,
            priority: 5,
        },
        cooldown: CooldownConfig {
            per_user_ms: 2000,
            ..CooldownConfig::default()
        },
        safety: None,
    })
    .expect("simulate: rose mapping is structurally valid");

    core.admit_pattern(Pattern {
        id: PatternId::new("galaxy-pulse"),
        name: "Galaxy gift pulse sequence".into(),
        description: "three-beat escalating pulse".into(),
        steps: vec![
            PatternStep::Command {
                command_kind: CommandKind::Vibrate,
                intensity: 30,
                duration_ms: 500,
                delay_ms: 0,
            },
            PatternStep::Pause { duration_ms: 300 },
            PatternStep::Command {
                command_kind: CommandKind::Vibrate,
                intensity: 60,
                duration_ms: 500,
                delay_ms: 0,
            },
            PatternStep::Pause { duration_ms: 300 },
            PatternStep::Command {
                command_kind: CommandKind::Vibrate,
                intensity: 90,
                duration_ms: 800,
                delay_ms: 0,
            },
        ],
    })
    .expect("simulate: galaxy-pulse pattern is structurally valid");

    core.admit_mapping(Mapping {
        id: MappingId::new("galaxy-pattern"),
        name: "Galaxy gift -> pulse pattern".into(),
        enabled: true,
        event_kind: pulsegate_core::EventKind::Gift,
        conditions: Conditions {
            gift_name: Some("Galaxy".into()),
            ..Default::default()
        },
        action: MappingAction::Pattern {
            device_id: DeviceId::new("sim-device-1"),
            pattern_id: PatternId::new("galaxy-pulse"),
            priority: 8,
        },
        cooldown: CooldownConfig::default(),
        safety: None,
    })
    .expect("simulate: galaxy-pattern mapping is structurally valid");

    let events = vec![
        pulsegate_core::Event::new(
            EventUser::new("u1", "alice"),
            EventPayload::Gift {
                gift_name: "Rose".into(),
                coins: 1,
                repeat: 1,
            },
        ),
        pulsegate_core::Event::new(
            EventUser::new("u2", "bob"),
            EventPayload::Gift {
                gift_name: "Galaxy".into(),
                coins: 500,
                repeat: 1,
            },
        ),
        pulsegate_core::Event::new(
            EventUser::new("u1", "alice"),
            EventPayload::Gift {
                gift_name: "Rose".into(),
                coins: 1,
                repeat: 1,
            },
        ),
    ];

    for event in &events {
        let enqueued = core.route_event(event);
        info!(kind = %event.kind, user = %event.user.display_name, enqueued, "simulate: routed event");
    }

    // Give the worker pool time to drain everything, including the second
    // Rose gift if the per-user cooldown did not suppress it.
    tokio::time::sleep(Duration::from_millis(1500)).await;

    for sent in device.recorded_sends() {
        info!(device = %sent.device_id, kind = ?sent.kind, intensity = sent.intensity, duration_ms = sent.duration_ms, "simulate: device received command");
    }
    info!(total_sent = device.send_count(), "simulate: run complete");

    core.shutdown();
}
