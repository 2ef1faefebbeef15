use nibble_vm::{run, trace, Fault, HaltReason, Machine, RunOutcome, Status};
use toymcu_core::{
    gmc4::LEDS, BuildError, FlipJump, FlipJumpConfig, Gmc4, Gmc4Config, Gmc4Reg, Peripheral,
    RunConfig, SourceError,
};

const KNIGHT_RIDER: &str = "
8 0      # TIA 0
2        # CH
A 0 E 1  # LED 0
A 1 E 1  # LED 1
A 2 E 1  # LED 2
A 0 8 3  # loop: TIY 0, TIA 3
E 2 3 E 1 3 2 E C 2   # left
9 1 B 1 C 7 F 1 3
3 9 F B F
E 2 3 E 1 3 2 E C 2   # right
9 F B F C F F 2 B
F 0 F
";

#[test]
fn flipjump_self_loop_halts_in_one_step() {
    let mut m = FlipJump::from_source("10 00", FlipJumpConfig::default()).unwrap();
    assert_eq!(m.step(), Status::Halted(HaltReason::Finished));
    assert_eq!(m.steps(), 1);
}

#[test]
fn flipjump_flips_the_addressed_bit() {
    // flip bit 47 (byte 5, bit 7), jump to 16; at 16 halt
    let mut m = FlipJump::from_source("2f 10\n00 10\n00 00", FlipJumpConfig::default()).unwrap();
    let outcome = run(&mut m, 10);
    assert_eq!(
        outcome,
        RunOutcome::Halted {
            reason: HaltReason::Finished,
            steps: 2
        }
    );
    assert_eq!(m.memory()[5], 0x80);
}

#[test]
fn flipjump_trace_ends_at_halt() {
    let mut m = FlipJump::from_source("2f 10 00 10 00 00", FlipJumpConfig::default()).unwrap();
    let ips: Vec<u32> = trace(&mut m, 100).map(|s| s.ip).collect();
    assert_eq!(ips, vec![0, 16, 16]);
}

#[test]
fn flipjump_rejects_bad_images() {
    assert!(matches!(
        FlipJump::from_source("100", FlipJumpConfig::default()),
        Err(BuildError::Source(SourceError::BadToken { .. }))
    ));
    let config = FlipJumpConfig {
        word_bits: 0,
        start_ip: 0,
    };
    assert!(matches!(
        FlipJump::from_source("00", config),
        Err(BuildError::Config(_))
    ));
}

#[test]
fn flipjump_misaligned_start() {
    let config = FlipJumpConfig {
        word_bits: 8,
        start_ip: 4,
    };
    let mut m = FlipJump::from_source("ff ff ff ff", config).unwrap();
    assert_eq!(
        m.step().fault(),
        Some(&Fault::BadAlignment {
            address: 4,
            alignment: 8
        })
    );
}

#[test]
fn gmc4_knight_rider_sweeps_leds() {
    let mut m = Gmc4::from_source(KNIGHT_RIDER, Gmc4Config::default()).unwrap();
    // setup: TIA, CH, three TIY/SETR pairs
    for _ in 0..8 {
        m.step();
    }
    assert!(LEDS[..3].iter().all(|&led| m.led(led)));

    // between RSTR and SETR only two are lit
    for snap in trace(&mut m, 2_000) {
        let lit = snap.leds.values().filter(|&&on| on).count();
        assert!((2..=3).contains(&lit), "{lit} LEDs at pc {:#04X}", snap.pc);
    }
    assert!(m.status().is_running());
    assert!(m
        .events()
        .iter()
        .all(|e| matches!(e, Peripheral::Timer { .. })));
    assert!(!m.events().is_empty());
}

#[test]
fn gmc4_program_running_into_erased_memory_faults() {
    let mut m = Gmc4::from_source("8 5 1", Gmc4Config::default()).unwrap();
    let outcome = run(&mut m, 100);
    assert!(outcome.is_fault());
    assert_eq!(m.register(Gmc4Reg::Display), 5);
    assert_eq!(m.status().fault(), Some(&Fault::OutOfRange { address: 0x7F }));
}

#[test]
fn gmc4_snapshot_has_data_window() {
    let mut m = Gmc4::from_source("A 3 8 9 4", Gmc4Config::default()).unwrap();
    for _ in 0..3 {
        m.step();
    }
    let snap = m.snapshot();
    assert_eq!(snap.data.len(), 16);
    assert_eq!(snap.data[3], 9);
    let json = serde_json::to_value(&snap).unwrap();
    assert_eq!(json["registers"]["Y"], 3);
    assert_eq!(json["leds"]["Led0"], false);
}

#[test]
fn run_config_drives_each_machine() {
    let config = RunConfig::from_json(
        r#"{"max_steps": 3, "gmc4": {"start_address": 2}, "flipjump": {"start_ip": 16}}"#,
    )
    .unwrap();
    let mut m = Gmc4::from_source("8 5 8 7 1 1 1 1", config.gmc4).unwrap();
    run(&mut m, config.max_steps);
    assert_eq!(m.register(Gmc4Reg::A), 7);

    let mut m = FlipJump::from_source("00 00 00 10", config.flipjump).unwrap();
    assert_eq!(
        run(&mut m, config.max_steps),
        RunOutcome::Halted {
            reason: HaltReason::Finished,
            steps: 1
        }
    );
}
