//! Replay round-trip laws: what is written is what is read, and a recorded
//! game reproduces itself.

use quadfall_engine::{
    Game, GameConfig, LockStyle, RandomizerKind, Replay, ReplayInput, ReplayRecorder,
    RotationSystem, VirtualKey, VirtualKeySet,
};

#[test]
fn literal_round_trip() {
    let mut config = GameConfig::default();
    config.seed = Some(77);
    config.goal = 10;
    config.rotation_system = RotationSystem::Dtet;
    let replay = Replay {
        config: config.clone(),
        inputs: vec![ReplayInput {
            tick: 786,
            keys: VirtualKeySet::from_bits(0x3000_0198),
        }],
    };
    let read_back = Replay::read(&replay.to_bytes()).unwrap();
    assert_eq!(read_back.config, config);
    assert_eq!(read_back.inputs, replay.inputs);
    assert_eq!(read_back.inputs[0].tick, 786);
    assert_eq!(read_back.inputs[0].keys.bits(), 0x3000_0198);
}

#[test]
fn every_option_survives_the_trip() {
    let mut config = GameConfig::default();
    config.seed = Some(0xDEAD_BEEF);
    config.well_width = 12;
    config.well_height = 25;
    config.well_hidden = 4;
    config.das_speed_ms = 33;
    config.das_delay_ms = 117;
    config.are_delay_ms = 250;
    config.warn_on_bad_finesse = true;
    config.are_cancellable = true;
    config.lock_style = LockStyle::Step;
    config.lock_delay_ms = 500;
    config.floorkick_limit = 0;
    config.one_shot_soft_drop = true;
    config.rotation_system = RotationSystem::Tgm3;
    config.gravity_ms_per_cell = 750;
    config.soft_drop_gravity_ms_per_cell = 50;
    config.randomizer = RandomizerKind::Tgm2;
    config.ready_phase_length_ms = 0;
    config.go_phase_length_ms = 1000;
    config.infinite_ready_go_hold = true;
    config.preview_piece_count = 5;
    config.goal = 150;
    config.show_ghost = false;
    let replay = Replay {
        config: config.clone(),
        inputs: Vec::new(),
    };
    let read_back = Replay::read(&replay.to_bytes()).unwrap();
    assert_eq!(read_back.config, config);
}

#[test]
fn magic_and_sentinel_frame_the_stream() {
    let replay = Replay {
        config: GameConfig::default(),
        inputs: vec![ReplayInput {
            tick: 1,
            keys: VirtualKeySet::from_bits(VirtualKey::Left as u32),
        }],
    };
    let bytes = replay.to_bytes();
    assert_eq!(&bytes[..4], b"ZS1\n");
    let tail = &bytes[bytes.len() - 16..];
    assert_eq!(&tail[..8], &[0xFF; 8]);
    assert_eq!(&tail[8..12], &1u32.to_le_bytes());
    assert_eq!(&tail[12..], &(VirtualKey::Left as u32).to_le_bytes());
}

#[test]
fn recorded_game_reproduces_itself() {
    let mut config = GameConfig::default();
    config.seed = Some(0x5EED);
    config.ready_phase_length_ms = 0;
    config.go_phase_length_ms = 0;
    config.randomizer = RandomizerKind::Bag7SeamCheck;

    // Play a scripted game, recording the key edges.
    let script = |tick: u32| -> VirtualKeySet {
        let mut set = VirtualKeySet::EMPTY;
        if tick % 9 < 4 {
            set.insert(VirtualKey::Right);
        }
        if tick % 13 == 0 {
            set.insert(VirtualKey::RotateLeft);
        }
        if tick % 31 == 0 {
            set.insert(VirtualKey::Up);
        }
        set
    };
    let mut live = Game::new(config).unwrap();
    let mut recorder = ReplayRecorder::new();
    for tick in 0..400u32 {
        let held = script(tick);
        recorder.record(tick, held);
        live.tick(held);
    }
    let replay = recorder.into_replay(live.replay_config());

    // Drive a fresh engine from the replay alone.
    let mut playback = Game::from_replay(&replay).unwrap();
    for tick in 0..400u32 {
        playback.tick(replay.keys_at(tick));
    }

    let (a, b) = (live.snapshot(), playback.snapshot());
    assert_eq!(a.phase, b.phase);
    assert_eq!(a.stats, b.stats);
    assert_eq!(a.well, b.well);
    assert_eq!(a.piece, b.piece);
    assert_eq!(a.seed, b.seed);
}
