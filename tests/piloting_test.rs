// Motion vector updates and the piloting command loop

mod common;

use common::{connect, wait_for, MockPeripheral};
use minidrone_lib::{validate_pitch, Error, LoopState, MotionVector};
use std::collections::HashSet;
use std::sync::Arc;

#[tokio::test]
async fn directional_commands_set_one_axis() {
    let peripheral = MockPeripheral::new();
    let drone = connect(&peripheral).await;
    let piloting = &drone.piloting;

    piloting.forward(40).unwrap();
    assert_eq!(
        piloting.vector(),
        MotionVector {
            flag: true,
            pitch: 40,
            ..Default::default()
        }
    );

    piloting.left(30).unwrap();
    piloting.up(20).unwrap();
    piloting.counter_clockwise(10).unwrap();
    let vector = piloting.vector();
    assert!(vector.flag);
    assert_eq!((vector.roll, vector.pitch, vector.yaw, vector.throttle), (-30, 40, -10, 20));

    piloting.backward(5).unwrap();
    piloting.right(6).unwrap();
    piloting.down(7).unwrap();
    piloting.clockwise(8).unwrap();
    let vector = piloting.vector();
    assert_eq!((vector.roll, vector.pitch, vector.yaw, vector.throttle), (6, -5, 8, -7));
}

#[tokio::test]
async fn speeds_are_clamped() {
    let peripheral = MockPeripheral::new();
    let drone = connect(&peripheral).await;
    let piloting = &drone.piloting;

    piloting.forward(250).unwrap();
    assert_eq!(piloting.vector().pitch, 100);
    piloting.backward(1000).unwrap();
    assert_eq!(piloting.vector().pitch, -100);
    piloting.up(-20).unwrap();
    assert_eq!(piloting.vector().throttle, 0);
    assert!(piloting.vector().flag);
    piloting.clockwise(i32::MAX).unwrap();
    assert_eq!(piloting.vector().yaw, 100);
    piloting.left(i32::MIN).unwrap();
    assert_eq!(piloting.vector().roll, 0);
}

#[tokio::test]
async fn hover_resets_everything() {
    let peripheral = MockPeripheral::new();
    let drone = connect(&peripheral).await;
    let piloting = &drone.piloting;

    piloting
        .set_vector(MotionVector {
            flag: true,
            roll: 10,
            pitch: -20,
            yaw: 30,
            throttle: -40,
            heading: 12.0,
        })
        .unwrap();
    piloting.hover().unwrap();
    assert_eq!(piloting.vector(), MotionVector::default());

    // Hovering twice is fine
    piloting.hover().unwrap();
    assert_eq!(piloting.vector(), MotionVector::default());
}

#[tokio::test]
async fn out_of_range_vectors_are_rejected() {
    let peripheral = MockPeripheral::new();
    let drone = connect(&peripheral).await;

    let too_fast = MotionVector {
        flag: true,
        pitch: 101,
        ..Default::default()
    };
    assert!(matches!(drone.piloting.set_vector(too_fast), Err(Error::InvalidParameter(_))));

    let no_heading = MotionVector {
        heading: f32::NAN,
        ..Default::default()
    };
    assert!(matches!(drone.piloting.set_vector(no_heading), Err(Error::InvalidParameter(_))));

    assert_eq!(drone.piloting.vector(), MotionVector::default());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn loop_sends_the_current_vector_with_consecutive_sequence() {
    let peripheral = MockPeripheral::new();
    let drone = connect(&peripheral).await;
    let pcmd = peripheral.pcmd();

    wait_for("PCMD loop", || drone.piloting.loop_state() == LoopState::Running).await;
    drone.piloting.right(25).unwrap();
    wait_for("20 PCMD frames", || pcmd.write_count() >= 20).await;

    let frames = pcmd.writes();
    assert_eq!(frames[0][1], 1);
    for pair in frames.windows(2) {
        assert_eq!(pair[1][1], pair[0][1].wrapping_add(1));
    }
    assert!(frames.iter().all(|frame| frame.len() == 19));

    wait_for("frame with the right roll", || {
        pcmd.writes().last().map(|frame| frame[7] as i8) == Some(25)
    })
    .await;

    // Moves only change the vector, nothing is written on the command channel
    let commands = peripheral.command().write_count();
    drone.piloting.forward(10).unwrap();
    drone.piloting.hover().unwrap();
    assert_eq!(peripheral.command().write_count(), commands);

    drone.disconnect().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn write_failures_do_not_stop_the_loop() {
    let peripheral = MockPeripheral::new();
    let drone = connect(&peripheral).await;
    let pcmd = peripheral.pcmd();

    wait_for("first PCMD frame", || pcmd.write_count() >= 1).await;

    pcmd.set_fail_writes(true);
    let attempts = pcmd.attempts();
    wait_for("failing ticks", || pcmd.attempts() >= attempts + 5).await;
    assert_eq!(drone.piloting.loop_state(), LoopState::Running);

    let written = pcmd.write_count();
    pcmd.set_fail_writes(false);
    wait_for("PCMD frames after recovery", || pcmd.write_count() >= written + 3).await;

    // Failed ticks consumed sequence numbers, the sequence keeps increasing
    let frames = pcmd.writes();
    let (before, after) = (frames[written - 1][1], frames[written][1]);
    assert!(after.wrapping_sub(before) > 1);

    drone.disconnect().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_moves_never_tear_a_frame() {
    let peripheral = MockPeripheral::new();
    let drone = Arc::new(connect(&peripheral).await);
    let pcmd = peripheral.pcmd();

    wait_for("PCMD loop", || drone.piloting.loop_state() == LoopState::Running).await;
    let start = pcmd.write_count();

    let mut tasks = Vec::new();
    for speed in 1..=100 {
        let drone = drone.clone();
        tasks.push(tokio::spawn(async move {
            drone.piloting.forward(speed)?;
            tokio::time::sleep(std::time::Duration::from_millis((speed % 7) as u64)).await;
            drone.piloting.hover()
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }
    wait_for("50 PCMD frames", || pcmd.write_count() >= start + 50).await;

    let speeds: HashSet<i8> = (1..=100).collect();
    for frame in pcmd.writes() {
        let (flag, roll, pitch, yaw, throttle) = (frame[6], frame[7], frame[8] as i8, frame[9], frame[10]);
        assert_eq!((roll, yaw, throttle), (0, 0, 0));
        match flag {
            0 => assert_eq!(pitch, 0),
            1 => assert!(speeds.contains(&pitch), "torn frame {:?}", frame),
            _ => panic!("invalid flag in {:?}", frame),
        }
    }

    drone.disconnect().await.unwrap();
}

#[test]
fn joystick_values_map_to_speeds() {
    assert_eq!(validate_pitch(0.0, 32767.0), 0);
    assert_eq!(validate_pitch(3000.0, 32767.0), 0);
    assert_eq!(validate_pitch(16383.5, 32767.0), 50);
    assert_eq!(validate_pitch(-16383.5, 32767.0), 50);
    assert_eq!(validate_pitch(32767.0, 32767.0), 100);
    assert_eq!(validate_pitch(50000.0, 32767.0), 100);
}
