//! # Frame encoder
//!
//! Every frame sent to the Minidrone has the same header:
//!
//! | Byte | Content |
//! |------|---------|
//! | 0 | Frame type, [DATA] or [DATA_WITH_ACK] |
//! | 1 | Sequence number of the channel the frame is sent on |
//! | 2 | Project, [PROJECT_COMMON] or [PROJECT_MINIDRONE] |
//! | 3 | Class within the project |
//! | 4-5 | Command id, little endian |
//! | 6.. | Arguments |
//!
//! Enumerated arguments are 32 bits little endian, strings are NUL terminated.
//!
//! The functions here are pure: the sequence number is passed in and taken from a [SequenceCounter] by the caller.

use crate::subsystems::piloting::MotionVector;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Frame type for frames not acknowledged by the drone
pub const DATA: u8 = 0x02;
/// Frame type for frames acknowledged by the drone
pub const DATA_WITH_ACK: u8 = 0x04;

/// Project of the commands common to all Parrot drones
pub const PROJECT_COMMON: u8 = 0x00;
/// Project of the Minidrone specific commands
pub const PROJECT_MINIDRONE: u8 = 0x02;

// Minidrone classes
const CLASS_PILOTING: u8 = 0x00;
const CLASS_ANIMATIONS: u8 = 0x04;
const CLASS_USB_ACCESSORY: u8 = 0x10;

// Common classes
const CLASS_COMMON: u8 = 0x04;
const COMMON_CURRENT_DATE: u16 = 0x01;

// Animation commands
const ANIMATION_FLIP: u16 = 0x00;

// USB accessory commands
const ACCESSORY_LIGHT: u16 = 0x00;
const ACCESSORY_CLAW: u16 = 0x01;
const ACCESSORY_GUN: u16 = 0x02;
const GUN_FIRE: u32 = 0;

/// Size of the piloting command frame
pub const PCMD_FRAME_LEN: usize = 19;

/// Piloting class commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum PilotingCommand {
    /// Set the current orientation as level
    FlatTrim = 0,
    /// Take off
    TakeOff = 1,
    /// Continuous piloting command, see [encode_pcmd()]
    Pcmd = 2,
    /// Land
    Landing = 3,
    /// Cut the motors
    Emergency = 4,
}

/// Flip direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum Animation {
    /// Flip forward
    Front = 0,
    /// Flip backward
    Back = 1,
    /// Flip to the right
    Right = 2,
    /// Flip to the left
    Left = 3,
}

/// Light accessory mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum LightMode {
    /// Steady light
    Fixed = 0,
    /// Blinking light
    Blinked = 1,
    /// Oscillating light
    Oscillated = 3,
}

/// Claw accessory action
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum ClawMode {
    /// Open the claw
    Open = 0,
    /// Close the claw
    Closed = 1,
}

/// Per channel frame sequence counter
///
/// The counter is 16 bits wide, only its low byte is sent in the frames so the drone sees it wrapping from 255 to 0.
#[derive(Debug, Default, Clone)]
pub struct SequenceCounter {
    value: u16,
}

impl SequenceCounter {
    /// Start counting from `value`, the first call to [SequenceCounter::next()] returns `value + 1`
    pub fn starting_at(value: u16) -> Self {
        Self { value }
    }

    /// Increment the counter and return the sequence byte to put in the next frame
    pub fn next(&mut self) -> u8 {
        self.value = self.value.wrapping_add(1);
        (self.value & 0xff) as u8
    }

    /// Current value of the counter
    pub fn value(&self) -> u16 {
        self.value
    }
}

fn frame(frame_type: u8, sequence: u8, project: u8, class: u8, command: u16, args: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(6 + args.len());
    frame.push(frame_type);
    frame.push(sequence);
    frame.push(project);
    frame.push(class);
    frame.extend_from_slice(&command.to_le_bytes());
    frame.extend_from_slice(args);
    frame
}

/// Discrete piloting command: flat trim, take off, landing or emergency
pub fn encode_piloting(sequence: u8, command: PilotingCommand) -> Vec<u8> {
    frame(DATA, sequence, PROJECT_MINIDRONE, CLASS_PILOTING, command.into(), &[])
}

/// Settings frame carrying the current date
pub fn encode_current_date(sequence: u8, date: &str) -> Vec<u8> {
    let mut args = Vec::with_capacity(date.len() + 1);
    args.extend_from_slice(date.as_bytes());
    args.push(0);
    frame(DATA_WITH_ACK, sequence, PROJECT_COMMON, CLASS_COMMON, COMMON_CURRENT_DATE, &args)
}

/// Flip animation
pub fn encode_animation(sequence: u8, animation: Animation) -> Vec<u8> {
    let direction: u32 = animation.into();
    frame(DATA, sequence, PROJECT_MINIDRONE, CLASS_ANIMATIONS, ANIMATION_FLIP, &direction.to_le_bytes())
}

/// Light accessory control
pub fn encode_light_control(sequence: u8, id: u8, mode: LightMode, intensity: u8) -> Vec<u8> {
    let mode: u32 = mode.into();
    let mut args = vec![id];
    args.extend_from_slice(&mode.to_le_bytes());
    args.push(intensity);
    frame(DATA, sequence, PROJECT_MINIDRONE, CLASS_USB_ACCESSORY, ACCESSORY_LIGHT, &args)
}

/// Claw accessory control
pub fn encode_claw_control(sequence: u8, id: u8, mode: ClawMode) -> Vec<u8> {
    let mode: u32 = mode.into();
    let mut args = vec![id];
    args.extend_from_slice(&mode.to_le_bytes());
    frame(DATA, sequence, PROJECT_MINIDRONE, CLASS_USB_ACCESSORY, ACCESSORY_CLAW, &args)
}

/// Gun accessory fire
pub fn encode_gun_control(sequence: u8, id: u8) -> Vec<u8> {
    let mut args = vec![id];
    args.extend_from_slice(&GUN_FIRE.to_le_bytes());
    frame(DATA, sequence, PROJECT_MINIDRONE, CLASS_USB_ACCESSORY, ACCESSORY_GUN, &args)
}

/// Piloting command frame
///
/// The axes are sent as signed bytes, the heading as a little endian IEEE-754 float and the frame ends with 4 zero
/// bytes.
pub fn encode_pcmd(sequence: u8, vector: &MotionVector) -> [u8; PCMD_FRAME_LEN] {
    let mut frame = [0u8; PCMD_FRAME_LEN];
    frame[0] = DATA;
    frame[1] = sequence;
    frame[2] = PROJECT_MINIDRONE;
    frame[3] = CLASS_PILOTING;
    frame[4..6].copy_from_slice(&u16::from(PilotingCommand::Pcmd).to_le_bytes());
    frame[6] = vector.flag as u8;
    frame[7] = vector.roll as u8;
    frame[8] = vector.pitch as u8;
    frame[9] = vector.yaw as u8;
    frame[10] = vector.throttle as u8;
    frame[11..15].copy_from_slice(&vector.heading.to_le_bytes());
    frame
}
