//! Test doubles shared by the unit tests

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::command::Command;
use crate::control::{AudioFeedback, OsdSink};
use crate::protocols::checksum::checksum;
use crate::protocols::direct::VcpChannel;
use crate::protocols::framed::I2cBus;

/// Bus-level events in the order they happened on this thread
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Sleep(Duration),
    Write(Vec<u8>),
    Read,
}

thread_local! {
    static EVENTS: RefCell<Vec<Event>> = const { RefCell::new(Vec::new()) };
}

pub fn push_event(event: Event) {
    EVENTS.with(|events| events.borrow_mut().push(event));
}

pub fn take_events() -> Vec<Event> {
    EVENTS.with(|events| std::mem::take(&mut *events.borrow_mut()))
}

/// Records the sleep instead of blocking
pub fn record_sleep(duration: Duration) {
    push_event(Event::Sleep(duration));
}

/// A well-formed 11 byte Get VCP reply
pub fn get_vcp_reply(opcode: u8, result: u8, max: u16, current: u16) -> [u8; 11] {
    let [max_hi, max_lo] = max.to_be_bytes();
    let [cur_hi, cur_lo] = current.to_be_bytes();
    let mut reply = [
        0x6E, 0x88, 0x02, result, opcode, 0x00, max_hi, max_lo, cur_hi, cur_lo, 0x00,
    ];
    reply[10] = checksum(0x50, &reply, 0, 10);
    reply
}

#[derive(Default)]
struct BusState {
    replies: VecDeque<Vec<u8>>,
    failing_writes: usize,
    writes: usize,
    reads: usize,
}

/// I2C bus answering from a queue of canned replies
#[derive(Clone, Default)]
pub struct MockBus {
    state: Arc<Mutex<BusState>>,
}

impl MockBus {
    pub fn push_reply(&self, reply: Vec<u8>) {
        self.state.lock().unwrap().replies.push_back(reply);
    }

    pub fn fail_next_writes(&self, count: usize) {
        self.state.lock().unwrap().failing_writes = count;
    }

    pub fn write_count(&self) -> usize {
        self.state.lock().unwrap().writes
    }

    pub fn read_count(&self) -> usize {
        self.state.lock().unwrap().reads
    }
}

impl I2cBus for MockBus {
    fn write(&mut self, _data_address: u8, bytes: &[u8]) -> io::Result<()> {
        push_event(Event::Write(bytes.to_vec()));
        let mut state = self.state.lock().unwrap();
        state.writes += 1;
        if state.failing_writes > 0 {
            state.failing_writes -= 1;
            return Err(io::Error::other("nak"));
        }
        Ok(())
    }

    fn read(&mut self, _data_address: u8, buf: &mut [u8]) -> io::Result<()> {
        push_event(Event::Read);
        let mut state = self.state.lock().unwrap();
        state.reads += 1;
        match state.replies.pop_front() {
            Some(reply) => {
                buf.copy_from_slice(&reply);
                Ok(())
            }
            None => Err(io::Error::other("no reply")),
        }
    }
}

struct ChannelState {
    registers: HashMap<u8, (u16, u16)>,
    writes: Vec<(u8, u16)>,
    failing_writes: usize,
    failing_opcodes: Vec<u8>,
    probes: (bool, bool),
    probe_calls: usize,
    last_read_tries: Option<u16>,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self {
            registers: HashMap::new(),
            writes: Vec::new(),
            failing_writes: 0,
            failing_opcodes: Vec::new(),
            probes: (true, true),
            probe_calls: 0,
            last_read_tries: None,
        }
    }
}

/// VCP channel backed by a register map
#[derive(Clone, Default)]
pub struct MockChannel {
    state: Arc<Mutex<ChannelState>>,
}

impl MockChannel {
    pub fn set_register(&self, opcode: u8, current: u16, max: u16) {
        self.state.lock().unwrap().registers.insert(opcode, (current, max));
    }

    pub fn value(&self, opcode: u8) -> Option<u16> {
        self.state.lock().unwrap().registers.get(&opcode).map(|r| r.0)
    }

    pub fn writes(&self) -> Vec<(u8, u16)> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn fail_next_writes(&self, count: usize) {
        self.state.lock().unwrap().failing_writes = count;
    }

    /// Every write to `opcode` fails from now on
    pub fn fail_writes_to(&self, opcode: u8) {
        self.state.lock().unwrap().failing_opcodes.push(opcode);
    }

    pub fn set_probes(&self, supports_ddc: bool, app_report: bool) {
        self.state.lock().unwrap().probes = (supports_ddc, app_report);
    }

    pub fn probe_calls(&self) -> usize {
        self.state.lock().unwrap().probe_calls
    }

    pub fn last_read_tries(&self) -> Option<u16> {
        self.state.lock().unwrap().last_read_tries
    }
}

impl VcpChannel for MockChannel {
    fn write_vcp(&mut self, opcode: u8, value: u16) -> bool {
        let mut state = self.state.lock().unwrap();
        state.writes.push((opcode, value));
        if state.failing_writes > 0 {
            state.failing_writes -= 1;
            return false;
        }
        if state.failing_opcodes.contains(&opcode) {
            return false;
        }
        let max = state.registers.get(&opcode).map(|r| r.1).unwrap_or(100);
        state.registers.insert(opcode, (value, max));
        true
    }

    fn read_vcp(&mut self, opcode: u8, tries: u16, _min_reply_delay: Duration) -> Option<(u16, u16)> {
        let mut state = self.state.lock().unwrap();
        state.last_read_tries = Some(tries);
        state.registers.get(&opcode).copied()
    }

    fn supports_ddc(&mut self) -> bool {
        let mut state = self.state.lock().unwrap();
        state.probe_calls += 1;
        state.probes.0
    }

    fn enable_app_report(&mut self) -> bool {
        let mut state = self.state.lock().unwrap();
        state.probe_calls += 1;
        state.probes.1
    }
}

/// OSD sink remembering everything it was asked to show
#[derive(Clone, Debug, Default)]
pub struct RecordingOsd {
    events: Vec<(Command, u16, u16, bool)>,
}

impl RecordingOsd {
    pub fn events(&self) -> &[(Command, u16, u16, bool)] {
        &self.events
    }

    pub fn last(&self) -> Option<(Command, u16, u16, bool)> {
        self.events.last().copied()
    }
}

impl OsdSink for RecordingOsd {
    fn show_osd(&mut self, command: Command, value: u16, max: u16, round_chiclet: bool) {
        self.events.push((command, value, max, round_chiclet));
    }
}

/// Feedback that counts the cues it plays
#[derive(Debug, Default)]
pub struct RecordingFeedback {
    enabled: bool,
    cues: Cell<usize>,
}

impl RecordingFeedback {
    pub fn enabled() -> Self {
        Self { enabled: true, cues: Cell::new(0) }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn cues(&self) -> usize {
        self.cues.get()
    }
}

impl AudioFeedback for RecordingFeedback {
    fn is_system_feedback_enabled(&self) -> bool {
        self.enabled
    }

    fn play_feedback_cue(&self) {
        self.cues.set(self.cues.get() + 1);
    }
}
