/// Test doubles simulating a SkyCooker behind the BLE link during integration tests.
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use skycooker_link::{
    core::AuthKey,
    protocol::{
        appliance::commands::OP_AUTH,
        session::{dispatcher::Dispatcher, policy::EngineConfig},
        transport::{
            frame::{decode, encode},
            inbox::ResponseInbox,
            traits::{
                ble_link::{BleLink, LinkFault},
                cooker_timer::CookerTimer,
            },
        },
    },
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::time::{sleep, Duration, Instant};

#[allow(dead_code)]
pub type Inbox = ResponseInbox<CriticalSectionRawMutex>;

#[allow(dead_code)]
pub type TestDispatcher = Dispatcher<'static, CriticalSectionRawMutex, MockLink, MockTimer>;

#[allow(dead_code)]
pub const PAIRING_KEY: [u8; 8] = [0xB5, 0x4C, 0x75, 0xB1, 0xB4, 0x0C, 0x88, 0xEF];

#[allow(dead_code)]
pub fn config() -> EngineConfig {
    EngineConfig::new(AuthKey(PAIRING_KEY))
}

//==================================================================================MockLink

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
/// Driver errors the fake link can raise.
pub enum MockError {
    /// Connection attempt refused (appliance out of range).
    Unreachable,
    Busy,
    Rejected,
    Dropped,
    Fatal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(dead_code)]
/// How the fake appliance reacts to one write.
pub enum Reply {
    /// Notify `payload` under the written sequence number after `after_ms`.
    Answer { after_ms: u64, payload: Vec<u8> },
    /// Notify raw bytes after `after_ms`.
    Raw { after_ms: u64, bytes: Vec<u8> },
    /// Swallow the write.
    Silent,
    /// Fail the write with this driver error.
    Fail(MockError),
}

#[allow(dead_code)]
impl Reply {
    pub fn answer(after_ms: u64, payload: &[u8]) -> Self {
        Reply::Answer {
            after_ms,
            payload: payload.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(dead_code)]
pub enum LinkOp {
    Connect,
    Disconnect,
    Write { seq: u8, opcode: u8, payload: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Transport operation stamped with the virtual time it happened at.
pub struct Event {
    pub at_ms: u64,
    pub op: LinkOp,
}

struct LinkState {
    connected: bool,
    connect_error: Option<MockError>,
    events: Vec<Event>,
    /// One-shot replies consumed in order, per opcode.
    scripted: HashMap<u8, VecDeque<Reply>>,
    /// Reply used once the script of an opcode is exhausted.
    fallback: HashMap<u8, Reply>,
}

#[derive(Clone)]
/// In-memory BLE link playing a scripted appliance.
pub struct MockLink {
    origin: Instant,
    inbox: &'static Inbox,
    state: Arc<Mutex<LinkState>>,
}

#[allow(dead_code)]
impl MockLink {
    fn new(origin: Instant, inbox: &'static Inbox) -> Self {
        let mut fallback = HashMap::new();
        fallback.insert(OP_AUTH, Reply::answer(10, &[1]));
        Self {
            origin,
            inbox,
            state: Arc::new(Mutex::new(LinkState {
                connected: false,
                connect_error: None,
                events: Vec::new(),
                scripted: HashMap::new(),
                fallback,
            })),
        }
    }

    /// Queue one-shot replies for `opcode`.
    pub fn script(&self, opcode: u8, replies: impl IntoIterator<Item = Reply>) {
        let mut state = self.state.lock().unwrap();
        state.scripted.entry(opcode).or_default().extend(replies);
    }

    /// Reply used for `opcode` whenever no scripted one is left.
    pub fn always(&self, opcode: u8, reply: Reply) {
        self.state.lock().unwrap().fallback.insert(opcode, reply);
    }

    pub fn fail_connect(&self, error: Option<MockError>) {
        self.state.lock().unwrap().connect_error = error;
    }

    /// Simulate the appliance walking out of range.
    pub fn drop_connection(&self) {
        self.state.lock().unwrap().connected = false;
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn ops(&self) -> Vec<LinkOp> {
        self.events().into_iter().map(|event| event.op).collect()
    }

    pub fn clear_events(&self) {
        self.state.lock().unwrap().events.clear();
    }

    /// Writes carrying `opcode`, with their timestamps.
    pub fn writes_of(&self, opcode: u8) -> Vec<(u64, u8, Vec<u8>)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event.op {
                LinkOp::Write {
                    seq,
                    opcode: op,
                    payload,
                } if op == opcode => Some((event.at_ms, seq, payload)),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, op: &LinkOp) -> usize {
        self.ops().iter().filter(|o| *o == op).count()
    }

    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    fn notify_later(&self, after_ms: u64, bytes: Vec<u8>) {
        let inbox = self.inbox;
        tokio::spawn(async move {
            sleep(Duration::from_millis(after_ms)).await;
            inbox.push(&bytes);
        });
    }
}

impl BleLink for MockLink {
    type Error = MockError;

    async fn connect(&mut self) -> Result<(), Self::Error> {
        let at_ms = self.now_ms();
        let mut state = self.state.lock().unwrap();
        state.events.push(Event {
            at_ms,
            op: LinkOp::Connect,
        });
        if let Some(err) = state.connect_error {
            return Err(err);
        }
        state.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) {
        let at_ms = self.now_ms();
        let mut state = self.state.lock().unwrap();
        state.events.push(Event {
            at_ms,
            op: LinkOp::Disconnect,
        });
        state.connected = false;
    }

    async fn write<'a>(&'a mut self, frame: &'a [u8]) -> Result<(), Self::Error> {
        let decoded = decode(frame).expect("engine writes well-formed frames");
        let at_ms = self.now_ms();
        let reply = {
            let mut state = self.state.lock().unwrap();
            state.events.push(Event {
                at_ms,
                op: LinkOp::Write {
                    seq: decoded.seq,
                    opcode: decoded.opcode,
                    payload: decoded.payload.as_slice().to_vec(),
                },
            });
            let scripted = state
                .scripted
                .get_mut(&decoded.opcode)
                .and_then(|queue| queue.pop_front());
            let reply = scripted
                .or_else(|| state.fallback.get(&decoded.opcode).cloned())
                .unwrap_or(Reply::Silent);
            if reply == Reply::Fail(MockError::Dropped) {
                state.connected = false;
            }
            reply
        };

        match reply {
            Reply::Answer { after_ms, payload } => {
                let bytes = encode(decoded.seq, decoded.opcode, &payload).unwrap();
                self.notify_later(after_ms, bytes.as_slice().to_vec());
                Ok(())
            }
            Reply::Raw { after_ms, bytes } => {
                self.notify_later(after_ms, bytes);
                Ok(())
            }
            Reply::Silent => Ok(()),
            Reply::Fail(err) => Err(err),
        }
    }

    fn is_connected(&self) -> bool {
        self.state.lock().unwrap().connected
    }

    fn classify(error: &Self::Error) -> LinkFault {
        match error {
            MockError::Busy => LinkFault::Busy,
            MockError::Rejected => LinkFault::Rejected,
            MockError::Dropped => LinkFault::Disconnected,
            MockError::Unreachable | MockError::Fatal => LinkFault::Fatal,
        }
    }
}

//==================================================================================MockTimer

#[derive(Clone)]
/// Timer on tokio's (paused) clock recording every requested delay.
pub struct MockTimer {
    origin: Instant,
    delays: Arc<Mutex<Vec<u32>>>,
}

#[allow(dead_code)]
impl MockTimer {
    pub fn delays(&self) -> Vec<u32> {
        self.delays.lock().unwrap().clone()
    }

    pub fn clear_delays(&self) {
        self.delays.lock().unwrap().clear();
    }
}

impl CookerTimer for MockTimer {
    async fn delay_ms(&mut self, millis: u32) {
        self.delays.lock().unwrap().push(millis);
        sleep(Duration::from_millis(millis as u64)).await;
    }

    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

//==================================================================================Harness

/// Link, timer and inbox sharing one clock origin.
pub struct Harness {
    pub link: MockLink,
    pub timer: MockTimer,
    pub inbox: &'static Inbox,
}

#[allow(dead_code)]
impl Harness {
    pub fn new() -> Self {
        Self::with_inbox(Box::leak(Box::new(ResponseInbox::new())))
    }

    pub fn with_inbox(inbox: &'static Inbox) -> Self {
        let origin = Instant::now();
        Self {
            link: MockLink::new(origin, inbox),
            timer: MockTimer {
                origin,
                delays: Arc::new(Mutex::new(Vec::new())),
            },
            inbox,
        }
    }

    /// Dispatcher over clones of the harness doubles; the harness keeps
    /// handles for inspection.
    pub fn dispatcher(&self, config: EngineConfig) -> TestDispatcher {
        Dispatcher::new(self.link.clone(), self.timer.clone(), self.inbox, config)
    }
}
