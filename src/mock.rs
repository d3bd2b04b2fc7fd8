//! In-memory server used by the unit tests.
//!
//! [`MockServer`] implements [`Connector`]; every stream it hands out speaks the binary
//! protocol against one shared state, so several connections observe the same spaces,
//! users and request counters. The `_vspace` and `_vindex` system views are synthesized
//! from the spaces created with [`MockServer::create_space`] and
//! [`MockServer::create_index`].
use std::{
    collections::{HashMap, VecDeque},
    io::{self, Read, Write},
    sync::{Arc, Mutex, MutexGuard},
};

use crate::{
    connection::{Connection, ConnectionRegistry, Connector, Stream},
    ext::ExtensionRegistry,
    handler::DefaultHandler,
    protocol::{Greeting, RequestType, keys, scramble},
    schema::{VINDEX_ID, VSPACE_ID},
};

const FIRST_SPACE_ID: u32 = 512;
const SCHEMA_VERSION: u64 = 80;

const ER_TUPLE_FOUND: u32 = 3;
const ER_UNKNOWN_UPDATE_OP: u32 = 28;
const ER_NO_SUCH_INDEX: u32 = 35;
const ER_NO_SUCH_SPACE: u32 = 36;
const ER_NO_SUCH_USER: u32 = 45;
const ER_CREDS_MISMATCH: u32 = 47;
const ER_UNKNOWN_REQUEST_TYPE: u32 = 48;

type Body = Vec<(u64, rmpv::Value)>;
type Failure = (u32, String);

struct MockIndex {
    name: String,
    parts: Vec<usize>,
}

struct MockSpace {
    id: u32,
    name: String,
    indexes: Vec<MockIndex>,
    rows: Vec<Vec<rmpv::Value>>,
}

impl MockSpace {
    fn index(&self, id: u64) -> Result<&MockIndex, Failure> {
        usize::try_from(id)
            .ok()
            .and_then(|id| self.indexes.get(id))
            .ok_or_else(|| {
                (
                    ER_NO_SUCH_INDEX,
                    format!("No index #{id} is defined in space '{}'", self.name),
                )
            })
    }

    fn position(&self, index: u64, key: &[rmpv::Value]) -> Result<Option<usize>, Failure> {
        let parts = &self.index(index)?.parts;
        Ok(self
            .rows
            .iter()
            .position(|row| key.len() == parts.len() && matches(row, parts, key)))
    }

    fn primary_key(&self, tuple: &[rmpv::Value]) -> Vec<rmpv::Value> {
        self.indexes[0]
            .parts
            .iter()
            .map(|p| tuple.get(*p).cloned().unwrap_or(rmpv::Value::Nil))
            .collect()
    }
}

#[derive(Default)]
struct State {
    spaces: Vec<MockSpace>,
    users: HashMap<String, String>,
    calls: HashMap<RequestType, usize>,
    connections: usize,
    stalled: bool,
    unified_auth_errors: bool,
}

impl State {
    fn space(&self, id: u64) -> Result<&MockSpace, Failure> {
        self.spaces
            .iter()
            .find(|s| u64::from(s.id) == id)
            .ok_or_else(|| (ER_NO_SUCH_SPACE, format!("Space '{id}' does not exist")))
    }

    fn space_mut(&mut self, id: u64) -> Result<&mut MockSpace, Failure> {
        self.spaces
            .iter_mut()
            .find(|s| u64::from(s.id) == id)
            .ok_or_else(|| (ER_NO_SUCH_SPACE, format!("Space '{id}' does not exist")))
    }
}

/// A fake server shared by every connection it opens.
#[derive(Clone)]
pub(crate) struct MockServer {
    state: Arc<Mutex<State>>,
}

impl MockServer {
    /// A server knowing the `guest` user and `user_foo` with password `foo`.
    pub(crate) fn new() -> Self {
        let server = Self {
            state: Arc::new(Mutex::new(State::default())),
        };
        server.add_user("guest", "");
        server.add_user("user_foo", "foo");
        server
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Creates a space whose primary index covers the fields `parts`.
    pub(crate) fn create_space(&self, name: &str, parts: &[usize]) -> u32 {
        let mut state = self.lock();
        let id = FIRST_SPACE_ID + state.spaces.len() as u32;
        state.spaces.push(MockSpace {
            id,
            name: name.to_string(),
            indexes: vec![MockIndex {
                name: "primary".into(),
                parts: parts.to_vec(),
            }],
            rows: vec![],
        });
        id
    }

    /// Creates a secondary index and returns its id.
    pub(crate) fn create_index(&self, space: &str, name: &str, parts: &[usize]) -> u32 {
        let mut state = self.lock();
        let space = state
            .spaces
            .iter_mut()
            .find(|s| s.name == space)
            .unwrap();
        space.indexes.push(MockIndex {
            name: name.to_string(),
            parts: parts.to_vec(),
        });
        space.indexes.len() as u32 - 1
    }

    pub(crate) fn add_user(&self, name: &str, password: &str) {
        self.lock()
            .users
            .insert(name.to_string(), password.to_string());
    }

    pub(crate) fn connection(&self) -> Connection {
        Connection::new(Arc::new(self.clone()))
    }

    pub(crate) fn persistent_connection(&self, key: &str, registry: &ConnectionRegistry) -> Connection {
        Connection::persistent(Arc::new(self.clone()), key, registry)
    }

    /// A terminal handler over a fresh, unauthenticated connection.
    pub(crate) fn handler(&self) -> DefaultHandler {
        DefaultHandler::new(self.connection(), ExtensionRegistry::default())
    }

    /// Number of requests of type `kind` received so far.
    pub(crate) fn calls(&self, kind: RequestType) -> usize {
        self.lock().calls.get(&kind).copied().unwrap_or(0)
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.lock().calls.values().sum()
    }

    /// Number of streams opened so far.
    pub(crate) fn connections(&self) -> usize {
        self.lock().connections
    }

    /// While stalled, requests are swallowed and reads report `WouldBlock`.
    pub(crate) fn set_stalled(&self, stalled: bool) {
        self.lock().stalled = stalled;
    }

    /// Reports every authentication failure with the same message, as newer servers do.
    pub(crate) fn set_unified_auth_errors(&self, unified: bool) {
        self.lock().unified_auth_errors = unified;
    }

    fn process(&self, frame: &[u8], salt: &[u8]) -> Option<Vec<u8>> {
        let mut rd = frame;
        let header = rmpv::decode::read_value(&mut rd).unwrap();
        let body = if rd.is_empty() {
            rmpv::Value::Map(vec![])
        } else {
            rmpv::decode::read_value(&mut rd).unwrap()
        };

        let code = field(&header, keys::CODE).and_then(rmpv::Value::as_u64).unwrap();
        let sync = field(&header, keys::SYNC).and_then(rmpv::Value::as_u64).unwrap();

        let mut state = self.lock();
        let kind = RequestType::from_code(code as u8);
        if let Some(kind) = kind {
            *state.calls.entry(kind).or_default() += 1;
        }
        if state.stalled {
            return None;
        }

        let result = match kind {
            Some(RequestType::Ping) => Ok(vec![]),
            Some(RequestType::Authenticate) => authenticate(&state, &body, salt),
            Some(RequestType::Select) => select(&state, &body),
            Some(RequestType::Insert) => store(&mut state, &body, false),
            Some(RequestType::Replace) => store(&mut state, &body, true),
            Some(RequestType::Update) => update(&mut state, &body),
            Some(RequestType::Delete) => delete(&mut state, &body),
            Some(RequestType::Upsert) => upsert(&mut state, &body),
            None => Err((
                ER_UNKNOWN_REQUEST_TYPE,
                format!("Unknown request type {code}"),
            )),
        };

        Some(match result {
            Ok(body) => encode(0, sync, body),
            Err((code, message)) => encode(
                0x8000 | code,
                sync,
                vec![(keys::ERROR_24, rmpv::Value::from(message))],
            ),
        })
    }
}

impl Connector for MockServer {
    fn connect(&self) -> io::Result<Box<dyn Stream>> {
        let count = {
            let mut state = self.lock();
            state.connections += 1;
            state.connections
        };
        let salt: [u8; 32] = std::array::from_fn(|i| (count as u8).wrapping_mul(37).wrapping_add(i as u8));

        Ok(Box::new(MockStream {
            server: self.clone(),
            salt,
            inbox: vec![],
            outbox: Greeting::render("Tarantool 2.11.1 (Binary) mock", &salt).into(),
        }))
    }

    fn target(&self) -> String {
        "mock".into()
    }
}

struct MockStream {
    server: MockServer,
    salt: [u8; 32],
    inbox: Vec<u8>,
    outbox: VecDeque<u8>,
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.outbox.is_empty() {
            if self.server.lock().stalled {
                return Err(io::Error::new(io::ErrorKind::WouldBlock, "stalled"));
            }
            return Ok(0);
        }
        self.outbox.read(buf)
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inbox.extend_from_slice(buf);

        while self.inbox.len() >= 5 {
            assert_eq!(self.inbox[0], 0xce, "unexpected length marker");
            let len = u32::from_be_bytes([self.inbox[1], self.inbox[2], self.inbox[3], self.inbox[4]]) as usize;
            if self.inbox.len() < 5 + len {
                break;
            }

            let frame = self.inbox.drain(..5 + len).skip(5).collect::<Vec<u8>>();
            if let Some(response) = self.server.process(&frame, &self.salt) {
                self.outbox.extend(response);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn encode(code: u32, sync: u64, body: Body) -> Vec<u8> {
    let header = rmpv::Value::Map(vec![
        (rmpv::Value::from(keys::CODE), rmpv::Value::from(code)),
        (rmpv::Value::from(keys::SYNC), rmpv::Value::from(sync)),
        (rmpv::Value::from(keys::SCHEMA_ID), rmpv::Value::from(SCHEMA_VERSION)),
    ]);
    let body = rmpv::Value::Map(
        body.into_iter()
            .map(|(k, v)| (rmpv::Value::from(k), v))
            .collect(),
    );

    let mut payload = vec![];
    rmpv::encode::write_value(&mut payload, &header).unwrap();
    rmpv::encode::write_value(&mut payload, &body).unwrap();

    let mut frame = vec![0xce];
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend(payload);
    frame
}

fn field(map: &rmpv::Value, key: u64) -> Option<&rmpv::Value> {
    map.as_map()?
        .iter()
        .find(|(k, _)| k.as_u64() == Some(key))
        .map(|(_, v)| v)
}

fn array(map: &rmpv::Value, key: u64) -> Vec<rmpv::Value> {
    field(map, key)
        .and_then(rmpv::Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn number(map: &rmpv::Value, key: u64) -> u64 {
    field(map, key).and_then(rmpv::Value::as_u64).unwrap_or(0)
}

fn matches(row: &[rmpv::Value], parts: &[usize], key: &[rmpv::Value]) -> bool {
    key.iter()
        .zip(parts)
        .all(|(k, p)| row.get(*p) == Some(k))
}

fn data(rows: Vec<Vec<rmpv::Value>>) -> Body {
    vec![(
        keys::DATA,
        rmpv::Value::Array(rows.into_iter().map(rmpv::Value::Array).collect()),
    )]
}

fn authenticate(state: &State, body: &rmpv::Value, salt: &[u8]) -> Result<Body, Failure> {
    let user = field(body, keys::USER_NAME)
        .and_then(rmpv::Value::as_str)
        .unwrap_or_default();
    let tuple = array(body, keys::TUPLE);
    let provided = match tuple.get(1) {
        Some(rmpv::Value::Binary(b)) => b.clone(),
        _ => vec![],
    };

    let failure = match state.users.get(user) {
        Some(password) if scramble(salt, password).as_slice() == provided.as_slice() => {
            return Ok(vec![]);
        }
        Some(_) => (
            ER_CREDS_MISMATCH,
            format!("Incorrect password supplied for user '{user}'"),
        ),
        None => (ER_NO_SUCH_USER, format!("User '{user}' is not found")),
    };

    if state.unified_auth_errors {
        Err((
            ER_CREDS_MISMATCH,
            "User not found or supplied credentials are invalid".into(),
        ))
    } else {
        Err(failure)
    }
}

fn vspace_row(space: &MockSpace) -> Vec<rmpv::Value> {
    vec![
        rmpv::Value::from(space.id),
        rmpv::Value::from(1u32),
        rmpv::Value::from(space.name.as_str()),
        rmpv::Value::from("memtx"),
        rmpv::Value::from(0u32),
        rmpv::Value::Map(vec![]),
        rmpv::Value::Array(vec![]),
    ]
}

fn vindex_row(space: &MockSpace, id: usize, index: &MockIndex) -> Vec<rmpv::Value> {
    let parts = index
        .parts
        .iter()
        .map(|p| {
            rmpv::Value::Array(vec![
                rmpv::Value::from(*p as u64),
                rmpv::Value::from("unsigned"),
            ])
        })
        .collect();
    vec![
        rmpv::Value::from(space.id),
        rmpv::Value::from(id as u64),
        rmpv::Value::from(index.name.as_str()),
        rmpv::Value::from("tree"),
        rmpv::Value::Map(vec![(rmpv::Value::from("unique"), rmpv::Value::from(true))]),
        rmpv::Value::Array(parts),
    ]
}

fn select(state: &State, body: &rmpv::Value) -> Result<Body, Failure> {
    let space_id = number(body, keys::SPACE_ID);
    let index_id = number(body, keys::INDEX_ID);
    let key = array(body, keys::KEY);
    let offset = number(body, keys::OFFSET) as usize;
    let limit = field(body, keys::LIMIT)
        .and_then(rmpv::Value::as_u64)
        .unwrap_or(u64::from(u32::MAX)) as usize;

    let rows: Vec<Vec<rmpv::Value>> = if space_id == u64::from(VSPACE_ID) {
        state
            .spaces
            .iter()
            .map(vspace_row)
            .filter(|row| match index_id {
                0 => matches(row, &[0], &key),
                _ => matches(row, &[2], &key),
            })
            .collect()
    } else if space_id == u64::from(VINDEX_ID) {
        state
            .spaces
            .iter()
            .flat_map(|s| {
                s.indexes
                    .iter()
                    .enumerate()
                    .map(move |(id, index)| vindex_row(s, id, index))
            })
            .filter(|row| match index_id {
                0 => matches(row, &[0, 1], &key),
                _ => matches(row, &[0, 2], &key),
            })
            .collect()
    } else {
        let space = state.space(space_id)?;
        let parts = &space.index(index_id)?.parts;
        space
            .rows
            .iter()
            .filter(|row| matches(row, parts, &key))
            .cloned()
            .collect()
    };

    Ok(data(rows.into_iter().skip(offset).take(limit).collect()))
}

fn store(state: &mut State, body: &rmpv::Value, replace: bool) -> Result<Body, Failure> {
    let space = state.space_mut(number(body, keys::SPACE_ID))?;
    let tuple = array(body, keys::TUPLE);
    let key = space.primary_key(&tuple);

    match space.position(0, &key)? {
        Some(pos) if replace => space.rows[pos] = tuple.clone(),
        Some(_) => {
            return Err((
                ER_TUPLE_FOUND,
                format!(
                    "Duplicate key exists in unique index \"primary\" in space \"{}\"",
                    space.name
                ),
            ));
        }
        None => space.rows.push(tuple.clone()),
    }
    Ok(data(vec![tuple]))
}

fn apply(row: &mut Vec<rmpv::Value>, operations: &[rmpv::Value]) -> Result<(), Failure> {
    for op in operations {
        let op = op.as_array().map(Vec::as_slice).unwrap_or_default();
        let (symbol, position, arg) = match op {
            [symbol, position, arg, ..] => (
                symbol.as_str().unwrap_or_default(),
                position.as_u64().unwrap_or(u64::MAX) as usize,
                arg.clone(),
            ),
            _ => return Err((ER_UNKNOWN_UPDATE_OP, "Unknown UPDATE operation".into())),
        };

        let current = row.get(position).and_then(rmpv::Value::as_i64);
        let updated = match (symbol, current, arg.as_i64()) {
            ("=", _, _) => arg,
            ("+", Some(a), Some(b)) => rmpv::Value::from(a + b),
            ("-", Some(a), Some(b)) => rmpv::Value::from(a - b),
            _ => return Err((ER_UNKNOWN_UPDATE_OP, "Unknown UPDATE operation".into())),
        };

        if position < row.len() {
            row[position] = updated;
        } else if position == row.len() {
            row.push(updated);
        } else {
            return Err((
                ER_UNKNOWN_UPDATE_OP,
                format!("Field {position} was not found in the tuple"),
            ));
        }
    }
    Ok(())
}

fn update(state: &mut State, body: &rmpv::Value) -> Result<Body, Failure> {
    let space = state.space_mut(number(body, keys::SPACE_ID))?;
    let key = array(body, keys::KEY);

    match space.position(number(body, keys::INDEX_ID), &key)? {
        Some(pos) => {
            let mut row = space.rows[pos].clone();
            apply(&mut row, &array(body, keys::TUPLE))?;
            space.rows[pos] = row.clone();
            Ok(data(vec![row]))
        }
        None => Ok(data(vec![])),
    }
}

fn delete(state: &mut State, body: &rmpv::Value) -> Result<Body, Failure> {
    let space = state.space_mut(number(body, keys::SPACE_ID))?;
    let key = array(body, keys::KEY);

    match space.position(number(body, keys::INDEX_ID), &key)? {
        Some(pos) => Ok(data(vec![space.rows.remove(pos)])),
        None => Ok(data(vec![])),
    }
}

fn upsert(state: &mut State, body: &rmpv::Value) -> Result<Body, Failure> {
    let space = state.space_mut(number(body, keys::SPACE_ID))?;
    let tuple = array(body, keys::TUPLE);
    let key = space.primary_key(&tuple);

    match space.position(0, &key)? {
        Some(pos) => {
            let mut row = space.rows[pos].clone();
            apply(&mut row, &array(body, keys::OPS))?;
            space.rows[pos] = row;
        }
        None => space.rows.push(tuple),
    }
    Ok(vec![])
}
