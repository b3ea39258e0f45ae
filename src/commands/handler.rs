//! Command Handler Module
//!
//! Turns a parsed request array into a call on the selected keyspace and
//! the result back into a reply.
//!
//! ## Supported Commands
//!
//! ### String Commands
//! - `SET key value [EX seconds | PX milliseconds]` - Set a key
//! - `SETEX key seconds value` / `PSETEX key milliseconds value` - Set with expiry
//! - `GET key` - Get a key's value
//! - `GETSET key value` - Set and return old value
//! - `GETDEL key` - Delete and return value
//! - `MSET key value [key value ...]` - Set multiple keys
//! - `MSETNX key value [key value ...]` - Set multiple keys if none exist
//! - `MGET key [key ...]` - Get multiple keys
//! - `INCR`, `DECR`, `INCRBY`, `DECRBY` - Integer arithmetic
//!
//! ### Key Commands
//! - `DEL key [key ...]`, `EXISTS key [key ...]`
//! - `EXPIRE key seconds`, `PEXPIRE key milliseconds`
//! - `TTL key`, `PTTL key`, `PERSIST key`
//! - `KEYS pattern`
//!
//! ### Server Commands
//! - `PING [message]`, `ECHO message`, `QUIT`
//! - `DBSIZE`, `FLUSHDB`, `FLUSHALL`, `SELECT index`
//! - `SAVE [file]`, `LOAD [file]`
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommandHandler                          │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐      │
//! │  │  execute()  │───>│  dispatch() │───>│   cmd_*()   │      │
//! │  └─────────────┘    └─────────────┘    └─────────────┘      │
//! │                            │                  │             │
//! │                            ▼                  ▼             │
//! │                       Databases ──────> Keyspace            │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use crate::protocol::RespValue;
use crate::storage::{Databases, Keyspace, KeyspaceError, Ttl, DATABASE_COUNT};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::task;
use tracing::{error, info, trace};

const NOT_AN_INTEGER: &str = "ERR value is not an integer or out of range";
const SYNTAX_ERROR: &str = "ERR syntax error";

/// Handles commands by dispatching them against the selected database.
///
/// Cheap to clone; every connection gets its own copy.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    databases: Arc<Databases>,
}

/// Returns true if `command` is a `QUIT` request.
///
/// The connection layer closes the socket after replying to it.
pub fn is_quit(command: &RespValue) -> bool {
    match command {
        RespValue::Array(args) => args
            .first()
            .and_then(RespValue::as_bytes)
            .is_some_and(|name| name.eq_ignore_ascii_case(b"QUIT")),
        _ => false,
    }
}

impl CommandHandler {
    pub fn new(databases: Arc<Databases>) -> Self {
        Self { databases }
    }

    pub fn databases(&self) -> &Arc<Databases> {
        &self.databases
    }

    /// Executes a command and returns the reply.
    ///
    /// Every outcome, including malformed requests, is a reply value; the
    /// connection stays usable.
    pub fn execute(&self, command: RespValue) -> RespValue {
        let items = match command {
            RespValue::Array(items) => items,
            _ => return RespValue::error("ERR invalid command format"),
        };

        if items.is_empty() {
            return RespValue::error("ERR empty command");
        }

        let mut args = Vec::with_capacity(items.len());
        for item in items {
            match item {
                RespValue::BulkString(data) => args.push(data),
                RespValue::SimpleString(s) => args.push(Bytes::from(s)),
                RespValue::Integer(n) => args.push(Bytes::from(n.to_string())),
                _ => return RespValue::error("ERR invalid argument"),
            }
        }

        let name = String::from_utf8_lossy(&args[0]).into_owned();
        self.dispatch(&name, &args[1..])
    }

    fn dispatch(&self, name: &str, args: &[Bytes]) -> RespValue {
        let cmd = name.to_ascii_uppercase();
        let (index, db) = self.databases.selected_with_index();

        trace!(command = %cmd, db = index, args = args.len(), "Executing command");

        match cmd.as_str() {
            // String commands
            "SET" => self.cmd_set(&db, args),
            "SETEX" => self.cmd_setex(&db, args, "SETEX", Duration::from_secs),
            "PSETEX" => self.cmd_setex(&db, args, "PSETEX", Duration::from_millis),
            "GET" => self.cmd_get(&db, args),
            "GETSET" => self.cmd_getset(&db, args),
            "GETDEL" => self.cmd_getdel(&db, args),
            "MSET" => self.cmd_mset(&db, args),
            "MSETNX" => self.cmd_msetnx(&db, args),
            "MGET" => self.cmd_mget(&db, args),
            "INCR" => self.cmd_incr(&db, args, "INCR", 1),
            "DECR" => self.cmd_incr(&db, args, "DECR", -1),
            "INCRBY" => self.cmd_incrby(&db, args),
            "DECRBY" => self.cmd_decrby(&db, args),

            // Key commands
            "DEL" => self.cmd_del(&db, args),
            "EXISTS" => self.cmd_exists(&db, args),
            "EXPIRE" => self.cmd_expire(&db, args, "EXPIRE", Duration::from_secs),
            "PEXPIRE" => self.cmd_expire(&db, args, "PEXPIRE", Duration::from_millis),
            "TTL" => self.cmd_ttl(&db, args),
            "PTTL" => self.cmd_pttl(&db, args),
            "PERSIST" => self.cmd_persist(&db, args),
            "KEYS" => self.cmd_keys(&db, args),

            // Server commands
            "PING" => self.cmd_ping(args),
            "ECHO" => self.cmd_echo(args),
            "DBSIZE" => self.cmd_dbsize(&db, args),
            "FLUSHDB" => self.cmd_flushdb(&db, args),
            "FLUSHALL" => self.cmd_flushall(args),
            "SELECT" => self.cmd_select(args),
            "SAVE" => self.cmd_save(&db, args),
            "LOAD" => self.cmd_load(&db, args),
            "QUIT" => RespValue::ok(),

            _ => RespValue::error(format!("ERR unknown command '{}'", name)),
        }
    }

    // ========================================================================
    // Helper functions
    // ========================================================================

    fn parse_integer(value: &[u8]) -> Option<i64> {
        std::str::from_utf8(value).ok()?.parse().ok()
    }

    /// Splits `key value [key value ...]` into pairs. `None` on a dangling key.
    fn pairs(args: &[Bytes]) -> Option<Vec<(Bytes, Bytes)>> {
        if args.is_empty() || args.len() % 2 != 0 {
            return None;
        }
        Some(
            args.chunks_exact(2)
                .map(|pair| (pair[0].clone(), pair[1].clone()))
                .collect(),
        )
    }

    fn keyspace_error(err: KeyspaceError) -> RespValue {
        RespValue::error(format!("ERR {}", err))
    }

    // ========================================================================
    // String Commands
    // ========================================================================

    /// SET key value [EX seconds | PX milliseconds]
    fn cmd_set(&self, db: &Keyspace, args: &[Bytes]) -> RespValue {
        if args.len() < 2 {
            return RespValue::wrong_arity("SET");
        }

        let key = args[0].clone();
        let value = args[1].clone();

        let ttl = match &args[2..] {
            [] => None,
            [option, amount] => {
                let unit: fn(u64) -> Duration = if option.eq_ignore_ascii_case(b"EX") {
                    Duration::from_secs
                } else if option.eq_ignore_ascii_case(b"PX") {
                    Duration::from_millis
                } else {
                    return RespValue::error(SYNTAX_ERROR);
                };

                match Self::parse_integer(amount) {
                    Some(n) if n > 0 => Some(unit(n as u64)),
                    Some(_) => return RespValue::error("ERR invalid expire time in 'set' command"),
                    None => return RespValue::error(NOT_AN_INTEGER),
                }
            }
            _ => return RespValue::error(SYNTAX_ERROR),
        };

        match ttl {
            Some(ttl) => db.set_with_ttl(key, value, ttl),
            None => db.set(key, value),
        }
        RespValue::ok()
    }

    /// SETEX key seconds value / PSETEX key milliseconds value
    fn cmd_setex(
        &self,
        db: &Keyspace,
        args: &[Bytes],
        name: &str,
        unit: fn(u64) -> Duration,
    ) -> RespValue {
        if args.len() != 3 {
            return RespValue::wrong_arity(name);
        }

        let ttl = match Self::parse_integer(&args[1]) {
            Some(n) if n > 0 => unit(n as u64),
            Some(_) => {
                return RespValue::error(format!(
                    "ERR invalid expire time in '{}' command",
                    name.to_lowercase()
                ))
            }
            None => return RespValue::error(NOT_AN_INTEGER),
        };

        db.set_with_ttl(args[0].clone(), args[2].clone(), ttl);
        RespValue::ok()
    }

    /// GET key
    fn cmd_get(&self, db: &Keyspace, args: &[Bytes]) -> RespValue {
        if args.len() != 1 {
            return RespValue::wrong_arity("GET");
        }
        RespValue::from_optional(db.get(&args[0]))
    }

    /// GETSET key value
    fn cmd_getset(&self, db: &Keyspace, args: &[Bytes]) -> RespValue {
        if args.len() != 2 {
            return RespValue::wrong_arity("GETSET");
        }
        RespValue::from_optional(db.getset(args[0].clone(), args[1].clone()))
    }

    /// GETDEL key
    fn cmd_getdel(&self, db: &Keyspace, args: &[Bytes]) -> RespValue {
        if args.len() != 1 {
            return RespValue::wrong_arity("GETDEL");
        }
        RespValue::from_optional(db.getdel(&args[0]))
    }

    /// MSET key value [key value ...]
    fn cmd_mset(&self, db: &Keyspace, args: &[Bytes]) -> RespValue {
        match Self::pairs(args) {
            Some(pairs) => {
                db.mset(pairs);
                RespValue::ok()
            }
            None => RespValue::wrong_arity("MSET"),
        }
    }

    /// MSETNX key value [key value ...]
    fn cmd_msetnx(&self, db: &Keyspace, args: &[Bytes]) -> RespValue {
        match Self::pairs(args) {
            Some(pairs) => RespValue::integer(db.msetnx(pairs) as i64),
            None => RespValue::wrong_arity("MSETNX"),
        }
    }

    /// MGET key [key ...]
    fn cmd_mget(&self, db: &Keyspace, args: &[Bytes]) -> RespValue {
        if args.is_empty() {
            return RespValue::wrong_arity("MGET");
        }

        let values = db
            .mget(args)
            .into_iter()
            .map(RespValue::from_optional)
            .collect();
        RespValue::array(values)
    }

    /// INCR key / DECR key
    fn cmd_incr(&self, db: &Keyspace, args: &[Bytes], name: &str, delta: i64) -> RespValue {
        if args.len() != 1 {
            return RespValue::wrong_arity(name);
        }

        match db.incr_by(&args[0], delta) {
            Ok(n) => RespValue::integer(n),
            Err(e) => Self::keyspace_error(e),
        }
    }

    /// INCRBY key increment
    fn cmd_incrby(&self, db: &Keyspace, args: &[Bytes]) -> RespValue {
        if args.len() != 2 {
            return RespValue::wrong_arity("INCRBY");
        }

        let delta = match Self::parse_integer(&args[1]) {
            Some(n) => n,
            None => return RespValue::error(NOT_AN_INTEGER),
        };

        match db.incr_by(&args[0], delta) {
            Ok(n) => RespValue::integer(n),
            Err(e) => Self::keyspace_error(e),
        }
    }

    /// DECRBY key decrement
    fn cmd_decrby(&self, db: &Keyspace, args: &[Bytes]) -> RespValue {
        if args.len() != 2 {
            return RespValue::wrong_arity("DECRBY");
        }

        let delta = match Self::parse_integer(&args[1]) {
            Some(n) => n,
            None => return RespValue::error(NOT_AN_INTEGER),
        };

        match db.decr_by(&args[0], delta) {
            Ok(n) => RespValue::integer(n),
            Err(e) => Self::keyspace_error(e),
        }
    }

    // ========================================================================
    // Key Commands
    // ========================================================================

    /// DEL key [key ...]
    fn cmd_del(&self, db: &Keyspace, args: &[Bytes]) -> RespValue {
        if args.is_empty() {
            return RespValue::wrong_arity("DEL");
        }
        RespValue::integer(db.delete_many(args) as i64)
    }

    /// EXISTS key [key ...]
    fn cmd_exists(&self, db: &Keyspace, args: &[Bytes]) -> RespValue {
        if args.is_empty() {
            return RespValue::wrong_arity("EXISTS");
        }
        RespValue::integer(db.exists_many(args) as i64)
    }

    /// EXPIRE key seconds / PEXPIRE key milliseconds
    ///
    /// A zero or negative timeout deletes the key.
    fn cmd_expire(
        &self,
        db: &Keyspace,
        args: &[Bytes],
        name: &str,
        unit: fn(u64) -> Duration,
    ) -> RespValue {
        if args.len() != 2 {
            return RespValue::wrong_arity(name);
        }

        let ttl = match Self::parse_integer(&args[1]) {
            Some(n) if n > 0 => unit(n as u64),
            Some(_) => Duration::ZERO,
            None => return RespValue::error(NOT_AN_INTEGER),
        };

        RespValue::integer(db.expire(&args[0], ttl) as i64)
    }

    /// TTL key
    fn cmd_ttl(&self, db: &Keyspace, args: &[Bytes]) -> RespValue {
        if args.len() != 1 {
            return RespValue::wrong_arity("TTL");
        }

        match db.ttl(&args[0]) {
            Ttl::Missing => RespValue::integer(-2),
            Ttl::Persistent => RespValue::integer(-1),
            Ttl::Remaining(left) => RespValue::integer(((left.as_millis() + 500) / 1000) as i64),
        }
    }

    /// PTTL key
    fn cmd_pttl(&self, db: &Keyspace, args: &[Bytes]) -> RespValue {
        if args.len() != 1 {
            return RespValue::wrong_arity("PTTL");
        }

        match db.ttl(&args[0]) {
            Ttl::Missing => RespValue::integer(-2),
            Ttl::Persistent => RespValue::integer(-1),
            Ttl::Remaining(left) => RespValue::integer(left.as_millis() as i64),
        }
    }

    /// PERSIST key
    fn cmd_persist(&self, db: &Keyspace, args: &[Bytes]) -> RespValue {
        if args.len() != 1 {
            return RespValue::wrong_arity("PERSIST");
        }
        RespValue::integer(db.persist(&args[0]) as i64)
    }

    /// KEYS pattern
    fn cmd_keys(&self, db: &Keyspace, args: &[Bytes]) -> RespValue {
        if args.len() != 1 {
            return RespValue::wrong_arity("KEYS");
        }

        let keys = db
            .keys(&args[0])
            .into_iter()
            .map(RespValue::bulk_string)
            .collect();
        RespValue::array(keys)
    }

    // ========================================================================
    // Server Commands
    // ========================================================================

    /// PING [message]
    fn cmd_ping(&self, args: &[Bytes]) -> RespValue {
        match args {
            [] => RespValue::pong(),
            [message] => RespValue::bulk_string(message.clone()),
            _ => RespValue::wrong_arity("PING"),
        }
    }

    /// ECHO message
    fn cmd_echo(&self, args: &[Bytes]) -> RespValue {
        if args.len() != 1 {
            return RespValue::wrong_arity("ECHO");
        }
        RespValue::bulk_string(args[0].clone())
    }

    /// DBSIZE
    fn cmd_dbsize(&self, db: &Keyspace, args: &[Bytes]) -> RespValue {
        if !args.is_empty() {
            return RespValue::wrong_arity("DBSIZE");
        }
        RespValue::integer(db.live_len() as i64)
    }

    /// FLUSHDB
    fn cmd_flushdb(&self, db: &Keyspace, args: &[Bytes]) -> RespValue {
        if !args.is_empty() {
            return RespValue::wrong_arity("FLUSHDB");
        }
        db.flush();
        RespValue::ok()
    }

    /// FLUSHALL
    fn cmd_flushall(&self, args: &[Bytes]) -> RespValue {
        if !args.is_empty() {
            return RespValue::wrong_arity("FLUSHALL");
        }
        self.databases.flush_all();
        RespValue::ok()
    }

    /// SELECT index
    fn cmd_select(&self, args: &[Bytes]) -> RespValue {
        if args.len() != 1 {
            return RespValue::wrong_arity("SELECT");
        }

        let index = match Self::parse_integer(&args[0]) {
            Some(n) => n,
            None => return RespValue::error(NOT_AN_INTEGER),
        };

        if index < 0 || index >= DATABASE_COUNT as i64 {
            return RespValue::error("ERR DB index is out of range");
        }

        self.databases.select(index as usize);
        info!(db = index, "Switched database");
        RespValue::ok()
    }

    /// SAVE [file]
    fn cmd_save(&self, db: &Keyspace, args: &[Bytes]) -> RespValue {
        if args.len() > 1 {
            return RespValue::wrong_arity("SAVE");
        }

        let path = match self.databases.snapshot_path(db.id(), args.first().map(|f| f.as_ref())) {
            Ok(path) => path,
            Err(e) => return RespValue::error(format!("ERR {}", e)),
        };

        match run_blocking(|| db.save_snapshot(&path)) {
            Ok(keys) => {
                info!(db = db.id(), keys, path = %path.display(), "Snapshot saved");
                RespValue::ok()
            }
            Err(e) => {
                error!(db = db.id(), path = %path.display(), error = %e, "Snapshot save failed");
                RespValue::error(format!("ERR {}", e))
            }
        }
    }

    /// LOAD [file]
    fn cmd_load(&self, db: &Keyspace, args: &[Bytes]) -> RespValue {
        if args.len() > 1 {
            return RespValue::wrong_arity("LOAD");
        }

        let path = match self.databases.snapshot_path(db.id(), args.first().map(|f| f.as_ref())) {
            Ok(path) => path,
            Err(e) => return RespValue::error(format!("ERR {}", e)),
        };

        match run_blocking(|| db.load_snapshot(&path)) {
            Ok(keys) => {
                info!(db = db.id(), keys, path = %path.display(), "Snapshot loaded");
                RespValue::ok()
            }
            Err(e) => {
                error!(db = db.id(), path = %path.display(), error = %e, "Snapshot load failed");
                RespValue::error(format!("ERR {}", e))
            }
        }
    }
}

/// Runs file I/O so it does not stall other tasks on a multi-threaded
/// runtime. Outside one (tests, benches) it runs inline.
fn run_blocking<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            task::block_in_place(f)
        }
        _ => f(),
    }
}
