//! Command Handler
//!
//! Translates RESP commands into [`PasteEngine`] calls and engine results
//! into RESP replies. No paste policy lives here.
//!
//! ## Supported Commands
//!
//! - `PASTE.CREATE content [TTL seconds] [MAXVIEWS n] [NOW ms]`
//!   Replies with a bulk string: `{"id":..,"canonical_url_path":..,"url":..}`
//! - `PASTE.GET id [NOW ms]`
//!   Replies with a bulk string: `{"content":..,"remaining_views":..,"expires_at":..}`
//! - `PING [message]`, `INFO`, `COMMAND`, `QUIT`
//!
//! `NOW` overrides the current time and is ignored unless the engine runs in
//! test mode.
//!
//! ## Error Replies
//!
//! ```text
//! -ERR <reason>              bad request, nothing was written
//! -NOTFOUND paste not found  missing, expired or out of views (indistinguishable)
//! -TRYAGAIN <reason>         storage failure, safe to retry
//! ```

use crate::paste::{CreatePaste, ErrorClass, PasteEngine, PasteError, ValidationError};
use crate::protocol::RespValue;
use crate::storage::MemoryStore;
use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// The engine type served over the network.
pub type SharedEngine = Arc<PasteEngine<Arc<MemoryStore>>>;

const SUPPORTED_COMMANDS: [&str; 6] = [
    "PASTE.CREATE",
    "PASTE.GET",
    "PING",
    "INFO",
    "COMMAND",
    "QUIT",
];

/// Returns the upper-cased command name of a request.
pub fn command_name(args: &[Bytes]) -> Option<String> {
    let first = args.first()?;
    std::str::from_utf8(first).ok().map(str::to_ascii_uppercase)
}

/// Dispatches parsed commands to the paste engine.
#[derive(Clone)]
pub struct CommandHandler {
    engine: SharedEngine,
    start_time: Instant,
}

impl CommandHandler {
    pub fn new(engine: SharedEngine) -> Self {
        Self {
            engine,
            start_time: Instant::now(),
        }
    }

    /// Executes one command and returns the reply.
    pub fn execute(&self, args: &[Bytes]) -> RespValue {
        let Some(name) = command_name(args) else {
            return RespValue::error("ERR invalid command name");
        };

        let args = &args[1..];
        match name.as_str() {
            "PASTE.CREATE" => self.cmd_create(args),
            "PASTE.GET" => self.cmd_get(args),
            "PING" => cmd_ping(args),
            "INFO" => self.cmd_info(),
            "COMMAND" => RespValue::array(
                SUPPORTED_COMMANDS
                    .iter()
                    .map(|c| RespValue::bulk_string(*c))
                    .collect(),
            ),
            "QUIT" => RespValue::ok(),
            _ => RespValue::error(format!("ERR unknown command '{}'", name)),
        }
    }

    /// PASTE.CREATE content [TTL seconds] [MAXVIEWS n] [NOW ms]
    fn cmd_create(&self, args: &[Bytes]) -> RespValue {
        let Some((content, options)) = args.split_first() else {
            return wrong_arity("PASTE.CREATE");
        };

        let Ok(content) = std::str::from_utf8(content) else {
            return RespValue::error("ERR content must be valid UTF-8");
        };

        let mut request = CreatePaste::new(content);
        let mut now = None;

        for pair in options.chunks(2) {
            let [option, value] = pair else {
                return RespValue::error("ERR syntax error");
            };

            match upper(option).as_deref() {
                Some("TTL") => match parse_i64(value) {
                    Some(ttl) => request = request.with_ttl_seconds(ttl),
                    None => return paste_error(&ValidationError::InvalidTtl.into()),
                },
                Some("MAXVIEWS") => match parse_i64(value) {
                    Some(views) => request = request.with_max_views(views),
                    None => return paste_error(&ValidationError::InvalidMaxViews.into()),
                },
                Some("NOW") => match parse_i64(value) {
                    Some(ms) => now = Some(ms),
                    None => return invalid_now(),
                },
                _ => return RespValue::error("ERR syntax error"),
            }
        }

        match self.engine.create(request, now) {
            Ok(created) => json_reply(&created),
            Err(e) => paste_error(&e),
        }
    }

    /// PASTE.GET id [NOW ms]
    fn cmd_get(&self, args: &[Bytes]) -> RespValue {
        let (id, now) = match args {
            [id] => (id, None),
            [id, option, value] if upper(option).as_deref() == Some("NOW") => {
                match parse_i64(value) {
                    Some(ms) => (id, Some(ms)),
                    None => return invalid_now(),
                }
            }
            [_, _, _] => return RespValue::error("ERR syntax error"),
            _ => return wrong_arity("PASTE.GET"),
        };

        // A non-UTF-8 id cannot name a paste
        let id = std::str::from_utf8(id).unwrap_or_default();

        match self.engine.read(id, now) {
            Ok(view) => json_reply(&view),
            Err(e) => paste_error(&e),
        }
    }

    /// INFO
    fn cmd_info(&self) -> RespValue {
        let engine = self.engine.stats();
        let store = self.engine.store().stats();
        let config = self.engine.config();
        let used_memory = self
            .engine
            .store()
            .memory_info()
            .map(|m| m.used_memory)
            .unwrap_or(0);

        let info = format!(
            "# Server\r\n\
             flashpaste_version:{}\r\n\
             os:{}\r\n\
             uptime_in_seconds:{}\r\n\
             test_mode:{}\r\n\
             view_counting:{:?}\r\n\
             \r\n\
             # Pastes\r\n\
             created:{}\r\n\
             served:{}\r\n\
             expired:{}\r\n\
             view_limited:{}\r\n\
             not_found:{}\r\n\
             storage_errors:{}\r\n\
             \r\n\
             # Store\r\n\
             keys:{}\r\n\
             used_memory:{}\r\n\
             passively_expired:{}\r\n\
             cas_conflicts:{}\r\n",
            crate::VERSION,
            std::env::consts::OS,
            self.start_time.elapsed().as_secs(),
            u8::from(config.test_mode),
            config.view_counting,
            engine.created,
            engine.served,
            engine.expired,
            engine.view_limited,
            engine.not_found,
            engine.storage_errors,
            store.keys,
            used_memory,
            store.expired,
            store.cas_conflicts,
        );

        RespValue::bulk_string(Bytes::from(info))
    }
}

/// PING [message]
fn cmd_ping(args: &[Bytes]) -> RespValue {
    match args {
        [] => RespValue::pong(),
        [message] => RespValue::bulk_string(message.clone()),
        _ => wrong_arity("PING"),
    }
}

/// Maps an engine error onto the reply a client is allowed to see.
fn paste_error(err: &PasteError) -> RespValue {
    match err.class() {
        ErrorClass::Invalid => RespValue::error(format!("ERR {}", err)),
        ErrorClass::Unavailable => RespValue::error("NOTFOUND paste not found"),
        ErrorClass::Transient => RespValue::error(format!("TRYAGAIN {}", err)),
    }
}

fn json_reply<T: Serialize>(value: &T) -> RespValue {
    match serde_json::to_vec(value) {
        Ok(json) => RespValue::bulk_string(json),
        Err(e) => RespValue::error(format!("ERR failed to encode reply: {}", e)),
    }
}

fn wrong_arity(cmd: &str) -> RespValue {
    RespValue::error(format!("ERR wrong number of arguments for '{}' command", cmd))
}

fn invalid_now() -> RespValue {
    RespValue::error("ERR NOW must be an integer number of milliseconds")
}

fn upper(arg: &Bytes) -> Option<String> {
    std::str::from_utf8(arg).ok().map(str::to_ascii_uppercase)
}

fn parse_i64(arg: &Bytes) -> Option<i64> {
    std::str::from_utf8(arg).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::paste::EngineConfig;
    use serde_json::Value;

    const T0: i64 = 1_704_067_200_000;

    fn create_handler(config: EngineConfig) -> CommandHandler {
        let engine = PasteEngine::with_clock(
            Arc::new(MemoryStore::new()),
            config,
            Arc::new(ManualClock::new(T0)),
        );
        CommandHandler::new(Arc::new(engine))
    }

    fn make_command(args: &[&str]) -> Vec<Bytes> {
        args.iter()
            .map(|s| Bytes::copy_from_slice(s.as_bytes()))
            .collect()
    }

    fn json(reply: RespValue) -> Value {
        match reply {
            RespValue::BulkString(data) => serde_json::from_slice(&data).unwrap(),
            other => panic!("expected bulk string, got {:?}", other),
        }
    }

    fn create_id(handler: &CommandHandler, args: &[&str]) -> String {
        let created = json(handler.execute(&make_command(args)));
        created["id"].as_str().unwrap().to_string()
    }

    #[test]
    fn test_ping() {
        let handler = create_handler(EngineConfig::default());

        assert_eq!(handler.execute(&make_command(&["PING"])), RespValue::pong());
        assert_eq!(
            handler.execute(&make_command(&["ping", "hello"])),
            RespValue::bulk_string("hello")
        );
    }

    #[test]
    fn test_create_and_get() {
        let handler = create_handler(EngineConfig::default());

        let created = json(handler.execute(&make_command(&["PASTE.CREATE", "hello world"])));
        let id = created["id"].as_str().unwrap();
        assert_eq!(created["canonical_url_path"], format!("/p/{}", id));
        assert_eq!(created["url"], format!("http://localhost:3000/p/{}", id));

        let view = json(handler.execute(&make_command(&["PASTE.GET", id])));
        assert_eq!(view["content"], "hello world");
        assert_eq!(view["remaining_views"], Value::Null);
        assert_eq!(view["expires_at"], Value::Null);
    }

    #[test]
    fn test_create_options_are_case_insensitive() {
        let handler = create_handler(EngineConfig::default());
        let id = create_id(&handler, &["paste.create", "hi", "ttl", "60", "MaxViews", "2"]);

        let view = json(handler.execute(&make_command(&["PASTE.GET", &id])));
        assert_eq!(view["remaining_views"], 1);
        assert_eq!(view["expires_at"], "2024-01-01T00:01:00.000Z");
    }

    #[test]
    fn test_create_validation_errors() {
        let handler = create_handler(EngineConfig::default());

        let cases = [
            (vec!["PASTE.CREATE", "  "], "ERR content is required and must be a non-empty string"),
            (vec!["PASTE.CREATE", "x", "TTL", "0"], "ERR ttl_seconds must be an integer >= 1"),
            (vec!["PASTE.CREATE", "x", "TTL", "1.5"], "ERR ttl_seconds must be an integer >= 1"),
            (vec!["PASTE.CREATE", "x", "MAXVIEWS", "-3"], "ERR max_views must be an integer >= 1"),
            (vec!["PASTE.CREATE", "x", "MAXVIEWS", "two"], "ERR max_views must be an integer >= 1"),
            (vec!["PASTE.CREATE", "x", "TTL"], "ERR syntax error"),
            (vec!["PASTE.CREATE", "x", "COLOR", "red"], "ERR syntax error"),
            (
                vec!["PASTE.CREATE", "x", "NOW", "soon"],
                "ERR NOW must be an integer number of milliseconds",
            ),
        ];

        for (args, expected) in cases {
            assert_eq!(handler.execute(&make_command(&args)), RespValue::error(expected));
        }
        assert!(handler.engine.store().is_empty());
    }

    #[test]
    fn test_view_limit_reports_not_found() {
        let handler = create_handler(EngineConfig::default());
        let id = create_id(&handler, &["PASTE.CREATE", "once", "MAXVIEWS", "1"]);

        assert!(!handler.execute(&make_command(&["PASTE.GET", &id])).is_error());

        let not_found = RespValue::error("NOTFOUND paste not found");
        assert_eq!(handler.execute(&make_command(&["PASTE.GET", &id])), not_found);
        assert_eq!(handler.execute(&make_command(&["PASTE.GET", &id])), not_found);
        assert_eq!(handler.execute(&make_command(&["PASTE.GET", "nope"])), not_found);
    }

    #[test]
    fn test_now_override_in_test_mode() {
        let handler = create_handler(EngineConfig::default().with_test_mode(true));
        let now = T0.to_string();
        let before = (T0 + 30_000).to_string();
        let after = (T0 + 61_000).to_string();

        let id = create_id(&handler, &["PASTE.CREATE", "t", "TTL", "60", "NOW", &now]);

        assert!(!handler
            .execute(&make_command(&["PASTE.GET", &id, "NOW", &before]))
            .is_error());
        assert_eq!(
            handler.execute(&make_command(&["PASTE.GET", &id, "now", &after])),
            RespValue::error("NOTFOUND paste not found")
        );
    }

    #[test]
    fn test_now_override_ignored_outside_test_mode() {
        let handler = create_handler(EngineConfig::default());
        let id = create_id(&handler, &["PASTE.CREATE", "t", "TTL", "60"]);
        let far_future = (T0 + 3_600_000).to_string();

        assert!(!handler
            .execute(&make_command(&["PASTE.GET", &id, "NOW", &far_future]))
            .is_error());
    }

    #[test]
    fn test_get_arity() {
        let handler = create_handler(EngineConfig::default());

        assert_eq!(
            handler.execute(&make_command(&["PASTE.GET"])),
            RespValue::error("ERR wrong number of arguments for 'PASTE.GET' command")
        );
        assert_eq!(
            handler.execute(&make_command(&["PASTE.GET", "a", "b", "c"])),
            RespValue::error("ERR syntax error")
        );
    }

    #[test]
    fn test_unknown_command() {
        let handler = create_handler(EngineConfig::default());
        assert_eq!(
            handler.execute(&make_command(&["SET", "k", "v"])),
            RespValue::error("ERR unknown command 'SET'")
        );
    }

    #[test]
    fn test_info_reports_counters() {
        let handler = create_handler(EngineConfig::default());
        let id = create_id(&handler, &["PASTE.CREATE", "x"]);
        handler.execute(&make_command(&["PASTE.GET", &id]));

        let RespValue::BulkString(info) = handler.execute(&make_command(&["INFO"])) else {
            panic!("INFO must reply with a bulk string");
        };
        let info = String::from_utf8(info.to_vec()).unwrap();
        assert!(info.contains("created:1\r\n"));
        assert!(info.contains("served:1\r\n"));
        assert!(info.contains("keys:1\r\n"));
        assert!(info.contains("view_counting:Atomic\r\n"));
    }

    #[test]
    fn test_command_name() {
        assert_eq!(command_name(&make_command(&["quit"])), Some("QUIT".to_string()));
        assert_eq!(command_name(&[]), None);
    }
}
