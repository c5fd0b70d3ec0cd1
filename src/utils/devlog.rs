//! Fine-grained pool event log with a thread-local capture sink.
//! Events go to the `clientpool::events` target at TRACE; tests can enable the sink on their own
//! thread and assert on what was emitted without touching the global logger.

use std::cell::RefCell;

/// Log target used by [`pool_event!`](crate::pool_event).
pub const EVENTS_TARGET: &str = "clientpool::events";

thread_local! {
    static TL_SINK: RefCell<Option<Vec<String>>> = const { RefCell::new(None) };
}

/// Disables the thread-local sink on drop.
pub struct EventSinkGuard;

impl Drop for EventSinkGuard {
    fn drop(&mut self) {
        TL_SINK.with(|s| *s.borrow_mut() = None);
    }
}

/// Start capturing events emitted on the current thread.
pub fn enable_thread_sink() -> EventSinkGuard {
    TL_SINK.with(|s| *s.borrow_mut() = Some(Vec::new()));
    EventSinkGuard
}

#[doc(hidden)]
pub fn write_str(msg: &str) {
    TL_SINK.with(|s| {
        if let Some(buf) = s.borrow_mut().as_mut() {
            buf.push(msg.to_owned());
        }
    });
}

/// Take everything captured so far on this thread.
pub fn drain() -> Vec<String> {
    TL_SINK.with(|s| s.borrow_mut().as_mut().map(std::mem::take).unwrap_or_default())
}

/// Emit a pool event, e.g. `pool_event!("lru_evict", "key" => victim)`.
/// Rendered as a single JSON object line: `{"op":"lru_evict","key":"m1"}`.
#[macro_export]
macro_rules! pool_event {
    ($op:expr $(, $name:literal => $value:expr)* $(,)?) => {{
        let mut __obj = serde_json::Map::new();
        __obj.insert("op".to_string(), serde_json::Value::from($op));
        $( __obj.insert($name.to_string(), serde_json::json!($value)); )*
        let __s = serde_json::Value::Object(__obj).to_string();
        $crate::utils::devlog::write_str(&__s);
        log::log!(target: $crate::utils::devlog::EVENTS_TARGET, log::Level::Trace, "{}", __s);
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_captures_structured_events() {
        let _g = enable_thread_sink();
        crate::pool_event!("build", "key" => "m1", "ms" => 12u64);
        let got = drain();
        assert_eq!(got.len(), 1);
        let v: serde_json::Value = serde_json::from_str(&got[0]).unwrap();
        assert_eq!(v["op"], "build");
        assert_eq!(v["key"], "m1");
        assert_eq!(v["ms"], 12);
        assert!(drain().is_empty());
    }

    #[test]
    fn other_threads_are_not_captured() {
        let _g = enable_thread_sink();
        let child = std::thread::spawn(|| {
            crate::pool_event!("wait", "key" => "x");
            drain()
        })
        .join()
        .unwrap();
        assert!(child.is_empty());
        assert!(drain().is_empty());
    }
}
