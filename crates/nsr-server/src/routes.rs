//! Built-in service routes.

use nsr_core::{handler, Handler, Router, RouterError};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Register every built-in route on `router`.
///
/// # Errors
///
/// Returns an error if the router is no longer accepting routes.
pub fn register(router: &mut Router) -> Result<(), RouterError> {
    router.path("health", health())?;
    router.path("echo.>", echo())?;
    router.path("time.now", time_now())?;
    router.path("math.add", math_add())?;
    Ok(())
}

/// Reports status and version.
pub fn health() -> Handler {
    handler(|response, _| {
        let body = serde_json::json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION")
        });
        response.header("content-type", "application/json");
        response.write(serde_json::to_vec(&body)?);
        Ok(())
    })
}

/// Replies with the request payload and headers.
pub fn echo() -> Handler {
    handler(|response, request| {
        for (key, values) in request.headers.iter() {
            for value in values {
                response.header(key, value.as_str());
            }
        }
        response.header("echo-subject", request.subject.as_str());
        response.write(&request.payload);
        Ok(())
    })
}

/// Replies with the current Unix time in milliseconds.
pub fn time_now() -> Handler {
    handler(|response, _| {
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?;
        response.write(now.as_millis().to_string());
        Ok(())
    })
}

#[derive(Debug, Deserialize)]
struct AddRequest {
    a: f64,
    b: f64,
}

#[derive(Debug, Serialize)]
struct AddResponse {
    sum: f64,
}

/// Adds `a` and `b` from a JSON payload.
pub fn math_add() -> Handler {
    handler(|response, request| {
        let operands: AddRequest = match serde_json::from_slice(&request.payload) {
            Ok(operands) => operands,
            Err(e) => {
                response.write_error("BadRequest", e.to_string());
                return Ok(());
            }
        };

        let sum = AddResponse {
            sum: operands.a + operands.b,
        };
        response.header("content-type", "application/json");
        response.write(serde_json::to_vec(&sum)?);
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nsr_core::dispatch;
    use nsr_protocol::{Message, Reply};

    #[test]
    fn test_register_all_routes() {
        let mut router = Router::new();
        register(&mut router).unwrap();
        assert_eq!(
            router.routes(),
            vec!["echo.>", "health", "math.add", "time.now"]
        );
    }

    #[test]
    fn test_health() {
        let reply = dispatch(&health(), Message::new("health", Vec::new()));
        let body: serde_json::Value = serde_json::from_slice(reply.body()).unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[test]
    fn test_echo_copies_payload_and_headers() {
        let message = Message::new("echo.a.b", b"hello".to_vec()).with_header("trace", "t-1");

        match dispatch(&echo(), message) {
            Reply::Success { headers, body } => {
                assert_eq!(&body[..], b"hello");
                assert_eq!(headers.get("trace"), Some("t-1"));
                assert_eq!(headers.get("echo-subject"), Some("echo.a.b"));
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[test]
    fn test_time_now() {
        let reply = dispatch(&time_now(), Message::new("time.now", Vec::new()));
        let millis: u128 = std::str::from_utf8(reply.body()).unwrap().parse().unwrap();
        assert!(millis > 0);
    }

    #[test]
    fn test_math_add() {
        let reply = dispatch(
            &math_add(),
            Message::new("math.add", br#"{"a": 2, "b": 40.5}"#.to_vec()),
        );
        let body: serde_json::Value = serde_json::from_slice(reply.body()).unwrap();
        assert_eq!(body["sum"], 42.5);
    }

    #[test]
    fn test_math_add_rejects_bad_payload() {
        let reply = dispatch(&math_add(), Message::new("math.add", b"not json".to_vec()));
        assert_eq!(reply.error_code(), Some("BadRequest"));
    }
}
