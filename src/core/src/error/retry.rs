use std::error::Error;
use std::io;

use tokio::time::error::Elapsed;

use super::{GenericError, ServiceError};

/// Message fragments that mark a transport-level failure in an
/// already-formatted error. This sniffing layer sits alongside the
/// structural checks because historical message phrasing (including our
/// own `"network error: "` prefix and nested "caused by" chains) is what
/// downstream retry policies key on; changing or dropping a fragment
/// changes retry behavior.
const NETWORK_ERROR_MARKERS: &[&str] = &[
    "network error",
    "connection refused",
    "connection reset",
    "broken pipe",
    "timed out",
];

const TRANSPORT_ERROR_KINDS: &[io::ErrorKind] = &[
    io::ErrorKind::TimedOut,
    io::ErrorKind::UnexpectedEof,
    io::ErrorKind::ConnectionRefused,
    io::ErrorKind::ConnectionReset,
    io::ErrorKind::ConnectionAborted,
    io::ErrorKind::BrokenPipe,
    io::ErrorKind::NotConnected,
];

/// Whether `err` represents a connectivity or timeout condition anywhere
/// in its chain, making the attempt worth retrying against another node.
///
/// Each level of the chain is tested for: an elapsed deadline, a
/// transport-kind [`io::Error`] (end-of-stream included), or a structured
/// error whose message carries a recognized network-failure fragment.
pub fn is_network_error(err: &(dyn Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.is::<Elapsed>() {
            return true;
        }
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            if TRANSPORT_ERROR_KINDS.contains(&io_err.kind()) {
                return true;
            }
        }
        if let Some(message) = structured_message(e) {
            if NETWORK_ERROR_MARKERS.iter().any(|m| message.contains(m)) {
                return true;
            }
        }
        current = e.source();
    }
    false
}

fn structured_message<'a>(e: &'a (dyn Error + 'static)) -> Option<&'a str> {
    if let Some(api) = e.downcast_ref::<GenericError>() {
        return Some(&api.message);
    }
    if let Some(svc) = e.downcast_ref::<ServiceError>() {
        return Some(svc.error_message());
    }
    None
}

/// Three-valued answer for classifications that may not apply to an
/// error at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ternary {
    True,
    False,
    Unknown,
}

/// Error codes the service uses for its capacity-exceeded failure modes,
/// distinct from generic server faults.
pub const THROTTLE_ERROR_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "ThrottledException",
    "RequestThrottledException",
    "TooManyRequestsException",
    "ProvisionedThroughputExceededException",
    "TransactionInProgressException",
    "RequestLimitExceeded",
    "LimitExceededException",
];

/// Whether `err` is a throttling condition.
///
/// Returns [`Ternary::Unknown`] when no level of the chain carries an
/// error code, so a retry policy can tell "definitely not a throttle"
/// apart from "this error has no classification".
pub fn is_throttle_error(err: &(dyn Error + 'static)) -> Ternary {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(code) = error_code_of(e) {
            return if THROTTLE_ERROR_CODES.contains(&code) {
                Ternary::True
            } else {
                Ternary::False
            };
        }
        current = e.source();
    }
    Ternary::Unknown
}

fn error_code_of<'a>(e: &'a (dyn Error + 'static)) -> Option<&'a str> {
    if let Some(api) = e.downcast_ref::<GenericError>() {
        return Some(&api.code);
    }
    if let Some(svc) = e.downcast_ref::<ServiceError>() {
        return Some(svc.error_code());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Fault, RequestFailure};
    use std::fmt;
    use std::time::Duration;

    #[derive(Debug)]
    struct Wrapped {
        context: &'static str,
        source: GenericError,
    }

    impl fmt::Display for Wrapped {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}: {}", self.context, self.source)
        }
    }

    impl Error for Wrapped {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(&self.source)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_deadline_is_network_error() {
        let elapsed = tokio::time::timeout(Duration::from_millis(1), std::future::pending::<()>())
            .await
            .unwrap_err();
        assert!(is_network_error(&elapsed));
    }

    #[test]
    fn transport_io_kinds_are_network_errors() {
        let eof = io::Error::new(io::ErrorKind::UnexpectedEof, "eof");
        assert!(is_network_error(&eof));

        let refused = io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused");
        assert!(is_network_error(&refused));
    }

    #[test]
    fn structured_message_fragment_is_network_error() {
        let e = GenericError::new(
            "c1",
            "network error: caused by: dial tcp 172.31.0.205:8111: connect: connection refused",
            Fault::Client,
        );
        assert!(is_network_error(&e));
    }

    #[test]
    fn unrelated_structured_error_is_not_network() {
        let e = GenericError::new("c1", "msg", Fault::Server);
        assert!(!is_network_error(&e));
    }

    #[test]
    fn wrapped_chain_is_unwound() {
        let e = Wrapped {
            context: "c1: msg",
            source: GenericError::new("c2", "network error: timed out", Fault::Client),
        };
        assert!(is_network_error(&e));
    }

    #[test]
    fn other_io_kinds_are_not_network_errors() {
        let denied = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        assert!(!is_network_error(&denied));
    }

    #[test]
    fn throughput_exceeded_is_throttle() {
        let e = ServiceError::Request(RequestFailure::new(
            vec![4, 37, 38, 39, 40],
            "ProvisionedThroughputExceededException",
            "The request rate for the table exceeds the maximum allowed throughput.",
            "",
            400,
            Fault::Server,
        ));
        assert_eq!(is_throttle_error(&e), Ternary::True);
    }

    #[test]
    fn coded_non_throttle_is_false() {
        let e = GenericError::new("ValidationException", "bad request", Fault::Client);
        assert_eq!(is_throttle_error(&e), Ternary::False);
    }

    #[test]
    fn uncoded_error_is_unknown() {
        let e = io::Error::other("some other error");
        assert_eq!(is_throttle_error(&e), Ternary::Unknown);
    }
}
