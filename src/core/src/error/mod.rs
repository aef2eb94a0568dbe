use std::collections::HashMap;
use std::fmt;

use accel_wire::Value;

mod cancellation;
mod decode;
mod retry;
mod translate;

pub use cancellation::ResolveError;
pub use decode::decode_error;
pub use retry::{is_network_error, is_throttle_error, Ternary, THROTTLE_ERROR_CODES};
pub use translate::{translate_error, BoxError};

/// Stable codes for errors this client synthesizes itself, alongside the
/// service-defined catalog carried on the wire.
pub const ERR_CODE_INTERNAL_SERVER_ERROR: &str = "InternalServerError";
pub const ERR_CODE_UNKNOWN: &str = "Unknown";
pub const ERR_CODE_THROTTLING_EXCEPTION: &str = "ThrottlingException";
pub const ERR_CODE_VALIDATION_EXCEPTION: &str = "ValidationException";
pub const ERR_CODE_SERVICE_UNAVAILABLE: &str = "ServiceUnavailable";
pub const ERR_CODE_NOT_IMPLEMENTED: &str = "NotImplemented";

/// Who a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Client,
    Server,
    Unknown,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Fault::Client => "client",
            Fault::Server => "server",
            Fault::Unknown => "unknown",
        })
    }
}

/// Attribute map of one reconstructed item.
pub type AttributeMap = HashMap<String, Value>;

/// A bare code/message/fault triple, used for failures that carry no
/// service code sequence: transport wraps, unknown errors and errors
/// minted by other layers of the client.
#[derive(Debug, Clone, PartialEq)]
pub struct GenericError {
    pub code: String,
    pub message: String,
    pub fault: Fault,
}

impl GenericError {
    pub fn new(code: impl Into<String>, message: impl Into<String>, fault: Fault) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            fault,
        }
    }
}

impl fmt::Display for GenericError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for GenericError {}

/// Base decoded service failure.
///
/// Constructed once at decode time and read-only afterwards. The code
/// sequence orders classification codes outermost-first; the first code
/// and the combination of later codes select the concrete category.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestFailure {
    code: String,
    message: String,
    fault: Fault,
    codes: Vec<i32>,
    request_id: String,
    status_code: u16,
}

impl RequestFailure {
    pub fn new(
        codes: Vec<i32>,
        code: impl Into<String>,
        message: impl Into<String>,
        request_id: impl Into<String>,
        status_code: u16,
        fault: Fault,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            fault,
            codes,
            request_id: request_id.into(),
            status_code,
        }
    }

    pub fn error_code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn fault(&self) -> Fault {
        self.fault
    }

    /// Ordered classification codes, outermost first. Never empty for a
    /// decoded failure.
    pub fn code_sequence(&self) -> &[i32] {
        &self.codes
    }

    /// Request identifier from the wire; empty when the wire carried null.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// Whether the session survives this failure (leading classification
    /// code 2).
    pub fn is_recoverable(&self) -> bool {
        self.codes.first() == Some(&2)
    }

    /// Whether this is an authentication failure (code path 23.31 ending
    /// in one of the credential categories).
    pub fn is_auth_error(&self) -> bool {
        self.codes.len() > 3
            && self.codes[1] == 23
            && self.codes[2] == 31
            && matches!(self.codes[3], 32 | 33 | 34)
    }
}

impl fmt::Display for RequestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for RequestFailure {}

/// Per-item outcome record within a canceled transaction.
///
/// `code` and `message` are absent when the item did not fail; `item` is
/// present only when the item failed a conditional check and the request
/// asked for the old item back.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CancellationReason {
    pub code: Option<String>,
    pub message: Option<String>,
    pub item: Option<AttributeMap>,
}

/// A failed multi-item transaction.
///
/// Extends [`RequestFailure`] by embedding. The three parallel per-item
/// fields share the cardinality of the original transaction's item list;
/// `reasons` stays `None` until
/// [`resolve_cancellation_reasons`](Self::resolve_cancellation_reasons)
/// decompresses the raw payload section against the attribute dictionary.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionCanceledFailure {
    base: RequestFailure,
    reason_codes: Vec<Option<String>>,
    reason_messages: Vec<Option<String>>,
    reason_items_raw: Vec<u8>,
    reasons: Option<Vec<CancellationReason>>,
}

impl TransactionCanceledFailure {
    pub fn new(
        base: RequestFailure,
        reason_codes: Vec<Option<String>>,
        reason_messages: Vec<Option<String>>,
        reason_items_raw: Vec<u8>,
    ) -> Self {
        Self {
            base,
            reason_codes,
            reason_messages,
            reason_items_raw,
            reasons: None,
        }
    }

    pub fn base(&self) -> &RequestFailure {
        &self.base
    }

    pub fn error_code(&self) -> &str {
        self.base.error_code()
    }

    pub fn message(&self) -> &str {
        self.base.message()
    }

    pub fn fault(&self) -> Fault {
        self.base.fault()
    }

    /// Per-item reason codes; `None` marks an item that did not fail.
    pub fn reason_codes(&self) -> &[Option<String>] {
        &self.reason_codes
    }

    pub fn reason_messages(&self) -> &[Option<String>] {
        &self.reason_messages
    }

    /// The still-compressed per-item payload section, one wire item per
    /// transaction item, in request order.
    pub fn raw_reason_items(&self) -> &[u8] {
        &self.reason_items_raw
    }

    /// Resolved records, if resolution has run.
    pub fn cancellation_reasons(&self) -> Option<&[CancellationReason]> {
        self.reasons.as_deref()
    }

    pub(crate) fn reasons_mut(&mut self) -> &mut Option<Vec<CancellationReason>> {
        &mut self.reasons
    }
}

impl fmt::Display for TransactionCanceledFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.base.fmt(f)
    }
}

impl std::error::Error for TransactionCanceledFailure {}

/// Every failure shape the client surfaces to callers after translation.
///
/// A closed set: decoded service failures keep their full structure, and
/// everything else is normalized into [`GenericError`].
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceError {
    Request(RequestFailure),
    TransactionCanceled(TransactionCanceledFailure),
    Api(GenericError),
}

impl ServiceError {
    pub fn error_code(&self) -> &str {
        match self {
            ServiceError::Request(e) => e.error_code(),
            ServiceError::TransactionCanceled(e) => e.error_code(),
            ServiceError::Api(e) => &e.code,
        }
    }

    pub fn error_message(&self) -> &str {
        match self {
            ServiceError::Request(e) => e.message(),
            ServiceError::TransactionCanceled(e) => e.message(),
            ServiceError::Api(e) => &e.message,
        }
    }

    pub fn fault(&self) -> Fault {
        match self {
            ServiceError::Request(e) => e.fault(),
            ServiceError::TransactionCanceled(e) => e.fault(),
            ServiceError::Api(e) => e.fault,
        }
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::Request(e) => e.fmt(f),
            ServiceError::TransactionCanceled(e) => e.fmt(f),
            ServiceError::Api(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for ServiceError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_checks_leading_code() {
        let recoverable =
            RequestFailure::new(vec![2, 1], "c", "m", "", 500, Fault::Server);
        assert!(recoverable.is_recoverable());

        let fatal = RequestFailure::new(vec![4, 37], "c", "m", "", 400, Fault::Server);
        assert!(!fatal.is_recoverable());
    }

    #[test]
    fn auth_error_checks_code_path() {
        for last in [32, 33, 34] {
            let e = RequestFailure::new(vec![4, 23, 31, last], "c", "m", "", 401, Fault::Client);
            assert!(e.is_auth_error());
        }
        let e = RequestFailure::new(vec![4, 23, 31, 35], "c", "m", "", 400, Fault::Client);
        assert!(!e.is_auth_error());
    }

    #[test]
    fn service_error_delegates_accessors() {
        let e = ServiceError::Request(RequestFailure::new(
            vec![1],
            "SomeCode",
            "some message",
            "rid",
            500,
            Fault::Server,
        ));
        assert_eq!(e.error_code(), "SomeCode");
        assert_eq!(e.error_message(), "some message");
        assert_eq!(e.fault(), Fault::Server);
        assert_eq!(e.to_string(), "SomeCode: some message");
    }
}
