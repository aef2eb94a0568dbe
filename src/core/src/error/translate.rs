use tracing::debug;

use super::retry::is_network_error;
use super::{
    Fault, GenericError, ServiceError, ERR_CODE_INTERNAL_SERVER_ERROR, ERR_CODE_UNKNOWN,
};

/// Boxed error as handed around by the transport and connection layers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Normalize any error into the one shape callers observe.
///
/// Total, in priority order: already-structured errors pass through
/// unchanged; connectivity failures become a client-fault
/// `InternalServerError` wrap; everything else becomes an unknown-fault
/// `Unknown` wrap. The original message text is always retained, prefixed
/// rather than replaced.
pub fn translate_error(err: BoxError) -> ServiceError {
    let err = match err.downcast::<ServiceError>() {
        Ok(e) => return *e,
        Err(err) => err,
    };
    let err = match err.downcast::<GenericError>() {
        Ok(e) => return ServiceError::Api(*e),
        Err(err) => err,
    };
    if is_network_error(&*err) {
        debug!(error = %err, "translating transport failure");
        return ServiceError::Api(GenericError::new(
            ERR_CODE_INTERNAL_SERVER_ERROR,
            format!("network error: {err}"),
            Fault::Client,
        ));
    }
    debug!(error = %err, "translating unrecognized failure");
    ServiceError::Api(GenericError::new(
        ERR_CODE_UNKNOWN,
        format!("unknown error: {err}"),
        Fault::Unknown,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RequestFailure;
    use std::io;

    #[test]
    fn structured_error_passes_through() {
        let original = ServiceError::Request(RequestFailure::new(
            vec![1, 2, 3],
            "ec",
            "msg",
            "rid",
            500,
            Fault::Server,
        ));
        let translated = translate_error(Box::new(original.clone()));
        assert_eq!(translated, original);
    }

    #[test]
    fn generic_triple_passes_through() {
        let original = GenericError::new("ec", "msg", Fault::Server);
        let translated = translate_error(Box::new(original.clone()));
        assert_eq!(translated, ServiceError::Api(original));
    }

    #[test]
    fn transport_error_becomes_client_fault_wrap() {
        let err = io::Error::new(io::ErrorKind::ConnectionRefused, "read: connection refused");
        let translated = translate_error(Box::new(err));
        assert_eq!(
            translated,
            ServiceError::Api(GenericError::new(
                ERR_CODE_INTERNAL_SERVER_ERROR,
                "network error: read: connection refused",
                Fault::Client,
            ))
        );
    }

    #[test]
    fn arbitrary_error_becomes_unknown_wrap() {
        let translated = translate_error("ex".into());
        assert_eq!(
            translated,
            ServiceError::Api(GenericError::new(
                ERR_CODE_UNKNOWN,
                "unknown error: ex",
                Fault::Unknown,
            ))
        );
    }

    #[test]
    fn translation_is_total() {
        let inputs: Vec<BoxError> = vec![
            Box::new(ServiceError::Api(GenericError::new("a", "b", Fault::Client))),
            Box::new(io::Error::new(io::ErrorKind::TimedOut, "timed out")),
            "anything at all".into(),
        ];
        for input in inputs {
            let out = translate_error(input);
            assert!(!out.error_code().is_empty());
            assert!(!out.error_message().is_empty());
        }
    }
}
