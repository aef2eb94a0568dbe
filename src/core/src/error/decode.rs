use std::io::Read;

use accel_wire::{Reader, WireError};
use tracing::debug;

use super::{Fault, RequestFailure, ServiceError, TransactionCanceledFailure};

// Leading classification codes, outermost first:
//   1 - unretryable server condition
//   2 - recoverable server condition (the session survives)
//   3 - request rejected before reaching execution (caller error)
//   4 - request executed and failed; later codes narrow the category
const CLIENT_FAULT_LEADING_CODES: &[i32] = &[3];

fn fault_for_codes(codes: &[i32]) -> Fault {
    match codes.first() {
        Some(c) if CLIENT_FAULT_LEADING_CODES.contains(c) => Fault::Client,
        Some(_) => Fault::Server,
        None => Fault::Unknown,
    }
}

/// Status families keyed by the leading classification code, applied only
/// when the wire status is null. Request-level and caller-error families
/// mirror the service's 4xx classes; everything else is a 5xx.
fn infer_status_code(codes: &[i32]) -> u16 {
    match codes.first() {
        Some(3 | 4) => 400,
        _ => 500,
    }
}

/// Decode an error response frame.
///
/// Wire layout: `[code_0..code_n]`, `message`, then
/// `[requestId|null, errorCode, statusCode|null]` with an optional fourth
/// element `[reason_1..reason_{3k}]` of per-item cancellation triples
/// `(reasonCode|null, reasonMessage|null, itemBlob)`. The item blobs are
/// copied raw, undecoded, for later dictionary resolution.
///
/// Malformed or truncated input aborts the whole decode; no partial error
/// value is ever produced.
pub fn decode_error<R: Read>(reader: &mut Reader<R>) -> Result<ServiceError, WireError> {
    let code_count = reader.read_array_header()?;
    if code_count == 0 {
        return Err(WireError::Malformed("empty error code sequence"));
    }
    let mut codes = Vec::with_capacity(code_count);
    for _ in 0..code_count {
        let code = i32::try_from(reader.read_int()?).map_err(|_| WireError::IntOverflow)?;
        codes.push(code);
    }
    let message = reader.read_string()?;

    let detail_len = reader.read_array_header()?;
    if detail_len != 3 && detail_len != 4 {
        return Err(WireError::Malformed("error detail must have 3 or 4 elements"));
    }
    let request_id = reader.read_nullable_string()?.unwrap_or_default();
    let error_code = reader.read_string()?;
    let status_code = match reader.read_nullable_int()? {
        Some(s) => u16::try_from(s).map_err(|_| WireError::IntOverflow)?,
        None => infer_status_code(&codes),
    };

    if detail_len == 4 {
        let reason_len = reader.read_array_header()?;
        if reason_len % 3 != 0 {
            return Err(WireError::Malformed("cancellation detail not in triples"));
        }
        let count = reason_len / 3;
        let mut reason_codes = Vec::with_capacity(count);
        let mut reason_messages = Vec::with_capacity(count);
        let mut reason_items_raw = Vec::new();
        for _ in 0..count {
            reason_codes.push(reader.read_nullable_string()?);
            reason_messages.push(reader.read_nullable_string()?);
            reader.read_raw_item(&mut reason_items_raw)?;
        }
        debug!(codes = ?codes, code = %error_code, items = count, "decoded transaction cancellation");
        let base = RequestFailure::new(
            codes,
            error_code,
            message,
            request_id,
            status_code,
            Fault::Server,
        );
        return Ok(ServiceError::TransactionCanceled(
            TransactionCanceledFailure::new(base, reason_codes, reason_messages, reason_items_raw),
        ));
    }

    let fault = fault_for_codes(&codes);
    debug!(codes = ?codes, code = %error_code, "decoded service error");
    Ok(ServiceError::Request(RequestFailure::new(
        codes,
        error_code,
        message,
        request_id,
        status_code,
        fault,
    )))
}
