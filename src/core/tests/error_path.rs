use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use accel_core::{
    decode_error, is_network_error, is_throttle_error, translate_error, AttributeDictionary,
    AttributeMap, DictionaryError, Fault, ServiceError, Ternary,
};
use accel_wire::{encode_to_vec, Reader, Value};
use futures::FutureExt;

// ── Helpers ──────────────────────────────────────────────────────────

fn transaction_canceled_frame(item_payloads: &[Option<Vec<u8>>]) -> Vec<u8> {
    encode_to_vec(|w| {
        w.write_array_header(5);
        for c in [4, 37, 38, 39, 58] {
            w.write_int(c);
        }
        w.write_string("TransactionCanceledException Message");
        w.write_array_header(4);
        w.write_string("request-1");
        w.write_string("TransactionCanceledException");
        w.write_int(400);
        w.write_array_header(3 * item_payloads.len());
        for payload in item_payloads {
            match payload {
                Some(_) => {
                    w.write_string("ConditionalCheckFailedException");
                    w.write_string("conditional check failed");
                }
                None => {
                    w.write_string("NONE");
                    w.write_null();
                }
            }
            match payload {
                Some(bytes) => w.write_bytes(bytes),
                None => w.write_null(),
            }
        }
    })
}

fn dictionary(names: Vec<String>, loads: Arc<AtomicUsize>) -> AttributeDictionary {
    AttributeDictionary::new(
        16,
        Arc::new(move |_id| {
            let names = names.clone();
            let loads = loads.clone();
            async move {
                loads.fetch_add(1, Ordering::SeqCst);
                Ok(names)
            }
            .boxed()
        }),
        Arc::new(|_names| async move { Ok::<i64, DictionaryError>(1) }.boxed()),
    )
}

// ── Tests ────────────────────────────────────────────────────────────

/// A service error frame travels the whole failure path: frame decode,
/// dictionary-backed item reconstruction, and retry classification.
#[tokio::test]
async fn transaction_cancellation_end_to_end() {
    let payload = encode_to_vec(|w| {
        w.write_int(12345);
        w.write_value(&Value::Text("stale".into()));
    });
    let frame = transaction_canceled_frame(&[None, Some(payload)]);

    let mut reader = Reader::new(frame.as_slice());
    let decoded = decode_error(&mut reader).unwrap();

    let mut failure = match decoded {
        ServiceError::TransactionCanceled(f) => f,
        other => panic!("expected transaction cancellation, got {other:?}"),
    };
    assert_eq!(failure.base().request_id(), "request-1");
    assert_eq!(failure.base().status_code(), 400);
    assert_eq!(failure.base().code_sequence(), [4, 37, 38, 39, 58]);
    assert!(failure.cancellation_reasons().is_none());

    let keys = vec![
        Some(AttributeMap::from([("pk".to_string(), Value::Int(1))])),
        Some(AttributeMap::from([("pk".to_string(), Value::Int(2))])),
    ];
    let loads = Arc::new(AtomicUsize::new(0));
    let dict = dictionary(vec!["status".into()], loads.clone());

    let reasons = failure
        .resolve_cancellation_reasons(&keys, &dict)
        .await
        .unwrap();

    assert_eq!(reasons.len(), 2);
    assert_eq!(reasons[0].code.as_deref(), Some("NONE"));
    assert_eq!(reasons[0].item, None);
    assert_eq!(
        reasons[1].item,
        Some(AttributeMap::from([
            ("status".to_string(), Value::Text("stale".into())),
            ("pk".to_string(), Value::Int(2)),
        ]))
    );
    assert_eq!(loads.load(Ordering::SeqCst), 1);

    // The decoded failure classifies as a throttle-unrelated server error.
    let err = ServiceError::TransactionCanceled(failure.clone());
    assert_eq!(is_throttle_error(&err), Ternary::False);
    assert!(!is_network_error(&err));
}

/// Round-trip: a frame built from known fields decodes to the value
/// constructed directly from those fields.
#[test]
fn request_failure_round_trip() {
    let frame = encode_to_vec(|w| {
        w.write_array_header(5);
        for c in [4, 37, 38, 39, 40] {
            w.write_int(c);
        }
        w.write_string("ProvisionedThroughputExceededException Message");
        w.write_array_header(3);
        w.write_string("request-1");
        w.write_string("ProvisionedThroughputExceededException");
        w.write_int(400);
    });

    let mut reader = Reader::new(frame.as_slice());
    let decoded = decode_error(&mut reader).unwrap();

    match &decoded {
        ServiceError::Request(e) => {
            assert_eq!(e.error_code(), "ProvisionedThroughputExceededException");
            assert_eq!(e.message(), "ProvisionedThroughputExceededException Message");
            assert_eq!(e.request_id(), "request-1");
            assert_eq!(e.status_code(), 400);
            assert_eq!(e.fault(), Fault::Server);
        }
        other => panic!("expected request failure, got {other:?}"),
    }

    // Capacity failures are what the throttle classifier keys on.
    assert_eq!(is_throttle_error(&decoded), Ternary::True);
}

/// The translator's own "network error" prefix is recognized by the
/// connectivity classifier, so a wrapped transport failure stays
/// retryable after normalization.
#[test]
fn translated_transport_error_stays_retryable() {
    let transport = std::io::Error::new(
        std::io::ErrorKind::ConnectionReset,
        "connection reset by peer",
    );
    let translated = translate_error(Box::new(transport));

    assert_eq!(translated.fault(), Fault::Client);
    assert!(translated.error_message().starts_with("network error: "));
    assert!(is_network_error(&translated));
    assert_eq!(is_throttle_error(&translated), Ternary::False);
}
