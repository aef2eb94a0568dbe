use accel_wire::{ItemType, Reader, WireError};
use thiserror::Error;
use tracing::warn;

use super::{AttributeMap, CancellationReason, TransactionCanceledFailure};
use crate::dictionary::{AttributeDictionary, DictionaryError};

/// Failure while reconstructing per-item cancellation detail.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("cancellation payload: {0}")]
    Wire(#[from] WireError),

    #[error(transparent)]
    Dictionary(#[from] DictionaryError),

    #[error("expected {expected} item keys, got {got}")]
    KeyCountMismatch { expected: usize, got: usize },
}

impl TransactionCanceledFailure {
    /// Reconstruct the per-item cancellation records from the raw payload
    /// section.
    ///
    /// `keys` carries the key attributes of the original request's items,
    /// in request order; the server omits key attributes from the
    /// compressed payload, so they are merged back in here. Dictionary
    /// identifiers resolve through `dictionary`, whose miss path may call
    /// out to the cluster.
    ///
    /// Idempotent: once resolved, later calls return the existing records
    /// without touching the payload or the dictionary. A dictionary or
    /// payload failure aborts the whole resolution and leaves the failure
    /// unresolved; no partial records are kept.
    pub async fn resolve_cancellation_reasons(
        &mut self,
        keys: &[Option<AttributeMap>],
        dictionary: &AttributeDictionary,
    ) -> Result<&[CancellationReason], ResolveError> {
        if self.cancellation_reasons().is_none() {
            let records = resolve_reasons(
                self.reason_codes(),
                self.reason_messages(),
                self.raw_reason_items(),
                keys,
                dictionary,
            )
            .await?;
            *self.reasons_mut() = Some(records);
        }
        Ok(self.cancellation_reasons().unwrap_or_default())
    }
}

async fn resolve_reasons(
    codes: &[Option<String>],
    messages: &[Option<String>],
    raw: &[u8],
    keys: &[Option<AttributeMap>],
    dictionary: &AttributeDictionary,
) -> Result<Vec<CancellationReason>, ResolveError> {
    if keys.len() != codes.len() {
        return Err(ResolveError::KeyCountMismatch {
            expected: codes.len(),
            got: keys.len(),
        });
    }

    let mut reader = Reader::new(raw);
    let mut records = Vec::with_capacity(codes.len());
    for (i, code) in codes.iter().enumerate() {
        // One wire item per transaction item: a null marker when the
        // server returned nothing, a byte string holding the compressed
        // payload otherwise. Consumed even for items that did not fail,
        // to stay in step with the parallel lists.
        let payload = match reader.peek_type()? {
            ItemType::Null => {
                reader.read_null()?;
                None
            }
            ItemType::Bytes => Some(reader.read_bytes()?),
            _ => {
                return Err(ResolveError::Wire(WireError::Malformed(
                    "cancellation item must be null or a byte string",
                )))
            }
        };

        if code.is_none() {
            records.push(CancellationReason::default());
            continue;
        }

        let item = match payload {
            Some(bytes) if !bytes.is_empty() => {
                Some(decode_item(&bytes, keys[i].as_ref(), dictionary).await?)
            }
            _ => None,
        };
        records.push(CancellationReason {
            code: code.clone(),
            message: messages.get(i).cloned().flatten(),
            item,
        });
    }
    Ok(records)
}

/// Decode one compressed item payload: repeated groups of a dictionary
/// identifier followed by one value per attribute name the identifier
/// stands for. Key attributes from the original request are merged last,
/// overriding anything the payload carried for the same name.
async fn decode_item(
    payload: &[u8],
    keys: Option<&AttributeMap>,
    dictionary: &AttributeDictionary,
) -> Result<AttributeMap, ResolveError> {
    let mut reader = Reader::new(payload);
    let mut item = AttributeMap::new();
    while !reader.is_at_end()? {
        let id = reader.read_int()?;
        let names = match dictionary.names_for_id(id).await {
            Ok(names) => names,
            Err(e) => {
                warn!(dictionary_id = id, error = %e, "dictionary load failed during cancellation resolution");
                return Err(ResolveError::Dictionary(e));
            }
        };
        for name in names.iter() {
            let value = reader.read_value()?;
            item.insert(name.clone(), value);
        }
    }
    if let Some(keys) = keys {
        for (k, v) in keys {
            item.insert(k.clone(), v.clone());
        }
    }
    Ok(item)
}
