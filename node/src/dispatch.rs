//! # Resolver Dispatch
//!
//! Turns one root field into one external call: apply the descriptor's
//! [`Binding`] to the argument map, invoke the bound [`Call`] on the
//! lifecycle collaborator, and encode the result as JSON.
//!
//! Failures are [`ResolveError`] values. Their `Display` text is the message
//! clients see; [`ResolveError::status`] is the transport status it implies,
//! if any.

use axum::http::StatusCode;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use bftx_protocol::{LifecycleError, TransactionLifecycle};

use crate::decode::{decode_transaction, DecodeError};
use crate::schema::{Binding, Call, OnMismatch, OperationDescriptor};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// A scalar lookup argument was missing or not a string.
    #[error("400")]
    ArgumentType { argument: &'static str },

    /// Structural decode of an input object failed.
    #[error("500")]
    Decoding(#[from] DecodeError),

    /// The collaborator's own error, passed through verbatim.
    #[error(transparent)]
    External(#[from] LifecycleError),

    /// The collaborator's result could not be encoded as JSON.
    #[error("500")]
    Encoding(String),
}

impl ResolveError {
    /// The HTTP status this failure implies.
    ///
    /// External failures only carry one when their text is a valid numeric
    /// status code.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ResolveError::ArgumentType { .. } => Some(StatusCode::BAD_REQUEST),
            ResolveError::Decoding(_) | ResolveError::Encoding(_) => {
                Some(StatusCode::INTERNAL_SERVER_ERROR)
            }
            ResolveError::External(err) => status_from_text(&err.to_string()),
        }
    }
}

/// Parses a message that is exactly a numeric HTTP status.
pub fn status_from_text(text: &str) -> Option<StatusCode> {
    text.parse::<u16>()
        .ok()
        .and_then(|code| StatusCode::from_u16(code).ok())
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Input for the bound call after the binding rule has been applied.
enum CallInput {
    Id(String),
    Draft(bftx_protocol::Transaction),
    Nothing,
}

fn encode<T: Serialize>(value: T) -> Result<Value, ResolveError> {
    serde_json::to_value(value).map_err(|e| ResolveError::Encoding(e.to_string()))
}

/// Resolves one operation.
///
/// `Ok(None)` is the silent empty result of a mutation whose lookup
/// argument did not type-check.
pub async fn resolve(
    op: &OperationDescriptor,
    args: &Map<String, Value>,
    lifecycle: &dyn TransactionLifecycle,
) -> Result<Option<Value>, ResolveError> {
    let input = match op.binding {
        Binding::ScalarLookup {
            argument,
            on_mismatch,
        } => match args.get(argument).and_then(Value::as_str) {
            Some(id) => CallInput::Id(id.to_string()),
            None => {
                debug!(operation = %op.name, argument, "lookup argument missing or not a string");
                return match on_mismatch {
                    OnMismatch::Fail => Err(ResolveError::ArgumentType { argument }),
                    OnMismatch::Silent => Ok(None),
                };
            }
        },
        Binding::StructuralDecode { argument } => {
            CallInput::Draft(decode_transaction(args, argument)?)
        }
        Binding::NoArguments => CallInput::Nothing,
    };

    let value = match (op.call, input) {
        (Call::GetTransaction, CallInput::Id(id)) => encode(lifecycle.get_transaction(&id).await?)?,
        (Call::QueryTransaction, CallInput::Id(id)) => {
            encode(lifecycle.query_transaction(&id).await?)?
        }
        (Call::GetInfo, _) => encode(lifecycle.get_info().await?)?,
        (Call::GetTotal, _) => encode(lifecycle.get_total().await?)?,
        (Call::Construct, CallInput::Draft(tx)) => encode(lifecycle.construct_bftx(tx).await?)?,
        (Call::Encrypt, CallInput::Id(id)) => encode(lifecycle.encrypt_bftx(&id).await?)?,
        (Call::Decrypt, CallInput::Id(id)) => encode(lifecycle.decrypt_bftx(&id).await?)?,
        (Call::Sign, CallInput::Id(id)) => encode(lifecycle.sign_bftx(&id).await?)?,
        (Call::Broadcast, CallInput::Id(id)) => encode(lifecycle.broadcast_bftx(&id).await?)?,
        (call, _) => {
            return Err(ResolveError::Encoding(format!(
                "{call:?} is not compatible with binding {:?}",
                op.binding
            )))
        }
    };
    Ok(Some(value))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
