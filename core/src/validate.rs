use std::collections::HashSet;

use pdugraph_proto::{ContextId, Delivery, OutgoingPdu, Pdu, PduRef};

use crate::error::ValidationError;

pub fn validate_context(context: &ContextId) -> Result<(), ValidationError> {
    if context.is_empty() {
        return Err(ValidationError::EmptyContext);
    }
    Ok(())
}

fn validate_identity(context: &ContextId, pdu_ref: &PduRef) -> Result<(), ValidationError> {
    validate_context(context)?;
    if pdu_ref.id.is_empty() {
        return Err(ValidationError::MissingId);
    }
    if pdu_ref.origin.is_empty() {
        return Err(ValidationError::MissingOrigin);
    }
    Ok(())
}

pub fn validate_outgoing(pdu: &OutgoingPdu) -> Result<(), ValidationError> { validate_identity(&pdu.context, &pdu.pdu_ref()) }

/// Checks identity and the predecessor list. Predecessors that are not known yet are fine.
pub fn validate_pdu(pdu: &Pdu) -> Result<(), ValidationError> {
    let me = pdu.pdu_ref();
    validate_identity(&pdu.context, &me)?;

    let mut seen = HashSet::with_capacity(pdu.predecessors.len());
    for pred in &pdu.predecessors {
        if pred.id.is_empty() || pred.origin.is_empty() {
            return Err(ValidationError::EmptyPredecessor);
        }
        if *pred == me {
            return Err(ValidationError::SelfReference(me));
        }
        if !seen.insert(pred) {
            return Err(ValidationError::DuplicatePredecessor(pred.clone()));
        }
    }
    Ok(())
}

pub fn validate_delivery(delivery: &Delivery) -> Result<(), ValidationError> {
    if delivery.origin.is_empty() {
        return Err(ValidationError::MissingOrigin);
    }
    if delivery.checkpoint.is_empty() {
        return Err(ValidationError::EmptyCheckpoint);
    }
    if delivery.destination.is_empty() {
        return Err(ValidationError::EmptyDestination);
    }
    for key in &delivery.pdus {
        validate_identity(&key.context, &key.pdu)?;
    }
    Ok(())
}
