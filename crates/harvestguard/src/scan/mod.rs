//! Scan workflow: image selection, submission pipeline, form state, result model.

mod file;
mod form;
mod pipeline;
mod result;

pub use file::{validate_batch, validate_single, ImageFile, ImageKind, ValidationError};
pub use form::{
    ScanForm, ScanMode, SubmissionState, SubmitOutcome, CANCELLED_MESSAGE, OFFLINE_MESSAGE,
};
pub use pipeline::{
    reconcile_batch, scan_batch, scan_single, ScanOutcome, BATCH_PARTIAL, BATCH_SUCCESS,
    SINGLE_FAILED, SINGLE_SUCCESS,
};
pub use result::{Decision, ScanResult};
