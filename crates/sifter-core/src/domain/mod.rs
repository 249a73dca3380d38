//! Domain model (ids, documents, records, state machine, views, errors).

pub mod document;
pub mod errors;
pub mod ids;
pub mod invoice;
pub mod record;
pub mod state;
pub mod transition;
pub mod view;

pub use self::document::{MediaType, StoredDocument};
pub use self::errors::{
    ExtractionError, FailureKind, NormalizeError, ProcessingError, QueueError, StatusError,
    StoreError, SubmitError, TaskFailure,
};
pub use self::ids::{ParseIdError, TaskId};
pub use self::invoice::{ContactInfo, InvoiceData, LineItem, NumberOrText};
pub use self::record::TaskRecord;
pub use self::state::TaskState;
pub use self::transition::{InvalidTransition, Transition};
pub use self::view::{TaskCounts, TaskView};
