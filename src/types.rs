use std::sync::{Arc, RwLock};

use crate::error::MiniError;

/// Shared, lock-protected ownership of a value.
pub type Pod<T> = Arc<RwLock<T>>;

pub type ResultPod<T> = Result<Pod<T>, MiniError>;

pub type MiniResult = Result<(), MiniError>;
