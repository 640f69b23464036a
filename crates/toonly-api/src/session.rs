use std::sync::{Mutex, PoisonError};

/// The agreement (thermostat) the account's calls are currently bound to.
///
/// Remembered after a successful bind so the recovery path can re-bind
/// without the caller supplying the id again.
#[derive(Debug, Default)]
pub struct SessionBinding {
    agreement_id: Mutex<Option<String>>,
}

impl SessionBinding {
    pub fn remember(&self, agreement_id: &str) {
        *self
            .agreement_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(agreement_id.to_owned());
    }

    pub fn current(&self) -> Option<String> {
        self.agreement_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
