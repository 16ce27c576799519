use crate::error::KeeperError;
use serde::Serialize;

/// One emission of an asynchronous operation.
///
/// A well-formed sequence is zero or more `Loading` values followed by exactly
/// one `Success` or `Error`.
#[derive(Debug, Clone, PartialEq)]
pub enum Resource<T> {
    Loading,
    Success(T),
    Error(KeeperError),
}

impl<T> Resource<T> {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Resource::Loading)
    }

    pub fn into_result(self) -> Option<Result<T, KeeperError>> {
        match self {
            Resource::Loading => None,
            Resource::Success(data) => Some(Ok(data)),
            Resource::Error(error) => Some(Err(error)),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Resource<U> {
        match self {
            Resource::Loading => Resource::Loading,
            Resource::Success(data) => Resource::Success(f(data)),
            Resource::Error(error) => Resource::Error(error),
        }
    }
}

/// Screen-facing view of the latest [`Resource`] received.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UiState<T> {
    pub idle: bool,
    pub is_loading: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> Default for UiState<T> {
    fn default() -> Self {
        Self {
            idle: true,
            is_loading: false,
            data: None,
            error: None,
        }
    }
}

impl<T> UiState<T> {
    pub fn loading(&mut self) {
        self.idle = false;
        self.is_loading = true;
        self.error = None;
    }

    pub fn success(&mut self, data: T) {
        self.idle = false;
        self.is_loading = false;
        self.data = Some(data);
        self.error = None;
    }

    // Keeps the last good data so a failed refresh does not blank the screen.
    pub fn error(&mut self, message: impl Into<String>) {
        self.idle = false;
        self.is_loading = false;
        self.error = Some(message.into());
    }

    pub fn apply(&mut self, resource: Resource<T>) {
        match resource {
            Resource::Loading => self.loading(),
            Resource::Success(data) => self.success(data),
            Resource::Error(error) => self.error(error.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ui_state_follows_resource_sequence() {
        let mut state = UiState::<u32>::default();
        assert!(state.idle);

        state.apply(Resource::Loading);
        assert!(!state.idle);
        assert!(state.is_loading);

        state.apply(Resource::Success(3));
        assert!(!state.is_loading);
        assert_eq!(state.data, Some(3));

        state.apply(Resource::Loading);
        state.apply(Resource::Error(KeeperError::network("offline")));
        assert_eq!(state.error.as_deref(), Some("offline"));
        assert_eq!(state.data, Some(3));
    }

    #[test]
    fn only_loading_is_non_terminal() {
        assert!(!Resource::<()>::Loading.is_terminal());
        assert!(Resource::Success(()).is_terminal());
        assert!(Resource::<()>::Error(KeeperError::api("boom")).is_terminal());
        assert_eq!(Resource::Success(2).map(|v| v * 2), Resource::Success(4));
        assert_eq!(Resource::<u8>::Loading.into_result(), None);
    }
}
