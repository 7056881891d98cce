//! Loader state machine and the per-operation state gate.
//!
//! Valid transitions:
//!
//! | From                  | To                                       |
//! |-----------------------|------------------------------------------|
//! | `NotInitialized`      | `LoadingSucceeded`, `LoadingFailed`      |
//! | `LoadingSucceeded`    | `NeedDeviceResources`                    |
//! | `NeedDeviceResources` | `LoadingSucceeded`                       |
//! | `LoadingFailed`       | none; terminal                           |

use crate::error::LoaderError;

/// Lifecycle state of an [`ImageLoader`](crate::ImageLoader).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ImageLoaderState {
    /// No load has been attempted.
    NotInitialized,
    /// Image data and device resources are both present.
    LoadingSucceeded,
    /// The load failed; terminal.
    LoadingFailed,
    /// Image data is valid but device resources must be (re)created.
    NeedDeviceResources,
}

impl ImageLoaderState {
    /// Returns true if `to` is a legal next state.
    pub fn can_transition_to(self, to: ImageLoaderState) -> bool {
        use ImageLoaderState::*;
        matches!(
            (self, to),
            (NotInitialized, LoadingSucceeded)
                | (NotInitialized, LoadingFailed)
                | (NotInitialized, NeedDeviceResources)
                | (LoadingSucceeded, NeedDeviceResources)
                | (NeedDeviceResources, LoadingSucceeded)
        )
    }
}

/// Allow-lists for each loader operation.
pub(crate) mod allowed {
    use super::ImageLoaderState::{self, *};

    pub const LOAD: &[ImageLoaderState] = &[NotInitialized];
    pub const RENDER: &[ImageLoaderState] = &[LoadingSucceeded];
    pub const DEVICE_INDEPENDENT: &[ImageLoaderState] = &[LoadingSucceeded, NeedDeviceResources];
    pub const CREATE: &[ImageLoaderState] = &[NeedDeviceResources, LoadingSucceeded];
    pub const RELEASE: &[ImageLoaderState] = &[LoadingSucceeded, NeedDeviceResources];
}

/// Check `actual` against an operation's allow-list.
///
/// A failed check from `LoadingFailed` reports [`LoaderError::BadImage`]
/// so callers can tell a corrupt file from API misuse.
pub(crate) fn enforce(
    actual: ImageLoaderState,
    allowed: &'static [ImageLoaderState],
) -> Result<(), LoaderError> {
    if allowed.contains(&actual) {
        return Ok(());
    }
    if actual == ImageLoaderState::LoadingFailed {
        return Err(LoaderError::BadImage);
    }
    Err(LoaderError::WrongState { actual, allowed })
}

#[cfg(test)]
mod tests {
    use super::ImageLoaderState::*;
    use super::*;

    #[test]
    fn test_enforce_allows_listed_states() {
        assert!(enforce(LoadingSucceeded, allowed::RENDER).is_ok());
        assert!(enforce(NeedDeviceResources, allowed::DEVICE_INDEPENDENT).is_ok());
        assert!(enforce(NotInitialized, allowed::LOAD).is_ok());
    }

    #[test]
    fn test_enforce_wrong_state() {
        let err = enforce(NotInitialized, allowed::RENDER).unwrap_err();
        assert_eq!(
            err,
            LoaderError::WrongState {
                actual: NotInitialized,
                allowed: allowed::RENDER
            }
        );
    }

    #[test]
    fn test_enforce_failed_is_bad_image() {
        for list in [
            allowed::LOAD,
            allowed::RENDER,
            allowed::DEVICE_INDEPENDENT,
            allowed::CREATE,
            allowed::RELEASE,
        ] {
            assert_eq!(enforce(LoadingFailed, list), Err(LoaderError::BadImage));
        }
    }

    #[test]
    fn test_transitions() {
        assert!(NotInitialized.can_transition_to(LoadingSucceeded));
        assert!(NotInitialized.can_transition_to(LoadingFailed));
        assert!(LoadingSucceeded.can_transition_to(NeedDeviceResources));
        assert!(NeedDeviceResources.can_transition_to(LoadingSucceeded));

        for to in [NotInitialized, LoadingSucceeded, NeedDeviceResources] {
            assert!(!LoadingFailed.can_transition_to(to));
        }
        assert!(!LoadingSucceeded.can_transition_to(NotInitialized));
    }
}
