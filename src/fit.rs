//! The fitted-state capability.

use crate::error::{CrossfitError, CrossfitResult};

/// Something that must be fitted before most of its operations are available.
pub trait Fittable {
    fn is_fitted(&self) -> bool;

    /// Name reported in [`CrossfitError::NotFitted`].
    fn fittable_name(&self) -> &'static str;

    fn ensure_fitted(&self) -> CrossfitResult<()> {
        if self.is_fitted() {
            Ok(())
        } else {
            Err(CrossfitError::NotFitted(self.fittable_name()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Toggle(bool);

    impl Fittable for Toggle {
        fn is_fitted(&self) -> bool {
            self.0
        }

        fn fittable_name(&self) -> &'static str {
            "Toggle"
        }
    }

    #[test]
    fn test_ensure_fitted() {
        assert!(Toggle(true).ensure_fitted().is_ok());
        let err = Toggle(false).ensure_fitted().unwrap_err();
        assert_eq!(err.to_string(), "Toggle is not fitted");
    }
}
