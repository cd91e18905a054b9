//! Small traits shared across Agora components.

use crate::AgoraResult;

/// Trait for objects that can check their own consistency
pub trait Validatable {
    /// Validate this object
    fn validate(&self) -> AgoraResult<()>;

    /// Check if this object is valid
    fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AgoraError;

    struct Ratio(f64);

    impl Validatable for Ratio {
        fn validate(&self) -> AgoraResult<()> {
            if (0.0..=1.0).contains(&self.0) {
                Ok(())
            } else {
                Err(AgoraError::invalid_input("ratio out of range"))
            }
        }
    }

    #[test]
    fn test_is_valid_follows_validate() {
        assert!(Ratio(0.5).is_valid());
        assert!(!Ratio(1.5).is_valid());
    }
}
