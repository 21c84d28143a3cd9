use crate::bitmap::Bitmap;

pub trait SafetyChecker: Send {
    /// `true` if the image must not be shown.
    fn is_unsafe(&self, image: &Bitmap) -> bool;
}

/// What to do with generated images before they reach the user.
///
/// Filtering is off unless configured: every output is treated as safe.
#[derive(Default)]
pub enum SafetyPolicy {
    #[default]
    Disabled,
    Enforced(Box<dyn SafetyChecker>),
}

impl SafetyPolicy {
    pub fn is_enforced(&self) -> bool {
        matches!(self, Self::Enforced(_))
    }

    /// Returns `true` if the image may be shown.
    pub fn permits(&self, image: &Bitmap) -> bool {
        match self {
            Self::Disabled => true,
            Self::Enforced(checker) => !checker.is_unsafe(image),
        }
    }
}
