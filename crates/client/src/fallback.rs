use jave_core::ImageId;
use jave_engine::{EngineError, Entity, Kind};

/// A value a fallback step can produce, and whether the cache really held it.
pub trait Candidate {
    fn present(&self) -> bool;
}

impl<K: Kind> Candidate for Entity<K> {
    fn present(&self) -> bool {
        self.exists()
    }
}

/// A collection is present when every element is; an empty one always is.
impl<T: Candidate> Candidate for Vec<T> {
    fn present(&self) -> bool {
        self.iter().all(Candidate::present)
    }
}

impl Candidate for ImageId {
    fn present(&self) -> bool {
        true
    }
}

/// An ordered derivation of a result from the cache, run after a
/// connection failure.
///
/// Each step receives the previous result. The chain is abandoned at the
/// first step that fails or yields something the cache does not hold.
#[must_use]
pub struct Fallback<T> {
    value: Option<T>,
}

impl<T> Fallback<T> {
    /// Starts a chain from a value that is not itself checked, usually an id.
    pub fn seed(value: T) -> Self {
        Self { value: Some(value) }
    }

    pub fn then<U: Candidate>(
        self,
        step: impl FnOnce(T) -> Result<U, EngineError>,
    ) -> Fallback<U> {
        let value = self
            .value
            .and_then(|value| step(value).ok())
            .filter(Candidate::present);
        Fallback { value }
    }

    pub fn finish(self) -> Option<T> {
        self.value
    }
}
