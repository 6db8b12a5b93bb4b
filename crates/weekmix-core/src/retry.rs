//! Bounded rejection sampling with a deterministic fallback.

/// Value produced by [`retry_or_fallback`] along with how it was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retried<T> {
    pub value: T,
    /// Attempts actually run (equals the budget when the fallback was used).
    pub attempts: u32,
    pub fell_back: bool,
}

/// Runs `attempt` up to `max_attempts` times and keeps the first value that
/// satisfies `accept`. When the budget is spent, `fallback` supplies the value.
///
/// Errors from either closure propagate unchanged; a rejected candidate is
/// never an error.
pub fn retry_or_fallback<T, E, A, P, F>(
    max_attempts: u32,
    mut attempt: A,
    mut accept: P,
    fallback: F,
) -> Result<Retried<T>, E>
where
    A: FnMut(u32) -> Result<T, E>,
    P: FnMut(&T) -> bool,
    F: FnOnce() -> Result<T, E>,
{
    for number in 1..=max_attempts {
        let candidate = attempt(number)?;
        if accept(&candidate) {
            return Ok(Retried {
                value: candidate,
                attempts: number,
                fell_back: false,
            });
        }
    }

    Ok(Retried {
        value: fallback()?,
        attempts: max_attempts,
        fell_back: true,
    })
}
