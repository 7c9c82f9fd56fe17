//! Bounded busy waiting.

/// A bounded wait gave up before its condition was met.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Timeout {
    pub spins: u64,
}

/// Spin until `done` returns true, checking it at most `limit` times.
pub fn spin_until<F>(limit: u64, mut done: F) -> Result<u64, Timeout>
    where F: FnMut() -> bool
{
    for spins in 0..limit {
        if done() {
            return Ok(spins);
        }
        core::hint::spin_loop();
    }
    Err(Timeout { spins: limit })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn condition_met_early() {
        let mut polls = 0;
        let result = spin_until(100, || { polls += 1; polls == 5 });
        assert_eq!(result, Ok(4));
    }

    #[test]
    fn gives_up_after_limit() {
        let mut polls = 0;
        assert_eq!(spin_until(10, || { polls += 1; false }), Err(Timeout { spins: 10 }));
        assert_eq!(polls, 10);
    }
}
