//! Intentionally empty — this crate only carries integration tests in
//! `tests/`.
