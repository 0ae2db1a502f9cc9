//! Integration tests for `ogcfilter`; see `tests/`.
