//! Unit tests for the task lifecycle and ordering core.

mod support;
