//! Runtime tests driving the full stack against a mock auth server.

mod harness;
mod otp;
mod password;
mod subscriptions;
