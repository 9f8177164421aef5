//! Integration tests: the HTTP router, notification worker and subscription
//! sync running against a mockito server standing in for Twitch and Discord

mod harness;
mod router_test;
mod twitch_flow_test;
